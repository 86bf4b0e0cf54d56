//! Shared types for the toolbelt release pipeline.
//!
//! Everything here is plain data: the fixed [`Platform`] table and the
//! validated identifiers ([`Network`], [`CommitHash`], [`Apv`]) that feed the
//! path and config derivations in `toolbelt-core`.

pub mod platform;
pub mod types;

// Re-exports
pub use platform::*;
pub use types::*;

/// Network whose releases get the shared launcher config instead of a
/// network-scoped store directory.
pub const MAIN_NETWORK: &str = "main";
