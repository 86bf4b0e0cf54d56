//! Storage key derivation.
//!
//! Every function here is pure: the same inputs always produce the same key,
//! and nothing inspects the filesystem or the network. Keys are built from
//! validated [`Network`] and [`CommitHash`] segments, which cannot contain
//! `/`, so distinct `(network, version, kind, commit)` tuples never collide
//! under a fixed prefix.

use toolbelt_schema::{ArtifactKind, CommitHash, MAIN_NETWORK, Network, Platform};

/// Name of the per-network config object and of the file extracted next to
/// the launcher tree.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Shared launcher config copied into the `main` network location.
pub const SHARED_LAUNCHER_CONFIG_KEY: &str = "9c-launcher-config.json";

/// Key prefix of pre-built launcher archives in the artifact bucket.
pub const LAUNCHER_ARTIFACT_PREFIX: &str = "9c-launcher";

/// Release directory: `{prefix}{network}/v{version}/{kind}/{commit}`
pub fn release_path(
    prefix: &str,
    network: &Network,
    version: u64,
    kind: ArtifactKind,
    commit: &CommitHash,
) -> String {
    format!("{prefix}{network}/v{version}/{kind}/{commit}")
}

/// Published archive: `{release_path}/{dist_file_name}`
pub fn release_key(
    prefix: &str,
    network: &Network,
    version: u64,
    kind: ArtifactKind,
    commit: &CommitHash,
    platform: Platform,
) -> String {
    format!(
        "{}/{}",
        release_path(prefix, network, version, kind, commit),
        platform.dist_file_name()
    )
}

/// Network-level launcher config: `{prefix}{network}/config.json`
pub fn network_config_key(prefix: &str, network: &Network) -> String {
    format!("{prefix}{network}/{CONFIG_FILE_NAME}")
}

/// Destination of the shared launcher config: `{prefix}main/config.json`
pub fn main_config_key(prefix: &str) -> String {
    format!("{prefix}{MAIN_NETWORK}/{CONFIG_FILE_NAME}")
}

/// Pre-built launcher in the artifact bucket: `9c-launcher/{commit}/{dist_file_name}`
pub fn launcher_artifact_key(commit: &CommitHash, platform: Platform) -> String {
    format!(
        "{LAUNCHER_ARTIFACT_PREFIX}/{commit}/{}",
        platform.dist_file_name()
    )
}

/// Network-scoped chain store directory: `9c-{network}-rc-v{version}-{timestamp}`
pub fn store_dir_name(network: &Network, version: u64, timestamp: &str) -> String {
    format!("9c-{network}-rc-v{version}-{timestamp}")
}

/// Public download URL for a key.
pub fn download_url(base_url: &str, key: &str) -> String {
    format!("{}/{key}", base_url.trim_end_matches('/'))
}
