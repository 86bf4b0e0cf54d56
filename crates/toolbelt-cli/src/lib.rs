//! toolbelt - Nine Chronicles release tooling
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Publishes player and launcher builds to the release bucket.
//!
//! # Layout
//!
//! ```text
//! {prefix}{network}/
//! ├── config.json                     # launcher config (launcher releases)
//! └── v{version}/{kind}/{commit}/
//!     ├── Windows.zip
//!     ├── macOS.tar.gz
//!     └── Linux.tar.gz
//! ```

pub mod cmd;
pub mod ui;

pub use toolbelt_core::USER_AGENT;

use clap::{Args, Parser, Subcommand};
use toolbelt_schema::{ArtifactKind, CommitHash, Network, Platform};

#[derive(Debug, Parser)]
#[command(name = "toolbelt")]
#[command(author, version, about = "toolbelt - Nine Chronicles release tooling")]
pub struct Cli {
    /// Run every local step but upload nothing
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print the run report as JSON instead of a table
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish a release
    Release {
        #[command(subcommand)]
        command: ReleaseCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReleaseCommands {
    /// Republish the CI player build of a commit
    Player(ReleaseArgs),
    /// Re-configure and publish the launcher build of a commit
    Launcher(ReleaseArgs),
}

impl ReleaseCommands {
    pub fn into_parts(self) -> (ArtifactKind, ReleaseArgs) {
        match self {
            Self::Player(args) => (ArtifactKind::Player, args),
            Self::Launcher(args) => (ArtifactKind::Launcher, args),
        }
    }
}

#[derive(Debug, Args)]
pub struct ReleaseArgs {
    /// Commit the build was made from
    pub commit_hash: CommitHash,

    /// APV version number
    pub version: u64,

    /// Target network (e.g. main, internal)
    #[arg(long, env = "TOOLBELT_NETWORK")]
    pub network: Network,

    /// Platforms to release (default: all)
    #[arg(long, value_delimiter = ',')]
    pub platform: Vec<Platform>,

    /// Request signed artifacts (no signing step exists; logged only)
    #[arg(long)]
    pub signing: bool,

    /// Slack channel to notify (accepted, not delivered)
    #[arg(long)]
    pub slack_channel: Option<String>,

    /// Prefix prepended to every published key
    #[arg(long, env = "TOOLBELT_PREFIX", default_value = "")]
    pub prefix: String,

    /// Raw APV token written into launcher configs
    #[arg(long, env = "TOOLBELT_APV")]
    pub apv: String,

    /// APV build timestamp, used in store directory names (required for launcher releases outside main)
    #[arg(long)]
    pub timestamp: Option<String>,

    /// Release bucket override
    #[arg(long, env = "TOOLBELT_RELEASE_BUCKET")]
    pub release_bucket: Option<String>,

    /// Artifact bucket override
    #[arg(long, env = "TOOLBELT_ARTIFACT_BUCKET")]
    pub artifact_bucket: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_launcher_release() {
        let cli = Cli::try_parse_from([
            "toolbelt",
            "release",
            "launcher",
            "c2",
            "7",
            "--network",
            "internal",
            "--platform",
            "linux,win",
            "--apv",
            "7/0xsigner/sig",
            "--timestamp",
            "20240101",
            "--dry-run",
        ])
        .unwrap();

        assert!(cli.dry_run);
        let Commands::Release { command } = cli.command else {
            panic!("expected release");
        };
        let (kind, args) = command.into_parts();
        assert_eq!(kind, ArtifactKind::Launcher);
        assert_eq!(args.commit_hash.as_str(), "c2");
        assert_eq!(args.version, 7);
        assert_eq!(args.network.as_str(), "internal");
        assert_eq!(args.platform, [Platform::Linux, Platform::Windows]);
        assert_eq!(args.timestamp.as_deref(), Some("20240101"));
    }

    #[test]
    fn test_rejects_invalid_identifiers() {
        let parse = |commit: &str, network: &str| {
            Cli::try_parse_from([
                "toolbelt", "release", "player", commit, "1", "--network", network, "--apv", "x",
            ])
        };
        assert!(parse("c1", "main").is_ok());
        assert!(parse("c1/../x", "main").is_err());
        assert!(parse("c1", "main/v1").is_err());
    }
}
