//! Environment-driven settings for stores and the CI artifact source.

/// Release bucket serving published clients.
pub const DEFAULT_RELEASE_BUCKET: &str = "9c-release.planetariumhq.com";
/// Bucket holding pre-built launcher archives.
pub const DEFAULT_ARTIFACT_BUCKET: &str = "9c-artifacts";

/// Runtime configuration for a release run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Bucket the release is published to.
    pub release_bucket: String,
    /// Bucket launcher builds are read from.
    pub artifact_bucket: String,
    /// S3-compatible endpoint override (e.g. a local `MinIO`).
    pub s3_endpoint: Option<String>,
    /// Region used for both buckets.
    pub s3_region: String,
    /// Public base URL the release bucket is served under.
    pub public_base_url: String,
    /// Token for the CI artifact API.
    pub github_token: Option<String>,
    /// `owner/repo` whose workflow runs produce player builds.
    pub github_repo: String,
    /// API root (overridable for GitHub Enterprise and tests).
    pub github_api: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            release_bucket: DEFAULT_RELEASE_BUCKET.to_string(),
            artifact_bucket: DEFAULT_ARTIFACT_BUCKET.to_string(),
            s3_endpoint: None,
            s3_region: "us-east-2".to_string(),
            public_base_url: "https://release.nine-chronicles.com".to_string(),
            github_token: None,
            github_repo: "planetarium/NineChronicles".to_string(),
            github_api: "https://api.github.com".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            release_bucket: var("TOOLBELT_RELEASE_BUCKET").unwrap_or(defaults.release_bucket),
            artifact_bucket: var("TOOLBELT_ARTIFACT_BUCKET").unwrap_or(defaults.artifact_bucket),
            s3_endpoint: var("TOOLBELT_S3_ENDPOINT"),
            s3_region: var("TOOLBELT_S3_REGION").unwrap_or(defaults.s3_region),
            public_base_url: var("TOOLBELT_PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            github_token: var("GITHUB_TOKEN"),
            github_repo: var("TOOLBELT_GITHUB_REPO").unwrap_or(defaults.github_repo),
            github_api: var("TOOLBELT_GITHUB_API").unwrap_or(defaults.github_api),
        }
    }
}
