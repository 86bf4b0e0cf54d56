//! Integration tests for the toolbelt-core pipeline.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tempfile::TempDir;
use toolbelt_core::io::archive;
use toolbelt_core::io::download::FetchError;
use toolbelt_core::io::source::ArtifactSource;
use toolbelt_core::io::store::{ObjectStore, StoreError};
use toolbelt_core::pipeline::{OutcomeStatus, Stage};
use toolbelt_core::{NullReporter, Orchestrator, PipelineContext, ReleaseRequest, Reporter};
use toolbelt_schema::{Apv, ArchiveFormat, ArtifactKind, CommitHash, Network, Platform};

const BASE_URL: &str = "https://release.example.com";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Download(String),
    Upload(String),
    Copy(String, String),
}

/// Object store backed by a map, recording every call.
struct MemoryStore {
    bucket: String,
    objects: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<Call>>,
}

impl MemoryStore {
    fn new(bucket: &str) -> Arc<Self> {
        Arc::new(Self {
            bucket: bucket.to_string(),
            objects: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn put(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.into());
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    fn json(&self, key: &str) -> Value {
        serde_json::from_slice(&self.get(key).unwrap()).unwrap()
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn uploads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Upload(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    fn missing(&self, op: &'static str, key: &str) -> StoreError {
        StoreError::Request {
            op,
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message: "NoSuchKey".to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn download(&self, key: &str, dest: &Path) -> Result<u64, StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Download(key.to_string()));
        let bytes = self.get(key).ok_or_else(|| self.missing("download", key))?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(dest, &bytes)?;
        Ok(bytes.len() as u64)
    }

    async fn upload(&self, src: &Path, key: &str) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Upload(key.to_string()));
        let bytes = std::fs::read(src)?;
        self.put(key, bytes);
        Ok(())
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<(), StoreError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Copy(src_key.to_string(), dst_key.to_string()));
        let bytes = self.get(src_key).ok_or_else(|| self.missing("copy", src_key))?;
        self.put(dst_key, bytes);
        Ok(())
    }
}

/// CI artifacts held in memory, served under `mem://{key}` URLs.
#[derive(Default)]
struct FakeSource {
    artifacts: HashMap<String, Vec<u8>>,
    no_runs: bool,
}

#[async_trait]
impl ArtifactSource for FakeSource {
    async fn resolve_artifact_urls(
        &self,
        commit: &CommitHash,
    ) -> Result<HashMap<String, String>, FetchError> {
        if self.no_runs {
            return Err(FetchError::NoRuns(commit.to_string()));
        }
        Ok(self
            .artifacts
            .keys()
            .map(|key| (key.clone(), format!("mem://{key}")))
            .collect())
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        _platform: Platform,
        _reporter: &dyn Reporter,
    ) -> Result<u64, FetchError> {
        let key = url.trim_start_matches("mem://");
        let bytes = self.artifacts.get(key).ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })?;
        std::fs::create_dir_all(dest.parent().unwrap())?;
        std::fs::write(dest, bytes)?;
        Ok(bytes.len() as u64)
    }
}

fn player_bytes(platform: Platform) -> Vec<u8> {
    format!("player build for {platform}").into_bytes()
}

/// Workflow artifact zip wrapping the platform's distribution archive.
fn ci_artifact(platform: Platform) -> Vec<u8> {
    let dir = TempDir::new().unwrap();
    let src = dir.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join(platform.dist_file_name()), player_bytes(platform)).unwrap();

    let out = dir.path().join("artifact.zip");
    archive::compress(&src, &out, ArchiveFormat::Zip).unwrap();
    std::fs::read(out).unwrap()
}

/// Launcher build as stored in the artifact bucket, in its source format.
fn launcher_build(platform: Platform) -> Vec<u8> {
    let spec = platform.spec();
    let config_rel = spec
        .launcher_config_path
        .strip_prefix(&format!("{}/", spec.os_name))
        .unwrap();
    launcher_build_with_config_at(platform, config_rel)
}

/// Launcher build whose embedded config sits at `config_rel` under the tree root.
fn launcher_build_with_config_at(platform: Platform, config_rel: &str) -> Vec<u8> {
    let spec = platform.spec();
    let dir = TempDir::new().unwrap();
    let root = dir.path().join(spec.os_name);

    let config = root.join(config_rel);
    std::fs::create_dir_all(config.parent().unwrap()).unwrap();
    std::fs::write(&config, r#"{"AppProtocolVersion": "stale"}"#).unwrap();
    std::fs::write(root.join("NineChroniclesLauncher"), b"launcher binary").unwrap();

    let out = dir.path().join(spec.dist_file_name);
    match spec.launcher_source_format {
        ArchiveFormat::SevenZ => write_7z(&root, &out),
        format => {
            archive::compress(&root, &out, format).unwrap();
        }
    }
    std::fs::read(out).unwrap()
}

fn write_7z(root: &Path, out: &Path) {
    let mut writer = sevenz_rust::SevenZWriter::create(out).unwrap();
    for entry in walkdir::WalkDir::new(root).min_depth(1) {
        let entry = entry.unwrap();
        if entry.file_type().is_dir() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(root)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        writer
            .push_archive_entry(
                sevenz_rust::SevenZArchiveEntry::from_path(entry.path(), name),
                Some(File::open(entry.path()).unwrap()),
            )
            .unwrap();
    }
    writer.finish().unwrap();
}

/// Unpack a published archive and read the launcher config inside it.
fn published_config(bytes: &[u8], platform: Platform) -> Value {
    let spec = platform.spec();
    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join(spec.dist_file_name);
    std::fs::write(&archive_path, bytes).unwrap();

    let tree = dir.path().join(spec.os_name);
    archive::extract(&archive_path, &tree, spec.dist_format).unwrap();
    let data = std::fs::read(dir.path().join(spec.launcher_config_path)).unwrap();
    serde_json::from_slice(&data).unwrap()
}

struct Harness {
    source: FakeSource,
    artifacts: Arc<MemoryStore>,
    release: Arc<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let mut source = FakeSource::default();
        for platform in Platform::ALL {
            source.artifacts.insert(
                platform.spec().ci_artifact_key.to_string(),
                ci_artifact(platform),
            );
        }

        let artifacts = MemoryStore::new("9c-artifacts");
        for platform in Platform::ALL {
            artifacts.put(
                &format!("9c-launcher/c2/{}", platform.dist_file_name()),
                launcher_build(platform),
            );
        }

        let release = MemoryStore::new("9c-release");
        release.put(
            "internal/config.json",
            serde_json::to_vec(&json!({
                "AppProtocolVersion": "old",
                "GenesisBlockPath": "https://genesis",
                "BlockchainStoreDirName": "9c-internal-old",
            }))
            .unwrap(),
        );
        release.put(
            "main/config.json",
            serde_json::to_vec(&json!({
                "AppProtocolVersion": "old",
                "BlockchainStoreDirName": "9c-main-partition",
            }))
            .unwrap(),
        );
        release.put("9c-launcher-config.json", br#"{"Shared": true}"#.to_vec());

        Self {
            source,
            artifacts,
            release,
        }
    }

    fn orchestrator(self) -> (Orchestrator, Arc<MemoryStore>, Arc<MemoryStore>) {
        let reporter: Arc<dyn Reporter> = Arc::new(NullReporter);
        let ctx = PipelineContext {
            source: Arc::new(self.source),
            artifact_store: self.artifacts.clone(),
            release_store: self.release.clone(),
            reporter,
            public_base_url: BASE_URL.to_string(),
        };
        (Orchestrator::new(ctx), self.artifacts, self.release)
    }
}

fn player_request() -> ReleaseRequest {
    ReleaseRequest::new(
        ArtifactKind::Player,
        CommitHash::new("c1").unwrap(),
        Apv::new(500, "500/0xsigner/sig"),
        Network::main(),
    )
}

fn launcher_request(network: &str) -> ReleaseRequest {
    ReleaseRequest::new(
        ArtifactKind::Launcher,
        CommitHash::new("c2").unwrap(),
        Apv::new(7, "7/0xsigner/sig/dGltZXN0YW1w").with_timestamp("20240101"),
        Network::new(network).unwrap(),
    )
}

#[tokio::test]
async fn player_release_publishes_inner_archives() {
    let (orchestrator, _, release) = Harness::new().orchestrator();

    let report = orchestrator.run(&player_request()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(report.release_path, "main/v500/player/c1");
    assert_eq!(
        release.uploads(),
        [
            "main/v500/player/c1/Windows.zip",
            "main/v500/player/c1/macOS.tar.gz",
            "main/v500/player/c1/Linux.tar.gz",
        ]
    );
    for platform in Platform::ALL {
        let key = format!("main/v500/player/c1/{}", platform.dist_file_name());
        assert_eq!(release.get(&key).unwrap(), player_bytes(platform));
    }

    let windows = &report.outcomes[0];
    assert_eq!(windows.status, OutcomeStatus::Published);
    assert_eq!(
        windows.url,
        format!("{BASE_URL}/main/v500/player/c1/Windows.zip")
    );
    assert_eq!(windows.size, Some(player_bytes(Platform::Windows).len() as u64));
    assert!(windows.sha256.is_some());
}

#[tokio::test]
async fn player_missing_platform_does_not_stop_siblings() {
    let mut harness = Harness::new();
    harness.source.artifacts.remove("OSX");
    let (orchestrator, _, release) = harness.orchestrator();

    let report = orchestrator.run(&player_request()).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failures().count(), 1);
    assert!(matches!(
        &report.outcomes[1].status,
        OutcomeStatus::Failed { stage: Stage::Resolve, reason } if reason.contains("OSX")
    ));
    assert_eq!(
        release.uploads(),
        [
            "main/v500/player/c1/Windows.zip",
            "main/v500/player/c1/Linux.tar.gz",
        ]
    );
}

#[tokio::test]
async fn player_corrupt_artifact_fails_at_extract() {
    let mut harness = Harness::new();
    harness
        .source
        .artifacts
        .insert("Linux".to_string(), b"not a zip".to_vec());
    let (orchestrator, _, release) = harness.orchestrator();

    let report = orchestrator.run(&player_request()).await.unwrap();

    assert!(matches!(
        report.outcomes[2].status,
        OutcomeStatus::Failed {
            stage: Stage::Extract,
            ..
        }
    ));
    assert_eq!(release.uploads().len(), 2);
}

#[tokio::test]
async fn player_unresolvable_commit_fails_every_platform() {
    let mut harness = Harness::new();
    harness.source.no_runs = true;
    let (orchestrator, _, release) = harness.orchestrator();

    let report = orchestrator.run(&player_request()).await.unwrap();

    assert_eq!(report.failures().count(), 3);
    assert!(release.calls().is_empty());
}

#[tokio::test]
async fn player_dry_run_uploads_nothing() {
    let (orchestrator, _, release) = Harness::new().orchestrator();

    let report = orchestrator
        .run(&player_request().with_dry_run(true))
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(release.calls().is_empty());
    for outcome in &report.outcomes {
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(outcome.sha256.is_some());
    }
}

#[tokio::test]
async fn launcher_release_bakes_patched_config() {
    let (orchestrator, artifacts, release) = Harness::new().orchestrator();

    let report = orchestrator
        .run(&launcher_request("internal"))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(
        artifacts.calls(),
        [
            Call::Download("9c-launcher/c2/Windows.zip".to_string()),
            Call::Download("9c-launcher/c2/macOS.tar.gz".to_string()),
            Call::Download("9c-launcher/c2/Linux.tar.gz".to_string()),
        ]
    );
    assert_eq!(
        release.uploads(),
        [
            "internal/v7/launcher/c2/Windows.zip",
            "internal/config.json",
            "internal/v7/launcher/c2/macOS.tar.gz",
            "internal/config.json",
            "internal/v7/launcher/c2/Linux.tar.gz",
            "internal/config.json",
        ]
    );
    assert!(
        !release
            .calls()
            .iter()
            .any(|c| matches!(c, Call::Copy(..)))
    );

    let expected = json!({
        "AppProtocolVersion": "7/0xsigner/sig/dGltZXN0YW1w",
        "GenesisBlockPath": "https://genesis",
        "BlockchainStoreDirName": "9c-internal-rc-v7-20240101",
    });
    assert_eq!(release.json("internal/config.json"), expected);

    for platform in Platform::ALL {
        let key = format!("internal/v7/launcher/c2/{}", platform.dist_file_name());
        let archive = release.get(&key).unwrap();
        assert_eq!(published_config(&archive, platform), expected, "{platform}");
    }
}

#[tokio::test]
async fn launcher_main_copies_shared_config_first() {
    let (orchestrator, _, release) = Harness::new().orchestrator();

    orchestrator.run(&launcher_request("main")).await.unwrap();

    let calls = release.calls();
    let copies: Vec<usize> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::Copy(..)))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(
        calls[copies[0]],
        Call::Copy(
            "9c-launcher-config.json".to_string(),
            "main/config.json".to_string()
        )
    );
    assert_eq!(copies.len(), 1);
    let first_upload = calls
        .iter()
        .position(|c| matches!(c, Call::Upload(_)))
        .unwrap();
    assert!(copies[0] < first_upload);

    // The patched upload lands after the copy and wins.
    let config = release.json("main/config.json");
    assert_eq!(config["AppProtocolVersion"], "7/0xsigner/sig/dGltZXN0YW1w");
    assert_eq!(config["BlockchainStoreDirName"], "9c-main-partition");
}

#[tokio::test]
async fn launcher_dry_run_fetches_but_never_writes() {
    let (orchestrator, artifacts, release) = Harness::new().orchestrator();

    let report = orchestrator
        .run(&launcher_request("main").with_dry_run(true))
        .await
        .unwrap();

    assert_eq!(artifacts.calls().len(), 3);
    assert_eq!(
        release.calls(),
        [Call::Download("main/config.json".to_string())]
    );
    for outcome in &report.outcomes {
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(outcome.key.starts_with("main/v7/launcher/c2/"));
    }
}

#[tokio::test]
async fn launcher_dry_run_on_internal_reports_patched_config() {
    let (orchestrator, artifacts, release) = Harness::new().orchestrator();

    let report = orchestrator
        .run(&launcher_request("internal").with_dry_run(true))
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(artifacts.calls().len(), 3);
    assert_eq!(
        release.calls(),
        [Call::Download("internal/config.json".to_string())]
    );
    assert_eq!(
        report.config,
        Some(json!({
            "AppProtocolVersion": "7/0xsigner/sig/dGltZXN0YW1w",
            "GenesisBlockPath": "https://genesis",
            "BlockchainStoreDirName": "9c-internal-rc-v7-20240101",
        }))
    );
    for outcome in &report.outcomes {
        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(outcome.key.starts_with("internal/v7/launcher/c2/"));
        assert!(outcome.sha256.is_some());
    }
}

#[tokio::test]
async fn launcher_with_unexpected_layout_is_not_published() {
    let harness = Harness::new();
    harness.artifacts.put(
        "9c-launcher/c2/Linux.tar.gz",
        launcher_build_with_config_at(Platform::Linux, "app-1.2.3/resources/app/config.json"),
    );
    let (orchestrator, _, release) = harness.orchestrator();

    let err = orchestrator
        .run(&launcher_request("internal").with_platforms(vec![Platform::Linux]))
        .await
        .unwrap_err();

    assert_eq!(err.platform, Some(Platform::Linux));
    assert_eq!(err.stage, Stage::Configure);
    assert!(err.to_string().contains("not found"), "{err}");
    assert!(release.uploads().is_empty());
}

#[tokio::test]
async fn launcher_failure_aborts_run() {
    let harness = Harness::new();
    harness
        .artifacts
        .objects
        .lock()
        .unwrap()
        .remove("9c-launcher/c2/macOS.tar.gz");
    let (orchestrator, artifacts, release) = harness.orchestrator();

    let err = orchestrator
        .run(&launcher_request("internal"))
        .await
        .unwrap_err();

    assert_eq!(err.platform, Some(Platform::MacOs));
    assert_eq!(err.stage, Stage::Fetch);
    assert!(
        !artifacts
            .calls()
            .contains(&Call::Download("9c-launcher/c2/Linux.tar.gz".to_string()))
    );
    assert!(
        !release
            .uploads()
            .iter()
            .any(|k| k.ends_with("Linux.tar.gz"))
    );
}

#[tokio::test]
async fn launcher_without_timestamp_fails_before_fetching() {
    let (orchestrator, artifacts, release) = Harness::new().orchestrator();
    let mut req = launcher_request("internal");
    req.apv = Apv::new(7, "7/0xsigner/sig");

    let err = orchestrator.run(&req).await.unwrap_err();

    assert_eq!(err.platform, None);
    assert_eq!(err.stage, Stage::Configure);
    assert!(artifacts.calls().is_empty());
    assert!(release.uploads().is_empty());
}

#[tokio::test]
async fn prefix_scopes_published_keys_only() {
    let (orchestrator, _, release) = Harness::new().orchestrator();

    orchestrator
        .run(
            &launcher_request("internal")
                .with_prefix("staging/")
                .with_platforms(vec![Platform::Linux]),
        )
        .await
        .unwrap();

    assert_eq!(
        release.calls(),
        [
            Call::Download("internal/config.json".to_string()),
            Call::Upload("staging/internal/v7/launcher/c2/Linux.tar.gz".to_string()),
            Call::Upload("staging/internal/config.json".to_string()),
        ]
    );
}
