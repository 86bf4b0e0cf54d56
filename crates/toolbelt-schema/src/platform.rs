//! Target platforms and their archive layout.
//!
//! Every platform-dependent literal lives in [`PLATFORMS`]: distribution file
//! names, CI artifact keys, source and distribution archive formats, and the
//! location of the launcher's `config.json` inside an extracted tree. Archive
//! handling and config patching both consult this table instead of matching
//! strings on their own.
//!
//! # Example
//!
//! ```
//! use toolbelt_schema::{ArchiveFormat, Platform};
//!
//! let mac = Platform::MacOs;
//! assert_eq!(mac.dist_file_name(), "macOS.tar.gz");
//! assert_eq!(mac.spec().dist_format, ArchiveFormat::TarGz);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A file name, extension or platform/format pairing outside the fixed table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported artifact format: {0}")]
pub struct UnsupportedFormat(pub String);

/// Archive container formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFormat {
    /// Zip archive (`.zip`).
    Zip,
    /// Gzip-compressed tar archive (`.tar.gz` / `.tgz`).
    #[serde(rename = "tar.gz")]
    TarGz,
    /// 7z archive. Read-only: never produced as a distribution format.
    #[serde(rename = "7z")]
    SevenZ,
}

impl ArchiveFormat {
    /// Canonical file extension, without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
            Self::SevenZ => "7z",
        }
    }

    /// Whether archives of this format can be written.
    pub fn is_writable(self) -> bool {
        !matches!(self, Self::SevenZ)
    }

    /// Detect the format from a file name's extension (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedFormat`] for any extension outside the enumeration.
    pub fn from_path(path: &Path) -> Result<Self, UnsupportedFormat> {
        let name = path.to_string_lossy().to_lowercase();

        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else if name.ends_with(".zip") {
            Ok(Self::Zip)
        } else if name.ends_with(".7z") {
            Ok(Self::SevenZ)
        } else {
            Err(UnsupportedFormat(path.display().to_string()))
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Operating systems the client is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    /// Windows (x64).
    Windows,
    /// macOS (universal app bundle).
    #[serde(rename = "macOS")]
    MacOs,
    /// Linux (x64).
    Linux,
}

/// Static layout facts for one [`Platform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformSpec {
    /// The platform this row describes.
    pub platform: Platform,
    /// Directory name the archive is extracted into, and the leading
    /// component of [`launcher_config_path`](Self::launcher_config_path).
    pub os_name: &'static str,
    /// File name of the published archive.
    pub dist_file_name: &'static str,
    /// Name of the CI workflow artifact carrying the player build.
    pub ci_artifact_key: &'static str,
    /// Format of the player artifact as served by CI.
    pub player_source_format: ArchiveFormat,
    /// Format of the launcher artifact in the artifact bucket. The Windows
    /// launcher is a 7z stream despite its `.zip` name.
    pub launcher_source_format: ArchiveFormat,
    /// Format of the published archive.
    pub dist_format: ArchiveFormat,
    /// Launcher `config.json`, relative to the scratch root.
    pub launcher_config_path: &'static str,
}

/// The fixed platform table, in publishing order.
pub static PLATFORMS: [PlatformSpec; 3] = [
    PlatformSpec {
        platform: Platform::Windows,
        os_name: "Windows",
        dist_file_name: "Windows.zip",
        ci_artifact_key: "Windows",
        player_source_format: ArchiveFormat::Zip,
        launcher_source_format: ArchiveFormat::SevenZ,
        dist_format: ArchiveFormat::Zip,
        launcher_config_path: "Windows/resources/app/config.json",
    },
    PlatformSpec {
        platform: Platform::MacOs,
        os_name: "macOS",
        dist_file_name: "macOS.tar.gz",
        ci_artifact_key: "OSX",
        player_source_format: ArchiveFormat::Zip,
        launcher_source_format: ArchiveFormat::TarGz,
        dist_format: ArchiveFormat::TarGz,
        launcher_config_path: "macOS/Nine Chronicles.app/Contents/Resources/app/config.json",
    },
    PlatformSpec {
        platform: Platform::Linux,
        os_name: "Linux",
        dist_file_name: "Linux.tar.gz",
        ci_artifact_key: "Linux",
        player_source_format: ArchiveFormat::Zip,
        launcher_source_format: ArchiveFormat::TarGz,
        dist_format: ArchiveFormat::TarGz,
        launcher_config_path: "Linux/resources/app/config.json",
    },
];

impl Platform {
    /// All platforms, in publishing order.
    pub const ALL: [Platform; 3] = [Self::Windows, Self::MacOs, Self::Linux];

    /// Table row for this platform.
    pub fn spec(self) -> &'static PlatformSpec {
        match self {
            Self::Windows => &PLATFORMS[0],
            Self::MacOs => &PLATFORMS[1],
            Self::Linux => &PLATFORMS[2],
        }
    }

    /// Display name, also used as the extraction directory name.
    pub fn as_str(self) -> &'static str {
        self.spec().os_name
    }

    /// File name of the published archive (e.g. `macOS.tar.gz`).
    pub fn dist_file_name(self) -> &'static str {
        self.spec().dist_file_name
    }

    /// Look up the platform whose distribution file name is exactly `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`UnsupportedFormat`] when no row matches, including known
    /// platforms paired with the wrong extension (`Windows.tar.gz`).
    pub fn from_file_name(file_name: &str) -> Result<Self, UnsupportedFormat> {
        PLATFORMS
            .iter()
            .find(|row| row.dist_file_name == file_name)
            .map(|row| row.platform)
            .ok_or_else(|| UnsupportedFormat(file_name.to_string()))
    }
}

/// Launcher config location for a distribution file name such as `Linux.tar.gz`.
///
/// Pure table lookup; never touches the filesystem.
///
/// # Errors
///
/// Returns [`UnsupportedFormat`] if the name is not in the platform table.
pub fn launcher_config_path(file_name: &str) -> Result<&'static str, UnsupportedFormat> {
    Platform::from_file_name(file_name).map(|p| p.spec().launcher_config_path)
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "win" => Ok(Self::Windows),
            "macos" | "osx" | "mac" => Ok(Self::MacOs),
            "linux" => Ok(Self::Linux),
            _ => Err(format!("Unknown platform: {s}")),
        }
    }
}
