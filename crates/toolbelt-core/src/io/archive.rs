//! Archive codec
//!
//! Extracts zip, tar.gz and 7z archives, and writes zip and tar.gz archives
//! from a directory tree. Archive member names are always relative to the
//! tree root, so an archive written by [`compress`] unpacks into the same
//! layout its source had.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;
use toolbelt_schema::{ArchiveFormat, UnsupportedFormat};
use walkdir::WalkDir;
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error("Corrupt archive {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> ArchiveError {
    ArchiveError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Information about an extracted file
#[derive(Debug, Clone)]
pub struct ExtractedFile {
    /// Path relative to extraction root
    pub relative_path: PathBuf,
    /// Absolute path on disk
    pub absolute_path: PathBuf,
    /// Whether this is an executable
    pub is_executable: bool,
}

/// Extract an archive of a known format into `dest_dir`.
///
/// Any failure to open or fully read the archive is reported as
/// [`ArchiveError::Corrupt`].
pub fn extract(
    archive_path: &Path,
    dest_dir: &Path,
    format: ArchiveFormat,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    fs::create_dir_all(dest_dir)?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive_path, dest_dir),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, dest_dir),
        ArchiveFormat::SevenZ => extract_7z(archive_path, dest_dir),
    }
}

/// Extract a tar.gz archive to a destination directory
pub fn extract_tar_gz(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let file = File::open(archive_path).map_err(|e| corrupt(archive_path, e))?;
    let gz_decoder = GzDecoder::new(BufReader::new(file));

    extract_tar(gz_decoder, archive_path, dest_dir)
}

fn extract_tar<R: Read>(
    reader: R,
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);
    let mut extracted_files = Vec::new();

    for entry in archive.entries().map_err(|e| corrupt(archive_path, e))? {
        let mut entry = entry.map_err(|e| corrupt(archive_path, e))?;
        let relative_path = entry
            .path()
            .map_err(|e| corrupt(archive_path, e))?
            .into_owned();

        if !is_enclosed(&relative_path) {
            return Err(corrupt(
                archive_path,
                format!("entry escapes archive root: {}", relative_path.display()),
            ));
        }

        let is_dir = entry.header().entry_type().is_dir();
        let is_executable = entry
            .header()
            .mode()
            .map(|m| m & 0o111 != 0)
            .unwrap_or(false);

        // unpack_in resolves links against dest_dir and refuses escaping paths
        let unpacked = entry
            .unpack_in(dest_dir)
            .map_err(|e| corrupt(archive_path, e))?;
        if !unpacked {
            return Err(corrupt(
                archive_path,
                format!("entry escapes archive root: {}", relative_path.display()),
            ));
        }

        if is_dir {
            continue;
        }

        extracted_files.push(ExtractedFile {
            absolute_path: dest_dir.join(&relative_path),
            relative_path,
            is_executable,
        });
    }

    Ok(extracted_files)
}

/// Extract a zip archive
pub fn extract_zip(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let file = File::open(archive_path).map_err(|e| corrupt(archive_path, e))?;
    let mut archive = ZipArchive::new(BufReader::new(file)).map_err(|e| corrupt(archive_path, e))?;

    let mut extracted_files = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).map_err(|e| corrupt(archive_path, e))?;
        let Some(relative_path) = file.enclosed_name() else {
            return Err(corrupt(
                archive_path,
                format!("entry escapes archive root: {}", file.name()),
            ));
        };

        if file.is_dir() {
            fs::create_dir_all(dest_dir.join(&relative_path))?;
            continue;
        }

        let absolute_path = dest_dir.join(&relative_path);
        if let Some(p) = absolute_path.parent() {
            fs::create_dir_all(p)?;
        }

        let mut outfile = File::create(&absolute_path)?;
        io::copy(&mut file, &mut outfile).map_err(|e| corrupt(archive_path, e))?;

        #[cfg(unix)]
        let is_executable = if let Some(mode) = file.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&absolute_path, fs::Permissions::from_mode(mode))?;
            mode & 0o111 != 0
        } else {
            false
        };
        #[cfg(not(unix))]
        let is_executable = false;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path,
            is_executable,
        });
    }

    Ok(extracted_files)
}

/// Extract a 7z archive
///
/// Stops at the first entry whose name would land outside `dest_dir`.
pub fn extract_7z(
    archive_path: &Path,
    dest_dir: &Path,
) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let mut escaped = None;
    sevenz_rust::decompress_file_with_extract_fn(archive_path, dest_dir, |entry, reader, dest| {
        if !is_enclosed(Path::new(entry.name())) {
            escaped = Some(entry.name().to_string());
            return Ok(false);
        }
        sevenz_rust::default_entry_extract_fn(entry, reader, dest)
    })
    .map_err(|e| corrupt(archive_path, e))?;

    if let Some(name) = escaped {
        return Err(corrupt(
            archive_path,
            format!("entry '{name}' escapes the destination"),
        ));
    }
    list_files(dest_dir)
}

fn list_files(root: &Path) -> Result<Vec<ExtractedFile>, ArchiveError> {
    let mut extracted_files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_dir() {
            continue;
        }
        let relative_path = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?
            .to_path_buf();

        #[cfg(unix)]
        let is_executable = {
            use std::os::unix::fs::PermissionsExt;
            entry
                .metadata()
                .map(|m| m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        };
        #[cfg(not(unix))]
        let is_executable = false;

        extracted_files.push(ExtractedFile {
            relative_path,
            absolute_path: entry.path().to_path_buf(),
            is_executable,
        });
    }

    Ok(extracted_files)
}

fn is_enclosed(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Write the contents of `src_dir` into a new archive at `archive_path`.
///
/// Member names are relative to `src_dir`. Returns the number of file entries
/// written. 7z is read-only and rejected before anything touches the disk.
pub fn compress(
    src_dir: &Path,
    archive_path: &Path,
    format: ArchiveFormat,
) -> Result<usize, ArchiveError> {
    if !format.is_writable() {
        return Err(read_only(format));
    }
    if !src_dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("Source directory not found: {}", src_dir.display()),
        )
        .into());
    }

    match format {
        ArchiveFormat::Zip => compress_zip(src_dir, archive_path),
        ArchiveFormat::TarGz => compress_tar_gz(src_dir, archive_path),
        ArchiveFormat::SevenZ => Err(read_only(format)),
    }
}

fn read_only(format: ArchiveFormat) -> ArchiveError {
    UnsupportedFormat(format!("{format} (compression)")).into()
}

/// Relative path of a walked entry, with `/` separators.
fn member_name(src_dir: &Path, path: &Path) -> io::Result<String> {
    let relative = path.strip_prefix(src_dir).map_err(io::Error::other)?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    Ok(parts.join("/"))
}

fn compress_zip(src_dir: &Path, archive_path: &Path) -> Result<usize, ArchiveError> {
    let file = File::create(archive_path)?;
    let mut writer = zip::ZipWriter::new(BufWriter::new(file));
    let mut count = 0;

    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let name = member_name(src_dir, entry.path())?;
        let metadata = fs::metadata(entry.path())?;

        #[cfg(unix)]
        let mode = {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode()
        };
        #[cfg(not(unix))]
        let mode = if metadata.is_dir() { 0o755 } else { 0o644 };

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(mode)
            .large_file(metadata.len() >= u64::from(u32::MAX));

        if metadata.is_dir() {
            writer.add_directory(name, options)?;
            continue;
        }

        writer.start_file(name, options)?;
        let mut input = File::open(entry.path())?;
        io::copy(&mut input, &mut writer)?;
        count += 1;
    }

    writer.finish()?.flush()?;
    Ok(count)
}

fn compress_tar_gz(src_dir: &Path, archive_path: &Path) -> Result<usize, ArchiveError> {
    let file = File::create(archive_path)?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    // App bundles rely on symlinks (Frameworks/*/Versions/Current)
    builder.follow_symlinks(false);
    let mut count = 0;

    for entry in WalkDir::new(src_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        let name = member_name(src_dir, entry.path())?;

        if entry.file_type().is_dir() {
            builder.append_dir(&name, entry.path())?;
        } else {
            builder.append_path_with_name(entry.path(), &name)?;
            count += 1;
        }
    }

    builder.into_inner()?.finish()?.flush()?;
    Ok(count)
}
