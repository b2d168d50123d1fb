//! Zip archives of rendered sites for download.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use schoolsite_core::error::CoreError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PipelineResult;

/// Zip the contents of `root` (not `root` itself) into memory.
///
/// Runs the filesystem walk and compression on the blocking pool.
pub async fn zip_directory(root: PathBuf) -> PipelineResult<Vec<u8>> {
    tokio::task::spawn_blocking(move || zip_directory_sync(&root))
        .await
        .map_err(|e| CoreError::Internal(format!("Archive task failed: {e}")))?
}

fn zip_directory_sync(root: &Path) -> PipelineResult<Vec<u8>> {
    if !root.is_dir() {
        return Err(CoreError::Storage(format!(
            "Build output '{}' does not exist",
            root.display()
        ))
        .into());
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    files.sort();

    for path in files {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, options).map_err(zip_error)?;
        writer.write_all(&std::fs::read(&path)?)?;
    }

    let cursor = writer.finish().map_err(zip_error)?;
    Ok(cursor.into_inner())
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), out)?;
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
    Ok(())
}

fn zip_error(e: zip::result::ZipError) -> CoreError {
    CoreError::Internal(format!("Failed to write archive: {e}"))
}
