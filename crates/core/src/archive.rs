//! Per-iteration archive manager (`spec.md` §4.8, §4.8.A). Grounded in
//! `original_source/sources/LIFT/archiving.py`'s `archive_agent`/
//! `archive_tests`/`archive_reports`/`archive_suite`, with the Python
//! reference's pickle conversation format replaced by newline-delimited
//! JSON (`spec.md` §9's Design Notes explicitly calls for "a stable
//! schema", not pickling).

use std::fs::File;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use lift_provider::MessageItem;

use crate::paths::Paths;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteType {
    Fss,
    Lps,
}

impl SuiteType {
    fn marker_tag(self) -> &'static str {
        match self {
            SuiteType::Fss => "FSS",
            SuiteType::Lps => "LPS",
        }
    }

    fn staging_dir_name(self) -> &'static str {
        match self {
            SuiteType::Fss => "_FSS_new",
            SuiteType::Lps => "_LPS_new",
        }
    }

    fn final_dir_name(self) -> &'static str {
        match self {
            SuiteType::Fss => "_FSS_",
            SuiteType::Lps => "_LPS_",
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to serialize conversation entry: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("archive I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to write archive zip: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Writes one agent conversation as newline-delimited JSON to
/// `<archive>/conversations/{iteration:02}_{agent_name}.jsonl`.
pub fn archive_agent(
    paths: &Paths,
    iteration: u32,
    agent_name: &str,
    history: &[MessageItem],
) -> Result<(), ArchiveError> {
    std::fs::create_dir_all(&paths.conversation_archive)?;
    let dest = paths.conversation_archive.join(format!("{iteration:02}_{agent_name}.jsonl"));
    let mut file = File::create(dest)?;
    for item in history {
        let line = serde_json::to_string(item)?;
        writeln!(file, "{line}")?;
    }
    Ok(())
}

/// Zips `<project>/tests` (skipping `__pycache__`) to
/// `<archive>/tests_{NN}.zip`.
pub fn archive_tests(paths: &Paths, iteration: u32) -> Result<(), ArchiveError> {
    let dest = paths.archive.join(format!("tests_{iteration:02}.zip"));
    zip_dir(&paths.tests, &dest)
}

/// Zips `<project>/reports` to `<archive>/reports_{NN}.zip`, optionally
/// deleting the source directory afterwards so the next iteration starts
/// with a clean report tree.
pub fn archive_reports(paths: &Paths, iteration: u32, delete_after: bool) -> Result<(), ArchiveError> {
    let dest = paths.archive.join(format!("reports_{iteration:02}.zip"));
    zip_dir(&paths.reports, &dest)?;
    if delete_after && paths.reports.exists() {
        std::fs::remove_dir_all(&paths.reports)?;
        std::fs::create_dir_all(&paths.reports)?;
    }
    Ok(())
}

/// Stages the current `tests`/`reports` trees under a scratch directory and
/// atomically promotes it to `_FSS_`/`_LPS_`. FSS is written at most once
/// (a no-op if `_FSS_` already exists); LPS is replaced on every passing
/// iteration. Removing the old `_LPS_` before renaming the staged directory
/// into place leaves a documented race window (`spec.md` §5) where a reader
/// could observe neither.
pub fn archive_suite(paths: &Paths, suite_type: SuiteType, iteration: u32) -> Result<(), ArchiveError> {
    let final_dir = paths.archive.join(suite_type.final_dir_name());
    if suite_type == SuiteType::Fss && final_dir.exists() {
        return Ok(());
    }

    let staging_dir = paths.archive.join(suite_type.staging_dir_name());
    if staging_dir.exists() {
        std::fs::remove_dir_all(&staging_dir)?;
    }
    std::fs::create_dir_all(&staging_dir)?;

    copy_dir_recursive(&paths.tests, &staging_dir.join("tests"))?;
    copy_dir_recursive(&paths.reports, &staging_dir)?;
    File::create(staging_dir.join(format!("{}_{iteration}", suite_type.marker_tag())))?;

    if final_dir.exists() {
        std::fs::remove_dir_all(&final_dir)?;
    }
    std::fs::rename(&staging_dir, &final_dir)?;
    Ok(())
}

pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !src.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)?.flatten() {
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if from.is_dir() {
            copy_dir_recursive(&from, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }
    Ok(())
}

fn zip_dir(src_dir: &Path, dest_zip: &Path) -> Result<(), ArchiveError> {
    if let Some(parent) = dest_zip.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(dest_zip)?;
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    if src_dir.exists() {
        add_dir_entries(&mut writer, src_dir, src_dir, &options)?;
    }
    writer.finish()?;
    Ok(())
}

fn add_dir_entries(
    writer: &mut zip::ZipWriter<File>,
    root: &Path,
    dir: &Path,
    options: &zip::write::SimpleFileOptions,
) -> Result<(), ArchiveError> {
    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if path.file_name().and_then(|n| n.to_str()) == Some("__pycache__") {
            continue;
        }
        let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().replace('\\', "/");
        if path.is_dir() {
            writer.add_directory(format!("{rel}/"), *options)?;
            add_dir_entries(writer, root, &path, options)?;
        } else {
            writer.start_file(rel, *options)?;
            let bytes = std::fs::read(&path)?;
            writer.write_all(&bytes)?;
        }
    }
    Ok(())
}
