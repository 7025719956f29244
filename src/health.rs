//! Storage statistics and consistency checks over an engine's file tree.
//!
//! Both walk `chunks/YYYY/MM/DD/` directly rather than going through the trait
//! caches, so they see exactly what is on disk. Call [`Engine::save`] first to
//! include unsaved changes.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::model::chunk::Chunk;
use crate::model::context::RESOURCES_DIR;
use crate::model::note::Note;
use crate::store::archive::Archive;
use crate::store::persistent::STORE_EXTENSION;

/// Counts over the whole storage tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub chunks: usize,
    pub archive_files: usize,
    /// Distinct (trait, item) histories.
    pub histories: usize,
    pub entries: usize,
    pub tombstones: usize,
    pub resources: usize,
    pub bytes: u64,
    pub oldest_chunk: Option<String>,
    pub newest_chunk: Option<String>,
}

/// Result of [`check_storage`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub files_checked: usize,
    pub problems: Vec<Problem>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.problems.is_empty()
    }

    fn problem(&mut self, path: impl Into<PathBuf>, detail: impl Into<String>) {
        self.problems.push(Problem {
            path: path.into(),
            detail: detail.into(),
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub path: PathBuf,
    pub detail: String,
}

struct ChunkDir {
    chunk: Chunk,
    path: PathBuf,
}

/// Gathers [`StorageStats`] for the engine's root.
pub fn storage_stats(engine: &Engine) -> Result<StorageStats> {
    let mut stats = StorageStats::default();
    let (chunks, _) = chunk_dirs(&engine.context().chunks_root())?;

    for dir in &chunks {
        stats.chunks += 1;
        for path in files_with_extension(&dir.path, STORE_EXTENSION)? {
            stats.archive_files += 1;
            stats.bytes += file_len(&path)?;
            let archive = read_archive(&path)?;
            for (_, history) in archive.histories() {
                stats.histories += 1;
                stats.entries += history.len();
                stats.tombstones += history.iter().filter(|(_, value)| value.is_none()).count();
            }
        }

        let resources = dir.path.join(RESOURCES_DIR);
        for note_dir in subdirectories(&resources)? {
            for blob in list_dir(&note_dir)? {
                let is_blob = blob
                    .file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("blob-"));
                if is_blob {
                    stats.resources += 1;
                    stats.bytes += file_len(&blob)?;
                }
            }
        }
    }

    stats.oldest_chunk = chunks.first().map(|dir| dir.chunk.to_string());
    stats.newest_chunk = chunks.last().map(|dir| dir.chunk.to_string());
    Ok(stats)
}

/// Checks every archive file under the engine's root.
///
/// Flags unreadable files, archives of unknown traits, items filed under the
/// wrong chunk, entries older than their item or newer than the current note,
/// and leftover temporary files from interrupted writes.
pub fn check_storage(engine: &Engine) -> Result<HealthReport> {
    let mut report = HealthReport::default();
    let traits = engine.trait_names();
    let current = engine.note();

    let (chunks, strays) = chunk_dirs(&engine.context().chunks_root())?;
    for path in strays {
        report.problem(path, "not a YYYY/MM/DD chunk directory");
    }

    for dir in &chunks {
        for path in list_dir(&dir.path)? {
            if path.is_dir() {
                continue;
            }
            match path.extension().and_then(|ext| ext.to_str()) {
                Some(STORE_EXTENSION) => {}
                Some("tmp") => {
                    report.problem(&path, "leftover temporary file from an interrupted write");
                    continue;
                }
                _ => {
                    report.problem(&path, "unexpected file in chunk directory");
                    continue;
                }
            }

            report.files_checked += 1;
            let trait_name = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or_default();
            if !traits.contains(&trait_name) {
                report.problem(&path, format!("archive for unknown trait `{trait_name}`"));
            }

            let archive = match read_archive(&path) {
                Ok(archive) => archive,
                Err(err) => {
                    report.problem(&path, err.to_string());
                    continue;
                }
            };
            check_archive(&mut report, engine, dir, &path, &archive, current);
        }
    }

    Ok(report)
}

fn check_archive(
    report: &mut HealthReport,
    engine: &Engine,
    dir: &ChunkDir,
    path: &Path,
    archive: &Archive,
    current: Note,
) {
    for (item, history) in archive.histories() {
        match engine.context().chunk(*item) {
            Ok(chunk) if chunk == dir.chunk => {}
            Ok(chunk) => report.problem(path, format!("item {item} belongs in chunk {chunk}")),
            Err(err) => report.problem(path, err.to_string()),
        }

        if let Some((first, _)) = history.first() {
            if first < item {
                report.problem(path, format!("item {item} has an entry at {first}, before it existed"));
            }
        }
        if let Some((last, _)) = history.last() {
            if *last > current {
                report.problem(
                    path,
                    format!("item {item} has an entry at {last}, after the current note {current}"),
                );
            }
        }
    }
}

fn read_archive(path: &Path) -> Result<Archive> {
    let contents = std::fs::read_to_string(path).map_err(|err| Error::io(path, err))?;
    serde_json::from_str(&contents).map_err(|source| Error::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Chunk directories in date order, plus anything that does not parse as one.
fn chunk_dirs(chunks_root: &Path) -> Result<(Vec<ChunkDir>, Vec<PathBuf>)> {
    let mut chunks = Vec::new();
    let mut strays = Vec::new();

    for year in subdirectories(chunks_root)? {
        for month in subdirectories(&year)? {
            for day in subdirectories(&month)? {
                let segments: Vec<&str> = [&year, &month, &day]
                    .into_iter()
                    .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
                    .collect();
                // Only zero-padded names count, so each chunk has exactly one directory.
                let chunk = segments
                    .join("-")
                    .parse::<Chunk>()
                    .ok()
                    .filter(|chunk| chunk.segments().iter().map(String::as_str).eq(segments.iter().copied()));
                match chunk {
                    Some(chunk) => chunks.push(ChunkDir { chunk, path: day }),
                    None => strays.push(day),
                }
            }
        }
    }

    chunks.sort_by_key(|dir| dir.chunk);
    Ok((chunks, strays))
}

fn list_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(Error::io(path, err)),
    };
    let mut paths = entries
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|err| Error::io(path, err))?;
    paths.sort();
    Ok(paths)
}

fn subdirectories(path: &Path) -> Result<Vec<PathBuf>> {
    Ok(list_dir(path)?.into_iter().filter(|path| path.is_dir()).collect())
}

fn files_with_extension(path: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    Ok(list_dir(path)?
        .into_iter()
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == extension))
        .collect())
}

fn file_len(path: &Path) -> Result<u64> {
    std::fs::metadata(path)
        .map(|metadata| metadata.len())
        .map_err(|err| Error::io(path, err))
}
