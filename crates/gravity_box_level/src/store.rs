use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::SystemTime,
};

use bevy::log::{info, warn};
use chrono::{DateTime, Utc};

use crate::{LevelFile, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The stored file already had identical content.
    Unchanged,
    Written(PathBuf),
}

/// Directory of level files, one file per level id.
///
/// Files are never rewritten in place: a save that changes a level deletes the
/// previous file for that id and writes a new, timestamp-named one.
#[derive(Debug, Clone)]
pub struct LevelStore {
    dir: PathBuf,
}

impl LevelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every parseable level file in the directory, ordered by file name.
    /// A missing directory is an empty store.
    pub fn list(&self) -> Result<Vec<(PathBuf, LevelFile)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut paths = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut levels = Vec::with_capacity(paths.len());
        for path in paths {
            let json = fs::read_to_string(&path)?;
            match LevelFile::from_json(&json) {
                Ok(level) => levels.push((path, level)),
                Err(err) => warn!("Skipping unreadable level file '{}': {err}", path.display()),
            }
        }
        Ok(levels)
    }

    pub fn find_file_for_id(&self, id: i32) -> Result<Option<PathBuf>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|(_, level)| level.id == id)
            .map(|(path, _)| path))
    }

    pub fn load(&self, id: i32) -> Result<Option<LevelFile>> {
        Ok(self
            .list()?
            .into_iter()
            .find(|(_, level)| level.id == id)
            .map(|(_, level)| level))
    }

    /// Writes `level` unless the stored file for its id already has the same
    /// content. `force` writes a new file regardless.
    pub fn save(&self, level: &LevelFile, force: bool) -> Result<SaveOutcome> {
        let json = level.to_pretty_json()?;

        if let Some(existing) = self.find_file_for_id(level.id)? {
            let old_json = fs::read_to_string(&existing)?;
            if !force && old_json == json {
                return Ok(SaveOutcome::Unchanged);
            }
            fs::remove_file(&existing)?;
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.new_file_path(SystemTime::now());
        fs::write(&path, &json)?;
        info!("Level {} saved to {}", level.id, path.display());
        Ok(SaveOutcome::Written(path))
    }

    fn new_file_path(&self, now: SystemTime) -> PathBuf {
        let stem = timestamp(now);
        let mut path = self.dir.join(format!("{stem}.json"));
        let mut suffix = 1;
        while path.exists() {
            path = self.dir.join(format!("{stem}-{suffix}.json"));
            suffix += 1;
        }
        path
    }
}

/// UTC timestamp usable as a file name, e.g. `2024-03-09 17-45-02.118`.
fn timestamp(now: SystemTime) -> String {
    DateTime::<Utc>::from(now)
        .format("%Y-%m-%d %H-%M-%S%.3f")
        .to_string()
}
