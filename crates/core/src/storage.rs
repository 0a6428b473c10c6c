// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable key-value storage boundary.
//!
//! The queue, the conflict archive, the entity cache and the connectivity
//! override all persist through [`KeyValueStore`]. Values are opaque strings
//! (JSON in practice).

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;

use crate::error::{Error, Result};

const LOCK_FILE_NAME: &str = ".lock";
const TEMP_SUFFIX: &str = ".tmp";

/// Key-value persistence used by the sync subsystem.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `None` if the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores a value, replacing any previous one.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store, lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

/// Directory-backed store: one file per key.
///
/// Writes land in a temp file that is fsynced and renamed over the target,
/// so a crash leaves either the old or the new value. An exclusive flock on
/// `.lock` serializes writers across processes (the debug CLI and a running
/// app may share a directory).
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(FileStore { dir: dir.to_path_buf() })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(encode_key(key)))
    }

    fn lock(&self) -> Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.dir.join(LOCK_FILE_NAME))?;
        file.lock_exclusive()?;
        Ok(file)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let lock = self.lock()?;

        let mut tmp_name = path.as_os_str().to_owned();
        tmp_name.push(TEMP_SUFFIX);
        let tmp_path = PathBuf::from(tmp_name);

        let mut file = File::create(&tmp_path)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, &path)?;

        let _ = FileExt::unlock(&lock);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let lock = self.lock()?;
        let result = match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        };
        let _ = FileExt::unlock(&lock);
        result
    }
}

/// Maps a key onto a file name: ASCII alphanumerics, `.`, `-` and `_` pass
/// through, every other byte becomes `%XX`.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' => out.push(byte as char),
            // A leading dot would hide the file and could collide with `.lock`.
            b'.' if !out.is_empty() => out.push('.'),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod tests;
