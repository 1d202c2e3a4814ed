use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// JSON document persisted with write-temp-then-rename so readers never see
/// a partially written file and multi-record writes land atomically.
pub struct StateFile {
  path: PathBuf,
}

impl StateFile {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Load the document, or the default value if the file does not exist yet.
  pub fn load<T: DeserializeOwned + Default>(&self) -> io::Result<T> {
    if !self.path.exists() {
      return Ok(T::default());
    }
    let s = fs::read_to_string(&self.path)?;
    serde_json::from_str(&s).map_err(io::Error::other)
  }

  pub fn save<T: Serialize>(&self, value: &T) -> io::Result<()> {
    if let Some(parent) = self.path.parent() {
      fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    let tmp = self.path.with_extension("tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, &self.path)
  }
}
