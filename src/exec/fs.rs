// Copyright 2021 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Virtual file systems for script lookups.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

/// A virtual file system, giving the runner access to script sources.
///
/// For example, this could be a collection of in-memory files, or it could
/// be a thin wrapper around the local file system (or a subset of it).
pub trait FileSys: Send + Sync {
  /// Looks up the file with the given name.
  fn read_file(&self, file_name: &Path) -> io::Result<Arc<str>>;
}

/// The local file system.
///
/// A `Local` can specify a "working directory" (relative to which relative
/// paths are resolved) and a "required prefix", such that canonicalized paths
/// cannot escape a certain subset of the local file system. Files are read
/// at most once.
pub struct Local {
  files: Mutex<HashMap<PathBuf, Arc<str>>>,
  cwd: PathBuf,
  prefix: Option<PathBuf>,
}

impl Local {
  /// Creates a new `Local` with the current process's working directory as
  /// both the working directory and the prefix.
  pub fn new() -> io::Result<Self> {
    let cwd = env::current_dir()?;
    Ok(Self::with_options(cwd.clone(), Some(fs::canonicalize(cwd)?)))
  }

  /// Creates a new `Local` with the given working directory and prefix.
  pub fn with_options(cwd: PathBuf, prefix: Option<PathBuf>) -> Self {
    Local {
      files: Mutex::new(HashMap::new()),
      cwd,
      prefix,
    }
  }
}

impl FileSys for Local {
  fn read_file(&self, file_name: &Path) -> io::Result<Arc<str>> {
    let mut files = self.files.lock();
    if let Some(text) = files.get(file_name) {
      return Ok(text.clone());
    }

    let mut full_path = self.cwd.join(file_name);
    if let Some(prefix) = &self.prefix {
      full_path = fs::canonicalize(&full_path)?;
      if !full_path.starts_with(prefix) {
        return Err(io::Error::new(
          io::ErrorKind::PermissionDenied,
          "attempted to escape local filesystem prefix",
        ));
      }
    }

    let text: Arc<str> = fs::read_to_string(full_path)?.into();
    files.insert(file_name.to_path_buf(), text.clone());
    Ok(text)
  }
}

/// An in-memory file system.
#[derive(Default)]
pub struct Memory {
  files: HashMap<PathBuf, Arc<str>>,
}

impl Memory {
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a file.
  pub fn insert(&mut self, name: impl Into<PathBuf>, text: &str) {
    self.files.insert(name.into(), text.into());
  }
}

impl FileSys for Memory {
  fn read_file(&self, file_name: &Path) -> io::Result<Arc<str>> {
    self.files.get(file_name).cloned().ok_or_else(|| {
      io::Error::new(io::ErrorKind::NotFound, "no such in-memory file")
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn local_refuses_escapes() {
    let dir = env::temp_dir().join(format!("jexl-fs-{}", std::process::id()));
    let inner = dir.join("inner");
    fs::create_dir_all(&inner).unwrap();
    fs::write(dir.join("outside.jexl"), "1").unwrap();
    fs::write(inner.join("inside.jexl"), "2").unwrap();

    let prefix = fs::canonicalize(&inner).unwrap();
    let local = Local::with_options(inner.clone(), Some(prefix));
    assert_eq!(&*local.read_file(Path::new("inside.jexl")).unwrap(), "2");
    let err = local.read_file(Path::new("../outside.jexl")).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);

    fs::remove_dir_all(&dir).unwrap();
  }

  #[test]
  fn memory_lookup() {
    let mut mem = Memory::new();
    mem.insert("a.jexl", "1 + 1");
    assert_eq!(&*mem.read_file(Path::new("a.jexl")).unwrap(), "1 + 1");
    assert!(mem.read_file(Path::new("b.jexl")).is_err());
  }
}
