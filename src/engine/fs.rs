//! Filesystem Collaborator
//!
//! Every mutation the engine performs on the stage folders goes through
//! [`DriverFs`], so tests can substitute a faulty implementation.

use regex::Regex;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// A regular file seen by a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub len: u64,
}

pub trait DriverFs: Send + Sync {
    /// Regular files in `dir` whose name matches `pattern`. Symlinks are
    /// followed; a dangling one is skipped. A missing directory lists as
    /// empty, and a matching file removed mid-listing is left out.
    fn list_files(&self, dir: &Path, pattern: &Regex) -> io::Result<Vec<FileInfo>>;

    /// Move `src` to `dst`. Fails without touching either side when `dst`
    /// already exists.
    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Copy `src` to `dst`; `dst` either appears complete or not at all.
    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    /// SHA-256 of the file contents, lowercase hex
    fn digest(&self, path: &Path) -> io::Result<String>;
}

/// The real local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalFs {
    fn refuse_existing(dst: &Path) -> io::Result<()> {
        if dst.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", dst.display()),
            ));
        }
        Ok(())
    }

    fn ensure_parent(dst: &Path) -> io::Result<()> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl DriverFs for LocalFs {
    fn list_files(&self, dir: &Path, pattern: &Regex) -> io::Result<Vec<FileInfo>> {
        if !dir.exists() {
            return Ok(vec![]);
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            // Other vendors' files come and go while we iterate; only our
            // own names are looked at, and a vanished one is just absent.
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            let Some(name) = entry.file_name().to_str().map(String::from) else {
                continue;
            };
            if !pattern.is_match(&name) {
                continue;
            }

            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            if !metadata.is_file() {
                continue;
            }
            files.push(FileInfo {
                path,
                file_name: name,
                len: metadata.len(),
            });
        }
        Ok(files)
    }

    fn move_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        Self::refuse_existing(dst)?;
        Self::ensure_parent(dst)?;
        fs::rename(src, dst)
    }

    fn copy_file(&self, src: &Path, dst: &Path) -> io::Result<()> {
        Self::refuse_existing(dst)?;
        Self::ensure_parent(dst)?;

        // Copy beside the target, then rename into place
        let mut temp_name = dst.as_os_str().to_owned();
        temp_name.push(".partial");
        let temp_path = PathBuf::from(temp_name);

        if let Err(e) = fs::copy(src, &temp_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, dst) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn digest(&self, path: &Path) -> io::Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    }
}
