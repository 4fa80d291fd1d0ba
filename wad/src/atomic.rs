//! Crash-safe file replacement. Everything is written to a randomly named
//! sibling of the target first, and the target is only swapped out on
//! [`AtomicFileWriter::commit`].

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use log::{debug, warn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{Result, WadError};

const NAME_ALPHABET: &[u8; 69] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-+=~!@";
const SUFFIX_LEN: usize = 4;
const MAX_ATTEMPTS: usize = 16;

/// Resolve `.` and `..` without touching the filesystem
pub(crate) fn lexically_normal(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// The target path with a random suffix glued on
fn candidate_path(rng: &mut ChaCha8Rng, base: &Path) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| NAME_ALPHABET[rng.random_range(0..NAME_ALPHABET.len())] as char)
        .collect();
    name.push(suffix);
    PathBuf::from(name)
}

pub struct AtomicFileWriter {
    target: PathBuf,
    pending: Option<(PathBuf, File)>,
    rng: ChaCha8Rng,
}

impl AtomicFileWriter {
    pub fn new<P: Into<PathBuf>>(target: P) -> AtomicFileWriter {
        AtomicFileWriter {
            target: target.into(),
            pending: None,
            rng: ChaCha8Rng::from_rng(&mut rand::rng()),
        }
    }

    /// Same as [`AtomicFileWriter::new`] but with reproducible temp names
    pub fn with_seed<P: Into<PathBuf>>(target: P, seed: u64) -> AtomicFileWriter {
        AtomicFileWriter {
            target: target.into(),
            pending: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// The temp file currently being written, if open
    pub fn pending_path(&self) -> Option<&Path> {
        self.pending.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn is_open(&self) -> bool {
        self.pending.is_some()
    }

    /// Pick an unused name next to the target for the backup. `avoid` is
    /// skipped even though it may not exist any more.
    fn free_path(&mut self, avoid: Option<&Path>) -> Result<PathBuf> {
        let base = lexically_normal(&self.target);
        for _ in 0..MAX_ATTEMPTS {
            let path = candidate_path(&mut self.rng, &base);
            if Some(path.as_path()) == avoid {
                continue;
            }
            match fs::symlink_metadata(&path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(path),
                _ => debug!("Temp path {path:?} is taken"),
            }
        }
        Err(WadError::Collision(self.target.clone()))
    }

    /// Start a new transaction. A previous uncommitted one is abandoned.
    pub fn open(&mut self) -> Result<()> {
        self.abandon();

        let base = lexically_normal(&self.target);
        for _ in 0..MAX_ATTEMPTS {
            let path = candidate_path(&mut self.rng, &base);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    debug!("Writing {:?} through {path:?}", self.target);
                    self.pending = Some((path, file));
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("Temp path {path:?} is taken");
                }
                Err(e) => return Err(WadError::io(path, e)),
            }
        }
        Err(WadError::Collision(self.target.clone()))
    }

    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let Some((path, file)) = self.pending.as_mut() else {
            return Err(WadError::NotOpen(self.target.clone()));
        };
        file.write_all(bytes).map_err(|e| WadError::io(path.clone(), e))
    }

    /// Replace the target with what was written.
    ///
    /// The old target is moved to a backup name first and deleted once the
    /// new file is in place. If flushing or finding a backup name fails, the
    /// temp file is deleted and the target is untouched. If either rename
    /// fails the temp file is left where it is, and a moved-aside target is
    /// not moved back.
    pub fn commit(&mut self) -> Result<()> {
        let (pending, backup) = match self.prepare_commit() {
            Ok(paths) => paths,
            Err(e) => {
                self.abandon();
                return Err(e);
            }
        };
        // closes the temp file
        self.pending = None;

        let had_target = match fs::rename(&self.target, &backup) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(source) => {
                return Err(WadError::Backup {
                    target: self.target.clone(),
                    backup,
                    source,
                });
            }
        };

        fs::rename(&pending, &self.target).map_err(|source| WadError::Replace {
            target: self.target.clone(),
            pending,
            source,
        })?;

        if had_target {
            if let Err(e) = fs::remove_file(&backup) {
                warn!("Could not delete backup {backup:?}: {e}");
            }
        }
        Ok(())
    }

    /// Flush the temp file to disk and pick the backup name, returning both
    /// paths. The transaction stays open.
    fn prepare_commit(&mut self) -> Result<(PathBuf, PathBuf)> {
        let Some((pending, file)) = self.pending.as_mut() else {
            return Err(WadError::NotOpen(self.target.clone()));
        };
        file.flush()
            .and_then(|_| file.sync_all())
            .map_err(|e| WadError::io(pending.clone(), e))?;
        let pending = pending.clone();
        let backup = self.free_path(Some(&pending))?;
        Ok((pending, backup))
    }

    /// Throw away the temp file, leaving the target as it was
    pub fn abandon(&mut self) {
        if let Some((path, file)) = self.pending.take() {
            drop(file);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Could not delete temp file {path:?}: {e}");
            }
        }
    }
}

impl Drop for AtomicFileWriter {
    fn drop(&mut self) {
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dir_entries(dir: &Path) -> Vec<PathBuf> {
        let mut entries: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn normalises_paths() {
        assert_eq!(lexically_normal(Path::new("a/./b/../c")), Path::new("a/c"));
        assert_eq!(lexically_normal(Path::new("/x/../../y")), Path::new("/y"));
        assert_eq!(lexically_normal(Path::new("../a")), Path::new("../a"));
        assert_eq!(lexically_normal(Path::new("a/..")), Path::new("."));
    }

    #[test]
    fn dropped_unopened_writer_leaves_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("somefile.txt");
        drop(AtomicFileWriter::new(&path));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[test]
    fn write_needs_open() {
        let dir = tempdir().unwrap();
        let mut out = AtomicFileWriter::new(dir.path().join("somefile.txt"));
        assert!(matches!(out.write(b"Hello, world2!"), Err(WadError::NotOpen(_))));
        assert!(matches!(out.commit(), Err(WadError::NotOpen(_))));
    }

    #[test]
    fn commit_replaces_target() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("somefile.txt");

        let mut out = AtomicFileWriter::new(&path);
        out.open().unwrap();
        let pending = out.pending_path().unwrap().to_path_buf();
        assert_eq!(pending.parent(), Some(dir.path()));
        out.write(b"Hello, world2!").unwrap();
        out.write(b" more.").unwrap();
        assert!(!path.exists());
        out.commit().unwrap();
        assert!(!out.is_open());
        assert!(!pending.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, world2! more.");

        let mut out = AtomicFileWriter::new(&path);
        out.open().unwrap();
        out.write(b"New stuff!").unwrap();
        out.commit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "New stuff!");
        assert_eq!(dir_entries(dir.path()), vec![path]);
    }

    #[test]
    fn uncommitted_write_keeps_old_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("somefile.txt");
        fs::write(&path, "Hello, world2! more.").unwrap();

        let mut out = AtomicFileWriter::new(&path);
        out.open().unwrap();
        out.write(b"New stuff!").unwrap();
        out.abandon();
        assert!(!out.is_open());

        // reopen, and let drop clean up this time
        out.open().unwrap();
        out.write(b"Newer stuff!").unwrap();
        drop(out);

        assert_eq!(fs::read_to_string(&path).unwrap(), "Hello, world2! more.");
        assert_eq!(dir_entries(dir.path()), vec![path]);
    }

    #[test]
    fn gives_up_after_collisions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("busy.wad");

        // the same seed produces the same candidates, so occupy them all
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..MAX_ATTEMPTS {
            fs::write(candidate_path(&mut rng, &path), b"").unwrap();
        }

        let mut out = AtomicFileWriter::with_seed(&path, 7);
        let err = out.open().unwrap_err();
        assert!(matches!(err, WadError::Collision(_)));
        assert!(err.to_string().starts_with("failed writing after several attempts"));
        assert!(!out.is_open());
    }

    #[test]
    fn failed_commit_removes_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keep.wad");
        fs::write(&path, "old").unwrap();

        // the first name goes to the temp file, every backup name after it
        // is already taken
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let first = candidate_path(&mut rng, &path);
        for _ in 0..MAX_ATTEMPTS {
            fs::write(candidate_path(&mut rng, &path), b"").unwrap();
        }

        let mut out = AtomicFileWriter::with_seed(&path, 11);
        out.open().unwrap();
        assert_eq!(out.pending_path(), Some(first.as_path()));
        out.write(b"new").unwrap();

        assert!(matches!(out.commit(), Err(WadError::Collision(_))));
        assert!(!out.is_open());
        assert!(!first.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "old");
        assert_eq!(dir_entries(dir.path()).len(), 1 + MAX_ATTEMPTS);
    }
}
