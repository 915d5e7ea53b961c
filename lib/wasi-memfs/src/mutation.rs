//! Operations that add, replace or remove directory entries.
//!
//! Each operation finishes every check before it touches the tree. A failed
//! call leaves nothing behind, timestamps included.

use crate::inode::InodeGuard;
use crate::path::ParsedPath;
use crate::walker::{PathWalker, ResolvedParent};
use crate::{FsError, Result};
use tracing::debug;

fn logged<T>(op: &'static str, path: &ParsedPath, result: Result<T>) -> Result<T> {
    result.inspect_err(|err| {
        debug!(op, %path, error = err.as_str(), "directory mutation rejected");
    })
}

fn insert_entry(dir: &InodeGuard, name: String, inode: InodeGuard) -> Result<()> {
    inode.set_parent(dir);
    dir.as_directory()
        .ok_or(FsError::NotADirectory)?
        .write()
        .insert(name, inode);
    dir.touch_modified();
    Ok(())
}

fn remove_entry(dir: &InodeGuard, name: &str) -> Result<InodeGuard> {
    let removed = dir
        .as_directory()
        .ok_or(FsError::NotADirectory)?
        .write()
        .remove(name)
        .ok_or(FsError::NotFound)?;
    dir.touch_modified();
    Ok(removed)
}

impl PathWalker {
    /// Creates an empty file or directory at `path`.
    pub fn create_entry(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        is_directory: bool,
    ) -> Result<InodeGuard> {
        logged("create_entry", path, self.try_create_entry(start, path, is_directory))
    }

    fn try_create_entry(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        is_directory: bool,
    ) -> Result<InodeGuard> {
        let ResolvedParent {
            dir,
            name,
            entry,
            had_trailing_slash,
        } = self.resolve_parent(start, path, true)?;
        if entry.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let inode = if is_directory {
            InodeGuard::new_directory(Vec::<(String, InodeGuard)>::new())?
        } else {
            if had_trailing_slash {
                return Err(FsError::IsADirectory);
            }
            InodeGuard::new_file(Vec::new())
        };
        insert_entry(&dir, name, inode.clone())?;
        Ok(inode)
    }

    /// Creates a symlink at `path` pointing at `target`.
    ///
    /// A path ending in `/` never creates anything: it reports what is
    /// already there instead.
    pub fn create_symlink(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        target: &str,
    ) -> Result<InodeGuard> {
        logged("create_symlink", path, self.try_create_symlink(start, path, target))
    }

    fn try_create_symlink(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        target: &str,
    ) -> Result<InodeGuard> {
        if target.contains('\0') || target.starts_with('/') {
            return Err(FsError::InvalidInput);
        }

        let parent = self.resolve_parent(start, path, true)?;
        if parent.had_trailing_slash {
            return Err(match self.resolve(start, path, true) {
                Ok(_) => FsError::AlreadyExists,
                Err(err) => err,
            });
        }
        if parent.entry.is_some() {
            return Err(FsError::AlreadyExists);
        }

        let symlink = InodeGuard::new_symlink(target)?;
        insert_entry(&parent.dir, parent.name, symlink.clone())?;
        Ok(symlink)
    }

    /// Inserts `inode` under `path`, sharing it with wherever else it is
    /// already linked.
    ///
    /// An existing entry is replaced when a file lands on a file, or a
    /// directory lands on an empty directory with `allow_dir` set. Linking
    /// a directory beneath itself is rejected.
    pub fn link(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        inode: &InodeGuard,
        allow_dir: bool,
    ) -> Result<()> {
        logged("link", path, self.try_link(start, path, inode, allow_dir))
    }

    fn try_link(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        inode: &InodeGuard,
        allow_dir: bool,
    ) -> Result<()> {
        if inode.is_dir() && !allow_dir {
            return Err(FsError::PermissionDenied);
        }

        let parent = self.resolve_parent(start, path, true)?;
        if let Some(existing) = &parent.entry {
            check_overwrite(inode, existing, allow_dir)?;
        }
        if inode.is_dir() && inode.reaches(&parent.dir) {
            return Err(FsError::InvalidInput);
        }

        insert_entry(&parent.dir, parent.name, inode.clone())
    }

    /// Removes whatever is at `path` and hands it back.
    pub fn unlink(&self, start: &InodeGuard, path: &ParsedPath) -> Result<InodeGuard> {
        logged("unlink", path, self.try_unlink(start, path))
    }

    fn try_unlink(&self, start: &InodeGuard, path: &ParsedPath) -> Result<InodeGuard> {
        let parent = self.resolve_parent(start, path, false)?;
        remove_entry(&parent.dir, &parent.name)
    }

    /// Removes a non-directory entry.
    pub fn unlink_file(&self, start: &InodeGuard, path: &ParsedPath) -> Result<InodeGuard> {
        logged("unlink_file", path, self.try_unlink_file(start, path))
    }

    fn try_unlink_file(&self, start: &InodeGuard, path: &ParsedPath) -> Result<InodeGuard> {
        let parent = self.resolve_parent(start, path, false)?;
        let entry = parent.entry.ok_or(FsError::NotFound)?;
        if entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        if parent.had_trailing_slash {
            return Err(FsError::NotADirectory);
        }
        remove_entry(&parent.dir, &parent.name)
    }

    /// Removes an empty directory.
    pub fn remove_directory(&self, start: &InodeGuard, path: &ParsedPath) -> Result<()> {
        logged("remove_directory", path, self.try_remove_directory(start, path))
    }

    fn try_remove_directory(&self, start: &InodeGuard, path: &ParsedPath) -> Result<()> {
        let parent = self.resolve_parent(start, path, false)?;
        let entry = parent.entry.ok_or(FsError::NotFound)?;
        let directory = entry.as_directory().ok_or(FsError::NotADirectory)?;
        if !directory.read().is_empty() {
            return Err(FsError::DirectoryNotEmpty);
        }
        remove_entry(&parent.dir, &parent.name).map(|_| ())
    }

    /// Moves the entry at `old_path` to `new_path`, which may live under a
    /// different directory.
    ///
    /// The destination follows [`PathWalker::link`] rules with directories
    /// allowed, and is checked before the source is detached. Renaming an
    /// entry onto itself changes nothing.
    pub fn rename(
        &self,
        old_start: &InodeGuard,
        old_path: &ParsedPath,
        new_start: &InodeGuard,
        new_path: &ParsedPath,
    ) -> Result<()> {
        logged(
            "rename",
            old_path,
            self.try_rename(old_start, old_path, new_start, new_path),
        )
    }

    fn try_rename(
        &self,
        old_start: &InodeGuard,
        old_path: &ParsedPath,
        new_start: &InodeGuard,
        new_path: &ParsedPath,
    ) -> Result<()> {
        let source = self.resolve_parent(old_start, old_path, false)?;
        let inode = source.entry.clone().ok_or(FsError::NotFound)?;
        let target = self.resolve_parent(new_start, new_path, true)?;
        if target.dir.ptr_eq(&source.dir) && target.name == source.name {
            return Ok(());
        }

        if let Some(existing) = &target.entry {
            check_overwrite(&inode, existing, true)?;
        }
        if inode.is_dir() && inode.reaches(&target.dir) {
            return Err(FsError::InvalidInput);
        }

        remove_entry(&source.dir, &source.name)?;
        insert_entry(&target.dir, target.name, inode)
    }
}

fn check_overwrite(source: &InodeGuard, existing: &InodeGuard, allow_dir: bool) -> Result<()> {
    match (source.is_dir(), existing.as_directory()) {
        (true, Some(directory)) => {
            if !directory.read().is_empty() {
                Err(FsError::DirectoryNotEmpty)
            } else if allow_dir {
                Ok(())
            } else {
                Err(FsError::AlreadyExists)
            }
        }
        (true, None) if existing.as_file().is_some() => Err(FsError::NotADirectory),
        (false, Some(_)) if source.as_file().is_some() => Err(FsError::IsADirectory),
        (false, None) if source.as_file().is_some() && existing.as_file().is_some() => Ok(()),
        _ => Err(FsError::AlreadyExists),
    }
}
