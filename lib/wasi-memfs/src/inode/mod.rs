//! Files, directories and symlinks.
//!
//! An inode is shared through an [`InodeGuard`]: the directory entry that
//! names it and every handle opened on it hold the same `Arc`, so a hard
//! link is just a second entry holding a clone. A directory points back at
//! its parent through an [`InodeWeakGuard`], which never keeps the parent
//! alive and is never used to decide ownership.

mod dir;
mod file;

pub use dir::Directory;
pub use file::File;

use crate::types::{Dirent, Filestat, Filetype, Fstflags, Inode, Timestamp};
use crate::{FsError, Result};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{SystemTime, UNIX_EPOCH};

/// Inode number of a root directory. Never handed out by [`next_ino`].
pub const ROOT_INO: Inode = 0;

static NEXT_INO: AtomicU64 = AtomicU64::new(ROOT_INO + 1);

fn next_ino() -> Inode {
    NEXT_INO.fetch_add(1, Ordering::Relaxed)
}

/// Nanoseconds since the UNIX epoch.
pub(crate) fn time() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| Timestamp::try_from(d.as_nanos()).unwrap_or(Timestamp::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamps {
    pub accessed: Timestamp,
    pub modified: Timestamp,
    pub changed: Timestamp,
}

impl Timestamps {
    fn now() -> Self {
        let now = time();
        Self {
            accessed: now,
            modified: now,
            changed: now,
        }
    }
}

#[derive(Debug)]
pub struct Symlink {
    target: String,
}

impl Symlink {
    pub fn target(&self) -> &str {
        &self.target
    }
}

#[derive(Debug)]
pub enum Kind {
    File(RwLock<File>),
    Directory(RwLock<Directory>),
    Symlink(Symlink),
}

#[derive(Debug)]
pub struct InodeVal {
    ino: Inode,
    times: RwLock<Timestamps>,
    kind: Kind,
}

/// Owning handle to an inode.
#[derive(Debug, Clone)]
pub struct InodeGuard {
    inner: Arc<InodeVal>,
}

/// Non-owning handle to an inode, used for directory parent links.
#[derive(Debug, Clone, Default)]
pub struct InodeWeakGuard {
    inner: Weak<InodeVal>,
}

impl InodeWeakGuard {
    pub fn upgrade(&self) -> Option<InodeGuard> {
        self.inner.upgrade().map(|inner| InodeGuard { inner })
    }
}

impl InodeGuard {
    fn with_ino(ino: Inode, kind: Kind) -> Self {
        Self {
            inner: Arc::new(InodeVal {
                ino,
                times: RwLock::new(Timestamps::now()),
                kind,
            }),
        }
    }

    fn new(kind: Kind) -> Self {
        Self::with_ino(next_ino(), kind)
    }

    pub fn new_file(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Kind::File(RwLock::new(File::new(bytes.into(), false))))
    }

    pub fn new_readonly_file(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(Kind::File(RwLock::new(File::new(bytes.into(), true))))
    }

    /// Builds a directory holding `entries`, in iteration order. Child
    /// directories are re-parented onto the new directory.
    pub fn new_directory<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, InodeGuard)>,
        S: Into<String>,
    {
        Self::directory_with_ino(next_ino(), entries)
    }

    /// Like [`InodeGuard::new_directory`], but the directory gets the
    /// reserved root inode number.
    pub fn new_root_directory<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, InodeGuard)>,
        S: Into<String>,
    {
        Self::directory_with_ino(ROOT_INO, entries)
    }

    fn directory_with_ino<I, S>(ino: Inode, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, InodeGuard)>,
        S: Into<String>,
    {
        let mut directory = Directory::default();
        for (name, inode) in entries {
            let name = name.into();
            if !is_valid_name(&name) {
                return Err(FsError::InvalidInput);
            }
            directory.insert(name, inode);
        }
        let dir = Self::with_ino(ino, Kind::Directory(RwLock::new(directory)));
        if let Some(directory) = dir.as_directory() {
            for child in directory.read().entries() {
                child.set_parent(&dir);
            }
        }
        Ok(dir)
    }

    /// Symlink targets are relative and NUL-free, so following one can
    /// never leave the tree it lives in.
    pub fn new_symlink(target: impl Into<String>) -> Result<Self> {
        let target = target.into();
        if target.contains('\0') || target.starts_with('/') {
            return Err(FsError::InvalidInput);
        }
        Ok(Self::new(Kind::Symlink(Symlink { target })))
    }

    pub fn ino(&self) -> Inode {
        self.inner.ino
    }

    pub fn kind(&self) -> &Kind {
        &self.inner.kind
    }

    pub fn filetype(&self) -> Filetype {
        match self.kind() {
            Kind::File(_) => Filetype::RegularFile,
            Kind::Directory(_) => Filetype::Directory,
            Kind::Symlink(_) => Filetype::SymbolicLink,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind(), Kind::Directory(_))
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind(), Kind::Symlink(_))
    }

    pub fn as_file(&self) -> Option<&RwLock<File>> {
        match self.kind() {
            Kind::File(file) => Some(file),
            _ => None,
        }
    }

    pub fn as_directory(&self) -> Option<&RwLock<Directory>> {
        match self.kind() {
            Kind::Directory(directory) => Some(directory),
            _ => None,
        }
    }

    pub fn symlink_target(&self) -> Option<&str> {
        match self.kind() {
            Kind::Symlink(symlink) => Some(symlink.target()),
            _ => None,
        }
    }

    /// Two guards name the same inode.
    pub fn ptr_eq(&self, other: &InodeGuard) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn downgrade(&self) -> InodeWeakGuard {
        InodeWeakGuard {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// The parent of a directory; `None` for roots, unlinked orphans and
    /// non-directories.
    pub fn parent(&self) -> Option<InodeGuard> {
        self.as_directory()?.read().parent().upgrade()
    }

    /// Points a directory's back-reference at `parent`. No-op for other kinds.
    pub(crate) fn set_parent(&self, parent: &InodeGuard) {
        if let Some(directory) = self.as_directory() {
            directory.write().set_parent(parent.downgrade());
        }
    }

    /// True if `other` is `self` or sits anywhere beneath it, following
    /// directory contents rather than parent back-references. A directory
    /// linked under several names is visited once.
    pub(crate) fn reaches(&self, other: &InodeGuard) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![self.clone()];
        while let Some(current) = pending.pop() {
            if current.ptr_eq(other) {
                return true;
            }
            if !seen.insert(Arc::as_ptr(&current.inner)) {
                continue;
            }
            if let Some(directory) = current.as_directory() {
                pending.extend(directory.read().entries().filter(|e| e.is_dir()).cloned());
            }
        }
        false
    }

    pub fn times(&self) -> Timestamps {
        *self.inner.times.read()
    }

    /// Marks content as modified now.
    pub(crate) fn touch_modified(&self) {
        let now = time();
        let mut times = self.inner.times.write();
        times.modified = now;
        times.changed = now;
    }

    pub fn size(&self) -> u64 {
        match self.kind() {
            Kind::File(file) => file.read().len() as u64,
            Kind::Directory(_) => 0,
            Kind::Symlink(symlink) => symlink.target.len() as u64,
        }
    }

    pub fn stat(&self) -> Filestat {
        let times = self.times();
        Filestat {
            st_dev: 0,
            st_ino: self.ino(),
            st_filetype: self.filetype(),
            st_nlink: 1,
            st_size: self.size(),
            st_atim: times.accessed,
            st_mtim: times.modified,
            st_ctim: times.changed,
        }
    }

    /// Applies `fd_filestat_set_times` / `path_filestat_set_times` semantics.
    /// Asking for an explicit time and "now" for the same field is invalid.
    pub fn set_times(&self, atim: Timestamp, mtim: Timestamp, flags: Fstflags) -> Result<()> {
        if flags.contains(Fstflags::SET_ATIM | Fstflags::SET_ATIM_NOW)
            || flags.contains(Fstflags::SET_MTIM | Fstflags::SET_MTIM_NOW)
        {
            return Err(FsError::InvalidInput);
        }

        let now = time();
        let mut times = self.inner.times.write();
        if flags.contains(Fstflags::SET_ATIM) {
            times.accessed = atim;
        } else if flags.contains(Fstflags::SET_ATIM_NOW) {
            times.accessed = now;
        }
        if flags.contains(Fstflags::SET_MTIM) {
            times.modified = mtim;
        } else if flags.contains(Fstflags::SET_MTIM_NOW) {
            times.modified = now;
        }
        times.changed = now;
        Ok(())
    }

    pub fn readlink(&self) -> Result<String> {
        self.symlink_target()
            .map(str::to_string)
            .ok_or(FsError::InvalidInput)
    }

    /// Stateless directory enumeration.
    ///
    /// Cookie 0 is `.`, cookie 1 is `..` (the directory itself when it has
    /// no parent) and cookie `n >= 2` is entry `n - 2` in insertion order.
    /// Positions follow the current map order, so mutating the directory
    /// between calls can skip or repeat entries. `Ok(None)` marks the end.
    pub fn readdir_single(&self, cookie: u64) -> Result<Option<Dirent>> {
        let directory = self.as_directory().ok_or(FsError::NotADirectory)?.read();
        let dirent = match cookie {
            0 => Dirent {
                d_next: 1,
                d_ino: self.ino(),
                d_type: Filetype::Directory,
                name: ".".to_string(),
            },
            1 => Dirent {
                d_next: 2,
                d_ino: directory
                    .parent()
                    .upgrade()
                    .map(|parent| parent.ino())
                    .unwrap_or_else(|| self.ino()),
                d_type: Filetype::Directory,
                name: "..".to_string(),
            },
            _ => {
                let Ok(index) = usize::try_from(cookie - 2) else {
                    return Ok(None);
                };
                let Some((name, entry)) = directory.get_index(index) else {
                    return Ok(None);
                };
                Dirent {
                    d_next: cookie + 1,
                    d_ino: entry.ino(),
                    d_type: entry.filetype(),
                    name: name.to_string(),
                }
            }
        };
        Ok(Some(dirent))
    }
}

/// Entry names are non-empty, free of `/` and NUL, and never `.` or `..`.
pub(crate) fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn inode_numbers_are_unique_and_never_root() {
        let a = InodeGuard::new_file(Vec::new());
        let b = InodeGuard::new_file(Vec::new());
        assert_ne!(a.ino(), b.ino());
        assert_ne!(a.ino(), ROOT_INO);
        assert_ne!(b.ino(), ROOT_INO);
        assert!(b.ino() > a.ino());

        let root = InodeGuard::new_root_directory(Vec::<(String, InodeGuard)>::new()).unwrap();
        assert_eq!(root.ino(), ROOT_INO);
    }

    #[test]
    fn clock_reports_nanoseconds_since_epoch() {
        let first = time();
        assert!(first > 1_600_000_000_000_000_000);
        assert!(time() >= first);
    }

    #[test]
    fn new_directory_sets_parents() {
        let child = InodeGuard::new_directory(Vec::<(String, InodeGuard)>::new()).unwrap();
        let parent = InodeGuard::new_directory([("child", child.clone())]).unwrap();
        assert!(child.parent().unwrap().ptr_eq(&parent));
        assert!(parent.parent().is_none());
        assert!(parent.reaches(&child));
        assert!(parent.reaches(&parent));
        assert!(!child.reaches(&parent));
    }

    #[test]
    fn new_directory_rejects_bad_names() {
        let file = InodeGuard::new_file(Vec::new());
        assert_eq!(
            InodeGuard::new_directory([("a/b", file.clone())]).unwrap_err(),
            FsError::InvalidInput
        );
        assert_eq!(
            InodeGuard::new_directory([("", file)]).unwrap_err(),
            FsError::InvalidInput
        );
    }

    #[test]
    fn symlink_targets_must_be_relative() {
        assert_eq!(
            InodeGuard::new_symlink("/etc").unwrap_err(),
            FsError::InvalidInput
        );
        assert_eq!(
            InodeGuard::new_symlink("a\0b").unwrap_err(),
            FsError::InvalidInput
        );
        let link = InodeGuard::new_symlink("a/b").unwrap();
        assert_eq!(link.readlink().unwrap(), "a/b");
        assert_eq!(link.stat().st_filetype, Filetype::SymbolicLink);
        assert_eq!(
            InodeGuard::new_file(Vec::new()).readlink().unwrap_err(),
            FsError::InvalidInput
        );
    }

    #[test]
    fn stat_reports_size_and_link_count() {
        let file = InodeGuard::new_file(b"hello".to_vec());
        let stat = file.stat();
        assert_eq!(stat.st_size, 5);
        assert_eq!(stat.st_nlink, 1);
        assert_eq!(stat.st_filetype, Filetype::RegularFile);
        assert_eq!(stat.st_ino, file.ino());
    }

    #[test]
    fn set_times_rejects_conflicting_flags() {
        let file = InodeGuard::new_file(Vec::new());
        assert_eq!(
            file.set_times(1, 2, Fstflags::SET_ATIM | Fstflags::SET_ATIM_NOW),
            Err(FsError::InvalidInput)
        );
        assert_eq!(
            file.set_times(1, 2, Fstflags::SET_MTIM | Fstflags::SET_MTIM_NOW),
            Err(FsError::InvalidInput)
        );
        file.set_times(11, 22, Fstflags::SET_ATIM | Fstflags::SET_MTIM)
            .unwrap();
        let stat = file.stat();
        assert_eq!(stat.st_atim, 11);
        assert_eq!(stat.st_mtim, 22);
    }

    #[test]
    fn readdir_enumerates_dot_entries_then_insertion_order() {
        let b = InodeGuard::new_file(Vec::new());
        let a = InodeGuard::new_file(Vec::new());
        let dir = InodeGuard::new_directory([("b", b.clone()), ("a", a.clone())]).unwrap();
        let root = InodeGuard::new_root_directory([("dir", dir.clone())]).unwrap();

        let mut names = Vec::new();
        let mut cookie = 0;
        while let Some(dirent) = dir.readdir_single(cookie).unwrap() {
            names.push((dirent.name.clone(), dirent.d_ino));
            cookie = dirent.d_next;
        }
        assert_eq!(
            names,
            vec![
                (".".to_string(), dir.ino()),
                ("..".to_string(), root.ino()),
                ("b".to_string(), b.ino()),
                ("a".to_string(), a.ino()),
            ]
        );
        assert_eq!(dir.readdir_single(4).unwrap(), None);
        assert_eq!(dir.readdir_single(u64::MAX).unwrap(), None);
    }

    #[test]
    fn readdir_dotdot_of_root_is_itself() {
        let root = InodeGuard::new_root_directory(Vec::<(String, InodeGuard)>::new()).unwrap();
        let dotdot = root.readdir_single(1).unwrap().unwrap();
        assert_eq!(dotdot.d_ino, root.ino());
        assert_eq!(
            InodeGuard::new_file(Vec::new()).readdir_single(0),
            Err(FsError::NotADirectory)
        );
    }
}
