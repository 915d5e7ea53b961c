use super::{Fd, OpenFile};
use crate::inode::InodeGuard;
use crate::path::ParsedPath;
use crate::types::{
    Dircookie, Dirent, Fdflags, Fdstat, Filestat, Filetype, Fstflags, LookupFlags, Oflags,
    Prestat, Rights, Timestamp,
};
use crate::walker::PathWalker;
use crate::{FsError, MemFsConfig, Result};
use std::sync::Arc;
use tracing::trace;

/// A directory handle. Every `path_*` operation resolves its path relative
/// to this directory and can never reach outside of it.
#[derive(Debug, Clone)]
pub struct OpenDirectory {
    inode: InodeGuard,
    config: Arc<MemFsConfig>,
}

impl OpenDirectory {
    pub fn new(inode: InodeGuard) -> Result<Self> {
        Self::with_config(inode, MemFsConfig::default())
    }

    pub fn with_config(inode: InodeGuard, config: MemFsConfig) -> Result<Self> {
        Self::from_parts(inode, Arc::new(config))
    }

    fn from_parts(inode: InodeGuard, config: Arc<MemFsConfig>) -> Result<Self> {
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(Self { inode, config })
    }

    pub fn inode(&self) -> &InodeGuard {
        &self.inode
    }

    pub fn config(&self) -> &MemFsConfig {
        &self.config
    }

    fn walker(&self) -> PathWalker {
        PathWalker::new(&self.config)
    }

    fn lookup(&self, path: &ParsedPath, flags: LookupFlags) -> Result<InodeGuard> {
        self.walker()
            .resolve(&self.inode, path, flags.contains(LookupFlags::SYMLINK_FOLLOW))
    }

    pub fn fdstat(&self) -> Fdstat {
        Fdstat {
            fs_filetype: Filetype::Directory,
            fs_flags: Fdflags::empty(),
            fs_rights_base: Rights::DIRECTORY_BASE,
            fs_rights_inheriting: Rights::DIRECTORY_INHERITING,
        }
    }

    pub fn stat(&self) -> Filestat {
        self.inode.stat()
    }

    pub fn set_times(&self, atim: Timestamp, mtim: Timestamp, flags: Fstflags) -> Result<()> {
        self.inode.set_times(atim, mtim, flags)
    }

    pub fn readdir_single(&self, cookie: Dircookie) -> Result<Option<Dirent>> {
        self.inode.readdir_single(cookie)
    }

    pub fn path_create_directory(&self, path: &str) -> Result<()> {
        let path = ParsedPath::parse(path)?;
        self.walker()
            .create_entry(&self.inode, &path, true)
            .map(|_| ())
    }

    pub fn path_filestat_get(&self, flags: LookupFlags, path: &str) -> Result<Filestat> {
        let path = ParsedPath::parse(path)?;
        Ok(self.lookup(&path, flags)?.stat())
    }

    pub fn path_filestat_set_times(
        &self,
        flags: LookupFlags,
        path: &str,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: Fstflags,
    ) -> Result<()> {
        let path = ParsedPath::parse(path)?;
        self.lookup(&path, flags)?.set_times(atim, mtim, fst_flags)
    }

    /// Links the entry at `old_path` (under this directory) as `new_path`
    /// under `new_dir`. Directories cannot be hard-linked.
    pub fn path_link(
        &self,
        old_flags: LookupFlags,
        old_path: &str,
        new_dir: &OpenDirectory,
        new_path: &str,
    ) -> Result<()> {
        let old_path = ParsedPath::parse(old_path)?;
        let new_path = ParsedPath::parse(new_path)?;
        let inode = self.lookup(&old_path, old_flags)?;
        new_dir.walker().link(&new_dir.inode, &new_path, &inode, false)
    }

    /// Resolves `path` to its inode, e.g. to link it somewhere else.
    pub fn path_lookup(&self, flags: LookupFlags, path: &str) -> Result<InodeGuard> {
        let path = ParsedPath::parse(path)?;
        self.lookup(&path, flags)
    }

    /// Opens `path`, creating it first if asked to.
    ///
    /// The final component is followed if `dirflags` asks for it or the
    /// path ends with `/`. A symlink that is left unfollowed cannot be
    /// opened.
    pub fn path_open(
        &self,
        dirflags: LookupFlags,
        path: &str,
        oflags: Oflags,
        fs_rights_base: Rights,
        _fs_rights_inheriting: Rights,
        fdflags: Fdflags,
    ) -> Result<Fd> {
        let parsed = ParsedPath::parse(path)?;
        let follow = dirflags.contains(LookupFlags::SYMLINK_FOLLOW) || parsed.is_dir();
        let walker = self.walker();

        let inode = match walker.resolve(&self.inode, &parsed, follow) {
            Ok(inode) => {
                if oflags.contains(Oflags::EXCL) {
                    return Err(FsError::AlreadyExists);
                }
                inode
            }
            Err(FsError::NotFound) if oflags.contains(Oflags::CREATE) => {
                walker.create_entry(&self.inode, &parsed, oflags.contains(Oflags::DIRECTORY))?
            }
            Err(err) => return Err(err),
        };

        if inode.is_symlink() {
            return Err(FsError::TooManySymlinks);
        }
        if oflags.contains(Oflags::DIRECTORY) && !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        trace!(%parsed, ino = inode.ino(), ?oflags, ?fdflags, "fd.path_open");

        if inode.is_dir() {
            if oflags.contains(Oflags::TRUNC) {
                return Err(FsError::IsADirectory);
            }
            return Ok(Fd::Directory(Self::from_parts(inode, self.config.clone())?));
        }
        Ok(Fd::File(OpenFile::open(inode, oflags, fs_rights_base, fdflags)?))
    }

    pub fn path_readlink(&self, path: &str) -> Result<String> {
        let path = ParsedPath::parse(path)?;
        self.lookup(&path, LookupFlags::empty())?.readlink()
    }

    pub fn path_remove_directory(&self, path: &str) -> Result<()> {
        let path = ParsedPath::parse(path)?;
        self.walker().remove_directory(&self.inode, &path)
    }

    pub fn path_rename(&self, old_path: &str, new_dir: &OpenDirectory, new_path: &str) -> Result<()> {
        let old_path = ParsedPath::parse(old_path)?;
        let new_path = ParsedPath::parse(new_path)?;
        self.walker()
            .rename(&self.inode, &old_path, &new_dir.inode, &new_path)
    }

    /// Creates a symlink at `new_path` whose target is `old_path`.
    pub fn path_symlink(&self, old_path: &str, new_path: &str) -> Result<()> {
        let new_path = ParsedPath::parse(new_path)?;
        self.walker()
            .create_symlink(&self.inode, &new_path, old_path)
            .map(|_| ())
    }

    pub fn path_unlink(&self, path: &str) -> Result<InodeGuard> {
        let path = ParsedPath::parse(path)?;
        self.walker().unlink(&self.inode, &path)
    }

    pub fn path_unlink_file(&self, path: &str) -> Result<()> {
        let path = ParsedPath::parse(path)?;
        self.walker().unlink_file(&self.inode, &path).map(|_| ())
    }
}

/// A directory handed to the guest at startup under a mount name.
#[derive(Debug, Clone)]
pub struct PreopenDirectory {
    dir: OpenDirectory,
    name: String,
}

impl PreopenDirectory {
    pub fn new(name: impl Into<String>, root: InodeGuard) -> Result<Self> {
        Self::with_config(name, root, MemFsConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        root: InodeGuard,
        config: MemFsConfig,
    ) -> Result<Self> {
        Ok(Self {
            dir: OpenDirectory::with_config(root, config)?,
            name: name.into(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &OpenDirectory {
        &self.dir
    }

    pub fn prestat(&self) -> Prestat {
        Prestat::Dir {
            pr_name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn preopen() -> PreopenDirectory {
        let root = InodeGuard::new_root_directory([
            ("hello.txt", InodeGuard::new_file(b"hi".to_vec())),
            ("ro.txt", InodeGuard::new_readonly_file(b"ro".to_vec())),
            ("link", InodeGuard::new_symlink("hello.txt").unwrap()),
        ])
        .unwrap();
        PreopenDirectory::new("/sandbox", root).unwrap()
    }

    fn open(dir: &OpenDirectory, flags: LookupFlags, path: &str, oflags: Oflags) -> Result<Fd> {
        dir.path_open(
            flags,
            path,
            oflags,
            Rights::REGULAR_FILE,
            Rights::empty(),
            Fdflags::empty(),
        )
    }

    #[test]
    fn preopen_requires_a_directory() {
        assert_eq!(
            PreopenDirectory::new("x", InodeGuard::new_file(Vec::new())).unwrap_err(),
            FsError::NotADirectory
        );
        let preopen = preopen();
        assert_eq!(preopen.prestat().pr_name_len(), 8);
        assert_eq!(preopen.dir().inode().ino(), crate::inode::ROOT_INO);
    }

    #[test]
    fn open_unfollowed_symlink_is_a_loop() {
        let preopen = preopen();
        let dir = preopen.dir();
        assert_eq!(
            open(dir, LookupFlags::empty(), "link", Oflags::empty()).unwrap_err(),
            FsError::TooManySymlinks
        );
        let fd = open(dir, LookupFlags::SYMLINK_FOLLOW, "link", Oflags::empty()).unwrap();
        assert!(matches!(fd, Fd::File(_)));
    }

    #[test]
    fn exclusive_create_leaves_tree_alone() {
        let preopen = preopen();
        let dir = preopen.dir();
        let before = dir.path_lookup(LookupFlags::empty(), "hello.txt").unwrap();
        assert_eq!(
            open(dir, LookupFlags::empty(), "hello.txt", Oflags::CREATE | Oflags::EXCL)
                .unwrap_err(),
            FsError::AlreadyExists
        );
        let after = dir.path_lookup(LookupFlags::empty(), "hello.txt").unwrap();
        assert!(before.ptr_eq(&after));
        assert_eq!(after.size(), 2);
    }

    #[test]
    fn create_flags() {
        let preopen = preopen();
        let dir = preopen.dir();
        assert_eq!(
            open(dir, LookupFlags::empty(), "new", Oflags::empty()).unwrap_err(),
            FsError::NotFound
        );
        let fd = open(dir, LookupFlags::empty(), "new", Oflags::CREATE).unwrap();
        assert!(matches!(fd, Fd::File(_)));
        let fd = open(
            dir,
            LookupFlags::empty(),
            "sub",
            Oflags::CREATE | Oflags::DIRECTORY,
        )
        .unwrap();
        assert!(matches!(fd, Fd::Directory(_)));
        assert_eq!(
            open(dir, LookupFlags::empty(), "hello.txt", Oflags::DIRECTORY).unwrap_err(),
            FsError::NotADirectory
        );
    }

    #[test]
    fn readonly_open_for_write_is_refused() {
        let preopen = preopen();
        assert_eq!(
            open(preopen.dir(), LookupFlags::empty(), "ro.txt", Oflags::empty()).unwrap_err(),
            FsError::PermissionDenied
        );
        let fd = preopen
            .dir()
            .path_open(
                LookupFlags::empty(),
                "ro.txt",
                Oflags::empty(),
                Rights::FD_READ,
                Rights::empty(),
                Fdflags::empty(),
            )
            .unwrap();
        assert!(matches!(fd, Fd::File(_)));
    }

    #[test]
    fn readlink_and_symlink() {
        let preopen = preopen();
        let dir = preopen.dir();
        assert_eq!(dir.path_readlink("link").unwrap(), "hello.txt");
        assert_eq!(
            dir.path_readlink("hello.txt").unwrap_err(),
            FsError::InvalidInput
        );
        dir.path_symlink("hello.txt", "again").unwrap();
        assert_eq!(dir.path_readlink("again").unwrap(), "hello.txt");
        assert_eq!(
            dir.path_symlink("/etc/passwd", "escape").unwrap_err(),
            FsError::InvalidInput
        );
    }

    #[test]
    fn path_link_refuses_directories() {
        let preopen = preopen();
        let dir = preopen.dir();
        dir.path_create_directory("d").unwrap();
        assert_eq!(
            dir.path_link(LookupFlags::empty(), "d", dir, "d2").unwrap_err(),
            FsError::PermissionDenied
        );
        dir.path_link(LookupFlags::empty(), "hello.txt", dir, "hard").unwrap();
        let a = dir.path_lookup(LookupFlags::empty(), "hello.txt").unwrap();
        let b = dir.path_lookup(LookupFlags::empty(), "hard").unwrap();
        assert!(a.ptr_eq(&b));
    }
}
