//! File descriptors as the guest sees them.
//!
//! [`Fd`] is a closed set of handle kinds sharing one operation surface.
//! An operation a kind has no meaning for answers `NotSupported`, so the
//! syscall layer can call anything on any handle without checking its kind
//! first. Mapping guest fd numbers to handles is the caller's job.

mod console;
mod open_dir;
mod open_file;

pub use console::ConsoleStdout;
pub use open_dir::{OpenDirectory, PreopenDirectory};
pub use open_file::OpenFile;

use crate::inode::InodeGuard;
use crate::types::{
    Advice, Dircookie, Dirent, Fdflags, Fdstat, Filestat, Filesize, Fstflags, LookupFlags,
    Oflags, Prestat, Rights, Timestamp, Whence,
};
use crate::{FsError, Result};
use tracing::trace;

#[derive(Debug)]
pub enum Fd {
    File(OpenFile),
    Directory(OpenDirectory),
    Preopen(PreopenDirectory),
    Console(ConsoleStdout),
}

impl From<OpenFile> for Fd {
    fn from(file: OpenFile) -> Self {
        Fd::File(file)
    }
}

impl From<OpenDirectory> for Fd {
    fn from(dir: OpenDirectory) -> Self {
        Fd::Directory(dir)
    }
}

impl From<PreopenDirectory> for Fd {
    fn from(preopen: PreopenDirectory) -> Self {
        Fd::Preopen(preopen)
    }
}

impl From<ConsoleStdout> for Fd {
    fn from(console: ConsoleStdout) -> Self {
        Fd::Console(console)
    }
}

impl Fd {
    fn kind_name(&self) -> &'static str {
        match self {
            Fd::File(_) => "file",
            Fd::Directory(_) => "directory",
            Fd::Preopen(_) => "preopen",
            Fd::Console(_) => "console",
        }
    }

    fn unsupported<T>(&self, op: &'static str) -> Result<T> {
        trace!(op, kind = self.kind_name(), "fd.unsupported");
        Err(FsError::NotSupported)
    }

    /// The directory behind a directory or pre-open handle.
    pub fn as_directory(&self) -> Option<&OpenDirectory> {
        match self {
            Fd::Directory(dir) => Some(dir),
            Fd::Preopen(preopen) => Some(preopen.dir()),
            Fd::File(_) | Fd::Console(_) => None,
        }
    }

    /// The inode a handle refers to. Consoles have none.
    pub fn inode(&self) -> Option<&InodeGuard> {
        match self {
            Fd::File(file) => Some(file.inode()),
            Fd::Directory(dir) => Some(dir.inode()),
            Fd::Preopen(preopen) => Some(preopen.dir().inode()),
            Fd::Console(_) => None,
        }
    }

    fn directory(&self, op: &'static str) -> Result<&OpenDirectory> {
        match self.as_directory() {
            Some(dir) => Ok(dir),
            None => self.unsupported(op),
        }
    }

    /// Destination handle of a two-directory operation.
    fn target_directory(fd: &Fd) -> Result<&OpenDirectory> {
        fd.as_directory().ok_or(FsError::NotADirectory)
    }

    pub fn fd_advise(&self, _offset: Filesize, _len: Filesize, _advice: Advice) -> Result<()> {
        match self {
            Fd::File(_) => Ok(()),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_advise"),
        }
    }

    pub fn fd_allocate(&self, offset: Filesize, len: Filesize) -> Result<()> {
        match self {
            Fd::File(file) => file.allocate(offset, len),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_allocate"),
        }
    }

    /// Closing never touches the inode behind the handle.
    pub fn fd_close(self) -> Result<()> {
        trace!(kind = self.kind_name(), "fd.close");
        Ok(())
    }

    pub fn fd_datasync(&self) -> Result<()> {
        match self {
            Fd::File(_) => Ok(()),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_datasync"),
        }
    }

    pub fn fd_sync(&self) -> Result<()> {
        match self {
            Fd::File(_) => Ok(()),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_sync"),
        }
    }

    pub fn fd_fdstat_get(&self) -> Result<Fdstat> {
        Ok(match self {
            Fd::File(file) => file.fdstat(),
            Fd::Directory(dir) => dir.fdstat(),
            Fd::Preopen(preopen) => preopen.dir().fdstat(),
            Fd::Console(console) => console.fdstat(),
        })
    }

    pub fn fd_fdstat_set_flags(&mut self, flags: Fdflags) -> Result<()> {
        match self {
            Fd::File(file) => {
                file.set_fdflags(flags);
                Ok(())
            }
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => {
                self.unsupported("fd_fdstat_set_flags")
            }
        }
    }

    pub fn fd_filestat_get(&self) -> Result<Filestat> {
        Ok(match self {
            Fd::File(file) => file.stat(),
            Fd::Directory(dir) => dir.stat(),
            Fd::Preopen(preopen) => preopen.dir().stat(),
            Fd::Console(console) => console.stat(),
        })
    }

    pub fn fd_filestat_set_size(&self, size: Filesize) -> Result<()> {
        match self {
            Fd::File(file) => file.set_size(size),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => {
                self.unsupported("fd_filestat_set_size")
            }
        }
    }

    pub fn fd_filestat_set_times(
        &self,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: Fstflags,
    ) -> Result<()> {
        match self {
            Fd::File(file) => file.set_times(atim, mtim, fst_flags),
            Fd::Directory(dir) => dir.set_times(atim, mtim, fst_flags),
            Fd::Preopen(preopen) => preopen.dir().set_times(atim, mtim, fst_flags),
            Fd::Console(_) => self.unsupported("fd_filestat_set_times"),
        }
    }

    pub fn fd_read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            Fd::File(file) => file.read(buf),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_read"),
        }
    }

    pub fn fd_pread(&self, buf: &mut [u8], offset: Filesize) -> Result<usize> {
        match self {
            Fd::File(file) => file.pread(buf, offset),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_pread"),
        }
    }

    pub fn fd_write(&mut self, bytes: &[u8]) -> Result<usize> {
        match self {
            Fd::File(file) => file.write(bytes),
            Fd::Console(console) => Ok(console.write(bytes)),
            Fd::Directory(_) | Fd::Preopen(_) => self.unsupported("fd_write"),
        }
    }

    pub fn fd_pwrite(&self, bytes: &[u8], offset: Filesize) -> Result<usize> {
        match self {
            Fd::File(file) => file.pwrite(bytes, offset),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_pwrite"),
        }
    }

    pub fn fd_seek(&mut self, offset: i64, whence: Whence) -> Result<Filesize> {
        match self {
            Fd::File(file) => file.seek(offset, whence),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_seek"),
        }
    }

    pub fn fd_tell(&self) -> Result<Filesize> {
        match self {
            Fd::File(file) => Ok(file.position()),
            Fd::Directory(_) | Fd::Preopen(_) | Fd::Console(_) => self.unsupported("fd_tell"),
        }
    }

    /// One directory entry per call; `Ok(None)` once `cookie` is past the end.
    pub fn fd_readdir_single(&self, cookie: Dircookie) -> Result<Option<Dirent>> {
        self.directory("fd_readdir")?.readdir_single(cookie)
    }

    /// Only pre-opens answer; every other handle is a bad descriptor here,
    /// which is how a guest learns it has run out of pre-opens.
    pub fn fd_prestat_get(&self) -> Result<Prestat> {
        match self {
            Fd::Preopen(preopen) => Ok(preopen.prestat()),
            Fd::File(_) | Fd::Directory(_) | Fd::Console(_) => Err(FsError::BadDescriptor),
        }
    }

    pub fn path_create_directory(&self, path: &str) -> Result<()> {
        self.directory("path_create_directory")?
            .path_create_directory(path)
    }

    pub fn path_filestat_get(&self, flags: LookupFlags, path: &str) -> Result<Filestat> {
        self.directory("path_filestat_get")?
            .path_filestat_get(flags, path)
    }

    pub fn path_filestat_set_times(
        &self,
        flags: LookupFlags,
        path: &str,
        atim: Timestamp,
        mtim: Timestamp,
        fst_flags: Fstflags,
    ) -> Result<()> {
        self.directory("path_filestat_set_times")?
            .path_filestat_set_times(flags, path, atim, mtim, fst_flags)
    }

    pub fn path_link(
        &self,
        old_flags: LookupFlags,
        old_path: &str,
        new_fd: &Fd,
        new_path: &str,
    ) -> Result<()> {
        let dir = self.directory("path_link")?;
        dir.path_link(old_flags, old_path, Self::target_directory(new_fd)?, new_path)
    }

    pub fn path_lookup(&self, flags: LookupFlags, path: &str) -> Result<InodeGuard> {
        self.directory("path_lookup")?.path_lookup(flags, path)
    }

    pub fn path_open(
        &self,
        dirflags: LookupFlags,
        path: &str,
        oflags: Oflags,
        fs_rights_base: Rights,
        fs_rights_inheriting: Rights,
        fdflags: Fdflags,
    ) -> Result<Fd> {
        self.directory("path_open")?.path_open(
            dirflags,
            path,
            oflags,
            fs_rights_base,
            fs_rights_inheriting,
            fdflags,
        )
    }

    pub fn path_readlink(&self, path: &str) -> Result<String> {
        self.directory("path_readlink")?.path_readlink(path)
    }

    pub fn path_remove_directory(&self, path: &str) -> Result<()> {
        self.directory("path_remove_directory")?
            .path_remove_directory(path)
    }

    pub fn path_rename(&self, old_path: &str, new_fd: &Fd, new_path: &str) -> Result<()> {
        let dir = self.directory("path_rename")?;
        dir.path_rename(old_path, Self::target_directory(new_fd)?, new_path)
    }

    pub fn path_symlink(&self, old_path: &str, new_path: &str) -> Result<()> {
        self.directory("path_symlink")?
            .path_symlink(old_path, new_path)
    }

    pub fn path_unlink(&self, path: &str) -> Result<InodeGuard> {
        self.directory("path_unlink")?.path_unlink(path)
    }

    pub fn path_unlink_file(&self, path: &str) -> Result<()> {
        self.directory("path_unlink_file")?.path_unlink_file(path)
    }
}
