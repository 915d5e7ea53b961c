//! WASI preview-1 records and flag sets the filesystem reads and writes.
//!
//! Only the in-memory shapes live here; laying them out in guest memory is
//! the syscall layer's job.

use bitflags::bitflags;

pub type Inode = u64;
pub type Timestamp = u64;
pub type Dircookie = u64;
pub type Filesize = u64;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Filetype {
    Unknown = 0,
    BlockDevice = 1,
    CharacterDevice = 2,
    Directory = 3,
    RegularFile = 4,
    SocketDgram = 5,
    SocketStream = 6,
    SymbolicLink = 7,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Advice {
    Normal = 0,
    Sequential = 1,
    Random = 2,
    Willneed = 3,
    Dontneed = 4,
    Noreuse = 5,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Whence {
    Set = 0,
    Cur = 1,
    End = 2,
}

bitflags! {
    pub struct Rights: u64 {
        const FD_DATASYNC = 1 << 0;
        const FD_READ = 1 << 1;
        const FD_SEEK = 1 << 2;
        const FD_FDSTAT_SET_FLAGS = 1 << 3;
        const FD_SYNC = 1 << 4;
        const FD_TELL = 1 << 5;
        const FD_WRITE = 1 << 6;
        const FD_ADVISE = 1 << 7;
        const FD_ALLOCATE = 1 << 8;
        const PATH_CREATE_DIRECTORY = 1 << 9;
        const PATH_CREATE_FILE = 1 << 10;
        const PATH_LINK_SOURCE = 1 << 11;
        const PATH_LINK_TARGET = 1 << 12;
        const PATH_OPEN = 1 << 13;
        const FD_READDIR = 1 << 14;
        const PATH_READLINK = 1 << 15;
        const PATH_RENAME_SOURCE = 1 << 16;
        const PATH_RENAME_TARGET = 1 << 17;
        const PATH_FILESTAT_GET = 1 << 18;
        const PATH_FILESTAT_SET_SIZE = 1 << 19;
        const PATH_FILESTAT_SET_TIMES = 1 << 20;
        const FD_FILESTAT_GET = 1 << 21;
        const FD_FILESTAT_SET_SIZE = 1 << 22;
        const FD_FILESTAT_SET_TIMES = 1 << 23;
        const PATH_SYMLINK = 1 << 24;
        const PATH_REMOVE_DIRECTORY = 1 << 25;
        const PATH_UNLINK_FILE = 1 << 26;
        const POLL_FD_READWRITE = 1 << 27;
        const SOCK_SHUTDOWN = 1 << 28;
        const SOCK_ACCEPT = 1 << 29;
    }
}

impl Rights {
    /// Rights usable directly on a directory handle.
    pub const DIRECTORY_BASE: Rights = Rights::from_bits_truncate(
        Rights::FD_READDIR.bits
            | Rights::FD_FILESTAT_GET.bits
            | Rights::FD_FILESTAT_SET_TIMES.bits
            | Rights::PATH_CREATE_DIRECTORY.bits
            | Rights::PATH_CREATE_FILE.bits
            | Rights::PATH_FILESTAT_GET.bits
            | Rights::PATH_FILESTAT_SET_SIZE.bits
            | Rights::PATH_FILESTAT_SET_TIMES.bits
            | Rights::PATH_LINK_SOURCE.bits
            | Rights::PATH_LINK_TARGET.bits
            | Rights::PATH_OPEN.bits
            | Rights::PATH_READLINK.bits
            | Rights::PATH_REMOVE_DIRECTORY.bits
            | Rights::PATH_RENAME_SOURCE.bits
            | Rights::PATH_RENAME_TARGET.bits
            | Rights::PATH_SYMLINK.bits
            | Rights::PATH_UNLINK_FILE.bits,
    );

    /// Rights handed down to anything opened beneath a directory handle.
    pub const DIRECTORY_INHERITING: Rights = Rights::from_bits_truncate(
        Rights::FD_DATASYNC.bits
            | Rights::FD_READ.bits
            | Rights::FD_SEEK.bits
            | Rights::FD_TELL.bits
            | Rights::FD_WRITE.bits
            | Rights::FD_FILESTAT_GET.bits
            | Rights::FD_FILESTAT_SET_SIZE.bits
            | Rights::FD_FILESTAT_SET_TIMES.bits
            | Rights::FD_SYNC.bits
            | Rights::FD_ADVISE.bits
            | Rights::FD_ALLOCATE.bits
            | Rights::PATH_FILESTAT_GET.bits
            | Rights::PATH_READLINK.bits,
    );

    /// Rights of an open regular file.
    pub const REGULAR_FILE: Rights = Rights::from_bits_truncate(
        Rights::FD_DATASYNC.bits
            | Rights::FD_READ.bits
            | Rights::FD_SEEK.bits
            | Rights::FD_FDSTAT_SET_FLAGS.bits
            | Rights::FD_SYNC.bits
            | Rights::FD_TELL.bits
            | Rights::FD_WRITE.bits
            | Rights::FD_ADVISE.bits
            | Rights::FD_ALLOCATE.bits
            | Rights::FD_FILESTAT_GET.bits
            | Rights::FD_FILESTAT_SET_SIZE.bits
            | Rights::FD_FILESTAT_SET_TIMES.bits
            | Rights::POLL_FD_READWRITE.bits,
    );

    /// Rights that mutate file content.
    pub const WRITE_CLASS: Rights = Rights::from_bits_truncate(
        Rights::FD_WRITE.bits | Rights::FD_ALLOCATE.bits | Rights::FD_FILESTAT_SET_SIZE.bits,
    );
}

bitflags! {
    pub struct Oflags: u16 {
        const CREATE = 1 << 0;
        const DIRECTORY = 1 << 1;
        const EXCL = 1 << 2;
        const TRUNC = 1 << 3;
    }
}

bitflags! {
    pub struct Fdflags: u16 {
        const APPEND = 1 << 0;
        const DSYNC = 1 << 1;
        const NONBLOCK = 1 << 2;
        const RSYNC = 1 << 3;
        const SYNC = 1 << 4;
    }
}

bitflags! {
    pub struct LookupFlags: u32 {
        const SYMLINK_FOLLOW = 1 << 0;
    }
}

bitflags! {
    pub struct Fstflags: u16 {
        const SET_ATIM = 1 << 0;
        const SET_ATIM_NOW = 1 << 1;
        const SET_MTIM = 1 << 2;
        const SET_MTIM_NOW = 1 << 3;
    }
}

/// File attributes, as returned by `fd_filestat_get` / `path_filestat_get`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Filestat {
    pub st_dev: u64,
    pub st_ino: Inode,
    pub st_filetype: Filetype,
    pub st_nlink: u64,
    pub st_size: Filesize,
    pub st_atim: Timestamp,
    pub st_mtim: Timestamp,
    pub st_ctim: Timestamp,
}

/// Handle attributes, as returned by `fd_fdstat_get`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Fdstat {
    pub fs_filetype: Filetype,
    pub fs_flags: Fdflags,
    pub fs_rights_base: Rights,
    pub fs_rights_inheriting: Rights,
}

/// A single directory entry, together with the cookie of the entry after it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    pub d_next: Dircookie,
    pub d_ino: Inode,
    pub d_type: Filetype,
    pub name: String,
}

impl Dirent {
    pub fn d_namlen(&self) -> u32 {
        self.name.len() as u32
    }
}

/// Pre-open description, as returned by `fd_prestat_get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prestat {
    Dir { pr_name: String },
}

impl Prestat {
    pub fn pr_name_len(&self) -> u32 {
        match self {
            Prestat::Dir { pr_name } => pr_name.len() as u32,
        }
    }
}
