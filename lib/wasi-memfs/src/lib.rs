//! An in-memory, capability-scoped filesystem implementing the WASI
//! preview-1 filesystem surface.
//!
//! A guest never addresses a real filesystem. Every path it hands us is
//! resolved inside an in-memory tree rooted at one or more pre-opened
//! directories ([`PreopenDirectory`]), so the host decides exactly what
//! the guest can reach.
//!
//! The crate is split the way the data flows:
//!
//! - [`path`] parses and sandbox-checks guest paths,
//! - [`inode`] holds files, directories and symlinks,
//! - [`walker`] resolves parsed paths against a directory tree,
//! - [`mutation`] creates, links and removes directory entries,
//! - [`fd`] exposes the per-handle operation surface the guest calls into.
//!
//! Fallible operations return [`Result`]; [`Errno`] turns an error into the
//! WASI status a syscall layer hands back to the guest.

pub mod buffer;
pub mod config;
pub mod errno;
pub mod fd;
pub mod inode;
pub mod mutation;
pub mod path;
pub mod types;
pub mod walker;

pub use config::MemFsConfig;
pub use errno::Errno;
pub use fd::{ConsoleStdout, Fd, OpenDirectory, OpenFile, PreopenDirectory};
pub use inode::{InodeGuard, InodeWeakGuard};
pub use path::ParsedPath;
pub use types::*;
pub use walker::{PathWalker, ResolvedParent};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FsError>;

/// Error type for external users
#[derive(Error, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FsError {
    /// The requested file or directory could not be found
    #[error("entity not found")]
    NotFound,
    /// An entry already occupies the requested name
    #[error("file exists")]
    AlreadyExists,
    /// A path component, or the target of a directory-only operation, is not a directory
    #[error("not a directory")]
    NotADirectory,
    /// A file-only operation was pointed at a directory
    #[error("is a directory")]
    IsADirectory,
    /// The directory still has entries
    #[error("directory not empty")]
    DirectoryNotEmpty,
    /// Symlink expansion went deeper than the configured limit
    #[error("too many levels of symbolic links")]
    TooManySymlinks,
    /// The path tried to leave the directory it is confined to
    #[error("path escapes its capability")]
    NotCapable,
    /// The provided data is invalid
    #[error("invalid input")]
    InvalidInput,
    /// Caller was not allowed to perform this operation
    #[error("permission denied")]
    PermissionDenied,
    /// The handle cannot be used for this operation
    #[error("bad file descriptor")]
    BadDescriptor,
    /// The handle kind does not implement this operation
    #[error("operation not supported")]
    NotSupported,
    /// The file could not be grown to the requested size
    #[error("storage full")]
    StorageFull,
}

impl FsError {
    /// Stable snake_case name, used as a structured log field.
    pub const fn as_str(self) -> &'static str {
        match self {
            FsError::NotFound => "not_found",
            FsError::AlreadyExists => "already_exists",
            FsError::NotADirectory => "not_dir",
            FsError::IsADirectory => "is_dir",
            FsError::DirectoryNotEmpty => "dir_not_empty",
            FsError::TooManySymlinks => "too_many_symlinks",
            FsError::NotCapable => "not_capable",
            FsError::InvalidInput => "invalid_input",
            FsError::PermissionDenied => "permission_denied",
            FsError::BadDescriptor => "bad_handle",
            FsError::NotSupported => "not_supported",
            FsError::StorageFull => "storage_full",
        }
    }
}
