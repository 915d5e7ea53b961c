//! `FsError` → WASI errno translation.
//!
//! This is the single source of truth for mapping filesystem errors to
//! `Errno`. Callers must not duplicate this mapping elsewhere.

use crate::FsError;
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// WASI preview-1 status codes produced by this filesystem.
///
/// Only the statuses the filesystem can actually return are listed; the
/// discriminants are the preview-1 wire values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum Errno {
    Success = 0,
    Badf = 8,
    Exist = 20,
    Inval = 28,
    Isdir = 31,
    Loop = 32,
    Noent = 44,
    Nospc = 51,
    Notdir = 54,
    Notempty = 55,
    Notsup = 58,
    Perm = 63,
    Notcapable = 76,
}

impl Errno {
    /// Status of a finished operation: `Success` for `Ok`, the mapped
    /// error otherwise.
    pub fn of<T>(result: &crate::Result<T>) -> Self {
        match result {
            Ok(_) => Errno::Success,
            Err(err) => Errno::from(*err),
        }
    }
}

impl From<FsError> for Errno {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound => Errno::Noent,
            FsError::AlreadyExists => Errno::Exist,
            FsError::NotADirectory => Errno::Notdir,
            FsError::IsADirectory => Errno::Isdir,
            FsError::DirectoryNotEmpty => Errno::Notempty,
            FsError::TooManySymlinks => Errno::Loop,
            FsError::NotCapable => Errno::Notcapable,
            FsError::InvalidInput => Errno::Inval,
            FsError::PermissionDenied => Errno::Perm,
            FsError::BadDescriptor => Errno::Badf,
            FsError::NotSupported => Errno::Notsup,
            FsError::StorageFull => Errno::Nospc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn maps_errors_to_wire_values() {
        assert_eq!(u16::from(Errno::from(FsError::NotFound)), 44);
        assert_eq!(u16::from(Errno::from(FsError::TooManySymlinks)), 32);
        assert_eq!(u16::from(Errno::from(FsError::NotCapable)), 76);
        assert_eq!(u16::from(Errno::from(FsError::StorageFull)), 51);
        assert_eq!(Errno::try_from(55u16).ok(), Some(Errno::Notempty));
        assert!(Errno::try_from(1u16).is_err());
    }

    #[test]
    fn status_of_results() {
        let ok: crate::Result<u32> = Ok(3);
        let err: crate::Result<u32> = Err(FsError::PermissionDenied);
        assert_eq!(Errno::of(&ok), Errno::Success);
        assert_eq!(Errno::of(&err), Errno::Perm);
    }
}
