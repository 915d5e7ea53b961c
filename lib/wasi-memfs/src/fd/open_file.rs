use crate::inode::{File, InodeGuard};
use crate::types::{Fdflags, Fdstat, Filestat, Filetype, Fstflags, Oflags, Rights, Timestamp, Whence};
use crate::{FsError, Result};
use parking_lot::RwLock;
use tracing::trace;

/// A regular file opened through `path_open`, with its own seek position.
#[derive(Debug)]
pub struct OpenFile {
    inode: InodeGuard,
    position: u64,
    fdflags: Fdflags,
}

impl OpenFile {
    /// Opens `inode` as a file, without any open-time side effects.
    pub fn new(inode: InodeGuard) -> Result<Self> {
        if inode.as_file().is_none() {
            return Err(FsError::InvalidInput);
        }
        Ok(Self {
            inode,
            position: 0,
            fdflags: Fdflags::empty(),
        })
    }

    /// Applies the file-specific part of `path_open`: write access and
    /// truncation are refused on read-only files, and append pre-seeks to
    /// the end.
    pub(crate) fn open(
        inode: InodeGuard,
        oflags: Oflags,
        fs_rights_base: Rights,
        fdflags: Fdflags,
    ) -> Result<Self> {
        let mut file = Self::new(inode)?;
        file.fdflags = fdflags;
        let end = {
            let mut content = file.file()?.write();
            if content.is_readonly()
                && (fs_rights_base.contains(Rights::FD_WRITE) || oflags.contains(Oflags::TRUNC))
            {
                return Err(FsError::PermissionDenied);
            }
            if oflags.contains(Oflags::TRUNC) {
                content.content_mut().resize(0)?;
            }
            content.len() as u64
        };
        if oflags.contains(Oflags::TRUNC) {
            file.inode.touch_modified();
        }
        if fdflags.contains(Fdflags::APPEND) {
            file.position = end;
        }
        Ok(file)
    }

    fn file(&self) -> Result<&RwLock<File>> {
        self.inode.as_file().ok_or(FsError::BadDescriptor)
    }

    pub fn inode(&self) -> &InodeGuard {
        &self.inode
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn fdflags(&self) -> Fdflags {
        self.fdflags
    }

    pub fn set_fdflags(&mut self, fdflags: Fdflags) {
        self.fdflags = fdflags;
    }

    pub fn is_readonly(&self) -> bool {
        self.inode
            .as_file()
            .is_some_and(|file| file.read().is_readonly())
    }

    pub fn fdstat(&self) -> Fdstat {
        let mut rights = Rights::REGULAR_FILE;
        if self.is_readonly() {
            rights.remove(Rights::WRITE_CLASS);
        }
        Fdstat {
            fs_filetype: Filetype::RegularFile,
            fs_flags: self.fdflags,
            fs_rights_base: rights,
            fs_rights_inheriting: Rights::empty(),
        }
    }

    pub fn stat(&self) -> Filestat {
        self.inode.stat()
    }

    pub fn set_times(&self, atim: Timestamp, mtim: Timestamp, flags: Fstflags) -> Result<()> {
        self.inode.set_times(atim, mtim, flags)
    }

    /// Reads at the current position and advances past what was read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.pread(buf, self.position)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Reads at `offset` without moving the position. Reads past the end
    /// come back short.
    pub fn pread(&self, buf: &mut [u8], offset: u64) -> Result<usize> {
        Ok(self.file()?.read().content().read_at(offset, buf))
    }

    /// Writes at the current position, or at end of file in append mode,
    /// and advances past what was written.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize> {
        let n = {
            let mut file = self.inode.as_file().ok_or(FsError::BadDescriptor)?.write();
            if file.is_readonly() {
                return Err(FsError::BadDescriptor);
            }
            if self.fdflags.contains(Fdflags::APPEND) {
                self.position = file.len() as u64;
            }
            write_into(&mut file, self.position, bytes)?
        };
        self.position += n as u64;
        self.inode.touch_modified();
        Ok(n)
    }

    /// Writes at `offset` without moving the position.
    pub fn pwrite(&self, bytes: &[u8], offset: u64) -> Result<usize> {
        let n = {
            let mut file = self.file()?.write();
            if file.is_readonly() {
                return Err(FsError::BadDescriptor);
            }
            write_into(&mut file, offset, bytes)?
        };
        self.inode.touch_modified();
        Ok(n)
    }

    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.position,
            Whence::End => self.file()?.read().len() as u64,
        };
        self.position = base
            .checked_add_signed(offset)
            .ok_or(FsError::InvalidInput)?;
        trace!(ino = self.inode.ino(), position = self.position, "fd.seek");
        Ok(self.position)
    }

    /// Makes sure `offset..offset + len` is backed by the file, growing it
    /// with zeroes if needed. Never shrinks.
    pub fn allocate(&self, offset: u64, len: u64) -> Result<()> {
        let end = offset.checked_add(len).ok_or(FsError::InvalidInput)?;
        let end = usize::try_from(end).map_err(|_| FsError::InvalidInput)?;
        {
            let mut file = self.file()?.write();
            if file.is_readonly() {
                return Err(FsError::PermissionDenied);
            }
            if end <= file.len() {
                return Ok(());
            }
            file.content_mut().resize(end)?;
        }
        self.inode.touch_modified();
        Ok(())
    }

    pub fn set_size(&self, size: u64) -> Result<()> {
        let size = usize::try_from(size).map_err(|_| FsError::InvalidInput)?;
        {
            let mut file = self.file()?.write();
            if file.is_readonly() {
                return Err(FsError::PermissionDenied);
            }
            file.content_mut().resize(size)?;
        }
        self.inode.touch_modified();
        Ok(())
    }
}

fn write_into(file: &mut File, offset: u64, bytes: &[u8]) -> Result<usize> {
    let offset = usize::try_from(offset).map_err(|_| FsError::InvalidInput)?;
    file.content_mut().write_at(offset, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn reads_and_writes_move_the_position() {
        let mut file = OpenFile::new(InodeGuard::new_file(Vec::new())).unwrap();
        assert_eq!(file.write(b"hello").unwrap(), 5);
        assert_eq!(file.position(), 5);
        assert_eq!(file.seek(0, Whence::Set).unwrap(), 0);

        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(file.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn positional_io_leaves_position_alone() {
        let mut file = OpenFile::new(InodeGuard::new_file(b"abc".to_vec())).unwrap();
        file.seek(1, Whence::Set).unwrap();
        assert_eq!(file.pwrite(b"xy", 5).unwrap(), 2);
        let mut buf = [0xffu8; 7];
        assert_eq!(file.pread(&mut buf, 0).unwrap(), 7);
        assert_eq!(&buf, b"abc\0\0xy");
        assert_eq!(file.position(), 1);
    }

    #[test]
    fn seek_rejects_negative_positions() {
        let mut file = OpenFile::new(InodeGuard::new_file(b"abc".to_vec())).unwrap();
        assert_eq!(file.seek(-1, Whence::End).unwrap(), 2);
        assert_eq!(file.seek(-1, Whence::Cur).unwrap(), 1);
        assert_eq!(file.seek(-2, Whence::Cur), Err(FsError::InvalidInput));
        assert_eq!(file.position(), 1);
    }

    #[test]
    fn append_always_writes_at_end() {
        let inode = InodeGuard::new_file(b"abc".to_vec());
        let mut file =
            OpenFile::open(inode.clone(), Oflags::empty(), Rights::REGULAR_FILE, Fdflags::APPEND)
                .unwrap();
        assert_eq!(file.position(), 3);
        file.seek(0, Whence::Set).unwrap();
        file.write(b"d").unwrap();
        assert_eq!(inode.as_file().unwrap().read().content().as_slice(), b"abcd");
    }

    #[test]
    fn readonly_file_refuses_writes() {
        let inode = InodeGuard::new_readonly_file(b"ro".to_vec());
        let mut file = OpenFile::new(inode.clone()).unwrap();
        assert_eq!(file.write(b"x"), Err(FsError::BadDescriptor));
        assert_eq!(file.pwrite(b"x", 0), Err(FsError::BadDescriptor));
        assert_eq!(file.allocate(0, 10), Err(FsError::PermissionDenied));
        assert_eq!(file.set_size(0), Err(FsError::PermissionDenied));
        assert_eq!(inode.as_file().unwrap().read().content().as_slice(), b"ro");
        assert!(!file.fdstat().fs_rights_base.contains(Rights::FD_WRITE));

        assert_eq!(
            OpenFile::open(inode.clone(), Oflags::TRUNC, Rights::FD_READ, Fdflags::empty())
                .unwrap_err(),
            FsError::PermissionDenied
        );
        assert_eq!(
            OpenFile::open(inode, Oflags::empty(), Rights::FD_WRITE, Fdflags::empty())
                .unwrap_err(),
            FsError::PermissionDenied
        );
    }

    #[test]
    fn allocate_and_set_size() {
        let inode = InodeGuard::new_file(b"abcdef".to_vec());
        let file = OpenFile::new(inode.clone()).unwrap();
        file.allocate(2, 2).unwrap();
        assert_eq!(inode.size(), 6);
        file.allocate(4, 6).unwrap();
        assert_eq!(inode.size(), 10);
        file.set_size(3).unwrap();
        assert_eq!(inode.as_file().unwrap().read().content().as_slice(), b"abc");
    }

    #[test]
    fn huge_offsets_fail_without_touching_the_file() {
        let inode = InodeGuard::new_file(b"abc".to_vec());
        let mut file = OpenFile::new(inode.clone()).unwrap();
        assert_eq!(file.pwrite(b"x", 1 << 62), Err(FsError::StorageFull));
        assert_eq!(file.pwrite(b"x", (1 << 63) - 2), Err(FsError::StorageFull));
        assert_eq!(file.set_size(u64::MAX >> 1), Err(FsError::StorageFull));
        assert_eq!(file.allocate(1 << 62, 1), Err(FsError::StorageFull));

        file.seek(1 << 62, Whence::Set).unwrap();
        assert_eq!(file.write(b"x"), Err(FsError::StorageFull));
        assert_eq!(file.position(), 1 << 62);
        assert_eq!(inode.as_file().unwrap().read().content().as_slice(), b"abc");
    }

    #[test]
    fn truncate_on_open() {
        let inode = InodeGuard::new_file(b"abc".to_vec());
        OpenFile::open(inode.clone(), Oflags::TRUNC, Rights::REGULAR_FILE, Fdflags::empty())
            .unwrap();
        assert_eq!(inode.size(), 0);
    }

    #[test]
    fn only_files_can_be_opened() {
        let dir = InodeGuard::new_directory(Vec::<(String, InodeGuard)>::new()).unwrap();
        assert_eq!(OpenFile::new(dir).unwrap_err(), FsError::InvalidInput);
    }
}
