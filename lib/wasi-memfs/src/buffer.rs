//! Byte storage backing a regular file.
//!
//! Guests frequently write one small chunk at a time, so growth at least
//! doubles the allocation. Shrinking gives memory back right away. Callers
//! only ever observe the logical length; capacity stays an internal detail.

use crate::{FsError, Result};
use std::cmp;

#[derive(Default)]
pub struct FileBuffer {
    // Invariant: data.capacity() >= data.len(); bytes past len are never read.
    data: Vec<u8>,
}

impl FileBuffer {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self { data: bytes.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The single resize primitive. New bytes are zeroed.
    ///
    /// Growth that cannot be allocated fails with [`FsError::StorageFull`]
    /// and leaves the buffer as it was.
    pub fn resize(&mut self, new_len: usize) -> Result<()> {
        let len = self.data.len();
        if new_len < len {
            self.data.truncate(new_len);
            self.data.shrink_to(new_len);
        } else if new_len > len {
            let capacity = self.data.capacity();
            if new_len > capacity {
                let target = cmp::max(new_len, capacity.saturating_mul(2));
                if self.data.try_reserve_exact(target - len).is_err() {
                    self.data
                        .try_reserve_exact(new_len - len)
                        .map_err(|_| FsError::StorageFull)?;
                }
            }
            self.data.resize(new_len, 0);
        }
        Ok(())
    }

    /// Copies bytes starting at `offset` into `buf`. Reads past the end are
    /// short, not an error.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> usize {
        let len = self.data.len();
        let start = match usize::try_from(offset) {
            Ok(start) if start < len => start,
            _ => return 0,
        };
        let n = cmp::min(buf.len(), len - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }

    /// Writes `bytes` at `offset`, growing the buffer first if needed. A gap
    /// between the old end and `offset` reads back as zeroes.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<usize> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or(FsError::InvalidInput)?;
        if end > self.data.len() {
            self.resize(end)?;
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(bytes.len())
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.data.capacity()
    }
}

impl std::fmt::Debug for FileBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBuffer").field("len", &self.data.len()).finish()
    }
}
