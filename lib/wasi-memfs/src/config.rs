//! Host-side knobs for a filesystem instance.
//!
//! A config is shared by every directory handle opened from the same
//! preopen, so all lookups through it agree on the same limits.

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemFsConfig {
    /// How many symlinks a single resolution may expand before it fails
    /// with `TooManySymlinks`.
    pub max_symlinks: u32,
}

impl MemFsConfig {
    pub fn with_max_symlinks(mut self, max_symlinks: u32) -> Self {
        self.max_symlinks = max_symlinks;
        self
    }
}

impl Default for MemFsConfig {
    fn default() -> Self {
        Self { max_symlinks: 40 }
    }
}
