//! Path resolution against an in-memory directory tree.

use crate::inode::InodeGuard;
use crate::path::ParsedPath;
use crate::{FsError, MemFsConfig, Result};
use std::collections::VecDeque;
use tracing::trace;

/// The directory a path's final component lives in, the component itself,
/// and the entry currently stored under it (if any).
#[derive(Clone, Debug)]
pub struct ResolvedParent {
    pub dir: InodeGuard,
    pub name: String,
    pub entry: Option<InodeGuard>,
    pub had_trailing_slash: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct PathWalker {
    max_symlinks: u32,
}

impl PathWalker {
    pub fn new(config: &MemFsConfig) -> Self {
        Self {
            max_symlinks: config.max_symlinks,
        }
    }

    /// Resolves `path` starting at `start`.
    ///
    /// Symlinks met before the last component are always followed. The last
    /// component is followed if `follow_final` is set or the path ended with
    /// `/`. Every expansion re-parses the target joined with whatever path is
    /// left and restarts from the directory holding the link.
    pub fn resolve(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        follow_final: bool,
    ) -> Result<InodeGuard> {
        let mut current = start.clone();
        let mut parts: VecDeque<String> = path.parts().iter().cloned().collect();
        let mut is_dir = path.is_dir();
        let mut depth = 0u32;

        loop {
            let Some(name) = parts.pop_front() else {
                if is_dir && !current.is_dir() {
                    return Err(FsError::NotADirectory);
                }
                return Ok(current);
            };

            let child = {
                let dir = current.as_directory().ok_or(FsError::NotADirectory)?.read();
                dir.get(&name).cloned().ok_or(FsError::NotFound)?
            };
            trace!(parent = current.ino(), %name, ino = child.ino(), "path.resolve.hop");

            if let Some(target) = child.symlink_target() {
                if parts.is_empty() && !follow_final && !is_dir {
                    return Ok(child);
                }
                if depth >= self.max_symlinks {
                    return Err(FsError::TooManySymlinks);
                }

                let expanded = join_target(target, &parts, is_dir);
                trace!(link = %name, %expanded, depth, "path.resolve.symlink");
                let reparsed = ParsedPath::parse(&expanded)?;
                parts = reparsed.parts().iter().cloned().collect();
                is_dir = reparsed.is_dir();
                depth += 1;
                continue;
            }

            if parts.is_empty() {
                if is_dir && !child.is_dir() {
                    return Err(FsError::NotADirectory);
                }
                return Ok(child);
            }

            if !child.is_dir() {
                return Err(FsError::NotADirectory);
            }
            current = child;
        }
    }

    /// Resolves everything but the last component of `path` (following
    /// symlinks, requiring a directory) and looks the last component up
    /// directly, without following it.
    ///
    /// A missing final entry fails with `NotFound` unless `allow_missing`
    /// is set, in which case `entry` is `None`.
    pub fn resolve_parent(
        &self,
        start: &InodeGuard,
        path: &ParsedPath,
        allow_missing: bool,
    ) -> Result<ResolvedParent> {
        let (prefix, name) = path.split_last().ok_or(FsError::InvalidInput)?;
        let dir = self.resolve(start, &prefix, true)?;
        let entry = dir
            .as_directory()
            .ok_or(FsError::NotADirectory)?
            .read()
            .get(name)
            .cloned();
        if entry.is_none() && !allow_missing {
            return Err(FsError::NotFound);
        }

        Ok(ResolvedParent {
            name: name.to_string(),
            dir,
            entry,
            had_trailing_slash: path.is_dir(),
        })
    }
}

fn join_target(target: &str, rest: &VecDeque<String>, is_dir: bool) -> String {
    let mut joined = target.to_string();
    for part in rest {
        if !joined.is_empty() && !joined.ends_with('/') {
            joined.push('/');
        }
        joined.push_str(part);
    }
    if is_dir && !joined.ends_with('/') {
        joined.push('/');
    }
    joined
}
