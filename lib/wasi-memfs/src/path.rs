//! Guest path parsing.
//!
//! Parsing is purely lexical: `.` and empty components are dropped and
//! `..` pops the previous component. A path that would climb above the
//! directory it is resolved from is rejected here, before any lookup, even
//! if the components it names do not exist.

use crate::{FsError, Result};

/// A guest path split into components, plus whether it named a directory
/// (it ended with `/`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedPath {
    parts: Vec<String>,
    is_dir: bool,
}

impl ParsedPath {
    pub fn parse(path: &str) -> Result<Self> {
        if path.starts_with('/') {
            return Err(FsError::NotCapable);
        }
        if path.contains('\0') {
            return Err(FsError::InvalidInput);
        }

        let mut parts: Vec<String> = Vec::new();
        for component in path.split('/') {
            match component {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(FsError::NotCapable);
                    }
                }
                name => parts.push(name.to_string()),
            }
        }

        Ok(Self {
            parts,
            is_dir: path.ends_with('/'),
        })
    }

    pub(crate) fn from_parts(parts: Vec<String>, is_dir: bool) -> Self {
        Self { parts, is_dir }
    }

    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// True if the original string ended with `/`.
    pub fn is_dir(&self) -> bool {
        self.is_dir
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Splits off the final component, returning the remaining prefix and
    /// the popped name. `None` for an empty path.
    pub(crate) fn split_last(&self) -> Option<(ParsedPath, &str)> {
        let (last, prefix) = self.parts.split_last()?;
        Some((ParsedPath::from_parts(prefix.to_vec(), true), last.as_str()))
    }
}

impl std::fmt::Display for ParsedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.parts.join("/"))?;
        if self.is_dir {
            write!(f, "/")?;
        }
        Ok(())
    }
}
