use super::{InodeGuard, InodeWeakGuard};
use indexmap::IndexMap;

/// Entries keep insertion order; that order is what `readdir` walks.
#[derive(Debug, Default)]
pub struct Directory {
    contents: IndexMap<String, InodeGuard>,
    parent: InodeWeakGuard,
}

impl Directory {
    pub fn get(&self, name: &str) -> Option<&InodeGuard> {
        self.contents.get(name)
    }

    pub fn get_index(&self, index: usize) -> Option<(&str, &InodeGuard)> {
        self.contents
            .get_index(index)
            .map(|(name, inode)| (name.as_str(), inode))
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.contents.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = &InodeGuard> {
        self.contents.values()
    }

    pub fn parent(&self) -> &InodeWeakGuard {
        &self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: InodeWeakGuard) {
        self.parent = parent;
    }

    /// Appends `name`, or replaces the inode in place if it already exists.
    pub(crate) fn insert(&mut self, name: String, inode: InodeGuard) {
        self.contents.insert(name, inode);
    }

    /// Removes `name`, preserving the order of the remaining entries.
    pub(crate) fn remove(&mut self, name: &str) -> Option<InodeGuard> {
        self.contents.shift_remove(name)
    }
}
