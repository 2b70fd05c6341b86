//! Organizing a flat list of [`Entry`]s into a validated directory tree.
//!
//! Carried over from piz's `read::as_tree`/`FileTree`/`DirectoryEntry`
//! almost verbatim; the only real change is that it walks owned `Entry`
//! values (since an `Archive<R>` doesn't keep its central directory borrowed
//! out to callers the way the original `&'a [u8]`-backed `ZipArchive` did).

use std::collections::{btree_map, BTreeMap};

use camino::{Utf8Component, Utf8Path};
use log::warn;

use crate::archive::Entry;
use crate::result::*;

/// Maps a directory's child paths to the respective entries.
pub type DirectoryContents = BTreeMap<String, DirectoryEntry>;

/// A directory in an [`Archive`](crate::archive::Archive)'s tree, including its metadata and its contents.
#[derive(Debug)]
pub struct Directory {
    pub metadata: Entry,
    pub children: DirectoryContents,
}

impl Directory {
    fn new(metadata: Entry) -> Self {
        Self {
            metadata,
            children: DirectoryContents::new(),
        }
    }
}

/// A file or directory in a [`FileTree`].
#[derive(Debug)]
pub enum DirectoryEntry {
    File(Entry),
    Directory(Directory),
}

impl DirectoryEntry {
    /// Returns the metadata of the entry.
    pub fn metadata(&self) -> &Entry {
        match self {
            DirectoryEntry::File(metadata) => metadata,
            DirectoryEntry::Directory(dir) => &dir.metadata,
        }
    }

    fn name(&self) -> &str {
        self.metadata()
            .path
            .file_name()
            .expect("Path ended in ..")
    }
}

/// Given entries from [`Archive::read_entries`](crate::archive::Archive::read_entries),
/// organizes them into a tree of nested directories and files.
///
/// This does two things:
///
/// 1. It makes files easier to look up by path.
/// 2. It validates the archive, making sure each `Entry` has a sane path, no
///    duplicates, etc. (The ZIP file format makes no promises here.)
pub fn as_tree(entries: Vec<Entry>) -> ZipResult<DirectoryContents> {
    let mut contents = DirectoryContents::new();
    for entry in entries {
        entree_entry(entry, &mut contents)?;
    }
    Ok(contents)
}

pub trait FileTree {
    /// Looks up a file or directory by its path.
    fn lookup<P: AsRef<Utf8Path>>(&self, path: P) -> ZipResult<&Entry>;

    /// Returns an iterator over the entries in the tree, sorted by path.
    fn traverse(&self) -> TreeIterator<'_>;

    /// Returns an iterator over the files in the tree, sorted by path.
    fn files(&self) -> FileTreeIterator<'_>;

    /// Returns an iterator over the directories in the tree, sorted by path.
    fn directories(&self) -> DirectoryTreeIterator<'_>;
}

impl FileTree for DirectoryContents {
    fn lookup<P: AsRef<Utf8Path>>(&self, path: P) -> ZipResult<&Entry> {
        let path = path.as_ref();
        let parent_dir = if let Some(parent) = path.parent() {
            match walk_parent_directories(parent, self) {
                Err(ZipError::NoSuchFile(_)) => Err(ZipError::NoSuchFile(path.to_owned())),
                other_result => other_result,
            }?
        } else {
            self
        };

        let base = path
            .file_name()
            .ok_or_else(|| ZipError::InvalidPath(format!("Path {path} ended in ..")))?;

        parent_dir
            .get(base)
            .ok_or_else(|| ZipError::NoSuchFile(path.to_owned()))
            .map(|dir_entry| dir_entry.metadata())
    }

    fn traverse(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    fn files(&self) -> FileTreeIterator<'_> {
        FileTreeIterator::new(self)
    }

    fn directories(&self) -> DirectoryTreeIterator<'_> {
        DirectoryTreeIterator::new(self)
    }
}

/// Places the given entry in the given directory tree.
fn entree_entry(entry: Entry, tree: &mut DirectoryContents) -> ZipResult<()> {
    let path = entry.path.clone();

    let parent_dir = if let Some(parent) = path.parent() {
        walk_parent_directories_mut(parent, tree)?
    } else {
        tree
    };

    let _base = path
        .file_name()
        .ok_or_else(|| ZipError::Hierarchy(format!("Path {path} ended in ..")))?;

    let to_insert = if entry.is_dir() {
        DirectoryEntry::Directory(Directory::new(entry))
    } else {
        DirectoryEntry::File(entry)
    };

    let name = to_insert.name().to_owned();
    if parent_dir.insert(name, to_insert).is_some() {
        return Err(ZipError::Hierarchy(format!("Duplicate entry for {path}")));
    }

    Ok(())
}

/// Used by `entree_entry()` to reach the directory where we'll insert a new entry.
fn walk_parent_directories_mut<'t>(
    path: &Utf8Path,
    tree: &'t mut DirectoryContents,
) -> ZipResult<&'t mut DirectoryContents> {
    let mut current = tree;

    for component in path.components() {
        match component {
            Utf8Component::Prefix(prefix) => {
                let prefix = prefix.as_os_str();
                return Err(ZipError::Hierarchy(format!(
                    "Prefix {} found in path {path}",
                    prefix.to_string_lossy(),
                )));
            }
            Utf8Component::RootDir => {
                warn!("Root directory found in path {path}");
            }
            Utf8Component::CurDir => {
                warn!("Current dir (.) found in path {path}");
            }
            Utf8Component::ParentDir => {
                return Err(ZipError::Hierarchy(format!(
                    "Parent dir (..) found in path {path}",
                )));
            }
            Utf8Component::Normal(component) => {
                if let Some(child) = current.get_mut(component) {
                    match child {
                        DirectoryEntry::Directory(dir) => {
                            current = &mut dir.children;
                        }
                        _ => {
                            return Err(ZipError::Hierarchy(format!(
                                "{path} is a file, expected a directory",
                            )));
                        }
                    }
                } else {
                    return Err(ZipError::Hierarchy(format!(
                        "{path} found before parent directories",
                    )));
                }
            }
        }
    }
    Ok(current)
}

/// Used by `FileTree::lookup()` to walk the tree to the parent directory
/// where the desired file lives.
///
/// Consequently, this assumes that `path` is provided by the user, and
/// emits errors accordingly (rather than the `Hierarchy` errors above, which
/// indicate a problem with the archive itself).
fn walk_parent_directories<'t>(
    path: &Utf8Path,
    tree: &'t DirectoryContents,
) -> ZipResult<&'t DirectoryContents> {
    let mut current = tree;

    for component in path.components() {
        match component {
            Utf8Component::Prefix(prefix) => {
                return Err(ZipError::InvalidPath(format!(
                    "Prefix {prefix} found in path {path}",
                )));
            }
            Utf8Component::RootDir => {
                return Err(ZipError::InvalidPath(format!(
                    "Root directory found in path {path}",
                )));
            }
            Utf8Component::CurDir => {
                return Err(ZipError::InvalidPath(format!(
                    "Current dir (.) found in path {path}",
                )));
            }
            Utf8Component::ParentDir => {
                return Err(ZipError::InvalidPath(format!(
                    "Parent dir (..) found in path {path}",
                )));
            }
            Utf8Component::Normal(component) => {
                if let Some(child) = current.get(component) {
                    match child {
                        DirectoryEntry::Directory(dir) => {
                            current = &dir.children;
                        }
                        _ => {
                            return Err(ZipError::InvalidPath(format!(
                                "{path} is a file, expected a directory",
                            )));
                        }
                    }
                } else {
                    return Err(ZipError::NoSuchFile(path.to_owned()));
                }
            }
        }
    }
    Ok(current)
}

/// Iterates over all files and directories in a [`FileTree`].
pub struct TreeIterator<'t> {
    stack: Vec<btree_map::Values<'t, String, DirectoryEntry>>,
}

impl<'t> TreeIterator<'t> {
    fn new(tree: &'t DirectoryContents) -> Self {
        Self {
            stack: vec![tree.values()],
        }
    }
}

impl<'t> Iterator for TreeIterator<'t> {
    type Item = &'t DirectoryEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stack.is_empty() {
            return None;
        }
        let next = self.stack.last_mut().unwrap().next();
        match next {
            Some(entry) => {
                if let DirectoryEntry::Directory(d) = entry {
                    self.stack.push(d.children.values());
                }
                return Some(entry);
            }
            None => {
                self.stack.pop();
            }
        };
        self.next()
    }
}

/// Iterates over all files in a [`FileTree`].
pub struct FileTreeIterator<'t> {
    inner: TreeIterator<'t>,
}

impl<'t> FileTreeIterator<'t> {
    fn new(tree: &'t DirectoryContents) -> Self {
        Self {
            inner: TreeIterator::new(tree),
        }
    }
}

impl<'t> Iterator for FileTreeIterator<'t> {
    type Item = &'t Entry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.inner.stack.is_empty() {
            return None;
        }
        let next = self.inner.stack.last_mut().unwrap().next();
        match next {
            Some(DirectoryEntry::File(f)) => Some(f),
            Some(DirectoryEntry::Directory(d)) => {
                self.inner.stack.push(d.children.values());
                self.next()
            }
            None => {
                self.inner.stack.pop();
                self.next()
            }
        }
    }
}

/// Iterates over all directories in a [`FileTree`].
pub struct DirectoryTreeIterator<'t> {
    inner: TreeIterator<'t>,
}

impl<'t> DirectoryTreeIterator<'t> {
    fn new(tree: &'t DirectoryContents) -> Self {
        Self {
            inner: TreeIterator::new(tree),
        }
    }
}

impl<'t> Iterator for DirectoryTreeIterator<'t> {
    type Item = &'t Directory;

    fn next(&mut self) -> Option<Self::Item> {
        if self.inner.stack.is_empty() {
            return None;
        }
        let next = self.inner.stack.last_mut().unwrap().next();
        match next {
            Some(DirectoryEntry::Directory(d)) => {
                self.inner.stack.push(d.children.values());
                Some(d)
            }
            Some(DirectoryEntry::File(_)) => self.next(),
            None => {
                self.inner.stack.pop();
                self.next()
            }
        }
    }
}
