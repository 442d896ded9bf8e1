use ethers_core::{types::H256, utils::keccak256};
use serde::Deserialize;
use std::collections::BTreeMap;

/// A file as submitted by a caller or produced by the fetcher.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PathContent {
    pub path: String,
    pub content: String,
}

impl PathContent {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionFile {
    pub id: H256,
    pub path: String,
    pub content: String,
    pub content_hash: H256,
}

impl SessionFile {
    fn new(file: PathContent) -> Self {
        Self {
            id: file_id(&file.path, &file.content),
            content_hash: content_hash(&file.content),
            path: file.path,
            content: file.content,
        }
    }
}

/// Identity of a file within a session: the path and the content together.
pub fn file_id(path: &str, content: &str) -> H256 {
    let mut data = Vec::with_capacity(path.len() + content.len() + 1);
    data.extend_from_slice(path.as_bytes());
    data.push(0);
    data.extend_from_slice(content.as_bytes());
    H256(keccak256(data))
}

pub fn content_hash(content: &str) -> H256 {
    H256(keccak256(content.as_bytes()))
}

/// Files accumulated by a session, unique by path.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionFiles {
    files: BTreeMap<String, SessionFile>,
}

impl SessionFiles {
    /// Adds every file which is not already present with the same content
    /// and returns the number of added files.
    ///
    /// A file submitted under an existing path with a different content
    /// replaces the previous one.
    pub fn accumulate(&mut self, batch: impl IntoIterator<Item = PathContent>) -> usize {
        let mut added = 0;
        for file in batch {
            let file = SessionFile::new(file);
            if self
                .files
                .get(&file.path)
                .map(|existing| existing.id == file.id)
                .unwrap_or_default()
            {
                continue;
            }
            self.files.insert(file.path.clone(), file);
            added += 1;
        }
        added
    }

    /// Total content size in bytes the session would have after accumulating the batch.
    pub fn size_with(&self, batch: &[PathContent]) -> usize {
        let mut sizes: BTreeMap<&str, usize> = self
            .files
            .values()
            .map(|file| (file.path.as_str(), file.content.len()))
            .collect();
        for file in batch {
            sizes.insert(file.path.as_str(), file.content.len());
        }
        sizes.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionFile> {
        self.files.values()
    }

    pub fn get(&self, path: &str) -> Option<&SessionFile> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
