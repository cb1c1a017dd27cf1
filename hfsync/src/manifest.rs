//! Remote file manifest.
//!
//! A [`Manifest`] is the ordered list of files a repository snapshot contains,
//! as reported by the hub. It is built once per run and never modified.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{SyncError, SyncResult};

/// One file of a remote repository snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    relative_path: String,
    expected_size: u64,
    expected_checksum: Option<String>,
}

impl FileEntry {
    /// Create an entry without a checksum.
    pub fn new(relative_path: impl Into<String>, expected_size: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            expected_size,
            expected_checksum: None,
        }
    }

    /// Attach the expected SHA-256 (lowercase or uppercase hex).
    pub fn with_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.expected_checksum = Some(checksum.into());
        self
    }

    /// Path relative to the repository root, `/`-separated.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Authoritative remote byte length.
    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    /// Expected SHA-256, present only for LFS-tracked files.
    pub fn expected_checksum(&self) -> Option<&str> {
        self.expected_checksum.as_deref()
    }

    /// Location of this file under a local root.
    pub fn local_path(&self, root: &Path) -> PathBuf {
        self.relative_path
            .split('/')
            .fold(root.to_path_buf(), |path, part| path.join(part))
    }
}

/// Ordered, validated set of [`FileEntry`] records.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    entries: Vec<FileEntry>,
    /// Relative path to position in `entries`.
    index: HashMap<String, usize>,
}

impl Manifest {
    /// Build a manifest, rejecting duplicate or unsafe paths.
    ///
    /// A path is unsafe when it is empty, absolute, or contains `.`/`..`
    /// components, since it would resolve outside the destination root.
    pub fn new(entries: Vec<FileEntry>) -> SyncResult<Self> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            validate_relative_path(entry.relative_path())?;
            if index
                .insert(entry.relative_path().to_string(), position)
                .is_some()
            {
                return Err(SyncError::InvalidManifest(format!(
                    "duplicate path '{}'",
                    entry.relative_path()
                )));
            }
        }
        Ok(Self { entries, index })
    }

    /// Entries in manifest order.
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Iterate entries in manifest order.
    pub fn iter(&self) -> std::slice::Iter<'_, FileEntry> {
        self.entries.iter()
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists no files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all expected sizes.
    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(FileEntry::expected_size).sum()
    }

    /// Look up an entry by relative path.
    pub fn get(&self, relative_path: &str) -> Option<&FileEntry> {
        self.index.get(relative_path).map(|&i| &self.entries[i])
    }

    /// Whether an entry with this relative path exists.
    pub fn contains(&self, relative_path: &str) -> bool {
        self.index.contains_key(relative_path)
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn validate_relative_path(path: &str) -> SyncResult<()> {
    let invalid = |why: &str| SyncError::InvalidManifest(format!("path '{}' {}", path, why));

    if path.is_empty() {
        return Err(invalid("is empty"));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(invalid("is not a relative repository path"));
    }
    for part in path.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return Err(invalid("contains an empty, '.' or '..' component"));
        }
    }
    // Catches platform prefixes such as `C:` that survive the checks above.
    if Path::new(path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(invalid("is not a relative repository path"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_accessors() {
        let entry = FileEntry::new("config.json", 120).with_checksum("ABCDEF");
        assert_eq!(entry.relative_path(), "config.json");
        assert_eq!(entry.expected_size(), 120);
        assert_eq!(entry.expected_checksum(), Some("ABCDEF"));
        assert_eq!(FileEntry::new("a", 1).expected_checksum(), None);
    }

    #[test]
    fn test_local_path_nested() {
        let entry = FileEntry::new("metal/model.bin", 10);
        let path = entry.local_path(Path::new("/data/models/org/name"));
        assert_eq!(path, PathBuf::from("/data/models/org/name/metal/model.bin"));
    }

    #[test]
    fn test_manifest_preserves_order_and_totals() {
        let manifest = Manifest::new(vec![
            FileEntry::new("b.json", 10),
            FileEntry::new("a.bin", 32),
        ])
        .unwrap();

        let paths: Vec<_> = manifest.iter().map(|e| e.relative_path()).collect();
        assert_eq!(paths, vec!["b.json", "a.bin"]);
        assert_eq!(manifest.total_size(), 42);
        assert_eq!(manifest.len(), 2);
        assert!(manifest.contains("a.bin"));
        assert!(!manifest.contains("c.bin"));
    }

    #[test]
    fn test_get_finds_entries_by_path() {
        let manifest = Manifest::new(
            (0..1000)
                .map(|i| FileEntry::new(format!("shards/part-{:04}.bin", i), i))
                .collect(),
        )
        .unwrap();

        let entry = manifest.get("shards/part-0777.bin").unwrap();
        assert_eq!(entry.expected_size(), 777);
        assert!(manifest.get("shards/part-1000.bin").is_none());
        assert_eq!(manifest.iter().nth(777), Some(entry));
    }

    #[test]
    fn test_manifest_rejects_duplicates() {
        let result = Manifest::new(vec![FileEntry::new("a", 1), FileEntry::new("a", 2)]);
        assert!(matches!(result, Err(SyncError::InvalidManifest(_))));
    }

    #[test]
    fn test_manifest_rejects_escaping_paths() {
        for bad in ["", "/etc/passwd", "../x", "a/../../b", "a//b", "./a", "a\\b"] {
            let result = Manifest::new(vec![FileEntry::new(bad, 1)]);
            assert!(
                matches!(result, Err(SyncError::InvalidManifest(_))),
                "path {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_empty_manifest() {
        let manifest = Manifest::new(Vec::new()).unwrap();
        assert!(manifest.is_empty());
        assert_eq!(manifest.total_size(), 0);
    }
}
