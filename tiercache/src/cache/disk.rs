//! Persistent tier: one JSON file per element with an in-memory index.
//!
//! # File Layout
//!
//! ```text
//! {root}/{cache name}/{file id:016x}.element
//! ```
//!
//! Each file holds a serialized [`Element`] (key, value, timestamps, expiry
//! settings, hit count). Writes go to a `.tmp` sibling first and are renamed
//! into place, so a crash never leaves a half-written element behind.
//!
//! The index keeps every resident element's [`Expiry`] in memory. Liveness
//! checks and victim selection therefore never touch the filesystem; only
//! reads of a value, writes and deletions do. All I/O runs under a timeout.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

use crate::cache::element::Element;
use crate::cache::eviction::RecencyIndex;
use crate::cache::expiration::Expiry;
use crate::cache::types::CacheError;

/// File extension for element records.
const ELEMENT_EXTENSION: &str = "element";

/// File extension for in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// Index entry for a disk-resident element.
#[derive(Debug, Clone)]
struct DiskEntry {
    /// Backing file
    file: PathBuf,
    /// Timestamps and expiry settings
    expiry: Expiry,
    /// Read count
    hits: u64,
    /// Access metadata changed since the file was written
    dirty: bool,
}

/// Outcome of opening a persistent tier directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Elements indexed from existing files
    pub loaded: usize,
    /// Files removed because their element had expired
    pub expired: usize,
    /// Files removed because they could not be parsed
    pub unreadable: usize,
    /// Files removed because more elements were found than the capacity allows
    pub over_capacity: usize,
    /// Files removed because the tier is scratch space
    pub scratch_cleared: usize,
}

/// Disk-resident elements of one store.
pub struct DiskTier {
    /// Directory owned by this tier
    directory: PathBuf,
    /// Key to backing file and metadata
    entries: HashMap<String, DiskEntry>,
    /// Access order for victim selection
    recency: RecencyIndex,
    /// Maximum resident elements
    capacity: usize,
    /// Upper bound for a single filesystem operation
    io_timeout: Duration,
    /// Next file id to allocate
    next_file_id: u64,
    /// File ids have wrapped past `u64::MAX`; allocation must skip ids in use
    ids_wrapped: bool,
}

impl DiskTier {
    /// Open the tier directory, creating it if needed.
    ///
    /// With `persistent` set, existing element files are read back: expired
    /// and unreadable files are deleted, and if more elements are found than
    /// `capacity` allows only the most recently accessed ones are kept.
    /// Without it the directory is scratch space and is emptied.
    pub async fn open(
        directory: PathBuf,
        capacity: usize,
        io_timeout: Duration,
        persistent: bool,
    ) -> Result<(Self, LoadReport), CacheError> {
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| CacheError::StorageInitialization {
                path: directory.clone(),
                source,
            })?;

        let mut tier = Self {
            directory,
            entries: HashMap::new(),
            recency: RecencyIndex::new(),
            capacity,
            io_timeout,
            next_file_id: 0,
            ids_wrapped: false,
        };

        let report = if persistent {
            tier.load_existing().await?
        } else {
            LoadReport {
                scratch_cleared: tier.delete_all_files().await?,
                ..LoadReport::default()
            }
        };

        Ok((tier, report))
    }

    /// Read back element files left by a previous run.
    async fn load_existing(&mut self) -> Result<LoadReport, CacheError> {
        let mut report = LoadReport::default();
        let now = SystemTime::now();
        let mut found: Vec<(Element, PathBuf)> = Vec::new();

        for path in self.list_files().await? {
            if path.extension().and_then(|e| e.to_str()) != Some(ELEMENT_EXTENSION) {
                // Leftover temp files from an interrupted write
                self.delete_file(&path).await;
                continue;
            }

            if let Some(id) = file_id(&path) {
                self.next_file_id = self.next_file_id.max(id.saturating_add(1));
            }

            match self.read_file(&path).await {
                Ok(element) if element.is_expired(now) => {
                    report.expired += 1;
                    self.delete_file(&path).await;
                }
                Ok(element) => found.push((element, path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Discarding unreadable element file");
                    report.unreadable += 1;
                    self.delete_file(&path).await;
                }
            }
        }

        // Oldest access first so the recency index ends up in LRU order
        found.sort_by_key(|(element, _)| element.last_accessed());

        let excess = found.len().saturating_sub(self.capacity);
        for (_, path) in found.drain(..excess) {
            report.over_capacity += 1;
            self.delete_file(&path).await;
        }

        for (element, path) in found {
            let (key, _, expiry, hits) = element.into_parts();
            let entry = DiskEntry {
                file: path,
                expiry,
                hits,
                dirty: false,
            };
            if let Some(previous) = self.entries.insert(key.clone(), entry) {
                self.delete_file(&previous.file).await;
            } else {
                report.loaded += 1;
            }
            self.recency.record(&key);
        }

        info!(
            dir = %self.directory.display(),
            loaded = report.loaded,
            expired = report.expired,
            unreadable = report.unreadable,
            over_capacity = report.over_capacity,
            "Persistent tier loaded"
        );

        Ok(report)
    }

    /// Expiry metadata of a resident element.
    pub fn expiry(&self, key: &str) -> Option<&Expiry> {
        self.entries.get(key).map(|entry| &entry.expiry)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Read a resident element from its file.
    ///
    /// The returned element carries the index metadata, which may be newer
    /// than what the file holds. Does not record an access.
    pub async fn read(&self, key: &str) -> Result<Option<Element>, CacheError> {
        let Some(entry) = self.entries.get(key) else {
            return Ok(None);
        };

        let element = self.read_file(&entry.file).await?;
        let (key, value, _, _) = element.into_parts();
        Ok(Some(Element::from_parts(key, value, entry.expiry, entry.hits)))
    }

    /// Record a read: refresh last access and move to most recently used.
    pub fn touch(&mut self, key: &str, now: SystemTime) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.expiry.touch(now);
        entry.hits += 1;
        entry.dirty = true;
        self.recency.touch(key)
    }

    /// Write an element to disk as most recently used.
    ///
    /// Capacity is not checked here; callers make room first.
    pub async fn write(&mut self, element: &Element) -> Result<(), CacheError> {
        let file = match self.entries.get(element.key()) {
            Some(entry) => entry.file.clone(),
            None => self.allocate_file(),
        };

        self.write_file(&file, element).await?;

        self.entries.insert(
            element.key().to_string(),
            DiskEntry {
                file,
                expiry: *element.expiry(),
                hits: element.hits(),
                dirty: false,
            },
        );
        self.recency.record(element.key());
        Ok(())
    }

    /// Remove an element and delete its file.
    ///
    /// Returns the element's expiry metadata if it was resident. A failed
    /// deletion is logged; the element is gone from the index either way.
    pub async fn remove(&mut self, key: &str) -> Option<Expiry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(key);
        self.delete_file(&entry.file).await;
        Some(entry.expiry)
    }

    /// The least recently used resident key.
    pub fn select_victim(&self) -> Option<&str> {
        self.recency.select_victim()
    }

    /// Delete the least recently used element.
    pub async fn evict_lru(&mut self) -> Option<String> {
        let key = self.recency.take_victim()?;
        if let Some(entry) = self.entries.remove(&key) {
            self.delete_file(&entry.file).await;
        }
        Some(key)
    }

    /// Keys of elements that are dead at `now`.
    pub fn expired_keys(&self, now: SystemTime) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.expiry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of resident elements that are live at `now`.
    pub fn live_count(&self, now: SystemTime) -> usize {
        self.entries
            .values()
            .filter(|entry| !entry.expiry.is_expired(now))
            .count()
    }

    /// Resident keys from least to most recently used.
    pub fn keys_lru_first(&self) -> Vec<String> {
        self.recency.keys_lru_first().map(str::to_string).collect()
    }

    /// Remove every element and its file.
    pub async fn clear(&mut self) {
        let entries: Vec<DiskEntry> = self.entries.drain().map(|(_, entry)| entry).collect();
        self.recency.clear();
        for entry in entries {
            self.delete_file(&entry.file).await;
        }
    }

    /// Rewrite files whose access metadata changed since they were written.
    ///
    /// Returns the number of files rewritten. Elements that cannot be
    /// rewritten keep their previous file contents.
    pub async fn flush(&mut self) -> usize {
        let dirty: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.dirty)
            .map(|(key, _)| key.clone())
            .collect();

        let mut rewritten = 0;
        for key in dirty {
            let result = match self.read(&key).await {
                Ok(Some(element)) => self.write_file_for(&key, &element).await,
                Ok(None) => continue,
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => rewritten += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to flush element metadata"),
            }
        }
        rewritten
    }

    /// Delete the tier directory and everything in it.
    pub async fn destroy(&mut self) -> Result<(), CacheError> {
        self.entries.clear();
        self.recency.clear();
        let directory = self.directory.clone();
        self.io(&directory, tokio::fs::remove_dir_all(&directory)).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    async fn write_file_for(&mut self, key: &str, element: &Element) -> Result<(), CacheError> {
        let Some(file) = self.entries.get(key).map(|entry| entry.file.clone()) else {
            return Ok(());
        };
        self.write_file(&file, element).await?;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.dirty = false;
        }
        Ok(())
    }

    fn allocate_file(&mut self) -> PathBuf {
        loop {
            let id = self.next_file_id;
            let (next, wrapped) = id.overflowing_add(1);
            self.next_file_id = next;
            self.ids_wrapped |= wrapped;

            let file = self.directory.join(format!("{:016x}.{}", id, ELEMENT_EXTENSION));
            if !self.ids_wrapped || !self.entries.values().any(|entry| entry.file == file) {
                return file;
            }
        }
    }

    async fn read_file(&self, path: &Path) -> Result<Element, CacheError> {
        let bytes = self.io(path, tokio::fs::read(path)).await?;
        serde_json::from_slice(&bytes).map_err(|e| CacheError::persistent_io(path, e))
    }

    async fn write_file(&self, path: &Path, element: &Element) -> Result<(), CacheError> {
        let bytes = serde_json::to_vec(element).map_err(|e| CacheError::persistent_io(path, e))?;
        let temp_path = path.with_extension(TEMP_EXTENSION);

        self.io(&temp_path, tokio::fs::write(&temp_path, &bytes)).await?;
        if let Err(e) = self.io(path, tokio::fs::rename(&temp_path, path)).await {
            self.delete_file(&temp_path).await;
            return Err(e);
        }
        Ok(())
    }

    async fn delete_file(&self, path: &Path) {
        if let Err(e) = self.io(path, tokio::fs::remove_file(path)).await {
            debug!(path = %path.display(), error = %e, "Failed to delete element file");
        }
    }

    async fn list_files(&self) -> Result<Vec<PathBuf>, CacheError> {
        let directory = &self.directory;
        self.io(directory, async {
            let mut files = Vec::new();
            let mut dir = tokio::fs::read_dir(directory).await?;
            while let Some(entry) = dir.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    files.push(entry.path());
                }
            }
            Ok::<_, io::Error>(files)
        })
        .await
    }

    async fn delete_all_files(&self) -> Result<usize, CacheError> {
        let files = self.list_files().await?;
        let count = files.len();
        for path in files {
            self.delete_file(&path).await;
        }
        Ok(count)
    }

    /// Run a filesystem operation under the tier's I/O timeout.
    async fn io<T>(
        &self,
        path: &Path,
        operation: impl Future<Output = io::Result<T>>,
    ) -> Result<T, CacheError> {
        match tokio::time::timeout(self.io_timeout, operation).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheError::persistent_io(path, e)),
            Err(_) => Err(CacheError::persistent_io(
                path,
                format!("timed out after {:?}", self.io_timeout),
            )),
        }
    }
}

/// Parse the numeric id out of an element file name.
fn file_id(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    u64::from_str_radix(stem, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TIMEOUT: Duration = Duration::from_secs(5);

    async fn open(dir: &Path, capacity: usize, persistent: bool) -> (DiskTier, LoadReport) {
        DiskTier::open(dir.join("test"), capacity, TIMEOUT, persistent)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_disk_tier_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let (tier, report) = open(temp.path(), 10, false).await;
        assert!(tier.directory().is_dir());
        assert!(tier.is_empty());
        assert_eq!(report, LoadReport::default());
    }

    #[tokio::test]
    async fn test_disk_tier_write_and_read() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 10, false).await;

        let element = Element::new("a", b"alpha".to_vec());
        tier.write(&element).await.unwrap();

        assert!(tier.contains("a"));
        assert_eq!(tier.len(), 1);
        let read = tier.read("a").await.unwrap().unwrap();
        assert_eq!(read.value(), b"alpha");
        assert!(tier.read("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disk_tier_rewrite_reuses_file() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 10, false).await;

        tier.write(&Element::new("a", vec![1])).await.unwrap();
        tier.write(&Element::new("a", vec![2])).await.unwrap();

        assert_eq!(tier.len(), 1);
        let files = std::fs::read_dir(tier.directory()).unwrap().count();
        assert_eq!(files, 1);
        assert_eq!(tier.read("a").await.unwrap().unwrap().value(), &[2]);
    }

    #[tokio::test]
    async fn test_disk_tier_remove_deletes_file() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 10, false).await;

        tier.write(&Element::new("a", vec![1])).await.unwrap();
        assert!(tier.remove("a").await.is_some());
        assert!(tier.remove("a").await.is_none());
        assert_eq!(std::fs::read_dir(tier.directory()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_disk_tier_evict_lru_respects_touch() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 2, false).await;

        tier.write(&Element::new("a", vec![1])).await.unwrap();
        tier.write(&Element::new("b", vec![2])).await.unwrap();
        assert!(tier.is_full());

        assert!(tier.touch("a", SystemTime::now()));
        assert_eq!(tier.select_victim(), Some("b"));
        assert_eq!(tier.evict_lru().await.as_deref(), Some("b"));
        assert!(!tier.is_full());
        assert_eq!(tier.keys_lru_first(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_disk_tier_touch_is_reflected_in_read() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 2, false).await;
        tier.write(&Element::new("a", vec![1])).await.unwrap();

        let later = SystemTime::now() + Duration::from_secs(1);
        tier.touch("a", later);
        let read = tier.read("a").await.unwrap().unwrap();
        assert_eq!(read.hits(), 1);
        assert_eq!(read.last_accessed(), later);
    }

    #[tokio::test]
    async fn test_disk_tier_expired_keys() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 10, false).await;
        tier.write(&Element::new("short", vec![1]).with_ttl(Duration::from_secs(1)))
            .await
            .unwrap();
        tier.write(&Element::new("long", vec![2])).await.unwrap();

        let later = SystemTime::now() + Duration::from_secs(2);
        assert_eq!(tier.expired_keys(later), vec!["short".to_string()]);
        assert_eq!(tier.live_count(later), 1);
    }

    #[tokio::test]
    async fn test_disk_tier_scratch_is_cleared_on_open() {
        let temp = TempDir::new().unwrap();
        {
            let (mut tier, _) = open(temp.path(), 10, false).await;
            tier.write(&Element::new("a", vec![1])).await.unwrap();
        }
        let (tier, report) = open(temp.path(), 10, false).await;
        assert!(tier.is_empty());
        assert_eq!(report.scratch_cleared, 1);
    }

    #[tokio::test]
    async fn test_disk_tier_persistent_reload_keeps_recency() {
        let temp = TempDir::new().unwrap();
        {
            let (mut tier, _) = open(temp.path(), 10, true).await;
            for key in ["a", "b", "c"] {
                tier.write(&Element::new(key, key.as_bytes().to_vec()))
                    .await
                    .unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tier.touch("a", SystemTime::now() + Duration::from_millis(50));
            assert_eq!(tier.flush().await, 1);
        }

        let (mut tier, report) = open(temp.path(), 10, true).await;
        assert_eq!(report.loaded, 3);
        assert_eq!(tier.keys_lru_first(), vec!["b", "c", "a"]);
        assert_eq!(tier.read("a").await.unwrap().unwrap().hits(), 1);

        // New files must not collide with reloaded ones
        tier.write(&Element::new("d", vec![4])).await.unwrap();
        assert_eq!(tier.len(), 4);
        assert_eq!(tier.read("b").await.unwrap().unwrap().value(), b"b");
    }

    #[tokio::test]
    async fn test_disk_tier_reload_drops_expired_unreadable_and_excess() {
        let temp = TempDir::new().unwrap();
        let dir = {
            let (mut tier, _) = open(temp.path(), 10, true).await;
            tier.write(&Element::new("gone", vec![0]).with_ttl(Duration::from_millis(10)))
                .await
                .unwrap();
            for key in ["a", "b", "c"] {
                tier.write(&Element::new(key, vec![1])).await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            tier.directory().to_path_buf()
        };
        std::fs::write(dir.join("garbage.element"), b"not json").unwrap();
        std::fs::write(dir.join("0000000000000099.tmp"), b"partial").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let (tier, report) = open(temp.path(), 2, true).await;
        assert_eq!(report.expired, 1);
        assert_eq!(report.unreadable, 1);
        assert_eq!(report.over_capacity, 1);
        assert_eq!(report.loaded, 2);
        assert_eq!(tier.keys_lru_first(), vec!["b", "c"]);
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_disk_tier_clear_and_destroy() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 10, false).await;
        tier.write(&Element::new("a", vec![1])).await.unwrap();
        tier.clear().await;
        assert!(tier.is_empty());

        let dir = tier.directory().to_path_buf();
        tier.destroy().await.unwrap();
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_disk_tier_read_failure_is_persistent_io() {
        let temp = TempDir::new().unwrap();
        let (mut tier, _) = open(temp.path(), 10, false).await;
        tier.write(&Element::new("a", vec![1])).await.unwrap();
        for entry in std::fs::read_dir(tier.directory()).unwrap() {
            std::fs::remove_file(entry.unwrap().path()).unwrap();
        }

        let result = tier.read("a").await;
        assert!(matches!(result, Err(CacheError::PersistentIo { .. })));
    }

    #[tokio::test]
    async fn test_disk_tier_highest_file_id_does_not_overflow() {
        let temp = TempDir::new().unwrap();
        let dir = {
            let (mut tier, _) = open(temp.path(), 10, true).await;
            tier.write(&Element::new("a", vec![1])).await.unwrap();
            tier.directory().to_path_buf()
        };
        std::fs::rename(
            dir.join("0000000000000000.element"),
            dir.join("ffffffffffffffff.element"),
        )
        .unwrap();

        let (mut tier, report) = open(temp.path(), 10, true).await;
        assert_eq!(report.loaded, 1);
        tier.write(&Element::new("b", vec![2])).await.unwrap();
        tier.write(&Element::new("c", vec![3])).await.unwrap();

        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 3);
        assert_eq!(tier.read("a").await.unwrap().unwrap().value(), &[1]);
        assert_eq!(tier.read("b").await.unwrap().unwrap().value(), &[2]);
        assert_eq!(tier.read("c").await.unwrap().unwrap().value(), &[3]);
    }

    #[test]
    fn test_file_id_parsing() {
        assert_eq!(file_id(Path::new("/x/000000000000000a.element")), Some(10));
        assert_eq!(file_id(Path::new("/x/garbage.element")), None);
    }
}
