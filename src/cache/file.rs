//! File-tree cache storage: one JSON file per cache key.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::traits::{CacheEntry, CacheError, CacheStorage};

/// Cache storage that keeps each entry in `<dir>/<key>.json`.
///
/// When opened inside a tokio runtime a background task removes expired
/// files every `check_interval`. The task is aborted when the storage drops.
pub struct FileStorage {
  dir: PathBuf,
  tmp_counter: AtomicU64,
  sweeper: Option<JoinHandle<()>>,
}

impl FileStorage {
  pub fn open(dir: &Path, check_interval: Duration) -> Result<Self> {
    std::fs::create_dir_all(dir)
      .map_err(|e| eyre!("Failed to create cache directory {}: {}", dir.display(), e))?;

    let sweeper = match tokio::runtime::Handle::try_current() {
      Ok(handle) => Some(handle.spawn(sweep_loop(dir.to_path_buf(), check_interval))),
      Err(_) => {
        debug!("No async runtime, file cache sweeper not started");
        None
      }
    };

    Ok(Self {
      dir: dir.to_path_buf(),
      tmp_counter: AtomicU64::new(0),
      sweeper,
    })
  }

  fn entry_path(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{}.json", key))
  }

  /// Remove every expired entry file. Returns the number removed.
  pub fn sweep_expired(&self, now: DateTime<Utc>) -> Result<usize, CacheError> {
    sweep_dir(&self.dir, now)
  }
}

impl Drop for FileStorage {
  fn drop(&mut self) {
    if let Some(handle) = self.sweeper.take() {
      handle.abort();
    }
  }
}

impl CacheStorage for FileStorage {
  fn put(&self, key: &str, entry: &CacheEntry) -> Result<(), CacheError> {
    // Directory may have been removed since open.
    std::fs::create_dir_all(&self.dir)?;

    let data = serde_json::to_vec(entry)?;
    let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
    let tmp = self
      .dir
      .join(format!("{}.{}.{}.tmp", key, std::process::id(), n));

    std::fs::write(&tmp, data)?;
    if let Err(e) = std::fs::rename(&tmp, self.entry_path(key)) {
      let _ = std::fs::remove_file(&tmp);
      return Err(e.into());
    }

    Ok(())
  }

  fn get(
    &self,
    key: &str,
    now: DateTime<Utc>,
    include_expired: bool,
  ) -> Result<Option<CacheEntry>, CacheError> {
    let data = match std::fs::read(self.entry_path(key)) {
      Ok(data) => data,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let entry: CacheEntry = serde_json::from_slice(&data)?;
    if entry.is_expired(now) && !include_expired {
      return Ok(None);
    }

    Ok(Some(entry))
  }
}

async fn sweep_loop(dir: PathBuf, check_interval: Duration) {
  let mut ticker = tokio::time::interval(check_interval);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

  loop {
    ticker.tick().await;
    match sweep_dir(&dir, Utc::now()) {
      Ok(0) => {}
      Ok(n) => debug!(removed = n, dir = %dir.display(), "Swept expired cache files"),
      Err(e) => warn!(error = %e, dir = %dir.display(), "Cache sweep failed"),
    }
  }
}

fn sweep_dir(dir: &Path, now: DateTime<Utc>) -> Result<usize, CacheError> {
  let mut removed = 0;

  let entries = match std::fs::read_dir(dir) {
    Ok(entries) => entries,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
    Err(e) => return Err(e.into()),
  };

  for dir_entry in entries {
    let path = dir_entry?.path();
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
      continue;
    }

    let expired = match std::fs::read(&path) {
      Ok(data) => match serde_json::from_slice::<CacheEntry>(&data) {
        Ok(entry) => entry.is_expired(now),
        // Unreadable entries can never be served.
        Err(_) => true,
      },
      Err(e) if e.kind() == ErrorKind::NotFound => false,
      Err(e) => return Err(e.into()),
    };

    if expired {
      match std::fs::remove_file(&path) {
        Ok(()) => removed += 1,
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
      }
    }
  }

  Ok(removed)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::HttpResponse;
  use tempfile::TempDir;

  fn entry(body: &str, stored_at: DateTime<Utc>, ttl_secs: u64) -> CacheEntry {
    CacheEntry::new(
      HttpResponse::new(200, body),
      stored_at,
      Duration::from_secs(ttl_secs),
    )
  }

  #[test]
  fn test_creates_directory_on_open() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("a").join("b");
    let _storage = FileStorage::open(&dir, Duration::from_secs(60)).unwrap();
    assert!(dir.is_dir());
  }

  #[test]
  fn test_put_get_roundtrip_preserves_bytes() {
    let temp = TempDir::new().unwrap();
    let storage = FileStorage::open(temp.path(), Duration::from_secs(60)).unwrap();
    let now = Utc::now();
    let stored = entry("{\"temp_c\":21.5}", now, 60);

    storage.put("abc", &stored).unwrap();
    let cached = storage.get("abc", now, false).unwrap().unwrap();

    assert_eq!(cached, stored);
    assert!(temp.path().join("abc.json").exists());
  }

  #[test]
  fn test_missing_key_is_miss() {
    let temp = TempDir::new().unwrap();
    let storage = FileStorage::open(temp.path(), Duration::from_secs(60)).unwrap();
    assert!(storage.get("nope", Utc::now(), true).unwrap().is_none());
  }

  #[test]
  fn test_expired_entry_only_with_include_expired() {
    let temp = TempDir::new().unwrap();
    let storage = FileStorage::open(temp.path(), Duration::from_secs(60)).unwrap();
    let now = Utc::now();
    storage
      .put("k", &entry("old", now - chrono::Duration::seconds(600), 60))
      .unwrap();

    assert!(storage.get("k", now, false).unwrap().is_none());
    assert!(storage.get("k", now, true).unwrap().is_some());
  }

  #[test]
  fn test_sweep_removes_only_expired() {
    let temp = TempDir::new().unwrap();
    let storage = FileStorage::open(temp.path(), Duration::from_secs(60)).unwrap();
    let now = Utc::now();
    storage
      .put("old", &entry("old", now - chrono::Duration::seconds(600), 60))
      .unwrap();
    storage.put("new", &entry("new", now, 60)).unwrap();
    std::fs::write(temp.path().join("garbage.json"), b"not json").unwrap();

    assert_eq!(storage.sweep_expired(now).unwrap(), 2);
    assert!(!temp.path().join("old.json").exists());
    assert!(temp.path().join("new.json").exists());
  }

  #[tokio::test(start_paused = true)]
  async fn test_background_sweeper_runs_on_interval() {
    let temp = TempDir::new().unwrap();
    let storage = FileStorage::open(temp.path(), Duration::from_secs(60)).unwrap();
    storage
      .put(
        "old",
        &entry("old", Utc::now() - chrono::Duration::seconds(600), 60),
      )
      .unwrap();

    // First tick fires immediately; give the sweeper a chance to run.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!temp.path().join("old.json").exists());
  }
}
