use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tracing::info;

use crate::core::BUCKET_SECS;

/// The three append-only CSV handles for one time bucket.
#[derive(Debug)]
pub struct OutFiles {
    pub txs: File,
    pub sourcelog: File,
    pub trash: File,
    pub txs_path: PathBuf,
    pub sourcelog_path: PathBuf,
    pub trash_path: PathBuf,
}

/// Lazily opened, time-bucketed output files with deterministic paths.
///
/// Bucket values are shared as `Arc<OutFiles>` so the consumer never writes
/// under the map lock; handles close when the housekeeper evicts a bucket
/// and the last reference drops.
#[derive(Debug)]
pub struct OutFileCache {
    out_dir: PathBuf,
    uid: String,
    inner: RwLock<HashMap<i64, Arc<OutFiles>>>,
}

/// Bucket key for a unix timestamp: down-rounded to the bucket start.
pub fn bucket_for(timestamp: i64) -> i64 {
    timestamp / BUCKET_SECS * BUCKET_SECS
}

impl OutFileCache {
    pub fn new(out_dir: impl Into<PathBuf>, uid: impl Into<String>) -> Self {
        Self {
            out_dir: out_dir.into(),
            uid: uid.into(),
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the output files for a unix timestamp, opening them if this
    /// is the bucket's first arrival. The flag reports whether the files
    /// were just created.
    pub fn get_or_open(&self, timestamp: i64) -> io::Result<(Arc<OutFiles>, bool)> {
        let bucket = bucket_for(timestamp);

        if let Some(files) = self.inner.read().unwrap().get(&bucket) {
            return Ok((files.clone(), false));
        }

        let mut map = self.inner.write().unwrap();
        // lost the race between the read probe and the upgrade
        if let Some(files) = map.get(&bucket) {
            return Ok((files.clone(), false));
        }

        let files = Arc::new(open_bucket(&self.out_dir, &self.uid, bucket)?);
        map.insert(bucket, files.clone());
        Ok((files, true))
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every bucket older than twice the bucket width. The slack
    /// absorbs arrivals whose adapter timestamps lag behind real time.
    /// Returns the (before, after) sizes for the housekeeper's stats record.
    pub fn evict_expired(&self, now_unix: i64) -> (usize, usize) {
        let mut map = self.inner.write().unwrap();
        let before = map.len();
        map.retain(|bucket, files| {
            let keep = now_unix - bucket <= 2 * BUCKET_SECS;
            if !keep {
                info!(bucket, path = %files.txs_path.display(), "closing output files");
            }
            keep
        });
        (before, map.len())
    }
}

/// Open the three category files for one bucket, creating directories as
/// needed. Any failure aborts the whole open; files opened so far close on
/// drop.
fn open_bucket(out_dir: &Path, uid: &str, bucket: i64) -> io::Result<OutFiles> {
    let t = DateTime::<Utc>::from_timestamp(bucket, 0)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "bucket timestamp out of range"))?;
    let day = t.format("%Y-%m-%d").to_string();
    let stamp = t.format("%Y-%m-%d_%H-%M").to_string();

    let open = |category: &str, prefix: &str| -> io::Result<(File, PathBuf)> {
        let dir = out_dir.join(&day).join(category);
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{prefix}_{stamp}_{uid}.csv"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(&path)?;
        Ok((file, path))
    };

    let (txs, txs_path) = open("transactions", "txs")?;
    let (sourcelog, sourcelog_path) = open("sourcelog", "src")?;
    let (trash, trash_path) = open("trash", "trash")?;

    Ok(OutFiles {
        txs,
        sourcelog,
        trash,
        txs_path,
        sourcelog_path,
        trash_path,
    })
}
