use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::CloneError;
use crate::url_resolver::{classify, local_filename, AssetCategory};

/// A downloaded asset and where it lives inside the clone folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub source_url: String,
    /// Forward-slash path relative to the clone folder, e.g. `assets/css/<hash>.css`
    pub local_path: String,
    pub category: AssetCategory,
}

/// Source URL to downloaded asset, for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetMap {
    records: BTreeMap<String, AssetRecord>,
}

impl AssetMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: AssetRecord) {
        self.records.insert(record.source_url.clone(), record);
    }

    pub fn get(&self, url: &str) -> Option<&AssetRecord> {
        self.records.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records.values()
    }

    /// Records ordered by source URL length, longest first.
    pub fn longest_first(&self) -> Vec<&AssetRecord> {
        let mut records: Vec<&AssetRecord> = self.records.values().collect();
        records.sort_by(|a, b| {
            b.source_url
                .len()
                .cmp(&a.source_url.len())
                .then_with(|| a.source_url.cmp(&b.source_url))
        });
        records
    }
}

impl FromIterator<AssetRecord> for AssetMap {
    fn from_iter<I: IntoIterator<Item = AssetRecord>>(iter: I) -> Self {
        let mut map = AssetMap::new();
        for record in iter {
            map.insert(record);
        }
        map
    }
}

type Slot = Arc<OnceCell<Option<AssetRecord>>>;

/// Create a fresh folder named `name` under `root`, or `name-1`, `name-2`, ...
/// when that name is taken. Returns the folder name and its path; the folder
/// did not exist before this call.
pub async fn claim_folder(root: &Path, name: &str) -> Result<(String, PathBuf), CloneError> {
    tokio::fs::create_dir_all(root)
        .await
        .map_err(|e| CloneError::write(root, e))?;

    let mut attempt = 0u32;
    loop {
        let candidate = match attempt {
            0 => name.to_string(),
            n => format!("{}-{}", name, n),
        };
        let path = root.join(&candidate);
        match tokio::fs::create_dir(&path).await {
            Ok(()) => return Ok((candidate, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(CloneError::write(&path, e)),
        }
    }
}

/// On-disk asset storage for one clone folder.
///
/// Each URL gets exactly one slot: the first caller runs the download, every
/// concurrent or later caller for the same URL waits on and reuses its outcome.
pub struct AssetStore {
    base_dir: PathBuf,
    slots: DashMap<String, Slot>,
}

impl AssetStore {
    /// Open a store rooted at `base_dir`, creating its `assets/` directory.
    pub async fn new(base_dir: &Path) -> Result<Self, CloneError> {
        let base_dir = base_dir.to_path_buf();
        let assets_dir = base_dir.join("assets");
        tokio::fs::create_dir_all(&assets_dir)
            .await
            .map_err(|e| CloneError::write(&assets_dir, e))?;

        Ok(Self {
            base_dir,
            slots: DashMap::new(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Relative path an asset URL is stored under.
    pub fn local_path_for(url: &str) -> (AssetCategory, String) {
        let category = classify(url);
        let path = format!("assets/{}/{}", category.dir_name(), local_filename(url));
        (category, path)
    }

    pub fn absolute_path(&self, local_path: &str) -> PathBuf {
        let mut path = self.base_dir.clone();
        for segment in local_path.split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    /// Write asset bytes under their category directory.
    pub async fn save(&self, url: &str, content: &[u8]) -> std::io::Result<AssetRecord> {
        let (category, local_path) = Self::local_path_for(url);
        let file_path = self.absolute_path(&local_path);

        if let Some(parent) = file_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&file_path, content).await?;

        Ok(AssetRecord {
            source_url: url.to_string(),
            local_path,
            category,
        })
    }

    /// Return the stored record for `url`, running `download` only if no
    /// other caller has claimed the URL yet.
    pub async fn get_or_download<F, Fut>(&self, url: &str, download: F) -> Option<AssetRecord>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Option<AssetRecord>>,
    {
        let slot = self
            .slots
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        slot.get_or_init(download).await.clone()
    }

    pub fn get(&self, url: &str) -> Option<AssetRecord> {
        self.slots
            .get(url)
            .and_then(|slot| slot.get().cloned().flatten())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.get(url).is_some()
    }

    /// Snapshot of every successfully stored asset.
    pub fn asset_map(&self) -> AssetMap {
        self.slots
            .iter()
            .filter_map(|entry| entry.value().get().cloned().flatten())
            .collect()
    }
}
