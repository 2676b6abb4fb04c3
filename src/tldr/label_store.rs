use crate::error::TldrError;
use crate::tldr::labels::{LabelStore, StoredLabel};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// Label ids map into the negative feed-id range below this base.
pub const LABEL_BASE_INDEX: i64 = -1024;

pub fn label_to_feed_id(label_id: i64) -> i64 {
    LABEL_BASE_INDEX - 1 - label_id
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelRecord {
    pub id: i64,
    pub owner_uid: i64,
    pub caption: String,
    pub fg_color: String,
    pub bg_color: String,
}

impl LabelRecord {
    fn to_stored(&self) -> StoredLabel {
        StoredLabel {
            id: self.id,
            caption: self.caption.clone(),
            fg_color: self.fg_color.clone(),
            bg_color: self.bg_color.clone(),
        }
    }

    fn matches(&self, owner_uid: i64, caption_lower: &str) -> bool {
        self.owner_uid == owner_uid && self.caption.to_lowercase() == caption_lower
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelTable {
    #[serde(default)]
    pub next_id: i64,
    #[serde(default)]
    pub labels: Vec<LabelRecord>,
}

impl LabelTable {
    fn allocate_id(&mut self) -> i64 {
        let max_seen = self.labels.iter().map(|l| l.id).max().unwrap_or(0);
        let id = self.next_id.max(max_seen + 1).max(1);
        self.next_id = id + 1;
        id
    }
}

/// JSON-file label table. Every operation holds an exclusive lock on a
/// sidecar `.lock` file, so concurrent processes serialize their inserts.
#[derive(Debug, Clone)]
pub struct JsonLabelStore {
    path: PathBuf,
}

fn store_err(context: &str, path: &Path, err: impl std::fmt::Display) -> TldrError {
    TldrError::Store(format!("{context} {}: {err}", path.display()))
}

impl JsonLabelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "labels.json".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn lock(&self) -> Result<File, TldrError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|err| store_err("failed to create", parent, err))?;
        }
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| store_err("failed to open", &lock_path, err))?;
        file.lock_exclusive()
            .map_err(|err| store_err("failed to lock", &lock_path, err))?;
        Ok(file)
    }

    pub fn load(&self) -> Result<LabelTable, TldrError> {
        if !self.path.exists() {
            return Ok(LabelTable::default());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|err| store_err("failed to read", &self.path, err))?;
        if raw.trim().is_empty() {
            return Ok(LabelTable::default());
        }
        serde_json::from_str(&raw).map_err(|err| store_err("failed to parse", &self.path, err))
    }

    fn save(&self, table: &LabelTable) -> Result<(), TldrError> {
        let data = serde_json::to_string_pretty(table)
            .map_err(|err| store_err("failed to encode", &self.path, err))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, format!("{data}\n"))
            .map_err(|err| store_err("failed to write", &tmp, err))?;
        fs::rename(&tmp, &self.path).map_err(|err| store_err("failed to replace", &self.path, err))
    }

    fn with_table<T>(&self, f: impl FnOnce(&LabelTable) -> T) -> Result<T, TldrError> {
        let guard = self.lock()?;
        let table = self.load()?;
        let out = f(&table);
        drop(guard);
        Ok(out)
    }
}

impl LabelStore for JsonLabelStore {
    fn find_by_caption(
        &self,
        owner_uid: i64,
        caption: &str,
    ) -> Result<Option<StoredLabel>, TldrError> {
        let wanted = caption.to_lowercase();
        self.with_table(|table| {
            table
                .labels
                .iter()
                .find(|record| record.matches(owner_uid, &wanted))
                .map(LabelRecord::to_stored)
        })
    }

    fn insert(
        &self,
        owner_uid: i64,
        caption: &str,
        fg_color: &str,
        bg_color: &str,
    ) -> Result<i64, TldrError> {
        let caption = caption.trim();
        if caption.is_empty() {
            return Err(TldrError::Store("label caption cannot be empty".to_string()));
        }

        let _guard = self.lock()?;
        let mut table = self.load()?;
        let wanted = caption.to_lowercase();
        if table
            .labels
            .iter()
            .any(|record| record.matches(owner_uid, &wanted))
        {
            return Err(TldrError::StoreConflict {
                owner_uid,
                caption: caption.to_string(),
            });
        }

        let id = table.allocate_id();
        table.labels.push(LabelRecord {
            id,
            owner_uid,
            caption: caption.to_string(),
            fg_color: fg_color.to_string(),
            bg_color: bg_color.to_string(),
        });
        self.save(&table)?;
        tracing::info!(owner_uid, label_id = id, caption, "created label");
        Ok(id)
    }

    fn captions_for_owner(&self, owner_uid: i64) -> Result<Vec<String>, TldrError> {
        self.with_table(|table| {
            let mut captions: Vec<String> = table
                .labels
                .iter()
                .filter(|record| record.owner_uid == owner_uid)
                .map(|record| record.caption.clone())
                .collect();
            captions.sort();
            captions
        })
    }

    fn label_to_feed_id(&self, label_id: i64) -> i64 {
        label_to_feed_id(label_id)
    }
}
