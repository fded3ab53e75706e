//! Shared types handed out by the catalog and consumed by the export stage.
//!
//! A [`DatasetIndex`] is rebuilt wholesale on every catalog refresh and is
//! never mutated afterwards; callers only ever see it behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Free-form dataset metadata as read from `metadata.json`.
pub type DatasetMeta = serde_json::Map<String, serde_json::Value>;

/// All discovered datasets, keyed and ordered by dataset key.
pub type DatasetMap = BTreeMap<String, Arc<DatasetIndex>>;

/// Partition tag used when a row does not declare one.
pub const DEFAULT_SPLIT: &str = "train";

/// One physical image entry of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Stable-ish label; may be empty.
    pub id: String,
    /// Path relative to the dataset root, forward-slash separated.
    pub path: String,
    /// Class label.
    #[serde(rename = "class")]
    pub class: String,
    /// Partition tag (`train` when absent).
    pub split: String,
}

/// In-memory index of one dataset folder.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetIndex {
    pub key: String,
    pub root: PathBuf,
    /// Ordered, de-duplicated class labels.
    pub classes: Vec<String>,
    pub rows: Vec<Row>,
    /// Row count per class.
    pub approx_count: BTreeMap<String, usize>,
    pub meta: DatasetMeta,
}

impl DatasetIndex {
    /// Declared `name`, falling back to the key.
    pub fn display_name(&self) -> &str {
        self.meta
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.key)
    }

    /// Declared metadata merged with the derived fields.
    pub fn info(&self) -> DatasetInfo {
        let mut extra = self.meta.clone();
        for derived in [
            "key",
            "name",
            "description",
            "image_shape",
            "version",
            "num_classes",
            "classes",
            "approx_count",
        ] {
            extra.remove(derived);
        }

        let image_shape = self
            .meta
            .get("image_shape")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_else(|| vec![None, None, Some(3)]);

        DatasetInfo {
            key: self.key.clone(),
            name: self.display_name().to_string(),
            description: string_field(&self.meta, "description"),
            image_shape,
            version: string_field(&self.meta, "version"),
            num_classes: self.classes.len(),
            classes: self.classes.clone(),
            approx_count: self.approx_count.clone(),
            extra,
        }
    }
}

fn string_field(meta: &DatasetMeta, field: &str) -> Option<String> {
    meta.get(field).and_then(|v| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Metadata record returned by [`Catalog::info`](crate::catalog::Catalog::info).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub key: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `[height, width, channels]`; unknown entries are `null`.
    pub image_shape: Vec<Option<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub num_classes: usize,
    pub classes: Vec<String>,
    pub approx_count: BTreeMap<String, usize>,
    /// Custom fields carried through from `metadata.json`.
    #[serde(flatten)]
    pub extra: DatasetMeta,
}

/// A single drawn sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub dataset_key: String,
    pub index_used: usize,
    pub label: String,
    pub path: String,
}
