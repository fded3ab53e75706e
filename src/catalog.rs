//! The dataset catalog: a cached, self-refreshing view of the datasets root.
//!
//! The catalog holds one immutable snapshot (an `Arc<DatasetMap>`) plus the
//! filesystem [`Signature`] captured when it was built. Readers clone the
//! `Arc` and work lock-free against it. A refresh runs [`discover`] under a
//! mutex, so at most one rescan is in flight, and publishes the new snapshot
//! with a single pointer swap.
//!
//! ## When does it rescan?
//!
//! - no snapshot yet
//! - the caller forces it
//! - the signature changed (latest mtime of the root and its child folders,
//!   plus the sorted child folder names)
//!
//! The signature is cheap and catches datasets being added, removed or
//! renamed. It does not notice edits deep inside an unchanged folder.
//!
//! ## Paths
//!
//! Every row path handed to the filesystem goes through [`resolve_within`]
//! first. Absolute paths and `..` segments that climb above the dataset root
//! are rejected with [`CatalogError::InvalidPath`], never corrected.

use crate::imaging::{BackendError, FormatFamily, ImageBackend};
use crate::naming::normalize_rel_path;
use crate::scan::{child_dirs, discover};
use crate::types::{DatasetIndex, DatasetInfo, DatasetMap, Row, Sample};
use image::RgbImage;
use rand::Rng;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Dataset not found: {0}")]
    DatasetNotFound(String),
    #[error("Dataset has no rows: {0}")]
    EmptyDataset(String),
    #[error("Image not found: {0}")]
    ImageNotFound(String),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Imaging(#[from] BackendError),
}

/// Cheap fingerprint of the datasets root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    latest_mtime: Option<SystemTime>,
    children: Vec<String>,
}

impl Signature {
    pub fn capture(root: &Path) -> Self {
        let dirs = child_dirs(root);
        let latest_mtime = std::iter::once(root)
            .chain(dirs.iter().map(PathBuf::as_path))
            .filter_map(|p| p.metadata().and_then(|m| m.modified()).ok())
            .max();
        let mut children: Vec<String> = dirs
            .iter()
            .filter_map(|d| d.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect();
        children.sort();
        Self {
            latest_mtime,
            children,
        }
    }
}

/// How [`Catalog::sample_row`] picks a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Uniform draw over all rows.
    Random,
    /// The given index, clamped into range.
    Index(usize),
}

struct Cached {
    datasets: Arc<DatasetMap>,
    signature: Signature,
}

/// Shared, refreshable view of every dataset under one root.
pub struct Catalog {
    root: PathBuf,
    cached: RwLock<Option<Cached>>,
    refresh_lock: Mutex<()>,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cached: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current snapshot, rescanning if forced, missing or stale.
    pub fn get(&self, force_refresh: bool) -> Arc<DatasetMap> {
        if !force_refresh {
            if let Some(datasets) = self.fresh_snapshot(&Signature::capture(&self.root)) {
                return datasets;
            }
        }
        self.refresh(force_refresh)
    }

    fn fresh_snapshot(&self, signature: &Signature) -> Option<Arc<DatasetMap>> {
        let cached = self.cached.read().unwrap_or_else(PoisonError::into_inner);
        cached
            .as_ref()
            .filter(|c| &c.signature == signature)
            .map(|c| Arc::clone(&c.datasets))
    }

    fn refresh(&self, force: bool) -> Arc<DatasetMap> {
        let _guard = self
            .refresh_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Captured before scanning so changes made mid-scan trigger another pass.
        let signature = Signature::capture(&self.root);
        if !force {
            if let Some(datasets) = self.fresh_snapshot(&signature) {
                return datasets;
            }
        }

        let datasets = Arc::new(discover(&self.root));
        info!(
            root = %self.root.display(),
            datasets = datasets.len(),
            forced = force,
            "catalog refreshed"
        );
        *self.cached.write().unwrap_or_else(PoisonError::into_inner) = Some(Cached {
            datasets: Arc::clone(&datasets),
            signature,
        });
        datasets
    }

    /// `(key, display name)` pairs, sorted by key.
    pub fn list(&self) -> Vec<(String, String)> {
        self.get(false)
            .iter()
            .map(|(key, ds)| (key.clone(), ds.display_name().to_string()))
            .collect()
    }

    /// Look up one dataset, forcing one refresh before giving up.
    pub fn dataset(&self, key: &str) -> Result<Arc<DatasetIndex>, CatalogError> {
        if let Some(ds) = self.get(false).get(key) {
            return Ok(Arc::clone(ds));
        }
        debug!(dataset = key, "dataset not cached, forcing refresh");
        self.get(true)
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::DatasetNotFound(key.to_string()))
    }

    /// Declared metadata merged with the derived fields.
    pub fn info(&self, key: &str) -> Result<DatasetInfo, CatalogError> {
        Ok(self.dataset(key)?.info())
    }

    /// Pick one row. A missing image triggers one forced refresh and a retry.
    pub fn sample_row(
        &self,
        key: &str,
        mode: SampleMode,
        rng: &mut impl Rng,
    ) -> Result<Sample, CatalogError> {
        let ds = self.dataset(key)?;
        let (index, row) = pick_row(&ds, mode, rng)?;
        if resolve_within(&ds.root, &row.path)?.is_file() {
            return Ok(to_sample(key, index, row));
        }

        debug!(dataset = key, path = %row.path, "sampled image missing, forcing refresh");
        let ds = self
            .get(true)
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::DatasetNotFound(key.to_string()))?;
        let (index, row) = pick_row(&ds, mode, rng)?;
        if resolve_within(&ds.root, &row.path)?.is_file() {
            Ok(to_sample(key, index, row))
        } else {
            Err(CatalogError::ImageNotFound(row.path.clone()))
        }
    }

    /// Absolute path of `rel` inside dataset `key`, which must exist.
    pub fn resolve_path(&self, key: &str, rel: &str) -> Result<PathBuf, CatalogError> {
        let ds = self.dataset(key)?;
        let path = resolve_within(&ds.root, rel)?;
        if path.is_file() {
            return ensure_contained(&ds.root, path, rel);
        }

        let ds = self
            .get(true)
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::DatasetNotFound(key.to_string()))?;
        let path = resolve_within(&ds.root, rel)?;
        if path.is_file() {
            ensure_contained(&ds.root, path, rel)
        } else {
            Err(CatalogError::ImageNotFound(rel.to_string()))
        }
    }

    /// Row paths of dataset `key` in catalog row order: `index.csv` order when
    /// the dataset has one, otherwise the sorted scan of `images/`.
    pub fn row_paths(&self, key: &str) -> Result<Vec<String>, CatalogError> {
        Ok(self
            .dataset(key)?
            .rows
            .iter()
            .map(|row| row.path.clone())
            .collect())
    }

    /// Decode one dataset image, along with the encoder family it came from.
    pub fn load_image(
        &self,
        backend: &impl ImageBackend,
        key: &str,
        rel: &str,
    ) -> Result<(RgbImage, FormatFamily), CatalogError> {
        let path = self.resolve_path(key, rel)?;
        let img = backend.load(&path)?;
        Ok((img, FormatFamily::from_path(&path)))
    }
}

fn pick_row<'a>(
    ds: &'a DatasetIndex,
    mode: SampleMode,
    rng: &mut impl Rng,
) -> Result<(usize, &'a Row), CatalogError> {
    if ds.rows.is_empty() {
        return Err(CatalogError::EmptyDataset(ds.key.clone()));
    }
    let index = match mode {
        SampleMode::Index(i) => i.min(ds.rows.len() - 1),
        SampleMode::Random => rng.gen_range(0..ds.rows.len()),
    };
    Ok((index, &ds.rows[index]))
}

fn to_sample(key: &str, index: usize, row: &Row) -> Sample {
    Sample {
        dataset_key: key.to_string(),
        index_used: index,
        label: row.class.clone(),
        path: row.path.clone(),
    }
}

/// Lexically join `rel` onto `root`, rejecting anything that leaves it.
pub fn resolve_within(root: &Path, rel: &str) -> Result<PathBuf, CatalogError> {
    let invalid = || CatalogError::InvalidPath(rel.to_string());
    let normalized = normalize_rel_path(rel);
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop().ok_or_else(invalid)?;
            }
            Component::RootDir | Component::Prefix(_) => return Err(invalid()),
        }
    }
    if parts.is_empty() {
        return Err(invalid());
    }
    Ok(parts.iter().fold(root.to_path_buf(), |acc, p| acc.join(p)))
}

/// Reject existing paths that escape the root through symlinks.
fn ensure_contained(root: &Path, path: PathBuf, rel: &str) -> Result<PathBuf, CatalogError> {
    let real_root = root.canonicalize()?;
    if path.canonicalize()?.starts_with(&real_root) {
        Ok(path)
    } else {
        Err(CatalogError::InvalidPath(rel.to_string()))
    }
}
