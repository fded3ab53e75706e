//! Batch export: run a pipeline over a subset of one dataset and write the
//! results as a new dataset.
//!
//! ## Output Structure
//!
//! ```text
//! datasets/
//! ├── recyclables-mini/            # Base dataset
//! └── demo/                        # New dataset (key = sanitized name)
//!     ├── metadata.json            # Provenance: base, ops, digest, counts
//!     └── images/
//!         ├── glass/001.jpg        # JPEG sources stay JPEG
//!         └── plastic/009.png      # Everything else becomes PNG
//! ```
//!
//! ## Atomicity
//!
//! Everything is written under a hidden staging folder
//! (`.staging-<key>-<pid>-<nanos>`) next to the target, which discovery
//! ignores. Only after every image and the metadata are on disk is the
//! staging folder renamed to the final key; with `overwrite`, the old folder
//! is removed immediately before that rename. Any failure drops the staging
//! folder and leaves the datasets root as it was.
//!
//! ## Parallel Processing
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon).
//! Per-image work is stateless; only the metadata write happens once, after
//! all images succeed.

use crate::catalog::{Catalog, CatalogError};
use crate::imaging::pipeline;
use crate::imaging::{
    BackendError, FormatFamily, ImageBackend, OperationSpec, PipelineError, Quality, RustBackend,
    UnknownOps,
};
use crate::naming::{class_from_path, file_name, normalize_rel_path, sanitize_key};
use crate::scan::{IMAGES_DIR, METADATA_FILE};
use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Format tag recorded in exported metadata.
pub const EXPORT_FORMAT: &str = "same_as_source";
/// Version tag recorded in exported metadata.
pub const EXPORT_VERSION: &str = "1.0.0";
/// Key used when a requested name sanitizes to nothing.
pub const DEFAULT_EXPORT_KEY: &str = "processed";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No images selected for export")]
    EmptySelection,
    #[error("Dataset '{0}' already exists")]
    ExportConflict(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Subset selection
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SubsetMode {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "firstN")]
    FirstN,
    #[serde(rename = "randomN")]
    RandomN,
}

/// Which rows of the base dataset to export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsetSpec {
    pub mode: SubsetMode,
    /// Subset size for `firstN`/`randomN` (at least 1).
    pub n: usize,
    /// Reorder the selected rows afterwards.
    pub shuffle: bool,
}

impl Default for SubsetSpec {
    fn default() -> Self {
        Self {
            mode: SubsetMode::All,
            n: 1,
            shuffle: false,
        }
    }
}

impl SubsetSpec {
    pub fn select(&self, paths: &[String], rng: &mut impl Rng) -> Vec<String> {
        let n = self.n.max(1);
        let mut selected = match self.mode {
            SubsetMode::All => paths.to_vec(),
            SubsetMode::FirstN => paths.iter().take(n).cloned().collect(),
            SubsetMode::RandomN => {
                let mut all = paths.to_vec();
                all.shuffle(rng);
                all.truncate(n);
                all
            }
        };
        if self.shuffle {
            selected.shuffle(rng);
        }
        selected
    }
}

// =============================================================================
// Request / result
// =============================================================================

/// One export: which rows, which pipeline, and where to.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub base_dataset: String,
    /// Row paths relative to the base dataset root.
    pub paths: Vec<String>,
    pub ops: Vec<OperationSpec>,
    /// Free-form name; sanitized into the new key.
    pub new_name: String,
    pub overwrite: bool,
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub jpeg_quality: Quality,
    pub default_key: String,
    pub unknown_ops: UnknownOps,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: Quality::default(),
            default_key: DEFAULT_EXPORT_KEY.to_string(),
            unknown_ops: UnknownOps::default(),
        }
    }
}

/// Progress reported while an export runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    Started { new_key: String, total: usize },
    ImageWritten { path: String },
    Finished { processed: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub base_dataset: String,
    pub new_key: String,
    pub processed: usize,
    pub classes: Vec<String>,
    pub path: PathBuf,
}

/// Metadata written alongside the exported images.
#[derive(Debug, Serialize)]
struct ExportMetadata<'a> {
    key: &'a str,
    name: &'a str,
    base_dataset: &'a str,
    num_classes: usize,
    classes: &'a [String],
    image_count: usize,
    preprocessing: &'a [OperationSpec],
    pipeline_digest: String,
    format: &'static str,
    version: &'static str,
}

/// SHA-256 of the canonical JSON form of an operation list.
pub fn pipeline_digest(ops: &[OperationSpec]) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(ops)?;
    Ok(format!("{:x}", Sha256::digest(&canonical)))
}

// =============================================================================
// Export
// =============================================================================

pub fn export_subset(
    catalog: &Catalog,
    request: &ExportRequest,
    options: &ExportOptions,
    progress: Option<Sender<ExportEvent>>,
) -> Result<ExportSummary, ExportError> {
    let backend = RustBackend::new();
    export_with_backend(&backend, catalog, request, options, progress)
}

struct Job<'a> {
    rel: &'a str,
    source: PathBuf,
    class: String,
    file: String,
    format: FormatFamily,
}

/// Export using a specific backend (allows testing with mock).
pub fn export_with_backend(
    backend: &impl ImageBackend,
    catalog: &Catalog,
    request: &ExportRequest,
    options: &ExportOptions,
    progress: Option<Sender<ExportEvent>>,
) -> Result<ExportSummary, ExportError> {
    if request.paths.is_empty() {
        return Err(ExportError::EmptySelection);
    }
    match options.unknown_ops {
        UnknownOps::Reject => pipeline::validate(&request.ops)?,
        UnknownOps::Ignore => {
            for op in pipeline::unsupported(&request.ops) {
                warn!(index = op.index, op_type = %op.op_type, "export will skip operation");
            }
        }
    }

    let new_key = sanitize_key(&request.new_name, &options.default_key);
    catalog.dataset(&request.base_dataset)?;
    let target = catalog.root().join(&new_key);
    let exists = target.exists() || catalog.get(false).contains_key(&new_key);
    if exists && !request.overwrite {
        return Err(ExportError::ExportConflict(new_key));
    }

    // Resolve every source before writing anything.
    let jobs = request
        .paths
        .iter()
        .map(|rel| {
            let source = catalog.resolve_path(&request.base_dataset, rel)?;
            let normalized = normalize_rel_path(rel);
            Ok(Job {
                rel,
                format: FormatFamily::from_path(&source),
                source,
                class: class_from_path(&normalized).to_string(),
                file: file_name(&normalized).to_string(),
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;
    let classes: Vec<String> = jobs
        .iter()
        .map(|j| j.class.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let staging = StagingDir::create(catalog.root(), &new_key)?;
    for class in &classes {
        fs::create_dir_all(staging.images_dir().join(class))?;
    }

    send(
        &progress,
        ExportEvent::Started {
            new_key: new_key.clone(),
            total: jobs.len(),
        },
    );

    jobs.par_iter()
        .map(|job| {
            let img = backend.load(&job.source)?;
            let result = pipeline::apply(&img, &request.ops);
            let output = staging.images_dir().join(&job.class).join(&job.file);
            backend.save(&result, &output, job.format, options.jpeg_quality)?;
            send(
                &progress,
                ExportEvent::ImageWritten {
                    path: job.rel.to_string(),
                },
            );
            Ok(())
        })
        .collect::<Result<Vec<()>, ExportError>>()?;

    let processed = jobs.len();
    let metadata = ExportMetadata {
        key: &new_key,
        name: &new_key,
        base_dataset: &request.base_dataset,
        num_classes: classes.len(),
        classes: &classes,
        image_count: processed,
        preprocessing: &request.ops,
        pipeline_digest: pipeline_digest(&request.ops)?,
        format: EXPORT_FORMAT,
        version: EXPORT_VERSION,
    };
    fs::write(
        staging.path.join(METADATA_FILE),
        serde_json::to_string_pretty(&metadata)?,
    )?;

    staging.commit(&target, request.overwrite, &new_key)?;
    catalog.get(true);

    info!(
        base = %request.base_dataset,
        new_key = %new_key,
        processed,
        "export complete"
    );
    send(&progress, ExportEvent::Finished { processed });

    Ok(ExportSummary {
        base_dataset: request.base_dataset.clone(),
        new_key,
        processed,
        classes,
        path: target,
    })
}

fn send(progress: &Option<Sender<ExportEvent>>, event: ExportEvent) {
    if let Some(tx) = progress {
        // A dropped receiver only means nobody is listening.
        tx.send(event).ok();
    }
}

/// Hidden work folder that deletes itself unless committed.
struct StagingDir {
    path: PathBuf,
    committed: bool,
}

impl StagingDir {
    fn create(root: &Path, key: &str) -> std::io::Result<Self> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let path = root.join(format!(".staging-{key}-{}-{nanos}", std::process::id()));
        fs::create_dir_all(path.join(IMAGES_DIR))?;
        debug!(path = %path.display(), "created staging folder");
        Ok(Self {
            path,
            committed: false,
        })
    }

    fn images_dir(&self) -> PathBuf {
        self.path.join(IMAGES_DIR)
    }

    /// Move into place. The target is re-checked since it may have appeared meanwhile.
    fn commit(mut self, target: &Path, overwrite: bool, key: &str) -> Result<(), ExportError> {
        if target.exists() {
            if !overwrite {
                return Err(ExportError::ExportConflict(key.to_string()));
            }
            fs::remove_dir_all(target)?;
        }
        fs::rename(&self.path, target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove staging folder");
        }
    }
}
