//! Dataset discovery.
//!
//! Scans the datasets root and builds an in-memory [`DatasetIndex`] for every
//! child folder that looks like a dataset. Discovery is a pure function of
//! the filesystem: the [`Catalog`](crate::catalog::Catalog) decides when to
//! call it and owns the result.
//!
//! ## Directory Structure
//!
//! ```text
//! datasets/                        # Datasets root
//! ├── recyclables-mini/            # Dataset (key = folder name)
//! │   ├── metadata.json            # Declared metadata (optional)
//! │   ├── index.csv                # Row index (optional): id?, path, class, split?
//! │   └── images/                  # Required
//! │       ├── glass/
//! │       │   ├── 001.jpg
//! │       │   └── 002.jpg
//! │       └── plastic/
//! │           └── 009.png
//! ├── notes/                       # No images/ → not a dataset
//! └── .staging-demo-42-…/          # Hidden → skipped (in-flight export)
//! ```
//!
//! ## Degradation
//!
//! Per-dataset files never fail the scan:
//! - malformed or missing `metadata.json` → skeleton `{key, name}` (warned if malformed)
//! - unreadable `index.csv`, missing `path`/`class` columns, or no usable rows
//!   → rows synthesized from `images/<class>/**`
//!
//! ## Keys
//!
//! A dataset's key is always its folder name. A `key` field in
//! `metadata.json` is kept in the metadata as-is but never renames the
//! dataset, so lookups by folder name always work.
//!
//! ## Classes
//!
//! When rows come from `index.csv`, the class list is the declared `classes`
//! array if present and non-empty, otherwise the sorted set of classes seen
//! in rows. When rows are synthesized from `images/`, the folder names are
//! the classes and declared ones are ignored. Per-class counts start every
//! listed class at zero and tally every row.

use crate::imaging::is_supported_image;
use crate::naming::normalize_rel_path;
use crate::types::{DEFAULT_SPLIT, DatasetIndex, DatasetMap, DatasetMeta, Row};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

pub const METADATA_FILE: &str = "metadata.json";
pub const INDEX_FILE: &str = "index.csv";
pub const IMAGES_DIR: &str = "images";

/// Scan `root` for datasets. A missing or unreadable root yields an empty map.
pub fn discover(root: &Path) -> DatasetMap {
    let mut datasets = DatasetMap::new();
    for dir in child_dirs(root) {
        if !dir.join(IMAGES_DIR).is_dir() {
            continue;
        }
        let Some(key) = dir_name(&dir) else {
            continue;
        };
        let index = index_dataset(&key, &dir);
        debug!(
            dataset = %key,
            rows = index.rows.len(),
            classes = index.classes.len(),
            "indexed dataset"
        );
        datasets.insert(key, Arc::new(index));
    }
    datasets
}

/// Visible immediate child directories of `root`, sorted.
pub(crate) fn child_dirs(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && dir_name(p).is_some_and(|n| !n.starts_with('.')))
        .collect();
    dirs.sort();
    dirs
}

fn dir_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

/// Build the index for one dataset folder.
pub fn index_dataset(key: &str, dir: &Path) -> DatasetIndex {
    let meta = read_metadata(key, dir);
    let (rows, classes) = match read_index_csv(&dir.join(INDEX_FILE)).filter(|r| !r.is_empty()) {
        Some(rows) => {
            let classes = declared_classes(&meta).unwrap_or_else(|| row_classes(&rows));
            (rows, classes)
        }
        None => {
            let rows = synthesize_rows(dir);
            let classes = row_classes(&rows);
            (rows, classes)
        }
    };
    let approx_count = tally(&classes, &rows);

    DatasetIndex {
        key: key.to_string(),
        root: dir.to_path_buf(),
        classes,
        rows,
        approx_count,
        meta,
    }
}

fn skeleton_meta(key: &str) -> DatasetMeta {
    let mut meta = DatasetMeta::new();
    meta.insert("key".into(), key.into());
    meta.insert("name".into(), key.into());
    meta
}

fn read_metadata(key: &str, dir: &Path) -> DatasetMeta {
    let path = dir.join(METADATA_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return skeleton_meta(key),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable metadata, using skeleton");
            return skeleton_meta(key);
        }
    };
    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(serde_json::Value::Object(meta)) => meta,
        Ok(_) => {
            warn!(path = %path.display(), "metadata is not a JSON object, using skeleton");
            skeleton_meta(key)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed metadata, using skeleton");
            skeleton_meta(key)
        }
    }
}

/// Parse `index.csv`. `None` when the file is absent or unusable.
///
/// Rows without a `path` or with an empty `class` are skipped.
fn read_index_csv(path: &Path) -> Option<Vec<Row>> {
    if !path.is_file() {
        return None;
    }
    let mut reader = match csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable index, scanning images");
            return None;
        }
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed index header, scanning images");
            return None;
        }
    };
    let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h));
    let (Some(path_col), Some(class_col)) = (column(&["path"]), column(&["class"])) else {
        warn!(path = %path.display(), "index lacks path/class columns, scanning images");
        return None;
    };
    let id_col = column(&["id", "ID"]);
    let split_col = column(&["split"]);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), line = line + 2, error = %e, "skipping malformed index row");
                continue;
            }
        };
        let field = |col: Option<usize>| col.and_then(|c| record.get(c)).unwrap_or_default();
        let rel = field(Some(path_col));
        let class = field(Some(class_col));
        if rel.is_empty() || class.is_empty() {
            continue;
        }
        let split = field(split_col);
        rows.push(Row {
            id: field(id_col).to_string(),
            path: normalize_rel_path(rel),
            class: class.to_string(),
            split: if split.is_empty() {
                DEFAULT_SPLIT.to_string()
            } else {
                split.to_string()
            },
        });
    }
    Some(rows)
}

/// One row per image under `images/<class>/**`, classes and files sorted.
fn synthesize_rows(dir: &Path) -> Vec<Row> {
    let mut rows = Vec::new();
    for class_dir in child_dirs(&dir.join(IMAGES_DIR)) {
        let Some(class) = dir_name(&class_dir) else {
            continue;
        };
        for path in image_files(&class_dir) {
            let Some(rel) = relative_path(dir, &path) else {
                continue;
            };
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            rows.push(Row {
                id,
                path: rel,
                class: class.clone(),
                split: DEFAULT_SPLIT.to_string(),
            });
        }
    }
    rows
}

fn image_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_supported_image(e.path()))
        .map(|e| e.into_path())
        .collect()
}

fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    Some(parts.join("/"))
}

/// Sorted, distinct classes of `rows`.
fn row_classes(rows: &[Row]) -> Vec<String> {
    let seen: BTreeSet<&str> = rows.iter().map(|r| r.class.as_str()).collect();
    seen.into_iter().map(str::to_string).collect()
}

/// The declared `classes` array in declaration order, deduplicated. `None`
/// when absent or empty.
fn declared_classes(meta: &DatasetMeta) -> Option<Vec<String>> {
    let arr = meta.get("classes")?.as_array()?;
    let mut unique = BTreeSet::new();
    let declared: Vec<String> = arr
        .iter()
        .filter_map(|c| c.as_str())
        .filter(|c| !c.is_empty() && unique.insert(*c))
        .map(str::to_string)
        .collect();
    (!declared.is_empty()).then_some(declared)
}

fn tally(classes: &[String], rows: &[Row]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = classes.iter().map(|c| (c.clone(), 0)).collect();
    for row in rows {
        *counts.entry(row.class.clone()).or_default() += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{DatasetBuilder, write_png};
    use tempfile::TempDir;

    #[test]
    fn missing_root_is_empty() {
        assert!(discover(Path::new("/nonexistent/datasets")).is_empty());
    }

    #[test]
    fn folders_without_images_dir_are_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("notes")).unwrap();
        DatasetBuilder::new(tmp.path(), "shapes")
            .image("circle", "a.png")
            .build();

        let datasets = discover(tmp.path());
        assert_eq!(datasets.keys().collect::<Vec<_>>(), vec!["shapes"]);
    }

    #[test]
    fn hidden_folders_are_skipped() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), ".staging-demo-1-2")
            .image("circle", "a.png")
            .build();
        assert!(discover(tmp.path()).is_empty());
    }

    #[test]
    fn rows_synthesized_from_class_folders() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), "shapes")
            .image("square", "b.png")
            .image("circle", "a.jpg")
            .image("circle", "nested/c.png")
            .build();
        // Loose files and non-images are ignored.
        write_png(&tmp.path().join("shapes/images/loose.png"), 4, 4);
        fs::write(tmp.path().join("shapes/images/circle/notes.txt"), "x").unwrap();

        let ds = &discover(tmp.path())["shapes"];
        let paths: Vec<&str> = ds.rows.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "images/circle/a.jpg",
                "images/circle/nested/c.png",
                "images/square/b.png"
            ]
        );
        assert_eq!(ds.rows[0].id, "a");
        assert_eq!(ds.rows[0].split, "train");
        assert_eq!(ds.classes, vec!["circle", "square"]);
        assert_eq!(ds.approx_count["circle"], 2);
    }

    #[test]
    fn csv_rows_are_normalized() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), "waste")
            .image("glass", "001.jpg")
            .index_csv(
                "ID,path,class\n\
                 g1,images\\glass\\001.jpg,glass\n\
                 x1,images/glass/002.jpg,\n\
                 p1,images/plastic/009.jpg,plastic\n",
            )
            .build();

        let ds = &discover(tmp.path())["waste"];
        assert_eq!(
            ds.rows,
            vec![
                Row {
                    id: "g1".into(),
                    path: "images/glass/001.jpg".into(),
                    class: "glass".into(),
                    split: "train".into(),
                },
                Row {
                    id: "p1".into(),
                    path: "images/plastic/009.jpg".into(),
                    class: "plastic".into(),
                    split: "train".into(),
                },
            ]
        );
    }

    #[test]
    fn csv_without_class_column_falls_back_to_scan() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), "waste")
            .image("glass", "001.jpg")
            .index_csv("path\nimages/glass/001.jpg\n")
            .build();

        let ds = &discover(tmp.path())["waste"];
        assert_eq!(ds.rows.len(), 1);
        assert_eq!(ds.rows[0].class, "glass");
        assert_eq!(ds.rows[0].id, "001");
    }

    #[test]
    fn malformed_metadata_degrades_to_skeleton() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), "broken")
            .image("a", "1.png")
            .metadata_raw("{not json")
            .build();

        let ds = &discover(tmp.path())["broken"];
        assert_eq!(ds.display_name(), "broken");
        assert_eq!(ds.meta.get("key"), Some(&serde_json::json!("broken")));
    }

    #[test]
    fn scanned_rows_define_classes_over_declared() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), "waste")
            .image("glass", "1.png")
            .image("metal", "2.png")
            .metadata(serde_json::json!({
                "name": "Waste",
                "classes": ["plastic", "glass", "glass"]
            }))
            .build();

        let ds = &discover(tmp.path())["waste"];
        assert_eq!(ds.classes, vec!["glass", "metal"]);
        assert!(!ds.approx_count.contains_key("plastic"));
        assert_eq!(ds.approx_count["glass"], 1);
        assert_eq!(ds.approx_count["metal"], 1);
    }

    #[test]
    fn index_csv_keeps_declared_classes_and_counts_from_zero() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), "waste")
            .image("glass", "1.png")
            .image("metal", "2.png")
            .metadata(serde_json::json!({
                "classes": ["plastic", "glass", "glass"]
            }))
            .index_csv("path,class\nimages/glass/1.png,glass\nimages/metal/2.png,metal\n")
            .build();

        let ds = &discover(tmp.path())["waste"];
        assert_eq!(ds.classes, vec!["plastic", "glass"]);
        assert_eq!(ds.approx_count["plastic"], 0);
        assert_eq!(ds.approx_count["glass"], 1);
        assert_eq!(ds.approx_count["metal"], 1);
    }

    #[test]
    fn metadata_key_does_not_rename_dataset() {
        let tmp = TempDir::new().unwrap();
        DatasetBuilder::new(tmp.path(), "folder-name")
            .image("a", "1.png")
            .metadata(serde_json::json!({"key": "declared-key"}))
            .build();

        let datasets = discover(tmp.path());
        assert!(datasets.contains_key("folder-name"));
        assert!(!datasets.contains_key("declared-key"));
        assert_eq!(datasets["folder-name"].key, "folder-name");
        assert_eq!(datasets["folder-name"].meta["key"], "declared-key");
    }
}
