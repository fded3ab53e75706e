//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! The primary display for every entity (dataset, class, sample) is its
//! semantic identity: display name, label, positional index. Filesystem
//! paths are secondary context on indented `Source:` lines.
//!
//! # Output Format
//!
//! ## List
//!
//! ```text
//! Datasets
//! 001 Recyclables (mini)
//!     Key: recyclables-mini
//! 002 demo
//!     Key: demo
//! ```
//!
//! ## Info
//!
//! ```text
//! Recyclables (mini)
//!     Key: recyclables-mini
//!     Description: Small sorted waste photos
//!     Shape: 224x224x3
//!     Classes (2)
//!         001 glass (12 images)
//!         002 plastic (9 images)
//! ```
//!
//! ## Export
//!
//! ```text
//! Exporting 3 images → demo
//!     images/glass/001.jpg
//!     images/glass/002.jpg
//!     images/plastic/009.png
//! Exported 3 images from recyclables-mini → demo (2 classes)
//!     Path: data/datasets/demo
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::export::{ExportEvent, ExportSummary};
use crate::imaging::SkippedOperation;
use crate::types::{DatasetInfo, Sample};
use std::path::Path;

/// Longest description shown before truncation.
const MAX_DESCRIPTION: usize = 80;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Singular/plural count, e.g. `1 image`, `3 images`.
fn count(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{n} {singular}")
    } else {
        format!("{n} {plural}")
    }
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let head: String = text.chars().take(max).collect();
        format!("{head}...")
    }
}

/// `[h, w, c]` with unknowns shown as `?`, rendered `WxHxC`.
fn format_shape(shape: &[Option<u32>]) -> Option<String> {
    if shape.iter().all(Option::is_none) {
        return None;
    }
    let part = |i: usize| {
        shape
            .get(i)
            .copied()
            .flatten()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "?".to_string())
    };
    Some(format!("{}x{}x{}", part(1), part(0), part(2)))
}

// ============================================================================
// list / info
// ============================================================================

/// Format the dataset list as `(key, display name)` pairs.
pub fn format_dataset_list(datasets: &[(String, String)], root: &Path) -> Vec<String> {
    if datasets.is_empty() {
        return vec![format!("No datasets found in {}", root.display())];
    }
    let mut lines = vec!["Datasets".to_string()];
    for (i, (key, name)) in datasets.iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), name));
        lines.push(format!("{}Key: {}", indent(1), key));
    }
    lines
}

pub fn print_dataset_list(datasets: &[(String, String)], root: &Path) {
    for line in format_dataset_list(datasets, root) {
        println!("{}", line);
    }
}

pub fn format_dataset_info(info: &DatasetInfo) -> Vec<String> {
    let mut lines = vec![info.name.clone()];
    lines.push(format!("{}Key: {}", indent(1), info.key));
    if let Some(desc) = info.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push(format!(
            "{}Description: {}",
            indent(1),
            truncate_desc(desc, MAX_DESCRIPTION)
        ));
    }
    if let Some(shape) = format_shape(&info.image_shape) {
        lines.push(format!("{}Shape: {}", indent(1), shape));
    }
    if let Some(version) = &info.version {
        lines.push(format!("{}Version: {}", indent(1), version));
    }
    lines.push(format!("{}Classes ({})", indent(1), info.num_classes));
    for (i, class) in info.classes.iter().enumerate() {
        let n = info.approx_count.get(class).copied().unwrap_or(0);
        lines.push(format!(
            "{}{} {} ({})",
            indent(2),
            format_index(i + 1),
            class,
            count(n, "image", "images")
        ));
    }
    lines
}

pub fn print_dataset_info(info: &DatasetInfo) {
    for line in format_dataset_info(info) {
        println!("{}", line);
    }
}

// ============================================================================
// sample / apply
// ============================================================================

pub fn format_sample(sample: &Sample, preview: Option<&Path>) -> Vec<String> {
    let mut lines = vec![format!(
        "{} #{} {}",
        sample.dataset_key, sample.index_used, sample.label
    )];
    lines.push(format!("{}Source: {}", indent(1), sample.path));
    if let Some(out) = preview {
        lines.push(format!("{}Preview: {}", indent(1), out.display()));
    }
    lines
}

pub fn print_sample(sample: &Sample, preview: Option<&Path>) {
    for line in format_sample(sample, preview) {
        println!("{}", line);
    }
}

/// Result of running a pipeline over one image.
pub fn format_apply_result(
    source: &str,
    dimensions: (u32, u32),
    skipped: &[SkippedOperation],
    preview: Option<&Path>,
) -> Vec<String> {
    let mut lines = vec![format!("{} → {}x{}", source, dimensions.0, dimensions.1)];
    for op in skipped {
        lines.push(format!(
            "{}Skipped: {} (step {})",
            indent(1),
            op.op_type,
            op.index + 1
        ));
    }
    if let Some(out) = preview {
        lines.push(format!("{}Preview: {}", indent(1), out.display()));
    }
    lines
}

pub fn print_apply_result(
    source: &str,
    dimensions: (u32, u32),
    skipped: &[SkippedOperation],
    preview: Option<&Path>,
) {
    for line in format_apply_result(source, dimensions, skipped, preview) {
        println!("{}", line);
    }
}

// ============================================================================
// export
// ============================================================================

/// Format a single export progress event; called as events arrive.
pub fn format_export_event(event: &ExportEvent) -> Vec<String> {
    match event {
        ExportEvent::Started { new_key, total } => {
            vec![format!("Exporting {} → {}", count(*total, "image", "images"), new_key)]
        }
        ExportEvent::ImageWritten { path } => vec![format!("{}{}", indent(1), path)],
        // The summary carries the totals.
        ExportEvent::Finished { .. } => Vec::new(),
    }
}

pub fn format_export_summary(summary: &ExportSummary) -> Vec<String> {
    vec![
        format!(
            "Exported {} from {} → {} ({})",
            count(summary.processed, "image", "images"),
            summary.base_dataset,
            summary.new_key,
            count(summary.classes.len(), "class", "classes")
        ),
        format!("{}Path: {}", indent(1), summary.path.display()),
    ]
}

pub fn print_export_summary(summary: &ExportSummary) {
    for line in format_export_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
