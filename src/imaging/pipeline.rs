//! The transform pipeline: an ordered list of operations applied to one image.
//!
//! The pipeline keeps two buffers, the untouched original and the current
//! working copy. Each step replaces the working copy; `reset` copies the
//! original back. The input image is never modified.
//!
//! Descriptors whose `type` is blank are always skipped silently. Other
//! unrecognized types are governed by [`UnknownOps`]:
//! - `Reject` (default): the whole request fails before any work is done.
//! - `Ignore`: the step is skipped and reported in [`PipelineOutcome::skipped`].

use super::edges;
use super::filters;
use super::operation::{Operation, OperationSpec};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("Unsupported operation '{op_type}' at position {index}")]
    UnsupportedOperation { index: usize, op_type: String },
}

/// What to do with descriptors of an unrecognized type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOps {
    #[default]
    Reject,
    Ignore,
}

/// A step that was skipped because its type is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedOperation {
    pub index: usize,
    pub op_type: String,
}

/// Result of a pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub image: RgbImage,
    pub skipped: Vec<SkippedOperation>,
}

/// Apply `ops` in order, skipping unrecognized steps.
pub fn apply(image: &RgbImage, ops: &[OperationSpec]) -> RgbImage {
    run(image, ops).image
}

/// Apply `ops` in order under the given unknown-operation policy.
pub fn apply_with(
    image: &RgbImage,
    ops: &[OperationSpec],
    policy: UnknownOps,
) -> Result<PipelineOutcome, PipelineError> {
    if policy == UnknownOps::Reject {
        validate(ops)?;
    }
    let outcome = run(image, ops);
    for skipped in &outcome.skipped {
        warn!(
            index = skipped.index,
            op_type = %skipped.op_type,
            "skipping unrecognized operation"
        );
    }
    Ok(outcome)
}

/// Fail on the first unrecognized, non-blank operation type.
pub fn validate(ops: &[OperationSpec]) -> Result<(), PipelineError> {
    match unknown_ops(ops).next() {
        Some(SkippedOperation { index, op_type }) => {
            Err(PipelineError::UnsupportedOperation { index, op_type })
        }
        None => Ok(()),
    }
}

/// Every unrecognized, non-blank step in `ops`.
pub fn unsupported(ops: &[OperationSpec]) -> Vec<SkippedOperation> {
    unknown_ops(ops).collect()
}

fn unknown_ops(ops: &[OperationSpec]) -> impl Iterator<Item = SkippedOperation> + '_ {
    ops.iter().enumerate().filter_map(|(index, spec)| match spec {
        OperationSpec::Unknown(u) if !u.op_type.trim().is_empty() => Some(SkippedOperation {
            index,
            op_type: u.op_type.clone(),
        }),
        _ => None,
    })
}

fn run(image: &RgbImage, ops: &[OperationSpec]) -> PipelineOutcome {
    let mut current = image.clone();
    for spec in ops {
        if let OperationSpec::Known(op) = spec {
            current = apply_step(image, &current, op);
        }
    }
    PipelineOutcome {
        image: current,
        skipped: unknown_ops(ops).collect(),
    }
}

/// Apply one operation to `current`; `original` is only read by `reset`.
pub fn apply_step(original: &RgbImage, current: &RgbImage, op: &Operation) -> RgbImage {
    match op {
        Operation::Reset => original.clone(),
        Operation::Resize(p) => filters::resize(current, p),
        Operation::CropCenter(p) => filters::crop_center(current, p),
        Operation::Pad(p) => filters::pad(current, p),
        Operation::BrightnessContrast(p) => filters::brightness_contrast(current, p.b, p.c),
        Operation::BlurSharpen(p) => filters::blur_sharpen(current, p.blur, p.sharp),
        Operation::Edges(p) => edges::edges(current, p),
        Operation::ToGrayscale => filters::to_grayscale(current),
        Operation::Normalize(p) => filters::normalize(current, &p.mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::operation::parse_operations;
    use crate::test_helpers::gradient_image;

    fn ops(json: &str) -> Vec<OperationSpec> {
        parse_operations(json).unwrap()
    }

    #[test]
    fn empty_pipeline_returns_copy() {
        let img = gradient_image(12, 9);
        assert_eq!(apply(&img, &[]), img);
    }

    #[test]
    fn reset_restores_original() {
        let img = gradient_image(40, 30);
        let out = apply(
            &img,
            &ops(r#"[
                {"type": "resize", "mode": "size", "w": 10, "h": 10},
                {"type": "edges", "method": "sobel", "threshold": 20},
                {"type": "reset"}
            ]"#),
        );
        assert_eq!(out, img);
    }

    #[test]
    fn steps_after_reset_start_from_original() {
        let img = gradient_image(40, 30);
        let out = apply(
            &img,
            &ops(r#"[
                {"type": "resize", "mode": "size", "w": 5, "h": 5},
                {"type": "reset"},
                {"type": "crop_center", "w": 20, "h": 10}
            ]"#),
        );
        assert_eq!(out.dimensions(), (20, 10));
    }

    #[test]
    fn order_matters() {
        let img = gradient_image(40, 30);
        let crop_then_pad = apply(
            &img,
            &ops(r#"[{"type": "crop_center", "w": 10, "h": 10}, {"type": "pad", "w": 20, "h": 20}]"#),
        );
        let pad_then_crop = apply(
            &img,
            &ops(r#"[{"type": "pad", "w": 20, "h": 20}, {"type": "crop_center", "w": 10, "h": 10}]"#),
        );
        assert_eq!(crop_then_pad.dimensions(), (20, 20));
        assert_eq!(pad_then_crop.dimensions(), (10, 10));
    }

    #[test]
    fn ignore_policy_records_skipped_steps() {
        let img = gradient_image(8, 8);
        let outcome = apply_with(
            &img,
            &ops(r#"[{"type": "sepia"}, {"type": ""}, {"type": "to_grayscale"}]"#),
            UnknownOps::Ignore,
        )
        .unwrap();
        assert_eq!(
            outcome.skipped,
            vec![SkippedOperation {
                index: 0,
                op_type: "sepia".into()
            }]
        );
        assert_eq!(outcome.image, filters::to_grayscale(&img));
    }

    #[test]
    fn reject_policy_fails_on_unknown_type() {
        let img = gradient_image(8, 8);
        let err = apply_with(
            &img,
            &ops(r#"[{"type": "to_grayscale"}, {"type": "posterize"}]"#),
            UnknownOps::Reject,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnsupportedOperation {
                index: 1,
                op_type: "posterize".into()
            }
        );
    }

    #[test]
    fn reject_policy_tolerates_blank_types() {
        let img = gradient_image(8, 8);
        let outcome = apply_with(&img, &ops(r#"[{"type": ""}, {"w": 5}]"#), UnknownOps::Reject)
            .unwrap();
        assert!(outcome.skipped.is_empty());
        assert_eq!(outcome.image, img);
    }

    #[test]
    fn default_policy_is_reject() {
        assert_eq!(UnknownOps::default(), UnknownOps::Reject);
    }

    #[test]
    fn policy_deserializes_lowercase() {
        let p: UnknownOps = serde_json::from_str(r#""ignore""#).unwrap();
        assert_eq!(p, UnknownOps::Ignore);
    }
}
