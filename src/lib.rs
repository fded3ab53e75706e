//! # visionblocks
//!
//! Browse small labeled image datasets stored on disk, preview samples, and
//! run an ordered list of pixel-level operations over one image or a whole
//! subset, materializing the result as a new dataset.
//!
//! # Architecture: Catalog → Pipeline → Export
//!
//! ```text
//! datasets/<key>/   →  Catalog   (discovery, cached index, path resolution)
//! [ops JSON]        →  Pipeline  (ordered, deterministic transforms)
//! subset + ops      →  Export    (staged write of a new dataset folder)
//! ```
//!
//! The filesystem is the only store. A dataset is any visible folder with an
//! `images/` directory; `metadata.json` and `index.csv` refine it but are
//! optional, and broken ones degrade to what can be inferred from the tree.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`catalog`] | Cached view of every dataset, invalidated by a cheap directory signature |
//! | [`scan`] | Pure discovery: metadata, CSV index or synthesized rows per dataset |
//! | [`imaging`] | Operation descriptors, filters, edge detection, pipeline engine, codec backend |
//! | [`export`] | Subset selection and atomic batch export with provenance metadata |
//! | [`config`] | `visionblocks.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Dataset index, rows, derived info and sample records |
//! | [`naming`] | Dataset key sanitization and class inference from row paths |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Original-Aware Pipeline
//!
//! Every operation reads the current working image except `reset`, which
//! restores the original. Pipelines are therefore plain lists: no branching,
//! no saved intermediates, and replaying the same list always gives the same
//! pixels.
//!
//! ## Stage, Then Rename
//!
//! Exports write into a hidden `.staging-*` folder and rename it into place
//! only once every image and the metadata are on disk. Discovery ignores
//! hidden folders, so a half-written dataset is never listed.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, encoding and every filter use the `image` crate and plain pixel
//! loops. No OpenCV, no system libraries; the binary is self-contained.

pub mod catalog;
pub mod config;
pub mod export;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod scan;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
