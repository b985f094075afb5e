//! Core library for the aria-reports command line application.
//!
//! The library turns a wide per-aria feature table into stratified
//! statistical reports sliced along musicological metadata. The modules are
//! structured to keep responsibilities narrow and composable: the table
//! representation lives in [`model`], the instrument vocabulary in
//! [`taxonomy`], the cleaning and merging passes in [`clean`] and [`merge`],
//! the grouping combinatorics in [`facets`], the per-group statistics in
//! [`aggregate`], persistence in [`report`] and [`io`], and the
//! orchestration that powers the CLI in [`pipeline`].

pub mod aggregate;
pub mod clean;
pub mod config;
pub mod error;
pub mod facets;
pub mod io;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod taxonomy;

pub use error::{ReportError, Result};
