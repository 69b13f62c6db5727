//! CLI command implementations for seqmap.
//!
//! - [`mem`] - Map FASTQ reads to a reference and write SAM

#![allow(
    clippy::cast_possible_truncation,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::uninlined_format_args
)]

pub mod command;
pub mod common;
pub mod mem;
