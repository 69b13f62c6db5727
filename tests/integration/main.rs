//! Integration tests for the seqmap library and binary.
//!
//! These tests drive the pipeline, the mapping stages and the `mem` command
//! end to end, checking ordering, termination and output across worker counts.

mod helpers;
mod test_mem_command;
mod test_pipeline_ordering;
mod test_stage_glue;
