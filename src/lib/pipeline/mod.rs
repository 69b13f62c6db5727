//! Ordered multi-stage pipeline.
//!
//! A fixed pool of workers moves batches through ingest, transform and emit.
//! Each worker owns one batch at a time and runs whichever stage that batch
//! is at, as soon as the [`coordinator`] admits it. Slow reads and writes
//! overlap with transform work on other batches while the output order stays
//! identical to the input order.
//!
//! ```
//! use seqmap_lib::errors::Result;
//! use seqmap_lib::pipeline::{Batch, PipelineConfig, PipelineStages, run_pipeline};
//! use parking_lot::Mutex;
//!
//! struct Squares {
//!     out: Mutex<Vec<u64>>,
//! }
//!
//! impl PipelineStages for Squares {
//!     type Record = u64;
//!     fn ingest(&self, index: u64) -> Result<Batch<u64>> {
//!         Ok(if index < 4 { Batch::new(index, vec![index]) } else { Batch::terminal(index) })
//!     }
//!     fn transform(&self, batch: &mut Batch<u64>) -> Result<()> {
//!         batch.records_mut().iter_mut().for_each(|v| *v *= *v);
//!         Ok(())
//!     }
//!     fn emit(&self, batch: Batch<u64>) -> Result<()> {
//!         self.out.lock().extend(batch.into_records());
//!         Ok(())
//!     }
//! }
//!
//! let stages = Squares { out: Mutex::new(Vec::new()) };
//! run_pipeline(&stages, &PipelineConfig::new(3), None).unwrap();
//! assert_eq!(*stages.out.lock(), vec![0, 1, 4, 9]);
//! ```

pub mod batch;
pub mod coordinator;
pub mod stats;
pub mod worker;

pub use batch::Batch;
pub use coordinator::{Admission, Coordinator, PipelineState, STAGE_COUNT, Stage, WorkerSlot};
pub use stats::PipelineStats;
pub use worker::{
    PipelineConfig, PipelineStages, PipelineSummary, WorkerReport, extract_panic_message,
    run_pipeline,
};
