//! The sampling-and-aggregation engine: process-table walks, cross-cycle
//! I/O delta tracking, search/sort shaping and terminate/kill control.

pub mod control;
pub mod delta;
pub mod record;
pub mod sampler;
pub mod shape;
pub mod source;
pub mod worker;

pub use record::{ProcessRecord, Snapshot};
pub use sampler::Sampler;
pub use shape::{SortKey, shape};
pub use source::SystemSource;
pub use worker::{Monitor, WorkerUpdate};
