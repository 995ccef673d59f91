pub mod buckets;
mod columns;
pub mod config;
pub mod discovery;
pub mod dominant_axis;
pub mod error;
pub mod error_check;
pub mod outputs;
pub mod pipelines;
pub mod sample_store;
pub mod types;

pub use config::{AnalysisConfig, BoundaryPolicy, BucketSize};
pub use error::{PipelineError, Result};
pub use sample_store::SampleStore;
pub use types::{Axis, BucketStat, GroupStats, Sample, WaveHeightSample};
