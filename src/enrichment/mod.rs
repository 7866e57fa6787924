//! On-device inference: capability seam, fallback chain, the privileged worker
//! context and the batch description pass.

pub mod backend;
mod batch;
mod chain;
mod enricher;
pub mod prompts;
mod worker;

pub use backend::{
    ApiShape, Availability, InferenceBackend, InferenceCapabilities, InferenceSession,
    SessionOptions,
};
pub use batch::{describe_locally, describe_pending, BatchSummary, LocalSummary};
pub use chain::{ChainResult, Completion, InferenceChain, InferenceStatus};
pub use enricher::{Description, Enricher, ExecutionPath};
pub use worker::{DescribeReply, InferenceWorker};
