pub mod config;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod submission;
pub mod tasks;
pub mod validator;

pub use config::ValidatorConfig;
pub use error::{CycleError, PersistenceError, SubmissionError, TaskError};
pub use metrics::ValidatorMetrics;
pub use persistence::ValidatorState;
pub use submission::{
    Embedder, HashingEmbedder, JsonlSubmissionSink, NullSubmissionSink, ProbeSubmission,
    SubmissionSink,
};
pub use tasks::{Dataset, DatasetPool, TaskSource};
pub use validator::{CycleReport, Validator};
