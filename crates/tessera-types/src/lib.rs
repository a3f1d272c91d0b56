pub mod peer;
pub mod task;
pub mod completion;

pub use peer::{PeerEndpoint, PeerIndex, PeerInfo};
pub use task::{Challenge, ProbeTask, ScoredTask, SourceDocument, Task, TaskKind, WorkItem};
pub use completion::{Completion, ProbeCompletion};
