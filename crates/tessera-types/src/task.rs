use serde::{Deserialize, Serialize};

/// Crawlable content identifier (a URL)
pub type WorkItem = String;

/// Link-prediction probe for a single peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTask {
    pub url: WorkItem,
}

/// Supporting document attached to a scored question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

/// The question every sampled peer answers and is rewarded for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredTask {
    pub question: String,
    #[serde(default)]
    pub sources: Vec<SourceDocument>,
}

/// A unit of work sent to peers. Built once, dispatched once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    Probe(ProbeTask),
    Scored(ScoredTask),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Probe,
    Scored,
}

impl Task {
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Probe(_) => TaskKind::Probe,
            Task::Scored(_) => TaskKind::Scored,
        }
    }
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Probe => "probe",
            TaskKind::Scored => "scored",
        }
    }
}

/// A dataset item the scored task is built from.
///
/// `solution` is the reference answer handed to reward functions and is
/// never forwarded to peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub question: String,
    /// Category label (coding, qa, reasoning, ...) passed to reward functions
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub solution: Option<String>,
}

impl Challenge {
    pub fn to_scored_task(&self, sources: Vec<SourceDocument>) -> ScoredTask {
        ScoredTask {
            question: self.question.clone(),
            sources,
        }
    }
}
