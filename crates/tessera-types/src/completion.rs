use crate::task::{TaskKind, WorkItem};
use serde::{Deserialize, Serialize};

/// A peer's answer to a link-prediction probe
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProbeCompletion {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub full_text: String,
    /// The question the peer predicts this page answers
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub new_links: Vec<WorkItem>,
}

impl ProbeCompletion {
    /// Title, text and query must all be present for the completion to count
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty()
            && !self.full_text.trim().is_empty()
            && !self.query.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum Completion {
    Probe(ProbeCompletion),
    Answer(String),
}

impl Completion {
    /// The task kind this completion answers
    pub fn kind(&self) -> TaskKind {
        match self {
            Completion::Probe(_) => TaskKind::Probe,
            Completion::Answer(_) => TaskKind::Scored,
        }
    }

    pub fn into_probe(self) -> Option<ProbeCompletion> {
        match self {
            Completion::Probe(probe) => Some(probe),
            Completion::Answer(_) => None,
        }
    }

    pub fn into_answer(self) -> Option<String> {
        match self {
            Completion::Answer(text) => Some(text),
            Completion::Probe(_) => None,
        }
    }
}
