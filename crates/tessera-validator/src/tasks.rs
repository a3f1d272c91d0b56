use crate::TaskError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::Path;
use tessera_types::Challenge;
use tracing::{debug, info};

/// Supplies the question each cycle's scored task is built from
pub trait TaskSource: Send + Sync {
    fn next_challenge(&mut self) -> Result<Challenge, TaskError>;
}

/// Named list of challenges, read in order and restarted when exhausted
#[derive(Debug, Clone)]
pub struct Dataset {
    name: String,
    items: Vec<Challenge>,
    cursor: usize,
}

impl Dataset {
    /// Challenges without a task label inherit the dataset name
    pub fn new(name: impl Into<String>, items: Vec<Challenge>) -> Result<Self, TaskError> {
        let name = name.into();
        if items.is_empty() {
            return Err(TaskError::EmptyDataset(name));
        }
        let items = items
            .into_iter()
            .map(|mut challenge| {
                if challenge.task.trim().is_empty() {
                    challenge.task = name.clone();
                }
                challenge
            })
            .collect();
        Ok(Self {
            name,
            items,
            cursor: 0,
        })
    }

    /// One JSON challenge per line; blank lines are skipped.
    /// The dataset is named after the file stem.
    pub fn from_jsonl(path: &Path) -> Result<Self, TaskError> {
        let content = fs::read_to_string(path)?;
        let mut items = Vec::new();
        for (number, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let challenge: Challenge =
                serde_json::from_str(line).map_err(|e| TaskError::Parse {
                    path: path.display().to_string(),
                    line: number + 1,
                    reason: e.to_string(),
                })?;
            items.push(challenge);
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let dataset = Self::new(name, items)?;
        info!(
            dataset = %dataset.name,
            challenges = dataset.len(),
            "📚 Loaded dataset"
        );
        Ok(dataset)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn next_item(&mut self) -> Challenge {
        let challenge = self.items[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.items.len();
        challenge
    }
}

/// Picks one dataset uniformly at random per challenge
pub struct DatasetPool {
    datasets: Vec<Dataset>,
    rng: StdRng,
}

impl DatasetPool {
    pub fn new(datasets: Vec<Dataset>) -> Result<Self, TaskError> {
        Self::with_rng(datasets, StdRng::from_entropy())
    }

    pub fn with_seed(datasets: Vec<Dataset>, seed: u64) -> Result<Self, TaskError> {
        Self::with_rng(datasets, StdRng::seed_from_u64(seed))
    }

    fn with_rng(datasets: Vec<Dataset>, rng: StdRng) -> Result<Self, TaskError> {
        if datasets.is_empty() {
            return Err(TaskError::NoDatasets);
        }
        Ok(Self { datasets, rng })
    }

    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self, TaskError> {
        let datasets = paths
            .iter()
            .map(|p| Dataset::from_jsonl(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(datasets)
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }
}

impl TaskSource for DatasetPool {
    fn next_challenge(&mut self) -> Result<Challenge, TaskError> {
        let pick = self.rng.gen_range(0..self.datasets.len());
        let dataset = &mut self.datasets[pick];
        let challenge = dataset.next_item();
        debug!(dataset = dataset.name(), task = %challenge.task, "Selected challenge");
        Ok(challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn challenge(question: &str) -> Challenge {
        Challenge {
            question: question.to_string(),
            task: String::new(),
            solution: None,
        }
    }

    #[test]
    fn test_dataset_cycles_and_labels_task() {
        let mut pool = DatasetPool::with_seed(
            vec![Dataset::new("qa", vec![challenge("a"), challenge("b")]).unwrap()],
            1,
        )
        .unwrap();

        let questions: Vec<String> = (0..5)
            .map(|_| pool.next_challenge().unwrap().question)
            .collect();
        assert_eq!(questions, vec!["a", "b", "a", "b", "a"]);
        assert_eq!(pool.next_challenge().unwrap().task, "qa");
    }

    #[test]
    fn test_pool_draws_from_every_dataset() {
        let mut pool = DatasetPool::with_seed(
            vec![
                Dataset::new("coding", vec![challenge("c")]).unwrap(),
                Dataset::new("qa", vec![challenge("q")]).unwrap(),
                Dataset::new("reasoning", vec![challenge("r")]).unwrap(),
            ],
            42,
        )
        .unwrap();

        let mut tasks = std::collections::HashSet::new();
        for _ in 0..100 {
            tasks.insert(pool.next_challenge().unwrap().task);
        }
        assert_eq!(tasks.len(), 3);
    }

    #[test]
    fn test_empty_inputs_rejected() {
        assert!(matches!(
            Dataset::new("qa", vec![]),
            Err(TaskError::EmptyDataset(_))
        ));
        assert!(matches!(
            DatasetPool::new(vec![]),
            Err(TaskError::NoDatasets)
        ));
    }

    #[test]
    fn test_from_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reasoning.jsonl");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"question": "2+2?", "solution": "4"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"question": "why?", "task": "philosophy"}}"#).unwrap();

        let dataset = Dataset::from_jsonl(&path).unwrap();
        assert_eq!(dataset.name(), "reasoning");
        assert_eq!(dataset.len(), 2);

        let mut pool = DatasetPool::new(vec![dataset]).unwrap();
        let first = pool.next_challenge().unwrap();
        assert_eq!(first.task, "reasoning");
        assert_eq!(first.solution.as_deref(), Some("4"));
        assert_eq!(pool.next_challenge().unwrap().task, "philosophy");
    }

    #[test]
    fn test_from_jsonl_reports_bad_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jsonl");
        fs::write(&path, "{\"question\": \"ok\"}\nnot json\n").unwrap();

        match Dataset::from_jsonl(&path) {
            Err(TaskError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other.map(|d| d.len())),
        }
    }
}
