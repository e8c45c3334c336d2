//! Roster store. Holds the committed `RosterState` and applies decision
//! batches atomically.
//!
//! Mutation always happens on a staged copy. The copy is validated and only
//! then swapped in, so a reader sees either the previous cycle's state or the
//! next one, never a half-applied batch.

use crate::types::*;
use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RosterError {
    #[error("Duplicate worker name: {0}")]
    DuplicateWorker(String),
    #[error("Roster size {size} exceeds team cap {cap}")]
    CapacityExceeded { size: usize, cap: usize },
    #[error("Worker {worker}: {field}={value} outside [0, 1]")]
    OutOfRange {
        worker: String,
        field: String,
        value: f64,
    },
    #[error("Score history: {field}={value} outside [0, 1]")]
    HistoryOutOfRange { field: String, value: f64 },
    #[error("Record {content_id}: stored overall {stored} does not match weighted {expected}")]
    InconsistentOverall {
        content_id: String,
        stored: f64,
        expected: f64,
    },
}

/// Slack allowed between a stored `overall` and the recomputed weighted sum.
const OVERALL_TOLERANCE: f64 = 1e-6;

impl RosterState {
    /// Check the roster invariants: unique names, size within `cap`,
    /// utilities and scores inside [0, 1], and a score history whose
    /// records carry a consistent `overall`.
    pub fn validate(&self, cap: usize) -> Result<(), RosterError> {
        if self.workers.len() > cap {
            return Err(RosterError::CapacityExceeded {
                size: self.workers.len(),
                cap,
            });
        }
        let mut seen = HashSet::new();
        for w in &self.workers {
            if !seen.insert(w.name.as_str()) {
                return Err(RosterError::DuplicateWorker(w.name.clone()));
            }
            check_unit(&w.name, "utility", w.utility)?;
            for (metric, v) in &w.last_scores {
                check_unit(&w.name, metric, *v)?;
            }
            for (other, v) in &w.prompt_similarity {
                check_unit(&w.name, &format!("similarity[{other}]"), *v)?;
            }
        }
        check_history(&self.score_history)
    }

    /// Stage `batch` on a copy of this state and return it.
    ///
    /// Order is fixed: hire, prune, merge, coach. A worker hired in this
    /// batch can therefore never be the removed side of a merge decided
    /// against the previous roster. `self` is untouched on error.
    pub fn applied(&self, batch: &DecisionBatch, cap: usize) -> Result<RosterState, RosterError> {
        let mut next = self.clone();

        for hire in &batch.hire_plan {
            if next.contains(&hire.name) {
                return Err(RosterError::DuplicateWorker(hire.name.clone()));
            }
            let mut worker = Worker::new(&hire.name, &hire.role, &hire.system_prompt);
            worker.is_core = hire.is_core;
            if hire.is_core {
                next.core_roles.insert(hire.name.clone());
            }
            tracing::info!(worker = %hire.name, role = %hire.role, "Hired");
            next.workers.push(worker);
            next.cooldown_counter = 0;
        }

        for prune in &batch.prune_list {
            let before = next.workers.len();
            next.workers.retain(|w| w.name != prune.name);
            if next.workers.len() < before {
                tracing::info!(worker = %prune.name, "Pruned");
            }
        }

        for merge in &batch.merge_plan {
            if next.contains(&merge.a) && next.contains(&merge.b) {
                next.workers.retain(|w| w.name != merge.b);
                tracing::info!(kept = %merge.a, removed = %merge.b, "Merged");
            }
        }

        for feedback in &batch.prompt_feedback {
            if let Some(w) = next.workers.iter_mut().find(|w| w.name == feedback.worker) {
                w.system_prompt = format!(
                    "{}\n\n## Coaching Feedback (Applied)\n{}",
                    w.system_prompt, feedback.suggestion
                );
                w.prompt_version += 1;
                tracing::info!(worker = %w.name, version = w.prompt_version, "Coached");
            }
        }

        // Drop similarity entries pointing at workers that left.
        let names: HashSet<String> = next.workers.iter().map(|w| w.name.clone()).collect();
        for w in &mut next.workers {
            w.prompt_similarity.retain(|other, _| names.contains(other));
        }

        next.validate(cap)?;
        Ok(next)
    }

    /// Prepend a content record (history is most-recent-first).
    pub fn push_content(&mut self, record: ContentRecord) {
        self.score_history.content_history.insert(0, record);
    }

    pub fn view(&self) -> RosterView<'_> {
        RosterView {
            workers: &self.workers,
        }
    }
}

fn check_unit(worker: &str, field: &str, value: f64) -> Result<(), RosterError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(RosterError::OutOfRange {
            worker: worker.to_string(),
            field: field.to_string(),
            value,
        })
    }
}

fn check_history(history: &ScoreHistory) -> Result<(), RosterError> {
    let in_range = |field: String, value: f64| {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(RosterError::HistoryOutOfRange { field, value })
        }
    };
    for (i, v) in history.avg_overall.iter().enumerate() {
        in_range(format!("avg_overall[{i}]"), *v)?;
    }
    for (dim, v) in &history.dims_mean {
        in_range(format!("dims_mean.{dim}"), *v)?;
    }
    for record in &history.content_history {
        let scores = &record.internal_scores;
        for dim in Dimension::ALL {
            in_range(format!("{}.{dim}", record.content_id), scores.get(dim))?;
        }
        in_range(format!("{}.{OVERALL}", record.content_id), scores.overall)?;
        let expected = ScoreMap::new(
            scores.clarity,
            scores.novelty,
            scores.shareability,
            scores.credibility,
            scores.safety,
        )
        .overall;
        if (scores.overall - expected).abs() > OVERALL_TOLERANCE {
            return Err(RosterError::InconsistentOverall {
                content_id: record.content_id.clone(),
                stored: scores.overall,
                expected,
            });
        }
    }
    Ok(())
}

/// Read-only view of the workers, partitioned by role family.
#[derive(Debug, Clone, Copy)]
pub struct RosterView<'a> {
    workers: &'a [Worker],
}

impl<'a> RosterView<'a> {
    pub fn analysts(&self) -> Vec<&'a Worker> {
        self.by_family(&["analyzer"])
    }

    pub fn writers(&self) -> Vec<&'a Worker> {
        self.by_family(&["writer"])
    }

    pub fn critics(&self) -> Vec<&'a Worker> {
        self.by_family(&["critic", "safety"])
    }

    fn by_family(&self, families: &[&str]) -> Vec<&'a Worker> {
        self.workers
            .iter()
            .filter(|w| families.contains(&w.family()))
            .collect()
    }
}

/// The shared, committed roster.
pub struct Roster {
    state: RwLock<RosterState>,
    cap: usize,
}

impl Roster {
    pub fn new(state: RosterState, cap: usize) -> Result<Self, RosterError> {
        state.validate(cap)?;
        Ok(Roster {
            state: RwLock::new(state),
            cap,
        })
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Clone of the committed state.
    pub fn snapshot(&self) -> RosterState {
        self.state.read().clone()
    }

    pub fn iteration(&self) -> u64 {
        self.state.read().iteration
    }

    /// Apply a batch atomically.
    pub fn apply(&self, batch: &DecisionBatch) -> Result<(), RosterError> {
        let mut guard = self.state.write();
        let next = guard.applied(batch, self.cap)?;
        *guard = next;
        Ok(())
    }

    /// Replace the committed state with a fully staged one.
    pub fn commit(&self, next: RosterState) -> Result<(), RosterError> {
        next.validate(self.cap)?;
        *self.state.write() = next;
        Ok(())
    }
}
