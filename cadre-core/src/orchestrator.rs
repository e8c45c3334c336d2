//! Cycle driver: decide → apply → refine×N → record → persist.
//!
//! A cycle works on a staged copy of the committed roster. Nothing is
//! visible to readers of the `Roster` until the snapshot has been written
//! and the staged state committed, so dropping a cycle future part-way
//! leaves the previous cycle's state in place.

use crate::ideation::IdeationGateway;
use crate::policy::PolicyEngine;
use crate::refine::{ContentCrew, RefineOutcome, Refiner};
use crate::roster::{Roster, RosterError};
use crate::store::{SnapshotStore, StoreError};
use crate::types::*;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

/// Smoothing factor for the utility EMA.
pub const UTILITY_ALPHA: f64 = 0.3;
/// Number of most recent records folded into utility.
pub const UTILITY_WINDOW: usize = 3;
const UTILITY_SEED: f64 = 0.5;
const INTERNAL_WEIGHT: f64 = 0.6;
const EXTERNAL_WEIGHT: f64 = 0.4;

/// Source of platform engagement numbers for a produced artifact.
pub trait EngagementSource {
    fn performance(&self, record: &ContentRecord) -> impl Future<Output = Option<ExternalPerformance>> + Send;
}

/// No platform attached; every record goes without external numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEngagement;

impl EngagementSource for NoEngagement {
    async fn performance(&self, _record: &ContentRecord) -> Option<ExternalPerformance> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Refinement loops run per cycle.
    pub content_per_cycle: usize,
    /// Taken round-robin across slots and cycles.
    pub topics: Vec<String>,
    /// Cap on each engagement lookup; a late answer counts as no numbers.
    pub engagement_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            content_per_cycle: 1,
            topics: vec![
                "How AI agents are changing everyday work".to_string(),
                "Why small teams ship faster".to_string(),
                "What makes an explanation stick".to_string(),
            ],
            engagement_timeout_secs: 30,
        }
    }
}

impl OrchestratorConfig {
    pub fn engagement_timeout(&self) -> Duration {
        Duration::from_secs(self.engagement_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Roster invariant violated: {0}")]
    Roster(#[from] RosterError),
    #[error("Store failure: {0}")]
    Store(#[from] StoreError),
    #[error("No topics configured")]
    NoTopics,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleReport {
    /// Iteration the cycle ran at (the committed state is now one past it).
    pub iteration: u64,
    pub decision_digest: String,
    pub snapshot_digest: String,
    pub hired: Vec<String>,
    pub pruned: Vec<String>,
    pub merged: Vec<(String, String)>,
    pub coached: Vec<String>,
    pub produced: Vec<String>,
    pub safety_aborts: usize,
    pub failed: usize,
    /// Mean overall of this cycle's records, if it produced any.
    pub avg_overall: Option<f64>,
    pub roster_size: usize,
}

pub struct Orchestrator<G, C, E = NoEngagement> {
    policy: PolicyEngine<G>,
    refiner: Refiner<C>,
    engagement: E,
    roster: Roster,
    store: SnapshotStore,
    config: OrchestratorConfig,
    engagement_timeout: Duration,
}

impl<G, C, E> Orchestrator<G, C, E>
where
    G: IdeationGateway,
    C: ContentCrew,
    E: EngagementSource,
{
    pub fn new(
        policy: PolicyEngine<G>,
        refiner: Refiner<C>,
        engagement: E,
        roster: Roster,
        store: SnapshotStore,
        config: OrchestratorConfig,
    ) -> Self {
        Orchestrator {
            policy,
            refiner,
            engagement,
            roster,
            store,
            engagement_timeout: config.engagement_timeout(),
            config,
        }
    }

    pub fn with_engagement_timeout(mut self, timeout: Duration) -> Self {
        self.engagement_timeout = timeout;
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Run `cycles` cycles back to back, stopping at the first fatal error.
    pub async fn run(&self, cycles: u32) -> Result<Vec<CycleReport>, CycleError> {
        let mut reports = Vec::with_capacity(cycles as usize);
        for _ in 0..cycles {
            reports.push(self.cycle().await?);
        }
        Ok(reports)
    }

    pub async fn cycle(&self) -> Result<CycleReport, CycleError> {
        let current = self.roster.snapshot();
        let iteration = current.iteration;
        let cap = self.roster.cap();

        let batch = self.policy.decide(&current).await;
        let decision_digest = self.store.record_decision(iteration, &batch)?;
        let mut next = current.applied(&batch, cap)?;

        let topics = self.topics_for(iteration)?;
        let view = next.view();
        let outcomes = join_all(topics.iter().map(|topic| self.refiner.refine(topic, view))).await;

        let mut records = Vec::new();
        let mut safety_aborts = 0;
        let mut failed = 0;
        for (slot, (topic, outcome)) in topics.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(RefineOutcome {
                    content: Some(content),
                    rounds,
                    scores,
                    contributors,
                }) => {
                    let mut record = ContentRecord {
                        content_id: format!("content_{iteration:03}_{slot:02}"),
                        iteration,
                        topic: topic.clone(),
                        content,
                        rounds,
                        contributors,
                        internal_scores: scores,
                        external_performance: None,
                    };
                    let lookup = tokio::time::timeout(self.engagement_timeout, self.engagement.performance(&record));
                    record.external_performance = lookup.await.unwrap_or_else(|_| {
                        tracing::warn!(iteration, slot, content_id = %record.content_id, "Engagement lookup timed out");
                        None
                    });
                    records.push(record);
                }
                Ok(outcome) => {
                    tracing::warn!(iteration, slot, topic = %topic, safety = outcome.scores.safety, "Content dropped after safety abort");
                    safety_aborts += 1;
                }
                Err(e) => {
                    tracing::warn!(iteration, slot, topic = %topic, error = %e, "Refinement failed");
                    failed += 1;
                }
            }
        }

        for record in &records {
            next.push_content(record.clone());
        }
        let avg_overall = update_history(&mut next.score_history, &records);
        update_last_scores(&mut next.workers, &records);
        update_utilities(&mut next);

        next.iteration += 1;
        next.cooldown_counter += 1;
        next.validate(cap)?;
        let snapshot_digest = self.store.save_snapshot(&next)?;
        let roster_size = next.workers.len();
        self.roster.commit(next)?;

        let report = CycleReport {
            iteration,
            decision_digest,
            snapshot_digest,
            hired: batch.hire_plan.iter().map(|h| h.name.clone()).collect(),
            pruned: batch.prune_list.iter().map(|p| p.name.clone()).collect(),
            merged: batch.merge_plan.iter().map(|m| (m.a.clone(), m.b.clone())).collect(),
            coached: batch.prompt_feedback.iter().map(|f| f.worker.clone()).collect(),
            produced: records.into_iter().map(|r| r.content_id).collect(),
            safety_aborts,
            failed,
            avg_overall,
            roster_size,
        };
        tracing::info!(
            iteration,
            hired = report.hired.len(),
            pruned = report.pruned.len(),
            merged = report.merged.len(),
            coached = report.coached.len(),
            produced = report.produced.len(),
            roster = roster_size,
            "Cycle committed"
        );
        Ok(report)
    }

    fn topics_for(&self, iteration: u64) -> Result<Vec<String>, CycleError> {
        let n = self.config.content_per_cycle;
        if n == 0 {
            return Ok(Vec::new());
        }
        if self.config.topics.is_empty() {
            return Err(CycleError::NoTopics);
        }
        let len = self.config.topics.len();
        let start = (iteration as usize).wrapping_mul(n);
        Ok((0..n)
            .map(|slot| self.config.topics[start.wrapping_add(slot) % len].clone())
            .collect())
    }
}

/// Append this cycle's mean overall and replace `dims_mean`. No-op without
/// records. Returns the appended mean.
pub fn update_history(history: &mut ScoreHistory, records: &[ContentRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let n = records.len() as f64;
    let avg = records.iter().map(|r| r.internal_scores.overall).sum::<f64>() / n;
    history.avg_overall.push(avg);
    history.dims_mean = Dimension::ALL
        .into_iter()
        .map(|d| (d, records.iter().map(|r| r.internal_scores.get(d)).sum::<f64>() / n))
        .collect();
    Some(avg)
}

/// Each contributing worker's `last_scores` becomes the mean of the records
/// it worked on this cycle.
pub fn update_last_scores(workers: &mut [Worker], records: &[ContentRecord]) {
    for worker in workers {
        let mine: Vec<BTreeMap<String, f64>> = records
            .iter()
            .filter(|r| r.contributors.contains(&worker.name))
            .map(|r| r.internal_scores.to_metric_map())
            .collect();
        if mine.is_empty() {
            continue;
        }
        let n = mine.len() as f64;
        let mut sums: BTreeMap<String, f64> = BTreeMap::new();
        for map in &mine {
            for (metric, v) in map {
                *sums.entry(metric.clone()).or_default() += v;
            }
        }
        worker.last_scores = sums.into_iter().map(|(k, v)| (k, clamp_unit(v / n))).collect();
    }
}

/// Recompute every worker's utility from its most recent records.
pub fn update_utilities(state: &mut RosterState) {
    let history = &state.score_history.content_history;
    for worker in &mut state.workers {
        if let Some(u) = utility_from_history(&worker.name, history) {
            worker.utility = u;
        }
    }
}

/// EMA over the worker's last `UTILITY_WINDOW` records (history is
/// most-recent-first), oldest first. `None` if it has no records.
pub fn utility_from_history(name: &str, history: &[ContentRecord]) -> Option<f64> {
    let recent: Vec<&ContentRecord> = history
        .iter()
        .filter(|r| r.contributors.iter().any(|c| c == name))
        .take(UTILITY_WINDOW)
        .collect();
    if recent.is_empty() {
        return None;
    }
    // Folded oldest to newest, not most-recent-first, so the newest record
    // weighs most.
    let ema = recent.iter().rev().fold(UTILITY_SEED, |ema, r| {
        let external = r
            .external_performance
            .as_ref()
            .map_or(0.0, ExternalPerformance::external_rate);
        let combined =
            INTERNAL_WEIGHT * r.internal_scores.overall + EXTERNAL_WEIGHT * (external * 10.0).min(1.0);
        UTILITY_ALPHA * combined + (1.0 - UTILITY_ALPHA) * ema
    });
    Some(clamp_unit((ema * 100.0).round() / 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, overall_all: f64, contributors: &[&str], perf: Option<ExternalPerformance>) -> ContentRecord {
        ContentRecord {
            content_id: id.into(),
            iteration: 0,
            topic: "t".into(),
            content: "c".into(),
            rounds: 1,
            contributors: contributors.iter().map(|s| s.to_string()).collect(),
            internal_scores: ScoreMap::new(overall_all, overall_all, overall_all, overall_all, overall_all),
            external_performance: perf,
        }
    }

    #[test]
    fn utility_without_records_is_none() {
        assert_eq!(utility_from_history("Ghost", &[record("a", 0.8, &["W"], None)]), None);
    }

    #[test]
    fn utility_single_internal_record() {
        // 0.3 * (0.6 * 0.8) + 0.7 * 0.5 = 0.494
        let u = utility_from_history("W", &[record("a", 0.8, &["W"], None)]).unwrap();
        assert_eq!(u, 0.49);
    }

    #[test]
    fn utility_blends_engagement() {
        let perf = ExternalPerformance {
            likes: 90,
            reposts: 10,
            views: 1000,
            ..Default::default()
        };
        // external_rate 0.1 → signal 1.0; combined = 0.48 + 0.4 = 0.88
        // 0.3 * 0.88 + 0.35 = 0.614
        let u = utility_from_history("W", &[record("a", 0.8, &["W"], Some(perf))]).unwrap();
        assert_eq!(u, 0.61);
    }

    #[test]
    fn utility_window_is_three_most_recent_oldest_first() {
        // Most-recent-first: 1.0, 0.0, 0.0, then an ignored 1.0.
        let history = vec![
            record("d", 1.0, &["W"], None),
            record("c", 0.0, &["W"], None),
            record("b", 0.0, &["W"], None),
            record("a", 1.0, &["W"], None),
        ];
        // 0.5 → 0.35 → 0.245 → 0.3*0.6 + 0.7*0.245 = 0.3515
        let u = utility_from_history("W", &history).unwrap();
        assert_eq!(u, 0.35);
    }

    #[test]
    fn history_updates_only_with_records() {
        let mut h = ScoreHistory::default();
        assert_eq!(update_history(&mut h, &[]), None);
        assert!(h.avg_overall.is_empty());

        let recs = vec![record("a", 0.6, &["W"], None), record("b", 0.8, &["W"], None)];
        let avg = update_history(&mut h, &recs).unwrap();
        assert!((avg - 0.7).abs() < 1e-9);
        assert!((h.dims_mean[&Dimension::Novelty] - 0.7).abs() < 1e-9);
        assert_eq!(h.dims_mean.len(), 5);
    }

    #[test]
    fn last_scores_average_own_records() {
        let mut workers = vec![
            Worker::new("W", "writer.specialist", "p"),
            Worker::new("Idle", "writer.specialist", "p"),
        ];
        workers[1].last_scores.insert(OVERALL.into(), 0.42);
        let recs = vec![record("a", 0.6, &["W"], None), record("b", 1.0, &["W"], None)];
        update_last_scores(&mut workers, &recs);
        assert!((workers[0].overall().unwrap() - 0.8).abs() < 1e-9);
        assert!((workers[0].last_scores["clarity"] - 0.8).abs() < 1e-9);
        assert_eq!(workers[1].overall(), Some(0.42));
    }
}
