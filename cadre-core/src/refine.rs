//! Iterative consensus refinement.
//!
//! One artifact per call: gather context once, then write → evaluate →
//! check, up to `max_iterations` rounds. Safety is checked strictly before
//! the consensus test each round, and a safety failure ends the loop with no
//! content.

use crate::roster::RosterView;
use crate::types::{ScoreMap, Worker};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// What the analysts gathered for a topic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub topic: String,
    /// One note per analyst (trends, angles, ideas).
    pub notes: Vec<String>,
}

/// Critic output for one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub scores: ScoreMap,
    #[serde(default)]
    pub feedback: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CrewError {
    #[error("Crew call failed: {0}")]
    Call(String),
    #[error("Malformed crew response: {0}")]
    Malformed(String),
}

/// The LLM-backed actors that do the actual writing and judging.
pub trait ContentCrew {
    fn gather_context(
        &self,
        topic: &str,
        analysts: &[&Worker],
    ) -> impl Future<Output = Result<Context, CrewError>> + Send;

    /// `previous` and `feedback` are `None` on the first round.
    fn write_or_revise(
        &self,
        writers: &[&Worker],
        previous: Option<&str>,
        context: &Context,
        feedback: Option<&[String]>,
    ) -> impl Future<Output = Result<String, CrewError>> + Send;

    fn evaluate(
        &self,
        critics: &[&Worker],
        content: &str,
    ) -> impl Future<Output = Result<Evaluation, CrewError>> + Send;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineConfig {
    pub max_iterations: u32,
    /// Compared against the weighted `overall`.
    pub min_quality_score: f64,
    pub min_safety_score: f64,
    /// Cap on each individual crew call.
    pub call_timeout_secs: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        RefineConfig {
            max_iterations: 5,
            min_quality_score: 0.75,
            min_safety_score: 0.9,
            call_timeout_secs: 120,
        }
    }
}

impl RefineConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefineOutcome {
    /// `None` after a safety abort.
    pub content: Option<String>,
    pub rounds: u32,
    pub scores: ScoreMap,
    /// Workers that took part (analysts, writers, critics).
    pub contributors: Vec<String>,
}

impl RefineOutcome {
    pub fn is_safety_abort(&self) -> bool {
        self.content.is_none()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RefineError {
    #[error("Roster has no writer workers")]
    NoWriters,
    #[error("Crew step {step} failed: {source}")]
    Crew {
        step: &'static str,
        #[source]
        source: CrewError,
    },
    #[error("Crew step {0} timed out")]
    Timeout(&'static str),
}

pub struct Refiner<C> {
    crew: C,
    config: RefineConfig,
    call_timeout: Duration,
}

impl<C: ContentCrew> Refiner<C> {
    pub fn new(crew: C, config: RefineConfig) -> Self {
        let call_timeout = config.call_timeout();
        Refiner {
            crew,
            config,
            call_timeout,
        }
    }

    /// Override the per-call timeout with sub-second precision.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Produce one artifact for `topic` using the workers in `roster`.
    pub async fn refine(&self, topic: &str, roster: RosterView<'_>) -> Result<RefineOutcome, RefineError> {
        let writers = roster.writers();
        if writers.is_empty() {
            return Err(RefineError::NoWriters);
        }
        let analysts = roster.analysts();
        let critics = roster.critics();
        let contributors: Vec<String> = analysts
            .iter()
            .chain(&writers)
            .chain(&critics)
            .map(|w| w.name.clone())
            .collect();

        let context = self
            .call("gather_context", self.crew.gather_context(topic, &analysts))
            .await?;

        let max_rounds = self.config.max_iterations.max(1);
        let mut last: Option<(String, Evaluation)> = None;

        for round in 1..=max_rounds {
            let (previous, feedback) = match &last {
                Some((draft, eval)) => (Some(draft.as_str()), Some(eval.feedback.as_slice())),
                None => (None, None),
            };
            let draft = self
                .call(
                    "write_or_revise",
                    self.crew.write_or_revise(&writers, previous, &context, feedback),
                )
                .await?;
            let eval = self.call("evaluate", self.crew.evaluate(&critics, &draft)).await?;
            let scores = eval.scores;

            tracing::debug!(
                topic,
                round,
                overall = scores.overall,
                safety = scores.safety,
                chars = draft.len(),
                "Refinement round"
            );

            if scores.safety < self.config.min_safety_score {
                tracing::warn!(topic, round, safety = scores.safety, "Safety violation, aborting");
                return Ok(RefineOutcome {
                    content: None,
                    rounds: round,
                    scores,
                    contributors,
                });
            }

            if scores.overall >= self.config.min_quality_score && scores.safety >= self.config.min_safety_score {
                tracing::info!(topic, round, overall = scores.overall, "Consensus reached");
                return Ok(RefineOutcome {
                    content: Some(draft),
                    rounds: round,
                    scores,
                    contributors,
                });
            }

            last = Some((draft, eval));
        }

        let Some((draft, eval)) = last else {
            return Err(RefineError::Crew {
                step: "write_or_revise",
                source: CrewError::Call("no rounds ran".into()),
            });
        };
        tracing::info!(topic, rounds = max_rounds, overall = eval.scores.overall, "Round budget exhausted, keeping last draft");
        Ok(RefineOutcome {
            content: Some(draft),
            rounds: max_rounds,
            scores: eval.scores,
            contributors,
        })
    }

    async fn call<T>(
        &self,
        step: &'static str,
        fut: impl Future<Output = Result<T, CrewError>>,
    ) -> Result<T, RefineError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(RefineError::Crew { step, source }),
            Err(_) => Err(RefineError::Timeout(step)),
        }
    }
}
