//! Core types for the cadre roster.
//!
//! Everything here is plain data:
//! - Serializable via serde_json (snapshots, decision logs)
//! - Ordered maps only, so serialization is deterministic
//! - Scores and utilities live in [0, 1]

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ─── Dimensions & Scores ────────────────────────────────────────────────────

/// An evaluation dimension. Declaration order is the canonical iteration
/// order and is used to break ties between equally weak dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Clarity,
    Novelty,
    Shareability,
    Credibility,
    Safety,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Clarity,
        Dimension::Novelty,
        Dimension::Shareability,
        Dimension::Credibility,
        Dimension::Safety,
    ];

    /// Weight of this dimension in the `overall` score.
    pub fn weight(self) -> f64 {
        match self {
            Dimension::Clarity => 0.20,
            Dimension::Novelty => 0.20,
            Dimension::Shareability => 0.30,
            Dimension::Credibility => 0.20,
            Dimension::Safety => 0.10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Clarity => "clarity",
            Dimension::Novelty => "novelty",
            Dimension::Shareability => "shareability",
            Dimension::Credibility => "credibility",
            Dimension::Safety => "safety",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dimension::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| format!("unknown dimension: {s}"))
    }
}

/// Key under which the weighted score is stored in per-worker score maps.
pub const OVERALL: &str = "overall";

/// Clamp into [0, 1]. NaN collapses to 0.
pub fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

/// Per-dimension scores for one artifact plus the weighted `overall`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreMap {
    pub clarity: f64,
    pub novelty: f64,
    pub shareability: f64,
    pub credibility: f64,
    pub safety: f64,
    pub overall: f64,
}

impl ScoreMap {
    /// Build a score map; inputs are clamped and `overall` is derived with
    /// the fixed weight vector.
    pub fn new(clarity: f64, novelty: f64, shareability: f64, credibility: f64, safety: f64) -> Self {
        let mut scores = ScoreMap {
            clarity: clamp_unit(clarity),
            novelty: clamp_unit(novelty),
            shareability: clamp_unit(shareability),
            credibility: clamp_unit(credibility),
            safety: clamp_unit(safety),
            overall: 0.0,
        };
        scores.overall = Dimension::ALL
            .into_iter()
            .map(|d| d.weight() * scores.get(d))
            .sum();
        scores
    }

    pub fn get(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Clarity => self.clarity,
            Dimension::Novelty => self.novelty,
            Dimension::Shareability => self.shareability,
            Dimension::Credibility => self.credibility,
            Dimension::Safety => self.safety,
        }
    }

    /// Flatten into the metric-name map stored on workers.
    pub fn to_metric_map(&self) -> BTreeMap<String, f64> {
        let mut map: BTreeMap<String, f64> = Dimension::ALL
            .into_iter()
            .map(|d| (d.as_str().to_string(), self.get(d)))
            .collect();
        map.insert(OVERALL.to_string(), self.overall);
        map
    }
}

// ─── Workers & Roster ───────────────────────────────────────────────────────

/// A named LLM-backed actor on the roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub name: String,
    /// Free-form capability tag, e.g. `writer.specialist`.
    pub role: String,
    /// Opaque instruction blob. Never interpreted here.
    pub system_prompt: String,
    /// EMA of recent performance.
    pub utility: f64,
    #[serde(default)]
    pub prompt_version: u32,
    #[serde(default)]
    pub last_scores: BTreeMap<String, f64>,
    /// Precomputed similarity to other workers, keyed by their name.
    #[serde(default)]
    pub prompt_similarity: BTreeMap<String, f64>,
    #[serde(default)]
    pub is_core: bool,
}

impl Worker {
    pub fn new(name: impl Into<String>, role: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Worker {
            name: name.into(),
            role: role.into(),
            system_prompt: system_prompt.into(),
            utility: 0.5,
            prompt_version: 0,
            last_scores: BTreeMap::new(),
            prompt_similarity: BTreeMap::new(),
            is_core: false,
        }
    }

    /// Role family, i.e. the part before the first dot (`writer.specialist` → `writer`).
    pub fn family(&self) -> &str {
        self.role.split('.').next().unwrap_or("")
    }

    pub fn overall(&self) -> Option<f64> {
        self.last_scores.get(OVERALL).copied()
    }
}

/// Platform engagement counters for one published artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalPerformance {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub reposts: u64,
    #[serde(default)]
    pub replies: u64,
    #[serde(default)]
    pub quotes: u64,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub click_through_rate: f64,
}

impl ExternalPerformance {
    /// (likes + reposts) per view; the signal folded into utility.
    pub fn external_rate(&self) -> f64 {
        (self.likes + self.reposts) as f64 / self.views.max(1) as f64
    }

    pub fn engagement_rate(&self) -> f64 {
        if self.views == 0 {
            return 0.0;
        }
        let total = self.likes + self.reposts + self.replies + self.quotes;
        (total as f64 / self.views as f64).min(1.0)
    }

    /// 1.0 at a 5% repost rate.
    pub fn viral_score(&self) -> f64 {
        if self.views == 0 {
            return 0.0;
        }
        (self.reposts as f64 / self.views as f64 * 20.0).min(1.0)
    }
}

/// One produced artifact. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub content_id: String,
    pub iteration: u64,
    pub topic: String,
    pub content: String,
    pub rounds: u32,
    pub contributors: Vec<String>,
    pub internal_scores: ScoreMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_performance: Option<ExternalPerformance>,
}

/// Performance history across cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistory {
    /// One reading per cycle that produced content. Append-only.
    pub avg_overall: Vec<f64>,
    /// Latest per-dimension mean.
    pub dims_mean: BTreeMap<Dimension, f64>,
    /// Most recent first.
    pub content_history: Vec<ContentRecord>,
}

impl ScoreHistory {
    pub fn latest_overall(&self) -> Option<f64> {
        self.avg_overall.last().copied()
    }
}

/// The aggregate root: roster plus history, versioned by `iteration`.
///
/// `iteration`, `workers` and `score_history` are required on load; a
/// snapshot missing any of them is rejected rather than defaulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterState {
    pub iteration: u64,
    /// Hire order.
    pub workers: Vec<Worker>,
    pub score_history: ScoreHistory,
    /// Role or worker names exempt from pruning.
    #[serde(default)]
    pub core_roles: BTreeSet<String>,
    /// Cycles since the roster last grew.
    #[serde(default)]
    pub cooldown_counter: u64,
    #[serde(default)]
    pub failures: Vec<String>,
    #[serde(default = "default_project_goal")]
    pub project_goal: String,
    #[serde(default = "default_target_audience")]
    pub target_audience: String,
    #[serde(default = "default_content_focus")]
    pub content_focus: String,
}

fn default_project_goal() -> String {
    "Create engaging, high-quality content across multiple dimensions".to_string()
}

fn default_target_audience() -> String {
    "General audience seeking informative and engaging content".to_string()
}

fn default_content_focus() -> String {
    "General topics with emphasis on clarity, novelty, and shareability".to_string()
}

impl Default for RosterState {
    fn default() -> Self {
        RosterState {
            iteration: 0,
            workers: Vec::new(),
            score_history: ScoreHistory::default(),
            core_roles: BTreeSet::new(),
            cooldown_counter: 0,
            failures: Vec::new(),
            project_goal: default_project_goal(),
            target_audience: default_target_audience(),
            content_focus: default_content_focus(),
        }
    }
}

impl RosterState {
    pub fn worker(&self, name: &str) -> Option<&Worker> {
        self.workers.iter().find(|w| w.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.worker(name).is_some()
    }

    /// Core if flagged, or if its role or name is listed in `core_roles`.
    pub fn is_core(&self, worker: &Worker) -> bool {
        worker.is_core || self.core_roles.contains(&worker.role) || self.core_roles.contains(&worker.name)
    }
}

// ─── Decisions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HirePlan {
    pub name: String,
    pub role: String,
    pub system_prompt: String,
    pub reason: String,
    #[serde(default)]
    pub is_core: bool,
}

/// Keep `a`, remove `b`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    pub a: String,
    pub b: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PruneItem {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptFeedback {
    pub worker: String,
    pub suggestion: String,
}

/// Thresholds in force when a batch was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policies {
    pub team_cap: usize,
    pub utility_floor: f64,
    pub sim_threshold: f64,
    pub spawn_cooldown: u64,
    pub weak_overall_threshold: f64,
    pub weak_dim_threshold: f64,
    pub underperformer_margin: f64,
}

impl Default for Policies {
    fn default() -> Self {
        Policies {
            team_cap: crate::policy::TEAM_CAP,
            utility_floor: crate::policy::UTILITY_FLOOR,
            sim_threshold: crate::policy::SIM_THRESHOLD,
            spawn_cooldown: crate::policy::SPAWN_COOLDOWN,
            weak_overall_threshold: crate::policy::WEAK_OVERALL_THRESHOLD,
            weak_dim_threshold: crate::policy::WEAK_DIM_THRESHOLD,
            underperformer_margin: crate::policy::UNDERPERFORMER_MARGIN,
        }
    }
}

/// One cycle's decisions. Applied hire → prune → merge → coach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionBatch {
    pub hire_plan: Vec<HirePlan>,
    pub merge_plan: Vec<MergePlan>,
    pub prune_list: Vec<PruneItem>,
    pub prompt_feedback: Vec<PromptFeedback>,
    pub policies: Policies,
}

impl DecisionBatch {
    pub fn is_empty(&self) -> bool {
        self.hire_plan.is_empty()
            && self.merge_plan.is_empty()
            && self.prune_list.is_empty()
            && self.prompt_feedback.is_empty()
    }
}
