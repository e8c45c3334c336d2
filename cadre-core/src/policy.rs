//! Team composition policy engine.
//!
//! `decide` reads a `RosterState` and emits a `DecisionBatch`. It is a pure
//! function of its input except for ideation calls, whose (validated) answers
//! become part of the batch. Rules run in a fixed order:
//!
//! 1. bootstrap an empty roster (nothing else runs that cycle)
//! 2. growth gate
//! 3. hire on weakness
//! 4. merge the single most similar same-role pair
//! 5. prune low-utility non-core workers
//! 6. coach underperformers

use crate::ideation::{
    self, IdeationError, IdeationGateway, SpecialistBrief, TeamBrief, WorkerProposal,
};
use crate::types::*;
use std::collections::BTreeMap;
use std::time::Duration;

pub const TEAM_CAP: usize = 8;
pub const UTILITY_FLOOR: f64 = 0.35;
pub const SIM_THRESHOLD: f64 = 0.80;
pub const SPAWN_COOLDOWN: u64 = 1;
pub const WEAK_OVERALL_THRESHOLD: f64 = 0.62;
pub const WEAK_DIM_THRESHOLD: f64 = 0.55;
pub const UNDERPERFORMER_MARGIN: f64 = 0.05;

/// Default cap on a single ideation call.
pub const DEFAULT_IDEATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Score assumed for a worker or team with no `overall` reading yet.
const NEUTRAL_SCORE: f64 = 0.5;

/// Why a weakness-driven hire fired.
#[derive(Debug, Clone, PartialEq)]
pub struct HireTrigger {
    pub dimension: Dimension,
    pub score: f64,
    /// e.g. `novelty=0.52 < 0.55`
    pub reason: String,
}

pub struct PolicyEngine<G> {
    gateway: G,
    policies: Policies,
    ideation_timeout: Duration,
}

impl<G: IdeationGateway> PolicyEngine<G> {
    pub fn new(gateway: G, policies: Policies) -> Self {
        PolicyEngine {
            gateway,
            policies,
            ideation_timeout: DEFAULT_IDEATION_TIMEOUT,
        }
    }

    pub fn with_ideation_timeout(mut self, timeout: Duration) -> Self {
        self.ideation_timeout = timeout;
        self
    }

    /// Produce this cycle's decisions. Never fails: ideation problems are
    /// answered from the static fallback tables.
    pub async fn decide(&self, state: &RosterState) -> DecisionBatch {
        let mut batch = DecisionBatch {
            policies: self.policies.clone(),
            ..Default::default()
        };

        if state.workers.is_empty() {
            batch.hire_plan = self.bootstrap(state).await;
            return batch;
        }

        if let Some(trigger) = hire_trigger(state, &self.policies) {
            batch.hire_plan.push(self.hire_specialist(state, &trigger).await);
        }
        batch.merge_plan = merge_candidates(state, &self.policies);
        batch.prune_list = prune_candidates(state, &self.policies);
        batch.prompt_feedback = coaching(state, &self.policies);

        tracing::info!(
            iteration = state.iteration,
            hires = batch.hire_plan.len(),
            merges = batch.merge_plan.len(),
            prunes = batch.prune_list.len(),
            coached = batch.prompt_feedback.len(),
            "Policy decisions"
        );
        batch
    }

    async fn bootstrap(&self, state: &RosterState) -> Vec<HirePlan> {
        let brief = TeamBrief {
            goal: state.project_goal.clone(),
            audience: state.target_audience.clone(),
            focus: state.content_focus.clone(),
            failures: state.failures.clone(),
        };
        tracing::info!(goal = %brief.goal, "Empty roster, ideating initial team");

        let call = tokio::time::timeout(self.ideation_timeout, self.gateway.ideate_initial_team(&brief));
        let team = match flatten_timeout(call.await).and_then(ideation::validate_team) {
            Ok(team) => team,
            Err(e) => {
                tracing::warn!(error = %e, "Initial team ideation failed, using fallback team");
                ideation::fallback_initial_team()
            }
        };
        let proposed = team.len();
        let team = ideation::fit_team(team, self.policies.team_cap);
        if team.len() < proposed {
            tracing::warn!(proposed, kept = team.len(), cap = self.policies.team_cap, "Initial team trimmed to team cap");
        }

        team.into_iter()
            .map(|p| HirePlan {
                name: p.name,
                role: p.role,
                system_prompt: p.prompt,
                reason: format!("Bootstrap: {}", p.reason),
                is_core: p.is_core,
            })
            .collect()
    }

    async fn hire_specialist(&self, state: &RosterState, trigger: &HireTrigger) -> HirePlan {
        let brief = SpecialistBrief {
            weak_dimension: trigger.dimension,
            score: trigger.score,
            roster_roles: state
                .workers
                .iter()
                .map(|w| (w.name.clone(), w.role.clone()))
                .collect(),
            goal: state.project_goal.clone(),
        };
        tracing::info!(
            dimension = %trigger.dimension,
            score = trigger.score,
            trigger = %trigger.reason,
            "Weakness detected, ideating specialist"
        );

        let call = tokio::time::timeout(self.ideation_timeout, self.gateway.ideate_specialist(&brief));
        let proposal: WorkerProposal = match flatten_timeout(call.await).and_then(ideation::validate_specialist) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, dimension = %trigger.dimension, "Specialist ideation failed, using fallback");
                ideation::fallback_specialist(trigger.dimension)
            }
        };

        HirePlan {
            name: unique_name(state, &proposal.name),
            role: proposal.role,
            system_prompt: proposal.prompt,
            reason: format!("Addressing weakness: {}. {}", trigger.reason, proposal.reason),
            is_core: false,
        }
    }
}

fn flatten_timeout<T>(
    res: Result<Result<T, IdeationError>, tokio::time::error::Elapsed>,
) -> Result<T, IdeationError> {
    res.unwrap_or(Err(IdeationError::Timeout))
}

/// `name`, or `name2`, `name3`, … if it is already on the roster.
fn unique_name(state: &RosterState, name: &str) -> String {
    if !state.contains(name) {
        return name.to_string();
    }
    (2u32..)
        .map(|n| format!("{name}{n}"))
        .find(|candidate| !state.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}

// ─── Rules ──────────────────────────────────────────────────────────────────

/// Weakest dimension in canonical order; the first one wins ties.
/// An empty map reads as clarity at 0.5.
pub fn weakest_dimension(dims_mean: &BTreeMap<Dimension, f64>) -> (Dimension, f64) {
    Dimension::ALL
        .into_iter()
        .filter_map(|d| dims_mean.get(&d).map(|s| (d, *s)))
        .fold(None, |best: Option<(Dimension, f64)>, (d, s)| match best {
            Some((_, bs)) if bs <= s => best,
            _ => Some((d, s)),
        })
        .unwrap_or((Dimension::Clarity, NEUTRAL_SCORE))
}

/// Rules 2 and 3: whether this cycle may hire, and why.
pub fn hire_trigger(state: &RosterState, policies: &Policies) -> Option<HireTrigger> {
    if state.iteration < policies.spawn_cooldown || state.workers.len() >= policies.team_cap {
        return None;
    }

    let dims_mean = &state.score_history.dims_mean;
    let (dimension, score) = weakest_dimension(dims_mean);

    if let Some(overall) = state.score_history.latest_overall()
        && overall < policies.weak_overall_threshold
    {
        return Some(HireTrigger {
            dimension,
            score,
            reason: format!("avg_overall={overall:.2} < {}", policies.weak_overall_threshold),
        });
    }

    if !dims_mean.is_empty() && score < policies.weak_dim_threshold {
        return Some(HireTrigger {
            dimension,
            score,
            reason: format!("{dimension}={score:.2} < {}", policies.weak_dim_threshold),
        });
    }

    None
}

fn pair_similarity(x: &Worker, y: &Worker) -> Option<f64> {
    match (x.prompt_similarity.get(&y.name), y.prompt_similarity.get(&x.name)) {
        (Some(a), Some(b)) => Some(a.max(*b)),
        (Some(a), None) | (None, Some(a)) => Some(*a),
        (None, None) => None,
    }
}

/// Rule 4: at most one pair, the most similar same-role pair above the
/// threshold. Ties go to the lexicographically smallest `(a, b)`.
pub fn merge_candidates(state: &RosterState, policies: &Policies) -> Vec<MergePlan> {
    let mut best: Option<(f64, &str, &str)> = None;

    for (i, x) in state.workers.iter().enumerate() {
        for y in &state.workers[i + 1..] {
            if x.role != y.role {
                continue;
            }
            let Some(sim) = pair_similarity(x, y) else {
                continue;
            };
            if sim <= policies.sim_threshold {
                continue;
            }
            let (a, b) = if x.name <= y.name {
                (x.name.as_str(), y.name.as_str())
            } else {
                (y.name.as_str(), x.name.as_str())
            };
            let better = match best {
                None => true,
                Some((bs, ba, bb)) => sim > bs || (sim == bs && (a, b) < (ba, bb)),
            };
            if better {
                best = Some((sim, a, b));
            }
        }
    }

    best.map(|(sim, a, b)| {
        tracing::info!(a, b, similarity = sim, "Merge candidate");
        MergePlan {
            a: a.to_string(),
            b: b.to_string(),
            reason: format!(
                "High prompt similarity ({sim:.2}) and overlapping roles. Consolidate to reduce redundancy."
            ),
        }
    })
    .into_iter()
    .collect()
}

/// Rule 5: non-core workers under the utility floor.
pub fn prune_candidates(state: &RosterState, policies: &Policies) -> Vec<PruneItem> {
    state
        .workers
        .iter()
        .filter(|w| !state.is_core(w) && w.utility < policies.utility_floor)
        .map(|w| {
            tracing::info!(worker = %w.name, utility = w.utility, "Prune candidate");
            PruneItem {
                name: w.name.clone(),
                reason: format!(
                    "Utility {:.2} < floor {}. Not a core role. Recommend removal.",
                    w.utility, policies.utility_floor
                ),
            }
        })
        .collect()
}

/// Mean `overall` over workers that have one; 0.5 if none do.
pub fn team_mean_overall(workers: &[Worker]) -> f64 {
    let scores: Vec<f64> = workers.iter().filter_map(Worker::overall).collect();
    if scores.is_empty() {
        NEUTRAL_SCORE
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    }
}

fn weakest_worker_dimension(worker: &Worker) -> Dimension {
    Dimension::ALL
        .into_iter()
        .filter_map(|d| worker.last_scores.get(d.as_str()).map(|s| (d, *s)))
        .fold(None, |best: Option<(Dimension, f64)>, (d, s)| match best {
            Some((_, bs)) if bs <= s => best,
            _ => Some((d, s)),
        })
        .map(|(d, _)| d)
        .unwrap_or(Dimension::Clarity)
}

/// Rule 6: coach workers more than the margin below the team mean.
pub fn coaching(state: &RosterState, policies: &Policies) -> Vec<PromptFeedback> {
    let team_mean = team_mean_overall(&state.workers);

    state
        .workers
        .iter()
        .filter_map(|w| {
            let own = w.overall().unwrap_or(NEUTRAL_SCORE);
            if own >= team_mean - policies.underperformer_margin {
                return None;
            }
            let dim = weakest_worker_dimension(w);
            tracing::info!(worker = %w.name, score = own, team_mean, weakest = %dim, "Coaching");
            Some(PromptFeedback {
                worker: w.name.clone(),
                suggestion: format!(
                    "Worker '{}' is underperforming (score {own:.2} vs team mean {team_mean:.2}). \
                     Suggestions: 1) Add 2 concrete rules that target {dim}. \
                     2) Include 1 positive example of the desired output style. \
                     3) Emphasize key dimension: {dim}.",
                    w.name
                ),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ideation::{StaticIdeation, fallback_initial_team};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway with canned answers that counts its calls.
    struct Scripted {
        team: Result<Vec<WorkerProposal>, IdeationError>,
        specialist: Result<WorkerProposal, IdeationError>,
        calls: AtomicUsize,
        last_brief: Mutex<Option<SpecialistBrief>>,
    }

    impl Scripted {
        fn new(
            team: Result<Vec<WorkerProposal>, IdeationError>,
            specialist: Result<WorkerProposal, IdeationError>,
        ) -> Self {
            Scripted {
                team,
                specialist,
                calls: AtomicUsize::new(0),
                last_brief: Mutex::new(None),
            }
        }
    }

    impl IdeationGateway for Scripted {
        async fn ideate_initial_team(&self, _brief: &TeamBrief) -> Result<Vec<WorkerProposal>, IdeationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.team.clone()
        }

        async fn ideate_specialist(&self, brief: &SpecialistBrief) -> Result<WorkerProposal, IdeationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_brief.lock().unwrap() = Some(brief.clone());
            self.specialist.clone()
        }
    }

    /// Never answers.
    struct Stalled;

    impl IdeationGateway for Stalled {
        async fn ideate_initial_team(&self, _brief: &TeamBrief) -> Result<Vec<WorkerProposal>, IdeationError> {
            std::future::pending().await
        }

        async fn ideate_specialist(&self, _brief: &SpecialistBrief) -> Result<WorkerProposal, IdeationError> {
            std::future::pending().await
        }
    }

    fn specialist(name: &str) -> WorkerProposal {
        WorkerProposal {
            name: name.into(),
            role: "analyzer.specialist".into(),
            prompt: format!("You are {name}."),
            reason: "Tracks what is trending".into(),
            is_core: false,
        }
    }

    fn worker(name: &str, role: &str, utility: f64, overall: Option<f64>) -> Worker {
        let mut w = Worker::new(name, role, format!("You are {name}."));
        w.utility = utility;
        if let Some(o) = overall {
            w.last_scores.insert(OVERALL.into(), o);
        }
        w
    }

    fn dims(values: [f64; 5]) -> BTreeMap<Dimension, f64> {
        Dimension::ALL.into_iter().zip(values).collect()
    }

    fn healthy_state() -> RosterState {
        let mut state = RosterState {
            iteration: 3,
            ..Default::default()
        };
        state.workers.push(worker("Explainer", "writer.specialist", 0.7, Some(0.7)));
        state.workers.push(worker("EngageCritic", "critic.specialist", 0.7, Some(0.7)));
        state.score_history.avg_overall.push(0.8);
        state.score_history.dims_mean = dims([0.8, 0.8, 0.8, 0.8, 0.95]);
        state
    }

    fn engine(gateway: Scripted) -> PolicyEngine<Scripted> {
        PolicyEngine::new(gateway, Policies::default())
    }

    #[tokio::test]
    async fn bootstrap_only_hires() {
        let eng = engine(Scripted::new(Ok(fallback_initial_team()), Err(IdeationError::Timeout)));
        let batch = eng.decide(&RosterState::default()).await;
        assert!((3..=5).contains(&batch.hire_plan.len()));
        assert!(batch.hire_plan.iter().all(|h| h.reason.starts_with("Bootstrap: ")));
        assert!(batch.merge_plan.is_empty());
        assert!(batch.prune_list.is_empty());
        assert!(batch.prompt_feedback.is_empty());
    }

    #[tokio::test]
    async fn bootstrap_falls_back_on_malformed_team() {
        let eng = engine(Scripted::new(Ok(vec![specialist("Lonely")]), Err(IdeationError::Timeout)));
        let batch = eng.decide(&RosterState::default()).await;
        let names: Vec<_> = batch.hire_plan.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Explainer", "EngageCritic", "Ideator"]);
        assert!(batch.hire_plan[0].is_core);
    }

    #[tokio::test]
    async fn bootstrap_respects_a_lowered_cap() {
        let mut team = fallback_initial_team();
        team.push(specialist("Scout"));
        team.push(specialist("Digger"));
        let policies = Policies {
            team_cap: 4,
            ..Default::default()
        };
        let eng = PolicyEngine::new(Scripted::new(Ok(team), Err(IdeationError::Timeout)), policies);
        let batch = eng.decide(&RosterState::default()).await;

        let names: Vec<_> = batch.hire_plan.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Explainer", "EngageCritic", "Ideator", "Scout"]);
        assert!(RosterState::default().applied(&batch, 4).is_ok());
    }

    #[tokio::test]
    async fn bootstrap_times_out_to_fallback() {
        let eng = PolicyEngine::new(Stalled, Policies::default()).with_ideation_timeout(Duration::from_millis(50));
        let batch = eng.decide(&RosterState::default()).await;
        assert_eq!(batch.hire_plan.len(), 3);
    }

    #[tokio::test]
    async fn weak_dimension_hires_one_specialist() {
        let gateway = Scripted::new(Err(IdeationError::Timeout), Ok(specialist("TrendJacker")));
        let eng = engine(gateway);
        let mut state = healthy_state();
        state.score_history.avg_overall = vec![0.70];
        state.score_history.dims_mean = dims([0.8, 0.52, 0.7, 0.75, 0.95]);

        let batch = eng.decide(&state).await;
        assert_eq!(batch.hire_plan.len(), 1);
        assert_eq!(batch.hire_plan[0].name, "TrendJacker");
        assert!(batch.hire_plan[0].reason.contains("novelty=0.52 < 0.55"));

        let brief = eng.gateway.last_brief.lock().unwrap().clone().unwrap();
        assert_eq!(brief.weak_dimension, Dimension::Novelty);
        assert_eq!(brief.roster_roles.len(), 2);
    }

    #[tokio::test]
    async fn weak_overall_hires_for_weakest_dimension() {
        let eng = engine(Scripted::new(Err(IdeationError::Timeout), Err(IdeationError::Unavailable("down".into()))));
        let mut state = healthy_state();
        state.score_history.avg_overall = vec![0.9, 0.60];
        state.score_history.dims_mean = dims([0.7, 0.7, 0.6, 0.7, 0.95]);

        let batch = eng.decide(&state).await;
        assert_eq!(batch.hire_plan.len(), 1);
        let hire = &batch.hire_plan[0];
        assert_eq!(hire.name, "Hooksmith");
        assert!(hire.reason.contains("avg_overall=0.60 < 0.62"));
    }

    #[tokio::test]
    async fn no_hire_during_cooldown_or_at_cap() {
        let eng = engine(Scripted::new(Err(IdeationError::Timeout), Ok(specialist("X"))));
        let mut state = healthy_state();
        state.score_history.dims_mean = dims([0.1, 0.1, 0.1, 0.1, 0.1]);
        state.iteration = 0;
        assert!(eng.decide(&state).await.hire_plan.is_empty());

        state.iteration = 5;
        while state.workers.len() < TEAM_CAP {
            let n = state.workers.len();
            state.workers.push(worker(&format!("W{n}"), "writer.specialist", 0.7, Some(0.7)));
        }
        assert!(eng.decide(&state).await.hire_plan.is_empty());
        assert_eq!(eng.gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn healthy_roster_needs_nothing() {
        let eng = engine(Scripted::new(Err(IdeationError::Timeout), Ok(specialist("X"))));
        let batch = eng.decide(&healthy_state()).await;
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn colliding_hire_name_is_suffixed() {
        let eng = engine(Scripted::new(Err(IdeationError::Timeout), Err(IdeationError::Timeout)));
        let mut state = healthy_state();
        state.workers.push(worker("HotTake", "writer.specialist", 0.7, Some(0.7)));
        state.workers.push(worker("HotTake2", "writer.specialist", 0.7, Some(0.7)));
        state.score_history.dims_mean = dims([0.8, 0.40, 0.8, 0.8, 0.95]);

        let batch = eng.decide(&state).await;
        assert_eq!(batch.hire_plan[0].name, "HotTake3");
    }

    #[test]
    fn weakest_dimension_ties_go_to_canonical_order() {
        let d = dims([0.6, 0.5, 0.5, 0.9, 0.5]);
        assert_eq!(weakest_dimension(&d), (Dimension::Novelty, 0.5));
        assert_eq!(weakest_dimension(&BTreeMap::new()), (Dimension::Clarity, 0.5));
    }

    #[test]
    fn single_merge_even_with_three_similar() {
        let mut state = healthy_state();
        let mut a = worker("Ann", "writer.specialist", 0.6, None);
        let mut b = worker("Bob", "writer.specialist", 0.6, None);
        let c = worker("Cid", "writer.specialist", 0.6, None);
        a.prompt_similarity.insert("Bob".into(), 0.85);
        a.prompt_similarity.insert("Cid".into(), 0.93);
        b.prompt_similarity.insert("Cid".into(), 0.90);
        state.workers.extend([c, b, a]);

        let merges = merge_candidates(&state, &Policies::default());
        assert_eq!(merges.len(), 1);
        assert_eq!((merges[0].a.as_str(), merges[0].b.as_str()), ("Ann", "Cid"));
    }

    #[test]
    fn merge_ties_break_lexicographically() {
        let mut state = RosterState::default();
        let mut x = worker("Zed", "writer.specialist", 0.6, None);
        let mut y = worker("Mia", "writer.specialist", 0.6, None);
        let z = worker("Abe", "writer.specialist", 0.6, None);
        x.prompt_similarity.insert("Mia".into(), 0.9);
        y.prompt_similarity.insert("Abe".into(), 0.9);
        state.workers.extend([x, y, z]);

        let merges = merge_candidates(&state, &Policies::default());
        assert_eq!((merges[0].a.as_str(), merges[0].b.as_str()), ("Abe", "Mia"));
    }

    #[test]
    fn merge_requires_same_role_and_strictly_above_threshold() {
        let mut state = RosterState::default();
        let mut a = worker("Ann", "writer.specialist", 0.6, None);
        let b = worker("Bob", "critic.specialist", 0.6, None);
        let mut c = worker("Cid", "writer.specialist", 0.6, None);
        let d = worker("Dee", "writer.specialist", 0.6, None);
        a.prompt_similarity.insert("Bob".into(), 0.99);
        c.prompt_similarity.insert("Dee".into(), 0.80);
        state.workers.extend([a, b, c, d]);
        assert!(merge_candidates(&state, &Policies::default()).is_empty());
    }

    #[test]
    fn core_workers_are_never_pruned() {
        let mut state = healthy_state();
        state.core_roles.insert("critic.specialist".into());
        state.core_roles.insert("Keeper".into());
        state.workers.push(worker("Gate", "critic.specialist", 0.0, None));
        state.workers.push(worker("Keeper", "writer.specialist", 0.0, None));
        let mut flagged = worker("Flagged", "writer.specialist", 0.0, None);
        flagged.is_core = true;
        state.workers.push(flagged);
        state.workers.push(worker("Drifter", "writer.specialist", 0.1, None));

        let prunes = prune_candidates(&state, &Policies::default());
        let names: Vec<_> = prunes.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Drifter"]);
    }

    #[tokio::test]
    async fn underperformer_is_pruned_and_coached() {
        let eng = engine(Scripted::new(Err(IdeationError::Timeout), Ok(specialist("X"))));
        let mut state = healthy_state();
        state.workers = vec![
            worker("Explainer", "writer.specialist", 0.8, Some(0.81)),
            worker("EngageCritic", "critic.specialist", 0.8, Some(0.81)),
        ];
        let mut dull = worker("DullWriter", "writer.specialist", 0.28, Some(0.48));
        dull.last_scores.insert("novelty".into(), 0.3);
        dull.last_scores.insert("clarity".into(), 0.6);
        state.workers.push(dull);

        let batch = eng.decide(&state).await;
        assert_eq!(batch.prune_list.len(), 1);
        assert_eq!(batch.prune_list[0].name, "DullWriter");
        assert_eq!(batch.prompt_feedback.len(), 1);
        assert_eq!(batch.prompt_feedback[0].worker, "DullWriter");
        let suggestion = &batch.prompt_feedback[0].suggestion;
        assert!(suggestion.contains("vs team mean 0.70"));
        assert!(suggestion.contains("Emphasize key dimension: novelty"));
    }

    #[test]
    fn team_mean_defaults_when_nobody_scored() {
        let workers = vec![worker("A", "writer.specialist", 0.5, None)];
        assert_eq!(team_mean_overall(&workers), 0.5);
        assert!(coaching(&RosterState { workers, ..Default::default() }, &Policies::default()).is_empty());
    }

    #[tokio::test]
    async fn decide_is_deterministic() {
        let mut state = healthy_state();
        state.score_history.dims_mean = dims([0.5, 0.6, 0.7, 0.8, 0.9]);
        let mut a = worker("Ann", "writer.specialist", 0.2, Some(0.3));
        a.prompt_similarity.insert("Explainer".into(), 0.95);
        state.workers.push(a);

        let eng = PolicyEngine::new(StaticIdeation, Policies::default());
        let first = serde_json::to_string(&eng.decide(&state).await).unwrap();
        let second = serde_json::to_string(&eng.decide(&state).await).unwrap();
        assert_eq!(first, second);
    }
}
