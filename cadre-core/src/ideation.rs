//! Ideation gateway: the external service that proposes new worker
//! definitions.
//!
//! The policy engine treats every call as fallible. Whatever comes back is
//! validated here; anything unusable is reported as `Malformed` so the caller
//! can fall back to the static tables below.

use crate::types::Dimension;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::future::Future;

pub const MIN_INITIAL_TEAM: usize = 3;
pub const MAX_INITIAL_TEAM: usize = 5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IdeationError {
    #[error("Ideation timed out")]
    Timeout,
    #[error("Ideation unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed ideation response: {0}")]
    Malformed(String),
}

/// Context for bootstrapping an empty roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamBrief {
    pub goal: String,
    pub audience: String,
    pub focus: String,
    pub failures: Vec<String>,
}

/// Context for a weakness-driven hire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecialistBrief {
    pub weak_dimension: Dimension,
    pub score: f64,
    /// name → role of the current roster.
    pub roster_roles: BTreeMap<String, String>,
    pub goal: String,
}

/// A proposed worker definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProposal {
    pub name: String,
    pub role: String,
    pub prompt: String,
    pub reason: String,
    #[serde(default)]
    pub is_core: bool,
}

pub trait IdeationGateway {
    fn ideate_initial_team(
        &self,
        brief: &TeamBrief,
    ) -> impl Future<Output = Result<Vec<WorkerProposal>, IdeationError>> + Send;

    fn ideate_specialist(
        &self,
        brief: &SpecialistBrief,
    ) -> impl Future<Output = Result<WorkerProposal, IdeationError>> + Send;
}

/// Check a bootstrap proposal: 3–5 workers (extras dropped), at least one
/// writer and one critic, no blank fields, unique names.
pub fn validate_team(mut team: Vec<WorkerProposal>) -> Result<Vec<WorkerProposal>, IdeationError> {
    team.truncate(MAX_INITIAL_TEAM);
    if team.len() < MIN_INITIAL_TEAM {
        return Err(IdeationError::Malformed(format!(
            "initial team has {} workers, need at least {MIN_INITIAL_TEAM}",
            team.len()
        )));
    }
    let mut names = HashSet::new();
    for p in &team {
        validate_fields(p)?;
        if !names.insert(p.name.as_str()) {
            return Err(IdeationError::Malformed(format!("duplicate name {}", p.name)));
        }
    }
    if !team.iter().any(|p| p.role.starts_with("writer.")) {
        return Err(IdeationError::Malformed("initial team has no writer".into()));
    }
    if !team.iter().any(|p| p.role.starts_with("critic.")) {
        return Err(IdeationError::Malformed("initial team has no critic".into()));
    }
    Ok(team)
}

/// Trim a bootstrap team to `cap`, keeping its first writer and first critic
/// and otherwise the proposal order.
pub fn fit_team(team: Vec<WorkerProposal>, cap: usize) -> Vec<WorkerProposal> {
    let cap = cap.min(MAX_INITIAL_TEAM);
    if team.len() <= cap {
        return team;
    }
    let writer = team.iter().position(|p| p.role.starts_with("writer."));
    let critic = team.iter().position(|p| p.role.starts_with("critic."));
    let required: Vec<usize> = [writer, critic].into_iter().flatten().take(cap).collect();
    let mut spare = cap - required.len();
    team.into_iter()
        .enumerate()
        .filter(|(i, _)| {
            if required.contains(i) {
                return true;
            }
            if spare == 0 {
                return false;
            }
            spare -= 1;
            true
        })
        .map(|(_, p)| p)
        .collect()
}

pub fn validate_specialist(proposal: WorkerProposal) -> Result<WorkerProposal, IdeationError> {
    validate_fields(&proposal)?;
    Ok(proposal)
}

fn validate_fields(p: &WorkerProposal) -> Result<(), IdeationError> {
    for (field, value) in [("name", &p.name), ("role", &p.role), ("prompt", &p.prompt)] {
        if value.trim().is_empty() {
            return Err(IdeationError::Malformed(format!("empty {field}")));
        }
    }
    if p.name.chars().any(char::is_whitespace) {
        return Err(IdeationError::Malformed(format!("name contains whitespace: {:?}", p.name)));
    }
    Ok(())
}

// ─── Static fallbacks ───────────────────────────────────────────────────────

fn proposal(name: &str, role: &str, prompt: &str, reason: &str, is_core: bool) -> WorkerProposal {
    WorkerProposal {
        name: name.to_string(),
        role: role.to_string(),
        prompt: prompt.to_string(),
        reason: reason.to_string(),
        is_core,
    }
}

/// The specialist hired for `dimension` when ideation is unavailable.
pub fn fallback_specialist(dimension: Dimension) -> WorkerProposal {
    match dimension {
        Dimension::Clarity => proposal(
            "ConciseOne",
            "writer.specialist",
            "You are ConciseOne, specialist in crystal-clear writing. Eliminate jargon, \
             simplify ideas, use concrete examples. Safety preserved.",
            "Improve clarity (fallback specialist)",
            false,
        ),
        Dimension::Novelty => proposal(
            "HotTake",
            "writer.specialist",
            "You are HotTake, specialist in fresh angles. Find surprising twists and \
             counterintuitive insights. Safety preserved: respectful discourse.",
            "Improve novelty (fallback specialist)",
            false,
        ),
        Dimension::Shareability => proposal(
            "Hooksmith",
            "writer.specialist",
            "You are Hooksmith, specialist in viral content. Craft irresistible openings \
             and emotional resonance. Safety preserved: no misleading clickbait.",
            "Improve shareability (fallback specialist)",
            false,
        ),
        Dimension::Credibility => proposal(
            "EvidenceChecker",
            "critic.specialist",
            "You are EvidenceChecker, specialist in credibility. Verify claims, demand \
             sources, spot fallacies. Safety preserved: objectivity.",
            "Improve credibility (fallback specialist)",
            false,
        ),
        Dimension::Safety => proposal(
            "SafetyGuard",
            "critic.specialist",
            "You are SafetyGuard, specialist in brand safety. Flag harmful, misleading or \
             inflammatory content and propose safe rewrites. Safety preserved: err on caution.",
            "Improve safety (fallback specialist)",
            false,
        ),
    }
}

/// The bootstrap roster used when ideation is unavailable.
pub fn fallback_initial_team() -> Vec<WorkerProposal> {
    vec![
        proposal(
            "Explainer",
            "writer.specialist",
            "You are Explainer, the foundation writer. Create clear, engaging, comprehensive \
             content. Balance simplicity with depth. Use storytelling, examples, and structure. \
             Safety preserved: maintain professional, balanced tone.",
            "Core writer - foundation for content creation",
            true,
        ),
        proposal(
            "EngageCritic",
            "critic.specialist",
            "You are EngageCritic, the quality guardian. Evaluate content for engagement, \
             clarity, accuracy, and impact. Score content across dimensions: clarity, novelty, \
             shareability, credibility, safety. Safety preserved: ensure content meets ethical standards.",
            "Core critic - ensures quality feedback loop",
            true,
        ),
        proposal(
            "Ideator",
            "writer.specialist",
            "You are Ideator, the creative spark. Generate diverse ideas, angles, and approaches. \
             Brainstorm multiple perspectives, find connections, explore possibilities. \
             Safety preserved: innovative but respectful.",
            "Initial ideation - drives creative direction",
            false,
        ),
    ]
}

/// Gateway that always answers from the fallback tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticIdeation;

impl IdeationGateway for StaticIdeation {
    async fn ideate_initial_team(&self, _brief: &TeamBrief) -> Result<Vec<WorkerProposal>, IdeationError> {
        Ok(fallback_initial_team())
    }

    async fn ideate_specialist(&self, brief: &SpecialistBrief) -> Result<WorkerProposal, IdeationError> {
        Ok(fallback_specialist(brief.weak_dimension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_team_is_valid() {
        let team = validate_team(fallback_initial_team()).unwrap();
        assert_eq!(team.len(), 3);
    }

    #[test]
    fn every_dimension_has_a_fallback() {
        for d in Dimension::ALL {
            assert!(validate_specialist(fallback_specialist(d)).is_ok(), "{d}");
        }
    }

    #[test]
    fn team_needs_a_critic() {
        let team = vec![
            proposal("A", "writer.specialist", "p", "r", false),
            proposal("B", "writer.specialist", "p", "r", false),
            proposal("C", "designer.specialist", "p", "r", false),
        ];
        assert!(matches!(validate_team(team), Err(IdeationError::Malformed(_))));
    }

    #[test]
    fn team_too_small() {
        let team = vec![
            proposal("A", "writer.specialist", "p", "r", false),
            proposal("B", "critic.specialist", "p", "r", false),
        ];
        assert!(validate_team(team).is_err());
    }

    #[test]
    fn oversized_team_is_truncated() {
        let mut team = fallback_initial_team();
        for i in 0..4 {
            team.push(proposal(&format!("Extra{i}"), "writer.specialist", "p", "r", false));
        }
        assert_eq!(validate_team(team).unwrap().len(), MAX_INITIAL_TEAM);
    }

    #[test]
    fn fitted_team_keeps_writer_and_critic() {
        let team = vec![
            proposal("A", "analyzer.specialist", "p", "r", false),
            proposal("B", "analyzer.specialist", "p", "r", false),
            proposal("C", "writer.specialist", "p", "r", false),
            proposal("D", "writer.specialist", "p", "r", false),
            proposal("E", "critic.specialist", "p", "r", false),
        ];
        let names = |t: Vec<WorkerProposal>| t.into_iter().map(|p| p.name).collect::<Vec<_>>();
        assert_eq!(names(fit_team(team.clone(), 3)), vec!["A", "C", "E"]);
        assert_eq!(names(fit_team(team.clone(), 2)), vec!["C", "E"]);
        assert_eq!(names(fit_team(team.clone(), 8)).len(), 5);
    }

    #[test]
    fn blank_prompt_is_malformed() {
        let p = proposal("A", "writer.specialist", "   ", "r", false);
        assert!(validate_specialist(p).is_err());
    }
}
