//! LLM-backed ideation: asks the model to design workers.
//!
//! Only parsing happens here. Shape checks (team size, writer/critic
//! presence, blank fields) are done by the policy engine, which also owns
//! the fallback when anything goes wrong.

use crate::json::parse_reply;
use crate::llm::TextModel;
use cadre_core::ideation::{IdeationError, IdeationGateway, SpecialistBrief, TeamBrief, WorkerProposal};
use cadre_core::types::Dimension;
use serde::Deserialize;
use std::fmt::Write;

const DESIGNER_SYSTEM: &str = "You design small teams of AI content workers. \
    Reply with strict JSON only, no commentary.";

#[derive(Debug, Deserialize)]
struct AgentSpec {
    name: String,
    role: String,
    system_prompt: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    is_core: bool,
}

impl From<AgentSpec> for WorkerProposal {
    fn from(a: AgentSpec) -> Self {
        WorkerProposal {
            name: a.name,
            role: a.role,
            prompt: a.system_prompt,
            reason: a.reason,
            is_core: a.is_core,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TeamReply {
    #[serde(default)]
    team_strategy: String,
    agents: Vec<AgentSpec>,
}

pub struct LlmIdeation<M> {
    model: M,
}

impl<M: TextModel + Sync> LlmIdeation<M> {
    pub fn new(model: M) -> Self {
        LlmIdeation { model }
    }

    async fn ask(&self, prompt: &str) -> Result<String, IdeationError> {
        self.model
            .complete(DESIGNER_SYSTEM, prompt)
            .await
            .map_err(|e| IdeationError::Unavailable(format!("{e:#}")))
    }
}

impl<M: TextModel + Sync> IdeationGateway for LlmIdeation<M> {
    async fn ideate_initial_team(&self, brief: &TeamBrief) -> Result<Vec<WorkerProposal>, IdeationError> {
        let reply = self.ask(&team_prompt(brief)).await?;
        let team: TeamReply = parse_reply(&reply).map_err(IdeationError::Malformed)?;
        tracing::info!(agents = team.agents.len(), strategy = %team.team_strategy, "Initial team proposed");
        Ok(team.agents.into_iter().map(WorkerProposal::from).collect())
    }

    async fn ideate_specialist(&self, brief: &SpecialistBrief) -> Result<WorkerProposal, IdeationError> {
        let reply = self.ask(&specialist_prompt(brief)).await?;
        let spec: AgentSpec = parse_reply(&reply).map_err(IdeationError::Malformed)?;
        tracing::info!(name = %spec.name, role = %spec.role, dimension = %brief.weak_dimension, "Specialist proposed");
        Ok(spec.into())
    }
}

fn dimensions_block() -> String {
    let mut out = String::new();
    for d in Dimension::ALL {
        let _ = writeln!(out, "- {d} (weight {:.2}): {}", d.weight(), describe(d));
    }
    out
}

fn describe(d: Dimension) -> &'static str {
    match d {
        Dimension::Clarity => "how clear and understandable the content is",
        Dimension::Novelty => "how fresh and unexpected the ideas are",
        Dimension::Shareability => "how engaging and share-worthy it is",
        Dimension::Credibility => "how accurate and well-supported it is",
        Dimension::Safety => "whether it is ethical and non-harmful",
    }
}

pub fn team_prompt(brief: &TeamBrief) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Design the initial team for a self-optimizing content system.\n");
    let _ = writeln!(p, "PROJECT GOAL: {}", brief.goal);
    let _ = writeln!(p, "TARGET AUDIENCE: {}", brief.audience);
    let _ = writeln!(p, "CONTENT FOCUS: {}", brief.focus);
    if !brief.failures.is_empty() {
        let _ = writeln!(p, "\nPREVIOUS CHALLENGES TO AVOID:");
        for f in &brief.failures {
            let _ = writeln!(p, "- {f}");
        }
    }
    let _ = writeln!(p, "\nEVALUATION DIMENSIONS:\n{}", dimensions_block());
    p.push_str(
        "CONSTRAINTS:\n\
         - 3 to 5 agents (the team may later grow to 8)\n\
         - at least one \"writer.specialist\" and one \"critic.specialist\"\n\
         - roles: writer.specialist, critic.specialist, analyzer.specialist or designer.specialist\n\
         - names are single words with no spaces\n\
         - mark 2 or 3 agents is_core=true; core agents are never removed\n\
         - each system_prompt is 2-3 sentences and ends with a \"Safety preserved:\" note\n\n\
         RESPONSE FORMAT:\n\
         {\"team_strategy\": \"...\", \"agents\": [{\"name\": \"Explainer\", \"role\": \"writer.specialist\", \
         \"system_prompt\": \"You are Explainer, ...\", \"reason\": \"...\", \"is_core\": true}]}\n",
    );
    p
}

pub fn specialist_prompt(brief: &SpecialistBrief) -> String {
    let mut p = String::new();
    let _ = writeln!(p, "Design ONE new agent for a content team.\n");
    let _ = writeln!(p, "PROJECT GOAL: {}\n", brief.goal);
    let _ = writeln!(p, "CURRENT TEAM:");
    for (name, role) in &brief.roster_roles {
        let _ = writeln!(p, "- {name} ({role})");
    }
    let _ = writeln!(
        p,
        "\nPROBLEM: the team is weak in \"{}\" (current score {:.2}).\n",
        brief.weak_dimension, brief.score
    );
    let _ = writeln!(p, "EVALUATION DIMENSIONS:\n{}", dimensions_block());
    let _ = writeln!(
        p,
        "REQUIREMENTS:\n\
         - a capability no current member covers\n\
         - directly improves \"{}\"\n\
         - a name that is one word and not already on the team\n\
         - role is writer.specialist, critic.specialist, analyzer.specialist or designer.specialist\n",
        brief.weak_dimension
    );
    p.push_str(
        "RESPONSE FORMAT:\n\
         {\"name\": \"TrendJacker\", \"role\": \"analyzer.specialist\", \
         \"system_prompt\": \"You are TrendJacker, ... Safety preserved: ...\", \"reason\": \"...\"}\n",
    );
    p
}
