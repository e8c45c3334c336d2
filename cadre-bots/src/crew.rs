//! LLM-backed content crew: analysts, writers and critics.
//!
//! Writers (and critics) act as one voice per call: their system prompts
//! are concatenated into a single system message.

use crate::json::parse_reply;
use crate::llm::TextModel;
use cadre_core::refine::{ContentCrew, Context, CrewError, Evaluation};
use cadre_core::types::{ScoreMap, Worker};
use futures::future::try_join_all;
use serde::Deserialize;
use std::fmt::Write;

/// Used when the roster has no critic or safety workers.
const DEFAULT_CRITIC: &str = "You are an impartial content critic. Judge clarity, novelty, \
    shareability, credibility and safety. Be strict about safety.";

const EVALUATION_FORMAT: &str = "Score the content below on each dimension from 0.0 to 1.0 and \
    list concrete, actionable feedback for the next revision.\n\
    Reply with strict JSON only:\n\
    {\"clarity\": 0.0, \"novelty\": 0.0, \"shareability\": 0.0, \"credibility\": 0.0, \
    \"safety\": 0.0, \"feedback\": [\"...\"]}";

#[derive(Debug, Deserialize)]
struct EvaluationReply {
    clarity: f64,
    novelty: f64,
    shareability: f64,
    credibility: f64,
    safety: f64,
    #[serde(default)]
    feedback: Vec<String>,
}

pub struct LlmCrew<M> {
    model: M,
}

impl<M: TextModel + Sync> LlmCrew<M> {
    pub fn new(model: M) -> Self {
        LlmCrew { model }
    }

    async fn ask(&self, system: &str, prompt: &str) -> Result<String, CrewError> {
        self.model
            .complete(system, prompt)
            .await
            .map_err(|e| CrewError::Call(format!("{e:#}")))
    }
}

/// Join worker prompts into one system message, labelled by name.
fn joint_system(workers: &[&Worker], preamble: &str) -> String {
    let mut out = preamble.to_string();
    for w in workers {
        let _ = write!(out, "\n\n## {} ({})\n{}", w.name, w.role, w.system_prompt);
    }
    out
}

pub fn parse_evaluation(reply: &str) -> Result<Evaluation, CrewError> {
    let r: EvaluationReply = parse_reply(reply).map_err(CrewError::Malformed)?;
    Ok(Evaluation {
        scores: ScoreMap::new(r.clarity, r.novelty, r.shareability, r.credibility, r.safety),
        feedback: r.feedback,
    })
}

impl<M: TextModel + Sync> ContentCrew for LlmCrew<M> {
    async fn gather_context(&self, topic: &str, analysts: &[&Worker]) -> Result<Context, CrewError> {
        let prompt = format!(
            "Topic: {topic}\n\nSummarize current trends, audience interests and promising angles \
             for this topic in 3-5 short bullet points."
        );
        let notes = try_join_all(analysts.iter().map(|a| self.ask(&a.system_prompt, &prompt))).await?;
        tracing::debug!(topic, analysts = analysts.len(), "Context gathered");
        Ok(Context {
            topic: topic.to_string(),
            notes,
        })
    }

    async fn write_or_revise(
        &self,
        writers: &[&Worker],
        previous: Option<&str>,
        context: &Context,
        feedback: Option<&[String]>,
    ) -> Result<String, CrewError> {
        let system = joint_system(
            writers,
            "You are a writing team producing one social media post together. \
             Combine the strengths of every member below.",
        );

        let mut prompt = format!("Topic: {}\n", context.topic);
        if !context.notes.is_empty() {
            prompt.push_str("\nResearch notes:\n");
            for note in &context.notes {
                let _ = writeln!(prompt, "{}", note.trim());
            }
        }
        match previous {
            Some(draft) => {
                let _ = write!(prompt, "\nPrevious draft:\n{draft}\n\nReviewer feedback:\n");
                for item in feedback.unwrap_or_default() {
                    let _ = writeln!(prompt, "- {item}");
                }
                prompt.push_str("\nRevise the draft to address every point. Reply with the post text only.");
            }
            None => prompt.push_str("\nWrite the post. Reply with the post text only."),
        }

        let text = self.ask(&system, &prompt).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(CrewError::Malformed("writers returned an empty draft".into()));
        }
        Ok(text.to_string())
    }

    async fn evaluate(&self, critics: &[&Worker], content: &str) -> Result<Evaluation, CrewError> {
        let system = if critics.is_empty() {
            DEFAULT_CRITIC.to_string()
        } else {
            joint_system(critics, "You are a review panel. Agree on one set of scores.")
        };
        let prompt = format!("{EVALUATION_FORMAT}\n\nCONTENT:\n{content}");
        let reply = self.ask(&system, &prompt).await?;
        parse_evaluation(&reply)
    }
}
