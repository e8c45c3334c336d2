//! cadre-bots: the LLM-backed collaborators for cadre.
//!
//! - `llm`: Claude Messages API client
//! - `gateway`: ideation of new workers
//! - `crew`: context gathering, writing and evaluation

pub mod crew;
pub mod gateway;
pub mod json;
pub mod llm;
