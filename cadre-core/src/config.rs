//! Run configuration, read from an optional TOML file.
//!
//! Every table and field has a default, so an empty file (or no file) gives
//! the stock thresholds.
//!
//! ```toml
//! ideation_timeout_secs = 30
//!
//! [policies]
//! team_cap = 8
//! utility_floor = 0.35
//!
//! [refine]
//! max_iterations = 5
//! min_quality_score = 0.75
//!
//! [orchestrator]
//! content_per_cycle = 2
//! topics = ["AI agents at work", "Open source sustainability"]
//!
//! [brief]
//! goal = "Explain systems programming to newcomers"
//! ```

use crate::ideation::MIN_INITIAL_TEAM;
use crate::orchestrator::OrchestratorConfig;
use crate::refine::RefineConfig;
use crate::types::{Policies, RosterState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Can't read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Bad config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Bad config {path}: {reason}")]
    Invalid { path: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadreConfig {
    pub ideation_timeout_secs: u64,
    pub policies: Policies,
    pub refine: RefineConfig,
    pub orchestrator: OrchestratorConfig,
    pub brief: BriefConfig,
}

impl Default for CadreConfig {
    fn default() -> Self {
        CadreConfig {
            ideation_timeout_secs: crate::policy::DEFAULT_IDEATION_TIMEOUT.as_secs(),
            policies: Policies::default(),
            refine: RefineConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            brief: BriefConfig::default(),
        }
    }
}

/// Project context handed to ideation when the roster is bootstrapped.
/// Unset fields keep the roster defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BriefConfig {
    pub goal: Option<String>,
    pub audience: Option<String>,
    pub focus: Option<String>,
}

impl BriefConfig {
    pub fn apply_to(&self, state: &mut RosterState) {
        if let Some(goal) = &self.goal {
            state.project_goal = goal.clone();
        }
        if let Some(audience) = &self.audience {
            state.target_audience = audience.clone();
        }
        if let Some(focus) = &self.focus {
            state.content_focus = focus.clone();
        }
    }
}

impl CadreConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    /// Load from `path`, or defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let display = path.display().to_string();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        let config = Self::from_toml_str(&s).map_err(|source| ConfigError::Parse {
            path: display.clone(),
            source,
        })?;
        config.check().map_err(|reason| ConfigError::Invalid { path: display, reason })?;
        Ok(config)
    }

    /// Reject settings no roster could satisfy.
    pub fn check(&self) -> Result<(), String> {
        if self.policies.team_cap < MIN_INITIAL_TEAM {
            return Err(format!(
                "policies.team_cap = {} is below the minimum team of {MIN_INITIAL_TEAM}",
                self.policies.team_cap
            ));
        }
        Ok(())
    }

    pub fn ideation_timeout(&self) -> Duration {
        Duration::from_secs(self.ideation_timeout_secs)
    }
}
