use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::BedrockError;

/// How much of an invocation trace is kept, from least to most verbose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    #[default]
    Core,
    Outline,
    All,
}

impl TraceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceLevel::Core => "core",
            TraceLevel::Outline => "outline",
            TraceLevel::All => "all",
        }
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TraceLevel {
    type Err = BedrockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(TraceLevel::Core),
            "outline" => Ok(TraceLevel::Outline),
            "all" => Ok(TraceLevel::All),
            other => Err(BedrockError::InvalidInput(format!(
                "unknown trace level '{other}', expected one of: core, outline, all"
            ))),
        }
    }
}

/// Category of a trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Collaboration,
    FinalResponse,
    Failure,
    Rationale,
    Observation,
    ModelInvocation,
    Other,
}

impl TraceKind {
    /// Least verbose level at which this kind is reported.
    pub fn min_level(&self) -> TraceLevel {
        match self {
            TraceKind::Collaboration | TraceKind::FinalResponse | TraceKind::Failure => {
                TraceLevel::Core
            }
            TraceKind::Rationale | TraceKind::Observation => TraceLevel::Outline,
            TraceKind::ModelInvocation | TraceKind::Other => TraceLevel::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TraceKind::Collaboration => "collaboration",
            TraceKind::FinalResponse => "final response",
            TraceKind::Failure => "failure",
            TraceKind::Rationale => "rationale",
            TraceKind::Observation => "observation",
            TraceKind::ModelInvocation => "model invocation",
            TraceKind::Other => "trace",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Agent or collaborator that emitted the event, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    pub kind: TraceKind,
    pub text: String,
}

impl TraceEvent {
    pub fn new(kind: TraceKind, text: impl Into<String>) -> Self {
        Self {
            agent: None,
            kind,
            text: text.into(),
        }
    }

    pub fn from_agent(mut self, agent: impl Into<String>) -> Self {
        self.agent = Some(agent.into());
        self
    }

    pub fn visible_at(&self, level: TraceLevel) -> bool {
        self.kind.min_level() <= level
    }
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.agent {
            Some(agent) => write!(f, "[{agent}] {}: {}", self.kind.label(), self.text),
            None => write!(f, "{}: {}", self.kind.label(), self.text),
        }
    }
}

/// Keep only the events reported at `level`, preserving order.
pub fn filter_trace(events: Vec<TraceEvent>, level: TraceLevel) -> Vec<TraceEvent> {
    events
        .into_iter()
        .filter(|event| event.visible_at(level))
        .collect()
}
