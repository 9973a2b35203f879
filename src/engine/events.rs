//! Engine event stream decoding.
//!
//! The engine writes one JSON object per line to its event log. Every field
//! is optional on the wire; anything we do not understand decodes to
//! [`EngineEvent::Other`] so new engine event kinds never break a run.

use serde::Deserialize;
use serde_json::Value;

use super::Outputs;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A resource step is about to start.
    ResourcePre { urn: String, kind: String },
    /// A resource step finished and reported its outputs.
    ResourceOutputs {
        urn: String,
        kind: String,
        outputs: Outputs,
    },
    Diagnostic {
        severity: Severity,
        message: String,
    },
    Summary {
        duration_seconds: u64,
    },
    Cancelled,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl Severity {
    fn parse(raw: &str) -> Self {
        match raw {
            "error" => Severity::Error,
            "warning" => Severity::Warning,
            "debug" => Severity::Debug,
            // "info" and "info#err"
            _ => Severity::Info,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawEvent {
    resource_pre_event: Option<RawStepEvent>,
    res_outputs_event: Option<RawStepEvent>,
    diagnostic_event: Option<RawDiagnostic>,
    summary_event: Option<RawSummary>,
    cancel_event: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawStepEvent {
    metadata: Option<RawMetadata>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawMetadata {
    urn: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    new: Option<RawState>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawState {
    outputs: Option<Outputs>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawDiagnostic {
    message: Option<String>,
    severity: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct RawSummary {
    duration_seconds: Option<u64>,
}

/// Decode one event-log line. Blank lines yield `None`; malformed JSON is an
/// error so the caller can decide whether to log it.
pub fn parse_event_line(line: &str) -> Option<serde_json::Result<EngineEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str::<RawEvent>(trimmed).map(EngineEvent::from))
}

impl From<RawEvent> for EngineEvent {
    fn from(raw: RawEvent) -> Self {
        if let Some((urn, kind, _)) = raw.resource_pre_event.and_then(step_identity) {
            return EngineEvent::ResourcePre { urn, kind };
        }
        if let Some((urn, kind, new)) = raw.res_outputs_event.and_then(step_identity) {
            let outputs = new.and_then(|s| s.outputs).unwrap_or_default();
            return EngineEvent::ResourceOutputs { urn, kind, outputs };
        }
        if let Some(diag) = raw.diagnostic_event {
            return EngineEvent::Diagnostic {
                severity: Severity::parse(diag.severity.as_deref().unwrap_or("info")),
                message: diag.message.unwrap_or_default().trim_end().to_string(),
            };
        }
        if let Some(summary) = raw.summary_event {
            return EngineEvent::Summary {
                duration_seconds: summary.duration_seconds.unwrap_or(0),
            };
        }
        if raw.cancel_event.is_some() {
            return EngineEvent::Cancelled;
        }
        EngineEvent::Other
    }
}

fn step_identity(step: RawStepEvent) -> Option<(String, String, Option<RawState>)> {
    let meta = step.metadata?;
    Some((meta.urn?, meta.kind?, meta.new))
}
