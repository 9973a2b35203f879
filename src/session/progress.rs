//! Per-resource progress reduced from the engine event stream.

use std::collections::HashMap;

use crate::engine::events::Severity;
use crate::engine::EngineEvent;

/// Resource kinds a ploy deployment is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    RegistryRepository,
    ImageBuild,
    Namespace,
    Workload,
    NetworkService,
}

impl ResourceKind {
    /// Map an engine type token. Anything outside the deployment (the stack
    /// itself, providers, future resource types) is `None`.
    pub fn from_type(token: &str) -> Option<Self> {
        match token {
            "aws:ecr/repository:Repository" => Some(ResourceKind::RegistryRepository),
            "docker:index/image:Image" | "docker:image:Image" => Some(ResourceKind::ImageBuild),
            "kubernetes:core/v1:Namespace" => Some(ResourceKind::Namespace),
            "kubernetes:apps/v1:Deployment" => Some(ResourceKind::Workload),
            "kubernetes:core/v1:Service" => Some(ResourceKind::NetworkService),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::RegistryRepository => "ECR repository",
            ResourceKind::ImageBuild => "Docker image",
            ResourceKind::Namespace => "Kubernetes namespace",
            ResourceKind::Workload => "Kubernetes deployment",
            ResourceKind::NetworkService => "Kubernetes service",
        }
    }
}

/// Ordered so that `max` never moves a resource backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceState {
    Pending,
    InProgress,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceProgress {
    pub identity: String,
    pub kind: ResourceKind,
    pub state: ResourceState,
}

impl ResourceProgress {
    /// Display label: kind plus the trailing URN segment (the resource name).
    pub fn label(&self) -> String {
        let name = self.identity.rsplit("::").next().unwrap_or(&self.identity);
        if name.is_empty() || name == self.identity {
            self.kind.label().to_string()
        } else {
            format!("{} ({})", self.kind.label(), name)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    resources: HashMap<String, ResourceProgress>,
    last_error: Option<String>,
}

impl ProgressSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reduce(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::ResourcePre { urn, kind } => {
                self.advance(urn, kind, ResourceState::InProgress)
            }
            EngineEvent::ResourceOutputs { urn, kind, .. } => {
                self.advance(urn, kind, ResourceState::Complete)
            }
            EngineEvent::Diagnostic {
                severity: Severity::Error,
                message,
            } => {
                self.last_error = Some(message.clone());
            }
            _ => {}
        }
    }

    fn advance(&mut self, urn: &str, token: &str, state: ResourceState) {
        let Some(kind) = ResourceKind::from_type(token) else {
            tracing::trace!("ignoring event for {}", token);
            return;
        };

        let entry = self
            .resources
            .entry(urn.to_string())
            .or_insert_with(|| ResourceProgress {
                identity: urn.to_string(),
                kind,
                state: ResourceState::Pending,
            });
        entry.state = entry.state.max(state);
    }

    pub fn get(&self, identity: &str) -> Option<&ResourceProgress> {
        self.resources.get(identity)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Resources in `state`, sorted by kind then label.
    pub fn in_state(&self, state: ResourceState) -> Vec<&ResourceProgress> {
        let mut matching: Vec<_> = self
            .resources
            .values()
            .filter(|r| r.state == state)
            .collect();
        matching.sort_by(|a, b| (a.kind, a.label()).cmp(&(b.kind, b.label())));
        matching
    }

    pub fn in_progress(&self) -> Vec<&ResourceProgress> {
        self.in_state(ResourceState::InProgress)
    }

    pub fn completed(&self) -> Vec<&ResourceProgress> {
        self.in_state(ResourceState::Complete)
    }
}
