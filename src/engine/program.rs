//! Deployment descriptor: the declarative program the engine runs.
//!
//! A deployment is an ECR repository, an image built from the user's build
//! context and pushed to it, and a namespace holding a Deployment plus a
//! LoadBalancer Service. The whole thing is rendered as a Pulumi YAML
//! project document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};

use super::error::Result;

/// Output key carrying the externally reachable address of the service.
pub const ADDRESS_OUTPUT: &str = "address";

const CONTAINER_PORT: u16 = 80;
const REPLICAS: u32 = 3;
const NLB_ANNOTATION: &str = "service.beta.kubernetes.io/aws-load-balancer-type";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadBalancer {
    /// Classic ELB, the cluster default.
    #[default]
    Classic,
    Network,
}

#[derive(Debug, Clone)]
pub struct DescriptorOptions {
    pub directory: PathBuf,
    pub load_balancer: LoadBalancer,
    pub image_tag: String,
}

impl DescriptorOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            load_balancer: LoadBalancer::Classic,
            image_tag: chrono::Utc::now().timestamp().to_string(),
        }
    }
}

/// Rendered program, ready to hand to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    yaml: String,
}

impl Program {
    pub fn as_yaml(&self) -> &str {
        &self.yaml
    }

    /// A project with no resources. Used for workspaces that only list or
    /// destroy stacks, where the state already knows every resource.
    pub fn empty(project: &str) -> Result<Self> {
        let doc = ProjectDocument {
            name: project.to_string(),
            runtime: "yaml",
            description: None,
            variables: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        };
        Ok(Self {
            yaml: serde_yaml::to_string(&doc)?,
        })
    }
}

#[derive(Serialize)]
struct ProjectDocument {
    name: String,
    runtime: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    variables: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    resources: BTreeMap<String, ResourceDef>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct ResourceDef {
    #[serde(rename = "type")]
    kind: &'static str,
    properties: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ResourceOptions>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResourceOptions {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
}

/// Build the program for deployment `name` in `project`.
pub fn build(project: &str, name: &str, options: &DescriptorOptions) -> Result<Program> {
    let labels = json!({
        "app.kubernetes.io/app": name,
        "app.getploy.io/name": name,
    });

    let mut variables = BTreeMap::new();
    variables.insert(
        "registryAuth".to_string(),
        json!({
            "fn::invoke": {
                "function": "aws:ecr:getAuthorizationToken",
                "arguments": { "registryId": "${repository.registryId}" },
            }
        }),
    );

    let mut resources = BTreeMap::new();
    resources.insert(
        "repository".to_string(),
        ResourceDef {
            kind: "aws:ecr/repository:Repository",
            properties: json!({ "name": name, "forceDelete": true }),
            options: None,
        },
    );
    resources.insert(
        "image".to_string(),
        ResourceDef {
            kind: "docker:index/image:Image",
            properties: json!({
                "imageName": format!("${{repository.repositoryUrl}}:{}", options.image_tag),
                "build": {
                    "context": context_path(&options.directory),
                    "platform": "linux/amd64",
                },
                "registry": {
                    "server": "${repository.repositoryUrl}",
                    "username": "${registryAuth.userName}",
                    "password": "${registryAuth.password}",
                },
            }),
            options: None,
        },
    );
    resources.insert(
        "namespace".to_string(),
        ResourceDef {
            kind: "kubernetes:core/v1:Namespace",
            properties: json!({ "metadata": { "name": name, "labels": labels } }),
            options: None,
        },
    );
    resources.insert(
        "deployment".to_string(),
        ResourceDef {
            kind: "kubernetes:apps/v1:Deployment",
            properties: json!({
                "metadata": {
                    "name": name,
                    "namespace": "${namespace.metadata.name}",
                    "labels": labels,
                },
                "spec": {
                    "replicas": REPLICAS,
                    "selector": { "matchLabels": labels },
                    "template": {
                        "metadata": { "labels": labels },
                        "spec": {
                            "containers": [{
                                "name": name,
                                "image": "${image.imageName}",
                                "ports": [{ "containerPort": CONTAINER_PORT }],
                            }],
                        },
                    },
                },
            }),
            options: Some(ResourceOptions {
                depends_on: vec!["${image}".to_string()],
            }),
        },
    );

    let mut service_metadata = json!({
        "name": name,
        "namespace": "${namespace.metadata.name}",
        "labels": labels,
    });
    if options.load_balancer == LoadBalancer::Network {
        service_metadata["annotations"] = json!({ NLB_ANNOTATION: "nlb" });
    }
    resources.insert(
        "service".to_string(),
        ResourceDef {
            kind: "kubernetes:core/v1:Service",
            properties: json!({
                "metadata": service_metadata,
                "spec": {
                    "type": "LoadBalancer",
                    "selector": labels,
                    "ports": [{ "port": CONTAINER_PORT, "targetPort": CONTAINER_PORT }],
                },
            }),
            options: Some(ResourceOptions {
                depends_on: vec!["${deployment}".to_string()],
            }),
        },
    );

    let mut outputs = BTreeMap::new();
    outputs.insert(
        ADDRESS_OUTPUT.to_string(),
        "${service.status.loadBalancer.ingress[0].hostname}".to_string(),
    );
    outputs.insert("imageName".to_string(), "${image.imageName}".to_string());

    let doc = ProjectDocument {
        name: project.to_string(),
        runtime: "yaml",
        description: Some(format!("ploy deployment {}", name)),
        variables,
        resources,
        outputs,
    };

    Ok(Program {
        yaml: serde_yaml::to_string(&doc)?,
    })
}

fn context_path(directory: &Path) -> String {
    std::fs::canonicalize(directory)
        .unwrap_or_else(|_| directory.to_path_buf())
        .display()
        .to_string()
}
