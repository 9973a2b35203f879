//! ploy: deploy a containerized application to Kubernetes on AWS by
//! driving the Pulumi engine.

pub mod cli;
pub mod config;
pub mod engine;
pub mod name;
pub mod session;
pub mod tui;
