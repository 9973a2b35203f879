//! End-to-end tests for ploy.
//!
//! These run the real `ploy` binary with a throwaway `HOME` and, where an
//! engine is needed, a shell script standing in for the `pulumi` CLI. They
//! catch argument parsing, config resolution and exit status regressions
//! that the in-process tests miss.
//!
//! # Running
//!
//! ```sh
//! cargo test --test e2e
//! ```
//!
//! Tests that need the stand-in engine are unix-only.

mod harness;

mod cli;
mod errors;
