//! # a2a-check — conformance probing for Agent-to-Agent (A2A) v0.3 servers
//!
//! This crate talks to a live A2A server the way a client would and reports,
//! rule by rule, where the server departs from the
//! [A2A protocol](https://a2a-protocol.org/v0.3.0/specification/).
//!
//! ## Overview
//!
//! A probe run walks through up to five phases, each producing one
//! [`report::Section`] of findings:
//!
//! - **network**: the origin and the agent card endpoint are reachable and
//!   serve JSON
//! - **schema**: the card matches the AgentCard structure
//! - **card**: semantic rules over the card (transports, skills, security)
//! - **jsonrpc**: a scripted JSON-RPC 2.0 conversation, including SSE
//!   streaming and push notification config calls
//! - **rest**: the same conversation over the HTTP+JSON binding
//!
//! Every finding carries a catalog rule id, a severity fixed by the
//! [`catalog`], an outcome (pass/fail/skip) and a protocol anchor. The report's
//! highest severity drives the process exit code.
//!
//! ## Quick Start
//!
//! ```no_run
//! use a2a_check::{ProbeConfig, Suite};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ProbeConfig::default().with_fail_on_warn(true);
//!     let suite = Suite::structural(config)?;
//!
//!     let report = suite.suite_all("http://localhost:9999", None).await;
//!     for (section, rule, severity, outcome, message, _) in report.rows() {
//!         println!("{section} {rule} {severity} {outcome} {message}");
//!     }
//!
//!     std::process::exit(report.exit_code(suite.config().fail_on_warn));
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`Suite`] — composes the phases into the CLI operations
//! - [`card`] — discovery, [`card::SchemaValidator`] and the card rules
//! - [`resolver`] — picks one endpoint per transport from the card
//! - [`driver`] — the JSON-RPC and REST conversation drivers
//! - [`stream`] — deadline-bounded SSE validation
//! - [`client`] — the HTTP and event-stream primitives
//! - [`report`] — [`Finding`], [`report::Section`] and [`Report`]
//!
//! The library emits `tracing` events but never installs a subscriber.

pub mod card;
pub mod catalog;
pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod report;
pub mod resolver;
pub mod stream;
pub mod suite;
pub mod types;

/// Prelude module that re-exports commonly used types.
///
/// ```
/// use a2a_check::prelude::*;
///
/// let config = ProbeConfig::default();
/// assert_eq!(Report::new().exit_code(config.fail_on_warn), 0);
/// ```
pub mod prelude {
    pub use crate::card::{CapabilityDocument, SchemaValidator, StructuralValidator};
    pub use crate::catalog::Rule;
    pub use crate::config::ProbeConfig;
    pub use crate::error::{ProbeError, ProbeResult, TransportFailure};
    pub use crate::report::{Finding, Outcome, Report, Section, SectionKind, Severity};
    pub use crate::resolver::{TransportBinding, TransportKind};
    pub use crate::suite::Suite;
}

pub use config::ProbeConfig;
pub use error::{ProbeError, ProbeResult};
pub use report::{Finding, Outcome, Report, Severity};
pub use suite::Suite;
