//! Execution engine for skiff
//!
//! Two drivers share this module:
//! 1. Deploy - a small state machine {Validating, Syncing, Restarting,
//!    Verifying, Done, Failed} with bounded retries per retryable state
//! 2. Provision - sequential apply of a declarative resource plan

pub mod differ;
pub mod executor;
pub mod planner;

pub use executor::{DeployOptions, DeployOutcome, DeployState, ProvisionOptions, ProvisionSummary};
pub use planner::{DeployPlan, ProvisionPlan};
