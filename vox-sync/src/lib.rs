//! # vox-sync
//!
//! The state synchronization engine: order-insensitive structural diffing,
//! one-hop dependency resolution, change-set planning, and the async
//! pull / deploy / publish pipelines gluing the model, file, and API layers
//! together.

pub mod deps;
pub mod diff;
pub mod error;
pub mod pipeline;
pub mod planner;

pub use deps::find_affected_agent_ids;
pub use diff::{
    compute_changes, diff_values, key_arrays_by_id, ChangeSet, DiffEntry, DiffKind, ResourceChange,
};
pub use error::SyncError;
pub use pipeline::{
    apply_mutations, plan_deploy_run, plan_publish_run, pull, rebind_phone_numbers, DeployPlan,
    PublishPlan, PullOutcome, RebindOutcome, SyncScope,
};
pub use planner::{plan_deploy, plan_phone_rebind, plan_publish};
