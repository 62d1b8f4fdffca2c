//! # vox-api
//!
//! Async REST client for the agent-configuration API: cursored list
//! fetches, partial-update and publish calls, and the settle-all mutation
//! batch used by the sync pipelines.

pub mod client;
pub mod error;
pub mod mutation;

pub use client::{ApiClient, DEFAULT_PAGE_SIZE};
pub use error::ApiError;
pub use mutation::{dispatch_all, Mutation, MutationOutcome};
