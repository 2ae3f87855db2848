//! Client library for the academic task-submission service.
//!
//! Modules split along the data paths:
//! - `api`: the authenticated gateway every remote call goes through.
//! - `session`: the token/identity pair and its durable file copy.
//! - `pager`: incremental loading for the task and submission lists.
//! - `reconcile`: pure roster/submission reconciliation.
//! - `submit`: the two-phase file submission workflow.
//! - `router`: role-based landing decision.

pub mod api;
pub mod config;
pub mod model;
pub mod pager;
pub mod reconcile;
pub mod router;
pub mod session;
pub mod submit;
