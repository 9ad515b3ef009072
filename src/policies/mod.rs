//! Routing policies
//!
//! A policy is a pure, stable ordering over a candidate list: the router
//! attempts candidates in the returned order. Orderings must be stable so
//! that ties keep their input order, which is config order.

use std::fmt::Debug;

use crate::routers::Candidate;

mod cost_first;
mod free_first;

pub use cost_first::CostFirstPolicy;
pub use free_first::FreeFirstPolicy;

/// Orders candidates for the attempt loop.
pub trait RoutingPolicy: Send + Sync + Debug {
    /// Return the candidates ordered highest-priority first. Must be
    /// stable: candidates that compare equal keep their input order.
    fn select(&self, candidates: &[Candidate]) -> Vec<Candidate>;

    /// Policy name for logging and debugging.
    fn name(&self) -> &'static str;
}
