//! Cost-first routing policy

use super::RoutingPolicy;
use crate::routers::Candidate;

/// Orders candidates by ascending blended cost.
///
/// Free candidates cost 0 and naturally lead.
#[derive(Debug, Default)]
pub struct CostFirstPolicy;

impl RoutingPolicy for CostFirstPolicy {
    fn select(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let mut ordered = candidates.to_vec();
        ordered.sort_by(|a, b| a.blended_cost().total_cmp(&b.blended_cost()));
        ordered
    }

    fn name(&self) -> &'static str {
        "cost_first"
    }
}
