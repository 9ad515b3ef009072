//! Free-first routing policy

use super::RoutingPolicy;
use crate::routers::Candidate;

/// Prefers free candidates, then paid.
///
/// Among free candidates, larger remaining quota first; among paid
/// candidates, cheaper blended cost first.
#[derive(Debug, Default)]
pub struct FreeFirstPolicy;

impl RoutingPolicy for FreeFirstPolicy {
    fn select(&self, candidates: &[Candidate]) -> Vec<Candidate> {
        let mut ordered = candidates.to_vec();
        ordered.sort_by(|a, b| {
            if a.free != b.free {
                return b.free.cmp(&a.free);
            }
            if a.free {
                return b.remaining.cmp(&a.remaining);
            }
            a.blended_cost().total_cmp(&b.blended_cost())
        });
        ordered
    }

    fn name(&self) -> &'static str {
        "free_first"
    }
}
