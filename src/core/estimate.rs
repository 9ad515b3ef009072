//! Rough token estimation
//!
//! Used only for quota reservations before the provider reports actual
//! usage; the reservation is reconciled to the real count at commit.

use crate::protocols::Message;

/// Estimate the prompt token count for a message list.
///
/// Approximation: ~4 characters per token, plus a small per-message
/// overhead for role and formatting, plus a base request overhead.
pub fn estimate_tokens(messages: &[Message]) -> i64 {
    let mut total: i64 = 0;
    for message in messages {
        total += message.content.len() as i64 / 4;
        total += 4;
    }
    total + 3
}
