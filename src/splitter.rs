// Deterministic, stateless traffic splitting.
//
// A visitor is bucketed by hashing a stable key onto a fixed-size ring and
// walking the weighted buckets in declared order. The same (key, buckets)
// pair always lands in the same bucket, so a given visitor consistently
// sees the same variant or rollout decision across requests for the life
// of a rule's configuration.

use crate::attribute::VisitorAttributes;
use crate::rule::RuleId;
use sha2::{Digest, Sha256};

// ============================================================================
// VISITOR KEY
// ============================================================================

/// Computes the stable per-visitor key the splitter hashes.
///
/// An explicit `visitor_id` (cookie/session id supplied upstream) wins
/// when present, so assignment survives IP churn on mobile networks.
/// Otherwise the key is `ip_address + "|" + user_agent`. The rule id is
/// mixed in so distinct rules bucket the same visitor independently.
pub fn compute_visitor_key(attrs: &VisitorAttributes, rule_id: &RuleId) -> String {
    let identity = match &attrs.visitor_id {
        Some(id) => id.clone(),
        None => format!(
            "{}|{}",
            attrs.ip_address.as_deref().unwrap_or(""),
            attrs.user_agent.as_deref().unwrap_or("")
        ),
    };
    format!("{}:{}", rule_id, identity)
}

// ============================================================================
// WEIGHTED BUCKETS
// ============================================================================

/// A labelled share of traffic. Weights are percentages (0-100).
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedBucket {
    pub label: String,
    pub weight: f64,
}

impl WeightedBucket {
    pub fn new(label: impl Into<String>, weight: f64) -> Self {
        Self {
            label: label.into(),
            weight,
        }
    }
}

// ============================================================================
// TRAFFIC SPLITTER
// ============================================================================

/// Deterministic bucketing over a fixed-size hash ring.
#[derive(Debug, Clone)]
pub struct TrafficSplitter {
    ring_size: u64,
}

impl TrafficSplitter {
    pub fn new() -> Self {
        Self { ring_size: 10_000 }
    }

    /// Maps a key to a stable position on the ring.
    ///
    /// First eight bytes of the SHA-256 digest, big-endian, modulo the
    /// ring size. SHA-256 keeps positions uniform and platform-stable, so
    /// a backend and an edge runtime agree on every assignment.
    pub fn position(&self, key: &str) -> u64 {
        let digest = Sha256::digest(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(prefix) % self.ring_size
    }

    /// Assigns a key to one of the weighted buckets.
    ///
    /// Walks the buckets in declared order accumulating weight and returns
    /// the index of the first bucket whose cumulative share covers the
    /// key's ring position. Returns `None` when the position falls past
    /// the total weight: that residual share is an explicit fall-through
    /// policy (e.g. an A/B test keeping a control group on the default
    /// destination), not an error.
    ///
    /// Weights summing over 100 are scaled down proportionally; the
    /// validator should have rejected them at authoring time, so this is
    /// logged as a warning-level signal for authors.
    pub fn split(&self, key: &str, buckets: &[WeightedBucket]) -> Option<usize> {
        let total: f64 = buckets.iter().map(|b| b.weight.max(0.0)).sum();
        let scale = if total > 100.0 {
            log::warn!(
                "bucket weights sum to {:.1}; scaling down proportionally",
                total
            );
            100.0 / total
        } else {
            1.0
        };

        let position = self.position(key) as f64;
        let mut cumulative = 0.0;
        for (index, bucket) in buckets.iter().enumerate() {
            cumulative += bucket.weight.max(0.0) * scale;
            let threshold = cumulative / 100.0 * self.ring_size as f64;
            if position < threshold {
                return Some(index);
            }
        }
        None
    }
}

impl Default for TrafficSplitter {
    fn default() -> Self {
        Self::new()
    }
}
