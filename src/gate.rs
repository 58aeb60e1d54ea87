//! Freemium visibility gate over the link listing

use crate::registry::LinkSummary;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Links visible to instances that have not purchased pro.
pub const DEFAULT_VISIBLE_LIMIT: usize = 2;

/// Instance-wide pro flag.
///
/// Clones share the same flag, so the handle can be passed to the registry,
/// the gate and the HTTP layer. Once active it never reverts.
#[derive(Debug, Clone, Default)]
pub struct ProStatus {
    active: Arc<AtomicBool>,
}

impl ProStatus {
    /// Create a handle with the given initial state
    pub fn new(active: bool) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(active)),
        }
    }

    /// Whether the instance has been upgraded
    pub fn is_pro(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Flip to pro; returns `true` if this call changed the state.
    pub(crate) fn activate(&self) -> bool {
        !self.active.swap(true, Ordering::AcqRel)
    }
}

/// Listing after the gate has been applied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatedListing {
    /// Links the caller may see, newest first
    pub links: Vec<LinkSummary>,
    /// Links withheld by the gate
    pub hidden_count: usize,
}

/// Truncates listings for instances that are not pro
#[derive(Debug, Clone, Copy)]
pub struct FreemiumGate {
    visible_limit: usize,
}

impl FreemiumGate {
    /// Create a gate showing at most `visible_limit` links to free instances
    pub fn new(visible_limit: usize) -> Self {
        Self { visible_limit }
    }

    /// Apply the gate to a newest-first listing.
    pub fn apply(&self, mut links: Vec<LinkSummary>, status: &ProStatus) -> GatedListing {
        if status.is_pro() || links.len() <= self.visible_limit {
            return GatedListing {
                links,
                hidden_count: 0,
            };
        }

        let hidden_count = links.len() - self.visible_limit;
        links.truncate(self.visible_limit);
        GatedListing {
            links,
            hidden_count,
        }
    }
}

impl Default for FreemiumGate {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBLE_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ShortLink;
    use chrono::{TimeZone, Utc};

    fn listing(n: usize) -> Vec<LinkSummary> {
        (0..n)
            .rev()
            .map(|i| LinkSummary {
                link: ShortLink {
                    id: format!("link{i:04}"),
                    target_url: format!("https://example.com/{i}"),
                    created_at: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
                },
                scan_count: i as u64,
            })
            .collect()
    }

    #[test]
    fn free_instances_see_most_recent_two() {
        let gated = FreemiumGate::default().apply(listing(5), &ProStatus::new(false));
        assert_eq!(gated.hidden_count, 3);
        let ids: Vec<_> = gated.links.iter().map(|l| l.link.id.as_str()).collect();
        assert_eq!(ids, vec!["link0004", "link0003"]);
    }

    #[test]
    fn pro_instances_see_everything() {
        let gated = FreemiumGate::default().apply(listing(5), &ProStatus::new(true));
        assert_eq!(gated.links.len(), 5);
        assert_eq!(gated.hidden_count, 0);
    }

    #[test]
    fn short_listings_are_untouched() {
        for n in 0..=2 {
            let gated = FreemiumGate::default().apply(listing(n), &ProStatus::new(false));
            assert_eq!(gated.links.len(), n);
            assert_eq!(gated.hidden_count, 0);
        }
    }

    #[test]
    fn custom_limit_is_respected() {
        let gated = FreemiumGate::new(4).apply(listing(5), &ProStatus::default());
        assert_eq!(gated.links.len(), 4);
        assert_eq!(gated.hidden_count, 1);
    }

    #[test]
    fn activation_is_shared_and_one_way() {
        let status = ProStatus::default();
        let shared = status.clone();
        assert!(status.activate());
        assert!(!status.activate());
        assert!(shared.is_pro());
    }
}
