//! Click-capacity calculator — how many more clicks a campaign's tracked
//! links can still deliver.

use adpilot_core::types::{Link, LinkStatus};

/// Sum of unused click allowance over a campaign's active links.
///
/// A link with `clicks >= click_limit` contributes 0, never negative, and a
/// `click_limit` of 0 means no capacity here (the billing layer treats 0 as
/// unlimited; this calculation deliberately does not).
pub fn remaining_capacity(links: &[Link]) -> u64 {
    links
        .iter()
        .filter(|l| l.status == LinkStatus::Active)
        .map(|l| l.click_limit.saturating_sub(l.clicks))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn link(click_limit: u64, clicks: u64, status: LinkStatus) -> Link {
        Link {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            url: "https://go.example/x".to_string(),
            click_limit,
            clicks,
            status,
        }
    }

    #[test]
    fn test_sums_active_links_only() {
        let links = vec![
            link(10_000, 2_500, LinkStatus::Active),
            link(5_000, 0, LinkStatus::Paused),
            link(5_000, 0, LinkStatus::Completed),
            link(5_000, 0, LinkStatus::Deleted),
            link(5_000, 0, LinkStatus::Rejected),
            link(3_000, 1_000, LinkStatus::Active),
        ];
        assert_eq!(remaining_capacity(&links), 9_500);
    }

    #[test]
    fn test_overdelivered_link_contributes_zero() {
        let links = vec![
            link(1_000, 1_500, LinkStatus::Active),
            link(1_000, 400, LinkStatus::Active),
        ];
        assert_eq!(remaining_capacity(&links), 600);
    }

    #[test]
    fn test_zero_limit_means_no_capacity() {
        let links = vec![link(0, 0, LinkStatus::Active)];
        assert_eq!(remaining_capacity(&links), 0);
    }

    #[test]
    fn test_empty_link_set() {
        assert_eq!(remaining_capacity(&[]), 0);
    }
}
