//! Gamified detox status
//!
//! Each risk tier maps to a plant-themed status with a message and a short growth
//! plan, the way the dashboard presents a prediction.

use crate::types::RiskTier;
use serde::Serialize;

/// Presentation of one risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DetoxStatus {
    pub tier: RiskTier,
    pub title: &'static str,
    pub icon: &'static str,
    pub message: &'static str,
    /// Display color name
    pub color: &'static str,
    pub growth_plan: &'static [&'static str],
}

static FLOURISHING: DetoxStatus = DetoxStatus {
    tier: RiskTier::Low,
    title: "Flourishing Tree",
    icon: "🌲",
    message: "Your digital forest is healthy! Keep nurturing your focus.",
    color: "green",
    growth_plan: &[
        "Keep doing what you're doing!",
        "Share your healthy habits with others.",
    ],
};

static THIRSTY: DetoxStatus = DetoxStatus {
    tier: RiskTier::Medium,
    title: "Thirsty Sprout",
    icon: "🌱",
    message: "Your focus is starting to wilt. Give it some screen-free time.",
    color: "orange",
    growth_plan: &[
        "Use a 'Zen Mode' app for 30 minutes daily",
        "Turn off non-human notifications",
        "Limit social media to 45 mins.",
    ],
};

static WILTED: DetoxStatus = DetoxStatus {
    tier: RiskTier::High,
    title: "Wilted Leaf",
    icon: "🍂",
    message: "Your digital plant is dying. Immediate detox required!",
    color: "red",
    growth_plan: &[
        "Enable Screen Time Downtime at 10 PM",
        "Delete Social Media apps for 48 hours",
        "Leave phone in another room during study.",
    ],
};

impl DetoxStatus {
    pub fn for_tier(tier: RiskTier) -> &'static DetoxStatus {
        match tier {
            RiskTier::Low => &FLOURISHING,
            RiskTier::Medium => &THIRSTY,
            RiskTier::High => &WILTED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tier_has_a_status() {
        for tier in RiskTier::ALL {
            let status = DetoxStatus::for_tier(tier);
            assert_eq!(status.tier, tier);
            assert!(!status.growth_plan.is_empty());
        }
    }

    #[test]
    fn test_high_tier_is_wilted_leaf() {
        let status = DetoxStatus::for_tier(RiskTier::High);
        assert_eq!(status.title, "Wilted Leaf");
        assert_eq!(status.color, "red");
        assert_eq!(status.growth_plan.len(), 3);
    }
}
