//! Label categorization
//!
//! Maps the continuous `Addiction_Level` score onto the three ordinal risk tiers.
//! The thresholds are a fixed business rule applied to every training record before
//! fitting; inference never sees a raw score.

use crate::types::RiskTier;

/// Highest score still considered low risk
pub const LOW_RISK_MAX_SCORE: f64 = 4.0;

/// Highest score still considered medium risk
pub const MEDIUM_RISK_MAX_SCORE: f64 = 7.0;

/// Categorize an addiction score: `<= 4` low, `<= 7` medium, otherwise high
pub fn categorize(score: f64) -> RiskTier {
    if score <= LOW_RISK_MAX_SCORE {
        RiskTier::Low
    } else if score <= MEDIUM_RISK_MAX_SCORE {
        RiskTier::Medium
    } else {
        RiskTier::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(categorize(4.0), RiskTier::Low);
        assert_eq!(categorize(5.0), RiskTier::Medium);
        assert_eq!(categorize(7.0), RiskTier::Medium);
        assert_eq!(categorize(8.0), RiskTier::High);
    }

    #[test]
    fn test_fractional_scores() {
        assert_eq!(categorize(0.0), RiskTier::Low);
        assert_eq!(categorize(4.0001), RiskTier::Medium);
        assert_eq!(categorize(7.0001), RiskTier::High);
        assert_eq!(categorize(10.0), RiskTier::High);
    }

    #[test]
    fn test_tier_matches_thresholds_across_range() {
        for step in 0..=100 {
            let score = step as f64 / 10.0;
            let tier = categorize(score);
            assert_eq!(tier == RiskTier::Low, score <= 4.0, "score {score}");
            assert_eq!(
                tier == RiskTier::Medium,
                score > 4.0 && score <= 7.0,
                "score {score}"
            );
            assert_eq!(tier == RiskTier::High, score > 7.0, "score {score}");
        }
    }
}
