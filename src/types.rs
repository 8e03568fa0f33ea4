//! Core data types
//!
//! This module defines the records and values that flow through training and inference:
//! raw CSV rows, cleaned subject records, risk tiers, screenshot observations and
//! predictions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordinal phone-addiction risk tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RiskTier {
    Low = 0,
    Medium = 1,
    High = 2,
}

impl RiskTier {
    /// All tiers in ordinal order
    pub const ALL: [RiskTier; 3] = [RiskTier::Low, RiskTier::Medium, RiskTier::High];

    /// Number of tiers (classifier output classes)
    pub const COUNT: usize = 3;

    /// Class index used by the classifier
    pub fn index(self) -> usize {
        self as usize
    }

    /// Tier for a classifier class index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
        }
    }
}

impl From<RiskTier> for u8 {
    fn from(tier: RiskTier) -> Self {
        tier as u8
    }
}

impl TryFrom<u8> for RiskTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        RiskTier::from_index(value as usize).ok_or_else(|| format!("invalid risk tier {value}"))
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.index(), self.as_str())
    }
}

/// One CSV row as read from disk.
///
/// Every field is optional: empty or unparseable cells become `None` and the row is
/// dropped during cleaning. `ID`, `Name` and `Location` are not represented at all, so
/// identifying columns can never reach the feature vector.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRecord {
    #[serde(rename = "Age", default, deserialize_with = "csv::invalid_option")]
    pub age: Option<f64>,
    #[serde(rename = "Gender", default, deserialize_with = "csv::invalid_option")]
    pub gender: Option<String>,
    #[serde(rename = "School_Grade", default, deserialize_with = "csv::invalid_option")]
    pub school_grade: Option<String>,
    #[serde(rename = "Daily_Usage_Hours", default, deserialize_with = "csv::invalid_option")]
    pub daily_usage_hours: Option<f64>,
    #[serde(rename = "Sleep_Hours", default, deserialize_with = "csv::invalid_option")]
    pub sleep_hours: Option<f64>,
    #[serde(rename = "Academic_Performance", default, deserialize_with = "csv::invalid_option")]
    pub academic_performance: Option<f64>,
    #[serde(rename = "Social_Interactions", default, deserialize_with = "csv::invalid_option")]
    pub social_interactions: Option<f64>,
    #[serde(rename = "Exercise_Hours", default, deserialize_with = "csv::invalid_option")]
    pub exercise_hours: Option<f64>,
    #[serde(rename = "Anxiety_Level", default, deserialize_with = "csv::invalid_option")]
    pub anxiety_level: Option<f64>,
    #[serde(rename = "Depression_Level", default, deserialize_with = "csv::invalid_option")]
    pub depression_level: Option<f64>,
    #[serde(rename = "Self_Esteem", default, deserialize_with = "csv::invalid_option")]
    pub self_esteem: Option<f64>,
    #[serde(rename = "Parental_Control", default, deserialize_with = "csv::invalid_option")]
    pub parental_control: Option<f64>,
    #[serde(rename = "Screen_Time_Before_Bed", default, deserialize_with = "csv::invalid_option")]
    pub screen_time_before_bed: Option<f64>,
    #[serde(rename = "Phone_Checks_Per_Day", default, deserialize_with = "csv::invalid_option")]
    pub phone_checks_per_day: Option<f64>,
    #[serde(rename = "Apps_Used_Daily", default, deserialize_with = "csv::invalid_option")]
    pub apps_used_daily: Option<f64>,
    #[serde(rename = "Time_on_Social_Media", default, deserialize_with = "csv::invalid_option")]
    pub time_on_social_media: Option<f64>,
    #[serde(rename = "Time_on_Gaming", default, deserialize_with = "csv::invalid_option")]
    pub time_on_gaming: Option<f64>,
    #[serde(rename = "Time_on_Education", default, deserialize_with = "csv::invalid_option")]
    pub time_on_education: Option<f64>,
    #[serde(rename = "Phone_Usage_Purpose", default, deserialize_with = "csv::invalid_option")]
    pub phone_usage_purpose: Option<String>,
    #[serde(rename = "Family_Communication", default, deserialize_with = "csv::invalid_option")]
    pub family_communication: Option<f64>,
    #[serde(rename = "Weekend_Usage_Hours", default, deserialize_with = "csv::invalid_option")]
    pub weekend_usage_hours: Option<f64>,
    #[serde(rename = "Addiction_Level", default, deserialize_with = "csv::invalid_option")]
    pub addiction_level: Option<f64>,
}

/// The 21 modeled attributes of a subject, categoricals still as text.
///
/// At training time this comes from a cleaned CSV row; at inference time it is the
/// placeholder profile with the screenshot observation written into its slots.
/// Missing fields deserialize to the placeholder defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectProfile {
    pub age: f64,
    pub gender: String,
    pub school_grade: String,
    pub daily_usage_hours: f64,
    pub sleep_hours: f64,
    pub academic_performance: f64,
    pub social_interactions: f64,
    pub exercise_hours: f64,
    pub anxiety_level: f64,
    pub depression_level: f64,
    pub self_esteem: f64,
    pub parental_control: f64,
    pub screen_time_before_bed: f64,
    pub phone_checks_per_day: f64,
    pub apps_used_daily: f64,
    pub time_on_social_media: f64,
    pub time_on_gaming: f64,
    pub time_on_education: f64,
    pub phone_usage_purpose: String,
    pub family_communication: f64,
    pub weekend_usage_hours: f64,
}

/// A complete subject row: every modeled attribute present and finite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub profile: SubjectProfile,
    /// Continuous addiction score (roughly 0-10)
    pub addiction_level: f64,
}

impl RawRecord {
    /// Convert to a complete record, or `None` if any modeled value is missing
    pub fn complete(self) -> Option<SubjectRecord> {
        fn num(v: Option<f64>) -> Option<f64> {
            v.filter(|x| x.is_finite())
        }
        fn text(v: Option<String>) -> Option<String> {
            v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
        }

        let profile = SubjectProfile {
            age: num(self.age)?,
            gender: text(self.gender)?,
            school_grade: text(self.school_grade)?,
            daily_usage_hours: num(self.daily_usage_hours)?,
            sleep_hours: num(self.sleep_hours)?,
            academic_performance: num(self.academic_performance)?,
            social_interactions: num(self.social_interactions)?,
            exercise_hours: num(self.exercise_hours)?,
            anxiety_level: num(self.anxiety_level)?,
            depression_level: num(self.depression_level)?,
            self_esteem: num(self.self_esteem)?,
            parental_control: num(self.parental_control)?,
            screen_time_before_bed: num(self.screen_time_before_bed)?,
            phone_checks_per_day: num(self.phone_checks_per_day)?,
            apps_used_daily: num(self.apps_used_daily)?,
            time_on_social_media: num(self.time_on_social_media)?,
            time_on_gaming: num(self.time_on_gaming)?,
            time_on_education: num(self.time_on_education)?,
            phone_usage_purpose: text(self.phone_usage_purpose)?,
            family_communication: num(self.family_communication)?,
            weekend_usage_hours: num(self.weekend_usage_hours)?,
        };

        Some(SubjectRecord {
            profile,
            addiction_level: num(self.addiction_level)?,
        })
    }
}

/// Mobile platform reported by the screenshot collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    #[serde(rename = "iOS", alias = "ios", alias = "IOS")]
    Ios,
    #[serde(rename = "Android", alias = "android")]
    Android,
    #[serde(other)]
    Unknown,
}

/// Partial record extracted from screen-time screenshots.
///
/// Produced per analysis request and consumed immediately; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedObservation {
    #[serde(rename = "Daily_Usage_Hours")]
    pub daily_usage_hours: f64,
    #[serde(rename = "Phone_Checks_Per_Day")]
    pub phone_checks_per_day: u32,
    #[serde(rename = "Time_on_Social_Media")]
    pub time_on_social_media: f64,
    #[serde(rename = "Device_Type", default, skip_serializing_if = "Option::is_none")]
    pub device_type: Option<DeviceType>,
}

/// Classifier output for one feature vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub tier: RiskTier,
    /// Mean per-tree class probabilities, indexed by tier
    pub probabilities: [f64; RiskTier::COUNT],
}

/// Result of a single prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted tier (serialized as 0, 1 or 2)
    pub tier: RiskTier,
    /// Mean per-tree class probabilities, indexed by tier
    pub probabilities: [f64; RiskTier::COUNT],
    /// The observed metrics the prediction was computed from
    pub observation: ExtractedObservation,
}
