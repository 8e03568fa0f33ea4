//! Feature encoding
//!
//! This module turns a subject profile into the fixed-order numeric feature vector:
//! - Categorical columns mapped through the fitted label encoders
//! - The 21 slots laid out in one never-reordered sequence
//! - Inference-time gap filling from a placeholder profile

use crate::encoder::CategoricalEncoders;
use crate::error::DetoxError;
use crate::types::{ExtractedObservation, SubjectProfile};

/// Number of model features
pub const FEATURE_COUNT: usize = 21;

/// Feature column names in vector order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "Age",
    "Gender",
    "School_Grade",
    "Daily_Usage_Hours",
    "Sleep_Hours",
    "Academic_Performance",
    "Social_Interactions",
    "Exercise_Hours",
    "Anxiety_Level",
    "Depression_Level",
    "Self_Esteem",
    "Parental_Control",
    "Screen_Time_Before_Bed",
    "Phone_Checks_Per_Day",
    "Apps_Used_Daily",
    "Time_on_Social_Media",
    "Time_on_Gaming",
    "Time_on_Education",
    "Phone_Usage_Purpose",
    "Family_Communication",
    "Weekend_Usage_Hours",
];

/// Slot of `Daily_Usage_Hours`
pub const DAILY_USAGE_SLOT: usize = 3;
/// Slot of `Phone_Checks_Per_Day`
pub const PHONE_CHECKS_SLOT: usize = 13;
/// Slot of `Time_on_Social_Media`
pub const SOCIAL_MEDIA_SLOT: usize = 15;

/// Ordered numeric features for one subject
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Neutral filler for the slots a screenshot cannot observe.
///
/// Only usage hours, phone checks and social-media time are real at inference time;
/// everything here is a stand-in, not an inferred value. Override it through the
/// `[placeholders]` config section when real answers are available.
impl Default for SubjectProfile {
    fn default() -> Self {
        Self {
            age: 16.0,
            gender: "Male".to_string(),
            school_grade: "10th".to_string(),
            daily_usage_hours: 0.0,
            sleep_hours: 7.0,
            academic_performance: 75.0,
            social_interactions: 5.0,
            exercise_hours: 1.0,
            anxiety_level: 5.0,
            depression_level: 5.0,
            self_esteem: 5.0,
            parental_control: 0.0,
            screen_time_before_bed: 1.0,
            phone_checks_per_day: 0.0,
            apps_used_daily: 12.0,
            time_on_social_media: 0.0,
            time_on_gaming: 1.0,
            time_on_education: 1.0,
            phone_usage_purpose: "Browsing".to_string(),
            family_communication: 5.0,
            weekend_usage_hours: 6.0,
        }
    }
}

impl SubjectProfile {
    /// Copy of this profile with the observed screenshot metrics written in
    pub fn with_observation(&self, observation: &ExtractedObservation) -> SubjectProfile {
        SubjectProfile {
            daily_usage_hours: observation.daily_usage_hours,
            phone_checks_per_day: observation.phone_checks_per_day as f64,
            time_on_social_media: observation.time_on_social_media,
            ..self.clone()
        }
    }
}

/// Encoder from subject profiles to feature vectors
pub struct FeatureEncoder<'a> {
    encoders: &'a CategoricalEncoders,
}

impl<'a> FeatureEncoder<'a> {
    pub fn new(encoders: &'a CategoricalEncoders) -> Self {
        Self { encoders }
    }

    /// Encode a profile into the 21-slot vector (unscaled)
    pub fn encode(&self, profile: &SubjectProfile) -> Result<FeatureVector, DetoxError> {
        let gender = self.encoders.gender.encode(&profile.gender)? as f64;
        let grade = self.encoders.grade.encode(&profile.school_grade)? as f64;
        let purpose = self.encoders.purpose.encode(&profile.phone_usage_purpose)? as f64;

        Ok([
            profile.age,
            gender,
            grade,
            profile.daily_usage_hours,
            profile.sleep_hours,
            profile.academic_performance,
            profile.social_interactions,
            profile.exercise_hours,
            profile.anxiety_level,
            profile.depression_level,
            profile.self_esteem,
            profile.parental_control,
            profile.screen_time_before_bed,
            profile.phone_checks_per_day,
            profile.apps_used_daily,
            profile.time_on_social_media,
            profile.time_on_gaming,
            profile.time_on_education,
            purpose,
            profile.family_communication,
            profile.weekend_usage_hours,
        ])
    }

    /// Merge an observation into the placeholder profile and encode it
    pub fn encode_observation(
        &self,
        observation: &ExtractedObservation,
        placeholders: &SubjectProfile,
    ) -> Result<FeatureVector, DetoxError> {
        self.encode(&placeholders.with_observation(observation))
    }
}
