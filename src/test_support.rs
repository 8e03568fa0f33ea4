//! Shared fixtures for unit tests

use crate::artifacts::ArtifactBundle;
use crate::encoder::CategoricalEncoders;
use crate::features::{FeatureEncoder, FeatureVector};
use crate::forest::{train_random_forest, ForestParams};
use crate::labels::categorize;
use crate::metrics::EvaluationReport;
use crate::normalizer::StandardScaler;
use crate::types::{RiskTier, SubjectProfile, SubjectRecord};
use std::path::Path;

pub const CSV_HEADER: [&str; 25] = [
    "ID",
    "Name",
    "Age",
    "Gender",
    "Location",
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
    "Addiction_Level",
];

const GENDERS: [&str; 3] = ["Female", "Male", "Other"];
const GRADES: [&str; 6] = ["10th", "11th", "12th", "7th", "8th", "9th"];
const PURPOSES: [&str; 5] = ["Browsing", "Education", "Gaming", "Other", "Social Media"];

/// Heavy-use subject with an addiction score of 9
pub fn heavy_user() -> SubjectRecord {
    SubjectRecord {
        profile: SubjectProfile {
            age: 15.0,
            gender: "Male".to_string(),
            school_grade: "10th".to_string(),
            daily_usage_hours: 6.0,
            sleep_hours: 5.0,
            academic_performance: 62.0,
            social_interactions: 3.0,
            exercise_hours: 0.5,
            anxiety_level: 8.0,
            depression_level: 7.0,
            self_esteem: 3.0,
            parental_control: 0.0,
            screen_time_before_bed: 2.5,
            phone_checks_per_day: 150.0,
            apps_used_daily: 18.0,
            time_on_social_media: 4.5,
            time_on_gaming: 2.5,
            time_on_education: 0.5,
            phone_usage_purpose: "Social Media".to_string(),
            family_communication: 3.0,
            weekend_usage_hours: 9.0,
        },
        addiction_level: 9.0,
    }
}

/// Deterministic corpus whose tiers are driven only by the three observable usage columns
pub fn synthetic_records(n: usize) -> Vec<SubjectRecord> {
    (0..n)
        .map(|i| {
            let tier = i % 3;
            let jitter = (i % 5) as f64 * 0.2;
            let (usage, checks, social, addiction) = match tier {
                0 => (1.5 + jitter, 20.0 + (i % 10) as f64, 0.5 + jitter, 2.0 + (i % 4) as f64 * 0.5),
                1 => (4.5 + jitter, 60.0 + (i % 10) as f64, 2.0 + jitter, 5.5 + (i % 3) as f64 * 0.5),
                _ => (8.0 + jitter, 140.0 + (i % 10) as f64, 4.5 + jitter, 8.5 + (i % 3) as f64 * 0.5),
            };
            SubjectRecord {
                profile: SubjectProfile {
                    age: 13.0 + (i % 5) as f64,
                    gender: GENDERS[(i / 3) % GENDERS.len()].to_string(),
                    school_grade: GRADES[(i / 2) % GRADES.len()].to_string(),
                    daily_usage_hours: usage,
                    sleep_hours: 6.0 + (i % 5) as f64 * 0.5,
                    academic_performance: 65.0 + (i % 7) as f64 * 5.0,
                    social_interactions: 2.0 + (i % 8) as f64,
                    exercise_hours: 0.5 + (i % 4) as f64 * 0.5,
                    anxiety_level: 1.0 + (i % 8) as f64,
                    depression_level: 2.0 + (i % 7) as f64,
                    self_esteem: 1.0 + (i % 10) as f64,
                    parental_control: (i % 2) as f64,
                    screen_time_before_bed: 0.5 + (i % 4) as f64 * 0.5,
                    phone_checks_per_day: checks,
                    apps_used_daily: 5.0 + (i % 11) as f64,
                    time_on_social_media: social,
                    time_on_gaming: (i % 4) as f64 * 0.5,
                    time_on_education: 0.5 + (i % 4) as f64 * 0.5,
                    phone_usage_purpose: PURPOSES[(i / 5) % PURPOSES.len()].to_string(),
                    family_communication: 1.0 + (i % 10) as f64,
                    weekend_usage_hours: 4.0 + (i % 7) as f64,
                },
                addiction_level: addiction,
            }
        })
        .collect()
}

fn csv_row(id: usize, record: &SubjectRecord) -> Vec<String> {
    let p = &record.profile;
    vec![
        id.to_string(),
        format!("Subject {id}"),
        p.age.to_string(),
        p.gender.clone(),
        "Springfield".to_string(),
        p.school_grade.clone(),
        p.daily_usage_hours.to_string(),
        p.sleep_hours.to_string(),
        p.academic_performance.to_string(),
        p.social_interactions.to_string(),
        p.exercise_hours.to_string(),
        p.anxiety_level.to_string(),
        p.depression_level.to_string(),
        p.self_esteem.to_string(),
        p.parental_control.to_string(),
        p.screen_time_before_bed.to_string(),
        p.phone_checks_per_day.to_string(),
        p.apps_used_daily.to_string(),
        p.time_on_social_media.to_string(),
        p.time_on_gaming.to_string(),
        p.time_on_education.to_string(),
        p.phone_usage_purpose.clone(),
        p.family_communication.to_string(),
        p.weekend_usage_hours.to_string(),
        record.addiction_level.to_string(),
    ]
}

/// Write records as a training CSV, identifying columns included
pub fn write_csv(path: &Path, records: &[SubjectRecord]) {
    let mut writer = csv::Writer::from_path(path).unwrap();
    writer.write_record(CSV_HEADER).unwrap();
    for (id, record) in records.iter().enumerate() {
        writer.write_record(csv_row(id + 1, record)).unwrap();
    }
    writer.flush().unwrap();
}

/// Small forest parameters that keep tests fast
pub fn small_forest() -> ForestParams {
    ForestParams {
        n_trees: 15,
        ..ForestParams::default()
    }
}

/// A fitted bundle built directly from the synthetic corpus
pub fn fitted_bundle() -> ArtifactBundle {
    let records = synthetic_records(90);
    let encoders = CategoricalEncoders::fit(&records).unwrap();
    let encoder = FeatureEncoder::new(&encoders);
    let rows: Vec<FeatureVector> = records
        .iter()
        .map(|r| encoder.encode(&r.profile).unwrap())
        .collect();
    let scaler = StandardScaler::fit(&rows).unwrap();
    let scaled: Vec<FeatureVector> = rows.iter().map(|r| scaler.transform(r)).collect();
    let labels: Vec<usize> = records
        .iter()
        .map(|r| categorize(r.addiction_level).index())
        .collect();

    let model = train_random_forest(&scaled, &labels, RiskTier::COUNT, &small_forest()).unwrap();
    let evaluation = EvaluationReport::from_predictions(&labels, &labels, rows.len(), 0);
    ArtifactBundle::new(model, scaler, encoders, evaluation)
}
