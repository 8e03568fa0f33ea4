//! Categorical encoding
//!
//! Label encoders for the three categorical columns (`Gender`, `Phone_Usage_Purpose`,
//! `School_Grade`). Each encoder is fitted once on the training corpus and reused
//! verbatim at inference time.
//!
//! Codes are assigned in alphabetical order of the distinct values, so the same
//! vocabulary always yields the same codes regardless of row order.

use crate::error::DetoxError;
use crate::types::{SubjectProfile, SubjectRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The categorical columns of a training record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoricalField {
    #[serde(rename = "Gender")]
    Gender,
    #[serde(rename = "Phone_Usage_Purpose")]
    PhoneUsagePurpose,
    #[serde(rename = "School_Grade")]
    SchoolGrade,
}

impl CategoricalField {
    pub fn as_str(self) -> &'static str {
        match self {
            CategoricalField::Gender => "Gender",
            CategoricalField::PhoneUsagePurpose => "Phone_Usage_Purpose",
            CategoricalField::SchoolGrade => "School_Grade",
        }
    }

    /// Read this field's value from a record
    pub fn value_of(self, profile: &SubjectProfile) -> &str {
        match self {
            CategoricalField::Gender => &profile.gender,
            CategoricalField::PhoneUsagePurpose => &profile.phone_usage_purpose,
            CategoricalField::SchoolGrade => &profile.school_grade,
        }
    }
}

/// Value-to-code mapping for one categorical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    field: CategoricalField,
    /// Sorted vocabulary; a value's code is its index
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit an encoder over the distinct values of `values`
    pub fn fit<'a, I>(field: CategoricalField, values: I) -> Result<Self, DetoxError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: Vec<String> = values
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect();

        if classes.is_empty() {
            return Err(DetoxError::Training(format!(
                "Cannot fit {} encoder on an empty column",
                field.as_str()
            )));
        }

        Ok(Self { field, classes })
    }

    pub fn field(&self) -> CategoricalField {
        self.field
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Encode a value; values outside the fitted vocabulary are rejected
    pub fn encode(&self, value: &str) -> Result<usize, DetoxError> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value))
            .map_err(|_| DetoxError::UnseenCategory {
                field: self.field.as_str().to_string(),
                value: value.to_string(),
            })
    }

    /// Decode a code back into its category
    pub fn decode(&self, code: usize) -> Option<&str> {
        self.classes.get(code).map(String::as_str)
    }

    /// Structural check used when loading persisted encoders
    pub fn validate(&self) -> Result<(), String> {
        if self.classes.is_empty() {
            return Err(format!("{} encoder has no classes", self.field.as_str()));
        }
        if self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(format!(
                "{} encoder classes are not sorted and unique",
                self.field.as_str()
            ));
        }
        Ok(())
    }
}

/// The three fitted categorical encoders, always used together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalEncoders {
    pub gender: LabelEncoder,
    pub purpose: LabelEncoder,
    pub grade: LabelEncoder,
}

impl CategoricalEncoders {
    /// Fit all three encoders over a training corpus
    pub fn fit(records: &[SubjectRecord]) -> Result<Self, DetoxError> {
        let fit_field = |field: CategoricalField| {
            LabelEncoder::fit(field, records.iter().map(|r| field.value_of(&r.profile)))
        };

        Ok(Self {
            gender: fit_field(CategoricalField::Gender)?,
            purpose: fit_field(CategoricalField::PhoneUsagePurpose)?,
            grade: fit_field(CategoricalField::SchoolGrade)?,
        })
    }
}
