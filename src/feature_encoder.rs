//! Input encoder: InputRecord -> FeatureVector.
//!
//! The category codes below are the ones the reference classifier was trained
//! with. They live in exactly one place; the model adapter compares an
//! artifact's declared encoding against `ENCODING_TABLE` at load time.

use crate::errors::RiskResult;
use crate::input_record::{InputRecord, Sex, SmokingStatus, WorkType};
use serde::Serialize;
use std::collections::BTreeMap;

pub const ENCODING_VERSION: &str = "label-v1";

/// Eight questionnaire attributes.
pub const BASE_FEATURE_COUNT: usize = 8;
/// Base attributes followed by the three polynomial terms.
pub const FEATURE_COUNT: usize = 11;

/// Model input columns, in training order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "heart_disease",
    "hypertension",
    "ever_married",
    "smoking_status",
    "work_type",
    "gender",
    "age",
    "avg_glucose_level",
    "age_squared",
    "age_times_glucose",
    "glucose_squared",
];

/// Display labels for the base attributes, same order as `FEATURE_NAMES`.
pub const BASE_LABELS: [&str; BASE_FEATURE_COUNT] = [
    "Heart Disease",
    "Hypertension",
    "Ever Married",
    "Smoking Status",
    "Work Type",
    "Gender",
    "Age",
    "Avg Glucose",
];

/// One categorical attribute and its label -> code mapping.
#[derive(Debug, Clone, Copy)]
pub struct CategoryCodes {
    pub attribute: &'static str,
    pub codes: &'static [(&'static str, u8)],
}

pub const fn sex_code(sex: Sex) -> u8 {
    match sex {
        Sex::Female => 0,
        Sex::Male => 1,
    }
}

pub const fn work_type_code(work: WorkType) -> u8 {
    match work {
        WorkType::GovtJob => 0,
        WorkType::NeverWorked => 1,
        WorkType::Private => 2,
        WorkType::SelfEmployed => 3,
    }
}

pub const fn smoking_status_code(smoking: SmokingStatus) -> u8 {
    match smoking {
        SmokingStatus::FormerlySmoked => 0,
        SmokingStatus::NeverSmoked => 1,
        SmokingStatus::Smokes => 2,
    }
}

/// Yes/No answers: No = 0, Yes = 1.
pub const fn flag_code(flag: bool) -> u8 {
    if flag {
        1
    } else {
        0
    }
}

const NO_YES: &[(&str, u8)] = &[("No", flag_code(false)), ("Yes", flag_code(true))];

pub const GENDER_CODES: CategoryCodes = CategoryCodes {
    attribute: "gender",
    codes: &[
        (Sex::Female.label(), sex_code(Sex::Female)),
        (Sex::Male.label(), sex_code(Sex::Male)),
    ],
};

pub const EVER_MARRIED_CODES: CategoryCodes = CategoryCodes {
    attribute: "ever_married",
    codes: NO_YES,
};

pub const WORK_TYPE_CODES: CategoryCodes = CategoryCodes {
    attribute: "work_type",
    codes: &[
        (WorkType::GovtJob.label(), work_type_code(WorkType::GovtJob)),
        (WorkType::NeverWorked.label(), work_type_code(WorkType::NeverWorked)),
        (WorkType::Private.label(), work_type_code(WorkType::Private)),
        (WorkType::SelfEmployed.label(), work_type_code(WorkType::SelfEmployed)),
    ],
};

pub const HYPERTENSION_CODES: CategoryCodes = CategoryCodes {
    attribute: "hypertension",
    codes: NO_YES,
};

pub const HEART_DISEASE_CODES: CategoryCodes = CategoryCodes {
    attribute: "heart_disease",
    codes: NO_YES,
};

pub const SMOKING_STATUS_CODES: CategoryCodes = CategoryCodes {
    attribute: "smoking_status",
    codes: &[
        (SmokingStatus::FormerlySmoked.label(), smoking_status_code(SmokingStatus::FormerlySmoked)),
        (SmokingStatus::NeverSmoked.label(), smoking_status_code(SmokingStatus::NeverSmoked)),
        (SmokingStatus::Smokes.label(), smoking_status_code(SmokingStatus::Smokes)),
    ],
};

/// The complete versioned encoding, built from the code functions above.
pub const ENCODING_TABLE: [CategoryCodes; 6] = [
    GENDER_CODES,
    EVER_MARRIED_CODES,
    WORK_TYPE_CODES,
    HYPERTENSION_CODES,
    HEART_DISEASE_CODES,
    SMOKING_STATUS_CODES,
];

/// `ENCODING_TABLE` as nested maps, the shape artifacts declare it in.
pub fn encoding_table_map() -> BTreeMap<String, BTreeMap<String, u8>> {
    ENCODING_TABLE
        .iter()
        .map(|category| {
            let codes = category
                .codes
                .iter()
                .map(|(label, code)| (label.to_string(), *code))
                .collect();
            (category.attribute.to_string(), codes)
        })
        .collect()
}

pub fn encode_sex(sex: Sex) -> f64 {
    f64::from(sex_code(sex))
}

pub fn encode_work_type(work: WorkType) -> f64 {
    f64::from(work_type_code(work))
}

pub fn encode_smoking_status(smoking: SmokingStatus) -> f64 {
    f64::from(smoking_status_code(smoking))
}

/// Fixed-length numeric model input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Just the eight questionnaire-derived columns.
    pub fn base(&self) -> &[f64] {
        &self.values[..BASE_FEATURE_COUNT]
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied()
    }

    /// Named view, for logging and the CLI.
    pub fn named(&self) -> Vec<(&'static str, f64)> {
        FEATURE_NAMES.iter().copied().zip(self.values).collect()
    }
}

/// Encode a record into the classifier's feature layout.
///
/// Re-validates the record; a failing record never reaches the model.
pub fn encode(input: &InputRecord) -> RiskResult<FeatureVector> {
    input.validate()?;

    let age = input.age;
    let glucose = input.avg_glucose_level;

    Ok(FeatureVector::from_values([
        f64::from(flag_code(input.heart_disease)),
        f64::from(flag_code(input.hypertension)),
        f64::from(flag_code(input.ever_married)),
        encode_smoking_status(input.smoking_status),
        encode_work_type(input.work_type),
        encode_sex(input.gender),
        age,
        glucose,
        age * age,
        age * glucose,
        glucose * glucose,
    ]))
}
