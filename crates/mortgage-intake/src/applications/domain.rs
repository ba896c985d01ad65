use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::{self, field, ValidationError};

/// Natural key for an application: the applicant's username, stored as the document `_id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub String);

impl ApplicationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ApplicationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Kind of property the applicant intends to finance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    SingleFamily,
    Condo,
    Townhouse,
    MultiFamily,
    Manufactured,
}

impl PropertyType {
    pub const ALL: [PropertyType; 5] = [
        PropertyType::SingleFamily,
        PropertyType::Condo,
        PropertyType::Townhouse,
        PropertyType::MultiFamily,
        PropertyType::Manufactured,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            PropertyType::SingleFamily => "single_family",
            PropertyType::Condo => "condo",
            PropertyType::Townhouse => "townhouse",
            PropertyType::MultiFamily => "multi_family",
            PropertyType::Manufactured => "manufactured",
        }
    }

    /// Accepts `single_family`, `single-family` and `Single Family` alike.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|ch| match ch {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        Self::ALL
            .into_iter()
            .find(|candidate| candidate.label() == normalized)
    }
}

/// A stored mortgage application.
///
/// Keys written through partial updates that are not part of the canonical schema are kept
/// in `extra` so a read returns the document exactly as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    #[serde(rename = "_id")]
    pub identifier: ApplicationId,
    pub credit_score: Option<u16>,
    #[serde(default)]
    pub had_bankruptcies: bool,
    #[serde(default)]
    pub is_employed: bool,
    pub annual_income: Option<f64>,
    #[serde(default)]
    pub is_veteran: bool,
    #[serde(default)]
    pub is_first_time_buyer: bool,
    pub property_type: Option<PropertyType>,
    pub budget: Option<f64>,
    #[serde(default)]
    pub had_prior_loans: bool,
    pub home_value: Option<f64>,
    #[serde(with = "timestamp")]
    pub submitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Typed view of an intake payload after field-name normalization, before the
/// required-field check. Optional attributes stay `None` until validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationIntake {
    pub username: Option<String>,
    pub credit_score: Option<u16>,
    #[serde(default)]
    pub had_bankruptcies: bool,
    #[serde(default)]
    pub is_employed: bool,
    pub annual_income: Option<f64>,
    #[serde(default)]
    pub is_veteran: bool,
    #[serde(default)]
    pub is_first_time_buyer: bool,
    pub property_type: Option<PropertyType>,
    pub budget: Option<f64>,
    #[serde(default)]
    pub had_prior_loans: bool,
    pub home_value: Option<f64>,
}

impl ApplicationIntake {
    /// Extract the known fields from an untyped payload. Unknown keys are dropped.
    pub fn from_payload(payload: &Value) -> Result<Self, ValidationError> {
        let object = payload.as_object().ok_or(ValidationError::NotAnObject)?;
        let canonical = schema::normalize_intake(object)?;
        Self::from_canonical(canonical)
    }

    fn from_canonical(canonical: Map<String, Value>) -> Result<Self, ValidationError> {
        serde_json::from_value(Value::Object(canonical)).map_err(|err| {
            ValidationError::InvalidField {
                field: "payload".to_string(),
                reason: err.to_string(),
            }
        })
    }

    /// Enforce the required-field set and the per-field rules, and produce the record to
    /// persist. Intakes built in code get the same checks as normalized payloads.
    pub fn into_application(
        self,
        submitted_at: DateTime<Utc>,
    ) -> Result<Application, ValidationError> {
        let identifier = schema::check_username(&require(self.username, field::USERNAME)?)?;
        let credit_score =
            schema::check_credit_score(require(self.credit_score, field::CREDIT_SCORE)?)?;
        let annual_income = amount(self.annual_income, field::ANNUAL_INCOME)?;
        let property_type = require(self.property_type, field::PROPERTY_TYPE)?;
        let budget = amount(self.budget, field::BUDGET)?;
        let home_value = amount(self.home_value, field::HOME_VALUE)?;

        Ok(Application {
            identifier: ApplicationId(identifier),
            credit_score: Some(credit_score),
            had_bankruptcies: self.had_bankruptcies,
            is_employed: self.is_employed,
            annual_income: Some(annual_income),
            is_veteran: self.is_veteran,
            is_first_time_buyer: self.is_first_time_buyer,
            property_type: Some(property_type),
            budget: Some(budget),
            had_prior_loans: self.had_prior_loans,
            home_value: Some(home_value),
            submitted_at: submitted_at.trunc_subsecs(3),
            extra: BTreeMap::new(),
        })
    }
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ValidationError> {
    value.ok_or(ValidationError::MissingField { field })
}

fn amount(value: Option<f64>, field: &'static str) -> Result<f64, ValidationError> {
    schema::check_amount(field, require(value, field)?)
}

/// `submitted_at` is stored as a fixed-width RFC 3339 string with millisecond precision so
/// that string order on the collection index matches time order.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|value| value.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
