//! Canonical field table for application documents.
//!
//! Intake and update both resolve incoming keys through [`lookup`], so the names checked by
//! validation are always the names written to the collection. Legacy spellings are accepted
//! as aliases and rewritten to the canonical key.

use std::ops::RangeInclusive;

use serde_json::{Map, Value};

use super::domain::PropertyType;

pub mod field {
    pub const USERNAME: &str = "username";
    pub const CREDIT_SCORE: &str = "credit_score";
    pub const HAD_BANKRUPTCIES: &str = "had_bankruptcies";
    pub const IS_EMPLOYED: &str = "is_employed";
    pub const ANNUAL_INCOME: &str = "annual_income";
    pub const IS_VETERAN: &str = "is_veteran";
    pub const IS_FIRST_TIME_BUYER: &str = "is_first_time_buyer";
    pub const PROPERTY_TYPE: &str = "property_type";
    pub const BUDGET: &str = "budget";
    pub const HAD_PRIOR_LOANS: &str = "had_prior_loans";
    pub const HOME_VALUE: &str = "home_value";

    /// Assigned by the store at intake; never accepted from callers.
    pub const SUBMITTED_AT: &str = "submitted_at";
}

pub const CREDIT_SCORE_RANGE: RangeInclusive<u16> = 300..=850;

/// Validation failures for intake payloads and partial updates.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("field {field} cannot be changed once an application is stored")]
    ImmutableField { field: String },
    #[error("application payload must be a JSON object")]
    NotAnObject,
}

impl ValidationError {
    /// Field the caller has to fix, if the failure concerns a single field.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::MissingField { field } => Some(*field),
            ValidationError::InvalidField { field, .. }
            | ValidationError::ImmutableField { field } => Some(field.as_str()),
            ValidationError::NotAnObject => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Identifier,
    CreditScore,
    Amount,
    Flag,
    PropertyType,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: FieldKind,
    pub required: bool,
}

pub const FIELDS: [FieldSpec; 11] = [
    FieldSpec {
        name: field::USERNAME,
        aliases: &["identifier", "_id"],
        kind: FieldKind::Identifier,
        required: true,
    },
    FieldSpec {
        name: field::CREDIT_SCORE,
        aliases: &["credit"],
        kind: FieldKind::CreditScore,
        required: true,
    },
    FieldSpec {
        name: field::HAD_BANKRUPTCIES,
        aliases: &["had_bankrupcies", "bankruptcy_history"],
        kind: FieldKind::Flag,
        required: false,
    },
    FieldSpec {
        name: field::IS_EMPLOYED,
        aliases: &["is_working"],
        kind: FieldKind::Flag,
        required: false,
    },
    FieldSpec {
        name: field::ANNUAL_INCOME,
        aliases: &["income"],
        kind: FieldKind::Amount,
        required: true,
    },
    FieldSpec {
        name: field::IS_VETERAN,
        aliases: &[],
        kind: FieldKind::Flag,
        required: false,
    },
    FieldSpec {
        name: field::IS_FIRST_TIME_BUYER,
        aliases: &["first_time_home_buyer", "first_time_buyer"],
        kind: FieldKind::Flag,
        required: false,
    },
    FieldSpec {
        name: field::PROPERTY_TYPE,
        aliases: &[],
        kind: FieldKind::PropertyType,
        required: true,
    },
    FieldSpec {
        name: field::BUDGET,
        aliases: &["down_payment"],
        kind: FieldKind::Amount,
        required: true,
    },
    FieldSpec {
        name: field::HAD_PRIOR_LOANS,
        aliases: &["had_loans_before"],
        kind: FieldKind::Flag,
        required: false,
    },
    FieldSpec {
        name: field::HOME_VALUE,
        aliases: &[],
        kind: FieldKind::Amount,
        required: true,
    },
];

/// Resolve a canonical name or alias to its field definition.
pub fn lookup(key: &str) -> Option<&'static FieldSpec> {
    FIELDS
        .iter()
        .find(|spec| spec.name == key || spec.aliases.contains(&key))
}

/// Canonical names that must be present for an intake to be accepted, in check order.
pub fn required_fields() -> impl Iterator<Item = &'static str> {
    FIELDS
        .iter()
        .filter(|spec| spec.required)
        .map(|spec| spec.name)
}

impl FieldSpec {
    /// Type-check a single value. `Ok(None)` means the value counts as absent.
    pub fn coerce(&self, value: &Value) -> Result<Option<Value>, ValidationError> {
        if value.is_null() {
            return Ok(None);
        }

        match self.kind {
            FieldKind::Identifier => match value.as_str().map(str::trim) {
                Some("") => Ok(None),
                Some(text) => Ok(Some(Value::String(text.to_string()))),
                None => Err(self.invalid("expected a string")),
            },
            FieldKind::CreditScore => {
                let score = whole_number(value)
                    .and_then(|raw| u16::try_from(raw).ok())
                    .ok_or_else(|| self.invalid("expected a whole number"))?;
                check_credit_score(score).map(|score| Some(Value::from(score)))
            }
            FieldKind::Amount => {
                let amount = value
                    .as_f64()
                    .ok_or_else(|| self.invalid("expected a number"))?;
                check_amount(self.name, amount).map(|amount| Some(Value::from(amount)))
            }
            FieldKind::Flag => value
                .as_bool()
                .map(|flag| Some(Value::Bool(flag)))
                .ok_or_else(|| self.invalid("expected true or false")),
            FieldKind::PropertyType => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| self.invalid("expected a string"))?;
                if raw.trim().is_empty() {
                    return Ok(None);
                }
                PropertyType::parse(raw)
                    .map(|kind| Some(Value::String(kind.label().to_string())))
                    .ok_or_else(|| self.invalid(format!("unknown property type '{raw}'")))
            }
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> ValidationError {
        invalid(self.name, reason)
    }
}

fn invalid(name: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidField {
        field: name.to_string(),
        reason: reason.into(),
    }
}

/// Trimmed applicant username; blank counts as missing.
pub(crate) fn check_username(raw: &str) -> Result<String, ValidationError> {
    match raw.trim() {
        "" => Err(ValidationError::MissingField {
            field: field::USERNAME,
        }),
        text => Ok(text.to_string()),
    }
}

pub(crate) fn check_credit_score(score: u16) -> Result<u16, ValidationError> {
    if CREDIT_SCORE_RANGE.contains(&score) {
        Ok(score)
    } else {
        Err(invalid(
            field::CREDIT_SCORE,
            format!(
                "{score} is outside {}..={}",
                CREDIT_SCORE_RANGE.start(),
                CREDIT_SCORE_RANGE.end()
            ),
        ))
    }
}

/// Monetary amounts must be finite and non-negative.
pub(crate) fn check_amount(name: &str, amount: f64) -> Result<f64, ValidationError> {
    if !amount.is_finite() {
        return Err(invalid(name, "expected a finite number"));
    }
    if amount < 0.0 {
        return Err(invalid(name, "must not be negative"));
    }
    Ok(amount)
}

fn whole_number(value: &Value) -> Option<u64> {
    if let Some(raw) = value.as_u64() {
        return Some(raw);
    }
    let raw = value.as_f64()?;
    (raw >= 0.0 && raw.fract() == 0.0 && raw <= u64::MAX as f64).then_some(raw as u64)
}

/// Project an intake payload onto the canonical field names.
///
/// A canonical key wins over its aliases; aliases are tried in table order and a blank or null
/// candidate falls through to the next one. Keys outside the table are discarded.
pub(crate) fn normalize_intake(
    payload: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    let mut canonical = Map::new();

    for spec in &FIELDS {
        let candidates = std::iter::once(spec.name)
            .chain(spec.aliases.iter().copied())
            .filter_map(|key| payload.get(key));

        for value in candidates {
            if let Some(coerced) = spec.coerce(value)? {
                canonical.insert(spec.name.to_string(), coerced);
                break;
            }
        }
    }

    Ok(canonical)
}

/// Prepare a partial update for a `$set` merge.
///
/// Known keys are rewritten to canonical names and type-checked; unknown keys pass through
/// verbatim. Every table field is either required or a flag, so none of them can be cleared;
/// the identifier and intake timestamp are immutable.
pub(crate) fn normalize_update(
    fields: &Map<String, Value>,
) -> Result<Map<String, Value>, ValidationError> {
    let mut normalized = Map::new();

    for (key, value) in fields {
        if key.is_empty() || key.starts_with('$') || key.contains('.') {
            return Err(ValidationError::InvalidField {
                field: key.clone(),
                reason: "not a storable field name".to_string(),
            });
        }
        if key == field::SUBMITTED_AT {
            return Err(ValidationError::ImmutableField { field: key.clone() });
        }

        let Some(spec) = lookup(key) else {
            normalized.insert(key.clone(), value.clone());
            continue;
        };

        if spec.kind == FieldKind::Identifier {
            return Err(ValidationError::ImmutableField { field: key.clone() });
        }
        if key != spec.name && fields.contains_key(spec.name) {
            continue;
        }

        match spec.coerce(value)? {
            Some(coerced) => {
                normalized.insert(spec.name.to_string(), coerced);
            }
            None => return Err(spec.invalid("cannot be cleared")),
        }
    }

    Ok(normalized)
}
