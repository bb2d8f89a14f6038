//! Typed, range-constrained operation parameters

use mediakit_core::{OperationName, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A raw parameter value as supplied by a UI or CLI collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Parse a command-line style value: integer, then float, then text
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if let Ok(v) = trimmed.parse::<i64>() {
            ParamValue::Int(v)
        } else if let Ok(v) = trimmed.parse::<f64>() {
            ParamValue::Float(v)
        } else {
            ParamValue::Text(trimmed.to_string())
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<u32> for ParamValue {
    fn from(v: u32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Unvalidated parameter mapping
pub type Parameters = BTreeMap<String, ParamValue>;

/// Build a `Parameters` map from `(name, value)` pairs
pub fn params<I, K, V>(pairs: I) -> Parameters
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<ParamValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Declared type and range of a parameter. Ranges are inclusive at both ends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Integer { min: i64, max: i64, odd_only: bool },
    Float { min: f64, max: f64 },
    Choice { options: Vec<&'static str> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(flatten)]
    pub kind: ParamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    pub description: &'static str,
}

impl ParamSpec {
    pub fn integer(name: &'static str, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Integer {
                min,
                max,
                odd_only: false,
            },
            default: None,
            description: "",
        }
    }

    pub fn float(name: &'static str, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float { min, max },
            default: None,
            description: "",
        }
    }

    pub fn choice(name: &'static str, options: &[&'static str]) -> Self {
        Self {
            name,
            kind: ParamKind::Choice {
                options: options.to_vec(),
            },
            default: None,
            description: "",
        }
    }

    /// Only odd integers are accepted
    pub fn odd_only(mut self) -> Self {
        if let ParamKind::Integer { odd_only, .. } = &mut self.kind {
            *odd_only = true;
        }
        self
    }

    pub fn with_default(mut self, value: impl Into<ParamValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Check a supplied value against this spec and return its normalized form
    pub fn check(
        &self,
        operation: OperationName,
        value: &ParamValue,
    ) -> Result<ParamValue, ValidationError> {
        match (&self.kind, value) {
            (ParamKind::Integer { min, max, odd_only }, ParamValue::Int(v)) => {
                if v < min || v > max {
                    return Err(self.out_of_range(operation, v, min, max));
                }
                if *odd_only && v % 2 == 0 {
                    return Err(ValidationError::NotOdd {
                        operation,
                        parameter: self.name.to_string(),
                        value: *v,
                    });
                }
                Ok(ParamValue::Int(*v))
            }
            (ParamKind::Integer { .. }, _) => Err(self.type_mismatch(operation, "an integer")),
            (ParamKind::Float { min, max }, ParamValue::Int(v)) => {
                self.check_float(operation, *v as f64, *min, *max)
            }
            (ParamKind::Float { min, max }, ParamValue::Float(v)) => {
                self.check_float(operation, *v, *min, *max)
            }
            (ParamKind::Float { .. }, ParamValue::Text(_)) => {
                Err(self.type_mismatch(operation, "a number"))
            }
            (ParamKind::Choice { options }, ParamValue::Text(v)) => {
                let normalized = v.trim().to_lowercase();
                if options.iter().any(|o| *o == normalized) {
                    Ok(ParamValue::Text(normalized))
                } else {
                    Err(ValidationError::InvalidChoice {
                        operation,
                        parameter: self.name.to_string(),
                        value: v.clone(),
                        allowed: options.iter().map(|o| o.to_string()).collect(),
                    })
                }
            }
            (ParamKind::Choice { .. }, _) => Err(self.type_mismatch(operation, "text")),
        }
    }

    fn check_float(
        &self,
        operation: OperationName,
        v: f64,
        min: f64,
        max: f64,
    ) -> Result<ParamValue, ValidationError> {
        // NaN fails both comparisons and is rejected here
        if !(min <= v && v <= max) {
            return Err(self.out_of_range(operation, &v, &min, &max));
        }
        Ok(ParamValue::Float(v))
    }

    fn out_of_range<T: fmt::Display>(
        &self,
        operation: OperationName,
        value: &T,
        min: &T,
        max: &T,
    ) -> ValidationError {
        ValidationError::OutOfRange {
            operation,
            parameter: self.name.to_string(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    fn type_mismatch(&self, operation: OperationName, expected: &'static str) -> ValidationError {
        ValidationError::TypeMismatch {
            operation,
            parameter: self.name.to_string(),
            expected,
        }
    }
}

/// A parameter mapping that has passed an operation's checks.
///
/// Only `Operation::validate` constructs it, so every declared parameter is
/// present and within range.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ValidatedParameters {
    values: BTreeMap<String, ParamValue>,
}

impl ValidatedParameters {
    pub(crate) fn new(values: BTreeMap<String, ParamValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn int(&self, name: &str) -> anyhow::Result<i64> {
        match self.values.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            Some(other) => Err(anyhow::anyhow!(
                "Parameter '{}' is not an integer: {}",
                name,
                other
            )),
            None => Err(anyhow::anyhow!("Parameter '{}' is not set", name)),
        }
    }

    /// Integer parameter as `u32`, for pixel sizes and coordinates
    pub fn uint(&self, name: &str) -> anyhow::Result<u32> {
        let v = self.int(name)?;
        u32::try_from(v).map_err(|_| anyhow::anyhow!("Parameter '{}' = {} is negative", name, v))
    }

    pub fn float(&self, name: &str) -> anyhow::Result<f64> {
        match self.values.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            Some(other) => Err(anyhow::anyhow!(
                "Parameter '{}' is not a number: {}",
                name,
                other
            )),
            None => Err(anyhow::anyhow!("Parameter '{}' is not set", name)),
        }
    }

    pub fn text(&self, name: &str) -> anyhow::Result<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(v)) => Ok(v),
            Some(other) => Err(anyhow::anyhow!("Parameter '{}' is not text: {}", name, other)),
            None => Err(anyhow::anyhow!("Parameter '{}' is not set", name)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
