use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{MiningError, MiningOutcome};

/// Tolerance applied before rounding a fractional threshold up, so products
/// like `0.3 * 10` land on 3 rather than 4.
const FRACTION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MinSupport {
    /// Absolute number of dataset graphs.
    Count(usize),
    /// Share of the dataset in `(0, 1]`.
    Fraction(f64),
}

impl MinSupport {
    pub fn validate(&self) -> MiningOutcome<()> {
        match *self {
            MinSupport::Count(0) => Err(MiningError::parameter("min_support count must be at least 1")),
            MinSupport::Count(_) => Ok(()),
            MinSupport::Fraction(f) if f.is_nan() || f <= 0.0 || f > 1.0 => Err(
                MiningError::parameter(format!("min_support fraction {f} is outside (0, 1]")),
            ),
            MinSupport::Fraction(_) => Ok(()),
        }
    }

    /// Absolute graph count for a dataset of `dataset_size` graphs. Fractions
    /// round up and never fall below one graph.
    pub fn to_count(&self, dataset_size: usize) -> usize {
        match *self {
            MinSupport::Count(count) => count,
            MinSupport::Fraction(fraction) => {
                let scaled = fraction * dataset_size as f64 - FRACTION_TOLERANCE;
                (scaled.ceil().max(1.0)) as usize
            }
        }
    }

    fn from_value(value: &Value) -> MiningOutcome<Self> {
        let Value::Number(number) = value else {
            return Err(MiningError::parameter(format!(
                "min_support must be a number, got {value}"
            )));
        };
        if let Some(count) = number.as_u64() {
            let support = MinSupport::Count(count as usize);
            support.validate()?;
            return Ok(support);
        }
        if number.as_i64().is_some() {
            return Err(MiningError::parameter(format!(
                "min_support must be positive, got {number}"
            )));
        }
        let fraction = number
            .as_f64()
            .ok_or_else(|| MiningError::parameter(format!("unreadable min_support {number}")))?;
        let support = MinSupport::Fraction(fraction);
        support.validate()?;
        Ok(support)
    }
}

impl fmt::Display for MinSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinSupport::Count(count) => write!(f, "{count} graph(s)"),
            MinSupport::Fraction(fraction) => write!(f, "{fraction} of the dataset"),
        }
    }
}

/// Validated options for one mining run.
#[derive(Debug, Clone, PartialEq)]
pub struct MiningParameters {
    pub min_support: MinSupport,
    /// Largest pattern size (edge count) to mine.
    pub max_pattern_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawParameters {
    #[serde(default, alias = "minSupport")]
    min_support: Option<Value>,
    #[serde(default, alias = "maxPatternSize")]
    max_pattern_size: Option<Value>,
}

impl MiningParameters {
    pub fn new(min_support: MinSupport) -> Self {
        Self {
            min_support,
            max_pattern_size: None,
        }
    }

    pub fn with_max_pattern_size(mut self, size: usize) -> Self {
        self.max_pattern_size = Some(size);
        self
    }

    pub fn validate(&self) -> MiningOutcome<()> {
        self.min_support.validate()?;
        if self.max_pattern_size == Some(0) {
            return Err(MiningError::parameter("max_pattern_size must be at least 1"));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> MiningOutcome<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| MiningError::parameter(format!("parameters are not valid JSON: {err}")))?;
        Self::from_json_value(&value)
    }

    pub fn from_json_value(value: &Value) -> MiningOutcome<Self> {
        let raw = RawParameters::deserialize(value)
            .map_err(|err| MiningError::parameter(format!("malformed parameters: {err}")))?;

        let min_support = match raw.min_support {
            None | Some(Value::Null) => {
                return Err(MiningError::parameter("min_support is required"));
            }
            Some(ref value) => MinSupport::from_value(value)?,
        };

        let max_pattern_size = match raw.max_pattern_size {
            None | Some(Value::Null) => None,
            Some(Value::Number(ref number)) => match number.as_u64() {
                Some(size) if size >= 1 => Some(size as usize),
                _ => {
                    return Err(MiningError::parameter(format!(
                        "max_pattern_size must be an integer >= 1, got {number}"
                    )))
                }
            },
            Some(other) => {
                return Err(MiningError::parameter(format!(
                    "max_pattern_size must be an integer >= 1, got {other}"
                )))
            }
        };

        let params = Self {
            min_support,
            max_pattern_size,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fraction_rounds_up_against_dataset_size() {
        assert_eq!(MinSupport::Fraction(0.5).to_count(1), 1);
        assert_eq!(MinSupport::Fraction(0.5).to_count(3), 2);
        assert_eq!(MinSupport::Fraction(0.3).to_count(10), 3);
        assert_eq!(MinSupport::Fraction(1.0).to_count(7), 7);
        assert_eq!(MinSupport::Fraction(0.01).to_count(5), 1);
        assert_eq!(MinSupport::Count(3).to_count(2), 3);
    }

    #[test]
    fn integer_and_fraction_modes_parse() {
        let count = MiningParameters::from_json_str(r#"{"min_support": 2}"#).expect("count");
        assert_eq!(count.min_support, MinSupport::Count(2));
        assert_eq!(count.max_pattern_size, None);

        let fraction =
            MiningParameters::from_json_str(r#"{"minSupport": 0.5, "maxPatternSize": 3}"#)
                .expect("fraction");
        assert_eq!(fraction.min_support, MinSupport::Fraction(0.5));
        assert_eq!(fraction.max_pattern_size, Some(3));
    }

    #[test]
    fn invalid_thresholds_are_rejected() {
        for json in [
            r#"{}"#,
            r#"{"min_support": null}"#,
            r#"{"min_support": 0}"#,
            r#"{"min_support": -2}"#,
            r#"{"min_support": 1.5}"#,
            r#"{"min_support": 0.0}"#,
            r#"{"min_support": "2"}"#,
            r#"{"min_support": 2, "max_pattern_size": 0}"#,
            r#"{"min_support": 2, "max_pattern_size": 2.5}"#,
            r#"not json"#,
        ] {
            let err = MiningParameters::from_json_str(json).expect_err(json);
            assert!(matches!(err, MiningError::Parameter(_)), "{json}: {err}");
        }
    }
}
