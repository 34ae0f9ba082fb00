//! Input validation run before any loop starts
//!
//! Statically typed parameters are checked by the constructors in
//! [`crate::config`]. Values that arrive untyped (JSON configuration,
//! environment variables) go through the `*_from_value` functions, which
//! reject booleans and non-integers posing as numbers.

use std::time::Duration;

use serde_json::Value;

use crate::error::ConfigurationError;

/// Longest accepted operation name, in characters
pub const MAX_OPERATION_NAME_CHARS: usize = 200;

/// A validated operation name, used only in diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationName(String);

impl OperationName {
    /// Validate and wrap an operation name
    pub fn parse(name: impl AsRef<str>) -> Result<Self, ConfigurationError> {
        let name = name.as_ref();
        validate_operation_name(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OperationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OperationName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check an operation name: non-empty, trimmed, bounded, printable
pub fn validate_operation_name(name: &str) -> Result<(), ConfigurationError> {
    if name.is_empty() {
        return Err(ConfigurationError::EmptyOperationName);
    }
    if name.trim() != name {
        return Err(ConfigurationError::UntrimmedOperationName);
    }

    let length = name.chars().count();
    if length > MAX_OPERATION_NAME_CHARS {
        return Err(ConfigurationError::OperationNameTooLong {
            length,
            max: MAX_OPERATION_NAME_CHARS,
        });
    }
    if name.chars().any(char::is_control) {
        return Err(ConfigurationError::ControlCharacterInOperationName);
    }

    Ok(())
}

/// Convert a seconds value into a duration
///
/// Rejects NaN, infinities, negatives, and values too large for
/// [`Duration`] (reported as non-finite).
pub fn validate_seconds(parameter: &str, seconds: f64) -> Result<Duration, ConfigurationError> {
    if !seconds.is_finite() {
        return Err(ConfigurationError::NonFinite {
            parameter: parameter.to_string(),
        });
    }
    if seconds < 0.0 {
        return Err(ConfigurationError::Negative {
            parameter: parameter.to_string(),
            value: seconds.to_string(),
        });
    }

    Duration::try_from_secs_f64(seconds).map_err(|_| ConfigurationError::NonFinite {
        parameter: parameter.to_string(),
    })
}

/// Check an attempt or failure budget (must be at least 1)
pub fn validate_count(parameter: &str, value: u32) -> Result<u32, ConfigurationError> {
    if value < 1 {
        return Err(ConfigurationError::BelowMinimum {
            parameter: parameter.to_string(),
            min: 1,
            value: u64::from(value),
        });
    }
    Ok(value)
}

/// Read a seconds parameter from an untyped JSON value
pub fn seconds_from_value(parameter: &str, value: &Value) -> Result<Duration, ConfigurationError> {
    match value {
        Value::Bool(_) => Err(ConfigurationError::BooleanNumber {
            parameter: parameter.to_string(),
        }),
        Value::Number(number) => {
            let seconds = number.as_f64().ok_or_else(|| ConfigurationError::NonFinite {
                parameter: parameter.to_string(),
            })?;
            validate_seconds(parameter, seconds)
        }
        other => Err(ConfigurationError::NotANumber {
            parameter: parameter.to_string(),
            found: describe_value(other).to_string(),
        }),
    }
}

/// Read a count parameter from an untyped JSON value
///
/// Floats are rejected even when integral (`3.0` is not a count).
pub fn count_from_value(parameter: &str, value: &Value) -> Result<u32, ConfigurationError> {
    let number = match value {
        Value::Bool(_) => {
            return Err(ConfigurationError::BooleanNumber {
                parameter: parameter.to_string(),
            })
        }
        Value::Number(number) => number,
        other => {
            return Err(ConfigurationError::NotANumber {
                parameter: parameter.to_string(),
                found: describe_value(other).to_string(),
            })
        }
    };

    if let Some(unsigned) = number.as_u64() {
        let count = u32::try_from(unsigned).map_err(|_| ConfigurationError::OutOfRange {
            parameter: parameter.to_string(),
            value: unsigned.to_string(),
        })?;
        return validate_count(parameter, count);
    }
    if let Some(signed) = number.as_i64() {
        return Err(ConfigurationError::Negative {
            parameter: parameter.to_string(),
            value: signed.to_string(),
        });
    }

    Err(ConfigurationError::NotAnInteger {
        parameter: parameter.to_string(),
        found: number.to_string(),
    })
}

/// Short name of a JSON value's type, for error messages
pub fn describe_value(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_name_accepts_plain_names() {
        let name = OperationName::parse("crawl job 42").unwrap();
        assert_eq!(name.as_str(), "crawl job 42");
        assert!(OperationName::parse("x".repeat(200)).is_ok());
    }

    #[test]
    fn test_operation_name_rejections() {
        assert_eq!(
            validate_operation_name(""),
            Err(ConfigurationError::EmptyOperationName)
        );
        assert_eq!(
            validate_operation_name(" crawl"),
            Err(ConfigurationError::UntrimmedOperationName)
        );
        assert_eq!(
            validate_operation_name("crawl\n"),
            Err(ConfigurationError::UntrimmedOperationName)
        );
        assert_eq!(
            validate_operation_name("crawl\u{7}job"),
            Err(ConfigurationError::ControlCharacterInOperationName)
        );
    }

    #[test]
    fn test_operation_name_length_limit() {
        let err = validate_operation_name(&"x".repeat(201)).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::OperationNameTooLong {
                length: 201,
                max: 200
            }
        );
        assert!(err.to_string().contains("200 characters"));
    }

    #[test]
    fn test_operation_name_counts_characters_not_bytes() {
        // 200 two-byte characters is still within the limit
        assert!(validate_operation_name(&"é".repeat(200)).is_ok());
    }

    #[test]
    fn test_validate_seconds() {
        assert_eq!(
            validate_seconds("poll_interval_seconds", 2.5),
            Ok(Duration::from_millis(2500))
        );
        assert_eq!(validate_seconds("poll_interval_seconds", 0.0), Ok(Duration::ZERO));
        assert!(matches!(
            validate_seconds("poll_interval_seconds", f64::NAN),
            Err(ConfigurationError::NonFinite { .. })
        ));
        assert!(matches!(
            validate_seconds("poll_interval_seconds", f64::INFINITY),
            Err(ConfigurationError::NonFinite { .. })
        ));
        assert!(matches!(
            validate_seconds("poll_interval_seconds", -1.0),
            Err(ConfigurationError::Negative { .. })
        ));
        // Finite but beyond what a Duration can hold
        assert!(matches!(
            validate_seconds("max_wait_seconds", 1e300),
            Err(ConfigurationError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_validate_count() {
        assert_eq!(validate_count("max_attempts", 1), Ok(1));
        assert!(matches!(
            validate_count("max_attempts", 0),
            Err(ConfigurationError::BelowMinimum { min: 1, .. })
        ));
    }

    #[test]
    fn test_seconds_from_value_rejects_booleans_and_strings() {
        assert!(matches!(
            seconds_from_value("retry_delay_seconds", &json!(true)),
            Err(ConfigurationError::BooleanNumber { .. })
        ));
        assert!(matches!(
            seconds_from_value("retry_delay_seconds", &json!("1.5")),
            Err(ConfigurationError::NotANumber { .. })
        ));
        assert_eq!(
            seconds_from_value("retry_delay_seconds", &json!(3)),
            Ok(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_count_from_value() {
        assert_eq!(count_from_value("max_attempts", &json!(4)), Ok(4));
        assert!(matches!(
            count_from_value("max_attempts", &json!(false)),
            Err(ConfigurationError::BooleanNumber { .. })
        ));
        assert!(matches!(
            count_from_value("max_attempts", &json!(2.5)),
            Err(ConfigurationError::NotAnInteger { .. })
        ));
        assert!(matches!(
            count_from_value("max_attempts", &json!(3.0)),
            Err(ConfigurationError::NotAnInteger { .. })
        ));
        assert!(matches!(
            count_from_value("max_attempts", &json!(-2)),
            Err(ConfigurationError::Negative { .. })
        ));
        assert!(matches!(
            count_from_value("max_attempts", &json!(0)),
            Err(ConfigurationError::BelowMinimum { .. })
        ));
        assert!(matches!(
            count_from_value("max_attempts", &json!(u64::MAX)),
            Err(ConfigurationError::OutOfRange { .. })
        ));
    }
}
