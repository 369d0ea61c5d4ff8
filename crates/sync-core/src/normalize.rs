//! Input validation for submitted messages.

use std::fmt;

use crate::message::{CanonicalMessage, RawMessage};

/// Maximum allowed length for an address.
pub const MAX_ADDRESS_LENGTH: usize = 255;

/// Maximum allowed length for a message body.
pub const MAX_BODY_LENGTH: usize = 64 * 1024;

/// Maximum allowed length for a contact name.
pub const MAX_CONTACT_NAME_LENGTH: usize = 255;

/// Largest accepted message type value (0 = unknown, 1 = inbound,
/// 2 = outbound).
pub const MAX_MESSAGE_TYPE: i64 = 2;

/// Validation error types, each naming the field that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required field absent from the submission.
    Missing(&'static str),
    /// Required field present but empty (after trimming).
    Empty(&'static str),
    /// Numeric field below zero.
    Negative { field: &'static str, value: i64 },
    /// Numeric field outside its enumerated range.
    OutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },
    /// Text field exceeds its length bound.
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

impl ValidationError {
    /// The field this error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing(field) | ValidationError::Empty(field) => field,
            ValidationError::Negative { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::TooLong { field, .. } => field,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::Missing(_) => "missing_field",
            ValidationError::Empty(_) => "empty_field",
            ValidationError::Negative { .. } => "negative_value",
            ValidationError::OutOfRange { .. } => "out_of_range",
            ValidationError::TooLong { .. } => "too_long",
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Missing(field) => write!(f, "{} is required", field),
            ValidationError::Empty(field) => write!(f, "{} cannot be empty", field),
            ValidationError::Negative { field, value } => {
                write!(f, "{} cannot be negative (got {})", field, value)
            }
            ValidationError::OutOfRange { field, value, max } => {
                write!(f, "{} must be between 0 and {} (got {})", field, max, value)
            }
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{} is too long ({} chars, max {})", field, actual, max)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a submitted record and coerce it to canonical shape.
///
/// Pure function; the first failing field check wins. Optional fields are
/// passed through with empty strings collapsed to `None`.
pub fn normalize(raw: &RawMessage) -> Result<CanonicalMessage, ValidationError> {
    let address = required_text("address", raw.address.as_deref(), MAX_ADDRESS_LENGTH)?;
    let body = required_text("body", raw.body.as_deref(), MAX_BODY_LENGTH)?;
    let timestamp = required_non_negative("timestamp", raw.timestamp)?;
    let message_type = required_non_negative("type", raw.message_type)?;
    if message_type > MAX_MESSAGE_TYPE {
        return Err(ValidationError::OutOfRange {
            field: "type",
            value: message_type,
            max: MAX_MESSAGE_TYPE,
        });
    }
    let contact_name = optional_text(
        "contact_name",
        raw.contact_name.as_deref(),
        MAX_CONTACT_NAME_LENGTH,
    )?;

    Ok(CanonicalMessage {
        address,
        body,
        timestamp,
        message_type,
        contact_name,
        external_id: non_empty(raw.external_id.as_deref()),
        date_formatted: non_empty(raw.date_formatted.as_deref()),
    })
}

fn required_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError::Missing(field))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if trimmed.len() > max {
        return Err(ValidationError::TooLong {
            field,
            max,
            actual: trimmed.len(),
        });
    }
    Ok(trimmed.to_string())
}

fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max: usize,
) -> Result<Option<String>, ValidationError> {
    match non_empty(value) {
        Some(text) if text.len() > max => Err(ValidationError::TooLong {
            field,
            max,
            actual: text.len(),
        }),
        other => Ok(other),
    }
}

fn required_non_negative(
    field: &'static str,
    value: Option<i64>,
) -> Result<i64, ValidationError> {
    let value = value.ok_or(ValidationError::Missing(field))?;
    if value < 0 {
        return Err(ValidationError::Negative { field, value });
    }
    Ok(value)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    let trimmed = value?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_raw() -> RawMessage {
        RawMessage {
            address: Some("+15550100".to_string()),
            body: Some("hello there".to_string()),
            timestamp: Some(1_700_000_000_000),
            message_type: Some(1),
            contact_name: None,
            external_id: None,
            date_formatted: None,
        }
    }

    #[test]
    fn accepts_valid_record() {
        let message = normalize(&valid_raw()).unwrap();
        assert_eq!(message.address, "+15550100");
        assert_eq!(message.body, "hello there");
        assert_eq!(message.timestamp, 1_700_000_000_000);
        assert_eq!(message.message_type, 1);
        assert_eq!(message.contact_name, None);
    }

    #[test]
    fn trims_and_defaults_optional_fields() {
        let raw = RawMessage {
            address: Some("  +15550100  ".to_string()),
            contact_name: Some("   ".to_string()),
            external_id: Some("".to_string()),
            ..valid_raw()
        };
        let message = normalize(&raw).unwrap();
        assert_eq!(message.address, "+15550100");
        assert_eq!(message.contact_name, None);
        assert_eq!(message.external_id, None);
    }

    #[test]
    fn rejects_missing_required_fields() {
        let err = normalize(&RawMessage {
            address: None,
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::Missing("address"));

        let err = normalize(&RawMessage {
            body: None,
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::Missing("body"));

        let err = normalize(&RawMessage {
            timestamp: None,
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::Missing("timestamp"));
    }

    #[test]
    fn rejects_empty_address_and_body() {
        let err = normalize(&RawMessage {
            address: Some("  ".to_string()),
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::Empty("address"));
        assert_eq!(err.code(), "empty_field");

        let err = normalize(&RawMessage {
            body: Some("".to_string()),
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(err, ValidationError::Empty("body"));
    }

    #[test]
    fn rejects_negative_timestamp() {
        let err = normalize(&RawMessage {
            timestamp: Some(-5),
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::Negative {
                field: "timestamp",
                value: -5
            }
        );
        assert_eq!(err.field(), "timestamp");
    }

    #[test]
    fn rejects_type_outside_enumeration() {
        let err = normalize(&RawMessage {
            message_type: Some(7),
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                field: "type",
                value: 7,
                max: MAX_MESSAGE_TYPE
            }
        );

        let err = normalize(&RawMessage {
            message_type: Some(-1),
            ..valid_raw()
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::Negative { field: "type", .. }));
    }

    #[test]
    fn rejects_oversized_fields() {
        let err = normalize(&RawMessage {
            address: Some("a".repeat(MAX_ADDRESS_LENGTH + 1)),
            ..valid_raw()
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooLong {
                field: "address",
                ..
            }
        ));

        let err = normalize(&RawMessage {
            contact_name: Some("b".repeat(MAX_CONTACT_NAME_LENGTH + 1)),
            ..valid_raw()
        })
        .unwrap_err();
        assert_eq!(err.code(), "too_long");
    }

    #[test]
    fn error_display_names_field() {
        let err = ValidationError::Negative {
            field: "timestamp",
            value: -1,
        };
        assert_eq!(err.to_string(), "timestamp cannot be negative (got -1)");
    }
}
