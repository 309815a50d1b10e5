use std::fmt;

use serde::Serialize;

/// A single violated field constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every constraint violation found in one request.
///
/// Checks push into the collection instead of returning early, so callers
/// see all required corrections at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a collection holding exactly one error.
    pub fn single(field: &'static str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    /// Returns true if at least one error was reported for `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// Check a trimmed string's length in characters.
    pub(crate) fn check_length(
        &mut self,
        field: &'static str,
        label: &str,
        value: &str,
        min: usize,
        max: usize,
    ) {
        let len = value.trim().chars().count();
        if min > 0 && len == 0 {
            self.add(field, format!("{} is required", label));
        } else if len < min || len > max {
            if min > 0 {
                self.add(
                    field,
                    format!("{} must be between {} and {} characters", label, min, max),
                );
            } else {
                self.add(field, format!("{} must not exceed {} characters", label, max));
            }
        }
    }

    pub(crate) fn check_non_negative(&mut self, field: &'static str, label: &str, value: i64) {
        if value < 0 {
            self.add(field, format!("{} must be a non-negative integer", label));
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}
