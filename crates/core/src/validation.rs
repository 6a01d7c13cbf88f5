//! Field-level validation for inbound candidates.

use std::collections::BTreeMap;

use serde::Serialize;

/// Per-field validation failures, keyed by the wire name of the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for `field` unless `value` is present and non-blank.
    pub fn require(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) if !v.trim().is_empty() => {}
            Some(_) => self.add(field, "must not be blank"),
            None => self.add(field, "is required"),
        }
        self
    }

    /// Record an error for `field` if it was supplied but blank.
    ///
    /// Absent fields are fine (partial updates).
    pub fn non_blank(&mut self, field: &str, value: Option<&str>) -> &mut Self {
        if let Some(v) = value {
            if v.trim().is_empty() {
                self.add(field, "must not be blank");
            }
        }
        self
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.insert(field.to_string(), message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl core::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for (field, msg) in &self.0 {
            if !first {
                f.write_str(", ")?;
            }
            write!(f, "{field} {msg}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_distinguishes_missing_from_blank() {
        let mut errors = FieldErrors::new();
        errors.require("username", None).require("email", Some("  "));

        assert_eq!(errors.get("username"), Some("is required"));
        assert_eq!(errors.get("email"), Some("must not be blank"));
    }

    #[test]
    fn non_blank_ignores_absent_fields() {
        let mut errors = FieldErrors::new();
        errors.non_blank("full_name", None).non_blank("email", Some("a@x.com"));
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn display_lists_fields_in_order() {
        let mut errors = FieldErrors::new();
        errors.require("password", None).require("email", None);
        assert_eq!(errors.to_string(), "email is required, password is required");
    }
}
