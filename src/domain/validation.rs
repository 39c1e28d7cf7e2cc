//! Field validators.
//!
//! Each validator returns the message to attach to the field on failure.
//! [`FieldErrors`] collects messages per field so a request can report all
//! of its problems at once.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::OnceLock;

pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_FIRST_LAST_NAME_LENGTH: usize = 150;
pub const MAX_NAME_LENGTH: usize = 256;
pub const MAX_SLUG_LENGTH: usize = 50;
pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 10;

pub const REQUIRED: &str = "This field is required.";
pub const NON_FIELD: &str = "non_field_errors";

/// Field name → messages, serialized as `{"field": ["msg", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    /// Records the error of `result` under `field`, if any.
    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn get_regex(re: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    re.get_or_init(|| Regex::new(pattern).expect("Invalid regex pattern defined in code"))
}

fn is_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-')
}

pub fn validate_username(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(REQUIRED.to_string());
    }

    if value.chars().count() > MAX_USERNAME_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {MAX_USERNAME_LENGTH} characters."
        ));
    }

    let mut forbidden: Vec<char> = Vec::new();
    for c in value.chars().filter(|c| !is_username_char(*c)) {
        if !forbidden.contains(&c) {
            forbidden.push(c);
        }
    }
    if !forbidden.is_empty() {
        let listed: String = forbidden.into_iter().collect();
        return Err(format!("Username must not contain the characters: {listed}"));
    }

    if value.eq_ignore_ascii_case("me") {
        return Err("Using \"me\" as a username is not allowed.".to_string());
    }

    Ok(())
}

pub fn validate_email(value: &str) -> Result<(), String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[^@\s]+@[^@\s]+\.[^@\s.]+$");

    if value.is_empty() {
        return Err(REQUIRED.to_string());
    }

    if value.chars().count() > MAX_EMAIL_LENGTH {
        return Err(format!(
            "Ensure this field has no more than {MAX_EMAIL_LENGTH} characters."
        ));
    }

    if !re.is_match(value) {
        return Err("Enter a valid email address.".to_string());
    }

    Ok(())
}

pub fn validate_max_length(value: &str, max: usize) -> Result<(), String> {
    if value.chars().count() > max {
        return Err(format!(
            "Ensure this field has no more than {max} characters."
        ));
    }
    Ok(())
}

/// Catalog names must be present and at most [`MAX_NAME_LENGTH`] characters.
pub fn validate_name(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(REQUIRED.to_string());
    }
    validate_max_length(value, MAX_NAME_LENGTH)
}

pub fn validate_slug(value: &str) -> Result<(), String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = get_regex(&RE, r"^[-a-zA-Z0-9_]+$");

    if value.is_empty() {
        return Err(REQUIRED.to_string());
    }

    validate_max_length(value, MAX_SLUG_LENGTH)?;

    if !re.is_match(value) {
        return Err(
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens."
                .to_string(),
        );
    }

    Ok(())
}

pub fn validate_score(score: i32) -> Result<(), String> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(format!(
            "Score must be between {MIN_SCORE} and {MAX_SCORE}."
        ));
    }
    Ok(())
}

pub fn validate_year(year: i32, current_year: i32) -> Result<(), String> {
    if year > current_year {
        return Err(format!(
            "Year cannot be later than the current year ({current_year})."
        ));
    }
    Ok(())
}

pub fn validate_text(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(REQUIRED.to_string());
    }
    Ok(())
}
