//! Naming grammar for experiments and alternatives.
use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

const NAME_PATTERN: &str = r"^[a-z0-9][a-z0-9\-_ ]*$";

fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAME_PATTERN).expect("name pattern is a valid regex"))
}

/// Returns `true` if `name` is a valid experiment or alternative name.
///
/// A valid name starts with a lowercase letter or a digit, followed by any number of lowercase
/// letters, digits, hyphens, underscores or spaces.
///
/// ```
/// assert!(sixpack::is_valid_name("button-color"));
/// assert!(!sixpack::is_valid_name("Button"));
/// ```
pub fn is_valid_name(name: &str) -> bool {
    name_regex().is_match(name)
}

pub(crate) fn validate_experiment_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidExperimentName(name.to_owned()))
    }
}

pub(crate) fn validate_alternative_name(name: &str) -> Result<()> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(Error::InvalidAlternativeName(name.to_owned()))
    }
}

pub(crate) fn validate_force(force: &str) -> Result<()> {
    if is_valid_name(force) {
        Ok(())
    } else {
        Err(Error::InvalidForce(force.to_owned()))
    }
}

/// Validate a full alternative list: at least two entries, all distinct, all valid names.
pub(crate) fn validate_alternatives<S: AsRef<str>>(alternatives: &[S]) -> Result<()> {
    if alternatives.len() < 2 {
        return Err(Error::NotEnoughAlternatives);
    }
    for (i, alternative) in alternatives.iter().enumerate() {
        let alternative = alternative.as_ref();
        validate_alternative_name(alternative)?;
        if alternatives[..i].iter().any(|a| a.as_ref() == alternative) {
            return Err(Error::DuplicateAlternative(alternative.to_owned()));
        }
    }
    Ok(())
}
