//! Validation trait definition

/// Validation trait for configuration sections
///
/// Errors name the offending field; [`crate::config::Config::validate`] adds
/// the section prefix.
pub trait Validate {
    fn validate(&self) -> Result<(), String>;
}
