//! Control value validation
//!
//! Every user-facing control (opacity sliders, blur radius, overlay scale and
//! rotation) passes through these checks before it reaches pixel code.

use crate::error::{MockupError, Result};

/// Validator for interactive control values
pub struct ControlValidator;

impl ControlValidator {
    /// Validate a value that must be finite
    ///
    /// # Errors
    /// - `value` is NaN or infinite
    pub fn validate_finite(value: f32, name: &str) -> Result<f32> {
        if !value.is_finite() {
            return Err(MockupError::invalid_config(format!(
                "{name} must be finite, got {value}"
            )));
        }
        Ok(value)
    }

    /// Validate an opacity-like value in `[0, 1]`
    ///
    /// # Errors
    /// - `value` is not finite or lies outside `[0, 1]`
    pub fn validate_unit_interval(value: f32, name: &str) -> Result<f32> {
        let value = Self::validate_finite(value, name)?;
        if !(0.0..=1.0).contains(&value) {
            return Err(MockupError::config_value_error(name, value, "0.0-1.0", None));
        }
        Ok(value)
    }

    /// Validate a strictly positive, finite value
    ///
    /// # Errors
    /// - `value` is not finite or not greater than zero
    pub fn validate_positive(value: f32, name: &str) -> Result<f32> {
        let value = Self::validate_finite(value, name)?;
        if value <= 0.0 {
            return Err(MockupError::invalid_config(format!(
                "{name} must be positive, got {value}"
            )));
        }
        Ok(value)
    }

    /// Validate a finite value that may be zero
    ///
    /// # Errors
    /// - `value` is not finite or negative
    pub fn validate_non_negative(value: f32, name: &str) -> Result<f32> {
        let value = Self::validate_finite(value, name)?;
        if value < 0.0 {
            return Err(MockupError::invalid_config(format!(
                "{name} must not be negative, got {value}"
            )));
        }
        Ok(value)
    }

    /// Normalize an angle in degrees into `[0, 360)`
    ///
    /// # Errors
    /// - `degrees` is not finite
    pub fn normalize_degrees(degrees: f32) -> Result<f32> {
        let degrees = Self::validate_finite(degrees, "Rotation")?;
        let normalized = degrees.rem_euclid(360.0);
        // rem_euclid can round up to exactly 360.0 for tiny negative inputs
        Ok(if normalized >= 360.0 { 0.0 } else { normalized })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_interval() {
        assert_eq!(ControlValidator::validate_unit_interval(0.0, "opacity").unwrap(), 0.0);
        assert_eq!(ControlValidator::validate_unit_interval(1.0, "opacity").unwrap(), 1.0);
        assert!(ControlValidator::validate_unit_interval(1.01, "opacity").is_err());
        assert!(ControlValidator::validate_unit_interval(-0.1, "opacity").is_err());
        assert!(ControlValidator::validate_unit_interval(f32::NAN, "opacity").is_err());
    }

    #[test]
    fn test_positive_and_non_negative() {
        assert!(ControlValidator::validate_positive(0.5, "scale").is_ok());
        assert!(ControlValidator::validate_positive(0.0, "scale").is_err());
        assert!(ControlValidator::validate_positive(f32::INFINITY, "scale").is_err());

        assert!(ControlValidator::validate_non_negative(0.0, "blur").is_ok());
        assert!(ControlValidator::validate_non_negative(-1.0, "blur").is_err());
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(ControlValidator::normalize_degrees(0.0).unwrap(), 0.0);
        assert_eq!(ControlValidator::normalize_degrees(360.0).unwrap(), 0.0);
        assert_eq!(ControlValidator::normalize_degrees(-90.0).unwrap(), 270.0);
        assert_eq!(ControlValidator::normalize_degrees(450.0).unwrap(), 90.0);
        assert!(ControlValidator::normalize_degrees(-1e-9).unwrap() < 360.0);
        assert!(ControlValidator::normalize_degrees(f32::NAN).is_err());
    }
}
