//! Error types for fringe analysis operations
//!
//! Validation failures (shape mismatches, empty inputs, out-of-range numeric
//! parameters) and unsupported option names are reported through
//! [`FringeError`]. Numerically degenerate inputs are not errors: they
//! produce finite, low-quality output instead.

use std::fmt;

/// Result type alias for fringe analysis operations
pub type FringeResult<T> = Result<T, FringeError>;

/// Error type for fringe analysis operations
#[derive(Debug, Clone, PartialEq)]
pub enum FringeError {
    /// Two arrays that must share a shape do not
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
        context: String,
    },

    /// Empty image, image sequence or other required collection
    EmptyInput { collection: String },

    /// Invalid numeric parameter value
    InvalidParameter {
        parameter: String,
        value: String,
        constraint: String,
    },

    /// Unrecognised method or window function identifier
    UnsupportedOption { option: String, value: String },

    /// Persisting or loading an intermediate product failed
    Persistence { path: String, details: String },
}

impl fmt::Display for FringeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FringeError::ShapeMismatch {
                expected,
                got,
                context,
            } => {
                write!(
                    f,
                    "Shape mismatch in {}: expected {}x{}, got {}x{}",
                    context, expected.0, expected.1, got.0, got.1
                )
            }
            FringeError::EmptyInput { collection } => {
                write!(f, "Empty input: {}", collection)
            }
            FringeError::InvalidParameter {
                parameter,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}' = '{}': must satisfy {}",
                    parameter, value, constraint
                )
            }
            FringeError::UnsupportedOption { option, value } => {
                write!(f, "Unsupported {} '{}'", option, value)
            }
            FringeError::Persistence { path, details } => {
                write!(f, "Failed to persist '{}': {}", path, details)
            }
        }
    }
}

impl std::error::Error for FringeError {}

// Convenience constructors for common error patterns
impl FringeError {
    /// Create a shape mismatch error
    pub fn shape_mismatch(
        expected: (usize, usize),
        got: (usize, usize),
        context: impl Into<String>,
    ) -> Self {
        FringeError::ShapeMismatch {
            expected,
            got,
            context: context.into(),
        }
    }

    /// Create an empty input error
    pub fn empty_input(collection: impl Into<String>) -> Self {
        FringeError::EmptyInput {
            collection: collection.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(
        parameter: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        FringeError::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }

    /// Create an unsupported option error
    pub fn unsupported_option(option: impl Into<String>, value: impl Into<String>) -> Self {
        FringeError::UnsupportedOption {
            option: option.into(),
            value: value.into(),
        }
    }

    /// Create a persistence error
    pub fn persistence(path: impl Into<String>, details: impl ToString) -> Self {
        FringeError::Persistence {
            path: path.into(),
            details: details.to_string(),
        }
    }

    /// True for errors raised by input validation, before any computation.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FringeError::ShapeMismatch { .. }
                | FringeError::EmptyInput { .. }
                | FringeError::InvalidParameter { .. }
        )
    }
}

impl From<ndarray::ShapeError> for FringeError {
    fn from(err: ndarray::ShapeError) -> Self {
        FringeError::invalid_parameter("array layout", err, "a standard contiguous layout")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch_display() {
        let err = FringeError::shape_mismatch((640, 480), (480, 640), "aperture mask");
        let msg = err.to_string();
        assert!(msg.contains("640x480"));
        assert!(msg.contains("480x640"));
        assert!(msg.contains("aperture mask"));
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = FringeError::invalid_parameter("sbsize", -0.5, "sbsize > 0");
        let msg = err.to_string();
        assert!(msg.contains("sbsize"));
        assert!(msg.contains("-0.5"));
        assert!(msg.contains("sbsize > 0"));
    }

    #[test]
    fn test_unsupported_option_display() {
        let err = FringeError::unsupported_option("sideband method", "wavelet");
        assert_eq!(err.to_string(), "Unsupported sideband method 'wavelet'");
    }

    #[test]
    fn test_validation_classification() {
        assert!(FringeError::empty_input("images").is_validation());
        assert!(!FringeError::unsupported_option("window", "kaiser").is_validation());
        assert!(!FringeError::persistence("out/pow.bin", "disk full").is_validation());
    }

    #[test]
    fn test_error_equality() {
        let err1 = FringeError::shape_mismatch((4, 4), (4, 5), "test");
        let err2 = FringeError::shape_mismatch((4, 4), (4, 5), "test");
        let err3 = FringeError::shape_mismatch((4, 4), (5, 5), "test");

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FringeError>();
    }
}
