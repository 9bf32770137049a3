//! Error types for the geoadjust library
//!
//! Every module owns a `thiserror` enum describing its own failures. This module
//! folds them into a single crate-level error whose variants follow the failure
//! classes callers act on: unimplemented sensors, bad construction arguments,
//! missing/unreadable/malformed resources and projection failures.

use crate::adjustment::AdjustmentError;
use crate::camera::CameraError;
use crate::control::ControlNetworkError;
use crate::residual::ResidualError;
use crate::session::SessionError;
use thiserror::Error;

/// Main result type used throughout the geoadjust library
pub type GeoAdjustResult<T> = Result<T, GeoAdjustError>;

/// Main error type for the geoadjust library
#[derive(Debug, Clone, Error)]
pub enum GeoAdjustError {
    /// A declared capability that is intentionally not implemented for a variant
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Invalid construction arguments
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A named resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A resource could not be read, created or overwritten
    #[error("IO error: {0}")]
    Io(String),

    /// Malformed resource content
    #[error("Parse error: {0}")]
    Parse(String),

    /// A geometric query failed for the requested point or pixel
    #[error("Projection error: {0}")]
    Projection(String),

    /// Invalid input parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for GeoAdjustError {
    fn from(err: std::io::Error) -> Self {
        GeoAdjustError::Io(err.to_string())
    }
}

impl From<CameraError> for GeoAdjustError {
    fn from(err: CameraError) -> Self {
        match err {
            CameraError::NotImplemented(msg) => GeoAdjustError::NotImplemented(msg),
            CameraError::Configuration(msg) => GeoAdjustError::Configuration(msg),
            other => GeoAdjustError::Projection(other.to_string()),
        }
    }
}

impl From<AdjustmentError> for GeoAdjustError {
    fn from(err: AdjustmentError) -> Self {
        match err {
            AdjustmentError::NotFound { .. } => GeoAdjustError::NotFound(err.to_string()),
            AdjustmentError::Io { .. } => GeoAdjustError::Io(err.to_string()),
            _ => GeoAdjustError::Parse(err.to_string()),
        }
    }
}

impl From<ControlNetworkError> for GeoAdjustError {
    fn from(err: ControlNetworkError) -> Self {
        match err {
            ControlNetworkError::Io(_) => GeoAdjustError::Io(err.to_string()),
            ControlNetworkError::Parse { .. }
            | ControlNetworkError::InvalidNumber { .. }
            | ControlNetworkError::MissingFields { .. }
            | ControlNetworkError::OrphanMeasurement { .. } => {
                GeoAdjustError::Parse(err.to_string())
            }
            _ => GeoAdjustError::InvalidInput(err.to_string()),
        }
    }
}

impl From<ResidualError> for GeoAdjustError {
    fn from(err: ResidualError) -> Self {
        match err {
            ResidualError::Network(inner) => inner.into(),
            other => GeoAdjustError::InvalidInput(other.to_string()),
        }
    }
}

impl From<SessionError> for GeoAdjustError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotImplemented { .. } => GeoAdjustError::NotImplemented(err.to_string()),
            SessionError::Configuration(_) => GeoAdjustError::Configuration(err.to_string()),
            SessionError::Camera(inner) => inner.into(),
            SessionError::Adjustment(inner) => inner.into(),
            SessionError::Io { .. } => GeoAdjustError::Io(err.to_string()),
            SessionError::Label { .. } => GeoAdjustError::Parse(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::ErrorKind;
    use std::path::PathBuf;

    #[test]
    fn test_geoadjust_error_display() {
        let error = GeoAdjustError::Configuration("base model missing".to_string());
        assert_eq!(error.to_string(), "Configuration error: base model missing");
    }

    #[test]
    fn test_geoadjust_error_from_io() {
        let io_error = std::io::Error::new(ErrorKind::PermissionDenied, "read-only volume");
        let error = GeoAdjustError::from(io_error);

        match error {
            GeoAdjustError::Io(msg) => assert!(msg.contains("read-only volume")),
            _ => panic!("Expected IO error"),
        }
    }

    #[test]
    fn test_adjustment_not_found_maps_to_not_found() {
        let err = AdjustmentError::NotFound {
            path: PathBuf::from("run/ba-left.adjust"),
        };
        assert!(matches!(
            GeoAdjustError::from(err),
            GeoAdjustError::NotFound(_)
        ));
    }

    #[test]
    fn test_malformed_numbers_map_to_parse() {
        let adjustment = AdjustmentError::InvalidNumber {
            line: 1,
            value: "NaN".to_string(),
        };
        assert!(matches!(
            GeoAdjustError::from(adjustment),
            GeoAdjustError::Parse(msg) if msg.contains("NaN")
        ));

        let network = ControlNetworkError::InvalidNumber {
            line: 4,
            value: "abc".to_string(),
        };
        assert!(matches!(
            GeoAdjustError::from(network),
            GeoAdjustError::Parse(msg) if msg.contains("line 4")
        ));
    }

    #[test]
    fn test_camera_errors_map_to_taxonomy() {
        let projection = GeoAdjustError::from(CameraError::PointBehindSensor { depth: -3.0 });
        assert!(matches!(projection, GeoAdjustError::Projection(_)));

        let unimplemented = GeoAdjustError::from(CameraError::NotImplemented("rpc".into()));
        assert!(matches!(unimplemented, GeoAdjustError::NotImplemented(_)));
    }

    #[test]
    fn test_session_not_implemented_names_variant() {
        let err = SessionError::NotImplemented {
            variant: "rpc".to_string(),
        };
        let mapped = GeoAdjustError::from(err);
        match mapped {
            GeoAdjustError::NotImplemented(msg) => assert!(msg.contains("rpc")),
            other => panic!("Expected NotImplemented, got {other:?}"),
        }
    }
}
