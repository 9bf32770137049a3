//! Control networks: tie points and their image measurements.
//!
//! A tie point is a ground feature observed in two or more images. Each
//! measurement records which camera saw it and at which pixel. The network is
//! read-only input to residual computation; tie points keep insertion order and
//! measurements keep their stored order, which fixes the layout of the
//! residual vector.

use nalgebra::{Vector2, Vector3};
use std::collections::HashSet;
use thiserror::Error;

pub mod cnet;

pub use cnet::ControlNetworkLoader;

/// Minimum number of measurements for a tie point
pub const MIN_MEASUREMENTS: usize = 2;

/// Errors raised while building, loading or validating a control network.
#[derive(Error, Debug)]
pub enum ControlNetworkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid number format at line {line}: {value}")]
    InvalidNumber { line: usize, value: String },

    #[error("Missing required fields at line {line}")]
    MissingFields { line: usize },

    #[error("Measurement at line {line} does not follow a POINT record")]
    OrphanMeasurement { line: usize },

    #[error("Tie point {id} has {count} measurements, at least 2 required")]
    TooFewMeasurements { id: usize, count: usize },

    #[error("Tie point {id} references camera {camera_index}, but only {num_cameras} cameras are loaded")]
    InvalidCameraIndex {
        id: usize,
        camera_index: usize,
        num_cameras: usize,
    },

    #[error("Duplicate tie point ID: {id}")]
    DuplicateTiePoint { id: usize },
}

/// One observation of a tie point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub camera_index: usize,
    /// Observed `(sample, line)`
    pub pixel: Vector2<f64>,
}

impl Measurement {
    pub fn new(camera_index: usize, pixel: Vector2<f64>) -> Self {
        Self {
            camera_index,
            pixel,
        }
    }
}

/// A ground feature and all of its observations.
#[derive(Debug, Clone, PartialEq)]
pub struct TiePoint {
    pub id: usize,
    /// Current ground position estimate
    pub position: Vector3<f64>,
    pub measurements: Vec<Measurement>,
}

impl TiePoint {
    pub fn new(id: usize, position: Vector3<f64>) -> Self {
        Self {
            id,
            position,
            measurements: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_measurement(mut self, camera_index: usize, pixel: Vector2<f64>) -> Self {
        self.measurements.push(Measurement::new(camera_index, pixel));
        self
    }
}

/// Ordered collection of tie points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlNetwork {
    tie_points: Vec<TiePoint>,
    ids: HashSet<usize>,
}

impl ControlNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a network, validating every tie point.
    pub fn from_tie_points(
        tie_points: impl IntoIterator<Item = TiePoint>,
    ) -> Result<Self, ControlNetworkError> {
        let mut network = Self::new();
        for tie_point in tie_points {
            network.add_tie_point(tie_point)?;
        }
        Ok(network)
    }

    /// Append a tie point after checking its measurement count and id.
    pub fn add_tie_point(&mut self, tie_point: TiePoint) -> Result<(), ControlNetworkError> {
        if tie_point.measurements.len() < MIN_MEASUREMENTS {
            return Err(ControlNetworkError::TooFewMeasurements {
                id: tie_point.id,
                count: tie_point.measurements.len(),
            });
        }
        if !self.ids.insert(tie_point.id) {
            return Err(ControlNetworkError::DuplicateTiePoint { id: tie_point.id });
        }
        self.tie_points.push(tie_point);
        Ok(())
    }

    pub fn tie_points(&self) -> &[TiePoint] {
        &self.tie_points
    }

    pub fn len(&self) -> usize {
        self.tie_points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tie_points.is_empty()
    }

    /// Total number of measurements, i.e. the residual vector length.
    pub fn num_measurements(&self) -> usize {
        self.tie_points.iter().map(|tp| tp.measurements.len()).sum()
    }

    /// Stored ground positions in tie point order.
    pub fn positions(&self) -> Vec<Vector3<f64>> {
        self.tie_points.iter().map(|tp| tp.position).collect()
    }

    /// Check that every measurement refers to one of `num_cameras` cameras.
    pub fn validate_camera_indices(&self, num_cameras: usize) -> Result<(), ControlNetworkError> {
        for tie_point in &self.tie_points {
            if let Some(m) = tie_point
                .measurements
                .iter()
                .find(|m| m.camera_index >= num_cameras)
            {
                return Err(ControlNetworkError::InvalidCameraIndex {
                    id: tie_point.id,
                    camera_index: m.camera_index,
                    num_cameras,
                });
            }
        }
        Ok(())
    }
}
