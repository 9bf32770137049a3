//! Plain-text control network format.
//!
//! ```text
//! # comment
//! POINT <id> <x> <y> <z>
//! MEASURE <camera_index> <sample> <line>
//! MEASURE <camera_index> <sample> <line>
//! ```
//!
//! Each `MEASURE` record belongs to the closest preceding `POINT`.

use super::{ControlNetwork, ControlNetworkError, Measurement, TiePoint};
use memmap2::Mmap;
use nalgebra::{Vector2, Vector3};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Files with more lines than this are tokenized in parallel
pub const PARALLEL_PARSE_THRESHOLD: usize = 5000;

/// Loader and writer for `.cnet` control network files
pub struct ControlNetworkLoader;

enum ParsedRecord {
    Point { id: usize, position: Vector3<f64> },
    Measure(Measurement),
}

impl ControlNetworkLoader {
    /// Load a control network from a memory-mapped file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ControlNetwork, ControlNetworkError> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        let content = std::str::from_utf8(&mmap).map_err(|e| ControlNetworkError::Parse {
            line: 0,
            message: format!("Invalid UTF-8: {e}"),
        })?;

        let network = Self::parse_content(content)?;
        debug!(
            "Loaded {} tie points with {} measurements from {}",
            network.len(),
            network.num_measurements(),
            path.as_ref().display()
        );
        Ok(network)
    }

    /// Write a control network in the text format read by [`load`](Self::load).
    pub fn write<P: AsRef<Path>>(
        network: &ControlNetwork,
        path: P,
    ) -> Result<(), ControlNetworkError> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        for tie_point in network.tie_points() {
            let p = &tie_point.position;
            writeln!(out, "POINT {} {} {} {}", tie_point.id, p.x, p.y, p.z)?;
            for m in &tie_point.measurements {
                writeln!(out, "MEASURE {} {} {}", m.camera_index, m.pixel.x, m.pixel.y)?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Parse control network text.
    pub fn parse_content(content: &str) -> Result<ControlNetwork, ControlNetworkError> {
        let lines: Vec<&str> = content.lines().collect();

        let records: Vec<Option<ParsedRecord>> = if lines.len() > PARALLEL_PARSE_THRESHOLD {
            lines
                .par_iter()
                .enumerate()
                .map(|(line_num, line)| Self::parse_line(line, line_num + 1))
                .collect::<Result<Vec<_>, ControlNetworkError>>()?
        } else {
            lines
                .iter()
                .enumerate()
                .map(|(line_num, line)| Self::parse_line(line, line_num + 1))
                .collect::<Result<Vec<_>, ControlNetworkError>>()?
        };

        // Grouping depends on record order, so it stays sequential
        let mut network = ControlNetwork::new();
        let mut current: Option<TiePoint> = None;
        for (line_num, record) in records.into_iter().enumerate() {
            match record {
                None => {}
                Some(ParsedRecord::Point { id, position }) => {
                    if let Some(done) = current.replace(TiePoint::new(id, position)) {
                        network.add_tie_point(done)?;
                    }
                }
                Some(ParsedRecord::Measure(m)) => match current.as_mut() {
                    Some(tie_point) => tie_point.measurements.push(m),
                    None => {
                        return Err(ControlNetworkError::OrphanMeasurement {
                            line: line_num + 1,
                        });
                    }
                },
            }
        }
        if let Some(done) = current {
            network.add_tie_point(done)?;
        }

        Ok(network)
    }

    fn parse_line(line: &str, line_num: usize) -> Result<Option<ParsedRecord>, ControlNetworkError> {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0] {
            "POINT" => {
                if parts.len() < 5 {
                    return Err(ControlNetworkError::MissingFields { line: line_num });
                }
                let id = parse_field::<usize>(parts[1], line_num)?;
                let position = Vector3::new(
                    parse_field(parts[2], line_num)?,
                    parse_field(parts[3], line_num)?,
                    parse_field(parts[4], line_num)?,
                );
                Ok(Some(ParsedRecord::Point { id, position }))
            }
            "MEASURE" => {
                if parts.len() < 4 {
                    return Err(ControlNetworkError::MissingFields { line: line_num });
                }
                let camera_index = parse_field::<usize>(parts[1], line_num)?;
                let pixel = Vector2::new(
                    parse_field(parts[2], line_num)?,
                    parse_field(parts[3], line_num)?,
                );
                Ok(Some(ParsedRecord::Measure(Measurement::new(
                    camera_index,
                    pixel,
                ))))
            }
            other => Err(ControlNetworkError::Parse {
                line: line_num,
                message: format!("unknown record type '{other}'"),
            }),
        }
    }
}

fn parse_field<T: FromStr>(value: &str, line: usize) -> Result<T, ControlNetworkError> {
    value
        .parse::<T>()
        .map_err(|_| ControlNetworkError::InvalidNumber {
            line,
            value: value.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fmt::Write as _;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const SMALL: &str = "\
# two cameras, one tie point
POINT 10 0.0 0.0 1000.0
MEASURE 0 512.0 384.0
MEASURE 1 500.0 380.0

POINT 11 5.5 -2.0 980.25
MEASURE 1 610.5 402.75
MEASURE 0 620.0 400.0
";

    #[test]
    fn test_parse_small_network() {
        let network = ControlNetworkLoader::parse_content(SMALL).unwrap();
        assert_eq!(network.len(), 2);
        assert_eq!(network.num_measurements(), 4);

        let second = &network.tie_points()[1];
        assert_eq!(second.id, 11);
        assert_eq!(second.position, Vector3::new(5.5, -2.0, 980.25));
        assert_eq!(second.measurements[0].camera_index, 1);
        assert_eq!(second.measurements[0].pixel, Vector2::new(610.5, 402.75));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ControlNetworkLoader::parse_content("MEASURE 0 1 2\n"),
            Err(ControlNetworkError::OrphanMeasurement { line: 1 })
        ));
        assert!(matches!(
            ControlNetworkLoader::parse_content("POINT 1 0 0\n"),
            Err(ControlNetworkError::MissingFields { line: 1 })
        ));
        assert!(matches!(
            ControlNetworkLoader::parse_content("POINT 1 0 0 abc\n"),
            Err(ControlNetworkError::InvalidNumber { line: 1, .. })
        ));
        assert!(matches!(
            ControlNetworkLoader::parse_content("POINT 1 0 0 0\nMEASURE 0 1 2\n"),
            Err(ControlNetworkError::TooFewMeasurements { id: 1, count: 1 })
        ));
        assert!(matches!(
            ControlNetworkLoader::parse_content("VERTEX 1 0 0 0\n"),
            Err(ControlNetworkError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_write_then_load() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("network.cnet");
        let network = ControlNetworkLoader::parse_content(SMALL)?;

        ControlNetworkLoader::write(&network, &path)?;
        let loaded = ControlNetworkLoader::load(&path)?;

        assert_eq!(loaded.tie_points(), network.tie_points());
        Ok(())
    }

    #[test]
    fn test_large_file_parses_in_order() -> TestResult {
        let mut content = String::new();
        for i in 0..2000 {
            writeln!(content, "POINT {i} {} {} 1000", i as f64 * 0.5, -(i as f64))?;
            writeln!(content, "MEASURE 0 {} 100", i % 1024)?;
            writeln!(content, "MEASURE 1 {} 200", (i * 7) % 1024)?;
        }
        assert!(content.lines().count() > PARALLEL_PARSE_THRESHOLD);

        let network = ControlNetworkLoader::parse_content(&content)?;
        assert_eq!(network.len(), 2000);
        for (i, tie_point) in network.tie_points().iter().enumerate() {
            assert_eq!(tie_point.id, i);
            assert_eq!(tie_point.measurements[1].pixel.x, ((i * 7) % 1024) as f64);
        }
        Ok(())
    }
}
