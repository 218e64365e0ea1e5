//! Transfer function control points and the dense RGBA lookup table.
//!
//! The curve editor hands over a sparse, ascending list of
//! `(value, opacity, color)` control points; rendering consumes a dense,
//! evenly spaced table of RGBA samples over the normalized `[0, 1]` value
//! domain. The table is rebuilt in full on every control-point change.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use glam::Vec3;
use half::f16;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Number of samples in the dense lookup table.
pub const TF_RESOLUTION: usize = 1024;

/// One user-placed control point on the transfer-function curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    /// Normalized scalar value in `[0, 1]`.
    pub value: f32,
    /// Opacity in `[0, 1]`.
    pub opacity: f32,
    /// RGB color, each channel in `[0, 1]`.
    pub color: Vec3,
}

impl ControlPoint {
    /// Creates a control point.
    #[must_use]
    pub fn new(value: f32, opacity: f32, color: Vec3) -> Self {
        Self {
            value,
            opacity,
            color,
        }
    }

    fn rgba(&self) -> [f32; 4] {
        [self.color.x, self.color.y, self.color.z, self.opacity]
    }
}

/// Dense RGBA lookup table resampled from sparse control points.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunctionTable {
    samples: Vec<[f32; 4]>,
}

impl TransferFunctionTable {
    /// Builds a table at the default resolution.
    pub fn from_control_points(points: &[ControlPoint]) -> Result<Self> {
        Self::with_resolution(points, TF_RESOLUTION)
    }

    /// Builds a table with `resolution` samples spanning `[0, 1]` inclusive.
    ///
    /// Each output sample interpolates linearly between the bracketing pair
    /// of control points; samples outside the covered value range clamp to
    /// the nearest endpoint's RGBA (no extrapolation).
    pub fn with_resolution(points: &[ControlPoint], resolution: usize) -> Result<Self> {
        validate_control_points(points)?;
        let resolution = resolution.max(2);
        let first = points[0];
        let last = points[points.len() - 1];

        let mut samples = Vec::with_capacity(resolution);
        for i in 0..resolution {
            let t = i as f32 / (resolution - 1) as f32;
            let rgba = if t <= first.value {
                first.rgba()
            } else if t >= last.value {
                last.rgba()
            } else {
                let mut rgba = last.rgba();
                for pair in points.windows(2) {
                    let (cur, next) = (pair[0], pair[1]);
                    if cur.value <= t && t <= next.value {
                        let dv = next.value - cur.value;
                        let interp = if dv > 0.0 { (t - cur.value) / dv } else { 0.0 };
                        let a = cur.rgba();
                        let b = next.rgba();
                        rgba = [
                            lerp(a[0], b[0], interp),
                            lerp(a[1], b[1], interp),
                            lerp(a[2], b[2], interp),
                            lerp(a[3], b[3], interp),
                        ];
                        break;
                    }
                }
                rgba
            };
            samples.push(rgba);
        }

        Ok(Self { samples })
    }

    /// Number of table samples.
    #[must_use]
    pub fn resolution(&self) -> usize {
        self.samples.len()
    }

    /// The dense RGBA samples.
    #[must_use]
    pub fn samples(&self) -> &[[f32; 4]] {
        &self.samples
    }

    /// Looks up the table entry nearest to normalized value `t`.
    #[must_use]
    pub fn lookup(&self, t: f32) -> [f32; 4] {
        let n = self.samples.len();
        let idx = (t.clamp(0.0, 1.0) * (n - 1) as f32).round() as usize;
        self.samples[idx.min(n - 1)]
    }

    /// Packs the table into half-float RGBA texels for GPU upload.
    #[must_use]
    pub fn packed_rgba16(&self) -> Vec<u16> {
        let mut texels = Vec::with_capacity(self.samples.len() * 4);
        for rgba in &self.samples {
            for &c in rgba {
                texels.push(f16::from_f32(c).to_bits());
            }
        }
        texels
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Checks that `points` form a valid curve: at least two, values and
/// opacities in `[0, 1]`, ascending by value.
pub fn validate_control_points(points: &[ControlPoint]) -> Result<()> {
    if points.len() < 2 {
        return Err(CoreError::NotEnoughControlPoints(points.len()));
    }
    for (i, p) in points.iter().enumerate() {
        let in_range = |x: f32| (0.0..=1.0).contains(&x);
        if !in_range(p.value) || !in_range(p.opacity) {
            return Err(CoreError::ControlPointOutOfRange {
                index: i,
                value: p.value,
                opacity: p.opacity,
            });
        }
        if i > 0 && points[i - 1].value > p.value {
            return Err(CoreError::UnsortedControlPoints(i));
        }
    }
    Ok(())
}

/// A named, persistable set of control points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunctionPreset {
    /// Display name.
    pub name: String,
    /// Control points, ascending by value.
    pub points: Vec<ControlPoint>,
}

impl TransferFunctionPreset {
    /// Loads a preset from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Saves the preset as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn black_to_white() -> Vec<ControlPoint> {
        vec![
            ControlPoint::new(0.0, 0.0, Vec3::ZERO),
            ControlPoint::new(1.0, 1.0, Vec3::ONE),
        ]
    }

    #[test]
    fn test_endpoints_exact() {
        let table = TransferFunctionTable::from_control_points(&black_to_white()).unwrap();
        assert_eq!(table.samples()[0], [0.0, 0.0, 0.0, 0.0]);
        assert_eq!(table.samples()[table.resolution() - 1], [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_midpoint_interpolates_to_gray() {
        let table = TransferFunctionTable::from_control_points(&black_to_white()).unwrap();
        let mid = table.lookup(0.5);
        for c in mid {
            assert!((c - 0.5).abs() < 1e-2, "expected ~0.5, got {c}");
        }
    }

    #[test]
    fn test_below_range_clamps_to_first_point() {
        let red = Vec3::new(1.0, 0.0, 0.0);
        let points = vec![
            ControlPoint::new(0.2, 0.3, red),
            ControlPoint::new(1.0, 1.0, Vec3::ONE),
        ];
        let table = TransferFunctionTable::from_control_points(&points).unwrap();
        let resolution = table.resolution();
        for (i, sample) in table.samples().iter().enumerate() {
            let t = i as f32 / (resolution - 1) as f32;
            if t < 0.2 {
                assert_eq!(*sample, [1.0, 0.0, 0.0, 0.3], "t={t} must clamp");
            }
        }
    }

    #[test]
    fn test_above_range_clamps_to_last_point() {
        let points = vec![
            ControlPoint::new(0.0, 0.0, Vec3::ZERO),
            ControlPoint::new(0.5, 0.8, Vec3::new(0.0, 1.0, 0.0)),
        ];
        let table = TransferFunctionTable::from_control_points(&points).unwrap();
        assert_eq!(table.lookup(0.9), [0.0, 1.0, 0.0, 0.8]);
        assert_eq!(table.lookup(1.0), [0.0, 1.0, 0.0, 0.8]);
    }

    #[test]
    fn test_too_few_points_rejected() {
        let points = [ControlPoint::new(0.5, 0.5, Vec3::ONE)];
        assert!(matches!(
            TransferFunctionTable::from_control_points(&points),
            Err(CoreError::NotEnoughControlPoints(1))
        ));
    }

    #[test]
    fn test_unsorted_points_rejected() {
        let points = vec![
            ControlPoint::new(0.5, 0.0, Vec3::ZERO),
            ControlPoint::new(0.2, 1.0, Vec3::ONE),
        ];
        assert!(matches!(
            TransferFunctionTable::from_control_points(&points),
            Err(CoreError::UnsortedControlPoints(1))
        ));
    }

    #[test]
    fn test_out_of_range_point_rejected() {
        let points = vec![
            ControlPoint::new(-0.1, 0.0, Vec3::ZERO),
            ControlPoint::new(1.0, 1.0, Vec3::ONE),
        ];
        assert!(matches!(
            TransferFunctionTable::from_control_points(&points),
            Err(CoreError::ControlPointOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn test_coincident_values_do_not_divide_by_zero() {
        let points = vec![
            ControlPoint::new(0.0, 0.0, Vec3::ZERO),
            ControlPoint::new(0.5, 0.0, Vec3::ZERO),
            ControlPoint::new(0.5, 1.0, Vec3::ONE),
            ControlPoint::new(1.0, 1.0, Vec3::ONE),
        ];
        let table = TransferFunctionTable::from_control_points(&points).unwrap();
        assert!(table.samples().iter().all(|s| s.iter().all(|c| c.is_finite())));
    }

    #[test]
    fn test_packed_rgba16_length() {
        let table = TransferFunctionTable::from_control_points(&black_to_white()).unwrap();
        assert_eq!(table.packed_rgba16().len(), TF_RESOLUTION * 4);
    }

    #[test]
    fn test_preset_json_round_trip() {
        let preset = TransferFunctionPreset {
            name: "bone".into(),
            points: black_to_white(),
        };
        let json = serde_json::to_string(&preset).unwrap();
        let back: TransferFunctionPreset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, preset);
    }
}
