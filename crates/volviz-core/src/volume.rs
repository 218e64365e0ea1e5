//! Voxel grid storage, scalar statistics, and the value histogram.

use glam::{UVec3, Vec3};

use crate::error::{CoreError, Result};

/// Default number of histogram bins.
pub const DEFAULT_HISTOGRAM_BINS: u32 = 1024;

/// Scalar statistics and value histogram over a volume's samples.
///
/// Bin `i` covers `[min + i * (max - min) / num_bins, min + (i + 1) * (max - min) / num_bins)`;
/// the top boundary `value == max` lands in the last bin.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeStats {
    /// Smallest sample value.
    pub min: f32,
    /// Largest sample value.
    pub max: f32,
    /// Mean sample value.
    pub mean: f32,
    /// Population standard deviation.
    pub std_dev: f32,
    /// Per-bin voxel counts.
    pub histogram: Vec<u32>,
}

impl VolumeStats {
    /// Number of histogram bins.
    #[must_use]
    pub fn num_bins(&self) -> u32 {
        self.histogram.len() as u32
    }
}

/// A 3D scalar volume: voxel grid, physical spacing, and cached statistics.
///
/// Samples are unsigned 8-bit, stored contiguously with x fastest-varying,
/// then y, then z (plane-major). The sample buffer length always equals the
/// product of the dimensions.
#[derive(Debug, Clone)]
pub struct VolumeDataset {
    dimensions: UVec3,
    spacing: Vec3,
    samples: Vec<u8>,
    stats: Option<VolumeStats>,
}

impl VolumeDataset {
    /// Creates a zero-filled volume with the given dimensions and spacing.
    pub fn new(dimensions: UVec3, spacing: Vec3) -> Result<Self> {
        let count = checked_voxel_count(dimensions)?;
        Ok(Self {
            dimensions,
            spacing,
            samples: vec![0; count],
            stats: None,
        })
    }

    /// Creates a volume from an existing sample buffer.
    ///
    /// The buffer length must equal the product of the dimensions.
    pub fn from_samples(dimensions: UVec3, spacing: Vec3, samples: Vec<u8>) -> Result<Self> {
        let count = checked_voxel_count(dimensions)?;
        if samples.len() != count {
            return Err(CoreError::SizeMismatch {
                expected: count,
                actual: samples.len(),
            });
        }
        Ok(Self {
            dimensions,
            spacing,
            samples,
            stats: None,
        })
    }

    /// Re-initializes the volume: discards the sample buffer and statistics
    /// and reallocates zero-filled storage for the new dimensions.
    pub fn init(&mut self, dimensions: UVec3, spacing: Vec3) -> Result<()> {
        let count = checked_voxel_count(dimensions)?;
        self.dimensions = dimensions;
        self.spacing = spacing;
        self.samples = vec![0; count];
        self.stats = None;
        Ok(())
    }

    /// Voxel counts per axis.
    #[must_use]
    pub fn dimensions(&self) -> UVec3 {
        self.dimensions
    }

    /// Physical size of one voxel per axis.
    #[must_use]
    pub fn spacing(&self) -> Vec3 {
        self.spacing
    }

    /// Physical extent of the whole volume (dimensions * spacing).
    #[must_use]
    pub fn physical_extent(&self) -> Vec3 {
        self.dimensions.as_vec3() * self.spacing
    }

    /// Total number of voxels.
    #[must_use]
    pub fn voxel_count(&self) -> usize {
        self.samples.len()
    }

    /// The raw sample buffer.
    #[must_use]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Mutable access to the sample buffer. Invalidates cached statistics.
    pub fn samples_mut(&mut self) -> &mut [u8] {
        self.stats = None;
        &mut self.samples
    }

    /// Bulk-copies samples from a loader. Invalidates cached statistics.
    ///
    /// The source length must equal the current voxel count.
    pub fn copy_samples(&mut self, source: &[u8]) -> Result<()> {
        if source.len() != self.samples.len() {
            return Err(CoreError::SizeMismatch {
                expected: self.samples.len(),
                actual: source.len(),
            });
        }
        self.samples.copy_from_slice(source);
        self.stats = None;
        Ok(())
    }

    /// The sample at voxel `(x, y, z)`.
    #[must_use]
    pub fn sample_at(&self, x: u32, y: u32, z: u32) -> u8 {
        let nx = self.dimensions.x as usize;
        let ny = self.dimensions.y as usize;
        self.samples[x as usize + nx * (y as usize + ny * z as usize)]
    }

    /// Cached statistics, if computed since the last sample change.
    #[must_use]
    pub fn stats(&self) -> Option<&VolumeStats> {
        self.stats.as_ref()
    }

    /// Histogram for the UI boundary, as a `(num_bins, counts)` pair.
    #[must_use]
    pub fn histogram(&self) -> Option<(u32, &[u32])> {
        self.stats
            .as_ref()
            .map(|s| (s.num_bins(), s.histogram.as_slice()))
    }

    /// Computes min/max/mean/std-dev and an equal-width histogram over all
    /// samples, caching the result until the samples change.
    ///
    /// A constant volume (`max == min`) places every voxel in bin 0.
    pub fn compute_histogram(&mut self, num_bins: u32) -> Result<&VolumeStats> {
        if self.samples.is_empty() {
            return Err(CoreError::EmptyVolume);
        }
        let num_bins = num_bins.max(1);
        let count = self.samples.len();

        // Pass 1: min, max, mean.
        let mut min = u8::MAX;
        let mut max = u8::MIN;
        let mut sum = 0.0_f64;
        for &v in &self.samples {
            min = min.min(v);
            max = max.max(v);
            sum += f64::from(v);
        }
        let mean = (sum / count as f64) as f32;
        let min = f32::from(min);
        let max = f32::from(max);

        // Pass 2: binning and sum of squared deviations.
        let mut histogram = vec![0_u32; num_bins as usize];
        let mut ssd = 0.0_f64;
        let range = max - min;
        for &v in &self.samples {
            let value = f32::from(v);
            let bin = if range > 0.0 {
                let raw = (num_bins as f32 * (value - min) / range) as u32;
                // value == max would index one past the end
                raw.min(num_bins - 1)
            } else {
                0
            };
            histogram[bin as usize] += 1;
            let d = f64::from(value) - f64::from(mean);
            ssd += d * d;
        }
        let std_dev = (ssd / count as f64).sqrt() as f32;

        log::debug!(
            "volume stats: min={min} max={max} mean={mean} std_dev={std_dev} bins={num_bins}"
        );

        Ok(self.stats.insert(VolumeStats {
            min,
            max,
            mean,
            std_dev,
            histogram,
        }))
    }
}

fn checked_voxel_count(dimensions: UVec3) -> Result<usize> {
    let count = (dimensions.x as usize)
        .checked_mul(dimensions.y as usize)
        .and_then(|n| n.checked_mul(dimensions.z as usize))
        .ok_or_else(|| {
            CoreError::MalformedVolume(format!("dimension product overflows: {dimensions}"))
        })?;
    if count == 0 {
        return Err(CoreError::EmptyVolume);
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn gradient_volume() -> VolumeDataset {
        let mut v = VolumeDataset::new(UVec3::new(8, 8, 8), Vec3::ONE).unwrap();
        for (i, s) in v.samples_mut().iter_mut().enumerate() {
            *s = (i % 256) as u8;
        }
        v
    }

    #[test]
    fn test_sample_layout_x_fastest() {
        let mut v = VolumeDataset::new(UVec3::new(4, 3, 2), Vec3::ONE).unwrap();
        // linear index of (1, 2, 1) = 1 + 4 * (2 + 3 * 1) = 21
        v.samples_mut()[21] = 99;
        assert_eq!(v.sample_at(1, 2, 1), 99);
    }

    #[test]
    fn test_histogram_counts_sum_to_voxel_count() {
        let mut v = gradient_volume();
        let stats = v.compute_histogram(DEFAULT_HISTOGRAM_BINS).unwrap();
        let total: u64 = stats.histogram.iter().map(|&c| u64::from(c)).sum();
        assert_eq!(total, 512);
    }

    #[test]
    fn test_constant_volume_all_in_bin_zero() {
        let mut v = VolumeDataset::new(UVec3::new(4, 4, 4), Vec3::ONE).unwrap();
        v.samples_mut().fill(7);
        let stats = v.compute_histogram(16).unwrap();
        assert_eq!(stats.min, 7.0);
        assert_eq!(stats.max, 7.0);
        assert_eq!(stats.histogram[0], 64);
        assert!(stats.histogram[1..].iter().all(|&c| c == 0));
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_zero_volume_statistics() {
        let mut v = VolumeDataset::new(UVec3::new(4, 4, 4), Vec3::ONE).unwrap();
        let stats = v.compute_histogram(DEFAULT_HISTOGRAM_BINS).unwrap();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 0.0);
        assert_eq!(stats.mean, 0.0);
        assert_eq!(stats.std_dev, 0.0);
    }

    #[test]
    fn test_max_value_lands_in_last_bin() {
        let mut v = VolumeDataset::new(UVec3::new(2, 1, 1), Vec3::ONE).unwrap();
        v.samples_mut().copy_from_slice(&[0, 255]);
        let stats = v.compute_histogram(10).unwrap();
        assert_eq!(stats.histogram[0], 1);
        assert_eq!(stats.histogram[9], 1);
    }

    #[test]
    fn test_mutation_invalidates_stats() {
        let mut v = gradient_volume();
        v.compute_histogram(64).unwrap();
        assert!(v.stats().is_some());
        v.samples_mut()[0] = 255;
        assert!(v.stats().is_none());
    }

    #[test]
    fn test_init_reallocates_and_zeroes() {
        let mut v = gradient_volume();
        v.compute_histogram(64).unwrap();
        v.init(UVec3::new(2, 2, 2), Vec3::splat(0.5)).unwrap();
        assert_eq!(v.voxel_count(), 8);
        assert!(v.samples().iter().all(|&s| s == 0));
        assert!(v.stats().is_none());
        assert_eq!(v.physical_extent(), Vec3::splat(1.0));
    }

    #[test]
    fn test_from_samples_length_mismatch() {
        let err = VolumeDataset::from_samples(UVec3::new(2, 2, 2), Vec3::ONE, vec![0; 7]);
        assert!(matches!(
            err,
            Err(CoreError::SizeMismatch {
                expected: 8,
                actual: 7
            })
        ));
    }

    #[test]
    fn test_empty_dimensions_rejected() {
        assert!(matches!(
            VolumeDataset::new(UVec3::new(0, 4, 4), Vec3::ONE),
            Err(CoreError::EmptyVolume)
        ));
    }

    proptest! {
        #[test]
        fn prop_histogram_conserves_mass(
            samples in proptest::collection::vec(any::<u8>(), 1..512),
            num_bins in 1_u32..64,
        ) {
            let n = samples.len();
            let dims = UVec3::new(n as u32, 1, 1);
            let mut v = VolumeDataset::from_samples(dims, Vec3::ONE, samples).unwrap();
            let stats = v.compute_histogram(num_bins).unwrap();
            let total: usize = stats.histogram.iter().map(|&c| c as usize).sum();
            prop_assert_eq!(total, n);
            prop_assert!(stats.min <= stats.max);
            prop_assert!(stats.mean >= stats.min && stats.mean <= stats.max);
        }
    }
}
