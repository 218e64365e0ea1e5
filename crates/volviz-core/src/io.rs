//! Persisted volume format.
//!
//! A volume is stored as a fixed-order little-endian binary record:
//! `i32 x 3` dimensions, `f32 x 3` spacing, the raw voxel bytes (one byte per
//! voxel, count = product of dimensions), then `f32` min, max, mean, std-dev.
//! No padding anywhere.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::{UVec3, Vec3};

use crate::error::{CoreError, Result};
use crate::volume::{VolumeDataset, DEFAULT_HISTOGRAM_BINS};

/// Reads a volume record from `reader`.
///
/// A short read or a non-positive dimension yields an error rather than a
/// half-initialized dataset. The histogram is recomputed after loading so
/// cached statistics always match the voxel data.
pub fn read_volume<R: Read>(reader: &mut R) -> Result<VolumeDataset> {
    let nx = read_i32(reader)?;
    let ny = read_i32(reader)?;
    let nz = read_i32(reader)?;
    if nx <= 0 || ny <= 0 || nz <= 0 {
        return Err(CoreError::MalformedVolume(format!(
            "non-positive dimensions ({nx}, {ny}, {nz})"
        )));
    }
    let dimensions = UVec3::new(nx as u32, ny as u32, nz as u32);

    let sx = read_f32(reader)?;
    let sy = read_f32(reader)?;
    let sz = read_f32(reader)?;
    let spacing = Vec3::new(sx, sy, sz);

    let mut dataset = VolumeDataset::new(dimensions, spacing)?;
    {
        let samples = dataset.samples_mut();
        read_exact_or_malformed(reader, samples, "voxel data")?;
    }

    let header_min = read_f32(reader)?;
    let header_max = read_f32(reader)?;
    let _header_mean = read_f32(reader)?;
    let _header_std = read_f32(reader)?;

    let stats = dataset.compute_histogram(DEFAULT_HISTOGRAM_BINS)?;
    if stats.min != header_min || stats.max != header_max {
        log::warn!(
            "stored statistics disagree with voxel data: header min/max {header_min}/{header_max}, computed {}/{}",
            stats.min,
            stats.max
        );
    }

    log::debug!("loaded volume {dimensions} spacing {spacing}");
    Ok(dataset)
}

/// Writes `dataset` as a volume record.
///
/// Statistics must already be computed; they are persisted after the voxel
/// bytes in the fixed record order.
pub fn write_volume<W: Write>(writer: &mut W, dataset: &VolumeDataset) -> Result<()> {
    let stats = dataset.stats().ok_or(CoreError::StatsNotComputed)?;
    let dims = dataset.dimensions();
    let spacing = dataset.spacing();

    for d in [dims.x, dims.y, dims.z] {
        writer.write_all(&(d as i32).to_le_bytes())?;
    }
    for s in [spacing.x, spacing.y, spacing.z] {
        writer.write_all(&s.to_le_bytes())?;
    }
    writer.write_all(dataset.samples())?;
    for v in [stats.min, stats.max, stats.mean, stats.std_dev] {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

/// Loads a volume record from a file.
pub fn load_volume(path: impl AsRef<Path>) -> Result<VolumeDataset> {
    let file = File::open(path)?;
    read_volume(&mut BufReader::new(file))
}

/// Saves a volume record to a file.
pub fn save_volume(path: impl AsRef<Path>, dataset: &VolumeDataset) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_volume(&mut writer, dataset)?;
    writer.flush()?;
    Ok(())
}

fn read_i32<R: Read>(reader: &mut R) -> Result<i32> {
    let mut buf = [0_u8; 4];
    read_exact_or_malformed(reader, &mut buf, "header")?;
    Ok(i32::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> Result<f32> {
    let mut buf = [0_u8; 4];
    read_exact_or_malformed(reader, &mut buf, "header")?;
    Ok(f32::from_le_bytes(buf))
}

fn read_exact_or_malformed<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            CoreError::MalformedVolume(format!("short read in {what}"))
        } else {
            CoreError::Io(e)
        }
    })
}
