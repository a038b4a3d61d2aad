// src/volume_lib/volume.rs

use std::path::Path;

use super::error::{ConfigError, LoadError};

const HEADER_LEN: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dimensions {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Samples in one layer (`x * y`).
    pub fn layer_len(&self) -> usize {
        self.x as usize * self.y as usize
    }

    pub fn sample_count(&self) -> usize {
        self.layer_len() * self.z as usize
    }

    pub fn index(&self, vx: u32, vy: u32, vz: u32) -> usize {
        vx as usize + vy as usize * self.x as usize + vz as usize * self.layer_len()
    }
}

/// A 3D grid of signed 16-bit intensity samples, stored x-fastest.
///
/// Volumes are immutable once built. Renderers share them through `Arc`
/// and use pointer identity to notice when a different volume is handed in.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    dims: Dimensions,
    samples: Vec<i16>,
}

impl Volume {
    pub fn new(dims: Dimensions, samples: Vec<i16>) -> Result<Self, ConfigError> {
        if dims.x == 0 || dims.y == 0 || dims.z == 0 {
            return Err(ConfigError::InvalidDimensions {
                x: dims.x as i64,
                y: dims.y as i64,
                z: dims.z as i64,
            });
        }
        let expected = dims.sample_count();
        if samples.len() != expected {
            return Err(ConfigError::SampleCountMismatch { expected, actual: samples.len() });
        }
        Ok(Self { dims, samples })
    }

    /// Decodes the loader blob: three little-endian `i32` dimensions followed
    /// by `x * y * z` little-endian `i16` samples. Trailing bytes are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        if bytes.len() < HEADER_LEN {
            return Err(LoadError::TruncatedHeader { len: bytes.len() });
        }
        let read_dim = |at: usize| i32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let (x, y, z) = (read_dim(0), read_dim(4), read_dim(8));
        if x <= 0 || y <= 0 || z <= 0 {
            return Err(ConfigError::InvalidDimensions { x: x as i64, y: y as i64, z: z as i64 }.into());
        }

        let dims = Dimensions::new(x as u32, y as u32, z as u32);
        let payload = &bytes[HEADER_LEN..];
        let expected = dims.sample_count() * std::mem::size_of::<i16>();
        if payload.len() < expected {
            return Err(LoadError::TruncatedSamples { expected, actual: payload.len() });
        }

        let samples = payload[..expected]
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();

        log::info!("Decoded volume {}x{}x{}", dims.x, dims.y, dims.z);
        Ok(Self::new(dims, samples)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }

    pub fn dims(&self) -> Dimensions {
        self.dims
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, vx: u32, vy: u32, vz: u32) -> i16 {
        self.samples[self.dims.index(vx, vy, vz)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(dims: [i32; 3], samples: &[i16]) -> Vec<u8> {
        let mut bytes = Vec::new();
        for d in dims {
            bytes.extend_from_slice(&d.to_le_bytes());
        }
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn decodes_header_and_samples() {
        let bytes = blob([2, 1, 2], &[-3, 7, 1000, -32768]);
        let volume = Volume::from_bytes(&bytes).unwrap();
        assert_eq!(volume.dims(), Dimensions::new(2, 1, 2));
        assert_eq!(volume.samples(), &[-3, 7, 1000, -32768]);
        assert_eq!(volume.sample(0, 0, 1), 1000);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let mut bytes = blob([1, 1, 1], &[42]);
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        assert_eq!(Volume::from_bytes(&bytes).unwrap().samples(), &[42]);
    }

    #[test]
    fn rejects_short_header() {
        assert!(matches!(
            Volume::from_bytes(&[0u8; 7]),
            Err(LoadError::TruncatedHeader { len: 7 })
        ));
    }

    #[test]
    fn rejects_truncated_payload() {
        let bytes = blob([2, 2, 2], &[1, 2, 3]);
        assert!(matches!(
            Volume::from_bytes(&bytes),
            Err(LoadError::TruncatedSamples { expected: 16, actual: 6 })
        ));
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        let bytes = blob([4, 0, 1], &[]);
        assert!(matches!(
            Volume::from_bytes(&bytes),
            Err(LoadError::Config(ConfigError::InvalidDimensions { .. }))
        ));
    }

    #[test]
    fn new_checks_sample_count() {
        let err = Volume::new(Dimensions::new(2, 2, 1), vec![0; 3]).unwrap_err();
        assert_eq!(err, ConfigError::SampleCountMismatch { expected: 4, actual: 3 });
    }

    #[test]
    fn index_is_x_fastest() {
        let dims = Dimensions::new(3, 4, 5);
        assert_eq!(dims.index(1, 2, 3), 1 + 2 * 3 + 3 * 12);
    }
}
