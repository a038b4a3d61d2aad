// src/volume_lib/cache.rs

use super::transfer::TransferFunction;
use super::volume::{Dimensions, Volume};

/// Windowed shades for every sample of a volume, same length and layout.
#[derive(Debug, Default, Clone)]
pub struct VolumeCache {
    shades: Vec<u8>,
    refreshes: u64,
}

impl VolumeCache {
    pub fn with_len(len: usize) -> Self {
        Self { shades: vec![0; len], refreshes: 0 }
    }

    /// Drops the contents if `len` differs from the current length.
    pub fn ensure_len(&mut self, len: usize) {
        if self.shades.len() != len {
            self.shades = vec![0; len];
        }
    }

    /// Recomputes every shade. Runs in O(volume size).
    pub fn refresh(&mut self, volume: &Volume, transfer: &TransferFunction) {
        self.ensure_len(volume.len());
        for (shade, sample) in self.shades.iter_mut().zip(volume.samples()) {
            *shade = transfer.map(*sample);
        }
        self.refreshes += 1;
    }

    pub fn shades(&self) -> &[u8] {
        &self.shades
    }

    /// Shades of one z layer.
    pub fn layer(&self, dims: Dimensions, layer: u32) -> &[u8] {
        let len = dims.layer_len();
        let start = layer as usize * len;
        &self.shades[start..start + len]
    }

    /// Number of full refreshes performed so far.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes
    }

    pub fn len(&self) -> usize {
        self.shades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_fills_every_sample() {
        let volume = Volume::new(Dimensions::new(2, 2, 2), vec![0, 50, 100, 150, 200, 210, 220, 230]).unwrap();
        let mut cache = VolumeCache::with_len(volume.len());
        cache.refresh(&volume, &TransferFunction::new(0.0, 100.0).unwrap());
        assert_eq!(cache.shades(), &[0, 128, 255, 255, 255, 255, 255, 255]);
        assert_eq!(cache.layer(volume.dims(), 0), &[0, 128, 255, 255]);
        assert_eq!(cache.refresh_count(), 1);
    }

    #[test]
    fn refresh_resizes_to_volume() {
        let volume = Volume::new(Dimensions::new(3, 1, 1), vec![1, 2, 3]).unwrap();
        let mut cache = VolumeCache::with_len(8);
        cache.refresh(&volume, &TransferFunction::new(0.0, 3.0).unwrap());
        assert_eq!(cache.len(), 3);
    }
}
