// src/volume_lib/state.rs

use std::sync::Arc;

use super::cache::VolumeCache;
use super::config::{ConfigField, Configuration, TriggerSet};
use super::error::ConfigError;
use super::transfer::TransferFunction;
use super::volume::Volume;

/// What a call to [`RendererState::configure`] changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigureOutcome {
    /// The cache was recomputed during this call.
    pub refreshed: bool,
    /// A different volume (or the very first one) was adopted.
    pub volume_changed: bool,
    /// Fields whose stored value changed, triggering or not.
    pub changed: Vec<ConfigField>,
}

/// The volume, configuration snapshot and derived cache owned by one
/// strategy instance.
///
/// After every successful `configure` the cache matches the stored volume
/// and window. Recomputation happens only when the volume is swapped or a
/// field in the strategy's trigger set changes.
#[derive(Debug)]
pub struct RendererState {
    volume: Arc<Volume>,
    config: Configuration,
    cache: VolumeCache,
}

impl RendererState {
    /// Adopts the first volume and configuration and fills the cache.
    pub fn new(volume: Arc<Volume>, config: Configuration) -> Result<Self, ConfigError> {
        config.validate(&volume)?;
        let transfer = TransferFunction::from_config(&config)?;

        let mut cache = VolumeCache::with_len(volume.len());
        cache.refresh(&volume, &transfer);
        log::debug!("Renderer state created, cache filled for {} samples", volume.len());

        Ok(Self { volume, config, cache })
    }

    /// Creates the state on first use, otherwise diffs and updates it.
    pub fn configure_slot(
        slot: &mut Option<RendererState>,
        volume: Arc<Volume>,
        config: Configuration,
        triggers: TriggerSet,
    ) -> Result<ConfigureOutcome, ConfigError> {
        match slot {
            Some(state) => state.configure(volume, config, triggers),
            None => {
                *slot = Some(RendererState::new(volume, config)?);
                Ok(ConfigureOutcome { refreshed: true, volume_changed: true, changed: ConfigField::ALL.to_vec() })
            }
        }
    }

    /// Applies a new volume/configuration pair.
    ///
    /// Validation happens before anything is touched, so a rejected call
    /// leaves the previous state intact.
    pub fn configure(
        &mut self,
        volume: Arc<Volume>,
        config: Configuration,
        triggers: TriggerSet,
    ) -> Result<ConfigureOutcome, ConfigError> {
        config.validate(&volume)?;
        let transfer = TransferFunction::from_config(&config)?;

        let mut outcome = ConfigureOutcome::default();

        if !Arc::ptr_eq(&self.volume, &volume) {
            self.cache.ensure_len(volume.len());
            self.volume = volume;
            outcome.volume_changed = true;
            outcome.refreshed = true;
        }

        for field in ConfigField::ALL {
            if config.differs_in(&self.config, field) {
                outcome.changed.push(field);
                if triggers.contains(field) {
                    outcome.refreshed = true;
                }
            }
        }
        self.config = config;

        if outcome.refreshed {
            self.cache.refresh(&self.volume, &transfer);
            log::debug!(
                "Cache refreshed (volume changed: {}, fields: {:?})",
                outcome.volume_changed,
                outcome.changed
            );
        } else {
            log::trace!("Cache reused, changed fields {:?}", outcome.changed);
        }

        Ok(outcome)
    }

    pub fn volume(&self) -> &Arc<Volume> {
        &self.volume
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn cache(&self) -> &VolumeCache {
        &self.cache
    }

    /// Shades of the currently selected layer.
    pub fn selected_layer(&self) -> &[u8] {
        self.cache.layer(self.volume.dims(), self.config.layer)
    }
}
