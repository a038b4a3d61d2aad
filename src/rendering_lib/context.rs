// src/rendering_lib/context.rs

use std::sync::Arc;

use super::backend::GpuBackend;
use super::error::RenderError;
use super::settings::RendererSettings;
use super::strategies::{Renderer, StrategyKind};
use crate::volume_lib::{Configuration, ConfigureOutcome, RendererState, Volume};

/// Entry point for callers: owns the GPU backend and the active strategy.
///
/// The last successful `configure` is remembered so a newly activated
/// strategy shows the current volume straight away. Dropping the context
/// disposes the active strategy before the backend goes away.
pub struct RenderingContext<B: GpuBackend> {
    backend: B,
    settings: RendererSettings,
    active: Option<Renderer>,
    current: Option<(Arc<Volume>, Configuration)>,
}

impl<B: GpuBackend> RenderingContext<B> {
    pub fn new(backend: B, settings: RendererSettings) -> Self {
        Self { backend, settings, active: None, current: None }
    }

    /// Activates `kind`, replacing the current strategy.
    ///
    /// The incoming strategy is built and configured with the current volume
    /// first; only then is the outgoing one disposed. If anything fails the
    /// previous strategy stays active and the new one leaves nothing behind.
    /// Selecting the already active kind does nothing.
    pub fn set_strategy(&mut self, kind: StrategyKind) -> Result<(), RenderError> {
        if self.active_kind() == Some(kind) {
            return Ok(());
        }

        let strategy = kind.create(&mut self.backend, &self.settings).map_err(|e| {
            log::error!("Could not activate {}: {}", kind.name(), e);
            e
        })?;
        let mut incoming = Renderer::new(strategy);

        if let Some((volume, config)) = &self.current {
            if let Err(e) = incoming.configure(&mut self.backend, volume.clone(), *config) {
                log::error!("Could not activate {}: {}", kind.name(), e);
                incoming.dispose(&mut self.backend);
                return Err(e);
            }
        }

        if let Some(mut outgoing) = self.active.replace(incoming) {
            outgoing.dispose(&mut self.backend);
        }
        log::info!("Active strategy: {}", kind.name());
        Ok(())
    }

    /// Hands a volume and configuration snapshot to the active strategy.
    pub fn configure(&mut self, volume: Arc<Volume>, config: Configuration) -> Result<ConfigureOutcome, RenderError> {
        let renderer = self.active.as_mut().ok_or(RenderError::NoStrategy)?;
        let outcome = renderer.configure(&mut self.backend, volume.clone(), config)?;
        self.current = Some((volume, config));
        Ok(outcome)
    }

    pub fn clear(&mut self) -> Result<(), RenderError> {
        self.backend.clear(self.settings.clear_color)?;
        Ok(())
    }

    pub fn render(&mut self) -> Result<(), RenderError> {
        let renderer = self.active.as_mut().ok_or(RenderError::NoStrategy)?;
        renderer.render(&mut self.backend)
    }

    pub fn flush(&mut self) -> Result<(), RenderError> {
        self.backend.flush()?;
        Ok(())
    }

    pub fn active_kind(&self) -> Option<StrategyKind> {
        self.active.as_ref().map(Renderer::kind)
    }

    pub fn state(&self) -> Option<&RendererState> {
        self.active.as_ref().and_then(Renderer::state)
    }

    /// The volume and configuration of the last successful `configure`.
    pub fn current(&self) -> Option<(&Arc<Volume>, Configuration)> {
        self.current.as_ref().map(|(volume, config)| (volume, *config))
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: GpuBackend> Drop for RenderingContext<B> {
    fn drop(&mut self) {
        if let Some(mut renderer) = self.active.take() {
            renderer.dispose(&mut self.backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering_lib::headless::HeadlessBackend;
    use crate::rendering_lib::strategies::test_support::*;

    #[test]
    fn configure_without_strategy_is_rejected() {
        let mut ctx = RenderingContext::new(HeadlessBackend::new(4, 4), RendererSettings::default());
        assert_eq!(ctx.configure(scenario_volume(), window(0)).unwrap_err(), RenderError::NoStrategy);
        assert_eq!(ctx.render(), Err(RenderError::NoStrategy));
        assert!(ctx.current().is_none());
    }

    #[test]
    fn clear_uses_configured_color() {
        let settings = RendererSettings { clear_color: [1.0, 0.0, 0.0, 1.0], ..Default::default() };
        let mut ctx = RenderingContext::new(HeadlessBackend::new(4, 4), settings);
        ctx.clear().unwrap();
        ctx.flush().unwrap();
        assert_eq!(ctx.backend().last_frame().unwrap().clears, vec![[1.0, 0.0, 0.0, 1.0]]);
    }

    #[test]
    fn reselecting_active_kind_keeps_state() {
        let mut ctx = RenderingContext::new(HeadlessBackend::new(4, 4), RendererSettings::default());
        ctx.set_strategy(StrategyKind::Texture2D).unwrap();
        ctx.configure(scenario_volume(), window(0)).unwrap();
        ctx.set_strategy(StrategyKind::Texture2D).unwrap();
        assert_eq!(ctx.state().unwrap().cache().refresh_count(), 1);
        assert_eq!(ctx.backend().counters().total_released(), 0);
    }

    #[test]
    fn rejected_configure_keeps_previous_snapshot() {
        let mut ctx = RenderingContext::new(HeadlessBackend::new(4, 4), RendererSettings::default());
        ctx.set_strategy(StrategyKind::MeshQuads).unwrap();
        ctx.configure(scenario_volume(), window(1)).unwrap();
        assert!(ctx.configure(scenario_volume(), window(5)).is_err());
        assert_eq!(ctx.current().unwrap().1.layer, 1);
    }

    #[test]
    fn drop_disposes_active_strategy() {
        let mut gpu = HeadlessBackend::new(4, 4);
        {
            let mut ctx = RenderingContext::new(&mut gpu, RendererSettings::default());
            ctx.set_strategy(StrategyKind::Texture3D).unwrap();
            ctx.configure(scenario_volume(), window(0)).unwrap();
        }
        assert_eq!(gpu.live_resources(), 0);
        assert_eq!(gpu.counters().invalid_releases, 0);
    }
}
