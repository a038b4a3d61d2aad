// benches/cache_refresh_benchmark.rs
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

use tomogram_viewer::rendering_lib::{HeadlessBackend, RendererSettings, RenderingContext, StrategyKind};
use tomogram_viewer::volume_lib::{Configuration, Dimensions, TransferFunction, Volume, VolumeCache};

fn random_volume(rng: &mut impl Rng, dims: Dimensions) -> Arc<Volume> {
    let samples = (0..dims.sample_count()).map(|_| rng.gen_range(-1024..4096)).collect();
    Arc::new(Volume::new(dims, samples).expect("benchmark volume is well formed"))
}

fn cache_refresh_benchmark_fn(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let volume = random_volume(&mut rng, Dimensions::new(128, 128, 64));

    let mut group = c.benchmark_group("CacheRefresh");

    group.bench_function("refresh_128x128x64", |b| {
        let mut cache = VolumeCache::with_len(volume.len());
        let transfer = TransferFunction::new(0.0, 255.0).expect("valid window");
        b.iter(|| cache.refresh(black_box(&volume), black_box(&transfer)))
    });

    // A layer change that the strategy does not trigger on: no refresh at all.
    group.bench_function("configure_layer_change_3d_texture", |b| {
        let mut ctx = RenderingContext::new(HeadlessBackend::new(512, 512), RendererSettings::default());
        ctx.set_strategy(StrategyKind::Texture3D).expect("headless strategy");
        let mut layer = 0;
        b.iter(|| {
            layer = (layer + 1) % 64;
            ctx.configure(volume.clone(), black_box(Configuration::new(layer, 0.0, 255.0)))
        })
    });

    group.bench_function("configure_window_drag_texture_2d", |b| {
        let mut ctx = RenderingContext::new(HeadlessBackend::new(512, 512), RendererSettings::default());
        ctx.set_strategy(StrategyKind::Texture2D).expect("headless strategy");
        let mut min = 0.0;
        b.iter(|| {
            min = (min + 1.0) % 255.0;
            ctx.configure(volume.clone(), black_box(Configuration::new(10, min, 128.0)))
        })
    });
    group.finish();
}

criterion_group!(benches, cache_refresh_benchmark_fn);
criterion_main!(benches);
