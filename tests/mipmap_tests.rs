//! Mip Chain Tests
//!
//! Tests for:
//! - mip_level_count / next_mip_extent: full-chain math, non-power-of-two
//! - MipmapGenerator: texture creation, per-format pipeline cache,
//!   epoch-driven invalidation after device recovery
//!
//! GPU-dependent tests skip when no adapter is available.

use glint::{
    GpuContext, GpuSettings, MipmapGenerator, TextureOptions, TextureSource, mip_level_count,
    next_mip_extent,
};

fn create_context() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    pollster::block_on(GpuContext::new(GpuSettings::default())).ok()
}

fn solid_rgba(width: u32, height: u32) -> Vec<u8> {
    vec![0x80; (width * height * 4) as usize]
}

// ============================================================================
// Mip Math Tests
// ============================================================================

#[test]
fn mip_level_count_full_chain() {
    assert_eq!(mip_level_count(1, 1), 1);
    assert_eq!(mip_level_count(2, 2), 2);
    assert_eq!(mip_level_count(256, 256), 9);
    assert_eq!(mip_level_count(1024, 1), 11, "Chain follows the larger axis");
}

#[test]
fn mip_level_count_non_power_of_two() {
    // floor(log2(300)) = 8
    assert_eq!(mip_level_count(300, 200), 9);
    assert_eq!(mip_level_count(5, 3), 3);
}

#[test]
fn mip_level_count_handles_zero_extent() {
    assert_eq!(mip_level_count(0, 0), 1, "Degenerate extent still has a base level");
}

#[test]
fn next_mip_extent_halves_and_floors_at_one() {
    assert_eq!(next_mip_extent(256, 128), (128, 64));
    assert_eq!(next_mip_extent(5, 3), (2, 1));
    assert_eq!(next_mip_extent(1, 1), (1, 1));
}

#[test]
fn mip_chain_walk_terminates_at_one_by_one() {
    let (mut w, mut h) = (300u32, 200u32);
    let mut levels = 1;
    while (w, h) != (1, 1) {
        let next = next_mip_extent(w, h);
        assert!(next.0 <= w && next.1 <= h, "Extents never grow");
        (w, h) = next;
        levels += 1;
    }
    assert_eq!(
        levels,
        mip_level_count(300, 200),
        "Walking the chain visits exactly mip_level_count levels"
    );
}

// ============================================================================
// Texture Creation Tests (GPU required)
// ============================================================================

#[test]
fn created_texture_carries_full_mip_chain() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut generator = MipmapGenerator::new();
    let data = solid_rgba(64, 64);
    let source = TextureSource {
        data: &data,
        width: 64,
        height: 64,
    };

    let texture =
        generator.create_texture_from_source(ctx.handle(), &source, &TextureOptions::default());
    assert_eq!(texture.mip_level_count(), 7, "64x64 -> 7 levels");
    assert_eq!(texture.width(), 64);
    assert_eq!(texture.height(), 64);
    assert_eq!(texture.format(), wgpu::TextureFormat::Rgba8Unorm);
}

#[test]
fn mips_disabled_creates_single_level() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut generator = MipmapGenerator::new();
    let data = solid_rgba(64, 32);
    let source = TextureSource {
        data: &data,
        width: 64,
        height: 32,
    };

    let texture = generator.create_texture_from_source(
        ctx.handle(),
        &source,
        &TextureOptions {
            mips: false,
            ..Default::default()
        },
    );
    assert_eq!(texture.mip_level_count(), 1);
    assert_eq!(
        generator.cached_pipeline_count(),
        0,
        "No blit pipeline needed for a single-level texture"
    );
}

#[test]
fn sources_become_array_layers() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut generator = MipmapGenerator::new();
    let data = solid_rgba(16, 16);
    let sources = [
        TextureSource {
            data: &data,
            width: 16,
            height: 16,
        },
        TextureSource {
            data: &data,
            width: 16,
            height: 16,
        },
    ];

    let texture =
        generator.create_texture_from_sources(ctx.handle(), &sources, &TextureOptions::default());
    assert_eq!(texture.depth_or_array_layers(), 2);
    assert_eq!(texture.mip_level_count(), 5);
}

#[test]
fn pipeline_cache_is_shared_per_format() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut generator = MipmapGenerator::new();
    let data = solid_rgba(32, 32);
    let source = TextureSource {
        data: &data,
        width: 32,
        height: 32,
    };

    let _ = generator.create_texture_from_source(ctx.handle(), &source, &TextureOptions::default());
    let _ = generator.create_texture_from_source(ctx.handle(), &source, &TextureOptions::default());
    assert_eq!(
        generator.cached_pipeline_count(),
        1,
        "Same format reuses one pipeline"
    );

    let _ = generator.create_texture_from_source(
        ctx.handle(),
        &source,
        &TextureOptions {
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            ..Default::default()
        },
    );
    assert_eq!(
        generator.cached_pipeline_count(),
        2,
        "A second format adds exactly one pipeline"
    );
}

#[test]
fn device_recovery_invalidates_pipeline_cache() {
    let Some(mut ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut generator = MipmapGenerator::new();
    let data = solid_rgba(32, 32);
    let source = TextureSource {
        data: &data,
        width: 32,
        height: 32,
    };

    let _ = generator.create_texture_from_source(ctx.handle(), &source, &TextureOptions::default());
    assert_eq!(generator.cached_pipeline_count(), 1);

    ctx.recover().expect("reacquisition on a healthy adapter");

    // First use against the new epoch drops the stale cache and rebuilds.
    let _ = generator.create_texture_from_source(ctx.handle(), &source, &TextureOptions::default());
    assert_eq!(
        generator.cached_pipeline_count(),
        1,
        "Cache rebuilt from scratch for the new device generation"
    );
}
