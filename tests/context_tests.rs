//! GPU Context Tests
//!
//! Tests for:
//! - GpuSettings: default values
//! - GlintError: display formatting
//! - GpuContext: acquisition, epoch progression across recovery
//!
//! Adapter-dependent tests skip when no GPU is available.

use std::time::Duration;

use glint::{GlintError, GpuContext, GpuSettings};

fn create_context() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    pollster::block_on(GpuContext::new(GpuSettings::default())).ok()
}

// ============================================================================
// GpuSettings Tests
// ============================================================================

#[test]
fn settings_defaults() {
    let s = GpuSettings::default();
    assert_eq!(s.backends, None);
    assert_eq!(s.power_preference, wgpu::PowerPreference::HighPerformance);
    assert_eq!(s.required_features, wgpu::Features::empty());
    assert_eq!(s.depth_format, wgpu::TextureFormat::Depth24Plus);
    assert!(s.vsync);
    assert_eq!(s.max_recovery_attempts, 3);
    assert_eq!(s.recovery_backoff, Duration::from_millis(100));
    assert_eq!(s.staging_pool_cap, 4);
    assert_eq!(s.timer_pool_cap, 8);
}

// ============================================================================
// Error Display Tests
// ============================================================================

#[test]
fn device_lost_error_reports_attempt_count() {
    let err = GlintError::DeviceLost { attempts: 3 };
    assert_eq!(
        err.to_string(),
        "Device lost and not recovered after 3 attempt(s)"
    );
}

#[test]
fn target_not_found_error_names_the_target() {
    let err = GlintError::TargetNotFound("alpha".to_string());
    assert!(err.to_string().contains("alpha"));
}

// ============================================================================
// Context Acquisition Tests (GPU required)
// ============================================================================

#[test]
fn new_context_starts_at_epoch_zero() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    assert_eq!(ctx.epoch(), 0);
    assert!(!ctx.is_lost());
    assert_eq!(ctx.handle().epoch(), 0);
    assert!(!ctx.handle().is_lost());
}

#[test]
fn ensure_device_on_healthy_context_returns_current_handle() {
    let Some(mut ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let handle = ctx.ensure_device().expect("healthy device");
    assert_eq!(handle.epoch(), 0);
}

#[test]
fn negotiated_features_match_request() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    // Nothing was required, so nothing beyond that should be enabled.
    assert_eq!(ctx.handle().features, wgpu::Features::empty());
    assert!(ctx.handle().max_texture_dimension_2d() >= 2048);
}

#[test]
fn recover_advances_epoch_and_strands_old_handles() {
    let Some(mut ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let old_handle = ctx.handle().clone();

    ctx.recover().expect("reacquisition on a healthy adapter");

    assert_eq!(ctx.epoch(), 1);
    assert!(!ctx.is_lost());
    assert_eq!(
        old_handle.epoch(),
        0,
        "Old handle keeps its epoch; caches comparing epochs see the change"
    );
}

#[test]
fn presentation_format_defaults_before_any_surface() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    assert_eq!(
        ctx.presentation_format(),
        wgpu::TextureFormat::Bgra8UnormSrgb
    );
}
