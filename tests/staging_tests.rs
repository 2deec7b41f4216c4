//! Staging Pool Tests
//!
//! Tests for:
//! - StagingPool: lazy allocation, in-flight exclusion, recycling, caps
//! - StagingBuffer: write/unmap/copy contract, end-to-end data integrity
//!
//! GPU-dependent tests skip when no adapter is available.

use glint::{GpuContext, GpuSettings, StagingPool};

fn create_context() -> Option<GpuContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    pollster::block_on(GpuContext::new(GpuSettings::default())).ok()
}

fn wait_for_gpu(ctx: &GpuContext) {
    ctx.handle()
        .device
        .poll(wgpu::PollType::wait_indefinitely())
        .expect("device poll");
}

// ============================================================================
// Pool Accounting Tests
// ============================================================================

#[test]
fn new_pool_is_empty() {
    let pool = StagingPool::new(1024, 4);
    assert_eq!(pool.available(), 0);
    assert_eq!(pool.created_total(), 0);
    assert_eq!(pool.slot_size(), 1024);
}

#[test]
fn acquire_allocates_lazily() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut pool = ctx.create_staging_pool(256);

    let staging = pool.acquire(ctx.handle());
    assert_eq!(pool.created_total(), 1);
    assert_eq!(staging.capacity(), 256);
    drop(staging);
}

#[test]
fn concurrent_acquires_get_distinct_buffers() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut pool = StagingPool::new(256, 4);

    let first = pool.acquire(ctx.handle());
    let second = pool.acquire(ctx.handle());
    assert_eq!(
        pool.created_total(),
        2,
        "A checked-out buffer must never be handed out twice"
    );
    drop(first);
    drop(second);
}

#[test]
fn unwritten_buffer_recycles_immediately() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut pool = StagingPool::new(256, 4);

    let staging = pool.acquire(ctx.handle());
    staging.recycle();
    assert_eq!(
        pool.available(),
        1,
        "A still-mapped buffer goes straight back to the pool"
    );

    let again = pool.acquire(ctx.handle());
    assert_eq!(pool.created_total(), 1, "Pooled buffer is reused");
    drop(again);
}

// ============================================================================
// Upload Cycle Tests (GPU required)
// ============================================================================

#[test]
fn full_cycle_copies_data_and_recycles() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let handle = ctx.handle();
    let mut pool = StagingPool::new(256, 4);

    let payload: Vec<u8> = (0..=255).collect();
    let dst = handle.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Dst"),
        size: 256,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut staging = pool.acquire(handle);
    staging.write(0, &payload);
    staging.finish_writes();

    let mut encoder = handle
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    staging.encode_copy(&mut encoder, &dst, 0, 256);
    handle.queue.submit(std::iter::once(encoder.finish()));
    staging.recycle();

    // Verify the destination got the bytes.
    let (tx, rx) = flume::bounded(1);
    dst.slice(..).map_async(wgpu::MapMode::Read, move |r| {
        let _ = tx.send(r);
    });
    wait_for_gpu(&ctx);
    rx.recv()
        .expect("map callback fired")
        .expect("readback map succeeded");
    {
        let data = dst.slice(..).get_mapped_range();
        assert_eq!(&data[..], &payload[..], "Copied bytes must round-trip");
    }
    dst.unmap();

    // The re-map requested by recycle() completed during the same poll.
    assert_eq!(pool.available(), 1, "Buffer returned after re-map confirmation");
    let again = pool.acquire(ctx.handle());
    assert_eq!(pool.created_total(), 1, "Recycled buffer is reused, not reallocated");
    drop(again);
}

#[test]
fn device_recovery_drops_pooled_buffers() {
    let Some(mut ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut pool = StagingPool::new(256, 4);

    let staging = pool.acquire(ctx.handle());
    staging.recycle();
    assert_eq!(pool.available(), 1);

    ctx.recover().expect("reacquisition on a healthy adapter");

    // The pooled buffer belongs to the previous device generation and must
    // not be handed out against the new one.
    let fresh = pool.acquire(ctx.handle());
    assert_eq!(pool.available(), 0, "Stale buffers dropped on device change");
    assert_eq!(
        pool.created_total(),
        2,
        "A fresh buffer is allocated for the new device"
    );
    drop(fresh);
}

#[test]
fn pool_cap_bounds_idle_buffers() {
    let Some(ctx) = create_context() else {
        eprintln!("Skipping: no GPU adapter available");
        return;
    };
    let mut pool = StagingPool::new(64, 1);

    let a = pool.acquire(ctx.handle());
    let b = pool.acquire(ctx.handle());
    let c = pool.acquire(ctx.handle());
    assert_eq!(pool.created_total(), 3);

    a.recycle();
    b.recycle();
    c.recycle();

    assert_eq!(
        pool.available(),
        1,
        "Buffers recycled past the cap are destroyed, not pooled"
    );
}
