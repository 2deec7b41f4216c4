//! GPU Pass Timing
//!
//! [`GpuTimer`] wraps a 2-slot timestamp query set and drives it through a
//! strict state cycle:
//!
//! ```text
//! Free → NeedResolve → WaitForResult → Free
//! ```
//!
//! Beginning a pass attaches begin/end timestamp writes and moves to
//! `NeedResolve`; after the pass ends the caller encodes the resolve
//! explicitly via [`resolve`](GpuTimer::resolve) (an explicit step rather
//! than a hook patched onto the pass's end), and [`read_elapsed`]
//! (GpuTimer::read_elapsed) maps the result back. Calling any method out of
//! order is a programming error and asserts.
//!
//! On devices without [`wgpu::Features::TIMESTAMP_QUERY`] every entry point
//! degrades gracefully: passes begin untimed and reads return `0`.

use crate::context::DeviceHandle;

const QUERY_COUNT: u32 = 2;
const RESULT_BYTES: u64 = (QUERY_COUNT as u64) * 8;

/// Phase of the query/resolve/read cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TimerState {
    /// Ready to time a pass.
    Free,
    /// A timed pass was begun; the query set awaits resolution.
    NeedResolve,
    /// Resolution was encoded; the result buffer awaits readback.
    WaitForResult,
}

struct QueryResources {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
}

impl QueryResources {
    fn new(device: &wgpu::Device) -> Self {
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("Timing Query Set"),
            ty: wgpu::QueryType::Timestamp,
            count: QUERY_COUNT,
        });
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timing Resolve Buffer"),
            size: RESULT_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Self {
            query_set,
            resolve_buffer,
        }
    }
}

/// Async GPU-time measurement for render and compute passes.
pub struct GpuTimer {
    supported: bool,
    state: TimerState,
    queries: Option<QueryResources>,
    pending: Option<wgpu::Buffer>,
    /// Result buffers confirmed free for reuse.
    free: Vec<wgpu::Buffer>,
    max_free: usize,
    epoch: u64,
}

impl GpuTimer {
    /// Builds a timer for the given device, retaining at most `max_free`
    /// idle result buffers.
    #[must_use]
    pub fn new(handle: &DeviceHandle, max_free: usize) -> Self {
        let supported = handle.features.contains(wgpu::Features::TIMESTAMP_QUERY);
        let queries = supported.then(|| QueryResources::new(&handle.device));
        Self {
            supported,
            state: TimerState::Free,
            queries,
            pending: None,
            free: Vec::new(),
            max_free,
            epoch: handle.epoch(),
        }
    }

    /// Query resources belong to one device generation; rebuild them (and
    /// drop every pooled result buffer) when the handle was replaced.
    fn ensure_epoch(&mut self, handle: &DeviceHandle) {
        if self.epoch != handle.epoch() {
            log::debug!("Timer reset: device epoch {} -> {}", self.epoch, handle.epoch());
            self.supported = handle.features.contains(wgpu::Features::TIMESTAMP_QUERY);
            self.queries = self.supported.then(|| QueryResources::new(&handle.device));
            self.pending = None;
            self.free.clear();
            self.state = TimerState::Free;
            self.epoch = handle.epoch();
        }
    }

    /// Begins a render pass with begin/end timestamp writes attached.
    ///
    /// Falls back to a plain pass when timestamps are unsupported or the
    /// device is lost.
    ///
    /// # Panics
    ///
    /// Asserts the timer is in the `Free` state.
    pub fn begin_render_pass<'encoder>(
        &mut self,
        handle: &DeviceHandle,
        encoder: &'encoder mut wgpu::CommandEncoder,
        desc: &wgpu::RenderPassDescriptor<'_>,
    ) -> wgpu::RenderPass<'encoder> {
        self.ensure_epoch(handle);
        match &self.queries {
            Some(q) if !handle.is_lost() => {
                assert_eq!(
                    self.state,
                    TimerState::Free,
                    "begin_render_pass requires a Free timer"
                );
                let mut timed = desc.clone();
                timed.timestamp_writes = Some(wgpu::RenderPassTimestampWrites {
                    query_set: &q.query_set,
                    beginning_of_pass_write_index: Some(0),
                    end_of_pass_write_index: Some(1),
                });
                self.state = TimerState::NeedResolve;
                encoder.begin_render_pass(&timed)
            }
            _ => encoder.begin_render_pass(desc),
        }
    }

    /// Begins a compute pass with begin/end timestamp writes attached.
    ///
    /// # Panics
    ///
    /// Asserts the timer is in the `Free` state.
    pub fn begin_compute_pass<'encoder>(
        &mut self,
        handle: &DeviceHandle,
        encoder: &'encoder mut wgpu::CommandEncoder,
        desc: &wgpu::ComputePassDescriptor<'_>,
    ) -> wgpu::ComputePass<'encoder> {
        self.ensure_epoch(handle);
        match &self.queries {
            Some(q) if !handle.is_lost() => {
                assert_eq!(
                    self.state,
                    TimerState::Free,
                    "begin_compute_pass requires a Free timer"
                );
                let mut timed = desc.clone();
                timed.timestamp_writes = Some(wgpu::ComputePassTimestampWrites {
                    query_set: &q.query_set,
                    beginning_of_pass_write_index: Some(0),
                    end_of_pass_write_index: Some(1),
                });
                self.state = TimerState::NeedResolve;
                encoder.begin_compute_pass(&timed)
            }
            _ => encoder.begin_compute_pass(desc),
        }
    }

    /// Encodes query resolution into `encoder` after the timed pass ended.
    ///
    /// No-op when timestamps are unsupported or the device was replaced
    /// since the pass began.
    ///
    /// # Panics
    ///
    /// Asserts the timer is in the `NeedResolve` state.
    pub fn resolve(&mut self, handle: &DeviceHandle, encoder: &mut wgpu::CommandEncoder) {
        if self.epoch != handle.epoch() {
            // The timed pass belonged to the previous device generation;
            // its query set cannot be resolved into this encoder.
            self.ensure_epoch(handle);
            return;
        }
        let Some(q) = &self.queries else { return };
        assert_eq!(
            self.state,
            TimerState::NeedResolve,
            "resolve requires a timed pass to have begun"
        );

        let result_buffer = self.free.pop().unwrap_or_else(|| {
            handle.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Timing Result Buffer"),
                size: RESULT_BYTES,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        });

        encoder.resolve_query_set(&q.query_set, 0..QUERY_COUNT, &q.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(&q.resolve_buffer, 0, &result_buffer, 0, RESULT_BYTES);
        self.pending = Some(result_buffer);
        self.state = TimerState::WaitForResult;
    }

    /// Maps the result buffer and returns `end − begin` in timestamp ticks.
    ///
    /// Returns `0` immediately, without state checks, when timestamps are
    /// unsupported, the device is lost, or the device was replaced since the
    /// cycle began (the pending buffer belongs to the dead device and its
    /// map callback would never fire). Blocks on the buffer map otherwise.
    ///
    /// # Panics
    ///
    /// Asserts the timer is in the `WaitForResult` state.
    pub fn read_elapsed(&mut self, handle: &DeviceHandle) -> u64 {
        if self.epoch != handle.epoch() {
            self.ensure_epoch(handle);
            return 0;
        }
        if !self.supported || handle.is_lost() {
            return 0;
        }
        assert_eq!(
            self.state,
            TimerState::WaitForResult,
            "read_elapsed requires a resolved query"
        );
        let Some(buffer) = self.pending.take() else {
            // WaitForResult implies a pending buffer.
            self.state = TimerState::Free;
            return 0;
        };

        let (tx, rx) = flume::bounded(1);
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = handle.device.poll(wgpu::PollType::wait_indefinitely());

        let elapsed = match rx.recv() {
            Ok(Ok(())) => {
                let elapsed = {
                    let data = buffer.slice(..).get_mapped_range();
                    let timestamps: &[u64] = bytemuck::cast_slice(&data[..]);
                    timestamps[1].saturating_sub(timestamps[0])
                };
                buffer.unmap();
                if self.free.len() < self.max_free {
                    self.free.push(buffer);
                } else {
                    buffer.destroy();
                }
                elapsed
            }
            _ => {
                log::warn!("Timing result map failed; discarding buffer");
                buffer.destroy();
                0
            }
        };

        self.state = TimerState::Free;
        elapsed
    }

    /// Whether the device supports timestamp queries.
    #[inline]
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// Current phase of the query cycle.
    #[inline]
    #[must_use]
    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Number of idle result buffers currently pooled.
    #[must_use]
    pub fn pooled_result_buffers(&self) -> usize {
        self.free.len()
    }
}
