//! Staging Buffer Pool
//!
//! Recycles write-mapped staging buffers for large per-frame uploads (tens
//! of thousands of per-object transforms) without allocating or stalling on
//! a map every frame.
//!
//! A buffer alternates between exactly two phases:
//!
//! ```text
//! mapped-for-host-write (in pool) ──acquire/write/unmap/copy/submit──▶ in flight
//!        ▲                                                                │
//!        └──────────── async re-map confirmed (map_async) ───────────────┘
//! ```
//!
//! Only the confirmed-re-mapped callback path repopulates the pool, so a
//! buffer can never be handed out while a submitted command still
//! references it.
//!
//! # Memory strategy
//!
//! The free list is capped: buffers recycled while the pool is full are
//! destroyed instead of retained, so sustained load cannot grow the pool
//! without bound. A device change clears the free list on the next
//! [`StagingPool::acquire`].

use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::DeviceHandle;

type FreeList = Arc<Mutex<Vec<wgpu::Buffer>>>;

/// Pool of recycled write-mapped staging buffers of one fixed size.
pub struct StagingPool {
    slot_size: u64,
    max_free: usize,
    free: FreeList,
    last_epoch: Option<u64>,
    created: u64,
}

impl StagingPool {
    /// Creates a pool of `slot_size`-byte staging buffers, retaining at most
    /// `max_free` idle buffers.
    ///
    /// Size the slot to the maximum object count up front; every buffer in
    /// the pool shares it.
    #[must_use]
    pub fn new(slot_size: u64, max_free: usize) -> Self {
        Self {
            slot_size,
            max_free,
            free: Arc::new(Mutex::new(Vec::new())),
            last_epoch: None,
            created: 0,
        }
    }

    /// Pops an already re-mapped buffer, or allocates a new one mapped for
    /// write at creation.
    pub fn acquire(&mut self, handle: &DeviceHandle) -> StagingBuffer {
        if self.last_epoch != Some(handle.epoch()) {
            let mut free = self.free.lock();
            if !free.is_empty() {
                log::debug!("Staging pool invalidated, dropping {} buffer(s)", free.len());
            }
            free.clear();
            drop(free);
            self.last_epoch = Some(handle.epoch());
        }

        let buffer = self.free.lock().pop().unwrap_or_else(|| {
            self.created += 1;
            log::debug!(
                "Staging pool grows to {} buffer(s) of {} bytes",
                self.created,
                self.slot_size
            );
            handle.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Staging Buffer"),
                size: self.slot_size,
                usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: true,
            })
        });

        StagingBuffer {
            buffer,
            free: self.free.clone(),
            max_free: self.max_free,
            unmapped: false,
        }
    }

    /// Number of buffers currently idle in the pool.
    #[must_use]
    pub fn available(&self) -> usize {
        self.free.lock().len()
    }

    /// Total number of buffers ever allocated by this pool.
    #[inline]
    #[must_use]
    pub fn created_total(&self) -> u64 {
        self.created
    }

    /// Byte size of every buffer in this pool.
    #[inline]
    #[must_use]
    pub fn slot_size(&self) -> u64 {
        self.slot_size
    }
}

/// A staging buffer checked out of a [`StagingPool`], mapped for host write.
///
/// Usage contract, in order:
/// 1. [`write`](Self::write) host data into the mapped range,
/// 2. [`finish_writes`](Self::finish_writes) to unmap,
/// 3. [`encode_copy`](Self::encode_copy) into the persistent destination,
/// 4. submit the encoder, then [`recycle`](Self::recycle).
pub struct StagingBuffer {
    buffer: wgpu::Buffer,
    free: FreeList,
    max_free: usize,
    unmapped: bool,
}

impl StagingBuffer {
    /// Copies `bytes` into the mapped range at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if called after [`finish_writes`](Self::finish_writes) or if
    /// the range exceeds the buffer size; both are usage-contract
    /// violations.
    pub fn write(&mut self, offset: u64, bytes: &[u8]) {
        assert!(!self.unmapped, "staging buffer written after finish_writes");
        let end = offset + bytes.len() as u64;
        let mut range = self.buffer.slice(offset..end).get_mapped_range_mut();
        range.copy_from_slice(bytes);
    }

    /// Unmaps the buffer. Must precede [`encode_copy`](Self::encode_copy).
    pub fn finish_writes(&mut self) {
        if !self.unmapped {
            self.buffer.unmap();
            self.unmapped = true;
        }
    }

    /// Records a copy of `size` bytes from this buffer into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is still mapped.
    pub fn encode_copy(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        dst: &wgpu::Buffer,
        dst_offset: u64,
        size: u64,
    ) {
        assert!(
            self.unmapped,
            "staging buffer must be unmapped before encoding the copy"
        );
        encoder.copy_buffer_to_buffer(&self.buffer, 0, dst, dst_offset, size);
    }

    /// Requests the asynchronous re-map and, once it completes, returns the
    /// buffer to the pool.
    ///
    /// Call only after the copy command has been submitted. Until the re-map
    /// callback fires the buffer belongs to the GPU and is unavailable to
    /// [`StagingPool::acquire`].
    pub fn recycle(self) {
        let Self {
            buffer,
            free,
            max_free,
            unmapped,
        } = self;

        if !unmapped {
            // Never submitted; still host-mapped and immediately reusable.
            let mut pool = free.lock();
            if pool.len() < max_free {
                pool.push(buffer);
            } else {
                buffer.destroy();
            }
            return;
        }

        let retained = buffer.clone();
        buffer.slice(..).map_async(wgpu::MapMode::Write, move |result| {
            match result {
                Ok(()) => {
                    let mut pool = free.lock();
                    if pool.len() < max_free {
                        pool.push(retained);
                    } else {
                        log::debug!("Staging pool full, destroying recycled buffer");
                        retained.destroy();
                    }
                }
                Err(e) => {
                    // Mapping fails when the device is lost; the buffer is
                    // useless either way.
                    log::warn!("Staging buffer re-map failed: {e}");
                    retained.destroy();
                }
            }
        });
    }

    /// Byte capacity of this buffer.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.buffer.size()
    }
}
