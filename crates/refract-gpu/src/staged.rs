// Staged uploads: host bytes go into a mappable staging buffer, then a
// device-side copy moves them into the destination buffer.
//
// At most one write per buffer is in flight. A new write while the previous one
// is still mapping supersedes it and releases its mapping; the old completion
// then discards its data. A new write that arrives after the previous completion
// has started filling waits for that copy to finish and is mapped right after it,
// so the newest write always reaches the destination last.

use std::ops::Range;
use std::sync::{mpsc, Arc};

use bytemuck::Pod;
use parking_lot::Mutex;
use refract_core::FieldPlacement;

use crate::error::UploadError;
use crate::GraphicsContext;

// ──────────────────────────────────────────────
// Shared state
// ──────────────────────────────────────────────

type Reply = mpsc::Sender<Result<WriteOutcome, UploadError>>;

/// One write that has not reached its mapping yet.
struct Request {
    generation: u64,
    offset: u64,
    data: Vec<u8>,
    reply: Reply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Waiting for the mapping of write `generation`.
    Mapping(u64),
    /// A completion owns the mapped range and is filling or copying.
    Writing,
}

struct Slot {
    next: u64,
    phase: Phase,
    /// Superseded mappings whose completion has not run yet.
    cancelling: usize,
    /// Newest write issued while another was writing.
    deferred: Option<Request>,
}

/// State shared between the issuing side and map completions. Every transition
/// happens under `slot`, and no backend call is made while holding it. `issuing`
/// orders the unmap and map requests of concurrent issuers; take it before `slot`.
pub struct StagedWriteState {
    issuing: Mutex<()>,
    slot: Mutex<Slot>,
}

impl Default for StagedWriteState {
    fn default() -> Self {
        Self {
            issuing: Mutex::new(()),
            slot: Mutex::new(Slot {
                next: 0,
                phase: Phase::Idle,
                cancelling: 0,
                deferred: None,
            }),
        }
    }
}

impl StagedWriteState {
    /// No write is mapping, writing or waiting.
    pub fn is_available(&self) -> bool {
        self.slot.lock().phase == Phase::Idle
    }

    /// A superseded mapping has not delivered its completion yet.
    pub fn is_cancelling(&self) -> bool {
        self.slot.lock().cancelling > 0
    }
}

/// Outcome of one write once its mapping completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The data reached the destination buffer.
    Applied,
    /// A later write replaced this one before it reached the destination.
    Superseded,
}

pub type MapCallback = Box<dyn FnOnce(Result<(), UploadError>) + Send + 'static>;

/// The device operations a staged write needs.
///
/// `unmap` while a mapping is pending must abort it; the aborted mapping's
/// callback may run before `unmap` returns or later. A successful mapping's
/// callback must not run inside `map_write` itself.
pub trait MapBackend: Send + Sync + 'static {
    fn capacity(&self) -> u64;
    fn map_write(&self, range: Range<u64>, done: MapCallback);
    /// Writes `bytes` at absolute `offset`, inside the currently mapped `mapped` range.
    fn fill(&self, mapped: Range<u64>, offset: u64, bytes: &[u8]);
    fn unmap(&self);
    fn copy_to_target(&self, offset: u64, len: u64);
}

// ──────────────────────────────────────────────
// wgpu backend
// ──────────────────────────────────────────────

pub struct WgpuStaging {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    staging: wgpu::Buffer,
    target: Arc<wgpu::Buffer>,
    label: String,
}

impl WgpuStaging {
    /// Staging buffer sized to `target`, which must allow `COPY_DST`.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        target: Arc<wgpu::Buffer>,
        label: &str,
    ) -> Self {
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{}:staging", label)),
            size: target.size(),
            usage: wgpu::BufferUsages::MAP_WRITE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        Self {
            device,
            queue,
            staging,
            target,
            label: label.to_string(),
        }
    }

    pub fn target(&self) -> &Arc<wgpu::Buffer> {
        &self.target
    }
}

impl MapBackend for WgpuStaging {
    fn capacity(&self) -> u64 {
        self.target.size()
    }

    fn map_write(&self, range: Range<u64>, done: MapCallback) {
        self.staging
            .slice(range)
            .map_async(wgpu::MapMode::Write, move |result| {
                done(result.map_err(|e| UploadError::MapFailed(e.to_string())))
            });
    }

    fn fill(&self, mapped: Range<u64>, offset: u64, bytes: &[u8]) {
        let start = (offset - mapped.start) as usize;
        let mut view = self.staging.slice(mapped).get_mapped_range_mut();
        view[start..start + bytes.len()].copy_from_slice(bytes);
    }

    fn unmap(&self) {
        self.staging.unmap();
    }

    fn copy_to_target(&self, offset: u64, len: u64) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&self.label),
            });
        encoder.copy_buffer_to_buffer(&self.staging, offset, &self.target, offset, len);
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

// ──────────────────────────────────────────────
// StagedBuffer
// ──────────────────────────────────────────────

pub struct StagedBuffer<B: MapBackend> {
    backend: Arc<B>,
    state: Arc<StagedWriteState>,
}

impl<B: MapBackend> StagedBuffer<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            state: Arc::new(StagedWriteState::default()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self) -> &StagedWriteState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state.is_available() && !self.state.is_cancelling()
    }

    /// Replaces the buffer contents from offset 0.
    pub fn write(&self, bytes: &[u8]) -> Result<PendingWrite, UploadError> {
        self.write_at(0, bytes)
    }

    /// Writes one uniform field's value at the offset the binder resolved for it.
    pub fn write_placed<T: Pod>(
        &self,
        placement: &FieldPlacement,
        value: &T,
    ) -> Result<PendingWrite, UploadError> {
        if !placement.is_uniform() {
            return Err(UploadError::NotInline(placement.name.clone()));
        }
        self.write_at(placement.offset, placed_bytes(placement, value)?)
    }

    pub fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<PendingWrite, UploadError> {
        let len = bytes.len() as u64;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
            return Err(UploadError::Misaligned { offset, len });
        }
        let capacity = self.backend.capacity();
        if offset.checked_add(len).map_or(true, |end| end > capacity) {
            return Err(UploadError::OutOfBounds {
                offset,
                len,
                capacity,
            });
        }

        let (reply, rx) = mpsc::channel();
        if len == 0 {
            let _ = reply.send(Ok(WriteOutcome::Applied));
            return Ok(PendingWrite { rx });
        }

        let _issuing = self.state.issuing.lock();
        let mut slot = self.state.slot.lock();
        slot.next += 1;
        let request = Request {
            generation: slot.next,
            offset,
            data: bytes.to_vec(),
            reply,
        };

        match slot.phase {
            Phase::Idle => {
                slot.phase = Phase::Mapping(request.generation);
                drop(slot);
            }
            Phase::Mapping(_) => {
                slot.phase = Phase::Mapping(request.generation);
                slot.cancelling += 1;
                drop(slot);
                log::warn!("staged write at {} supersedes a write still mapping", offset);
                self.backend.unmap();
            }
            Phase::Writing => {
                if let Some(replaced) = slot.deferred.replace(request) {
                    let _ = replaced.reply.send(Ok(WriteOutcome::Superseded));
                }
                log::debug!("staged write at {} waits for the copy in progress", offset);
                return Ok(PendingWrite { rx });
            }
        }

        issue(&self.backend, &self.state, request);
        Ok(PendingWrite { rx })
    }
}

impl StagedBuffer<WgpuStaging> {
    /// Allocates a destination buffer of `size` bytes plus its staging buffer.
    pub fn create(
        ctx: &GraphicsContext,
        size: u64,
        usage: wgpu::BufferUsages,
        label: &str,
    ) -> Self {
        let label = ctx.config.label(label);
        let target = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label),
            size: align_up(size, wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self::new(WgpuStaging::new(
            Arc::clone(&ctx.device),
            Arc::clone(&ctx.queue),
            Arc::new(target),
            &label,
        ))
    }

    pub fn target(&self) -> &Arc<wgpu::Buffer> {
        self.backend.target()
    }
}

fn issue<B: MapBackend>(backend: &Arc<B>, state: &Arc<StagedWriteState>, request: Request) {
    let end = request.offset + request.data.len() as u64;
    let mapped = align_down(request.offset, wgpu::MAP_ALIGNMENT)..end;
    let range = mapped.clone();
    let callback_backend = Arc::clone(backend);
    let callback_state = Arc::clone(state);
    backend.map_write(
        mapped,
        Box::new(move |result| {
            complete(&callback_backend, &callback_state, result, range, request)
        }),
    );
}

fn complete<B: MapBackend>(
    backend: &Arc<B>,
    state: &Arc<StagedWriteState>,
    result: Result<(), UploadError>,
    mapped: Range<u64>,
    request: Request,
) {
    let mut slot = state.slot.lock();
    if slot.phase != Phase::Mapping(request.generation) {
        // A later write took over; it already released this mapping.
        slot.cancelling = slot.cancelling.saturating_sub(1);
        drop(slot);
        let _ = request.reply.send(Ok(WriteOutcome::Superseded));
        return;
    }

    if let Err(e) = result {
        slot.phase = Phase::Idle;
        drop(slot);
        log::error!("staged write at {} failed: {}", request.offset, e);
        let _ = request.reply.send(Err(e));
        return;
    }

    // From here on this write owns the mapping; newer writes wait for it.
    slot.phase = Phase::Writing;
    drop(slot);

    backend.fill(mapped, request.offset, &request.data);
    backend.unmap();
    backend.copy_to_target(request.offset, request.data.len() as u64);
    let _ = request.reply.send(Ok(WriteOutcome::Applied));

    let _issuing = state.issuing.lock();
    let mut slot = state.slot.lock();
    match slot.deferred.take() {
        Some(next) => {
            slot.phase = Phase::Mapping(next.generation);
            drop(slot);
            issue(backend, state, next);
        }
        None => slot.phase = Phase::Idle,
    }
}

/// Host bytes of `value` for `placement`. A value smaller than the field fills
/// its leading bytes; a larger one means host and shader disagree.
pub(crate) fn placed_bytes<'a, T: Pod>(
    placement: &FieldPlacement,
    value: &'a T,
) -> Result<&'a [u8], UploadError> {
    let bytes = bytemuck::bytes_of(value);
    if bytes.len() as u64 > placement.size {
        return Err(UploadError::SizeMismatch {
            name: placement.name.clone(),
            field: placement.size,
            value: bytes.len() as u64,
        });
    }
    Ok(bytes)
}

fn align_down(value: u64, align: u64) -> u64 {
    value - value % align
}

pub(crate) fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

// ──────────────────────────────────────────────
// PendingWrite
// ──────────────────────────────────────────────

/// Completion handle of one staged write. Dropping it does not cancel the write.
pub struct PendingWrite {
    rx: mpsc::Receiver<Result<WriteOutcome, UploadError>>,
}

impl PendingWrite {
    /// The outcome, if the mapping has completed.
    pub fn try_outcome(&self) -> Option<Result<WriteOutcome, UploadError>> {
        self.rx.try_recv().ok()
    }

    /// Drives the device until this write's outcome is known. A write deferred
    /// behind a copy in progress is only mapped once that copy finishes, so this
    /// may take more than one poll.
    pub fn wait(self, device: &wgpu::Device) -> Result<WriteOutcome, UploadError> {
        loop {
            match self.rx.try_recv() {
                Ok(outcome) => return outcome,
                Err(mpsc::TryRecvError::Empty) => {
                    device.poll(wgpu::Maintain::Wait);
                }
                Err(mpsc::TryRecvError::Disconnected) => {
                    return Err(UploadError::MapFailed("completion was dropped".to_string()))
                }
            }
        }
    }
}
