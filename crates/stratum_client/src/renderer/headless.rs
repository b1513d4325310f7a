use std::collections::VecDeque;
use std::mem;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use stratum_core::signal::{SignalPoint, Timeline};
use tracing::debug;

use super::RenderBackend;

const MIN_BUILD_LATENCY_FRAMES: u64 = 0;
const MAX_BUILD_LATENCY_FRAMES: u64 = 8;
const MIN_CLEANUP_THRESHOLD: usize = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeadlessSettings {
    /// Frames a submitted build stays in flight before it completes.
    #[serde(default = "default_build_latency_frames")]
    pub build_latency_frames: u64,
    /// Builds between opportunistic drains of the deferred-cleanup backlog.
    #[serde(default = "default_cleanup_threshold")]
    pub cleanup_threshold: usize,
}

impl Default for HeadlessSettings {
    fn default() -> Self {
        Self {
            build_latency_frames: default_build_latency_frames(),
            cleanup_threshold: default_cleanup_threshold(),
        }
    }
}

impl HeadlessSettings {
    pub fn sanitize(mut self) -> Self {
        self.build_latency_frames = self
            .build_latency_frames
            .clamp(MIN_BUILD_LATENCY_FRAMES, MAX_BUILD_LATENCY_FRAMES);
        self.cleanup_threshold = self.cleanup_threshold.max(MIN_CLEANUP_THRESHOLD);
        self
    }
}

fn default_build_latency_frames() -> u64 {
    2
}

fn default_cleanup_threshold() -> usize {
    1000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessStats {
    pub live_meshes: usize,
    pub live_bytes: u64,
    pub total_builds: u64,
    pub releases: u64,
    pub pending_cleanups: usize,
    pub freed_scratch_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct HeadlessMesh {
    pub id: u64,
    pub vertex_count: u32,
    pub index_count: u32,
    ready: SignalPoint,
}

#[derive(Debug, Clone, Copy)]
struct Allocation {
    bytes: u64,
}

/// Scratch memory that must outlive the build which used it.
#[derive(Debug)]
struct DeferredCleanup {
    ready: SignalPoint,
    scratch_bytes: u64,
}

/// Render backend without a device.
///
/// Builds land on a [`Timeline`] and complete `build_latency_frames` frames after
/// submission, so callers see the same not-yet-ready window a GPU backend would give.
pub struct HeadlessBackend {
    settings: HeadlessSettings,
    timeline: Timeline,
    frame_marks: Mutex<VecDeque<u64>>,
    next_id: AtomicU64,
    live: Mutex<FxHashMap<u64, Allocation>>,
    pending: Mutex<Vec<DeferredCleanup>>,
    builds_since_drain: AtomicUsize,
    total_builds: AtomicU64,
    releases: AtomicU64,
    freed_scratch_bytes: AtomicU64,
}

impl HeadlessBackend {
    pub fn new(settings: HeadlessSettings) -> Self {
        Self {
            settings: settings.sanitize(),
            timeline: Timeline::new(),
            frame_marks: Mutex::new(VecDeque::new()),
            next_id: AtomicU64::new(1),
            live: Mutex::new(FxHashMap::default()),
            pending: Mutex::new(Vec::new()),
            builds_since_drain: AtomicUsize::new(0),
            total_builds: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            freed_scratch_bytes: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &HeadlessSettings {
        &self.settings
    }

    /// Closes the current frame. Work submitted more than `build_latency_frames` frames
    /// ago is retired.
    pub fn end_frame(&self) {
        let mut marks = lock(&self.frame_marks);
        marks.push_back(self.timeline.submitted());
        while marks.len() as u64 > self.settings.build_latency_frames {
            match marks.pop_front() {
                Some(mark) => self.timeline.complete_through(mark),
                None => break,
            }
        }
    }

    /// Blocks until the device is idle, then drains every deferred cleanup.
    pub fn wait_idle(&self) {
        lock(&self.frame_marks).clear();
        self.timeline.complete_all();
        self.process_pending_cleanups();
    }

    /// Frees scratch of completed builds and keeps the rest. Returns the entries retained.
    pub fn process_pending_cleanups(&self) -> usize {
        let mut pending = lock(&self.pending);

        let mut retained = 0;
        for index in 0..pending.len() {
            if !pending[index].ready.is_signaled() {
                pending.swap(index, retained);
                retained += 1;
            }
        }

        let freed: u64 = pending
            .drain(retained..)
            .map(|entry| entry.scratch_bytes)
            .sum();
        if freed > 0 {
            self.freed_scratch_bytes.fetch_add(freed, Ordering::Relaxed);
        }
        retained
    }

    pub fn stats(&self) -> HeadlessStats {
        let live = lock(&self.live);
        HeadlessStats {
            live_meshes: live.len(),
            live_bytes: live.values().map(|allocation| allocation.bytes).sum(),
            total_builds: self.total_builds.load(Ordering::Relaxed),
            releases: self.releases.load(Ordering::Relaxed),
            pending_cleanups: lock(&self.pending).len(),
            freed_scratch_bytes: self.freed_scratch_bytes.load(Ordering::Relaxed),
        }
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(HeadlessSettings::default())
    }
}

impl RenderBackend for HeadlessBackend {
    type Handle = HeadlessMesh;

    fn build_mesh(&self, vertices: &[f32], indices: &[u32]) -> HeadlessMesh {
        assert!(
            vertices.len() % 6 == 0,
            "vertex stream of {} floats is not a whole number of vertices",
            vertices.len()
        );

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let bytes = (mem::size_of_val(vertices) + mem::size_of_val(indices)) as u64;
        lock(&self.live).insert(id, Allocation { bytes });

        let ready = self.timeline.submit();
        lock(&self.pending).push(DeferredCleanup {
            ready: ready.clone(),
            scratch_bytes: bytes,
        });
        self.total_builds.fetch_add(1, Ordering::Relaxed);

        let builds = self.builds_since_drain.fetch_add(1, Ordering::AcqRel) + 1;
        if builds >= self.settings.cleanup_threshold {
            self.builds_since_drain.store(0, Ordering::Release);
            let retained = self.process_pending_cleanups();
            debug!("Drained cleanup backlog after {builds} builds, {retained} still pending");
        }

        HeadlessMesh {
            id,
            vertex_count: (vertices.len() / 6) as u32,
            index_count: indices.len() as u32,
            ready,
        }
    }

    fn is_ready(&self, handle: &HeadlessMesh) -> bool {
        handle.ready.is_signaled()
    }

    fn release(&self, handle: HeadlessMesh) {
        // A frame still in flight may reference the mesh; wait for all of them.
        let last_frame = lock(&self.frame_marks).drain(..).last().unwrap_or(0);
        self.timeline
            .complete_through(last_frame.max(handle.ready.value()));

        if lock(&self.live).remove(&handle.id).is_some() {
            self.releases.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().expect("headless backend mutex poisoned")
}
