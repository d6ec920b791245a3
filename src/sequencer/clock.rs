// Clock publisher - Per-frame sampling of the transport for renderers
// Overwrite semantics: readers always see the latest frame, never a queue

use super::transport::{Transport, TransportFrame, TransportStatus};
use crate::instrument::InstrumentPort;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};

/// Latest published frame, shared through atomics
#[derive(Debug, Default)]
pub struct SharedClock {
    position_bits: AtomicU64,
    active_lo: AtomicU64,
    active_hi: AtomicU64,
    status: AtomicU8,
    frames: AtomicU64,
    live_loops: AtomicUsize,
}

impl SharedClock {
    fn publish(&self, frame: &TransportFrame) {
        let mask = frame.active_mask;
        self.position_bits
            .store(frame.position.to_bits(), Ordering::Relaxed);
        self.active_lo.store(mask as u64, Ordering::Relaxed);
        self.active_hi.store((mask >> 64) as u64, Ordering::Relaxed);
        self.status
            .store(status_to_u8(frame.status), Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Release);
    }
}

fn status_to_u8(status: TransportStatus) -> u8 {
    match status {
        TransportStatus::Idle => 0,
        TransportStatus::Loaded => 1,
        TransportStatus::Starting => 2,
        TransportStatus::Playing => 3,
        TransportStatus::Paused => 4,
        TransportStatus::Stopped => 5,
    }
}

fn status_from_u8(value: u8) -> TransportStatus {
    match value {
        1 => TransportStatus::Loaded,
        2 => TransportStatus::Starting,
        3 => TransportStatus::Playing,
        4 => TransportStatus::Paused,
        5 => TransportStatus::Stopped,
        _ => TransportStatus::Idle,
    }
}

/// Read side handed to renderers. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct ClockReader {
    shared: Arc<SharedClock>,
}

impl ClockReader {
    pub fn position(&self) -> f64 {
        f64::from_bits(self.shared.position_bits.load(Ordering::Relaxed))
    }

    pub fn status(&self) -> TransportStatus {
        status_from_u8(self.shared.status.load(Ordering::Relaxed))
    }

    fn mask(&self) -> u128 {
        let lo = self.shared.active_lo.load(Ordering::Relaxed) as u128;
        let hi = self.shared.active_hi.load(Ordering::Relaxed) as u128;
        lo | (hi << 64)
    }

    pub fn is_active(&self, pitch: u8) -> bool {
        pitch < 128 && self.mask() & (1u128 << pitch) != 0
    }

    pub fn active_pitches(&self) -> Vec<u8> {
        let mask = self.mask();
        (0u8..128).filter(|pitch| mask & (1u128 << pitch) != 0).collect()
    }

    /// Number of frames published so far
    pub fn frames(&self) -> u64 {
        self.shared.frames.load(Ordering::Acquire)
    }
}

/// A running polling loop. Dropping it ends the loop.
#[derive(Debug)]
struct PollLoop {
    shared: Arc<SharedClock>,
}

impl PollLoop {
    fn new(shared: Arc<SharedClock>) -> Self {
        shared.live_loops.fetch_add(1, Ordering::AcqRel);
        Self { shared }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.shared.live_loops.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Samples the transport once per display frame while it plays
///
/// Cooperative: the owner calls [`ClockPublisher::tick`] from its frame
/// loop. At most one polling loop exists per publisher. When the transport
/// leaves Playing, one final frozen frame is published and polling stops.
#[derive(Debug)]
pub struct ClockPublisher {
    shared: Arc<SharedClock>,
    poll: Option<PollLoop>,
}

impl ClockPublisher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(SharedClock::default()),
            poll: None,
        }
    }

    pub fn reader(&self) -> ClockReader {
        ClockReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Begin polling. Returns false if a loop was already running.
    pub fn start(&mut self) -> bool {
        if self.poll.is_some() {
            return false;
        }
        self.poll = Some(PollLoop::new(Arc::clone(&self.shared)));
        tracing::trace!("clock polling started");
        true
    }

    pub fn stop(&mut self) {
        if self.poll.take().is_some() {
            tracing::trace!("clock polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.poll.is_some()
    }

    /// Polling loops alive across every publisher sharing this clock
    pub fn live_loops(&self) -> usize {
        self.shared.live_loops.load(Ordering::Acquire)
    }

    /// Publish a frame without touching the polling state
    pub fn publish<I: InstrumentPort>(&self, transport: &Transport<I>) {
        self.shared.publish(&transport.frame());
    }

    /// One display frame. Returns true while polling continues.
    pub fn tick<I: InstrumentPort>(&mut self, transport: &Transport<I>) -> bool {
        if !self.is_running() {
            return false;
        }

        self.publish(transport);
        if !transport.status().is_playing() {
            self.stop();
        }
        self.is_running()
    }

    /// Start polling when the transport plays, then tick
    ///
    /// Convenience for frame loops that do not track transitions themselves.
    pub fn follow<I: InstrumentPort>(&mut self, transport: &Transport<I>) -> bool {
        if transport.status().is_playing() {
            self.start();
        }
        self.tick(transport)
    }
}

impl Default for ClockPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ClockPublisher {
    fn drop(&mut self) {
        self.stop();
    }
}
