// Virtual instrument - Simulated clock and call log, no audio output
// Used by tests and for headless verification of transport behaviour

use super::{
    Cue, CueHandle, CueQueue, InstrumentError, InstrumentPort, TransportClock, WarmUp,
};

/// A sound-producing call received by the virtual instrument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InstrumentCall {
    Attack { pitch: u8, at: f64 },
    Release { pitch: u8, at: f64 },
    ReleaseAll { at: f64 },
}

/// Instrument whose wall clock only moves when told to
#[derive(Debug, Default)]
pub struct VirtualInstrument {
    wall: f64,
    clock: TransportClock,
    cues: CueQueue,
    calls: Vec<InstrumentCall>,

    /// Number of warm-up polls answered with Pending before becoming ready
    warm_up_latency: u32,
    warm_up_failure: Option<String>,
    warming: bool,
    ready: bool,
    allocations: u32,
}

impl VirtualInstrument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Warm-up reports Pending for the first `polls` requests
    pub fn with_warm_up_latency(mut self, polls: u32) -> Self {
        self.warm_up_latency = polls;
        self
    }

    /// Every warm-up fails with this message until `clear_failure`
    pub fn with_warm_up_failure(mut self, message: impl Into<String>) -> Self {
        self.warm_up_failure = Some(message.into());
        self
    }

    pub fn clear_failure(&mut self) {
        self.warm_up_failure = None;
    }

    /// Move the simulated wall clock forward
    pub fn advance(&mut self, seconds: f64) {
        self.wall += seconds.max(0.0);
    }

    pub fn wall_time(&self) -> f64 {
        self.wall
    }

    pub fn calls(&self) -> &[InstrumentCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Pitches attacked so far, in call order
    pub fn attacked(&self) -> Vec<(u8, f64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                InstrumentCall::Attack { pitch, at } => Some((*pitch, *at)),
                _ => None,
            })
            .collect()
    }

    /// Pending cues with their fire times, in firing order
    pub fn pending(&self) -> Vec<(f64, Cue)> {
        self.cues.iter().collect()
    }

    pub fn rate(&self) -> f64 {
        self.clock.rate()
    }

    pub fn is_running(&self) -> bool {
        self.clock.is_running()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// How many times the output was brought up
    pub fn allocations(&self) -> u32 {
        self.allocations
    }
}

impl InstrumentPort for VirtualInstrument {
    fn warm_up(&mut self) -> Result<WarmUp, InstrumentError> {
        if self.ready {
            return Ok(WarmUp::Ready);
        }
        if let Some(message) = &self.warm_up_failure {
            return Err(InstrumentError::Unavailable(message.clone()));
        }

        if !self.warming {
            self.warming = true;
            self.allocations += 1;
        }

        if self.warm_up_latency > 0 {
            self.warm_up_latency -= 1;
            return Ok(WarmUp::Pending);
        }

        self.warming = false;
        self.ready = true;
        Ok(WarmUp::Ready)
    }

    fn attack(&mut self, pitch: u8, at: f64) {
        self.calls.push(InstrumentCall::Attack { pitch, at });
    }

    fn release(&mut self, pitch: u8, at: f64) {
        self.calls.push(InstrumentCall::Release { pitch, at });
    }

    fn release_all(&mut self, at: f64) {
        self.calls.push(InstrumentCall::ReleaseAll { at });
    }

    fn schedule(&mut self, cue: Cue, at: f64) -> CueHandle {
        self.cues.schedule(cue, at)
    }

    fn cancel(&mut self, handle: CueHandle) -> bool {
        self.cues.cancel(handle)
    }

    fn cancel_all(&mut self) {
        self.cues.clear();
    }

    fn set_rate(&mut self, rate: f64) {
        self.clock.set_rate(rate, self.wall);
    }

    fn start(&mut self, from: f64) {
        self.clock.start(from, self.wall);
    }

    fn stop(&mut self) -> f64 {
        self.clock.stop(self.wall)
    }

    fn seconds(&self) -> f64 {
        self.clock.position(self.wall)
    }

    fn take_due(&mut self) -> Vec<(CueHandle, Cue)> {
        let now = self.seconds();
        self.cues.take_due(now)
    }
}
