// Transport - Playback control and state management
// Owns musical time, schedules note cues and tracks sounding pitches

use super::active_notes::ActiveNoteSet;
use super::schedule::plan_schedule;
use crate::instrument::{Cue, CueHandle, InstrumentError, InstrumentPort, WarmUp};
use crate::score::{DEFAULT_TEMPO_BPM, NoteModel};
use std::collections::HashMap;
use std::sync::Arc;

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 2.0;
pub const DEFAULT_SPEED: f64 = 1.0;

/// Transport status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportStatus {
    /// Nothing loaded
    #[default]
    Idle,
    /// A piece is loaded, playback not started since load or restart
    Loaded,
    /// Play requested, waiting for the instrument warm-up
    Starting,
    Playing,
    Paused,
    /// Reached the end of the piece
    Stopped,
}

impl TransportStatus {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportStatus::Playing)
    }

    /// Playing, or about to once the instrument is ready
    pub fn is_running(&self) -> bool {
        matches!(self, TransportStatus::Playing | TransportStatus::Starting)
    }

    pub fn can_play(&self) -> bool {
        matches!(
            self,
            TransportStatus::Loaded | TransportStatus::Paused | TransportStatus::Stopped
        )
    }
}

/// What a play request did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// Waiting for the instrument, `update` finishes the start
    Pending,
    AlreadyPlaying,
    /// Nothing to play
    Ignored,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Instrument error: {0}")]
    Instrument(#[from] InstrumentError),
}

/// A cue registered with the instrument and still owned by the transport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledEvent {
    pub cue: Cue,
    pub fires_at: f64,
    pub handle: CueHandle,
}

/// Snapshot for presentation consumers
#[derive(Debug, Clone, PartialEq)]
pub struct TransportFrame {
    pub position: f64,
    pub status: TransportStatus,
    pub active: Vec<u8>,
    /// Same pitches as a bit mask, bit n set for pitch n
    pub active_mask: u128,
}

/// Playback state machine
///
/// All operations run on one thread and never block. The instrument reports
/// due cues when polled by [`Transport::update`]; the transport applies them
/// and keeps the active-note set in step with every attack and release.
pub struct Transport<I: InstrumentPort> {
    instrument: I,
    model: Option<Arc<NoteModel>>,
    status: TransportStatus,
    /// Frozen position while not Playing
    position: f64,
    speed: f64,
    active: ActiveNoteSet,
    outstanding: HashMap<CueHandle, ScheduledEvent>,
    /// Status to fall back to when a pending start is abandoned
    resume_status: Option<TransportStatus>,
}

impl<I: InstrumentPort> Transport<I> {
    pub fn new(mut instrument: I) -> Self {
        instrument.set_rate(DEFAULT_SPEED);
        Self {
            instrument,
            model: None,
            status: TransportStatus::Idle,
            position: 0.0,
            speed: DEFAULT_SPEED,
            active: ActiveNoteSet::new(),
            outstanding: HashMap::new(),
            resume_status: None,
        }
    }

    /// Replace the current piece. Works from any status.
    pub fn load(&mut self, model: impl Into<Arc<NoteModel>>) {
        let model = model.into();
        self.halt();

        tracing::info!(
            name = model.name().unwrap_or("untitled"),
            notes = model.len(),
            duration = model.total_duration(),
            bpm = model.base_tempo(),
            "piece loaded"
        );

        self.model = Some(model);
        self.position = 0.0;
        self.status = TransportStatus::Loaded;
        self.resume_status = None;
        self.instrument.set_rate(self.speed);
    }

    /// Drop the current piece and go back to Idle
    pub fn eject(&mut self) {
        self.halt();
        self.model = None;
        self.position = 0.0;
        self.status = TransportStatus::Idle;
        self.resume_status = None;
    }

    /// Start or resume playback from the current position
    ///
    /// The first call warms the instrument up. If the instrument is not ready
    /// yet the status becomes Starting and [`Transport::update`] completes
    /// the start later. On error the status is left as it was.
    pub fn play(&mut self) -> Result<PlayOutcome, TransportError> {
        if self.status.is_running() {
            return Ok(PlayOutcome::AlreadyPlaying);
        }
        if self.model.is_none() || !self.status.can_play() {
            tracing::debug!(status = ?self.status, "play ignored, nothing loaded");
            return Ok(PlayOutcome::Ignored);
        }

        let previous = self.status;
        match self.instrument.warm_up() {
            Ok(WarmUp::Ready) => {
                self.begin_playback(previous);
                Ok(PlayOutcome::Started)
            }
            Ok(WarmUp::Pending) => {
                tracing::debug!("instrument warming up");
                self.resume_status = Some(previous);
                self.status = TransportStatus::Starting;
                Ok(PlayOutcome::Pending)
            }
            Err(e) => {
                tracing::warn!(error = %e, "instrument unavailable");
                Err(e.into())
            }
        }
    }

    /// Freeze playback at the current position, releasing every sounding note
    pub fn pause(&mut self) {
        match self.status {
            TransportStatus::Playing => {
                let at = self.instrument.stop();
                self.position = at.clamp(0.0, self.total_duration());
                self.cancel_schedule();
                self.release_active(at);
                self.instrument.release_all(at);
                self.status = TransportStatus::Paused;
                tracing::debug!(position = self.position, "paused");
            }
            TransportStatus::Starting => {
                self.status = self
                    .resume_status
                    .take()
                    .unwrap_or(TransportStatus::Loaded);
                tracing::debug!(status = ?self.status, "pending start abandoned");
            }
            _ => {}
        }
    }

    /// Play when paused or stopped, pause when playing. Returns the new status.
    pub fn toggle_play(&mut self) -> Result<TransportStatus, TransportError> {
        if self.status.is_running() {
            self.pause();
        } else {
            self.play()?;
        }
        Ok(self.status)
    }

    /// Move the playhead, clamped to the piece
    ///
    /// While Playing the schedule is rebuilt from the new position and notes
    /// spanning it are attacked right away.
    pub fn seek(&mut self, time: f64) {
        if !time.is_finite() {
            tracing::debug!(time, "seek ignored, not a finite time");
            return;
        }
        if self.model.is_none() {
            tracing::debug!("seek ignored, nothing loaded");
            return;
        }

        let target = time.clamp(0.0, self.total_duration());
        if self.status.is_playing() {
            let at = self.instrument.stop();
            self.cancel_schedule();
            self.release_active(at);
            self.position = target;
            self.build_schedule();
        } else {
            self.cancel_schedule();
            self.release_active(self.position);
            self.position = target;
        }
        tracing::debug!(position = target, "seek");
    }

    /// Change the playback rate, clamped to [0.5, 2.0]
    ///
    /// Position and schedule are kept; only time from now on runs at the new
    /// rate. Returns the speed in effect.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        if !speed.is_finite() {
            return self.speed;
        }
        self.speed = speed.clamp(MIN_SPEED, MAX_SPEED);
        self.instrument.set_rate(self.speed);
        self.speed
    }

    /// Back to the start at normal speed, without playing
    pub fn restart(&mut self) {
        self.halt();
        self.speed = DEFAULT_SPEED;
        self.instrument.set_rate(DEFAULT_SPEED);
        self.position = 0.0;
        self.resume_status = None;
        self.status = if self.model.is_some() {
            TransportStatus::Loaded
        } else {
            TransportStatus::Idle
        };
    }

    /// Drive the transport: finish a pending start, dispatch due cues
    ///
    /// Returns the number of cues applied.
    pub fn update(&mut self) -> Result<usize, TransportError> {
        if self.status == TransportStatus::Starting {
            match self.instrument.warm_up() {
                Ok(WarmUp::Ready) => {
                    let previous = self.resume_status.take().unwrap_or(TransportStatus::Loaded);
                    self.begin_playback(previous);
                }
                Ok(WarmUp::Pending) => return Ok(0),
                Err(e) => {
                    self.status = self.resume_status.take().unwrap_or(TransportStatus::Loaded);
                    tracing::warn!(error = %e, "instrument warm-up failed");
                    return Err(e.into());
                }
            }
        }

        if !self.status.is_playing() {
            return Ok(0);
        }

        let mut dispatched = 0;
        for (handle, cue) in self.instrument.take_due() {
            // Handles from a cancelled batch are not ours anymore
            let Some(event) = self.outstanding.remove(&handle) else {
                continue;
            };
            dispatched += 1;

            match cue {
                Cue::Attack { pitch } => {
                    self.instrument.attack(pitch, event.fires_at);
                    self.active.record_attack(pitch);
                }
                Cue::Release { pitch } => {
                    if self.active.is_active(pitch) {
                        self.active.record_release(pitch);
                        self.instrument.release(pitch, event.fires_at);
                    }
                }
                Cue::End => {
                    self.finish();
                    break;
                }
            }
        }

        Ok(dispatched)
    }

    /// Playhead position in seconds
    pub fn current_position(&self) -> f64 {
        if self.status.is_playing() {
            self.instrument.seconds()
        } else {
            self.position
        }
    }

    pub fn frame(&self) -> TransportFrame {
        TransportFrame {
            position: self.current_position(),
            status: self.status,
            active: self.active.pitches(),
            active_mask: self.active.mask(),
        }
    }

    /// Base tempo of the piece scaled by the speed
    pub fn effective_tempo(&self) -> f64 {
        let base = self
            .model
            .as_ref()
            .map_or(DEFAULT_TEMPO_BPM, |model| model.base_tempo());
        base * self.speed
    }

    pub fn status(&self) -> TransportStatus {
        self.status
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn model(&self) -> Option<&Arc<NoteModel>> {
        self.model.as_ref()
    }

    pub fn total_duration(&self) -> f64 {
        self.model.as_ref().map_or(0.0, |model| model.total_duration())
    }

    pub fn active_notes(&self) -> &ActiveNoteSet {
        &self.active
    }

    /// Cues registered and not yet fired, in no particular order
    pub fn outstanding_cues(&self) -> impl Iterator<Item = &ScheduledEvent> + '_ {
        self.outstanding.values()
    }

    pub fn instrument(&self) -> &I {
        &self.instrument
    }

    pub fn instrument_mut(&mut self) -> &mut I {
        &mut self.instrument
    }

    fn begin_playback(&mut self, previous: TransportStatus) {
        if previous == TransportStatus::Stopped && self.position >= self.total_duration() {
            self.position = 0.0;
        }
        self.build_schedule();
        tracing::debug!(position = self.position, speed = self.speed, "playing");
    }

    /// Register the cues for playing from `self.position` and start the clock
    fn build_schedule(&mut self) {
        let Some(model) = self.model.clone() else {
            return;
        };
        self.cancel_schedule();

        let from = self.position;
        let plan = plan_schedule(&model, from);
        tracing::debug!(
            from,
            cues = plan.cues.len(),
            immediate = plan.immediate.len(),
            end = ?plan.end_time(),
            "schedule built"
        );

        self.instrument.set_rate(self.speed);
        self.instrument.start(from);

        for pitch in plan.immediate {
            self.instrument.attack(pitch, from);
            self.active.record_attack(pitch);
        }
        for planned in plan.cues {
            let handle = self.instrument.schedule(planned.cue, planned.fires_at);
            self.outstanding.insert(
                handle,
                ScheduledEvent {
                    cue: planned.cue,
                    fires_at: planned.fires_at,
                    handle,
                },
            );
        }

        self.status = TransportStatus::Playing;
    }

    /// Natural end of the piece
    fn finish(&mut self) {
        let at = self.instrument.stop();
        self.cancel_schedule();
        self.release_active(at);
        self.position = self.total_duration();
        self.status = TransportStatus::Stopped;
        tracing::info!("playback finished");
    }

    /// Stop the clock, drop the schedule and silence everything tracked
    fn halt(&mut self) {
        let at = if self.status.is_playing() {
            self.instrument.stop()
        } else {
            self.position
        };
        self.cancel_schedule();
        self.release_active(at);
    }

    fn cancel_schedule(&mut self) {
        self.instrument.cancel_all();
        self.outstanding.clear();
    }

    /// Release every tracked pitch once per outstanding attack, then clear
    fn release_active(&mut self, at: f64) {
        for pitch in self.active.pitches() {
            for _ in 0..self.active.count(pitch) {
                self.instrument.release(pitch, at);
            }
        }
        self.active.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{InstrumentCall, VirtualInstrument};
    use crate::score::RawNote;

    fn model(notes: &[(u8, f64, f64)]) -> NoteModel {
        let raw: Vec<RawNote> = notes
            .iter()
            .map(|&(pitch, start, duration)| RawNote::new(pitch, start, duration))
            .collect();
        NoteModel::from_tracks(vec![raw], Some(100.0))
    }

    fn transport(notes: &[(u8, f64, f64)]) -> Transport<VirtualInstrument> {
        let mut transport = Transport::new(VirtualInstrument::new());
        transport.load(model(notes));
        transport
    }

    fn advance(transport: &mut Transport<VirtualInstrument>, seconds: f64) {
        transport.instrument_mut().advance(seconds);
        transport.update().unwrap();
    }

    #[test]
    fn test_status_helpers() {
        assert!(TransportStatus::Playing.is_playing());
        assert!(TransportStatus::Starting.is_running());
        assert!(!TransportStatus::Starting.is_playing());
        assert!(TransportStatus::Stopped.can_play());
        assert!(!TransportStatus::Idle.can_play());
        assert_eq!(TransportStatus::default(), TransportStatus::Idle);
    }

    #[test]
    fn test_load_sets_loaded() {
        let transport = transport(&[(60, 0.0, 1.0)]);

        assert_eq!(transport.status(), TransportStatus::Loaded);
        assert_eq!(transport.current_position(), 0.0);
        assert_eq!(transport.total_duration(), 1.0);
        assert_eq!(transport.effective_tempo(), 100.0);
    }

    #[test]
    fn test_play_without_model_is_ignored() {
        let mut transport = Transport::new(VirtualInstrument::new());

        assert_eq!(transport.play().unwrap(), PlayOutcome::Ignored);
        assert_eq!(transport.status(), TransportStatus::Idle);

        transport.seek(3.0);
        assert_eq!(transport.current_position(), 0.0);
    }

    #[test]
    fn test_play_twice_is_noop() {
        let mut transport = transport(&[(60, 0.0, 1.0)]);

        assert_eq!(transport.play().unwrap(), PlayOutcome::Started);
        let cues = transport.outstanding_cues().count();

        assert_eq!(transport.play().unwrap(), PlayOutcome::AlreadyPlaying);
        assert_eq!(transport.outstanding_cues().count(), cues);
    }

    #[test]
    fn test_pause_releases_and_sweeps() {
        let mut transport = transport(&[(60, 0.0, 2.0)]);
        transport.play().unwrap();
        advance(&mut transport, 1.0);
        assert_eq!(transport.active_notes().pitches(), vec![60]);

        transport.instrument_mut().clear_calls();
        transport.pause();

        assert_eq!(transport.status(), TransportStatus::Paused);
        assert_eq!(transport.current_position(), 1.0);
        assert!(transport.active_notes().is_empty());
        assert_eq!(transport.outstanding_cues().count(), 0);
        assert_eq!(
            transport.instrument().calls(),
            &[
                InstrumentCall::Release { pitch: 60, at: 1.0 },
                InstrumentCall::ReleaseAll { at: 1.0 },
            ]
        );
    }

    #[test]
    fn test_resume_reattacks_sounding_note() {
        let mut transport = transport(&[(60, 0.0, 2.0)]);
        transport.play().unwrap();
        advance(&mut transport, 1.0);
        transport.pause();

        transport.instrument_mut().advance(10.0);
        transport.instrument_mut().clear_calls();
        transport.play().unwrap();

        assert_eq!(transport.instrument().attacked(), vec![(60, 1.0)]);
        assert_eq!(transport.active_notes().pitches(), vec![60]);
    }

    #[test]
    fn test_speed_is_clamped_and_keeps_position() {
        let mut transport = transport(&[(60, 0.0, 10.0)]);
        transport.play().unwrap();
        advance(&mut transport, 2.0);

        assert_eq!(transport.set_speed(5.0), MAX_SPEED);
        advance(&mut transport, 1.0);
        assert_eq!(transport.current_position(), 4.0);

        assert_eq!(transport.set_speed(0.1), MIN_SPEED);
        assert_eq!(transport.set_speed(f64::NAN), MIN_SPEED);
        assert_eq!(transport.effective_tempo(), 50.0);
    }

    #[test]
    fn test_restart_resets_everything() {
        let mut transport = transport(&[(60, 0.0, 10.0)]);
        transport.set_speed(1.5);
        transport.play().unwrap();
        advance(&mut transport, 1.0);

        transport.restart();

        assert_eq!(transport.status(), TransportStatus::Loaded);
        assert_eq!(transport.speed(), DEFAULT_SPEED);
        assert_eq!(transport.current_position(), 0.0);
        assert!(transport.active_notes().is_empty());
        assert_eq!(transport.outstanding_cues().count(), 0);
        assert_eq!(transport.instrument().rate(), DEFAULT_SPEED);
    }

    #[test]
    fn test_seek_clamps_and_ignores_nan() {
        let mut transport = transport(&[(60, 0.0, 4.0)]);

        transport.seek(10.0);
        assert_eq!(transport.current_position(), 4.0);

        transport.seek(-1.0);
        assert_eq!(transport.current_position(), 0.0);

        transport.seek(f64::INFINITY);
        assert_eq!(transport.current_position(), 0.0);
        assert_eq!(transport.status(), TransportStatus::Loaded);
    }

    #[test]
    fn test_natural_end_parks_at_total_duration() {
        let mut transport = transport(&[(60, 0.0, 1.0)]);
        transport.play().unwrap();
        advance(&mut transport, 1.6);

        assert_eq!(transport.status(), TransportStatus::Stopped);
        assert_eq!(transport.current_position(), 1.0);
        assert!(transport.active_notes().is_empty());
        assert!(!transport.instrument().is_running());
    }

    #[test]
    fn test_play_after_end_rewinds() {
        let mut transport = transport(&[(60, 0.0, 1.0)]);
        transport.play().unwrap();
        advance(&mut transport, 2.0);
        assert_eq!(transport.status(), TransportStatus::Stopped);

        transport.play().unwrap();
        assert_eq!(transport.current_position(), 0.0);
        advance(&mut transport, 0.0);
        assert_eq!(transport.active_notes().pitches(), vec![60]);
    }

    #[test]
    fn test_pending_warm_up() {
        let mut transport = Transport::new(VirtualInstrument::new().with_warm_up_latency(1));
        transport.load(model(&[(60, 0.0, 1.0)]));

        assert_eq!(transport.play().unwrap(), PlayOutcome::Pending);
        assert_eq!(transport.status(), TransportStatus::Starting);
        assert_eq!(transport.current_position(), 0.0);

        transport.update().unwrap();
        assert_eq!(transport.status(), TransportStatus::Playing);
        assert_eq!(transport.instrument().allocations(), 1);
    }

    #[test]
    fn test_pause_while_starting_abandons_start() {
        let mut transport = Transport::new(VirtualInstrument::new().with_warm_up_latency(5));
        transport.load(model(&[(60, 0.0, 1.0)]));

        transport.play().unwrap();
        transport.pause();

        assert_eq!(transport.status(), TransportStatus::Loaded);
        transport.update().unwrap();
        assert_eq!(transport.status(), TransportStatus::Loaded);
    }

    #[test]
    fn test_warm_up_failure_leaves_status() {
        let mut transport =
            Transport::new(VirtualInstrument::new().with_warm_up_failure("no output device"));
        transport.load(model(&[(60, 0.0, 1.0)]));

        let result = transport.play();
        assert!(matches!(result, Err(TransportError::Instrument(_))));
        assert_eq!(transport.status(), TransportStatus::Loaded);

        transport.instrument_mut().clear_failure();
        assert_eq!(transport.play().unwrap(), PlayOutcome::Started);
    }

    #[test]
    fn test_toggle_play() {
        let mut transport = transport(&[(60, 0.0, 5.0)]);

        assert_eq!(transport.toggle_play().unwrap(), TransportStatus::Playing);
        assert_eq!(transport.toggle_play().unwrap(), TransportStatus::Paused);
        assert_eq!(transport.toggle_play().unwrap(), TransportStatus::Playing);
    }

    #[test]
    fn test_eject() {
        let mut transport = transport(&[(60, 0.0, 5.0)]);
        transport.play().unwrap();
        advance(&mut transport, 1.0);

        transport.eject();

        assert_eq!(transport.status(), TransportStatus::Idle);
        assert!(transport.model().is_none());
        assert!(transport.active_notes().is_empty());
        assert_eq!(transport.play().unwrap(), PlayOutcome::Ignored);
    }

    #[test]
    fn test_frame_snapshot() {
        let mut transport = transport(&[(60, 0.0, 2.0), (67, 0.0, 2.0)]);
        transport.play().unwrap();
        advance(&mut transport, 0.5);

        let frame = transport.frame();
        assert_eq!(frame.position, 0.5);
        assert_eq!(frame.status, TransportStatus::Playing);
        assert_eq!(frame.active, vec![60, 67]);
        assert_eq!(frame.active_mask, (1u128 << 60) | (1u128 << 67));
    }
}
