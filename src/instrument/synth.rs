// Synth instrument - Plays the transport through the audio engine
// Clock driven by std::time::Instant, notes sent to the audio thread as commands

use super::{Cue, CueHandle, CueQueue, InstrumentError, InstrumentPort, TransportClock, WarmUp};
use crate::audio::engine::{AudioEngine, EngineSettings};
use crate::messaging::channels::{
    COMMAND_RINGBUFFER_CAPACITY, CommandProducer, NotificationProducer, create_command_channel,
};
use crate::messaging::command::Command;
use ringbuf::traits::Producer;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Velocity of every played note, the note model carries none
const NOTE_VELOCITY: u8 = 96;

pub struct SynthInstrument {
    settings: EngineSettings,
    notification_tx: Arc<Mutex<NotificationProducer>>,
    /// Created by the first successful warm-up
    engine: Option<AudioEngine>,
    command_tx: Option<CommandProducer>,

    epoch: Instant,
    clock: TransportClock,
    cues: CueQueue,
}

impl SynthInstrument {
    pub fn new(
        settings: EngineSettings,
        notification_tx: Arc<Mutex<NotificationProducer>>,
    ) -> Self {
        Self {
            settings,
            notification_tx,
            engine: None,
            command_tx: None,
            epoch: Instant::now(),
            clock: TransportClock::new(),
            cues: CueQueue::new(),
        }
    }

    fn wall(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    fn send(&mut self, command: Command) {
        match self.command_tx.as_mut() {
            Some(tx) => {
                if tx.try_push(command).is_err() {
                    tracing::warn!(?command, "audio command queue full, dropping command");
                }
            }
            None => tracing::debug!(?command, "audio output not started, dropping command"),
        }
    }

    /// Master volume, kept for the next warm-up and sent to a running engine
    pub fn set_volume(&mut self, volume: f32) {
        self.settings.volume = volume.clamp(0.0, 1.0);
        if self.command_tx.is_some() {
            self.send(Command::SetVolume(self.settings.volume));
        }
    }

    pub fn volume(&self) -> f32 {
        self.settings.volume
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }
}

impl InstrumentPort for SynthInstrument {
    fn warm_up(&mut self) -> Result<WarmUp, InstrumentError> {
        if self.engine.is_some() {
            return Ok(WarmUp::Ready);
        }

        let (command_tx, command_rx) = create_command_channel(COMMAND_RINGBUFFER_CAPACITY);
        let engine = AudioEngine::new(command_rx, self.notification_tx.clone(), self.settings)?;

        tracing::info!(sample_rate = engine.sample_rate(), "synth instrument ready");
        self.engine = Some(engine);
        self.command_tx = Some(command_tx);
        Ok(WarmUp::Ready)
    }

    fn attack(&mut self, pitch: u8, _at: f64) {
        self.send(Command::NoteOn {
            pitch,
            velocity: NOTE_VELOCITY,
        });
    }

    fn release(&mut self, pitch: u8, _at: f64) {
        self.send(Command::NoteOff { pitch });
    }

    fn release_all(&mut self, _at: f64) {
        self.send(Command::AllNotesOff);
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
        let now = self.wall();
        self.clock.set_rate(rate, now);
    }

    fn start(&mut self, from: f64) {
        let now = self.wall();
        self.clock.start(from, now);
    }

    fn stop(&mut self) -> f64 {
        let now = self.wall();
        self.clock.stop(now)
    }

    fn seconds(&self) -> f64 {
        self.clock.position(self.wall())
    }

    fn take_due(&mut self) -> Vec<(CueHandle, Cue)> {
        let now = self.seconds();
        self.cues.take_due(now)
    }
}
