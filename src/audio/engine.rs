// Audio engine - CPAL output stream and real-time callback
//
// The device's preferred sample format is detected and the matching stream
// type is built (F32, I16 or U16). Rendering is done in f32 and converted
// when written to the device buffer, without allocation.
//
// Note commands arrive through a lock-free ring buffer. Stream errors are
// reported to the UI through the notification channel.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer};
use std::sync::{Arc, Mutex};

use crate::audio::dsp_utils::{OnePoleSmoother, flush_denormals_to_zero, soft_clip};
use crate::audio::parameters::AtomicF32;
use crate::messaging::channels::{CommandConsumer, NotificationProducer};
use crate::messaging::command::Command;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::synth::{AdsrParams, VoiceManager};

/// Volume smoothing time constant, avoids clicks on volume changes
const VOLUME_SMOOTHING_MS: f32 = 10.0;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No audio output device found")]
    NoDevice,

    #[error("Audio configuration error: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("Unsupported sample format: {0:?}. Supported formats: F32, I16, U16")]
    UnsupportedFormat(SampleFormat),

    #[error("Error in stream creation: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Error starting stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Sound settings applied when the engine starts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Master volume (0.0 to 1.0)
    pub volume: f32,
    /// Voice release time in seconds
    pub release_seconds: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            volume: 0.7,
            release_seconds: AdsrParams::default().release,
        }
    }
}

/// Real-time side of the engine: drains commands and renders voices
///
/// Lives inside the stream callback. No allocation, no I/O, no locks.
pub struct Renderer {
    voice_manager: VoiceManager,
    command_rx: CommandConsumer,
    volume: AtomicF32,
    volume_smoother: OnePoleSmoother,
}

impl Renderer {
    pub fn new(
        sample_rate: f32,
        command_rx: CommandConsumer,
        volume: AtomicF32,
        settings: EngineSettings,
    ) -> Self {
        let mut voice_manager = VoiceManager::new(sample_rate);
        voice_manager.set_adsr(AdsrParams::default().with_release(settings.release_seconds));

        Self {
            voice_manager,
            command_rx,
            volume_smoother: OnePoleSmoother::new(volume.get(), VOLUME_SMOOTHING_MS, sample_rate),
            volume,
        }
    }

    fn process_command(&mut self, command: Command) {
        match command {
            Command::NoteOn { pitch, velocity } => self.voice_manager.note_on(pitch, velocity),
            Command::NoteOff { pitch } => self.voice_manager.note_off(pitch),
            Command::AllNotesOff => self.voice_manager.all_notes_off(),
            Command::SetVolume(volume) => self.volume.set(volume.clamp(0.0, 1.0)),
        }
    }

    /// Apply every queued command
    pub fn drain_commands(&mut self) {
        while let Some(command) = self.command_rx.try_pop() {
            self.process_command(command);
        }
    }

    /// Next mono output sample
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let volume = self.volume_smoother.process(self.volume.get());
        let sample = flush_denormals_to_zero(self.voice_manager.next_sample());
        soft_clip(sample * volume)
    }

    /// Fill an interleaved buffer, the mono signal goes to every channel
    pub fn render<T>(&mut self, data: &mut [T], channels: usize)
    where
        T: SizedSample + FromSample<f32>,
    {
        self.drain_commands();

        for frame in data.chunks_mut(channels.max(1)) {
            let value = T::from_sample(self.next_sample());
            for channel_sample in frame.iter_mut() {
                *channel_sample = value;
            }
        }
    }

    pub fn active_voice_count(&self) -> usize {
        self.voice_manager.active_voice_count()
    }
}

pub struct AudioEngine {
    _device: Device,
    _stream: Stream,
    sample_rate: f32,
    channels: usize,
}

impl AudioEngine {
    pub fn new(
        command_rx: CommandConsumer,
        notification_tx: Arc<Mutex<NotificationProducer>>,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(EngineError::NoDevice)?;

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            "opening audio output"
        );

        let supported_config = device.default_output_config()?;
        let sample_format = supported_config.sample_format();
        tracing::debug!(config = ?supported_config, "audio config");

        let sample_rate = supported_config.sample_rate().0 as f32;
        let channels = supported_config.channels() as usize;
        let config: StreamConfig = supported_config.into();

        let volume = AtomicF32::new(settings.volume.clamp(0.0, 1.0));
        let renderer = Renderer::new(sample_rate, command_rx, volume, settings);
        let notification_tx_err = notification_tx.clone();

        let stream = match sample_format {
            SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config, channels, renderer, notification_tx_err)
            }
            SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config, channels, renderer, notification_tx_err)
            }
            SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config, channels, renderer, notification_tx_err)
            }
            other => return Err(EngineError::UnsupportedFormat(other)),
        }?;

        stream.play()?;

        tracing::info!(sample_rate, channels, "audio engine started");

        if let Ok(mut tx) = notification_tx.try_lock() {
            let notif = Notification::info(
                NotificationCategory::Audio,
                format!("Audio connected: {} Hz", sample_rate),
            );
            let _ = tx.try_push(notif);
        }

        Ok(Self {
            _device: device,
            _stream: stream,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Build an output stream for any sample type (f32, i16, u16)
    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        channels: usize,
        mut renderer: Renderer,
        notification_tx: Arc<Mutex<NotificationProducer>>,
    ) -> Result<Stream, EngineError>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                renderer.render(data, channels);
            },
            move |err| {
                // Runs outside the real-time callback, I/O is allowed here
                tracing::error!(error = %err, "audio stream error");

                if let Ok(mut tx) = notification_tx.try_lock() {
                    let notif = Notification::error(
                        NotificationCategory::Audio,
                        format!("Audio stream error: {}", err),
                    );
                    let _ = tx.try_push(notif);
                }
            },
            None,
        )?;

        Ok(stream)
    }
}
