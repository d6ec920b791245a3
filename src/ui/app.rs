// Main player window

use super::falling_notes::{paint_falling_notes, visible_window};
use super::keyboard::paint_keyboard;
use crate::config::PlayerConfig;
use crate::instrument::SynthInstrument;
use crate::messaging::channels::{NotificationConsumer, NotificationProducer};
use crate::messaging::notification::{Notification, NotificationCategory, NotificationLevel};
use crate::score::load_file;
use crate::sequencer::{
    ClockPublisher, ClockReader, MAX_SPEED, MIN_SPEED, Transport, TransportStatus,
};
use eframe::egui;
use ringbuf::traits::{Consumer, Producer};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const KEYBOARD_HEIGHT: f32 = 120.0;
const MIDI_EXTENSIONS: [&str; 2] = ["mid", "midi"];

/// `m:ss` display of a time in seconds
pub fn format_time(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn is_midi_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MIDI_EXTENSIONS.iter().any(|m| ext.eq_ignore_ascii_case(m)))
}

pub struct PlayerApp {
    transport: Transport<SynthInstrument>,
    publisher: ClockPublisher,
    clock: ClockReader,
    config: PlayerConfig,
    file_name: Option<String>,
    // Notification system
    notification_tx: Arc<Mutex<NotificationProducer>>,
    notification_rx: NotificationConsumer,
    notification_queue: VecDeque<Notification>,
    max_notifications: usize,
}

impl PlayerApp {
    pub fn new(
        transport: Transport<SynthInstrument>,
        config: PlayerConfig,
        notification_tx: Arc<Mutex<NotificationProducer>>,
        notification_rx: NotificationConsumer,
    ) -> Self {
        let publisher = ClockPublisher::new();
        let clock = publisher.reader();
        let file_name = transport
            .model()
            .and_then(|model| model.name().map(str::to_string));

        Self {
            transport,
            publisher,
            clock,
            config,
            file_name,
            notification_tx,
            notification_rx,
            notification_queue: VecDeque::new(),
            max_notifications: 10,
        }
    }

    fn notify(&self, notification: Notification) {
        if let Ok(mut tx) = self.notification_tx.try_lock() {
            let _ = tx.try_push(notification);
        }
    }

    /// Read new notifications from the ring buffer into the queue
    fn update_notifications(&mut self) {
        while let Some(notification) = self.notification_rx.try_pop() {
            self.notification_queue.push_back(notification);
            if self.notification_queue.len() > self.max_notifications {
                self.notification_queue.pop_front();
            }
        }
    }

    /// Up to three notifications younger than 5 seconds, newest first
    fn recent_notifications(&self) -> Vec<&Notification> {
        self.notification_queue
            .iter()
            .rev()
            .filter(|n| n.is_recent(5000))
            .take(3)
            .collect()
    }

    fn open_file_dialog(&mut self) {
        let mut dialog = rfd::FileDialog::new().add_filter("MIDI", &MIDI_EXTENSIONS);
        if let Some(dir) = &self.config.last_directory {
            dialog = dialog.set_directory(dir);
        }
        if let Some(path) = dialog.pick_file() {
            self.load_path(path);
        }
    }

    fn load_path(&mut self, path: PathBuf) {
        match load_file(&path) {
            Ok(model) => {
                self.file_name = model.name().map(str::to_string);
                self.transport.load(model);
                self.config.last_directory = path.parent().map(Path::to_path_buf);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not load file");
                self.notify(Notification::error(
                    NotificationCategory::File,
                    format!("Could not load {}: {}", path.display(), e),
                ));
            }
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .collect()
        });

        for path in dropped {
            if is_midi_file(&path) {
                self.load_path(path);
                break;
            }
            self.notify(Notification::warning(
                NotificationCategory::File,
                format!("Not a MIDI file: {}", path.display()),
            ));
        }
    }

    fn toggle_play(&mut self) {
        if let Err(e) = self.transport.toggle_play() {
            self.notify(Notification::error(
                NotificationCategory::Audio,
                e.to_string(),
            ));
        }
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("Open MIDI…").clicked() {
                self.open_file_dialog();
            }

            ui.label(self.file_name.as_deref().unwrap_or("Drop a .mid file here"));

            ui.separator();

            let has_model = self.transport.model().is_some();
            let play_label = match self.transport.status() {
                TransportStatus::Playing => "⏸ Pause",
                TransportStatus::Starting => "⏳ Starting",
                _ => "▶ Play",
            };
            if ui
                .add_enabled(has_model, egui::Button::new(play_label))
                .clicked()
            {
                self.toggle_play();
            }
            if ui
                .add_enabled(has_model, egui::Button::new("⏮ Restart"))
                .clicked()
            {
                self.transport.restart();
            }

            ui.separator();

            let mut speed = self.transport.speed();
            ui.label("Speed:");
            let speed_slider = egui::Slider::new(&mut speed, MIN_SPEED..=MAX_SPEED)
                .step_by(0.01)
                .custom_formatter(|v, _| format!("{:.2}x", v));
            if ui.add(speed_slider).changed() {
                self.transport.set_speed(speed);
            }
            ui.label(format!("{:.0} BPM", self.transport.effective_tempo()));

            ui.separator();

            let mut volume = self.transport.instrument().volume();
            ui.label("Volume:");
            if ui.add(egui::Slider::new(&mut volume, 0.0..=1.0)).changed() {
                self.transport.instrument_mut().set_volume(volume);
                self.config.master_volume = volume;
            }
        });

        let total = self.transport.total_duration();
        let mut position = self.clock.position().clamp(0.0, total);
        ui.horizontal(|ui| {
            ui.label(format_time(position));
            ui.spacing_mut().slider_width = (ui.available_width() - 50.0).max(50.0);
            let seek_slider = egui::Slider::new(&mut position, 0.0..=total.max(0.01))
                .show_value(false);
            if ui
                .add_enabled(self.transport.model().is_some(), seek_slider)
                .changed()
            {
                self.transport.seek(position);
            }
            ui.label(format_time(total));
        });
    }

    /// Status bar with recent notifications
    fn draw_status_bar(&self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            let recent = self.recent_notifications();

            if recent.is_empty() {
                ui.label("Ready");
                return;
            }
            for notification in recent {
                let (icon, color) = match notification.level {
                    NotificationLevel::Info => ("ℹ", egui::Color32::from_rgb(100, 150, 255)),
                    NotificationLevel::Warning => ("⚠", egui::Color32::from_rgb(255, 165, 0)),
                    NotificationLevel::Error => ("✖", egui::Color32::RED),
                };
                ui.colored_label(color, icon);
                ui.colored_label(color, &notification.message);
                ui.add_space(10.0);
            }
        });
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_notifications();
        self.handle_dropped_files(ctx);

        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.toggle_play();
        }

        if let Err(e) = self.transport.update() {
            self.notify(Notification::error(
                NotificationCategory::Audio,
                e.to_string(),
            ));
        }

        // Publisher drives repaints while playing, otherwise keep the frozen frame current
        if self.publisher.follow(&self.transport) {
            ctx.request_repaint();
        } else {
            self.publisher.publish(&self.transport);
        }
        if self.transport.status() == TransportStatus::Starting {
            ctx.request_repaint();
        }

        if let Some(rect) = ctx.input(|i| i.viewport().inner_rect) {
            self.config.window_width = rect.width();
            self.config.window_height = rect.height();
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.add_space(4.0);
            self.draw_controls(ui);
            ui.add_space(4.0);
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            self.draw_status_bar(ui);
        });

        egui::TopBottomPanel::bottom("keyboard")
            .exact_height(KEYBOARD_HEIGHT)
            .show(ctx, |ui| {
                let (response, painter) =
                    ui.allocate_painter(ui.available_size(), egui::Sense::hover());
                let clock = &self.clock;
                paint_keyboard(&painter, response.rect, |pitch| clock.is_active(pitch));
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            let (response, painter) =
                ui.allocate_painter(ui.available_size(), egui::Sense::hover());
            let rect = response.rect;

            match self.transport.model() {
                Some(model) => {
                    let window = visible_window(
                        self.config.falling_window_seconds,
                        self.transport.speed(),
                        rect.width(),
                    );
                    paint_falling_notes(&painter, rect, model, self.clock.position(), window);
                }
                None => {
                    painter.rect_filled(rect, 0.0, egui::Color32::from_rgb(227, 232, 240));
                    painter.text(
                        rect.center(),
                        egui::Align2::CENTER_CENTER,
                        "Open or drop a MIDI file to start",
                        egui::FontId::proportional(18.0),
                        egui::Color32::from_gray(90),
                    );
                }
            }
        });
    }
}

impl Drop for PlayerApp {
    fn drop(&mut self) {
        self.transport.pause();
        self.config.save();
    }
}
