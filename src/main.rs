use pianofall::config::PlayerConfig;
use pianofall::messaging::channels::{
    NOTIFICATION_RINGBUFFER_CAPACITY, NotificationConsumer, NotificationProducer,
    create_notification_channel,
};
use pianofall::ui::app::{PlayerApp, format_time};
use pianofall::{ClockPublisher, SynthInstrument, Transport, TransportStatus, load_file};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Display frame period used by the headless player
const FRAME_PERIOD: Duration = Duration::from_millis(16);

/// Frames between two progress lines in headless mode
const PROGRESS_EVERY: u64 = 60;

struct Args {
    file: Option<PathBuf>,
    headless: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        file: None,
        headless: false,
    };

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--headless" => args.headless = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            path if args.file.is_none() => args.file = Some(PathBuf::from(path)),
            extra => return Err(format!("unexpected argument {}", extra)),
        }
    }
    Ok(args)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("usage: pianofall [FILE] [--headless]");
            return ExitCode::FAILURE;
        }
    };

    let config = PlayerConfig::load_or_default();

    // Notification channel (for error handling)
    let (notification_tx, notification_rx) =
        create_notification_channel(NOTIFICATION_RINGBUFFER_CAPACITY);
    let notification_tx = Arc::new(Mutex::new(notification_tx));

    let mut transport = Transport::new(SynthInstrument::new(
        config.engine_settings(),
        notification_tx.clone(),
    ));

    if let Some(path) = &args.file {
        match load_file(path) {
            Ok(model) => transport.load(model),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "could not load file");
                if args.headless {
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    if args.headless {
        return match run_headless(transport) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "playback failed");
                ExitCode::FAILURE
            }
        };
    }

    run_window(transport, config, notification_tx, notification_rx)
}

/// Play the loaded piece to the end without a window
fn run_headless(mut transport: Transport<SynthInstrument>) -> Result<(), String> {
    if transport.model().is_none() {
        return Err("headless mode needs a MIDI file".to_string());
    }

    let mut publisher = ClockPublisher::new();
    let clock = publisher.reader();
    let total = transport.total_duration();

    transport.play().map_err(|e| e.to_string())?;
    tracing::info!(duration = %format_time(total), "headless playback started");

    let mut frame: u64 = 0;
    loop {
        transport.update().map_err(|e| e.to_string())?;
        publisher.follow(&transport);

        if transport.status() == TransportStatus::Stopped {
            break;
        }

        frame += 1;
        if frame % PROGRESS_EVERY == 0 {
            tracing::info!(
                position = %format_time(clock.position()),
                total = %format_time(total),
                active = ?clock.active_pitches(),
                "playing"
            );
        }
        std::thread::sleep(FRAME_PERIOD);
    }

    tracing::info!("headless playback finished");
    Ok(())
}

fn run_window(
    transport: Transport<SynthInstrument>,
    config: PlayerConfig,
    notification_tx: Arc<Mutex<NotificationProducer>>,
    notification_rx: NotificationConsumer,
) -> ExitCode {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window_width, config.window_height])
            .with_drag_and_drop(true)
            .with_title("Pianofall"),
        ..Default::default()
    };

    let result = eframe::run_native(
        "Pianofall",
        native_options,
        Box::new(move |_cc| {
            Ok(Box::new(PlayerApp::new(
                transport,
                config,
                notification_tx,
                notification_rx,
            )))
        }),
    );

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "window failed");
            ExitCode::FAILURE
        }
    }
}
