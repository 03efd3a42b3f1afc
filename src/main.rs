mod app;
mod broker;
mod config;
mod constants;
mod error;
mod ui;
mod util;
mod window;

use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use anyhow::{bail, Context};
use clap::Parser;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::app::{App, LinkState, Renderer};
use crate::broker::BrokerEvent;
use crate::config::{Config, Overrides};
use crate::constants::{DEFAULT_LOG_FILE, TICK_RATE_MS};
use crate::ui::LogRenderer;
use crate::window::SampleWindow;

#[derive(Parser)]
#[command(name = "room-monitor")]
#[command(version)]
#[command(about = "Live light and presence chart for an MQTT-connected room", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Broker host name
    #[arg(long)]
    host: Option<String>,

    /// Broker port
    #[arg(long, short)]
    port: Option<u16>,

    /// MQTT client identifier
    #[arg(long)]
    client_id: Option<String>,

    /// Topic carrying light level readings
    #[arg(long)]
    light_topic: Option<String>,

    /// Topic carrying presence readings
    #[arg(long)]
    presence_topic: Option<String>,

    /// Number of samples kept in the chart
    #[arg(long)]
    capacity: Option<usize>,

    /// Log readings instead of drawing the terminal chart
    #[arg(long)]
    headless: bool,

    /// Write logs to this file. The chart owns the terminal, so without
    /// --headless logs go to room-monitor.log in the temp directory by default
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            light_topic: self.light_topic.clone(),
            presence_topic: self.presence_topic.clone(),
            capacity: self.capacity,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.headless, cli.log_file.as_deref())?;

    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };
    config.apply(cli.overrides());
    config.validate()?;

    let endpoint = format!("{}:{}", config.broker.host, config.broker.port);
    let window = SampleWindow::with_capacity(config.topics.clone(), config.window.capacity);
    let (events, _session) =
        broker::spawn(&config.broker, &config.topics).context("starting MQTT session")?;

    if cli.headless {
        run_headless(window, events)
    } else {
        ui::run(window, events, &endpoint).context("terminal chart")
    }
}

#[derive(Debug, PartialEq)]
enum LogTarget {
    Stderr,
    File(PathBuf),
}

// stderr would scribble over the alternate screen, so the chart logs to a file
fn log_target(headless: bool, log_file: Option<&Path>) -> LogTarget {
    match log_file {
        Some(path) => LogTarget::File(path.to_path_buf()),
        None if headless => LogTarget::Stderr,
        None => LogTarget::File(std::env::temp_dir().join(DEFAULT_LOG_FILE)),
    }
}

fn init_logging(headless: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_target(headless, log_file) {
        LogTarget::File(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
            if !headless {
                eprintln!("Logging to {}", path.display());
            }
        }
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn run_headless(window: SampleWindow, events: Receiver<BrokerEvent>) -> anyhow::Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;

    headless_loop(App::new(window, LogRenderer), &events, &running)
}

fn headless_loop<R: Renderer>(
    mut app: App<R>,
    events: &Receiver<BrokerEvent>,
    running: &AtomicBool,
) -> anyhow::Result<()> {
    let tick_rate = Duration::from_millis(TICK_RATE_MS);

    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(tick_rate) {
            Ok(BrokerEvent::Closed) => {
                app.handle(BrokerEvent::Closed)?;
                break;
            }
            Ok(event) => app.handle(event)?,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Stopped after {} samples", app.window().len());
    if let LinkState::Failed(reason) = app.link() {
        bail!("broker connection failed: {reason}");
    }
    Ok(())
}
