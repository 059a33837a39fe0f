// src/main.rs
mod gui;

use anyhow::{Context, Result};
use blinkstick::drivers::{SimulatedBoard, SimulationConfig};
use blinkstick::{BlinkEngine, DetectorConfig, OpenBciSession};
use clap::Parser;
use eframe::egui;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(16);
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser, Debug)]
#[command(name = "blinkstick", version, about = "Blink-driven ball demo for OpenBCI headsets")]
struct Cli {
    /// Serial port of the OpenBCI dongle
    #[arg(long)]
    port: Option<String>,

    /// BrainFlow board id (2 = Cyton + Daisy)
    #[arg(long)]
    board_id: Option<i32>,

    /// Use the built-in simulated board instead of hardware
    #[arg(long)]
    simulate: bool,

    /// Let the simulated board blink on its own every few seconds
    #[arg(long, requires = "simulate")]
    auto_blink: bool,

    /// Detector configuration (JSON); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log blinks to the console instead of opening a window
    #[arg(long)]
    headless: bool,
}

fn load_config(cli: &Cli) -> Result<DetectorConfig> {
    let mut config = match &cli.config {
        Some(path) => DetectorConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => DetectorConfig::default(),
    };
    if let Some(port) = &cli.port {
        config.board.serial_port = port.clone();
    }
    if let Some(board_id) = cli.board_id {
        config.board.board_id = board_id;
    }
    config.validate()?;
    Ok(config)
}

/// Starts the engine; returns the simulated blink trigger when not on hardware.
fn start_engine(cli: &Cli, config: DetectorConfig) -> (BlinkEngine, Option<Arc<AtomicBool>>) {
    if cli.simulate {
        let sim = SimulationConfig {
            auto_blink_s: cli.auto_blink.then_some((2.0, 5.0)),
            ..SimulationConfig::default()
        };
        let board = SimulatedBoard::new(sim);
        let trigger = board.blink_trigger();
        info!("using simulated board");
        let engine = BlinkEngine::spawn(config, move || Ok(board));
        (engine, Some(trigger))
    } else {
        let board = config.board.clone();
        let engine = BlinkEngine::spawn(config, move || OpenBciSession::open(&board));
        (engine, None)
    }
}

fn run_headless(mut engine: BlinkEngine) -> Result<()> {
    let quit = Arc::new(AtomicBool::new(false));
    let handler_quit = quit.clone();
    ctrlc::set_handler(move || handler_quit.store(true, Ordering::SeqCst))
        .context("failed to install Ctrl-C handler")?;

    let mut blinks = 0usize;
    while !quit.load(Ordering::SeqCst) && engine.is_running() {
        if engine.poll_event() {
            blinks += 1;
            info!(
                "blink #{blinks} (peak={:.1}, thresh={:.1})",
                engine.peak(),
                engine.threshold()
            );
        }
        thread::sleep(POLL_INTERVAL);
    }

    engine.shutdown();
    if !engine.wait_stopped(SHUTDOWN_TIMEOUT) {
        warn!("detector did not stop within {SHUTDOWN_TIMEOUT:?}");
    }
    info!("final status: {}", engine.status_text());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let (engine, trigger) = start_engine(&cli, config);

    if cli.headless {
        return run_headless(engine);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([gui::WIDTH, gui::HEIGHT])
            .with_resizable(false)
            .with_title("Blink Ball"),
        ..Default::default()
    };
    eframe::run_native(
        "Blink Ball",
        options,
        Box::new(move |_cc| Box::new(gui::BlinkBallApp::new(engine, trigger))),
    )
    .map_err(|e| anyhow::anyhow!("GUI failed: {e}"))
}
