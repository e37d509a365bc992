use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use gpu_throttle_cli::app::{App, StopReason};
use gpu_throttle_cli::config::{Args, MonitorConfig};
use gpu_throttle_cli::screen::{write_lines, PlainScreen, Screen, TerminalScreen};
use gpu_throttle_cli::signal::{spawn_interrupt_listener, StopToken};
use gpu_throttle_cli::source;
use gpu_throttle_cli::theme::Palette;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    gpu_throttle_cli::init_logging();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = MonitorConfig::from_args(&args)?;
    let palette = Palette::detect();
    let stop = StopToken::new();

    let mut app = App::new(config, source::open(), palette, stop.clone())?;
    spawn_interrupt_listener(stop);

    let mut screen: Box<dyn Screen> = if palette.is_color() {
        match TerminalScreen::enter() {
            Ok(screen) => Box::new(screen),
            Err(e) => {
                app.abort();
                return Err(e).context("failed to set up terminal");
            }
        }
    } else {
        Box::new(PlainScreen::new(io::stdout()))
    };

    let report = app.run(screen.as_mut()).await;
    drop(screen);

    let mut stdout = io::stdout().lock();
    write_lines(&mut stdout, &report.summary.render(&palette), &palette)?;
    stdout.flush()?;

    match report.reason {
        StopReason::Failed(e) => Err(e.into()),
        StopReason::Interrupted | StopReason::DeadlineReached => Ok(()),
    }
}
