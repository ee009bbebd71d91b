//! palm_gate — kiosk entry point.

use anyhow::{Context, Result};
use clap::Parser;

use door_link::list_ports;
use palm_gate::app::run;
use palm_gate::config::Cli;
use palm_gate::telemetry::init_tracing;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_ports {
        let ports = list_ports().context("listing serial ports")?;
        if ports.is_empty() {
            println!("  No serial ports found.");
        }
        for p in ports {
            println!("  {:<24} {}", p.path, p.kind);
        }
        return Ok(());
    }

    let cfg = cli.resolve()?;
    init_tracing(cli.logs, cli.log_file.as_deref())
        .context("failed to open log file")?;

    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                 Palm Gate — kiosk panel              ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    match &cfg.link.port {
        Some(port) => println!("  Door link: {} @ {} baud", port, cfg.link.baud),
        None       => println!("  Door link: none (press C in the panel to connect)"),
    }
    println!("  Voice:     {}", if cfg.voice.enabled { cfg.voice.program.as_str() } else { "muted" });
    println!();

    tracing::info!(port = ?cfg.link.port, baud = cfg.link.baud, "starting gate");
    run(cfg)
}
