//! door_console — talk to the door actuator by hand.
//!
//! Lists serial ports, connects to one, then sends whatever command the
//! operator types and prints every line the device sends back.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use door_link::{
    list_ports, Dispatcher, DoorCommand, DoorLink, LinkEvent, SerialTransport, DEFAULT_BAUD,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║                 Door Link Console                    ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let path = pick_port()?;
    let baud: u32 = read_line(&format!("  Baud (default {}): ", DEFAULT_BAUD))
        .trim().parse().unwrap_or(DEFAULT_BAUD);

    let mut link = Dispatcher::spawn();
    link.connect(Box::new(SerialTransport::new(path.clone(), baud)));
    match link.next_event(Duration::from_secs(5)) {
        Some(LinkEvent::Connected { port }) => println!("  ✓ Connected to {}\n", port),
        Some(LinkEvent::ConnectFailed(e))   => bail!(e),
        Some(other) => bail!("unexpected link event while connecting: {:?}", other),
        None        => bail!("timed out connecting to {}", path),
    }

    loop {
        print_inbound(&mut link);
        let line = read_line("Command (start / close / q to quit): ");
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            println!("\nGoodbye!\n");
            break;
        }
        if line.is_empty() { continue; }

        let command: DoorCommand = match line.parse() {
            Ok(c)  => c,
            Err(e) => { println!("  ⚠  {}\n", e); continue; }
        };

        link.submit(command);
        loop {
            match link.next_event(Duration::from_secs(2)) {
                Some(LinkEvent::SendCompleted { command, result: Ok(()) }) => {
                    println!("  → {}", command);
                    break;
                }
                Some(LinkEvent::SendCompleted { command, result: Err(e) }) => {
                    println!("  ⚠  {} failed: {}", command, e);
                    break;
                }
                Some(LinkEvent::Inbound(text)) => println!("  ← {}", text),
                Some(_) => {}
                None    => { println!("  ⚠  no completion from link worker"); break; }
            }
        }
        println!();
    }

    link.quit();
    Ok(())
}

fn pick_port() -> Result<String> {
    let ports = list_ports().context("listing serial ports")?;
    if ports.is_empty() {
        println!("  No serial ports found.");
    } else {
        println!("  ┌──────────────────────────────────────────────────────┐");
        for (i, p) in ports.iter().enumerate() {
            println!("  │  {}. {:24} {:24} │", i + 1, p.path, p.kind);
        }
        println!("  └──────────────────────────────────────────────────────┘");
    }

    let choice = read_line("  Port number or path: ");
    let choice = choice.trim();
    if let Ok(n) = choice.parse::<usize>() {
        if let Some(p) = n.checked_sub(1).and_then(|i| ports.get(i)) {
            return Ok(p.path.clone());
        }
    }
    if choice.is_empty() {
        bail!("no port selected");
    }
    Ok(choice.to_string())
}

fn print_inbound(link: &mut Dispatcher) {
    for ev in link.drain() {
        match ev {
            LinkEvent::Inbound(text) => println!("  ← {}", text),
            LinkEvent::Disconnected { port, .. } => {
                println!("  ⚠  {} hung up; commands will fail until restart", port);
            }
            other => tracing::debug!(?other, "link event"),
        }
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
