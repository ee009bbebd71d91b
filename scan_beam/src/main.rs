//! Interactive explorer for the scan beam.
//! Feed it a panel height and a contact pattern and watch the beam move.

use scan_beam::{BeamParams, BeamSimulator, Crossing, TICK_MS};
use std::io::{self, Write};

fn main() {
    println!();
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              Palm Scan Beam Explorer                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();
    println!("  Pattern: a string of 1 (contact) and 0 (no contact), one per tick.");
    println!("  The last symbol repeats until the beam crosses a bound.");
    println!();

    loop {
        let pattern = read_line("Contact pattern (e.g. 1111100111, or q to quit): ");
        let pattern = pattern.trim();

        if pattern.eq_ignore_ascii_case("q") {
            println!("\nGoodbye!\n");
            break;
        }

        let contacts: Vec<bool> = pattern.chars()
            .filter_map(|c| match c {
                '1' => Some(true),
                '0' => Some(false),
                _   => None,
            })
            .collect();
        if contacts.is_empty() {
            println!("  ⚠  Pattern must contain at least one 0 or 1.\n");
            continue;
        }

        let height: f64 = read_line("  Panel height (default 300): ")
            .trim().parse().unwrap_or(300.0);
        let height = height.max(0.0).min(10_000.0);

        let params = BeamParams::default();
        let mut beam = BeamSimulator::new(params, height);

        println!();
        println!("  ┌─ span {:.1}  scan {:.1}/tick  rewind {:.1}/tick ─",
            params.span(height), params.scan_speed, params.rewind_speed);

        let last = contacts[contacts.len() - 1];
        let mut n = 0usize;
        let outcome = loop {
            let contact = contacts.get(n).copied().unwrap_or(last);
            let t = beam.tick(contact, height);
            n += 1;
            println!("  │  t={:>5}ms  contact={}  pos={:>7.1}",
                n as u64 * TICK_MS, if contact { 1 } else { 0 }, t.position);
            if let Some(c) = t.crossing { break Some(c); }
            if n >= 5_000 { break None; }
        };

        match outcome {
            Some(Crossing::Success) => println!("  └─ SUCCESS after {} ticks", n),
            Some(Crossing::Fail)    => println!("  └─ FAIL after {} ticks", n),
            None                    => println!("  └─ no crossing after {} ticks", n),
        }
        println!();
    }
}

fn read_line(prompt: &str) -> String {
    print!("{}", prompt);
    io::stdout().flush().ok();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf
}
