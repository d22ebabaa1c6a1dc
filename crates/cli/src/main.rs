//! buzz-io CLI: watch Buzz! handsets and drive their lights from the terminal.

use anyhow::{anyhow, Context, Result};
use buzz_io_core::config::BuzzConfig;
use buzz_io_core::controller::{self, BuzzController, BuzzEvent};
use buzz_io_core::hidapi_backend::HidapiBackend;
use buzz_io_core::report::{ButtonSnapshot, LightStates, HANDSET_COUNT};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(
    name = "buzz-io",
    version,
    about = "Buzz! quiz controller monitor and light control"
)]
struct Cli {
    /// JSON config file (defaults to $BUZZ_IO_CONFIG, then built-in values).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List connected Buzz! controllers.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print button changes until the controller is unplugged.
    Watch {
        /// Print each snapshot as a JSON line.
        #[arg(long)]
        json: bool,
        /// Light every handset that has a button held.
        #[arg(long)]
        echo_lights: bool,
        /// Stop after this many changes.
        #[arg(long)]
        count: Option<usize>,
    },
    /// Set handset lights: four 0/1 digits for handsets 1-4 (e.g. 1010), "on", or "off".
    Lights {
        /// Light pattern.
        pattern: String,
        /// Seconds to keep the lights on; they go off when the controller is released.
        #[arg(long, default_value_t = 5)]
        hold: u64,
    },
}

fn parse_lights(pattern: &str) -> Result<LightStates> {
    match pattern.to_lowercase().as_str() {
        "off" => return Ok(LightStates::all_off()),
        "on" => return Ok(LightStates::all_on()),
        _ => {}
    }

    if pattern.chars().count() != HANDSET_COUNT {
        return Err(anyhow!(
            "light pattern must be {HANDSET_COUNT} digits of 0/1, got '{pattern}'"
        ));
    }
    let mut lights = [false; HANDSET_COUNT];
    for (slot, c) in lights.iter_mut().zip(pattern.chars()) {
        *slot = match c {
            '1' => true,
            '0' => false,
            other => return Err(anyhow!("invalid light digit '{other}' (expected 0 or 1)")),
        };
    }
    Ok(LightStates(lights))
}

fn print_snapshot(snapshot: &ButtonSnapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    let handsets: Vec<String> = snapshot
        .iter()
        .enumerate()
        .map(|(i, state)| {
            if state.any() {
                format!("{}: {state}", i + 1)
            } else {
                format!("{}: -", i + 1)
            }
        })
        .collect();
    println!("{}", handsets.join(" | "));
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = BuzzConfig::resolve(cli.config.as_deref()).context("load config")?;

    match cli.command {
        Commands::List { json } => {
            let backend = HidapiBackend::from_config(&config)?;
            let devices = controller::discover(&backend, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No Buzz! controllers found.");
                println!("Ensure the controller is plugged in and you have access to the HID device.");
            } else {
                for dev in &devices {
                    println!(
                        "Buzz! (VID: 0x{:04X}, PID: 0x{:04X}, path: {})",
                        dev.vendor_id, dev.product_id, dev.path
                    );
                }
            }
        }
        Commands::Watch {
            json,
            echo_lights,
            count,
        } => {
            let backend = HidapiBackend::from_config(&config)?;
            let controller = BuzzController::open_first(&backend, &config)?;
            let events = controller.subscribe();
            eprintln!(
                "Watching {} ({}); unplug to stop.",
                controller.product_string(),
                controller.path()
            );

            let mut last = ButtonSnapshot::default();
            let mut changes = 0usize;
            for event in events.iter() {
                match event {
                    BuzzEvent::Buttons(snapshot) => {
                        if snapshot == last {
                            continue;
                        }
                        last = snapshot;
                        print_snapshot(&snapshot, json)?;
                        if echo_lights {
                            controller.set_lights(LightStates::from_held(&snapshot));
                        }
                        changes += 1;
                        if count.is_some_and(|limit| changes >= limit) {
                            break;
                        }
                    }
                    BuzzEvent::Removed => {
                        eprintln!("Controller removed.");
                        break;
                    }
                }
            }
            controller.close();
        }
        Commands::Lights { pattern, hold } => {
            let lights = parse_lights(&pattern)?;
            let backend = HidapiBackend::from_config(&config)?;
            let controller = BuzzController::open_first(&backend, &config)?;
            let events = controller.subscribe();
            controller.set_lights(lights);
            println!("Lights set on {} for {hold}s", controller.product_string());

            let deadline = Instant::now() + Duration::from_secs(hold);
            while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
                match events.recv_timeout(remaining) {
                    Ok(BuzzEvent::Removed) => {
                        eprintln!("Controller removed.");
                        break;
                    }
                    Ok(BuzzEvent::Buttons(_)) => {}
                    Err(_) => break,
                }
            }
            controller.close();
        }
    }

    Ok(())
}
