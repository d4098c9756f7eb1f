//! `nrfpm`: read and control nRF24 wireless power monitors.
//!
//! ```text
//! nrfpm read                 # poll the sensor and print one reading
//! nrfpm read --passive       # wait for the sensor to transmit on its own
//! nrfpm --address 03 read --json
//! nrfpm relay off
//! ```

use std::path::PathBuf;
use std::process;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use nrfpm_monitor::{configure_radio, MonitorConfig, PowerMonitor, RevisionChoice, SysfsRadioConfig};
use nrfpm_protocol::{RevisionId, TelemetryReply};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "nrfpm", version, about = "nRF24 wireless power monitor client")]
struct Cli {
    /// YAML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Radio character device.
    #[arg(long, global = true)]
    device: Option<PathBuf>,

    /// RF channel.
    #[arg(long, global = true)]
    channel: Option<u8>,

    /// Sensor address, in hex.
    #[arg(short, long, global = true, value_parser = parse_address)]
    address: Option<u8>,

    /// Sensor firmware revision (v1, v2, v3).
    #[arg(long, global = true)]
    revision: Option<RevisionId>,

    /// Log every frame sent and received.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read one telemetry sample.
    Read {
        /// Do not send requests; wait for the sensor to transmit.
        #[arg(long)]
        passive: bool,

        /// Print the reading as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Switch the sensor's relay.
    Relay {
        #[arg(value_enum)]
        state: RelayState,
    },
    /// Initialize the sensor.
    Init,
    /// Apply the radio settings and exit.
    Configure,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum RelayState {
    On,
    Off,
}

/// One reading as printed by `read --json`.
#[derive(Serialize)]
struct Reading {
    timestamp: DateTime<Utc>,
    #[serde(flatten)]
    reply: TelemetryReply,
}

fn parse_address(s: &str) -> Result<u8, String> {
    let digits = s.trim_start_matches("0x").trim_start_matches("0X");
    u8::from_str_radix(digits, 16).map_err(|e| format!("invalid hex address {:?}: {}", s, e))
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("trace")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> nrfpm_monitor::Result<MonitorConfig> {
    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(device) = &cli.device {
        config.device = device.clone();
    }
    if let Some(channel) = cli.channel {
        config.radio.channel = channel;
    }
    if let Some(address) = cli.address {
        config.radio.address = address;
    }
    if let Some(revision) = cli.revision {
        config.revision = RevisionChoice::Builtin(revision);
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli) -> nrfpm_monitor::Result<()> {
    let config = load_config(cli)?;
    let address = config.radio.address;

    if let Commands::Configure = cli.command {
        let mut sink = SysfsRadioConfig::new(&config.sysfs_root);
        configure_radio(&mut sink, &config.radio)?;
        info!("Radio configured for sensor 0x{:02x}", address);
        return Ok(());
    }

    let monitor = PowerMonitor::open(&config)?;
    match cli.command {
        Commands::Read { passive, json } => {
            let reply = monitor.read_telemetry(address, !passive)?;
            if json {
                let reading = Reading {
                    timestamp: Utc::now(),
                    reply,
                };
                println!("{}", serde_json::to_string(&reading)?);
            } else {
                print_reading(&reply);
            }
        }
        Commands::Relay { state } => match state {
            RelayState::On => monitor.enable_relay(address)?,
            RelayState::Off => monitor.disable_relay(address)?,
        },
        Commands::Init => monitor.initialize(address)?,
        Commands::Configure => {}
    }
    Ok(())
}

fn print_reading(reply: &TelemetryReply) {
    let mut line = format!(
        "sensor 0x{:02x}: {:.2} V  {:.2} A  {:.3} W",
        reply.address, reply.voltage, reply.current, reply.power
    );
    if let (Some(ah), Some(wh)) = (reply.amphour, reply.watthour) {
        line.push_str(&format!("  {:.3} Ah  {:.3} Wh", ah, wh));
    }
    println!("{}", line);
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
