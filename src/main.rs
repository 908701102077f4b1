// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use lasersim::config;
use lasersim::lighting::{ControlRegistry, ControlValue, ControlsState, Engine};
use lasersim::simulator::Simulator;
use tracing::info;

const SYSTEMD_SERVICE: &str = r#"
[Unit]
Description=laser array simulator

[Service]
Type=simple
Restart=on-failure
EnvironmentFile=-/etc/default/lasersim
ExecStart=/usr/local/bin/lasersim start "$LASERSIM_CONFIG"

[Install]
WantedBy=multi-user.target
Alias=lasersim.service
"#;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A laser array effect engine with DMX and OSC."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start runs the simulator until interrupted.
    Start {
        /// The path to the simulator config.
        config_path: String,
    },
    /// Lists every control with its range or options and its default.
    Controls {},
    /// Renders frames at explicit times and prints the resulting state.
    Render {
        /// An optional simulator config to start from.
        #[arg(short, long)]
        config: Option<String>,
        /// A control assignment in the form <NAME>=<VALUE>. May be repeated.
        #[arg(short, long = "set")]
        set: Vec<String>,
        /// The time of the first frame, in seconds.
        #[arg(short, long, default_value_t = 0.0)]
        time: f64,
        /// The number of frames to render.
        #[arg(short = 'n', long, default_value_t = 1)]
        ticks: u32,
        /// The time between frames. Defaults to one tick at the configured rate.
        #[arg(long)]
        dt: Option<f64>,
        /// Print the DMX packet as hex instead of the JSON state.
        #[arg(long)]
        dmx: bool,
    },
    /// Prints a systemd service definition to stdout.
    Systemd {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            let config = config::Simulator::deserialize(&PathBuf::from(config_path))?;
            let mut simulator = Simulator::start(&config).await?;

            tokio::signal::ctrl_c().await?;
            info!("Interrupted, shutting down.");
            simulator.stop();
        }
        Commands::Controls {} => {
            let registry = ControlRegistry::standard()?;
            let defaults = ControlsState::default();

            println!("Controls (count: {}):", registry.specs().len());
            for spec in registry.specs() {
                let default = registry
                    .get(&defaults, spec.name())
                    .map(|value| value.to_string())
                    .unwrap_or_default();
                println!("- {}: {} (default: {})", spec.name(), spec.describe(), default);
            }
        }
        Commands::Render {
            config,
            set,
            time,
            ticks,
            dt,
            dmx,
        } => {
            let config = match config {
                Some(path) => config::Simulator::deserialize(&PathBuf::from(path))?,
                None => config::Simulator::default(),
            };

            let mut engine = Engine::new(&config)?;
            if config.seed().is_none() {
                engine.reseed(0);
            }
            for assignment in set.iter() {
                let (name, value) = assignment
                    .split_once('=')
                    .ok_or_else(|| format!("Expected <NAME>=<VALUE>, got '{}'", assignment))?;
                engine.set_control(name.trim(), &ControlValue::infer(value))?;
            }

            let dt = dt.unwrap_or_else(|| config.tick_interval().as_secs_f64());
            for tick in 0..ticks.max(1) {
                engine.tick(Some(time + f64::from(tick) * dt));
            }

            if dmx {
                let packet: Vec<String> = engine
                    .dmx_packet()
                    .iter()
                    .map(|byte| format!("{:02X}", byte))
                    .collect();
                println!("{}", packet.join(" "));
            } else {
                println!("{}", serde_json::to_string_pretty(&engine.snapshot())?);
            }
        }
        Commands::Systemd {} => {
            println!("{}", SYSTEMD_SERVICE)
        }
    }

    Ok(())
}
