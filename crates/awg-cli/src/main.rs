//! CLI entry point for rust-awg.
//!
//! Provides one-shot control of the supported waveform generators:
//! - listing candidate serial ports
//! - resolving a port from an identifier hint, with an interactive
//!   selection prompt when the hint is absent or doesn't match
//! - device operations: reset, error-queue read, display/polarity toggles,
//!   waveform selection, catalog listing
//!
//! The interactive selection lives here on purpose: the driver crates only
//! accept an already-resolved port and never prompt.
//!
//! # Usage
//!
//! ```bash
//! awgctl list
//! awgctl identify --model sdg2082x --port SDG
//! awgctl waveform --model sdg2082x --port /dev/ttyUSB0 --channel 1 7
//! awgctl display --model pt4115 --port /dev/ttyUSB1 false
//! ```

use anyhow::{bail, Context, Result};
use awg_core::capabilities::{DisplayControl, LocalControl, StatusControl};
use awg_core::port_resolver::{self, CandidatePort, PortResolveError};
use awg_driver_peaktech::Pt4115;
use awg_driver_siglent::{BuiltinWaveforms, Sdg2082x, UserWaveforms};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;

#[derive(Parser)]
#[command(name = "awgctl")]
#[command(about = "Control Siglent and PeakTech arbitrary waveform generators", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Model {
    /// Siglent SDG2082X
    Sdg2082x,
    /// PeakTech 4115
    Pt4115,
}

#[derive(Args)]
struct Connection {
    /// Instrument model
    #[arg(long, value_enum)]
    model: Model,

    /// Serial port path or identifier hint; prompts for a selection when
    /// omitted or unmatched
    #[arg(long)]
    port: Option<String>,

    /// Baud rate override (defaults to the model's standard rate)
    #[arg(long)]
    baud: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate serial ports
    List,

    /// Query the instrument identification banner
    Identify {
        #[command(flatten)]
        conn: Connection,
    },

    /// Send the IEEE 488.2 device reset
    Reset {
        #[command(flatten)]
        conn: Connection,
    },

    /// Clear the status registers including the error queue
    ClearError {
        #[command(flatten)]
        conn: Connection,
    },

    /// Read the instrument error queue (reading drains it)
    Errors {
        #[command(flatten)]
        conn: Connection,
    },

    /// Get or set the on-device display state
    Display {
        #[command(flatten)]
        conn: Connection,
        /// "true" or "false"; omit to query the current state
        state: Option<String>,
    },

    /// Return the instrument to local panel control
    Unlock {
        #[command(flatten)]
        conn: Connection,
    },

    /// Get or set a channel's polarity inversion
    Inversion {
        #[command(flatten)]
        conn: Connection,
        /// Channel number, starting at 1
        #[arg(long, default_value_t = 1)]
        channel: usize,
        /// "true" or "false"; omit to query the current state
        state: Option<String>,
    },

    /// Get or set a channel's active waveform by catalog index
    Waveform {
        #[command(flatten)]
        conn: Connection,
        /// Channel number, starting at 1
        #[arg(long, default_value_t = 1)]
        channel: usize,
        /// Waveform catalog index; omit to query the current one
        index: Option<u32>,
    },

    /// List the built-in waveform catalog
    BuiltinList {
        #[command(flatten)]
        conn: Connection,
    },

    /// List the user-uploaded waveform catalog
    UserList {
        #[command(flatten)]
        conn: Connection,
    },
}

enum Device {
    Sdg(Sdg2082x),
    Pt(Pt4115),
}

impl Device {
    fn status(&self) -> &dyn StatusControl {
        match self {
            Device::Sdg(d) => d,
            Device::Pt(d) => d,
        }
    }

    fn sdg(&self) -> Result<&Sdg2082x> {
        match self {
            Device::Sdg(d) => Ok(d),
            Device::Pt(_) => bail!("this command requires --model sdg2082x"),
        }
    }

    fn pt(&self) -> Result<&Pt4115> {
        match self {
            Device::Pt(d) => Ok(d),
            Device::Sdg(_) => bail!("this command requires --model pt4115"),
        }
    }
}

async fn open_device(conn: &Connection) -> Result<Device> {
    let path = resolve_port_interactive(conn.port.as_deref())?;
    tracing::debug!(%path, model = ?conn.model, "resolved serial port");

    let mut config = toml::Table::new();
    config.insert("port".to_string(), toml::Value::String(path));
    if let Some(baud) = conn.baud {
        config.insert("baud_rate".to_string(), toml::Value::Integer(i64::from(baud)));
    }
    let config = toml::Value::Table(config);

    match conn.model {
        Model::Sdg2082x => Ok(Device::Sdg(Sdg2082x::from_config(config).await?)),
        Model::Pt4115 => Ok(Device::Pt(Pt4115::from_config(config).await?)),
    }
}

/// Resolve a port hint, falling back to an interactive selection.
fn resolve_port_interactive(hint: Option<&str>) -> Result<String> {
    match hint {
        Some(h) => match port_resolver::resolve(h) {
            Ok(path) => Ok(path),
            Err(PortResolveError::NoMatch { hint, candidates }) => {
                eprintln!("No serial port matches \"{}\".", hint);
                select_from(&candidates)
            }
            Err(PortResolveError::AmbiguousMatch { hint, .. }) => {
                eprintln!("Multiple serial ports match \"{}\".", hint);
                select_from(&port_resolver::list_candidates()?)
            }
            Err(e) => Err(e.into()),
        },
        None => {
            let candidates = port_resolver::list_candidates()?;
            if candidates.is_empty() {
                bail!("no serial ports detected");
            }
            select_from(&candidates)
        }
    }
}

fn select_from(candidates: &[CandidatePort]) -> Result<String> {
    loop {
        eprintln!("Please select the waveform generator from the list of available ports:");
        for (i, candidate) in candidates.iter().enumerate() {
            eprintln!("{}: {}", i + 1, candidate);
        }
        eprint!("> ");
        std::io::stderr().flush().ok();

        let mut line = String::new();
        if std::io::stdin()
            .read_line(&mut line)
            .context("Failed to read selection")?
            == 0
        {
            bail!("selection aborted");
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => {
                return Ok(candidates[n - 1].path.clone());
            }
            _ => eprintln!("Invalid number. Please try it again."),
        }
    }
}

fn channel_arg<'a, T>(channel: Option<&'a T>, number: usize) -> Result<&'a T> {
    channel.with_context(|| format!("channel {} does not exist on this instrument", number))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List => {
            let candidates = port_resolver::list_candidates()?;
            if candidates.is_empty() {
                eprintln!("No serial ports detected.");
            }
            for candidate in candidates {
                println!("{}", candidate);
            }
        }

        Commands::Identify { conn } => {
            let device = open_device(&conn).await?;
            println!("{}", device.sdg()?.identify().await?);
        }

        Commands::Reset { conn } => {
            open_device(&conn).await?.status().reset().await?;
        }

        Commands::ClearError { conn } => {
            open_device(&conn).await?.status().clear_error().await?;
        }

        Commands::Errors { conn } => {
            println!("{}", open_device(&conn).await?.status().errors().await?);
        }

        Commands::Display { conn, state } => {
            let device = open_device(&conn).await?;
            let pt = device.pt()?;
            match state {
                None => println!("{}", pt.display().await?),
                Some(value) => pt.set_display_from_text(Some(&value)).await?,
            }
        }

        Commands::Unlock { conn } => {
            open_device(&conn).await?.pt()?.unlock().await?;
        }

        Commands::Inversion {
            conn,
            channel,
            state,
        } => {
            let device = open_device(&conn).await?;
            let pt = device.pt()?;
            let chan = channel_arg(pt.channel(channel), channel)?;
            match state {
                None => println!("{}", chan.inversion().await?),
                Some(value) => chan.set_inversion_from_text(Some(&value)).await?,
            }
        }

        Commands::Waveform {
            conn,
            channel,
            index,
        } => {
            let device = open_device(&conn).await?;
            let sdg = device.sdg()?;
            let chan = channel_arg(sdg.channel(channel), channel)?;
            match index {
                None => println!("{}", chan.waveform_index().await?),
                Some(n) => chan.set_waveform_index(n).await?,
            }
        }

        Commands::BuiltinList { conn } => {
            let device = open_device(&conn).await?;
            match device.sdg()?.get_builtin_list().await? {
                BuiltinWaveforms::Empty(sentinel) => println!("{}", sentinel),
                BuiltinWaveforms::Entries(entries) => {
                    for entry in entries {
                        println!("{}\t{}", entry.index, entry.name);
                    }
                }
            }
        }

        Commands::UserList { conn } => {
            let device = open_device(&conn).await?;
            match device.sdg()?.get_user_list().await? {
                UserWaveforms::Empty(sentinel) => println!("{}", sentinel),
                UserWaveforms::Names(names) => {
                    for name in names {
                        println!("{}", name);
                    }
                }
            }
        }
    }

    Ok(())
}
