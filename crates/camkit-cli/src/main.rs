use std::path::PathBuf;

use anyhow::{Context, Result};
use camkit_core::quirks;
use camkit_hw::{CameraSource, HardwareConfig, V4l2Camera};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "camkit", about = "Inspect and configure quirky capture devices")]
struct Cli {
    /// Hardware config file (TOML)
    #[arg(long, global = true, env = "CAMKIT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List V4L2 capture devices and their quirks
    Devices,
    /// Show the embedded quirk table
    Quirks,
    /// Print the usable video mode catalog of a device
    Modes {
        /// Device path (e.g., /dev/video0)
        device: String,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show the mode the device is currently running
    Current {
        /// Device path (e.g., /dev/video0)
        device: String,
    },
    /// Apply settings to a device
    Set {
        /// Device path (e.g., /dev/video0)
        device: String,
        #[arg(long)]
        exposure: Option<i32>,
        #[arg(long)]
        brightness: Option<i32>,
        #[arg(long)]
        gain: Option<i32>,
        /// Catalog index to switch to
        #[arg(long)]
        mode: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices => {
            let devices = V4l2Camera::list_devices();
            if devices.is_empty() {
                println!("No capture devices found");
            }
            for dev in devices {
                let (vid, pid) = dev.usb_ids.unzip();
                let camera = quirks::resolve(vid, pid, &dev.name);
                let ids = dev
                    .usb_ids
                    .map(|(v, p)| format!("{v:04x}:{p:04x}"))
                    .unwrap_or_else(|| "----:----".to_string());
                println!(
                    "{}  {}  {}  [{} @ {}]  quirks: {}",
                    dev.path,
                    ids,
                    dev.name,
                    dev.driver,
                    dev.bus,
                    format_quirks(camera.quirks())
                );
            }
        }
        Commands::Quirks => {
            for entry in quirks::list_quirks() {
                let vid = entry.vendor_id.map_or("----".to_string(), |v| format!("{v:04x}"));
                let pid = entry.product_id.map_or("----".to_string(), |p| format!("{p:04x}"));
                println!(
                    "{vid}:{pid}  {:<36}  name: {}  quirks: {}",
                    entry.name,
                    entry.base_name.as_deref().unwrap_or("*"),
                    format_quirks(&entry.quirks)
                );
            }
        }
        Commands::Modes { device, json } => {
            let source = open_source(&device, cli.config.as_deref())?;
            let settables = source.inspect();
            let modes = settables.all_video_modes();
            if json {
                println!("{}", serde_json::to_string_pretty(modes)?);
            } else if modes.is_empty() {
                println!("No usable video modes");
            } else {
                println!(
                    "exposure: {:?}  gain: {:?}",
                    settables.exposure_strategy(),
                    settables.gain_strategy()
                );
                for (index, mode) in modes {
                    println!("{index:>3}  {mode}");
                }
            }
        }
        Commands::Current { device } => {
            let source = open_source(&device, cli.config.as_deref())?;
            match source.inspect().current_video_mode() {
                Some(mode) => println!("{mode}"),
                None => println!("unknown (device not connected)"),
            }
        }
        Commands::Set {
            device,
            exposure,
            brightness,
            gain,
            mode,
        } => {
            let source = open_source(&device, cli.config.as_deref())?;
            // Only the requested settings are written; the running mode is
            // left alone unless --mode is given.
            let settables = source.inspect();
            if let Some(index) = mode {
                settables.set_video_mode(index);
            }
            if let Some(value) = exposure {
                settables.set_exposure(value);
            }
            if let Some(value) = brightness {
                settables.set_brightness(value);
            }
            if let Some(value) = gain {
                settables.set_gain(value);
            }
            match settables.current_video_mode() {
                Some(current) => println!("{device}: {current}"),
                None => println!("{device}: mode unknown"),
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<HardwareConfig> {
    match path {
        Some(path) => HardwareConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(HardwareConfig::from_env()),
    }
}

fn open_source(device: &str, config: Option<&std::path::Path>) -> Result<CameraSource<V4l2Camera>> {
    let config = load_config(config)?;
    let camera = V4l2Camera::open(device).with_context(|| format!("opening {device}"))?;
    let source = CameraSource::new(camera, config);
    if source.is_vendor_camera() {
        tracing::info!(device, "vendor camera with preset FOV");
    }
    Ok(source)
}

fn format_quirks(set: &std::collections::BTreeSet<quirks::Quirk>) -> String {
    if set.is_empty() {
        return "none".to_string();
    }
    set.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}
