use std::path::PathBuf;
use std::process::ExitCode;
use std::time::UNIX_EPOCH;

use clap::{Parser, Subcommand};
use gbhost_core::cartridge::CartridgeInfo;
use gbhost_core::machine::PatternCore;
use gbhost_core::savestate::{SaveStateStore, SlotKind, base_title, preview};
use tracing_subscriber::EnvFilter;

mod config;
mod rom_path;
mod session;

use config::HostConfig;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "gbhost", version, about = "Headless handheld emulation host")]
struct Cli {
    /// Config file (default: <config dir>/gbhost/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the save directory
    #[arg(long, global = true)]
    save_dir: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a program headless, resuming from and writing its auto slot
    Run {
        image: String,
        /// Frames to present before exiting
        #[arg(long, default_value_t = 600)]
        frames: u64,
        /// Disable real-time pacing
        #[arg(long)]
        no_limit: bool,
        /// Start from boot even if an auto slot exists
        #[arg(long)]
        fresh: bool,
        /// Also write a manual slot on exit
        #[arg(long)]
        manual: bool,
    },
    /// Show cartridge header details
    Info { image: String },
    /// Inspect and manage save files
    Saves {
        #[command(subcommand)]
        command: SavesCommand,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum SavesCommand {
    /// List saves for a program, newest first
    List { image: String },
    /// Write the preview of save number INDEX (from `list`) as PNG
    ExportPreview {
        image: String,
        index: usize,
        out: PathBuf,
    },
    /// Delete save number INDEX (from `list`)
    Remove { image: String, index: usize },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gbhost: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<HostConfig, config::ConfigError> {
    let mut config = match cli.config.clone().or_else(HostConfig::default_path) {
        Some(path) => HostConfig::load(&path)?,
        None => HostConfig::default(),
    };
    if let Some(dir) = &cli.save_dir {
        config.save_dir = dir.clone();
    }
    Ok(config)
}

fn dispatch(cli: Cli) -> CliResult {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Run {
            image,
            frames,
            no_limit,
            fresh,
            manual,
        } => {
            let program = rom_path::load_program(&image)?;
            let mut store = open_store(&config, &program.name)?;
            let options = session::RunOptions {
                frames,
                frame_limiter: config.frame_limiter && !no_limit,
                auto_resume: config.auto_resume && !fresh,
                manual_save: manual,
            };
            let summary = session::run(
                Box::new(PatternCore::new()),
                &program.image,
                &mut store,
                &config,
                &options,
            )?;
            println!(
                "{} frames presented ({} produced, {} dropped){}",
                summary.presented,
                summary.published,
                summary.dropped,
                if summary.resumed { ", resumed from auto save" } else { "" }
            );
            Ok(())
        }
        Command::Info { image } => {
            let program = rom_path::load_program(&image)?;
            let info = CartridgeInfo::parse(&program.image)?;
            println!("title:      {}", info.title());
            println!("boot mode:  {}", info.boot_mode());
            println!("color:      {}", yes_no(info.is_cgb_compatible()));
            println!("super:      {}", yes_no(info.is_sgb_compatible()));
            let checksum = match info.validate() {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            };
            println!("checksum:   {checksum}");
            println!("save title: {}", base_title(&program.name));
            Ok(())
        }
        Command::Saves { command } => saves(&config, command),
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn saves(config: &HostConfig, command: SavesCommand) -> CliResult {
    match command {
        SavesCommand::List { image } => {
            let store = open_store_for(config, &image)?;
            if store.records().is_empty() {
                println!("no saves for {}", store.base_title());
            }
            for (index, record) in store.records().iter().enumerate() {
                let kind = match record.kind() {
                    SlotKind::Auto => "auto",
                    SlotKind::Manual => "manual",
                };
                let saved = record
                    .saved_at()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs())
                    .unwrap_or(0);
                println!("{index:>3}  {kind:<6}  {saved}  {}", record.path().display());
            }
            Ok(())
        }
        SavesCommand::ExportPreview { image, index, out } => {
            let store = open_store_for(config, &image)?;
            let record = store
                .records()
                .get(index)
                .ok_or_else(|| format!("no save #{index} for {}", store.base_title()))?;
            let state = record.load()?;
            std::fs::write(&out, preview::encode_png(&state.preview)?)?;
            println!("wrote {}", out.display());
            Ok(())
        }
        SavesCommand::Remove { image, index } => {
            let mut store = open_store_for(config, &image)?;
            let record = store
                .records()
                .get(index)
                .cloned()
                .ok_or_else(|| format!("no save #{index} for {}", store.base_title()))?;
            store.remove(&record)?;
            println!("removed {}", record.path().display());
            Ok(())
        }
    }
}

fn open_store(
    config: &HostConfig,
    program_name: &str,
) -> Result<SaveStateStore, gbhost_core::savestate::PersistError> {
    SaveStateStore::open(&config.save_dir, program_name, &config.save_extension)
}

/// Store for a program path given on the command line, keyed the same way
/// `run` keys it.
fn open_store_for(
    config: &HostConfig,
    image: &str,
) -> Result<SaveStateStore, Box<dyn std::error::Error>> {
    let name = rom_path::program_name(image)?;
    Ok(open_store(config, &name)?)
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
