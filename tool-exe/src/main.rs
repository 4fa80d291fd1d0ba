#![doc = include_str!("../../README.md")]

mod cli;
mod commands;
mod config;

use std::error::Error;

use cli::*;
use log::{info, warn};
use simplelog::TermLogger;
use wad::WadOptions;

use crate::config::{LoadStatus, UserConfig};

/// The `tool-exe` crate only sets up logging and config, the work is all
/// done by the `wad` crate
fn main() -> Result<(), Box<dyn Error>> {
    let mut options: CLIOptions = argh::from_env();

    let (mut user_config, status) = UserConfig::load();
    user_config.sync_cli(&mut options);

    TermLogger::init(
        options.verbose.unwrap_or(log::LevelFilter::Warn),
        simplelog::ConfigBuilder::default()
            .set_time_level(log::LevelFilter::Trace)
            .build(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    match status {
        LoadStatus::Loaded(path) => info!("Loaded user config file {path:?}"),
        LoadStatus::Created(reason) => info!("Using default user config: {reason}"),
    }
    if let Err(e) = user_config.write() {
        warn!("Could not write config: {e}");
    }

    let wad_options = WadOptions {
        udmf: options.udmf.unwrap_or(false),
    };

    match &options.command {
        Command::Info(args) => commands::info(args, wad_options),
        Command::List(args) => commands::list(args, wad_options),
        Command::Validate(args) => commands::validate(args),
        Command::Extract(args) => commands::extract(args, wad_options),
        Command::Rewrite(args) => commands::rewrite(args, wad_options),
        Command::RemoveLevel(args) => commands::remove_level(args, wad_options),
        Command::StripNodes(args) => commands::strip_nodes(args, wad_options),
        Command::Find(args) => commands::find(args, wad_options),
        Command::FirstSprite(args) => commands::first_sprite(args, wad_options),
    }
}
