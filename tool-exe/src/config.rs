//! User configuration options.

use std::error::Error;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use dirs::config_dir;
use log::{LevelFilter, info};
use nanoserde::{DeRon, SerRon};
use wad::AtomicFileWriter;

use crate::cli::CLIOptions;

const LOG_TAG: &str = "UserConfig";
const BASE_DIR: &str = "wadsmith/";
const CONFIG_FILE: &str = "wadsmith.ron";

pub fn get_cfg_file() -> Option<PathBuf> {
    let mut dir = config_dir()?;
    dir.push(BASE_DIR);
    dir.push(CONFIG_FILE);
    Some(dir)
}

#[derive(Debug, Clone, PartialEq, DeRon, SerRon)]
pub struct UserConfig {
    /// Game WAD used by lookups when none is given
    pub iwad: String,
    pub resource_wads: Vec<String>,
    pub udmf_testing: bool,
    pub verbose: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        UserConfig {
            iwad: String::new(),
            resource_wads: Vec::new(),
            udmf_testing: false,
            verbose: LevelFilter::Warn.to_string(),
        }
    }
}

/// How the config was obtained. Logging isn't up yet when the config is
/// read, so this is reported afterwards.
pub enum LoadStatus {
    Loaded(PathBuf),
    Created(String),
}

impl UserConfig {
    /// Read the config, falling back to defaults if it is missing or
    /// can't be parsed
    pub fn load() -> (Self, LoadStatus) {
        let Some(path) = get_cfg_file() else {
            return (
                UserConfig::default(),
                LoadStatus::Created("no user config dir".to_string()),
            );
        };
        match UserConfig::read(&path) {
            Ok(config) => (config, LoadStatus::Loaded(path)),
            Err(e) => (
                UserConfig::default(),
                LoadStatus::Created(format!("could not read {path:?}: {e}")),
            ),
        }
    }

    fn read(path: &Path) -> Result<Self, Box<dyn Error>> {
        let buf = fs::read_to_string(path)?;
        let config =
            UserConfig::deserialize_ron(&buf).map_err(|e| format!("bad config: {e:?}"))?;
        Ok(config)
    }

    pub fn write(&self) -> Result<(), Box<dyn Error>> {
        let path = get_cfg_file().ok_or("no user config dir")?;
        if let Some(dir) = path.parent() {
            create_dir_all(dir)?;
        }

        let mut out = AtomicFileWriter::new(&path);
        out.open()?;
        out.write(self.serialize_ron().as_bytes())?;
        out.commit()?;
        info!(target: LOG_TAG, "Saved user config to {path:?}");
        Ok(())
    }

    pub fn log_level(&self) -> LevelFilter {
        LevelFilter::from_str(&self.verbose).unwrap_or(LevelFilter::Warn)
    }

    /// Sync the CLI options and UserOptions with each other. Anything given
    /// on the command line wins and is remembered.
    pub fn sync_cli(&mut self, cli: &mut CLIOptions) {
        if let Some(verbose) = cli.verbose {
            self.verbose = verbose.to_string();
        } else {
            cli.verbose = Some(self.log_level());
        }

        if let Some(udmf) = cli.udmf {
            self.udmf_testing = udmf;
        } else {
            cli.udmf = Some(self.udmf_testing);
        }

        let Some(order) = cli.command.search_order() else {
            return;
        };

        if let Some(iwad) = order.iwad.as_ref() {
            self.iwad = iwad.to_string_lossy().into_owned();
        } else if !self.iwad.is_empty() {
            *order.iwad = Some(PathBuf::from(&self.iwad));
        }

        if order.resource.is_empty() {
            order
                .resource
                .extend(self.resource_wads.iter().map(PathBuf::from));
        } else {
            self.resource_wads = order
                .resource
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Command, FirstSpriteArgs, InfoArgs};

    fn options(command: Command) -> CLIOptions {
        CLIOptions {
            verbose: None,
            udmf: None,
            command,
        }
    }

    #[test]
    fn ron_round_trip() {
        let config = UserConfig {
            iwad: "/games/doom2.wad".to_string(),
            resource_wads: vec!["a.wad".to_string(), "b.wad".to_string()],
            udmf_testing: true,
            verbose: "debug".to_string(),
        };
        let text = config.serialize_ron();
        assert_eq!(UserConfig::deserialize_ron(&text).unwrap(), config);
        assert_eq!(config.log_level(), LevelFilter::Debug);
    }

    #[test]
    fn config_fills_missing_cli() {
        let mut config = UserConfig {
            iwad: "doom2.wad".to_string(),
            resource_wads: vec!["res.wad".to_string()],
            ..UserConfig::default()
        };
        let mut cli = options(Command::FirstSprite(FirstSpriteArgs {
            iwad: None,
            resource: Vec::new(),
            edit: None,
            stem: "TROO".to_string(),
        }));
        config.sync_cli(&mut cli);

        assert_eq!(cli.verbose, Some(LevelFilter::Warn));
        assert_eq!(cli.udmf, Some(false));
        let Command::FirstSprite(args) = &cli.command else {
            panic!("command changed");
        };
        assert_eq!(args.iwad, Some(PathBuf::from("doom2.wad")));
        assert_eq!(args.resource, vec![PathBuf::from("res.wad")]);
    }

    #[test]
    fn cli_wins_and_is_kept() {
        let mut config = UserConfig::default();
        let mut cli = options(Command::Info(InfoArgs {
            wad: PathBuf::from("x.wad"),
        }));
        cli.verbose = Some(LevelFilter::Info);
        cli.udmf = Some(true);
        config.sync_cli(&mut cli);

        assert_eq!(config.log_level(), LevelFilter::Info);
        assert!(config.udmf_testing);
        assert!(config.iwad.is_empty());
    }
}
