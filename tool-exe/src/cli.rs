use std::path::PathBuf;

use argh::FromArgs;

/// Inspect, check and rewrite DOOM WAD files
#[derive(Debug, FromArgs)]
pub struct CLIOptions {
    /// verbose level: off, error, warn, info, debug, trace
    #[argh(option)]
    pub verbose: Option<log::LevelFilter>,
    /// detect UDMF levels (a marker followed by TEXTMAP). Unfinished
    #[argh(option)]
    pub udmf: Option<bool>,
    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
pub enum Command {
    Info(InfoArgs),
    List(ListArgs),
    Validate(ValidateArgs),
    Extract(ExtractArgs),
    Rewrite(RewriteArgs),
    RemoveLevel(RemoveLevelArgs),
    StripNodes(StripNodesArgs),
    Find(FindArgs),
    FirstSprite(FirstSpriteArgs),
}

/// print the header, levels and load diagnostics of a WAD
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "info")]
pub struct InfoArgs {
    /// path to the WAD
    #[argh(positional)]
    pub wad: PathBuf,
}

/// list every lump with its size and namespace
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "list")]
pub struct ListArgs {
    /// path to the WAD
    #[argh(positional)]
    pub wad: PathBuf,
}

/// check that files look like WADs
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "validate")]
pub struct ValidateArgs {
    /// files to check
    #[argh(positional)]
    pub paths: Vec<PathBuf>,
}

/// write the payload of a lump to a file. Later lumps shadow earlier ones
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "extract")]
pub struct ExtractArgs {
    /// path to the WAD
    #[argh(positional)]
    pub wad: PathBuf,
    /// lump name
    #[argh(positional)]
    pub lump: String,
    /// file to write the payload to
    #[argh(positional)]
    pub out: PathBuf,
}

/// load and write back a WAD, dropping unreferenced data
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "rewrite")]
pub struct RewriteArgs {
    /// path to the WAD
    #[argh(positional)]
    pub wad: PathBuf,
    /// write here instead of in place
    #[argh(positional)]
    pub out: Option<PathBuf>,
}

/// remove a level and all of its lumps, in place
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "remove-level")]
pub struct RemoveLevelArgs {
    /// path to the WAD
    #[argh(positional)]
    pub wad: PathBuf,
    /// level marker name, e.g. MAP01 or E1M1
    #[argh(positional)]
    pub level: String,
}

/// remove the GL and ZDoom nodes of a level, in place
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "strip-nodes")]
pub struct StripNodesArgs {
    /// path to the WAD
    #[argh(positional)]
    pub wad: PathBuf,
    /// level marker name
    #[argh(positional)]
    pub level: String,
}

/// look a lump up across the game, resource and edit WADs
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "find")]
pub struct FindArgs {
    /// game WAD, searched last
    #[argh(option)]
    pub iwad: Option<PathBuf>,
    /// resource WADs, later ones override earlier ones
    #[argh(option)]
    pub resource: Vec<PathBuf>,
    /// the WAD being edited, searched first
    #[argh(option)]
    pub edit: Option<PathBuf>,
    /// search the sprite namespace instead of the global one
    #[argh(switch)]
    pub sprite: bool,
    /// search the flat namespace instead of the global one
    #[argh(switch)]
    pub flat: bool,
    /// lump name
    #[argh(positional)]
    pub name: String,
}

/// find the first frame of a sprite across the game, resource and edit WADs
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "first-sprite")]
pub struct FirstSpriteArgs {
    /// game WAD, searched last
    #[argh(option)]
    pub iwad: Option<PathBuf>,
    /// resource WADs, later ones override earlier ones
    #[argh(option)]
    pub resource: Vec<PathBuf>,
    /// the WAD being edited, searched first
    #[argh(option)]
    pub edit: Option<PathBuf>,
    /// four letter sprite name, e.g. TROO
    #[argh(positional)]
    pub stem: String,
}

impl Command {
    /// The search order options of the lookup commands
    pub fn search_order(&mut self) -> Option<SearchOrderMut<'_>> {
        match self {
            Command::Find(f) => Some(SearchOrderMut {
                iwad: &mut f.iwad,
                resource: &mut f.resource,
            }),
            Command::FirstSprite(f) => Some(SearchOrderMut {
                iwad: &mut f.iwad,
                resource: &mut f.resource,
            }),
            _ => None,
        }
    }
}

/// Borrowed view of the wads a lookup command searches, so the config can
/// fill in what wasn't given
pub struct SearchOrderMut<'a> {
    pub iwad: &'a mut Option<PathBuf>,
    pub resource: &'a mut Vec<PathBuf>,
}
