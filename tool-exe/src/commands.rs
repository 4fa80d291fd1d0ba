//! One function per subcommand. Everything goes through the public `wad`
//! API; output is plain text on stdout.

use std::cell::RefCell;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::{info, warn};
use wad::{FoundLump, MasterDirectory, OpenMode, SharedWad, Wad, WadOptions};

use crate::cli::{
    ExtractArgs, FindArgs, FirstSpriteArgs, InfoArgs, ListArgs, RemoveLevelArgs, RewriteArgs,
    StripNodesArgs, ValidateArgs,
};

type CmdResult = Result<(), Box<dyn Error>>;

pub fn info(args: &InfoArgs, options: WadOptions) -> CmdResult {
    let wad = Wad::open_with(&args.wad, OpenMode::Read, options)?;

    println!("{}: {:?}", args.wad.display(), wad.kind());
    println!("  lumps: {}", wad.num_lumps());
    println!("  size:  {} bytes when written", wad.total_size());
    println!("  levels: {}", wad.level_count());
    for level in 0..wad.level_count() {
        let header = wad.level_header(level);
        println!(
            "    {:<8} #{:<5} {:?}, {} lumps",
            wad.lump(header).map(|l| l.name().to_string()).unwrap_or_default(),
            header,
            wad.level_format(level),
            wad.level_last_lump(level) - header + 1,
        );
    }

    if !wad.failed_read_entries().is_empty() {
        println!("  unreadable directory entries:");
        for entry in wad.failed_read_entries() {
            println!("    {entry}");
        }
    }
    if !wad.namespace_warnings().is_empty() {
        println!("  namespace problems:");
        for warning in wad.namespace_warnings() {
            println!("    {warning}");
        }
    }
    Ok(())
}

pub fn list(args: &ListArgs, options: WadOptions) -> CmdResult {
    let wad = Wad::open_with(&args.wad, OpenMode::Read, options)?;
    for (k, lump) in wad.lumps().enumerate() {
        println!(
            "{k:>5} {:<8} {:>9} {}",
            lump.name(),
            lump.len(),
            wad.namespace_of(k)
        );
    }
    Ok(())
}

pub fn validate(args: &ValidateArgs) -> CmdResult {
    let mut bad = 0;
    for path in &args.paths {
        let ok = Wad::validate(path);
        if !ok {
            bad += 1;
        }
        println!("{}: {}", path.display(), if ok { "ok" } else { "not a WAD" });
    }
    if bad > 0 {
        return Err(format!("{bad} of {} files are not WADs", args.paths.len()).into());
    }
    Ok(())
}

pub fn extract(args: &ExtractArgs, options: WadOptions) -> CmdResult {
    let wad = Wad::open_with(&args.wad, OpenMode::Read, options)?;
    let lump = wad
        .find_lump(&args.lump)
        .ok_or_else(|| format!("no lump {} in {}", args.lump, args.wad.display()))?;
    fs::write(&args.out, lump.data())?;
    info!("Wrote {} bytes to {:?}", lump.len(), args.out);
    Ok(())
}

pub fn rewrite(args: &RewriteArgs, options: WadOptions) -> CmdResult {
    match &args.out {
        Some(out) => {
            let wad = Wad::open_with(&args.wad, OpenMode::Read, options)?;
            wad.serialize_to(out)?;
        }
        None => {
            let mut wad = Wad::open_with(&args.wad, OpenMode::Append, options)?;
            wad.save()?;
        }
    }
    Ok(())
}

/// Open for editing, refusing files that can't be written back
fn open_for_edit(path: &Path, options: WadOptions) -> Result<Wad, Box<dyn Error>> {
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()).into());
    }
    let wad = Wad::open_with(path, OpenMode::Append, options)?;
    if wad.is_read_only() {
        return Err(format!("{} is read-only", path.display()).into());
    }
    Ok(wad)
}

fn find_level(wad: &Wad, name: &str) -> Result<usize, Box<dyn Error>> {
    wad.level_find(name)
        .or_else(|| name.parse().ok().and_then(|n| wad.level_find_by_number(n)))
        .ok_or_else(|| format!("no level {name}").into())
}

pub fn remove_level(args: &RemoveLevelArgs, options: WadOptions) -> CmdResult {
    let mut wad = open_for_edit(&args.wad, options)?;
    let level = find_level(&wad, &args.level)?;
    wad.remove_level(level);
    wad.save()?;
    Ok(())
}

pub fn strip_nodes(args: &StripNodesArgs, options: WadOptions) -> CmdResult {
    let mut wad = open_for_edit(&args.wad, options)?;
    let level = find_level(&wad, &args.level)?;
    let before = wad.num_lumps();

    wad.remove_gl_nodes(level);
    wad.remove_znodes(level);

    info!("Removed {} lumps", before - wad.num_lumps());
    wad.save()?;
    Ok(())
}

fn open_shared(path: &Path, options: WadOptions) -> Result<SharedWad, Box<dyn Error>> {
    Ok(Rc::new(RefCell::new(Wad::open_with(
        path,
        OpenMode::Read,
        options,
    )?)))
}

fn build_directory(
    iwad: &Option<PathBuf>,
    resources: &[PathBuf],
    edit: &Option<PathBuf>,
    options: WadOptions,
) -> Result<MasterDirectory, Box<dyn Error>> {
    let mut dir = MasterDirectory::new();
    if let Some(iwad) = iwad {
        dir.set_game_wad(open_shared(iwad, options)?);
    }
    for path in resources {
        if dir.contains_path(path) {
            warn!("{path:?} is already loaded, skipping");
            continue;
        }
        dir.add_resource_wad(open_shared(path, options)?);
    }
    if let Some(edit) = edit {
        if dir.contains_path(edit) {
            return Err(format!("{} is already loaded as a resource", edit.display()).into());
        }
        dir.set_edit_wad(open_shared(edit, options)?);
    }
    if dir.is_empty() {
        return Err("no WADs to search, pass --iwad or set one in the config".into());
    }
    Ok(dir)
}

fn print_found(found: &FoundLump) {
    let wad = found.wad.borrow();
    let path = wad
        .path()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if let Some(lump) = found.lump() {
        println!("{} #{} in {path} ({} bytes)", lump.name(), found.index(), lump.len());
    }
}

pub fn find(args: &FindArgs, options: WadOptions) -> CmdResult {
    let dir = build_directory(&args.iwad, &args.resource, &args.edit, options)?;
    let found = if args.sprite {
        dir.find_sprite_lump(&args.name)
    } else if args.flat {
        dir.find_flat_lump(&args.name)
    } else {
        dir.find_global_lump(&args.name)
    };
    let found = found.ok_or_else(|| format!("{} not found", args.name))?;
    print_found(&found);
    Ok(())
}

pub fn first_sprite(args: &FirstSpriteArgs, options: WadOptions) -> CmdResult {
    let dir = build_directory(&args.iwad, &args.resource, &args.edit, options)?;
    let found = dir
        .find_first_sprite_lump(&args.stem)
        .ok_or_else(|| format!("no sprite starting with {}", args.stem))?;
    print_found(&found);
    Ok(())
}
