use std::cell::OnceCell;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, prelude::*, SeekFrom};
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::atomic::AtomicFileWriter;
use crate::error::{Result, WadError};
use crate::levels::{detect_levels, fix_level_group};
use crate::lumps::{Lump, LumpMut, LumpName, NAME_LEN};
use crate::namespace::{classify_namespaces, Namespace, NamespaceMap, NamespaceWarning};

pub const HEADER_SIZE: usize = 12;
pub const DIR_ENTRY_SIZE: usize = 16;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum WadKind {
    /// Game data
    Iwad,
    /// Patch or add-on
    #[default]
    Pwad,
}

impl WadKind {
    pub fn magic(&self) -> &'static [u8; 4] {
        match self {
            WadKind::Iwad => b"IWAD",
            WadKind::Pwad => b"PWAD",
        }
    }
}

/// How [`Wad::open`] treats the file at the given path. Mirrors `fopen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Must exist and parse. The wad can't be saved back.
    Read,
    /// Start empty. The file is created by the first save.
    Write,
    /// Load the file if it exists, else start empty
    Append,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WadOptions {
    /// Detect levels made of a marker followed by `TEXTMAP`. UDMF support is
    /// unfinished, so this is off unless asked for.
    pub udmf: bool,
}

/// Header which tells us the WAD type and where the directory is
///
/// | Field Size | Data Type    | Content                                              |
/// |------------|--------------|------------------------------------------------------|
/// | 0x00-0x03  | 4 ASCII char | Should be an ASCII string (either "IWAD" or "PWAD")  |
/// | 0x04-0x07  | signed int   | The number entries in the directory                  |
/// | 0x08-0x0b  | signed int   | Offset in bytes to the directory in the WAD file     |
struct WadHeader {
    wad_type: [u8; 4],
    dir_count: i32,
    dir_offset: i32,
}

impl fmt::Debug for WadHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\nWadHeader {{\n  wad_type: {},\n  dir_count: {},\n  dir_offset: {},\n}}",
            String::from_utf8_lossy(&self.wad_type),
            self.dir_count,
            self.dir_offset
        )
    }
}

impl WadHeader {
    fn read(bytes: &[u8]) -> Result<WadHeader> {
        if bytes.len() < HEADER_SIZE {
            return Err(WadError::BadHeader(format!(
                "file is {} bytes, shorter than a header",
                bytes.len()
            )));
        }
        let header = WadHeader {
            wad_type: [bytes[0], bytes[1], bytes[2], bytes[3]],
            dir_count: read_i32(bytes, 4),
            dir_offset: read_i32(bytes, 8),
        };
        if header.dir_count < 0 {
            return Err(WadError::BadHeader(format!(
                "invalid number of entries ({})",
                header.dir_count
            )));
        }
        Ok(header)
    }

    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..4].copy_from_slice(&self.wad_type);
        out[4..8].copy_from_slice(&self.dir_count.to_le_bytes());
        out[8..].copy_from_slice(&self.dir_offset.to_le_bytes());
        out
    }
}

/// Where a lump starts, the size of it, and the name
///
/// | Field Size | Data Type    | Content                                                    |
/// |------------|--------------|------------------------------------------------------------|
/// | 0x00-0x03  | signed int   | Offset value to the start of the lump data in the WAD file |
/// | 0x04-0x07  | signed int   | The size of the lump in bytes                              |
/// | 0x08-0x0f  | 8 ASCII char | Name of the lump, NUL padded, not always NUL terminated    |
struct WadDirectory {
    lump_offset: i32,
    lump_size: i32,
    lump_name: LumpName,
}

impl fmt::Debug for WadDirectory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\nWadDirectory {{\n  lump_name: {},\n  lump_size: {},\n  lump_offset: {},\n}}",
            &self.lump_name, self.lump_size, self.lump_offset
        )
    }
}

impl WadDirectory {
    fn read(bytes: &[u8], offset: usize) -> WadDirectory {
        WadDirectory {
            lump_offset: read_i32(bytes, offset),
            lump_size: read_i32(bytes, offset + 4),
            lump_name: LumpName::from_bytes(&bytes[offset + 8..offset + 8 + NAME_LEN]),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.lump_offset.to_le_bytes());
        out.extend_from_slice(&self.lump_size.to_le_bytes());
        out.extend_from_slice(&self.lump_name.to_raw());
    }
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// A directory entry whose data could not be read. The lump is left out
/// of the wad; the entry is kept so the caller can report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedReadEntry {
    /// Position of the entry in the on-disk directory
    pub index: usize,
    pub name: LumpName,
    pub position: i32,
    pub length: i32,
}

impl fmt::Display for FailedReadEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry #{} {} has invalid position ({}+{})",
            self.index, self.name, self.position, self.length
        )
    }
}

/// A lump index that remembers which version of the directory it came
/// from. Any insert, remove or rename makes older handles stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LumpHandle {
    index: usize,
    generation: u64,
}

impl LumpHandle {
    pub fn index(&self) -> usize {
        self.index
    }
}

/// What the file looked like when we last read or wrote it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DiskSnapshot {
    total_size: u64,
    dir_start: i32,
    dir_count: i32,
    dir_crc: u32,
}

/// "Where's All (the) Data": an ordered list of lumps plus what is derived
/// from their names and positions (levels and namespaces).
///
/// Everything is held in memory. Saving always rewrites the whole file.
pub struct Wad {
    kind: WadKind,
    path: Option<PathBuf>,
    read_only: bool,
    options: WadOptions,
    pub(crate) lumps: Vec<Lump>,
    /// Lump indices of level markers, sorted by marker name
    pub(crate) levels: Vec<usize>,
    /// Rebuilt on demand after any change that can move a marker or empty
    /// a lump
    namespaces: OnceCell<NamespaceMap>,
    failed_reads: Vec<FailedReadEntry>,
    insertion_point: Option<usize>,
    generation: u64,
    snapshot: Option<DiskSnapshot>,
}

impl fmt::Debug for Wad {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "\nWad {{\n  kind: {:?},\n  path: {:?},\n  lumps: {},\n  levels: {},\n}}",
            self.kind,
            self.path,
            self.lumps.len(),
            self.levels.len()
        )
    }
}

impl Default for Wad {
    fn default() -> Self {
        Wad::new()
    }
}

impl Wad {
    /// An empty in-memory PWAD with no path
    pub fn new() -> Wad {
        Wad::new_with(WadOptions::default())
    }

    pub fn new_with(options: WadOptions) -> Wad {
        Wad {
            kind: WadKind::Pwad,
            path: None,
            read_only: false,
            options,
            lumps: Vec::new(),
            levels: Vec::new(),
            namespaces: OnceCell::new(),
            failed_reads: Vec::new(),
            insertion_point: None,
            generation: 0,
            snapshot: None,
        }
    }

    pub fn open<A>(path: A, mode: OpenMode) -> Result<Wad>
    where
        A: Into<PathBuf>,
    {
        Wad::open_with(path, mode, WadOptions::default())
    }

    pub fn open_with<A>(path: A, mode: OpenMode, options: WadOptions) -> Result<Wad>
    where
        A: Into<PathBuf>,
    {
        let path = path.into();

        if mode == OpenMode::Write {
            info!("Creating new WAD file: {path:?}");
            let mut wad = Wad::new_with(options);
            wad.path = Some(path);
            return Ok(wad);
        }

        info!("Opening WAD file: {path:?}");
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if mode == OpenMode::Append && e.kind() == io::ErrorKind::NotFound => {
                info!("Creating new WAD file: {path:?}");
                let mut wad = Wad::new_with(options);
                wad.path = Some(path);
                return Ok(wad);
            }
            Err(e) => return Err(WadError::io(path, e)),
        };

        let mut wad = Wad::parse_with(&bytes, options)?;
        wad.read_only = match mode {
            OpenMode::Read => true,
            _ => {
                let read_only = fs::metadata(&path)
                    .map(|m| m.permissions().readonly())
                    .unwrap_or(true);
                if read_only {
                    info!("{path:?} is not writable, opened in read mode");
                }
                read_only
            }
        };
        wad.path = Some(path);
        Ok(wad)
    }

    pub fn parse(bytes: &[u8]) -> Result<Wad> {
        Wad::parse_with(bytes, WadOptions::default())
    }

    /// Read a whole WAD image. A bad header or directory fails the load;
    /// a directory entry pointing outside the file only drops that lump.
    pub fn parse_with(bytes: &[u8], options: WadOptions) -> Result<Wad> {
        let header = WadHeader::read(bytes)?;
        debug!("{header:?}");

        let dir_count = header.dir_count as usize;
        let dir_start = usize::try_from(header.dir_offset).map_err(|_| {
            WadError::BadDirectory(format!("negative directory offset ({})", header.dir_offset))
        })?;
        let dir_end = dir_count
            .checked_mul(DIR_ENTRY_SIZE)
            .and_then(|len| len.checked_add(dir_start))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                WadError::BadDirectory(format!(
                    "{dir_count} entries at offset {dir_start} run past the end of the file ({} bytes)",
                    bytes.len()
                ))
            })?;

        let mut wad = Wad::new_with(options);
        wad.kind = if &header.wad_type == WadKind::Iwad.magic() {
            WadKind::Iwad
        } else {
            WadKind::Pwad
        };
        wad.lumps.reserve_exact(dir_count);

        for index in 0..dir_count {
            let dir = WadDirectory::read(bytes, dir_start + index * DIR_ENTRY_SIZE);

            if dir.lump_size == 0 {
                wad.lumps.push(Lump::from_parts(dir.lump_name, Vec::new()));
                continue;
            }

            let range = usize::try_from(dir.lump_offset)
                .ok()
                .zip(usize::try_from(dir.lump_size).ok())
                .and_then(|(start, len)| Some(start..start.checked_add(len)?))
                .filter(|range| range.end <= bytes.len());

            match range {
                Some(range) => wad
                    .lumps
                    .push(Lump::from_parts(dir.lump_name, bytes[range].to_vec())),
                None => {
                    let failed = FailedReadEntry {
                        index,
                        name: dir.lump_name,
                        position: dir.lump_offset,
                        length: dir.lump_size,
                    };
                    warn!("Skipping lump: {failed} (file is {} bytes)", bytes.len());
                    wad.failed_reads.push(failed);
                }
            }
        }

        wad.levels = detect_levels(&wad.lumps, options.udmf);
        wad.snapshot = Some(DiskSnapshot {
            total_size: bytes.len() as u64,
            dir_start: header.dir_offset,
            dir_count: header.dir_count,
            dir_crc: crc32fast::hash(&bytes[dir_start..dir_end]),
        });
        debug!("Loaded directory, {} lumps", wad.lumps.len());
        Ok(wad)
    }

    /// Cheap check that a file looks like a WAD: the magic must end in
    /// `WAD`, the first letter is not checked.
    pub fn validate<P: AsRef<Path>>(path: P) -> bool {
        let mut magic = [0u8; 4];
        File::open(path)
            .and_then(|mut file| file.read_exact(&mut magic))
            .is_ok()
            && Wad::validate_bytes(&magic)
    }

    pub fn validate_bytes(bytes: &[u8]) -> bool {
        bytes.len() >= 4 && &bytes[1..4] == b"WAD"
    }

    pub fn kind(&self) -> WadKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: WadKind) {
        self.kind = kind;
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn options(&self) -> WadOptions {
        self.options
    }

    pub fn num_lumps(&self) -> usize {
        self.lumps.len()
    }

    pub fn lump(&self, index: usize) -> Option<&Lump> {
        self.lumps.get(index)
    }

    pub fn lump_mut(&mut self, index: usize) -> Option<LumpMut<'_>> {
        self.namespaces.take();
        self.lumps.get_mut(index).map(LumpMut::new)
    }

    pub fn lumps(&self) -> impl Iterator<Item = &Lump> {
        self.lumps.iter()
    }

    /// Directory entries that were skipped on load
    pub fn failed_read_entries(&self) -> &[FailedReadEntry] {
        &self.failed_reads
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle(&self, index: usize) -> Option<LumpHandle> {
        (index < self.lumps.len()).then_some(LumpHandle {
            index,
            generation: self.generation,
        })
    }

    /// The lump a handle points at, or `None` if the directory has been
    /// edited since the handle was made
    pub fn get(&self, handle: LumpHandle) -> Option<&Lump> {
        if handle.generation != self.generation {
            return None;
        }
        self.lumps.get(handle.index)
    }

    fn namespace_map(&self) -> &NamespaceMap {
        self.namespaces
            .get_or_init(|| classify_namespaces(&self.lumps))
    }

    pub fn namespace_of(&self, index: usize) -> Namespace {
        self.namespace_map()
            .namespaces
            .get(index)
            .copied()
            .unwrap_or_default()
    }

    pub fn namespace_warnings(&self) -> &[NamespaceWarning] {
        &self.namespace_map().warnings
    }

    /// Index of the last lump with this name. Later lumps shadow earlier
    /// ones, as in the engine.
    pub fn find_lump_num(&self, name: &str) -> Option<usize> {
        self.lumps.iter().rposition(|l| l.name().matches(name))
    }

    pub fn find_lump(&self, name: &str) -> Option<&Lump> {
        self.find_lump_num(name).map(|k| &self.lumps[k])
    }

    pub fn find_lump_num_in_namespace(&self, name: &str, namespace: Namespace) -> Option<usize> {
        let map = self.namespace_map();
        self.lumps
            .iter()
            .zip(&map.namespaces)
            .rposition(|(l, ns)| *ns == namespace && l.name().matches(name))
    }

    pub fn find_lump_in_namespace(&self, name: &str, namespace: Namespace) -> Option<&Lump> {
        self.find_lump_num_in_namespace(name, namespace)
            .map(|k| &self.lumps[k])
    }

    /// The sprite lump with the alphabetically smallest name starting with
    /// `stem`, which is frame A of a rotation set when there is one
    pub fn find_first_sprite_lump(&self, stem: &str) -> Option<usize> {
        let map = self.namespace_map();
        let mut found: Option<usize> = None;
        for (k, lump) in self.lumps.iter().enumerate().rev() {
            if map.namespaces[k] != Namespace::Sprites || !lump.name().starts_with(stem) {
                continue;
            }
            if found.is_none_or(|f| lump.name() < self.lumps[f].name()) {
                found = Some(k);
            }
        }
        found
    }

    /// The next added lump goes before `index`, and the point then moves
    /// past it. `None` appends. A point past the end is treated as `None`.
    pub fn set_insertion_point(&mut self, index: Option<usize>) {
        self.insertion_point = index;
    }

    pub fn insertion_point(&self) -> Option<usize> {
        self.insertion_point
    }

    pub fn add_lump(&mut self, name: &str) -> LumpMut<'_> {
        self.add_lump_with_capacity(name, 0)
    }

    /// Add an empty lump at the insertion point, reserving `size_hint`
    /// bytes for the data about to be written into it
    pub fn add_lump_with_capacity(&mut self, name: &str, size_hint: usize) -> LumpMut<'_> {
        let position = self
            .insertion_point
            .filter(|&p| p < self.lumps.len())
            .unwrap_or(self.lumps.len());
        self.insert_lump(position, name).reserve(size_hint);
        LumpMut::new(&mut self.lumps[position])
    }

    /// # Panics
    /// If `position > num_lumps()`.
    pub fn insert_lump(&mut self, position: usize, name: &str) -> LumpMut<'_> {
        self.lumps.insert(position, Lump::new(name));
        self.reindex_after_edit(position, 1, 0);
        LumpMut::new(&mut self.lumps[position])
    }

    /// Remove `count` lumps starting at `index`. Indices of later lumps and
    /// levels move down, and the insertion point is reset.
    ///
    /// # Panics
    /// If the range is out of bounds.
    pub fn remove_lumps(&mut self, index: usize, count: usize) {
        self.lumps.drain(index..index + count);
        self.reindex_after_edit(index, 0, count);
    }

    pub fn rename_lump(&mut self, index: usize, name: &str) {
        self.lumps[index].set_name(name);
        self.reindex_after_edit(index, 0, 0);
    }

    /// Keeps everything derived from lump positions correct after
    /// `removed` lumps at `position` were replaced by `inserted` new ones.
    fn reindex_after_edit(&mut self, position: usize, inserted: usize, removed: usize) {
        fix_level_group(&mut self.levels, position, inserted, removed);

        // The edit can break a marker that survived the shift, or complete
        // one anywhere near it
        let fresh = detect_levels(&self.lumps, self.options.udmf);
        if fresh != self.levels {
            debug!("Edit at {position} changed the levels, {} now", fresh.len());
        }
        self.levels = fresh;

        if removed > 0 {
            self.insertion_point = None;
        } else if let Some(point) = self.insertion_point.as_mut() {
            if *point >= position {
                *point += inserted;
            }
        }

        self.namespaces.take();
        self.generation += 1;
    }

    /// Exact size of the file [`Wad::serialize_to`] would write
    pub fn total_size(&self) -> u64 {
        let data: u64 = self.lumps.iter().map(|l| l.len() as u64).sum();
        (HEADER_SIZE + DIR_ENTRY_SIZE * self.lumps.len()) as u64 + data
    }

    /// The header and directory for a contiguous layout: all lump data from
    /// offset 12 in directory order, then the directory.
    fn layout(&self) -> Result<(WadHeader, Vec<u8>)> {
        let total = self.total_size();
        if total > i32::MAX as u64 {
            return Err(WadError::TooLarge(total));
        }

        let mut directory = Vec::with_capacity(DIR_ENTRY_SIZE * self.lumps.len());
        let mut offset = HEADER_SIZE as i32;
        for lump in &self.lumps {
            let size = lump.len() as i32;
            WadDirectory {
                lump_offset: if size == 0 { 0 } else { offset },
                lump_size: size,
                lump_name: lump.name(),
            }
            .write(&mut directory);
            offset += size;
        }

        let header = WadHeader {
            wad_type: *self.kind.magic(),
            dir_count: self.lumps.len() as i32,
            dir_offset: offset,
        };
        Ok((header, directory))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let (header, directory) = self.layout()?;
        let mut out = Vec::with_capacity(self.total_size() as usize);
        out.extend_from_slice(&header.to_bytes());
        for lump in &self.lumps {
            out.extend_from_slice(lump.data());
        }
        out.extend_from_slice(&directory);
        Ok(out)
    }

    /// Write the whole wad to `path`. The file is replaced atomically, so a
    /// crash mid-save leaves the old file intact.
    pub fn serialize_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_file(path.as_ref()).map(|_| ())
    }

    fn write_file(&self, path: &Path) -> Result<DiskSnapshot> {
        let (header, directory) = self.layout()?;
        debug!("Writing {path:?}: {header:?}");

        let mut out = AtomicFileWriter::new(path);
        out.open()?;
        out.write(&header.to_bytes())?;
        for lump in &self.lumps {
            out.write(lump.data())?;
        }
        out.write(&directory)?;
        out.commit()?;

        Ok(DiskSnapshot {
            total_size: self.total_size(),
            dir_start: header.dir_offset,
            dir_count: header.dir_count,
            dir_crc: crc32fast::hash(&directory),
        })
    }

    /// Write back to the path the wad was opened with
    pub fn save(&mut self) -> Result<()> {
        let path = self.path.clone().ok_or(WadError::NoPath)?;
        if self.read_only {
            return Err(WadError::ReadOnly(path));
        }
        info!("Saving WAD file: {path:?}");
        self.snapshot = Some(self.write_file(&path)?);
        self.insertion_point = None;
        Ok(())
    }

    /// Whether another program changed the file since it was loaded or
    /// saved: size, directory position and count, and a CRC of the raw
    /// directory are compared.
    pub fn was_externally_modified(&self) -> Result<bool> {
        let (Some(path), Some(snapshot)) = (self.path.as_deref(), self.snapshot) else {
            return Ok(false);
        };
        let err = |e| WadError::io(path, e);

        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(err(e)),
        };
        if file.metadata().map_err(err)?.len() != snapshot.total_size {
            return Ok(true);
        }

        let mut raw = [0u8; HEADER_SIZE];
        file.read_exact(&mut raw).map_err(err)?;
        let header = WadHeader::read(&raw)?;
        if header.dir_offset != snapshot.dir_start || header.dir_count != snapshot.dir_count {
            return Ok(true);
        }

        let mut directory = vec![0u8; header.dir_count as usize * DIR_ENTRY_SIZE];
        file.seek(SeekFrom::Start(header.dir_offset as u64))
            .map_err(err)?;
        file.read_exact(&mut directory).map_err(err)?;
        Ok(crc32fast::hash(&directory) != snapshot.dir_crc)
    }

    /// Copy the file as it is on disk to `dest`
    pub fn backup<P: AsRef<Path>>(&self, dest: P) -> Result<()> {
        let path = self.path.as_deref().ok_or(WadError::NoPath)?;
        fs::copy(path, dest.as_ref()).map_err(|e| WadError::io(dest.as_ref(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn sample() -> Wad {
        let mut wad = Wad::new();
        wad.add_lump("PLAYPAL").set_data(vec![0u8; 768]);
        wad.add_lump("MAP01");
        for name in ["THINGS", "LINEDEFS", "SIDEDEFS", "VERTEXES", "SECTORS"] {
            wad.add_lump(name).set_data(name.as_bytes());
        }
        wad.add_lump("S_START");
        wad.add_lump("TROOA1").set_data(vec![1, 2, 3]);
        wad.add_lump("S_END");
        wad
    }

    /// Header + directory for hand-made test files
    fn raw_wad(magic: &[u8; 4], entries: &[(i32, i32, &[u8; 8])], data: &[u8]) -> Vec<u8> {
        let dir_offset = (HEADER_SIZE + data.len()) as i32;
        let mut out = WadHeader {
            wad_type: *magic,
            dir_count: entries.len() as i32,
            dir_offset,
        }
        .to_bytes()
        .to_vec();
        out.extend_from_slice(data);
        for (pos, size, name) in entries {
            out.extend_from_slice(&pos.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
            out.extend_from_slice(*name);
        }
        out
    }

    #[test]
    fn empty_wad_end_to_end() {
        let mut wad = Wad::new();
        assert_eq!(wad.kind(), WadKind::Pwad);
        for name in ["MAP01", "THINGS", "LINEDEFS", "SIDEDEFS", "VERTEXES", "SECTORS"] {
            wad.add_lump(name);
        }
        assert_eq!(wad.levels(), &[0]);
        assert_eq!(wad.level_format(0), crate::MapFormat::Doom);
        assert_eq!(wad.total_size(), 12 + 6 * 16);
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.wad");
        let wad = sample();
        wad.serialize_to(&path).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), wad.total_size());
        assert!(Wad::validate(&path));

        let loaded = Wad::open(&path, OpenMode::Read).unwrap();
        assert!(loaded.is_read_only());
        assert_eq!(loaded.lumps().collect::<Vec<_>>(), wad.lumps().collect::<Vec<_>>());
        assert_eq!(loaded.levels(), wad.levels());
        assert!(loaded.failed_read_entries().is_empty());
        assert_eq!(fs::read(&path).unwrap(), wad.to_bytes().unwrap());
    }

    #[test]
    fn iwad_kind_kept() {
        let bytes = raw_wad(b"IWAD", &[(12, 2, b"ENDOOM\0\0")], &[7, 8]);
        let wad = Wad::parse(&bytes).unwrap();
        assert_eq!(wad.kind(), WadKind::Iwad);
        assert_eq!(wad.find_lump("endoom").unwrap().data(), &[7, 8]);
        assert_eq!(&wad.to_bytes().unwrap()[..4], b"IWAD");
    }

    #[test]
    fn oversized_entry_is_skipped() {
        let bytes = raw_wad(
            b"PWAD",
            &[(12, 4, b"GOOD\0\0\0\0"), (14, 4000, b"BAD\0\0\0\0\0"), (0, 0, b"EMPTY\0\0\0")],
            &[1, 2, 3, 4],
        );
        let wad = Wad::parse(&bytes).unwrap();
        assert_eq!(wad.num_lumps(), 2);
        assert_eq!(
            wad.failed_read_entries(),
            &[FailedReadEntry {
                index: 1,
                name: LumpName::new("BAD"),
                position: 14,
                length: 4000,
            }]
        );
        let bytes = raw_wad(b"PWAD", &[(-5, 4, b"NEG\0\0\0\0\0")], &[1, 2, 3, 4]);
        assert_eq!(Wad::parse(&bytes).unwrap().failed_read_entries().len(), 1);
    }

    #[test]
    fn bad_header_and_directory_are_fatal() {
        assert!(matches!(Wad::parse(b"PWAD"), Err(WadError::BadHeader(_))));

        let mut bytes = raw_wad(b"PWAD", &[], &[]);
        bytes[4..8].copy_from_slice(&(-1i32).to_le_bytes());
        assert!(matches!(Wad::parse(&bytes), Err(WadError::BadHeader(_))));

        let mut bytes = raw_wad(b"PWAD", &[(12, 0, b"A\0\0\0\0\0\0\0")], &[]);
        bytes[4..8].copy_from_slice(&2i32.to_le_bytes());
        assert!(matches!(Wad::parse(&bytes), Err(WadError::BadDirectory(_))));
    }

    #[test]
    fn validate_magic() {
        assert!(Wad::validate_bytes(b"IWAD"));
        assert!(Wad::validate_bytes(b"xWAD...."));
        assert!(!Wad::validate_bytes(b"WAD"));
        assert!(!Wad::validate_bytes(b"PWAF"));
        assert!(!Wad::validate("/nonexistent/file.wad"));
    }

    #[test]
    fn open_modes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("new.wad");

        assert!(matches!(Wad::open(&path, OpenMode::Read), Err(WadError::Io { .. })));

        let mut wad = Wad::open(&path, OpenMode::Write).unwrap();
        assert!(!path.exists());
        wad.add_lump("DEMO1").set_data(vec![9; 10]);
        wad.save().unwrap();
        assert!(path.exists());

        let mut wad = Wad::open(&path, OpenMode::Append).unwrap();
        assert!(!wad.is_read_only());
        assert_eq!(wad.num_lumps(), 1);
        wad.add_lump("DEMO2");
        wad.save().unwrap();

        let mut wad = Wad::open(&path, OpenMode::Read).unwrap();
        assert_eq!(wad.num_lumps(), 2);
        assert!(matches!(wad.save(), Err(WadError::ReadOnly(_))));

        let wad = Wad::open(dir.path().join("other.wad"), OpenMode::Append).unwrap();
        assert_eq!(wad.num_lumps(), 0);
        assert!(matches!(Wad::new().save(), Err(WadError::NoPath)));
    }

    #[test]
    fn last_match_wins() {
        let mut wad = Wad::new();
        wad.add_lump("TEXTURE1").set_data(vec![1]);
        wad.add_lump("PNAMES");
        wad.add_lump("texture1").set_data(vec![2]);
        assert_eq!(wad.find_lump_num("Texture1"), Some(2));
        assert_eq!(wad.find_lump("TEXTURE1").unwrap().data(), &[2]);
        assert_eq!(wad.find_lump_num("TEXTURE2"), None);
    }

    #[test]
    fn namespace_lookups() {
        let mut wad = sample();
        wad.add_lump("TROOA1").set_data(vec![4]);
        assert_eq!(wad.namespace_of(8), Namespace::Sprites);
        assert_eq!(wad.namespace_of(7), Namespace::Global);
        assert_eq!(wad.namespace_of(9), Namespace::Global);
        assert_eq!(wad.find_lump_num_in_namespace("TROOA1", Namespace::Sprites), Some(8));
        assert_eq!(wad.find_lump_num_in_namespace("TROOA1", Namespace::Global), Some(10));
        assert!(wad.find_lump_in_namespace("PLAYPAL", Namespace::Sprites).is_none());
        assert!(wad.namespace_warnings().is_empty());
    }

    #[test]
    fn namespaces_follow_data_changes() {
        let mut wad = Wad::new();
        wad.add_lump("F_START");
        wad.add_lump("FLAT1");
        wad.add_lump("F_END");
        assert_eq!(wad.namespace_of(1), Namespace::Global);
        assert_eq!(wad.namespace_warnings().len(), 1);

        wad.lump_mut(1).unwrap().set_data(vec![0; 4096]);
        assert_eq!(wad.namespace_of(1), Namespace::Flats);
        assert!(wad.namespace_warnings().is_empty());
    }

    #[test]
    fn first_sprite_is_alphabetical() {
        let mut wad = Wad::new();
        wad.add_lump("S_START");
        for name in ["TROOC1", "TROOA1", "TROOB1", "POSSA1"] {
            wad.add_lump(name).set_data(vec![1]);
        }
        wad.add_lump("S_END");
        assert_eq!(wad.find_first_sprite_lump("TROO"), Some(2));
        assert_eq!(wad.find_first_sprite_lump("SARG"), None);
    }

    #[test]
    fn insertion_point_moves() {
        let mut wad = Wad::new();
        wad.add_lump("A");
        wad.add_lump("D");
        wad.set_insertion_point(Some(1));
        wad.add_lump("B");
        wad.add_lump("C");
        let names: Vec<String> = wad.lumps().map(|l| l.name().to_string()).collect();
        assert_eq!(names, ["A", "B", "C", "D"]);
        assert_eq!(wad.insertion_point(), Some(3));

        // stale point falls back to the end
        wad.set_insertion_point(Some(40));
        wad.add_lump("E");
        assert_eq!(wad.lump(4).unwrap().name(), "E");

        wad.set_insertion_point(Some(0));
        wad.remove_lumps(1, 1);
        assert_eq!(wad.insertion_point(), None);
    }

    #[test]
    fn level_indices_follow_inserts() {
        let mut wad = sample();
        assert_eq!(wad.levels(), &[1]);
        wad.insert_lump(0, "DEMO1");
        assert_eq!(wad.levels(), &[2]);
        // splitting the run breaks the level
        wad.insert_lump(4, "DEMO2");
        assert!(wad.levels().is_empty());
        wad.remove_lumps(4, 1);
        assert_eq!(wad.levels(), &[2]);
        wad.rename_lump(2, "e1m1");
        assert_eq!(wad.lump(2).unwrap().name(), "E1M1");
        assert_eq!(wad.level_find("E1M1"), Some(0));
    }

    #[test]
    fn handles_go_stale() {
        let mut wad = sample();
        let handle = wad.find_lump_num("PLAYPAL").and_then(|k| wad.handle(k)).unwrap();
        assert_eq!(wad.get(handle).unwrap().name(), "PLAYPAL");
        wad.lump_mut(0).unwrap().append(&[1]);
        assert!(wad.get(handle).is_some());
        wad.add_lump("ENDOOM");
        assert!(wad.get(handle).is_none());
        assert!(wad.handle(99).is_none());
    }

    #[test]
    fn external_modification() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mod.wad");
        let mut wad = Wad::open(&path, OpenMode::Write).unwrap();
        assert!(!wad.was_externally_modified().unwrap());
        wad.add_lump("ONE").set_data(vec![1; 8]);
        wad.save().unwrap();
        assert!(!wad.was_externally_modified().unwrap());

        let reopened = Wad::open(&path, OpenMode::Append).unwrap();
        assert!(!reopened.was_externally_modified().unwrap());

        // same size, different name in the directory
        let mut other = Wad::new();
        other.add_lump("TWO").set_data(vec![1; 8]);
        other.serialize_to(&path).unwrap();
        assert!(wad.was_externally_modified().unwrap());

        fs::remove_file(&path).unwrap();
        assert!(wad.was_externally_modified().unwrap());
    }

    #[test]
    fn backup_copies_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orig.wad");
        sample().serialize_to(&path).unwrap();
        let wad = Wad::open(&path, OpenMode::Read).unwrap();
        let copy = dir.path().join("orig.bak");
        wad.backup(&copy).unwrap();
        assert_eq!(fs::read(&path).unwrap(), fs::read(&copy).unwrap());
    }

    #[test]
    fn levels_built_lump_by_lump() {
        let mut wad = Wad::new();
        for n in (1..=40).rev() {
            wad.add_level(&format!("MAP{n:02}"));
            for name in ["THINGS", "LINEDEFS", "SIDEDEFS", "VERTEXES", "SEGS", "SECTORS"] {
                wad.add_lump(name);
            }
        }
        assert_eq!(wad.level_count(), 40);
        assert_eq!(wad.level_header(0), 39 * 7);
        assert_eq!(wad.level_find("MAP40"), Some(39));
        assert_eq!(wad.levels(), detect_levels(&wad.lumps, false).as_slice());
    }

    fn lump_entry() -> impl Strategy<Value = (String, Vec<u8>)> {
        (
            "[A-Z0-9_\\[\\]-]{1,8}",
            prop_oneof![Just(vec![]), prop::collection::vec(any::<u8>(), 0..64)],
        )
    }

    proptest! {
        #[test]
        fn any_wad_survives_a_round_trip(entries in prop::collection::vec(lump_entry(), 0..40)) {
            let mut wad = Wad::new();
            for (name, data) in &entries {
                wad.add_lump(name).set_data(data.as_slice());
            }

            let bytes = wad.to_bytes().unwrap();
            prop_assert_eq!(bytes.len() as u64, wad.total_size());

            let loaded = Wad::parse(&bytes).unwrap();
            prop_assert!(loaded.failed_read_entries().is_empty());
            prop_assert_eq!(loaded.lumps().collect::<Vec<_>>(), wad.lumps().collect::<Vec<_>>());
            prop_assert_eq!(loaded.levels(), wad.levels());
            prop_assert_eq!(loaded.to_bytes().unwrap(), bytes);
        }
    }
}
