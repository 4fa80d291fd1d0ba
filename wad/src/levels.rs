//! Level detection and the level operations of a [`Wad`].
//!
//! A level is not stored anywhere as such. It is a marker lump (`E1M1`,
//! `MAP01`, anything really) followed by a run of map lumps, so the list of
//! levels is derived from lump names and positions alone.

use log::debug;

use crate::lumps::{Lump, LumpMut};
use crate::wad::Wad;

/// Hard cap on the length of one level's run of lumps, marker included
pub const MAX_LUMPS_IN_A_LEVEL: usize = 21;

/// The lumps that may follow a level marker, in the order id's tools wrote
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapLump {
    /// Position and angle for all monster, powerup and spawn location
    Things,
    /// Lines between two vertexes, pointing at one or two `SideDefs`
    LineDefs,
    /// Wall textures and offsets for one side of a `LineDef`
    SideDefs,
    /// Signed X, Y pairs; every other map lump indexes into this
    Vertexes,
    /// Portions of lines cut by the node builder
    Segs,
    /// Convex runs of `Segs`
    SubSectors,
    /// BSP tree with segs, nodes and sub-sector leaves
    Nodes,
    /// Floor and ceiling heights, flats, light level
    Sectors,
    /// Sector-to-sector visibility matrix
    Reject,
    /// Grid of `LineDefs` used for collision detection
    Blockmap,
    /// Hexen ACS bytecode
    Behavior,
    /// Hexen ACS source
    Scripts,
}

impl MapLump {
    const ALL: [MapLump; 12] = [
        MapLump::Things,
        MapLump::LineDefs,
        MapLump::SideDefs,
        MapLump::Vertexes,
        MapLump::Segs,
        MapLump::SubSectors,
        MapLump::Nodes,
        MapLump::Sectors,
        MapLump::Reject,
        MapLump::Blockmap,
        MapLump::Behavior,
        MapLump::Scripts,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MapLump::Things => "THINGS",
            MapLump::LineDefs => "LINEDEFS",
            MapLump::SideDefs => "SIDEDEFS",
            MapLump::Vertexes => "VERTEXES",
            MapLump::Segs => "SEGS",
            MapLump::SubSectors => "SSECTORS",
            MapLump::Nodes => "NODES",
            MapLump::Sectors => "SECTORS",
            MapLump::Reject => "REJECT",
            MapLump::Blockmap => "BLOCKMAP",
            MapLump::Behavior => "BEHAVIOR",
            MapLump::Scripts => "SCRIPTS",
        }
    }

    pub fn from_lump(lump: &Lump) -> Option<MapLump> {
        let name = lump.name();
        Self::ALL.into_iter().find(|part| name.matches(part.name()))
    }

    /// The four of these that must directly follow a marker to call it a
    /// level. Anything else (nodes, reject...) can be rebuilt.
    fn detection_bit(&self) -> Option<u8> {
        match self {
            MapLump::Things => Some(1 << 0),
            MapLump::LineDefs => Some(1 << 1),
            MapLump::SideDefs => Some(1 << 2),
            MapLump::Vertexes => Some(1 << 3),
            MapLump::Sectors => Some(1 << 4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    Doom,
    Hexen,
    Udmf,
}

fn is_gl_node_lump(lump: &Lump) -> bool {
    lump.name().starts_with("GL_")
}

/// Whether the lump at `k` is followed by what makes it a level marker.
///
/// With `udmf` set a following `TEXTMAP` is enough. Otherwise the next four
/// lumps must be four different ones out of THINGS, LINEDEFS, SIDEDEFS,
/// VERTEXES and SECTORS, in any order. The test is lax on purpose, some
/// wads store those lumps in a non-standard order.
///
/// A map lump is never a marker itself, or the THINGS of a level would count
/// as a second level whenever the four lumps after it qualify.
pub fn is_level_marker(lumps: &[Lump], k: usize, udmf: bool) -> bool {
    if k + 1 >= lumps.len() || MapLump::from_lump(&lumps[k]).is_some() {
        return false;
    }
    if udmf && lumps[k + 1].name().matches("TEXTMAP") {
        return true;
    }

    let mut part_mask = 0u8;
    let mut part_count = 0;
    for lump in lumps[k + 1..].iter().take(4) {
        let Some(bit) = MapLump::from_lump(lump).and_then(|p| p.detection_bit()) else {
            break;
        };
        if part_mask & bit != 0 {
            break;
        }
        part_mask |= bit;
        part_count += 1;
    }
    part_count == 4
}

/// Every level marker in `lumps`, sorted by marker name so that "next map"
/// and "previous map" don't depend on the directory order.
pub fn detect_levels(lumps: &[Lump], udmf: bool) -> Vec<usize> {
    let mut levels: Vec<usize> = (0..lumps.len())
        .filter(|&k| is_level_marker(lumps, k, udmf))
        .inspect(|&k| debug!("Detected level: {}", lumps[k].name()))
        .collect();
    sort_levels(&mut levels, lumps);
    levels
}

pub(crate) fn sort_levels(levels: &mut [usize], lumps: &[Lump]) {
    levels.sort_by_key(|&k| (lumps[k].name(), k));
}

/// Shift lump indices after `removed` lumps were taken out at `index` and
/// `added` lumps were put in their place. Indices inside the removed range
/// are dropped.
pub(crate) fn fix_level_group(levels: &mut Vec<usize>, index: usize, added: usize, removed: usize) {
    levels.retain(|&k| k < index || k >= index + removed);
    for k in levels.iter_mut().filter(|k| **k >= index) {
        *k = *k + added - removed;
    }
}

/// Last lump index belonging to the level whose marker is at `start`
pub(crate) fn last_lump_of(lumps: &[Lump], start: usize) -> usize {
    let mut count = 1;

    if lumps.get(start + 1).is_some_and(|l| l.name().matches("TEXTMAP")) {
        while count < MAX_LUMPS_IN_A_LEVEL && start + count < lumps.len() {
            let is_end = lumps[start + count].name().matches("ENDMAP");
            count += 1;
            if is_end {
                break;
            }
        }
        return start + count - 1;
    }

    while count < MAX_LUMPS_IN_A_LEVEL
        && start + count < lumps.len()
        && (MapLump::from_lump(&lumps[start + count]).is_some()
            || is_gl_node_lump(&lumps[start + count]))
    {
        count += 1;
    }
    start + count - 1
}

/// Level access. `level` arguments are indices into the sorted level list,
/// not lump indices.
impl Wad {
    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Lump indices of the level markers, in level order
    pub fn levels(&self) -> &[usize] {
        &self.levels
    }

    pub fn level_find(&self, name: &str) -> Option<usize> {
        self.levels
            .iter()
            .position(|&k| self.lumps[k].name().matches(name))
    }

    /// Find a level by number, trying `MAP##` before `E#M#`
    pub fn level_find_by_number(&self, number: u32) -> Option<usize> {
        if number == 0 || number > 99 {
            return None;
        }
        self.level_find(&format!("MAP{number:02}")).or_else(|| {
            let episode = (number / 10).max(1);
            self.level_find(&format!("E{episode}M{}", number % 10))
        })
    }

    pub fn level_find_first(&self) -> Option<usize> {
        (!self.levels.is_empty()).then_some(0)
    }

    /// Lump index of the level's marker
    ///
    /// # Panics
    /// If `level` is out of range.
    pub fn level_header(&self, level: usize) -> usize {
        self.levels[level]
    }

    pub fn level_last_lump(&self, level: usize) -> usize {
        last_lump_of(&self.lumps, self.level_header(level))
    }

    pub fn level_format(&self, level: usize) -> MapFormat {
        let start = self.level_header(level);
        let finish = self.level_last_lump(level);

        if self
            .lumps
            .get(start + 1)
            .is_some_and(|l| l.name().matches("TEXTMAP"))
        {
            return MapFormat::Udmf;
        }
        if self.lumps[start + 1..=finish]
            .iter()
            .any(|l| MapLump::from_lump(l) == Some(MapLump::Behavior))
        {
            return MapFormat::Hexen;
        }
        MapFormat::Doom
    }

    /// Find a lump by name inside one level's run, marker excluded
    pub fn level_lookup_lump(&self, level: usize, name: &str) -> Option<usize> {
        let start = self.level_header(level);
        let finish = self.level_last_lump(level);
        (start + 1..=finish).find(|&k| self.lumps[k].name().matches(name))
    }

    /// Insert a level marker at the insertion point. It is listed as a
    /// level once its map lumps have been added after it.
    pub fn add_level(&mut self, name: &str) -> LumpMut<'_> {
        self.add_lump(name)
    }

    /// Remove the marker and every lump of the level's run
    pub fn remove_level(&mut self, level: usize) {
        let start = self.level_header(level);
        let finish = self.level_last_lump(level);
        self.remove_lumps(start, finish - start + 1);
    }

    /// Remove the `GL_*` lumps that follow the level's normal lumps
    pub fn remove_gl_nodes(&mut self, level: usize) {
        let finish = self.level_last_lump(level);
        let mut start = self.level_header(level) + 1;

        while start <= finish && MapLump::from_lump(&self.lumps[start]).is_some() {
            start += 1;
        }
        let count = self.lumps[start..=finish]
            .iter()
            .take_while(|l| is_gl_node_lump(l))
            .count();

        if count > 0 {
            self.remove_lumps(start, count);
        }
    }

    pub fn remove_znodes(&mut self, level: usize) {
        let start = self.level_header(level);
        let finish = self.level_last_lump(level);

        if let Some(k) = (start..=finish).find(|&k| self.lumps[k].name().matches("ZNODES")) {
            self.remove_lumps(k, 1);
        }
    }
}
