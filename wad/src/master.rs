//! The search order used to resolve resources across every loaded wad.
//! The game wad is lowest priority, then resource wads in the order they
//! were added, then the wad being edited.

use std::cell::{Ref, RefCell};
use std::path::{self, Path, PathBuf};
use std::rc::Rc;

use log::{debug, warn};

use crate::atomic::lexically_normal;
use crate::lumps::Lump;
use crate::namespace::Namespace;
use crate::wad::{LumpHandle, Wad};

/// Wads are owned by the editing session and shared with the directory
pub type SharedWad = Rc<RefCell<Wad>>;

/// A lump found by a directory lookup, and the wad it lives in
#[derive(Debug, Clone)]
pub struct FoundLump {
    pub wad: SharedWad,
    pub handle: LumpHandle,
}

impl FoundLump {
    /// Borrow the lump. `None` once the wad has been edited since the
    /// lookup.
    pub fn lump(&self) -> Option<Ref<'_, Lump>> {
        Ref::filter_map(self.wad.borrow(), |w| w.get(self.handle)).ok()
    }

    pub fn index(&self) -> usize {
        self.handle.index()
    }
}

#[derive(Debug, Default)]
pub struct MasterDirectory {
    game: Option<SharedWad>,
    resources: Vec<SharedWad>,
    edit: Option<SharedWad>,
}

fn comparable_path(path: &Path) -> String {
    let absolute = path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    lexically_normal(&absolute)
        .to_string_lossy()
        .to_lowercase()
}

impl MasterDirectory {
    pub fn new() -> MasterDirectory {
        MasterDirectory::default()
    }

    pub fn set_game_wad(&mut self, wad: SharedWad) {
        debug!("Game wad: {:?}", wad.borrow().path());
        self.game = Some(wad);
    }

    pub fn game_wad(&self) -> Option<&SharedWad> {
        self.game.as_ref()
    }

    /// Added wads override the ones added before them
    pub fn add_resource_wad(&mut self, wad: SharedWad) {
        if self.game.is_none() {
            warn!("Resource wad {:?} added before a game wad", wad.borrow().path());
        }
        self.resources.push(wad);
    }

    pub fn resource_wads(&self) -> &[SharedWad] {
        &self.resources
    }

    pub fn set_edit_wad(&mut self, wad: SharedWad) {
        self.replace_edit_wad(wad);
    }

    /// Put `wad` in the edit slot and hand back whatever was there
    pub fn replace_edit_wad(&mut self, wad: SharedWad) -> Option<SharedWad> {
        debug!("Edit wad: {:?}", wad.borrow().path());
        self.edit.replace(wad)
    }

    pub fn clear_edit_wad(&mut self) -> Option<SharedWad> {
        self.edit.take()
    }

    pub fn edit_wad(&self) -> Option<&SharedWad> {
        self.edit.as_ref()
    }

    /// Drop `wad` from whichever slot holds it. Returns false if it was
    /// not in the directory.
    pub fn remove(&mut self, wad: &SharedWad) -> bool {
        if self.edit.as_ref().is_some_and(|w| Rc::ptr_eq(w, wad)) {
            self.edit = None;
            return true;
        }
        if let Some(k) = self.resources.iter().position(|w| Rc::ptr_eq(w, wad)) {
            self.resources.remove(k);
            return true;
        }
        if self.game.as_ref().is_some_and(|w| Rc::ptr_eq(w, wad)) {
            self.game = None;
            return true;
        }
        false
    }

    pub fn close_all(&mut self) {
        self.edit = None;
        self.resources.clear();
        self.game = None;
    }

    /// Every wad, highest priority first
    pub fn wads(&self) -> impl Iterator<Item = &SharedWad> {
        self.edit
            .iter()
            .chain(self.resources.iter().rev())
            .chain(self.game.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.wads().next().is_none()
    }

    fn find_in_namespace(&self, name: &str, namespace: Namespace) -> Option<FoundLump> {
        self.wads().find_map(|wad| {
            let w = wad.borrow();
            let k = w.find_lump_num_in_namespace(name, namespace)?;
            Some(FoundLump {
                wad: Rc::clone(wad),
                handle: w.handle(k)?,
            })
        })
    }

    pub fn find_global_lump(&self, name: &str) -> Option<FoundLump> {
        self.find_in_namespace(name, Namespace::Global)
    }

    pub fn find_sprite_lump(&self, name: &str) -> Option<FoundLump> {
        self.find_in_namespace(name, Namespace::Sprites)
    }

    pub fn find_flat_lump(&self, name: &str) -> Option<FoundLump> {
        self.find_in_namespace(name, Namespace::Flats)
    }

    pub fn find_texture_lump(&self, name: &str) -> Option<FoundLump> {
        self.find_in_namespace(name, Namespace::TextureLumps)
    }

    /// The sprite with the alphabetically smallest name starting with
    /// `stem` across all wads. On a tie the higher priority wad wins.
    pub fn find_first_sprite_lump(&self, stem: &str) -> Option<FoundLump> {
        let mut best: Option<FoundLump> = None;
        for wad in self.wads() {
            let w = wad.borrow();
            let Some(k) = w.find_first_sprite_lump(stem) else {
                continue;
            };
            let name = w.lumps[k].name();
            let smaller = best
                .as_ref()
                .and_then(|b| b.lump().map(|l| name < l.name()))
                .unwrap_or(true);
            if smaller {
                if let Some(handle) = w.handle(k) {
                    best = Some(FoundLump {
                        wad: Rc::clone(wad),
                        handle,
                    });
                }
            }
        }
        best
    }

    /// Whether a wad with this path is already loaded in any role.
    /// Paths are compared absolute, normalised and ignoring case.
    pub fn contains_path<P: AsRef<Path>>(&self, path: P) -> bool {
        let wanted = comparable_path(path.as_ref());
        self.wads().any(|wad| {
            wad.borrow()
                .path()
                .is_some_and(|p| comparable_path(p) == wanted)
        })
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.wads()
            .filter_map(|wad| wad.borrow().path().map(Path::to_path_buf))
            .collect()
    }
}
