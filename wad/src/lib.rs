//! This crate contains all the structures and tools for reading, editing
//! and writing WAD files: the lumps, the levels and resource namespaces
//! grouped out of them, and the search order across several loaded wads.
//!
//! The structure of a WAD is this:
//!
//! ```text,ignore
//!                        <───── 32 bits ──────>
//!                        ┌────────────────────┐
//!             ┌──── 0x00 |  ASCII WAD Type    | 0x03
//!             |          | ────────────────── |
//!     Header ─┤     0x04 | # of directories   | 0x07
//!             |          | ────────────────── |
//!             └──── 0x08 | offset to listing ───0x0B ──┐
//!             ┌───────── | ────────────────── |        |
//!             |     0x0C | ┌────────────────┐ |        |
//!             |          | |   Lump Bytes   |<─────┐   |
//!     Lumps ──┤          | |       .        | |    |   |
//!             |          | └────────────────┘ |    |   |
//!             |          |         .          |    |   |
//!             └───────── |         .          |    |   |
//!             ┌───────── | ┌────────────────┐<─────────┘
//!             |          | |   Lump Offset  |──────┘
//!             |          | |----------------| |
//!  Directory ─┤          | |   Lump Size    | |
//!     List    |          | |----------------| |
//!             |          | |   Lump Name    | |
//!             |          | └────────────────┘ |
//!             |          |         .          |
//!             |          |         .          |
//!             |          |         .          |
//!             └───────── └────────────────────┘
//! ```
//!
//! Written files are always laid out like this: lump data back to back from
//! offset 12 in directory order, with the directory last.

/// Bring only the WAD structs down to root level
pub use crate::wad::*;

pub use crate::atomic::AtomicFileWriter;
pub use crate::error::{Result, WadError};
pub use crate::levels::{MapFormat, MapLump, MAX_LUMPS_IN_A_LEVEL};
pub use crate::lumps::{Lump, LumpMut, LumpName};
pub use crate::master::{FoundLump, MasterDirectory, SharedWad};
pub use crate::namespace::{Namespace, NamespaceWarning};

/// Write-to-temp-then-rename file replacement, used for every save
pub mod atomic;
pub mod error;
/// Level detection and the level-level edits (remove, strip nodes)
pub mod levels;
/// A Lump is a named chunk of data. The lump module holds the name and
/// payload types; their meaning comes from the `wad` that contains them.
pub mod lumps;
pub mod master;
pub mod namespace;
/// The WAD structure, parser and writer
pub mod wad;
