//! Namespaces are the bracketed regions of the directory (`S_START` ..
//! `S_END` and friends). Lumps inside a bracket get their type from the
//! bracket, not from their name, so a flat and a wall patch may share a name.

use std::fmt;

use log::warn;

use crate::lumps::{Lump, LumpName};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    #[default]
    Global,
    Sprites,
    Flats,
    TextureLumps,
}

impl Namespace {
    /// Short form used in marker names and diagnostics
    pub fn prefix(&self) -> &'static str {
        match self {
            Namespace::Global => "(global)",
            Namespace::Sprites => "S",
            Namespace::Flats => "F",
            Namespace::TextureLumps => "TX",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Problems found while bracketing. None of these stop classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceWarning {
    /// A `*_START` opened a namespace while `open` was still open
    MissingEnd { open: Namespace, index: usize },
    /// A `*_END` closed a namespace that was not the open one
    StrayEnd { namespace: Namespace, index: usize },
    /// An empty lump inside a bracket, left in the global namespace
    EmptyLump {
        name: LumpName,
        namespace: Namespace,
        index: usize,
    },
    /// The directory ended with a namespace still open
    Unterminated { open: Namespace },
}

impl fmt::Display for NamespaceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceWarning::MissingEnd { open, index } => {
                write!(f, "missing {open}_END marker (before lump #{index})")
            }
            NamespaceWarning::StrayEnd { namespace, index } => {
                write!(f, "stray {namespace}_END marker at lump #{index}")
            }
            NamespaceWarning::EmptyLump {
                name,
                namespace,
                index,
            } => write!(f, "skipping empty lump {name} (#{index}) in {namespace}_START"),
            NamespaceWarning::Unterminated { open } => {
                write!(f, "missing {open}_END marker (at EOF)")
            }
        }
    }
}

enum Marker {
    Start(Namespace),
    End(Namespace),
}

static MARKERS: [(&str, Marker); 10] = [
    ("S_START", Marker::Start(Namespace::Sprites)),
    ("SS_START", Marker::Start(Namespace::Sprites)),
    ("S_END", Marker::End(Namespace::Sprites)),
    ("SS_END", Marker::End(Namespace::Sprites)),
    ("F_START", Marker::Start(Namespace::Flats)),
    ("FF_START", Marker::Start(Namespace::Flats)),
    ("F_END", Marker::End(Namespace::Flats)),
    ("FF_END", Marker::End(Namespace::Flats)),
    ("TX_START", Marker::Start(Namespace::TextureLumps)),
    ("TX_END", Marker::End(Namespace::TextureLumps)),
];

fn marker(name: &LumpName) -> Option<&'static Marker> {
    MARKERS
        .iter()
        .find(|(marker, _)| name.matches(marker))
        .map(|(_, m)| m)
}

/// Sub-namespace markers such as `S1_START` or `F3_END`
pub(crate) fn is_dummy_marker(name: &LumpName) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() < 3 {
        return false;
    }
    if !matches!(bytes[0].to_ascii_uppercase(), b'S' | b'F') || !bytes[1].is_ascii_digit() {
        return false;
    }
    let rest = &bytes[2..];
    rest.eq_ignore_ascii_case(b"_START") || rest.eq_ignore_ascii_case(b"_END")
}

/// The namespace of every lump, index-aligned with the directory
#[derive(Debug, Default, Clone)]
pub struct NamespaceMap {
    pub namespaces: Vec<Namespace>,
    pub warnings: Vec<NamespaceWarning>,
}

/// One left-to-right pass over the directory. The most recently opened
/// namespace always wins; mismatched markers are only warnings.
pub fn classify_namespaces(lumps: &[Lump]) -> NamespaceMap {
    let mut map = NamespaceMap {
        namespaces: Vec::with_capacity(lumps.len()),
        warnings: Vec::new(),
    };
    let mut active = Namespace::Global;

    for (index, lump) in lumps.iter().enumerate() {
        let name = lump.name();
        map.namespaces.push(Namespace::Global);

        if is_dummy_marker(&name) {
            continue;
        }

        match marker(&name) {
            Some(Marker::Start(ns)) => {
                if active != Namespace::Global && active != *ns {
                    map.warnings.push(NamespaceWarning::MissingEnd {
                        open: active,
                        index,
                    });
                }
                active = *ns;
                continue;
            }
            Some(Marker::End(ns)) => {
                if active != *ns {
                    map.warnings.push(NamespaceWarning::StrayEnd {
                        namespace: *ns,
                        index,
                    });
                }
                active = Namespace::Global;
                continue;
            }
            None => {}
        }

        if active != Namespace::Global {
            if lump.is_empty() {
                map.warnings.push(NamespaceWarning::EmptyLump {
                    name,
                    namespace: active,
                    index,
                });
                continue;
            }
            map.namespaces[index] = active;
        }
    }

    if active != Namespace::Global {
        map.warnings
            .push(NamespaceWarning::Unterminated { open: active });
    }

    for w in &map.warnings {
        warn!("{w}");
    }
    map
}
