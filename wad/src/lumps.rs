//! A `Lump` is the atomic unit of storage inside a WAD: an up to 8 character
//! name plus a blob of bytes. What the bytes mean is decided by the name
//! and by the position of the lump in the directory, never by the lump.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::ops::Deref;

/// Size of the fixed name field of a directory entry
pub const NAME_LEN: usize = 8;

/// A lump name as stored in the directory.
///
/// Always upper case and never longer than 8 bytes. The only way to build
/// one is through [`LumpName::new`] or [`LumpName::from_bytes`], both of
/// which uppercase and silently truncate. Overlong names are not an error,
/// older tools produced them and editors have always accepted them.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LumpName {
    bytes: [u8; NAME_LEN],
    len: u8,
}

impl LumpName {
    /// Uppercase and truncate to 8 bytes. Spaces are kept, only a NUL ends
    /// the name early.
    pub fn new(name: &str) -> LumpName {
        Self::from_raw(name.as_bytes())
    }

    /// Build from a raw directory name field. Stops at the first NUL, and
    /// trailing space padding is dropped.
    pub fn from_bytes(raw: &[u8]) -> LumpName {
        let mut name = Self::from_raw(raw);
        while name.len > 0 && name.bytes[name.len as usize - 1] == b' ' {
            name.len -= 1;
            name.bytes[name.len as usize] = 0;
        }
        name
    }

    fn from_raw(raw: &[u8]) -> LumpName {
        let mut bytes = [0u8; NAME_LEN];
        let mut len = 0;
        for &b in raw.iter().take(NAME_LEN) {
            if b == 0 {
                break;
            }
            bytes[len] = b.to_ascii_uppercase();
            len += 1;
        }
        LumpName {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    /// The NUL padded form written to a directory entry
    pub fn to_raw(&self) -> [u8; NAME_LEN] {
        self.bytes
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Case-insensitive comparison against an arbitrary string. A query
    /// longer than 8 characters never matches.
    pub fn matches(&self, name: &str) -> bool {
        self.as_bytes().eq_ignore_ascii_case(name.as_bytes())
    }

    pub fn starts_with(&self, stem: &str) -> bool {
        let stem = stem.as_bytes();
        stem.len() <= self.len() && self.as_bytes()[..stem.len()].eq_ignore_ascii_case(stem)
    }
}

impl fmt::Display for LumpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.as_str())
    }
}

impl fmt::Debug for LumpName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl From<&str> for LumpName {
    fn from(name: &str) -> Self {
        LumpName::new(name)
    }
}

impl PartialEq<str> for LumpName {
    fn eq(&self, other: &str) -> bool {
        self.matches(other)
    }
}

impl PartialEq<&str> for LumpName {
    fn eq(&self, other: &&str) -> bool {
        self.matches(other)
    }
}

/// A named, owned byte payload.
///
/// `len()` is always the exact payload size; nothing extra is stored or
/// written out.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Lump {
    name: LumpName,
    data: Vec<u8>,
}

impl fmt::Debug for Lump {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Lump {{ name: {}, len: {} }}", self.name, self.data.len())
    }
}

impl Lump {
    pub fn new(name: &str) -> Lump {
        Lump {
            name: LumpName::new(name),
            data: Vec::new(),
        }
    }

    pub fn with_data(name: &str, data: impl Into<Vec<u8>>) -> Lump {
        Lump {
            name: LumpName::new(name),
            data: data.into(),
        }
    }

    pub(crate) fn from_parts(name: LumpName, data: Vec<u8>) -> Lump {
        Lump { name, data }
    }

    pub fn name(&self) -> LumpName {
        self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = LumpName::new(name);
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.data = data.into();
    }

    pub fn set_data_from_string(&mut self, text: &str) {
        self.data = text.as_bytes().to_vec();
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// The payload read as a C string: everything up to the first NUL.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn as_string(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.c_bytes())
    }

    /// Text lines of the payload (as in [`Lump::as_string`]), with `\r\n`
    /// and `\n` endings stripped.
    pub fn lines(&self) -> impl Iterator<Item = Cow<'_, str>> + '_ {
        let bytes = self.c_bytes();
        let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
        bytes
            .split(|&b| b == b'\n')
            .filter(move |_| !bytes.is_empty())
            .map(|line| String::from_utf8_lossy(line.strip_suffix(b"\r").unwrap_or(line)))
    }

    fn c_bytes(&self) -> &[u8] {
        match self.data.iter().position(|&b| b == 0) {
            Some(end) => &self.data[..end],
            None => &self.data,
        }
    }
}

impl io::Write for Lump {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Mutable access to a lump that is owned by a [`crate::Wad`].
///
/// Only the payload can be changed through this; renaming goes through
/// [`crate::Wad::rename_lump`] so the wad can keep its level list correct.
pub struct LumpMut<'a> {
    lump: &'a mut Lump,
}

impl<'a> LumpMut<'a> {
    pub(crate) fn new(lump: &'a mut Lump) -> Self {
        LumpMut { lump }
    }

    pub fn set_data(&mut self, data: impl Into<Vec<u8>>) {
        self.lump.set_data(data);
    }

    pub fn set_data_from_string(&mut self, text: &str) {
        self.lump.set_data_from_string(text);
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.lump.append(bytes);
    }

    pub fn reserve(&mut self, additional: usize) {
        self.lump.reserve(additional);
    }

    pub fn clear(&mut self) {
        self.lump.clear();
    }
}

impl Deref for LumpMut<'_> {
    type Target = Lump;

    fn deref(&self) -> &Lump {
        self.lump
    }
}

impl io::Write for LumpMut<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(self.lump, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
