//! Encoding Table
//!
//! Maps canonical encoding names to the small identifiers the engines
//! understand. The table is built once and never mutated.

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Engine-level encoding identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EncodingId(pub u8);

impl EncodingId {
    /// No encoding requested; the engine auto-detects
    pub const NONE: EncodingId = EncodingId(0);
    pub const UTF_8: EncodingId = EncodingId(1);
    pub const UTF_16LE: EncodingId = EncodingId(2);
    pub const UTF_16BE: EncodingId = EncodingId(3);
    pub const UCS4LE: EncodingId = EncodingId(4);
    pub const UCS4BE: EncodingId = EncodingId(5);
    pub const EBCDIC: EncodingId = EncodingId(6);
    pub const UCS4_2143: EncodingId = EncodingId(7);
    pub const UCS4_3412: EncodingId = EncodingId(8);
    pub const UCS2: EncodingId = EncodingId(9);
    pub const ISO_8859_1: EncodingId = EncodingId(10);
    pub const ISO_8859_2: EncodingId = EncodingId(11);
    pub const ISO_8859_3: EncodingId = EncodingId(12);
    pub const ISO_8859_4: EncodingId = EncodingId(13);
    pub const ISO_8859_5: EncodingId = EncodingId(14);
    pub const ISO_8859_6: EncodingId = EncodingId(15);
    pub const ISO_8859_7: EncodingId = EncodingId(16);
    pub const ISO_8859_8: EncodingId = EncodingId(17);
    pub const ISO_8859_9: EncodingId = EncodingId(18);
    pub const ISO_2022_JP: EncodingId = EncodingId(19);
    pub const SHIFT_JIS: EncodingId = EncodingId(20);
    pub const EUC_JP: EncodingId = EncodingId(21);
    pub const ASCII: EncodingId = EncodingId(22);

    /// Canonical name of this identifier
    pub fn name(self) -> &'static str {
        ENCODINGS
            .iter()
            .find(|(_, id)| *id == self)
            .map(|(name, _)| *name)
            .unwrap_or("NONE")
    }

    /// Whether this identifier asks for auto-detection
    pub fn is_none(self) -> bool {
        self == Self::NONE
    }

    /// Decoder backing this identifier, if one exists
    pub fn to_encoding(self) -> Option<&'static encoding_rs::Encoding> {
        let label: &[u8] = match self {
            Self::UTF_8 => b"utf-8",
            Self::UTF_16LE | Self::UCS2 => b"utf-16le",
            Self::UTF_16BE => b"utf-16be",
            Self::ISO_8859_1 => b"iso-8859-1",
            Self::ISO_8859_2 => b"iso-8859-2",
            Self::ISO_8859_3 => b"iso-8859-3",
            Self::ISO_8859_4 => b"iso-8859-4",
            Self::ISO_8859_5 => b"iso-8859-5",
            Self::ISO_8859_6 => b"iso-8859-6",
            Self::ISO_8859_7 => b"iso-8859-7",
            Self::ISO_8859_8 => b"iso-8859-8",
            Self::ISO_8859_9 => b"iso-8859-9",
            Self::ISO_2022_JP => b"iso-2022-jp",
            Self::SHIFT_JIS => b"shift_jis",
            Self::EUC_JP => b"euc-jp",
            Self::ASCII => b"us-ascii",
            // UCS-4 variants and EBCDIC have no decoder
            _ => return None,
        };
        encoding_rs::Encoding::for_label(label)
    }
}

impl fmt::Display for EncodingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical names, in identifier order
pub const ENCODINGS: &[(&str, EncodingId)] = &[
    ("NONE", EncodingId::NONE),
    ("UTF-8", EncodingId::UTF_8),
    ("UTF16LE", EncodingId::UTF_16LE),
    ("UTF16BE", EncodingId::UTF_16BE),
    ("UCS4LE", EncodingId::UCS4LE),
    ("UCS4BE", EncodingId::UCS4BE),
    ("EBCDIC", EncodingId::EBCDIC),
    ("UCS4-2143", EncodingId::UCS4_2143),
    ("UCS4-3412", EncodingId::UCS4_3412),
    ("UCS2", EncodingId::UCS2),
    ("ISO-8859-1", EncodingId::ISO_8859_1),
    ("ISO-8859-2", EncodingId::ISO_8859_2),
    ("ISO-8859-3", EncodingId::ISO_8859_3),
    ("ISO-8859-4", EncodingId::ISO_8859_4),
    ("ISO-8859-5", EncodingId::ISO_8859_5),
    ("ISO-8859-6", EncodingId::ISO_8859_6),
    ("ISO-8859-7", EncodingId::ISO_8859_7),
    ("ISO-8859-8", EncodingId::ISO_8859_8),
    ("ISO-8859-9", EncodingId::ISO_8859_9),
    ("ISO-2022-JP", EncodingId::ISO_2022_JP),
    ("SHIFT-JIS", EncodingId::SHIFT_JIS),
    ("EUC-JP", EncodingId::EUC_JP),
    ("ASCII", EncodingId::ASCII),
];

fn table() -> &'static HashMap<&'static str, EncodingId> {
    static TABLE: OnceLock<HashMap<&'static str, EncodingId>> = OnceLock::new();
    TABLE.get_or_init(|| ENCODINGS.iter().copied().collect())
}

/// Resolve an encoding name. Unknown names are unresolved, not an error.
pub fn resolve(name: &str) -> Option<EncodingId> {
    let table = table();
    if let Some(id) = table.get(name) {
        return Some(*id);
    }
    table.get(name.to_ascii_uppercase().as_str()).copied()
}
