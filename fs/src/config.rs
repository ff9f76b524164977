use crate::cache::CacheMode;

/// How path components are compared against names on disk.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum NameMatch {
    /// Byte for byte. `readme.txt` will not find `README.TXT`.
    #[default]
    Exact,
    /// ASCII letters compare equal regardless of case.
    IgnoreAsciiCase,
}

impl NameMatch {
    pub fn matches(self, on_disk: &str, wanted: &str) -> bool {
        match self {
            NameMatch::Exact => on_disk == wanted,
            NameMatch::IgnoreAsciiCase => on_disk.eq_ignore_ascii_case(wanted),
        }
    }
}

/// Settings applied when a filesystem is mounted.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub cache_mode: CacheMode,
    pub name_match: NameMatch,
}
