//! Filename related types

use heapless::{String, Vec};

use super::{MAX_DEPTH, SEPARATOR};

/// Longest rendering of an 8.3 name: eight characters, a dot, three more,
/// each of which may take two bytes once code page characters are mapped.
pub const SHORT_NAME_MAX: usize = 24;

/// An MS-DOS 8.3 filename, as stored in a directory entry.
///
/// Name and extension are space padded on disk.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(PartialEq, Eq, Clone)]
pub struct ShortFileName {
    pub(crate) contents: [u8; 11],
}

impl ShortFileName {
    const FILENAME_BASE_MAX_LEN: usize = 8;

    /// Build from the first eleven bytes of a directory entry.
    pub fn from_bytes(raw: &[u8; 11]) -> ShortFileName {
        ShortFileName { contents: *raw }
    }

    /// Get base name (without extension) of the file.
    pub fn base_name(&self) -> &[u8] {
        Self::bytes_before_space(&self.contents[..Self::FILENAME_BASE_MAX_LEN])
    }

    /// Get extension of the file (without base name).
    pub fn extension(&self) -> &[u8] {
        Self::bytes_before_space(&self.contents[Self::FILENAME_BASE_MAX_LEN..])
    }

    fn bytes_before_space(bytes: &[u8]) -> &[u8] {
        let end = bytes
            .iter()
            .rposition(|&c| c != b' ')
            .map(|p| p + 1)
            .unwrap_or(0);
        &bytes[..end]
    }

    /// The name the way a user types it: `README.TXT`, or `MAKEFILE` when
    /// there is no extension.
    pub fn to_name(&self) -> String<SHORT_NAME_MAX> {
        let mut name = String::new();
        for (i, &b) in self.base_name().iter().enumerate() {
            // 0x05 in the first byte stands for a real 0xE5.
            let b = if i == 0 && b == 0x05 { 0xE5 } else { b };
            // Cannot overflow, see SHORT_NAME_MAX.
            let _ = name.push(char::from(b));
        }
        let extension = self.extension();
        if !extension.is_empty() {
            let _ = name.push('.');
            for &b in extension {
                let _ = name.push(char::from(b));
            }
        }
        name
    }
}

impl core::fmt::Display for ShortFileName {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}", self.to_name())
    }
}

impl core::fmt::Debug for ShortFileName {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "ShortFileName(\"{}\")", self)
    }
}

/// Various filename related errors that can occur.
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilenameError {
    /// The path has more components than we can track.
    TooDeep,
}

/// A path broken into its components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathComponents<'a> {
    /// The path started with a separator
    pub absolute: bool,
    pub parts: Vec<&'a str, MAX_DEPTH>,
}

/// Split `path` on the separator, dropping empty components.
///
/// `"/LOGS//BOOT.TXT"` gives `["LOGS", "BOOT.TXT"]`, absolute.
pub fn split_path(path: &str) -> Result<PathComponents<'_>, FilenameError> {
    let mut parts = Vec::new();
    for part in path.split(SEPARATOR).filter(|p| !p.is_empty()) {
        parts.push(part).map_err(|_| FilenameError::TooDeep)?;
    }
    Ok(PathComponents {
        absolute: path.starts_with(SEPARATOR),
        parts,
    })
}

// ****************************************************************************
//
// Unit Tests
//
// ****************************************************************************

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn eight_three_with_extension() {
        let sfn = ShortFileName::from_bytes(b"README  TXT");
        assert_eq!(sfn.base_name(), b"README");
        assert_eq!(sfn.extension(), b"TXT");
        assert_eq!(sfn.to_name().as_str(), "README.TXT");
    }

    #[test]
    fn eight_three_without_extension() {
        let sfn = ShortFileName::from_bytes(b"MAKEFILE   ");
        assert_eq!(sfn.to_name().as_str(), "MAKEFILE");
    }

    #[test]
    fn dot_entries() {
        let this_dir = ShortFileName::from_bytes(b".          ");
        assert_eq!(this_dir.to_name().as_str(), ".");
        let parent_dir = ShortFileName::from_bytes(b"..         ");
        assert_eq!(parent_dir.to_name().as_str(), "..");
    }

    #[test]
    fn kanji_lead_byte() {
        let sfn = ShortFileName::from_bytes(b"\x05BC     TXT");
        assert_eq!(sfn.to_name().as_str(), "\u{e5}BC.TXT");
    }

    #[test]
    fn split() {
        let p = split_path("/LOGS//BOOT.TXT").unwrap();
        assert!(p.absolute);
        assert_eq!(p.parts.as_slice(), &["LOGS", "BOOT.TXT"]);
        let p = split_path("A.TXT").unwrap();
        assert!(!p.absolute);
        assert_eq!(p.parts.as_slice(), &["A.TXT"]);
        assert!(split_path("/").unwrap().parts.is_empty());
        let deep = "a/".repeat(MAX_DEPTH + 1);
        assert_eq!(split_path(&deep), Err(FilenameError::TooDeep));
    }
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
