// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! 24-hex-character identifiers shared by documents and projects.

use crate::WireError;

/// A 24-hex-character ASCII identifier, carried on the wire as its raw
/// ASCII bytes (not decoded to binary) — the same representation the
/// external document store addresses documents and projects by.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HexId24([u8; 24]);

/// Identifies a document (`file_id`).
pub type FileId = HexId24;
/// Identifies a project.
pub type ProjectId = HexId24;

impl HexId24 {
    /// Parse a 24-character hex string into an id. Rejects any length other
    /// than 24 or any non-hex-digit byte.
    pub fn from_hex(s: &str) -> Result<Self, WireError> {
        let bytes = s.as_bytes();
        if bytes.len() != 24 || !bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(WireError::InvalidId(s.to_string()));
        }
        let mut out = [0u8; 24];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }

    /// Wrap a raw 24-byte ASCII array read directly off the wire.
    pub fn from_raw(bytes: [u8; 24]) -> Result<Self, WireError> {
        if !bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(WireError::InvalidId(String::from_utf8_lossy(&bytes).into_owned()));
        }
        Ok(Self(bytes))
    }

    /// The raw 24-byte ASCII form this id is carried as on the wire.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 24] {
        &self.0
    }

    /// The hex string this id represents.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Validated ASCII hex at construction time in both constructors.
        std::str::from_utf8(&self.0).unwrap_or("<invalid-id>")
    }
}

impl std::fmt::Debug for HexId24 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HexId24").field(&self.as_str()).finish()
    }
}

impl std::fmt::Display for HexId24 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
