//! Collection naming.
//!
//! Names are lowercase hex of the UTF-8 display name behind a fixed prefix, so
//! the mapping is injective, reversible, and safe as a file name or SQL identifier
//! regardless of the characters in the display name.

use std::fmt::Write;

const COLLECTION_PREFIX: &str = "v_";
const TENANT_PREFIX: &str = "t_";

fn encode(prefix: &str, raw: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + raw.len() * 2);
    out.push_str(prefix);
    for byte in raw.as_bytes() {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

fn decode(prefix: &str, encoded: &str) -> Option<String> {
    let hex = encoded.strip_prefix(prefix)?;
    if hex.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

/// Collection name for a video display name.
pub fn collection_name(display_name: &str) -> String {
    encode(COLLECTION_PREFIX, display_name)
}

/// Inverse of [`collection_name`]. Returns `None` for names this module did not produce.
pub fn display_name_from_collection(collection: &str) -> Option<String> {
    decode(COLLECTION_PREFIX, collection)
}

/// Directory name holding a tenant's namespace.
pub fn tenant_dir_name(tenant: &str) -> String {
    encode(TENANT_PREFIX, tenant)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_that_collided_under_underscore_replacement_stay_distinct() {
        // "a b.mp4" and "a_b_mp4" both became "a_b_mp4" with alnum-or-underscore replacement.
        let a = collection_name("a b.mp4");
        let b = collection_name("a_b_mp4");
        assert_ne!(a, b);
    }

    #[test]
    fn test_roundtrip_arbitrary_characters() {
        for name in ["Lecture1.mp4", "שיעור 3.mov", "../../etc/passwd", "", "a/b\\c:d"] {
            let encoded = collection_name(name);
            assert!(encoded.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            assert_eq!(display_name_from_collection(&encoded).as_deref(), Some(name));
        }
    }

    #[test]
    fn test_foreign_names_do_not_decode() {
        assert_eq!(display_name_from_collection("other"), None);
        assert_eq!(display_name_from_collection("v_abc"), None);
        assert_eq!(display_name_from_collection("v_zz"), None);
    }

    #[test]
    fn test_tenant_dir_is_path_safe() {
        let dir = tenant_dir_name("../alice");
        assert!(!dir.contains('/') && !dir.contains('.'));
    }
}
