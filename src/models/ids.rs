//! Deterministic ID generation using SHA256 hashing.

use sha2::{Digest, Sha256};

/// Derive a stable 16-hex-character id from ordered signature fields.
///
/// Fields are joined with `|` before hashing, so `["a", "bc"]` and
/// `["ab", "c"]` produce different ids.
pub fn signature_id(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(field.as_bytes());
    }
    let hash = hex::encode(hasher.finalize());
    hash[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_id_deterministic() {
        let id1 = signature_id(&["TFT13_Ambusher:3", "TFT13_Jinx"]);
        let id2 = signature_id(&["TFT13_Ambusher:3", "TFT13_Jinx"]);
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_signature_id_field_boundaries() {
        assert_ne!(signature_id(&["a", "bc"]), signature_id(&["ab", "c"]));
    }

    #[test]
    fn test_signature_id_format() {
        let id = signature_id(&["test"]);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
