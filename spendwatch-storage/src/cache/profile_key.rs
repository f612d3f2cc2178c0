//! Byte encoding of profile keys for LMDB.
//!
//! Keys sort by tier first, so a prefix scan walks one tier's profiles.

use spendwatch_core::{JurisdictionTier, ProfileKey};

/// Separator byte between the tier discriminant and the id.
const SEPARATOR: u8 = 0xFF;

/// Encode a key as `[tier: 1 byte][0xFF][id: utf-8]`.
///
/// 0xFF never appears in UTF-8, so the id can be read back unambiguously.
pub fn encode_key(key: &ProfileKey) -> Vec<u8> {
    let id = key.id().as_bytes();
    let mut bytes = Vec::with_capacity(2 + id.len());
    bytes.extend_from_slice(&tier_prefix(key.tier()));
    bytes.extend_from_slice(id);
    bytes
}

/// Decode a key from bytes.
///
/// Returns `None` if:
/// - The slice is shorter than 3 bytes
/// - The tier byte is unknown
/// - The separator byte is missing
/// - The id is not valid UTF-8
pub fn decode_key(bytes: &[u8]) -> Option<ProfileKey> {
    if bytes.len() < 3 || bytes[1] != SEPARATOR {
        return None;
    }
    let tier = byte_to_tier(bytes[0])?;
    let id = std::str::from_utf8(&bytes[2..]).ok()?;
    Some(ProfileKey::new(tier, id))
}

/// Prefix shared by every key of one tier.
pub fn tier_prefix(tier: JurisdictionTier) -> [u8; 2] {
    [tier_to_byte(tier), SEPARATOR]
}

fn tier_to_byte(tier: JurisdictionTier) -> u8 {
    match tier {
        JurisdictionTier::FederalDeputy => 0,
        JurisdictionTier::Senator => 1,
        JurisdictionTier::StateDeputy => 2,
        JurisdictionTier::Councillor => 3,
    }
}

fn byte_to_tier(byte: u8) -> Option<JurisdictionTier> {
    match byte {
        0 => Some(JurisdictionTier::FederalDeputy),
        1 => Some(JurisdictionTier::Senator),
        2 => Some(JurisdictionTier::StateDeputy),
        3 => Some(JurisdictionTier::Councillor),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_layout() {
        let key = ProfileKey::new(JurisdictionTier::Senator, "42");
        assert_eq!(encode_key(&key), vec![1, 0xFF, b'4', b'2']);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_key(&[]).is_none());
        assert!(decode_key(&[1, 0xFF]).is_none());
        assert!(decode_key(&[9, 0xFF, b'a']).is_none());
        assert!(decode_key(&[1, 0x00, b'a']).is_none());
        assert!(decode_key(&[1, 0xFF, 0xC3]).is_none());
    }

    #[test]
    fn test_keys_share_tier_prefix() {
        let a = encode_key(&ProfileKey::new(JurisdictionTier::Councillor, "1"));
        let b = encode_key(&ProfileKey::new(JurisdictionTier::Councillor, "999"));
        let prefix = tier_prefix(JurisdictionTier::Councillor);
        assert!(a.starts_with(&prefix));
        assert!(b.starts_with(&prefix));
        assert!(!encode_key(&ProfileKey::new(JurisdictionTier::Senator, "1")).starts_with(&prefix));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_decode_inverts_encode(id in "\\PC{1,32}", tier_idx in 0usize..4) {
            let key = ProfileKey::new(JurisdictionTier::ALL[tier_idx], id);
            prop_assert_eq!(decode_key(&encode_key(&key)), Some(key));
        }
    }
}
