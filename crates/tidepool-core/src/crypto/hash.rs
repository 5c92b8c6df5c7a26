use crate::types::Address;

/// Compute Blake3 hash of data as an address
pub fn hash_blake3(data: &[u8]) -> Address {
    let hash = blake3::hash(data);
    Address(*hash.as_bytes())
}

/// Derive a deterministic address as `blake3(domain || parts[0] || parts[1] ...)`.
///
/// Parts are concatenated without separators, so callers pass fixed-width
/// parts (such as 32-byte token ids) to keep the encoding unambiguous.
pub fn derive_address(domain: &[u8], parts: &[&[u8]]) -> Address {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(part);
    }
    Address(*hasher.finalize().as_bytes())
}
