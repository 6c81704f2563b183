use uuid::{Builder, Variant, Version};

/// Create a mocked version of InvestorUid using a seed (usually a DID or a PII digest) as input.
///
/// That InvestorUid is just a hash of the given seed, where some bits are updated to be compliant
/// with RFC 4122 version 4.
pub fn make_investor_uid(seed: &[u8]) -> [u8; 16] {
    use blake2::{digest::consts::U16, Blake2b, Digest};

    let mut hash = [0u8; 16];
    hash.copy_from_slice(Blake2b::<U16>::digest(seed).as_slice());

    Builder::from_bytes(hash)
        .with_variant(Variant::RFC4122)
        .with_version(Version::Random)
        .into_uuid()
        .into_bytes()
}
