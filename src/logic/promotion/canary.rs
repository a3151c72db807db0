//! Canary Traffic Split
//!
//! `bucket = stable_hash64(fingerprint) % 100`; a fingerprint is routed to the
//! canary when its bucket is below the canary's traffic percent. The hash has
//! no per-process state, so a fingerprint stays in the same bucket across
//! restarts and replicas for as long as the canary runs.

/// Fixed seed; changing it reshuffles every assignment
const BUCKET_SEED: u64 = 0x5349_474E_5550_4755;

/// FNV-1a over bytes, then a SplitMix64 finaliser. Not cryptographic.
#[must_use]
pub fn stable_hash64(seed: u64, s: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    splitmix64(seed ^ h)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Traffic bucket in `0..100`
pub fn bucket(fingerprint: &str) -> u8 {
    (stable_hash64(BUCKET_SEED, fingerprint) % 100) as u8
}

pub fn routes_to_canary(fingerprint: &str, traffic_percent: u8) -> bool {
    bucket(fingerprint) < traffic_percent.min(100)
}
