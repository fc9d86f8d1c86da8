/// Cache key for a block of content.
///
/// FNV-1a over the UTF-8 bytes. Stable across processes, not collision
/// resistant. Only fit for keys where a collision costs a stale estimate.
pub type ContentHash = u64;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

pub fn content_hash(content: &str) -> ContentHash {
    content
        .as_bytes()
        .iter()
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
        })
}
