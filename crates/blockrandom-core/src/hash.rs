//! Stretch hash: MurmurHash3 (x86, 32-bit).
//!
//! Not cryptographic. It is used only to turn four reused spare bytes into
//! four fresh-looking ones, so what matters is avalanche: flipping one input
//! bit flips about half of the output bits.
//!
//! On a fixed 4-byte input length the whole mix is a bijection on `u32`, so
//! chaining the hash on its own output walks a long permutation cycle rather
//! than collapsing into a short loop.
//!
//! Trailing bytes of a key that is not a multiple of 4 long are mixed with
//! the standard rotation of 15, so [`murmur3_32`] and [`iterative_stretch`]
//! agree with every MurmurHash3 x86_32 implementation. Variants that rotate
//! the tail by 16 produce different hashes for such keys. The live 4-byte
//! path and [`stretch_bytes`] never have a tail.

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;
const R1: u32 = 15;
const R2: u32 = 13;
const M: u32 = 5;
const N: u32 = 0xe654_6b64;

/// Seed used by the live stretching path.
pub const STRETCH_SEED: u32 = 0;

#[inline]
fn mix_k(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(R1).wrapping_mul(C2)
}

#[inline]
fn fmix(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// MurmurHash3 x86_32 of `key` with `seed`.
pub fn murmur3_32(key: &[u8], seed: u32) -> u32 {
    let mut h = seed;

    let mut blocks = key.chunks_exact(4);
    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= mix_k(k);
        h = h.rotate_left(R2).wrapping_mul(M).wrapping_add(N);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &b) in tail.iter().enumerate() {
            k ^= u32::from(b) << (8 * i);
        }
        h ^= mix_k(k);
    }

    // Length is folded in modulo 2^32, as in the reference implementation.
    h ^= key.len() as u32;
    fmix(h)
}

/// Hash one 4-byte block into one derived 4-byte block.
///
/// The 32-bit hash is emitted most significant byte first.
pub fn stretch_block(block: [u8; 4]) -> [u8; 4] {
    murmur3_32(&block, STRETCH_SEED).to_be_bytes()
}

/// Hash `key`, then keep re-hashing the 4-byte output until the hash has
/// been applied `times` times in total. `times == 0` behaves like 1.
pub fn iterative_stretch(key: &[u8], times: usize) -> [u8; 4] {
    let mut out = murmur3_32(key, STRETCH_SEED).to_be_bytes();
    for _ in 1..times {
        out = stretch_block(out);
    }
    out
}

/// Stretch every 4-byte block of `bytes` through [`iterative_stretch`].
///
/// Input whose length is not a multiple of 4 is left-padded with zeros first,
/// so the output is always `ceil(len / 4) * 4` bytes long.
pub fn stretch_bytes(bytes: &[u8], times: usize) -> Vec<u8> {
    let pad = (4 - bytes.len() % 4) % 4;
    let mut padded = Vec::with_capacity(bytes.len() + pad);
    padded.resize(pad, 0);
    padded.extend_from_slice(bytes);

    padded
        .chunks_exact(4)
        .flat_map(|block| iterative_stretch(block, times))
        .collect()
}
