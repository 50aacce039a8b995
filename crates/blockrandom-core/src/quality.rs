//! Cheap per-byte entropy estimates for logging and diagnostics.
//!
//! For a full statistical battery see the `blockrandom-tests` crate.

/// Count of each byte value.
pub fn byte_histogram(data: &[u8]) -> [u64; 256] {
    let mut counts = [0u64; 256];
    for &b in data {
        counts[b as usize] += 1;
    }
    counts
}

/// Shannon entropy in bits per byte (0.0 to 8.0).
pub fn quick_shannon(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let n = data.len() as f64;
    byte_histogram(data)
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

/// Min-entropy in bits per byte: `-log2(p_max)`. Never exceeds Shannon entropy.
pub fn quick_min_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let max = byte_histogram(data).into_iter().max().unwrap_or(0);
    let p_max = max as f64 / data.len() as f64;
    -p_max.log2()
}
