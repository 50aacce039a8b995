//! Randomness test battery for generator output.
//!
//! A compact, NIST SP 800-22 flavoured set of statistical checks used to
//! assess byte streams and bucketed integer draws. Each check returns a
//! [`TestResult`] with a p-value where one exists, a pass/fail verdict and a
//! letter grade (A through F).

use flate2::Compression;
use flate2::write::ZlibEncoder;
use rustfft::{FftPlanner, num_complex::Complex};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use statrs::function::erf::erfc;
use std::io::Write;

/// p-value below which a check fails.
pub const ALPHA: f64 = 0.01;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Outcome of one statistical check.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
    pub grade: char,
}

impl TestResult {
    /// Letter grade for a p-value: A ≥ 0.1, B ≥ 0.01, C ≥ 0.001, D ≥ 0.0001, F otherwise.
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    pub fn pass_from_p(p: Option<f64>, threshold: f64) -> bool {
        p.is_some_and(|p| p >= threshold)
    }

    fn from_p(name: &str, p: f64, statistic: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: Self::pass_from_p(Some(p), ALPHA),
            p_value: Some(p),
            statistic,
            details,
            grade: Self::grade_from_p(Some(p)),
        }
    }

    /// Result for checks scored by a 0..1 ratio instead of a p-value.
    fn from_ratio(name: &str, ratio: f64, statistic: f64, details: String) -> Self {
        let grade = match ratio {
            r if r > 0.95 => 'A',
            r if r > 0.85 => 'B',
            r if r > 0.7 => 'C',
            r if r > 0.5 => 'D',
            _ => 'F',
        };
        Self {
            name: name.to_string(),
            passed: ratio > 0.85,
            p_value: None,
            statistic,
            details,
            grade,
        }
    }

    fn failed(name: &str, details: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            p_value: None,
            statistic: 0.0,
            details: details.into(),
            grade: 'F',
        }
    }

    fn insufficient(name: &str, needed: usize, got: usize) -> Self {
        Self::failed(name, format!("Insufficient data: need {needed}, got {got}"))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Bits of `data`, most significant first within each byte.
fn to_bits(data: &[u8]) -> Vec<u8> {
    data.iter()
        .flat_map(|&byte| (0..8).rev().map(move |shift| (byte >> shift) & 1))
        .collect()
}

/// Upper tail of the chi-squared distribution.
fn chi2_sf(df: f64, x: f64) -> Option<f64> {
    ChiSquared::new(df).ok().map(|dist| dist.sf(x))
}

/// Two-sided p-value for a standard normal z-score.
fn two_sided_normal(z: f64) -> f64 {
    2.0 * (1.0 - Normal::standard().cdf(z.abs()))
}

/// Pearson statistic for `observed` against per-bin `expected` counts.
fn pearson(observed: &[u64], expected: &[f64]) -> f64 {
    observed
        .iter()
        .zip(expected)
        .filter(|(_, e)| **e > 0.0)
        .map(|(&o, &e)| {
            let diff = o as f64 - e;
            diff * diff / e
        })
        .sum()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Frequency
// ═══════════════════════════════════════════════════════════════════════════════

/// Proportion of ones across the whole stream.
pub fn monobit_frequency(data: &[u8]) -> TestResult {
    let name = "Monobit Frequency";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 100 {
        return TestResult::insufficient(name, 100, n);
    }
    let sum: i64 = bits.iter().map(|&b| if b == 1 { 1 } else { -1 }).sum();
    let s_obs = sum.unsigned_abs() as f64 / (n as f64).sqrt();
    let p = erfc(s_obs / std::f64::consts::SQRT_2);
    TestResult::from_p(name, p, s_obs, format!("S={sum}, n={n}"))
}

/// Proportion of ones inside 128-bit blocks.
pub fn block_frequency(data: &[u8]) -> TestResult {
    let name = "Block Frequency";
    const M: usize = 128;
    let bits = to_bits(data);
    let blocks = bits.len() / M;
    if blocks < 10 {
        return TestResult::insufficient(name, M * 10, bits.len());
    }
    let chi2 = 4.0
        * M as f64
        * bits
            .chunks_exact(M)
            .map(|block| {
                let ones = block.iter().filter(|&&b| b == 1).count();
                let dev = ones as f64 / M as f64 - 0.5;
                dev * dev
            })
            .sum::<f64>();
    match chi2_sf(blocks as f64, chi2) {
        Some(p) => TestResult::from_p(name, p, chi2, format!("blocks={blocks}, M={M}")),
        None => TestResult::failed(name, "invalid degrees of freedom"),
    }
}

/// Chi-squared of the byte-value histogram against uniform (256 bins).
pub fn byte_frequency(data: &[u8]) -> TestResult {
    let name = "Byte Frequency";
    let n = data.len();
    if n < 256 {
        return TestResult::insufficient(name, 256, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let expected = n as f64 / 256.0;
    let chi2 = pearson(&hist, &[expected; 256]);
    match chi2_sf(255.0, chi2) {
        Some(p) => TestResult::from_p(name, p, chi2, format!("n={n}, expected_per_bin={expected:.1}")),
        None => TestResult::failed(name, "invalid degrees of freedom"),
    }
}

/// Chi-squared goodness of fit of bucket counts against a uniform spread.
///
/// `counts[i]` is how many draws landed in bucket `i`, e.g. the histogram of
/// 10 000 calls to a bounded integer generator over `[0, counts.len())`.
pub fn chi_squared_uniformity(counts: &[u64]) -> TestResult {
    let name = "Chi-Squared Uniformity";
    let buckets = counts.len();
    if buckets < 2 {
        return TestResult::insufficient(name, 2, buckets);
    }
    let total: u64 = counts.iter().sum();
    let expected = total as f64 / buckets as f64;
    if expected < 5.0 {
        return TestResult::failed(
            name,
            format!("expected count per bucket {expected:.2} is below 5"),
        );
    }
    let chi2 = pearson(counts, &vec![expected; buckets]);
    match chi2_sf((buckets - 1) as f64, chi2) {
        Some(p) => TestResult::from_p(
            name,
            p,
            chi2,
            format!("buckets={buckets}, draws={total}, expected={expected:.1}"),
        ),
        None => TestResult::failed(name, "invalid degrees of freedom"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Runs
// ═══════════════════════════════════════════════════════════════════════════════

/// Number of uninterrupted runs of identical bits.
pub fn runs_test(data: &[u8]) -> TestResult {
    let name = "Runs Test";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 100 {
        return TestResult::insufficient(name, 100, n);
    }
    let pi = bits.iter().filter(|&&b| b == 1).count() as f64 / n as f64;
    if (pi - 0.5).abs() >= 2.0 / (n as f64).sqrt() {
        let mut result = TestResult::failed(name, format!("Pre-test failed: proportion={pi:.4}"));
        result.p_value = Some(0.0);
        return result;
    }
    let runs = 1 + bits.windows(2).filter(|w| w[0] != w[1]).count();
    let expected = 2.0 * n as f64 * pi * (1.0 - pi) + 1.0;
    let spread = 2.0 * (2.0 * n as f64).sqrt() * pi * (1.0 - pi);
    if spread < 1e-10 {
        return TestResult::failed(name, "Zero variance");
    }
    let z = (runs as f64 - expected).abs() / spread;
    let p = erfc(z / std::f64::consts::SQRT_2);
    TestResult::from_p(name, p, z, format!("runs={runs}, expected={expected:.0}"))
}

/// Longest run of ones inside 8-bit blocks, binned {≤1, 2, 3, ≥4}.
pub fn longest_run_of_ones(data: &[u8]) -> TestResult {
    let name = "Longest Run of Ones";
    // Class probabilities for M = 8 (NIST SP 800-22, section 2.4).
    const PROBS: [f64; 4] = [0.2148, 0.3672, 0.2305, 0.1875];
    if data.len() < 16 {
        return TestResult::insufficient(name, 128, data.len() * 8);
    }
    let mut observed = [0u64; 4];
    for &byte in data {
        let mut longest = 0u32;
        let mut run = 0u32;
        for shift in (0..8).rev() {
            if (byte >> shift) & 1 == 1 {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }
        observed[(longest.max(1) - 1).min(3) as usize] += 1;
    }
    let blocks = data.len() as f64;
    let expected: Vec<f64> = PROBS.iter().map(|p| p * blocks).collect();
    let chi2 = pearson(&observed, &expected);
    match chi2_sf(3.0, chi2) {
        Some(p) => TestResult::from_p(name, p, chi2, format!("blocks={}, M=8", data.len())),
        None => TestResult::failed(name, "invalid degrees of freedom"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Spectral
// ═══════════════════════════════════════════════════════════════════════════════

/// Periodic structure detected through the FFT of the ±1 bit sequence.
pub fn dft_spectral(data: &[u8]) -> TestResult {
    let name = "DFT Spectral";
    let bits = to_bits(data);
    let n = bits.len();
    if n < 64 {
        return TestResult::insufficient(name, 64, n);
    }
    let mut buffer: Vec<Complex<f64>> = bits
        .iter()
        .map(|&b| Complex::new(if b == 1 { 1.0 } else { -1.0 }, 0.0))
        .collect();
    FftPlanner::new().plan_fft_forward(n).process(&mut buffer);

    let half = n / 2;
    // 95% peak threshold: sqrt(ln(1/0.05) * n)
    let threshold = (2.995_732_274 * n as f64).sqrt();
    let below = buffer[..half].iter().filter(|c| c.norm() < threshold).count() as f64;
    let expected = 0.95 * half as f64;
    let d = (below - expected) / (n as f64 * 0.95 * 0.05 / 4.0).sqrt();
    let p = erfc(d.abs() / std::f64::consts::SQRT_2);
    TestResult::from_p(name, p, d, format!("peaks_below_threshold={}/{half}", below as u64))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Entropy
// ═══════════════════════════════════════════════════════════════════════════════

/// Shannon entropy of the byte histogram (max 8 bits per byte).
pub fn shannon_entropy(data: &[u8]) -> TestResult {
    let name = "Shannon Entropy";
    let n = data.len();
    if n < 16 {
        return TestResult::insufficient(name, 16, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let h: f64 = hist
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n as f64;
            -p * p.log2()
        })
        .sum();
    let ratio = h / 8.0;
    TestResult::from_ratio(
        name,
        ratio,
        h,
        format!("{h:.4} / 8.0 bits ({:.1}%)", ratio * 100.0),
    )
}

/// zlib compressed size over input size; random data barely compresses.
pub fn compression_ratio(data: &[u8]) -> TestResult {
    let name = "Compression Ratio";
    let n = data.len();
    if n < 32 {
        return TestResult::insufficient(name, 32, n);
    }
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(n), Compression::best());
    let compressed = match encoder.write_all(data).and_then(|()| encoder.finish()) {
        Ok(out) => out,
        Err(e) => return TestResult::failed(name, format!("zlib failed: {e}")),
    };
    let ratio = compressed.len() as f64 / n as f64;
    TestResult::from_ratio(
        name,
        ratio,
        ratio,
        format!("{}/{n} = {ratio:.4}", compressed.len()),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Correlation
// ═══════════════════════════════════════════════════════════════════════════════

/// Lag-1 correlation between adjacent byte values.
pub fn serial_correlation(data: &[u8]) -> TestResult {
    let name = "Serial Correlation";
    let n = data.len();
    if n < 20 {
        return TestResult::insufficient(name, 20, n);
    }
    let mean = data.iter().map(|&b| f64::from(b)).sum::<f64>() / n as f64;
    let dev = |b: u8| f64::from(b) - mean;
    let var = data.iter().map(|&b| dev(b) * dev(b)).sum::<f64>() / n as f64;
    if var < 1e-10 {
        let mut result = TestResult::failed(name, "Zero variance");
        result.statistic = 1.0;
        return result;
    }
    let cov: f64 = data.windows(2).map(|w| dev(w[0]) * dev(w[1])).sum();
    let r = cov / ((n - 1) as f64 * var);
    let z = r * (n as f64).sqrt();
    let p = two_sided_normal(z);
    TestResult::from_p(name, p, r.abs(), format!("r={r:.6}, z={z:.4}"))
}

/// Adjacent bytes should differ in four of eight bits on average.
pub fn bit_avalanche(data: &[u8]) -> TestResult {
    let name = "Bit Avalanche";
    let n = data.len();
    if n < 100 {
        return TestResult::insufficient(name, 100, n);
    }
    let pairs = (n - 1) as f64;
    let flips: u64 = data
        .windows(2)
        .map(|w| u64::from((w[0] ^ w[1]).count_ones()))
        .sum();
    let mean = flips as f64 / pairs;
    // Binomial(8, 1/2): mean 4, standard deviation sqrt(2).
    let z = (mean - 4.0) / (std::f64::consts::SQRT_2 / pairs.sqrt());
    let p = two_sided_normal(z);
    TestResult::from_p(name, p, mean, format!("mean_diff={mean:.3}/8 bits, expected=4.0"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Battery
// ═══════════════════════════════════════════════════════════════════════════════

/// Every byte-stream check, in a fixed order.
pub const BATTERY: [fn(&[u8]) -> TestResult; 10] = [
    monobit_frequency,
    block_frequency,
    byte_frequency,
    runs_test,
    longest_run_of_ones,
    dft_spectral,
    shannon_entropy,
    compression_ratio,
    serial_correlation,
    bit_avalanche,
];

/// Run [`BATTERY`] over `data`.
pub fn run_all_tests(data: &[u8]) -> Vec<TestResult> {
    BATTERY.iter().map(|check| check(data)).collect()
}

/// Mean grade score over `results`: A=100, B=75, C=50, D=25, F=0.
pub fn calculate_quality_score(results: &[TestResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let total: f64 = results
        .iter()
        .map(|r| match r.grade {
            'A' => 100.0,
            'B' => 75.0,
            'C' => 50.0,
            'D' => 25.0,
            _ => 0.0,
        })
        .sum();
    total / results.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic PCG-style byte stream.
    fn lcg_bytes(n: usize) -> Vec<u8> {
        let mut state: u64 = 0x0123_4567_89AB_CDEF;
        (0..n)
            .map(|_| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                (state >> 33) as u8
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[test]
    fn test_to_bits_msb_first() {
        assert_eq!(to_bits(&[0b1011_0001]), vec![1, 0, 1, 1, 0, 0, 0, 1]);
    }

    #[test]
    fn test_grade_from_p() {
        assert_eq!(TestResult::grade_from_p(Some(0.5)), 'A');
        assert_eq!(TestResult::grade_from_p(Some(0.05)), 'B');
        assert_eq!(TestResult::grade_from_p(Some(0.005)), 'C');
        assert_eq!(TestResult::grade_from_p(Some(0.0005)), 'D');
        assert_eq!(TestResult::grade_from_p(Some(1e-8)), 'F');
        assert_eq!(TestResult::grade_from_p(None), 'F');
    }

    #[test]
    fn test_pass_from_p() {
        assert!(TestResult::pass_from_p(Some(0.05), ALPHA));
        assert!(!TestResult::pass_from_p(Some(0.005), ALPHA));
        assert!(!TestResult::pass_from_p(None, ALPHA));
    }

    // -----------------------------------------------------------------------
    // Individual checks
    // -----------------------------------------------------------------------

    #[test]
    fn test_insufficient_data() {
        let result = monobit_frequency(&[0u8; 5]);
        assert!(!result.passed);
        assert!(result.details.contains("Insufficient"));
    }

    #[test]
    fn test_monobit_all_ones_fails() {
        let result = monobit_frequency(&[0xFF; 128]);
        assert!(!result.passed);
        assert_eq!(result.grade, 'F');
    }

    #[test]
    fn test_longest_run_alternating_bits() {
        // 0x55 has a longest run of one in every block: all mass in class 0.
        let result = longest_run_of_ones(&[0x55; 256]);
        assert!(!result.passed);
    }

    #[test]
    fn test_serial_correlation_ramp_fails() {
        let data: Vec<u8> = (0..2000).map(|i| (i / 8) as u8).collect();
        assert!(!serial_correlation(&data).passed);
    }

    #[test]
    fn test_shannon_entropy_lcg() {
        let result = shannon_entropy(&lcg_bytes(10_000));
        assert!(result.statistic > 7.9, "entropy too low: {}", result.statistic);
        assert!(result.passed);
    }

    #[test]
    fn test_compression_ratio_constant_data() {
        let result = compression_ratio(&[0u8; 4096]);
        assert!(result.statistic < 0.1);
        assert!(!result.passed);
    }

    #[test]
    fn test_compression_ratio_lcg() {
        let result = compression_ratio(&lcg_bytes(10_000));
        assert!(result.statistic > 0.9, "ratio too low: {}", result.statistic);
    }

    // -----------------------------------------------------------------------
    // Chi-squared uniformity
    // -----------------------------------------------------------------------

    #[test]
    fn test_uniformity_flat_counts_pass() {
        let result = chi_squared_uniformity(&[100; 37]);
        assert_eq!(result.statistic, 0.0);
        assert!(result.passed);
        assert_eq!(result.grade, 'A');
    }

    #[test]
    fn test_uniformity_skewed_counts_fail() {
        let mut counts = vec![100u64; 10];
        counts[0] = 300;
        let result = chi_squared_uniformity(&counts);
        assert!(!result.passed);
        assert!(result.p_value.unwrap() < 1e-10);
    }

    #[test]
    fn test_uniformity_needs_enough_draws() {
        assert!(!chi_squared_uniformity(&[1, 2, 1]).passed);
        assert!(!chi_squared_uniformity(&[500]).passed);
    }

    // -----------------------------------------------------------------------
    // Battery
    // -----------------------------------------------------------------------

    #[test]
    fn test_battery_runs_every_check() {
        assert_eq!(run_all_tests(&lcg_bytes(1000)).len(), BATTERY.len());
    }

    #[test]
    fn test_constant_data_fails_battery() {
        let results = run_all_tests(&[0u8; 1000]);
        let passed = results.iter().filter(|r| r.passed).count();
        assert!(passed < results.len() / 2);
    }

    #[test]
    fn test_lcg_passes_battery() {
        let results = run_all_tests(&lcg_bytes(10_000));
        let passed = results.iter().filter(|r| r.passed).count();
        assert!(
            passed > results.len() / 2,
            "only {passed}/{} checks passed",
            results.len()
        );
    }

    #[test]
    fn test_quality_score() {
        let a = TestResult::from_p("a", 0.5, 0.0, String::new());
        let f = TestResult::failed("f", "");
        assert!((calculate_quality_score(&[a, f]) - 50.0).abs() < 0.01);
        assert_eq!(calculate_quality_score(&[]), 0.0);
    }
}
