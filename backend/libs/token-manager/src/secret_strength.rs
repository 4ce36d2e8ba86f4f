//! Signing secret strength checks
//!
//! HS256 tokens are only as strong as the shared secret. Weak secrets are not
//! rejected (operators may run throwaway dev setups) but are reported loudly.

const MIN_SECRET_LENGTH: usize = 32;
const RECOMMENDED_SECRET_LENGTH: usize = 64;
const MIN_ENTROPY_BITS: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStrength {
    Weak,
    Acceptable,
    Strong,
}

/// Classify a signing secret by length, Shannon entropy and obvious runs
pub fn classify_secret(secret: &str) -> SecretStrength {
    let bytes = secret.as_bytes();
    let entropy = shannon_entropy(bytes);

    if bytes.len() < MIN_SECRET_LENGTH || entropy < MIN_ENTROPY_BITS || has_runs(bytes) {
        return SecretStrength::Weak;
    }

    if bytes.len() >= RECOMMENDED_SECRET_LENGTH && entropy >= 5.0 {
        SecretStrength::Strong
    } else {
        SecretStrength::Acceptable
    }
}

/// Bits per byte, 0..=8
fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    let len = data.len() as f64;
    freq.iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Four or more repeated ("aaaa") or ascending ("abcd") bytes in a row
fn has_runs(data: &[u8]) -> bool {
    let mut repeated = 1;
    let mut ascending = 1;
    for pair in data.windows(2) {
        repeated = if pair[0] == pair[1] { repeated + 1 } else { 1 };
        ascending = if pair[1] as i16 - pair[0] as i16 == 1 { ascending + 1 } else { 1 };
        if repeated >= 4 || ascending >= 4 {
            return true;
        }
    }
    false
}
