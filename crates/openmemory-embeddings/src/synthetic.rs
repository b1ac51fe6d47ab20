//! Deterministic pseudo-embedding.
//!
//! A blake3 digest of the text seeds an xorshift generator that fills the
//! configured dimension; the result is L2-normalized. Always available, so
//! it doubles as the fallback when real providers are down and as the test
//! provider.

/// Synthetic embedding provider.
#[derive(Debug, Clone)]
pub struct Synthetic {
    dim: usize,
}

impl Synthetic {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let digest = blake3::hash(text.as_bytes());
        let bytes = digest.as_bytes();
        let mut state = u64::from_le_bytes(bytes[..8].try_into().unwrap()) | 1;

        let mut v = Vec::with_capacity(self.dim);
        for _ in 0..self.dim {
            state = xorshift64(state);
            // Map to [-1, 1).
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            v.push((unit * 2.0 - 1.0) as f32);
        }
        normalize(&mut v);
        v
    }

    pub fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

fn xorshift64(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

/// L2-normalize in place; zero vectors stay zero.
pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Fit a provider vector to the configured dimension: truncate when longer,
/// zero-pad when shorter, then renormalize.
pub fn fit_dimension(mut v: Vec<f32>, dim: usize) -> Vec<f32> {
    if v.len() != dim {
        v.resize(dim, 0.0);
        normalize(&mut v);
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_text() {
        let p = Synthetic::new(256);
        assert_eq!(p.embed("hello world"), p.embed("hello world"));
    }

    #[test]
    fn different_texts_differ() {
        let p = Synthetic::new(256);
        assert_ne!(p.embed("hello"), p.embed("goodbye"));
    }

    #[test]
    fn unit_norm() {
        let p = Synthetic::new(64);
        let v = p.embed("check the norm");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn fit_dimension_truncates_and_pads() {
        assert_eq!(fit_dimension(vec![1.0; 10], 4).len(), 4);
        assert_eq!(fit_dimension(vec![1.0; 2], 8).len(), 8);
    }
}
