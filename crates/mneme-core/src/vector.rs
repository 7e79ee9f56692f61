//! Fixed-dimension embeddings and their quantized on-disk form.
//!
//! `Vector` is the float32 form kept in the hot tier. `QuantizedVector`
//! is the int8 form written to warm/cold storage: a per-vector scale
//! plus one byte per dimension, dequantized on the fly for similarity
//! and rebuilt to float on promotion to hot (spec.md §4.A).

use serde::{Deserialize, Serialize};

/// A fixed-dimension, (usually) L2-normalised embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector(pub Vec<f32>);

impl Vector {
    /// A zero vector of the given dimension.
    pub fn zeros(dim: usize) -> Self {
        Self(vec![0.0; dim])
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// L2 norm.
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Normalize in place to unit L2 norm. A zero vector is left as-is.
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for x in &mut self.0 {
                *x /= norm;
            }
        }
    }

    /// Whether this vector is unit-norm within `tolerance` (spec.md
    /// invariant 1 uses `1e-4`).
    pub fn is_unit_norm(&self, tolerance: f32) -> bool {
        (self.norm() - 1.0).abs() <= tolerance
    }

    /// Cosine similarity. Assumes both inputs are (close to) unit norm;
    /// falls back to the general formula otherwise so callers that pass
    /// un-normalised vectors still get a correct answer.
    pub fn cosine(a: &Vector, b: &Vector) -> f32 {
        if a.dim() != b.dim() || a.dim() == 0 {
            return 0.0;
        }
        let dot: f32 = a.0.iter().zip(b.0.iter()).map(|(x, y)| x * y).sum();
        let na = a.norm();
        let nb = b.norm();
        if na == 0.0 || nb == 0.0 {
            return 0.0;
        }
        (dot / (na * nb)).clamp(-1.0, 1.0)
    }

    /// Truncate or zero-pad to `dim`, then L2-normalize. Used by the
    /// embedding pipeline when the model's native output width differs
    /// from the configured dimension (spec.md §4.C stage 3).
    pub fn fit_to_dim(mut self, dim: usize) -> Self {
        match self.0.len().cmp(&dim) {
            std::cmp::Ordering::Greater => self.0.truncate(dim),
            std::cmp::Ordering::Less => self.0.resize(dim, 0.0),
            std::cmp::Ordering::Equal => {}
        }
        self.normalize();
        self
    }

    /// Centroid of a set of vectors (used by attractor-basin settling
    /// and wisdom synthesis). Returns `None` for an empty slice.
    pub fn centroid(vectors: &[&Vector]) -> Option<Vector> {
        let dim = vectors.first()?.dim();
        let mut acc = vec![0.0f32; dim];
        for v in vectors {
            if v.dim() != dim {
                continue;
            }
            for (a, x) in acc.iter_mut().zip(v.0.iter()) {
                *a += x;
            }
        }
        let n = vectors.len() as f32;
        for a in &mut acc {
            *a /= n;
        }
        let mut centroid = Vector(acc);
        centroid.normalize();
        Some(centroid)
    }
}

/// Per-dimension int8 vector with a single shared scale, the on-disk
/// (warm/cold) form of a [`Vector`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuantizedVector {
    pub scale: f32,
    pub values: Vec<i8>,
}

impl QuantizedVector {
    /// Quantize: `scale = max(|x|) / 127`, each dimension rounded to the
    /// nearest representable int8.
    pub fn from_float(v: &Vector) -> Self {
        let max_abs = v.0.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        let scale = if max_abs > 0.0 { max_abs / 127.0 } else { 1.0 };
        let values = v
            .0
            .iter()
            .map(|x| (x / scale).round().clamp(-127.0, 127.0) as i8)
            .collect();
        Self { scale, values }
    }

    /// Dequantize back to a float [`Vector`].
    pub fn to_float(&self) -> Vector {
        Vector(self.values.iter().map(|&q| q as f32 * self.scale).collect())
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity computed by dequantizing both operands on the
    /// fly. Within ~2% of the exact float cosine on typical embedding
    /// distributions (spec.md §4.A).
    pub fn cosine_approx(a: &QuantizedVector, b: &QuantizedVector) -> f32 {
        Vector::cosine(&a.to_float(), &b.to_float())
    }

    /// Serialize to bytes: 4-byte LE scale followed by one byte per
    /// dimension.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.values.len());
        out.extend_from_slice(&self.scale.to_le_bytes());
        out.extend(self.values.iter().map(|&v| v as u8));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }
        let scale = f32::from_le_bytes(bytes[0..4].try_into().ok()?);
        let values = bytes[4..].iter().map(|&b| b as i8).collect();
        Some(Self { scale, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical() {
        let a = Vector(vec![1.0, 2.0, 3.0]);
        assert!((Vector::cosine(&a, &a) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_orthogonal() {
        let a = Vector(vec![1.0, 0.0]);
        let b = Vector(vec![0.0, 1.0]);
        assert!(Vector::cosine(&a, &b).abs() < 1e-4);
    }

    #[test]
    fn normalize_then_unit_norm() {
        let mut v = Vector(vec![3.0, 4.0]);
        v.normalize();
        assert!(v.is_unit_norm(1e-4));
    }

    #[test]
    fn quantize_roundtrip_within_tolerance() {
        // unit-norm random-ish vector
        let dim = 32;
        let raw: Vec<f32> = (0..dim).map(|i| ((i as f32) * 0.37).sin()).collect();
        let mut v = Vector(raw);
        v.normalize();

        let q = QuantizedVector::from_float(&v);
        let back = q.to_float();
        let sim = Vector::cosine(&v, &back);
        assert!(sim >= 0.98, "cosine after quantize/dequantize was {sim}");
    }

    #[test]
    fn fit_to_dim_pads_and_truncates() {
        let v = Vector(vec![1.0, 0.0]).fit_to_dim(4);
        assert_eq!(v.dim(), 4);
        let v2 = Vector(vec![1.0, 2.0, 3.0, 4.0]).fit_to_dim(2);
        assert_eq!(v2.dim(), 2);
    }

    #[test]
    fn centroid_of_identical_vectors_is_itself() {
        let a = Vector(vec![1.0, 0.0, 0.0]);
        let b = Vector(vec![1.0, 0.0, 0.0]);
        let c = Vector::centroid(&[&a, &b]).unwrap();
        assert!(Vector::cosine(&c, &a) > 0.999);
    }
}
