//! Linkage criteria and their Lance–Williams updates.
//!
//! After clusters `i` and `j` merge, the distance from any other cluster `k`
//! to the union is a function of the three old distances and the sizes:
//!
//! | Linkage | d(k, i∪j) |
//! |---------|-----------|
//! | Single | min(d_ki, d_kj) |
//! | Complete | max(d_ki, d_kj) |
//! | Average | (nᵢ d_ki + nⱼ d_kj) / (nᵢ + nⱼ) |
//! | Ward | √(((nᵢ+n_k) d_ki² + (nⱼ+n_k) d_kj² − n_k d_ij²) / (nᵢ+nⱼ+n_k)) |
//!
//! All four are *reducible*, so merge heights come out non-decreasing.
//!
//! # Ward and cosine distance
//!
//! Ward's update assumes the input distances are Euclidean. Cosine distance
//! is not, so Ward merges over cosine distances have no variance
//! interpretation. (For L2-normalized embeddings, `√(2·d_cos)` is the
//! Euclidean distance.) The pipeline logs a warning when Ward is selected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Linkage method for hierarchical clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Single linkage: minimum distance between clusters.
    Single,
    /// Complete linkage: maximum distance between clusters.
    Complete,
    /// Average linkage (UPGMA): mean distance between clusters.
    #[default]
    Average,
    /// Ward's method: minimize within-cluster variance.
    Ward,
}

impl Linkage {
    /// All supported methods.
    pub const ALL: [Linkage; 4] = [
        Linkage::Single,
        Linkage::Complete,
        Linkage::Average,
        Linkage::Ward,
    ];

    /// Lowercase method name.
    pub fn as_str(self) -> &'static str {
        match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
            Linkage::Ward => "ward",
        }
    }

    /// Whether the method is only meaningful on Euclidean distances.
    pub fn requires_euclidean(self) -> bool {
        matches!(self, Linkage::Ward)
    }

    /// Distance from cluster `k` to the union of `i` and `j`.
    #[inline]
    pub fn update(
        self,
        d_ki: f64,
        d_kj: f64,
        d_ij: f64,
        n_i: usize,
        n_j: usize,
        n_k: usize,
    ) -> f64 {
        match self {
            Linkage::Single => d_ki.min(d_kj),
            Linkage::Complete => d_ki.max(d_kj),
            Linkage::Average => {
                let (n_i, n_j) = (n_i as f64, n_j as f64);
                (n_i * d_ki + n_j * d_kj) / (n_i + n_j)
            }
            Linkage::Ward => {
                let (n_i, n_j, n_k) = (n_i as f64, n_j as f64, n_k as f64);
                let sq = ((n_i + n_k) * d_ki * d_ki + (n_j + n_k) * d_kj * d_kj
                    - n_k * d_ij * d_ij)
                    / (n_i + n_j + n_k);
                sq.max(0.0).sqrt()
            }
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "ward" => Ok(Linkage::Ward),
            _ => Err(Error::UnsupportedLinkage {
                name: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trip_names() {
        for l in Linkage::ALL {
            assert_eq!(l.as_str().parse::<Linkage>().unwrap(), l);
        }
        assert_eq!(" Ward ".parse::<Linkage>().unwrap(), Linkage::Ward);
        assert_eq!(Linkage::default(), Linkage::Average);
    }

    #[test]
    fn test_parse_unknown_is_unsupported() {
        let err = "bogus".parse::<Linkage>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedLinkage { ref name } if name == "bogus"));
    }

    #[test]
    fn test_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Linkage::Complete).unwrap(), "\"complete\"");
        let l: Linkage = serde_json::from_str("\"single\"").unwrap();
        assert_eq!(l, Linkage::Single);
    }

    #[test]
    fn test_updates() {
        assert_eq!(Linkage::Single.update(0.2, 0.6, 0.1, 1, 3, 1), 0.2);
        assert_eq!(Linkage::Complete.update(0.2, 0.6, 0.1, 1, 3, 1), 0.6);
        assert!((Linkage::Average.update(0.2, 0.6, 0.1, 1, 3, 1) - 0.5).abs() < 1e-12);

        // Three collinear points 0, 1, 3: Ward distance from {3} to {0, 1}
        // is sqrt(2 * 1 * 2 / 3) * |3 - 0.5|, i.e. sqrt(2·n_a·n_b/(n_a+n_b))·|Δμ|.
        let w = Linkage::Ward.update(3.0, 2.0, 1.0, 1, 1, 1);
        let expected = (2.0f64 * 2.0 * 1.0 / 3.0).sqrt() * 2.5;
        assert!((w - expected).abs() < 1e-12, "{w} vs {expected}");
    }
}
