//! Tunable constants for retrieval, dynamics, and tiering, gathered
//! into one `serde`-backed struct so a deployment can override any of
//! them from a TOML file or `MNEME_*` environment variable without
//! touching code. `Default` reproduces every numeric constant spec.md
//! pins by name.

use serde::{Deserialize, Serialize};

use crate::retrieval::{fusion, inhibition, rerank, session, spreading};

/// Per-feedback-kind confidence delta (spec.md §4.H).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackDeltas {
    pub used: f64,
    pub helpful: f64,
    pub misleading: f64,
    pub confirmed: f64,
    pub challenged: f64,
}

impl Default for FeedbackDeltas {
    fn default() -> Self {
        Self {
            used: 0.01,
            helpful: 0.10,
            misleading: -0.15,
            confirmed: 0.08,
            challenged: -0.05,
        }
    }
}

/// Tiered-storage placement thresholds (spec.md §4.D).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub hot_capacity: usize,
    pub hot_age_ms: i64,
    pub warm_age_ms: i64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            hot_capacity: 10_000,
            hot_age_ms: 7 * 24 * 3_600_000,
            warm_age_ms: 30 * 24 * 3_600_000,
        }
    }
}

/// Background-tick intervals (spec.md §4.G).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickIntervals {
    pub decay_interval_ms: i64,
    pub coherence_interval_ms: i64,
    pub checkpoint_interval_ms: i64,
}

impl Default for TickIntervals {
    fn default() -> Self {
        Self {
            decay_interval_ms: 3_600_000,
            coherence_interval_ms: 300_000,
            checkpoint_interval_ms: 300_000,
        }
    }
}

/// Every numeric knob named across spec.md §4.C-H, loaded from TOML and
/// overridable by `MNEME_*` environment variables in `mneme-daemon`.
/// `mneme-core` itself never reads the environment — a caller builds a
/// `Config` and passes it in (teacher's `Storage::new(db_path: Option<PathBuf>)`
/// shape: no hidden globals inside the library).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dimension: usize,
    pub max_seq_len: usize,
    pub embedding_cache_capacity: usize,

    pub tiers: TierConfig,
    pub ticks: TickIntervals,

    pub k_rrf: f64,
    pub w_dense: f64,

    pub w_c: f64,
    pub w_r: f64,
    pub half_life_days: f64,

    pub priming_alpha: f64,

    pub similarity_threshold: f32,
    pub inhibition_strength: f32,
    pub hard_suppression: bool,

    pub spread_max_hops: u32,
    pub spread_hop_decay: f64,
    pub spread_strength: f64,
    pub hebbian_eta: f32,

    pub feedback: FeedbackDeltas,
    pub feedback_queue_capacity: usize,

    pub min_observation_interval_ms: i64,

    pub cascade_strength: f32,
    pub settle_strength: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dimension: 384,
            max_seq_len: 128,
            embedding_cache_capacity: crate::embeddings::DEFAULT_CAPACITY,

            tiers: TierConfig::default(),
            ticks: TickIntervals::default(),

            k_rrf: fusion::DEFAULT_K_RRF,
            w_dense: fusion::DEFAULT_W_DENSE,

            w_c: rerank::DEFAULT_W_C,
            w_r: rerank::DEFAULT_W_R,
            half_life_days: rerank::DEFAULT_HALF_LIFE_DAYS,

            priming_alpha: session::DEFAULT_ALPHA,

            similarity_threshold: inhibition::DEFAULT_SIMILARITY_THRESHOLD,
            inhibition_strength: inhibition::DEFAULT_INHIBITION_STRENGTH,
            hard_suppression: false,

            spread_max_hops: spreading::DEFAULT_MAX_HOPS,
            spread_hop_decay: spreading::DEFAULT_HOP_DECAY,
            spread_strength: spreading::DEFAULT_SPREAD_STRENGTH,
            hebbian_eta: spreading::DEFAULT_HEBBIAN_ETA,

            feedback: FeedbackDeltas::default(),
            feedback_queue_capacity: 1_000,

            min_observation_interval_ms: 500,

            cascade_strength: 0.2,
            settle_strength: 0.1,
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to `Default` for any field
    /// the file omits (`#[serde(default)]` on the struct).
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn rerank_config(&self) -> rerank::RerankConfig {
        rerank::RerankConfig {
            w_c: self.w_c,
            w_r: self.w_r,
            half_life_days: self.half_life_days,
        }
    }

    pub fn inhibition_config(&self) -> inhibition::InhibitionConfig {
        inhibition::InhibitionConfig {
            similarity_threshold: self.similarity_threshold,
            inhibition_strength: self.inhibition_strength,
            hard_suppression: self.hard_suppression,
        }
    }

    pub fn spread_config(&self) -> spreading::SpreadConfig {
        spreading::SpreadConfig {
            max_hops: self.spread_max_hops,
            hop_decay: self.spread_hop_decay,
            spread_strength: self.spread_strength,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_constants() {
        let config = Config::default();
        assert_eq!(config.tiers.hot_capacity, 10_000);
        assert!((config.k_rrf - 60.0).abs() < 1e-9);
        assert!((config.w_dense - 0.7).abs() < 1e-9);
        assert!((config.inhibition_strength - 0.4).abs() < 1e-6);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = Config::from_toml_str("dimension = 256\n").unwrap();
        assert_eq!(config.dimension, 256);
        assert_eq!(config.tiers.hot_capacity, 10_000);
    }
}
