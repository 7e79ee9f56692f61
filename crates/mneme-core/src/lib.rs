//! `mneme-core`: a typed semantic-memory engine for an LLM coding
//! assistant. A fixed-dimension, type-tagged knowledge graph
//! (confidence-weighted, decaying, graph-linked) lives under hybrid
//! retrieval (dense + sparse fusion, soul-aware rerank, session
//! priming, lateral inhibition, spreading activation) and autonomous
//! dynamics (decay, pruning, Hebbian reinforcement, attractor basins,
//! feedback-driven confidence updates).
//!
//! [`mind::Mind`] is the façade a caller actually holds; everything
//! else in this crate is a component it composes. `mneme-core` takes
//! every path and configuration value explicitly — it reads no
//! environment variables and owns no global state, so the same engine
//! can run embedded in a test, a benchmark, or behind the
//! `mneme-daemon` RPC surface without behaving differently.

pub mod config;
pub mod dynamics;
pub mod embeddings;
pub mod error;
pub mod graph;
pub mod mind;
pub mod node;
pub mod retrieval;
pub mod storage;
pub mod tokenizer;
pub mod vector;

pub use config::Config;
pub use error::{MnemeError, Result};
pub use graph::{Coherence, Graph, Ojas, VitalityStatus};
pub use mind::Mind;
pub use node::{Confidence, Edge, EdgeType, Node, NodeId, NodeType};
pub use retrieval::{Filters, RecallFlags, RecallHit, RecallMode, ZoomLevel};
pub use storage::Storage;
pub use vector::{QuantizedVector, Vector};
