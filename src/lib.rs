//! # jmscan
//!
//! Jm-triviality classification of knots from their Jones polynomials, built
//! for corpora of tens of millions of records stored as one gigantic JSON
//! object.
//!
//! ## Quick Start
//!
//! ```rust
//! use jmscan::expansion::{jm_ring, jm_taylor};
//! use jmscan::poly::Laurent;
//!
//! // Trefoil: V(q) = -q^4 + q^3 + q
//! let trefoil = Laurent::from_terms([(4, -1), (3, 1), (1, 1)]);
//!
//! // Two independent exact-arithmetic engines, one answer.
//! assert_eq!(jm_ring(&trefoil, false).unwrap(), 3);
//! assert_eq!(jm_taylor(&trefoil, 11, 1).unwrap(), 3);
//! ```
//!
//! ## Pipeline
//!
//! - [`split`] — partition the corpus into self-contained shards using only
//!   boundary bytes, never a full scan.
//! - [`classify`] — stream each shard through a constant-memory classifier;
//!   one worker per shard, results returned by value.
//! - [`aggregate`] — merge worker results into probability and run tables.
//! - [`pipeline`] — the driver tying the stages together.
//!
//! ## Key Concepts
//!
//! - **Jm index**: the lowest nontrivial order at which an expansion of V(q)
//!   departs from the unknot's expansion.
//! - **Representative run**: a compressed `[first_id, last_id]` interval of
//!   consecutive knot ids sharing one Jm value.

pub mod aggregate;
pub mod classify;
pub mod expansion;
pub mod label;
pub mod pipeline;
pub mod poly;
pub mod split;

pub use classify::{classify_shard, ClassifyConfig, WorkerReport};
pub use expansion::{jm_ring, jm_taylor, JmError, Representation};
pub use poly::Laurent;
