//! FRI (Fast Reed-Solomon IOP of Proximity) low-degree test for the granite STARK prover and
//! verifier.
//!
//! The prover receives the evaluation of a committed polynomial over a bit-reversed
//! multiplicative coset and repeatedly folds it: each fold halves the domain and combines
//! `f(x)` and `f(-x)` with a transcript-drawn evaluation point. Folded evaluations are
//! materialized in memory, or regenerated coset by coset from a low-degree extension when they
//! are too large, and each materialized layer is committed through a row/column table
//! commitment. After the last fold the remaining polynomial is sent in the clear, a
//! proof-of-work nonce gates the query phase, and the queries are answered by decommitting
//! every layer. The verifier mirrors the walk, re-folding the decommitted cosets down to the
//! last layer and comparing against the polynomial it was sent.

mod bases;
pub use bases::FftBases;

mod lde;
pub use lde::{FftPrecompute, LdeManager};

mod folder;
pub use folder::{compute_next_fri_layer, next_layer_element_from_two_previous};

mod parameters;
pub use parameters::{FriParameters, FriProverConfig};

mod layer;
pub use layer::{
    FriLayer, FriLayerInMemory, FriLayerOutOfMemory, FriLayerProxy, LayerStorage, SharedFriLayer,
};

mod committed_layer;
pub use committed_layer::{
    FriCommittedLayer, FriCommittedLayerByCallback, FriCommittedLayerByTableProver,
};

mod details;
pub use details::{
    apply_fri_layers, choose_query_indices_prover, choose_query_indices_verifier,
    next_layer_data_and_integrity_queries, second_layer_queries_to_first_layer_queries,
    table_prover_row, table_prover_row_col,
};

mod errors;
pub use errors::FriVerifierError;

mod prover;
pub use prover::FriProver;

mod verifier;
pub use verifier::{FirstLayerQueriesCallback, FriVerifier};

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod tests;

use channel::FieldElementBytes;
use math::StarkField;

// FRI FIELD
// ================================================================================================

/// The field bound required throughout this crate: a STARK-friendly prime field with a
/// byte-level wire representation.
pub trait FriField: StarkField + FieldElementBytes {}

impl<T: StarkField + FieldElementBytes> FriField for T {}
