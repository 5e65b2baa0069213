use channel::VerifierError;
use thiserror::Error;

// FRI VERIFIER ERROR
// ================================================================================================

/// Failure of a FRI proof to verify. Everything here is a protocol error: malformed transcripts
/// and inconsistent decommitments end up as one of these variants, while API misuse panics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FriVerifierError {
    /// The proof byte stream itself is malformed (too short, bad encoding, failed grinding).
    #[error(transparent)]
    Channel(#[from] VerifierError),

    /// A layer's decommitment does not match its commitment.
    #[error("layer {layer} failed decommitment")]
    LayerDecommitmentFailed { layer: usize },

    /// A surviving query does not agree with the polynomial sent for the last layer.
    #[error("FRI query #{query} is not consistent with the coefficients of the last layer")]
    LastLayerInconsistent { query: usize },

    /// The first-layer callback could not verify the evaluations it was asked for.
    #[error("first layer failed decommitment")]
    FirstLayerDecommitmentFailed,
}
