use thiserror::Error;

// VERIFIER ERROR
// ================================================================================================

/// Protocol-level failures surfaced while consuming a proof byte stream.
///
/// These are distinct from programmer errors (wrong-size segments, drawing randomness after the
/// query phase began, and the like), which panic on both sides of the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    /// The proof ended before the requested number of bytes could be read.
    #[error(
        "proof too short: requested {requested} bytes at offset {offset}, proof is {length} bytes"
    )]
    ProofTooShort { offset: usize, requested: usize, length: usize },

    /// A value on the wire does not encode a field element in standard form.
    #[error("invalid field element encoding in proof")]
    InvalidFieldElement,

    /// The proof-of-work nonce does not meet the required difficulty.
    #[error("wrong proof of work")]
    ProofOfWorkFailed,
}
