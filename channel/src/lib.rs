//! Fiat-Shamir transcript channels for the granite STARK prover and verifier.
//!
//! The prover channel accumulates the proof as an append-only byte vector while deriving all
//! verifier randomness from a hash chain seeded with the public input; the verifier channel
//! replays the same byte stream and therefore draws identical randomness at every matching
//! point. Both sides collect an annotated trace of the protocol which can be compared verbatim
//! to pin transcript compatibility in tests.
//!
//! This crate also hosts the proof-of-work gate that guards the query phase, and the byte-level
//! view of field elements as they appear on the wire.

mod errors;
pub use errors::VerifierError;

mod field;
pub use field::FieldElementBytes;

mod channel;
pub use channel::{Channel, ChannelState, ChannelStatistics};

mod prover_channel;
pub use prover_channel::NoninteractiveProverChannel;

mod verifier_channel;
pub use verifier_channel::NoninteractiveVerifierChannel;

mod proof_of_work;
pub use proof_of_work::{ProofOfWorkProver, ProofOfWorkVerifier, NONCE_BYTES, PROOF_OF_WORK_MAGIC};
