use async_trait::async_trait;

use surge_core::model::{Message, SsiScore};

use crate::error::OracleError;

mod openai;

pub use openai::{OpenAiOracle, OracleConfig};

/// One oracle turn: the assistant reply plus, when the transcript carries
/// enough signal, a freshly computed SSI score. An absent score is a valid
/// reply; the engine then keeps the previous score unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleReply {
    pub message: String,
    pub score: Option<SsiScore>,
}

/// The opaque reply-and-scoring collaborator.
///
/// Treated as a pure function from transcript to reply: stateless per call,
/// always handed the whole conversation so the 5-dimension score cannot
/// drift from partial updates. Reply generation and scoring are one call,
/// so an oracle failure fails the whole chat turn atomically.
#[async_trait]
pub trait ScoringOracle: Send + Sync {
    /// Produce the next assistant reply (and optionally a score) for the
    /// given transcript. The transcript includes the hidden seed message so
    /// the oracle can open a fresh session with its first question.
    ///
    /// # Errors
    ///
    /// Returns `OracleError` when no reply could be produced; callers must
    /// not persist anything from the attempted turn.
    async fn exchange(&self, transcript: &[Message]) -> Result<OracleReply, OracleError>;
}
