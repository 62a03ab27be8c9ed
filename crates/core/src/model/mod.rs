mod catalog;
mod ids;
mod message;
mod progress;
mod score;
mod session;

pub use ids::{ChapterId, ModuleId, ParseIdError, StudentId};

pub use catalog::{CatalogError, Chapter, Module};
pub use message::{MAX_MESSAGE_LEN, Message, MessageError, MessageRole, SEED_SENTINEL};
pub use progress::ChapterProgress;
pub use score::{ScoreError, SsiScore};
pub use session::{ChatSession, SessionKey, SessionScope, SessionState, SessionStateError};
