use thiserror::Error;

use crate::model::{CatalogError, MessageError, ScoreError, SessionStateError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error(transparent)]
    Session(#[from] SessionStateError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
