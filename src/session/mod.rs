mod controller;
mod points;
mod state;

pub use controller::{Outcome, SessionController};
pub use points::Point;
pub use state::Phase;

use thiserror::Error;

use crate::compositor::CompositeError;
use crate::source::SourceError;
use crate::worker::GatewayError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Composite(#[from] CompositeError),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("unknown model {0}")]
    UnknownModel(String),
    #[error("nothing to download yet")]
    DownloadDisabled,
}
