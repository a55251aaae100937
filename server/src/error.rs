use thiserror::Error;

/// Recoverable failures of room lifecycle requests. None of them mutate state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(String),

    #[error("only the room leader can start the game")]
    NotAuthorized,
}
