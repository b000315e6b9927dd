#[derive(thiserror::Error, Debug)]
pub enum ParticipationError {
    #[error("{0}")]
    Duplicate(String),
    #[error("no participation found with id {0}")]
    NotFound(u64),
    #[error("could not read the photo payload for participation {0}")]
    Photo(u64),
}
