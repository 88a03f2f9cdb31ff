#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown intent label: {0}")]
    UnknownIntent(String),
}

pub type Result<T> = std::result::Result<T, Error>;
