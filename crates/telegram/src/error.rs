use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Telegram(#[from] teloxide::RequestError),

    #[error("telegram http client: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Channel(#[from] therra_channels::Error),

    #[error("invalid webhook url: {0}")]
    InvalidUrl(String),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

impl From<Error> for therra_channels::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Channel(inner) => inner,
            other => therra_channels::Error::external("telegram", other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
