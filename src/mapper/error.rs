use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No usable name for the bookkeeping record or a private slot within the probe limit.
    #[error("no free name derived from '{base}' after {attempts} probes")]
    Exhausted { base: String, attempts: usize },

    #[error("property '{0}' is read-only")]
    ReadOnly(String),

    #[error("record source must be a JSON object")]
    NotAnObject,

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}
