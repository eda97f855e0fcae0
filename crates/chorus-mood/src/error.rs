use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MoodError {
    #[error("generator backend error: {0}")]
    Generator(#[from] chorus_common::generator::GeneratorError),
}

pub type MoodResult<T> = Result<T, MoodError>;
