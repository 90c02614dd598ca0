use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Malformed input; nothing was written.
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The (student, year) total kept changing underneath us, even after a
    /// fresh read.
    #[error("Concurrent update to points of student {student_id} for {year}")]
    Conflict { student_id: String, year: i32 },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CoreError {
    pub fn validation(msg: impl Into<String>) -> Self {
        CoreError::Validation(msg.into())
    }
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
