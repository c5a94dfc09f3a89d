use super::model::id::BookId;

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("no record found for book id: {0}")]
    NotFound(BookId),

    #[error("book {id} is already borrowed by {borrower}")]
    AlreadyBorrowed { id: BookId, borrower: String },

    #[error("book {0} is not currently borrowed")]
    NotBorrowed(BookId),

    #[error("invalid rating {0}: must be between 1 and 5")]
    InvalidRating(i64),
}

/// エラー分類。CLI側での表示・終了コード判定に使う。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyBorrowed { .. } | Self::NotBorrowed(_) => ErrorKind::Conflict,
            Self::InvalidRating(_) => ErrorKind::Validation,
        }
    }
}
