use core::fmt;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failures surfaced by the registries, the schedule editor and the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchoolError {
    /// A field is out of its allowed range or does not match its pattern
    Validation(String),
    /// A unique key is already taken
    DuplicateKey(String),
    /// The operation is blocked by existing references
    Conflict(String),
    NotFound(String),
    /// No viewer, or the viewer's role is not allowed here
    Unauthorized(String),
    /// Unexpected persistence failure; the transaction has been rolled back
    Internal(String),
}

impl Display for SchoolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SchoolError::Validation(m) => write!(f, "validation error: {}", m),
            SchoolError::DuplicateKey(m) => write!(f, "duplicate key: {}", m),
            SchoolError::Conflict(m) => write!(f, "conflict: {}", m),
            SchoolError::NotFound(m) => write!(f, "not found: {}", m),
            SchoolError::Unauthorized(m) => write!(f, "unauthorized: {}", m),
            SchoolError::Internal(m) => write!(f, "internal error: {}", m),
        }
    }
}

impl Error for SchoolError {}

impl SchoolError {
    /// Message without the category prefix, suitable for end users.
    pub fn message(&self) -> &str {
        match self {
            SchoolError::Validation(m)
            | SchoolError::DuplicateKey(m)
            | SchoolError::Conflict(m)
            | SchoolError::NotFound(m)
            | SchoolError::Unauthorized(m)
            | SchoolError::Internal(m) => m,
        }
    }
}

impl From<DieselError> for SchoolError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::NotFound => SchoolError::NotFound("record not found".to_string()),
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                let constraint = info.constraint_name().unwrap_or("unique constraint");
                SchoolError::DuplicateKey(format!("{} ({})", info.message(), constraint))
            }
            DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
                SchoolError::Conflict(info.message().to_string())
            }
            other => SchoolError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        let err: SchoolError = DieselError::NotFound.into();
        assert!(matches!(err, SchoolError::NotFound(_)));
    }

    #[test]
    fn display_keeps_category_and_message() {
        let err = SchoolError::DuplicateKey("room 101 already exists".into());
        assert_eq!(err.to_string(), "duplicate key: room 101 already exists");
        assert_eq!(err.message(), "room 101 already exists");
    }

    #[test]
    fn other_diesel_errors_are_internal() {
        let err: SchoolError = DieselError::RollbackTransaction.into();
        assert!(matches!(err, SchoolError::Internal(_)));
    }
}
