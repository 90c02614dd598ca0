use std::fmt;

use thiserror::Error;

/// The entity collections the remote store exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    User,
    Session,
    Location,
    Attendance,
    Grade,
    AuditLog,
}

impl EntityKind {
    /// Collection name as used in store URLs.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "User",
            EntityKind::Session => "Session",
            EntityKind::Location => "Location",
            EntityKind::Attendance => "Attendance",
            EntityKind::Grade => "Grade",
            EntityKind::AuditLog => "AuditLog",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Get,
    Filter,
    Create,
    Update,
    Delete,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::List => "list",
            StoreOp::Get => "get",
            StoreOp::Filter => "filter",
            StoreOp::Create => "create",
            StoreOp::Update => "update",
            StoreOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum StoreFault {
    #[error("record not found")]
    NotFound,

    #[error("record was modified concurrently")]
    Conflict,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited - please wait before retrying")]
    RateLimited,

    #[error("server error: {0}")]
    Server(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl StoreFault {
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... ({} bytes total)", &body[..cut], body.len())
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 | 403 => StoreFault::Unauthorized(truncated),
            404 => StoreFault::NotFound,
            409 | 412 => StoreFault::Conflict,
            429 => StoreFault::RateLimited,
            500..=599 => StoreFault::Server(truncated),
            _ => StoreFault::InvalidResponse(format!("status {}: {}", status, truncated)),
        }
    }
}

/// A failed call to the persistence collaborator, with enough context
/// (entity kind, operation, id) for the caller to pick a retry policy.
#[derive(Error, Debug)]
#[error("{op} {kind}{}: {fault}", id_suffix(.id))]
pub struct StoreError {
    pub kind: EntityKind,
    pub op: StoreOp,
    pub id: Option<String>,
    #[source]
    pub fault: StoreFault,
}

fn id_suffix(id: &Option<String>) -> String {
    id.as_ref().map(|id| format!(" {}", id)).unwrap_or_default()
}

impl StoreError {
    pub fn new(kind: EntityKind, op: StoreOp, id: Option<&str>, fault: StoreFault) -> Self {
        Self {
            kind,
            op,
            id: id.map(str::to_string),
            fault,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self.fault, StoreFault::Conflict)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.fault, StoreFault::NotFound)
    }
}
