//! Timestamps and authorship shared by every persisted record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of the user performing a mutation. User accounts
/// themselves live outside this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Creation/change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Audit {
    pub created_by: Option<UserId>,
    pub changed_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Audit {
    /// Fresh history for a record created by `actor`.
    pub fn now(actor: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            created_by: actor,
            changed_by: actor,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a change. `created_*` never moves.
    pub fn touch(&mut self, actor: Option<UserId>) {
        self.changed_by = actor;
        self.updated_at = Utc::now();
    }
}
