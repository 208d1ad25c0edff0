//! Staff records backing the identity/roles collaborator.

use serde::{Deserialize, Serialize};

use crate::types::{DbId, Timestamp};

/// A staff member of a firm, from the `accountants` table.
///
/// Role membership lives in `accountant_roles`; only active accountants are
/// eligible targets for role-based assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Accountant {
    pub id: DbId,
    pub firm_id: DbId,
    pub display_name: String,
    pub email: String,
    pub is_active: bool,
    pub created_at: Timestamp,
}
