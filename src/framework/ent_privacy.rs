// Ent Privacy - authentication and ownership gates for mutations

use std::fmt;
use tracing::warn;

use crate::core::UserId;
use crate::error::{AppError, AppResult};
use crate::framework::ent_trait::Entity;
use crate::models::Principal;

/// Operations that can be gated by a privacy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyOperation {
    Update,
    Delete,
}

impl fmt::Display for PrivacyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            PrivacyOperation::Update => "update",
            PrivacyOperation::Delete => "delete",
        };
        f.write_str(verb)
    }
}

/// Entities with a single owning principal
pub trait Owned: Entity {
    fn owner_id(&self) -> UserId;
}

/// `Unauthenticated` unless a principal was resolved
pub fn require_principal(principal: Option<Principal>) -> AppResult<Principal> {
    principal.ok_or_else(AppError::unauthenticated)
}

/// Ownership check: only the principal whose id equals the entity's
/// author may perform `operation` on it.
pub fn require_owner<E: Owned>(
    principal: &Principal,
    entity: &E,
    operation: PrivacyOperation,
) -> AppResult<()> {
    if entity.owner_id() == principal.id {
        return Ok(());
    }

    warn!(
        user_id = %principal.id,
        owner_id = %entity.owner_id(),
        entity = E::NOUN,
        entity_id = %entity.id(),
        %operation,
        "ownership check denied"
    );
    Err(AppError::Forbidden(format!(
        "Not authorized to {} this {}",
        operation,
        E::NOUN
    )))
}
