// Ent Framework - typed entity access and privacy checks

pub mod ent_privacy;
pub mod ent_trait;

pub use ent_privacy::{require_owner, require_principal, Owned, PrivacyOperation};
pub use ent_trait::Entity;
