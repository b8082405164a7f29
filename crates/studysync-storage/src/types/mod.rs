//! Type definitions for studysync storage.

mod aggregates;
mod groups;
mod ids;
mod memberships;
mod ratings;
mod users;

// Re-export all types from submodules
pub use aggregates::*;
pub use groups::*;
pub use ids::*;
pub use memberships::*;
pub use ratings::*;
pub use users::*;
