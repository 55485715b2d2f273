//! `depot-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every Depot crate
//! (no infrastructure concerns): tenant/user identifiers, the domain error model,
//! and the optimistic-concurrency version token.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{TenantId, UserId};
pub use value_object::ValueObject;
