//! Domain layer for order management.
//!
//! This crate provides:
//! - Member and Item collaborators with their repositories
//! - Explicit relation loading state ([`Relation`], [`Collection`])
//! - The Order aggregate (Order, OrderItem, Delivery) and its rules
//! - [`OrderRepository`] with the competing retrieval strategies
//! - [`OrderService`] running each operation in its own unit of work
//! - [`ReadScope`], the read-only boundary for lookups and listings

pub mod error;
pub mod item;
pub mod member;
pub mod order;
pub mod relation;
pub mod scope;

pub use error::{DomainError, Result};
pub use item::{Item, ItemRepository, ItemSet};
pub use member::{Member, MemberRepository};
pub use order::{
    Delivery, FetchConfig, Order, OrderError, OrderItem, OrderRepository, OrderSearch,
    OrderService,
};
pub use relation::{Collection, Relation};
pub use scope::ReadScope;
