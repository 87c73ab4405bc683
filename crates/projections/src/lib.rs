//! Listing projections for the order read side.
//!
//! This crate provides:
//! - [`OrderQueryService`] with the DTO-level listing strategies
//! - DTO shapes selected column-by-column from the store
//! - [`regroup_flat`], the fold from flat joined rows back to nested DTOs
//! - Aggregate-to-DTO listing shapes ([`OrderDto`], [`SimpleOrderDto`])

pub mod dto;
pub mod error;
pub mod query_service;
pub mod regroup;
pub mod views;

pub use dto::{OrderFlatDto, OrderItemQueryDto, OrderQueryDto, OrderSimpleQueryDto};
pub use error::{QueryError, Result};
pub use query_service::OrderQueryService;
pub use regroup::{regroup_flat, sort_lines_by_item_name};
pub use views::{OrderDto, OrderItemDto, SimpleOrderDto};
