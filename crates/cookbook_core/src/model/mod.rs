//! Cookbook domain model.
//!
//! # Responsibility
//! - Define the recipe aggregate and the shared catalog entities it points at.
//! - Own input validation that must run before anything is written.
//!
//! # Invariants
//! - Aggregates own their instructions and ingredient lines by value.
//! - Catalog entities (users, aisles, units, ingredients) are only ever
//!   referenced from an aggregate by id.

pub mod catalog;
pub mod recipe;
