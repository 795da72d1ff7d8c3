//! Use-case services over the cookbook repositories.
//!
//! # Responsibility
//! - Provide the stable public surface for recipe reads and writes.
//! - Keep callers independent from mapper and assembler internals.

pub mod cookbook_service;
