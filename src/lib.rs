//! `listmgr`: mailing list configuration and membership management.
//!
//! This crate provides the list model, the configuration schema and its
//! validation rules, the per-list lock, persistent storage, and the mutation
//! operations an administrator or member can request.

pub mod bounce;
pub mod config;
pub mod engine;
pub mod error;
pub mod form;
pub mod lock;
pub mod model;
pub mod schema;
pub mod store;
pub mod validate;
