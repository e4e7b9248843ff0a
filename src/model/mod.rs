//! Core data model: lists, members, addresses, passwords and pending requests.

pub mod address;
pub mod list;
pub mod member;
pub mod password;
pub mod pending;
