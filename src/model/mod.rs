//! Data types, split by where they live.
//!
//! - [`db`] types are persisted in MongoDB.
//! - [`api`] types are exchanged with clients as JSON.
//! - [`common`] types are shared by both.

pub mod api;
pub mod auth;
pub mod common;
pub mod db;
pub mod mongodb;
pub mod pagination;
