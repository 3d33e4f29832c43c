//! Core types for tracking editor files as links in a deep graph store.
//!
//! Everything persistent is a [`model::Link`]. Stores are reached through the
//! [`storage::LinkStore`] and [`storage::IdentityService`] traits, queried with
//! the declarative [`query::LinkFilter`] grammar.

pub mod config;
pub mod error;
pub mod model;
pub mod query;
pub mod storage;

pub use error::CoreError;
