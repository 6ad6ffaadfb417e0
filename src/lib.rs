#![forbid(unsafe_code)]

//! credgate: credential store and HTTP Basic authentication gate.
//!
//! - [`auth`]: hashing policy, SQLite credential store, authentication gate
//! - [`gateway`]: axum HTTP surface (`/register`, `/login`, `/tasks`)
//! - [`client`]: CLI client for a running gateway
//! - [`config`]: TOML configuration

pub mod auth;
pub mod client;
pub mod config;
pub mod gateway;
