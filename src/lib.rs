//! podcache: an offline-capable caching gateway.
//!
//! Core assets of a web application are pre-warmed per cache version and
//! served cache-first; media is served cache-first too but only stored when a
//! client asks for it over the control channel.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
