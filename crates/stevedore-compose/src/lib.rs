//! # stevedore-compose
//!
//! Pure building blocks for turning a declarative service description into
//! container-engine options.
//!
//! Handles:
//! - **Config**: the recognized per-service option keys.
//! - **Env**: the ambient-environment capability and `${VAR}` / `~` expansion.
//! - **Port**, **Volume**, **Environment**, **Image**: spec parsers.
//! - **Naming**: canonical container names and their inverse.
//! - **Graph**: dependency ordering of services.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod config;
pub mod env;
pub mod environment;
pub mod graph;
pub mod image;
pub mod naming;
pub mod port;
pub mod volume;
