//! # stevedore-runtime
//!
//! Turns resolved service configuration into container-engine calls.
//!
//! A [`service::Service`] owns one service's configuration and reconciles
//! the containers the engine reports against it. A [`project::Project`]
//! orders services by their links and drives them together. The engine
//! itself sits behind [`backend::ContainerEngine`].

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod backend;
pub mod container;
pub mod links;
pub mod project;
pub mod service;
