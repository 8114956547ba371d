//! Shared helpers for the runtime integration tests.

#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeMap;
use std::sync::Arc;

use stevedore_compose::config::ServiceConfig;
use stevedore_runtime::backend::memory::{EngineCall, InMemoryEngine};
use stevedore_runtime::service::{Service, ServiceBuilder};

/// Routes `tracing` output through the test harness. Safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn vars(pairs: &[(&str, &str)]) -> Arc<BTreeMap<String, String>> {
    Arc::new(
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
    )
}

pub fn config(yaml: &str) -> ServiceConfig {
    serde_yaml::from_str(yaml).expect("valid service config")
}

pub fn service(name: &str, yaml: &str, engine: &Arc<InMemoryEngine>) -> Service {
    ServiceBuilder::new(name)
        .config(config(yaml))
        .env(vars(&[]))
        .build(engine.clone())
        .expect("valid service")
}

/// Calls other than container listings and inspections.
pub fn mutations(engine: &InMemoryEngine) -> Vec<EngineCall> {
    engine
        .calls()
        .into_iter()
        .filter(|c| !matches!(c, EngineCall::ListContainers(_) | EngineCall::Inspect(_)))
        .collect()
}
