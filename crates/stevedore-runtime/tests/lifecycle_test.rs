//! Start, stop, recreate, scale and project-level flows.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{init_tracing, mutations, service, vars};
use stevedore_common::config::StevedoreConfig;
use stevedore_common::error::StevedoreError;
use stevedore_common::types::ContainerState;
use stevedore_compose::config::ServiceConfig;
use stevedore_runtime::backend::memory::{EngineCall, InMemoryEngine};
use stevedore_runtime::backend::{ContainerEngine, ListFilter, PullOptions};
use stevedore_runtime::project::Project;

fn busybox_engine() -> Arc<InMemoryEngine> {
    Arc::new(InMemoryEngine::new().with_image("busybox"))
}

fn names(containers: &[stevedore_runtime::container::Container]) -> Vec<String> {
    containers.iter().map(|c| c.name.clone()).collect()
}

// ── Start / stop ─────────────────────────────────────────────────────

#[test]
fn start_stop_and_remove_stopped() {
    init_tracing();
    let engine = busybox_engine();
    let web = service("web", "image: busybox", &engine);

    let started = web.start_or_create_containers(None).unwrap();
    assert_eq!(names(&started), vec!["default_web_1"]);
    assert!(started[0].is_running());

    web.stop().unwrap();
    assert!(web.containers(false).unwrap().is_empty());
    assert_eq!(web.containers(true).unwrap().len(), 1);

    let restarted = web.start().unwrap();
    assert_eq!(names(&restarted), vec!["default_web_1"]);
    assert_eq!(web.containers(false).unwrap().len(), 1);

    web.stop().unwrap();
    web.remove_stopped().unwrap();
    assert!(web.containers(true).unwrap().is_empty());
}

#[test]
fn start_or_create_reuses_existing_containers() {
    let engine = busybox_engine();
    let web = service("web", "image: busybox", &engine);

    let first = web.start_or_create_containers(None).unwrap();
    let second = web.start_or_create_containers(None).unwrap();
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(engine.list_containers(ListFilter::All).unwrap().len(), 1);
}

// ── Recreate ─────────────────────────────────────────────────────────

#[test]
fn recreate_keeps_engine_managed_volumes() {
    init_tracing();
    let engine = busybox_engine();
    let db = service("db", "image: busybox\nvolumes: [/var/lib/data, '/etc/db:/etc/db:ro']", &engine);

    let original = db.start_or_create_containers(None).unwrap().remove(0);
    let storage = original.volumes(engine.as_ref()).unwrap()["/var/lib/data"].clone();

    let recreated = db.recreate_containers(None).unwrap();
    assert_eq!(recreated.len(), 1);
    let replacement = &recreated[0];
    assert_eq!(replacement.name, "default_db_1");
    assert_ne!(replacement.id, original.id);
    assert!(replacement.is_running());

    let volumes = replacement.volumes(engine.as_ref()).unwrap();
    assert_eq!(volumes["/var/lib/data"], storage);
    assert_eq!(volumes["/etc/db"], "/etc/db");

    assert!(engine.inspect_container(&original.id).is_err());
    let all = engine.list_containers(ListFilter::All).unwrap();
    assert_eq!(all.len(), 1, "intermediate container should be gone: {all:?}");
}

#[test]
fn recreate_uses_an_echo_intermediate() {
    let engine = busybox_engine();
    let db = service("db", "image: busybox\nvolumes: [/data]", &engine);
    let original = db.start_or_create_containers(None).unwrap().remove(0);
    engine.clear_calls();

    let _ = db.recreate_container(&original, None).unwrap();
    let calls = mutations(&engine);
    assert_eq!(calls[0], EngineCall::Create(None));
    assert!(matches!(calls[1], EngineCall::Start(_)));
    assert!(calls.contains(&EngineCall::Stop(original.id.clone())));
    assert!(calls.contains(&EngineCall::Remove(original.id.clone())));
    assert!(calls.contains(&EngineCall::Create(Some("default_db_1".into()))));
}

#[test]
fn recreate_without_containers_creates_one() {
    let engine = busybox_engine();
    let web = service("web", "image: busybox", &engine);
    let created = web.recreate_containers(None).unwrap();
    assert_eq!(names(&created), vec!["default_web_1"]);
    assert!(created[0].is_running());
}

#[test]
fn recreate_pulls_with_the_requested_registry_mode() {
    let engine = Arc::new(
        InMemoryEngine::new()
            .with_image("busybox")
            .with_registry_image("newimg"),
    );
    let before = service("web", "image: busybox", &engine);
    let _ = before.start_or_create_containers(None).unwrap();

    let after = service("web", "image: newimg", &engine);
    let recreated = after.recreate_containers(Some(true)).unwrap();
    assert_eq!(names(&recreated), vec!["default_web_1"]);
    assert!(engine.calls().contains(&EngineCall::Pull {
        reference: "newimg:latest".into(),
        options: PullOptions {
            insecure_registry: true,
            stream: true,
        },
    }));
}

#[test]
fn failed_recreate_still_removes_the_intermediate() {
    init_tracing();
    let engine = busybox_engine();
    let before = service("web", "image: busybox\nvolumes: [/data]", &engine);
    let original = before.start_or_create_containers(None).unwrap().remove(0);
    engine.clear_calls();

    let after = service("web", "image: missing\nvolumes: [/data]", &engine);
    let err = after.recreate_containers(None).unwrap_err();
    assert!(err.is_missing_image(), "got: {err}");

    let intermediate = mutations(&engine)
        .into_iter()
        .find_map(|c| match c {
            EngineCall::Start(id) => Some(id),
            _ => None,
        })
        .unwrap();
    assert_ne!(intermediate, original.id);
    let calls = engine.calls();
    assert!(calls.contains(&EngineCall::Stop(intermediate.clone())));
    assert!(calls.contains(&EngineCall::Remove(intermediate)));
    let left = engine.list_containers(ListFilter::All).unwrap();
    assert!(left.is_empty(), "nothing should be left behind: {left:?}");
}

// ── Scale ────────────────────────────────────────────────────────────

#[test]
fn scale_up_and_down() {
    init_tracing();
    let engine = busybox_engine();
    let worker = service("worker", "image: busybox\nports: ['8000']", &engine);
    assert!(worker.can_be_scaled());

    worker.scale(3).unwrap();
    assert_eq!(
        names(&worker.containers(false).unwrap()),
        vec!["default_worker_1", "default_worker_2", "default_worker_3"]
    );

    worker.scale(1).unwrap();
    assert_eq!(names(&worker.containers(true).unwrap()), vec!["default_worker_1"]);

    worker.scale(0).unwrap();
    assert!(worker.containers(true).unwrap().is_empty());
}

#[test]
fn scale_starts_stopped_containers_first() {
    let engine = busybox_engine();
    let _ = engine.add_container("default_worker_1", "busybox", ContainerState::Stopped, BTreeMap::new());
    let worker = service("worker", "image: busybox", &engine);

    worker.scale(2).unwrap();
    assert_eq!(
        names(&worker.containers(false).unwrap()),
        vec!["default_worker_1", "default_worker_2"]
    );
}

#[test]
fn services_binding_host_ports_cannot_scale() {
    let engine = busybox_engine();
    let web = service("web", "image: busybox\nports: ['8000:8000']", &engine);
    assert!(!web.can_be_scaled());
    let err = web.scale(2).unwrap_err();
    assert!(matches!(err, StevedoreError::CannotScale { .. }), "got: {err}");
    assert!(engine.calls().is_empty());
}

// ── Project ──────────────────────────────────────────────────────────

fn project(engine: &Arc<InMemoryEngine>, yaml: &str) -> Project {
    let services: BTreeMap<String, ServiceConfig> = serde_yaml::from_str(yaml).unwrap();
    let config = StevedoreConfig {
        project: "shop".into(),
        ..StevedoreConfig::default()
    };
    Project::from_configs(&config, &services, engine.clone(), vars(&[])).unwrap()
}

const SHOP: &str = r"
web:
  image: busybox
  links: ['db:database']
  volumes_from: [assets]
db:
  image: busybox
  volumes: [/var/lib/db]
assets:
  image: busybox
  volumes: [/assets]
";

#[test]
fn up_creates_dependencies_first() {
    init_tracing();
    let engine = busybox_engine();
    let shop = project(&engine, SHOP);

    let containers = shop.up(false).unwrap();
    let names = names(&containers);
    assert_eq!(names.len(), 3);
    let web = names.iter().position(|n| n == "shop_web_1").unwrap();
    assert!(names.iter().position(|n| n == "shop_db_1").unwrap() < web);
    assert!(names.iter().position(|n| n == "shop_assets_1").unwrap() < web);

    let web = shop.get_service("web").unwrap().get_container(1).unwrap();
    let options = engine.start_options(&web.id).unwrap();
    assert_eq!(options.links[0].container, "shop_db_1");
    assert_eq!(options.links[0].alias, "database");
    assert_eq!(options.links[2].alias, "db_1");
    let assets = shop.get_service("assets").unwrap().get_container(1).unwrap();
    assert_eq!(options.volumes_from, vec![assets.id]);
}

#[test]
fn up_is_idempotent_and_stop_stops_everything() {
    let engine = busybox_engine();
    let shop = project(&engine, SHOP);

    let first = shop.up(false).unwrap();
    let second = shop.up(false).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(engine.list_containers(ListFilter::All).unwrap().len(), 3);

    shop.stop().unwrap();
    assert!(shop.containers(false).unwrap().is_empty());
    assert_eq!(shop.containers(true).unwrap().len(), 3);
}

#[test]
fn up_with_recreate_replaces_containers() {
    let engine = busybox_engine();
    let shop = project(&engine, SHOP);

    let before = shop.up(false).unwrap();
    let after = shop.up(true).unwrap();
    assert_eq!(after.len(), before.len());
    for container in &before {
        assert!(engine.inspect_container(&container.id).is_err());
    }
    assert_eq!(engine.list_containers(ListFilter::All).unwrap().len(), 3);
}

#[test]
fn project_build_and_pull() {
    let engine = Arc::new(InMemoryEngine::new().with_registry_image("redis:7"));
    let services = "app:\n  build: ./app\ncache:\n  image: redis:7\n";
    let shop = project(&engine, services);

    shop.build().unwrap();
    shop.pull().unwrap();
    assert!(engine.has_image("shop_app:latest"));
    assert!(engine.has_image("redis:7"));
    assert_eq!(mutations(&engine).len(), 2);
}
