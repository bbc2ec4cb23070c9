//! Schema documents and the load/unload lifecycle through the fleet.

mod common;

use std::time::Duration;

use common::*;
use snmp_fleet::schema::SchemaState;
use snmp_fleet::{MockEngine, oid};
use tokio::sync::watch;

const WAIT: Duration = Duration::from_secs(5);

const ACME_MIB: &str = "-- ACME enterprise tree\n\
    ACME-MIB DEFINITIONS ::= BEGIN\n\
    IMPORTS enterprises, OBJECT-TYPE FROM SNMPv2-SMI;\n\
    acme OBJECT IDENTIFIER ::= { enterprises 424242 }\n\
    acmeSensors OBJECT IDENTIFIER ::= { acme 1 }\n\
    acmeTemp OBJECT-TYPE\n\
        SYNTAX Integer32\n\
        MAX-ACCESS read-only\n\
        STATUS current\n\
        DESCRIPTION \"Board temperature -- in celsius\"\n\
        ::= { acmeSensors 1 }\n\
    END\n";

const MIB2_OVERRIDE: &str = "LAB-MIB DEFINITIONS ::= BEGIN\n\
    labRoot OBJECT IDENTIFIER ::= { iso 77 }\n\
    labLeaf OBJECT IDENTIFIER ::= { labRoot 1 }\n\
    END\n";

async fn wait_until(rx: &mut watch::Receiver<SchemaState>, pred: impl FnMut(&SchemaState) -> bool) {
    tokio::time::timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("schema state change timed out")
        .expect("lifecycle task gone");
}

#[tokio::test]
async fn test_standard_names_resolve() {
    let t = TestFleet::new(MockEngine::new());
    assert_eq!(t.fleet.resolve(&sys_name()).await, "sysName.0");
    assert_eq!(t.fleet.resolve(&system_subtree().child(5)).await, "sysName");
    assert_eq!(t.fleet.resolve(&oid!(1, 3, 6, 1, 2, 1, 1, 9, 9)).await, "system.9.9");
    assert_eq!(t.fleet.resolve(&oid!(9, 9, 9)).await, "9.9.9");
}

#[tokio::test]
async fn test_hot_add_and_remove_document() {
    init_tracing();
    let t = TestFleet::new(MockEngine::new());
    let mut rx = t.fleet.schemas().subscribe();
    wait_until(&mut rx, SchemaState::is_loaded).await;

    let temp = oid!(1, 3, 6, 1, 4, 1, 424242, 1, 1, 0);
    assert_eq!(t.fleet.resolve(&temp).await, "enterprises.424242.1.1.0");

    assert_eq!(t.fleet.add_schema_document(ACME_MIB).unwrap(), "ACME-MIB");
    assert!(t.schema_dir.path().join("ACME-MIB").exists());
    wait_until(&mut rx, |s| s.set().is_some_and(|set| set.lookup("acmeTemp").is_some())).await;
    assert_eq!(t.fleet.resolve(&temp).await, "acmeTemp.0");
    assert_eq!(t.fleet.schema_documents().unwrap(), vec!["ACME-MIB"]);

    t.fleet.remove_schema_document("ACME-MIB");
    wait_until(&mut rx, |s| s.set().is_some_and(|set| set.lookup("acmeTemp").is_none())).await;
    assert_eq!(t.fleet.resolve(&temp).await, "enterprises.424242.1.1.0");
    assert!(!t.schema_dir.path().join("ACME-MIB").exists());

    // Removing a document that does not exist is a no-op
    t.fleet.remove_schema_document("NOPE-MIB");
    assert!(t.fleet.schema_documents().unwrap().is_empty());
}

#[tokio::test]
async fn test_documents_from_a_previous_run_are_loaded() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("LAB-MIB"), MIB2_OVERRIDE).unwrap();

    let t = TestFleet::with_config(MockEngine::new(), |c| c.schema_dir(dir.path()));
    assert_eq!(t.fleet.resolve(&oid!(1, 77, 1, 4)).await, "labLeaf.4");
    assert_eq!(t.fleet.schema_documents().unwrap(), vec!["LAB-MIB"]);
}

#[tokio::test]
async fn test_unload_when_leases_released_and_reload_on_demand() {
    let t = TestFleet::with_config(MockEngine::new(), |c| c.keep_schemas_loaded(false));
    let schemas = t.fleet.schemas();
    let mut rx = schemas.subscribe();
    assert!(matches!(schemas.state(), SchemaState::Unloaded));

    let first = schemas.lease();
    let second = schemas.lease();
    assert!(first.schema(WAIT).await.is_some());
    assert_eq!(schemas.usage(), 2);

    drop(first);
    // Still leased
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(schemas.state().is_loaded());

    drop(second);
    wait_until(&mut rx, |s| matches!(s, SchemaState::Unloaded)).await;
    assert_eq!(schemas.usage(), 0);

    // Resolution through the fleet takes its own lease and reloads
    assert_eq!(t.fleet.resolve(&sys_descr()).await, "sysDescr.0");
    wait_until(&mut rx, |s| matches!(s, SchemaState::Unloaded)).await;
}

#[tokio::test]
async fn test_toggling_keep_loaded() {
    let t = TestFleet::with_config(MockEngine::new(), |c| c.keep_schemas_loaded(false));
    let mut rx = t.fleet.schemas().subscribe();

    t.fleet.set_keep_schemas_loaded(true);
    assert!(t.fleet.keep_schemas_loaded());
    wait_until(&mut rx, SchemaState::is_loaded).await;

    t.fleet.set_keep_schemas_loaded(false);
    wait_until(&mut rx, |s| matches!(s, SchemaState::Unloaded)).await;
}

#[tokio::test]
async fn test_rejected_documents() {
    let t = TestFleet::new(MockEngine::new());
    assert!(matches!(
        t.fleet.add_schema_document("-- nothing but a comment\n"),
        Err(snmp_fleet::Error::Schema { .. })
    ));
    assert!(t.fleet.add_schema_document("../ESCAPE DEFINITIONS ::= BEGIN END").is_err());
    assert!(t.fleet.schema_documents().unwrap().is_empty());
}

#[tokio::test]
async fn test_subscription_label_defaults_to_resolved_name() {
    let t = TestFleet::new(engine_with_system(AGENT_A));
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_secs(5)))
        .unwrap();
    t.fleet.add_subscription("core", sys_location(), None).await.unwrap();
    t.fleet.add_subscription("core", oid!(1, 3, 6, 1, 4, 1, 5), None).await.unwrap();

    let device = t.fleet.device("core").unwrap();
    assert_eq!(device.subscriptions[&sys_location()].label, "sysLocation.0");
    assert_eq!(device.subscriptions[&oid!(1, 3, 6, 1, 4, 1, 5)].label, "enterprises.5");
}
