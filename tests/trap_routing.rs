//! Notification routing from the shared listener to device trap logs.

mod common;

use std::time::Duration;

use common::*;
use snmp_fleet::engine::NotificationPdu;
use snmp_fleet::{InboundNotification, MockEngine, Value, VarBind};

fn link_down_trap(host: &str, request_id: i32) -> InboundNotification {
    InboundNotification::v2(
        trap_source(host),
        request_id,
        vec![
            VarBind::new(sys_uptime(), Value::TimeTicks(4200)),
            VarBind::new(snmp_trap_oid(), Value::ObjectIdentifier(link_down())),
            VarBind::new(snmp_fleet::oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 3), Value::Integer(3)),
        ],
    )
}

async fn started(engine: MockEngine) -> TestFleet {
    init_tracing();
    let t = TestFleet::new(engine);
    t.fleet.start_trap_listener().await.unwrap();
    // Let the lifecycle task finish loading the standard modules
    let lease = t.fleet.schemas().lease();
    assert!(lease.schema(Duration::from_secs(5)).await.is_some());
    t
}

#[tokio::test]
async fn test_fan_out_to_devices_sharing_an_address() {
    let t = started(MockEngine::new()).await;
    let interval = Duration::from_secs(5);
    t.fleet.add_device("a", community_device(AGENT_A, interval)).unwrap();
    t.fleet.add_device("a-twin", community_device(AGENT_A, interval)).unwrap();
    t.fleet.add_device("b", community_device(AGENT_B, interval)).unwrap();

    assert!(t.engine.inject(link_down_trap(AGENT_A, 1001)).await);
    eventually(|| t.fleet.trap_log("a-twin").unwrap().len() == 1).await;

    for name in ["a", "a-twin"] {
        let log = t.fleet.trap_log(name).unwrap();
        assert_eq!(log.len(), 1);
        let record = &log[0];
        assert_eq!(record.request_id, 1001);
        assert!(record.legacy.is_none());
        assert_eq!(record.field("sysUpTime.0"), Some(&Value::TimeTicks(4200)));
        assert_eq!(
            record.field("snmpTrapOID.0"),
            Some(&Value::ObjectIdentifier(link_down()))
        );
        assert_eq!(record.field("ifIndex.3"), Some(&Value::Integer(3)));
    }
    assert!(t.fleet.trap_log("b").unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_source_is_dropped() {
    let t = started(MockEngine::new()).await;
    t.fleet
        .add_device("a", community_device(AGENT_A, Duration::from_secs(5)))
        .unwrap();

    t.engine.inject(link_down_trap("198.51.100.7", 1)).await;
    t.engine.inject(link_down_trap(AGENT_A, 2)).await;
    eventually(|| !t.fleet.trap_log("a").unwrap().is_empty()).await;

    let log = t.fleet.trap_log("a").unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].request_id, 2);
}

#[tokio::test]
async fn test_v1_trap_and_json_export() {
    let t = started(MockEngine::new()).await;
    t.fleet
        .add_device("a", community_device(AGENT_A, Duration::from_secs(5)))
        .unwrap();

    let trap = InboundNotification {
        source: trap_source(AGENT_A),
        pdu: NotificationPdu::TrapV1 {
            enterprise: snmp_fleet::oid!(1, 3, 6, 1, 4, 1, 9),
            agent_addr: [192, 0, 2, 10],
            generic_trap: 2,
            specific_trap: 0,
            timestamp: 900,
            varbinds: vec![VarBind::new(
                snmp_fleet::oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 7),
                Value::Integer(7),
            )],
        },
    };
    t.engine.inject(trap).await;
    eventually(|| !t.fleet.trap_log("a").unwrap().is_empty()).await;

    let record = &t.fleet.trap_log("a").unwrap()[0];
    let legacy = record.legacy.as_ref().unwrap();
    assert_eq!(legacy.enterprise, "enterprises.9");
    assert_eq!(legacy.generic_trap, 2);
    assert_eq!(legacy.timestamp, 900);

    let json = t.fleet.trap_log_json("a").unwrap();
    let entry = &json.as_array().unwrap()[0];
    assert_eq!(entry["requestId"], 0);
    assert_eq!(entry["ifIndex.7"], 7);

    t.fleet.clear_trap_log("a").unwrap();
    assert!(t.fleet.trap_log("a").unwrap().is_empty());
}

#[tokio::test]
async fn test_log_is_bounded_and_ordered() {
    let t = TestFleet::with_config(MockEngine::new(), |c| c.trap_log_capacity(3));
    t.fleet.start_trap_listener().await.unwrap();
    t.fleet
        .add_device("a", community_device(AGENT_A, Duration::from_secs(5)))
        .unwrap();

    for id in 1..=5 {
        t.engine.inject(link_down_trap(AGENT_A, id)).await;
    }
    eventually(|| {
        t.fleet
            .trap_log("a")
            .unwrap()
            .last()
            .is_some_and(|r| r.request_id == 5)
    })
    .await;

    let ids: Vec<_> = t.fleet.trap_log("a").unwrap().iter().map(|r| r.request_id).collect();
    assert_eq!(ids, vec![3, 4, 5]);
}

#[tokio::test]
async fn test_device_matched_by_configured_address_even_when_failed() {
    let t = started(MockEngine::new()).await;
    // Valid address, invalid credentials: no target, still a trap source
    let config = snmp_fleet::TargetConfig::user(AGENT_A, "admin").with_auth("BOGUS", "authpass123");
    assert!(!t.fleet.add_device("v3", config).unwrap().is_ready());

    t.engine.inject(link_down_trap(AGENT_A, 9)).await;
    eventually(|| !t.fleet.trap_log("v3").unwrap().is_empty()).await;
}

#[tokio::test]
async fn test_listener_bind_failure_leaves_polling_alone() {
    let engine = engine_with_system(AGENT_A);
    engine.fail_listen();
    let t = TestFleet::with_config(engine, |c| c.keep_schemas_loaded(false));
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_millis(50)))
        .unwrap();
    t.fleet
        .add_subscription("core", sys_name(), Some("sysName.0"))
        .await
        .unwrap();
    t.fleet.start_observing("core", &sys_name()).unwrap();

    assert!(t.fleet.start_trap_listener().await.is_err());
    assert!(!t.engine.inject(link_down_trap(AGENT_A, 1)).await);

    eventually(|| {
        t.fleet.device("core").unwrap().subscriptions[&sys_name()].value == Some(Value::from("core-1"))
    })
    .await;
}
