//! Poll scheduling through the fleet surface.

mod common;

use std::time::Duration;

use common::*;
use snmp_fleet::Value;

fn fixture() -> TestFleet {
    // Names are given explicitly so the schema set never needs loading
    TestFleet::with_config(engine_with_system(AGENT_A), |c| c.keep_schemas_loaded(false))
}

#[tokio::test(start_paused = true)]
async fn test_observed_subscription_is_polled() {
    let t = fixture();
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_secs(1)))
        .unwrap();
    t.fleet
        .add_subscription("core", sys_name(), Some("sysName.0"))
        .await
        .unwrap();

    // Configured only: nothing is fetched
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(t.engine.requests().is_empty());

    t.fleet.start_observing("core", &sys_name()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let sub = &t.fleet.device("core").unwrap().subscriptions[&sys_name()];
    assert_eq!(sub.value, Some(Value::from("core-1")));
    assert!(sub.observed);
    assert!(sub.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_double_register_keeps_one_timer() {
    let t = fixture();
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_secs(1)))
        .unwrap();
    t.fleet
        .add_subscription("core", sys_descr(), Some("sysDescr.0"))
        .await
        .unwrap();

    assert!(t.fleet.start_observing("core", &sys_descr()).unwrap());
    assert!(!t.fleet.start_observing("core", &sys_descr()).unwrap());
    assert_eq!(t.fleet.scheduler().active_count(), 1);

    tokio::time::sleep(Duration::from_millis(4500)).await;
    let times = t.engine.get_times(agent(AGENT_A), &sys_descr());
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(1));
    }

    // Removing something that was never registered is a no-op
    assert!(!t.fleet.stop_observing("core", &sys_contact()).unwrap());
    assert!(!t.fleet.remove_subscription("core", &sys_contact()).unwrap());
    assert_eq!(t.fleet.scheduler().active_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_edit_interval_reschedules_without_overlap() {
    let t = fixture();
    t.engine.set_delay(Duration::from_millis(100));
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_secs(1)))
        .unwrap();
    for (oid, label) in [(sys_name(), "sysName.0"), (sys_uptime(), "sysUpTime.0")] {
        t.fleet.add_subscription("core", oid.clone(), Some(label)).await.unwrap();
        t.fleet.start_observing("core", &oid).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let before = t.engine.get_times(agent(AGENT_A), &sys_name()).len();
    assert_eq!(before, 3);

    t.fleet
        .edit_device("core", community_device(AGENT_A, Duration::from_secs(3)))
        .unwrap();
    assert_eq!(t.fleet.scheduler().active_count(), 2);

    tokio::time::sleep(Duration::from_secs(10)).await;
    for oid in [sys_name(), sys_uptime()] {
        let times = t.engine.get_times(agent(AGENT_A), &oid);
        let after = &times[before..];
        // Restart at 2.5s, then every 3s plus the response delay
        assert_eq!(after.len(), 4);
        for pair in after.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(3));
        }
    }
    assert_eq!(t.engine.max_in_flight(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_device_records_error_and_keeps_polling() {
    let t = fixture();
    t.fleet
        .add_device("edge", community_device(AGENT_B, Duration::from_secs(1)))
        .unwrap();
    t.fleet
        .add_subscription("edge", sys_name(), Some("sysName.0"))
        .await
        .unwrap();
    t.fleet.start_observing("edge", &sys_name()).unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let sub = &t.fleet.device("edge").unwrap().subscriptions[&sys_name()];
    assert!(sub.value.is_none());
    assert!(sub.last_error.as_deref().unwrap().contains("timeout"));
    assert_eq!(t.engine.get_times(agent(AGENT_B), &sys_name()).len(), 3);

    // Agent comes back
    t.engine.set_value(agent(AGENT_B), sys_name(), "edge-1");
    tokio::time::sleep(Duration::from_secs(1)).await;
    let sub = &t.fleet.device("edge").unwrap().subscriptions[&sys_name()];
    assert_eq!(sub.value, Some(Value::from("edge-1")));
    assert!(sub.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_remove_device_stops_polling() {
    let t = fixture();
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_secs(1)))
        .unwrap();
    t.fleet
        .add_subscription("core", sys_name(), Some("sysName.0"))
        .await
        .unwrap();
    t.fleet.start_observing("core", &sys_name()).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    t.fleet.remove_device("core").unwrap();
    assert_eq!(t.fleet.scheduler().active_count(), 0);
    let polled = t.engine.requests().len();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(t.engine.requests().len(), polled);
}

#[tokio::test(start_paused = true)]
async fn test_failed_device_is_never_polled() {
    let t = fixture();
    let status = t
        .fleet
        .add_device(
            "broken",
            community_device(AGENT_A, Duration::from_secs(1)).with_address("not an address"),
        )
        .unwrap();
    assert!(!status.is_ready());
    t.fleet
        .add_subscription("broken", sys_name(), Some("sysName.0"))
        .await
        .unwrap();
    t.fleet.start_observing("broken", &sys_name()).unwrap();

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(t.engine.requests().is_empty());

    // Fixing the address lets the existing subscription poll
    t.fleet
        .edit_device("broken", community_device(AGENT_A, Duration::from_secs(1)))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        t.fleet.device("broken").unwrap().subscriptions[&sys_name()].value,
        Some(Value::from("core-1"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_renamed_device_keeps_polling() {
    let t = fixture();
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_secs(1)))
        .unwrap();
    t.fleet
        .add_subscription("core", sys_name(), Some("sysName.0"))
        .await
        .unwrap();
    t.fleet.start_observing("core", &sys_name()).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    t.fleet.rename_device("core", "core-renamed").unwrap();
    assert_eq!(t.fleet.scheduler().active_count(), 1);
    let before = t.engine.get_times(agent(AGENT_A), &sys_name()).len();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    // One task under the new name: restart at 1.5s, then 2.5s and 3.5s
    let after = t.engine.get_times(agent(AGENT_A), &sys_name()).len();
    assert_eq!(after - before, 3);
    let sub = &t.fleet.device("core-renamed").unwrap().subscriptions[&sys_name()];
    assert_eq!(sub.value, Some(Value::from("core-1")));
}

#[tokio::test(start_paused = true)]
async fn test_moved_subscription_polls_new_oid() {
    let t = fixture();
    t.fleet
        .add_device("core", community_device(AGENT_A, Duration::from_secs(1)))
        .unwrap();
    t.fleet
        .add_subscription("core", sys_name(), Some("sysName.0"))
        .await
        .unwrap();
    t.fleet.start_observing("core", &sys_name()).unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    assert!(
        t.fleet
            .edit_subscription("core", &sys_name(), "location", Some(sys_location()))
            .unwrap()
    );
    let polled_name = t.engine.get_times(agent(AGENT_A), &sys_name()).len();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(t.engine.get_times(agent(AGENT_A), &sys_name()).len(), polled_name);
    assert!(!t.engine.get_times(agent(AGENT_A), &sys_location()).is_empty());
    let sub = &t.fleet.device("core").unwrap().subscriptions[&sys_location()];
    assert_eq!(sub.label, "location");
    assert_eq!(sub.value, Some(Value::from("rack 4")));
    assert_eq!(t.fleet.scheduler().active_count(), 1);
}
