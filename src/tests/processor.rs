//! Processor pipeline scenarios: placeholder resolution, stale rejection, propagation
//! fixed points, deletes, and snapshot reconciliation.

use super::helpers::*;
use crate::{
    error::VigilError,
    event::{EventAction, ExternalEvent, IngestMessage, SyncMode},
    processor::ProcessorService,
    state::ResourceState,
};
use serde_json::json;
use test_log::test;
use tokio::sync::mpsc;

#[test]
fn test_state_on_update() {
    let mut processor = test_processor("state_on_update");
    let event = instance_event(
        SyncMode::InitSnapshot,
        sample_time(0),
        "vm-1",
        "active",
        "host-1",
    );

    processor.process_event(&event).unwrap();

    let vertex = processor.graph().get_vertex(&instance_id("vm-1")).unwrap();
    assert_eq!(Some(ResourceState::Running), vertex.aggregated_state);
    // The referenced host exists immediately, as a placeholder.
    assert_eq!(2, processor.graph().num_vertices());
}

#[test]
fn test_placeholder_promote_and_no_regression() {
    let mut processor = test_processor("placeholder_promote");

    let event = instance_event(
        SyncMode::InitSnapshot,
        sample_time(0),
        "vm-1",
        "active",
        "host-1",
    );
    processor.process_event(&event).unwrap();

    let host = processor.graph().get_vertex(&host_id("host-1")).unwrap();
    assert!(host.is_placeholder, "host known only by reference so far");
    assert!(host.state.is_none());

    // The host's own event promotes the placeholder in place.
    let event = host_event(
        SyncMode::InitSnapshot,
        sample_time(1),
        "host-1",
        "up",
        "zone-1",
    );
    processor.process_event(&event).unwrap();

    let host = processor.graph().get_vertex(&host_id("host-1")).unwrap();
    assert!(!host.is_placeholder);
    assert_eq!(Some("up".to_string()), host.state);
    assert_eq!(Some(ResourceState::Running), host.aggregated_state);

    // A later neighbor reference never regresses the promotion.
    let event = instance_event(
        SyncMode::Incremental,
        sample_time(2),
        "vm-2",
        "active",
        "host-1",
    );
    processor.process_event(&event).unwrap();

    let host = processor.graph().get_vertex(&host_id("host-1")).unwrap();
    assert!(!host.is_placeholder);
    assert_eq!(Some("up".to_string()), host.state);

    // vm-1, vm-2, host-1 and the zone placeholder from the host event.
    assert_eq!(4, processor.graph().num_vertices());
}

#[test]
fn test_snapshot_order_independence() {
    let older = host_event(
        SyncMode::InitSnapshot,
        sample_time(1),
        "host-1",
        "up",
        "zone-1",
    );
    let newer = host_event(
        SyncMode::InitSnapshot,
        sample_time(2),
        "host-1",
        "down",
        "zone-1",
    );

    let mut forward = test_processor("order_forward");
    forward.process_event(&older).unwrap();
    forward.process_event(&newer).unwrap();
    assert_eq!(0, forward.stale_rejections());

    let mut reversed = test_processor("order_reversed");
    reversed.process_event(&newer).unwrap();
    reversed.process_event(&older).unwrap();
    assert_eq!(1, reversed.stale_rejections(), "older arrival skipped");

    // Same final payload regardless of arrival order.
    for processor in [&forward, &reversed] {
        let host = processor.graph().get_vertex(&host_id("host-1")).unwrap();
        assert_eq!(Some("down".to_string()), host.state);
        assert_eq!(Some(ResourceState::Error), host.aggregated_state);
        assert_eq!(older.sample_timestamp.max(newer.sample_timestamp), host.update_timestamp.unwrap());
    }
}

/// zone-1 --contains--> host-1 <--on-- vm-1: degrading the zone must update the
/// aggregated state of all three exactly once, and an identical second event must
/// change nothing.
#[test]
fn test_chain_propagation_fixed_point() {
    let mut processor = test_processor("chain_fixed_point");
    processor
        .process_event(&zone_event(
            SyncMode::InitSnapshot,
            sample_time(0),
            "zone-1",
            "available",
        ))
        .unwrap();
    processor
        .process_event(&host_event(
            SyncMode::InitSnapshot,
            sample_time(1),
            "host-1",
            "up",
            "zone-1",
        ))
        .unwrap();
    processor
        .process_event(&instance_event(
            SyncMode::InitSnapshot,
            sample_time(2),
            "vm-1",
            "active",
            "host-1",
        ))
        .unwrap();

    for id in [zone_id("zone-1"), host_id("host-1"), instance_id("vm-1")] {
        assert_eq!(
            Some(ResourceState::Running),
            processor.graph().get_vertex(&id).unwrap().aggregated_state,
            "precondition for {id}"
        );
    }

    let changed = processor
        .process_event(&zone_event(
            SyncMode::Incremental,
            sample_time(3),
            "zone-1",
            "unavailable",
        ))
        .unwrap();
    assert_eq!(
        vec![zone_id("zone-1"), host_id("host-1"), instance_id("vm-1")],
        changed,
        "each vertex recomputed exactly once, in propagation order"
    );
    for id in [zone_id("zone-1"), host_id("host-1"), instance_id("vm-1")] {
        assert_eq!(
            Some(ResourceState::Error),
            processor.graph().get_vertex(&id).unwrap().aggregated_state
        );
    }

    // Fixed point: the identical event again produces zero further updates.
    let changed = processor
        .process_event(&zone_event(
            SyncMode::Incremental,
            sample_time(4),
            "zone-1",
            "unavailable",
        ))
        .unwrap();
    assert!(changed.is_empty());
}

#[test]
fn test_alarm_influence_and_clear() {
    let mut processor = test_processor("alarm_influence");
    processor
        .process_event(&host_event(
            SyncMode::InitSnapshot,
            sample_time(0),
            "host-1",
            "up",
            "zone-1",
        ))
        .unwrap();
    processor
        .process_event(&instance_event(
            SyncMode::InitSnapshot,
            sample_time(1),
            "vm-1",
            "active",
            "host-1",
        ))
        .unwrap();

    // A critical check on the host drags the host and everything on it down.
    processor
        .process_event(&alarm_event(
            SyncMode::Incremental,
            sample_time(2),
            "host-1",
            "cpu",
            "CRITICAL",
        ))
        .unwrap();
    assert_eq!(
        Some(ResourceState::Error),
        processor
            .graph()
            .get_vertex(&host_id("host-1"))
            .unwrap()
            .aggregated_state
    );
    assert_eq!(
        Some(ResourceState::Error),
        processor
            .graph()
            .get_vertex(&instance_id("vm-1"))
            .unwrap()
            .aggregated_state
    );

    // Clearing the alarm restores the chain and purges the alarm vertex.
    let clear = alarm_event(SyncMode::Incremental, sample_time(3), "host-1", "cpu", "OK")
        .with_action(EventAction::DeleteEntity);
    let changed = processor.process_event(&clear).unwrap();
    assert!(changed.contains(&host_id("host-1")));
    assert!(changed.contains(&instance_id("vm-1")));

    assert!(
        processor
            .graph()
            .get_vertex(&alarm_id("host-1", "cpu"))
            .is_none(),
        "tombstoned alarm purged after propagation"
    );
    assert_eq!(
        Some(ResourceState::Running),
        processor
            .graph()
            .get_vertex(&host_id("host-1"))
            .unwrap()
            .aggregated_state
    );
    assert_eq!(
        Some(ResourceState::Running),
        processor
            .graph()
            .get_vertex(&instance_id("vm-1"))
            .unwrap()
            .aggregated_state
    );
}

#[test]
fn test_snapshot_reconciliation_implicit_delete() {
    let mut processor = test_processor("snapshot_reconciliation");
    for name in ["host-1", "host-2"] {
        processor
            .process_event(&host_event(
                SyncMode::InitSnapshot,
                sample_time(0),
                name,
                "up",
                "zone-1",
            ))
            .unwrap();
    }
    // Everything was asserted: nothing vanishes.
    processor.snapshot_end(NOVA_HOST).unwrap();
    assert!(processor.graph().get_vertex(&host_id("host-2")).is_some());

    // The next poll only asserts host-1; host-2 disappeared between polls.
    processor
        .process_event(&host_event(
            SyncMode::Snapshot,
            sample_time(5),
            "host-1",
            "up",
            "zone-1",
        ))
        .unwrap();
    processor.snapshot_end(NOVA_HOST).unwrap();

    assert!(processor.graph().get_vertex(&host_id("host-1")).is_some());
    assert!(
        processor.graph().get_vertex(&host_id("host-2")).is_none(),
        "unasserted host implicitly deleted and purged"
    );
    assert!(
        processor.graph().get_vertex(&zone_id("zone-1")).is_some(),
        "placeholder neighbors are outside the reconciliation scope"
    );
}

#[test]
fn test_snapshot_end_without_events_is_a_noop() {
    let mut processor = test_processor("snapshot_noop");
    processor
        .process_event(&host_event(
            SyncMode::InitSnapshot,
            sample_time(0),
            "host-1",
            "up",
            "zone-1",
        ))
        .unwrap();
    processor.snapshot_end(NOVA_HOST).unwrap();

    // A second end marker with no intervening snapshot events must not wipe the graph.
    let changed = processor.snapshot_end(NOVA_HOST).unwrap();
    assert!(changed.is_empty());
    assert!(processor.graph().get_vertex(&host_id("host-1")).is_some());
}

#[test]
fn test_malformed_event_dropped() {
    let mut processor = test_processor("malformed");
    let bad = ExternalEvent::new(
        NOVA_HOST,
        SyncMode::Incremental,
        sample_time(0),
        json!({ "name": "host-1" }),
    );
    assert!(matches!(
        processor.process_event(&bad),
        Err(VigilError::Transform(_))
    ));
    assert_eq!(0, processor.graph().num_vertices());

    // Subsequent events are unaffected.
    processor
        .process_event(&host_event(
            SyncMode::Incremental,
            sample_time(1),
            "host-1",
            "up",
            "zone-1",
        ))
        .unwrap();
    assert!(processor.graph().get_vertex(&host_id("host-1")).is_some());
}

#[test]
fn test_unknown_datasource_rejected() {
    let mut processor = test_processor("unknown_datasource");
    let event = ExternalEvent::new(
        "no-such-source",
        SyncMode::Incremental,
        sample_time(0),
        json!({}),
    );
    assert!(matches!(
        processor.process_event(&event),
        Err(VigilError::Transform(_))
    ));
}

#[test]
fn test_delete_purges_vertex_and_edges() {
    let mut processor = test_processor("delete_purge");
    processor
        .process_event(&host_event(
            SyncMode::InitSnapshot,
            sample_time(0),
            "host-1",
            "up",
            "zone-1",
        ))
        .unwrap();
    assert_eq!(1, processor.graph().num_edges());

    let delete = host_event(
        SyncMode::Incremental,
        sample_time(1),
        "host-1",
        "down",
        "zone-1",
    )
    .with_action(EventAction::DeleteEntity);
    processor.process_event(&delete).unwrap();

    assert!(processor.graph().get_vertex(&host_id("host-1")).is_none());
    assert_eq!(0, processor.graph().num_edges());
    assert!(processor.graph().get_vertex(&zone_id("zone-1")).is_some());
}

#[test_log::test(tokio::test)]
async fn test_service_loop_survives_bad_events() {
    let processor = test_processor("service_loop");
    let graph = processor.graph().clone();
    let (tx, rx) = mpsc::channel::<IngestMessage>(16);
    let service = ProcessorService::spawn(processor, rx);

    tx.send(IngestMessage::Entity(host_event(
        SyncMode::InitSnapshot,
        sample_time(0),
        "host-1",
        "up",
        "zone-1",
    )))
    .await
    .unwrap();
    // Malformed: dropped with a warning, must not halt the consumer.
    tx.send(IngestMessage::Entity(ExternalEvent::new(
        NOVA_HOST,
        SyncMode::Incremental,
        sample_time(1),
        json!({}),
    )))
    .await
    .unwrap();
    tx.send(IngestMessage::Entity(instance_event(
        SyncMode::InitSnapshot,
        sample_time(2),
        "vm-1",
        "active",
        "host-1",
    )))
    .await
    .unwrap();
    tx.send(IngestMessage::SnapshotEnd {
        datasource: NOVA_HOST.to_string(),
    })
    .await
    .unwrap();

    drop(tx);
    let processor = service.await.expect("service task completes");

    assert!(graph.get_vertex(&host_id("host-1")).is_some());
    assert_eq!(
        Some(ResourceState::Running),
        graph
            .get_vertex(&instance_id("vm-1"))
            .unwrap()
            .aggregated_state
    );
    assert_eq!(0, processor.stale_rejections());
}
