//! End-to-end handshake scenarios against the control-plane engine
//!
//! Drives `connection-status` frames through the dispatcher with mock
//! collaborators and asserts which collaborators were invoked and what, if
//! anything, was published back to the agent.

use bytes::Bytes;
use edgelink::engine::{ControlDispatcher, HandshakeEngine, InboundFrame};
use edgelink::protocol::{
    decode_control_envelope, ClientId, CommandMessageContent, TopicBuilder, MESSAGE_TYPE_CONTROL,
};
use edgelink::testing::mocks::{
    MockAccountResolver, MockConnectedClientRecorder, MockConnectionRegistrar,
    MockControlPublisher, MockSourcesRecorder,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const RECONNECT_DELAY: u32 = 30;
const PUBLISH_QOS: u8 = 1;

struct Harness {
    resolver: Arc<MockAccountResolver>,
    registrar: Arc<MockConnectionRegistrar>,
    recorder: Arc<MockConnectedClientRecorder>,
    sources: Arc<MockSourcesRecorder>,
    publisher: Arc<MockControlPublisher>,
    dispatcher: ControlDispatcher,
    engine: Arc<HandshakeEngine>,
}

fn harness_with(
    resolver: MockAccountResolver,
    registrar: MockConnectionRegistrar,
    recorder: MockConnectedClientRecorder,
    sources: MockSourcesRecorder,
) -> Harness {
    let resolver = Arc::new(resolver);
    let registrar = Arc::new(registrar);
    let recorder = Arc::new(recorder);
    let sources = Arc::new(sources);
    let publisher = Arc::new(MockControlPublisher::new());

    let engine = Arc::new(HandshakeEngine::new(
        resolver.clone(),
        registrar.clone(),
        recorder.clone(),
        sources.clone(),
        publisher.clone(),
        TopicBuilder::new("redhat/insights"),
        PUBLISH_QOS,
        RECONNECT_DELAY,
    ));

    Harness {
        resolver,
        registrar,
        recorder,
        sources,
        publisher,
        dispatcher: ControlDispatcher::new(engine.clone()),
        engine,
    }
}

fn harness() -> Harness {
    harness_with(
        MockAccountResolver::new("540155"),
        MockConnectionRegistrar::new(),
        MockConnectedClientRecorder::new(),
        MockSourcesRecorder::new(),
    )
}

fn control_frame(client: &str, content: serde_json::Value) -> InboundFrame {
    let payload = json!({
        "MessageType": "connection-status",
        "MessageID": "m1",
        "Version": 1,
        "Sent": "2024-01-01T00:00:00Z",
        "Content": content,
    });

    InboundFrame {
        topic: format!("redhat/insights/{client}/control/in"),
        payload: Bytes::from(serde_json::to_vec(&payload).unwrap()),
        message_id: "1".to_string(),
    }
}

async fn dispatch(harness: &Harness, frame: InboundFrame) {
    let client_id = ClientId::new(
        frame
            .topic
            .split('/')
            .nth(2)
            .expect("test frame topic has a client segment"),
    );
    harness.dispatcher.dispatch(client_id, frame).await;
}

#[tokio::test]
async fn test_online_without_inventory() {
    let harness = harness();

    dispatch(&harness, control_frame("abc", json!({ "state": "online" }))).await;

    // Resolver and registrar each called exactly once for "abc".
    assert_eq!(
        harness.resolver.resolved_clients().await,
        vec![ClientId::new("abc")]
    );

    let registered = harness.registrar.registered_clients().await;
    assert_eq!(registered.len(), 1);
    assert_eq!(registered[0].client_id, ClientId::new("abc"));
    assert_eq!(registered[0].account.as_str(), "540155");
    assert!(registered[0].dispatchers.is_none());
    assert!(registered[0].canonical_facts.is_none());

    // No inventory, no sources, no outbound publish.
    assert!(harness.recorder.recorded_clients().await.is_empty());
    assert!(harness.sources.registered_sources().await.is_empty());
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_online_with_inventory_and_catalog() {
    let harness = harness();

    dispatch(
        &harness,
        control_frame(
            "abc",
            json!({
                "state": "online",
                "canonical_facts": { "fqdn": "h.x" },
                "dispatchers": {
                    "rhc-worker-playbook": {},
                    "catalog": {
                        "ApplicationType": "A",
                        "SrcName": "N",
                        "SrcRef": "R",
                        "SrcType": "T"
                    }
                }
            }),
        ),
    )
    .await;

    assert_eq!(harness.resolver.resolved_clients().await.len(), 1);
    assert_eq!(harness.registrar.registered_clients().await.len(), 1);

    // Inventory gate satisfied: canonical facts forwarded verbatim.
    let recorded = harness.recorder.recorded_clients().await;
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].1.canonical_facts, Some(json!({ "fqdn": "h.x" })));

    // Catalog complete: all four literal fields forwarded.
    let sources = harness.sources.registered_sources().await;
    assert_eq!(sources.len(), 1);
    let (account, client_id, source) = &sources[0];
    assert_eq!(account.as_str(), "540155");
    assert_eq!(client_id, &ClientId::new("abc"));
    assert_eq!(source.application_type, "A");
    assert_eq!(source.source_name, "N");
    assert_eq!(source.source_ref, "R");
    assert_eq!(source.source_type, "T");

    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_auth_failure_sends_reconnect() {
    let harness = harness_with(
        MockAccountResolver::with_failure(),
        MockConnectionRegistrar::new(),
        MockConnectedClientRecorder::new(),
        MockSourcesRecorder::new(),
    );

    dispatch(&harness, control_frame("abc", json!({ "state": "online" }))).await;

    // Registrar untouched; exactly one reconnect published.
    assert!(harness.registrar.registered_clients().await.is_empty());

    let published = harness.publisher.published_messages().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "redhat/insights/abc/control/out");
    assert_eq!(published[0].qos, PUBLISH_QOS);
    assert!(!published[0].retained);

    let envelope = decode_control_envelope(&published[0].payload).unwrap();
    assert_eq!(envelope.message_type, MESSAGE_TYPE_CONTROL);

    let content: CommandMessageContent = serde_json::from_value(envelope.content).unwrap();
    assert_eq!(content.command, "reconnect");
    assert_eq!(content.arguments, json!({ "delay": RECONNECT_DELAY }));
}

#[tokio::test]
async fn test_registration_failure_sends_reconnect() {
    let harness = harness_with(
        MockAccountResolver::new("540155"),
        MockConnectionRegistrar::with_failure(),
        MockConnectedClientRecorder::new(),
        MockSourcesRecorder::new(),
    );

    dispatch(&harness, control_frame("abc", json!({ "state": "online" }))).await;

    // Failure after the registrar: no inventory, no sources, one reconnect.
    assert!(harness.recorder.recorded_clients().await.is_empty());
    assert!(harness.sources.registered_sources().await.is_empty());
    assert_eq!(harness.publisher.published_messages().await.len(), 1);
}

#[tokio::test]
async fn test_inventory_failure_sends_reconnect() {
    let harness = harness_with(
        MockAccountResolver::new("540155"),
        MockConnectionRegistrar::new(),
        MockConnectedClientRecorder::with_failure(),
        MockSourcesRecorder::new(),
    );

    dispatch(
        &harness,
        control_frame(
            "abc",
            json!({
                "state": "online",
                "canonical_facts": { "fqdn": "h.x" },
                "dispatchers": { "rhc-worker-playbook": {} }
            }),
        ),
    )
    .await;

    // Registration happened before the inventory failure.
    assert_eq!(harness.registrar.registered_clients().await.len(), 1);
    assert!(harness.sources.registered_sources().await.is_empty());
    assert_eq!(harness.publisher.published_messages().await.len(), 1);
}

#[tokio::test]
async fn test_sources_failure_keeps_client_online() {
    let harness = harness_with(
        MockAccountResolver::new("540155"),
        MockConnectionRegistrar::new(),
        MockConnectedClientRecorder::new(),
        MockSourcesRecorder::with_failure(),
    );

    dispatch(
        &harness,
        control_frame(
            "abc",
            json!({
                "state": "online",
                "dispatchers": {
                    "catalog": {
                        "ApplicationType": "A",
                        "SrcName": "N",
                        "SrcRef": "R",
                        "SrcType": "T"
                    }
                }
            }),
        ),
    )
    .await;

    // Sources errors are logged, not fatal: no reconnect.
    assert_eq!(harness.registrar.registered_clients().await.len(), 1);
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_catalog_missing_field_skips_sources() {
    let harness = harness();

    dispatch(
        &harness,
        control_frame(
            "abc",
            json!({
                "state": "online",
                "dispatchers": {
                    "catalog": {
                        "ApplicationType": "A",
                        "SrcName": "N",
                        "SrcType": "T"
                    }
                }
            }),
        ),
    )
    .await;

    assert_eq!(harness.registrar.registered_clients().await.len(), 1);
    assert!(harness.sources.registered_sources().await.is_empty());
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_offline_unregisters() {
    let harness = harness();

    dispatch(&harness, control_frame("abc", json!({ "state": "offline" }))).await;

    assert_eq!(
        harness.registrar.unregistered_clients().await,
        vec![ClientId::new("abc")]
    );
    assert!(harness.resolver.resolved_clients().await.is_empty());
    assert!(harness.registrar.registered_clients().await.is_empty());
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_empty_payload_has_no_side_effects() {
    let harness = harness();
    let received_before = edgelink::observability::metrics()
        .snapshot()
        .control_messages_received;

    let frame = InboundFrame {
        topic: "redhat/insights/abc/control/in".to_string(),
        payload: Bytes::new(),
        message_id: "1".to_string(),
    };
    harness.dispatcher.dispatch(ClientId::new("abc"), frame).await;

    // The received counter still ticks for dropped frames.
    let received_after = edgelink::observability::metrics()
        .snapshot()
        .control_messages_received;
    assert!(received_after > received_before);

    assert!(harness.resolver.resolved_clients().await.is_empty());
    assert!(harness.registrar.registered_clients().await.is_empty());
    assert!(harness.registrar.unregistered_clients().await.is_empty());
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_invalid_state_is_dropped() {
    let harness = harness();

    dispatch(&harness, control_frame("abc", json!({ "state": "sleeping" }))).await;
    dispatch(&harness, control_frame("abc", json!({}))).await;

    // Contract violation: no registrar call, no reconnect.
    assert!(harness.registrar.registered_clients().await.is_empty());
    assert!(harness.registrar.unregistered_clients().await.is_empty());
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_event_message_is_logged_only() {
    let harness = harness();

    let payload = json!({
        "MessageType": "event",
        "MessageID": "m2",
        "Version": 1,
        "Sent": "2024-01-01T00:00:00Z",
        "Content": "disconnecting soon",
    });
    let frame = InboundFrame {
        topic: "redhat/insights/abc/control/in".to_string(),
        payload: Bytes::from(serde_json::to_vec(&payload).unwrap()),
        message_id: "2".to_string(),
    };
    harness.dispatcher.dispatch(ClientId::new("abc"), frame).await;

    assert!(harness.resolver.resolved_clients().await.is_empty());
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_dropped() {
    let harness = harness();

    let frame = InboundFrame {
        topic: "redhat/insights/abc/control/in".to_string(),
        payload: Bytes::from_static(b"{ not json"),
        message_id: "1".to_string(),
    };
    harness.dispatcher.dispatch(ClientId::new("abc"), frame).await;

    assert!(harness.resolver.resolved_clients().await.is_empty());
    assert!(harness.publisher.published_messages().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_handshakes_for_same_client_are_serialized() {
    let mut registrar = MockConnectionRegistrar::new();
    registrar.register_delay = Some(Duration::from_millis(20));

    let harness = harness_with(
        MockAccountResolver::new("540155"),
        registrar,
        MockConnectedClientRecorder::new(),
        MockSourcesRecorder::new(),
    );

    // Online and offline racing for the same client: the offline frame must
    // observe the registrar effect of the online frame, not interleave.
    let engine = harness.engine.clone();
    let online = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .handle_connection_status(
                    &ClientId::new("abc"),
                    "m1",
                    serde_json::from_value(json!({ "state": "online" })).unwrap(),
                )
                .await;
        }
    });

    // Give the online handshake a head start into the registrar delay.
    tokio::time::sleep(Duration::from_millis(5)).await;

    let offline = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .handle_connection_status(
                    &ClientId::new("abc"),
                    "m2",
                    serde_json::from_value(json!({ "state": "offline" })).unwrap(),
                )
                .await;
        }
    });

    online.await.unwrap();
    offline.await.unwrap();

    assert_eq!(harness.registrar.registered_clients().await.len(), 1);
    assert_eq!(harness.registrar.unregistered_clients().await.len(), 1);
}
