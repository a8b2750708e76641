//! MQTT session supervisor
//!
//! Owns the broker event loop: installs subscriptions on every ConnAck,
//! hands inbound publishes to the frame router on spawned tasks, and keeps
//! polling through connection errors so the rumqttc client reconnects. The
//! supervisor stops on the shutdown token, on the fatal token, or when a
//! subscription is rejected (the connector is useless without its
//! subscriptions).

use super::connection::{configure_broker_options, qos_from_u8, MqttError};
use crate::config::MqttSection;
use crate::controller::JwtGenerator;
use crate::engine::{FrameRouter, InboundFrame};
use crate::transport::ControlPublisher;
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::{ConnAck, Packet, SubAck, SubscribeReasonCode};
use rumqttc::v5::{AsyncClient, Event, EventLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

const EVENT_CHANNEL_CAPACITY: usize = 10;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// One subscription the connector installs on connect.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub topic: String,
    pub qos: u8,
}

/// The broker session: an async client plus the event loop supervisor.
pub struct MqttLink {
    client: AsyncClient,
    event_loop: EventLoop,
    subscriptions: Vec<Subscription>,
    resume_subs: bool,
    shutdown: CancellationToken,
    fatal: CancellationToken,
}

impl std::fmt::Debug for MqttLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttLink")
            .field("client", &self.client)
            .field("subscriptions", &self.subscriptions)
            .field("resume_subs", &self.resume_subs)
            .field("shutdown", &self.shutdown)
            .field("fatal", &self.fatal)
            .finish_non_exhaustive()
    }
}

impl MqttLink {
    pub fn new(
        cfg: &MqttSection,
        jwt: Option<Arc<dyn JwtGenerator>>,
        subscriptions: Vec<Subscription>,
        shutdown: CancellationToken,
        fatal: CancellationToken,
    ) -> Result<Self, MqttError> {
        // Validate subscription QoS up front rather than on first connect.
        for subscription in &subscriptions {
            qos_from_u8(subscription.qos)?;
        }

        let options = configure_broker_options(cfg, jwt)?;
        let (client, event_loop) = AsyncClient::new(options, EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            event_loop,
            subscriptions,
            resume_subs: cfg.resume_subs,
            shutdown,
            fatal,
        })
    }

    /// Cheap clonable handle for publishing, shared with the engine.
    pub fn handle(&self) -> MqttHandle {
        MqttHandle {
            client: self.client.clone(),
        }
    }

    /// Run the session until shutdown or a fatal condition.
    pub async fn run(self, router: Arc<FrameRouter>) {
        let Self {
            client,
            mut event_loop,
            subscriptions,
            resume_subs,
            shutdown,
            fatal,
        } = self;

        info!("starting mqtt event loop");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown signal received, stopping mqtt event loop");
                    let _ = client.disconnect().await;
                    break;
                }
                _ = fatal.cancelled() => {
                    error!("fatal downstream failure, stopping mqtt event loop");
                    let _ = client.disconnect().await;
                    break;
                }
                event = event_loop.poll() => {
                    match event {
                        Ok(event) => {
                            let keep_running = process_event(
                                &client,
                                &subscriptions,
                                resume_subs,
                                &fatal,
                                &router,
                                event,
                            )
                            .await;

                            if !keep_running {
                                break;
                            }
                        }
                        Err(err) => {
                            error!(error = %err, "mqtt event loop error");
                            // Polling again drives the client's reconnect;
                            // back off briefly so a dead broker does not
                            // spin the loop.
                            tokio::select! {
                                _ = shutdown.cancelled() => {}
                                _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                            }
                        }
                    }
                }
            }
        }

        info!("mqtt event loop stopped");
    }
}

/// Route one broker event. Returns false when the supervisor must stop.
async fn process_event(
    client: &AsyncClient,
    subscriptions: &[Subscription],
    resume_subs: bool,
    fatal: &CancellationToken,
    router: &Arc<FrameRouter>,
    event: Event,
) -> bool {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            install_subscriptions(client, subscriptions, resume_subs, fatal, &ack).await
        }
        Event::Incoming(Packet::Publish(publish)) => {
            let frame = InboundFrame {
                topic: String::from_utf8_lossy(&publish.topic).to_string(),
                payload: publish.payload.clone(),
                message_id: publish.pkid.to_string(),
            };

            // Handlers are re-entrant; a slow handshake must not stall the
            // event loop.
            let router = router.clone();
            tokio::spawn(async move {
                router.route(frame).await;
            });
            true
        }
        Event::Incoming(Packet::SubAck(ack)) => check_suback(fatal, &ack),
        Event::Incoming(Packet::Disconnect(disconnect)) => {
            debug!(reason = ?disconnect.reason_code, "broker disconnected the session");
            true
        }
        Event::Incoming(other) => {
            trace!(packet = ?other, "mqtt event");
            true
        }
        Event::Outgoing(_) => true,
    }
}

/// Install subscriptions in order on every ConnAck. A failed request is
/// fatal: the connector cannot fulfill its purpose without them.
async fn install_subscriptions(
    client: &AsyncClient,
    subscriptions: &[Subscription],
    resume_subs: bool,
    fatal: &CancellationToken,
    ack: &ConnAck,
) -> bool {
    if ack.session_present && !resume_subs {
        debug!("session resumed by the broker, keeping existing subscriptions");
        return true;
    }

    for subscription in subscriptions {
        info!(
            topic = %subscription.topic,
            qos = subscription.qos,
            "subscribing to mqtt topic"
        );

        let qos = match qos_from_u8(subscription.qos) {
            Ok(qos) => qos,
            Err(err) => {
                error!(topic = %subscription.topic, error = %err, "invalid subscription qos");
                fatal.cancel();
                return false;
            }
        };

        if let Err(err) = client.subscribe(&subscription.topic, qos).await {
            error!(
                topic = %subscription.topic,
                error = %err,
                "subscribing to mqtt topic failed"
            );
            fatal.cancel();
            return false;
        }
    }

    true
}

/// A rejected subscription is as fatal as a failed subscribe request.
fn check_suback(fatal: &CancellationToken, ack: &SubAck) -> bool {
    let rejected = ack.return_codes.iter().any(|code| {
        !matches!(code, SubscribeReasonCode::Success(_))
    });

    if rejected {
        error!(return_codes = ?ack.return_codes, "broker rejected a subscription");
        fatal.cancel();
        return false;
    }

    debug!(return_codes = ?ack.return_codes, "subscription confirmed");
    true
}

/// Publisher handle backed by the shared MQTT client.
#[derive(Clone)]
pub struct MqttHandle {
    client: AsyncClient,
}

#[async_trait]
impl ControlPublisher for MqttHandle {
    async fn publish(
        &self,
        topic: &str,
        qos: u8,
        retained: bool,
        payload: Vec<u8>,
    ) -> Result<(), MqttError> {
        let qos = qos_from_u8(qos)?;

        self.client
            .publish(topic, qos, retained, payload)
            .await
            .map_err(|err| MqttError::PublishFailed(Box::new(err)))
    }
}
