use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use rumqttc::{Client, ConnectReturnCode, ConnectionError, Event, MqttOptions, Packet, QoS};
use tracing::{debug, error, info};

use crate::config::BrokerConfig;
use crate::error::{MonitorError, Result};
use crate::window::Topics;

const REQUEST_CAPACITY: usize = 10;

// From the MQTT thread to the consumer loop
#[derive(Debug, Clone, PartialEq)]
pub enum BrokerEvent {
    Connected,
    Failed(String),
    Message { topic: String, payload: Vec<u8> },
    Closed,
}

/// Something that can register interest in a topic with the broker.
pub trait Subscriber {
    fn subscribe_topic(&mut self, topic: &str) -> Result<()>;
}

impl Subscriber for Client {
    fn subscribe_topic(&mut self, topic: &str) -> Result<()> {
        self.subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| MonitorError::Broker(e.to_string()))
    }
}

/// React to the broker's CONNACK: subscribe to both topics on success,
/// report the return code otherwise.
pub fn on_connect<S: Subscriber>(
    subscriber: &mut S,
    topics: &Topics,
    code: ConnectReturnCode,
) -> BrokerEvent {
    if code != ConnectReturnCode::Success {
        error!("Failed to connect, code {:?}", code);
        return BrokerEvent::Failed(format!("connection refused ({:?})", code));
    }

    info!("Connected to MQTT broker");
    for topic in topics.all() {
        if let Err(e) = subscriber.subscribe_topic(topic) {
            error!("Could not subscribe to {}: {}", topic, e);
            return BrokerEvent::Failed(e.to_string());
        }
        info!("Subscribed to {}", topic);
    }
    BrokerEvent::Connected
}

/// Translate one notification from the MQTT event loop. Returns `None` for
/// traffic the consumer doesn't care about (pings, acks, outgoing packets).
pub fn on_notification<S: Subscriber>(
    subscriber: &mut S,
    topics: &Topics,
    notification: std::result::Result<Event, ConnectionError>,
) -> Option<BrokerEvent> {
    match notification {
        Ok(Event::Incoming(Packet::ConnAck(ack))) => Some(on_connect(subscriber, topics, ack.code)),
        Ok(Event::Incoming(Packet::Publish(publish))) => Some(BrokerEvent::Message {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }),
        Ok(other) => {
            debug!("mqtt: {:?}", other);
            None
        }
        Err(ConnectionError::ConnectionRefused(code)) => Some(on_connect(subscriber, topics, code)),
        Err(e) => {
            error!("Connection failed: {}", e);
            Some(BrokerEvent::Failed(e.to_string()))
        }
    }
}

/// Forward notifications until the first failure or until the consumer hangs
/// up, then report `Closed`. Nothing here reconnects.
pub fn pump<S, I>(subscriber: &mut S, topics: &Topics, notifications: I, tx: &Sender<BrokerEvent>)
where
    S: Subscriber,
    I: IntoIterator<Item = std::result::Result<Event, ConnectionError>>,
{
    for notification in notifications {
        let Some(event) = on_notification(subscriber, topics, notification) else {
            continue;
        };
        let failed = matches!(event, BrokerEvent::Failed(_));
        if tx.send(event).is_err() || failed {
            break;
        }
    }
    let _ = tx.send(BrokerEvent::Closed);
}

// Start the MQTT session on its own thread.
pub fn spawn(
    config: &BrokerConfig,
    topics: &Topics,
) -> Result<(Receiver<BrokerEvent>, JoinHandle<()>)> {
    let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
    options.set_keep_alive(config.keep_alive());

    let (mut client, mut connection) = Client::new(options, REQUEST_CAPACITY);
    let (tx, rx) = unbounded();
    let topics = topics.clone();

    info!("Connecting to broker {}:{}...", config.host, config.port);

    let handle = thread::Builder::new()
        .name("mqtt-session".into())
        .spawn(move || pump(&mut client, &topics, connection.iter(), &tx))?;

    Ok((rx, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{TOPIC_LIGHT, TOPIC_PRESENCE};
    use rumqttc::{ConnAck, Publish};

    #[derive(Default)]
    struct FakeSubscriber {
        topics: Vec<String>,
        reject: Option<String>,
    }

    impl Subscriber for FakeSubscriber {
        fn subscribe_topic(&mut self, topic: &str) -> Result<()> {
            if self.reject.as_deref() == Some(topic) {
                return Err(MonitorError::Broker(format!("rejected {topic}")));
            }
            self.topics.push(topic.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_successful_connect_subscribes_both_topics() {
        let mut sub = FakeSubscriber::default();
        let event = on_connect(&mut sub, &Topics::default(), ConnectReturnCode::Success);

        assert_eq!(event, BrokerEvent::Connected);
        assert_eq!(sub.topics, vec![TOPIC_LIGHT, TOPIC_PRESENCE]);
    }

    #[test]
    fn test_refused_connect_subscribes_nothing() {
        let mut sub = FakeSubscriber::default();
        let event = on_connect(
            &mut sub,
            &Topics::default(),
            ConnectReturnCode::BadUserNamePassword,
        );

        assert!(matches!(event, BrokerEvent::Failed(ref reason) if reason.contains("BadUserNamePassword")));
        assert!(sub.topics.is_empty());
    }

    #[test]
    fn test_subscribe_error_is_reported() {
        let mut sub = FakeSubscriber {
            reject: Some(TOPIC_PRESENCE.to_string()),
            ..Default::default()
        };
        let event = on_connect(&mut sub, &Topics::default(), ConnectReturnCode::Success);

        assert!(matches!(event, BrokerEvent::Failed(_)));
        assert_eq!(sub.topics, vec![TOPIC_LIGHT]);
    }

    fn publish(topic: &str, payload: &[u8]) -> std::result::Result<Event, ConnectionError> {
        Ok(Event::Incoming(Packet::Publish(Publish::new(
            topic,
            QoS::AtMostOnce,
            payload.to_vec(),
        ))))
    }

    fn refused() -> std::result::Result<Event, ConnectionError> {
        Err(ConnectionError::ConnectionRefused(ConnectReturnCode::NotAuthorized))
    }

    #[test]
    fn test_refused_notification_is_a_failure() {
        let mut sub = FakeSubscriber::default();
        let event = on_notification(&mut sub, &Topics::default(), refused());
        assert!(matches!(event, Some(BrokerEvent::Failed(_))));
        assert!(sub.topics.is_empty());
    }

    #[test]
    fn test_connack_notification_subscribes() {
        let mut sub = FakeSubscriber::default();
        let connack = Ok(Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::Success,
            false,
        ))));
        let event = on_notification(&mut sub, &Topics::default(), connack);
        assert_eq!(event, Some(BrokerEvent::Connected));
        assert_eq!(sub.topics.len(), 2);
    }

    #[test]
    fn test_publish_keeps_topic_and_payload_bytes() {
        let mut sub = FakeSubscriber::default();
        let event = on_notification(&mut sub, &Topics::default(), publish(TOPIC_LIGHT, b"\xff12.5"));
        assert_eq!(
            event,
            Some(BrokerEvent::Message {
                topic: TOPIC_LIGHT.to_string(),
                payload: b"\xff12.5".to_vec(),
            })
        );
    }

    #[test]
    fn test_ping_traffic_is_skipped() {
        let mut sub = FakeSubscriber::default();
        let topics = Topics::default();
        assert_eq!(
            on_notification(&mut sub, &topics, Ok(Event::Incoming(Packet::PingResp))),
            None
        );
        assert_eq!(
            on_notification(&mut sub, &topics, Ok(Event::Outgoing(rumqttc::Outgoing::PingReq))),
            None
        );
    }

    #[test]
    fn test_io_error_is_a_failure() {
        let mut sub = FakeSubscriber::default();
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let event = on_notification(&mut sub, &Topics::default(), Err(ConnectionError::Io(err)));
        assert!(matches!(event, Some(BrokerEvent::Failed(ref reason)) if reason.contains("reset by peer")));
    }

    #[test]
    fn test_pump_stops_at_first_failure_without_retrying() {
        let mut sub = FakeSubscriber::default();
        let (tx, rx) = unbounded();
        let notifications = vec![
            Ok(Event::Incoming(Packet::PingResp)),
            publish(TOPIC_PRESENCE, b"1"),
            refused(),
            publish(TOPIC_LIGHT, b"99"),
        ];

        pump(&mut sub, &Topics::default(), notifications, &tx);
        drop(tx);

        let events: Vec<BrokerEvent> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], BrokerEvent::Message { ref topic, .. } if topic == TOPIC_PRESENCE));
        assert!(matches!(events[1], BrokerEvent::Failed(_)));
        assert_eq!(events[2], BrokerEvent::Closed);
    }

    #[test]
    fn test_pump_stops_when_consumer_hangs_up() {
        let mut sub = FakeSubscriber::default();
        let (tx, rx) = unbounded();
        drop(rx);

        // returns instead of draining the whole stream
        let notifications = (0..1000).map(|_| publish(TOPIC_LIGHT, b"1"));
        pump(&mut sub, &Topics::default(), notifications, &tx);
    }
}
