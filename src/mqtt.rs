use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::MqttOptions;
use tokio_util::sync::CancellationToken;

use crate::error::MqttError;

/// Pause before polling again after the connection to the broker failed.
const RECONNECT_DELAY: std::time::Duration = std::time::Duration::from_secs(1);

/// How long shutdown waits for the DISCONNECT to go out.
const DISCONNECT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

pub fn events_topic(config: &crate::config::MqttConfig) -> String {
    format!("{prefix}/events", prefix = config.topic_prefix)
}

/// Subscribe to the events topic and forward every valid event until cancelled.
pub async fn run(
    config: crate::config::MqttConfig,
    cancellation_token: CancellationToken,
    event_sender: tokio::sync::mpsc::Sender<crate::event::Event>,
) -> Result<(), MqttError> {
    let mut mqttoptions =
        MqttOptions::new(&config.client_name, config.host.to_string(), config.port);
    mqttoptions.set_keep_alive(config.keep_alive);

    let (client, mut eventloop) = rumqttc::v5::AsyncClient::new(mqttoptions, 100);

    let topic = events_topic(&config);
    let qos = rumqttc::v5::mqttbytes::QoS::from(config.qos);

    let Some(sub_result) = cancellation_token
        .run_until_cancelled(client.subscribe(&topic, qos))
        .await
    else {
        tracing::info!("Cancelled, shutting down MQTT processing");
        return Ok(());
    };
    sub_result.map_err(MqttError::Subscribing)?;
    tracing::info!("Subscribed to {topic}");

    loop {
        let Some(event) = cancellation_token
            .run_until_cancelled(eventloop.poll())
            .await
        else {
            tracing::info!("Cancelled, shutting down MQTT processing");
            break;
        };

        let event = match event {
            Ok(event) => event,
            Err(error) => {
                tracing::warn!(?error, "MQTT connection failed, reconnecting");
                let sleep = tokio::time::sleep(RECONNECT_DELAY);
                if cancellation_token.run_until_cancelled(sleep).await.is_none() {
                    tracing::info!("Cancelled, shutting down MQTT processing");
                    break;
                }
                continue;
            }
        };

        match event {
            rumqttc::v5::Event::Incoming(Packet::Publish(publish)) => {
                tracing::debug!(topic = ?publish.topic, "Received payload");

                let Some(event) = parse_event(&publish.payload) else {
                    continue;
                };

                if let Err(error) = event_sender.send(event).await {
                    tracing::error!(?error, "Event receiver gone, stopping MQTT processing");
                    break;
                }
            }

            rumqttc::v5::Event::Incoming(Packet::ConnAck(_)) => {
                tracing::debug!("Connected to broker");
            }

            rumqttc::v5::Event::Incoming(_) | rumqttc::v5::Event::Outgoing(_) => {}
        }
    }

    client
        .disconnect()
        .await
        .map_err(MqttError::Disconnecting)?;

    // the request only gets sent while the event loop is polled
    let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(rumqttc::v5::Event::Outgoing(rumqttc::Outgoing::Disconnect)) => break true,
                Ok(_) => {}
                Err(error) => {
                    tracing::debug!(?error, "Connection ended before DISCONNECT was sent");
                    break false;
                }
            }
        }
    })
    .await;

    match flushed {
        Ok(true) => tracing::info!("Disconnected from broker"),
        Ok(false) => {}
        Err(_elapsed) => tracing::warn!("Timed out sending DISCONNECT"),
    }

    Ok(())
}

fn parse_event(payload: &[u8]) -> Option<crate::event::Event> {
    match serde_json::from_slice(payload) {
        Ok(event) => {
            tracing::debug!(?event, "Deserialized event successfully");
            Some(event)
        }
        Err(error) => {
            tracing::debug!(?error, "Failed to deserialize event, ignoring");
            None
        }
    }
}
