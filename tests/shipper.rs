use lokiship::{Config, ErrorInfo, LogRecord, LogShipper, props};
use mockito::{Matcher, Server, ServerGuard};

/// A config pointing at the mock server, with a flush interval long enough
/// that only explicit flushes and shutdown drive delivery.
fn config_for(server: &ServerGuard) -> Config {
    let (host, port) = server
        .host_with_port()
        .rsplit_once(':')
        .map(|(host, port)| (host.to_string(), port.parse::<u16>().unwrap()))
        .unwrap();

    let mut config = Config::new(host);
    config.port = port;
    config.service = "orders".to_string();
    config.flush_interval_ms = 600_000;
    config.retry_attempts = 0;
    config
}

#[tokio::test]
async fn sensitive_properties_never_reach_the_wire() {
    let mut server = Server::new_async().await;

    // Matched only if an unredacted value leaks into the payload.
    let leaked = server
        .mock("POST", "/loki/api/v1/push")
        .match_body(Matcher::Regex("abc123".to_string()))
        .with_status(204)
        .expect(0)
        .create_async()
        .await;

    // The event is embedded as a JSON-escaped string inside the payload, so
    // its quotes arrive as `\"`.
    let redacted = server
        .mock("POST", "/loki/api/v1/push")
        .match_body(Matcher::Regex(
            r#"password\\":\\"\[REDACTED\]"#.to_string(),
        ))
        .with_status(204)
        .create_async()
        .await;

    let shipper = LogShipper::new(config_for(&server)).unwrap();
    shipper.log_information("user created", Some(props!("password" => "abc123")));
    shipper.flush().await;

    redacted.assert_async().await;
    leaked.assert_async().await;

    shipper.stop().await;
}

#[tokio::test]
async fn explicit_flush_respects_the_batch_cap() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/loki/api/v1/push")
        .with_status(204)
        .expect(3)
        .create_async()
        .await;

    let shipper = LogShipper::new(config_for(&server)).unwrap();
    for seq in 0..120 {
        shipper.log_information(&format!("event {seq}"), None);
    }
    assert_eq!(shipper.pending(), 120);

    // 120 events with the default cap of 50: pushes of 50, 50 and 20.
    shipper.flush().await;

    assert_eq!(shipper.pending(), 0);
    mock.assert_async().await;

    shipper.stop().await;
}

#[tokio::test]
async fn stop_drains_the_queue_before_returning() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/loki/api/v1/push")
        .match_body(Matcher::Regex("goodbye".to_string()))
        .with_status(204)
        .create_async()
        .await;

    let shipper = LogShipper::new(config_for(&server)).unwrap();
    shipper.log_warning("goodbye", None);

    shipper.start();
    shipper.stop().await;

    assert_eq!(shipper.pending(), 0);
    mock.assert_async().await;
}

#[tokio::test]
async fn failed_batches_survive_for_a_later_flush() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("POST", "/loki/api/v1/push")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;

    let shipper = LogShipper::new(config_for(&server)).unwrap();
    shipper.log_error(
        "request failed",
        Some(props!("path" => "/api/orders", "status_code" => 500)),
        Some(ErrorInfo::new("DbError", "connection refused")),
    );

    shipper.flush().await;
    unavailable.assert_async().await;
    assert_eq!(shipper.pending(), 1, "the failed batch is requeued");

    // Backend recovers; the requeued event goes out on the next flush.
    unavailable.remove_async().await;
    let recovered = server
        .mock("POST", "/loki/api/v1/push")
        .match_body(Matcher::Regex("request failed".to_string()))
        .with_status(204)
        .create_async()
        .await;

    shipper.flush().await;
    recovered.assert_async().await;
    assert_eq!(shipper.pending(), 0);

    shipper.stop().await;
}

#[tokio::test]
async fn periodic_flush_delivers_without_explicit_calls() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/loki/api/v1/push")
        .with_status(204)
        .create_async()
        .await;

    let mut config = config_for(&server);
    config.flush_interval_ms = 50;

    let shipper = LogShipper::new(config).unwrap();
    shipper.log_information("background", None);

    for _ in 0..50 {
        if shipper.pending() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    assert_eq!(shipper.pending(), 0);
    mock.assert_async().await;

    shipper.stop().await;
}

#[tokio::test]
async fn fire_and_forget_calls_accept_a_full_record() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/loki/api/v1/push")
        .match_body(Matcher::AllOf(vec![
            // Escaped inside the serialized event line.
            Matcher::Regex(r#"correlationId\\":\\"req-42"#.to_string()),
            // Plain in the stream label map.
            Matcher::Regex(r#""correlation_id":"req-42""#.to_string()),
            Matcher::Regex(r#""level":"critical""#.to_string()),
        ]))
        .with_status(204)
        .create_async()
        .await;

    let shipper = LogShipper::new(config_for(&server)).unwrap();
    shipper.log(
        lokiship::Level::Critical,
        "payment pipeline down",
        LogRecord {
            correlation_id: Some("req-42".to_string()),
            user_id: Some("alice".to_string()),
            ..Default::default()
        },
    );
    shipper.flush().await;

    // The id shows up both in the serialized event and as a stream label.
    mock.assert_async().await;

    shipper.stop().await;
}
