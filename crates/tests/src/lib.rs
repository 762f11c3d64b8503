//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 时钟同步 → 编码 → 传输 的端到端场景（使用 mock 无线电）

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{BeatcastConfig, ConfigVersion, IDENTIFIER_LEN, PACKET_LEN};

    #[test]
    fn test_contract_constants() {
        let _ = ConfigVersion::V1;
        assert_eq!(PACKET_LEN, 16);
        assert_eq!(IDENTIFIER_LEN, 2 * PACKET_LEN);
    }

    #[test]
    fn test_empty_config_is_protocol_defaults() {
        let config = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        let defaults = BeatcastConfig::default();
        assert_eq!(config.advertise.app_service_id, defaults.advertise.app_service_id);
        assert_eq!(config.advertise.stop_retry_delay_ms, 1000);
        assert_eq!(config.connect.max_concurrency, 5);
        assert_eq!(config.connect.scan_service_id, "b33d");
        assert_eq!(config.connect.write_characteristic_id, "b00d");
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use broadcaster::{BroadcastState, Broadcaster, PowerState, RestartOutcome};
    use clock_sync::ClockSync;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{AdvertiseConfig, ConnectConfig, DeviceOutcome, Packet, ShowState};
    use dispatcher::Dispatcher;
    use radio::{ConcurrencyProbe, MockAdvertiser, MockDevice, MockDeviceConfig};
    use tokio::time::Instant;

    fn show(start_time: i64, bpm: f64) -> ShowState {
        ShowState {
            start_time,
            bpm,
            gradient: 42,
            energy: 500.0,
            attack: 100.0,
            release: 600.0,
            program: 1,
        }
    }

    fn packet(start_time: i64) -> Packet {
        packet_codec::encode(&show(start_time, 120.0))
    }

    async fn powered_broadcaster() -> Broadcaster<MockAdvertiser> {
        let broadcaster = Broadcaster::new(MockAdvertiser::new(), AdvertiseConfig::default());
        broadcaster
            .on_power_state(PowerState::PoweredOn)
            .await
            .unwrap();
        broadcaster
    }

    /// Sync at local 1000 / remote 100, then a show starting at remote 100
    #[test]
    fn test_e2e_sync_then_encode() {
        let sync = ClockSync::new();
        sync.record_sync(1000.0, 100.0);

        let state = ShowState {
            start_time: sync.to_local(100.0).floor() as i64,
            gradient: 0,
            ..show(0, 120.0)
        };
        let packet = packet_codec::encode(&state);
        let bytes = packet.as_bytes();

        assert_eq!(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 1000);
        assert_eq!(bytes[4], 120);
        assert_eq!(bytes[6], 127);
        assert_eq!(bytes[7], 42);
        assert_eq!(bytes[8], 255);
        assert_eq!(bytes[9], 1);
        assert!(bytes[10..].iter().all(|&b| b == 0));

        let identifier = packet_codec::to_identifier(&packet);
        assert!(packet_codec::is_identifier(&identifier));
        assert_eq!(packet_codec::from_identifier(&identifier).unwrap(), packet);
    }

    /// Show state → broadcaster → advertised identifier a scanner can decode
    #[tokio::test]
    async fn test_e2e_advertise_pipeline() {
        let broadcaster = powered_broadcaster().await;
        let sent = packet(5000);

        let outcome = broadcaster.set_packet(sent).await.unwrap();
        assert!(matches!(outcome, RestartOutcome::Advertising { .. }));

        let services = broadcaster.radio().advertised().unwrap();
        assert_eq!(services[0], "b0ef");
        let received = packet_codec::from_identifier(&services[1]).unwrap();
        assert_eq!(packet_codec::decode(&received), packet_codec::decode(&sent));
        assert_eq!(packet_codec::decode(&received).start_time, 5000);
    }

    #[tokio::test]
    async fn test_e2e_short_identifier_rejected() {
        let broadcaster = powered_broadcaster().await;
        let before = broadcaster.on_air();
        let generation = broadcaster.generation();

        let short = &packet_codec::to_identifier(&packet(1))[..31];
        let err = broadcaster.set_identifier(short).err().unwrap();

        assert!(err.is_invalid_length());
        assert_eq!(broadcaster.on_air(), before);
        assert_eq!(broadcaster.generation(), generation);
        assert_eq!(broadcaster.state(), BroadcastState::Advertising);
    }

    /// A failed stop is retried after the delay and ends on the newest packet
    #[tokio::test(start_paused = true)]
    async fn test_e2e_stop_failure_reaches_latest_packet() {
        let broadcaster = powered_broadcaster().await;
        broadcaster.radio().fail_next_stops(1);
        let started = Instant::now();

        let first = tokio::spawn(broadcaster.set_packet(packet(1)));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = tokio::spawn(broadcaster.set_packet(packet(2)));

        assert_eq!(first.await.unwrap().unwrap(), RestartOutcome::Superseded);
        assert!(matches!(
            second.await.unwrap().unwrap(),
            RestartOutcome::Advertising { .. }
        ));
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert_eq!(broadcaster.on_air(), Some(packet(2)));
        assert_eq!(broadcaster.state(), BroadcastState::Advertising);
    }

    /// A then B before the worker wakes: only B is written
    #[tokio::test(start_paused = true)]
    async fn test_e2e_dispatch_coalesces_rapid_updates() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let devices: Vec<_> = (0..3)
            .map(|i| Arc::new(MockDevice::new(format!("lamp-{i}"))))
            .collect();
        for device in &devices {
            dispatcher
                .register_device(device.name().to_string(), Arc::clone(device))
                .await;
        }

        dispatcher.send_packet(packet(1));
        let report = dispatcher.send_packet_and_wait(packet(2)).await.unwrap();

        assert_eq!(report.packet, packet(2));
        assert_eq!(report.done(), 3);
        for device in &devices {
            assert_eq!(device.writes(), vec![packet(2)]);
        }

        let mut aggregator = observability::DispatchAggregator::new();
        aggregator.update(&report);
        let summary = aggregator.summary();
        assert_eq!(summary.total_batches, 1);
        assert_eq!(summary.done, 3);
        dispatcher.shutdown().await;
    }

    /// B arrives while A is connecting: A aborts without writing, B lands
    #[tokio::test(start_paused = true)]
    async fn test_e2e_abort_during_connect() {
        let dispatcher = Dispatcher::new(&ConnectConfig::default());
        let device = Arc::new(MockDevice::with_config(
            "lamp",
            MockDeviceConfig {
                connect_delay: Duration::from_millis(200),
                ..Default::default()
            },
        ));
        dispatcher
            .register_device("lamp", Arc::clone(&device))
            .await;

        dispatcher.send_packet(packet(1));
        // first batch is now inside its 200 ms connect
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = dispatcher.send_packet_and_wait(packet(2)).await.unwrap();

        assert_eq!(second.outcome_for("lamp"), Some(&DeviceOutcome::Done));
        assert_eq!(device.writes(), vec![packet(2)]);
        assert_eq!(device.connect_count(), 2);

        let metrics = dispatcher.metrics().await;
        assert_eq!(metrics[0].1.aborted_count, 1);
        assert_eq!(metrics[0].1.done_count, 1);
        dispatcher.shutdown().await;
    }

    /// Concurrency ceiling from a loaded configuration file
    #[tokio::test(start_paused = true)]
    async fn test_e2e_config_limits_concurrency() {
        let config = ConfigLoader::load_from_str(
            "[connect]\nmax_concurrency = 2\nstep_timeout_ms = 500\n",
            ConfigFormat::Toml,
        )
        .unwrap();

        let dispatcher = Dispatcher::new(&config.connect);
        let probe = ConcurrencyProbe::new();
        for i in 0..6 {
            let device = MockDevice::with_config(
                format!("lamp-{i}"),
                MockDeviceConfig {
                    connect_delay: Duration::from_millis(100),
                    write_delay: Duration::from_millis(20),
                    ..Default::default()
                },
            )
            .with_probe(probe.clone());
            dispatcher
                .register_device(format!("lamp-{i}"), Arc::new(device))
                .await;
        }

        let report = dispatcher.send_packet_and_wait(packet(7)).await.unwrap();
        assert_eq!(report.done(), 6);
        assert!(probe.max_observed() <= 2);
        assert!(probe.max_observed() >= 1);
        dispatcher.shutdown().await;
    }
}
