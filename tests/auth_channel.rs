//! Integration tests for the authenticated supervisor link: signed
//! datagrams carrying commands, status reports and clock probes.

use anyhow::{ensure, Context, Result};

use buslink::auth::{SignedChannel, DEFAULT_REPLAY_WINDOW_MS};
use buslink::clock::{ClockProbe, OffsetEstimator, SAMPLE_TARGET};
use buslink::report::{StatusReport, FLAG_KEY_ON, FLAG_POWER_ON};
use buslink::{AuthError, LinkConfig};

const NOW: u64 = 1_724_900_000_000;

fn keys_from_config() -> Result<(Vec<u8>, Vec<u8>)> {
    let config = LinkConfig::from_yaml(
        "info_server: telemetry.example.net\n\
         info_port: 9048\n\
         command_hmac: 5468697320697320612032302d627974\n\
         info_hmac: 6b657920666f7220737461747573206d\n",
    )
    .context("parse config")?;
    Ok((config.command_key()?, config.info_key()?))
}

#[test]
fn command_flow_round_trips() -> Result<()> {
    let (command_key, _) = keys_from_config()?;
    let sender = SignedChannel::new(command_key.clone());
    let mut receiver = SignedChannel::new(command_key);

    let pkt = sender.build_message_at(b"precondition", NOW);
    let msg = receiver
        .verify_message_at(&pkt, NOW + 120)
        .context("verify command")?;
    ensure!(msg.timestamp == NOW);
    ensure!(msg.payload == b"precondition");
    Ok(())
}

#[test]
fn replayed_command_is_rejected_once_accepted() -> Result<()> {
    let (command_key, _) = keys_from_config()?;
    let sender = SignedChannel::new(command_key.clone());
    let mut receiver = SignedChannel::new(command_key);

    let pkt = sender.build_message_at(b"unlock", NOW);
    receiver
        .verify_message_at(&pkt, NOW)
        .context("first delivery")?;
    match receiver.verify_message_at(&pkt, NOW + 500) {
        Err(AuthError::Replayed { timestamp }) => ensure!(timestamp == NOW),
        other => anyhow::bail!("expected replay rejection, got {other:?}"),
    }
    Ok(())
}

#[test]
fn stale_and_future_commands_are_rejected() -> Result<()> {
    let (command_key, _) = keys_from_config()?;
    let sender = SignedChannel::new(command_key.clone());

    let pkt = sender.build_message_at(b"unlock", NOW);
    let mut receiver = SignedChannel::new(command_key.clone());
    match receiver.verify_message_at(&pkt, NOW + DEFAULT_REPLAY_WINDOW_MS + 1) {
        Err(AuthError::TooOld { .. }) => {}
        other => anyhow::bail!("expected stale rejection, got {other:?}"),
    }

    let mut receiver = SignedChannel::new(command_key);
    match receiver.verify_message_at(&pkt, NOW - DEFAULT_REPLAY_WINDOW_MS - 1) {
        Err(AuthError::TooNew { .. }) => {}
        other => anyhow::bail!("expected future rejection, got {other:?}"),
    }
    Ok(())
}

#[test]
fn status_report_travels_signed() -> Result<()> {
    let (_, info_key) = keys_from_config()?;
    let sender = SignedChannel::new(info_key.clone());
    let mut receiver = SignedChannel::new(info_key);

    let mut report = StatusReport {
        air_temp: 21,
        oil_life: 64,
        tire_ft_lf: 36,
        tire_rr_lf: 35,
        tire_ft_rt: 36,
        tire_rr_rt: 34,
        flags: FLAG_POWER_ON | FLAG_KEY_ON,
        odometer: 88_201,
        lat: 152_409_780,
        lon: -298_979_280,
        battery_volts: 131,
        ..Default::default()
    };
    report.set_cabin_temp_celsius(23);

    let pkt = sender.build_message_at(&report.encode(), NOW);
    let msg = receiver
        .verify_message_at(&pkt, NOW + 40)
        .context("verify report")?;
    let decoded = StatusReport::decode(&msg.payload).context("decode report")?;
    ensure!(decoded == report);
    ensure!(decoded.power_on());
    ensure!(decoded.key_on());
    ensure!(!decoded.locked());
    Ok(())
}

#[test]
fn tampered_report_never_decodes() -> Result<()> {
    let (_, info_key) = keys_from_config()?;
    let sender = SignedChannel::new(info_key.clone());
    let report = StatusReport::default();
    let pkt = sender.build_message_at(&report.encode(), NOW);

    for i in 0..pkt.len() {
        let mut bad = pkt.clone();
        bad[i] ^= 0x80;
        let mut receiver = SignedChannel::new(info_key.clone());
        match receiver.verify_message_at(&bad, NOW) {
            Err(AuthError::BadSignature) => {}
            other => anyhow::bail!("byte {i}: expected signature failure, got {other:?}"),
        }
    }
    Ok(())
}

#[test]
fn clock_probe_round_trip_settles_an_offset() -> Result<()> {
    // Local clock is 3.2 seconds behind the supervisor; 80ms each way.
    let skew = 3.2;
    let mut estimator = OffsetEstimator::new();
    let mut estimate = None;

    for i in 0..SAMPLE_TARGET {
        let origin = 1000.0 + i as f64;
        let request = ClockProbe::request(origin);
        let echoed = ClockProbe::decode(&request.encode()).context("decode request")?;

        // Supervisor stamps its own clock into the reply.
        let reply = echoed.reply_to(origin + 0.08 + skew);
        let reply = ClockProbe::decode(&reply.encode()).context("decode reply")?;

        estimate = estimator.add_round_trip(&reply, origin + 0.16);
    }

    let estimate = estimate.context("ten samples should settle the estimate")?;
    ensure!((estimate.offset - skew).abs() < 1e-9);
    ensure!(estimate.low_spread.abs() < 1e-9);
    ensure!(estimate.high_spread.abs() < 1e-9);
    Ok(())
}

#[test]
fn probe_packets_are_distinguishable_from_reports() -> Result<()> {
    // Both flow over the same socket; the 2-byte tag and fixed length
    // separate them.
    let probe = ClockProbe::request(1_724_900_000.5).encode();
    ensure!(StatusReport::decode(&probe).is_err());
    let report = StatusReport::default().encode();
    ensure!(ClockProbe::decode(&report).is_err());
    Ok(())
}
