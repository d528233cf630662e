//! # Channel and Calibration Tests
//!
//! Virtual channel maps with unsupported slots, band configuration changes,
//! and reuse of the cached synthesizer calibration when hopping.


use cc110x_rs::constants::{
    CHANNEL_UNSUPPORTED, MAX_CHANNELS, REG_CHANNR, REG_FREQ2, REG_FSCAL1, REG_FSCAL3, STROBE_SCAL,
};
use cc110x_rs::radio::HwState;
use cc110x_rs::{
    BandConfig, Cc110x, Cc110xError, Cc110xParams, ChannelMap, GdoLine, MockChip, RadioEvent,
    State,
};
use mock_support::{listening_radio, listening_radio_with, test_params};
use proptest::prelude::*;
use std::sync::Arc;

const SPARSE_MAP: ChannelMap = ChannelMap([
    0,
    10,
    CHANNEL_UNSUPPORTED,
    30,
    CHANNEL_UNSUPPORTED,
    50,
    60,
    CHANNEL_UNSUPPORTED,
]);

fn sparse_params() -> Cc110xParams {
    Cc110xParams {
        channel_map: SPARSE_MAP,
        ..test_params()
    }
}

#[tokio::test]
async fn test_set_channel_respects_the_map() {
    let mut h = listening_radio_with(MockChip::new(), sparse_params()).await;

    for channel in 0..=MAX_CHANNELS as u8 {
        let before = h.radio.channel().await;
        let result = h.radio.set_channel(channel).await;
        if SPARSE_MAP.is_supported(channel) {
            assert!(result.is_ok(), "channel {} should be accepted", channel);
            assert_eq!(h.radio.channel().await, channel);
            assert_eq!(h.chip.register(REG_CHANNR), SPARSE_MAP.0[channel as usize]);
            assert_eq!(h.next_event(), Some(RadioEvent::ChannelChanged(channel)));
        } else {
            assert!(
                matches!(result, Err(Cc110xError::Range(_))),
                "channel {} should be out of range",
                channel
            );
            assert_eq!(h.radio.channel().await, before);
            assert!(h.next_event().is_none());
        }
        assert_eq!(h.radio.state(), State::Listening);
        assert_eq!(h.chip.hw_state(), HwState::Rx);
    }
}

#[tokio::test]
async fn test_hop_uses_cached_calibration() {
    let h = listening_radio().await;

    h.radio.set_channel(2).await.unwrap();
    let cal = h.radio.calibration().await;
    // 0x20 + CHANNR 20, as measured during the initial calibration
    assert_eq!(cal.fscal1[2], 0x34);
    assert_eq!(h.chip.register(REG_FSCAL1), 0x34);
    assert_eq!(h.chip.register(REG_FSCAL3), cal.fscal3);

    for channel in 0..MAX_CHANNELS as u8 {
        h.radio.set_channel(channel).await.unwrap();
    }
    assert_eq!(h.chip.strobe_count(STROBE_SCAL), 0);
}

#[tokio::test]
async fn test_full_calibration_covers_every_mapped_channel() {
    let h = listening_radio_with(MockChip::new(), sparse_params()).await;
    h.radio.set_channel(3).await.unwrap();
    h.chip.clear_log();

    h.radio.full_calibration().await.unwrap();
    assert_eq!(h.chip.strobe_count(STROBE_SCAL), SPARSE_MAP.len());
    // Back where it was
    assert_eq!(h.radio.channel().await, 3);
    assert_eq!(h.chip.register(REG_CHANNR), 30);
    assert_eq!(h.radio.state(), State::Listening);

    for (channel, _) in SPARSE_MAP.channels() {
        h.radio.set_channel(channel).await.unwrap();
    }
    assert_eq!(h.chip.strobe_count(STROBE_SCAL), SPARSE_MAP.len());
}

#[tokio::test]
async fn test_slow_calibration_is_retried() {
    let chip = MockChip::new();
    chip.set_calibration_polls(3);
    let h = listening_radio_with(chip, test_params()).await;
    assert_eq!(h.radio.state(), State::Listening);

    let cal = h.radio.calibration().await;
    for (channel, physical) in ChannelMap::EU_868MHZ.channels() {
        assert_eq!(cal.fscal1[channel as usize], (0x20 + physical) & 0x3F);
    }
}

#[tokio::test]
async fn test_apply_config_switches_band() {
    let h = listening_radio().await;

    h.radio
        .apply_config(
            Some(BandConfig::ISM_433MHZ_250KBPS),
            Arc::new(ChannelMap::ISM_433MHZ),
            3,
        )
        .await
        .unwrap();

    assert_eq!(h.radio.channel().await, 3);
    assert_eq!(h.radio.state(), State::Listening);
    assert_eq!(h.chip.register(REG_CHANNR), 3);
    assert_eq!(
        h.chip.register(REG_FREQ2),
        BandConfig::ISM_433MHZ_250KBPS.base_freq[0]
    );
    assert_eq!(*h.radio.channel_map().await, ChannelMap::ISM_433MHZ);
    assert_eq!(h.radio.band_config().await, Some(BandConfig::ISM_433MHZ_250KBPS));
    assert_eq!(h.chip.strobe_count(STROBE_SCAL), ChannelMap::ISM_433MHZ.len());
}

#[tokio::test]
async fn test_apply_config_keeps_band_registers_without_config() {
    let h = listening_radio().await;
    let freq2 = h.chip.register(REG_FREQ2);

    h.radio
        .apply_config(None, Arc::new(SPARSE_MAP), 5)
        .await
        .unwrap();
    assert_eq!(h.chip.register(REG_FREQ2), freq2);
    assert_eq!(h.chip.register(REG_CHANNR), 50);
    assert_eq!(h.radio.band_config().await, Some(BandConfig::EU_868MHZ_250KBPS));
}

#[tokio::test]
async fn test_apply_config_rejects_unsupported_channel() {
    let h = listening_radio().await;

    let result = h.radio.apply_config(None, Arc::new(SPARSE_MAP), 2).await;
    assert!(matches!(result, Err(Cc110xError::Range(_))));
    assert_eq!(h.chip.strobe_count(STROBE_SCAL), 0);
    assert_eq!(*h.radio.channel_map().await, ChannelMap::EU_868MHZ);
    assert_eq!(h.radio.state(), State::Listening);
}

#[tokio::test]
async fn test_channel_changes_refused_while_receiving() {
    let h = listening_radio().await;
    h.air(&[50, 0x01, 0x02, 0x03]).await;
    assert_eq!(h.radio.state(), State::Receiving);

    assert!(matches!(h.radio.set_channel(1).await, Err(Cc110xError::TryAgain(_))));
    assert!(matches!(h.radio.full_calibration().await, Err(Cc110xError::TryAgain(_))));
    let result = h
        .radio
        .apply_config(None, Arc::new(ChannelMap::EU_868MHZ), 1)
        .await;
    assert!(matches!(result, Err(Cc110xError::TryAgain(_))));
    assert_eq!(h.radio.channel().await, 0);
}

#[tokio::test]
async fn test_calibration_refused_while_off() {
    let h = listening_radio().await;
    h.radio.sleep().await.unwrap();
    assert!(matches!(h.radio.full_calibration().await, Err(Cc110xError::TryAgain(_))));
    assert!(matches!(h.radio.set_channel(1).await, Err(Cc110xError::TryAgain(_))));
}

#[tokio::test]
async fn test_edges_ignored_while_calibrating() {
    // An edge arriving mid-calibration must not disturb it
    let chip = MockChip::new();
    chip.set_calibration_polls(2);
    let radio = Arc::new(Cc110x::setup(chip.clone(), test_params()).unwrap());
    radio.init().await.unwrap();

    let calibration = {
        let radio = radio.clone();
        tokio::spawn(async move { radio.full_calibration().await })
    };
    tokio::task::yield_now().await;
    radio.handle_irq(GdoLine::Gdo2).await.unwrap();
    calibration.await.unwrap().unwrap();
    assert_eq!(radio.state(), State::Listening);
}

fn channel_map() -> impl Strategy<Value = [u8; MAX_CHANNELS]> {
    proptest::array::uniform8(prop_oneof![
        1 => Just(CHANNEL_UNSUPPORTED),
        3 => 0u8..CHANNEL_UNSUPPORTED,
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Any channel request either lands on a supported channel or fails with
    /// Range and leaves the active channel alone
    #[test]
    fn prop_channel_requests_stay_in_map(
        map in channel_map(),
        requests in proptest::collection::vec(0u8..12, 1..12),
    ) {
        let map = ChannelMap(map);
        let first = map.channels().next().map(|(channel, _)| channel);
        prop_assume!(first.is_some());

        let params = Cc110xParams {
            channel_map: map,
            channel: first.unwrap_or_default(),
            ..test_params()
        };

        tokio_test::block_on(async {
            let h = listening_radio_with(MockChip::new(), params).await;
            let mut active = h.radio.channel().await;
            for channel in requests {
                match h.radio.set_channel(channel).await {
                    Ok(()) => {
                        assert!(map.is_supported(channel));
                        active = channel;
                    }
                    Err(Cc110xError::Range(_)) => assert!(!map.is_supported(channel)),
                    Err(other) => panic!("unexpected error {:?}", other),
                }
                assert_eq!(h.radio.channel().await, active);
                assert!(map.is_supported(active));
                assert_eq!(h.chip.register(REG_CHANNR), map.0[active as usize]);
            }
        });
    }
}
