//! # Lifecycle Tests
//!
//! Power down and wake up, wake-on-radio polling, TX power selection,
//! parameter files and the initialisation sequence.


use cc110x_rs::constants::{
    BASE_CONFIG, GDO_CONSTANT_LOW, MCSM0_AUTOCAL, REG_ADDR, REG_CHANNR, REG_FREND0, REG_FSCAL1,
    REG_IOCFG0, REG_IOCFG2, REG_MCSM0, REG_MCSM2, REG_WORCTRL, REG_WOREVT0, REG_WOREVT1,
    STROBE_SPWD, STROBE_SWOR,
};
use cc110x_rs::radio::HwState;
use cc110x_rs::{
    Cc110x, Cc110xError, Cc110xParams, ChannelMap, Frame, GdoLine, MockChip, PaTable,
    RadioEvent, State, TxPower,
};
use mock_support::{listening_radio, listening_radio_with, test_params, wait_for_state};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

#[tokio::test]
async fn test_sleep_powers_down() {
    let h = listening_radio().await;

    h.radio.sleep().await.unwrap();
    assert_eq!(h.radio.state(), State::Off);
    assert!(h.chip.is_powered_down());
    assert_eq!(h.chip.strobe_count(STROBE_SPWD), 1);
    assert_eq!(h.chip.register(REG_IOCFG2), GDO_CONSTANT_LOW);
    assert_eq!(h.chip.register(REG_IOCFG0), GDO_CONSTANT_LOW);
}

#[tokio::test]
async fn test_sleep_is_idempotent() {
    let h = listening_radio().await;
    h.radio.sleep().await.unwrap();
    let transfers = h.chip.transfer_count();

    h.radio.sleep().await.unwrap();
    assert_eq!(h.chip.transfer_count(), transfers);
    assert_eq!(h.chip.strobe_count(STROBE_SPWD), 1);
    assert_eq!(h.radio.state(), State::Off);
}

#[tokio::test]
async fn test_sleep_refused_while_calibrating() {
    let h = listening_radio().await;
    h.chip.set_calibration_polls(2);

    let calibration = {
        let radio = h.radio.clone();
        tokio::spawn(async move { radio.full_calibration().await })
    };
    wait_for_state(&h.radio, State::Calibrating).await;

    // The bus is free during the settle time, the device is not
    assert!(matches!(h.radio.sleep().await, Err(Cc110xError::TryAgain(_))));
    assert!(!h.chip.is_powered_down());

    calibration.await.unwrap().unwrap();
    assert_eq!(h.radio.state(), State::Listening);

    h.radio.sleep().await.unwrap();
    h.radio.wakeup().await.unwrap();
    assert_eq!(h.radio.state(), State::Listening);
    assert!(!h.chip.is_powered_down());
    h.radio.set_channel(3).await.unwrap();
}

#[tokio::test]
async fn test_failed_calibration_falls_back_to_idle() {
    let h = listening_radio().await;
    h.chip.fail_next_transfers(1);

    assert!(matches!(h.radio.full_calibration().await, Err(Cc110xError::Hal(_))));
    assert_eq!(h.radio.state(), State::Idle);

    // Idle still allows hopping back to listening
    h.radio.set_channel(1).await.unwrap();
    assert_eq!(h.radio.state(), State::Listening);
}

#[tokio::test]
async fn test_wakeup_restores_volatile_state() {
    let params = Cc110xParams {
        channel: 4,
        tx_power: TxPower::Plus7Dbm,
        ..test_params()
    };
    let h = listening_radio_with(MockChip::new(), params).await;
    let fscal1 = h.radio.calibration().await.fscal1[4];

    h.radio.sleep().await.unwrap();
    assert_eq!(h.chip.patable(), [0; 8]);

    h.radio.wakeup().await.unwrap();
    assert_eq!(h.radio.state(), State::Listening);
    assert!(!h.chip.is_powered_down());
    assert_eq!(h.chip.hw_state(), HwState::Rx);
    assert_eq!(h.chip.patable(), PaTable::EU_868MHZ.0);
    assert_eq!(h.chip.register(REG_FREND0), TxPower::Plus7Dbm.frend0());
    assert_eq!(h.chip.register(REG_CHANNR), 40);
    assert_eq!(h.chip.register(REG_FSCAL1), fscal1);
    assert_eq!(h.radio.channel().await, 4);
}

#[tokio::test]
async fn test_wakeup_when_awake_does_nothing() {
    let h = listening_radio().await;
    let transfers = h.chip.transfer_count();
    h.radio.wakeup().await.unwrap();
    assert_eq!(h.chip.transfer_count(), transfers);
    assert_eq!(h.radio.state(), State::Listening);
}

#[tokio::test]
async fn test_wakeup_times_out_on_dead_crystal() {
    let h = listening_radio().await;
    h.radio.sleep().await.unwrap();
    h.chip.set_wake_polls(10_000);

    assert!(matches!(h.radio.wakeup().await, Err(Cc110xError::Io(_))));
    assert_eq!(h.radio.state(), State::Off);
}

#[tokio::test]
async fn test_wor_configures_polling() {
    let h = listening_radio().await;

    let settings = h.radio.set_wor(Duration::from_millis(500)).await.unwrap();
    assert_eq!(settings.interval(), Duration::from_millis(500));
    assert_eq!(h.radio.state(), State::Wor);
    assert!(h.chip.is_wor());
    assert_eq!(h.chip.strobe_count(STROBE_SWOR), 1);
    assert_eq!(h.chip.register(REG_WORCTRL), settings.worctrl());
    assert_eq!(
        u16::from_be_bytes([h.chip.register(REG_WOREVT1), h.chip.register(REG_WOREVT0)]),
        settings.event0()
    );
    assert_eq!(h.chip.register(REG_MCSM2), settings.mcsm2());
    assert_eq!(h.chip.register(REG_MCSM0), MCSM0_AUTOCAL);

    // Everything that needs continuous listening waits for wakeup
    assert!(matches!(h.radio.set_channel(1).await, Err(Cc110xError::TryAgain(_))));
    assert!(matches!(h.radio.full_calibration().await, Err(Cc110xError::TryAgain(_))));
    let result = h.radio.send(&Frame::broadcast(0x01, &b"x"[..])).await;
    assert!(matches!(result, Err(Cc110xError::TryAgain(_))));

    // A new interval while polling just reprograms the timer
    let settings = h.radio.set_wor(Duration::from_secs(5)).await.unwrap();
    assert_eq!(h.chip.register(REG_WORCTRL), settings.worctrl());
    assert_eq!(h.chip.strobe_count(STROBE_SWOR), 2);
}

#[tokio::test]
async fn test_wor_rejects_bad_requests() {
    let h = listening_radio().await;
    let transfers = h.chip.transfer_count();
    assert!(matches!(
        h.radio.set_wor(Duration::from_millis(10)).await,
        Err(Cc110xError::Range(_))
    ));
    assert_eq!(h.chip.transfer_count(), transfers);

    h.air(&[50, 0x01, 0x02, 0x03]).await;
    assert!(matches!(
        h.radio.set_wor(Duration::from_millis(500)).await,
        Err(Cc110xError::TryAgain(_))
    ));

    let h = listening_radio().await;
    h.radio.sleep().await.unwrap();
    assert!(matches!(
        h.radio.set_wor(Duration::from_millis(500)).await,
        Err(Cc110xError::TryAgain(_))
    ));
}

#[tokio::test]
async fn test_frame_ends_wor() {
    let mut h = listening_radio().await;
    h.radio.set_wor(Duration::from_millis(200)).await.unwrap();

    h.air_frame(&[3, 0x01, 0x02, 0x42], true).await;
    assert_eq!(h.next_event(), Some(RadioEvent::FrameReady { len: 1 }));
    let mut buf = [0u8; 4];
    assert_eq!(h.radio.recv(&mut buf).await.unwrap(), 1);
    assert_eq!(buf[0], 0x42);

    assert_eq!(h.radio.state(), State::Listening);
    assert_eq!(h.chip.hw_state(), HwState::Rx);
    assert_eq!(h.chip.register(REG_MCSM2), BASE_CONFIG[REG_MCSM2 as usize]);
    assert_eq!(h.chip.register(REG_MCSM0), BASE_CONFIG[REG_MCSM0 as usize]);
    assert_eq!(h.chip.register(REG_WORCTRL), BASE_CONFIG[REG_WORCTRL as usize]);
    assert_eq!(h.chip.patable(), PaTable::EU_868MHZ.0);
}

#[tokio::test]
async fn test_spurious_edge_ends_wor() {
    let h = listening_radio().await;
    h.radio.set_wor(Duration::from_millis(200)).await.unwrap();

    h.radio.handle_irq(GdoLine::Gdo0).await.unwrap();
    assert_eq!(h.radio.state(), State::Listening);
    assert!(!h.chip.is_wor());
    assert_eq!(h.chip.hw_state(), HwState::Rx);
    assert_eq!(h.chip.register(REG_MCSM0), BASE_CONFIG[REG_MCSM0 as usize]);
}

#[tokio::test]
async fn test_wakeup_ends_wor() {
    let params = Cc110xParams {
        channel: 4,
        ..test_params()
    };
    let mut h = listening_radio_with(MockChip::new(), params).await;
    h.radio.set_wor(Duration::from_secs(2)).await.unwrap();
    assert_eq!(h.chip.patable()[1..], [0u8; 7]);

    h.radio.wakeup().await.unwrap();
    assert_eq!(h.radio.state(), State::Listening);
    assert!(!h.chip.is_wor());
    assert_eq!(h.chip.hw_state(), HwState::Rx);
    assert_eq!(h.chip.patable(), PaTable::EU_868MHZ.0);
    assert_eq!(h.chip.register(REG_CHANNR), 40);
    assert_eq!(h.chip.register(REG_WORCTRL), BASE_CONFIG[REG_WORCTRL as usize]);

    h.radio.send(&Frame::broadcast(0x01, &b"up"[..])).await.unwrap();
    h.chip.finish_tx();
    h.radio.handle_irq(GdoLine::Gdo0).await.unwrap();
    assert_eq!(h.next_event(), Some(RadioEvent::TxComplete));
}

#[tokio::test]
async fn test_sleep_from_wor() {
    let h = listening_radio().await;
    h.radio.set_wor(Duration::from_millis(200)).await.unwrap();

    h.radio.sleep().await.unwrap();
    assert_eq!(h.radio.state(), State::Off);
    assert!(h.chip.is_powered_down());
    assert!(!h.chip.is_wor());
    assert_eq!(h.chip.register(REG_MCSM0), BASE_CONFIG[REG_MCSM0 as usize]);

    h.radio.wakeup().await.unwrap();
    assert_eq!(h.radio.state(), State::Listening);
}

#[tokio::test]
async fn test_set_tx_power() {
    let h = listening_radio().await;

    h.radio.set_tx_power(TxPower::Plus10Dbm).await.unwrap();
    assert_eq!(h.chip.register(REG_FREND0), 0x17);
    assert_eq!(h.radio.tx_power().await, TxPower::Plus10Dbm);

    h.radio.set_tx_power(2u8).await.unwrap();
    assert_eq!(h.radio.tx_power().await, TxPower::Minus15Dbm);

    let transfers = h.chip.transfer_count();
    assert!(matches!(h.radio.set_tx_power(8u8).await, Err(Cc110xError::Range(_))));
    assert_eq!(h.chip.transfer_count(), transfers);
    assert_eq!(h.radio.tx_power().await, TxPower::Minus15Dbm);
}

#[tokio::test]
async fn test_set_tx_power_refused_while_off() {
    let h = listening_radio().await;
    h.radio.sleep().await.unwrap();
    assert!(matches!(
        h.radio.set_tx_power(TxPower::Dbm0).await,
        Err(Cc110xError::TryAgain(_))
    ));
    // Range is checked before the state
    assert!(matches!(h.radio.set_tx_power(9u8).await, Err(Cc110xError::Range(_))));
}

#[tokio::test]
async fn test_init_from_sleep() {
    let h = listening_radio().await;
    h.radio.sleep().await.unwrap();

    h.radio.init().await.unwrap();
    assert_eq!(h.radio.state(), State::Listening);
    assert!(!h.chip.is_powered_down());
    assert_eq!(h.chip.patable(), PaTable::EU_868MHZ.0);
}

#[tokio::test]
async fn test_init_fails_on_bus_error() {
    let chip = MockChip::new();
    chip.fail_next_transfers(1);
    let radio = Cc110x::setup(chip, test_params()).unwrap();
    assert!(matches!(radio.init().await, Err(Cc110xError::Hal(_))));
}

#[tokio::test]
async fn test_params_from_json_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "address": 23,
            "channel": 2,
            "channel_map": [0, 1, 2, 3, 4, 5, 6, 255],
            "tx_power": 7,
            "cca": {{ "max_attempts": 5 }}
        }}"#
    )
    .unwrap();

    let params = Cc110xParams::from_json_file(file.path()).unwrap();
    assert_eq!(params.address, 23);
    assert_eq!(params.channel_map, ChannelMap::ISM_433MHZ);
    assert_eq!(params.tx_power, TxPower::Plus10Dbm);
    assert_eq!(params.cca.max_attempts, 5);
    // Unspecified fields keep their defaults
    assert_eq!(params.cca.rssi_valid_polls, 64);
    assert_eq!(params.pa_table, PaTable::EU_868MHZ);

    let h = listening_radio_with(MockChip::new(), params).await;
    assert_eq!(h.radio.address(), 23);
    assert_eq!(h.chip.register(REG_ADDR), 23);
    assert_eq!(h.radio.channel().await, 2);
    assert_eq!(h.chip.register(REG_CHANNR), 2);
}

#[test]
fn test_params_file_errors() {
    assert!(matches!(
        Cc110xParams::from_json_file("/nonexistent/cc110x.json"),
        Err(Cc110xError::Config(_))
    ));

    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "channel": 7 }}"#).unwrap();
    // Channel 7 exists in the default 868 MHz map
    assert!(Cc110xParams::from_json_file(file.path()).is_ok());

    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "tx_power": 8 }}"#).unwrap();
    assert!(matches!(
        Cc110xParams::from_json_file(file.path()),
        Err(Cc110xError::Config(_))
    ));

    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{ "channel_map": [0, 1, 2, 3, 4, 5, 6, 255], "channel": 7 }}"#).unwrap();
    assert!(matches!(
        Cc110xParams::from_json_file(file.path()),
        Err(Cc110xError::InvalidArgument(_))
    ));
}

#[test]
fn test_params_json_round_trip() {
    let params = Cc110xParams::ism_433mhz();
    let json = params.to_json().unwrap();
    assert_eq!(Cc110xParams::from_json_str(&json).unwrap(), params);
}
