//! # CC110x Register Definitions and Constants
//!
//! Register addresses, command strobes, status byte layout and signal line
//! (GDO) modes of the TI CC1100/CC1101 transceivers, together with the frame
//! and timing limits the driver works with.
//!
//! ## Address Space
//!
//! - 0x00-0x2E: Configuration registers (read/write, single or burst)
//! - 0x30-0x3D: Command strobes (single byte access) or read-only status
//!   registers (read with the burst bit set)
//! - 0x3E: PATABLE (output power table)
//! - 0x3F: TX FIFO (write) / RX FIFO (read)

use std::time::Duration;

// =============================================================================
// Header Byte Flags
// =============================================================================

/// Read access flag in the header byte
pub const ACCESS_READ: u8 = 0x80;

/// Burst access flag in the header byte
pub const ACCESS_BURST: u8 = 0x40;

/// Address bits of the header byte
pub const ADDRESS_MASK: u8 = 0x3F;

// =============================================================================
// Configuration Registers
// =============================================================================

/// GDO2 output pin configuration
pub const REG_IOCFG2: u8 = 0x00;
/// GDO1 output pin configuration
pub const REG_IOCFG1: u8 = 0x01;
/// GDO0 output pin configuration
pub const REG_IOCFG0: u8 = 0x02;
/// RX FIFO and TX FIFO thresholds
pub const REG_FIFOTHR: u8 = 0x03;
/// Sync word, high byte
pub const REG_SYNC1: u8 = 0x04;
/// Sync word, low byte
pub const REG_SYNC0: u8 = 0x05;
/// Maximum packet length
pub const REG_PKTLEN: u8 = 0x06;
/// Packet automation control (address check, status append)
pub const REG_PKTCTRL1: u8 = 0x07;
/// Packet automation control (CRC, length mode)
pub const REG_PKTCTRL0: u8 = 0x08;
/// Device address used for hardware packet filtering
pub const REG_ADDR: u8 = 0x09;
/// Channel number (physical channel)
pub const REG_CHANNR: u8 = 0x0A;
/// Frequency synthesizer control (intermediate frequency)
pub const REG_FSCTRL1: u8 = 0x0B;
/// Frequency synthesizer control (frequency offset)
pub const REG_FSCTRL0: u8 = 0x0C;
/// Base frequency control word, high byte
pub const REG_FREQ2: u8 = 0x0D;
/// Base frequency control word, middle byte
pub const REG_FREQ1: u8 = 0x0E;
/// Base frequency control word, low byte
pub const REG_FREQ0: u8 = 0x0F;
/// Channel filter bandwidth and data rate exponent
pub const REG_MDMCFG4: u8 = 0x10;
/// Data rate mantissa
pub const REG_MDMCFG3: u8 = 0x11;
/// Modem configuration
pub const REG_MDMCFG2: u8 = 0x12;
/// Modem configuration (preamble, channel spacing exponent)
pub const REG_MDMCFG1: u8 = 0x13;
/// Channel spacing mantissa
pub const REG_MDMCFG0: u8 = 0x14;
/// Modem deviation setting
pub const REG_DEVIATN: u8 = 0x15;
/// Main radio control state machine configuration
pub const REG_MCSM2: u8 = 0x16;
/// Main radio control state machine configuration (CCA mode, RX/TX off modes)
pub const REG_MCSM1: u8 = 0x17;
/// Main radio control state machine configuration (autocalibration)
pub const REG_MCSM0: u8 = 0x18;
/// Wake-on-radio event 0 timeout, high byte
pub const REG_WOREVT1: u8 = 0x1C;
/// Wake-on-radio event 0 timeout, low byte
pub const REG_WOREVT0: u8 = 0x1D;
/// Wake-on-radio control (RC oscillator, event 1, resolution)
pub const REG_WORCTRL: u8 = 0x1E;
/// Front end TX configuration (PATABLE index)
pub const REG_FREND0: u8 = 0x22;
/// Frequency synthesizer calibration (channel independent)
pub const REG_FSCAL3: u8 = 0x23;
/// Frequency synthesizer calibration (channel independent)
pub const REG_FSCAL2: u8 = 0x24;
/// Frequency synthesizer calibration (channel dependent)
pub const REG_FSCAL1: u8 = 0x25;
/// Frequency synthesizer calibration control
pub const REG_FSCAL0: u8 = 0x26;
/// Last configuration register
pub const REG_TEST0: u8 = 0x2E;

/// Number of configuration registers (0x00..=0x2E)
pub const CONFIG_REGISTER_COUNT: usize = 0x2F;

// =============================================================================
// Command Strobes
// =============================================================================

/// Reset chip
pub const STROBE_SRES: u8 = 0x30;
/// Enable and calibrate frequency synthesizer (fast TX ready)
pub const STROBE_SFSTXON: u8 = 0x31;
/// Calibrate frequency synthesizer and turn it off
pub const STROBE_SCAL: u8 = 0x33;
/// Enable RX
pub const STROBE_SRX: u8 = 0x34;
/// Enable TX
pub const STROBE_STX: u8 = 0x35;
/// Exit RX/TX, turn off frequency synthesizer
pub const STROBE_SIDLE: u8 = 0x36;
/// Start automatic RX polling (wake-on-radio)
pub const STROBE_SWOR: u8 = 0x38;
/// Enter power down mode when CSn goes high
pub const STROBE_SPWD: u8 = 0x39;
/// Flush the RX FIFO
pub const STROBE_SFRX: u8 = 0x3A;
/// Flush the TX FIFO
pub const STROBE_SFTX: u8 = 0x3B;
/// Reset the wake-on-radio timer to event 1
pub const STROBE_SWORRST: u8 = 0x3C;
/// No operation, returns the status byte
pub const STROBE_SNOP: u8 = 0x3D;

// =============================================================================
// Status Registers (read with the burst bit set)
// =============================================================================

/// Chip part number
pub const REG_PARTNUM: u8 = 0x30;
/// Chip version number
pub const REG_VERSION: u8 = 0x31;
/// Link quality estimate; bit 7 is CRC_OK of the last packet
pub const REG_LQI: u8 = 0x33;
/// Received signal strength indication
pub const REG_RSSI: u8 = 0x34;
/// Main radio control state machine state
pub const REG_MARCSTATE: u8 = 0x35;
/// Current GDOx status and packet status
pub const REG_PKTSTATUS: u8 = 0x38;
/// Underflow flag and number of bytes in the TX FIFO
pub const REG_TXBYTES: u8 = 0x3A;
/// Overflow flag and number of bytes in the RX FIFO
pub const REG_RXBYTES: u8 = 0x3B;

/// PATABLE access address
pub const REG_PATABLE: u8 = 0x3E;
/// FIFO access address
pub const REG_FIFO: u8 = 0x3F;

// =============================================================================
// Status Byte / FIFO Byte Count Fields
// =============================================================================

/// CHIP_RDYn: set while the crystal is not yet stable
pub const STATUS_CHIP_RDYN: u8 = 0x80;
/// Main state field of the status byte
pub const STATUS_STATE_MASK: u8 = 0x70;
/// Shift of the main state field
pub const STATUS_STATE_SHIFT: u8 = 4;
/// Available FIFO bytes field of the status byte
pub const STATUS_FIFO_MASK: u8 = 0x0F;

/// RXBYTES/TXBYTES overflow/underflow flag
pub const FIFO_ERROR_FLAG: u8 = 0x80;
/// RXBYTES/TXBYTES byte count field
pub const FIFO_COUNT_MASK: u8 = 0x7F;

/// CRC_OK flag in the LQI status register
pub const LQI_CRC_OK: u8 = 0x80;
/// Link quality estimate field of the LQI status register
pub const LQI_ESTIMATE_MASK: u8 = 0x7F;

/// MARCSTATE field mask
pub const MARCSTATE_MASK: u8 = 0x1F;

// =============================================================================
// GDO Signal Selection (IOCFGx)
// =============================================================================

/// Asserts when the RX FIFO is filled at or above the threshold or the end of
/// packet is reached
pub const GDO_RX_THRESHOLD_OR_EOP: u8 = 0x01;
/// Asserts when the TX FIFO is filled at or above the threshold, deasserts
/// below it
pub const GDO_TX_THRESHOLD: u8 = 0x02;
/// Asserts when the sync word has been sent/received, deasserts at the end of
/// the packet
pub const GDO_SYNC_WORD: u8 = 0x06;
/// Clear channel assessment: high when RSSI is below threshold
pub const GDO_CCA: u8 = 0x09;
/// Output driven constantly low
pub const GDO_CONSTANT_LOW: u8 = 0x2F;

// =============================================================================
// Register Field Values
// =============================================================================

/// FREND0 with LODIV_BUF_CURRENT_TX at its default; the PATABLE index is ORed in
pub const FREND0_BASE: u8 = 0x10;

/// MCSM0 with FS autocalibration when leaving IDLE, used while polling in
/// wake-on-radio
pub const MCSM0_AUTOCAL: u8 = 0x18;

/// WORCTRL with the RC oscillator running, EVENT1 ~1.3 ms and RC_CAL on;
/// WOR_RES is ORed in
pub const WORCTRL_BASE: u8 = 0x78;

/// Expected PARTNUM of CC1100/CC1101 silicon
pub const CHIP_PARTNUM: u8 = 0x00;
/// VERSION values reported by known CC1101 silicon revisions
pub const CHIP_VERSIONS: [u8; 2] = [0x04, 0x14];

// =============================================================================
// Frame and FIFO Limits
// =============================================================================

/// Hardware FIFO size in bytes (RX and TX FIFO alike)
pub const FIFO_SIZE: usize = 64;

/// Maximum frame size (destination + source + payload), bounded by the length byte
pub const MAX_FRAME_SIZE: usize = 255;

/// Size of the layer 2 header (destination and source address)
pub const L2_HEADER_SIZE: usize = 2;

/// Maximum payload of a single frame
pub const MAX_PAYLOAD_SIZE: usize = MAX_FRAME_SIZE - L2_HEADER_SIZE;

/// Destination address addressing every station
pub const BROADCAST_ADDRESS: u8 = 0x00;

/// Number of virtual channels in a channel map
pub const MAX_CHANNELS: usize = 8;

/// Channel map entry marking a virtual channel unsupported
pub const CHANNEL_UNSUPPORTED: u8 = 0xFF;

/// Number of entries in the PATABLE
pub const PATABLE_SIZE: usize = 8;

// =============================================================================
// Timing
// =============================================================================

/// Frequency synthesizer calibration time (datasheet: ~735 us + margin)
pub const CALIBRATION_SETTLE: Duration = Duration::from_micros(800);

/// Crystal start-up time after waking the chip from power down
pub const WAKEUP_SETTLE: Duration = Duration::from_micros(240);

/// Time to wait after the reset strobe before talking to the chip again
pub const RESET_SETTLE: Duration = Duration::from_micros(100);

/// Status polls before the chip is declared unresponsive after wake up/reset
pub const READY_POLLS: u32 = 100;

/// Delay between two ready polls
pub const READY_POLL_DELAY: Duration = Duration::from_micros(10);

/// Shortest wake-on-radio polling interval: eight times the air time of a
/// maximum size frame plus margin
pub const WOR_INTERVAL_MIN: Duration = Duration::from_millis(41);

/// Longest wake-on-radio polling interval EVENT0 can express
pub const WOR_INTERVAL_MAX: Duration = Duration::from_millis(60_493);

/// Air time of a maximum size frame; the RX window of a wake-on-radio poll
/// must be longer
pub const WOR_FRAME_AIR_TIME: Duration = Duration::from_micros(3800);

// =============================================================================
// Base Register Configuration
// =============================================================================

/// Register values uploaded to 0x00..=0x2E on initialisation.
///
/// Variable packet length with CRC, address check with 0x00 broadcast,
/// manual frequency synthesizer calibration (the driver caches the results),
/// CCA mode "RSSI below threshold unless receiving", RX and TX fall back to IDLE.
/// The band specific entries (FSCTRL1, FREQx, MDMCFG4/3, DEVIATN) are
/// overwritten by `BandConfig` uploads.
pub const BASE_CONFIG: [u8; CONFIG_REGISTER_COUNT] = [
    GDO_CONSTANT_LOW, // IOCFG2
    0x2E,             // IOCFG1: high impedance (shared with SO)
    GDO_CONSTANT_LOW, // IOCFG0
    0x47,             // FIFOTHR: ADC retention, TX 33 / RX 32 bytes
    0xD3,             // SYNC1
    0x91,             // SYNC0
    0xFF,             // PKTLEN
    0x02,             // PKTCTRL1: address check, 0x00 broadcast
    0x45,             // PKTCTRL0: whitening, CRC, variable length
    0x00,             // ADDR
    0x00,             // CHANNR
    0x0C,             // FSCTRL1
    0x00,             // FSCTRL0
    0x21,             // FREQ2
    0x46,             // FREQ1
    0xE4,             // FREQ0
    0x2D,             // MDMCFG4
    0x3B,             // MDMCFG3
    0x13,             // MDMCFG2: GFSK, 30/32 sync bits
    0x22,             // MDMCFG1
    0xF8,             // MDMCFG0
    0x62,             // DEVIATN
    0x07,             // MCSM2
    0x30,             // MCSM1: CCA mode 3, RXOFF/TXOFF -> IDLE
    0x08,             // MCSM0: no autocalibration
    0x1D,             // FOCCFG
    0x1C,             // BSCFG
    0xC7,             // AGCCTRL2
    0x00,             // AGCCTRL1
    0xB0,             // AGCCTRL0
    0x87,             // WOREVT1
    0x6B,             // WOREVT0
    0xFB,             // WORCTRL
    0xB6,             // FREND1
    FREND0_BASE,      // FREND0
    0xEA,             // FSCAL3
    0x2A,             // FSCAL2
    0x00,             // FSCAL1
    0x1F,             // FSCAL0
    0x41,             // RCCTRL1
    0x00,             // RCCTRL0
    0x59,             // FSTEST
    0x7F,             // PTEST
    0x3F,             // AGCTEST
    0x88,             // TEST2
    0x31,             // TEST1
    0x09,             // TEST0
];
