//! # Raspberry Pi HAL Implementation
//!
//! CC1101 module on the Raspberry Pi SPI header, using `rppal` for SPI and
//! the GDO interrupt lines.
//!
//! ## Wiring (BCM numbering, defaults of [`RpiHalConfig`])
//!
//! ```text
//! Pi Pin │ BCM GPIO │ CC1101 Pin │ Function
//! ───────┼──────────┼────────────┼─────────────
//! 19     │ GPIO 10  │ SI         │ SPI data out
//! 21     │ GPIO 9   │ SO (GDO1)  │ SPI data in
//! 23     │ GPIO 11  │ SCLK       │ SPI clock
//! 24     │ GPIO 8   │ CSn        │ Chip select
//! 18     │ GPIO 24  │ GDO0       │ Sync word / end of packet
//! 22     │ GPIO 25  │ GDO2       │ FIFO threshold / CCA
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cc110x_rs::radio::hal::{RaspberryPiHal, RpiHalConfig};
//! use cc110x_rs::{Cc110x, Cc110xParams, IrqWorker};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let hal = RaspberryPiHal::new(&RpiHalConfig::default())?;
//! let radio = Arc::new(Cc110x::setup(hal, Cc110xParams::default())?);
//! let handle = radio.irq_handle();
//! radio.with_hal(|hal| hal.attach_irq(handle)).await?;
//! radio.init().await?;
//! let _worker = IrqWorker::spawn(radio.clone());
//! # Ok(())
//! # }
//! ```

use crate::radio::hal::{Hal, HalError};
use crate::radio::irq::{GdoLine, IrqHandle};
use log::{error, info, trace};
use rppal::gpio::{Gpio, InputPin, Trigger};
use rppal::spi::{BitOrder, Bus, Mode, SlaveSelect, Spi};
use serde::{Deserialize, Serialize};

/// SPI and GPIO assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpiHalConfig {
    /// SPI controller (0 or 1)
    pub spi_bus: u8,
    /// Chip select line of the controller (0 to 2)
    pub chip_select: u8,
    /// SPI clock in Hz; the CC1101 allows 6.5 MHz for burst access
    pub clock_hz: u32,
    /// BCM pin of GDO0
    pub gdo0_pin: u8,
    /// BCM pin of GDO2
    pub gdo2_pin: u8,
}

impl Default for RpiHalConfig {
    fn default() -> Self {
        Self {
            spi_bus: 0,
            chip_select: 0,
            clock_hz: 5_000_000,
            gdo0_pin: 24,
            gdo2_pin: 25,
        }
    }
}

/// CC1101 attached to the Raspberry Pi SPI header
pub struct RaspberryPiHal {
    spi: Spi,
    gdo0: InputPin,
    gdo2: InputPin,
    config: RpiHalConfig,
}

impl RaspberryPiHal {
    pub fn new(config: &RpiHalConfig) -> Result<Self, HalError> {
        let bus = match config.spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            other => {
                return Err(HalError::InvalidConfig(format!(
                    "Invalid SPI bus {}, only 0 and 1 are supported",
                    other
                )))
            }
        };
        let slave_select = match config.chip_select {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => {
                return Err(HalError::InvalidConfig(format!(
                    "Invalid chip select {}",
                    other
                )))
            }
        };

        let spi = Spi::new(bus, slave_select, config.clock_hz, Mode::Mode0).map_err(|e| {
            error!("SPI initialization failed: {}", e);
            HalError::Spi
        })?;
        spi.set_bit_order(BitOrder::MsbFirst).map_err(|_| HalError::Spi)?;

        let gpio = Gpio::new().map_err(|e| {
            error!("GPIO initialization failed: {}", e);
            HalError::Gpio
        })?;
        let gdo0 = gpio.get(config.gdo0_pin).map_err(|_| HalError::Gpio)?.into_input();
        let gdo2 = gpio.get(config.gdo2_pin).map_err(|_| HalError::Gpio)?.into_input();

        info!(
            "CC110x Raspberry Pi HAL: SPI{}.{} at {} Hz, GDO0 GPIO {}, GDO2 GPIO {}",
            config.spi_bus, config.chip_select, config.clock_hz, config.gdo0_pin, config.gdo2_pin
        );

        Ok(Self {
            spi,
            gdo0,
            gdo2,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &RpiHalConfig {
        &self.config
    }

    /// Forward GDO edges to the driver. GDO0 reports the end of a packet
    /// (falling edge of the sync word signal); GDO2 switches between the RX
    /// threshold (rising) and the TX threshold (falling), so both edges count.
    pub fn attach_irq(&mut self, handle: IrqHandle) -> Result<(), HalError> {
        let gdo0_handle = handle.clone();
        self.gdo0
            .set_async_interrupt(Trigger::FallingEdge, move |_level| {
                gdo0_handle.signal(GdoLine::Gdo0);
            })
            .map_err(|e| {
                error!("GDO0 interrupt setup failed: {}", e);
                HalError::Gpio
            })?;
        self.gdo2
            .set_async_interrupt(Trigger::Both, move |_level| {
                handle.signal(GdoLine::Gdo2);
            })
            .map_err(|e| {
                error!("GDO2 interrupt setup failed: {}", e);
                HalError::Gpio
            })?;
        Ok(())
    }

    pub fn detach_irq(&mut self) -> Result<(), HalError> {
        self.gdo0.clear_async_interrupt().map_err(|_| HalError::Gpio)?;
        self.gdo2.clear_async_interrupt().map_err(|_| HalError::Gpio)?;
        Ok(())
    }
}

impl Hal for RaspberryPiHal {
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        let write = buf.to_vec();
        match self.spi.transfer(buf, &write) {
            Ok(_) => {
                trace!("SPI transfer 0x{:02X}, {} bytes", write[0], write.len());
                Ok(())
            }
            Err(e) => {
                error!("SPI transfer failed: {}", e);
                Err(HalError::Spi)
            }
        }
    }

    fn wake(&mut self) -> Result<(), HalError> {
        // Any access pulls CSn low, which starts the crystal; the reply is
        // meaningless until the chip reports ready.
        let mut nop = [crate::constants::STROBE_SNOP];
        self.spi.transfer(&mut nop, &[crate::constants::STROBE_SNOP]).map_err(|e| {
            error!("SPI wake transfer failed: {}", e);
            HalError::Spi
        })?;
        Ok(())
    }
}
