//! # CC110x Device Manager
//!
//! Owns every transceiver of an application, indexed in configuration order,
//! together with their interrupt workers. Devices are shared as
//! `Arc<Cc110x<H>>` so application tasks can hold on to them.

use crate::error::Cc110xError;
use crate::radio::device::Cc110x;
use crate::radio::hal::Hal;
use crate::radio::irq::IrqWorker;
use crate::radio::params::Cc110xParams;
use log::{error, info, warn};
use std::sync::Arc;

/// Arena of CC110x devices
pub struct Cc110xManager<H: Hal + 'static> {
    devices: Vec<Arc<Cc110x<H>>>,
    workers: Vec<IrqWorker>,
}

impl<H: Hal + 'static> Cc110xManager<H> {
    /// Set up one device per `(hal, params)` pair. Fails on the first invalid
    /// parameter set without touching any hardware.
    pub fn new(configs: impl IntoIterator<Item = (H, Cc110xParams)>) -> Result<Self, Cc110xError> {
        let devices = configs
            .into_iter()
            .enumerate()
            .map(|(index, (hal, params))| {
                Cc110x::setup(hal, params).map(Arc::new).map_err(|e| {
                    error!("CC110x #{}: setup failed: {}", index, e);
                    e
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            devices,
            workers: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Cc110x<H>>> {
        self.devices.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Cc110x<H>>> {
        self.devices.iter()
    }

    /// Initialise every device in order
    pub async fn init_all(&self) -> Result<(), Cc110xError> {
        for (index, device) in self.devices.iter().enumerate() {
            device.init().await.map_err(|e| {
                error!("CC110x #{}: init failed: {}", index, e);
                e
            })?;
        }
        info!("CC110x: {} devices initialised", self.devices.len());
        Ok(())
    }

    /// Spawn an interrupt worker for every device that has none yet.
    /// Returns the number of workers started.
    pub fn start_workers(&mut self) -> usize {
        let mut started = 0;
        for (index, device) in self.devices.iter().enumerate() {
            match IrqWorker::spawn(device.clone()) {
                Some(worker) => {
                    self.workers.push(worker);
                    started += 1;
                }
                None => warn!("CC110x #{}: interrupt worker already running", index),
            }
        }
        started
    }

    /// Stop all workers and power every device down
    pub async fn shutdown(&mut self) -> Result<(), Cc110xError> {
        for worker in self.workers.drain(..) {
            worker.stop().await;
        }
        let mut result = Ok(());
        for (index, device) in self.devices.iter().enumerate() {
            if let Err(e) = device.sleep().await {
                error!("CC110x #{}: sleep failed: {}", index, e);
                result = Err(e);
            }
        }
        result
    }
}
