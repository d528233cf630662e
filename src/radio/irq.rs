//! # Interrupt Handoff
//!
//! Edges on GDO0/GDO2 never touch the bus. Platform code calls
//! [`IrqHandle::signal`] from its interrupt callback; the gate closes (further
//! edges are ignored) and the edge is queued on a bounded channel. An
//! [`IrqWorker`] task receives it, runs [`Cc110x::handle_irq`] under the bus
//! lock and the driver reopens the gate when its new state listens to the
//! lines again.

use crate::radio::device::Cc110x;
use crate::radio::hal::Hal;
use log::{debug, error, info, trace};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Capacity of the edge queue between interrupt context and worker
pub const IRQ_QUEUE_DEPTH: usize = 4;

/// Signal line an edge arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GdoLine {
    Gdo0,
    Gdo2,
}

/// Enable flag for both signal lines plus the queue towards the worker
#[derive(Debug)]
pub struct IrqGate {
    enabled: AtomicBool,
    queue: mpsc::Sender<GdoLine>,
}

impl IrqGate {
    pub(crate) fn new(queue: mpsc::Sender<GdoLine>) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            queue,
        }
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn signal(&self, line: GdoLine) -> bool {
        if !self.enabled.swap(false, Ordering::AcqRel) {
            trace!("CC110x: {:?} edge while masked", line);
            return false;
        }
        if self.queue.try_send(line).is_err() {
            // Worker gone or lagging; leave the lines enabled for the next edge
            self.enable();
            return false;
        }
        true
    }
}

/// Cloneable handle given to interrupt callbacks
#[derive(Debug, Clone)]
pub struct IrqHandle {
    gate: Arc<IrqGate>,
}

impl IrqHandle {
    pub(crate) fn new(gate: Arc<IrqGate>) -> Self {
        Self { gate }
    }

    /// Report an edge. Returns false when the lines are masked and the edge
    /// was dropped.
    pub fn signal(&self, line: GdoLine) -> bool {
        self.gate.signal(line)
    }
}

/// Task serving the edges of one device
pub struct IrqWorker {
    handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl IrqWorker {
    /// Spawn the worker. Each device has a single edge queue, so a second
    /// worker for the same device is refused.
    pub fn spawn<H: Hal + 'static>(device: Arc<Cc110x<H>>) -> Option<Self> {
        let mut edges = device.take_irq_receiver()?;
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            info!("CC110x: interrupt worker started");
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("CC110x: interrupt worker shutdown requested");
                        break;
                    }
                    edge = edges.recv() => {
                        let Some(line) = edge else { break };
                        if let Err(e) = device.handle_irq(line).await {
                            error!("CC110x: interrupt handling failed: {}", e);
                        }
                    }
                }
            }
            info!("CC110x: interrupt worker stopped");
        });

        Some(Self {
            handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Stop the worker and wait for it to finish the edge in progress
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            error!("CC110x: interrupt worker panicked: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
