//! Adapts a [`CongestionController`] to quinn's controller interface.
//!
//! The reference rate lives in a shared cell so the session can re-rate every
//! controller after the server hello without reaching into quinn.

use crate::congestion::{CongestionController, CongestionFactory};
use quinn::congestion::{Controller, ControllerFactory};
use quinn_proto::RttEstimator;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared reference rate in bytes per second.
pub(crate) type RateCell = Arc<AtomicU64>;

pub(crate) struct BridgeFactory {
    factory: CongestionFactory,
    rate: RateCell,
}

impl BridgeFactory {
    pub(crate) fn new(factory: CongestionFactory, rate: RateCell) -> Self {
        Self { factory, rate }
    }
}

impl fmt::Debug for BridgeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeFactory")
            .field("rate", &self.rate.load(Ordering::Relaxed))
            .finish()
    }
}

impl ControllerFactory for BridgeFactory {
    fn build(self: Arc<Self>, _now: Instant, current_mtu: u16) -> Box<dyn Controller> {
        let applied = self.rate.load(Ordering::Relaxed);
        let mut inner = (self.factory)(applied);
        inner.on_mtu_update(current_mtu);
        Box::new(BridgeController {
            inner,
            rate: self.rate.clone(),
            applied,
        })
    }
}

struct BridgeController {
    inner: Box<dyn CongestionController>,
    rate: RateCell,
    applied: u64,
}

impl BridgeController {
    fn sync_rate(&mut self) {
        let current = self.rate.load(Ordering::Relaxed);
        if current != self.applied {
            self.inner.set_rate(current);
            self.applied = current;
        }
    }
}

impl Controller for BridgeController {
    fn on_ack(
        &mut self,
        now: Instant,
        _sent: Instant,
        bytes: u64,
        _app_limited: bool,
        rtt: &RttEstimator,
    ) {
        self.sync_rate();
        self.inner.on_ack(now, bytes, rtt.get());
    }

    fn on_congestion_event(
        &mut self,
        now: Instant,
        _sent: Instant,
        _is_persistent_congestion: bool,
        lost_bytes: u64,
    ) {
        self.sync_rate();
        self.inner.on_loss(now, lost_bytes);
    }

    fn on_mtu_update(&mut self, new_mtu: u16) {
        self.inner.on_mtu_update(new_mtu);
    }

    fn window(&self) -> u64 {
        self.inner.window()
    }

    fn clone_box(&self) -> Box<dyn Controller> {
        Box::new(BridgeController {
            inner: self.inner.clone_box(),
            rate: self.rate.clone(),
            applied: self.applied,
        })
    }

    fn initial_window(&self) -> u64 {
        self.inner.initial_window()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}
