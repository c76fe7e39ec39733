//! Congestion control seam and the Brutal fixed-rate sender.
//!
//! Brutal does not probe for bandwidth. It keeps the window at
//! `rate * rtt * 2 / ack_rate`, so losses raise the window instead of
//! shrinking it, holding the sending rate at the configured reference rate.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Sending-rate algorithm driven by acknowledgement and loss feedback.
pub trait CongestionController: Send + Sync + fmt::Debug {
    fn on_ack(&mut self, now: Instant, bytes: u64, smoothed_rtt: Duration);
    fn on_loss(&mut self, now: Instant, bytes: u64);
    fn on_mtu_update(&mut self, mtu: u16);
    /// Congestion window in bytes.
    fn window(&self) -> u64;
    fn initial_window(&self) -> u64;
    /// Change the reference rate in bytes per second.
    fn set_rate(&mut self, bps: u64);
    fn clone_box(&self) -> Box<dyn CongestionController>;
}

/// Builds a controller bound to a reference rate in bytes per second.
pub type CongestionFactory = Arc<dyn Fn(u64) -> Box<dyn CongestionController> + Send + Sync>;

/// Factory producing [`BrutalSender`]s.
pub fn brutal_factory() -> CongestionFactory {
    Arc::new(|bps| Box::new(BrutalSender::new(bps)) as Box<dyn CongestionController>)
}

const INITIAL_MTU: u16 = 1200;
const MIN_WINDOW_PACKETS: u64 = 10;
const WINDOW_MULTIPLIER: f64 = 2.0;
const MIN_ACK_RATE: f64 = 0.8;
const MIN_SAMPLE_COUNT: u64 = 50;
const SLOT_COUNT: usize = 5;

#[derive(Debug, Clone, Copy)]
struct Slot {
    second: u64,
    acked: u64,
    lost: u64,
}

#[derive(Debug, Clone)]
pub struct BrutalSender {
    bps: u64,
    mtu: u16,
    rtt: Duration,
    epoch: Option<Instant>,
    slots: VecDeque<Slot>,
}

impl BrutalSender {
    pub fn new(bps: u64) -> Self {
        Self {
            bps,
            mtu: INITIAL_MTU,
            rtt: Duration::ZERO,
            epoch: None,
            slots: VecDeque::with_capacity(SLOT_COUNT),
        }
    }

    pub fn rate(&self) -> u64 {
        self.bps
    }

    fn min_window(&self) -> u64 {
        u64::from(self.mtu) * MIN_WINDOW_PACKETS
    }

    fn slot_mut(&mut self, now: Instant) -> &mut Slot {
        let epoch = *self.epoch.get_or_insert(now);
        let second = now.saturating_duration_since(epoch).as_secs();
        let stale = self.slots.back().map_or(true, |s| s.second != second);
        if stale {
            if self.slots.len() == SLOT_COUNT {
                self.slots.pop_front();
            }
            self.slots.push_back(Slot {
                second,
                acked: 0,
                lost: 0,
            });
        }
        // Non-empty: a slot was pushed above when none matched.
        let last = self.slots.len() - 1;
        &mut self.slots[last]
    }

    /// Fraction of packets acknowledged over the sampling window.
    pub fn ack_rate(&self) -> f64 {
        let newest = match self.slots.back() {
            Some(s) => s.second,
            None => return 1.0,
        };
        let (acked, lost) = self
            .slots
            .iter()
            .filter(|s| newest - s.second < SLOT_COUNT as u64)
            .fold((0u64, 0u64), |(a, l), s| (a + s.acked, l + s.lost));
        if acked + lost < MIN_SAMPLE_COUNT {
            return 1.0;
        }
        let rate = acked as f64 / (acked + lost) as f64;
        rate.max(MIN_ACK_RATE)
    }
}

impl CongestionController for BrutalSender {
    fn on_ack(&mut self, now: Instant, _bytes: u64, smoothed_rtt: Duration) {
        self.rtt = smoothed_rtt;
        self.slot_mut(now).acked += 1;
    }

    fn on_loss(&mut self, now: Instant, bytes: u64) {
        let mtu = u64::from(self.mtu.max(1));
        self.slot_mut(now).lost += bytes.div_ceil(mtu).max(1);
    }

    fn on_mtu_update(&mut self, mtu: u16) {
        self.mtu = mtu;
    }

    fn window(&self) -> u64 {
        if self.rtt.is_zero() || self.bps == 0 {
            return self.initial_window();
        }
        let cwnd = self.bps as f64 * self.rtt.as_secs_f64() * WINDOW_MULTIPLIER / self.ack_rate();
        (cwnd as u64).max(self.min_window())
    }

    fn initial_window(&self) -> u64 {
        self.min_window()
    }

    fn set_rate(&mut self, bps: u64) {
        self.bps = bps;
    }

    fn clone_box(&self) -> Box<dyn CongestionController> {
        Box::new(self.clone())
    }
}
