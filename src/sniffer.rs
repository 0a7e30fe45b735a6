//! Break/MAB timing sniffer.
//!
//! Measures the break and mark-after-break durations of traffic on the bus
//! purely by timestamping edges on a GPIO wired to the RX line. The edge
//! ISR calls [`Sniffer::on_edge`]; measurements come out of a fixed-depth
//! queue on the consumer side. The sniffer only ever writes its own state,
//! never the driver's.
//!
//! ```ignore
//! static SNIFFER: CriticalSectionCell<Sniffer> = CriticalSectionCell::new(Sniffer::new());
//!
//! #[handler]
//! fn gpio_isr() {
//!     let level = /* read pin */;
//!     SNIFFER.with(|s| s.on_edge(level, now_us()));
//! }
//! ```

use heapless::spsc::Queue;

use crate::constants::DMX_SLOT_TIME_US;

/// One measured frame preamble.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SnifferMetadata {
    /// Measured break duration in microseconds
    pub break_us: u32,
    /// Measured mark-after-break duration in microseconds
    pub mab_us: u32,
}

/// Edge-timing state machine measuring break and MAB lengths.
///
/// A low pulse longer than one slot time is taken as a break; anything
/// shorter is data. The measurement completes on the falling edge that
/// follows the MAB (the start bit of the start code).
pub struct Sniffer<const DEPTH: usize = 8> {
    in_low_pulse: bool,
    break_us: Option<u32>,
    last_pos_edge_ts: u64,
    last_neg_edge_ts: u64,
    queue: Queue<SnifferMetadata, DEPTH>,
}

impl<const DEPTH: usize> Sniffer<DEPTH> {
    /// Create an idle sniffer. Const-compatible.
    pub const fn new() -> Self {
        Self {
            in_low_pulse: false,
            break_us: None,
            last_pos_edge_ts: 0,
            last_neg_edge_ts: 0,
            queue: Queue::new(),
        }
    }

    /// Feed one edge: `level` is the line state after the edge.
    ///
    /// Call from the GPIO edge ISR with a microsecond timestamp.
    pub fn on_edge(&mut self, level: bool, now_us: u64) {
        if level {
            // rising edge: a low pulse just ended
            if self.in_low_pulse {
                let low = now_us.saturating_sub(self.last_neg_edge_ts) as u32;
                if low > DMX_SLOT_TIME_US {
                    self.break_us = Some(low);
                } else {
                    // data bits, not a break
                    self.break_us = None;
                }
                self.in_low_pulse = false;
            }
            self.last_pos_edge_ts = now_us;
        } else {
            // falling edge: measurement window for the MAB closes here
            if let Some(break_us) = self.break_us.take() {
                let mab_us = now_us.saturating_sub(self.last_pos_edge_ts) as u32;
                let _ = self.queue.enqueue(SnifferMetadata { break_us, mab_us });
            }
            self.in_low_pulse = true;
            self.last_neg_edge_ts = now_us;
        }
    }

    /// Pop the oldest measurement, if any.
    pub fn take(&mut self) -> Option<SnifferMetadata> {
        self.queue.dequeue()
    }

    /// Number of measurements waiting.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// `true` when no measurement is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<const DEPTH: usize> Default for Sniffer<DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}
