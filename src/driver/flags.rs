//! Driver state flags shared between task-level code and the ISRs.
//!
//! Every flag here is read and written under the port's critical section.
//! The `RDM_*` group classifies the frame currently in the driver buffer
//! and is rewritten by `send` each time a frame is classified.

use core::ops::{BitOr, BitOrAssign};

/// Bitset of driver and RDM classification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DriverFlags(u16);

impl DriverFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// An outbound frame is in flight (break, MAB, or data phase).
    pub const IS_SENDING: Self = Self(1 << 0);
    /// The outbound frame is currently in its break or MAB phase.
    pub const IS_IN_BREAK: Self = Self(1 << 1);
    /// A complete received frame is waiting in the buffer.
    pub const HAS_DATA: Self = Self(1 << 2);
    /// The most recent bus activity was a frame this port sent.
    pub const SENT_LAST: Self = Self(1 << 3);
    /// The hardware timer is armed.
    pub const TIMER_RUNNING: Self = Self(1 << 4);
    /// An RS-485 collision was observed during the last send.
    pub const COLLIDED: Self = Self(1 << 5);

    /// The buffered frame is a well-formed RDM message.
    pub const RDM_VALID: Self = Self(1 << 8);
    /// The buffered RDM message is a request (controller-to-responder).
    pub const RDM_REQUEST: Self = Self(1 << 9);
    /// The buffered RDM message is addressed to a broadcast UID.
    pub const RDM_BROADCAST: Self = Self(1 << 10);
    /// The buffered RDM message is a DISC_UNIQUE_BRANCH request.
    pub const RDM_DISC_UNIQUE_BRANCH: Self = Self(1 << 11);

    /// All `RDM_*` classification flags.
    pub const RDM_CLASS: Self = Self(
        Self::RDM_VALID.0
            | Self::RDM_REQUEST.0
            | Self::RDM_BROADCAST.0
            | Self::RDM_DISC_UNIQUE_BRANCH.0,
    );

    /// `true` when every flag in `other` is set.
    #[inline(always)]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// `true` when at least one flag in `other` is set.
    #[inline(always)]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    /// Set the flags in `other`.
    #[inline(always)]
    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clear the flags in `other`.
    #[inline(always)]
    pub fn clear(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Set or clear the flags in `other` depending on `value`.
    #[inline(always)]
    pub fn assign(&mut self, other: Self, value: bool) {
        if value {
            self.set(other);
        } else {
            self.clear(other);
        }
    }
}

impl BitOr for DriverFlags {
    type Output = Self;

    #[inline(always)]
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DriverFlags {
    #[inline(always)]
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
