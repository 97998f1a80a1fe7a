//! Update priorities.
//!
//! Lanes are bits in a small set. A lower bit is more urgent, so the most
//! urgent pending lane is always the lowest set bit.

use bitflags::bitflags;

use crate::platform::SchedulerPriority;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Lanes: u32 {
        const SYNC = 1;
        const INPUT_CONTINUOUS = 1 << 1;
        const DEFAULT = 1 << 2;
        const TRANSITION = 1 << 3;
        const IDLE = 1 << 4;
    }
}

/// A single lane. Same representation as a set with one bit.
pub type Lane = Lanes;

impl Lanes {
    pub const NONE: Lanes = Lanes::empty();

    /// Most urgent lane in the set, or [`Lanes::NONE`].
    pub fn highest_priority(self) -> Lane {
        let bits = self.bits();
        Lanes::from_bits_retain(bits & bits.wrapping_neg())
    }

    /// Most urgent lane maps to the most urgent scheduler priority.
    pub fn to_scheduler_priority(self) -> SchedulerPriority {
        let lane = self.highest_priority();
        if lane == Lanes::SYNC {
            SchedulerPriority::Immediate
        } else if lane == Lanes::INPUT_CONTINUOUS {
            SchedulerPriority::UserBlocking
        } else if lane == Lanes::DEFAULT {
            SchedulerPriority::Normal
        } else if lane == Lanes::TRANSITION {
            SchedulerPriority::Low
        } else {
            SchedulerPriority::Idle
        }
    }

    pub fn from_scheduler_priority(priority: SchedulerPriority) -> Lane {
        match priority {
            SchedulerPriority::Immediate => Lanes::SYNC,
            SchedulerPriority::UserBlocking => Lanes::INPUT_CONTINUOUS,
            SchedulerPriority::Normal => Lanes::DEFAULT,
            SchedulerPriority::Low => Lanes::TRANSITION,
            SchedulerPriority::Idle => Lanes::IDLE,
        }
    }

    /// Whether an update issued at `lane` is part of a pass rendering `self`.
    pub fn includes(self, lane: Lane) -> bool {
        !lane.is_empty() && self.contains(lane)
    }
}
