//! Points table for scoring maneuvers.

use crate::graph::{Maneuver, ManeuverSet};

/// Process-wide, read-only.
pub const REWARD_TABLE: [(Maneuver, u32); 6] = [
    (Maneuver::Sweep, 2),
    (Maneuver::Mount, 4),
    (Maneuver::Back, 4),
    (Maneuver::Throw, 2),
    (Maneuver::Takedown, 2),
    (Maneuver::Pass, 3),
];

impl Maneuver {
    pub fn points(self) -> u32 {
        REWARD_TABLE
            .iter()
            .find(|(m, _)| *m == self)
            .map(|(_, p)| *p)
            .unwrap_or(0)
    }
}

/// Sum (not max) over every maneuver flag set on a transition.
pub fn points_for(maneuvers: ManeuverSet) -> u32 {
    REWARD_TABLE
        .iter()
        .filter(|(m, _)| maneuvers.contains(*m))
        .map(|(_, p)| p)
        .sum()
}
