//! Trading-intent signals.
//!
//! A signal series holds one [`SignalIntent`] per bar. The two zero-valued
//! variants exist because producers mean different things by "no signal":
//! crossover strategies emit `Flat` (no directional intent at all) while
//! reversal-filter strategies emit `Hold` (keep whatever position is open).
//! Every consumer treats the two identically; the distinction documents
//! producer semantics at the type level.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_int(self) -> i8 {
        match self {
            Direction::Long => 1,
            Direction::Short => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalIntent {
    Flat,
    Hold,
    Enter(Direction),
}

impl SignalIntent {
    pub fn direction(self) -> Option<Direction> {
        match self {
            SignalIntent::Enter(d) => Some(d),
            SignalIntent::Flat | SignalIntent::Hold => None,
        }
    }

    pub fn as_int(self) -> i8 {
        self.direction().map_or(0, Direction::as_int)
    }

    /// Decode the flat integer form used in exports. The integer form cannot
    /// distinguish `Flat` from `Hold`; zero decodes as `Hold`, which behaves
    /// identically everywhere.
    pub fn from_int(value: i8) -> Option<SignalIntent> {
        match value {
            1 => Some(SignalIntent::Enter(Direction::Long)),
            -1 => Some(SignalIntent::Enter(Direction::Short)),
            0 => Some(SignalIntent::Hold),
            _ => None,
        }
    }
}
