/// A move the agent can make.
///
/// The network output at index `i` votes for `Action::ALL[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Action {
    #[display("runleft")]
    RunLeft,
    #[display("right")]
    Right,
    #[display("runright")]
    RunRight,
    #[display("runjumpright")]
    RunJumpRight,
}

impl Action {
    pub const ALL: [Self; 4] = [Self::RunLeft, Self::Right, Self::RunRight, Self::RunJumpRight];

    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Number of frames the buttons are held for one step.
    ///
    /// Jumps are held longer so the agent gets enough air to clear a gap.
    #[must_use]
    pub fn hold_frames(self) -> u32 {
        match self {
            Self::RunJumpRight => 8,
            Self::RunLeft | Self::Right | Self::RunRight => 4,
        }
    }

    /// Horizontal speed in pixels per frame.
    #[must_use]
    pub fn speed(self) -> f64 {
        match self {
            Self::RunLeft => -3.0,
            Self::Right => 1.5,
            Self::RunRight | Self::RunJumpRight => 3.0,
        }
    }

    #[must_use]
    pub fn jumps(self) -> bool {
        matches!(self, Self::RunJumpRight)
    }
}
