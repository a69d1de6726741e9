use std::fmt;

use serde::{Deserialize, Serialize};

/// Phases of a single run.
///
/// A run flows: UNINITIALIZED → BOOTSTRAPPED → JOBS_DISCOVERED → FETCHED → PATCHED
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Uninitialized,
    Bootstrapped,
    JobsDiscovered,
    Fetched,
    Patched,
}

impl Phase {
    /// The phase that directly follows this one, if any.
    pub fn successor(self) -> Option<Phase> {
        match self {
            Phase::Uninitialized => Some(Phase::Bootstrapped),
            Phase::Bootstrapped => Some(Phase::JobsDiscovered),
            Phase::JobsDiscovered => Some(Phase::Fetched),
            Phase::Fetched => Some(Phase::Patched),
            Phase::Patched => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Uninitialized => write!(f, "UNINITIALIZED"),
            Phase::Bootstrapped => write!(f, "BOOTSTRAPPED"),
            Phase::JobsDiscovered => write!(f, "JOBS_DISCOVERED"),
            Phase::Fetched => write!(f, "FETCHED"),
            Phase::Patched => write!(f, "PATCHED"),
        }
    }
}

/// The result of asking the machine to enter a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Moved forward into the requested phase.
    Advanced(Phase),
    /// The requested phase was already reached; results are memoized.
    AlreadyReached(Phase),
    /// The requested phase is not the direct successor of the current one.
    Rejected { from: Phase, to: Phase },
}

/// Tracks where a run is and how it got there.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    current: Phase,
    history: Vec<Phase>,
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self {
            current: Phase::Uninitialized,
            history: Vec::new(),
        }
    }
}

impl PhaseMachine {
    pub fn current(&self) -> Phase {
        self.current
    }

    /// Phases left behind, oldest first.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Move into `target`.
    ///
    /// - Reaching `target` again (or anything before the current phase) is a
    ///   no-op reported as `AlreadyReached`.
    /// - Only the direct successor is accepted; skipping phases is `Rejected`.
    pub fn advance(&mut self, target: Phase) -> Transition {
        if target <= self.current {
            return Transition::AlreadyReached(self.current);
        }
        if self.current.successor() != Some(target) {
            return Transition::Rejected {
                from: self.current,
                to: target,
            };
        }
        self.history.push(self.current);
        self.current = target;
        Transition::Advanced(target)
    }
}
