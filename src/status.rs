//! The tri-state execution status every node and edge communicates in.

/// Outcome of one step of a process or one pipeline cycle.
///
/// The three values form a small lattice used when aggregating the statuses
/// of several upstream nodes feeding one consumer: `Failure` dominates
/// `Skip`, which dominates `Success`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StepStatus {
    /// The unit of work ran and produced valid output this cycle.
    #[default]
    Success,
    /// The unit of work could not run or produced no valid output.
    ///
    /// Propagates to block required dependents unless recovered.
    Failure,
    /// The unit of work intentionally did not run this cycle.
    ///
    /// Not an error: dependents downstream of a skip may still run if they
    /// do not strictly require this node's fresh output.
    Skip,
}

impl StepStatus {
    /// Combine two statuses under the dominance ordering.
    ///
    /// `Failure` wins over `Skip`, which wins over `Success`.
    #[inline]
    pub fn combine(self, other: StepStatus) -> StepStatus {
        match (self, other) {
            (StepStatus::Failure, _) | (_, StepStatus::Failure) => StepStatus::Failure,
            (StepStatus::Skip, _) | (_, StepStatus::Skip) => StepStatus::Skip,
            _ => StepStatus::Success,
        }
    }

    /// Fold an iterator of statuses with [`combine`](Self::combine).
    ///
    /// An empty iterator yields `Success` (no upstream constraints).
    pub fn combine_all<I: IntoIterator<Item = StepStatus>>(statuses: I) -> StepStatus {
        statuses
            .into_iter()
            .fold(StepStatus::Success, StepStatus::combine)
    }

    /// Check for `Success`.
    #[inline]
    pub fn is_success(self) -> bool {
        self == StepStatus::Success
    }

    /// Check for `Failure`.
    #[inline]
    pub fn is_failure(self) -> bool {
        self == StepStatus::Failure
    }

    /// Check for `Skip`.
    #[inline]
    pub fn is_skip(self) -> bool {
        self == StepStatus::Skip
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepStatus::Success => "success",
            StepStatus::Failure => "failure",
            StepStatus::Skip => "skip",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_dominates() {
        assert_eq!(
            StepStatus::Failure.combine(StepStatus::Success),
            StepStatus::Failure
        );
        assert_eq!(
            StepStatus::Failure.combine(StepStatus::Skip),
            StepStatus::Failure
        );
        assert_eq!(
            StepStatus::Skip.combine(StepStatus::Failure),
            StepStatus::Failure
        );
    }

    #[test]
    fn test_skip_dominates_success() {
        assert_eq!(
            StepStatus::Skip.combine(StepStatus::Success),
            StepStatus::Skip
        );
        assert_eq!(
            StepStatus::Success.combine(StepStatus::Skip),
            StepStatus::Skip
        );
    }

    #[test]
    fn test_success_is_identity() {
        assert_eq!(
            StepStatus::Success.combine(StepStatus::Success),
            StepStatus::Success
        );
    }

    #[test]
    fn test_combine_all() {
        assert_eq!(StepStatus::combine_all([]), StepStatus::Success);
        assert_eq!(
            StepStatus::combine_all([StepStatus::Success, StepStatus::Skip, StepStatus::Success]),
            StepStatus::Skip
        );
        assert_eq!(
            StepStatus::combine_all([StepStatus::Skip, StepStatus::Failure]),
            StepStatus::Failure
        );
    }
}
