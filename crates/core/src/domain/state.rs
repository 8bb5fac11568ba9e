use super::result::ProcessingStatus;

/// Lifecycle of one repository inside a run:
/// `Discovered -> Validating -> {Skipped | Processing -> {Success | Failed}}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoState {
    Discovered,
    Validating,
    Processing,
    Skipped,
    Success,
    Failed,
}

impl RepoState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RepoState::Skipped | RepoState::Success | RepoState::Failed)
    }

    pub fn can_transition_to(&self, next: RepoState) -> bool {
        use RepoState::*;
        matches!(
            (self, next),
            (Discovered, Validating)
                | (Discovered, Skipped)
                | (Validating, Skipped)
                | (Validating, Processing)
                | (Processing, Success)
                | (Processing, Failed)
        )
    }

    /// Move to `next`, or report the illegal transition.
    pub fn advance(&mut self, next: RepoState) -> Result<(), InvalidTransition> {
        if !self.can_transition_to(next) {
            return Err(InvalidTransition { from: *self, to: next });
        }
        *self = next;
        Ok(())
    }

    pub fn status(&self) -> Option<ProcessingStatus> {
        match self {
            RepoState::Skipped => Some(ProcessingStatus::Skipped),
            RepoState::Success => Some(ProcessingStatus::Success),
            RepoState::Failed => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid repository state transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: RepoState,
    pub to: RepoState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let mut state = RepoState::Discovered;
        state.advance(RepoState::Validating).unwrap();
        state.advance(RepoState::Processing).unwrap();
        state.advance(RepoState::Success).unwrap();
        assert!(state.is_terminal());
        assert_eq!(state.status(), Some(ProcessingStatus::Success));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [RepoState::Skipped, RepoState::Success, RepoState::Failed] {
            for next in [
                RepoState::Discovered,
                RepoState::Validating,
                RepoState::Processing,
                RepoState::Skipped,
                RepoState::Success,
                RepoState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_cannot_skip_validation() {
        let mut state = RepoState::Discovered;
        let err = state.advance(RepoState::Processing).unwrap_err();
        assert_eq!(err.from, RepoState::Discovered);
        assert_eq!(state, RepoState::Discovered);
    }
}
