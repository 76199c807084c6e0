// ABOUTME: Stages of a deployment run and the state a run has reached.
// ABOUTME: Stages advance strictly in order; any stage can end in Failed.

use std::fmt;

/// One step of a deployment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Validating,
    RunningBeforeHooks,
    Copying,
    RunningAfterHooks,
    Pruning,
    Promoting,
}

impl Stage {
    /// The stage that follows this one, `None` after promotion.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Validating => Some(Stage::RunningBeforeHooks),
            Stage::RunningBeforeHooks => Some(Stage::Copying),
            Stage::Copying => Some(Stage::RunningAfterHooks),
            Stage::RunningAfterHooks => Some(Stage::Pruning),
            Stage::Pruning => Some(Stage::Promoting),
            Stage::Promoting => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::RunningBeforeHooks => "running before hooks",
            Stage::Copying => "copying",
            Stage::RunningAfterHooks => "running after hooks",
            Stage::Pruning => "pruning",
            Stage::Promoting => "promoting",
        };
        f.write_str(name)
    }
}

/// Where a deployment run is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    /// Not started.
    Pending,
    Running(Stage),
    Done,
    /// Stopped in the given stage.
    Failed(Stage),
}

impl DeployState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeployState::Done | DeployState::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_order() {
        let mut stage = Stage::Validating;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(stage, Stage::Promoting);
    }

    #[test]
    fn terminal_states() {
        assert!(!DeployState::Pending.is_terminal());
        assert!(!DeployState::Running(Stage::Copying).is_terminal());
        assert!(DeployState::Done.is_terminal());
        assert!(DeployState::Failed(Stage::Pruning).is_terminal());
    }
}
