use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Whether a batch session is currently processing videos
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RunState {
    /// Queue and output folder may be edited
    Idle,

    /// A batch is running; queue and output folder are frozen
    Running,
}

/// Shared Idle/Running flag gating every mutating queue operation.
///
/// Cloning yields another handle to the same flag, so the control side and the
/// batch task observe a single state.
#[derive(Debug, Clone, Default)]
pub struct RunFlag {
    running: Arc<AtomicBool>,
}

impl RunFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RunState {
        if self.running.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Transition Idle -> Running. Returns false if a run is already active.
    pub fn try_begin(&self) -> bool {
        let began = self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        debug!("Run flag try_begin: {}", began);
        began
    }

    /// Transition back to Idle
    pub fn finish(&self) {
        self.running.store(false, Ordering::Release);
        debug!("Run flag reset to Idle");
    }

    /// Hold the Running state until the returned guard is dropped.
    pub fn guard(&self) -> RunGuard {
        RunGuard { flag: self.clone() }
    }
}

/// Resets the flag to Idle on drop, even if the batch task unwinds.
#[derive(Debug)]
pub struct RunGuard {
    flag: RunFlag,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_starts_idle() {
        let flag = RunFlag::new();
        assert_eq!(flag.state(), RunState::Idle);
        assert!(!flag.is_running());
    }

    #[test]
    fn test_only_one_run_can_begin() {
        let flag = RunFlag::new();
        let other = flag.clone();

        assert!(flag.try_begin());
        assert!(!other.try_begin());
        assert_eq!(other.state(), RunState::Running);

        other.finish();
        assert_eq!(flag.state(), RunState::Idle);
        assert!(flag.try_begin());
    }

    #[test]
    fn test_guard_resets_on_drop() {
        let flag = RunFlag::new();
        assert!(flag.try_begin());
        {
            let _guard = flag.guard();
            assert!(flag.is_running());
        }
        assert!(!flag.is_running());
    }
}
