use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub const DEFAULT_UNLOCK_DELAY: Duration = Duration::from_secs(15);

/// Shared "submission in flight" flag the UI binds its spinner to.
///
/// The fixed-delay unlock fires whether or not the job has finished; a polling
/// layer that learns the real outcome should call [`LoadingGate::release`].
#[derive(Debug, Clone, Default)]
pub struct LoadingGate {
    flag: Arc<AtomicBool>,
}

impl LoadingGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engage(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_loading(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears the flag after `delay` on a detached thread. Never cancelled.
    pub fn arm_unlock(&self, delay: Duration) -> JoinHandle<()> {
        let flag = Arc::clone(&self.flag);
        thread::spawn(move || {
            thread::sleep(delay);
            flag.store(false, Ordering::SeqCst);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::LoadingGate;

    #[test]
    fn unlock_timer_clears_flag() {
        let gate = LoadingGate::new();
        gate.engage();
        assert!(gate.is_loading());
        let handle = gate.arm_unlock(Duration::from_millis(10));
        let _ = handle.join();
        assert!(!gate.is_loading());
    }

    #[test]
    fn stale_timer_clears_a_newer_submission() {
        let gate = LoadingGate::new();
        gate.engage();
        let first = gate.arm_unlock(Duration::from_millis(20));
        // a second submission starts before the first timer fires
        gate.engage();
        let _ = first.join();
        assert!(!gate.is_loading());
    }

    #[test]
    fn release_is_immediate() {
        let gate = LoadingGate::new();
        let shared = gate.clone();
        gate.engage();
        shared.release();
        assert!(!gate.is_loading());
    }
}
