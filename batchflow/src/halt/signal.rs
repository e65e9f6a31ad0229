//! Shared halt signal polled by workers.

use crate::core::HaltReason;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Thread-safe halt flag with a first-writer-wins reason.
///
/// The tripped flag is a plain atomic so workers can poll it on the
/// dispatch hot path without touching the reason mutex.
pub struct HaltSignal {
    tripped: AtomicBool,
    reason: Mutex<Option<HaltReason>>,
}

impl HaltSignal {
    /// Creates an untripped signal.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tripped: AtomicBool::new(false),
            reason: Mutex::new(None),
        })
    }

    /// Returns true once tripped.
    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    /// The halt reason, once tripped.
    #[must_use]
    pub fn reason(&self) -> Option<HaltReason> {
        self.reason.lock().clone()
    }

    /// Trips the signal. Idempotent: the first reason wins and is
    /// immutable afterwards. Returns true if this call tripped it.
    ///
    /// The reason is stored before the flag is raised, so any observer
    /// seeing `is_tripped()` can also read a non-`None` reason.
    pub fn trip(&self, reason: HaltReason) -> bool {
        let mut guard = self.reason.lock();
        if guard.is_some() {
            return false;
        }
        *guard = Some(reason);
        self.tripped.store(true, Ordering::SeqCst);
        true
    }
}

impl std::fmt::Debug for HaltSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaltSignal")
            .field("tripped", &self.is_tripped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Fields;

    #[test]
    fn test_initial_state() {
        let signal = HaltSignal::new();
        assert!(!signal.is_tripped());
        assert!(signal.reason().is_none());
    }

    #[test]
    fn test_first_reason_wins() {
        let signal = HaltSignal::new();

        assert!(signal.trip(HaltReason::new("first", Fields::new(), 1)));
        assert!(!signal.trip(HaltReason::new("second", Fields::new(), 2)));

        assert_eq!(signal.reason().map(|r| r.plugin), Some("first".to_string()));
    }

    #[test]
    fn test_reason_visible_once_tripped() {
        let signal = HaltSignal::new();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                std::thread::spawn(move || {
                    while !signal.is_tripped() {
                        std::hint::spin_loop();
                    }
                    signal.reason().is_some()
                })
            })
            .collect();

        signal.trip(HaltReason::new("only", Fields::new(), 0));

        for handle in readers {
            assert!(handle.join().unwrap());
        }
    }

    #[test]
    fn test_concurrent_trip_single_winner() {
        let signal = HaltSignal::new();
        let mut handles = Vec::new();

        for index in 0..8 {
            let signal = signal.clone();
            handles.push(std::thread::spawn(move || {
                signal.trip(HaltReason::new(format!("p{index}"), Fields::new(), index))
            }));
        }

        let winners = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|tripped| *tripped)
            .count();
        assert_eq!(winners, 1);
        assert!(signal.is_tripped());
    }
}
