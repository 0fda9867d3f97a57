//! One-shot registration state of a meter.

use crate::core::Result;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread;

const UNREGISTERED: u8 = 0;
const REGISTERING: u8 = 1;
const REGISTERED: u8 = 2;

/// Guards the meter system registration of a single meter.
///
/// The transition out of the unregistered state is a compare-and-swap, so
/// concurrent first callers race on the CAS and exactly one of them runs the
/// registration while the others wait for it. Once registered the gate never
/// reverts.
#[derive(Debug, Default)]
pub struct InitGate {
    state: AtomicU8,
}

impl InitGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(UNREGISTERED),
        }
    }

    /// Runs `register` if no other caller has claimed the gate.
    ///
    /// Returns `Ok(true)` when this call performed the registration and
    /// `Ok(false)` when another caller did. A caller that loses the claim
    /// while a registration is in flight waits for it to finish, so
    /// `Ok(false)` always means the meter is registered. A failed
    /// registration releases the claim and a waiting caller takes it over.
    pub fn register_once<F>(&self, register: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        loop {
            match self.state.compare_exchange(
                UNREGISTERED,
                REGISTERING,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    return match register() {
                        Ok(()) => {
                            self.state.store(REGISTERED, Ordering::Release);
                            Ok(true)
                        },
                        Err(e) => {
                            self.state.store(UNREGISTERED, Ordering::Release);
                            Err(e)
                        },
                    };
                },
                Err(REGISTERED) => return Ok(false),
                Err(_) => thread::yield_now(),
            }
        }
    }

    /// Returns true once a registration has completed
    pub fn is_registered(&self) -> bool {
        self.state.load(Ordering::Acquire) == REGISTERED
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MeterError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_register_once() {
        let gate = InitGate::new();
        let calls = AtomicUsize::new(0);
        let register = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };

        assert!(!gate.is_registered());
        assert!(gate.register_once(register).unwrap());
        assert!(gate.is_registered());
        assert!(!gate.register_once(register).unwrap());
        assert!(gate.is_registered());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_registration_can_retry() {
        let gate = InitGate::new();

        let result = gate.register_once(|| Err(MeterError::engine("conflict")));
        assert!(result.is_err());
        assert!(!gate.is_registered());

        assert!(gate.register_once(|| Ok(())).unwrap());
        assert!(gate.is_registered());
    }

    #[test]
    fn test_losers_wait_for_registration_in_flight() {
        let gate = Arc::new(InitGate::new());
        let barrier = Arc::new(Barrier::new(2));

        let winner = {
            let gate = Arc::clone(&gate);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                gate.register_once(|| {
                    barrier.wait();
                    thread::sleep(Duration::from_millis(100));
                    Ok(())
                })
                .unwrap()
            })
        };

        barrier.wait();
        assert!(!gate.register_once(|| Ok(())).unwrap());
        assert!(gate.is_registered());
        assert!(winner.join().unwrap());
    }

    #[test]
    fn test_waiter_takes_over_failed_registration() {
        let gate = Arc::new(InitGate::new());
        let barrier = Arc::new(Barrier::new(2));

        let first = {
            let gate = Arc::clone(&gate);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                gate.register_once(|| {
                    barrier.wait();
                    thread::sleep(Duration::from_millis(50));
                    Err(MeterError::engine("unavailable"))
                })
            })
        };

        barrier.wait();
        assert!(gate.register_once(|| Ok(())).unwrap());
        assert!(first.join().unwrap().is_err());
        assert!(gate.is_registered());
    }

    #[test]
    fn test_concurrent_first_calls_register_once() {
        const THREADS: usize = 16;

        let gate = Arc::new(InitGate::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = vec![];

        for _ in 0..THREADS {
            let gate = Arc::clone(&gate);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                gate.register_once(|| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap()
            }));
        }

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(gate.is_registered());
    }
}
