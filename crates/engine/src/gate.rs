//! Reentrant reader/writer call gate
//!
//! Guarded native calls hold the gate in shared mode; teardown and
//! reconfiguration hold it in exclusive mode. Tokens are RAII: dropping
//! one (including during unwinding) releases the gate.
//!
//! # Reentrancy
//!
//! A thread that already holds the gate in either mode may acquire it again
//! in either mode without touching the underlying lock. This is what lets a
//! guarded task call back into the environment, and lets reconfiguration
//! run guarded calls while it holds exclusive access.
//!
//! The one refused combination is asking for exclusive access while the
//! thread holds only shared access: a lock upgrade can deadlock against any
//! other reader doing the same, so it fails with `MeldError::Usage`.

use meld_core::{MeldError, MeldResult};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_GATE_ID: AtomicU64 = AtomicU64::new(1);

/// Mode in which the current thread holds a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Concurrent guarded calls
    Shared,
    /// Teardown or reconfiguration
    Exclusive,
}

thread_local! {
    /// Gates held by this thread: gate id -> (outermost mode, depth)
    static HELD: RefCell<HashMap<u64, (GateMode, usize)>> = RefCell::new(HashMap::new());
}

/// Reader/writer gate with per-thread reentrancy.
#[derive(Debug)]
pub struct CallGate {
    id: u64,
    lock: RwLock<()>,
}

impl Default for CallGate {
    fn default() -> Self {
        Self::new()
    }
}

impl CallGate {
    /// Create a gate with a process-unique id
    pub fn new() -> Self {
        Self {
            id: NEXT_GATE_ID.fetch_add(1, Ordering::Relaxed),
            lock: RwLock::new(()),
        }
    }

    /// Mode in which the calling thread holds this gate, if any
    pub fn held_mode(&self) -> Option<GateMode> {
        HELD.with(|held| held.borrow().get(&self.id).map(|(mode, _)| *mode))
    }

    /// Whether the calling thread holds this gate in any mode
    pub fn held_by_current_thread(&self) -> bool {
        self.held_mode().is_some()
    }

    /// Acquire shared access, blocking while a writer holds or waits for
    /// the gate. Re-entering never blocks.
    pub fn shared(&self) -> SharedToken<'_> {
        if self.reenter() {
            return SharedToken {
                gate: self,
                _guard: None,
            };
        }
        let guard = self.lock.read();
        self.enter(GateMode::Shared);
        SharedToken {
            gate: self,
            _guard: Some(guard),
        }
    }

    /// Acquire exclusive access, blocking until every shared holder left.
    ///
    /// # Errors
    ///
    /// `MeldError::Usage` when the calling thread holds only shared access.
    pub fn exclusive(&self) -> MeldResult<ExclusiveToken<'_>> {
        match self.held_mode() {
            Some(GateMode::Exclusive) => {
                self.reenter();
                Ok(ExclusiveToken {
                    gate: self,
                    _guard: None,
                })
            }
            Some(GateMode::Shared) => Err(MeldError::usage(
                "exclusive access requested while holding shared access",
            )),
            None => {
                let guard = self.lock.write();
                self.enter(GateMode::Exclusive);
                Ok(ExclusiveToken {
                    gate: self,
                    _guard: Some(guard),
                })
            }
        }
    }

    fn reenter(&self) -> bool {
        HELD.with(|held| match held.borrow_mut().get_mut(&self.id) {
            Some((_, depth)) => {
                *depth += 1;
                true
            }
            None => false,
        })
    }

    fn enter(&self, mode: GateMode) {
        HELD.with(|held| {
            held.borrow_mut().insert(self.id, (mode, 1));
        });
    }

    fn leave(&self) {
        HELD.with(|held| {
            let mut held = held.borrow_mut();
            if let Some((_, depth)) = held.get_mut(&self.id) {
                *depth -= 1;
                if *depth == 0 {
                    held.remove(&self.id);
                }
            }
        });
    }
}

/// Proof of shared access. Released on drop.
#[must_use = "the gate is released as soon as the token is dropped"]
pub struct SharedToken<'a> {
    gate: &'a CallGate,
    _guard: Option<RwLockReadGuard<'a, ()>>,
}

impl Drop for SharedToken<'_> {
    fn drop(&mut self) {
        // Bookkeeping first; the guard field drops after this body
        self.gate.leave();
    }
}

/// Proof of exclusive access. Released on drop.
#[must_use = "the gate is released as soon as the token is dropped"]
pub struct ExclusiveToken<'a> {
    gate: &'a CallGate,
    _guard: Option<RwLockWriteGuard<'a, ()>>,
}

impl Drop for ExclusiveToken<'_> {
    fn drop(&mut self) {
        self.gate.leave();
    }
}
