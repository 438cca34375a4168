//! Unit-of-work state machine.
//!
//! # Invariants
//! - Transitions: `NotStarted -> Active -> Committed | RolledBack`; a
//!   resolved handle becomes `Active` again when new work begins.
//! - Every transition happens under the handle's single mutex, so concurrent
//!   `commit` calls commit at most once.
//! - A failed commit or rollback leaves the state unchanged.

use super::{RepoError, RepoResult};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    NotStarted,
    Active,
    Committed,
    RolledBack,
}

impl TransactionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Active => "active",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// Lazily activated transaction owned by one repository.
///
/// The handle only tracks state; the actual `BEGIN`/`COMMIT`/`ROLLBACK` is
/// supplied by the caller as a closure and runs while the lock is held.
#[derive(Debug)]
pub struct TransactionHandle {
    state: Mutex<TransactionState>,
}

impl Default for TransactionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionHandle {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TransactionState::NotStarted),
        }
    }

    pub fn state(&self) -> TransactionState {
        *self.lock()
    }

    /// Starts a unit of work unless one is active.
    ///
    /// Returns `true` when `begin` ran.
    pub fn ensure_active<F>(&self, begin: F) -> RepoResult<bool>
    where
        F: FnOnce() -> RepoResult<()>,
    {
        let mut state = self.lock();
        if *state == TransactionState::Active {
            return Ok(false);
        }
        begin()?;
        *state = TransactionState::Active;
        Ok(true)
    }

    /// Commits the active unit of work.
    ///
    /// Returns `true` when `commit` ran; `false` for the idempotent no-op
    /// cases (`NotStarted`, already `Committed`).
    ///
    /// # Errors
    /// - `RepoError::TransactionState` after a rollback.
    /// - Whatever `commit` returns.
    pub fn commit<F>(&self, commit: F) -> RepoResult<bool>
    where
        F: FnOnce() -> RepoResult<()>,
    {
        let mut state = self.lock();
        match *state {
            TransactionState::NotStarted | TransactionState::Committed => Ok(false),
            TransactionState::RolledBack => Err(RepoError::TransactionState {
                operation: "commit",
                state: *state,
                message: "transaction was rolled back; start new work before committing"
                    .to_string(),
            }),
            TransactionState::Active => {
                commit()?;
                *state = TransactionState::Committed;
                Ok(true)
            }
        }
    }

    /// Rolls back the active unit of work.
    ///
    /// Returns `true` when `rollback` ran; `false` when nothing was active.
    ///
    /// # Errors
    /// - `RepoError::TransactionState` after a commit.
    /// - Whatever `rollback` returns.
    pub fn rollback<F>(&self, rollback: F) -> RepoResult<bool>
    where
        F: FnOnce() -> RepoResult<()>,
    {
        let mut state = self.lock();
        match *state {
            TransactionState::NotStarted | TransactionState::RolledBack => Ok(false),
            TransactionState::Committed => Err(RepoError::TransactionState {
                operation: "rollback",
                state: *state,
                message: "transaction already committed".to_string(),
            }),
            TransactionState::Active => {
                rollback()?;
                *state = TransactionState::RolledBack;
                Ok(true)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, TransactionState> {
        // state is a plain Copy enum, a poisoned guard still holds a valid value
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
