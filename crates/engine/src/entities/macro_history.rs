//! Macro-variable history operations.
//!
//! The store is the sole long-lived owner of macro state. The current state is
//! always the latest appended record; nothing is ever updated in place.

use std::sync::Arc;

use macrosim_domain::{EvolutionError, HistoryRecord, MacroState};

use crate::infrastructure::ports::{RepoError, StateRepo};

#[derive(Debug, thiserror::Error)]
pub enum MacroHistoryError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Evolution(#[from] EvolutionError),
}

/// Append-only macro state history.
pub struct MacroHistory {
    repo: Arc<dyn StateRepo>,
}

impl MacroHistory {
    pub fn new(repo: Arc<dyn StateRepo>) -> Self {
        Self { repo }
    }

    /// Most recent state. Fails with `NotInitialized` until a record exists.
    pub async fn current_state(&self) -> Result<MacroState, MacroHistoryError> {
        self.repo
            .latest_state()
            .await?
            .ok_or(MacroHistoryError::Evolution(EvolutionError::NotInitialized))
    }

    pub async fn append(&self, record: &HistoryRecord) -> Result<(), RepoError> {
        self.repo.append_history(record).await
    }

    /// Seed the history with its initial record. Refuses a non-empty history.
    pub async fn seed(&self, initial: MacroState) -> Result<HistoryRecord, RepoError> {
        if self.repo.count_history().await? > 0 {
            return Err(RepoError::constraint("macro history is already initialized"));
        }
        let record = HistoryRecord::initial(initial);
        self.repo.append_history(&record).await?;
        Ok(record)
    }

    /// Up to `limit` records, most recent first.
    pub async fn recent(&self, limit: u32) -> Result<Vec<HistoryRecord>, RepoError> {
        self.repo.recent_history(limit).await
    }

    /// Full history, oldest first.
    pub async fn all(&self) -> Result<Vec<HistoryRecord>, RepoError> {
        self.repo.history().await
    }

    pub async fn count(&self) -> Result<u64, RepoError> {
        self.repo.count_history().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::MockStateRepo;
    use chrono::Utc;
    use macrosim_domain::CauseRef;

    #[tokio::test]
    async fn when_history_is_empty_then_current_state_is_not_initialized() {
        let mut repo = MockStateRepo::new();
        repo.expect_latest_state().returning(|| Ok(None));

        let history = MacroHistory::new(Arc::new(repo));
        let err = history.current_state().await.expect_err("no state yet");

        assert!(matches!(
            err,
            MacroHistoryError::Evolution(EvolutionError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn when_history_exists_then_seed_is_refused() {
        let mut repo = MockStateRepo::new();
        repo.expect_count_history().returning(|| Ok(1));
        repo.expect_append_history().times(0);

        let history = MacroHistory::new(Arc::new(repo));
        let err = history
            .seed(MacroState::new(2.3, 2.1, 12.0, Utc::now()))
            .await
            .expect_err("already seeded");

        assert!(matches!(err, RepoError::ConstraintViolation(_)));
    }

    #[tokio::test]
    async fn when_history_is_empty_then_seed_appends_initial_record() {
        let mut repo = MockStateRepo::new();
        repo.expect_count_history().returning(|| Ok(0));
        repo.expect_append_history()
            .withf(|record| record.cause == CauseRef::Initial)
            .times(1)
            .returning(|_| Ok(()));

        let history = MacroHistory::new(Arc::new(repo));
        let record = history
            .seed(MacroState::new(2.3, 2.1, 12.0, Utc::now()))
            .await
            .expect("seed succeeds");

        assert_eq!(record.state.growth, 2.3);
    }
}
