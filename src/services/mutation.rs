//! Estado de las mutaciones (create / update / delete) del binding layer

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use crate::utils::errors::{AppError, AppResult};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum MutationState {
    #[default]
    Idle,
    Pending,
    Success,
    Error(AppError),
}

impl MutationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::Pending)
    }

    pub fn error(&self) -> Option<&AppError> {
        match self {
            MutationState::Error(error) => Some(error),
            _ => None,
        }
    }
}

/// Seguimiento de un tipo de mutación. Cada invocación reinicia el estado y
/// sólo la última invocación fija el estado final.
#[derive(Debug, Default)]
pub struct MutationTracker {
    inner: Mutex<(u64, MutationState)>,
}

impl MutationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutationState {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).1.clone()
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.0 += 1;
        inner.1 = MutationState::Idle;
    }

    pub async fn run<T, Fut>(&self, mutation: Fut) -> AppResult<T>
    where
        Fut: Future<Output = AppResult<T>>,
    {
        let generation = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.0 += 1;
            inner.1 = MutationState::Pending;
            inner.0
        };

        let result = mutation.await;

        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.0 == generation {
            inner.1 = match &result {
                Ok(_) => MutationState::Success,
                Err(error) => MutationState::Error(error.clone()),
            };
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_states_follow_last_invocation() {
        let tracker = MutationTracker::new();
        assert_eq!(tracker.state(), MutationState::Idle);

        let failed: AppResult<()> = tracker
            .run(async { Err(AppError::Validation("bad".to_string())) })
            .await;
        assert!(failed.is_err());
        assert_eq!(tracker.state().error(), Some(&AppError::Validation("bad".to_string())));

        tracker.run(async { Ok(1) }).await.unwrap();
        assert_eq!(tracker.state(), MutationState::Success);

        tracker.reset();
        assert_eq!(tracker.state(), MutationState::Idle);
    }

    #[tokio::test]
    async fn test_older_invocation_does_not_override_newer() {
        let tracker = MutationTracker::new();

        let slow = tracker.run(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err::<(), _>(AppError::Network("timeout".to_string()))
        });
        let fast = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let result = tracker.run(async { Ok::<_, AppError>(()) }).await;
            assert!(tracker.state().is_pending() || tracker.state() == MutationState::Success);
            result
        };

        let (slow, fast) = tokio::join!(slow, fast);
        assert!(slow.is_err());
        assert!(fast.is_ok());
        assert_eq!(tracker.state(), MutationState::Success);
    }
}
