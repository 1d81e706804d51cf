//! Engine capability trait implemented by transfer adapters.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::{EncodingError, EngineError, EngineResult};
use crate::model::{ContentHash, EngineAlert, TransferId, TransferStatus};

/// Capability set the lifecycle monitor consumes from a transfer engine.
///
/// Status queries and pause commands are expected to return promptly; the
/// monitor awaits them inline on its tick loop.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Opaque per-transfer handle the engine hands out.
    type Handle: Clone + Debug + Send + Sync + 'static;

    /// Enumerate the handles of every transfer the engine currently holds.
    async fn list_active(&self) -> EngineResult<Vec<Self::Handle>>;

    /// Query the current status of one transfer.
    async fn status(&self, handle: &Self::Handle) -> EngineResult<TransferStatus>;

    /// Pause a transfer.
    async fn pause(&self, handle: &Self::Handle) -> EngineResult<()>;

    /// Stable identity assigned when the transfer was added.
    fn resolve_identity(&self, handle: &Self::Handle) -> TransferId;

    /// Content-addressed identifier of the transfer.
    ///
    /// # Errors
    ///
    /// Returns an [`EncodingError`] when the engine's hash cannot be decoded.
    fn content_hash(&self, handle: &Self::Handle) -> Result<ContentHash, EncodingError>;

    /// Resume a paused transfer; default implementation reports lack of support.
    async fn resume(&self, handle: &Self::Handle) -> EngineResult<()> {
        let _ = handle;
        Err(EngineError::Unsupported {
            operation: "resume",
        })
    }

    /// Attach additional trackers; default implementation reports lack of support.
    async fn add_trackers(&self, handle: &Self::Handle, trackers: &[String]) -> EngineResult<()> {
        let _ = (handle, trackers);
        Err(EngineError::Unsupported {
            operation: "add_trackers",
        })
    }

    /// Drain alerts raised since the previous call; engines without an alert
    /// queue report none.
    async fn poll_alerts(&self) -> EngineResult<Vec<EngineAlert>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubEngine;

    #[async_trait]
    impl TransferEngine for StubEngine {
        type Handle = u64;

        async fn list_active(&self) -> EngineResult<Vec<u64>> {
            Ok(vec![1])
        }

        async fn status(&self, _handle: &u64) -> EngineResult<TransferStatus> {
            Ok(TransferStatus::default())
        }

        async fn pause(&self, _handle: &u64) -> EngineResult<()> {
            Ok(())
        }

        fn resolve_identity(&self, handle: &u64) -> TransferId {
            TransferId::new(*handle)
        }

        fn content_hash(&self, handle: &u64) -> Result<ContentHash, EncodingError> {
            Err(EncodingError::Unavailable {
                transfer_id: TransferId::new(*handle),
            })
        }
    }

    #[tokio::test]
    async fn engine_default_methods() {
        let engine = StubEngine;
        assert!(matches!(
            engine.resume(&1).await,
            Err(EngineError::Unsupported {
                operation: "resume"
            })
        ));
        let err = engine
            .add_trackers(&1, &["udp://tracker.example:80".to_string()])
            .await
            .expect_err("trackers should error");
        assert_eq!(err.operation(), Some("add_trackers"));
        assert!(
            engine
                .poll_alerts()
                .await
                .is_ok_and(|alerts| alerts.is_empty())
        );
    }
}
