use async_trait::async_trait;
use parking_lot::Mutex;

use crate::store::BackingStore;
use crate::Error;
use crate::FailureHandler;
use crate::MemoryStore;
use crate::Result;
use crate::TxnOp;
use crate::TxnRequest;

/// Writes one key through the transaction path, panicking on failure.
pub async fn put(
    store: &MemoryStore,
    key: &str,
    value: &str,
) {
    let response = store
        .txn(TxnRequest::default().and_then(TxnOp::Put {
            key: key.to_string(),
            value: value.as_bytes().to_vec(),
            lease: None,
        }))
        .await
        .expect("txn should succeed");
    assert!(response.succeeded);
}

/// Failure handler that records every invocation, optionally failing each
/// `on_failure` call to exercise the error-routing path.
#[derive(Default)]
pub struct RecordingHandler {
    pub failures: Mutex<Vec<String>>,
    pub errors: Mutex<Vec<String>>,
    pub fail_on_failure: bool,
}

impl RecordingHandler {
    pub fn failing() -> Self {
        Self {
            fail_on_failure: true,
            ..Default::default()
        }
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }
}

#[async_trait]
impl FailureHandler<String> for RecordingHandler {
    async fn on_failure(
        &self,
        event: String,
    ) -> Result<()> {
        self.failures.lock().push(event);
        if self.fail_on_failure {
            return Err(Error::Fatal("handler rejected the event".to_string()));
        }
        Ok(())
    }

    async fn on_error(
        &self,
        error: Error,
    ) {
        self.errors.lock().push(error.to_string());
    }
}
