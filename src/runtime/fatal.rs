use anyhow::Error as AnyError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

/// Captures the first fatal error raised by any task and cancels the shared
/// shutdown token so every other task stops. Later errors are dropped.
#[derive(Clone)]
pub struct FatalErrorHandler {
    inner: Arc<FatalInner>,
}

struct FatalInner {
    triggered: AtomicBool,
    shutdown: CancellationToken,
    // Cancelled only by `trigger`, unlike `shutdown` which Ctrl-C also cancels.
    fatal: CancellationToken,
    captured_error: Mutex<Option<CapturedFatalError>>,
}

#[derive(Clone)]
struct CapturedFatalError {
    inner: Arc<AnyError>,
}

impl CapturedFatalError {
    fn new(inner: AnyError) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }
}

impl fmt::Debug for CapturedFatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapturedFatalError")
            .field(&self.inner)
            .finish()
    }
}

impl fmt::Display for CapturedFatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.inner.as_ref(), f)
    }
}

impl std::error::Error for CapturedFatalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref().as_ref())
    }
}

impl FatalErrorHandler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            inner: Arc::new(FatalInner {
                triggered: AtomicBool::new(false),
                shutdown,
                fatal: CancellationToken::new(),
                captured_error: Mutex::new(None),
            }),
        }
    }

    pub fn trigger(&self, context: &str, error: AnyError) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            tracing::debug!(context, error = %error, "ignoring error after fatal shutdown");
            return;
        }

        tracing::error!(
            context,
            error = %format!("{error:#}"),
            "fatal error; stopping all workers"
        );

        {
            let mut slot = self
                .inner
                .captured_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                *slot = Some(CapturedFatalError::new(error));
            }
        }

        self.inner.fatal.cancel();
        self.inner.shutdown.cancel();
    }

    /// Resolves once an error has been captured; never resolves on a clean
    /// shutdown.
    pub async fn triggered(&self) {
        self.inner.fatal.cancelled().await
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// The captured error; the original is reachable through `downcast_ref`
    /// on the returned error's chain.
    pub fn error(&self) -> Option<AnyError> {
        self.inner
            .captured_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|error| error.clone().into())
    }
}
