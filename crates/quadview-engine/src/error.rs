use std::fmt;

use crate::platform::NativeHandleError;

/// Failure that ends a `Runtime::run`.
#[derive(Debug)]
pub enum RuntimeError {
    /// The window exists but its native handle could not be retrieved.
    NativeHandle(NativeHandleError),
    /// Window, GPU or application initialization failed.
    Startup(anyhow::Error),
    /// A frame failed in a way the backend cannot recover from.
    Frame(anyhow::Error),
    /// The event loop itself could not be created or returned an error.
    EventLoop(anyhow::Error),
}

impl RuntimeError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        // Every failure maps to 1; the variants only differ in the log line.
        1
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::NativeHandle(e) => write!(f, "{e}"),
            RuntimeError::Startup(e) => write!(f, "startup failed: {e:#}"),
            RuntimeError::Frame(e) => write!(f, "frame failed: {e:#}"),
            RuntimeError::EventLoop(e) => write!(f, "event loop failed: {e:#}"),
        }
    }
}

impl std::error::Error for RuntimeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RuntimeError::NativeHandle(e) => Some(e),
            RuntimeError::Startup(e) | RuntimeError::Frame(e) | RuntimeError::EventLoop(e) => {
                Some(&**e)
            }
        }
    }
}

impl From<NativeHandleError> for RuntimeError {
    fn from(err: NativeHandleError) -> Self {
        RuntimeError::NativeHandle(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_handle_failure_exits_with_one() {
        let err = RuntimeError::from(NativeHandleError::MissingDisplay("xlib"));
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "xlib display handle is missing");
    }

    #[test]
    fn startup_message_keeps_context_chain() {
        let inner = anyhow::anyhow!("no adapter").context("failed to create GPU");
        let err = RuntimeError::Startup(inner);
        assert_eq!(err.to_string(), "startup failed: failed to create GPU: no adapter");
    }
}
