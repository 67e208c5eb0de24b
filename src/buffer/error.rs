//! Typed buffer failures, raised through `eyre` so callers can
//! `downcast_ref::<BufferError>()` when they need to distinguish them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// No space left and the buffer is not allowed to grow.
    Full,
    /// An operation that is never valid on this buffer in this state.
    Logic(&'static str),
    /// A constructor precondition was violated.
    InvalidArgument(&'static str),
}

impl std::fmt::Display for BufferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferError::Full => write!(f, "buffer is full"),
            BufferError::Logic(what) => write!(f, "buffer logic error: {}", what),
            BufferError::InvalidArgument(what) => {
                write!(f, "invalid buffer argument: {}", what)
            }
        }
    }
}

impl std::error::Error for BufferError {}
