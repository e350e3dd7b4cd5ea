use thiserror::Error;

/// Caller-side contract violations of the threading core.
///
/// Malformed, dangling and cyclic references are not errors; they are
/// repaired while building. Only inputs the builder cannot interpret as one
/// thread, and output shapes that cannot be encoded safely, end up here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThreadingError {
    #[error("message {message_id} belongs to thread {found}, expected thread {expected}")]
    CrossThread {
        expected: i64,
        found: i64,
        message_id: i64,
    },
    #[error("thread is {depth} replies deep, nested output is limited to {limit} levels; use the flat form")]
    TooDeepToNest { depth: i32, limit: i32 },
}
