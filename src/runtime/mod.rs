pub mod error;
pub mod pool;
pub mod transport;

pub use error::RuntimeError;
pub use pool::{
    Completion, PoolEvent, PoolJob, RouterPool, DEFAULT_MAX_CONCURRENCY, POOL_POLL_MS,
};
pub use transport::{serve_json_lines, ReplyLine};
