//! Round-robin backend selection and request dispatch.

mod backend;
mod dispatcher;
mod error;
mod pool;

pub use backend::{Backend, Liveness};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, DispatchError, ExchangeError};
pub use pool::BackendPool;
