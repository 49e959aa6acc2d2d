use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;

use crate::error::ExchangeError;

/// One upstream target.
///
/// Implementations differ only in how `exchange` reaches the upstream; the
/// dispatcher sees nothing but these three operations.
#[async_trait]
pub trait Backend: Send + Sync {
    fn address(&self) -> &str;

    /// Evaluated fresh on every call. An implementation without liveness
    /// information must answer `false`.
    fn is_alive(&self) -> bool;

    async fn exchange(
        &self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Full<Bytes>>, ExchangeError>;
}

/// Shared up/down signal for a backend, flipped by whoever watches its health.
#[derive(Clone, Debug)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new(alive: bool) -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(alive)),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    pub fn set(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    pub fn mark_up(&self) {
        self.set(true);
    }

    pub fn mark_down(&self) {
        self.set(false);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn liveness_clones_share_state() {
        let signal = Liveness::default();
        let observer = signal.clone();
        assert!(observer.is_alive());

        signal.mark_down();
        assert!(!observer.is_alive());

        signal.mark_up();
        assert!(observer.is_alive());
    }
}
