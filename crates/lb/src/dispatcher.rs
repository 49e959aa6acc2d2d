use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::Full;
use log::{error, info, warn};

use crate::{
    backend::Backend,
    error::{ConfigError, DispatchError},
    pool::BackendPool,
};

/// Owns the pool and the rotation cursor.
///
/// The cursor only ever grows: every examined position advances it by one,
/// whether the backend there was alive or not. The backend examined is always
/// `pool[cursor % len]`.
pub struct Dispatcher {
    pool: BackendPool,
    cursor: Mutex<u64>,
}

impl Dispatcher {
    pub fn new(pool: BackendPool) -> Self {
        Self {
            pool,
            cursor: Mutex::new(0),
        }
    }

    pub fn from_backends(backends: Vec<Arc<dyn Backend>>) -> Result<Self, ConfigError> {
        Ok(Self::new(BackendPool::new(backends)?))
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn cursor(&self) -> u64 {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Picks the next live backend, examining at most `len` positions.
    ///
    /// The lock covers only the scan; callers exchange after it is released.
    pub fn select(&self) -> Result<Arc<dyn Backend>, DispatchError> {
        let len = self.pool.len() as u64;
        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);

        for _ in 0..len {
            let index = (*cursor % len) as usize;
            *cursor = cursor.wrapping_add(1);

            if let Some(backend) = self.pool.backend(index) {
                if backend.is_alive() {
                    return Ok(Arc::clone(backend));
                }
            }
        }

        Err(DispatchError::NoAvailableBackend)
    }

    pub async fn dispatch(
        &self,
        req: Request<Full<Bytes>>,
    ) -> Result<Response<Full<Bytes>>, DispatchError> {
        let backend = match self.select() {
            Ok(backend) => backend,
            Err(err) => {
                warn!("No backend available among {} configured", self.pool.len());
                return Err(err);
            }
        };

        info!("forwarding request to address {:?}", backend.address());

        backend.exchange(req).await.map_err(|source| {
            error!("Upstream {} failed: {}", backend.address(), source);
            DispatchError::Upstream {
                address: backend.address().to_string(),
                source,
            }
        })
    }
}
