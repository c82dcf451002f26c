use crate::EntryStore;

use protocol_common::{Compose, Execute};

use std::sync::{Arc, Mutex, MutexGuard};

/// Shares one storage backend between the worker threads behind a single
/// mutex. Each request takes the lock once, so item operations observe a
/// total order.
pub struct Shared<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, Request, Response> Execute<Request, Response> for Shared<T>
where
    T: Execute<Request, Response>,
    Response: Compose,
{
    fn execute(&mut self, request: &Request) -> Response {
        self.lock().execute(request)
    }
}

impl<T: EntryStore> EntryStore for Shared<T> {
    fn expire(&mut self) {
        self.lock().expire()
    }

    fn clear(&mut self) {
        self.lock().clear()
    }
}
