//! Fetcher doubles shared by the unit tests

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use keyward::Jwks;
use tokio::sync::Semaphore;

use crate::fetch::{FetchError, JwksFetcher};

/// Serves a configurable response and counts how often it was asked
#[derive(Debug)]
pub(crate) struct CountingFetcher {
    calls: AtomicUsize,
    response: Mutex<Result<Jwks, FetchError>>,
    delay: Duration,
    gate: Option<Semaphore>,
}

impl CountingFetcher {
    pub(crate) fn serving(jwks: Jwks) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            response: Mutex::new(Ok(jwks)),
            delay: Duration::ZERO,
            gate: None,
        }
    }

    pub(crate) fn failing() -> Self {
        let fetcher = Self::serving(Jwks::default());
        fetcher.fail();
        fetcher
    }

    /// Every fetch sleeps for `delay` before answering
    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }

    /// Every fetch blocks until [`open_gate`](Self::open_gate) is called
    pub(crate) fn gated(self) -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..self
        }
    }

    pub(crate) fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(64);
        }
    }

    pub(crate) fn serve(&self, jwks: Jwks) {
        *self.response.lock().unwrap() = Ok(jwks);
    }

    pub(crate) fn fail(&self) {
        *self.response.lock().unwrap() = Err(FetchError::network("connection refused"));
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for CountingFetcher {
    async fn fetch(&self) -> Result<Jwks, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // answer with what was served when the request went out
        let response = self.response.lock().unwrap().clone();

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await;
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        response
    }
}
