//! Execution engine: cache-aside lookup, the retry loop and the cache store.
//!
//! A logical request moves through [`State`]s:
//!
//! 1. a request carrying a build error returns it without touching the
//!    cache or the network;
//! 2. a GET with a configured cache is looked up first, and a hit is
//!    returned as is, without re-checking its status;
//! 3. otherwise attempts are made one after the other until one is
//!    accepted or the retry budget is spent, with a backoff wait between
//!    them;
//! 4. an accepted GET response with a status below 300 is stored.
//!
//! The request context is raced against every exchange, body read and
//! backoff wait.

mod state;

use http::{Method, StatusCode};
use http_body_util::BodyExt;
use reqbox_backend::{Cache, CacheKey};
use tracing::{debug, trace};

use self::state::State;
use crate::{
    client::{Client, ClientInner},
    context::ContextError,
    error::Error,
    request::Draft,
    response::{Response, ResponseSource},
    snapshot::CachedResponse,
    transport::TransportError,
};

pub(crate) async fn execute(client: Client, state: Result<Draft, Error>) -> Result<Response, Error> {
    let draft = match state {
        Ok(draft) => draft,
        Err(error) => {
            enter(State::ShortCircuited);
            return Err(error);
        }
    };
    enter(State::Built);

    let inner = client.inner();
    let cache = inner
        .cache
        .as_deref()
        .filter(|_| draft.method == Method::GET);
    let key = CacheKey::for_request(draft.method.as_str(), &draft.url);

    if let Some(cache) = cache
        && let Some(response) = lookup(cache, &key, draft.expected_status).await?
    {
        return Ok(response);
    }

    let response = Dispatcher { inner, draft: &draft }.run().await?;

    if let Some(cache) = cache
        && response.status().as_u16() < 300
    {
        store(cache, &key, &response).await?;
    }

    Ok(response)
}

async fn lookup(
    cache: &dyn Cache,
    key: &CacheKey,
    expected: Option<StatusCode>,
) -> Result<Option<Response>, Error> {
    let record = match cache.get(key).await {
        Ok(record) => record,
        Err(error) => {
            enter(State::CacheBackendError);
            return Err(Error::CacheRead(error));
        }
    };

    let Some(record) = record else {
        trace!(%key, cache = cache.name(), "cache miss");
        return Ok(None);
    };

    match CachedResponse::decode(&record) {
        Ok(snapshot) => {
            enter(State::CacheHit);
            debug!(%key, cache = cache.name(), status = %snapshot.status(), "cache hit");
            Ok(Some(snapshot.into_response(expected)))
        }
        Err(error) => {
            enter(State::CacheBackendError);
            Err(Error::CacheRead(error))
        }
    }
}

async fn store(cache: &dyn Cache, key: &CacheKey, response: &Response) -> Result<(), Error> {
    let stored = match CachedResponse::from_response(response).encode() {
        Ok(record) => cache.set(key, record, None).await,
        Err(error) => Err(error),
    };

    match stored {
        Ok(()) => {
            debug!(%key, cache = cache.name(), "response stored");
            Ok(())
        }
        Err(error) => {
            enter(State::CacheBackendError);
            Err(Error::CacheWrite(error))
        }
    }
}

enum Outcome {
    Accepted(Response),
    Rejected(StatusCode),
    Failed(TransportError),
}

struct Dispatcher<'a> {
    inner: &'a ClientInner,
    draft: &'a Draft,
}

impl Dispatcher<'_> {
    async fn run(self) -> Result<Response, Error> {
        if let Some(source) = self.draft.context.err() {
            return Err(cancelled(0, source));
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            enter(State::Dispatching { attempt });
            debug!(
                attempt,
                method = %self.draft.method,
                url = %self.draft.url,
                "dispatching request"
            );

            let outcome = match self.attempt().await {
                Ok(outcome) => outcome,
                Err(source) => return Err(cancelled(attempt, source)),
            };

            let error = match outcome {
                Outcome::Accepted(response) => {
                    enter(State::Succeeded);
                    debug!(attempt, status = %response.status(), "request succeeded");
                    return Ok(response);
                }
                Outcome::Rejected(status) => {
                    debug!(attempt, %status, "unexpected status");
                    Error::UnexpectedStatus {
                        status,
                        attempts: attempt,
                    }
                }
                Outcome::Failed(source) => {
                    debug!(attempt, error = %source, "attempt failed");
                    Error::Transport {
                        attempts: attempt,
                        source,
                    }
                }
            };

            if attempt > self.draft.retry_count {
                enter(match error {
                    Error::UnexpectedStatus { .. } => State::RetryExhausted,
                    _ => State::TransportError,
                });
                return Err(error);
            }

            let delay = self.inner.backoff.delay(attempt);
            trace!(attempt, ?delay, "waiting before retry");
            tokio::select! {
                biased;
                source = self.draft.context.done() => return Err(cancelled(attempt, source)),
                () = self.inner.sleeper.sleep(delay) => {}
            }
        }
    }

    /// One physical attempt, raced against the request context.
    async fn attempt(&self) -> Result<Outcome, ContextError> {
        let exchange = async {
            match self.inner.timeout {
                Some(limit) => tokio::time::timeout(limit, self.exchange())
                    .await
                    .unwrap_or(Outcome::Failed(TransportError::Timeout)),
                None => self.exchange().await,
            }
        };

        tokio::select! {
            biased;
            source = self.draft.context.done() => Err(source),
            outcome = exchange => Ok(outcome),
        }
    }

    async fn exchange(&self) -> Outcome {
        let response = match self.inner.transport.exchange(self.draft.physical()).await {
            Ok(response) => response,
            Err(error) => return Outcome::Failed(error),
        };
        let (parts, body) = response.into_parts();

        if let Some(expected) = self.draft.expected_status
            && parts.status != expected
        {
            // Drained so the connection can be reused by the retry.
            let _ = body.collect().await;
            return Outcome::Rejected(parts.status);
        }

        match body.collect().await {
            Ok(collected) => Outcome::Accepted(Response::new(
                parts.status,
                parts.headers,
                collected.to_bytes(),
                self.draft.expected_status,
                ResponseSource::Network,
            )),
            Err(error) => Outcome::Failed(TransportError::Body(error)),
        }
    }
}

fn cancelled(attempts: u32, source: ContextError) -> Error {
    enter(State::Cancelled);
    Error::Cancelled { attempts, source }
}

fn enter(state: State) {
    trace!(%state, terminal = state.is_terminal(), "request state");
}
