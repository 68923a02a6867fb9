//! Scripted transport, counting cache and recording sleeper shared by the
//! integration tests.
#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use http::{HeaderMap, Method, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use reqbox::{
    Cache, CacheError, CacheKey, CacheResult, Sleeper, Transport, TransportError,
    transport::TransportBody,
};

/// What the transport does for one attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Respond {
        status: StatusCode,
        headers: Vec<(&'static str, &'static str)>,
        body: Bytes,
    },
    Fail,
    Hang,
}

impl Step {
    pub fn status(status: u16) -> Self {
        Self::Respond {
            status: StatusCode::from_u16(status).unwrap(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn json(status: u16, body: serde_json::Value) -> Self {
        Self::Respond {
            status: StatusCode::from_u16(status).unwrap(),
            headers: vec![("content-type", "application/json")],
            body: Bytes::from(serde_json::to_vec(&body).unwrap()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Transport that plays back a script. The last step repeats forever.
#[derive(Clone, Debug)]
pub struct MockTransport {
    script: Arc<Mutex<VecDeque<Step>>>,
    last: Arc<Mutex<Step>>,
    calls: Arc<AtomicUsize>,
    drained: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn script(steps: impl IntoIterator<Item = Step>) -> Self {
        let script: VecDeque<Step> = steps.into_iter().collect();
        let last = script.back().cloned().unwrap_or(Step::status(200));
        Self {
            script: Arc::new(Mutex::new(script)),
            last: Arc::new(Mutex::new(last)),
            calls: Arc::new(AtomicUsize::new(0)),
            drained: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn always(step: Step) -> Self {
        Self::script([step])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of response body frames read by the client.
    pub fn drained(&self) -> usize {
        self.drained.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step {
        let mut script = self.script.lock().unwrap();
        match script.pop_front() {
            Some(step) => step,
            None => self.last.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn exchange(
        &self,
        request: http::Request<Bytes>,
    ) -> Result<http::Response<TransportBody>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (parts, body) = request.into_parts();
        self.requests.lock().unwrap().push(RecordedRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        });

        match self.next_step() {
            Step::Respond {
                status,
                headers,
                body,
            } => {
                let mut response = http::Response::builder().status(status);
                for (name, value) in headers {
                    response = response.header(name, value);
                }
                let drained = self.drained.clone();
                let body = Full::new(body)
                    .map_frame(move |frame| {
                        drained.fetch_add(1, Ordering::SeqCst);
                        frame
                    })
                    .map_err(|never| match never {})
                    .boxed_unsync();
                Ok(response.body(body).unwrap())
            }
            Step::Fail => Err(TransportError::request("connection refused")),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// In-memory cache that counts calls and can be told to fail.
#[derive(Clone, Debug, Default)]
pub struct MockCache {
    pub entries: Arc<DashMap<CacheKey, Bytes>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MockCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Cache for MockCache {
    async fn get(&self, key: &CacheKey) -> CacheResult<Option<Bytes>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::unavailable("storage offline"));
        }
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &CacheKey, value: Bytes, _ttl: Option<Duration>) -> CacheResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::internal("disk full"));
        }
        self.entries.insert(key.clone(), value);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Sleeper that returns at once and remembers every requested delay.
#[derive(Clone, Debug, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}
