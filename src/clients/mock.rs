//! Test doubles for the remote services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ImageGenerator, UpstreamError, VisionModel, VisionRequest};

/// Returns one scripted reply for every call.
pub struct ScriptedVision {
    reply: Result<String, UpstreamError>,
    calls: AtomicUsize,
    requests: Mutex<Vec<VisionRequest>>,
}

impl ScriptedVision {
    pub fn replying(json: impl Into<String>) -> Self {
        Self::new(Ok(json.into()))
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self::new(Err(error))
    }

    fn new(reply: Result<String, UpstreamError>) -> Self {
        Self { reply, calls: AtomicUsize::new(0), requests: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<VisionRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    async fn complete_json(&self, request: &VisionRequest) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        self.reply.clone()
    }
}

#[derive(Clone, Copy)]
pub enum Behavior {
    Fail,
    Panic,
    /// Fails this many times, then succeeds.
    Flaky(usize),
    Hang,
}

/// Image generator keyed on a marker the prompt contains (each test style
/// uses its name in the description). Tracks peak concurrency.
pub struct FakeImages {
    delay: Duration,
    behaviors: HashMap<String, Behavior>,
    attempts: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeImages {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            behaviors: HashMap::new(),
            attempts: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with(mut self, marker: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(marker.to_string(), behavior);
        self
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    fn behavior_for(&self, prompt: &str) -> Option<(String, Behavior)> {
        self.behaviors
            .iter()
            .find(|(marker, _)| prompt.contains(marker.as_str()))
            .map(|(m, b)| (m.clone(), *b))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        match self.behavior_for(prompt) {
            None => Ok(format!("https://images.test/{}.png", self.calls())),
            Some((_, Behavior::Fail)) => Err(UpstreamError::Transport("quota exceeded".into())),
            Some((_, Behavior::Panic)) => panic!("generator blew up"),
            Some((_, Behavior::Hang)) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("never".into())
            }
            Some((marker, Behavior::Flaky(failures))) => {
                let mut attempts = self.attempts.lock();
                let seen = attempts.entry(marker).or_insert(0);
                *seen += 1;
                if *seen <= failures {
                    Err(UpstreamError::Transport(format!("transient failure #{seen}")))
                } else {
                    Ok("https://images.test/recovered.png".into())
                }
            }
        }
    }
}
