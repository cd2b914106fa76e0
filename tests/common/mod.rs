#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use livebind::{EventSink, SubscribeError, Value};

/// Minimal topic broadcaster standing in for an external pub/sub transport.
#[derive(Debug, Default)]
pub struct TestBus {
    topics: Mutex<HashMap<String, Vec<EventSink>>>,
    subscribe_calls: AtomicUsize,
}

impl TestBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(&self, topic: &str, sink: EventSink) -> Result<(), SubscribeError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.topics
            .lock()
            .map_err(|_| SubscribeError::new("bus lock poisoned"))?
            .entry(topic.to_string())
            .or_default()
            .push(sink);
        Ok(())
    }

    pub fn broadcast(&self, topic: &str, event: impl Into<Value>) {
        let event = event.into();
        let topics = self.topics.lock().unwrap();
        for sink in topics.get(topic).into_iter().flatten() {
            let _ = sink.deliver(event.clone());
        }
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn subscribers(&self, topic: &str) -> usize {
        self.topics.lock().unwrap().get(topic).map_or(0, Vec::len)
    }

    /// Subscriptions happen on watcher threads; wait until `n` are in place.
    pub fn wait_for_subscribers(&self, topic: &str, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while self.subscribers(topic) < n {
            assert!(Instant::now() < deadline, "timed out waiting for {n} subscribers on {topic}");
            thread::sleep(Duration::from_millis(2));
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls `cond` until it holds or two seconds pass.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}
