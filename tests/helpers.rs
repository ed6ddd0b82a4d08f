#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::time::Instant;

use topicctl::{
    config::{Properties, PropertiesLoader},
    error::{AdminError, Result},
    session::{AdminSession, SessionFactory},
    TopicConfig, TopicName,
};

/// How long a submitted change takes to show up in the listing
#[derive(Debug, Clone, Copy)]
pub enum Visibility {
    After(Duration),
    Never,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub creates: Vec<(String, TopicConfig)>,
    pub deletes: Vec<String>,
    pub lists: usize,
}

#[derive(Debug)]
struct State {
    topics: HashSet<String>,
    // Topic name, whether it should exist, and when the change becomes visible
    pending: Vec<(String, bool, Option<Instant>)>,
    calls: Calls,
    failing_lists: usize,
}

/// An in memory session that only makes changes visible after a delay, like a real cluster
/// propagating metadata.
#[derive(Clone)]
pub struct MockSession {
    state: Arc<Mutex<State>>,
    visibility: Visibility,
    reject_mutations: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl MockSession {
    pub fn new(existing: &[&str], visibility: Visibility) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                topics: existing.iter().map(|t| t.to_string()).collect(),
                pending: Vec::new(),
                calls: Calls::default(),
                failing_lists: 0,
            })),
            visibility,
            reject_mutations: None,
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Changes become visible on the next listing
    pub fn immediate(existing: &[&str]) -> Self {
        Self::new(existing, Visibility::After(Duration::ZERO))
    }

    /// Make every create and delete request fail with the given message
    pub fn rejecting(mut self, message: &str) -> Self {
        self.reject_mutations = Some(message.to_string());
        self
    }

    /// Make the next `count` listings fail
    pub fn fail_next_lists(&self, count: usize) {
        self.state.lock().unwrap().failing_lists = count;
    }

    pub fn creates(&self) -> Vec<(String, TopicConfig)> {
        self.state.lock().unwrap().calls.creates.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.deletes.clone()
    }

    pub fn lists(&self) -> usize {
        self.state.lock().unwrap().calls.lists
    }

    /// Number of broker calls of any kind
    pub fn total_calls(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.calls.creates.len() + state.calls.deletes.len() + state.calls.lists
    }

    pub fn times_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn schedule(&self, topic: &TopicName, exists: bool) {
        let visible_at = match self.visibility {
            Visibility::After(delay) => Some(Instant::now() + delay),
            Visibility::Never => None,
        };
        self.state
            .lock()
            .unwrap()
            .pending
            .push((topic.to_string(), exists, visible_at));
    }
}

impl AdminSession for MockSession {
    async fn submit_create(&self, topic: &TopicName, config: &TopicConfig) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .creates
            .push((topic.to_string(), config.clone()));
        if let Some(msg) = &self.reject_mutations {
            anyhow::bail!("{msg}");
        }
        self.schedule(topic, true);
        Ok(())
    }

    async fn submit_delete(&self, topic: &TopicName) -> anyhow::Result<()> {
        self.state
            .lock()
            .unwrap()
            .calls
            .deletes
            .push(topic.to_string());
        if let Some(msg) = &self.reject_mutations {
            anyhow::bail!("{msg}");
        }
        self.schedule(topic, false);
        Ok(())
    }

    async fn list_topic_names(&self) -> anyhow::Result<HashSet<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls.lists += 1;
        if state.failing_lists > 0 {
            state.failing_lists -= 1;
            anyhow::bail!("metadata request timed out");
        }
        let now = Instant::now();
        let (ready, waiting): (Vec<_>, Vec<_>) = state
            .pending
            .drain(..)
            .partition(|(_, _, at)| at.map(|at| at <= now).unwrap_or(false));
        state.pending = waiting;
        for (topic, exists, _) in ready {
            if exists {
                state.topics.insert(topic);
            } else {
                state.topics.remove(&topic);
            }
        }
        Ok(state.topics.clone())
    }

    async fn close(self) -> anyhow::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out clones of one [`MockSession`] so tests can inspect it afterwards
pub struct MockFactory {
    pub session: MockSession,
    pub connects: Arc<AtomicUsize>,
    pub seen_props: Arc<Mutex<Vec<Properties>>>,
    pub fail: bool,
}

impl MockFactory {
    pub fn new(session: MockSession) -> Self {
        Self {
            session,
            connects: Arc::new(AtomicUsize::new(0)),
            seen_props: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl SessionFactory for MockFactory {
    type Session = MockSession;

    async fn connect(&self, props: &Properties) -> anyhow::Result<MockSession> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.seen_props.lock().unwrap().push(props.clone());
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(self.session.clone())
    }
}

/// Property sources held in memory
#[derive(Default)]
pub struct MemoryLoader {
    sources: HashMap<String, Properties>,
}

impl MemoryLoader {
    pub fn with_source(mut self, source_id: &str, props: Properties) -> Self {
        self.sources.insert(source_id.to_string(), props);
        self
    }
}

impl PropertiesLoader for MemoryLoader {
    async fn load(&self, source_id: &str, overrides: &Properties) -> Result<Properties> {
        match self.sources.get(source_id) {
            Some(props) => Ok(props.merged(overrides)),
            None => Err(AdminError::ConfigLoad {
                source_id: source_id.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such source"),
            }),
        }
    }
}

/// A loader with the usual admin and pack topic sources
pub fn default_loader() -> MemoryLoader {
    MemoryLoader::default()
        .with_source(
            topicctl::ADMIN_SOURCE,
            Properties::from([("servers", "127.0.0.1:4222")]),
        )
        .with_source(
            topicctl::PACK_TOPIC_SOURCE,
            Properties::from([("retention.ms", "3600000"), ("storage", "memory")]),
        )
}

pub fn topic(name: &str) -> TopicName {
    TopicName::parse(name).expect("Test topic names should be valid")
}
