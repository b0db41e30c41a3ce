//! Actions that record when they start and finish.

use std::sync::{Arc, Mutex};

use anyhow::anyhow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(String),
    Finished(String),
}

/// Shared, ordered log of action start/finish events.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<Event>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Action that records itself and succeeds.
    pub fn action(
        self: &Arc<Self>,
        name: &str,
    ) -> impl FnOnce() -> anyhow::Result<()> + Send + 'static + use<> {
        self.action_with(name, || Ok(()))
    }

    /// Action that records itself and fails.
    pub fn failing_action(
        self: &Arc<Self>,
        name: &str,
    ) -> impl FnOnce() -> anyhow::Result<()> + Send + 'static + use<> {
        let message = format!("{name} failed on purpose");
        self.action_with(name, move || Err(anyhow!(message)))
    }

    /// Action that records itself around `body`.
    pub fn action_with<F>(
        self: &Arc<Self>,
        name: &str,
        body: F,
    ) -> impl FnOnce() -> anyhow::Result<()> + Send + 'static + use<F>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let recorder = Arc::clone(self);
        let name = name.to_string();
        move || {
            recorder.push(Event::Started(name.clone()));
            let result = body();
            recorder.push(Event::Finished(name));
            result
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Names in the order their actions started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(name) => Some(name),
                Event::Finished(_) => None,
            })
            .collect()
    }

    pub fn times_started(&self, name: &str) -> usize {
        self.started().iter().filter(|n| n.as_str() == name).count()
    }

    /// Panics unless `later` started after `earlier` finished.
    pub fn assert_started_after_finished(&self, later: &str, earlier: &str) {
        let events = self.events();
        let finished = events
            .iter()
            .position(|e| *e == Event::Finished(earlier.to_string()))
            .unwrap_or_else(|| panic!("{earlier} never finished; events: {events:?}"));
        let started = events
            .iter()
            .position(|e| *e == Event::Started(later.to_string()))
            .unwrap_or_else(|| panic!("{later} never started; events: {events:?}"));
        assert!(
            started > finished,
            "{later} started before {earlier} finished; events: {events:?}"
        );
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
