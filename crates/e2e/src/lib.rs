//! Parity harness: drives one event script through the live reducer and,
//! independently, through its persisted-log encoding into the replay
//! builder, then compares the two block trees with generated fields
//! stripped.
//!
//! This suite is the authoritative definition of correctness for the two
//! paths: any structural divergence between them is a bug in one of them.

pub mod fixtures;

use threadline_core::event::{UiEvent, UiEventKind};
use threadline_core::log::{LogRecord, encode_ui_record};
use threadline_core::testing::normalize;
use threadline_core::timeline::Timeline;
use threadline_reducer::TimelineReducer;
use threadline_replay::replay;

/// One scripted step of a session, in emission order.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// The user sent a message (a `user` record in the log).
    User(String),
    /// The backend announced the active model. No record of its own; the
    /// model rides on the next assistant record.
    Model(String),
    /// An inbound UI event (a synthetic `__ui__` record in the log).
    Event(UiEventKind),
    /// An event from another concurrent session, leaked into the same
    /// stream and log. Both paths must ignore it.
    Foreign(String, UiEventKind),
    /// The turn's final answer (an `assistant` record in the log, a
    /// `finalMessage` event on the live path).
    Final(String),
}

/// An ordered event script plus its session scope. The same script feeds
/// both paths.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub session: Option<String>,
    pub steps: Vec<ScriptStep>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_session(session: impl Into<String>) -> Self {
        Self {
            session: Some(session.into()),
            steps: Vec::new(),
        }
    }

    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::User(content.into()));
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Model(model.into()));
        self
    }

    pub fn event(mut self, kind: UiEventKind) -> Self {
        self.steps.push(ScriptStep::Event(kind));
        self
    }

    pub fn foreign_event(mut self, session: impl Into<String>, kind: UiEventKind) -> Self {
        self.steps.push(ScriptStep::Foreign(session.into(), kind));
        self
    }

    pub fn final_answer(mut self, content: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Final(content.into()));
        self
    }

    fn wrap(&self, kind: UiEventKind) -> UiEvent {
        match &self.session {
            Some(session) => UiEvent::for_session(session.clone(), kind),
            None => UiEvent::new(kind),
        }
    }

    /// Drive the script through the live reducer.
    pub fn run_live(&self) -> Timeline {
        let mut reducer = match &self.session {
            Some(session) => TimelineReducer::with_session(session.clone()),
            None => TimelineReducer::new(),
        };
        for step in &self.steps {
            match step {
                ScriptStep::User(content) => reducer.push_user_message(content.clone()),
                ScriptStep::Model(model) => reducer.set_active_model(Some(model.clone())),
                ScriptStep::Event(kind) => reducer.apply(&self.wrap(kind.clone())),
                ScriptStep::Foreign(session, kind) => {
                    reducer.apply(&UiEvent::for_session(session.clone(), kind.clone()));
                }
                ScriptStep::Final(content) => reducer.apply(&self.wrap(UiEventKind::FinalMessage {
                    content: content.clone(),
                })),
            }
            // Outbound requests are fire-and-forget; parity only concerns
            // the block tree.
            reducer.drain_outbound();
        }
        reducer.into_timeline()
    }

    /// Encode the script as the persisted log the storage collaborator
    /// would have written while the live path ran.
    pub fn to_records(&self) -> Vec<LogRecord> {
        let mut records = Vec::new();
        let mut model: Option<String> = None;
        for (index, step) in self.steps.iter().enumerate() {
            let id = format!("r{}", index + 1);
            match step {
                ScriptStep::User(content) => records.push(LogRecord::user(id, content.clone())),
                ScriptStep::Model(name) => model = Some(name.clone()),
                ScriptStep::Event(kind) => {
                    records.push(encode_ui_record(id, &self.wrap(kind.clone())));
                }
                ScriptStep::Foreign(session, kind) => {
                    records.push(encode_ui_record(
                        id,
                        &UiEvent::for_session(session.clone(), kind.clone()),
                    ));
                }
                ScriptStep::Final(content) => {
                    records.push(LogRecord::assistant(id, content.clone(), model.clone()));
                }
            }
        }
        records
    }
}

/// Both normalized trees for one script: `(live, replayed)`.
pub fn both_paths(script: &Script) -> (serde_json::Value, serde_json::Value) {
    let live = normalize(&script.run_live());
    let replayed = normalize(&replay(&script.to_records()));
    (live, replayed)
}

/// Panic with a readable diff when the two paths disagree.
pub fn assert_parity(script: &Script) {
    let (live, replayed) = both_paths(script);
    assert_eq!(
        live,
        replayed,
        "live and replay trees diverged\n--- live ---\n{}\n--- replay ---\n{}",
        serde_json::to_string_pretty(&live).unwrap_or_default(),
        serde_json::to_string_pretty(&replayed).unwrap_or_default(),
    );
}
