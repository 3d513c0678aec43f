//! Rule base and report types shared by all validation stages.
//!
//! A rule is a unit of diagnostic logic with a `get`/`check` contract:
//! `get` gathers the observed fact from metadata and scene state, `check`
//! judges it and appends human-readable detail to the rule's message.
//! Rules are stateless; message accumulation happens in a per-invocation
//! [`Message`] buffer, so a rule can be run any number of times without
//! leaking text between reports.

use indexmap::IndexMap;
use serde::Serialize;

use crate::models::CharacterMetadata;
use crate::scene::{SceneError, SceneResult};

/// Result of one rule invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub check: bool,
    pub message: String,
}

/// Per-stage mapping of rule key to result, in rule execution order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StageReport {
    entries: IndexMap<&'static str, ReportEntry>,
}

impl StageReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs a rule and records its entry.
    pub fn record<R: Rule>(&mut self, rule: &R) {
        let (key, entry) = run_rule(rule);
        self.entries.insert(key, entry);
    }

    /// A stage passes iff every entry's check is true.
    pub fn passed(&self) -> bool {
        self.entries.values().all(|entry| entry.check)
    }

    /// Keys of failing entries, in execution order.
    pub fn failing_keys(&self) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|(_, entry)| !entry.check)
            .map(|(key, _)| *key)
            .collect()
    }

    /// Whether the keyed rule is present and failing. Absent keys are not
    /// failures; the cleanup executor relies on that.
    pub fn is_failing(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(|entry| !entry.check)
    }

    pub fn get(&self, key: &str) -> Option<&ReportEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: &'static str, entry: ReportEntry) {
        self.entries.insert(key, entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ReportEntry)> {
        self.entries.iter().map(|(key, entry)| (*key, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Message buffer for one rule invocation. Starts from the rule's static
/// message; failure details are appended one line at a time.
#[derive(Debug)]
pub struct Message {
    text: String,
}

impl Message {
    pub fn new(base: impl Into<String>) -> Self {
        Self { text: base.into() }
    }

    /// Appends a detail line.
    pub fn expand(&mut self, line: impl AsRef<str>) {
        self.text.push('\n');
        self.text.push_str(line.as_ref());
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// A single diagnostic rule.
pub trait Rule {
    /// Observed fact gathered by [`get`](Rule::get).
    type Fact;

    /// Stable key identifying this rule in a stage report.
    fn key(&self) -> &'static str;

    /// Static message describing what the rule guards.
    fn base_message(&self) -> String;

    /// Gathers the observed state. Errors here mean the scene no longer
    /// matches the metadata (dangling object or bone references).
    fn get(&self) -> SceneResult<Self::Fact>;

    /// Judges the fact, expanding `message` with detail on failure.
    fn check(&self, fact: Self::Fact, message: &mut Message) -> bool;
}

/// Composes `get` and `check` into a report entry. An observation error is
/// reported as a failing entry carrying the error text.
pub fn run_rule<R: Rule>(rule: &R) -> (&'static str, ReportEntry) {
    let mut message = Message::new(rule.base_message());
    let check = match rule.get() {
        Ok(fact) => rule.check(fact, &mut message),
        Err(err) => {
            tracing::warn!("Rule {} could not observe the scene: {err}", rule.key());
            message.expand(format!("Could not inspect the scene: {err}"));
            false
        }
    };
    (
        rule.key(),
        ReportEntry {
            check,
            message: message.into_text(),
        },
    )
}

/// Armature assigned in metadata; guaranteed present once the Metadata
/// stage has passed, but never unwrapped blindly.
pub(crate) fn assigned_armature(metadata: &CharacterMetadata) -> SceneResult<&str> {
    metadata
        .body
        .armature_name
        .as_deref()
        .ok_or_else(|| SceneError::ObjectNotFound("<unassigned armature>".to_string()))
}

/// Face mesh assigned in metadata; callers gate on `mesh_name` being set
/// before constructing face rules.
pub(crate) fn assigned_face_mesh(metadata: &CharacterMetadata) -> SceneResult<&str> {
    metadata
        .face
        .mesh_name
        .as_deref()
        .ok_or_else(|| SceneError::ObjectNotFound("<unassigned face mesh>".to_string()))
}

/// Joins names for failure detail lines.
pub(crate) fn join_names<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|name| name.as_ref())
        .collect::<Vec<_>>()
        .join(", ")
}
