//! Structured event logging for the rewrite engine.
//!
//! Every committed rule application, every action that changed the function and every
//! engine-level decision (restart, restart limit, breakpoint) is recorded as an [`Event`].
//! Events can be inspected for debugging or testing, summarized, or ignored.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Append-only collection with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events
//! - [`DerivedStats`] - Counters computed from a log
//!
//! The log is backed by `boxcar::Vec`, so recording only needs a shared reference and logs
//! from functions analyzed in parallel can be merged into one engine-wide log.
//!
//! # Example
//!
//! ```rust
//! use pcodeopt::engine::events::{EventKind, EventLog};
//! use pcodeopt::ir::Address;
//!
//! let log = EventLog::new();
//! log.record(EventKind::RuleApplied)
//!     .at("main", Address::ram(0x1000))
//!     .source("trivialarith")
//!     .message("INT_XOR v,v => COPY #0");
//! log.info("starting universal");
//!
//! assert_eq!(log.count_kind(EventKind::RuleApplied), 1);
//! assert_eq!(log.summary(), "1 rule applied");
//! ```

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::Duration,
};

use crate::ir::Address;

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A rule committed a rewrite.
    RuleApplied,
    /// An action made at least one change during a perform.
    ActionApplied,
    /// Dead-code elimination removed an op.
    OpRemoved,
    /// Two `MULTIEQUAL`s computing the same value were merged.
    CseMerged,
    /// The non-zero mask of a varnode was narrowed.
    MaskRefined,
    /// An indirect call was resolved to a known function.
    CallResolved,

    /// The restart controller started another iteration.
    Restart,
    /// The restart controller gave up after exceeding its bound.
    RestartLimit,
    /// An action halted on a breakpoint.
    Breakpoint,
    /// Analysis of a function started.
    FunctionStarted,
    /// Analysis of a function completed.
    FunctionCompleted,

    /// Informational message.
    Info,
    /// Warning (something unexpected but recoverable).
    Warning,
    /// Error (something failed).
    Error,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::RuleApplied => "rule applied",
            Self::ActionApplied => "action applied",
            Self::OpRemoved => "op removed",
            Self::CseMerged => "cse merged",
            Self::MaskRefined => "mask refined",
            Self::CallResolved => "call resolved",
            Self::Restart => "restart",
            Self::RestartLimit => "restart limit",
            Self::Breakpoint => "breakpoint",
            Self::FunctionStarted => "function started",
            Self::FunctionCompleted => "function completed",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    /// Returns true if this event represents a change to the IR.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::RuleApplied
                | Self::OpRemoved
                | Self::CseMerged
                | Self::MaskRefined
                | Self::CallResolved
        )
    }

    /// Returns true if this is a diagnostic event (info/warning/error).
    #[must_use]
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Info | Self::Warning | Self::Error)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function the event occurred in (if applicable).
    pub function: Option<String>,
    /// Instruction address the event refers to.
    pub location: Option<Address>,
    /// Human-readable description.
    pub message: String,
    /// Name of the rule or action that produced the event.
    pub source: Option<String>,
}

impl Event {
    fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            function: None,
            location: None,
            message: message.into(),
            source: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(source) = &self.source {
            write!(f, " {source}:")?;
        }
        write!(f, " {}", self.message)?;
        if let Some(addr) = self.location {
            write!(f, " @ {addr}")?;
        }
        Ok(())
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the builder is
/// dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<String>,
    location: Option<Address>,
    message: Option<String>,
    source: Option<String>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            location: None,
            message: None,
            source: None,
        }
    }

    /// Sets the function and address where the event occurred.
    pub fn at(mut self, function: impl Into<String>, location: Address) -> Self {
        self.function = Some(function.into());
        self.location = Some(location);
        self
    }

    /// Sets only the function.
    pub fn function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Sets only the address.
    pub fn location(mut self, location: Address) -> Self {
        self.location = Some(location);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Names the rule or action responsible.
    pub fn source(mut self, name: impl Into<String>) -> Self {
        self.source = Some(name.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            function: self.function.take(),
            location: self.location.take(),
            message,
            source: self.source.take(),
        });
    }
}

/// Append-only collection of events.
///
/// Statistics are derived from the events rather than tracked separately. Events can be
/// appended concurrently through shared references.
#[derive(Debug)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Info, message));
    }

    /// Records a warning message.
    pub fn warn(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Warning, message));
    }

    /// Records an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.events.push(Event::new(EventKind::Error, message));
    }

    /// Appends copies of all events of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|(_, e)| e.kind == kind)
    }

    /// Counts events of the given kind.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Returns an iterator over all events.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Returns an iterator over events of a specific kind.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Returns an iterator over events produced by the named rule or action.
    pub fn filter_source<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.source.as_deref() == Some(name))
    }

    /// Returns an iterator over events of one function.
    pub fn filter_function<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter().filter(move |e| e.function.as_deref() == Some(name))
    }

    /// Returns an iterator over transformation events only.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Returns an iterator over diagnostic events only.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_diagnostic())
    }

    /// Returns an iterator over warning events.
    pub fn warnings(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Warning)
    }

    /// Returns an iterator over error events.
    pub fn errors(&self) -> impl Iterator<Item = &Event> + '_ {
        self.filter_kind(EventKind::Error)
    }

    /// Counts events grouped by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Counts rule applications grouped by rule name.
    #[must_use]
    pub fn count_by_source(&self, kind: EventKind) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for event in self.filter_kind(kind) {
            if let Some(source) = &event.source {
                *counts.entry(source.clone()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.transformations().count()
    }

    /// Returns the number of distinct functions with transformations.
    #[must_use]
    pub fn functions_affected(&self) -> usize {
        self.transformations()
            .filter_map(|e| e.function.as_deref())
            .collect::<HashSet<_>>()
            .len()
    }

    /// Generates a human-readable summary of the transformations.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let mut parts: Vec<String> = self
            .count_by_kind()
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

/// Iterator wrapper for EventLog that yields &Event
pub struct EventLogIter<'a> {
    inner: boxcar::Iter<'a, Event>,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a Event;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, e)| e)
    }
}

impl<'a> IntoIterator for &'a EventLog {
    type Item = &'a Event;
    type IntoIter = EventLogIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        EventLogIter {
            inner: self.events.iter(),
        }
    }
}

impl Extend<Event> for EventLog {
    fn extend<T: IntoIterator<Item = Event>>(&mut self, iter: T) {
        for event in iter {
            self.events.push(event);
        }
    }
}

impl FromIterator<Event> for EventLog {
    fn from_iter<T: IntoIterator<Item = Event>>(iter: T) -> Self {
        let log = Self::new();
        for event in iter {
            log.events.push(event);
        }
        log
    }
}

/// Statistics derived from an EventLog.
#[derive(Debug, Clone, Default)]
pub struct DerivedStats {
    /// Number of functions that had any transformations.
    pub functions_transformed: usize,
    /// Number of rule applications.
    pub rules_applied: usize,
    /// Number of action performs that changed something.
    pub actions_applied: usize,
    /// Number of ops removed as dead code.
    pub ops_removed: usize,
    /// Number of `MULTIEQUAL` merges.
    pub cse_merged: usize,
    /// Number of narrowed non-zero masks.
    pub masks_refined: usize,
    /// Number of indirect calls resolved.
    pub calls_resolved: usize,
    /// Number of restarts.
    pub restarts: usize,
    /// Number of functions that hit the restart bound.
    pub restart_limits: usize,
    /// Number of warnings.
    pub warnings: usize,
    /// Number of errors.
    pub errors: usize,
    /// Processing time.
    pub total_time: Duration,
}

impl DerivedStats {
    /// Computes statistics from an event log.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            functions_transformed: log.functions_affected(),
            rules_applied: get(EventKind::RuleApplied),
            actions_applied: get(EventKind::ActionApplied),
            ops_removed: get(EventKind::OpRemoved),
            cse_merged: get(EventKind::CseMerged),
            masks_refined: get(EventKind::MaskRefined),
            calls_resolved: get(EventKind::CallResolved),
            restarts: get(EventKind::Restart),
            restart_limits: get(EventKind::RestartLimit),
            warnings: get(EventKind::Warning),
            errors: get(EventKind::Error),
            total_time: Duration::ZERO,
        }
    }

    /// Sets the total processing time.
    #[must_use]
    pub fn with_time(mut self, time: Duration) -> Self {
        self.total_time = time;
        self
    }

    /// Generates a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();

        if self.functions_transformed > 0 {
            parts.push(format!("{} functions", self.functions_transformed));
        }
        if self.rules_applied > 0 {
            parts.push(format!("{} rewrites", self.rules_applied));
        }
        if self.ops_removed > 0 {
            parts.push(format!("{} ops removed", self.ops_removed));
        }
        if self.calls_resolved > 0 {
            parts.push(format!("{} calls resolved", self.calls_resolved));
        }
        if self.restarts > 0 {
            parts.push(format!("{} restarts", self.restarts));
        }
        if self.warnings > 0 {
            parts.push(format!("{} warnings", self.warnings));
        }
        if self.errors > 0 {
            parts.push(format!("{} errors", self.errors));
        }

        let mut summary = if parts.is_empty() {
            "no changes".to_string()
        } else {
            parts.join(", ")
        };
        if !self.total_time.is_zero() {
            summary.push_str(&format!(" in {:.2?}", self.total_time));
        }
        summary
    }
}
