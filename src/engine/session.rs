//! Resumable analysis of one function.
//!
//! A [`Decompilation`] owns the per-function copy of the root action and its
//! [`EngineContext`]. When a breakpoint halts the run, both are kept, so the next
//! [`Decompilation::run`] continues from the halted action instead of starting over.

use std::time::Instant;

use crate::{
    engine::{Action, Engine, EngineContext, EventKind, EventLog, RunSummary},
    ir::Funcdata,
    Error, Result,
};

/// One function's run through an [`Engine`], possibly spread over several halts.
#[derive(Debug)]
pub struct Decompilation<'a> {
    engine: &'a Engine,
    data: &'a mut Funcdata,
    root: Box<dyn Action>,
    ctx: EngineContext,
    finished: bool,
}

impl<'a> Decompilation<'a> {
    pub(super) fn new(engine: &'a Engine, data: &'a mut Funcdata) -> Result<Self> {
        let mut root = engine
            .root
            .clone_action(&engine.groups)
            .ok_or_else(|| Error::UnknownAction("empty root action".to_string()))?;
        let mut ctx = EngineContext::new().with_invariant_checks(engine.config.check_invariants);
        root.reset(data, &mut ctx);
        ctx.events
            .record(EventKind::FunctionStarted)
            .at(data.name(), data.entry())
            .source(root.name());
        Ok(Self {
            engine,
            data,
            root,
            ctx,
            finished: false,
        })
    }

    /// The function being analyzed, as the last run left it.
    #[must_use]
    pub fn function(&self) -> &Funcdata {
        &*self.data
    }

    /// Returns `true` once a run completed or failed. Further runs do nothing.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Runs until the analysis completes or a breakpoint halts it.
    ///
    /// Each summary covers the changes and events of this run only. After a halt, calling
    /// `run` again resumes at the halted action.
    ///
    /// # Errors
    ///
    /// Returns structural errors raised by actions or rules, with the function's name
    /// attached. The function keeps an "Analysis aborted" warning and the run is finished.
    pub fn run(&mut self) -> Result<RunSummary> {
        let name = self.data.name().to_string();
        if self.finished {
            return Ok(RunSummary {
                function: name,
                changes: 0,
                halted: false,
                elapsed: Default::default(),
                events: EventLog::new(),
            });
        }

        let start = self.ctx.changes();
        let started = Instant::now();
        let result = self.root.perform(&mut *self.data, &mut self.ctx);
        let elapsed = started.elapsed();
        let changes = self.ctx.changes() - start;

        match result {
            Ok(outcome) if outcome.is_halted() => {
                tracing::debug!(function = %name, changes, "run halted at breakpoint");
                Ok(RunSummary {
                    function: name,
                    changes,
                    halted: true,
                    elapsed,
                    events: self.flush_events(),
                })
            }
            Ok(_) => {
                self.ctx
                    .events
                    .record(EventKind::FunctionCompleted)
                    .function(name.as_str())
                    .message(format!("{} changes", self.ctx.changes()));
                tracing::debug!(function = %name, changes = self.ctx.changes(), ?elapsed, "function done");
                self.finish();
                Ok(RunSummary {
                    function: name,
                    changes,
                    halted: false,
                    elapsed,
                    events: self.flush_events(),
                })
            }
            Err(err) => {
                self.data
                    .warning_header(format!("Analysis aborted: {}", err));
                self.ctx
                    .events
                    .record(EventKind::Error)
                    .function(name.as_str())
                    .message(err.to_string());
                self.finish();
                self.flush_events();
                Err(err.context(format!("function {}", name)))
            }
        }
    }

    /// Moves this run's events into the engine log and returns them.
    fn flush_events(&mut self) -> EventLog {
        let events = std::mem::take(&mut self.ctx.events);
        self.engine.events.merge(&events);
        events
    }

    /// Folds the root's rule statistics into the engine once, when the run ends.
    fn finish(&mut self) {
        self.finished = true;
        let mut stats = Vec::new();
        self.root.rule_stats(&mut stats);
        for (name, s) in stats {
            self.engine.stats.entry(name).or_default().merge(&s);
        }
    }
}
