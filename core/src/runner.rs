//! Async host harness around the stepping engine
//!
//! The engine never sleeps or blocks. `Runner` drives it on tokio: it awaits
//! requested delays (so many runs can share one thread), stops at
//! breakpoints and suspensions, and turns the end of a run into a report.

use crate::executor::{Engine, ExecutionException, RuntimeError, StepRecord, Value};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

/// How a call to `Runner::run` ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The program ended; `status` is the `Exit` status or top-level return value
    Completed { status: Option<Value> },
    /// The next statement is on a breakpoint line; `run` again to continue
    Paused { line: u32 },
    /// A `Suspend` statement ran; `run` again to continue
    Suspended { line: u32 },
    Failed { exception: ExecutionException },
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records produced by this call
    pub steps: usize,
    pub outcome: RunOutcome,
}

pub struct Runner {
    engine: Engine,
    run_id: Uuid,
    breakpoints: BTreeSet<u32>,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(engine: Engine) -> Self {
        let cancel = engine.cancellation_token();
        Self {
            engine,
            run_id: Uuid::new_v4(),
            breakpoints: BTreeSet::new(),
            cancel,
        }
    }

    pub fn with_breakpoints(mut self, lines: impl IntoIterator<Item = u32>) -> Self {
        self.breakpoints.extend(lines);
        self
    }

    /// Token that cancels this run; clones may be sent to other tasks
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }

    /// Run until the program ends, pauses, suspends, fails or is cancelled
    ///
    /// Every record is handed to `sink` as it is produced.
    pub async fn run<F>(&mut self, mut sink: F) -> RunReport
    where
        F: FnMut(&StepRecord),
    {
        let span = info_span!(
            "run",
            run_id = %self.run_id,
            program = %self.engine.program().version_hash()
        );

        async move {
            let started_at = Utc::now();
            let mut steps = 0;
            self.engine.resume();
            info!("run started");

            let outcome = loop {
                let record = match self.engine.step() {
                    Ok(Some(record)) => record,
                    Ok(None) => {
                        break RunOutcome::Completed {
                            status: self.engine.exit_status().cloned(),
                        }
                    }
                    Err(e) if e.cause == RuntimeError::Cancelled => break RunOutcome::Cancelled,
                    Err(exception) => break RunOutcome::Failed { exception },
                };

                steps += 1;
                sink(&record);

                if let Some(delay) = self.engine.take_delay() {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        // the engine raises the cancellation on its next step
                        _ = self.cancel.cancelled() => {}
                    }
                } else {
                    tokio::task::yield_now().await;
                }

                if self.engine.is_suspended() {
                    self.engine.advance_to_statement(|_| true);
                    if !self.engine.is_finished() {
                        break RunOutcome::Suspended {
                            line: self.engine.next_line(),
                        };
                    }
                } else {
                    let breakpoints = &self.breakpoints;
                    self.engine
                        .advance_to_statement(|line| breakpoints.contains(&line));
                }
                if self.engine.is_finished() {
                    break RunOutcome::Completed {
                        status: self.engine.exit_status().cloned(),
                    };
                }
                let line = self.engine.next_line();
                if self.breakpoints.contains(&line) {
                    break RunOutcome::Paused { line };
                }
            };

            info!(steps, outcome = ?outcome, "run stopped");

            RunReport {
                run_id: self.run_id,
                started_at,
                finished_at: Utc::now(),
                steps,
                outcome,
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{EngineOptions, Program, Scope};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn runner(body: serde_json::Value) -> Runner {
        let source = json!({ "t": "Compound", "body": body }).to_string();
        let program = Program::from_json(&source).expect("Program should decode");
        Runner::new(Engine::new(
            Arc::new(program),
            Scope::default(),
            EngineOptions::default(),
        ))
    }

    fn set(line: u32, name: &str, v: f64) -> serde_json::Value {
        json!({
            "t": "Assign",
            "line": line,
            "targets": [{ "t": "Var", "name": name }],
            "values": [{ "t": "Num", "v": v }],
        })
    }

    fn delay(line: u32, ms: f64) -> serde_json::Value {
        json!({ "t": "Delay", "line": line, "duration": { "t": "Num", "v": ms } })
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_of_concurrent_runs_overlap() {
        let mut first = runner(json!([delay(1, 1000.0), set(2, "a", 1.0)]));
        let mut second = runner(json!([delay(1, 1000.0), set(2, "b", 1.0)]));

        let start = Instant::now();
        let (a, b) = tokio::join!(first.run(|_| {}), second.run(|_| {}));
        let elapsed = start.elapsed();

        assert_eq!(a.outcome, RunOutcome::Completed { status: None });
        assert_eq!(b.outcome, RunOutcome::Completed { status: None });
        assert!(elapsed >= Duration::from_millis(1000));
        assert!(elapsed < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_breakpoint_pauses_before_line() {
        let mut runner = runner(json!([set(1, "a", 1.0), set(2, "b", 2.0), set(3, "c", 3.0)]))
            .with_breakpoints([3]);
        let mut seen = Vec::new();

        let report = runner.run(|r| seen.push(r.line)).await;
        assert_eq!(report.outcome, RunOutcome::Paused { line: 3 });
        assert_eq!(report.steps, 2);
        assert!(!runner.engine().scope().contains("c"));

        let report = runner.run(|r| seen.push(r.line)).await;
        assert_eq!(report.outcome, RunOutcome::Completed { status: None });
        assert_eq!(report.steps, 1);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    /// 1 i = 0
    /// 2 while i < 2
    /// 3   i += 1
    /// 4 end
    /// 5 done = 1
    fn counting_loop() -> serde_json::Value {
        json!([
            set(1, "i", 0.0),
            {
                "t": "Cycle",
                "line": 2,
                "test": {
                    "t": "BinOp",
                    "op": "<",
                    "left": { "t": "Var", "name": "i" },
                    "right": { "t": "Num", "v": 2 },
                },
                "body": { "line": 2, "end_line": 4, "body": [{
                    "t": "Assign",
                    "line": 3,
                    "op": "+=",
                    "targets": [{ "t": "Var", "name": "i" }],
                    "values": [{ "t": "Num", "v": 1 }],
                }]},
            },
            set(5, "done", 1.0),
        ])
    }

    #[tokio::test]
    async fn test_breakpoint_in_loop_body_fires_each_iteration() {
        let mut runner = runner(counting_loop()).with_breakpoints([3, 4]);
        let mut seen = Vec::new();

        for _ in 0..2 {
            let report = runner.run(|r| seen.push(r.line)).await;
            assert_eq!(report.outcome, RunOutcome::Paused { line: 3 });
        }
        let report = runner.run(|r| seen.push(r.line)).await;

        assert_eq!(report.outcome, RunOutcome::Completed { status: None });
        assert_eq!(seen, vec![1, 3, 3, 5]);
    }

    #[tokio::test]
    async fn test_breakpoint_on_loop_header_pauses_before_each_test() {
        let mut runner = runner(counting_loop()).with_breakpoints([2]);

        let mut pauses = 0;
        let report = loop {
            let report = runner.run(|_| {}).await;
            match report.outcome {
                RunOutcome::Paused { line } => {
                    assert_eq!(line, 2);
                    pauses += 1;
                }
                _ => break report,
            }
        };

        assert_eq!(report.outcome, RunOutcome::Completed { status: None });
        assert_eq!(pauses, 3);
        assert_eq!(runner.engine().scope().get("i").ok(), Some(&Value::Num(2.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_delay() {
        let mut runner = runner(json!([delay(1, 10_000.0), set(2, "a", 1.0)]));
        let token = runner.cancellation_token();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            token.cancel();
        });

        let start = Instant::now();
        let report = runner.run(|_| {}).await;

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert!(!runner.engine().scope().contains("a"));
    }

    #[test]
    fn test_suspend_stops_run_until_next_call() {
        let mut runner = runner(json!([
            set(1, "a", 1.0),
            { "t": "Suspend", "line": 2 },
            set(3, "b", 2.0),
        ]));

        let report = tokio_test::block_on(runner.run(|_| {}));
        assert_eq!(report.outcome, RunOutcome::Suspended { line: 3 });
        assert!(!runner.engine().scope().contains("b"));

        let report = tokio_test::block_on(runner.run(|_| {}));
        assert_eq!(report.outcome, RunOutcome::Completed { status: None });
        assert!(runner.engine().scope().contains("b"));
    }

    #[tokio::test]
    async fn test_fault_and_exit_outcomes() {
        let mut failing = runner(json!([{
            "t": "Throw",
            "line": 4,
            "value": { "t": "String", "v": "nope" },
        }]));
        let report = failing.run(|_| {}).await;
        let RunOutcome::Failed { exception } = report.outcome else {
            unreachable!("Expected failure, got {:?}", report.outcome)
        };
        assert_eq!(exception.line, 4);

        let mut exiting = runner(json!([
            set(1, "a", 1.0),
            { "t": "Exit", "line": 2, "status": { "t": "Num", "v": 3 } },
            set(3, "b", 1.0),
        ]));
        let mut records = Vec::new();
        let report = exiting.run(|r| records.push(r.clone())).await;
        assert_eq!(
            report.outcome,
            RunOutcome::Completed {
                status: Some(Value::Num(3.0))
            }
        );
        assert_eq!(records.len(), 2);
        assert!(report.finished_at >= report.started_at);
        assert_eq!(report.run_id, exiting.run_id());
    }
}
