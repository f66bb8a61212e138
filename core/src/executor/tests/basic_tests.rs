//! Straight-line statements, records and engine flags

use super::helpers::*;
use crate::executor::errors::RuntimeError;
use crate::executor::types::{AssignOp, BinaryOp, ConstBinding, Stmt};
use crate::executor::{EngineOptions, Expr, StepRecord, Value, EXCEPTION_MESSAGE_KEY};
use crate::services::{MockServiceHost, NullHost};
use maplit::hashmap;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_fixture_program_runs_to_exit() {
    let mut engine = fixture_engine(include_str!("fixtures/order_total.json"));

    let records = run_to_end(&mut engine);

    assert_eq!(lines(&records), vec![1, 2, 4, 6, 7, 6, 7, 6, 7, 9, 10]);
    assert_eq!(records[8].next_line, 8);
    assert_eq!(records[9].value, Some(Value::str("total\t12")));
    assert_eq!(records[10], StepRecord::new(10, Some(Value::Num(12.0)), 10));
    assert_eq!(engine.exit_status(), Some(&Value::Num(12.0)));
    assert!(engine.is_finished());
}

#[test]
fn test_records_carry_value_and_next_line() {
    let mut engine = build_engine(vec![
        assign(1, "a", num(2.0)),
        assign(3, "b", bin(var("a"), BinaryOp::Mul, num(21.0))),
    ]);

    let first = engine.step().unwrap().unwrap();
    assert_eq!(first, StepRecord::new(1, Some(Value::Num(2.0)), 3));
    assert!(!engine.is_finished());

    let second = engine.step().unwrap().unwrap();
    assert_eq!(second, StepRecord::new(3, Some(Value::Num(42.0)), 3));

    assert_eq!(engine.step().unwrap(), None);
    assert!(engine.is_finished());
    assert_eq!(engine.exit_status(), None);
}

#[test]
fn test_inputs_are_visible() {
    let mut engine = build_engine_with(
        vec![assign(1, "greeting", bin(text("Hello, "), BinaryOp::Add, var("name")))],
        hashmap! { "name".to_string() => Value::str("Ada") },
        Arc::new(NullHost),
        EngineOptions::default(),
    );

    run_to_end(&mut engine);

    assert_eq!(get(&engine, "greeting"), Value::str("Hello, Ada"));
}

#[test]
fn test_compound_assignment_on_struct_path() {
    let mut engine = build_engine(vec![
        assign_many(1, vec![field(var("order"), "total")], vec![num(5.0)]),
        Stmt::Assign {
            targets: vec![field(var("order"), "total")],
            op: AssignOp::Add,
            values: vec![num(2.0)],
            line: 2,
        },
    ]);

    let records = run_to_end(&mut engine);

    assert_eq!(records[1].value, Some(Value::Num(7.0)));
    assert_eq!(
        get(&engine, "order"),
        Value::Struct(maplit::btreemap! { "total".to_string() => Value::Num(7.0) })
    );
}

#[test]
fn test_multiple_assignment_records_array() {
    let mut engine = build_engine(vec![assign_many(
        1,
        vec![var("a"), var("b")],
        vec![num(1.0), text("two")],
    )]);

    let records = run_to_end(&mut engine);

    assert_eq!(
        records[0].value,
        Some(Value::Array(vec![Value::Num(1.0), Value::str("two")]))
    );
    assert_eq!(get(&engine, "b"), Value::str("two"));
}

#[test]
fn test_assignment_count_mismatch_faults() {
    let mut engine = build_engine(vec![assign_many(
        4,
        vec![var("a"), var("b")],
        vec![num(1.0)],
    )]);

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(err.line, 4);
    assert_eq!(
        err.cause,
        RuntimeError::AssignmentMismatch {
            targets: 2,
            values: 1
        }
    );
}

#[test]
fn test_constant_cannot_be_reassigned() {
    let mut engine = build_engine(vec![
        Stmt::Const {
            bindings: vec![ConstBinding {
                name: "PI".to_string(),
                value: num(3.14),
            }],
            line: 1,
        },
        assign(2, "PI", num(3.0)),
    ]);

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(err.line, 2);
    assert_eq!(err.cause, RuntimeError::AssignToConstant("PI".to_string()));
    assert_eq!(get(&engine, "PI"), Value::Num(3.14));
    assert_eq!(
        get(&engine, EXCEPTION_MESSAGE_KEY),
        Value::str("Error on line 2: Cannot assign to constant 'PI'")
    );
}

#[test]
fn test_undefined_variable_reports_line() {
    let mut engine = build_engine(vec![
        assign(1, "a", num(1.0)),
        assign(2, "b", bin(var("a"), BinaryOp::Add, var("missing"))),
    ]);

    assert!(engine.step().unwrap().is_some());
    let err = engine.step().unwrap_err();

    assert_eq!(err.line, 2);
    assert_eq!(err.cause, RuntimeError::UndefinedVariable("missing".to_string()));
    assert_eq!(err.to_string(), "Error on line 2: Undefined variable 'missing'");

    // The fault is reported once; afterwards the run is over
    assert!(engine.is_finished());
    assert_eq!(engine.step().unwrap(), None);
}

#[test]
fn test_delay_is_scaled_and_handed_to_host() {
    let mut engine = build_engine_with(
        vec![
            Stmt::Delay {
                duration: num(1500.0),
                line: 1,
            },
            assign(2, "after", num(1.0)),
        ],
        Default::default(),
        Arc::new(NullHost),
        EngineOptions {
            delay_multiplier: 0.5,
            ..Default::default()
        },
    );

    let record = engine.step().unwrap().unwrap();

    assert_eq!(record.value, Some(Value::Num(1500.0)));
    assert_eq!(engine.take_delay(), Some(Duration::from_millis(750)));
    assert_eq!(engine.take_delay(), None);
}

#[test]
fn test_suspend_sets_flag_until_resumed() {
    let mut engine = build_engine(vec![
        assign(1, "a", num(1.0)),
        Stmt::Suspend { line: 2 },
        assign(3, "b", num(2.0)),
    ]);

    engine.step().unwrap();
    let record = engine.step().unwrap().unwrap();

    assert_eq!(record, StepRecord::new(2, None, 3));
    assert!(engine.is_suspended());

    engine.resume();
    assert!(!engine.is_suspended());
    assert_eq!(engine.step().unwrap().unwrap().line, 3);
}

#[test]
fn test_status_reaches_host() {
    let host = Arc::new(MockServiceHost::new());
    let mut engine = build_engine_with(
        vec![Stmt::Status {
            text: bin(text("step "), BinaryOp::Add, num(1.0)),
            line: 1,
        }],
        Default::default(),
        host.clone(),
        EngineOptions::default(),
    );

    let records = run_to_end(&mut engine);

    assert_eq!(records[0].value, Some(Value::str("step 1")));
    assert_eq!(host.statuses(), vec!["step 1".to_string()]);
}

#[test]
fn test_cancelled_engine_fails_with_terminal_fault() {
    let mut engine = build_engine(vec![
        assign(1, "a", num(1.0)),
        assign(2, "b", num(2.0)),
    ]);

    engine.step().unwrap();
    engine.cancellation_token().cancel();
    let err = engine.step().unwrap_err();

    assert_eq!(err.line, 2);
    assert_eq!(err.cause, RuntimeError::Cancelled);
    assert_eq!(engine.step().unwrap(), None);
    assert!(!engine.scope().contains("b"));
}

#[test]
fn test_builtin_calls() {
    let mut engine = build_engine(vec![
        assign(1, "n", call("len", vec![text("héllo")])),
        assign(2, "u", call("upper", vec![text("abc")])),
        assign(3, "m", call("max", vec![num(3.0), num(9.0), num(4.0)])),
    ]);

    run_to_end(&mut engine);

    assert_eq!(get(&engine, "n"), Value::Num(5.0));
    assert_eq!(get(&engine, "u"), Value::str("ABC"));
    assert_eq!(get(&engine, "m"), Value::Num(9.0));
}

#[test]
fn test_unknown_function_faults() {
    let mut engine = build_engine(vec![Stmt::ProcedureCall(
        crate::executor::types::ProcedureCall {
            name: "frobnicate".to_string(),
            args: Vec::new(),
            line: 6,
        },
    )]);

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(err.line, 6);
    assert_eq!(err.cause, RuntimeError::UndefinedFunction("frobnicate".to_string()));
}

#[test]
fn test_empty_program_finishes_without_records() {
    let mut engine = build_engine(Vec::new());

    assert_eq!(engine.step().unwrap(), None);
    assert!(engine.is_finished());
}

#[test]
fn test_index_read() {
    let mut engine = build_engine(vec![
        assign(
            1,
            "xs",
            Expr::List {
                items: vec![num(10.0), num(20.0)],
                line: 1,
            },
        ),
        assign(2, "second", index(var("xs"), num(1.0))),
        assign(3, "oops", index(var("xs"), num(5.0))),
    ]);

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(get(&engine, "second"), Value::Num(20.0));
    assert_eq!(err.line, 3);
    assert_eq!(err.cause, RuntimeError::IndexOutOfRange { index: 5, len: 2 });
}
