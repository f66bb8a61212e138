//! GoTo, GoSub and the next-line reported around them

use super::helpers::*;
use crate::executor::errors::RuntimeError;
use crate::executor::types::BinaryOp;
use crate::executor::{EngineOptions, LinkWarning, Value};
use crate::services::NullHost;
use std::sync::Arc;

#[test]
fn test_goto_loops_back_to_label() {
    // 1 x = 1
    // 2 LABEL again
    // 3 x = x + 1
    // 4 if x < 3 goto again
    // 5 return x
    let mut engine = build_engine(vec![
        assign(1, "x", num(1.0)),
        label(2, "again"),
        assign(3, "x", bin(var("x"), BinaryOp::Add, num(1.0))),
        when(
            4,
            bin(var("x"), BinaryOp::Lt, num(3.0)),
            block(4, 0, vec![goto(4, "again")]),
        ),
        ret(5, Some(var("x"))),
    ]);

    let records = run_to_end(&mut engine);

    assert_eq!(lines(&records), vec![1, 2, 3, 4, 3, 5]);
    assert_eq!(records[3].next_line, 3);
    assert_eq!(records[5].value, Some(Value::Num(3.0)));
    assert_eq!(engine.exit_status(), Some(&Value::Num(3.0)));
}

#[test]
fn test_gosub_returns_after_call_site() {
    // 1 x = 0
    // 2 gosub inc
    // 3 gosub inc
    // 4 exit x
    // 5 LABEL inc
    // 6 x = x + 1
    // 7 return
    let mut engine = build_engine(vec![
        assign(1, "x", num(0.0)),
        gosub(2, "inc"),
        gosub(3, "inc"),
        exit(4, Some(var("x"))),
        label(5, "inc"),
        assign(6, "x", bin(var("x"), BinaryOp::Add, num(1.0))),
        ret(7, None),
    ]);

    let records = run_to_end(&mut engine);

    assert_eq!(lines(&records), vec![1, 2, 6, 7, 3, 6, 7, 4]);
    assert_eq!(records[1].next_line, 6);
    assert_eq!(records[3].next_line, 3);
    assert_eq!(records[6].next_line, 4);
    assert_eq!(engine.exit_status(), Some(&Value::Num(2.0)));
}

#[test]
fn test_goto_inside_subroutine_keeps_return_address() {
    // 1 x = 0
    // 2 gosub work
    // 3 exit x
    // 4 LABEL work
    // 5 x = x + 1
    // 6 if x < 3 goto work
    // 7 return
    let mut engine = build_engine(vec![
        assign(1, "x", num(0.0)),
        gosub(2, "work"),
        exit(3, Some(var("x"))),
        label(4, "work"),
        assign(5, "x", bin(var("x"), BinaryOp::Add, num(1.0))),
        when(
            6,
            bin(var("x"), BinaryOp::Lt, num(3.0)),
            block(6, 0, vec![goto(6, "work")]),
        ),
        ret(7, None),
    ]);

    let records = run_to_end(&mut engine);

    assert_eq!(lines(&records), vec![1, 2, 5, 6, 5, 6, 5, 7, 3]);
    assert_eq!(records[7].next_line, 3);
    assert_eq!(engine.exit_status(), Some(&Value::Num(3.0)));
}

#[test]
fn test_recursive_gosub_unwinds_in_order() {
    // 1 n = 3
    // 2 gosub down
    // 3 exit n
    // 4 LABEL down
    // 5 if n > 0 {
    // 6   n = n - 1
    // 7   gosub down
    // 8 }
    // 9 return
    let mut engine = build_engine(vec![
        assign(1, "n", num(3.0)),
        gosub(2, "down"),
        exit(3, Some(var("n"))),
        label(4, "down"),
        when(
            5,
            bin(var("n"), BinaryOp::Gt, num(0.0)),
            block(
                5,
                8,
                vec![
                    assign(6, "n", bin(var("n"), BinaryOp::Sub, num(1.0))),
                    gosub(7, "down"),
                ],
            ),
        ),
        ret(9, None),
    ]);

    let records = run_to_end(&mut engine);

    let returns: Vec<u32> = records
        .iter()
        .filter(|r| r.line == 9)
        .map(|r| r.next_line)
        .collect();
    assert_eq!(returns, vec![8, 8, 8, 3]);
    assert_eq!(get(&engine, "n"), Value::Num(0.0));
    assert_eq!(engine.exit_status(), Some(&Value::Num(0.0)));
}

#[test]
fn test_goto_into_loop_body_keeps_looping() {
    // 1 i = 0
    // 2 goto inside
    // 3 while i < 3 {
    // 4   i = i + 10
    // 5   LABEL inside
    // 6   i = i + 1
    // 7 }
    // 8 exit i
    let mut engine = build_engine(vec![
        assign(1, "i", num(0.0)),
        goto(2, "inside"),
        crate::executor::Stmt::Cycle {
            test: bin(var("i"), BinaryOp::Lt, num(3.0)),
            body: block(
                3,
                7,
                vec![
                    assign(4, "i", bin(var("i"), BinaryOp::Add, num(10.0))),
                    label(5, "inside"),
                    assign(6, "i", bin(var("i"), BinaryOp::Add, num(1.0))),
                ],
            ),
            line: 3,
        },
        exit(8, Some(var("i"))),
    ]);

    let records = run_to_end(&mut engine);

    assert_eq!(lines(&records), vec![1, 2, 6, 4, 5, 6, 8]);
    assert_eq!(records[1].next_line, 6);
    assert_eq!(records[2].next_line, 7);
    assert_eq!(get(&engine, "i"), Value::Num(12.0));
}

#[test]
fn test_goto_undefined_label_warns_and_faults() {
    let mut engine = build_engine(vec![assign(1, "a", num(1.0)), goto(2, "nowhere")]);

    assert_eq!(
        engine.program().warnings(),
        &[LinkWarning::UndefinedLabel {
            line: 2,
            name: "nowhere".to_string()
        }]
    );

    let err = engine.run_until_done().unwrap_err();
    assert_eq!(err.line, 2);
    assert_eq!(err.cause, RuntimeError::UndefinedLabel("nowhere".to_string()));
}

#[test]
fn test_duplicate_label_keeps_first() {
    // 1 goto twice
    // 2 a = 1
    // 3 LABEL twice
    // 4 b = 1
    // 5 LABEL twice
    // 6 c = 1
    let mut engine = build_engine(vec![
        goto(1, "twice"),
        assign(2, "a", num(1.0)),
        label(3, "twice"),
        assign(4, "b", num(1.0)),
        label(5, "twice"),
        assign(6, "c", num(1.0)),
    ]);

    let records = run_to_end(&mut engine);

    assert!(engine
        .program()
        .warnings()
        .iter()
        .any(|w| matches!(w, LinkWarning::DuplicateLabel { line: 5, .. })));
    assert_eq!(lines(&records), vec![1, 4, 5, 6]);
    assert!(!engine.scope().contains("a"));
}

#[test]
fn test_runaway_gosub_hits_depth_limit() {
    let mut engine = build_engine_with(
        vec![label(1, "again"), gosub(2, "again")],
        Default::default(),
        Arc::new(NullHost),
        EngineOptions {
            max_call_depth: 4,
            ..Default::default()
        },
    );

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(err.line, 2);
    assert_eq!(err.cause, RuntimeError::CallDepthExceeded(4));
}

#[test]
fn test_return_in_main_ends_run() {
    let mut engine = build_engine(vec![
        ret(1, Some(num(7.0))),
        assign(2, "never", num(1.0)),
    ]);

    let records = run_to_end(&mut engine);

    assert_eq!(lines(&records), vec![1]);
    assert_eq!(records[0].next_line, 2);
    assert_eq!(engine.exit_status(), Some(&Value::Num(7.0)));
}
