//! User functions: stepping through bodies, replay, shadowing and depth

use super::helpers::*;
use crate::executor::errors::RuntimeError;
use crate::executor::types::{BinaryOp, ProcedureCall, Stmt};
use crate::executor::{EngineOptions, Expr, StepRecord, Value};
use crate::services::{MockServiceHost, NullHost};
use std::sync::Arc;

#[test]
fn test_function_body_is_stepped() {
    // 1 function add(a, b) {
    // 2   s = a + b
    // 3   return s
    // 4 }
    // 5 r = add(2, 3)
    let mut engine = build_engine(vec![
        function(
            1,
            "add",
            &["a", "b"],
            block(
                1,
                4,
                vec![
                    assign(2, "s", bin(var("a"), BinaryOp::Add, var("b"))),
                    ret(3, Some(var("s"))),
                ],
            ),
        ),
        assign(5, "r", call("add", vec![num(2.0), num(3.0)])),
    ]);

    let records = run_to_end(&mut engine);

    assert_eq!(
        records,
        vec![
            StepRecord::new(1, None, 5),
            StepRecord::new(2, Some(Value::Num(5.0)), 3),
            StepRecord::new(3, Some(Value::Num(5.0)), 5),
            StepRecord::new(5, Some(Value::Num(5.0)), 5),
        ]
    );
    assert_eq!(get(&engine, "r"), Value::Num(5.0));
    assert!(!engine.scope().contains("a"));
}

#[test]
fn test_call_results_are_not_repeated_after_return() {
    // 1 function double(v) {
    // 2   return v * 2
    // 3 }
    // 4 declare web Count
    // 5 r = Count() + double(Count())
    let host = Arc::new(MockServiceHost::new().with_response("Count", Value::Num(5.0)));
    let mut engine = build_engine_with(
        vec![
            function(
                1,
                "double",
                &["v"],
                block(1, 3, vec![ret(2, Some(bin(var("v"), BinaryOp::Mul, num(2.0))))]),
            ),
            declare_web(4, "Count", &[], &[]),
            assign(
                5,
                "r",
                bin(
                    call("Count", vec![]),
                    BinaryOp::Add,
                    call("double", vec![call("Count", vec![])]),
                ),
            ),
        ],
        Default::default(),
        host.clone(),
        EngineOptions::default(),
    );

    let records = run_to_end(&mut engine);

    assert_eq!(
        records,
        vec![
            StepRecord::new(1, None, 4),
            StepRecord::new(4, None, 5),
            StepRecord::new(2, Some(Value::Num(10.0)), 5),
            StepRecord::new(5, Some(Value::Num(15.0)), 5),
        ]
    );
    assert_eq!(host.requests().len(), 2);
}

#[test]
fn test_parameters_shadow_and_restore_globals() {
    let mut engine = build_engine(vec![
        assign(1, "v", num(7.0)),
        function(
            2,
            "inc",
            &["v"],
            block(2, 4, vec![ret(3, Some(bin(var("v"), BinaryOp::Add, num(1.0))))]),
        ),
        assign(5, "r", call("inc", vec![num(1.0)])),
    ]);

    run_to_end(&mut engine);

    assert_eq!(get(&engine, "r"), Value::Num(2.0));
    assert_eq!(get(&engine, "v"), Value::Num(7.0));
}

#[test]
fn test_function_writes_to_globals() {
    let mut engine = build_engine(vec![
        function(
            1,
            "touch",
            &[],
            block(1, 3, vec![assign(2, "seen", Expr::Bool { v: true, line: 2 })]),
        ),
        Stmt::ProcedureCall(ProcedureCall {
            name: "touch".to_string(),
            args: Vec::new(),
            line: 4,
        }),
    ]);

    let records = run_to_end(&mut engine);

    // Falling off the end of the body returns null
    assert_eq!(records.last(), Some(&StepRecord::new(4, Some(Value::Null), 4)));
    assert_eq!(get(&engine, "seen"), Value::Bool(true));
}

#[test]
fn test_fault_in_function_reports_inner_line() {
    // 1 function f(x) {
    // 2   y = 1
    // 3   return x / 0
    // 4 }
    // 5 r = f(1)
    let mut engine = build_engine(vec![
        function(
            1,
            "f",
            &["x"],
            block(
                1,
                4,
                vec![
                    assign(2, "y", num(1.0)),
                    ret(3, Some(bin(var("x"), BinaryOp::Div, num(0.0)))),
                ],
            ),
        ),
        assign(5, "r", call("f", vec![num(1.0)])),
    ]);

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(err.line, 3);
    assert_eq!(err.cause, RuntimeError::DivisionByZero);
    assert!(!engine.scope().contains("x"));
}

#[test]
fn test_wrong_argument_count() {
    let mut engine = build_engine(vec![
        function(1, "one", &["a"], block(1, 3, vec![ret(2, Some(var("a")))])),
        assign(4, "r", call("one", vec![num(1.0), num(2.0)])),
    ]);

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(err.line, 4);
    assert_eq!(
        err.cause,
        RuntimeError::WrongArgCount {
            function: "one".to_string(),
            expected: 1,
            got: 2
        }
    );
}

#[test]
fn test_unbounded_recursion_hits_depth_limit() {
    let mut engine = build_engine_with(
        vec![
            function(
                1,
                "down",
                &["n"],
                block(
                    1,
                    3,
                    vec![ret(
                        2,
                        Some(call("down", vec![bin(var("n"), BinaryOp::Add, num(1.0))])),
                    )],
                ),
            ),
            assign(4, "r", call("down", vec![num(0.0)])),
        ],
        Default::default(),
        Arc::new(NullHost),
        EngineOptions {
            max_call_depth: 8,
            ..Default::default()
        },
    );

    let err = engine.run_until_done().unwrap_err();

    assert_eq!(err.line, 2);
    assert_eq!(err.cause, RuntimeError::CallDepthExceeded(8));
}

#[test]
fn test_recursive_function_computes_factorial() {
    // fact(n) = n <= 1 ? 1 : n * fact(n - 1)
    let mut engine = build_engine(vec![
        function(
            1,
            "fact",
            &["n"],
            block(
                1,
                5,
                vec![
                    when(
                        2,
                        bin(var("n"), BinaryOp::Le, num(1.0)),
                        block(2, 2, vec![ret(2, Some(num(1.0)))]),
                    ),
                    ret(
                        4,
                        Some(bin(
                            var("n"),
                            BinaryOp::Mul,
                            call("fact", vec![bin(var("n"), BinaryOp::Sub, num(1.0))]),
                        )),
                    ),
                ],
            ),
        ),
        assign(6, "r", call("fact", vec![num(5.0)])),
    ]);

    run_to_end(&mut engine);

    assert_eq!(get(&engine, "r"), Value::Num(120.0));
    assert!(!engine.scope().contains("n"));
}

#[test]
fn test_goto_inside_function_uses_function_labels() {
    // 1 function count() {
    // 2   i = 0
    // 3   LABEL top
    // 4   i = i + 1
    // 5   if i < 3 goto top
    // 6   return i
    // 7 }
    // 8 LABEL top
    // 9 r = count()
    let mut engine = build_engine(vec![
        function(
            1,
            "count",
            &[],
            block(
                1,
                7,
                vec![
                    assign(2, "i", num(0.0)),
                    label(3, "top"),
                    assign(4, "i", bin(var("i"), BinaryOp::Add, num(1.0))),
                    when(
                        5,
                        bin(var("i"), BinaryOp::Lt, num(3.0)),
                        block(5, 5, vec![goto(5, "top")]),
                    ),
                    ret(6, Some(var("i"))),
                ],
            ),
        ),
        label(8, "top"),
        assign(9, "r", call("count", vec![])),
    ]);

    run_to_end(&mut engine);

    assert_eq!(get(&engine, "r"), Value::Num(3.0));
}
