//! Test helpers for engine tests
//!
//! Small constructors for AST nodes plus functions that link a program and
//! build an engine around it.

use crate::executor::types::{Attr, BinaryOp, Block, Branch, Expr, ProcedureCall, Stmt};
use crate::executor::{Engine, EngineOptions, Program, Scope, StepRecord, Value};
use crate::services::{NullHost, ServiceHost};
use std::collections::HashMap;
use std::sync::Arc;

/* ===================== Expressions ===================== */

pub fn num(v: f64) -> Expr {
    Expr::Num { v, line: 0 }
}

pub fn text(v: &str) -> Expr {
    Expr::String {
        v: v.to_string(),
        line: 0,
    }
}

pub fn var(name: &str) -> Expr {
    Expr::Var {
        name: name.to_string(),
        line: 0,
    }
}

pub fn bin(left: Expr, op: BinaryOp, right: Expr) -> Expr {
    Expr::BinOp {
        left: Box::new(left),
        op,
        right: Box::new(right),
        line: 0,
    }
}

pub fn call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::ProcedureCall(ProcedureCall {
        name: name.to_string(),
        args,
        line: 0,
    })
}

pub fn field(object: Expr, name: &str) -> Expr {
    Expr::Struct {
        object: Box::new(object),
        attr: Attr {
            name: name.to_string(),
            line: 0,
        },
        line: 0,
    }
}

pub fn index(object: Expr, idx: Expr) -> Expr {
    Expr::Array {
        object: Box::new(object),
        index: Box::new(idx),
        line: 0,
    }
}

/* ===================== Statements ===================== */

pub fn block(line: u32, end_line: u32, body: Vec<Stmt>) -> Block {
    Block::new(body, line, end_line)
}

pub fn assign(line: u32, name: &str, value: Expr) -> Stmt {
    assign_many(line, vec![var(name)], vec![value])
}

pub fn assign_many(line: u32, targets: Vec<Expr>, values: Vec<Expr>) -> Stmt {
    Stmt::Assign {
        targets,
        op: Default::default(),
        values,
        line,
    }
}

pub fn label(line: u32, name: &str) -> Stmt {
    Stmt::Label {
        name: name.to_string(),
        line,
    }
}

pub fn goto(line: u32, name: &str) -> Stmt {
    Stmt::GoToCall {
        label: name.to_string(),
        line,
    }
}

pub fn gosub(line: u32, name: &str) -> Stmt {
    Stmt::SubCall {
        label: name.to_string(),
        line,
    }
}

pub fn ret(line: u32, value: Option<Expr>) -> Stmt {
    Stmt::Return { value, line }
}

pub fn exit(line: u32, status: Option<Expr>) -> Stmt {
    Stmt::Exit { status, line }
}

pub fn throw(line: u32, value: Expr) -> Stmt {
    Stmt::Throw { value, line }
}

/// `if test { ... }` without else
pub fn when(line: u32, test: Expr, then: Block) -> Stmt {
    Stmt::Condition {
        branches: vec![Branch { test, block: then }],
        else_block: None,
        line,
    }
}

pub fn function(line: u32, name: &str, params: &[&str], body: Block) -> Stmt {
    Stmt::FunctionDecl {
        name: name.to_string(),
        params: params.iter().map(|p| p.to_string()).collect(),
        body,
        line,
    }
}

pub fn declare_web(line: u32, name: &str, params: &[&str], outputs: &[&str]) -> Stmt {
    Stmt::DeclareWeb {
        name: name.to_string(),
        params: params.iter().map(|p| p.to_string()).collect(),
        outputs: outputs.iter().map(|p| p.to_string()).collect(),
        alias: None,
        url: None,
        line,
    }
}

/* ===================== Engines ===================== */

/// Link a root block made of `body`
pub fn program(body: Vec<Stmt>) -> Arc<Program> {
    Arc::new(Program::new(Block::new(body, 0, 0)))
}

pub fn build_engine(body: Vec<Stmt>) -> Engine {
    build_engine_with(
        body,
        HashMap::new(),
        Arc::new(NullHost),
        EngineOptions::default(),
    )
}

pub fn build_engine_with(
    body: Vec<Stmt>,
    inputs: HashMap<String, Value>,
    host: Arc<dyn ServiceHost>,
    options: EngineOptions,
) -> Engine {
    Engine::new(program(body), Scope::with_inputs(host, inputs), options)
}

/// Load a JSON fixture and build an engine around it
pub fn fixture_engine(json: &str) -> Engine {
    let program = Program::from_json(json).expect("Fixture program should decode");
    Engine::new(
        Arc::new(program),
        Scope::default(),
        EngineOptions::default(),
    )
}

/// Step to the end, asserting no fault escapes
pub fn run_to_end(engine: &mut Engine) -> Vec<StepRecord> {
    match engine.run_until_done() {
        Ok(records) => records,
        Err(e) => panic!("Run failed: {}", e),
    }
}

pub fn lines(records: &[StepRecord]) -> Vec<u32> {
    records.iter().map(|r| r.line).collect()
}

pub fn get(engine: &Engine, name: &str) -> Value {
    engine
        .scope()
        .get(name)
        .unwrap_or_else(|e| panic!("{}", e))
        .clone()
}
