//! Program linking
//!
//! A `Program` is the immutable, fully-linked form of a parsed AST. Linking
//! happens once, before execution:
//! 1. Comment and Doc statements are dropped from every block
//! 2. Missing closing lines are filled in
//! 3. String literal escapes are decoded (unknown ones become warnings)
//! 4. Function declarations are hoisted into a table
//! 5. Label tables are built for every code unit
//! 6. Jump targets are checked statically

use super::errors::{LinkWarning, ProgramError};
use super::types::{Block, BlockPath, Expr, Stmt, StmtPath};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

/// A code unit: the main program or one function body
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Main,
    Function(String),
}

/// Hoisted user function
#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Block,
    pub line: u32,
    labels: HashMap<String, StmtPath>,
}

#[derive(Debug, Clone)]
pub struct Program {
    root: Block,
    labels: HashMap<String, StmtPath>,
    functions: HashMap<String, FunctionDef>,
    warnings: Vec<LinkWarning>,
    version_hash: String,
}

impl Program {
    /// Link a parsed root block
    pub fn new(mut root: Block) -> Self {
        let mut warnings = Vec::new();

        normalize_block(&mut root, &mut warnings);

        let version_hash = hash_block(&root);

        let mut functions = HashMap::new();
        collect_functions(&root, &mut functions, &mut warnings);

        let labels = build_labels(&root, &mut warnings);
        check_jumps(&root, &labels, &mut warnings);
        for def in functions.values() {
            check_jumps(&def.body, &def.labels, &mut warnings);
        }

        debug!(
            labels = labels.len(),
            functions = functions.len(),
            warnings = warnings.len(),
            "linked program"
        );

        Program {
            root,
            labels,
            functions,
            warnings,
            version_hash,
        }
    }

    /// Decode and link a program from its JSON AST (root `Compound` block)
    pub fn from_json(source: &str) -> Result<Self, ProgramError> {
        let json: serde_json::Value = serde_json::from_str(source)?;
        // Accept both `{"t": "Compound", ...}` and a bare block object
        let root = match serde_json::from_value::<Stmt>(json.clone()) {
            Ok(Stmt::Compound(block)) => block,
            _ => serde_json::from_value::<Block>(json)?,
        };
        Ok(Program::new(root))
    }

    pub fn root(&self) -> &Block {
        &self.root
    }

    pub fn warnings(&self) -> &[LinkWarning] {
        &self.warnings
    }

    /// SHA-256 of the linked program, hex encoded
    pub fn version_hash(&self) -> &str {
        &self.version_hash
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /* ===================== Resolution ===================== */

    pub fn unit_root(&self, unit: &Unit) -> &Block {
        match unit {
            Unit::Main => &self.root,
            Unit::Function(name) => match self.functions.get(name) {
                Some(def) => &def.body,
                None => panic!("Internal error: unknown function unit '{}'", name),
            },
        }
    }

    pub fn label(&self, unit: &Unit, name: &str) -> Option<&StmtPath> {
        match unit {
            Unit::Main => self.labels.get(name),
            Unit::Function(f) => self.functions.get(f).and_then(|def| def.labels.get(name)),
        }
    }

    /// Resolve a block path inside a unit
    ///
    /// Paths are only ever built from this program, so a dangling path is an
    /// engine bug.
    pub fn block(&self, unit: &Unit, path: &BlockPath) -> &Block {
        let mut block = self.unit_root(unit);
        for (index, sel) in &path.0 {
            block = match block.body.get(*index).and_then(|s| s.block(*sel)) {
                Some(b) => b,
                None => panic!("Internal error: dangling block path {:?}", path),
            };
        }
        block
    }

    pub fn stmt(&self, unit: &Unit, at: &StmtPath) -> &Stmt {
        match self.block(unit, &at.block).body.get(at.index) {
            Some(stmt) => stmt,
            None => panic!("Internal error: dangling statement path {:?}", at),
        }
    }
}

/* ===================== Normalization ===================== */

fn normalize_block(block: &mut Block, warnings: &mut Vec<LinkWarning>) {
    block.body.retain(|s| !s.is_comment());
    for stmt in block.body.iter_mut() {
        normalize_stmt(stmt, warnings);
    }
    if block.end_line == 0 {
        block.end_line = block
            .body
            .iter()
            .map(last_line)
            .max()
            .unwrap_or(0)
            .max(block.line);
    }
}

fn normalize_stmt(stmt: &mut Stmt, warnings: &mut Vec<LinkWarning>) {
    match stmt {
        Stmt::Compound(block) => normalize_block(block, warnings),
        Stmt::Assign {
            targets, values, ..
        } => {
            for e in targets.iter_mut().chain(values.iter_mut()) {
                decode_expr(e, warnings);
            }
        }
        Stmt::Const { bindings, .. } => {
            for b in bindings.iter_mut() {
                decode_expr(&mut b.value, warnings);
            }
        }
        Stmt::Condition {
            branches,
            else_block,
            ..
        } => {
            for branch in branches.iter_mut() {
                decode_expr(&mut branch.test, warnings);
                normalize_block(&mut branch.block, warnings);
            }
            if let Some(block) = else_block {
                normalize_block(block, warnings);
            }
        }
        Stmt::Cycle { test, body, .. } | Stmt::DoCycle { body, test, .. } => {
            decode_expr(test, warnings);
            normalize_block(body, warnings);
        }
        Stmt::Retry {
            attempts,
            body,
            test,
            ..
        } => {
            decode_expr(attempts, warnings);
            if let Some(t) = test {
                decode_expr(t, warnings);
            }
            normalize_block(body, warnings);
        }
        Stmt::TryCatch { body, catch, .. } => {
            normalize_block(body, warnings);
            normalize_block(catch, warnings);
        }
        Stmt::Return { value: e, .. } | Stmt::Exit { status: e, .. } => {
            if let Some(e) = e {
                decode_expr(e, warnings);
            }
        }
        Stmt::Error { message, code, .. } => {
            decode_expr(message, warnings);
            if let Some(c) = code {
                decode_expr(c, warnings);
            }
        }
        Stmt::Throw { value: e, .. }
        | Stmt::Delay { duration: e, .. }
        | Stmt::Status { text: e, .. } => decode_expr(e, warnings),
        Stmt::DeclareWeb { url, .. } => {
            if let Some(e) = url {
                decode_expr(e, warnings);
            }
        }
        Stmt::FunctionDecl { body, .. } | Stmt::Include { body, .. } => {
            normalize_block(body, warnings)
        }
        Stmt::ProcedureCall(call) => {
            for arg in call.args.iter_mut() {
                decode_expr(arg, warnings);
            }
        }
        Stmt::Label { .. }
        | Stmt::GoToCall { .. }
        | Stmt::SubCall { .. }
        | Stmt::Suspend { .. }
        | Stmt::Input { .. }
        | Stmt::Comment { .. }
        | Stmt::Doc { .. }
        | Stmt::NoOp { .. } => {}
    }
}

/// Deepest line inside a statement (closing lines included)
fn last_line(stmt: &Stmt) -> u32 {
    let nested = match stmt {
        Stmt::FunctionDecl { body, .. } => body.end_line,
        other => other
            .child_blocks()
            .iter()
            .map(|(_, b)| b.end_line)
            .max()
            .unwrap_or(0),
    };
    stmt.line().max(nested)
}

fn decode_expr(expr: &mut Expr, warnings: &mut Vec<LinkWarning>) {
    match expr {
        Expr::String { v, line } => {
            let (decoded, unknown) = decode_escapes(v);
            for sequence in unknown {
                warnings.push(LinkWarning::UnrecognizedEscape {
                    line: *line,
                    sequence,
                });
            }
            *v = decoded;
        }
        Expr::BinOp { left, right, .. } => {
            decode_expr(left, warnings);
            decode_expr(right, warnings);
        }
        Expr::UnaryOp { operand, .. } => decode_expr(operand, warnings),
        Expr::Struct { object, .. } => decode_expr(object, warnings),
        Expr::Array { object, index, .. } => {
            decode_expr(object, warnings);
            decode_expr(index, warnings);
        }
        Expr::List { items, .. } => {
            for item in items.iter_mut() {
                decode_expr(item, warnings);
            }
        }
        Expr::ProcedureCall(call) => {
            for arg in call.args.iter_mut() {
                decode_expr(arg, warnings);
            }
        }
        Expr::Num { .. } | Expr::Bool { .. } | Expr::Null { .. } | Expr::Var { .. } => {}
        Expr::NoOp { .. } => {}
    }
}

/// Decode backslash escapes in a raw string literal
///
/// Returns the decoded text and every unrecognized sequence, which is kept
/// verbatim in the output.
pub fn decode_escapes(raw: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(raw.len());
    let mut unknown = Vec::new();
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                let seq = format!("\\{}", other);
                out.push_str(&seq);
                unknown.push(seq);
            }
            None => {
                out.push('\\');
                unknown.push("\\".to_string());
            }
        }
    }

    (out, unknown)
}

fn hash_block(root: &Block) -> String {
    let bytes = serde_json::to_vec(root).unwrap_or_default();
    format!("{:x}", Sha256::digest(&bytes))
}

/* ===================== Functions & Labels ===================== */

fn collect_functions(
    block: &Block,
    out: &mut HashMap<String, FunctionDef>,
    warnings: &mut Vec<LinkWarning>,
) {
    for stmt in &block.body {
        if let Stmt::FunctionDecl {
            name,
            params,
            body,
            line,
        } = stmt
        {
            let labels = build_labels(body, warnings);
            out.insert(
                name.clone(),
                FunctionDef {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                    line: *line,
                    labels,
                },
            );
            collect_functions(body, out, warnings);
        }
        for (_, child) in stmt.child_blocks() {
            collect_functions(child, out, warnings);
        }
    }
}

fn build_labels(root: &Block, warnings: &mut Vec<LinkWarning>) -> HashMap<String, StmtPath> {
    let mut labels = HashMap::new();
    walk_labels(root, &BlockPath::root(), &mut labels, warnings);
    labels
}

fn walk_labels(
    block: &Block,
    path: &BlockPath,
    labels: &mut HashMap<String, StmtPath>,
    warnings: &mut Vec<LinkWarning>,
) {
    for (index, stmt) in block.body.iter().enumerate() {
        if let Stmt::Label { name, line } = stmt {
            if labels.contains_key(name) {
                warnings.push(LinkWarning::DuplicateLabel {
                    line: *line,
                    name: name.clone(),
                });
            } else {
                labels.insert(name.clone(), StmtPath::new(path.clone(), index));
            }
        }
        for (sel, child) in stmt.child_blocks() {
            walk_labels(child, &path.child(index, sel), labels, warnings);
        }
    }
}

fn check_jumps(
    block: &Block,
    labels: &HashMap<String, StmtPath>,
    warnings: &mut Vec<LinkWarning>,
) {
    for stmt in &block.body {
        match stmt {
            Stmt::GoToCall { label, line } | Stmt::SubCall { label, line } => {
                if !labels.contains_key(label) {
                    warnings.push(LinkWarning::UndefinedLabel {
                        line: *line,
                        name: label.clone(),
                    });
                }
            }
            _ => {}
        }
        for (_, child) in stmt.child_blocks() {
            check_jumps(child, labels, warnings);
        }
    }
}
