//! Abstract Syntax Tree node types
//!
//! The tree is produced by an external parser and handed over as JSON.
//! Every node carries its 1-based source line. Block-like nodes own their
//! children exclusively.

use serde::{Deserialize, Serialize};

/// Ordered statement list with its opening and closing lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub line: u32,
    /// Closing line; filled in from the last child when absent
    #[serde(default)]
    pub end_line: u32,
}

impl Block {
    pub fn new(body: Vec<Stmt>, line: u32, end_line: u32) -> Self {
        Self {
            body,
            line,
            end_line,
        }
    }

    /// Line of the statement at `idx`, or the closing line past the end
    pub fn line_at(&self, idx: usize) -> u32 {
        self.body
            .get(idx)
            .map(Stmt::line)
            .unwrap_or(self.end_line)
    }
}

/// Assignment operator (`=` or a compound form)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AssignOp {
    #[default]
    #[serde(rename = "=")]
    Set,
    #[serde(rename = "+=")]
    Add,
    #[serde(rename = "-=")]
    Sub,
    #[serde(rename = "*=")]
    Mul,
    #[serde(rename = "/=")]
    Div,
    #[serde(rename = "%=")]
    Mod,
}

impl AssignOp {
    /// The binary operator a compound assignment desugars to
    pub fn binary(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Mod => Some(BinaryOp::Mod),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstBinding {
    pub name: String,
    pub value: Expr,
}

/// One `if`/`else if` arm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub test: Expr,
    pub block: Block,
}

/// Call of a built-in, user function, or declared web service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureCall {
    pub name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
    #[serde(default)]
    pub line: u32,
}

/// Field name on the right of a `Struct` access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attr {
    pub name: String,
    #[serde(default)]
    pub line: u32,
}

/// Statement AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Stmt {
    Compound(Block),
    Assign {
        targets: Vec<Expr>,
        #[serde(default)]
        op: AssignOp,
        values: Vec<Expr>,
        line: u32,
    },
    Const {
        bindings: Vec<ConstBinding>,
        line: u32,
    },
    Condition {
        branches: Vec<Branch>,
        #[serde(default)]
        else_block: Option<Block>,
        line: u32,
    },
    Cycle {
        test: Expr,
        body: Block,
        line: u32,
    },
    DoCycle {
        body: Block,
        test: Expr,
        line: u32,
    },
    Retry {
        attempts: Expr,
        body: Block,
        #[serde(default)]
        test: Option<Expr>,
        line: u32,
    },
    Label {
        name: String,
        line: u32,
    },
    GoToCall {
        label: String,
        line: u32,
    },
    SubCall {
        label: String,
        line: u32,
    },
    Return {
        #[serde(default)]
        value: Option<Expr>,
        line: u32,
    },
    Exit {
        #[serde(default)]
        status: Option<Expr>,
        line: u32,
    },
    TryCatch {
        body: Block,
        #[serde(default)]
        catch_var: Option<String>,
        catch: Block,
        line: u32,
    },
    Error {
        message: Expr,
        #[serde(default)]
        code: Option<Expr>,
        line: u32,
    },
    Throw {
        value: Expr,
        line: u32,
    },
    Delay {
        duration: Expr,
        line: u32,
    },
    Suspend {
        line: u32,
    },
    Status {
        text: Expr,
        line: u32,
    },
    DeclareWeb {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        #[serde(default)]
        outputs: Vec<String>,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        url: Option<Expr>,
        line: u32,
    },
    FunctionDecl {
        name: String,
        #[serde(default)]
        params: Vec<String>,
        body: Block,
        line: u32,
    },
    ProcedureCall(ProcedureCall),
    Include {
        module: String,
        body: Block,
        line: u32,
    },
    Input {
        name: String,
        line: u32,
    },
    Comment {
        #[serde(default)]
        text: String,
        line: u32,
    },
    Doc {
        #[serde(default)]
        text: String,
        line: u32,
    },
    NoOp {
        line: u32,
    },
}

impl Stmt {
    pub fn line(&self) -> u32 {
        match self {
            Stmt::Compound(block) => block.line,
            Stmt::ProcedureCall(call) => call.line,
            Stmt::Assign { line, .. }
            | Stmt::Const { line, .. }
            | Stmt::Condition { line, .. }
            | Stmt::Cycle { line, .. }
            | Stmt::DoCycle { line, .. }
            | Stmt::Retry { line, .. }
            | Stmt::Label { line, .. }
            | Stmt::GoToCall { line, .. }
            | Stmt::SubCall { line, .. }
            | Stmt::Return { line, .. }
            | Stmt::Exit { line, .. }
            | Stmt::TryCatch { line, .. }
            | Stmt::Error { line, .. }
            | Stmt::Throw { line, .. }
            | Stmt::Delay { line, .. }
            | Stmt::Suspend { line }
            | Stmt::Status { line, .. }
            | Stmt::DeclareWeb { line, .. }
            | Stmt::FunctionDecl { line, .. }
            | Stmt::Include { line, .. }
            | Stmt::Input { line, .. }
            | Stmt::Comment { line, .. }
            | Stmt::Doc { line, .. }
            | Stmt::NoOp { line } => *line,
        }
    }

    /// Comments and docs carry no runtime behavior
    pub fn is_comment(&self) -> bool {
        matches!(self, Stmt::Comment { .. } | Stmt::Doc { .. })
    }

    /// Child block selected by `sel`, if this statement has one
    pub fn block(&self, sel: BlockSel) -> Option<&Block> {
        match (self, sel) {
            (Stmt::Compound(block), BlockSel::Body) => Some(block),
            (Stmt::Condition { branches, .. }, BlockSel::Branch(i)) => {
                branches.get(i).map(|b| &b.block)
            }
            (Stmt::Condition { else_block, .. }, BlockSel::Else) => else_block.as_ref(),
            (Stmt::Cycle { body, .. }, BlockSel::Body)
            | (Stmt::DoCycle { body, .. }, BlockSel::Body)
            | (Stmt::Retry { body, .. }, BlockSel::Body)
            | (Stmt::TryCatch { body, .. }, BlockSel::Body)
            | (Stmt::Include { body, .. }, BlockSel::Body) => Some(body),
            (Stmt::TryCatch { catch, .. }, BlockSel::Catch) => Some(catch),
            _ => None,
        }
    }

    /// Child blocks that belong to the same code unit, with their selectors
    ///
    /// Function bodies are separate units and are not listed.
    pub fn child_blocks(&self) -> Vec<(BlockSel, &Block)> {
        match self {
            Stmt::Compound(block) => vec![(BlockSel::Body, block)],
            Stmt::Condition {
                branches,
                else_block,
                ..
            } => {
                let mut out: Vec<(BlockSel, &Block)> = branches
                    .iter()
                    .enumerate()
                    .map(|(i, b)| (BlockSel::Branch(i), &b.block))
                    .collect();
                if let Some(block) = else_block {
                    out.push((BlockSel::Else, block));
                }
                out
            }
            Stmt::Cycle { body, .. }
            | Stmt::DoCycle { body, .. }
            | Stmt::Retry { body, .. }
            | Stmt::Include { body, .. } => vec![(BlockSel::Body, body)],
            Stmt::TryCatch { body, catch, .. } => {
                vec![(BlockSel::Body, body), (BlockSel::Catch, catch)]
            }
            _ => Vec::new(),
        }
    }
}

/// Which child block of a statement a path goes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockSel {
    Body,
    Branch(usize),
    Else,
    Catch,
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Sub,
    #[serde(rename = "*")]
    Mul,
    #[serde(rename = "/")]
    Div,
    #[serde(rename = "%")]
    Mod,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "&&")]
    And,
    #[serde(rename = "||")]
    Or,
}

/// Unary operator, including the `(int)`-style casts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "!")]
    Not,
    #[serde(rename = "-")]
    Neg,
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "int")]
    Int,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "string")]
    Str,
    #[serde(rename = "bool")]
    Bool,
}

/// Expression AST node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum Expr {
    Num {
        v: f64,
        #[serde(default)]
        line: u32,
    },
    Bool {
        v: bool,
        #[serde(default)]
        line: u32,
    },
    Null {
        #[serde(default)]
        line: u32,
    },
    /// String literal; escapes are decoded when the program is linked
    String {
        v: String,
        #[serde(default)]
        line: u32,
    },
    Var {
        name: String,
        #[serde(default)]
        line: u32,
    },
    BinOp {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        #[serde(default)]
        line: u32,
    },
    UnaryOp {
        op: UnaryOp,
        operand: Box<Expr>,
        #[serde(default)]
        line: u32,
    },
    /// Member access `object.attr`
    Struct {
        object: Box<Expr>,
        attr: Attr,
        #[serde(default)]
        line: u32,
    },
    /// Index access `object[index]`
    Array {
        object: Box<Expr>,
        index: Box<Expr>,
        #[serde(default)]
        line: u32,
    },
    /// Array literal `[a, b, c]`
    List {
        items: Vec<Expr>,
        #[serde(default)]
        line: u32,
    },
    ProcedureCall(ProcedureCall),
    NoOp {
        #[serde(default)]
        line: u32,
    },
}

impl Expr {
    pub fn line(&self) -> u32 {
        match self {
            Expr::ProcedureCall(call) => call.line,
            Expr::Num { line, .. }
            | Expr::Bool { line, .. }
            | Expr::Null { line }
            | Expr::String { line, .. }
            | Expr::Var { line, .. }
            | Expr::BinOp { line, .. }
            | Expr::UnaryOp { line, .. }
            | Expr::Struct { line, .. }
            | Expr::Array { line, .. }
            | Expr::List { line, .. }
            | Expr::NoOp { line } => *line,
        }
    }
}
