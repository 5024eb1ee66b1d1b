//! Syntax-tree descriptors produced by the (external) parser.
//!
//! Nodes are read-only data; all compiled output lives in the
//! `CompilerContext` they are compiled against. The one piece of
//! construction-time logic is [`Block::new`], which guarantees a block is
//! never empty and that only its final statement keeps its value.

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    Integer(i64),
    String(String),
    Array(Vec<Expression>),
    SelfRef,
    Variable(String),
    InstanceVariable(String),
    Assignment {
        target: String,
        value: Box<Expression>,
    },
    InstanceVariableAssignment {
        name: String,
        value: Box<Expression>,
    },
    BinOp {
        op: String,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Send {
        receiver: Box<Expression>,
        method: String,
        args: Vec<Expression>,
    },
    If {
        cond: Box<Expression>,
        body: Block,
    },
    While {
        cond: Box<Expression>,
        body: Block,
    },
    Class {
        name: String,
        /// Carried for the parser's benefit; superclass resolution is the
        /// VM's job and the compiler emits a nil placeholder instead.
        superclass: Option<String>,
        body: Block,
    },
    Function {
        name: String,
        params: Vec<String>,
        body: Block,
    },
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Expr {
        expression: Expression,
        /// Set by [`Block::new`] on the final statement only: its value is
        /// the block's value and must stay on the stack.
        dont_pop: bool,
    },
    Return(Expression),
}

impl Statement {
    pub fn expr(expression: Expression) -> Self {
        Statement::Expr {
            expression,
            dont_pop: false,
        }
    }
}

/// An ordered, never-empty statement sequence.
#[derive(Debug, PartialEq, Clone)]
pub struct Block {
    statements: Vec<Statement>,
}

impl Block {
    /// An empty statement list is normalized to a single statement
    /// evaluating `nil`, so every block yields a value.
    pub fn new(mut statements: Vec<Statement>) -> Self {
        if statements.is_empty() {
            statements.push(Statement::expr(Expression::Variable("nil".to_string())));
        }
        if let Some(Statement::Expr { dont_pop, .. }) = statements.last_mut() {
            *dont_pop = true;
        }
        Self { statements }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

/// Program entry wrapper: the top-level block of a source file.
#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub block: Block,
}

impl Program {
    pub fn new(block: Block) -> Self {
        Self { block }
    }
}
