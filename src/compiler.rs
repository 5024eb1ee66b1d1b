//! Single-pass AST-to-bytecode compilation.
//!
//! [`compile`] walks the tree once, recursive-descent, emitting into a
//! [`CompilerContext`]. Every expression nets exactly one value on the VM
//! stack; statements discard that value unless they are a block's final
//! statement. Class and function bodies compile in fresh contexts whose
//! assembled bytecode enters the enclosing unit's constant pool as a code
//! object.

use std::rc::Rc;

use anyhow::Result;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::ast::{Block, Expression, Program, Statement};
use crate::bytecode::{Bytecode, Instruction};
use crate::objspace::{ObjectRef, ObjectSpace};

/// Internal bookkeeping defects. A well-formed AST can never trigger these;
/// they guard the forward-jump discipline inside this module.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Instruction at position {pos} is not a jump")]
    NotAJump { pos: usize },
    #[error("No forward jump pending at position {pos}")]
    NotPending { pos: usize },
    #[error("Forward jump at position {pos} was never patched")]
    UnpatchedJump { pos: usize },
}

/// Mutable compiler state for one lexical unit: the top level, or one
/// class or function body. Nested units get their own context and share
/// nothing with the parent but the object space.
pub struct CompilerContext<'space> {
    pub space: &'space ObjectSpace,
    code: Vec<Instruction>,
    consts: Vec<ObjectRef>,
    symbols: Vec<String>,
    symbol_indices: FxHashMap<String, usize>,
    int_consts: FxHashMap<i64, usize>,
    string_consts: FxHashMap<String, usize>,
    locals: FxHashMap<String, usize>,
    pending_jumps: Vec<usize>,
}

impl<'space> CompilerContext<'space> {
    pub fn new(space: &'space ObjectSpace) -> Self {
        Self {
            space,
            code: Vec::new(),
            consts: Vec::new(),
            symbols: Vec::new(),
            symbol_indices: FxHashMap::default(),
            int_consts: FxHashMap::default(),
            string_consts: FxHashMap::default(),
            locals: FxHashMap::default(),
            pending_jumps: Vec::new(),
        }
    }

    pub fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }

    /// Position of the next instruction to be emitted.
    pub fn get_pos(&self) -> usize {
        self.code.len()
    }

    /// Emits a jump whose target is not known yet and records it for
    /// patching. Returns the position to hand to [`patch_jump`].
    ///
    /// [`patch_jump`]: CompilerContext::patch_jump
    pub fn emit_jump(&mut self, instruction: Instruction) -> usize {
        let pos = self.get_pos();
        self.code.push(instruction);
        self.pending_jumps.push(pos);
        pos
    }

    /// Points the pending jump at `pos` to the current end of the
    /// instruction sequence.
    pub fn patch_jump(&mut self, pos: usize) -> Result<(), CompileError> {
        let Some(slot) = self.pending_jumps.iter().position(|&pending| pending == pos) else {
            return Err(CompileError::NotPending { pos });
        };
        let target = self.get_pos();
        match self.code.get_mut(pos) {
            Some(Instruction::Jump(operand)) | Some(Instruction::JumpIfFalse(operand)) => {
                *operand = target;
            }
            _ => return Err(CompileError::NotAJump { pos }),
        }
        self.pending_jumps.swap_remove(slot);
        Ok(())
    }

    /// Returns the slot for `name`, allocating the next free one on first
    /// reference. Slots are never reclaimed within a unit.
    pub fn create_local(&mut self, name: &str) -> usize {
        if let Some(&slot) = self.locals.get(name) {
            return slot;
        }
        let slot = self.locals.len();
        self.locals.insert(name.to_string(), slot);
        slot
    }

    pub fn local_defined(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Adds an object to the constant pool, deduplicating by reference
    /// identity: singletons and interned symbols share a slot, freshly
    /// constructed objects never collapse.
    pub fn create_const(&mut self, obj: ObjectRef) -> usize {
        if let Some(pos) = self
            .consts
            .iter()
            .position(|existing| Rc::ptr_eq(existing, &obj))
        {
            return pos;
        }
        self.consts.push(obj);
        self.consts.len() - 1
    }

    pub fn create_int_const(&mut self, value: i64) -> usize {
        if let Some(&pos) = self.int_consts.get(&value) {
            return pos;
        }
        let obj = self.space.newint(value);
        let pos = self.create_const(obj);
        self.int_consts.insert(value, pos);
        pos
    }

    /// Equal string literals share one pooled master; that is unobservable
    /// because every evaluation copies it (`CopyString`).
    pub fn create_string_const(&mut self, value: &str) -> usize {
        if let Some(&pos) = self.string_consts.get(value) {
            return pos;
        }
        let obj = self.space.newstr(value);
        let pos = self.create_const(obj);
        self.string_consts.insert(value.to_string(), pos);
        pos
    }

    /// Adds a name to the symbol pool, returning the existing index if it
    /// is already interned.
    pub fn create_symbol_const(&mut self, name: &str) -> usize {
        if let Some(&pos) = self.symbol_indices.get(name) {
            return pos;
        }
        self.symbols.push(name.to_string());
        let pos = self.symbols.len() - 1;
        self.symbol_indices.insert(name.to_string(), pos);
        pos
    }

    /// Freezes the unit into an immutable [`Bytecode`]. Every forward jump
    /// must have been patched by now.
    pub fn create_bytecode(self) -> Result<Bytecode, CompileError> {
        if let Some(&pos) = self.pending_jumps.first() {
            return Err(CompileError::UnpatchedJump { pos });
        }
        Ok(Bytecode {
            code: self.code,
            consts: self.consts,
            symbols: self.symbols,
            locals: self.locals.len(),
        })
    }
}

/// Compiles a whole program into one top-level bytecode unit. The program
/// discards its block's value and returns `true` to the host, whatever the
/// body evaluated to.
pub fn compile(space: &ObjectSpace, program: &Program) -> Result<Bytecode> {
    let mut ctx = CompilerContext::new(space);
    compile_block(&program.block, &mut ctx)?;
    ctx.emit(Instruction::DiscardTop);
    load_const(ctx.space.w_true.clone(), &mut ctx);
    ctx.emit(Instruction::Return);
    Ok(ctx.create_bytecode()?)
}

fn load_const(obj: ObjectRef, ctx: &mut CompilerContext<'_>) {
    let idx = ctx.create_const(obj);
    ctx.emit(Instruction::LoadConst(idx));
}

fn compile_block(block: &Block, ctx: &mut CompilerContext<'_>) -> Result<()> {
    for statement in block.statements() {
        compile_statement(statement, ctx)?;
    }
    Ok(())
}

fn compile_statement(statement: &Statement, ctx: &mut CompilerContext<'_>) -> Result<()> {
    match statement {
        Statement::Expr {
            expression,
            dont_pop,
        } => {
            compile_expression(expression, ctx)?;
            if !dont_pop {
                ctx.emit(Instruction::DiscardTop);
            }
        }
        Statement::Return(expression) => {
            compile_expression(expression, ctx)?;
            ctx.emit(Instruction::Return);
        }
    }
    Ok(())
}

fn compile_expression(expression: &Expression, ctx: &mut CompilerContext<'_>) -> Result<()> {
    match expression {
        Expression::Integer(value) => {
            let idx = ctx.create_int_const(*value);
            ctx.emit(Instruction::LoadConst(idx));
        }
        Expression::String(value) => {
            // String literals are mutable at the language level; every
            // evaluation must yield a fresh copy of the pooled master.
            let idx = ctx.create_string_const(value);
            ctx.emit(Instruction::LoadConst(idx));
            ctx.emit(Instruction::CopyString);
        }
        Expression::Array(items) => {
            for item in items {
                compile_expression(item, ctx)?;
            }
            ctx.emit(Instruction::BuildArray(items.len()));
        }
        Expression::SelfRef => ctx.emit(Instruction::LoadSelf),
        Expression::Variable(name) => match name.as_str() {
            "true" => load_const(ctx.space.w_true.clone(), ctx),
            "false" => load_const(ctx.space.w_false.clone(), ctx),
            "nil" => load_const(ctx.space.w_nil.clone(), ctx),
            "self" => ctx.emit(Instruction::LoadSelf),
            _ if ctx.local_defined(name) => {
                let slot = ctx.create_local(name);
                ctx.emit(Instruction::LoadLocal(slot));
            }
            _ if name.starts_with(char::is_uppercase) => {
                let symbol = ctx.create_symbol_const(name);
                ctx.emit(Instruction::LoadConstBinding(symbol));
            }
            // A bare lowercase name with no local binding is a
            // zero-argument call on self.
            _ => compile_send(&Expression::SelfRef, name, &[], ctx)?,
        },
        Expression::InstanceVariable(name) => {
            ctx.emit(Instruction::LoadSelf);
            let symbol = ctx.create_symbol_const(name);
            ctx.emit(Instruction::LoadInstanceVar(symbol));
        }
        Expression::Assignment { target, value } => {
            if target.starts_with(char::is_uppercase) {
                compile_expression(value, ctx)?;
                let symbol = ctx.create_symbol_const(target);
                ctx.emit(Instruction::StoreConstBinding(symbol));
            } else {
                // The slot exists before the value compiles, so the name
                // resolves as this local inside its own initializer.
                let slot = ctx.create_local(target);
                compile_expression(value, ctx)?;
                ctx.emit(Instruction::StoreLocal(slot));
            }
        }
        Expression::InstanceVariableAssignment { name, value } => {
            compile_expression(value, ctx)?;
            ctx.emit(Instruction::LoadSelf);
            let symbol = ctx.create_symbol_const(name);
            ctx.emit(Instruction::StoreInstanceVar(symbol));
        }
        Expression::BinOp { op, left, right } => {
            compile_send(left, op, std::slice::from_ref(right), ctx)?;
        }
        Expression::Send {
            receiver,
            method,
            args,
        } => compile_send(receiver, method, args, ctx)?,
        Expression::If { cond, body } => {
            compile_expression(cond, ctx)?;
            let else_jump = ctx.emit_jump(Instruction::JumpIfFalse(0));
            compile_block(body, ctx)?;
            let end_jump = ctx.emit_jump(Instruction::Jump(0));
            ctx.patch_jump(else_jump)?;
            // The implicit else branch yields nil, keeping both branches
            // at the same stack depth.
            load_const(ctx.space.w_nil.clone(), ctx);
            ctx.patch_jump(end_jump)?;
        }
        Expression::While { cond, body } => {
            let start = ctx.get_pos();
            compile_expression(cond, ctx)?;
            let exit_jump = ctx.emit_jump(Instruction::JumpIfFalse(0));
            compile_block(body, ctx)?;
            // The body's value is not the loop's value.
            ctx.emit(Instruction::DiscardTop);
            ctx.emit(Instruction::Jump(start));
            ctx.patch_jump(exit_jump)?;
            load_const(ctx.space.w_nil.clone(), ctx);
        }
        Expression::Class { name, body, .. } => {
            ctx.emit(Instruction::LoadSelf);
            load_const(ctx.space.newsymbol(name), ctx);
            // Superclass resolution happens in the VM; the compiler always
            // passes a nil placeholder.
            load_const(ctx.space.w_nil.clone(), ctx);

            let mut body_ctx = CompilerContext::new(ctx.space);
            compile_block(body, &mut body_ctx)?;
            body_ctx.emit(Instruction::DiscardTop);
            load_const(body_ctx.space.w_nil.clone(), &mut body_ctx);
            body_ctx.emit(Instruction::Return);
            let bytecode = body_ctx.create_bytecode()?;

            load_const(ctx.space.newcode(bytecode), ctx);
            ctx.emit(Instruction::BuildClass);
        }
        Expression::Function { name, params, body } => {
            let mut function_ctx = CompilerContext::new(ctx.space);
            for param in params {
                function_ctx.create_local(param);
            }
            compile_block(body, &mut function_ctx)?;
            function_ctx.emit(Instruction::Return);
            let bytecode = function_ctx.create_bytecode()?;

            ctx.emit(Instruction::LoadSelf);
            load_const(ctx.space.newsymbol(name), ctx);
            load_const(ctx.space.newcode(bytecode), ctx);
            ctx.emit(Instruction::DefineFunction);
        }
    }
    Ok(())
}

fn compile_send(
    receiver: &Expression,
    method: &str,
    args: &[Expression],
    ctx: &mut CompilerContext<'_>,
) -> Result<()> {
    compile_expression(receiver, ctx)?;
    // Arguments compile last-to-first; the VM pops them back into
    // declared order.
    for arg in args.iter().rev() {
        compile_expression(arg, ctx)?;
    }
    let method = ctx.create_symbol_const(method);
    ctx.emit(Instruction::Send {
        method,
        argc: args.len(),
    });
    Ok(())
}
