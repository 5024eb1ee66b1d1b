//! The wire contract between compiler and virtual machine.

use crate::objspace::ObjectRef;

/// The fixed instruction catalogue the VM interprets. Operands are indices
/// into the constant pool, the symbol pool, the frame's local slots, or
/// absolute jump targets; `Send` carries a symbol index and an argument
/// count.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    DiscardTop,
    LoadConst(usize),
    LoadSelf,
    StoreLocal(usize),
    LoadLocal(usize),
    StoreConstBinding(usize),
    LoadConstBinding(usize),
    StoreInstanceVar(usize),
    LoadInstanceVar(usize),
    JumpIfFalse(usize),
    Jump(usize),
    Send { method: usize, argc: usize },
    BuildArray(usize),
    BuildClass,
    DefineFunction,
    CopyString,
    Return,
}

/// One assembled compilation unit: the top level of a program, or the body
/// of a class or function. Immutable once created; the compiler hands these
/// to the VM (nested units travel inside the enclosing unit's constant
/// pool as code objects).
#[derive(Debug, Clone, PartialEq)]
pub struct Bytecode {
    pub code: Vec<Instruction>,
    pub consts: Vec<ObjectRef>,
    pub symbols: Vec<String>,
    /// Local slot count the executing frame must reserve; parameters
    /// occupy the first slots.
    pub locals: usize,
}
