//! Bytecode compiler for a small Ruby-like object language.
//!
//! The crate takes an already-parsed AST ([`ast::Program`]) and compiles it
//! into stack-machine bytecode ([`bytecode::Bytecode`]). The parser that
//! produces the AST and the virtual machine that executes the bytecode are
//! external collaborators; they meet this crate only at the instruction
//! catalogue in [`bytecode`] and the object constructors in [`objspace`].

pub mod ast;
pub mod bytecode;
pub mod compiler;
pub mod objspace;
