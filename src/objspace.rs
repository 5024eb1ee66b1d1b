//! Runtime object space: the compiler's window into the VM's object model.
//!
//! The compiler needs just enough of it to populate constant pools — the
//! three singletons plus constructors for literal integers, strings,
//! interned symbols, and assembled code objects. Objects are shared
//! `Rc<RefCell<..>>` references; the VM mutates strings at runtime, the
//! compiler never mutates anything it has handed out.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::bytecode::Bytecode;

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Nil,
    Bool(bool),
    Int(i64),
    Str(String),
    Symbol(String),
    Code(Bytecode),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub kind: ObjectKind,
}

pub type ObjectRef = Rc<RefCell<Object>>;

fn new_object(kind: ObjectKind) -> ObjectRef {
    Rc::new(RefCell::new(Object { kind }))
}

pub struct ObjectSpace {
    pub w_true: ObjectRef,
    pub w_false: ObjectRef,
    pub w_nil: ObjectRef,
    symbols: RefCell<FxHashMap<String, ObjectRef>>,
}

impl ObjectSpace {
    pub fn new() -> Self {
        Self {
            w_true: new_object(ObjectKind::Bool(true)),
            w_false: new_object(ObjectKind::Bool(false)),
            w_nil: new_object(ObjectKind::Nil),
            symbols: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn newint(&self, value: i64) -> ObjectRef {
        new_object(ObjectKind::Int(value))
    }

    pub fn newstr(&self, value: &str) -> ObjectRef {
        new_object(ObjectKind::Str(value.to_string()))
    }

    /// Symbols are interned: one shared object per name for the lifetime
    /// of the space.
    pub fn newsymbol(&self, name: &str) -> ObjectRef {
        if let Some(symbol) = self.symbols.borrow().get(name) {
            return symbol.clone();
        }
        let symbol = new_object(ObjectKind::Symbol(name.to_string()));
        self.symbols
            .borrow_mut()
            .insert(name.to_string(), symbol.clone());
        symbol
    }

    pub fn newcode(&self, bytecode: Bytecode) -> ObjectRef {
        new_object(ObjectKind::Code(bytecode))
    }
}

impl Default for ObjectSpace {
    fn default() -> Self {
        Self::new()
    }
}
