//! Modules: the compilation unit (spec §3 "Module").

use std::collections::HashMap;

use armcc_entity::PrimaryMap;

use crate::ir::function::Function;
use crate::ir::types::{Type, TypeInterner};
use crate::ir::value::{ConstData, ConstRef, GlobalRef, UndefRef, Value};

/// A global variable declaration.
#[derive(Clone, Debug)]
pub struct GlobalData {
    pub name: String,
    pub base_type: Type,
    pub init: Option<Value>,
}

/// The compilation unit: ordered functions and globals, the declared
/// struct types, and the interned type/constant/undef tables every
/// function in the module shares.
///
/// A [`Function`] with no blocks at all is a declaration (external
/// linkage, no body to lower) — mirrors `Function::HasBody()` in the
/// system this is modelled on (spec §4.10 "if `!fn->HasBody()`").
pub struct Module {
    pub source_file: String,
    pub types: TypeInterner,

    functions: PrimaryMap<crate::ir::value::FuncRef, Function>,
    globals: PrimaryMap<GlobalRef, GlobalData>,

    consts: PrimaryMap<ConstRef, ConstData>,
    const_index: HashMap<ConstData, ConstRef>,

    undefs: PrimaryMap<UndefRef, Type>,
    undef_index: HashMap<Type, UndefRef>,
}

impl Module {
    pub fn new(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            types: TypeInterner::new(),
            functions: PrimaryMap::new(),
            globals: PrimaryMap::new(),
            consts: PrimaryMap::new(),
            const_index: HashMap::new(),
            undefs: PrimaryMap::new(),
            undef_index: HashMap::new(),
        }
    }

    // ---- functions ----

    pub fn declare_function(&mut self, f: Function) -> crate::ir::value::FuncRef {
        self.functions.push(f)
    }

    pub fn function(&self, r: crate::ir::value::FuncRef) -> &Function {
        &self.functions[r]
    }

    pub fn function_mut(&mut self, r: crate::ir::value::FuncRef) -> &mut Function {
        &mut self.functions[r]
    }

    pub fn functions(&self) -> impl Iterator<Item = crate::ir::value::FuncRef> {
        self.functions.keys()
    }

    pub fn functions_iter(&self) -> impl Iterator<Item = (crate::ir::value::FuncRef, &Function)> {
        self.functions.iter()
    }

    pub fn functions_iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (crate::ir::value::FuncRef, &mut Function)> {
        self.functions.iter_mut()
    }

    // ---- globals ----

    pub fn declare_global(&mut self, data: GlobalData) -> GlobalRef {
        self.globals.push(data)
    }

    pub fn global(&self, r: GlobalRef) -> &GlobalData {
        &self.globals[r]
    }

    pub fn globals(&self) -> impl Iterator<Item = GlobalRef> {
        self.globals.keys()
    }

    pub fn globals_iter(&self) -> impl Iterator<Item = (GlobalRef, &GlobalData)> {
        self.globals.iter()
    }

    // ---- constants (interned by (type, value), spec §8 property 3) ----

    pub fn const_int(&mut self, ty: Type, bits: i64) -> Value {
        let data = ConstData::Int { ty, bits };
        Value::Const(self.intern_const(data))
    }

    pub fn const_byte_array(&mut self, ty: Type, bytes: Vec<u8>) -> Value {
        let data = ConstData::ByteArray { ty, bytes };
        Value::ByteArray(self.intern_const(data))
    }

    pub fn const_array(&mut self, ty: Type, elements: Vec<Value>) -> Value {
        let data = ConstData::Array { ty, elements };
        Value::Array(self.intern_const(data))
    }

    pub fn const_struct(&mut self, ty: Type, fields: Vec<Value>) -> Value {
        let data = ConstData::Struct { ty, fields };
        Value::Struct(self.intern_const(data))
    }

    fn intern_const(&mut self, data: ConstData) -> ConstRef {
        if let Some(&r) = self.const_index.get(&data) {
            return r;
        }
        let r = self.consts.push(data.clone());
        self.const_index.insert(data, r);
        r
    }

    pub fn const_data(&self, r: ConstRef) -> &ConstData {
        &self.consts[r]
    }

    pub fn undef(&mut self, ty: Type) -> Value {
        if let Some(&r) = self.undef_index.get(&ty) {
            return Value::Undef(r);
        }
        let r = self.undefs.push(ty);
        self.undef_index.insert(ty, r);
        Value::Undef(r)
    }

    pub fn undef_type(&self, r: UndefRef) -> Type {
        self.undefs[r]
    }

    /// The type of any `Value`, used throughout the pipeline for operand
    /// type checks (spec §4.1's `InvalidIR` checks). Globals and
    /// functions are always referenced through their address, so both
    /// report `ptr` here regardless of the global's base type.
    pub fn value_type(&self, func: &Function, v: Value) -> Type {
        self.type_ctx().value_type(func, v)
    }

    /// Borrow just the type/constant/undef tables, leaving `functions`
    /// free to be borrowed mutably at the same time — see
    /// [`Module::with_function_mut`].
    pub fn type_ctx(&self) -> TypeCtx<'_> {
        TypeCtx {
            types: &self.types,
            consts: &self.consts,
            undefs: &self.undefs,
        }
    }

    /// Split-borrow a function for building/rewriting while keeping the
    /// module's type/constant tables available read-only, without the
    /// double-borrow a plain `(&self, &mut Function)` pair would need
    /// through `function_mut`.
    pub fn with_function_mut<R>(
        &mut self,
        r: crate::ir::value::FuncRef,
        f: impl FnOnce(TypeCtx<'_>, &mut Function) -> R,
    ) -> R {
        let Module {
            types,
            consts,
            undefs,
            functions,
            ..
        } = self;
        let ctx = TypeCtx {
            types,
            consts,
            undefs,
        };
        f(ctx, &mut functions[r])
    }
}

/// Read-only view of a module's type/constant/undef tables, borrowed
/// apart from its function arena so callers can build instructions into
/// one function while still resolving the types of module-level
/// constants its operands reference.
#[derive(Copy, Clone)]
pub struct TypeCtx<'a> {
    pub types: &'a TypeInterner,
    consts: &'a PrimaryMap<ConstRef, ConstData>,
    undefs: &'a PrimaryMap<UndefRef, Type>,
}

impl<'a> TypeCtx<'a> {
    pub fn const_data(&self, r: ConstRef) -> &'a ConstData {
        &self.consts[r]
    }

    pub fn undef_type(&self, r: UndefRef) -> Type {
        self.undefs[r]
    }

    pub fn value_type(&self, func: &Function, v: Value) -> Type {
        match v {
            Value::VReg(vr) => func.vreg_type(vr),
            Value::PReg(_) => self.types.i32,
            Value::Const(c) | Value::ByteArray(c) | Value::Array(c) | Value::Struct(c) => {
                self.consts[c].ty()
            }
            Value::Undef(u) => self.undefs[u],
            Value::Global(_) => self.types.ptr,
            Value::Func(_) => self.types.ptr,
            Value::Block(_) => self.types.label,
        }
    }
}
