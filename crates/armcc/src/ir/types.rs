//! Interned, structural types (spec §3 "Type").
//!
//! Two types compare equal iff structurally equal. Primitive types
//! (`Void`, `Label`, `Pointer`, every integer width) are singletons:
//! the interner hands out the same [`Type`] for them every time, so
//! `==` on `Type` is a cheap index comparison rather than a deep
//! structural walk.

use std::collections::HashMap;
use std::fmt;

use armcc_entity::{entity_impl, PrimaryMap};

/// A reference to an interned [`TypeData`] held by a [`TypeInterner`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type(u32);
entity_impl!(Type, "t");

/// The structural description behind a [`Type`] handle.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeData {
    Void,
    Label,
    /// Function type: return type followed by parameter types.
    Function { ret: Type, params: Vec<Type> },
    /// Integer of the given bit width (one of 8, 16, 32, 64).
    Integer { bits: u8 },
    /// The single opaque pointer type; the pointee type is carried by the
    /// instruction that dereferences it, not by the pointer type itself.
    Pointer,
    Array { element: Type, count: u64 },
    /// `name` is either a source-given struct tag or an auto-generated
    /// `anon.N` name for an anonymous struct.
    Struct { name: String, fields: Vec<Type> },
}

/// Interns [`TypeData`] so that structurally-identical types share one
/// [`Type`] handle. Owned by the [`crate::ir::Module`]; lives for as long
/// as the module being compiled (the spec's "process-global, initialised
/// once" shared state, scoped here to one compilation instead of the
/// whole process since this is a batch tool that handles one module per
/// invocation, per spec §5).
pub struct TypeInterner {
    data: PrimaryMap<Type, TypeData>,
    index: HashMap<TypeData, Type>,
    anon_structs: u32,

    pub void: Type,
    pub label: Type,
    pub ptr: Type,
    pub i8: Type,
    pub i16: Type,
    pub i32: Type,
    pub i64: Type,
}

impl TypeInterner {
    /// Build a fresh interner, eagerly interning the primitive singletons.
    pub fn new() -> Self {
        let mut data = PrimaryMap::new();
        let mut index = HashMap::new();

        let mut intern_primitive = |data: &mut PrimaryMap<Type, TypeData>,
                                     index: &mut HashMap<TypeData, Type>,
                                     td: TypeData|
         -> Type {
            let ty = data.push(td.clone());
            index.insert(td, ty);
            ty
        };

        let void = intern_primitive(&mut data, &mut index, TypeData::Void);
        let label = intern_primitive(&mut data, &mut index, TypeData::Label);
        let ptr = intern_primitive(&mut data, &mut index, TypeData::Pointer);
        let i8 = intern_primitive(&mut data, &mut index, TypeData::Integer { bits: 8 });
        let i16 = intern_primitive(&mut data, &mut index, TypeData::Integer { bits: 16 });
        let i32 = intern_primitive(&mut data, &mut index, TypeData::Integer { bits: 32 });
        let i64 = intern_primitive(&mut data, &mut index, TypeData::Integer { bits: 64 });

        Self {
            data,
            index,
            anon_structs: 0,
            void,
            label,
            ptr,
            i8,
            i16,
            i32,
            i64,
        }
    }

    /// Intern `td`, returning the canonical handle for it.
    pub fn intern(&mut self, td: TypeData) -> Type {
        if let Some(&ty) = self.index.get(&td) {
            return ty;
        }
        let ty = self.data.push(td.clone());
        self.index.insert(td, ty);
        ty
    }

    pub fn integer(&mut self, bits: u8) -> Type {
        debug_assert!(matches!(bits, 8 | 16 | 32 | 64), "unsupported integer width");
        self.intern(TypeData::Integer { bits })
    }

    pub fn array(&mut self, element: Type, count: u64) -> Type {
        self.intern(TypeData::Array { element, count })
    }

    pub fn function(&mut self, ret: Type, params: Vec<Type>) -> Type {
        self.intern(TypeData::Function { ret, params })
    }

    /// Declare a named struct type. Two calls with the same name and
    /// fields intern to the same `Type`, matching every other variant.
    pub fn named_struct(&mut self, name: impl Into<String>, fields: Vec<Type>) -> Type {
        self.intern(TypeData::Struct {
            name: name.into(),
            fields,
        })
    }

    /// Declare an anonymous struct type; each call mints a fresh `anon.N`
    /// name so distinct anonymous aggregates never accidentally intern
    /// together even if their field lists match.
    pub fn anon_struct(&mut self, fields: Vec<Type>) -> Type {
        let name = format!("anon.{}", self.anon_structs);
        self.anon_structs += 1;
        self.intern(TypeData::Struct { name, fields })
    }

    pub fn data(&self, ty: Type) -> &TypeData {
        &self.data[ty]
    }

    pub fn is_pointer(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Pointer)
    }

    pub fn is_integer(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Integer { .. })
    }

    pub fn is_struct(&self, ty: Type) -> bool {
        matches!(self.data(ty), TypeData::Struct { .. })
    }

    pub fn bit_width(&self, ty: Type) -> Option<u8> {
        match self.data(ty) {
            TypeData::Integer { bits } => Some(*bits),
            _ => None,
        }
    }

    /// ARMv7 `sizeof` rule (spec §4.8): `i8=1, i16=2, i32=4, i64=8, ptr=4`,
    /// arrays multiply, structs sum their fields.
    pub fn size_of(&self, ty: Type) -> u32 {
        match self.data(ty) {
            TypeData::Integer { bits } => u32::from(*bits) / 8,
            TypeData::Pointer => 4,
            TypeData::Array { element, count } => self.size_of(*element) * (*count as u32),
            TypeData::Struct { fields, .. } => fields.iter().map(|&f| self.size_of(f)).sum(),
            TypeData::Void | TypeData::Label | TypeData::Function { .. } => {
                unreachable!("size_of called on a type with no in-memory representation")
            }
        }
    }

    /// Render `ty` the way the text IR format does (spec §6).
    pub fn display(&self, ty: Type) -> String {
        match self.data(ty) {
            TypeData::Void => "void".to_string(),
            TypeData::Label => "label".to_string(),
            TypeData::Pointer => "ptr".to_string(),
            TypeData::Integer { bits } => format!("i{bits}"),
            TypeData::Array { element, count } => format!("[{} x {}]", count, self.display(*element)),
            TypeData::Struct { name, .. } => name.clone(),
            TypeData::Function { ret, params } => {
                let params: Vec<String> = params.iter().map(|&p| self.display(p)).collect();
                format!("({}) -> {}", params.join(", "), self.display(*ret))
            }
        }
    }
}

impl Default for TypeInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeInterner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInterner")
            .field("count", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_singletons() {
        let mut t = TypeInterner::new();
        assert_eq!(t.i32, t.integer(32));
        assert_eq!(t.ptr, t.intern(TypeData::Pointer));
    }

    #[test]
    fn structural_equality_dedups() {
        let mut t = TypeInterner::new();
        let a = t.array(t.i32, 4);
        let b = t.array(t.i32, 4);
        let c = t.array(t.i32, 5);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn size_of_matches_arm_rules() {
        let mut t = TypeInterner::new();
        assert_eq!(t.size_of(t.i8), 1);
        assert_eq!(t.size_of(t.i64), 8);
        assert_eq!(t.size_of(t.ptr), 4);
        let arr = t.array(t.i32, 3);
        assert_eq!(t.size_of(arr), 12);
        let st = t.named_struct("S", vec![t.i32, t.i8, t.ptr]);
        assert_eq!(t.size_of(st), 4 + 1 + 4);
    }
}
