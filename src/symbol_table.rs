//! Nested-scope symbol table: a flat arena of entries plus a stack of
//! name-to-entry maps.

use std::collections::HashMap;

use crate::types::Type;

/// A stable handle into the symbol arena. Valid for the lifetime of the
/// `SymbolTable` it was produced by, including after the scope that
/// declared it has been popped (entries are never removed from the
/// arena, only unreachable from `lookup` once their scope is gone).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Real(f64),
    Str(String),
    Bool(bool),
    Char(char),
}

#[derive(Debug, Clone)]
pub struct SymEntry {
    pub name: String,
    pub ty: Type,
    pub is_const: bool,
    pub is_func: bool,
    pub is_global: bool,
    /// Storage slot: `-1` for globals and functions, `>= 0` for locals
    /// and parameters.
    pub slot: i32,
    pub value: Option<ConstValue>,
    /// Populated only for const arrays; `arrayValues[i]` is `Some` iff
    /// element `i`'s initializer folded to a literal.
    pub array_values: Option<Vec<Option<ConstValue>>>,
    pub param_types: Option<Vec<Type>>,
    pub return_type: Option<Type>,
}

impl SymEntry {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        SymEntry {
            name: name.into(),
            ty,
            is_const: false,
            is_func: false,
            is_global: false,
            slot: -1,
            value: None,
            array_values: None,
            param_types: None,
            return_type: None,
        }
    }

    pub fn function(name: impl Into<String>, param_types: Vec<Type>, return_type: Type) -> Self {
        SymEntry {
            name: name.into(),
            ty: return_type.clone(),
            is_const: false,
            is_func: true,
            is_global: true,
            slot: -1,
            value: None,
            array_values: None,
            param_types: Some(param_types),
            return_type: Some(return_type),
        }
    }
}

pub struct SymbolTable {
    arena: Vec<SymEntry>,
    scopes: Vec<HashMap<String, SymbolId>>,
    next_local: i32,
    saved_locals: Vec<i32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { arena: Vec::new(), scopes: vec![HashMap::new()], next_local: 0, saved_locals: Vec::new() }
    }

    pub fn at_global_scope(&self) -> bool {
        self.scopes.len() == 1
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn enter_scope(&mut self, is_function: bool) {
        self.scopes.push(HashMap::new());
        if is_function {
            self.saved_locals.push(self.next_local);
            self.next_local = 0;
        }
    }

    /// Pops the innermost scope. Popping the global scope is a
    /// programming error and is guarded with `debug_assert!`
    /// rather than a `Result`, since it can only be triggered by a bug in
    /// this crate, never by user input.
    pub fn exit_scope(&mut self, was_function: bool) {
        debug_assert!(self.scopes.len() > 1, "cannot pop the global scope");
        self.scopes.pop();
        if was_function {
            if let Some(saved) = self.saved_locals.pop() {
                self.next_local = saved;
            }
        }
    }

    /// Inserts `entry` into the innermost scope. Fails if a symbol with
    /// the same name already exists there. On success, decorates the
    /// entry per §4.1 (global flag + slot -1, or an allocated local slot
    /// for non-function entries) and returns its handle.
    pub fn insert(&mut self, mut entry: SymEntry) -> Result<SymbolId, ()> {
        let scope = self.scopes.last().expect("global scope always present");
        if scope.contains_key(&entry.name) {
            return Err(());
        }
        if self.at_global_scope() {
            entry.is_global = true;
            entry.slot = -1;
        } else if !entry.is_func {
            entry.slot = self.allocate_slot();
        } else {
            entry.slot = -1;
        }
        let id = SymbolId(self.arena.len());
        let name = entry.name.clone();
        self.arena.push(entry);
        self.scopes.last_mut().unwrap().insert(name, id);
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(id) = scope.get(name) {
                return Some(*id);
            }
        }
        None
    }

    pub fn get(&self, id: SymbolId) -> &SymEntry {
        &self.arena[id.0]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymEntry {
        &mut self.arena[id.0]
    }

    pub fn allocate_slot(&mut self) -> i32 {
        let slot = self.next_local;
        self.next_local += 1;
        slot
    }

    pub fn current_local(&self) -> i32 {
        self.next_local
    }

    pub fn reset_local(&mut self, base: i32) {
        self.next_local = base;
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Kind;

    #[test]
    fn global_insert_gets_slot_minus_one() {
        let mut t = SymbolTable::new();
        let id = t.insert(SymEntry::new("g", Type::new(Kind::Int))).unwrap();
        assert_eq!(t.get(id).slot, -1);
        assert!(t.get(id).is_global);
    }

    #[test]
    fn duplicate_name_in_same_scope_fails() {
        let mut t = SymbolTable::new();
        t.insert(SymEntry::new("g", Type::new(Kind::Int))).unwrap();
        assert!(t.insert(SymEntry::new("g", Type::new(Kind::Int))).is_err());
    }

    #[test]
    fn local_slots_are_dense_and_monotonic() {
        let mut t = SymbolTable::new();
        t.enter_scope(true);
        let a = t.insert(SymEntry::new("a", Type::new(Kind::Int))).unwrap();
        let b = t.insert(SymEntry::new("b", Type::new(Kind::Int))).unwrap();
        assert_eq!(t.get(a).slot, 0);
        assert_eq!(t.get(b).slot, 1);
        t.exit_scope(true);
    }

    #[test]
    fn function_scope_saves_and_restores_slot_counter() {
        let mut t = SymbolTable::new();
        t.enter_scope(false);
        t.insert(SymEntry::new("outer", Type::new(Kind::Int))).unwrap();
        assert_eq!(t.current_local(), 1);
        t.enter_scope(true);
        assert_eq!(t.current_local(), 0);
        t.insert(SymEntry::new("param", Type::new(Kind::Int))).unwrap();
        t.exit_scope(true);
        assert_eq!(t.current_local(), 1);
        t.exit_scope(false);
    }

    #[test]
    fn lookup_searches_innermost_to_outermost() {
        let mut t = SymbolTable::new();
        t.insert(SymEntry::new("x", Type::new(Kind::Int))).unwrap();
        t.enter_scope(false);
        let inner = t.insert(SymEntry::new("x", Type::new(Kind::Float))).unwrap();
        assert_eq!(t.lookup("x"), Some(inner));
        t.exit_scope(false);
        assert_ne!(t.lookup("x"), Some(inner));
    }

    #[test]
    fn scope_depth_tracks_global_only_after_all_exits() {
        let mut t = SymbolTable::new();
        assert_eq!(t.scope_depth(), 1);
        t.enter_scope(false);
        t.enter_scope(true);
        assert_eq!(t.scope_depth(), 3);
        t.exit_scope(true);
        t.exit_scope(false);
        assert_eq!(t.scope_depth(), 1);
    }
}
