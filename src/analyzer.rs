//! The semantic analyzer: a single traversal that resolves symbols, checks
//! and annotates types, folds constants, and collects diagnostics. Walks
//! the tagged `ExprKind`/`StmtKind` enums with exhaustive pattern matching
//! rather than a visitor-interface dispatch.

use tracing::{debug, trace};

use crate::ast::{BinaryOp, Decl, Expr, ExprKind, FuncDecl, PostfixOp, Program, Stmt, StmtKind, UnaryOp, VarDecl, VarRef};
use crate::diagnostics::{Diagnostics, ErrorKind};
use crate::symbol_table::{ConstValue, SymEntry, SymbolId, SymbolTable};
use crate::types::{Kind, Type};

pub struct AnalysisOutcome {
    pub diagnostics: Diagnostics,
    pub symbols: SymbolTable,
}

impl AnalysisOutcome {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

pub struct SemanticAnalyzer {
    symtab: SymbolTable,
    diagnostics: Diagnostics,
    current_return_type: Option<Type>,
    /// Consumed by the next `Block` visited: when > 0, that block fuses
    /// with its enclosing scope instead of opening a new one. Used by
    /// `for`-headers and function bodies so header/parameter variables
    /// stay visible in the body.
    skip_block_scope_once: u32,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        SemanticAnalyzer {
            symtab: SymbolTable::new(),
            diagnostics: Diagnostics::new(),
            current_return_type: None,
            skip_block_scope_once: 0,
        }
    }

    pub fn analyze(mut self, program: &mut Program) -> AnalysisOutcome {
        self.visit_program(program);
        AnalysisOutcome { diagnostics: self.diagnostics, symbols: self.symtab }
    }

    fn error(&mut self, kind: ErrorKind, line: usize, msg: impl Into<String>) {
        self.diagnostics.error(kind, line, msg);
    }

    fn warning(&mut self, kind: ErrorKind, line: usize, msg: impl Into<String>) {
        self.diagnostics.warning(kind, line, msg);
    }

    // ---- Program / declarations ------------------------------------

    fn visit_program(&mut self, p: &mut Program) {
        for d in &mut p.globals {
            self.visit_decl(d);
        }
        for s in &mut p.stmts {
            self.visit_stmt(s);
        }
        debug_assert_eq!(self.symtab.scope_depth(), 1);
    }

    fn visit_decl(&mut self, d: &mut Decl) {
        match d {
            Decl::Var(vd) => self.visit_var_decl(vd, false),
            Decl::Const(vd) => self.visit_var_decl(vd, true),
            Decl::Func(fd) => self.visit_func_decl(fd),
        }
    }

    /// Shared implementation for `VarDecl` and `ConstDecl`. For scalar
    /// consts (`dims.is_empty() && is_const`) this enforces the stricter
    /// ConstDecl rule (initializer required and must fold). Const arrays
    /// relax that requirement: there is no array-literal expression in
    /// this AST, so a const array is declared with dims and populated
    /// element-by-element by later constant-indexed assignments (see
    /// `check_indexed_assign`), which track per-element values in
    /// `array_values`.
    fn visit_var_decl(&mut self, d: &mut VarDecl, is_const: bool) {
        let is_array = !d.dims.is_empty();
        let scalar_required = is_const && !is_array;

        if scalar_required && d.init.is_none() {
            self.error(ErrorKind::ConstViolation, d.line, format!("const '{}' must be initialized", d.name));
            return;
        }

        if let Some(init) = &mut d.init {
            self.visit_expr(init);
            if init.ty.is_error() {
                return;
            }
            let declared = d.declared_type();
            if !declared.accepts_initializer(&init.ty) {
                self.error(
                    ErrorKind::TypeMismatch,
                    d.line,
                    format!(
                        "type mismatch in initialization of '{}', expected {} but got {}",
                        d.name,
                        declared.display(),
                        init.ty.display()
                    ),
                );
            }
            if scalar_required && eval_const_expr(init).is_none() {
                self.error(
                    ErrorKind::ConstViolation,
                    d.line,
                    format!("const initializer for '{}' must be a constant expression", d.name),
                );
            }
        }

        let mut entry = SymEntry::new(&d.name, d.declared_type());
        entry.is_const = is_const;
        if let Some(init) = &d.init {
            entry.value = eval_const_expr(init);
        }
        if is_array {
            let total: usize = d.dims.iter().product();
            entry.array_values = Some(vec![None; total]);
        }

        match self.symtab.insert(entry) {
            Ok(id) => {
                d.symbol = Some(id);
                trace!(name = %d.name, "declared variable");
            }
            Err(()) => {
                self.error(
                    if is_const { ErrorKind::ConstViolation } else { ErrorKind::NameResolution },
                    d.line,
                    format!("redefinition of '{}'", d.name),
                );
            }
        }
    }

    fn visit_func_decl(&mut self, f: &mut FuncDecl) {
        // Parameter types recorded for call-site checking use the bare
        // declared kind, without dims, captured before the parameter's
        // own VarDecl visit (which would merge dims into its symbol
        // entry) ever runs. Array-typed parameters are therefore not
        // dimension-checked at call sites.
        let param_types: Vec<Type> = f.params.iter().map(|p| Type::new(p.declared_kind)).collect();
        let entry = SymEntry::function(&f.name, param_types, f.return_type());

        let func_id = match self.symtab.insert(entry) {
            Ok(id) => id,
            Err(()) => {
                self.error(ErrorKind::NameResolution, f.line, format!("redefinition of function '{}'", f.name));
                return;
            }
        };
        f.symbol = Some(func_id);

        let saved_return = self.current_return_type.replace(f.return_type());
        self.symtab.enter_scope(true);
        debug!(func = %f.name, "entering function scope");

        for param in &mut f.params {
            self.visit_var_decl(param, false);
        }

        self.skip_block_scope_once += 1;
        self.visit_stmt(&mut f.body);

        if f.return_kind != Kind::Void {
            if let StmtKind::Block(stmts) = &f.body.kind {
                if !all_paths_return(stmts) {
                    self.warning(
                        ErrorKind::ReturnPath,
                        f.line,
                        format!("non-void function '{}' might not return on all paths", f.name),
                    );
                }
            }
        }

        self.symtab.exit_scope(true);
        self.current_return_type = saved_return;
    }

    // ---- Statements ---------------------------------------------------

    fn visit_stmt(&mut self, s: &mut Stmt) {
        let line = s.line;
        match &mut s.kind {
            StmtKind::Block(stmts) => {
                let merged = self.skip_block_scope_once > 0;
                if merged {
                    self.skip_block_scope_once -= 1;
                } else {
                    self.symtab.enter_scope(false);
                }
                for stmt in stmts.iter_mut() {
                    self.visit_stmt(stmt);
                }
                if !merged {
                    self.symtab.exit_scope(false);
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.visit_expr(cond);
                if cond.ty.kind != Kind::Bool {
                    self.error(ErrorKind::TypeMismatch, line, "condition in if statement must be boolean");
                }
                self.visit_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_stmt(else_branch);
                }
            }
            StmtKind::While { cond, body } => {
                self.visit_expr(cond);
                if cond.ty.kind != Kind::Bool {
                    self.error(ErrorKind::TypeMismatch, line, "condition in while statement must be boolean");
                }
                self.visit_stmt(body);
            }
            StmtKind::For { init, cond, step, body } => {
                self.symtab.enter_scope(false);
                self.visit_stmt(init);
                if let Some(cond) = cond {
                    self.visit_expr(cond);
                    if cond.ty.kind != Kind::Bool {
                        self.error(ErrorKind::TypeMismatch, line, "condition in for statement must be boolean");
                    }
                }
                self.visit_stmt(step);
                self.skip_block_scope_once += 1;
                self.visit_stmt(body);
                self.symtab.exit_scope(false);
            }
            StmtKind::ForEach { var, collection, body } => {
                self.visit_var_ref(var);
                self.visit_expr(collection);
                if collection.ty.is_error() {
                    self.error(ErrorKind::TypeMismatch, line, "invalid collection in foreach loop");
                    return;
                }
                match &collection.kind {
                    ExprKind::Range { start, end } => {
                        if start.ty.kind != Kind::Int || end.ty.kind != Kind::Int {
                            self.error(ErrorKind::TypeMismatch, line, "range bounds in foreach must be integers");
                        }
                    }
                    _ => {
                        self.error(ErrorKind::TypeMismatch, line, "only integer ranges are supported in foreach loops");
                    }
                }
                self.visit_stmt(body);
            }
            StmtKind::Return(expr) => self.visit_return(line, expr),
            StmtKind::ExprStmt(e) => self.visit_expr(e),
            StmtKind::Empty => {}
            StmtKind::Print(e) => self.visit_print_like(line, e, "print"),
            StmtKind::Println(e) => self.visit_print_like(line, e, "println"),
            StmtKind::Read(var) => {
                self.visit_var_ref(var);
                if var.ty.is_error() || var.ty.kind == Kind::Void {
                    self.error(ErrorKind::TypeMismatch, line, "invalid identifier type in read statement");
                }
            }
            StmtKind::Decl(d) => self.visit_decl(d),
        }
    }

    fn visit_return(&mut self, line: usize, expr: &mut Option<Expr>) {
        let Some(expected) = self.current_return_type.clone() else {
            self.error(ErrorKind::Other, line, "return statement outside of function");
            return;
        };
        if expected.kind == Kind::Void {
            if let Some(e) = expr {
                self.visit_expr(e);
                self.error(ErrorKind::TypeMismatch, line, "cannot return a value from a void function");
            }
        } else {
            match expr {
                None => {
                    self.error(ErrorKind::TypeMismatch, line, "return statement missing expression in non-void function");
                }
                Some(e) => {
                    self.visit_expr(e);
                    if !e.ty.is_error() && e.ty != expected {
                        self.error(
                            ErrorKind::TypeMismatch,
                            line,
                            format!("return type mismatch: expected '{}' but got '{}'", expected.display(), e.ty.display()),
                        );
                    }
                }
            }
        }
    }

    fn visit_print_like(&mut self, line: usize, e: &mut Expr, which: &str) {
        self.visit_expr(e);
        if e.ty.is_error() || e.ty.kind == Kind::Void {
            self.error(ErrorKind::TypeMismatch, line, format!("invalid argument type in {which} statement"));
        }
    }

    // ---- Expressions ----------------------------------------------------

    fn visit_expr(&mut self, e: &mut Expr) {
        let line = e.line;
        if let Some(lit_ty) = e.canonical_literal_type() {
            e.ty = lit_ty;
            return;
        }
        match &mut e.kind {
            ExprKind::IntLit(_) | ExprKind::RealLit(_) | ExprKind::StringLit(_) | ExprKind::BoolLit(_) | ExprKind::CharLit(_) => {
                unreachable!("handled by canonical_literal_type above")
            }
            ExprKind::Var(v) => {
                self.visit_var_ref(v);
                e.ty = v.ty.clone();
            }
            ExprKind::Unary { op, rhs } => {
                self.visit_expr(rhs);
                e.ty = self.check_unary(line, *op, rhs.ty.clone());
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.visit_expr(lhs);
                self.visit_expr(rhs);
                e.ty = self.check_binary(line, *op, lhs, rhs);
            }
            ExprKind::Postfix { op, operand } => {
                self.visit_expr(operand);
                e.ty = self.check_postfix(line, *op, operand.ty.clone());
            }
            ExprKind::Call { callee, args, callee_symbol } => {
                for a in args.iter_mut() {
                    self.visit_expr(a);
                }
                e.ty = self.check_call(line, callee, args, callee_symbol);
            }
            ExprKind::Range { start, end } => {
                self.visit_expr(start);
                self.visit_expr(end);
                if start.ty.kind != Kind::Int || end.ty.kind != Kind::Int {
                    self.error(ErrorKind::TypeMismatch, line, "range bounds must be integers");
                    e.ty = Type::error();
                } else {
                    e.ty = Type::new(Kind::Int);
                }
            }
            ExprKind::Assign { lhs, rhs } => {
                e.ty = self.check_assign(line, lhs, rhs);
            }
        }
    }

    fn check_unary(&mut self, line: usize, op: UnaryOp, rhs_ty: Type) -> Type {
        if rhs_ty.is_error() {
            return Type::error();
        }
        match op {
            UnaryOp::Neg => {
                if rhs_ty.kind.is_numeric() {
                    rhs_ty
                } else {
                    self.error(ErrorKind::TypeMismatch, line, "unary '-' requires int, char, float, or double");
                    Type::error()
                }
            }
            UnaryOp::Not => {
                if rhs_ty.kind == Kind::Bool {
                    Type::new(Kind::Bool)
                } else {
                    self.error(ErrorKind::TypeMismatch, line, "unary '!' requires bool");
                    Type::error()
                }
            }
        }
    }

    fn check_binary(&mut self, line: usize, op: BinaryOp, lhs: &Expr, rhs: &Expr) -> Type {
        if lhs.ty.is_error() || rhs.ty.is_error() {
            return Type::error();
        }
        let same_numeric_ok = |t: &Type| matches!(t.kind, Kind::Char | Kind::Int | Kind::Float | Kind::Double | Kind::Bool);
        match op {
            BinaryOp::Add => {
                if lhs.ty == rhs.ty {
                    lhs.ty.clone()
                } else {
                    self.error(ErrorKind::TypeMismatch, line, "binary '+' requires operands of the same type");
                    Type::error()
                }
            }
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                let sym = match op {
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    _ => "/",
                };
                if lhs.ty != rhs.ty {
                    self.error(ErrorKind::TypeMismatch, line, format!("binary '{sym}' requires operands of the same type"));
                    return Type::error();
                }
                if !same_numeric_ok(&lhs.ty) {
                    self.error(ErrorKind::TypeMismatch, line, format!("binary '{sym}' requires char, int, float, double, or bool"));
                    return Type::error();
                }
                lhs.ty.clone()
            }
            BinaryOp::Mod => {
                if lhs.ty.kind != Kind::Int || rhs.ty.kind != Kind::Int {
                    self.error(ErrorKind::TypeMismatch, line, "binary '%' requires int operands");
                    return Type::error();
                }
                Type::new(Kind::Int)
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let sym = match op {
                    BinaryOp::Lt => "<",
                    BinaryOp::Le => "<=",
                    BinaryOp::Gt => ">",
                    _ => ">=",
                };
                if lhs.ty == rhs.ty {
                    Type::new(Kind::Bool)
                } else {
                    self.error(ErrorKind::TypeMismatch, line, format!("binary '{sym}' requires operands of the same type"));
                    Type::error()
                }
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let sym = if op == BinaryOp::Eq { "==" } else { "!=" };
                if lhs.ty == rhs.ty {
                    Type::new(Kind::Bool)
                } else {
                    self.error(ErrorKind::TypeMismatch, line, format!("binary '{sym}' requires operands of the same type"));
                    Type::error()
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                let sym = if op == BinaryOp::And { "&&" } else { "||" };
                if lhs.ty.kind == Kind::Bool && rhs.ty.kind == Kind::Bool {
                    Type::new(Kind::Bool)
                } else {
                    self.error(ErrorKind::TypeMismatch, line, format!("binary '{sym}' requires bool operands"));
                    Type::error()
                }
            }
        }
    }

    fn check_postfix(&mut self, line: usize, _op: PostfixOp, operand_ty: Type) -> Type {
        if operand_ty.is_error() {
            self.error(ErrorKind::TypeMismatch, line, "invalid expression type in postfix operation");
            return Type::error();
        }
        if operand_ty.kind.is_numeric() {
            operand_ty
        } else {
            self.error(ErrorKind::TypeMismatch, line, format!("postfix '++'/'--' not applicable to type {}", operand_ty.display()));
            Type::error()
        }
    }

    fn check_call(&mut self, line: usize, callee: &str, args: &[Expr], callee_symbol: &mut Option<SymbolId>) -> Type {
        let Some(id) = self.symtab.lookup(callee) else {
            self.error(ErrorKind::NameResolution, line, format!("undeclared function '{callee}'"));
            return Type::error();
        };
        let entry = self.symtab.get(id);
        if !entry.is_func {
            self.error(ErrorKind::NameResolution, line, format!("undeclared function '{callee}'"));
            return Type::error();
        }
        *callee_symbol = Some(id);
        let param_types = entry.param_types.clone().unwrap_or_default();
        let return_type = entry.return_type.clone().unwrap_or_else(|| Type::new(Kind::Void));

        if args.len() != param_types.len() {
            self.error(ErrorKind::TypeMismatch, line, format!("parameter count mismatch in call to '{callee}'"));
        } else {
            for (arg, expected) in args.iter().zip(param_types.iter()) {
                if arg.ty != *expected {
                    self.error(ErrorKind::TypeMismatch, line, format!("parameter type mismatch in call to '{callee}'"));
                }
            }
        }
        return_type
    }

    /// Resolves a variable/identifier occurrence: symbol lookup plus, if
    /// indexed, per-index type checking and partial-indexing dimension
    /// reduction. Shared by plain variable references, assignment
    /// targets, `read` targets, and foreach loop variables.
    fn visit_var_ref(&mut self, v: &mut VarRef) {
        let Some(id) = self.symtab.lookup(&v.name) else {
            self.error(ErrorKind::NameResolution, v.line, format!("undeclared variable '{}'", v.name));
            v.ty = Type::error();
            return;
        };
        v.symbol = Some(id);
        let base = self.symtab.get(id).ty.clone();
        v.ty = base.clone();

        if v.indices.is_empty() {
            return;
        }
        if v.indices.len() > base.dims.len() {
            self.error(
                ErrorKind::ArrayMisuse,
                v.line,
                format!("too many indices for array '{}' (expected at most {}, got {})", v.name, base.dims.len(), v.indices.len()),
            );
            v.ty = Type::error();
            return;
        }
        for (i, idx) in v.indices.iter_mut().enumerate() {
            self.visit_expr(idx);
            if idx.ty.kind != Kind::Int {
                self.error(ErrorKind::ArrayMisuse, v.line, format!("array index must be int in '{}', index #{}", v.name, i));
                v.ty = Type::error();
                return;
            }
        }
        let remaining_dims = base.dims[v.indices.len()..].to_vec();
        v.ty = Type::array(base.kind, remaining_dims);
    }

    fn check_assign(&mut self, line: usize, lhs: &mut VarRef, rhs: &mut Box<Expr>) -> Type {
        self.visit_expr(rhs);
        self.visit_var_ref(lhs);

        // `visit_var_ref` already resolved (and diagnosed, on failure) the
        // symbol; reuse its handle instead of looking the name up a second
        // time, which would duplicate the "undeclared variable" diagnostic.
        let Some(id) = lhs.symbol else {
            rhs.ty = Type::error();
            return Type::error();
        };

        if !lhs.indices.is_empty() {
            return self.check_indexed_assign(line, lhs, rhs, id);
        }

        let entry_ty = self.symtab.get(id).ty.clone();
        let entry_is_const = self.symtab.get(id).is_const;
        if entry_is_const {
            self.error(ErrorKind::ConstViolation, line, format!("cannot assign to const '{}'", lhs.name));
        }
        if rhs.ty != entry_ty {
            self.error(
                ErrorKind::TypeMismatch,
                line,
                format!("type mismatch in assignment to '{}', expected '{}' but got {}", lhs.name, entry_ty.display(), rhs.ty.display()),
            );
        }
        let folded = eval_const_expr(rhs);
        self.symtab.get_mut(id).value = folded;
        rhs.ty.clone()
    }

    fn check_indexed_assign(&mut self, line: usize, lhs: &mut VarRef, rhs: &mut Box<Expr>, id: SymbolId) -> Type {
        let dims = self.symtab.get(id).ty.dims.clone();
        if lhs.indices.len() != dims.len() {
            self.error(ErrorKind::ArrayMisuse, line, format!("dimension mismatch in assignment to '{}'", lhs.name));
            return Type::error();
        }

        let mut dynamic_index = false;
        let mut idx_vals = Vec::with_capacity(dims.len());
        for (i, idx) in lhs.indices.iter_mut().enumerate() {
            self.visit_expr(idx);
            if idx.ty.kind != Kind::Int {
                self.error(ErrorKind::ArrayMisuse, line, format!("array index must be int in assignment to '{}'", lhs.name));
                return Type::error();
            }
            match eval_const_expr(idx) {
                Some(ConstValue::Int(v)) => {
                    let v = v as i64;
                    if v < 0 || v as usize >= dims[i] {
                        self.error(ErrorKind::ArrayMisuse, line, format!("index out of bounds in assignment to '{}'", lhs.name));
                        return Type::error();
                    }
                    idx_vals.push(v as usize);
                }
                _ => {
                    dynamic_index = true;
                    break;
                }
            }
        }

        if self.symtab.get(id).array_values.is_none() {
            self.error(ErrorKind::ArrayMisuse, line, format!("variable '{}' is not an array", lhs.name));
            return Type::error();
        }

        let elem_ty = Type::new(self.symtab.get(id).ty.kind);
        let is_const = self.symtab.get(id).is_const;
        if is_const {
            self.error(ErrorKind::ConstViolation, line, format!("cannot assign to const '{}'", lhs.name));
        }

        if dynamic_index {
            // Dynamic indices cannot be tracked at compile time, so the
            // element-value cache can't be updated, but the const check
            // above still applies.
            if rhs.ty != elem_ty {
                self.error(
                    ErrorKind::TypeMismatch,
                    line,
                    format!("type mismatch in assignment to '{}', expected '{}' but got {}", lhs.name, elem_ty.display(), rhs.ty.display()),
                );
            }
            return rhs.ty.clone();
        }

        let strides = row_major_strides(&dims);
        let linear: usize = idx_vals.iter().zip(strides.iter()).map(|(v, s)| v * s).sum();

        if rhs.ty != elem_ty {
            self.error(
                ErrorKind::TypeMismatch,
                line,
                format!("type mismatch in assignment to '{}', expected '{}' but got {}", lhs.name, elem_ty.display(), rhs.ty.display()),
            );
        }

        let folded = eval_const_expr(rhs);
        let entry = self.symtab.get_mut(id);
        if let Some(values) = entry.array_values.as_mut() {
            match folded {
                Some(cv) => values[linear] = Some(cv),
                None => values.iter_mut().for_each(|slot| *slot = None),
            }
        }
        rhs.ty.clone()
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn row_major_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1usize; dims.len()];
    for k in (0..dims.len().saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * dims[k + 1];
    }
    strides
}

/// Shallow constant folder: literals only. Intentionally does not fold
/// unary/binary expressions.
pub fn eval_const_expr(e: &Expr) -> Option<ConstValue> {
    match &e.kind {
        ExprKind::IntLit(v) => Some(ConstValue::Int(*v)),
        ExprKind::RealLit(v) => Some(ConstValue::Real(*v)),
        ExprKind::StringLit(v) => Some(ConstValue::Str(v.clone())),
        ExprKind::BoolLit(v) => Some(ConstValue::Bool(*v)),
        ExprKind::CharLit(v) => Some(ConstValue::Char(*v)),
        _ => None,
    }
}

pub fn stmt_returns(s: &Stmt) -> bool {
    match &s.kind {
        StmtKind::Return(_) => true,
        StmtKind::Block(stmts) => all_paths_return(stmts),
        StmtKind::If { then_branch, else_branch: Some(else_branch), .. } => {
            stmt_returns(then_branch) && stmt_returns(else_branch)
        }
        _ => false,
    }
}

pub fn all_paths_return(stmts: &[Stmt]) -> bool {
    stmts.iter().any(stmt_returns)
}
