//! The code generator: a second traversal over the already-annotated AST
//! that emits a Jasmin-like textual listing. Assumes the program passed
//! semantic analysis; has no user-facing error paths.

use tracing::{debug, trace};

use crate::ast::{BinaryOp, Decl, Expr, ExprKind, FuncDecl, PostfixOp, Program, Stmt, StmtKind, UnaryOp, VarDecl, VarRef};
use crate::config::CompilerConfig;
use crate::context::{CodegenContext, LoopLabels};
use crate::emitter::LineEmitter;
use crate::symbol_table::{ConstValue, SymEntry, SymbolId, SymbolTable};
use crate::types::{Kind, Type};

/// Runs the code generator over an annotated program and returns the
/// emitted listing text. `symbols` is the table the semantic analyzer
/// produced; it is read-only from here on.
pub fn generate(program: &Program, symbols: &SymbolTable, config: &CompilerConfig) -> String {
    let mut gen = CodeGenerator { symtab: symbols, config, ctx: CodegenContext::new(), emitter: LineEmitter::new() };
    gen.gen_program(program);
    gen.emitter.into_text()
}

/// A top-level item in declaration order: either a global variable/const
/// (which needs a `field` line, and possibly `<clinit>` code) or a
/// function (which needs a `method` block). Built by walking
/// `Program::globals` then `Program::stmts`, since a `FuncDecl` — and a
/// bare `VarDecl`/`ConstDecl` — may legally appear in either list.
enum TopLevelItem<'a> {
    Global(&'a VarDecl, bool),
    Function(&'a FuncDecl),
    /// A top-level statement that is neither: printed directly into the
    /// synthesized `<clinit>`, in order (see DESIGN.md).
    ClinitStmt(&'a Stmt),
}

struct CodeGenerator<'a> {
    symtab: &'a SymbolTable,
    config: &'a CompilerConfig,
    ctx: CodegenContext,
    emitter: LineEmitter,
}

impl<'a> CodeGenerator<'a> {
    fn gen_program(&mut self, program: &Program) {
        let items = collect_top_level(program);

        self.emitter.emit(format!("class {}", self.config.class_name));
        self.emitter.emit("{");
        self.emitter.push();

        let mut clinit_body: Vec<&Stmt> = Vec::new();
        let mut clinit_inits: Vec<&VarDecl> = Vec::new();
        let mut functions: Vec<&FuncDecl> = Vec::new();

        for item in &items {
            match item {
                TopLevelItem::Global(vd, is_const) => {
                    self.gen_field_line(vd, *is_const);
                    if vd.init.is_some() && self.folded_literal(vd).is_none() {
                        clinit_inits.push(vd);
                    }
                }
                TopLevelItem::Function(f) => functions.push(f),
                TopLevelItem::ClinitStmt(s) => clinit_body.push(s),
            }
        }

        if !clinit_inits.is_empty() || !clinit_body.is_empty() {
            self.gen_clinit(&clinit_inits, &clinit_body);
        }

        for f in functions {
            self.gen_function(f);
        }

        self.emitter.pop();
        self.emitter.emit("}");
    }

    /// The folded literal for a global's initializer, if any — read back
    /// from the symbol table rather than re-running the folder, since the
    /// analyzer already populated `value` for every initializer that
    /// folded to a compile-time constant.
    fn folded_literal(&self, vd: &VarDecl) -> Option<ConstValue> {
        let id = vd.symbol?;
        self.symtab.get(id).value.clone()
    }

    fn gen_field_line(&mut self, vd: &VarDecl, _is_const: bool) {
        let ty = vd.declared_type();
        let desc = jvm_type_name(&ty);
        match self.folded_literal(vd) {
            Some(value) => self.emitter.emit(format!("field static {} {} = {}", desc, vd.name, render_const_literal(&value))),
            None => self.emitter.emit(format!("field static {} {}", desc, vd.name)),
        }
    }

    /// Headers for every global go out first, then any non-literal
    /// initializer runs in a synthesized class initializer — keeps
    /// forward references between globals well-defined regardless of
    /// declaration order.
    fn gen_clinit(&mut self, inits: &[&VarDecl], stmts: &[&Stmt]) {
        debug!(count = inits.len(), "emitting <clinit> for non-literal global initializers");
        self.emitter.emit(format!("method public static void {}()", CLINIT_NAME));
        self.emitter.emit("max_stack 32");
        self.emitter.emit("max_locals 32");
        self.emitter.emit("{");
        self.emitter.push();
        for vd in inits {
            if let (Some(init), Some(id)) = (&vd.init, vd.symbol) {
                self.gen_expr(init);
                self.emit_store_by_id(id);
            }
        }
        for s in stmts {
            self.gen_stmt(s);
        }
        self.emitter.pop();
        self.emitter.emit("}");
    }

    fn gen_function(&mut self, f: &FuncDecl) {
        debug!(func = %f.name, "generating method");
        let ret = jvm_type_name(&f.return_type());
        let params = if f.name == "main" {
            "java.lang.String[]".to_string()
        } else {
            f.params.iter().map(|p| jvm_type_name(&p.declared_type())).collect::<Vec<_>>().join(", ")
        };
        self.emitter.emit(format!("method public static {} {}({})", ret, f.name, params));
        self.emitter.emit("max_stack 32");
        self.emitter.emit("max_locals 32");
        self.emitter.emit("{");
        self.emitter.push();
        self.gen_stmt(&f.body);
        if f.return_kind == Kind::Void {
            self.emitter.emit("return");
        }
        self.emitter.pop();
        self.emitter.emit("}");
    }

    // ---- Statements -----------------------------------------------------

    fn gen_stmt(&mut self, s: &Stmt) {
        match &s.kind {
            StmtKind::Block(stmts) => {
                for stmt in stmts {
                    self.gen_stmt(stmt);
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => self.gen_if(cond, then_branch, else_branch.as_deref()),
            StmtKind::While { cond, body } => self.gen_while(cond, body),
            StmtKind::For { init, cond, step, body } => self.gen_for(init, cond.as_ref(), step, body),
            StmtKind::ForEach { var, collection, body } => self.gen_foreach(var, collection, body),
            StmtKind::Return(expr) => match expr {
                Some(e) => {
                    self.gen_expr(e);
                    self.emitter.emit("ireturn");
                }
                None => self.emitter.emit("return"),
            },
            StmtKind::ExprStmt(e) => {
                self.gen_expr(e);
                self.emit_discard(e);
            }
            StmtKind::Empty => {}
            StmtKind::Print(e) => self.gen_print(e, "print"),
            StmtKind::Println(e) => self.gen_print(e, "println"),
            StmtKind::Read(var) => self.gen_read(var),
            StmtKind::Decl(Decl::Var(vd)) | StmtKind::Decl(Decl::Const(vd)) => self.gen_local_decl(vd),
            StmtKind::Decl(Decl::Func(_)) => {
                // Nested function declarations are generated once, at the
                // Program level, from the flattened top-level item list
                // (`collect_top_level`); nothing to emit here.
            }
        }
    }

    /// A local (function-scoped) variable/const declaration with an
    /// initializer emits the store the declaration itself performs; a
    /// global declared via `Program::stmts` rather than `Program::globals`
    /// was already handled by `gen_clinit` and has no symbol-less
    /// counterpart here, so this only fires for true locals.
    fn gen_local_decl(&mut self, vd: &VarDecl) {
        let Some(id) = vd.symbol else { return };
        if self.symtab.get(id).is_global {
            return;
        }
        if let Some(init) = &vd.init {
            self.gen_expr(init);
            self.emit_store_by_id(id);
        }
    }

    fn gen_if(&mut self, cond: &Expr, then_branch: &Stmt, else_branch: Option<&Stmt>) {
        self.gen_expr(cond);
        let l_else = self.ctx.fresh_label();
        self.emitter.emit(format!("ifeq {l_else}"));
        self.gen_stmt(then_branch);
        match else_branch {
            None => self.emitter.emit(format!("{l_else}:")),
            Some(else_branch) => {
                let l_end = self.ctx.fresh_label();
                self.emitter.emit(format!("goto {l_end}"));
                self.emitter.emit(format!("{l_else}:"));
                self.gen_stmt(else_branch);
                self.emitter.emit(format!("{l_end}:"));
            }
        }
    }

    fn gen_while(&mut self, cond: &Expr, body: &Stmt) {
        let l_top = self.ctx.fresh_label();
        let l_end = self.ctx.fresh_label();
        self.emitter.emit(format!("{l_top}:"));
        self.gen_expr(cond);
        self.emitter.emit(format!("ifeq {l_end}"));
        self.ctx.push_loop(LoopLabels { continue_label: l_top.clone(), break_label: l_end.clone() });
        self.gen_stmt(body);
        self.ctx.pop_loop();
        self.emitter.emit(format!("goto {l_top}"));
        self.emitter.emit(format!("{l_end}:"));
    }

    fn gen_for(&mut self, init: &Stmt, cond: Option<&Expr>, step: &Stmt, body: &Stmt) {
        self.gen_stmt(init);
        let l_top = self.ctx.fresh_label();
        let l_end = self.ctx.fresh_label();
        self.emitter.emit(format!("{l_top}:"));
        if let Some(cond) = cond {
            self.gen_expr(cond);
            self.emitter.emit(format!("ifeq {l_end}"));
        }
        self.ctx.push_loop(LoopLabels { continue_label: l_top.clone(), break_label: l_end.clone() });
        self.gen_stmt(body);
        self.ctx.pop_loop();
        self.gen_stmt(step);
        self.emitter.emit(format!("goto {l_top}"));
        self.emitter.emit(format!("{l_end}:"));
    }

    /// Ascending/descending dual-branch form: dispatch once on
    /// `start <= end`, then each branch is a do-while loop whose own
    /// bottom test (`if_icmple`/`if_icmpge` against `end`) decides whether
    /// to repeat, converging at one exit label.
    fn gen_foreach(&mut self, var: &VarRef, collection: &Expr, body: &Stmt) {
        let (start, end) = match &collection.kind {
            ExprKind::Range { start, end } => (start.as_ref(), end.as_ref()),
            _ => {
                trace!("foreach collection was not a range after analysis; skipping codegen");
                return;
            }
        };
        let Some(idx_id) = var.symbol else { return };

        let l_asc = self.ctx.fresh_label();
        let l_desc = self.ctx.fresh_label();
        let l_asc_top = self.ctx.fresh_label();
        let l_desc_top = self.ctx.fresh_label();
        let l_exit = self.ctx.fresh_label();

        self.gen_expr(start);
        self.emit_store_by_id(idx_id);
        self.emit_load_by_id(idx_id);
        self.gen_expr(end);
        self.emitter.emit(format!("if_icmple {l_asc}"));
        self.emitter.emit(format!("goto {l_desc}"));

        self.emitter.emit(format!("{l_asc}:"));
        self.emitter.emit(format!("{l_asc_top}:"));
        self.ctx.push_loop(LoopLabels { continue_label: l_asc_top.clone(), break_label: l_exit.clone() });
        self.gen_stmt(body);
        self.ctx.pop_loop();
        self.emit_load_by_id(idx_id);
        self.emitter.emit("iconst_1");
        self.emitter.emit("iadd");
        self.emit_store_by_id(idx_id);
        self.emit_load_by_id(idx_id);
        self.gen_expr(end);
        self.emitter.emit(format!("if_icmple {l_asc_top}"));
        self.emitter.emit(format!("goto {l_exit}"));

        self.emitter.emit(format!("{l_desc}:"));
        self.emitter.emit(format!("{l_desc_top}:"));
        self.ctx.push_loop(LoopLabels { continue_label: l_desc_top.clone(), break_label: l_exit.clone() });
        self.gen_stmt(body);
        self.ctx.pop_loop();
        self.emit_load_by_id(idx_id);
        self.emitter.emit("iconst_1");
        self.emitter.emit("isub");
        self.emit_store_by_id(idx_id);
        self.emit_load_by_id(idx_id);
        self.gen_expr(end);
        self.emitter.emit(format!("if_icmpge {l_desc_top}"));

        self.emitter.emit(format!("{l_exit}:"));
    }

    fn gen_print(&mut self, e: &Expr, which: &str) {
        self.emitter.emit("getstatic java.io.PrintStream java.lang.System.out");
        self.gen_expr(e);
        let method = if which == "println" { "println" } else { "print" };
        self.emitter.emit(format!("invokevirtual void java.io.PrintStream.{method}({})", jvm_type_name(&e.ty)));
    }

    /// There's no natural single JVM instruction for a runtime `read`
    /// (array load/store is the other such gap, and is left unemitted as
    /// a non-goal). Rather than silently drop the statement, this emits a
    /// call to a conventional runtime hook per scalar type and stores the
    /// result — see DESIGN.md.
    fn gen_read(&mut self, var: &VarRef) {
        let Some(id) = var.symbol else { return };
        let ty = self.symtab.get(id).ty.clone();
        let desc = jvm_type_name(&ty);
        self.emitter.emit(format!("invokestatic {desc} {}.__read_{}()", self.config.class_name, read_suffix(&ty)));
        self.emit_store_by_id(id);
    }

    // ---- Expressions ------------------------------------------------------

    fn gen_expr(&mut self, e: &Expr) {
        match &e.kind {
            ExprKind::IntLit(v) => self.emitter.emit(int_literal_instr(*v)),
            ExprKind::RealLit(v) => self.emitter.emit(format!("ldc2_w {v}")),
            ExprKind::StringLit(v) => self.emitter.emit(format!("ldc \"{}\"", escape_string_literal(v))),
            ExprKind::BoolLit(v) => self.emitter.emit(if *v { "iconst_1" } else { "iconst_0" }),
            ExprKind::CharLit(v) => self.emitter.emit(format!("ldc '{v}'")),
            ExprKind::Var(v) => self.gen_var_load(v),
            ExprKind::Unary { op, rhs } => self.gen_unary(*op, rhs),
            ExprKind::Binary { op, lhs, rhs } => self.gen_binary(*op, lhs, rhs),
            ExprKind::Postfix { op, operand } => self.gen_postfix(*op, operand),
            ExprKind::Call { callee, args, .. } => self.gen_call(callee, args),
            ExprKind::Range { start, end } => {
                // Only ever reached as a sub-expression of a foreach
                // collection, which handles it directly; evaluating it
                // stand-alone has no instruction shape.
                self.gen_expr(start);
                self.gen_expr(end);
            }
            ExprKind::Assign { lhs, rhs } => self.gen_assign(lhs, rhs),
        }
    }

    fn gen_var_load(&mut self, v: &VarRef) {
        let Some(id) = v.symbol else { return };
        self.emit_load_by_id(id);
    }

    fn gen_unary(&mut self, op: UnaryOp, rhs: &Expr) {
        self.gen_expr(rhs);
        match op {
            UnaryOp::Neg => self.emitter.emit("ineg"),
            UnaryOp::Not => {
                // Branchless in the sense that there is no dedicated
                // boolean-negation opcode; the flip is the same
                // two-label push pattern used for comparisons.
                let l_true = self.ctx.fresh_label();
                let l_end = self.ctx.fresh_label();
                self.emitter.emit(format!("ifeq {l_true}"));
                self.emitter.emit("iconst_0");
                self.emitter.emit(format!("goto {l_end}"));
                self.emitter.emit(format!("{l_true}:"));
                self.emitter.emit("iconst_1");
                self.emitter.emit(format!("{l_end}:"));
            }
        }
    }

    fn gen_binary(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) {
        if op.is_logical() {
            self.gen_logical(op, lhs, rhs);
            return;
        }
        self.gen_expr(lhs);
        self.gen_expr(rhs);
        match op {
            BinaryOp::Add => self.emitter.emit("iadd"),
            BinaryOp::Sub => self.emitter.emit("isub"),
            BinaryOp::Mul => self.emitter.emit("imul"),
            BinaryOp::Div => self.emitter.emit("idiv"),
            BinaryOp::Mod => self.emitter.emit("irem"),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Eq | BinaryOp::Ne => {
                self.gen_comparison(op);
            }
            BinaryOp::And | BinaryOp::Or => unreachable!("handled by gen_logical above"),
        }
    }

    /// `isub`, then a conditional branch to a "true" label that pushes
    /// `1`, skipping over a `0` push.
    fn gen_comparison(&mut self, op: BinaryOp) {
        self.emitter.emit("isub");
        let opcode = match op {
            BinaryOp::Lt => "iflt",
            BinaryOp::Le => "ifle",
            BinaryOp::Gt => "ifgt",
            BinaryOp::Ge => "ifge",
            BinaryOp::Eq => "ifeq",
            BinaryOp::Ne => "ifne",
            _ => unreachable!(),
        };
        let l_true = self.ctx.fresh_label();
        let l_end = self.ctx.fresh_label();
        self.emitter.emit(format!("{opcode} {l_true}"));
        self.emitter.emit("iconst_0");
        self.emitter.emit(format!("goto {l_end}"));
        self.emitter.emit(format!("{l_true}:"));
        self.emitter.emit("iconst_1");
        self.emitter.emit(format!("{l_end}:"));
    }

    /// Branch-based short-circuit evaluation: an impure RHS is not
    /// evaluated once the LHS already decides the result.
    fn gen_logical(&mut self, op: BinaryOp, lhs: &Expr, rhs: &Expr) {
        self.gen_expr(lhs);
        let l_short = self.ctx.fresh_label();
        let l_end = self.ctx.fresh_label();
        let short_circuit_on = if op == BinaryOp::And { "ifeq" } else { "ifne" };
        self.emitter.emit(format!("{short_circuit_on} {l_short}"));
        self.gen_expr(rhs);
        self.emitter.emit(format!("{short_circuit_on} {l_short}"));
        self.emitter.emit(if op == BinaryOp::And { "iconst_1" } else { "iconst_0" });
        self.emitter.emit(format!("goto {l_end}"));
        self.emitter.emit(format!("{l_short}:"));
        self.emitter.emit(if op == BinaryOp::And { "iconst_0" } else { "iconst_1" });
        self.emitter.emit(format!("{l_end}:"));
    }

    /// Pre-modification value on the stack (`dup` happens before the
    /// arithmetic).
    fn gen_postfix(&mut self, op: PostfixOp, operand: &Expr) {
        let ExprKind::Var(v) = &operand.kind else {
            trace!("postfix operand was not a variable reference after analysis; skipping codegen");
            return;
        };
        let Some(id) = v.symbol else { return };
        let step = match op {
            PostfixOp::Inc => "iadd",
            PostfixOp::Dec => "isub",
        };
        self.emit_load_by_id(id);
        self.emitter.emit("dup");
        self.emitter.emit("iconst_1");
        self.emitter.emit(step);
        self.emit_store_by_id(id);
    }

    fn gen_call(&mut self, callee: &str, args: &[Expr]) {
        for a in args {
            self.gen_expr(a);
        }
        let Some(id) = self.symtab.lookup(callee) else {
            trace!(callee, "call to unresolved function; symbol table lookup failed post-analysis");
            return;
        };
        let entry = self.symtab.get(id);
        let ret = entry.return_type.clone().unwrap_or_else(|| Type::new(Kind::Void));
        let params = entry.param_types.clone().unwrap_or_default();
        let params_desc = params.iter().map(jvm_type_name).collect::<Vec<_>>().join(", ");
        self.emitter.emit(format!(
            "invokestatic {} {}.{}({})",
            jvm_type_name(&ret),
            self.config.class_name,
            callee,
            params_desc
        ));
    }

    /// Leaves the RHS value on the stack (`dup` before the store) so a
    /// nested assignment like `x = y = z` does not underflow.
    fn gen_assign(&mut self, lhs: &VarRef, rhs: &Expr) {
        self.gen_expr(rhs);
        self.emitter.emit("dup");
        let Some(id) = lhs.symbol else { return };
        self.emit_store_by_id(id);
    }

    /// A bare expression-statement discards whatever the expression left
    /// on the stack. `gen_assign`'s `dup` makes the assignment's value
    /// available to a surrounding expression; at statement level nothing
    /// consumes it, so it gets `pop`-ed like any other non-void result.
    fn emit_discard(&mut self, e: &Expr) {
        if e.ty.is_error() || e.ty.kind == Kind::Void {
            return;
        }
        self.emitter.emit("pop");
    }

    fn emit_load_by_id(&mut self, id: SymbolId) {
        let entry: &SymEntry = self.symtab.get(id);
        if entry.is_global {
            self.emitter.emit(format!("getstatic {} {}.{}", jvm_type_name(&entry.ty), self.config.class_name, entry.name));
        } else {
            self.emitter.emit(format!("iload {}", entry.slot));
        }
    }

    fn emit_store_by_id(&mut self, id: SymbolId) {
        let entry: &SymEntry = self.symtab.get(id);
        if entry.is_global {
            self.emitter.emit(format!("putstatic {} {}.{}", jvm_type_name(&entry.ty), self.config.class_name, entry.name));
        } else {
            self.emitter.emit(format!("istore {}", entry.slot));
        }
    }
}

const CLINIT_NAME: &str = "<clinit>";

fn collect_top_level(program: &Program) -> Vec<TopLevelItem<'_>> {
    let mut items = Vec::new();
    for d in &program.globals {
        push_decl_item(&mut items, d);
    }
    for s in &program.stmts {
        match &s.kind {
            StmtKind::Decl(d) => push_decl_item(&mut items, d),
            _ => items.push(TopLevelItem::ClinitStmt(s)),
        }
    }
    items
}

fn push_decl_item<'a>(items: &mut Vec<TopLevelItem<'a>>, d: &'a Decl) {
    match d {
        Decl::Var(vd) => items.push(TopLevelItem::Global(vd, false)),
        Decl::Const(vd) => items.push(TopLevelItem::Global(vd, true)),
        Decl::Func(f) => items.push(TopLevelItem::Function(f)),
    }
}

fn jvm_type_name(ty: &Type) -> String {
    let base = match ty.kind {
        Kind::Bool => "boolean",
        Kind::Char => "char",
        Kind::Int => "int",
        Kind::Float => "float",
        Kind::Double => "double",
        Kind::String => "java.lang.String",
        Kind::Void => "void",
        Kind::Error => "error",
    };
    let mut s = base.to_string();
    for _ in &ty.dims {
        s.push_str("[]");
    }
    s
}

fn read_suffix(ty: &Type) -> &'static str {
    match ty.kind {
        Kind::Bool => "bool",
        Kind::Char => "char",
        Kind::Int => "int",
        Kind::Float => "float",
        Kind::Double => "double",
        Kind::String => "string",
        Kind::Void | Kind::Error => "int",
    }
}

fn int_literal_instr(n: i64) -> String {
    if n == -1 {
        "iconst_m1".to_string()
    } else if (0..=5).contains(&n) {
        format!("iconst_{n}")
    } else if (-127..=127).contains(&n) {
        format!("bipush {n}")
    } else {
        format!("ldc {n}")
    }
}

fn render_const_literal(value: &ConstValue) -> String {
    match value {
        ConstValue::Int(v) => v.to_string(),
        ConstValue::Real(v) => v.to_string(),
        ConstValue::Str(v) => format!("\"{}\"", escape_string_literal(v)),
        ConstValue::Bool(v) => if *v { "true" } else { "false" }.to_string(),
        ConstValue::Char(v) => format!("'{v}'"),
    }
}

fn escape_string_literal(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::SemanticAnalyzer;
    use crate::ast::{BinaryOp as BOp, ExprKind as EK, VarDecl as VD};

    fn compile(mut program: Program, class_name: &str) -> String {
        let outcome = SemanticAnalyzer::new().analyze(&mut program);
        assert!(!outcome.has_errors(), "unexpected analysis errors: {:?}", outcome.diagnostics.render_all());
        generate(&program, &outcome.symbols, &CompilerConfig::default().with_class_name(class_name))
    }

    fn int_lit(line: usize, v: i64) -> Expr {
        Expr::new(line, EK::IntLit(v))
    }

    #[test]
    fn int_literal_thresholds() {
        assert_eq!(int_literal_instr(-1), "iconst_m1");
        assert_eq!(int_literal_instr(0), "iconst_0");
        assert_eq!(int_literal_instr(5), "iconst_5");
        assert_eq!(int_literal_instr(6), "bipush 6");
        assert_eq!(int_literal_instr(127), "bipush 127");
        assert_eq!(int_literal_instr(128), "ldc 128");
        assert_eq!(int_literal_instr(-200), "ldc -200");
    }

    /// An assignment used as a statement (`x = n;`) must leave the stack
    /// balanced: `dup` makes the value available to a surrounding
    /// expression, but at statement level nothing consumes it, so
    /// `emit_discard` must `pop` it same as any other non-void
    /// expression-statement.
    #[test]
    fn assignment_statement_pops_the_duplicated_value() {
        let x_decl = VD { line: 1, name: "x".into(), declared_kind: Kind::Int, dims: vec![], init: None, symbol: None };
        let body = Stmt::new(
            1,
            StmtKind::Block(vec![
                Stmt::new(1, StmtKind::Decl(Decl::Var(x_decl))),
                Stmt::new(
                    1,
                    StmtKind::ExprStmt(Expr::new(
                        1,
                        EK::Assign { lhs: VarRef::new(1, "x", vec![]), rhs: Box::new(Expr::new(1, EK::Var(VarRef::new(1, "n", vec![])))) },
                    )),
                ),
            ]),
        );
        let program = Program {
            globals: vec![Decl::Func(FuncDecl {
                line: 1,
                name: "f".into(),
                return_kind: Kind::Void,
                params: vec![VD { line: 1, name: "n".into(), declared_kind: Kind::Int, dims: vec![], init: None, symbol: None }],
                body,
                symbol: None,
            })],
            stmts: vec![],
        };
        let text = compile(program, "Example");
        let dup_idx = text.find("dup").unwrap();
        let tail: Vec<&str> = text[dup_idx..].lines().map(str::trim).take(3).collect();
        assert_eq!(tail[0], "dup");
        assert!(tail[1].starts_with("istore"), "expected a store right after dup, got {:?}", tail[1]);
        assert_eq!(tail[2], "pop", "assignment-as-statement must discard the duplicated value");
    }

    #[test]
    fn global_with_literal_initializer_is_inlined() {
        let program = Program {
            globals: vec![Decl::Var(VD { line: 1, name: "g".into(), declared_kind: Kind::Int, dims: vec![], init: Some(int_lit(1, 7)), symbol: None })],
            stmts: vec![],
        };
        let text = compile(program, "Example");
        assert!(text.contains("field static int g = 7"));
        assert!(!text.contains("<clinit>"));
    }

    #[test]
    fn global_with_non_literal_initializer_emits_clinit() {
        let program = Program {
            globals: vec![
                Decl::Var(VD { line: 1, name: "g2".into(), declared_kind: Kind::Int, dims: vec![], init: Some(int_lit(1, 1)), symbol: None }),
                Decl::Var(VD {
                    line: 2,
                    name: "g".into(),
                    declared_kind: Kind::Int,
                    dims: vec![],
                    init: Some(Expr::new(2, EK::Binary { op: BOp::Add, lhs: Box::new(Expr::new(2, EK::Var(VarRef::new(2, "g2", vec![])))), rhs: Box::new(int_lit(2, 1)) })),
                    symbol: None,
                }),
            ],
            stmts: vec![],
        };
        let text = compile(program, "Example");
        assert!(text.contains("field static int g\n") || text.contains("field static int g"));
        assert!(!text.contains("field static int g ="));
        assert!(text.contains("<clinit>"));
        assert!(text.contains("putstatic int Example.g"));
    }

    #[test]
    fn method_body_starts_with_max_stack_and_locals_then_brace() {
        let program = Program {
            globals: vec![Decl::Func(FuncDecl {
                line: 1,
                name: "f".into(),
                return_kind: Kind::Void,
                params: vec![],
                body: Stmt::new(1, StmtKind::Block(vec![])),
                symbol: None,
            })],
            stmts: vec![],
        };
        let text = compile(program, "Example");
        let idx = text.find("method public static void f()").unwrap();
        let tail = &text[idx..];
        let lines: Vec<&str> = tail.lines().take(4).map(str::trim).collect();
        assert_eq!(lines[1], "max_stack 32");
        assert_eq!(lines[2], "max_locals 32");
        assert_eq!(lines[3], "{");
    }

    #[test]
    fn recursive_call_emits_invokestatic_and_imul() {
        // int fact(int n) { if (n <= 1) return 1; else return n * fact(n-1); }
        let n_ref = || VarRef::new(1, "n", vec![]);
        let body = Stmt::new(
            1,
            StmtKind::Block(vec![Stmt::new(
                1,
                StmtKind::If {
                    cond: Expr::new(1, EK::Binary { op: BOp::Le, lhs: Box::new(Expr::new(1, EK::Var(n_ref()))), rhs: Box::new(int_lit(1, 1)) }),
                    then_branch: Box::new(Stmt::new(1, StmtKind::Return(Some(int_lit(1, 1))))),
                    else_branch: Some(Box::new(Stmt::new(
                        1,
                        StmtKind::Return(Some(Expr::new(
                            1,
                            EK::Binary {
                                op: BOp::Mul,
                                lhs: Box::new(Expr::new(1, EK::Var(n_ref()))),
                                rhs: Box::new(Expr::new(
                                    1,
                                    EK::Call {
                                        callee: "fact".into(),
                                        args: vec![Expr::new(1, EK::Binary { op: BOp::Sub, lhs: Box::new(Expr::new(1, EK::Var(n_ref()))), rhs: Box::new(int_lit(1, 1)) })],
                                        callee_symbol: None,
                                    },
                                )),
                            },
                        ))),
                    ))),
                },
            )]),
        );
        let program = Program {
            globals: vec![Decl::Func(FuncDecl {
                line: 1,
                name: "fact".into(),
                return_kind: Kind::Int,
                params: vec![VD { line: 1, name: "n".into(), declared_kind: Kind::Int, dims: vec![], init: None, symbol: None }],
                body,
                symbol: None,
            })],
            stmts: vec![],
        };
        let text = compile(program, "Example");
        assert!(text.contains("invokestatic int Example.fact(int)"));
        assert!(text.contains("imul"));
        assert!(text.contains("isub"));
    }
}
