//! Code generator implementation.

use core::mem;

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::assembler::{Assembler, KnownLabel, PendingLabel, Totals};
use super::reduce_ref;
use crate::api::CompilationOptions;
use crate::ast::{
    Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, Names, ParsedVerb, ScatterItem,
    ScatterKind, Stmt, UnaryOp, VarId,
};
use crate::program::{Bytecodes, FormatVersion, Program};
use crate::values::{Interner, StringPool, Value};
use crate::vm::{ExtOpcode, Opcode, optim_num_opcode};
use crate::Vec;

/// Compiles a parsed verb into a [`Program`], interning string literals in a
/// fresh [`StringPool`].
pub fn generate(verb: &ParsedVerb, options: &CompilationOptions) -> Program {
    let mut pool = StringPool::new();
    generate_with_interner(verb, options, &mut pool)
}

/// Compiles a parsed verb into a [`Program`], interning string literals
/// through `interner`.
pub fn generate_with_interner(
    verb: &ParsedVerb,
    options: &CompilationOptions,
    interner: &mut dyn Interner,
) -> Program {
    CodeGenerator::new(options, &verb.names, interner).compile(&verb.body)
}

/// Break/continue bookkeeping for one enclosing loop.
struct Loop {
    id: Option<VarId>,
    top: KnownLabel,
    top_stack: usize,
    bottom: PendingLabel,
    bottom_stack: usize,
}

/// Scratch state for the vector currently being emitted.
#[derive(Default)]
struct VectorState {
    asm: Assembler,
    cur_stack: usize,
    max_stack: usize,
    /// Stack slot holding the collection `$` refers to.
    saved_stack: Option<usize>,
    loops: Vec<Loop>,
}

/// A vector whose bytes are emitted but not yet relocated.
struct RawVector {
    asm: Assembler,
    max_stack: usize,
}

/// Recursive AST walk producing one [`Program`].
///
/// Fork bodies are emitted into their own vectors. Relocation is deferred
/// until every vector is emitted so each one sees the final literal and
/// fork counts.
pub struct CodeGenerator<'a> {
    options: &'a CompilationOptions,
    names: &'a Names,
    interner: &'a mut dyn Interner,
    literals: Vec<Value>,
    literal_map: HashMap<Value, usize>,
    forks: Vec<RawVector>,
    state: VectorState,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(
        options: &'a CompilationOptions,
        names: &'a Names,
        interner: &'a mut dyn Interner,
    ) -> Self {
        Self {
            options,
            names,
            interner,
            literals: Vec::new(),
            literal_map: HashMap::new(),
            forks: Vec::new(),
            state: VectorState::default(),
        }
    }

    pub fn compile(mut self, body: &[Stmt]) -> Program {
        let main = self.gen_vector(body);

        let literals = self.literals.len();
        let forks = self.forks.len();
        let var_names = self.names.len();
        let reduce_ref = self.options.reduce_ref;
        let relocate = |mut raw: RawVector| {
            if reduce_ref {
                reduce_ref::reduce_refs(&mut raw.asm);
            }
            raw.asm.finish(Totals {
                literals,
                forks,
                var_names,
                max_stack: raw.max_stack,
            })
        };
        let main_vector = relocate(main);
        let fork_vectors: Vec<Bytecodes> = mem::take(&mut self.forks)
            .into_iter()
            .map(&relocate)
            .collect();

        tracing::debug!(
            bytes = main_vector.len(),
            forks = fork_vectors.len(),
            literals = self.literals.len(),
            max_stack = main_vector.max_stack(),
            "generated program"
        );

        Program::new(
            self.options.version,
            self.options.reduce_ref,
            self.options.first_lineno,
            self.literals,
            main_vector,
            fork_vectors,
            self.names.clone(),
        )
    }

    /// Emits `body` followed by `DONE` into a fresh vector.
    fn gen_vector(&mut self, body: &[Stmt]) -> RawVector {
        let outer = mem::take(&mut self.state);
        self.gen_stmts(body);
        self.emit(Opcode::Done);
        let state = mem::replace(&mut self.state, outer);

        if state.cur_stack != 0 {
            fatal!("stack depth {} at end of vector, expected 0", state.cur_stack);
        }
        if !state.loops.is_empty() {
            fatal!("{} loop frames left open at end of vector", state.loops.len());
        }
        tracing::trace!(bytes = state.asm.num_bytes(), max_stack = state.max_stack, "emitted vector");
        RawVector {
            asm: state.asm,
            max_stack: state.max_stack,
        }
    }

    // ========================================================================
    // Stack accounting
    // ========================================================================

    fn push_stack(&mut self, n: usize) {
        self.state.cur_stack += n;
        if self.state.cur_stack > self.state.max_stack {
            self.state.max_stack = self.state.cur_stack;
        }
    }

    fn pop_stack(&mut self, n: usize) {
        if self.state.cur_stack < n {
            fatal!("stack underflow: popping {} at depth {}", n, self.state.cur_stack);
        }
        self.state.cur_stack -= n;
    }

    /// Points `$` at the value on top of the stack, returning the previous
    /// context for [`Self::restore_stack_top`].
    fn save_stack_top(&mut self) -> Option<usize> {
        let old = self.state.saved_stack;
        self.state.saved_stack = Some(self.state.cur_stack - 1);
        old
    }

    fn restore_stack_top(&mut self, old: Option<usize>) {
        self.state.saved_stack = old;
    }

    // ========================================================================
    // Emission helpers
    // ========================================================================

    fn asm(&mut self) -> &mut Assembler {
        &mut self.state.asm
    }

    fn emit(&mut self, op: Opcode) {
        self.asm().emit(op);
    }

    fn emit_ext(&mut self, op: ExtOpcode) {
        self.options.version.require(op.since(), op.mnemonic());
        self.asm().emit_ext(op);
    }

    fn emit_count(&mut self, n: usize, what: &str) {
        match u8::try_from(n) {
            Ok(byte) => self.asm().emit_byte(byte),
            Err(_) => fatal!("{} {} does not fit in one byte", what, n),
        }
    }

    fn emit_small_int(&mut self, i: i64) {
        match optim_num_opcode(i) {
            Some(opcode) => self.asm().emit_num(opcode),
            None => fatal!("{} has no optimized opcode", i),
        }
    }

    fn add_literal(&mut self, value: &Value) -> usize {
        if let Some(&index) = self.literal_map.get(value) {
            return index;
        }
        let value = match value {
            Value::Str(s) => Value::Str(self.interner.intern(s)),
            other => other.clone(),
        };
        let index = self.literals.len();
        self.literals.push(value.clone());
        self.literal_map.insert(value, index);
        index
    }

    fn enter_loop(
        &mut self,
        id: Option<VarId>,
        top: KnownLabel,
        top_stack: usize,
        bottom: PendingLabel,
        bottom_stack: usize,
    ) {
        self.state.loops.push(Loop {
            id,
            top,
            top_stack,
            bottom,
            bottom_stack,
        });
    }

    fn exit_loop(&mut self) -> PendingLabel {
        match self.state.loops.pop() {
            Some(frame) => frame.bottom,
            None => fatal!("loop stack empty on loop exit"),
        }
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn gen_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.gen_stmt(stmt);
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Cond { arms, otherwise } => self.gen_cond(arms, otherwise.as_deref()),
            Stmt::ForList { id, expr, body } => {
                self.gen_expr(expr);
                self.emit_small_int(1);
                self.push_stack(1);
                let top = self.asm().capture_label();
                self.emit(Opcode::ForList);
                self.asm().add_var_ref(*id);
                let end = self.asm().add_label();
                let depth = self.state.cur_stack;
                self.enter_loop(Some(*id), top, depth, end, depth - 2);
                self.gen_stmts(body);
                let end = self.exit_loop();
                self.emit(Opcode::Jump);
                self.asm().add_known_label(top);
                self.asm().define_label(end);
                self.pop_stack(2);
            }
            Stmt::ForRange { id, from, to, body } => {
                self.gen_expr(from);
                self.gen_expr(to);
                let top = self.asm().capture_label();
                self.emit(Opcode::ForRange);
                self.asm().add_var_ref(*id);
                let end = self.asm().add_label();
                let depth = self.state.cur_stack;
                self.enter_loop(Some(*id), top, depth, end, depth - 2);
                self.gen_stmts(body);
                let end = self.exit_loop();
                self.emit(Opcode::Jump);
                self.asm().add_known_label(top);
                self.asm().define_label(end);
                self.pop_stack(2);
            }
            Stmt::While { id, condition, body } => {
                let top = self.asm().capture_label();
                self.gen_expr(condition);
                match id {
                    None => self.emit(Opcode::While),
                    Some(id) => {
                        self.emit_ext(ExtOpcode::WhileId);
                        self.asm().add_var_ref(*id);
                    }
                }
                let end = self.asm().add_label();
                self.pop_stack(1);
                let depth = self.state.cur_stack;
                self.enter_loop(*id, top, depth, end, depth);
                self.gen_stmts(body);
                let end = self.exit_loop();
                self.emit(Opcode::Jump);
                self.asm().add_known_label(top);
                self.asm().define_label(end);
            }
            Stmt::Fork { id, delay, body } => {
                self.gen_expr(delay);
                let raw = self.gen_vector(body);
                let index = self.forks.len();
                self.forks.push(raw);
                match id {
                    None => {
                        self.emit(Opcode::Fork);
                        self.asm().add_fork(index);
                    }
                    Some(id) => {
                        self.emit(Opcode::ForkWithId);
                        self.asm().add_fork(index);
                        self.asm().add_var_ref(*id);
                    }
                }
                self.pop_stack(1);
            }
            Stmt::Expr(expr) => {
                self.gen_expr(expr);
                self.emit(Opcode::Pop);
                self.pop_stack(1);
            }
            Stmt::Return(Some(expr)) => {
                self.gen_expr(expr);
                self.emit(Opcode::Return);
                self.pop_stack(1);
            }
            Stmt::Return(None) => self.emit(Opcode::Return0),
            Stmt::TryExcept { body, excepts } => self.gen_try_except(body, excepts),
            Stmt::TryFinally { body, handler } => {
                self.emit_ext(ExtOpcode::TryFinally);
                let handler_label = self.asm().add_label();
                self.push_stack(1);
                self.asm().enter_protected();
                self.gen_stmts(body);
                self.asm().exit_protected();
                self.emit_ext(ExtOpcode::EndFinally);
                self.pop_stack(1);
                self.asm().define_label(handler_label);
                // completion reason and value
                self.push_stack(2);
                self.gen_stmts(handler);
                self.emit_ext(ExtOpcode::Continue);
                self.pop_stack(2);
            }
            Stmt::Break(id) => self.gen_exit(*id, false),
            Stmt::Continue(id) => self.gen_exit(*id, true),
        }
    }

    fn gen_cond(&mut self, arms: &[CondArm], otherwise: Option<&[Stmt]>) {
        if arms.is_empty() {
            fatal!("conditional statement without arms");
        }
        let mut end: Option<PendingLabel> = None;
        for (i, arm) in arms.iter().enumerate() {
            self.gen_expr(&arm.condition);
            self.emit(if i == 0 { Opcode::If } else { Opcode::Eif });
            let else_label = self.asm().add_label();
            self.pop_stack(1);
            self.gen_stmts(&arm.body);
            if i + 1 < arms.len() || otherwise.is_some() {
                self.emit(Opcode::Jump);
                end = Some(match end {
                    None => self.asm().add_label(),
                    Some(chain) => self.asm().add_linked_label(chain),
                });
            }
            self.asm().define_label(else_label);
        }
        if let Some(otherwise) = otherwise {
            self.gen_stmts(otherwise);
        }
        if let Some(end) = end {
            self.asm().define_label(end);
        }
    }

    fn gen_try_except(&mut self, body: &[Stmt], excepts: &[ExceptArm]) {
        let mut handlers: SmallVec<[PendingLabel; 4]> = SmallVec::new();
        for arm in excepts {
            self.gen_codes(&arm.codes);
            self.emit_ext(ExtOpcode::PushLabel);
            handlers.push(self.asm().add_label());
            self.push_stack(1);
        }
        self.emit_ext(ExtOpcode::TryExcept);
        self.emit_count(excepts.len(), "except arm count");
        self.push_stack(1);

        self.asm().enter_protected();
        self.gen_stmts(body);
        self.asm().exit_protected();

        self.emit_ext(ExtOpcode::EndExcept);
        let mut end = self.asm().add_label();
        // codes and handler label per arm, plus the catch marker
        self.pop_stack(2 * excepts.len() + 1);

        for (i, (arm, handler)) in excepts.iter().zip(handlers).enumerate() {
            self.asm().define_label(handler);
            // the exception tuple
            self.push_stack(1);
            if let Some(id) = arm.id {
                self.asm().emit_put(id);
            }
            self.emit(Opcode::Pop);
            self.pop_stack(1);
            self.gen_stmts(&arm.body);
            if i + 1 < excepts.len() {
                self.emit(Opcode::Jump);
                end = self.asm().add_linked_label(end);
            }
        }
        self.asm().define_label(end);
    }

    fn gen_exit(&mut self, id: Option<VarId>, is_continue: bool) {
        let index = match id {
            None => {
                self.emit_ext(ExtOpcode::Exit);
                match self.state.loops.len() {
                    0 => fatal!("break/continue outside of any loop"),
                    n => n - 1,
                }
            }
            Some(id) => {
                self.emit_ext(ExtOpcode::ExitId);
                self.asm().add_var_ref(id);
                match self.state.loops.iter().rposition(|l| l.id == Some(id)) {
                    Some(i) => i,
                    None => fatal!("no enclosing loop named by variable {}", id.0),
                }
            }
        };
        if is_continue {
            let (top, top_stack) = {
                let frame = &self.state.loops[index];
                (frame.top, frame.top_stack)
            };
            self.asm().add_stack_ref(top_stack);
            self.asm().add_known_label(top);
        } else {
            let (bottom, bottom_stack) = {
                let frame = &self.state.loops[index];
                (frame.bottom, frame.bottom_stack)
            };
            self.asm().add_stack_ref(bottom_stack);
            let chained = self.asm().add_linked_label(bottom);
            self.state.loops[index].bottom = chained;
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn gen_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Var(id) => {
                self.asm().emit_push(*id);
                self.push_stack(1);
            }
            Expr::Literal(value) => self.gen_literal(value),
            Expr::Prop { obj, name } => {
                self.gen_expr(obj);
                self.gen_expr(name);
                self.emit(Opcode::GetProp);
                self.pop_stack(1);
            }
            Expr::Index { base, index } => {
                self.gen_expr(base);
                let old = self.save_stack_top();
                self.gen_expr(index);
                self.restore_stack_top(old);
                self.emit(Opcode::Ref);
                self.pop_stack(1);
            }
            Expr::Range { base, from, to } => {
                self.gen_expr(base);
                let old = self.save_stack_top();
                self.gen_expr(from);
                self.gen_expr(to);
                self.restore_stack_top(old);
                self.emit(Opcode::RangeRef);
                self.pop_stack(2);
            }
            Expr::Length => {
                let Some(slot) = self.state.saved_stack else {
                    fatal!("`$` used outside of an index or range");
                };
                self.emit_ext(ExtOpcode::Length);
                self.asm().add_stack_ref(slot);
                self.push_stack(1);
            }
            Expr::Unary(op, operand) => {
                self.gen_expr(operand);
                self.emit(match op {
                    UnaryOp::Neg => Opcode::UnaryMinus,
                    UnaryOp::Not => Opcode::Not,
                });
            }
            Expr::Binary(op, left, right) => {
                self.gen_expr(left);
                self.gen_expr(right);
                match binary_opcode(*op) {
                    Some(opcode) => self.emit(opcode),
                    None => self.emit_ext(ExtOpcode::Exp),
                }
                self.pop_stack(1);
            }
            Expr::And(left, right) | Expr::Or(left, right) => {
                self.gen_expr(left);
                self.emit(if matches!(expr, Expr::And(..)) {
                    Opcode::And
                } else {
                    Opcode::Or
                });
                let end = self.asm().add_label();
                self.pop_stack(1);
                self.gen_expr(right);
                self.asm().define_label(end);
            }
            Expr::Call { func, args } => {
                self.gen_arglist(args);
                self.emit(Opcode::BiFuncCall);
                self.asm().emit_byte(*func);
            }
            Expr::Verb { obj, verb, args } => {
                self.gen_expr(obj);
                self.gen_expr(verb);
                self.gen_arglist(args);
                self.emit(Opcode::CallVerb);
                self.pop_stack(2);
            }
            Expr::List(args) => self.gen_arglist(args),
            Expr::Map(pairs) => {
                self.emit_ext(ExtOpcode::MakeMap);
                self.push_stack(1);
                for (key, value) in pairs {
                    self.gen_expr(key);
                    self.gen_expr(value);
                    self.emit_ext(ExtOpcode::MapInsert);
                    self.pop_stack(2);
                }
            }
            Expr::Cond {
                condition,
                consequence,
                alternative,
            } => {
                self.gen_expr(condition);
                self.emit(Opcode::IfQues);
                let else_label = self.asm().add_label();
                self.pop_stack(1);
                self.gen_expr(consequence);
                self.emit(Opcode::Jump);
                let end = self.asm().add_label();
                self.asm().define_label(else_label);
                // only one arm's value is ever on the stack
                self.pop_stack(1);
                self.gen_expr(alternative);
                self.asm().define_label(end);
            }
            Expr::Catch {
                expr,
                codes,
                handler,
            } => self.gen_catch(expr, codes, handler.as_deref()),
            Expr::Assign { left, right } => match &**left {
                Expr::Scatter(items) => {
                    self.gen_expr(right);
                    self.gen_scatter(items);
                }
                _ => self.gen_assign(left, right),
            },
            Expr::Scatter(_) => fatal!("scatter list outside of an assignment"),
        }
    }

    fn gen_literal(&mut self, value: &Value) {
        if let Value::Int(i) = value {
            if let Some(opcode) = optim_num_opcode(*i) {
                self.asm().emit_num(opcode);
                self.push_stack(1);
                return;
            }
        }
        if let Value::Float(_) = value {
            self.options.version.require(FormatVersion::Float, "float literal");
        }
        let index = self.add_literal(value);
        self.emit(Opcode::Imm);
        self.asm().add_literal(index);
        self.push_stack(1);
    }

    fn gen_arglist(&mut self, args: &[Arg]) {
        if args.is_empty() {
            self.emit(Opcode::MakeEmptyList);
            self.push_stack(1);
            return;
        }
        for (i, arg) in args.iter().enumerate() {
            let first = i == 0;
            match arg {
                Arg::Normal(expr) => {
                    self.gen_expr(expr);
                    self.emit(if first {
                        Opcode::MakeSingletonList
                    } else {
                        Opcode::ListAddTail
                    });
                }
                Arg::Splice(expr) => {
                    self.gen_expr(expr);
                    self.emit(if first {
                        Opcode::CheckListForSplice
                    } else {
                        Opcode::ListAppend
                    });
                }
            }
            if !first {
                self.pop_stack(1);
            }
        }
    }

    /// Pushes the error-code list of an except arm or catch expression;
    /// `ANY` is the integer 0.
    fn gen_codes(&mut self, codes: &CatchCodes) {
        match codes {
            CatchCodes::Any => {
                self.emit_small_int(0);
                self.push_stack(1);
            }
            CatchCodes::Codes(args) => self.gen_arglist(args),
        }
    }

    fn gen_catch(&mut self, expr: &Expr, codes: &CatchCodes, handler: Option<&Expr>) {
        self.gen_codes(codes);
        self.emit_ext(ExtOpcode::PushLabel);
        let handler_label = self.asm().add_label();
        self.push_stack(1);
        self.emit_ext(ExtOpcode::Catch);
        self.push_stack(1);

        self.asm().enter_protected();
        self.gen_expr(expr);
        self.asm().exit_protected();

        self.emit_ext(ExtOpcode::EndCatch);
        let end = self.asm().add_label();
        // codes, label, catch marker
        self.pop_stack(3);

        // The exception tuple now sits where the protected value would be.
        self.asm().define_label(handler_label);
        match handler {
            Some(handler) => {
                self.emit(Opcode::Pop);
                self.pop_stack(1);
                self.gen_expr(handler);
            }
            None => {
                self.emit_small_int(1);
                self.push_stack(1);
                self.emit(Opcode::Ref);
                self.pop_stack(1);
            }
        }
        self.asm().define_label(end);
    }

    /// Pushes the pieces of an assignment target the store needs. With
    /// `indexed_above`, also pushes the current value of the target.
    fn push_lvalue(&mut self, expr: &Expr, indexed_above: bool) {
        match expr {
            Expr::Range { base, from, to } => {
                if indexed_above {
                    fatal!("range is not the last selector of an assignment target");
                }
                self.push_lvalue(base, true);
                let old = self.save_stack_top();
                self.gen_expr(from);
                self.gen_expr(to);
                self.restore_stack_top(old);
            }
            Expr::Index { base, index } => {
                self.push_lvalue(base, true);
                let old = self.save_stack_top();
                self.gen_expr(index);
                self.restore_stack_top(old);
                if indexed_above {
                    self.emit(Opcode::PushRef);
                    self.push_stack(1);
                }
            }
            Expr::Var(id) => {
                if indexed_above {
                    self.asm().emit_push(*id);
                    self.push_stack(1);
                }
            }
            Expr::Prop { obj, name } => {
                self.gen_expr(obj);
                self.gen_expr(name);
                if indexed_above {
                    self.emit(Opcode::PushGetProp);
                    self.push_stack(1);
                }
            }
            other => fatal!("bad assignment target {:?}", other),
        }
    }

    fn gen_assign(&mut self, left: &Expr, right: &Expr) {
        self.push_lvalue(left, false);
        self.gen_expr(right);
        let is_indexed = matches!(left, Expr::Index { .. } | Expr::Range { .. });
        if is_indexed {
            self.emit(Opcode::PutTemp);
        }
        let mut target = left;
        loop {
            match target {
                Expr::Range { base, .. } => {
                    self.emit_ext(ExtOpcode::RangeSet);
                    self.pop_stack(3);
                    target = base;
                }
                Expr::Index { base, .. } => {
                    self.emit(Opcode::IndexSet);
                    self.pop_stack(2);
                    target = base;
                }
                Expr::Var(id) => {
                    self.asm().emit_put(*id);
                    break;
                }
                Expr::Prop { .. } => {
                    self.emit(Opcode::PutProp);
                    self.pop_stack(2);
                    break;
                }
                other => fatal!("bad assignment target {:?}", other),
            }
        }
        if is_indexed {
            self.emit(Opcode::Pop);
            self.emit(Opcode::PushTemp);
        }
    }

    /// Emits `SCATTER` for a value already on the stack. The value stays on
    /// the stack as the result of the assignment.
    fn gen_scatter(&mut self, items: &[ScatterItem]) {
        let nreq = items
            .iter()
            .filter(|item| item.kind == ScatterKind::Required)
            .count();
        let rest = items
            .iter()
            .position(|item| item.kind == ScatterKind::Rest)
            .map_or(items.len() + 1, |i| i + 1);

        self.emit_ext(ExtOpcode::Scatter);
        self.emit_count(items.len(), "scatter target count");
        self.emit_count(nreq, "required scatter target count");
        self.emit_count(rest, "scatter rest position");

        let mut defaults: SmallVec<[Option<PendingLabel>; 8]> = SmallVec::new();
        for item in items {
            self.asm().add_var_ref(item.id);
            let label = match (item.kind, &item.default) {
                (ScatterKind::Optional, Some(_)) => Some(self.asm().add_label()),
                (ScatterKind::Optional, None) => {
                    self.asm().add_pseudo_label(1);
                    None
                }
                (_, None) => {
                    self.asm().add_pseudo_label(0);
                    None
                }
                (kind, Some(_)) => fatal!("{:?} scatter target with a default", kind),
            };
            defaults.push(label);
        }
        let done = self.asm().add_label();

        for (item, label) in items.iter().zip(defaults) {
            let (Some(label), Some(default)) = (label, &item.default) else {
                continue;
            };
            self.asm().define_label(label);
            self.gen_expr(default);
            self.asm().emit_put(item.id);
            self.emit(Opcode::Pop);
            self.pop_stack(1);
        }
        self.asm().define_label(done);
    }
}

fn binary_opcode(op: BinaryOp) -> Option<Opcode> {
    Some(match op {
        BinaryOp::Add => Opcode::Add,
        BinaryOp::Sub => Opcode::Minus,
        BinaryOp::Mul => Opcode::Mult,
        BinaryOp::Div => Opcode::Div,
        BinaryOp::Mod => Opcode::Mod,
        BinaryOp::Exp => return None,
        BinaryOp::Eq => Opcode::Eq,
        BinaryOp::Ne => Opcode::Ne,
        BinaryOp::Lt => Opcode::Lt,
        BinaryOp::Le => Opcode::Le,
        BinaryOp::Gt => Opcode::Gt,
        BinaryOp::Ge => Opcode::Ge,
        BinaryOp::In => Opcode::In,
    })
}
