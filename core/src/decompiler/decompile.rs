//! Decompiler implementation.

use core::mem;

use smallvec::SmallVec;

use super::{Decompiled, HotNode, Position, Step};
use crate::ast::{Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, ScatterItem, ScatterKind, Stmt, UnaryOp, VarId};
use crate::program::{Bytecodes, FormatVersion, Program, VectorId};
use crate::values::Value;
use crate::vm::{ExtOpcode, Op, Opcode, Reader};
use crate::{Box, Vec, vec};

/// Decompiles `bytecodes` as a verb body. Fork instructions are followed into
/// `forks`. With `target_pc`, also reports the node executing at that offset
/// of `bytecodes`.
pub fn decompile(
    bytecodes: &Bytecodes,
    literals: &[Value],
    forks: &[Bytecodes],
    version: FormatVersion,
    reduce_ref: bool,
    target_pc: Option<usize>,
) -> Decompiled {
    let target = target_pc.map(|pc| (VectorId::Main, pc));
    Decompiler::new(bytecodes, literals, forks, version, reduce_ref, target).run()
}

/// Decompiles a program's main vector. `target` may point into any vector,
/// so hot nodes inside fork bodies are reported relative to the whole verb.
pub fn decompile_program(program: &Program, target: Option<(VectorId, usize)>) -> Decompiled {
    Decompiler::new(
        program.main_vector(),
        program.literals(),
        program.fork_vectors(),
        program.version(),
        program.reduce_ref(),
        target,
    )
    .run()
}

/// A value-stack entry: an expression, or a pending exception handler pushed
/// by `PUSH_LABEL` ahead of a `TRY_EXCEPT`.
enum Node {
    Expr(Expr),
    Handler { codes: CatchCodes, label: usize },
}

struct Item {
    node: Node,
    /// The target pc lies in the code that produced this entry.
    hot: bool,
}

/// How a decoded block ended.
enum Exit {
    /// Reached the requested end offset.
    Fell,
    /// Ended with a `JUMP` to `target` as its last instruction.
    Jump { target: usize, hot: bool },
    /// Else-region only: an `EIF` closing the condition of an `elseif` arm.
    ElseIf { cond: Item, next: usize, hot: bool },
    /// Finally-handler only: the closing `CONTINUE`.
    Continue { hot: bool },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    /// The code after an `if` arm, which may begin with an `elseif`.
    ElseRegion,
    /// A finally handler, which runs up to its `CONTINUE`.
    Finally,
}

struct Block {
    stmts: Vec<Stmt>,
    hot: Option<HotNode>,
    exit: Exit,
}

struct LoopFrame {
    id: Option<VarId>,
    top: usize,
    end: usize,
}

/// Collects the hot node of one statement, relative to that statement.
#[derive(Default)]
struct Hot(Option<HotNode>);

impl Hot {
    fn mark(&mut self, hot: bool, path: Vec<Step>, position: Position) {
        if hot {
            self.0 = Some(HotNode { path, position });
        }
    }

    fn top(&mut self, hot: bool) {
        self.mark(hot, Vec::new(), Position::Top);
    }

    fn nest(&mut self, step: Step, inner: Option<HotNode>) {
        if let Some(mut node) = inner {
            node.path.insert(0, step);
            self.0 = Some(node);
        }
    }
}

struct Decompiler<'a> {
    literals: &'a [Value],
    forks: &'a [Bytecodes],
    version: FormatVersion,
    reduce_ref: bool,
    target: Option<(VectorId, usize)>,
    vector: VectorId,
    code: &'a Bytecodes,
    reader: Reader<'a>,
    stack: Vec<Item>,
    loops: Vec<LoopFrame>,
}

impl<'a> Decompiler<'a> {
    fn new(
        root: &'a Bytecodes,
        literals: &'a [Value],
        forks: &'a [Bytecodes],
        version: FormatVersion,
        reduce_ref: bool,
        target: Option<(VectorId, usize)>,
    ) -> Self {
        let capacity = root.max_stack() as usize
            + forks.iter().map(|f| f.max_stack() as usize).sum::<usize>();
        Self {
            literals,
            forks,
            version,
            reduce_ref,
            target,
            vector: VectorId::Main,
            code: root,
            reader: Reader::new(root),
            stack: Vec::with_capacity(capacity),
            loops: Vec::new(),
        }
    }

    fn run(mut self) -> Decompiled {
        let (body, hot, done_hot) = self.vector_body();
        let hot = match hot {
            Some(hot) => Some(hot),
            None if done_hot => Some(HotNode {
                path: Vec::new(),
                position: Position::Bottom,
            }),
            None => None,
        };
        tracing::debug!(statements = body.len(), hot = hot.is_some(), "decompiled program");
        Decompiled { body, hot }
    }

    fn is_hot(&self, pc: usize) -> bool {
        self.target == Some((self.vector, pc))
    }

    /// Decodes the current vector up to its final `DONE`.
    fn vector_body(&mut self) -> (Vec<Stmt>, Option<HotNode>, bool) {
        let len = self.code.len();
        if len == 0 {
            fatal!("empty bytecode vector in {:?}", self.vector);
        }
        let block = self.block(len - 1, Mode::Normal);
        if !matches!(block.exit, Exit::Fell) {
            fatal!("vector {:?} does not end in straight-line code", self.vector);
        }
        let done_pc = self.reader.pc();
        if self.reader.read_op() != Op::Basic(Opcode::Done) {
            fatal!("vector {:?} does not end with DONE", self.vector);
        }
        (block.stmts, block.hot, self.is_hot(done_pc))
    }

    // ========================================================================
    // Value stack
    // ========================================================================

    fn push(&mut self, expr: Expr, hot: bool) {
        self.stack.push(Item {
            node: Node::Expr(expr),
            hot,
        });
    }

    fn pop_item(&mut self) -> Item {
        match self.stack.pop() {
            Some(item) => item,
            None => fatal!("value stack underflow at pc {}", self.reader.pc()),
        }
    }

    fn pop(&mut self) -> (Expr, bool) {
        match self.pop_item() {
            Item {
                node: Node::Expr(expr),
                hot,
            } => (expr, hot),
            Item {
                node: Node::Handler { .. },
                ..
            } => fatal!("handler marker used as a value at pc {}", self.reader.pc()),
        }
    }

    fn pop_args(&mut self) -> (Vec<Arg>, bool) {
        match self.pop() {
            (Expr::List(args), hot) => (args, hot),
            (other, _) => fatal!("expected an argument list, found {:?}", other),
        }
    }

    fn peek(&self, depth: usize) -> (&Expr, bool) {
        match self.stack.len().checked_sub(depth + 1).map(|i| &self.stack[i]) {
            Some(Item {
                node: Node::Expr(expr),
                hot,
            }) => (expr, *hot),
            _ => fatal!("no value at stack depth {}", depth),
        }
    }

    /// Pops `n` values already folded into an enclosing expression.
    fn discard(&mut self, n: usize) -> bool {
        (0..n).fold(false, |hot, _| self.pop().1 | hot)
    }

    /// Decodes `[pc, end)` as exactly one expression.
    fn expr_until(&mut self, end: usize) -> (Expr, bool) {
        let base = self.stack.len();
        let block = self.block(end, Mode::Normal);
        if !block.stmts.is_empty() || !matches!(block.exit, Exit::Fell) || self.stack.len() != base + 1 {
            fatal!("expected a single expression ending at {}", end);
        }
        self.pop()
    }

    fn expect(&mut self, expected: Op) -> bool {
        let pc = self.reader.pc();
        let op = self.reader.read_op();
        if op != expected {
            fatal!("expected {} at pc {}, found {}", expected, pc, op);
        }
        self.is_hot(pc)
    }

    fn finish(&self, frame: &mut Block, stmt: Stmt, hot: Hot) {
        if let Some(mut node) = hot.0 {
            node.path.insert(0, Step::Stmt(frame.stmts.len()));
            frame.hot = Some(node);
        }
        frame.stmts.push(stmt);
    }

    // ========================================================================
    // Main loop
    // ========================================================================

    /// Decodes statements from the cursor up to `end`. Expressions left
    /// unconsumed stay on the value stack for the caller.
    fn block(&mut self, end: usize, mode: Mode) -> Block {
        let mut frame = Block {
            stmts: Vec::new(),
            hot: None,
            exit: Exit::Fell,
        };
        let base = self.stack.len();
        let mut stmt_start = self.reader.pc();

        while self.reader.pc() < end {
            if self.stack.len() == base {
                stmt_start = self.reader.pc();
            }
            let pc = self.reader.pc();
            let op = self.reader.read_op();
            let hot = self.is_hot(pc);

            match op {
                // ------------------------------------------------------------
                // Values
                // ------------------------------------------------------------
                Op::Push(id) => self.push(Expr::Var(id), hot),
                Op::PushClear(id) => {
                    self.check_clear(pc);
                    self.push(Expr::Var(id), hot);
                }
                Op::Basic(Opcode::GPush) => {
                    let id = self.reader.read_var();
                    self.push(Expr::Var(id), hot);
                }
                Op::Basic(Opcode::GPushClear) => {
                    self.check_clear(pc);
                    let id = self.reader.read_var();
                    self.push(Expr::Var(id), hot);
                }
                Op::Num(i) => self.push(Expr::Literal(Value::Int(i)), hot),
                Op::Basic(Opcode::Imm) => {
                    let index = self.reader.read_literal();
                    let Some(value) = self.literals.get(index) else {
                        fatal!("literal {} out of range ({})", index, self.literals.len());
                    };
                    if let Value::Float(_) = value {
                        self.version.require(FormatVersion::Float, "float literal");
                    }
                    self.push(Expr::Literal(value.clone()), hot);
                }
                Op::Basic(Opcode::MakeEmptyList) => self.push(Expr::List(Vec::new()), hot),
                Op::Basic(Opcode::MakeSingletonList) => {
                    let (e, h) = self.pop();
                    self.push(Expr::List(vec![Arg::Normal(e)]), hot || h);
                }
                Op::Basic(Opcode::CheckListForSplice) => {
                    let (e, h) = self.pop();
                    self.push(Expr::List(vec![Arg::Splice(e)]), hot || h);
                }
                Op::Basic(op @ (Opcode::ListAddTail | Opcode::ListAppend)) => {
                    let (e, h1) = self.pop();
                    let (mut args, h2) = self.pop_args();
                    args.push(match op {
                        Opcode::ListAddTail => Arg::Normal(e),
                        _ => Arg::Splice(e),
                    });
                    self.push(Expr::List(args), hot || h1 || h2);
                }
                Op::Basic(op @ (Opcode::UnaryMinus | Opcode::Not)) => {
                    let (e, h) = self.pop();
                    let op = match op {
                        Opcode::UnaryMinus => UnaryOp::Neg,
                        _ => UnaryOp::Not,
                    };
                    self.push(Expr::unary(op, e), hot || h);
                }
                Op::Basic(Opcode::Ref) => {
                    let (index, h1) = self.pop();
                    let (base, h2) = self.pop();
                    self.push(Expr::index(base, index), hot || h1 || h2);
                }
                Op::Basic(Opcode::RangeRef) => {
                    let (to, h1) = self.pop();
                    let (from, h2) = self.pop();
                    let (base, h3) = self.pop();
                    self.push(Expr::range(base, from, to), hot || h1 || h2 || h3);
                }
                Op::Basic(Opcode::GetProp) => {
                    let (name, h1) = self.pop();
                    let (obj, h2) = self.pop();
                    self.push(Expr::prop(obj, name), hot || h1 || h2);
                }
                Op::Basic(Opcode::PushGetProp) => {
                    let (name, h1) = self.peek(0);
                    let (obj, h2) = self.peek(1);
                    let expr = Expr::prop(obj.clone(), name.clone());
                    self.push(expr, hot || h1 || h2);
                }
                Op::Basic(Opcode::PushRef) => {
                    let (index, h1) = self.peek(0);
                    let (base, h2) = self.peek(1);
                    let expr = Expr::index(base.clone(), index.clone());
                    self.push(expr, hot || h1 || h2);
                }
                Op::Basic(Opcode::CallVerb) => {
                    let (args, h1) = self.pop_args();
                    let (verb, h2) = self.pop();
                    let (obj, h3) = self.pop();
                    self.push(Expr::verb(obj, verb, args), hot || h1 || h2 || h3);
                }
                Op::Basic(Opcode::BiFuncCall) => {
                    let func = self.reader.read_byte();
                    let (args, h) = self.pop_args();
                    self.push(Expr::Call { func, args }, hot || h);
                }
                Op::Basic(op @ (Opcode::And | Opcode::Or)) => {
                    let end = self.reader.read_label();
                    let (left, h1) = self.pop();
                    let (right, h2) = self.expr_until(end);
                    let expr = match op {
                        Opcode::And => Expr::And(Box::new(left), Box::new(right)),
                        _ => Expr::Or(Box::new(left), Box::new(right)),
                    };
                    self.push(expr, hot || h1 || h2);
                }
                Op::Basic(Opcode::IfQues) => {
                    let else_label = self.reader.read_label();
                    let (condition, h1) = self.pop();
                    let base = self.stack.len();
                    let then = self.block(else_label, Mode::Normal);
                    let Exit::Jump { target: end, hot: h2 } = then.exit else {
                        fatal!("`? |` consequence does not jump past its alternative");
                    };
                    if !then.stmts.is_empty() || self.stack.len() != base + 1 {
                        fatal!("`? |` consequence is not a single expression");
                    }
                    let (consequence, h3) = self.pop();
                    let (alternative, h4) = self.expr_until(end);
                    self.push(
                        Expr::cond(condition, consequence, alternative),
                        hot || h1 || h2 || h3 || h4,
                    );
                }
                Op::Basic(
                    op @ (Opcode::Mult
                    | Opcode::Div
                    | Opcode::Mod
                    | Opcode::Add
                    | Opcode::Minus
                    | Opcode::Eq
                    | Opcode::Ne
                    | Opcode::Lt
                    | Opcode::Le
                    | Opcode::Gt
                    | Opcode::Ge
                    | Opcode::In),
                ) => self.binary(binary_op(op), hot),
                Op::Ext(ExtOpcode::Exp) => {
                    self.version.require(ExtOpcode::Exp.since(), "EXP");
                    self.binary(BinaryOp::Exp, hot);
                }
                Op::Ext(ExtOpcode::Length) => {
                    self.reader.read_stack();
                    self.push(Expr::Length, hot);
                }
                Op::Ext(ExtOpcode::MakeMap) => {
                    self.version.require(FormatVersion::Maps, "MAKE_MAP");
                    self.push(Expr::Map(Vec::new()), hot);
                }
                Op::Ext(ExtOpcode::MapInsert) => {
                    let (value, h1) = self.pop();
                    let (key, h2) = self.pop();
                    match self.pop() {
                        (Expr::Map(mut pairs), h3) => {
                            pairs.push((key, value));
                            self.push(Expr::Map(pairs), hot || h1 || h2 || h3);
                        }
                        (other, _) => fatal!("MAP_INSERT into {:?}", other),
                    }
                }

                // ------------------------------------------------------------
                // Assignment
                // ------------------------------------------------------------
                Op::Put(id) => self.simple_assign(Expr::Var(id), hot),
                Op::Basic(Opcode::GPut) => {
                    let id = self.reader.read_var();
                    self.simple_assign(Expr::Var(id), hot);
                }
                Op::Basic(Opcode::PutProp) => {
                    let (right, h1) = self.pop();
                    let (name, h2) = self.pop();
                    let (obj, h3) = self.pop();
                    self.push(Expr::assign(Expr::prop(obj, name), right), hot || h1 || h2 || h3);
                }
                Op::Basic(Opcode::PutTemp) => self.indexed_assign(hot),
                Op::Ext(ExtOpcode::Scatter) => {
                    self.version.require(FormatVersion::Exceptions, "SCATTER");
                    self.scatter(hot);
                }

                // ------------------------------------------------------------
                // Exceptions
                // ------------------------------------------------------------
                Op::Ext(ExtOpcode::PushLabel) => {
                    self.version.require(FormatVersion::Exceptions, "PUSH_LABEL");
                    let label = self.reader.read_label();
                    let (codes, h) = self.pop();
                    let codes = catch_codes(codes);
                    if self.reader.peek_op() == Op::Ext(ExtOpcode::Catch) {
                        self.catch_expr(codes, label, hot || h);
                    } else {
                        self.stack.push(Item {
                            node: Node::Handler { codes, label },
                            hot: hot || h,
                        });
                    }
                }
                Op::Ext(ExtOpcode::TryExcept) => {
                    self.version.require(FormatVersion::Exceptions, "TRY_EXCEPT");
                    let stmt = self.try_except(hot);
                    self.finish(&mut frame, stmt.0, stmt.1);
                }
                Op::Ext(ExtOpcode::TryFinally) => {
                    self.version.require(FormatVersion::Exceptions, "TRY_FINALLY");
                    let stmt = self.try_finally(hot);
                    self.finish(&mut frame, stmt.0, stmt.1);
                }
                Op::Ext(ExtOpcode::Continue) if mode == Mode::Finally && self.stack.len() == base => {
                    frame.exit = Exit::Continue { hot };
                    return frame;
                }

                // ------------------------------------------------------------
                // Statements
                // ------------------------------------------------------------
                Op::Basic(Opcode::Pop) => {
                    let (expr, h) = self.pop();
                    let mut stmt_hot = Hot::default();
                    stmt_hot.top(hot || h);
                    self.finish(&mut frame, Stmt::Expr(expr), stmt_hot);
                }
                Op::Basic(Opcode::Return) => {
                    let (expr, h) = self.pop();
                    let mut stmt_hot = Hot::default();
                    stmt_hot.top(hot || h);
                    self.finish(&mut frame, Stmt::Return(Some(expr)), stmt_hot);
                }
                Op::Basic(Opcode::Return0) => {
                    let mut stmt_hot = Hot::default();
                    stmt_hot.top(hot);
                    self.finish(&mut frame, Stmt::Return(None), stmt_hot);
                }
                Op::Basic(Opcode::If) => {
                    let (stmt, stmt_hot) = self.cond(hot);
                    self.finish(&mut frame, stmt, stmt_hot);
                }
                Op::Basic(Opcode::Eif) => {
                    if mode != Mode::ElseRegion || !frame.stmts.is_empty() || self.stack.len() != base + 1 {
                        fatal!("misplaced ELSEIF at pc {}", pc);
                    }
                    let next = self.reader.read_label();
                    let cond = self.pop_item();
                    frame.exit = Exit::ElseIf { cond, next, hot };
                    return frame;
                }
                Op::Basic(Opcode::While) => {
                    let (stmt, stmt_hot) = self.while_loop(None, stmt_start, hot);
                    self.finish(&mut frame, stmt, stmt_hot);
                }
                Op::Ext(ExtOpcode::WhileId) => {
                    self.version.require(FormatVersion::BreakCont, "WHILE_ID");
                    let id = self.reader.read_var();
                    let (stmt, stmt_hot) = self.while_loop(Some(id), stmt_start, hot);
                    self.finish(&mut frame, stmt, stmt_hot);
                }
                Op::Basic(op @ (Opcode::ForList | Opcode::ForRange)) => {
                    let (stmt, stmt_hot) = self.for_loop(op, pc, hot);
                    self.finish(&mut frame, stmt, stmt_hot);
                }
                Op::Basic(op @ (Opcode::Fork | Opcode::ForkWithId)) => {
                    let index = self.reader.read_fork();
                    let id = (op == Opcode::ForkWithId).then(|| self.reader.read_var());
                    let (delay, h) = self.pop();
                    let (body, body_hot, done_hot) = self.fork_body(index);
                    let mut stmt_hot = Hot::default();
                    stmt_hot.top(hot || h);
                    stmt_hot.mark(done_hot, Vec::new(), Position::Bottom);
                    stmt_hot.nest(Step::Body, body_hot);
                    self.finish(&mut frame, Stmt::Fork { id, delay, body }, stmt_hot);
                }
                Op::Ext(op @ (ExtOpcode::Exit | ExtOpcode::ExitId)) => {
                    self.version.require(FormatVersion::BreakCont, op.mnemonic());
                    let (stmt, stmt_hot) = self.exit(op, pc, hot);
                    self.finish(&mut frame, stmt, stmt_hot);
                }
                Op::Basic(Opcode::Jump) => {
                    let target = self.reader.read_label();
                    if self.reader.pc() != end {
                        fatal!("JUMP at pc {} does not end its block (ends at {})", pc, end);
                    }
                    frame.exit = Exit::Jump { target, hot };
                    return frame;
                }
                other => fatal!("unexpected {} at pc {} of {:?}", other, pc, self.vector),
            }
        }

        if self.reader.pc() != end {
            fatal!("decoding overran block end {} (at {})", end, self.reader.pc());
        }
        frame
    }

    fn check_clear(&self, pc: usize) {
        if !self.reduce_ref {
            fatal!("push-and-clear at pc {} in a program without reduce-ref", pc);
        }
    }

    fn binary(&mut self, op: BinaryOp, hot: bool) {
        let (right, h1) = self.pop();
        let (left, h2) = self.pop();
        self.push(Expr::binary(op, left, right), hot || h1 || h2);
    }

    fn simple_assign(&mut self, left: Expr, hot: bool) {
        let (right, h) = self.pop();
        self.push(Expr::assign(left, right), hot || h);
    }

    /// `PUT_TEMP` starts the store chain of an indexed or ranged assignment.
    /// The first store names the full target; the rest walk back to its root.
    fn indexed_assign(&mut self, mut hot: bool) {
        let (right, h) = self.pop();
        hot |= h;

        let pc = self.reader.pc();
        hot |= self.is_hot(pc);
        let left = match self.reader.read_op() {
            Op::Basic(Opcode::IndexSet) => {
                let (index, h1) = self.pop();
                let (base, h2) = self.pop();
                hot |= h1 || h2;
                Expr::index(base, index)
            }
            Op::Ext(ExtOpcode::RangeSet) => {
                let (to, h1) = self.pop();
                let (from, h2) = self.pop();
                let (base, h3) = self.pop();
                hot |= h1 || h2 || h3;
                Expr::range(base, from, to)
            }
            other => fatal!("PUT_TEMP followed by {} at pc {}", other, pc),
        };

        loop {
            let pc = self.reader.pc();
            hot |= self.is_hot(pc);
            match self.reader.read_op() {
                Op::Basic(Opcode::IndexSet) => hot |= self.discard(2),
                Op::Ext(ExtOpcode::RangeSet) => hot |= self.discard(3),
                Op::Put(_) => break,
                Op::Basic(Opcode::GPut) => {
                    self.reader.read_var();
                    break;
                }
                Op::Basic(Opcode::PutProp) => {
                    hot |= self.discard(2);
                    break;
                }
                other => fatal!("unexpected {} in store chain at pc {}", other, pc),
            }
        }
        hot |= self.expect(Op::Basic(Opcode::Pop));
        hot |= self.expect(Op::Basic(Opcode::PushTemp));
        self.push(Expr::assign(left, right), hot);
    }

    fn scatter(&mut self, mut hot: bool) {
        let nargs = self.reader.read_byte() as usize;
        let nreq = self.reader.read_byte() as usize;
        let rest = self.reader.read_byte() as usize;

        let mut items = Vec::with_capacity(nargs);
        let mut labels: SmallVec<[usize; 8]> = SmallVec::new();
        for i in 1..=nargs {
            let id = self.reader.read_var();
            let label = self.reader.read_label();
            let kind = if i == rest {
                ScatterKind::Rest
            } else if label == 0 {
                ScatterKind::Required
            } else {
                ScatterKind::Optional
            };
            items.push(ScatterItem { kind, id, default: None });
            labels.push(label);
        }
        let done = self.reader.read_label();

        let required = items.iter().filter(|i| i.kind == ScatterKind::Required).count();
        if required != nreq {
            fatal!("scatter declares {} required targets, found {}", nreq, required);
        }

        let with_default: SmallVec<[usize; 8]> = (0..nargs)
            .filter(|&i| items[i].kind == ScatterKind::Optional && labels[i] > 1)
            .collect();
        for (n, &i) in with_default.iter().enumerate() {
            if self.reader.pc() != labels[i] {
                fatal!("scatter default for target {} not at {}", i + 1, labels[i]);
            }
            let next = with_default.get(n + 1).map_or(done, |&j| labels[j]);
            let mut block = self.block(next, Mode::Normal);
            hot |= block.hot.is_some();
            match (block.stmts.pop(), block.stmts.is_empty(), &block.exit) {
                (Some(Stmt::Expr(Expr::Assign { left, right })), true, Exit::Fell)
                    if *left == Expr::Var(items[i].id) =>
                {
                    items[i].default = Some(*right);
                }
                _ => fatal!("malformed scatter default block at {}", labels[i]),
            }
        }
        if self.reader.pc() != done {
            fatal!("scatter defaults end at {}, expected {}", self.reader.pc(), done);
        }

        let (right, h) = self.pop();
        self.push(Expr::assign(Expr::Scatter(items), right), hot || h);
    }

    fn catch_expr(&mut self, codes: CatchCodes, handler_label: usize, mut hot: bool) {
        hot |= self.expect(Op::Ext(ExtOpcode::Catch));
        let end_catch = handler_label - 2 - self.reader.widths().label as usize;
        let (expr, h) = self.expr_until(end_catch);
        hot |= h;
        hot |= self.expect(Op::Ext(ExtOpcode::EndCatch));
        let end = self.reader.read_label();
        if self.reader.pc() != handler_label {
            fatal!("catch handler at {}, expected {}", self.reader.pc(), handler_label);
        }

        let pc = self.reader.pc();
        hot |= self.is_hot(pc);
        let handler = match self.reader.read_op() {
            Op::Basic(Opcode::Pop) => {
                let (handler, h) = self.expr_until(end);
                hot |= h;
                Some(handler)
            }
            Op::Num(1) => {
                hot |= self.expect(Op::Basic(Opcode::Ref));
                if self.reader.pc() != end {
                    fatal!("default catch handler does not end at {}", end);
                }
                None
            }
            other => fatal!("unexpected {} at catch handler {}", other, pc),
        };
        self.push(Expr::catch(expr, codes, handler), hot);
    }

    // ========================================================================
    // Compound statements
    // ========================================================================

    fn cond(&mut self, hot: bool) -> (Stmt, Hot) {
        let else_label = self.reader.read_label();
        let (condition, h) = self.pop();
        let mut stmt_hot = Hot::default();
        stmt_hot.top(hot || h);

        let first = self.block(else_label, Mode::Normal);
        stmt_hot.nest(Step::Arm(0), first.hot);
        let mut arms = vec![CondArm { condition, body: first.stmts }];
        let mut otherwise = None;

        let Exit::Jump { target: end, hot: jump_hot } = first.exit else {
            return (Stmt::Cond { arms, otherwise }, stmt_hot);
        };
        stmt_hot.mark(jump_hot, Vec::new(), Position::Bottom);

        loop {
            let region = self.block(end, Mode::ElseRegion);
            match region.exit {
                Exit::ElseIf { cond, next, hot } => {
                    let k = arms.len();
                    let Node::Expr(condition) = cond.node else {
                        fatal!("handler marker as elseif condition");
                    };
                    stmt_hot.mark(cond.hot || hot, vec![Step::Arm(k)], Position::Top);
                    let arm = self.block(next, Mode::Normal);
                    stmt_hot.nest(Step::Arm(k), arm.hot);
                    arms.push(CondArm { condition, body: arm.stmts });
                    match arm.exit {
                        Exit::Fell if next == end => break,
                        Exit::Jump { target, hot } if target == end => {
                            stmt_hot.mark(hot, Vec::new(), Position::Bottom);
                        }
                        _ => fatal!("elseif arm {} does not rejoin at {}", k, end),
                    }
                }
                Exit::Fell => {
                    stmt_hot.nest(Step::Otherwise, region.hot);
                    otherwise = Some(region.stmts);
                    break;
                }
                _ => fatal!("malformed else region ending at {}", end),
            }
        }
        (Stmt::Cond { arms, otherwise }, stmt_hot)
    }

    /// Decodes a loop body, which must end by jumping back to `top`.
    fn loop_body(&mut self, id: Option<VarId>, top: usize, end: usize, stmt_hot: &mut Hot) -> Vec<Stmt> {
        self.loops.push(LoopFrame { id, top, end });
        let body = self.block(end, Mode::Normal);
        self.loops.pop();
        match body.exit {
            Exit::Jump { target, hot } if target == top => {
                stmt_hot.mark(hot, Vec::new(), Position::Bottom);
            }
            _ => fatal!("loop body ending at {} does not jump back to {}", end, top),
        }
        stmt_hot.nest(Step::Body, body.hot);
        body.stmts
    }

    fn while_loop(&mut self, id: Option<VarId>, top: usize, hot: bool) -> (Stmt, Hot) {
        let end = self.reader.read_label();
        let (condition, h) = self.pop();
        let mut stmt_hot = Hot::default();
        stmt_hot.top(hot || h);
        let body = self.loop_body(id, top, end, &mut stmt_hot);
        (Stmt::While { id, condition, body }, stmt_hot)
    }

    fn for_loop(&mut self, op: Opcode, top: usize, hot: bool) -> (Stmt, Hot) {
        let id = self.reader.read_var();
        let end = self.reader.read_label();
        let (second, h1) = self.pop();
        let (first, h2) = self.pop();
        let mut stmt_hot = Hot::default();
        stmt_hot.top(hot || h1 || h2);
        let body = self.loop_body(Some(id), top, end, &mut stmt_hot);
        let stmt = match op {
            Opcode::ForList => {
                if second != Expr::Literal(Value::Int(1)) {
                    fatal!("FOR_LIST without its initial index at pc {}", top);
                }
                Stmt::ForList { id, expr: first, body }
            }
            _ => Stmt::ForRange { id, from: first, to: second, body },
        };
        (stmt, stmt_hot)
    }

    fn exit(&mut self, op: ExtOpcode, pc: usize, hot: bool) -> (Stmt, Hot) {
        let id = (op == ExtOpcode::ExitId).then(|| self.reader.read_var());
        self.reader.read_stack();
        let label = self.reader.read_label();
        let frame = match id {
            None => self.loops.last(),
            Some(id) => self.loops.iter().rev().find(|l| l.id == Some(id)),
        };
        let stmt = match frame {
            Some(frame) if label == frame.top => Stmt::Continue(id),
            Some(frame) if label == frame.end => Stmt::Break(id),
            _ => fatal!("loop exit at pc {} targets {}, not an enclosing loop", pc, label),
        };
        let mut stmt_hot = Hot::default();
        stmt_hot.top(hot);
        (stmt, stmt_hot)
    }

    fn fork_body(&mut self, index: usize) -> (Vec<Stmt>, Option<HotNode>, bool) {
        let forks = self.forks;
        let Some(code) = forks.get(index) else {
            fatal!("fork vector {} out of range ({})", index, forks.len());
        };
        let outer_code = mem::replace(&mut self.code, code);
        let outer_reader = mem::replace(&mut self.reader, Reader::new(code));
        let outer_vector = mem::replace(&mut self.vector, VectorId::Fork(index));
        let outer_loops = mem::take(&mut self.loops);

        let result = self.vector_body();

        self.code = outer_code;
        self.reader = outer_reader;
        self.vector = outer_vector;
        self.loops = outer_loops;
        result
    }

    fn try_except(&mut self, hot: bool) -> (Stmt, Hot) {
        let count = self.reader.read_byte() as usize;
        if count == 0 || self.stack.len() < count {
            fatal!("TRY_EXCEPT with {} arms", count);
        }
        let mut stmt_hot = Hot::default();
        let mut top_hot = hot;
        let mut handlers = Vec::with_capacity(count);
        for item in self.stack.drain(self.stack.len() - count..) {
            match item.node {
                Node::Handler { codes, label } => {
                    top_hot |= item.hot;
                    handlers.push((codes, label));
                }
                Node::Expr(e) => fatal!("expected an except handler, found {:?}", e),
            }
        }
        stmt_hot.top(top_hot);

        let first = handlers[0].1;
        let body = self.block(first - 2 - self.reader.widths().label as usize, Mode::Normal);
        if !matches!(body.exit, Exit::Fell) {
            fatal!("try body does not fall through to END_EXCEPT");
        }
        stmt_hot.nest(Step::Body, body.hot);
        let end_hot = self.expect(Op::Ext(ExtOpcode::EndExcept));
        stmt_hot.mark(end_hot, Vec::new(), Position::EndBody);
        let end = self.reader.read_label();

        let labels: SmallVec<[usize; 4]> = handlers.iter().map(|(_, label)| *label).collect();
        let mut excepts = Vec::with_capacity(count);
        for (k, (codes, label)) in handlers.into_iter().enumerate() {
            if self.reader.pc() != label {
                fatal!("except arm {} at {}, expected {}", k, self.reader.pc(), label);
            }
            let pc = self.reader.pc();
            let mut header_hot = self.is_hot(pc);
            let id = match self.reader.read_op() {
                Op::Put(id) => Some(id),
                Op::Basic(Opcode::GPut) => Some(self.reader.read_var()),
                Op::Basic(Opcode::Pop) => None,
                other => fatal!("unexpected {} at except handler {}", other, pc),
            };
            if id.is_some() {
                header_hot |= self.expect(Op::Basic(Opcode::Pop));
            }
            stmt_hot.mark(header_hot, vec![Step::Except(k)], Position::Top);

            let last = k + 1 == count;
            let limit = if last { end } else { labels[k + 1] };
            let arm = self.block(limit, Mode::Normal);
            match arm.exit {
                Exit::Fell if last => {}
                Exit::Jump { target, hot } if !last && target == end => {
                    stmt_hot.mark(hot, Vec::new(), Position::Bottom);
                }
                _ => fatal!("except arm {} does not rejoin at {}", k, end),
            }
            stmt_hot.nest(Step::Except(k), arm.hot);
            excepts.push(ExceptArm { id, codes, body: arm.stmts });
        }
        (Stmt::TryExcept { body: body.stmts, excepts }, stmt_hot)
    }

    fn try_finally(&mut self, hot: bool) -> (Stmt, Hot) {
        let handler_label = self.reader.read_label();
        let mut stmt_hot = Hot::default();
        stmt_hot.top(hot);

        let body = self.block(handler_label - 2, Mode::Normal);
        if !matches!(body.exit, Exit::Fell) {
            fatal!("try body does not fall through to END_FINALLY");
        }
        stmt_hot.nest(Step::Body, body.hot);
        let end_hot = self.expect(Op::Ext(ExtOpcode::EndFinally));
        stmt_hot.mark(end_hot, Vec::new(), Position::EndBody);

        let handler = self.block(self.code.len() - 1, Mode::Finally);
        let Exit::Continue { hot: continue_hot } = handler.exit else {
            fatal!("finally handler at {} does not end with CONTINUE", handler_label);
        };
        stmt_hot.mark(continue_hot, Vec::new(), Position::Bottom);
        stmt_hot.nest(Step::Finally, handler.hot);
        (
            Stmt::TryFinally {
                body: body.stmts,
                handler: handler.stmts,
            },
            stmt_hot,
        )
    }
}

fn binary_op(op: Opcode) -> BinaryOp {
    match op {
        Opcode::Mult => BinaryOp::Mul,
        Opcode::Div => BinaryOp::Div,
        Opcode::Mod => BinaryOp::Mod,
        Opcode::Add => BinaryOp::Add,
        Opcode::Minus => BinaryOp::Sub,
        Opcode::Eq => BinaryOp::Eq,
        Opcode::Ne => BinaryOp::Ne,
        Opcode::Lt => BinaryOp::Lt,
        Opcode::Le => BinaryOp::Le,
        Opcode::Gt => BinaryOp::Gt,
        Opcode::Ge => BinaryOp::Ge,
        Opcode::In => BinaryOp::In,
        other => fatal!("{:?} is not a binary operator", other),
    }
}

/// `ANY` is pushed as the integer 0; anything else is an argument list.
fn catch_codes(codes: Expr) -> CatchCodes {
    match codes {
        Expr::Literal(Value::Int(0)) => CatchCodes::Any,
        Expr::List(args) => CatchCodes::Codes(args),
        other => fatal!("bad error code list {:?}", other),
    }
}
