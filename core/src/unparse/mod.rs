//! AST to MOO source.
//!
//! The output uses one line per simple statement and one per compound
//! keyword, the same layout the line resolver counts. Parentheses are
//! inserted only where precedence requires them, unless
//! [`UnparseOptions::fully_parenthesize`] is set.


use core::fmt::Write;

use crate::api::UnparseOptions;
use crate::ast::{Arg, BinaryOp, BuiltinId, CatchCodes, Expr, Names, ScatterItem, ScatterKind, Stmt, UnaryOp, VarId};
use crate::decompiler::decompile_program;
use crate::program::Program;
use crate::values::Value;
use crate::{String, Vec, format};

/// Maps builtin function ids to their names.
pub trait BuiltinNames {
    fn builtin_name(&self, id: BuiltinId) -> Option<&str>;
}

impl BuiltinNames for Vec<&str> {
    fn builtin_name(&self, id: BuiltinId) -> Option<&str> {
        self.get(id as usize).copied()
    }
}

impl<const N: usize> BuiltinNames for [&str; N] {
    fn builtin_name(&self, id: BuiltinId) -> Option<&str> {
        self.get(id as usize).copied()
    }
}

/// Decompiles `program` and renders its main body as source lines.
pub fn unparse_program(
    program: &Program,
    builtins: &dyn BuiltinNames,
    options: &UnparseOptions,
) -> Vec<String> {
    let body = decompile_program(program, None).body;
    unparse(&body, program.var_names(), builtins, options)
}

impl Program {
    /// The program's source, as the database writer persists it.
    pub fn listing(&self, builtins: &dyn BuiltinNames, options: &UnparseOptions) -> Vec<String> {
        unparse_program(self, builtins, options)
    }
}

/// Renders `stmts` as source lines.
pub fn unparse(
    stmts: &[Stmt],
    names: &Names,
    builtins: &dyn BuiltinNames,
    options: &UnparseOptions,
) -> Vec<String> {
    let mut unparser = Unparser {
        names,
        builtins,
        options,
        lines: Vec::new(),
        depth: 0,
    };
    unparser.stmts(stmts);
    unparser.lines
}

// Binding strength, loosest first.
const PREC_ASSIGN: u8 = 1;
const PREC_COND: u8 = 2;
const PREC_LOGICAL: u8 = 3;
const PREC_COMPARE: u8 = 4;
const PREC_ADD: u8 = 5;
const PREC_MUL: u8 = 6;
const PREC_EXP: u8 = 7;
const PREC_UNARY: u8 = 8;
const PREC_POSTFIX: u8 = 9;
const PREC_ATOM: u8 = 10;

fn binary_prec(op: BinaryOp) -> u8 {
    match op {
        BinaryOp::Eq
        | BinaryOp::Ne
        | BinaryOp::Lt
        | BinaryOp::Le
        | BinaryOp::Gt
        | BinaryOp::Ge
        | BinaryOp::In => PREC_COMPARE,
        BinaryOp::Add | BinaryOp::Sub => PREC_ADD,
        BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => PREC_MUL,
        BinaryOp::Exp => PREC_EXP,
    }
}

fn prec(expr: &Expr) -> u8 {
    match expr {
        Expr::Assign { .. } => PREC_ASSIGN,
        Expr::Cond { .. } => PREC_COND,
        Expr::And(..) | Expr::Or(..) => PREC_LOGICAL,
        Expr::Binary(op, ..) => binary_prec(*op),
        Expr::Unary(..) => PREC_UNARY,
        Expr::Literal(Value::Int(i)) if *i < 0 => PREC_UNARY,
        Expr::Literal(Value::Float(f)) if f.is_sign_negative() => PREC_UNARY,
        Expr::Prop { .. } | Expr::Index { .. } | Expr::Range { .. } | Expr::Verb { .. } => {
            PREC_POSTFIX
        }
        _ => PREC_ATOM,
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `"name"` when the literal can follow `.`, `:` or `$` bare.
fn bare_name(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Literal(Value::Str(s)) if is_identifier(s) => Some(&**s),
        _ => None,
    }
}

fn write_literal(out: &mut String, value: &Value) {
    match value {
        Value::Int(i) => {
            let _ = write!(out, "{}", i);
        }
        Value::Float(f) => {
            // `{:?}` always keeps a `.` or an exponent
            let _ = write!(out, "{:?}", f);
        }
        Value::Str(s) => {
            out.push('"');
            for c in s.chars() {
                if c == '"' || c == '\\' {
                    out.push('\\');
                }
                out.push(c);
            }
            out.push('"');
        }
        Value::Obj(o) => {
            let _ = write!(out, "#{}", o);
        }
        Value::Err(e) => out.push_str(e.name()),
    }
}

struct Unparser<'a> {
    names: &'a Names,
    builtins: &'a dyn BuiltinNames,
    options: &'a UnparseOptions,
    lines: Vec<String>,
    depth: usize,
}

impl Unparser<'_> {
    fn line(&mut self, text: String) {
        let mut line = String::with_capacity(self.depth * self.options.indent + text.len());
        for _ in 0..self.depth * self.options.indent {
            line.push(' ');
        }
        line.push_str(&text);
        self.lines.push(line);
    }

    fn nested(&mut self, stmts: &[Stmt]) {
        self.depth += 1;
        self.stmts(stmts);
        self.depth -= 1;
    }

    fn name(&self, id: VarId) -> &str {
        match self.names.name(id) {
            Some(name) => name,
            None => fatal!("variable {} has no name ({} known)", id.0, self.names.len()),
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Cond { arms, otherwise } => {
                for (i, arm) in arms.iter().enumerate() {
                    let keyword = if i == 0 { "if" } else { "elseif" };
                    let header = format!("{} ({})", keyword, self.expr(&arm.condition));
                    self.line(header);
                    self.nested(&arm.body);
                }
                if let Some(otherwise) = otherwise {
                    self.line("else".into());
                    self.nested(otherwise);
                }
                self.line("endif".into());
            }
            Stmt::ForList { id, expr, body } => {
                let header = format!("for {} in ({})", self.name(*id), self.expr(expr));
                self.line(header);
                self.nested(body);
                self.line("endfor".into());
            }
            Stmt::ForRange { id, from, to, body } => {
                let header = format!(
                    "for {} in [{}..{}]",
                    self.name(*id),
                    self.expr(from),
                    self.expr(to)
                );
                self.line(header);
                self.nested(body);
                self.line("endfor".into());
            }
            Stmt::While { id, condition, body } => {
                let header = match id {
                    Some(id) => format!("while {} ({})", self.name(*id), self.expr(condition)),
                    None => format!("while ({})", self.expr(condition)),
                };
                self.line(header);
                self.nested(body);
                self.line("endwhile".into());
            }
            Stmt::Fork { id, delay, body } => {
                let header = match id {
                    Some(id) => format!("fork {} ({})", self.name(*id), self.expr(delay)),
                    None => format!("fork ({})", self.expr(delay)),
                };
                self.line(header);
                self.nested(body);
                self.line("endfork".into());
            }
            Stmt::Expr(expr) => {
                let text = format!("{};", self.expr(expr));
                self.line(text);
            }
            Stmt::Return(None) => self.line("return;".into()),
            Stmt::Return(Some(expr)) => {
                let text = format!("return {};", self.expr(expr));
                self.line(text);
            }
            Stmt::TryExcept { body, excepts } => {
                self.line("try".into());
                self.nested(body);
                for arm in excepts {
                    let codes = self.codes(&arm.codes);
                    let header = match arm.id {
                        Some(id) => format!("except {} ({})", self.name(id), codes),
                        None => format!("except ({})", codes),
                    };
                    self.line(header);
                    self.nested(&arm.body);
                }
                self.line("endtry".into());
            }
            Stmt::TryFinally { body, handler } => {
                self.line("try".into());
                self.nested(body);
                self.line("finally".into());
                self.nested(handler);
                self.line("endtry".into());
            }
            Stmt::Break(id) | Stmt::Continue(id) => {
                let keyword = if matches!(stmt, Stmt::Break(_)) { "break" } else { "continue" };
                let text = match id {
                    Some(id) => format!("{} {};", keyword, self.name(*id)),
                    None => format!("{};", keyword),
                };
                self.line(text);
            }
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expr(&self, expr: &Expr) -> String {
        let mut out = String::new();
        self.write_expr(&mut out, expr);
        out
    }

    fn codes(&self, codes: &CatchCodes) -> String {
        match codes {
            CatchCodes::Any => "ANY".into(),
            CatchCodes::Codes(args) => {
                let mut out = String::new();
                self.write_args(&mut out, args);
                out
            }
        }
    }

    /// Writes `expr`, parenthesized if it binds looser than `min`.
    fn write_sub(&self, out: &mut String, expr: &Expr, min: u8) {
        let own = prec(expr);
        let parens = own < min || (self.options.fully_parenthesize && own < PREC_ATOM);
        if parens {
            out.push('(');
        }
        self.write_expr(out, expr);
        if parens {
            out.push(')');
        }
    }

    fn write_args(&self, out: &mut String, args: &[Arg]) {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match arg {
                Arg::Normal(e) => self.write_sub(out, e, PREC_ASSIGN),
                Arg::Splice(e) => {
                    out.push('@');
                    self.write_sub(out, e, PREC_UNARY);
                }
            }
        }
    }

    fn write_scatter(&self, out: &mut String, items: &[ScatterItem]) {
        out.push('{');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            match item.kind {
                ScatterKind::Required => out.push_str(self.name(item.id)),
                ScatterKind::Optional => {
                    out.push('?');
                    out.push_str(self.name(item.id));
                    if let Some(default) = &item.default {
                        out.push_str(" = ");
                        self.write_sub(out, default, PREC_ASSIGN);
                    }
                }
                ScatterKind::Rest => {
                    out.push('@');
                    out.push_str(self.name(item.id));
                }
            }
        }
        out.push('}');
    }

    fn write_expr(&self, out: &mut String, expr: &Expr) {
        match expr {
            Expr::Var(id) => out.push_str(self.name(*id)),
            Expr::Literal(value) => write_literal(out, value),
            Expr::Length => out.push('$'),
            Expr::Prop { obj, name } => match (&**obj, bare_name(name)) {
                (Expr::Literal(Value::Obj(0)), Some(bare)) => {
                    out.push('$');
                    out.push_str(bare);
                }
                (obj, bare) => {
                    self.write_sub(out, obj, PREC_POSTFIX);
                    out.push('.');
                    self.write_selector(out, bare, name);
                }
            },
            Expr::Verb { obj, verb, args } => {
                match (&**obj, bare_name(verb)) {
                    (Expr::Literal(Value::Obj(0)), Some(bare)) => {
                        out.push('$');
                        out.push_str(bare);
                    }
                    (obj, bare) => {
                        self.write_sub(out, obj, PREC_POSTFIX);
                        out.push(':');
                        self.write_selector(out, bare, verb);
                    }
                }
                out.push('(');
                self.write_args(out, args);
                out.push(')');
            }
            Expr::Index { base, index } => {
                self.write_sub(out, base, PREC_POSTFIX);
                out.push('[');
                self.write_expr(out, index);
                out.push(']');
            }
            Expr::Range { base, from, to } => {
                self.write_sub(out, base, PREC_POSTFIX);
                out.push('[');
                self.write_expr(out, from);
                out.push_str("..");
                self.write_expr(out, to);
                out.push(']');
            }
            Expr::Unary(op, operand) => {
                out.push(match op {
                    UnaryOp::Neg => '-',
                    UnaryOp::Not => '!',
                });
                // keep `- -x` and `-(-1)` from fusing
                self.write_sub(out, operand, PREC_UNARY + 1);
            }
            Expr::Binary(op, left, right) => {
                let own = binary_prec(*op);
                let (lmin, rmin) = match op {
                    BinaryOp::Exp => (own + 1, own),
                    _ => (own, own + 1),
                };
                self.write_sub(out, left, lmin);
                out.push(' ');
                out.push_str(op.symbol());
                out.push(' ');
                self.write_sub(out, right, rmin);
            }
            Expr::And(left, right) | Expr::Or(left, right) => {
                self.write_sub(out, left, PREC_LOGICAL);
                out.push_str(if matches!(expr, Expr::And(..)) { " && " } else { " || " });
                self.write_sub(out, right, PREC_LOGICAL + 1);
            }
            Expr::Call { func, args } => {
                match self.builtins.builtin_name(*func) {
                    Some(name) => out.push_str(name),
                    None => fatal!("no name for builtin function {}", func),
                }
                out.push('(');
                self.write_args(out, args);
                out.push(')');
            }
            Expr::List(args) => {
                out.push('{');
                self.write_args(out, args);
                out.push('}');
            }
            Expr::Map(pairs) => {
                out.push('[');
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.write_sub(out, key, PREC_ASSIGN);
                    out.push_str(" -> ");
                    self.write_sub(out, value, PREC_ASSIGN);
                }
                out.push(']');
            }
            Expr::Cond {
                condition,
                consequence,
                alternative,
            } => {
                self.write_sub(out, condition, PREC_COND + 1);
                out.push_str(" ? ");
                self.write_sub(out, consequence, PREC_COND);
                out.push_str(" | ");
                self.write_sub(out, alternative, PREC_COND);
            }
            Expr::Catch {
                expr,
                codes,
                handler,
            } => {
                out.push('`');
                self.write_expr(out, expr);
                out.push_str(" ! ");
                out.push_str(&self.codes(codes));
                if let Some(handler) = handler {
                    out.push_str(" => ");
                    self.write_expr(out, handler);
                }
                out.push('\'');
            }
            Expr::Assign { left, right } => {
                match &**left {
                    Expr::Scatter(items) => self.write_scatter(out, items),
                    left => self.write_sub(out, left, PREC_POSTFIX),
                }
                out.push_str(" = ");
                self.write_sub(out, right, PREC_ASSIGN);
            }
            Expr::Scatter(items) => self.write_scatter(out, items),
        }
    }

    /// Writes a property or verb selector: bare when it is an identifier,
    /// `(expr)` otherwise.
    fn write_selector(&self, out: &mut String, name: Option<&str>, selector: &Expr) {
        match name {
            Some(name) => out.push_str(name),
            None => {
                out.push('(');
                self.write_expr(out, selector);
                out.push(')');
            }
        }
    }
}
