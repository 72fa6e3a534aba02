//! Line resolution.
//!
//! Lines are counted over the canonical source layout: one line per simple
//! statement, one per compound header (`if`, `elseif`, `else`, loops, `fork`,
//! `try`, `except`, `finally`) and one for each closing keyword. This is the
//! layout produced by [`crate::unparse`].

use super::{HotNode, Position, Step, decompile_program};
use crate::ast::Stmt;
use crate::program::{Program, VectorId};
use crate::vm::Opcode;

/// Returns the source line executing at `pc` in `vector`.
///
/// The program is decompiled with `pc` as target and the line of the hot
/// node is counted from `program.first_lineno()`. The final `DONE` of the
/// main vector maps to the last line. Any other pc without a hot node is not
/// an instruction boundary and aborts.
pub fn find_line_number(program: &Program, vector: VectorId, pc: usize) -> u32 {
    let decompiled = decompile_program(program, Some((vector, pc)));
    let Some(hot) = decompiled.hot else {
        let code = program.vector(vector);
        fatal!(
            "pc {} of {:?} is not an instruction (vector length {}, DONE = {})",
            pc,
            vector,
            code.len(),
            Opcode::Done as u8
        );
    };
    let offset = locate(&decompiled.body, &hot);
    tracing::trace!(?vector, pc, ?hot, offset, "resolved line");
    program.first_lineno() + offset
}

/// Number of source lines `stmts` occupy.
pub fn line_count(stmts: &[Stmt]) -> u32 {
    stmts.iter().map(stmt_lines).sum()
}

fn stmt_lines(stmt: &Stmt) -> u32 {
    match stmt {
        Stmt::Cond { arms, otherwise } => {
            let arms: u32 = arms.iter().map(|arm| 1 + line_count(&arm.body)).sum();
            arms + otherwise.as_ref().map_or(0, |body| 1 + line_count(body)) + 1
        }
        Stmt::ForList { body, .. }
        | Stmt::ForRange { body, .. }
        | Stmt::While { body, .. }
        | Stmt::Fork { body, .. } => 1 + line_count(body) + 1,
        Stmt::TryExcept { body, excepts } => {
            let arms: u32 = excepts.iter().map(|arm| 1 + line_count(&arm.body)).sum();
            1 + line_count(body) + arms + 1
        }
        Stmt::TryFinally { body, handler } => 1 + line_count(body) + 1 + line_count(handler) + 1,
        Stmt::Expr(_) | Stmt::Return(_) | Stmt::Break(_) | Stmt::Continue(_) => 1,
    }
}

fn locate(body: &[Stmt], hot: &HotNode) -> u32 {
    match hot.path.as_slice() {
        [] => match hot.position {
            Position::Bottom => line_count(body).saturating_sub(1),
            _ => 0,
        },
        path => in_list(body, path, hot.position),
    }
}

/// Line offset of `path` from the first line of `stmts`.
fn in_list(stmts: &[Stmt], path: &[Step], position: Position) -> u32 {
    let (Some(Step::Stmt(i)), rest) = (path.first(), &path[1..]) else {
        fatal!("hot path {:?} does not start at a statement", path);
    };
    let Some(stmt) = stmts.get(*i) else {
        fatal!("hot path names statement {} of {}", i, stmts.len());
    };
    line_count(&stmts[..*i]) + in_stmt(stmt, rest, position)
}

/// Line offset of `path` from the first line of `stmt`.
fn in_stmt(stmt: &Stmt, path: &[Step], position: Position) -> u32 {
    let Some((step, rest)) = path.split_first() else {
        return match (position, stmt) {
            (Position::Top, _) => 0,
            (Position::Bottom, _) => stmt_lines(stmt) - 1,
            (Position::EndBody, Stmt::TryExcept { body, .. } | Stmt::TryFinally { body, .. }) => {
                1 + line_count(body)
            }
            (Position::EndBody, other) => fatal!("end of body outside a try: {:?}", other),
        };
    };

    match (stmt, step) {
        (Stmt::Cond { arms, .. }, Step::Arm(k)) if *k < arms.len() => {
            let header: u32 = arms[..*k].iter().map(|arm| 1 + line_count(&arm.body)).sum();
            if rest.is_empty() {
                header
            } else {
                header + 1 + in_list(&arms[*k].body, rest, position)
            }
        }
        (
            Stmt::Cond {
                arms,
                otherwise: Some(otherwise),
            },
            Step::Otherwise,
        ) => {
            let header: u32 = arms.iter().map(|arm| 1 + line_count(&arm.body)).sum();
            header + 1 + in_list(otherwise, rest, position)
        }
        (
            Stmt::ForList { body, .. }
            | Stmt::ForRange { body, .. }
            | Stmt::While { body, .. }
            | Stmt::Fork { body, .. }
            | Stmt::TryExcept { body, .. }
            | Stmt::TryFinally { body, .. },
            Step::Body,
        ) => 1 + in_list(body, rest, position),
        (Stmt::TryExcept { body, excepts }, Step::Except(k)) if *k < excepts.len() => {
            let before: u32 = excepts[..*k].iter().map(|arm| 1 + line_count(&arm.body)).sum();
            let header = 1 + line_count(body) + before;
            if rest.is_empty() {
                header
            } else {
                header + 1 + in_list(&excepts[*k].body, rest, position)
            }
        }
        (Stmt::TryFinally { body, handler }, Step::Finally) => {
            1 + line_count(body) + 1 + in_list(handler, rest, position)
        }
        (stmt, step) => fatal!("hot step {:?} does not fit {:?}", step, stmt),
    }
}
