//! Tests for pc to source line resolution.

use pretty_assertions::assert_eq;

use super::{find_line_number, line_count};
use crate::api::CompilationOptions;
use crate::ast::{CatchCodes, CondArm, ExceptArm, Expr, Names, ParsedVerb, ScatterItem, Stmt, VarId};
use crate::compiler::generate;
use crate::disasm::instructions;
use crate::program::{Bytecodes, Program, VectorId};
use crate::test_utils::init_test_logging;
use crate::vm::{ExtOpcode, Op, Opcode};
use crate::{Vec, vec};

fn compile_at(names: Names, body: Vec<Stmt>, first_lineno: u32) -> Program {
    let options = CompilationOptions {
        first_lineno,
        ..CompilationOptions::default()
    };
    generate(&ParsedVerb::new(names, body), &options)
}

#[track_caller]
fn pc_of(code: &Bytecodes, op: Op) -> usize {
    match instructions(code).iter().find(|insn| insn.op == op) {
        Some(insn) => insn.pc,
        None => panic!("{} not found", op),
    }
}

#[track_caller]
fn line_of(program: &Program, op: Op) -> u32 {
    program.line_for(VectorId::Main, pc_of(program.main_vector(), op))
}

fn assign(id: VarId, value: i64) -> Stmt {
    Stmt::Expr(Expr::assign(Expr::var(id), Expr::int(value)))
}

struct Vars {
    names: Names,
    x: VarId,
    y: VarId,
    z: VarId,
    e: VarId,
}

fn vars() -> Vars {
    let mut names = Names::new();
    let x = names.find_or_add("x");
    let y = names.find_or_add("y");
    let z = names.find_or_add("z");
    let e = names.find_or_add("e");
    Vars { names, x, y, z, e }
}

#[test]
fn test_for_header_line() {
    init_test_logging();
    let v = vars();
    // 1 for x in ({1, 2, 3})
    // 2   y = x;
    // 3 endfor
    let body = vec![Stmt::ForList {
        id: v.x,
        expr: Expr::List(
            [1, 2, 3]
                .into_iter()
                .map(|i| crate::ast::Arg::Normal(Expr::int(i)))
                .collect(),
        ),
        body: vec![Stmt::Expr(Expr::assign(Expr::var(v.y), Expr::var(v.x)))],
    }];
    let program = compile_at(v.names, body.clone(), 1);
    assert_eq!(line_count(&body), 3);
    assert_eq!(line_of(&program, Op::Basic(Opcode::ForList)), 1);
    assert_eq!(program.line_for(VectorId::Main, 0), 1);
    assert_eq!(line_of(&program, Op::Put(v.y)), 2);
    assert_eq!(line_of(&program, Op::Basic(Opcode::Jump)), 3);
}

#[test]
fn test_conditional_and_try_lines() {
    let v = vars();
    //  1 x = 1;
    //  2 if (x)
    //  3   y = 2;
    //  4 elseif (y)
    //  5   z = 3;
    //  6 else
    //  7   return;
    //  8 endif
    //  9 try
    // 10   x = 5;
    // 11 except e (ANY)
    // 12   return e;
    // 13 endtry
    let body = vec![
        assign(v.x, 1),
        Stmt::Cond {
            arms: vec![
                CondArm {
                    condition: Expr::var(v.x),
                    body: vec![assign(v.y, 2)],
                },
                CondArm {
                    condition: Expr::var(v.y),
                    body: vec![assign(v.z, 3)],
                },
            ],
            otherwise: Some(vec![Stmt::Return(None)]),
        },
        Stmt::TryExcept {
            body: vec![assign(v.x, 5)],
            excepts: vec![ExceptArm {
                id: Some(v.e),
                codes: CatchCodes::Any,
                body: vec![Stmt::Return(Some(Expr::var(v.e)))],
            }],
        },
    ];
    let program = compile_at(v.names, body.clone(), 1);
    assert_eq!(line_count(&body), 13);

    assert_eq!(line_of(&program, Op::Put(v.x)), 1);
    assert_eq!(line_of(&program, Op::Basic(Opcode::If)), 2);
    assert_eq!(line_of(&program, Op::Put(v.y)), 3);
    assert_eq!(line_of(&program, Op::Basic(Opcode::Eif)), 4);
    assert_eq!(line_of(&program, Op::Put(v.z)), 5);
    assert_eq!(line_of(&program, Op::Basic(Opcode::Return0)), 7);
    // jumps out of an arm belong to the closing line
    assert_eq!(line_of(&program, Op::Basic(Opcode::Jump)), 8);
    assert_eq!(line_of(&program, Op::Ext(ExtOpcode::TryExcept)), 9);
    assert_eq!(line_of(&program, Op::Ext(ExtOpcode::EndExcept)), 11);
    assert_eq!(line_of(&program, Op::Put(v.e)), 11);
    assert_eq!(line_of(&program, Op::Basic(Opcode::Return)), 12);
    assert_eq!(line_of(&program, Op::Basic(Opcode::Done)), 13);
}

#[test]
fn test_finally_lines() {
    let v = vars();
    // 1 try
    // 2   x = 1;
    // 3 finally
    // 4   y = 2;
    // 5 endtry
    let body = vec![Stmt::TryFinally {
        body: vec![assign(v.x, 1)],
        handler: vec![assign(v.y, 2)],
    }];
    let program = compile_at(v.names, body, 1);
    assert_eq!(line_of(&program, Op::Ext(ExtOpcode::TryFinally)), 1);
    assert_eq!(line_of(&program, Op::Put(v.x)), 2);
    assert_eq!(line_of(&program, Op::Ext(ExtOpcode::EndFinally)), 3);
    assert_eq!(line_of(&program, Op::Put(v.y)), 4);
    assert_eq!(line_of(&program, Op::Ext(ExtOpcode::Continue)), 5);
}

#[test]
fn test_fork_body_lines() {
    let v = vars();
    // 1 x = 1;
    // 2 fork (0)
    // 3   y = 2;
    // 4   return;
    // 5 endfork
    // 6 z = 3;
    let body = vec![
        assign(v.x, 1),
        Stmt::Fork {
            id: None,
            delay: Expr::int(0),
            body: vec![assign(v.y, 2), Stmt::Return(None)],
        },
        assign(v.z, 3),
    ];
    let program = compile_at(v.names, body, 1);
    let fork = VectorId::Fork(0);
    let code = &program.fork_vectors()[0];
    assert_eq!(line_of(&program, Op::Basic(Opcode::Fork)), 2);
    assert_eq!(program.line_for(fork, 0), 3);
    assert_eq!(program.line_for(fork, pc_of(code, Op::Basic(Opcode::Return0))), 4);
    assert_eq!(program.line_for(fork, pc_of(code, Op::Basic(Opcode::Done))), 5);
    assert_eq!(line_of(&program, Op::Put(v.z)), 6);
}

#[test]
fn test_first_lineno_offsets_lines() {
    let v = vars();
    let body = vec![
        assign(v.x, 1),
        Stmt::While {
            id: None,
            condition: Expr::var(v.x),
            body: vec![Stmt::Break(None)],
        },
    ];
    let program = compile_at(v.names, body, 10);
    assert_eq!(line_of(&program, Op::Put(v.x)), 10);
    assert_eq!(line_of(&program, Op::Basic(Opcode::While)), 11);
    assert_eq!(line_of(&program, Op::Ext(ExtOpcode::Exit)), 12);
    assert_eq!(line_of(&program, Op::Basic(Opcode::Jump)), 13);
}

#[test]
fn test_scatter_defaults_belong_to_their_statement() {
    let mut names = Names::new();
    let a = names.find_or_add("a");
    let b = names.find_or_add("b");
    let body = vec![
        Stmt::Return(None),
        Stmt::Expr(Expr::assign(
            Expr::Scatter(vec![
                ScatterItem::required(a),
                ScatterItem::optional(b, Some(Expr::int(5))),
            ]),
            Expr::var(Names::ARGS),
        )),
    ];
    let program = compile_at(names, body, 1);
    assert_eq!(line_of(&program, Op::Num(5)), 2);
    assert_eq!(line_of(&program, Op::Put(b)), 2);
}

#[test]
fn test_memo_returns_consistent_lines() {
    let v = vars();
    let body = vec![assign(v.x, 1), assign(v.y, 2), assign(v.z, 3)];
    let program = compile_at(v.names, body, 1);
    let code = program.main_vector();
    let (px, pz) = (pc_of(code, Op::Put(v.x)), pc_of(code, Op::Put(v.z)));

    assert_eq!(program.line_for(VectorId::Main, pz), 3);
    assert_eq!(program.line_for(VectorId::Main, pz), 3);
    assert_eq!(program.line_for(VectorId::Main, px), 1);
    assert_eq!(program.line_for(VectorId::Main, pz), 3);
    assert_eq!(find_line_number(&program, VectorId::Main, px), 1);
}

#[test]
#[should_panic(expected = "not an instruction")]
fn test_pc_inside_operand_is_fatal() {
    let v = vars();
    let body = vec![Stmt::Cond {
        arms: vec![CondArm {
            condition: Expr::var(v.x),
            body: vec![],
        }],
        otherwise: None,
    }];
    let program = compile_at(v.names, body, 1);
    // PUSH x, IF <label>
    find_line_number(&program, VectorId::Main, 2);
}
