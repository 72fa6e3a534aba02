//! Tests for bytecode decompilation.

use pretty_assertions::assert_eq;

use super::{HotNode, Position, Step, decompile, decompile_program, find_line_number, line_count};
use crate::api::CompilationOptions;
use crate::ast::{
    Arg, BinaryOp, CatchCodes, CondArm, ExceptArm, Expr, Names, ParsedVerb, ScatterItem,
    ScatterKind, Stmt, UnaryOp, VarId,
};
use crate::compiler::generate;
use crate::program::{Bytecodes, FieldWidths, FormatVersion, Program, VectorId};
use crate::test_utils::init_test_logging;
use crate::values::{ErrorCode, Value};
use crate::disasm::{Operand, instructions};
use crate::vm::{Op, Opcode};
use crate::{Box, Vec, format, vec};

fn compile(names: &Names, body: &[Stmt]) -> Program {
    generate(
        &ParsedVerb::new(names.clone(), body.to_vec()),
        &CompilationOptions::default(),
    )
}

#[track_caller]
fn assert_round_trip(names: &Names, body: Vec<Stmt>) {
    let program = compile(names, &body);
    let decompiled = decompile_program(&program, None);
    assert_eq!(decompiled.body, body);
    assert_eq!(decompiled.hot, None);
}

fn expr(e: Expr) -> Stmt {
    Stmt::Expr(e)
}

fn normal(items: Vec<Expr>) -> Vec<Arg> {
    items.into_iter().map(Arg::Normal).collect()
}

fn err(code: ErrorCode) -> Expr {
    Expr::Literal(Value::Err(code))
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

fn scenario_a() -> Vec<Stmt> {
    vec![Stmt::Cond {
        arms: vec![CondArm {
            condition: Expr::int(1),
            body: vec![Stmt::Return(Some(Expr::int(2)))],
        }],
        otherwise: None,
    }]
}

#[test]
fn test_single_arm_conditional() {
    init_test_logging();
    let program = compile(&Names::new(), &scenario_a());
    let decompiled = decompile_program(&program, None);
    let [Stmt::Cond { arms, otherwise }] = decompiled.body.as_slice() else {
        panic!("expected one conditional, got {:?}", decompiled.body);
    };
    assert_eq!(arms.len(), 1);
    assert_eq!(arms[0].condition, Expr::Literal(Value::Int(1)));
    assert_eq!(arms[0].body, vec![Stmt::Return(Some(Expr::int(2)))]);
    assert_eq!(*otherwise, None);
}

#[test]
fn test_elseif_chains() {
    let v = vars();
    let arm = |cond: VarId, val: i64| CondArm {
        condition: Expr::var(cond),
        body: vec![expr(Expr::assign(Expr::var(v.z), Expr::int(val)))],
    };
    assert_round_trip(
        &v.names,
        vec![Stmt::Cond {
            arms: vec![arm(v.x, 1), arm(v.y, 2)],
            otherwise: None,
        }],
    );
    assert_round_trip(
        &v.names,
        vec![Stmt::Cond {
            arms: vec![arm(v.x, 1), arm(v.y, 2), arm(v.e, 3)],
            otherwise: Some(vec![Stmt::Return(None)]),
        }],
    );
    // empty arms and an empty else
    assert_round_trip(
        &v.names,
        vec![Stmt::Cond {
            arms: vec![
                CondArm {
                    condition: Expr::var(v.x),
                    body: vec![],
                },
                CondArm {
                    condition: Expr::var(v.y),
                    body: vec![],
                },
            ],
            otherwise: Some(vec![]),
        }],
    );
}

#[test]
fn test_if_nested_in_else_is_not_elseif() {
    let v = vars();
    let inner = Stmt::Cond {
        arms: vec![CondArm {
            condition: Expr::var(v.y),
            body: vec![Stmt::Return(None)],
        }],
        otherwise: None,
    };
    assert_round_trip(
        &v.names,
        vec![Stmt::Cond {
            arms: vec![CondArm {
                condition: Expr::var(v.x),
                body: vec![],
            }],
            otherwise: Some(vec![inner, expr(Expr::var(v.z))]),
        }],
    );
}

#[test]
fn test_loops() {
    let v = vars();
    assert_round_trip(
        &v.names,
        vec![
            Stmt::ForList {
                id: v.x,
                expr: Expr::List(normal(vec![Expr::int(1), Expr::int(2), Expr::int(3)])),
                body: vec![Stmt::ForRange {
                    id: v.y,
                    from: Expr::int(1),
                    to: Expr::var(v.x),
                    body: vec![
                        Stmt::Cond {
                            arms: vec![CondArm {
                                condition: Expr::var(v.y),
                                body: vec![Stmt::Continue(Some(v.x))],
                            }],
                            otherwise: None,
                        },
                        Stmt::Break(None),
                    ],
                }],
            },
            Stmt::While {
                id: None,
                condition: Expr::var(v.z),
                body: vec![],
            },
            Stmt::While {
                id: Some(v.e),
                condition: Expr::int(1),
                body: vec![
                    expr(Expr::assign(Expr::var(v.z), Expr::int(0))),
                    Stmt::Break(Some(v.e)),
                    Stmt::Continue(None),
                ],
            },
        ],
    );
}

#[test]
fn test_forks() {
    let v = vars();
    assert_round_trip(
        &v.names,
        vec![
            Stmt::Fork {
                id: None,
                delay: Expr::int(0),
                body: vec![Stmt::Fork {
                    id: Some(v.x),
                    delay: Expr::int(5),
                    body: vec![expr(Expr::var(v.y))],
                }],
            },
            Stmt::Return(Some(Expr::var(v.x))),
        ],
    );
}

#[test]
fn test_try_except_keeps_arm_order() {
    let v = vars();
    let body = vec![Stmt::TryExcept {
        body: vec![expr(Expr::assign(Expr::var(v.x), Expr::int(1)))],
        excepts: vec![
            ExceptArm {
                id: Some(v.e),
                codes: CatchCodes::Codes(normal(vec![err(ErrorCode::Perm), err(ErrorCode::InvArg)])),
                body: vec![Stmt::Return(Some(Expr::var(v.e)))],
            },
            ExceptArm {
                id: None,
                codes: CatchCodes::Any,
                body: vec![expr(Expr::assign(Expr::var(v.y), Expr::int(2)))],
            },
        ],
    }];
    let program = compile(&v.names, &body);
    let decompiled = decompile_program(&program, None);
    let [Stmt::TryExcept { excepts, .. }] = decompiled.body.as_slice() else {
        panic!("expected a try statement, got {:?}", decompiled.body);
    };
    assert_eq!(excepts.len(), 2);
    assert_eq!(excepts[0].id, Some(v.e));
    assert_eq!(excepts[1].codes, CatchCodes::Any);
    assert_eq!(decompiled.body, body);
}

#[test]
fn test_try_finally() {
    let v = vars();
    assert_round_trip(
        &v.names,
        vec![Stmt::TryFinally {
            body: vec![Stmt::TryFinally {
                body: vec![Stmt::Return(Some(Expr::var(v.x)))],
                handler: vec![],
            }],
            handler: vec![expr(Expr::assign(Expr::var(v.y), Expr::int(0)))],
        }],
    );
}

#[test]
fn test_scatter_targets() {
    let mut names = Names::new();
    let a = names.find_or_add("a");
    let b = names.find_or_add("b");
    let c = names.find_or_add("c");
    let d = names.find_or_add("d");
    let body = vec![expr(Expr::assign(
        Expr::Scatter(vec![
            ScatterItem::required(a),
            ScatterItem::optional(b, Some(Expr::int(1))),
            ScatterItem::optional(d, None),
            ScatterItem::rest(c),
        ]),
        Expr::var(Names::ARGS),
    ))];
    let program = compile(&names, &body);
    let decompiled = decompile_program(&program, None);
    let [Stmt::Expr(Expr::Assign { left, .. })] = decompiled.body.as_slice() else {
        panic!("expected an assignment, got {:?}", decompiled.body);
    };
    let Expr::Scatter(items) = &**left else {
        panic!("expected a scatter target, got {:?}", left);
    };
    let kinds: Vec<ScatterKind> = items.iter().map(|item| item.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ScatterKind::Required,
            ScatterKind::Optional,
            ScatterKind::Optional,
            ScatterKind::Rest
        ]
    );
    assert_eq!(items[1].default, Some(Expr::int(1)));
    assert_eq!(decompiled.body, body);
}

#[test]
fn test_assignment_targets() {
    let v = vars();
    let obj0 = Expr::obj(0);
    assert_round_trip(
        &v.names,
        vec![
            expr(Expr::assign(
                Expr::index(Expr::index(Expr::var(v.x), Expr::int(1)), Expr::int(2)),
                Expr::int(3),
            )),
            expr(Expr::assign(
                Expr::range(Expr::var(v.x), Expr::int(2), Expr::Length),
                Expr::List(vec![]),
            )),
            expr(Expr::assign(
                Expr::prop(obj0.clone(), Expr::str("name")),
                Expr::str("thing"),
            )),
            expr(Expr::assign(
                Expr::index(Expr::prop(Expr::var(v.y), Expr::str("items")), Expr::Length),
                Expr::int(0),
            )),
            expr(Expr::assign(
                Expr::var(v.z),
                Expr::assign(Expr::var(v.e), Expr::int(4)),
            )),
        ],
    );
}

#[test]
fn test_expressions() {
    let v = vars();
    let x = || Expr::var(v.x);
    let y = || Expr::var(v.y);
    let exprs = vec![
        Expr::binary(
            BinaryOp::Add,
            x(),
            Expr::binary(BinaryOp::Exp, y(), Expr::int(2)),
        ),
        Expr::unary(UnaryOp::Not, Expr::unary(UnaryOp::Neg, x())),
        Expr::And(Box::new(x()), Box::new(Expr::Or(Box::new(y()), Box::new(Expr::int(0))))),
        Expr::cond(x(), Expr::str("yes"), Expr::cond(y(), Expr::int(1), Expr::int(2))),
        Expr::range(x(), Expr::int(1), Expr::binary(BinaryOp::Sub, Expr::Length, Expr::int(1))),
        Expr::index(x(), Expr::index(y(), Expr::Length)),
        Expr::verb(
            Expr::obj(0),
            Expr::str("notify"),
            vec![Arg::Normal(x()), Arg::Splice(Expr::var(Names::ARGS))],
        ),
        Expr::Call {
            func: 12,
            args: vec![Arg::Splice(x()), Arg::Normal(Expr::Literal(Value::Float(2.5)))],
        },
        Expr::Call {
            func: 0,
            args: vec![],
        },
        Expr::Map(vec![(Expr::str("a"), Expr::int(1)), (x(), Expr::Map(vec![]))]),
        Expr::binary(BinaryOp::In, x(), Expr::List(normal(vec![y(), Expr::int(100)]))),
        Expr::catch(x(), CatchCodes::Any, None),
        Expr::catch(
            Expr::prop(x(), Expr::str("p")),
            CatchCodes::Codes(normal(vec![err(ErrorCode::PropNf)])),
            Some(Expr::int(0)),
        ),
    ];
    let body: Vec<Stmt> = exprs.into_iter().map(expr).collect();
    assert_round_trip(&v.names, body);
}

#[test]
fn test_reports_hot_node() {
    init_test_logging();
    let program = compile(&Names::new(), &scenario_a());
    let code = program.main_vector();
    let hot = |pc| decompile(code, &[], &[], program.version(), false, Some(pc)).hot;

    // NUM 1 is the condition
    assert_eq!(
        hot(0),
        Some(HotNode {
            path: vec![Step::Stmt(0)],
            position: Position::Top,
        })
    );
    // RETURN
    assert_eq!(
        hot(4),
        Some(HotNode {
            path: vec![Step::Stmt(0), Step::Arm(0), Step::Stmt(0)],
            position: Position::Top,
        })
    );
    // DONE
    assert_eq!(
        hot(5),
        Some(HotNode {
            path: vec![],
            position: Position::Bottom,
        })
    );
    // the IF label operand is not an instruction
    assert_eq!(hot(2), None);
}

#[test]
fn test_hot_node_inside_fork_vector() {
    let v = vars();
    let body = vec![
        expr(Expr::var(v.x)),
        Stmt::Fork {
            id: None,
            delay: Expr::int(0),
            body: vec![expr(Expr::var(v.y)), Stmt::Return(None)],
        },
    ];
    let program = compile(&v.names, &body);
    // fork vector: PUSH y, POP, RETURN0, DONE
    let hot = decompile_program(&program, Some((VectorId::Fork(0), 2))).hot;
    assert_eq!(
        hot,
        Some(HotNode {
            path: vec![Step::Stmt(1), Step::Body, Step::Stmt(1)],
            position: Position::Top,
        })
    );
    let hot = decompile_program(&program, Some((VectorId::Fork(0), 3))).hot;
    assert_eq!(
        hot,
        Some(HotNode {
            path: vec![Step::Stmt(1)],
            position: Position::Bottom,
        })
    );
}

/// `while (v0) if (v1) <stmts> else <stmts> endif endwhile return v2;`
/// with enough variables, literals and code to widen every relocated field.
fn wide_verb() -> (Names, Vec<Stmt>) {
    let mut names = Names::new();
    let vars: Vec<VarId> = (0..300)
        .map(|i| names.find_or_add(&format!("v{}", i)))
        .collect();
    let assigns = |range: core::ops::Range<usize>| -> Vec<Stmt> {
        range
            .map(|i| {
                expr(Expr::assign(
                    Expr::var(vars[i % 300]),
                    Expr::binary(
                        BinaryOp::Add,
                        Expr::var(vars[(i * 7 + 3) % 300]),
                        Expr::str(&format!("s{}", i % 400)),
                    ),
                ))
            })
            .collect()
    };
    let body = vec![
        Stmt::While {
            id: None,
            condition: Expr::var(vars[0]),
            body: vec![Stmt::Cond {
                arms: vec![CondArm {
                    condition: Expr::var(vars[1]),
                    body: assigns(0..3500),
                }],
                otherwise: Some(assigns(3500..7000)),
            }],
        },
        Stmt::Return(Some(Expr::var(vars[2]))),
    ];
    (names, body)
}

#[test]
fn test_widened_fields_decompile_and_resolve_lines() {
    init_test_logging();
    let (names, body) = wide_verb();
    let program = compile(&names, &body);
    let code = program.main_vector();

    assert!(code.len() > 65536, "vector is only {} bytes", code.len());
    assert_eq!(
        code.widths(),
        FieldWidths {
            label: 4,
            literal: 2,
            fork: 1,
            var_name: 2,
            stack: 1,
        }
    );

    let insns = instructions(code);
    assert!(insns.iter().any(|insn| insn.op == Op::Basic(Opcode::GPush)));
    assert!(insns.iter().any(|insn| insn.op == Op::Basic(Opcode::GPut)));

    // Loop labels land on the instructions they were generated for.
    let jump_back = insns
        .iter()
        .rev()
        .find(|insn| insn.op == Op::Basic(Opcode::Jump))
        .map(|insn| insn.operands[0]);
    assert_eq!(jump_back, Some(Operand::Label(0)));
    let after_loop = insns
        .iter()
        .find(|insn| insn.op == Op::Basic(Opcode::While))
        .map(|insn| insn.operands[0]);
    let ret = insns.iter().rposition(|insn| insn.op == Op::Basic(Opcode::Return));
    let ret = ret.map(|i| Operand::Label(insns[i - 1].pc));
    assert_eq!(after_loop, ret);

    assert_eq!(decompile_program(&program, None).body, body);

    let last = line_count(&body);
    assert_eq!(find_line_number(&program, VectorId::Main, 0), 1);
    assert_eq!(
        find_line_number(&program, VectorId::Main, insns[insns.len() - 1].pc),
        last
    );
    for insn in insns.iter().step_by(997) {
        let line = find_line_number(&program, VectorId::Main, insn.pc);
        assert!(
            (1..=last).contains(&line),
            "pc {} resolved to line {} of {}",
            insn.pc,
            line,
            last
        );
    }
}

fn raw(bytes: Vec<u8>) -> Bytecodes {
    let widths = FieldWidths {
        label: 1,
        literal: 1,
        fork: 1,
        var_name: 1,
        stack: 1,
    };
    Bytecodes::new(widths, 4, bytes)
}

#[test]
#[should_panic(expected = "underflow")]
fn test_stack_underflow_is_fatal() {
    let code = raw(vec![Opcode::Pop as u8, Opcode::Done as u8]);
    decompile(&code, &[], &[], FormatVersion::CURRENT, false, None);
}

#[test]
#[should_panic(expected = "reduce-ref")]
fn test_clearing_push_without_flag_is_fatal() {
    // PUSH_CLEAR 18
    let code = raw(vec![114 + 18, Opcode::Pop as u8, Opcode::Done as u8]);
    decompile(&code, &[], &[], FormatVersion::CURRENT, false, None);
}

#[test]
#[should_panic(expected = "requires format")]
fn test_opcode_newer_than_program_is_fatal() {
    // EXTENDED MAKE_MAP
    let code = raw(vec![
        Opcode::Extended as u8,
        15,
        Opcode::Pop as u8,
        Opcode::Done as u8,
    ]);
    decompile(&code, &[], &[], FormatVersion::BreakCont, false, None);
}

#[test]
#[should_panic(expected = "DONE")]
fn test_missing_done_is_fatal() {
    let code = raw(vec![157, Opcode::Pop as u8, Opcode::Return0 as u8]);
    decompile(&code, &[], &[], FormatVersion::CURRENT, false, None);
}
