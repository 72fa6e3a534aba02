#![allow(dead_code)]

use indoc::indoc;
use once_cell::sync::Lazy;
use moocode::ast::*;
use moocode::values::{ErrorCode, Value};

pub const BUILTINS: [&str; 2] = ["length", "tostr"];

pub struct TestCase {
    pub name: &'static str,
    pub source: &'static str,
    pub verb: ParsedVerb,
}

fn args(exprs: Vec<Expr>) -> Vec<Arg> {
    exprs.into_iter().map(Arg::Normal).collect()
}

fn assign(id: VarId, value: Expr) -> Stmt {
    Stmt::Expr(Expr::assign(Expr::var(id), value))
}

fn when(condition: Expr, body: Vec<Stmt>) -> CondArm {
    CondArm { condition, body }
}

pub static TEST_CASES: Lazy<Vec<TestCase>> = Lazy::new(|| {
    vec![
        {
            let mut names = Names::new();
            let x = names.find_or_add("x");
            TestCase {
                name: "assign_and_return",
                source: indoc! {"
                    x = 41;
                    return x;"},
                verb: ParsedVerb::new(
                    names,
                    vec![assign(x, Expr::int(41)), Stmt::Return(Some(Expr::var(x)))],
                ),
            }
        },
        {
            let mut names = Names::new();
            let x = names.find_or_add("x");
            let is = |n| Expr::binary(BinaryOp::Eq, Expr::var(x), Expr::int(n));
            TestCase {
                name: "elseif_chain",
                source: indoc! {r#"
                    if (x == 1)
                      return "one";
                    elseif (x == 2)
                      return "two";
                    else
                      return tostr(x);
                    endif"#},
                verb: ParsedVerb::new(
                    names,
                    vec![Stmt::Cond {
                        arms: vec![
                            when(is(1), vec![Stmt::Return(Some(Expr::str("one")))]),
                            when(is(2), vec![Stmt::Return(Some(Expr::str("two")))]),
                        ],
                        otherwise: Some(vec![Stmt::Return(Some(Expr::Call {
                            func: 1,
                            args: args(vec![Expr::var(x)]),
                        }))]),
                    }],
                ),
            }
        },
        {
            let mut names = Names::new();
            let item = names.find_or_add("item");
            TestCase {
                name: "for_list_with_break",
                source: indoc! {"
                    for item in (args)
                      if (item)
                        break;
                      endif
                    endfor"},
                verb: ParsedVerb::new(
                    names,
                    vec![Stmt::ForList {
                        id: item,
                        expr: Expr::var(Names::ARGS),
                        body: vec![Stmt::Cond {
                            arms: vec![when(Expr::var(item), vec![Stmt::Break(None)])],
                            otherwise: None,
                        }],
                    }],
                ),
            }
        },
        {
            let mut names = Names::new();
            let x = names.find_or_add("x");
            let outer = names.find_or_add("outer");
            TestCase {
                name: "named_while_continue",
                source: indoc! {"
                    while outer (x < 10)
                      x = x + 1;
                      if (x % 2)
                        continue outer;
                      endif
                      player:tell(x);
                    endwhile"},
                verb: ParsedVerb::new(
                    names,
                    vec![Stmt::While {
                        id: Some(outer),
                        condition: Expr::binary(BinaryOp::Lt, Expr::var(x), Expr::int(10)),
                        body: vec![
                            assign(x, Expr::binary(BinaryOp::Add, Expr::var(x), Expr::int(1))),
                            Stmt::Cond {
                                arms: vec![when(
                                    Expr::binary(BinaryOp::Mod, Expr::var(x), Expr::int(2)),
                                    vec![Stmt::Continue(Some(outer))],
                                )],
                                otherwise: None,
                            },
                            Stmt::Expr(Expr::verb(
                                Expr::var(Names::PLAYER),
                                Expr::str("tell"),
                                args(vec![Expr::var(x)]),
                            )),
                        ],
                    }],
                ),
            }
        },
        {
            let mut names = Names::new();
            let x = names.find_or_add("x");
            let t = names.find_or_add("t");
            TestCase {
                name: "fork_and_catch",
                source: indoc! {r#"
                    fork t (0)
                      player:tell(`x.name ! ANY => "?"');
                    endfork
                    return t;"#},
                verb: ParsedVerb::new(
                    names,
                    vec![
                        Stmt::Fork {
                            id: Some(t),
                            delay: Expr::int(0),
                            body: vec![Stmt::Expr(Expr::verb(
                                Expr::var(Names::PLAYER),
                                Expr::str("tell"),
                                args(vec![Expr::catch(
                                    Expr::prop(Expr::var(x), Expr::str("name")),
                                    CatchCodes::Any,
                                    Some(Expr::str("?")),
                                )]),
                            ))],
                        },
                        Stmt::Return(Some(Expr::var(t))),
                    ],
                ),
            }
        },
        {
            let mut names = Names::new();
            let a = names.find_or_add("a");
            let b = names.find_or_add("b");
            let rest = names.find_or_add("rest");
            let e = names.find_or_add("e");
            TestCase {
                name: "try_scatter_handlers",
                source: indoc! {"
                    try
                      try
                        {a, ?b = 5, @rest} = args;
                      except e (E_ARGS, E_TYPE)
                        return e;
                      endtry
                    finally
                      return;
                    endtry"},
                verb: ParsedVerb::new(
                    names,
                    vec![Stmt::TryFinally {
                        body: vec![Stmt::TryExcept {
                            body: vec![Stmt::Expr(Expr::assign(
                                Expr::Scatter(vec![
                                    ScatterItem::required(a),
                                    ScatterItem::optional(b, Some(Expr::int(5))),
                                    ScatterItem::rest(rest),
                                ]),
                                Expr::var(Names::ARGS),
                            ))],
                            excepts: vec![ExceptArm {
                                id: Some(e),
                                codes: CatchCodes::Codes(args(vec![
                                    Expr::Literal(Value::Err(ErrorCode::Args)),
                                    Expr::Literal(Value::Err(ErrorCode::Type)),
                                ])),
                                body: vec![Stmt::Return(Some(Expr::var(e)))],
                            }],
                        }],
                        handler: vec![Stmt::Return(None)],
                    }],
                ),
            }
        },
        {
            let mut names = Names::new();
            let m = names.find_or_add("m");
            let at = |key: &str| Expr::index(Expr::var(m), Expr::str(key));
            TestCase {
                name: "maps_and_ranges",
                source: indoc! {r#"
                    m = ["a" -> 1, "b" -> {2, 3}];
                    m["c"] = m["b"][1..$];
                    return {1.5, #-1, $nothing, E_PERM, -7, length(m)};"#},
                verb: ParsedVerb::new(
                    names,
                    vec![
                        assign(
                            m,
                            Expr::Map(vec![
                                (Expr::str("a"), Expr::int(1)),
                                (Expr::str("b"), Expr::List(args(vec![Expr::int(2), Expr::int(3)]))),
                            ]),
                        ),
                        Stmt::Expr(Expr::assign(
                            at("c"),
                            Expr::range(at("b"), Expr::int(1), Expr::Length),
                        )),
                        Stmt::Return(Some(Expr::List(args(vec![
                            Expr::Literal(Value::Float(1.5)),
                            Expr::obj(-1),
                            Expr::prop(Expr::obj(0), Expr::str("nothing")),
                            Expr::Literal(Value::Err(ErrorCode::Perm)),
                            Expr::int(-7),
                            Expr::Call {
                                func: 0,
                                args: args(vec![Expr::var(m)]),
                            },
                        ])))),
                    ],
                ),
            }
        },
    ]
});
