use sysyfront::frontend::{
    ast::{
        BType, BinaryOp, Block, BlockItem, CompUnit, Decl, Exp, FuncDef, FuncParam, GlobalItem,
        If, InitVal, LVal, Stmt, VarDef, While,
    },
    diagnostic::Diagnostic,
    ir::context::Context,
};
use sysyfront::utils::linked_list::LinkedListContainer;

fn compile(items: Vec<GlobalItem>) -> Result<Context, Diagnostic> {
    sysyfront::frontend::irgen(&CompUnit { items }, 8)
}

fn func(ret_typ: BType, id: &str, params: Vec<FuncParam>, items: Vec<BlockItem>) -> GlobalItem {
    GlobalItem::FuncDef(FuncDef {
        ret_typ,
        id: id.to_string(),
        params,
        body: Block { items },
    })
}

fn scalar_param(typ: BType, id: &str) -> FuncParam {
    FuncParam {
        typ,
        id: id.to_string(),
        dimensions: None,
    }
}

fn decl(is_const: bool, typ: BType, id: &str, dims: Vec<Exp>, init: Option<InitVal>) -> Decl {
    Decl {
        is_const,
        typ,
        defs: vec![VarDef {
            id: id.to_string(),
            dimensions: dims,
            init,
        }],
    }
}

fn ret(exp: Option<Exp>) -> BlockItem {
    BlockItem::Stmt(Stmt::Return(exp))
}

fn assign(id: &str, indices: Vec<Exp>, exp: Exp) -> Stmt {
    Stmt::Assign {
        lval: LVal {
            id: id.to_string(),
            indices,
        },
        exp,
    }
}

#[test]
fn default_return_synthesized_for_each_return_type() {
    let ctx = compile(vec![
        func(BType::Int, "f_int", vec![], vec![]),
        func(BType::Float, "f_float", vec![], vec![]),
        func(BType::Void, "f_void", vec![], vec![]),
    ])
    .unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("ret i32 0"));
    assert!(ir.contains("ret float"));
    assert!(ir.contains("ret void"));
}

#[test]
fn constant_if_keeps_only_taken_branch() {
    let ctx = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![BlockItem::Stmt(Stmt::If(Box::new(If {
            cond: Exp::int(0),
            then: Stmt::Return(Some(Exp::int(1))),
            or_else: None,
        })))],
    )])
    .unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("ret i32 0"));
    assert!(!ir.contains("ret i32 1"));
}

#[test]
fn const_array_is_padded_and_usable_in_dimensions() {
    // const int a[2][2] = {1, 2, 3};  ->  {{1, 2}, {3, 0}}
    let a = decl(
        true,
        BType::Int,
        "a",
        vec![Exp::int(2), Exp::int(2)],
        Some(InitVal::List(vec![
            InitVal::Exp(Exp::int(1)),
            InitVal::Exp(Exp::int(2)),
            InitVal::Exp(Exp::int(3)),
        ])),
    );
    // int b[a[1][0]];  数组维度由常量数组元素折叠得到
    let main = func(
        BType::Int,
        "main",
        vec![],
        vec![
            BlockItem::Decl(decl(
                false,
                BType::Int,
                "b",
                vec![Exp::lval("a", vec![Exp::int(1), Exp::int(0)])],
                None,
            )),
            ret(Some(Exp::int(0))),
        ],
    );
    let ctx = compile(vec![GlobalItem::Decl(a), main]).unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("@a = global [2 x [2 x i32]]"));
    assert!(ir.contains("i32 3, i32 0"));
    assert!(ir.contains("alloca [3 x i32]"));
}

#[test]
fn mixed_constant_arithmetic_promotes_to_float() {
    // float x = 1 + 2.0;
    let x = decl(
        false,
        BType::Float,
        "x",
        vec![],
        Some(InitVal::Exp(Exp::binary(
            BinaryOp::Add,
            Exp::int(1),
            Exp::float(2.0),
        ))),
    );
    let ctx = compile(vec![GlobalItem::Decl(x)]).unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("@x = global float 3.0"));
}

#[test]
fn short_circuit_and_branches_per_operand() {
    let items = vec![
        BlockItem::Stmt(Stmt::If(Box::new(If {
            cond: Exp::binary(
                BinaryOp::And,
                Exp::lval("x", vec![]),
                Exp::lval("y", vec![]),
            ),
            then: Stmt::Return(Some(Exp::int(1))),
            or_else: None,
        }))),
        ret(Some(Exp::int(0))),
    ];
    let ctx = compile(vec![func(
        BType::Int,
        "f",
        vec![scalar_param(BType::Int, "x"), scalar_param(BType::Int, "y")],
        items,
    )])
    .unwrap();
    let ir = ctx.to_ir_string();
    assert_eq!(ir.matches("br i1").count(), 2);
}

#[test]
fn short_circuit_or_enters_rhs_only_when_left_is_false() {
    let items = vec![
        BlockItem::Stmt(Stmt::If(Box::new(If {
            cond: Exp::binary(
                BinaryOp::Or,
                Exp::lval("x", vec![]),
                Exp::lval("y", vec![]),
            ),
            then: Stmt::Return(Some(Exp::int(1))),
            or_else: None,
        }))),
        ret(Some(Exp::int(0))),
    ];
    let ctx = compile(vec![func(
        BType::Int,
        "f",
        vec![scalar_param(BType::Int, "x"), scalar_param(BType::Int, "y")],
        items,
    )])
    .unwrap();

    let mut cbrs = vec![];
    for function in ctx.get_functions() {
        for bbk in function.iter(&ctx) {
            for inst in bbk.iter(&ctx) {
                if inst.is_cbr(&ctx) {
                    cbrs.push(inst);
                }
            }
        }
    }
    assert_eq!(cbrs.len(), 2);

    // 左边为真直接进true分支，只有左边为假才进入计算右边的块
    let rhs_block = cbrs[1].get_basicblock(&ctx).unwrap();
    assert_eq!(cbrs[0].get_target(&ctx, 1), Some(rhs_block));
    assert_ne!(cbrs[0].get_target(&ctx, 0), Some(rhs_block));
}

#[test]
fn constant_folding_agrees_with_emitted_arithmetic() {
    // 3*4 + 10/2 - 7%4，全常量时折叠成14
    let folded = compile(vec![func(
        BType::Int,
        "f",
        vec![],
        vec![ret(Some(Exp::binary(
            BinaryOp::Sub,
            Exp::binary(
                BinaryOp::Add,
                Exp::binary(BinaryOp::Mul, Exp::int(3), Exp::int(4)),
                Exp::binary(BinaryOp::Div, Exp::int(10), Exp::int(2)),
            ),
            Exp::binary(BinaryOp::Mod, Exp::int(7), Exp::int(4)),
        )))],
    )])
    .unwrap();
    let function = folded.get_functions().next().unwrap();
    let ret_inst = function.tail(&folded).unwrap().get_tail(&folded).unwrap();
    let value = ret_inst.get_operand(&folded, 0).unwrap();
    assert_eq!(value.get_int_const_value(&folded), Some(14));

    let fctx = compile(vec![func(
        BType::Float,
        "g",
        vec![],
        vec![ret(Some(Exp::binary(
            BinaryOp::Mul,
            Exp::float(1.5),
            Exp::float(2.0),
        )))],
    )])
    .unwrap();
    let function = fctx.get_functions().next().unwrap();
    let ret_inst = function.tail(&fctx).unwrap().get_tail(&fctx).unwrap();
    let value = ret_inst.get_operand(&fctx, 0).unwrap();
    assert_eq!(value.get_float_const_value(&fctx), Some(3.0));

    // 同样的表达式换成变量后必须生成对应指令
    let emitted = compile(vec![func(
        BType::Int,
        "h",
        vec![scalar_param(BType::Int, "a")],
        vec![ret(Some(Exp::binary(
            BinaryOp::Sub,
            Exp::binary(
                BinaryOp::Add,
                Exp::binary(BinaryOp::Mul, Exp::lval("a", vec![]), Exp::int(4)),
                Exp::binary(BinaryOp::Div, Exp::lval("a", vec![]), Exp::int(2)),
            ),
            Exp::binary(BinaryOp::Mod, Exp::lval("a", vec![]), Exp::int(4)),
        )))],
    )])
    .unwrap();
    let ir = emitted.to_ir_string();
    assert!(ir.contains("mul i32"));
    assert!(ir.contains("sdiv i32"));
    assert!(ir.contains("srem i32"));
}

#[test]
fn constant_left_operand_short_circuits_at_compile_time() {
    // 0 && getint() 右边不可达，不能生成调用
    let and_ctx = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![
            BlockItem::Stmt(Stmt::If(Box::new(If {
                cond: Exp::binary(BinaryOp::And, Exp::int(0), Exp::call("getint", vec![])),
                then: Stmt::Return(Some(Exp::int(1))),
                or_else: None,
            }))),
            ret(Some(Exp::int(0))),
        ],
    )])
    .unwrap();
    assert!(!and_ctx.to_ir_string().contains("call i32 @getint"));

    // 1 || getint() 同理
    let or_ctx = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![
            BlockItem::Stmt(Stmt::If(Box::new(If {
                cond: Exp::binary(BinaryOp::Or, Exp::int(1), Exp::call("getint", vec![])),
                then: Stmt::Return(Some(Exp::int(1))),
                or_else: None,
            }))),
            ret(Some(Exp::int(0))),
        ],
    )])
    .unwrap();
    assert!(!or_ctx.to_ir_string().contains("call i32 @getint"));
}

#[test]
fn global_scalar_load_prints_pointer_typed_operand() {
    let g = decl(false, BType::Int, "g", vec![], Some(InitVal::Exp(Exp::int(5))));
    let ctx = compile(vec![
        GlobalItem::Decl(g),
        func(
            BType::Int,
            "main",
            vec![],
            vec![ret(Some(Exp::lval("g", vec![])))],
        ),
    ])
    .unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("load i32, i32* @g"));
}

#[test]
fn every_block_ends_with_exactly_one_terminator() {
    // while循环加if/else，覆盖所有分支块
    let body = Stmt::Block(Block {
        items: vec![BlockItem::Stmt(Stmt::If(Box::new(If {
            cond: Exp::binary(BinaryOp::Eq, Exp::lval("i", vec![]), Exp::int(1)),
            then: assign(
                "i",
                vec![],
                Exp::binary(BinaryOp::Add, Exp::lval("i", vec![]), Exp::int(2)),
            ),
            or_else: Some(assign(
                "i",
                vec![],
                Exp::binary(BinaryOp::Add, Exp::lval("i", vec![]), Exp::int(1)),
            )),
        })))],
    });
    let ctx = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![
            BlockItem::Decl(decl(
                false,
                BType::Int,
                "i",
                vec![],
                Some(InitVal::Exp(Exp::int(0))),
            )),
            BlockItem::Stmt(Stmt::While(Box::new(While {
                cond: Exp::binary(BinaryOp::Lt, Exp::lval("i", vec![]), Exp::int(3)),
                body,
            }))),
            ret(Some(Exp::lval("i", vec![]))),
        ],
    )])
    .unwrap();

    for function in ctx.get_functions() {
        for bbk in function.iter(&ctx) {
            let insts: Vec<_> = bbk.iter(&ctx).collect();
            let terminators = insts.iter().filter(|i| i.is_terminater(&ctx)).count();
            assert_eq!(terminators, 1);
            assert!(insts.last().unwrap().is_terminater(&ctx));
        }
    }
}

#[test]
fn constant_division_by_zero_is_rejected() {
    let result = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![ret(Some(Exp::binary(
            BinaryOp::Div,
            Exp::int(1),
            Exp::int(0),
        )))],
    )]);
    assert_eq!(result.unwrap_err(), Diagnostic::DivisionByZero);
}

#[test]
fn break_outside_loop_is_rejected() {
    let result = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![BlockItem::Stmt(Stmt::Break)],
    )]);
    assert_eq!(result.unwrap_err(), Diagnostic::BreakOutsideLoop);
}

#[test]
fn duplicate_binding_in_same_scope_is_rejected() {
    let result = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![
            BlockItem::Decl(decl(false, BType::Int, "x", vec![], None)),
            BlockItem::Decl(decl(false, BType::Float, "x", vec![], None)),
            ret(Some(Exp::int(0))),
        ],
    )]);
    assert!(matches!(result, Err(Diagnostic::DuplicateBinding(name)) if name == "x"));
}

#[test]
fn unbound_name_is_rejected() {
    let result = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![ret(Some(Exp::lval("y", vec![])))],
    )]);
    assert!(matches!(result, Err(Diagnostic::UnboundName(name)) if name == "y"));
}

#[test]
fn local_array_partial_init_memsets_then_stores() {
    // int a[4] = {1};  先整体置零，再store非零元素
    let ctx = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![
            BlockItem::Decl(decl(
                false,
                BType::Int,
                "a",
                vec![Exp::int(4)],
                Some(InitVal::List(vec![InitVal::Exp(Exp::int(1))])),
            )),
            ret(Some(Exp::lval("a", vec![Exp::int(0)]))),
        ],
    )])
    .unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("call void @sysy_memset_int("));
    assert!(ir.contains("store i32 1"));
    assert!(ir.contains("getelementptr [4 x i32]"));
}

#[test]
fn array_parameters_decay_to_pointers() {
    // int f(int a[], int n) { return a[n]; }
    let ctx = compile(vec![func(
        BType::Int,
        "f",
        vec![
            FuncParam {
                typ: BType::Int,
                id: "a".to_string(),
                dimensions: Some(vec![]),
            },
            scalar_param(BType::Int, "n"),
        ],
        vec![ret(Some(Exp::lval("a", vec![Exp::lval("n", vec![])])))],
    )])
    .unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("define i32 @f(i32*"));
    assert!(ir.contains("getelementptr i32, i32*"));
}

#[test]
fn while_condition_compares_and_loops_back() {
    let ctx = compile(vec![func(
        BType::Int,
        "main",
        vec![],
        vec![
            BlockItem::Decl(decl(
                false,
                BType::Int,
                "i",
                vec![],
                Some(InitVal::Exp(Exp::int(0))),
            )),
            BlockItem::Stmt(Stmt::While(Box::new(While {
                cond: Exp::binary(BinaryOp::Lt, Exp::lval("i", vec![]), Exp::int(10)),
                body: assign(
                    "i",
                    vec![],
                    Exp::binary(BinaryOp::Add, Exp::lval("i", vec![]), Exp::int(1)),
                ),
            }))),
            ret(Some(Exp::lval("i", vec![]))),
        ],
    )])
    .unwrap();
    let ir = ctx.to_ir_string();
    assert!(ir.contains("icmp slt i32"));
    // 条件块被进入块和循环体各跳转一次
    assert!(ir.matches("br label").count() >= 2);
}
