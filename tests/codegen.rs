use minicc::{
    ast::{BinOp, Decl, Expr, FunctionDecl, IfStmt, Param, Primitive, Program, Stmt, Type},
    target::CodegenError,
    CompileError, Options, Session,
};

mod common;
use common::{assemble, assemble_default, contains_sequence, count, main_with};

fn identity() -> Decl {
    FunctionDecl::new(
        "f",
        vec![Param::new("a", Type::integer())],
        Some(Type::integer()),
        vec![Stmt::ret(Expr::name("a"))],
    )
    .into()
}

#[test]
fn sum_program_stores_then_reloads_for_print() -> anyhow::Result<()> {
    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("x", Type::integer(), Some(Expr::add(Expr::int(2), Expr::int(3)))),
        Expr::print(Expr::name("x")).into(),
        Stmt::ret(Expr::int(0)),
    ])]);

    let lines = assemble_default(&mut program)?;

    assert!(contains_sequence(
        &lines,
        &[
            "main:",
            "push rbp",
            "mov rbp, rsp",
            "sub rsp, 16",
            "mov rbx, 2",
            "mov r10, 3",
            "add rbx, r10",
            "mov qword [rbp - 8], rbx",
            "mov rbx, qword [rbp - 8]",
            "mov rdi, rbx",
            "call print",
        ]
    ));

    assert!(contains_sequence(
        &lines,
        &[
            "mov rbx, 0",
            "mov rax, rbx",
            "jmp .L0",
            "xor eax, eax",
            ".L0:",
            "add rsp, 16",
            "pop rbp",
            "mov rdi, rax",
            "and rsp, -16",
            "call exit wrt ..plt",
        ]
    ));

    Ok(())
}

#[test]
fn unit_has_header_runtime_and_one_format_string() -> anyhow::Result<()> {
    let mut program = Program::new(vec![main_with(vec![Stmt::ret(Expr::int(0))])]);
    let lines = assemble_default(&mut program)?;

    assert_eq!(
        &lines[..5],
        ["section .text", "default rel", "extern printf", "extern exit", "global main"]
    );

    assert!(contains_sequence(
        &lines,
        &[
            "print:",
            "push rbp",
            "mov rbp, rsp",
            "mov rsi, rdi",
            "lea rdi, [num_fmt]",
            "xor eax, eax",
            "call printf wrt ..plt",
            "pop rbp",
            "ret",
        ]
    ));

    assert_eq!(count(&lines, "section .data"), 1);
    assert_eq!(lines.last().map(String::as_str), Some("num_fmt: db \"%ld\", 10, 0"));
    assert_eq!(count(&lines, "section .bss"), 0);

    Ok(())
}

#[test]
fn if_chain_shares_one_exit_label() -> anyhow::Result<()> {
    let flag = || Expr::name("flag");
    let chain = IfStmt::new(flag(), vec![Expr::print(Expr::int(1)).into()])
        .else_if(flag(), vec![Expr::print(Expr::int(2)).into()])
        .else_if(flag(), vec![Expr::print(Expr::int(3)).into()])
        .otherwise(vec![Expr::print(Expr::int(4)).into()]);

    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("flag", Type::boolean(), Some(Expr::boolean(true))),
        chain.into(),
        Stmt::ret(Expr::int(0)),
    ])]);

    let mut session = Session::default();
    let lines = assemble(&mut program, &mut session)?;

    // .L0 es la salida de main, la cadena usa .L1 a .L4
    assert_eq!(session.labels().issued(), 5);
    for label in [".L1:", ".L2:", ".L3:", ".L4:"] {
        assert_eq!(count(&lines, label), 1, "{} defined more than once", label);
    }

    assert_eq!(count(&lines, "jmp .L1"), 4);
    assert!(contains_sequence(&lines, &["movsx rbx, byte [rbp - 1]", "cmp rbx, 1", "jne .L2"]));
    assert!(contains_sequence(&lines, &["jmp .L1", ".L4:"]));

    Ok(())
}

#[test]
fn comparisons_default_to_false() -> anyhow::Result<()> {
    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("b", Type::boolean(), Some(Expr::binary(BinOp::Less, Expr::int(1), Expr::int(2)))),
        Stmt::ret(Expr::int(0)),
    ])]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &[
            "mov rbx, 1",
            "mov r10, 2",
            "cmp rbx, r10",
            "mov rbx, 0",
            "jge .L1",
            "mov rbx, 1",
            ".L1:",
            "mov byte [rbp - 1], bl",
        ]
    ));

    Ok(())
}

#[test]
fn while_tests_at_the_top() -> anyhow::Result<()> {
    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("i", Type::integer(), Some(Expr::int(0))),
        Stmt::while_loop(
            Expr::binary(BinOp::Less, Expr::name("i"), Expr::int(3)),
            vec![Expr::assign("i", Expr::add(Expr::name("i"), Expr::int(1))).into()],
        ),
        Stmt::ret(Expr::int(0)),
    ])]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &[
            ".L1:",
            "mov rbx, qword [rbp - 8]",
            "mov r10, 3",
            "cmp rbx, r10",
            "mov rbx, 0",
            "jge .L3",
            "mov rbx, 1",
            ".L3:",
            "cmp rbx, 1",
            "jne .L2",
        ]
    ));

    assert!(contains_sequence(
        &lines,
        &["add rbx, r10", "mov qword [rbp - 8], rbx", "jmp .L1", ".L2:"]
    ));

    Ok(())
}

#[test]
fn for_step_runs_after_the_body() -> anyhow::Result<()> {
    let mut program = Program::new(vec![main_with(vec![
        Stmt::for_loop(
            Some(Decl::local("i", Type::integer(), Some(Expr::int(0)))),
            Expr::binary(BinOp::Less, Expr::name("i"), Expr::int(3)),
            Some(Expr::assign("i", Expr::add(Expr::name("i"), Expr::int(1)))),
            vec![Expr::print(Expr::name("i")).into()],
        ),
        Stmt::ret(Expr::int(0)),
    ])]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(&lines, &["mov rbx, 0", "mov qword [rbp - 8], rbx", ".L1:"]));
    assert!(contains_sequence(
        &lines,
        &[
            "call print",
            "mov rbx, rax",
            "mov rbx, qword [rbp - 8]",
            "mov r10, 1",
            "add rbx, r10",
            "mov qword [rbp - 8], rbx",
            "jmp .L1",
            ".L2:",
        ]
    ));

    Ok(())
}

#[test]
fn arguments_are_pushed_right_to_left() -> anyhow::Result<()> {
    let add = FunctionDecl::new(
        "add",
        vec![Param::new("a", Type::integer()), Param::new("b", Type::integer())],
        Some(Type::integer()),
        vec![Stmt::ret(Expr::add(Expr::name("a"), Expr::name("b")))],
    );

    let mut program = Program::new(vec![
        add.into(),
        main_with(vec![
            Expr::print(Expr::call("add", vec![Expr::int(1), Expr::int(2)])).into(),
            Stmt::ret(Expr::int(0)),
        ]),
    ]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &[
            "function_add:",
            "push rbp",
            "mov rbp, rsp",
            "mov rbx, qword [rbp + 16]",
            "mov r10, qword [rbp + 24]",
            "add rbx, r10",
            "mov rax, rbx",
            "jmp .L0",
            ".L0:",
            "pop rbp",
            "ret",
        ]
    ));

    assert!(contains_sequence(
        &lines,
        &[
            "mov rbx, 2",
            "push rbx",
            "mov rbx, 1",
            "push rbx",
            "call function_add",
            "add rsp, 16",
            "mov rbx, rax",
            "mov rdi, rbx",
            "call print",
        ]
    ));

    assert_eq!(count(&lines, "push qword 0"), 0);
    Ok(())
}

#[test]
fn odd_argument_counts_are_padded() -> anyhow::Result<()> {
    let mut program = Program::new(vec![
        identity(),
        main_with(vec![Expr::call("f", vec![Expr::int(7)]).into(), Stmt::ret(Expr::int(0))]),
    ]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &["push qword 0", "mov rbx, 7", "push rbx", "call function_f", "add rsp, 16", "mov rbx, rax"]
    ));

    Ok(())
}

#[test]
fn live_registers_survive_calls() -> anyhow::Result<()> {
    let mut program = Program::new(vec![
        identity(),
        main_with(vec![
            Stmt::local(
                "x",
                Type::integer(),
                Some(Expr::add(Expr::int(1), Expr::call("f", vec![Expr::int(2)]))),
            ),
            Stmt::ret(Expr::int(0)),
        ]),
    ]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &[
            "mov rbx, 1",
            "push rbx",
            "mov rbx, 2",
            "push rbx",
            "call function_f",
            "add rsp, 8",
            "pop rbx",
            "mov r10, rax",
            "add rbx, r10",
        ]
    ));

    Ok(())
}

#[test]
fn division_goes_through_rax() -> anyhow::Result<()> {
    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("q", Type::integer(), Some(Expr::div(Expr::int(7), Expr::int(2)))),
        Stmt::ret(Expr::int(0)),
    ])]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &["mov rbx, 7", "mov r10, 2", "mov rax, rbx", "cqo", "idiv r10", "mov rbx, rax"]
    ));

    Ok(())
}

#[test]
fn narrow_elements_use_subregisters() -> anyhow::Result<()> {
    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("v", Type::primitive(Primitive::Int16).array(&[3]), None),
        Expr::assign_element("v", 2, Expr::int(5)).into(),
        Expr::print(Expr::element("v", 1)).into(),
        Stmt::ret(Expr::int(0)),
    ])]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(&lines, &["mov rbx, 5", "mov word [rbp - 2], bx"]));
    assert!(contains_sequence(&lines, &["movsx rbx, word [rbp - 4]", "mov rdi, rbx"]));

    Ok(())
}

#[test]
fn globals_live_in_bss_and_start_in_main() -> anyhow::Result<()> {
    let mut program = Program::new(vec![
        Decl::global("count", Type::primitive(Primitive::Int32), Some(Expr::int(10))),
        main_with(vec![Expr::print(Expr::name("count")).into(), Stmt::ret(Expr::int(0))]),
    ]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &[
            "mov rbp, rsp",
            "mov rbx, 10",
            "mov dword [global_count], ebx",
            "movsxd rbx, dword [global_count]",
            "mov rdi, rbx",
        ]
    ));

    assert!(contains_sequence(&lines, &["section .bss", "global_count: resb 4", "section .data"]));
    Ok(())
}

#[test]
fn global_labels_never_shadow_runtime_names() -> anyhow::Result<()> {
    let mut program = Program::new(vec![
        Decl::global("print", Type::integer(), Some(Expr::int(1))),
        Decl::global("rbx", Type::integer(), Some(Expr::int(2))),
        main_with(vec![Expr::print(Expr::name("rbx")).into(), Stmt::ret(Expr::int(0))]),
    ]);

    let lines = assemble_default(&mut program)?;
    assert_eq!(count(&lines, "print:"), 1);
    assert!(contains_sequence(&lines, &["mov rbx, 2", "mov qword [global_rbx], rbx"]));
    assert!(contains_sequence(&lines, &["mov rbx, qword [global_rbx]", "mov rdi, rbx"]));
    assert!(contains_sequence(
        &lines,
        &["section .bss", "global_print: resb 8", "global_rbx: resb 8", "section .data"]
    ));

    Ok(())
}

#[test]
fn top_level_locals_are_initialized_in_main() -> anyhow::Result<()> {
    let mut program = Program::new(vec![
        Decl::local("g", Type::integer(), Some(Expr::int(42))),
        main_with(vec![Expr::print(Expr::name("g")).into(), Stmt::ret(Expr::int(0))]),
    ]);

    let lines = assemble_default(&mut program)?;
    assert!(contains_sequence(
        &lines,
        &[
            "mov rbp, rsp",
            "mov rbx, 42",
            "mov qword [global_g], rbx",
            "mov rbx, qword [global_g]",
            "mov rdi, rbx",
        ]
    ));

    assert!(contains_sequence(&lines, &["section .bss", "global_g: resb 8"]));
    Ok(())
}

#[test]
fn if_chain_without_else_falls_to_the_end() -> anyhow::Result<()> {
    let flag = || Expr::name("flag");
    let chain = IfStmt::new(flag(), vec![Expr::print(Expr::int(1)).into()])
        .else_if(flag(), vec![Expr::print(Expr::int(2)).into()]);

    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("flag", Type::boolean(), Some(Expr::boolean(true))),
        chain.into(),
        Stmt::ret(Expr::int(0)),
    ])]);

    let mut session = Session::default();
    let lines = assemble(&mut program, &mut session)?;

    // .L0 es la salida de main, .L1 el final de la cadena y .L2 la segunda rama
    assert_eq!(session.labels().issued(), 3);
    assert_eq!(count(&lines, ".L1:"), 1);
    assert_eq!(count(&lines, ".L2:"), 1);
    assert_eq!(count(&lines, "jmp .L1"), 2);

    assert!(contains_sequence(&lines, &["cmp rbx, 1", "jne .L2"]));
    assert!(contains_sequence(
        &lines,
        &[".L2:", "movsx rbx, byte [rbp - 1]", "cmp rbx, 1", "jne .L1"]
    ));
    assert!(contains_sequence(&lines, &["jmp .L1", ".L1:"]));

    Ok(())
}

#[test]
fn void_results_still_reach_print() -> anyhow::Result<()> {
    let noop = FunctionDecl::new("noop", vec![], Some(Type::void()), vec![Stmt::Return(None)]);
    let mut program = Program::new(vec![
        noop.into(),
        main_with(vec![
            Expr::print(Expr::call("noop", vec![])).into(),
            Stmt::ret(Expr::int(0)),
        ]),
    ]);

    let mut session = Session::default();
    let lines = assemble(&mut program, &mut session)?;

    assert!(contains_sequence(&lines, &["call function_noop", "mov rbx, rax", "mov rdi, rbx", "call print"]));
    assert!(contains_sequence(&lines, &["function_noop:", "push rbp", "mov rbp, rsp", "xor eax, eax"]));
    assert!(session.registers().is_clear());

    Ok(())
}

#[test]
fn registers_stay_within_leaf_count() -> anyhow::Result<()> {
    // ((1 + 2) * (3 + 4)) - (5 / 6), seis hojas
    let value = Expr::sub(
        Expr::mul(
            Expr::add(Expr::int(1), Expr::int(2)),
            Expr::add(Expr::int(3), Expr::int(4)),
        ),
        Expr::div(Expr::int(5), Expr::int(6)),
    );

    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("x", Type::integer(), Some(value)),
        Stmt::ret(Expr::int(0)),
    ])]);

    let mut session = Session::default();
    assemble(&mut program, &mut session)?;

    assert!(session.registers().high_water() <= 6);
    assert!(session.registers().is_clear());

    Ok(())
}

#[test]
fn deep_right_nesting_exhausts_registers() {
    let value = (1..8).rev().fold(Expr::int(8), |right, leaf| Expr::add(Expr::int(leaf), right));
    let mut program = Program::new(vec![main_with(vec![
        Stmt::local("x", Type::integer(), Some(value)),
        Stmt::ret(Expr::int(0)),
    ])]);

    let mut output = Vec::new();
    let result = minicc::compile(&mut program, &mut Session::default(), &mut output);

    assert!(matches!(result, Err(CompileError::Codegen(CodegenError::OutOfRegisters))));
}

#[test]
fn sessions_compile_identically_twice() -> anyhow::Result<()> {
    let program = Program::new(vec![
        identity(),
        main_with(vec![
            Expr::print(Expr::call("f", vec![Expr::int(3)])).into(),
            Stmt::ret(Expr::int(0)),
        ]),
    ]);

    let mut session = Session::new(Options::KEEP_GOING);
    let first = assemble(&mut program.clone(), &mut session)?;
    let second = assemble(&mut program.clone(), &mut session)?;

    assert_eq!(first, second);
    Ok(())
}
