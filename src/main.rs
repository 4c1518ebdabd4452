//! Punto de entrada ("driver").
//!
//! Este módulo orquesta las diferentes fases del proceso de
//! compilación y expone una CLI. Mientras no exista un parser, el
//! programa a compilar se escoge entre unos cuantos incorporados.

use anyhow::{self, bail, Context};
use clap::{self, crate_version, Arg, Command};
use minicc::{
    ast::{BinOp, Decl, Expr, FunctionDecl, IfStmt, Param, Primitive, Program, Stmt, Type},
    CompileError, Options, Session,
};

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    process,
};

const PROGRAMS: [&str; 3] = ["sum", "fibonacci", "classify"];

fn main() -> anyhow::Result<()> {
    // Parsing de CLI
    let args = Command::new("minicc")
        .version(crate_version!())
        .about("Compiles a built-in program to x86-64 NASM assembly")
        .arg(
            Arg::new("output")
                .short('o')
                .takes_value(true)
                .value_name("FILE")
                .default_value("-")
                .help("Output file ('-' for stdout)"),
        )
        .arg(
            Arg::new("keep-going")
                .short('k')
                .long("keep-going")
                .help("Report every semantic error instead of stopping at the first one"),
        )
        .arg(
            Arg::new("allow-redeclaration")
                .long("allow-redeclaration")
                .help("Accept two declarations of the same name in one scope"),
        )
        .arg(
            Arg::new("program")
                .long("program")
                .takes_value(true)
                .value_name("NAME")
                .default_value(PROGRAMS[0])
                .possible_values(PROGRAMS)
                .help("Built-in program to compile"),
        )
        .get_matches();

    let mut options = Options::empty();
    if args.is_present("keep-going") {
        options |= Options::KEEP_GOING;
    }

    if args.is_present("allow-redeclaration") {
        options |= Options::ALLOW_REDECLARATION;
    }

    let name = args.value_of("program").unwrap_or(PROGRAMS[0]);
    let mut program = builtin(name).with_context(|| format!("Unknown program: {}", name))?;
    let mut session = Session::new(options);

    let result = match args.value_of("output").unwrap_or("-") {
        "-" => {
            let stdout = io::stdout();
            let mut output = BufWriter::new(stdout.lock());

            let result = minicc::compile(&mut program, &mut session, &mut output);
            output.flush().context("Failed to write to stdout")?;

            result
        }

        path => {
            let file = File::create(path).with_context(|| format!("Failed to open for writing: {}", path))?;
            let mut output = BufWriter::new(file);

            let result = minicc::compile(&mut program, &mut session, &mut output);
            output
                .flush()
                .with_context(|| format!("Failed to write to file: {}", path))?;

            result
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(CompileError::Semantic(diagnostics)) => {
            let error_or_errors = if diagnostics.len() == 1 { "error" } else { "errors" };

            eprint!("{}", diagnostics);
            eprintln!("Build failed with {} {}", diagnostics.len(), error_or_errors);
            process::exit(1);
        }

        Err(CompileError::Codegen(error)) => bail!("Failed to generate code: {}", error),
    }
}

fn builtin(name: &str) -> Option<Program> {
    // Estos programas reemplazan al parser, que no forma parte de este crate

    let int = Type::integer;
    let program = match name {
        // function main(): int { x: int = 2 + 3; print(x); return 0; }
        "sum" => Program::new(vec![FunctionDecl::new(
            "main",
            vec![],
            Some(int()),
            vec![
                Stmt::local("x", int(), Some(Expr::add(Expr::int(2), Expr::int(3)))),
                Expr::print(Expr::name("x")).into(),
                Stmt::ret(Expr::int(0)),
            ],
        )
        .into()]),

        "fibonacci" => {
            let fibonacci = FunctionDecl::new(
                "fibonacci",
                vec![Param::new("n", int())],
                Some(int()),
                vec![
                    IfStmt::new(
                        Expr::binary(BinOp::Less, Expr::name("n"), Expr::int(2)),
                        vec![Stmt::ret(Expr::name("n"))],
                    )
                    .into(),
                    Stmt::ret(Expr::add(
                        Expr::call("fibonacci", vec![Expr::sub(Expr::name("n"), Expr::int(1))]),
                        Expr::call("fibonacci", vec![Expr::sub(Expr::name("n"), Expr::int(2))]),
                    )),
                ],
            );

            let main = FunctionDecl::new(
                "main",
                vec![],
                Some(int()),
                vec![
                    Stmt::for_loop(
                        Some(Decl::local("i", int(), Some(Expr::int(0)))),
                        Expr::binary(BinOp::Less, Expr::name("i"), Expr::name("count")),
                        Some(Expr::assign("i", Expr::add(Expr::name("i"), Expr::int(1)))),
                        vec![Expr::print(Expr::call("fibonacci", vec![Expr::name("i")])).into()],
                    ),
                    Stmt::ret(Expr::int(0)),
                ],
            );

            Program::new(vec![
                Decl::global("count", Type::primitive(Primitive::Int32), Some(Expr::int(10))),
                fibonacci.into(),
                main.into(),
            ])
        }

        "classify" => {
            use BinOp::{Equal, Greater, Less};

            let classify = FunctionDecl::new(
                "classify",
                vec![Param::new("value", int())],
                Some(int()),
                vec![
                    IfStmt::new(
                        Expr::binary(Less, Expr::name("value"), Expr::int(0)),
                        vec![Stmt::ret(Expr::int(-1))],
                    )
                    .else_if(
                        Expr::binary(Equal, Expr::name("value"), Expr::int(0)),
                        vec![Stmt::ret(Expr::int(0))],
                    )
                    .else_if(
                        Expr::binary(Greater, Expr::name("value"), Expr::int(100)),
                        vec![Stmt::ret(Expr::int(2))],
                    )
                    .otherwise(vec![Stmt::ret(Expr::int(1))])
                    .into(),
                    Stmt::ret(Expr::int(1)),
                ],
            );

            let samples = Type::primitive(Primitive::Int16).array(&[3]);
            let main = FunctionDecl::new(
                "main",
                vec![],
                Some(int()),
                vec![
                    Stmt::local("samples", samples, None),
                    Expr::assign_element("samples", 0, Expr::int(-7)).into(),
                    Expr::assign_element("samples", 1, Expr::int(0)).into(),
                    Expr::assign_element("samples", 2, Expr::int(512)).into(),
                    Expr::print(Expr::call("classify", vec![Expr::element("samples", 0)])).into(),
                    Expr::print(Expr::call("classify", vec![Expr::element("samples", 1)])).into(),
                    Expr::print(Expr::call("classify", vec![Expr::element("samples", 2)])).into(),
                    Stmt::ret(Expr::int(0)),
                ],
            );

            Program::new(vec![classify.into(), main.into()])
        }

        _ => return None,
    };

    Some(program)
}
