#![allow(dead_code)]

use minicc::{
    ast::{Decl, FunctionDecl, Program, Stmt, Type},
    Options, Session,
};

/// `function main(): int { <body> }`
pub fn main_with(body: Vec<Stmt>) -> Decl {
    FunctionDecl::new("main", vec![], Some(Type::integer()), body).into()
}

/// Compila y retorna el ensamblador con espacios normalizados, una
/// instrucción por línea.
pub fn assemble(program: &mut Program, session: &mut Session) -> anyhow::Result<Vec<String>> {
    let mut output = Vec::new();
    minicc::compile(program, session, &mut output)?;

    Ok(normalize(&String::from_utf8(output)?))
}

pub fn assemble_default(program: &mut Program) -> anyhow::Result<Vec<String>> {
    assemble(program, &mut Session::new(Options::empty()))
}

pub fn normalize(asm: &str) -> Vec<String> {
    asm.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Verifica que `expected` aparezca como líneas consecutivas.
pub fn contains_sequence(lines: &[String], expected: &[&str]) -> bool {
    lines
        .windows(expected.len())
        .any(|window| window.iter().zip(expected).all(|(line, expected)| line == expected))
}

pub fn count(lines: &[String], expected: &str) -> usize {
    lines.iter().filter(|line| *line == expected).count()
}
