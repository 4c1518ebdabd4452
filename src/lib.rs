//! Compilador de un lenguaje imperativo pequeño, desde el AST hasta
//! ensamblador.
//!
//! # Front end
//! El programa llega como un árbol sintáctico ya construido, descrito en
//! [`ast`]. Este crate no lee código fuente. El árbol se somete a
//! análisis semántico en [`semantic`]: primero resolución de nombres,
//! que enlaza cada identificador con un símbolo dentro de los ámbitos de
//! [`scope`] y asigna almacenamiento, y luego verificación de tipos.
//! Los errores de ambas fases se acumulan en [`error::Diagnostics`].
//!
//! # Back end
//! En esta sección el compilador deja de ser agnóstico al sistema
//! objetivo. La generación de código recorre el árbol directamente y
//! emite ensamblador x86-64 para NASM, con asignación de registros de
//! scratch, disposición de stack frames y la convención de llamadas
//! propia del lenguaje. Los detalles relevantes se reexportan en
//! [`target`]. Ensamblar y enlazar el resultado queda a cargo de
//! herramientas externas.
//!
//! Todo el estado mutable de una compilación vive en una
//! [`session::Session`], así que compilaciones distintas son
//! independientes.

#[macro_use]
mod macros;

pub mod ast;
pub mod error;
pub mod scope;
pub mod semantic;
pub mod session;

mod arch;
mod codegen;

use std::io::Write;

pub use error::{CompileError, Diagnostics};
pub use session::{Options, Session};

/// Emisión de código.
///
/// Este módulo reexporta suficientes ítems internos relacionados a
/// generación de código para inspeccionar sus resultados.
pub mod target {
    pub use crate::arch::{Operand, Reg, Width};
    pub use crate::codegen::{emit, mangle, mangle_global, CodegenError, Label, Labels, Scratch};
}

/// Análisis semántico completo sobre una sesión reiniciada.
pub fn analyze(program: &mut ast::Program, session: &mut Session) -> Result<(), Diagnostics> {
    semantic::analyze(program, session)
}

/// Compila un programa completo hacia `output`.
///
/// La generación de código nunca corre si el análisis semántico
/// reportó errores.
pub fn compile<W: Write>(
    program: &mut ast::Program,
    session: &mut Session,
    output: &mut W,
) -> Result<(), CompileError> {
    analyze(program, session).map_err(CompileError::Semantic)?;
    codegen::emit(program, session, output)?;

    Ok(())
}
