//! Generación de código.
//!
//! Traduce un programa ya resuelto y verificado a una única unidad de
//! ensamblador. El recorrido es directo sobre el árbol, sin forma
//! intermedia: cada expresión deja su resultado en un registro de
//! scratch recién tomado y libera los de sus subexpresiones.
//!
//! # Convención de llamadas
//! El llamador empuja los argumentos de derecha a izquierda, precedidos
//! de una palabra de relleno si hace falta para que el stack quede
//! alineado a 16 bytes en la instrucción `call`. El argumento `i` queda
//! en `[rbp + 16 + 8 * i]` dentro del llamado, y el llamador retira los
//! argumentos después de la llamada. El valor de retorno viaja en `rax`.
//! Los registros de scratch vivos se preservan en el stack alrededor de
//! cada llamada.

use std::{
    fmt::{self, Display},
    io::{self, Write},
};

use thiserror::Error;

use crate::{
    arch::{self, Operand, Reg, Width},
    ast::{Decl, FunctionDecl, Identifier, Program, ENTRY},
    session::{Session, Symbol, SymbolKind},
};

mod expr;
mod regs;
mod stmt;

pub use regs::Scratch;

pub type Codegen<T = ()> = Result<T, CodegenError>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum CodegenError {
    #[error("out of registers")]
    OutOfRegisters,

    #[error("'{0}' reached code generation without a resolved symbol")]
    Unresolved(String),

    #[error("'{0}' has no storage")]
    NotAddressable(String),

    #[error("element {1} of '{0}' lies outside its storage")]
    OutOfBounds(String, u32),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Destino de salto.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Label(pub u32);

impl Display for Label {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, ".L{}", self.0)
    }
}

/// Emisor de etiquetas. Nunca repite ni recicla un número.
#[derive(Default)]
pub struct Labels {
    next: u32,
}

impl Labels {
    pub fn create(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;

        label
    }

    /// Cantidad de etiquetas emitidas hasta ahora.
    pub fn issued(&self) -> u32 {
        self.next
    }
}

/// Estado de emisión.
pub struct Context<'a, W> {
    pub output: &'a mut W,
    session: &'a mut Session,

    /// Etiqueta de salida de la función actual.
    exit: Option<Label>,

    /// Palabras empujadas al stack desde el prólogo.
    depth: usize,
}

/// Emite el programa completo.
///
/// El programa debe haber pasado por [`crate::semantic::analyze()`] con
/// la misma sesión.
pub fn emit<W: Write>(program: &Program, session: &mut Session, output: &mut W) -> Codegen {
    let mut context = Context {
        output,
        session,
        exit: None,
        depth: 0,
    };

    arch::prelude(&mut context)?;
    for function in program.functions() {
        context.function(program, function)?;
    }

    let globals: Vec<_> = context
        .session
        .symbols()
        .filter(|(_, symbol)| symbol.kind == SymbolKind::Global)
        .map(|(_, symbol)| (mangle_global(&symbol.name), symbol.size))
        .collect();

    arch::reserve(&mut context, &globals)?;
    arch::data(&mut context)?;

    Ok(())
}

impl<W: Write> Context<'_, W> {
    fn function(&mut self, program: &Program, function: &FunctionDecl) -> Codegen {
        let entry = function.name.name() == ENTRY;
        let frame = function.frame_size();

        writeln!(self.output)?;
        label!(self, mangle(function.name.name()))?;

        // Prólogo, crea un stack frame
        emit!(self, "push", "rbp")?;
        emit!(self, "mov", "rbp, rsp")?;
        if frame > 0 {
            emit!(self, "sub", "rsp, {}", frame)?;
        }

        let exit = self.session.labels_mut().create();
        self.exit = Some(exit);
        self.depth = 0;

        // Los inicializadores de nivel superior corren antes que el cuerpo
        // de main, sin importar cómo se declaró la variable
        if entry {
            for decl in &program.decls {
                if let Decl::Global(var) | Decl::Local(var) = decl {
                    self.initialize(&var.name, var.value.as_ref())?;
                }
            }
        }

        self.block(&function.body)?;

        if entry {
            emit!(self, "xor", "eax, eax")?;
        }

        // Epílogo, revierte al estado justo antes de la llamada
        label!(self, exit)?;
        if frame > 0 {
            emit!(self, "add", "rsp, {}", frame)?;
        }

        emit!(self, "pop", "rbp")?;
        if entry {
            // exit() vacía los buffers de printf antes de terminar el proceso
            emit!(self, "mov", "rdi, {}", arch::RETURN)?;
            emit!(self, "and", "rsp, -16")?;
            emit!(self, "call", "exit wrt ..plt")?;
        } else {
            emit!(self, "ret")?;
        }

        self.exit = None;
        Ok(())
    }

    fn symbol(&self, id: &Identifier) -> Codegen<&Symbol> {
        match id.symbol {
            Some(symbol) => Ok(self.session.symbol(symbol)),
            None => Err(CodegenError::Unresolved(id.to_string())),
        }
    }

    fn operand(&self, id: &Identifier) -> Codegen<Operand> {
        locate(self.symbol(id)?, id.offset)
    }

    fn push(&mut self, reg: Reg) -> Codegen {
        emit!(self, "push", "{}", reg)?;
        self.depth += 1;

        Ok(())
    }

    fn pop(&mut self, reg: Reg) -> Codegen {
        emit!(self, "pop", "{}", reg)?;
        self.depth -= 1;

        Ok(())
    }

    /// Empuja una palabra de relleno si `pending` palabras más dejarían
    /// el stack desalineado. Retorna si hubo relleno.
    fn pad(&mut self, pending: usize) -> Codegen<bool> {
        let padded = (self.depth + pending) % 2 != 0;
        if padded {
            emit!(self, "push", "qword 0")?;
            self.depth += 1;
        }

        Ok(padded)
    }

    /// Retira `words` palabras del stack.
    fn drop_words(&mut self, words: usize) -> Codegen {
        if words > 0 {
            emit!(self, "add", "rsp, {}", words * arch::VALUE_SIZE as usize)?;
            self.depth -= words;
        }

        Ok(())
    }
}

/// Ubicación de un símbolo, con el sesgo de un índice literal.
fn locate(symbol: &Symbol, offset: u32) -> Codegen<Operand> {
    let element = symbol.of.element_size();
    let width = Width::of(element);

    let bias = match offset.checked_mul(element) {
        Some(bias) if bias == 0 || bias < symbol.size => bias,
        _ => return Err(CodegenError::OutOfBounds(symbol.name.to_string(), offset)),
    };

    let position = i64::from(symbol.position);

    let operand = match symbol.kind {
        SymbolKind::Global => Operand::Global {
            name: mangle_global(&symbol.name).into(),
            offset: bias,
            width,
        },

        SymbolKind::Local => Operand::Frame {
            offset: i64::from(bias) - position,
            width,
        },

        // Por encima de la dirección de retorno y del rbp anterior
        SymbolKind::Param => Operand::Frame {
            offset: 16 + position + i64::from(bias),
            width,
        },

        SymbolKind::Function => return Err(CodegenError::NotAddressable(symbol.name.to_string())),
    };

    Ok(operand)
}

/// Nombre de la rutina de una función de usuario.
///
/// El punto de entrada conserva su nombre. El resto lleva un prefijo
/// para no chocar con la rutina de runtime ni con libc.
pub fn mangle(name: &str) -> String {
    if name == ENTRY {
        String::from(name)
    } else {
        format!("function_{}", name)
    }
}

/// Etiqueta del almacenamiento de una variable global.
///
/// El prefijo evita choques con la rutina de runtime, con los símbolos
/// de libc y con los nombres de registros.
pub fn mangle_global(name: &str) -> String {
    format!("global_{}", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Type;

    #[test]
    fn locals_sit_below_the_frame_pointer() {
        let symbol = Symbol::new("x".into(), SymbolKind::Local, Type::integer(), 8, 8);
        assert_eq!(locate(&symbol, 0).unwrap().to_string(), "qword [rbp - 8]");
    }

    #[test]
    fn array_elements_are_biased_by_element_size() {
        let of = Type::primitive(crate::ast::Primitive::Int32).array(&[4]);
        let symbol = Symbol::new("v".into(), SymbolKind::Local, of, 16, 24);
        assert_eq!(locate(&symbol, 3).unwrap().to_string(), "dword [rbp - 12]");

        let global = Symbol::new("g".into(), SymbolKind::Global, symbol.of.clone(), 16, 16);
        assert_eq!(locate(&global, 2).unwrap().to_string(), "dword [global_g + 8]");
    }

    #[test]
    fn offsets_past_the_storage_are_rejected() {
        let of = Type::integer().array(&[2]);
        let symbol = Symbol::new("a".into(), SymbolKind::Local, of, 16, 16);
        assert_eq!(locate(&symbol, 1).unwrap().to_string(), "qword [rbp - 8]");
        assert!(matches!(locate(&symbol, 2), Err(CodegenError::OutOfBounds(_, 2))));
        assert!(matches!(locate(&symbol, u32::MAX), Err(CodegenError::OutOfBounds(..))));
    }

    #[test]
    fn globals_are_prefixed() {
        let symbol = Symbol::new("rbx".into(), SymbolKind::Global, Type::integer(), 8, 8);
        assert_eq!(locate(&symbol, 0).unwrap().to_string(), "qword [global_rbx]");
        assert_eq!(mangle_global("print"), "global_print");
    }

    #[test]
    fn params_sit_above_the_return_address() {
        let symbol = Symbol::new("b".into(), SymbolKind::Param, Type::integer(), 8, 8);
        assert_eq!(locate(&symbol, 0).unwrap().to_string(), "qword [rbp + 24]");
    }

    #[test]
    fn only_the_entry_point_keeps_its_name() {
        assert_eq!(mangle("main"), "main");
        assert_eq!(mangle("print"), "function_print");
    }

    #[test]
    fn labels_are_never_reused() {
        let mut labels = Labels::default();
        let first = labels.create();
        let second = labels.create();

        assert_ne!(first, second);
        assert_eq!(second.to_string(), ".L1");
        assert_eq!(labels.issued(), 2);
    }
}
