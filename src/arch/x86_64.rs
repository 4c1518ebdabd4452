use std::{
    fmt,
    io::{self, Write},
};

use super::Width;
use crate::codegen::Context;

// Esta es una arquitectura de 64 bits
pub const VALUE_SIZE: u32 = 8;

/// Registro donde toda función deja su valor de retorno.
pub const RETURN: &str = "rax";

/// Rutina de runtime que imprime un entero seguido de un salto de línea.
pub const PRINT_ROUTINE: &str = "print";

/// Etiqueta del único literal de la sección de datos.
pub const FORMAT: &str = "num_fmt";

/// Registros de scratch.
///
/// Ninguno de ellos participa en el paso de argumentos de la ABI de
/// System V ni en `idiv`, así que `rax`, `rdx` y `rdi` quedan libres para
/// retorno, división y la llamada a `print`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    Rbx,
    R10,
    R11,
    R12,
    R13,
    R14,
    R15,
}

impl Reg {
    pub const FILE: [Reg; 7] = [Reg::Rbx, Reg::R10, Reg::R11, Reg::R12, Reg::R13, Reg::R14, Reg::R15];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Nombre del subregistro con el ancho dado.
    pub fn name(self, width: Width) -> &'static str {
        use Reg::*;
        use Width::*;

        match (self, width) {
            (Rbx, Byte) => "bl",
            (Rbx, Word) => "bx",
            (Rbx, Dword) => "ebx",
            (Rbx, Qword) => "rbx",

            (R10, Byte) => "r10b",
            (R10, Word) => "r10w",
            (R10, Dword) => "r10d",
            (R10, Qword) => "r10",

            (R11, Byte) => "r11b",
            (R11, Word) => "r11w",
            (R11, Dword) => "r11d",
            (R11, Qword) => "r11",

            (R12, Byte) => "r12b",
            (R12, Word) => "r12w",
            (R12, Dword) => "r12d",
            (R12, Qword) => "r12",

            (R13, Byte) => "r13b",
            (R13, Word) => "r13w",
            (R13, Dword) => "r13d",
            (R13, Qword) => "r13",

            (R14, Byte) => "r14b",
            (R14, Word) => "r14w",
            (R14, Dword) => "r14d",
            (R14, Qword) => "r14",

            (R15, Byte) => "r15b",
            (R15, Word) => "r15w",
            (R15, Dword) => "r15d",
            (R15, Qword) => "r15",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name(Width::Qword))
    }
}

/// Encabezado de la unidad y rutina de impresión.
pub fn prelude<W: Write>(context: &mut Context<'_, W>) -> io::Result<()> {
    writeln!(context.output, "section .text")?;
    writeln!(context.output, "default rel")?;
    writeln!(context.output, "extern printf")?;
    writeln!(context.output, "extern exit")?;
    writeln!(context.output, "global main")?;
    writeln!(context.output)?;

    // El operando llega en rdi y printf lo espera en rsi
    label!(context, PRINT_ROUTINE)?;
    emit!(context, "push", "rbp")?;
    emit!(context, "mov", "rbp, rsp")?;
    emit!(context, "mov", "rsi, rdi")?;
    emit!(context, "lea", "rdi, [{}]", FORMAT)?;
    emit!(context, "xor", "eax, eax")?;
    emit!(context, "call", "printf wrt ..plt")?;
    emit!(context, "pop", "rbp")?;
    emit!(context, "ret")
}

/// Almacenamiento estático para variables globales.
pub fn reserve<W: Write>(context: &mut Context<'_, W>, globals: &[(String, u32)]) -> io::Result<()> {
    if globals.is_empty() {
        return Ok(());
    }

    writeln!(context.output)?;
    writeln!(context.output, "section .bss")?;

    for (name, size) in globals {
        // Un global de tamaño cero igual necesita una dirección propia
        writeln!(context.output, "{}: resb {}", name, (*size).max(1))?;
    }

    Ok(())
}

/// Sección de datos con el formato de `printf`.
pub fn data<W: Write>(context: &mut Context<'_, W>) -> io::Result<()> {
    writeln!(context.output)?;
    writeln!(context.output, "section .data")?;
    writeln!(context.output, "{}: db \"%ld\", 10, 0", FORMAT)
}
