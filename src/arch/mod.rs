//! Detalles específicos de la arquitectura objetivo.
//!
//! La generación de código trabaja sobre registros lógicos y operandos
//! estructurados. Este módulo es el único que sabe cómo se escriben en
//! texto ensamblador. Solo existe un objetivo, x86-64 en sintaxis NASM.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

mod x86_64;

pub use x86_64::{data, prelude, reserve, Reg, PRINT_ROUTINE, RETURN, VALUE_SIZE};

/// Ancho de un acceso a memoria.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    Dword,
    Qword,
}

impl Width {
    /// Ancho correspondiente a un tamaño en bytes.
    ///
    /// Cualquier tamaño que no sea 1, 2 o 4 se trata como una palabra
    /// completa.
    pub fn of(size: u32) -> Self {
        match size {
            1 => Width::Byte,
            2 => Width::Word,
            4 => Width::Dword,
            _ => Width::Qword,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Width::Byte => "byte",
            Width::Word => "word",
            Width::Dword => "dword",
            Width::Qword => "qword",
        }
    }
}

/// Ubicación en memoria de un símbolo.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    /// Almacenamiento estático, direccionado por etiqueta.
    Global {
        name: Rc<str>,
        offset: u32,
        width: Width,
    },

    /// Desplazamiento relativo al frame pointer. Negativo para locales,
    /// positivo para parámetros.
    Frame { offset: i64, width: Width },
}

impl Operand {
    pub fn width(&self) -> Width {
        match self {
            Operand::Global { width, .. } | Operand::Frame { width, .. } => *width,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keyword = self.width().keyword();

        match self {
            Operand::Global { name, offset: 0, .. } => write!(fmt, "{} [{}]", keyword, name),
            Operand::Global { name, offset, .. } => write!(fmt, "{} [{} + {}]", keyword, name, offset),

            Operand::Frame { offset, .. } if *offset < 0 => {
                write!(fmt, "{} [rbp - {}]", keyword, -offset)
            }

            Operand::Frame { offset, .. } => write!(fmt, "{} [rbp + {}]", keyword, offset),
        }
    }
}
