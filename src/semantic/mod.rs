//! Análisis semántico.
//!
//! Consta de dos recorridos sobre el árbol. Primero, [`resolve()`] enlaza
//! cada identificador con su símbolo y asigna a cada símbolo su tamaño y
//! posición de almacenamiento. Luego, [`check()`] calcula el tipo de cada
//! expresión y valida las reglas del lenguaje sin modificar el árbol.
//!
//! Cada fase acumula sus errores en un [`Diagnostics`] propio. Si la
//! sesión no fue creada con [`Options::KEEP_GOING`], el primer error
//! detiene el recorrido de la fase.

use thiserror::Error;

use crate::{
    ast::{Program, Type},
    error::Diagnostics,
    session::{Options, Session},
};

mod resolve;
mod typeck;

pub use resolve::resolve;
pub use typeck::{check, type_equal};

pub type Semantic = Result<(), Diagnostics>;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SemanticError {
    #[error("'{0}' is not defined")]
    UndefinedIdentifier(String),

    #[error(transparent)]
    TypeMismatch(#[from] Mismatch),

    #[error("function '{0}' must specify a return type, use 'void' if it returns nothing")]
    MissingReturnType(String),

    #[error("redefinition of '{0}' in the same scope")]
    Redefinition(String),

    #[error("pointer types are not supported, found in declaration of '{0}'")]
    UnsupportedPointer(String),

    #[error("function '{0}' cannot be declared inside another function")]
    NestedFunction(String),

    #[error("'{0}' is a function, not a variable")]
    NotAVariable(String),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("storage for '{0}' exceeds the addressable frame")]
    StorageTooLarge(String),

    #[error("index {index} is out of bounds for '{name}' ({of})")]
    IndexOutOfBounds { name: String, index: u32, of: Type },
}

/// Incompatibilidad de tipos, con un mensaje por operación.
#[derive(Error, Debug)]
pub enum Mismatch {
    #[error("cannot add {left} ({left_type}) to {right} ({right_type})")]
    Add {
        left: String,
        left_type: Type,
        right: String,
        right_type: Type,
    },

    #[error("cannot subtract {right} ({right_type}) from {left} ({left_type})")]
    Subtract {
        left: String,
        left_type: Type,
        right: String,
        right_type: Type,
    },

    #[error("cannot multiply {left} ({left_type}) by {right} ({right_type})")]
    Multiply {
        left: String,
        left_type: Type,
        right: String,
        right_type: Type,
    },

    #[error("cannot divide {left} ({left_type}) by {right} ({right_type})")]
    Divide {
        left: String,
        left_type: Type,
        right: String,
        right_type: Type,
    },

    #[error("cannot compare {left} ({left_type}) with {right} ({right_type})")]
    Compare {
        left: String,
        left_type: Type,
        right: String,
        right_type: Type,
    },

    #[error("cannot assign {value} ({value_type}) to {target} ({target_type})")]
    Assign {
        value: String,
        value_type: Type,
        target: String,
        target_type: Type,
    },

    #[error("cannot pass {value} ({value_type}) as argument {position} of '{function}', expected {expected}")]
    Argument {
        function: String,
        position: usize,
        value: String,
        value_type: Type,
        expected: Type,
    },

    #[error("'{function}' expects {expected} argument(s), found {found}")]
    Arity {
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot return {value} ({value_type}) from '{function}', which returns {expected}")]
    Return {
        function: String,
        value: String,
        value_type: Type,
        expected: Type,
    },

    #[error("{construct} condition must be bool, found {value} ({value_type})")]
    Condition {
        construct: &'static str,
        value: String,
        value_type: Type,
    },
}

impl SemanticError {
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, SemanticError::TypeMismatch(_))
    }
}

/// Ejecuta resolución y verificación de tipos en orden.
///
/// La verificación de tipos solo corre si la resolución no reportó
/// errores, ya que depende de que todo identificador esté enlazado.
/// Todo estado previo de la sesión se descarta antes de empezar.
pub fn analyze(program: &mut Program, session: &mut Session) -> Semantic {
    session.reset();
    resolve(program, session)?;
    check(program, session)
}

/// Política común de corte para ambas fases.
fn halted(diagnostics: &Diagnostics, options: Options) -> bool {
    !diagnostics.is_empty() && !options.contains(Options::KEEP_GOING)
}
