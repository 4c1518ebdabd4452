use std::{
    error::Error as StdError,
    fmt::{self, Display},
};
use thiserror::Error;

use crate::{codegen::CodegenError, semantic::SemanticError};

/// Acumulador de diagnósticos de una fase.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<SemanticError>,
}

impl Diagnostics {
    pub fn push(&mut self, error: SemanticError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<SemanticError> {
        self.errors
    }

    /// Concluye una fase: sin errores la fase tuvo éxito.
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<SemanticError> for Diagnostics {
    fn from(error: SemanticError) -> Self {
        Diagnostics { errors: vec![error] }
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        for error in &self.errors {
            writeln!(fmt, "error: {}", error)?;
        }

        Ok(())
    }
}

impl StdError for Diagnostics {}

/// Falla de una compilación completa.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Semantic analysis failed with {} error(s)", .0.len())]
    Semantic(Diagnostics),

    #[error("Code generation failed")]
    Codegen(#[from] CodegenError),
}
