//! Estado de una compilación.
//!
//! Todo el estado mutable que las fases comparten vive en una
//! [`Session`]: el arena de símbolos, la pila de ámbitos, el contador de
//! etiquetas y el banco de registros de scratch. Cada fase la recibe de
//! forma explícita, por lo que dos compilaciones nunca comparten estado.

use bitflags::bitflags;
use std::rc::Rc;

use crate::{
    ast::Type,
    codegen::{Labels, Scratch},
    scope::ScopeStack,
};

bitflags! {
    /// Opciones que alteran la política de las fases semánticas.
    pub struct Options: u32 {
        /// Continuar recorriendo después del primer error para reportar
        /// todos los que sea posible.
        ///
        /// Sin esta opción, el primer diagnóstico detiene la fase.
        const KEEP_GOING = 0x01;

        /// No rechazar dos declaraciones del mismo nombre en un mismo ámbito.
        const ALLOW_REDECLARATION = 0x02;
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::empty()
    }
}

/// Índice de un símbolo dentro del arena de la sesión.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SymbolId(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolKind {
    Local,
    Param,
    Global,
    Function,
}

/// Un enlace resuelto.
#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: Rc<str>,
    pub kind: SymbolKind,

    /// Tipo declarado, o tipo de retorno en el caso de funciones.
    pub of: Type,

    /// Tamaño total en bytes. Se calcula una vez y no cambia.
    pub size: u32,

    /// Para locales, distancia bajo el frame pointer. Para parámetros,
    /// desplazamiento en bytes dentro del área de argumentos.
    pub position: u32,

    /// Parámetros en orden de declaración, solo para funciones.
    pub params: Vec<SymbolId>,
}

impl Symbol {
    pub fn new(name: Rc<str>, kind: SymbolKind, of: Type, size: u32, position: u32) -> Self {
        Symbol {
            name,
            kind,
            of,
            size,
            position,
            params: Vec::new(),
        }
    }

    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }
}

#[derive(Default)]
pub struct Session {
    options: Options,
    symbols: Vec<Symbol>,
    scopes: ScopeStack,
    labels: Labels,
    registers: Scratch,
}

impl Session {
    pub fn new(options: Options) -> Self {
        Session {
            options,
            ..Default::default()
        }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    /// Reinicia todo el estado de compilación, conservando las opciones.
    pub fn reset(&mut self) {
        self.symbols.clear();
        self.scopes = ScopeStack::default();
        self.labels = Labels::default();
        self.registers = Scratch::default();
    }

    /// Registra un símbolo en el arena.
    pub fn declare(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    pub fn symbol(&self, SymbolId(id): SymbolId) -> &Symbol {
        &self.symbols[id as usize]
    }

    pub fn symbol_mut(&mut self, SymbolId(id): SymbolId) -> &mut Symbol {
        &mut self.symbols[id as usize]
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &Symbol)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(id, symbol)| (SymbolId(id as u32), symbol))
    }

    pub fn scopes(&self) -> &ScopeStack {
        &self.scopes
    }

    pub fn scopes_mut(&mut self) -> &mut ScopeStack {
        &mut self.scopes
    }

    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut Labels {
        &mut self.labels
    }

    pub fn registers(&self) -> &Scratch {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Scratch {
        &mut self.registers
    }
}
