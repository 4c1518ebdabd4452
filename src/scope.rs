//! Ámbitos léxicos y tablas de símbolos.
//!
//! Cada ámbito es una tabla hash de cubetas fijas con encadenamiento
//! separado. Los ámbitos se apilan: la búsqueda recorre del más interno
//! al más externo, lo cual implementa el ocultamiento ("shadowing") de
//! nombres.

use std::rc::Rc;

use crate::session::SymbolId;

/// Cantidad de cubetas por tabla.
const BUCKETS: usize = 256;

/// Multiplicador del hash polinomial.
const HASH_MULTIPLIER: u32 = 31;

fn hash(name: &str) -> usize {
    let hash = name.bytes().fold(0u32, |hash, byte| {
        hash.wrapping_mul(HASH_MULTIPLIER)
            .wrapping_add(u32::from(byte))
    });

    hash as usize % BUCKETS
}

struct Entry {
    name: Rc<str>,
    symbol: SymbolId,
}

/// Directorio de símbolos de un único ámbito.
pub struct SymbolTable {
    level: usize,
    buckets: Vec<Vec<Entry>>,
}

impl SymbolTable {
    fn new(level: usize) -> Self {
        SymbolTable {
            level,
            buckets: (0..BUCKETS).map(|_| Vec::new()).collect(),
        }
    }

    pub fn level(&self) -> usize {
        self.level
    }

    /// Agrega al final de la cadena de la cubeta. No reemplaza enlaces
    /// previos del mismo nombre, por lo que una búsqueda posterior sigue
    /// encontrando el primero.
    fn insert(&mut self, name: Rc<str>, symbol: SymbolId) {
        self.buckets[hash(&name)].push(Entry { name, symbol });
    }

    fn find(&self, name: &str) -> Option<SymbolId> {
        self.buckets[hash(name)]
            .iter()
            .find(|entry| &*entry.name == name)
            .map(|entry| entry.symbol)
    }
}

/// Pila de ámbitos activos.
#[derive(Default)]
pub struct ScopeStack {
    tables: Vec<SymbolTable>,
}

impl ScopeStack {
    /// Abre un ámbito anidado en el actual.
    pub fn enter(&mut self) {
        let level = self.tables.last().map(|top| top.level + 1).unwrap_or(0);
        self.tables.push(SymbolTable::new(level));
    }

    /// Cierra el ámbito actual. Sus símbolos dejan de ser alcanzables.
    pub fn exit(&mut self) {
        self.tables.pop();
    }

    /// Nivel del ámbito actual, `None` si la pila está vacía.
    pub fn level(&self) -> Option<usize> {
        self.tables.last().map(SymbolTable::level)
    }

    pub fn depth(&self) -> usize {
        self.tables.len()
    }

    /// Enlaza un nombre en el ámbito más interno.
    ///
    /// Sin ámbitos activos no hay dónde enlazar y la operación se ignora.
    pub fn bind(&mut self, name: Rc<str>, symbol: SymbolId) {
        if let Some(top) = self.tables.last_mut() {
            top.insert(name, symbol);
        }
    }

    /// Busca desde el ámbito más interno hacia afuera.
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.tables.iter().rev().find_map(|table| table.find(name))
    }

    /// Busca únicamente en el ámbito más interno.
    pub fn lookup_current(&self, name: &str) -> Option<SymbolId> {
        self.tables.last().and_then(|top| top.find(name))
    }
}
