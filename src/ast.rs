//! Árbol sintáctico abstracto.
//!
//! # Origen
//! El árbol llega ya construido desde un parser externo. Este módulo
//! solo describe sus nodos y ofrece constructores breves para armarlos
//! a mano, tanto desde el parser como desde pruebas. Los nodos no tienen
//! comportamiento propio más allá de consultas sobre tipos y tamaños.
//!
//! # Anotaciones
//! Las fases semánticas escriben sobre el árbol existente. La resolución
//! de nombres enlaza cada [`Identifier`] con un símbolo y anota en cada
//! [`FunctionDecl`] el tamaño acumulado de sus variables y parámetros.
//! Todo el árbol vive lo que dura una compilación.

use std::{
    fmt::{self, Display},
    rc::Rc,
};

use crate::session::SymbolId;

/// Nombre de la función que se emite como punto de entrada.
pub const ENTRY: &str = "main";

/// Nombre de la única intrínseca del lenguaje.
pub const PRINT: &str = "print";

/// Tipos primitivos.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
    Void,
    Int8,
    Int16,
    Int32,
    Int64,
    /// Entero genérico, sin ancho declarado.
    Integer,
    Bool,
    Char,
}

impl Primitive {
    /// Tamaño en bytes de un valor de este tipo.
    pub fn size(self) -> u32 {
        use Primitive::*;

        match self {
            Void => 0,
            Bool | Char | Int8 => 1,
            Int16 => 2,
            Int32 => 4,
            Int64 | Integer => 8,
        }
    }

    /// Indica si el tipo participa en aritmética.
    pub fn is_numeric(self) -> bool {
        use Primitive::*;
        matches!(self, Int8 | Int16 | Int32 | Int64 | Integer)
    }
}

impl Display for Primitive {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Primitive::*;

        let name = match self {
            Void => "void",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Integer => "int",
            Bool => "bool",
            Char => "char",
        };

        fmt.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(Primitive),
    Named(String),
}

/// Decoración de un tipo base.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Modifier {
    None,
    Pointer,
    /// Extensión de cada dimensión, de la más externa a la más interna.
    Array(Vec<u32>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
    pub modifier: Modifier,
}

impl Type {
    pub fn primitive(primitive: Primitive) -> Self {
        Type {
            kind: TypeKind::Primitive(primitive),
            modifier: Modifier::None,
        }
    }

    pub fn named(name: &str) -> Self {
        Type {
            kind: TypeKind::Named(name.into()),
            modifier: Modifier::None,
        }
    }

    pub fn void() -> Self {
        Type::primitive(Primitive::Void)
    }

    pub fn integer() -> Self {
        Type::primitive(Primitive::Integer)
    }

    pub fn boolean() -> Self {
        Type::primitive(Primitive::Bool)
    }

    /// Convierte el tipo en un arreglo con las extensiones dadas.
    pub fn array(self, extents: &[u32]) -> Self {
        Type {
            modifier: Modifier::Array(extents.to_vec()),
            ..self
        }
    }

    pub fn pointer(self) -> Self {
        Type {
            modifier: Modifier::Pointer,
            ..self
        }
    }

    /// Descarta el modificador.
    pub fn element(&self) -> Type {
        Type {
            kind: self.kind.clone(),
            modifier: Modifier::None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.kind, TypeKind::Primitive(primitive) if primitive.is_numeric())
    }

    pub fn is_primitive(&self, primitive: Primitive) -> bool {
        self.kind == TypeKind::Primitive(primitive)
    }

    pub fn is_pointer(&self) -> bool {
        self.modifier == Modifier::Pointer
    }

    /// Tamaño de un único elemento, ignorando el modificador.
    ///
    /// Los tipos nombrados se manejan como una palabra de máquina.
    pub fn element_size(&self) -> u32 {
        match &self.kind {
            TypeKind::Primitive(primitive) => primitive.size(),
            TypeKind::Named(_) => 8,
        }
    }

    /// Cantidad de elementos: el producto de las extensiones para
    /// arreglos, uno para todo lo demás. `None` si el producto desborda.
    pub fn elements(&self) -> Option<u32> {
        match &self.modifier {
            Modifier::Array(extents) => extents
                .iter()
                .try_fold(1u32, |total, &extent| total.checked_mul(extent)),

            _ => Some(1),
        }
    }

    /// Tamaño total de almacenamiento. `None` si no es representable.
    pub fn size(&self) -> Option<u32> {
        self.elements()?.checked_mul(self.element_size())
    }
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Primitive(primitive) => primitive.fmt(fmt)?,
            TypeKind::Named(name) => fmt.write_str(name)?,
        }

        match &self.modifier {
            Modifier::None => Ok(()),
            Modifier::Pointer => fmt.write_str("*"),
            Modifier::Array(extents) => extents
                .iter()
                .try_for_each(|extent| write!(fmt, "[{}]", extent)),
        }
    }
}

/// Una ocurrencia de un nombre.
#[derive(Clone, Debug)]
pub struct Identifier {
    pub name: Rc<str>,

    /// Índice literal de elemento, para acceso a arreglos.
    pub offset: u32,

    /// Símbolo enlazado. Es `None` hasta la resolución de nombres.
    pub symbol: Option<SymbolId>,
}

impl Identifier {
    pub fn new(name: &str) -> Self {
        Identifier::at(name, 0)
    }

    pub fn at(name: &str, offset: u32) -> Self {
        Identifier {
            name: name.into(),
            offset,
            symbol: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for Identifier {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.offset == 0 {
            fmt.write_str(&self.name)
        } else {
            write!(fmt, "{}[{}]", self.name, self.offset)
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Equal,
    NotEqual,
    Greater,
    Less,
    GreaterOrEqual,
    LessOrEqual,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        !matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    /// Comparaciones de orden, que solo aplican a números.
    pub fn is_ordering(self) -> bool {
        use BinOp::*;
        matches!(self, Greater | Less | GreaterOrEqual | LessOrEqual)
    }
}

impl Display for BinOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use BinOp::*;

        let symbol = match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Equal => "==",
            NotEqual => "!=",
            Greater => ">",
            Less => "<",
            GreaterOrEqual => ">=",
            LessOrEqual => "<=",
        };

        fmt.write_str(symbol)
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Integer(i64),
    Bool(bool),
    Name(Identifier),

    Assign {
        target: Identifier,
        value: Box<Expr>,
    },

    Call {
        callee: Identifier,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(left: Expr, right: Expr) -> Self {
        Expr::binary(BinOp::Add, left, right)
    }

    pub fn sub(left: Expr, right: Expr) -> Self {
        Expr::binary(BinOp::Sub, left, right)
    }

    pub fn mul(left: Expr, right: Expr) -> Self {
        Expr::binary(BinOp::Mul, left, right)
    }

    pub fn div(left: Expr, right: Expr) -> Self {
        Expr::binary(BinOp::Div, left, right)
    }

    pub fn int(value: i64) -> Self {
        Expr::Integer(value)
    }

    pub fn boolean(value: bool) -> Self {
        Expr::Bool(value)
    }

    pub fn name(name: &str) -> Self {
        Expr::Name(Identifier::new(name))
    }

    /// Lectura de un elemento de arreglo con índice literal.
    pub fn element(name: &str, offset: u32) -> Self {
        Expr::Name(Identifier::at(name, offset))
    }

    pub fn assign(target: &str, value: Expr) -> Self {
        Expr::Assign {
            target: Identifier::new(target),
            value: Box::new(value),
        }
    }

    /// Escritura de un elemento de arreglo con índice literal.
    pub fn assign_element(target: &str, offset: u32, value: Expr) -> Self {
        Expr::Assign {
            target: Identifier::at(target, offset),
            value: Box::new(value),
        }
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Self {
        Expr::Call {
            callee: Identifier::new(callee),
            args,
        }
    }

    pub fn print(value: Expr) -> Self {
        Expr::call(PRINT, vec![value])
    }
}

impl Display for Expr {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Binary { op, left, right } => write!(fmt, "({} {} {})", left, op, right),
            Expr::Integer(value) => write!(fmt, "{}", value),
            Expr::Bool(value) => write!(fmt, "{}", value),
            Expr::Name(id) => id.fmt(fmt),
            Expr::Assign { target, value } => write!(fmt, "{} = {}", target, value),
            Expr::Call { callee, args } => {
                write!(fmt, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        fmt.write_str(", ")?;
                    }

                    arg.fmt(fmt)?;
                }

                fmt.write_str(")")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Expr(Expr),
    Decl(Decl),
    Return(Option<Expr>),
    If(IfStmt),

    While {
        condition: Expr,
        body: Vec<Stmt>,
    },

    For {
        init: Option<Box<Decl>>,
        condition: Expr,
        step: Option<Expr>,
        body: Vec<Stmt>,
    },
}

impl Stmt {
    pub fn local(name: &str, of: Type, value: Option<Expr>) -> Self {
        Stmt::Decl(Decl::local(name, of, value))
    }

    pub fn ret(value: Expr) -> Self {
        Stmt::Return(Some(value))
    }

    pub fn while_loop(condition: Expr, body: Vec<Stmt>) -> Self {
        Stmt::While { condition, body }
    }

    pub fn for_loop(init: Option<Decl>, condition: Expr, step: Option<Expr>, body: Vec<Stmt>) -> Self {
        Stmt::For {
            init: init.map(Box::new),
            condition,
            step,
            body,
        }
    }
}

impl From<Expr> for Stmt {
    fn from(expr: Expr) -> Self {
        Stmt::Expr(expr)
    }
}

impl From<IfStmt> for Stmt {
    fn from(branch: IfStmt) -> Self {
        Stmt::If(branch)
    }
}

/// Un `if` con su cola opcional de `elseif`/`else`.
#[derive(Clone, Debug)]
pub struct IfStmt {
    pub condition: Expr,
    pub body: Vec<Stmt>,
    pub otherwise: Option<Box<Else>>,
}

#[derive(Clone, Debug)]
pub enum Else {
    If(IfStmt),
    Block(Vec<Stmt>),
}

impl IfStmt {
    pub fn new(condition: Expr, body: Vec<Stmt>) -> Self {
        IfStmt {
            condition,
            body,
            otherwise: None,
        }
    }

    /// Agrega un `elseif` al final de la cadena.
    pub fn else_if(mut self, condition: Expr, body: Vec<Stmt>) -> Self {
        self.push_tail(Else::If(IfStmt::new(condition, body)));
        self
    }

    /// Cierra la cadena con un `else`.
    pub fn otherwise(mut self, body: Vec<Stmt>) -> Self {
        self.push_tail(Else::Block(body));
        self
    }

    fn push_tail(&mut self, tail: Else) {
        if let Some(Else::If(next)) = self.otherwise.as_deref_mut() {
            return next.push_tail(tail);
        }

        self.otherwise = Some(Box::new(tail));
    }
}

#[derive(Clone, Debug)]
pub enum Decl {
    Function(FunctionDecl),
    Global(VarDecl),
    Local(VarDecl),
}

impl Decl {
    pub fn global(name: &str, of: Type, value: Option<Expr>) -> Self {
        Decl::Global(VarDecl::new(name, of, value))
    }

    pub fn local(name: &str, of: Type, value: Option<Expr>) -> Self {
        Decl::Local(VarDecl::new(name, of, value))
    }
}

impl From<FunctionDecl> for Decl {
    fn from(function: FunctionDecl) -> Self {
        Decl::Function(function)
    }
}

#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: Identifier,
    pub of: Type,
    pub value: Option<Expr>,
}

impl VarDecl {
    pub fn new(name: &str, of: Type, value: Option<Expr>) -> Self {
        VarDecl {
            name: Identifier::new(name),
            of,
            value,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: Identifier,
    pub of: Type,
    pub default: Option<Expr>,
}

impl Param {
    pub fn new(name: &str, of: Type) -> Self {
        Param {
            name: Identifier::new(name),
            of,
            default: None,
        }
    }

    pub fn with_default(self, default: Expr) -> Self {
        Param {
            default: Some(default),
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub name: Identifier,
    pub return_type: Option<Type>,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,

    /// Bytes acumulados de variables locales. Solo crece durante la resolución.
    pub variable_size: u32,

    /// Bytes de parámetros, a razón de 8 por parámetro.
    pub parameter_size: u32,

    pub return_size: u32,
}

impl FunctionDecl {
    pub fn new(name: &str, params: Vec<Param>, return_type: Option<Type>, body: Vec<Stmt>) -> Self {
        let return_size = return_type.as_ref().and_then(Type::size).unwrap_or(0);

        FunctionDecl {
            name: Identifier::new(name),
            return_type,
            params,
            body,
            variable_size: 0,
            parameter_size: 0,
            return_size,
        }
    }

    /// Bloque de stack reservado por el prólogo, alineado a 16 bytes.
    pub fn frame_size(&self) -> u32 {
        align16(self.variable_size)
    }
}

/// Un programa completo: una secuencia de declaraciones de nivel superior.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
}

impl Program {
    pub fn new(decls: Vec<Decl>) -> Self {
        Program { decls }
    }

    pub fn functions(&self) -> impl Iterator<Item = &FunctionDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Function(function) => Some(function),
            _ => None,
        })
    }
}

/// Límite de almacenamiento de un frame o de la sección de globales.
///
/// Mantiene todo desplazamiento dentro de un `disp32` con signo y deja
/// lugar para el redondeo a 16 bytes.
pub const STORAGE_LIMIT: u32 = i32::MAX as u32 & !15;

/// Redondea hacia arriba al siguiente múltiplo de 16.
///
/// Los tamaños que produce la resolución nunca superan
/// [`STORAGE_LIMIT`], así que el redondeo no satura.
pub fn align16(bytes: u32) -> u32 {
    bytes.saturating_add(15) & !15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_size_multiplies_every_extent() {
        let matrix = Type::primitive(Primitive::Int32).array(&[3, 4]);
        assert_eq!(matrix.element_size(), 4);
        assert_eq!(matrix.elements(), Some(12));
        assert_eq!(matrix.size(), Some(48));
        assert_eq!(matrix.to_string(), "int32[3][4]");
    }

    #[test]
    fn oversized_arrays_have_no_size() {
        let huge = Type::primitive(Primitive::Int64).array(&[1 << 30]);
        assert_eq!(huge.elements(), Some(1 << 30));
        assert_eq!(huge.size(), None);

        let nested = Type::primitive(Primitive::Bool).array(&[1 << 16, 1 << 16]);
        assert_eq!(nested.elements(), None);
        assert_eq!(Type::integer().elements(), Some(1));
    }

    #[test]
    fn frame_rounds_up_to_sixteen() {
        assert_eq!(align16(0), 0);
        assert_eq!(align16(1), 16);
        assert_eq!(align16(16), 16);
        assert_eq!(align16(17), 32);
    }

    #[test]
    fn else_if_chains_append_at_the_tail() {
        let chain = IfStmt::new(Expr::boolean(true), vec![])
            .else_if(Expr::boolean(false), vec![])
            .else_if(Expr::boolean(false), vec![])
            .otherwise(vec![]);

        let mut depth = 0;
        let mut node = &chain;
        loop {
            match node.otherwise.as_deref() {
                Some(Else::If(next)) => {
                    depth += 1;
                    node = next;
                }

                Some(Else::Block(_)) => break,
                None => panic!("chain lost its else block"),
            }
        }

        assert_eq!(depth, 2);
    }

    #[test]
    fn expressions_render_like_source() {
        let expr = Expr::assign("x", Expr::add(Expr::int(1), Expr::call("f", vec![Expr::element("a", 2)])));
        assert_eq!(expr.to_string(), "x = (1 + f(a[2]))");
    }
}
