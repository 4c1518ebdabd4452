//! Resolución de nombres y disposición de almacenamiento.

use super::{halted, Semantic, SemanticError};
use crate::{
    ast::{
        Decl, Else, Expr, FunctionDecl, Identifier, IfStmt, Param, Program, Stmt, Type, VarDecl, PRINT,
        STORAGE_LIMIT,
    },
    error::Diagnostics,
    session::{Options, Session, Symbol, SymbolId, SymbolKind},
};

/// Cada parámetro ocupa una palabra completa en el stack, sin importar su tipo.
const PARAM_SLOT: u32 = 8;

/// Enlaza identificadores con símbolos y asigna posiciones de almacenamiento.
///
/// Se abre un ámbito global al inicio y uno nuevo en cada frontera de
/// bloque: cuerpo de función, cada rama de `if`/`elseif`/`else`, cuerpos
/// de `while` y `for`, y el ámbito propio de la inicialización de un `for`.
pub fn resolve(program: &mut Program, session: &mut Session) -> Semantic {
    let mut resolver = Resolver {
        session,
        diagnostics: Diagnostics::default(),
        frame: None,
        globals_size: 0,
    };

    resolver.session.scopes_mut().enter();
    for decl in program.decls.iter_mut() {
        resolver.decl(decl);
    }

    resolver.session.scopes_mut().exit();
    resolver.diagnostics.into_result()
}

/// Contadores de la función que se está resolviendo.
#[derive(Default)]
struct Frame {
    variable_size: u32,
    parameter_size: u32,
}

struct Resolver<'a> {
    session: &'a mut Session,
    diagnostics: Diagnostics,
    frame: Option<Frame>,
    globals_size: u32,
}

impl Resolver<'_> {
    fn halted(&self) -> bool {
        halted(&self.diagnostics, self.session.options())
    }

    fn report(&mut self, error: SemanticError) {
        if !self.halted() {
            self.diagnostics.push(error);
        }
    }

    fn scoped<F: FnOnce(&mut Self)>(&mut self, callback: F) {
        self.session.scopes_mut().enter();
        callback(self);
        self.session.scopes_mut().exit();
    }

    fn decl(&mut self, decl: &mut Decl) {
        if self.halted() {
            return;
        }

        match decl {
            Decl::Function(function) => self.function(function),
            Decl::Global(var) | Decl::Local(var) => self.variable(var),
        }
    }

    fn function(&mut self, function: &mut FunctionDecl) {
        let name = function.name.name.clone();
        if self.frame.is_some() {
            return self.report(SemanticError::NestedFunction(name.to_string()));
        }

        let return_type = function.return_type.clone().unwrap_or_else(Type::void);
        let symbol = Symbol::new(name, SymbolKind::Function, return_type, 0, 0);

        // Se enlaza antes del cuerpo para permitir recursión
        let id = self.bind(&mut function.name, symbol);

        self.frame = Some(Frame::default());
        self.session.scopes_mut().enter();

        let mut params = Vec::with_capacity(function.params.len());
        for param in function.params.iter_mut() {
            if let Some(param) = self.param(param) {
                params.push(param);
            }
        }

        self.block(&mut function.body);
        self.session.scopes_mut().exit();

        let frame = self.frame.take().unwrap_or_default();
        function.variable_size = frame.variable_size;
        function.parameter_size = frame.parameter_size;

        if let Some(id) = id {
            self.session.symbol_mut(id).params = params;
        }
    }

    fn param(&mut self, param: &mut Param) -> Option<SymbolId> {
        if self.halted() {
            return None;
        } else if param.of.is_pointer() {
            self.report(SemanticError::UnsupportedPointer(param.name.to_string()));
            return None;
        }

        let position = self.frame.get_or_insert_with(Frame::default).parameter_size;
        let end = position.checked_add(PARAM_SLOT).filter(|&end| end <= STORAGE_LIMIT);

        let size = match (param.of.size(), end) {
            (Some(size), Some(end)) => {
                if let Some(frame) = &mut self.frame {
                    frame.parameter_size = end;
                }

                size
            }

            _ => {
                self.report(SemanticError::StorageTooLarge(param.name.to_string()));
                0
            }
        };

        let symbol = Symbol::new(param.name.name.clone(), SymbolKind::Param, param.of.clone(), size, position);

        if let Some(default) = &mut param.default {
            self.expr(default);
        }

        self.bind(&mut param.name, symbol)
    }

    fn variable(&mut self, var: &mut VarDecl) {
        if var.of.is_pointer() {
            return self.report(SemanticError::UnsupportedPointer(var.name.to_string()));
        }

        let kind = match self.session.scopes().level() {
            Some(level) if level > 0 => SymbolKind::Local,
            _ => SymbolKind::Global,
        };

        // Para arreglos esto ya incluye el producto de las extensiones
        let current = *self.storage();
        let end = var
            .of
            .size()
            .and_then(|size| Some((size, current.checked_add(size)?)));

        // Un símbolo sin almacenamiento igual se enlaza, para no reportar
        // cada uso posterior como indefinido
        let (size, position) = match end {
            Some((size, position)) if position <= STORAGE_LIMIT => {
                *self.storage() = position;
                (size, position)
            }

            _ => {
                self.report(SemanticError::StorageTooLarge(var.name.to_string()));
                (0, current)
            }
        };

        let symbol = Symbol::new(var.name.name.clone(), kind, var.of.clone(), size, position);

        // El inicializador no ve a la variable que declara
        if let Some(value) = &mut var.value {
            self.expr(value);
        }

        self.bind(&mut var.name, symbol);
    }

    /// Contador de almacenamiento del ámbito actual: el frame de la
    /// función o la sección de globales.
    fn storage(&mut self) -> &mut u32 {
        match &mut self.frame {
            Some(frame) => &mut frame.variable_size,
            None => &mut self.globals_size,
        }
    }

    fn bind(&mut self, name: &mut Identifier, symbol: Symbol) -> Option<SymbolId> {
        let allow_redeclaration = self.session.options().contains(Options::ALLOW_REDECLARATION);
        if !allow_redeclaration && self.session.scopes().lookup_current(name.name()).is_some() {
            self.report(SemanticError::Redefinition(name.to_string()));
            return None;
        }

        let id = self.session.declare(symbol);
        self.session.scopes_mut().bind(name.name.clone(), id);
        name.symbol = Some(id);

        Some(id)
    }

    fn block(&mut self, statements: &mut [Stmt]) {
        for statement in statements {
            self.stmt(statement);
        }
    }

    fn stmt(&mut self, stmt: &mut Stmt) {
        if self.halted() {
            return;
        }

        match stmt {
            Stmt::Expr(expr) => self.expr(expr),
            Stmt::Decl(decl) => self.decl(decl),
            Stmt::Return(value) => {
                if let Some(value) = value {
                    self.expr(value);
                }
            }

            Stmt::If(branch) => self.branch(branch),

            Stmt::While { condition, body } => self.scoped(|this| {
                this.expr(condition);
                this.block(body);
            }),

            Stmt::For {
                init,
                condition,
                step,
                body,
            } => self.scoped(|this| {
                if let Some(init) = init {
                    this.decl(init);
                }

                this.expr(condition);
                if let Some(step) = step {
                    this.expr(step);
                }

                this.scoped(|this| this.block(body));
            }),
        }
    }

    fn branch(&mut self, branch: &mut IfStmt) {
        let IfStmt {
            condition,
            body,
            otherwise,
        } = branch;

        self.scoped(|this| {
            this.expr(condition);
            this.block(body);
        });

        match otherwise.as_deref_mut() {
            Some(Else::If(next)) => self.branch(next),
            Some(Else::Block(body)) => self.scoped(|this| this.block(body)),
            None => (),
        }
    }

    fn expr(&mut self, expr: &mut Expr) {
        if self.halted() {
            return;
        }

        match expr {
            Expr::Binary { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }

            Expr::Integer(_) | Expr::Bool(_) => (),
            Expr::Name(id) => self.identifier(id),

            Expr::Assign { target, value } => {
                self.identifier(target);
                self.expr(value);
            }

            Expr::Call { callee, args } => {
                if callee.name() != PRINT {
                    self.identifier(callee);
                }

                for arg in args.iter_mut() {
                    self.expr(arg);
                }
            }
        }
    }

    fn identifier(&mut self, id: &mut Identifier) {
        let symbol = match self.session.scopes().lookup(id.name()) {
            Some(symbol) => symbol,
            None => return self.report(SemanticError::UndefinedIdentifier(id.name.to_string())),
        };

        id.symbol = Some(symbol);

        // Las funciones usadas como valor las rechaza la verificación de tipos
        let symbol = self.session.symbol(symbol);
        if symbol.is_function() {
            return;
        }

        // Un índice literal debe caer dentro del arreglo, y un escalar
        // solo admite el índice cero
        let outside = matches!(symbol.of.elements(), Some(elements) if id.offset >= elements);
        if outside {
            let error = SemanticError::IndexOutOfBounds {
                name: id.name.to_string(),
                index: id.offset,
                of: symbol.of.clone(),
            };

            self.report(error);
        }
    }
}
