//! Verificación de tipos.

use super::{halted, Mismatch, Semantic, SemanticError};
use crate::{
    ast::{
        BinOp, Decl, Else, Expr, FunctionDecl, Identifier, IfStmt, Primitive, Program, Stmt, Type, TypeKind,
        VarDecl, PRINT,
    },
    error::Diagnostics,
    session::Session,
};

/// Compatibilidad de tipos para asignaciones, argumentos y retornos.
///
/// Todos los tipos numéricos son compatibles entre sí sin importar su
/// ancho. Fuera de eso, dos primitivos deben ser el mismo y dos tipos
/// nombrados deben tener el mismo nombre.
pub fn type_equal(left: &Type, right: &Type) -> bool {
    if left.is_numeric() && right.is_numeric() {
        return true;
    }

    match (&left.kind, &right.kind) {
        (TypeKind::Primitive(left), TypeKind::Primitive(right)) => left == right,
        (TypeKind::Named(left), TypeKind::Named(right)) => left == right,
        _ => false,
    }
}

/// Calcula el tipo de cada expresión y valida las reglas del lenguaje.
///
/// Requiere que [`super::resolve()`] haya enlazado el árbol. No lo modifica.
pub fn check(program: &Program, session: &Session) -> Semantic {
    let mut checker = Checker {
        session,
        diagnostics: Diagnostics::default(),
        function: None,
    };

    for decl in &program.decls {
        checker.decl(decl);
    }

    checker.diagnostics.into_result()
}

struct Checker<'a> {
    session: &'a Session,
    diagnostics: Diagnostics,

    /// Nombre y tipo de retorno de la función actual.
    function: Option<(String, Type)>,
}

impl Checker<'_> {
    fn halted(&self) -> bool {
        halted(&self.diagnostics, self.session.options())
    }

    fn report<E: Into<SemanticError>>(&mut self, error: E) {
        if !self.halted() {
            self.diagnostics.push(error.into());
        }
    }

    fn decl(&mut self, decl: &Decl) {
        if self.halted() {
            return;
        }

        match decl {
            Decl::Function(function) => self.function(function),
            Decl::Global(var) | Decl::Local(var) => self.variable(var),
        }
    }

    fn function(&mut self, function: &FunctionDecl) {
        let name = function.name.to_string();
        let return_type = match &function.return_type {
            Some(return_type) => return_type.clone(),
            None => {
                self.report(SemanticError::MissingReturnType(name.clone()));
                Type::void()
            }
        };

        for param in &function.params {
            if let Some(default) = &param.default {
                self.initializer(&param.name, &param.of, default);
            }
        }

        let outer = self.function.replace((name, return_type));
        self.block(&function.body);
        self.function = outer;
    }

    fn variable(&mut self, var: &VarDecl) {
        if let Some(value) = &var.value {
            self.initializer(&var.name, &var.of, value);
        }
    }

    fn initializer(&mut self, name: &Identifier, of: &Type, value: &Expr) {
        let value_type = self.expr(value);
        if !type_equal(&of.element(), &value_type) {
            self.report(Mismatch::Assign {
                value: value.to_string(),
                value_type,
                target: name.to_string(),
                target_type: of.clone(),
            });
        }
    }

    fn block(&mut self, statements: &[Stmt]) {
        for statement in statements {
            self.stmt(statement);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        if self.halted() {
            return;
        }

        match stmt {
            Stmt::Expr(expr) => {
                self.expr(expr);
            }

            Stmt::Decl(decl) => self.decl(decl),
            Stmt::Return(value) => self.ret(value.as_ref()),
            Stmt::If(branch) => self.branch(branch, "if"),

            Stmt::While { condition, body } => {
                self.condition("while", condition);
                self.block(body);
            }

            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.decl(init);
                }

                self.condition("for", condition);
                if let Some(step) = step {
                    self.expr(step);
                }

                self.block(body);
            }
        }
    }

    fn ret(&mut self, value: Option<&Expr>) {
        let (value_type, rendered) = match value {
            Some(value) => (self.expr(value), value.to_string()),
            None => (Type::void(), String::from("nothing")),
        };

        let (function, expected) = match &self.function {
            Some((function, expected)) => (function.clone(), expected.clone()),
            None => return,
        };

        if !type_equal(&expected, &value_type) {
            self.report(Mismatch::Return {
                function,
                value: rendered,
                value_type,
                expected,
            });
        }
    }

    fn branch(&mut self, branch: &IfStmt, construct: &'static str) {
        self.condition(construct, &branch.condition);
        self.block(&branch.body);

        match branch.otherwise.as_deref() {
            Some(Else::If(next)) => self.branch(next, "elseif"),
            Some(Else::Block(body)) => self.block(body),
            None => (),
        }
    }

    fn condition(&mut self, construct: &'static str, condition: &Expr) {
        let value_type = self.expr(condition);
        if !value_type.is_primitive(Primitive::Bool) {
            self.report(Mismatch::Condition {
                construct,
                value: condition.to_string(),
                value_type,
            });
        }
    }

    fn expr(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::Integer(_) => Type::integer(),
            Expr::Bool(_) => Type::boolean(),
            Expr::Name(id) => self.variable_type(id),

            Expr::Binary { op, left, right } => self.binary(*op, left, right),

            Expr::Assign { target, value } => {
                let target_type = self.variable_type(target);
                let value_type = self.expr(value);

                if !type_equal(&target_type, &value_type) {
                    self.report(Mismatch::Assign {
                        value: value.to_string(),
                        value_type: value_type.clone(),
                        target: target.to_string(),
                        target_type,
                    });
                }

                value_type
            }

            Expr::Call { callee, args } => self.call(callee, args),
        }
    }

    fn binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Type {
        let left_type = self.expr(left);
        let right_type = self.expr(right);

        // Igualdad admite cualquier par compatible, el resto exige números
        let valid = if op.is_comparison() && !op.is_ordering() {
            type_equal(&left_type, &right_type)
        } else {
            left_type.is_numeric() && right_type.is_numeric()
        };

        if !valid {
            let (left, right) = (left.to_string(), right.to_string());
            let mismatch = match op {
                BinOp::Add => Mismatch::Add {
                    left,
                    left_type,
                    right,
                    right_type,
                },

                BinOp::Sub => Mismatch::Subtract {
                    left,
                    left_type,
                    right,
                    right_type,
                },

                BinOp::Mul => Mismatch::Multiply {
                    left,
                    left_type,
                    right,
                    right_type,
                },

                BinOp::Div => Mismatch::Divide {
                    left,
                    left_type,
                    right,
                    right_type,
                },

                _ => Mismatch::Compare {
                    left,
                    left_type,
                    right,
                    right_type,
                },
            };

            self.report(mismatch);
        }

        if op.is_comparison() {
            Type::boolean()
        } else {
            Type::integer()
        }
    }

    fn call(&mut self, callee: &Identifier, args: &[Expr]) -> Type {
        let arg_types: Vec<Type> = args.iter().map(|arg| self.expr(arg)).collect();

        if callee.name() == PRINT {
            if args.len() != 1 {
                self.report(Mismatch::Arity {
                    function: callee.to_string(),
                    expected: 1,
                    found: args.len(),
                });
            }

            return Type::void();
        }

        let session = self.session;
        let symbol = match callee.symbol {
            Some(id) => session.symbol(id),
            None => return Type::void(),
        };

        if !symbol.is_function() {
            self.report(SemanticError::NotAFunction(callee.to_string()));
            return Type::void();
        }

        if symbol.params.len() != args.len() {
            self.report(Mismatch::Arity {
                function: callee.to_string(),
                expected: symbol.params.len(),
                found: args.len(),
            });
        } else {
            let params = symbol.params.iter().map(|&param| session.symbol(param));
            for (position, ((arg, value_type), param)) in args.iter().zip(arg_types).zip(params).enumerate() {
                if !type_equal(&param.of, &value_type) {
                    self.report(Mismatch::Argument {
                        function: callee.to_string(),
                        position: position + 1,
                        value: arg.to_string(),
                        value_type,
                        expected: param.of.clone(),
                    });
                }
            }
        }

        symbol.of.clone()
    }

    /// Tipo de un nombre usado como valor. Un índice literal selecciona
    /// un único elemento, por lo que se descarta el modificador.
    fn variable_type(&mut self, id: &Identifier) -> Type {
        let session = self.session;
        let symbol = match id.symbol {
            Some(symbol) => session.symbol(symbol),
            None => return Type::void(),
        };

        if symbol.is_function() {
            self.report(SemanticError::NotAVariable(id.name.to_string()));
            return Type::void();
        }

        symbol.of.element()
    }
}
