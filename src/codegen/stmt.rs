use std::io::Write;

use super::{Codegen, Context, Label};
use crate::ast::{Decl, Else, Expr, Identifier, IfStmt, Stmt};

impl<W: Write> Context<'_, W> {
    pub(super) fn block(&mut self, statements: &[Stmt]) -> Codegen {
        for statement in statements {
            self.stmt(statement)?;
            debug_assert!(self.session.registers().is_clear(), "register leaked by statement");
        }

        Ok(())
    }

    fn stmt(&mut self, stmt: &Stmt) -> Codegen {
        match stmt {
            Stmt::Expr(expr) => {
                let reg = self.expr(expr)?;
                self.session.registers_mut().free(reg);
            }

            Stmt::Decl(decl) => self.decl(decl)?,

            Stmt::Return(value) => {
                match value {
                    Some(value) => {
                        let reg = self.expr(value)?;
                        emit!(self, "mov", "rax, {}", reg)?;
                        self.session.registers_mut().free(reg);
                    }

                    None => emit!(self, "xor", "eax, eax")?,
                }

                if let Some(exit) = self.exit {
                    emit!(self, "jmp", "{}", exit)?;
                }
            }

            Stmt::If(branch) => {
                let end = self.session.labels_mut().create();
                self.branch(branch, end)?;
                label!(self, end)?;
            }

            Stmt::While { condition, body } => self.repeat(condition, None, body)?,

            Stmt::For {
                init,
                condition,
                step,
                body,
            } => {
                if let Some(init) = init {
                    self.decl(init)?;
                }

                self.repeat(condition, step.as_ref(), body)?;
            }
        }

        Ok(())
    }

    fn decl(&mut self, decl: &Decl) -> Codegen {
        match decl {
            Decl::Global(var) | Decl::Local(var) => self.initialize(&var.name, var.value.as_ref()),

            // Rechazadas por la resolución de nombres
            Decl::Function(_) => Ok(()),
        }
    }

    /// Escribe el valor inicial de una variable, si lo tiene.
    pub(super) fn initialize(&mut self, name: &Identifier, value: Option<&Expr>) -> Codegen {
        if let Some(value) = value {
            let reg = self.expr(value)?;
            self.store(reg, name)?;
            self.session.registers_mut().free(reg);
        }

        Ok(())
    }

    /// Una rama de una cadena `if`/`elseif`/`else` que converge en `end`.
    fn branch(&mut self, branch: &IfStmt, end: Label) -> Codegen {
        let next = match &branch.otherwise {
            Some(_) => self.session.labels_mut().create(),
            None => end,
        };

        self.test(&branch.condition, next)?;
        self.block(&branch.body)?;
        emit!(self, "jmp", "{}", end)?;

        if let Some(otherwise) = branch.otherwise.as_deref() {
            label!(self, next)?;

            match otherwise {
                Else::If(next) => self.branch(next, end)?,
                Else::Block(body) => {
                    self.block(body)?;
                    emit!(self, "jmp", "{}", end)?;
                }
            }
        }

        Ok(())
    }

    /// Ciclo con prueba al inicio, compartido por `while` y `for`.
    fn repeat(&mut self, condition: &Expr, step: Option<&Expr>, body: &[Stmt]) -> Codegen {
        let top = self.session.labels_mut().create();
        let bottom = self.session.labels_mut().create();

        label!(self, top)?;
        self.test(condition, bottom)?;
        self.block(body)?;

        if let Some(step) = step {
            let reg = self.expr(step)?;
            self.session.registers_mut().free(reg);
        }

        emit!(self, "jmp", "{}", top)?;
        label!(self, bottom)?;

        Ok(())
    }

    /// Salta a `otherwise` si la condición no es verdadera.
    fn test(&mut self, condition: &Expr, otherwise: Label) -> Codegen {
        let reg = self.expr(condition)?;
        emit!(self, "cmp", "{}, 1", reg)?;
        emit!(self, "jne", "{}", otherwise)?;
        self.session.registers_mut().free(reg);

        Ok(())
    }
}
