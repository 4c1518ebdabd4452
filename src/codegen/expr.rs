use std::io::Write;

use super::{mangle, Codegen, Context};
use crate::{
    arch::{self, Reg, Width},
    ast::{BinOp, Expr, Identifier, PRINT},
};

impl<W: Write> Context<'_, W> {
    /// Evalúa una expresión. El resultado queda en un registro ocupado
    /// que pasa a ser responsabilidad del llamador.
    pub(super) fn expr(&mut self, expr: &Expr) -> Codegen<Reg> {
        match expr {
            Expr::Integer(value) => self.constant(*value),
            Expr::Bool(value) => self.constant(i64::from(*value)),
            Expr::Name(id) => self.load(id),

            Expr::Assign { target, value } => {
                let reg = self.expr(value)?;
                self.store(reg, target)?;

                Ok(reg)
            }

            Expr::Binary { op, left, right } if op.is_comparison() => self.compare(*op, left, right),
            Expr::Binary { op, left, right } => self.arithmetic(*op, left, right),

            Expr::Call { callee, args } if callee.name() == PRINT => self.print(args),
            Expr::Call { callee, args } => self.call(callee, args),
        }
    }

    fn constant(&mut self, value: i64) -> Codegen<Reg> {
        let reg = self.session.registers_mut().alloc()?;
        emit!(self, "mov", "{}, {}", reg, value)?;

        Ok(reg)
    }

    /// Lee una variable, extendiendo el signo hasta 64 bits.
    fn load(&mut self, id: &Identifier) -> Codegen<Reg> {
        let operand = self.operand(id)?;
        let reg = self.session.registers_mut().alloc()?;

        let opcode = match operand.width() {
            Width::Qword => "mov",
            Width::Dword => "movsxd",
            Width::Word | Width::Byte => "movsx",
        };

        emit!(self, opcode, "{}, {}", reg, operand)?;
        Ok(reg)
    }

    pub(super) fn store(&mut self, reg: Reg, target: &Identifier) -> Codegen {
        let operand = self.operand(target)?;
        emit!(self, "mov", "{}, {}", operand, reg.name(operand.width()))?;

        Ok(())
    }

    fn arithmetic(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Codegen<Reg> {
        let left = self.expr(left)?;
        let right = self.expr(right)?;

        match op {
            BinOp::Add => emit!(self, "add", "{}, {}", left, right)?,
            BinOp::Sub => emit!(self, "sub", "{}, {}", left, right)?,
            BinOp::Mul => emit!(self, "imul", "{}, {}", left, right)?,
            BinOp::Div => {
                emit!(self, "mov", "rax, {}", left)?;
                emit!(self, "cqo")?;
                emit!(self, "idiv", "{}", right)?;
                emit!(self, "mov", "{}, rax", left)?;
            }

            _ => unreachable!("comparison lowered as arithmetic"),
        }

        self.session.registers_mut().free(right);
        Ok(left)
    }

    /// Falso por defecto, verdadero si no se toma el salto negado.
    fn compare(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Codegen<Reg> {
        let left = self.expr(left)?;
        let right = self.expr(right)?;
        emit!(self, "cmp", "{}, {}", left, right)?;

        // Los operandos ya no se necesitan, el resultado puede reusar uno
        let registers = self.session.registers_mut();
        registers.free(right);
        registers.free(left);

        let result = registers.alloc()?;
        let skip = self.session.labels_mut().create();

        let negated = match op {
            BinOp::Equal => "jne",
            BinOp::NotEqual => "je",
            BinOp::Greater => "jle",
            BinOp::Less => "jge",
            BinOp::GreaterOrEqual => "jl",
            BinOp::LessOrEqual => "jg",
            _ => unreachable!("arithmetic lowered as comparison"),
        };

        // mov no altera las banderas
        emit!(self, "mov", "{}, 0", result)?;
        emit!(self, negated, "{}", skip)?;
        emit!(self, "mov", "{}, 1", result)?;
        label!(self, skip)?;

        Ok(result)
    }

    fn call(&mut self, callee: &Identifier, args: &[Expr]) -> Codegen<Reg> {
        let saved = self.save()?;
        let padded = self.pad(args.len())?;

        for arg in args.iter().rev() {
            let reg = self.expr(arg)?;
            self.push(reg)?;
            self.session.registers_mut().free(reg);
        }

        emit!(self, "call", "{}", mangle(callee.name()))?;
        self.drop_words(args.len() + usize::from(padded))?;

        self.restore(&saved)?;
        self.result()
    }

    /// La intrínseca recibe su único operando en `rdi`, sin pasar por el
    /// stack.
    fn print(&mut self, args: &[Expr]) -> Codegen<Reg> {
        let saved = self.save()?;
        let padded = self.pad(0)?;

        for arg in args {
            let reg = self.expr(arg)?;
            emit!(self, "mov", "rdi, {}", reg)?;
            self.session.registers_mut().free(reg);
        }

        emit!(self, "call", "{}", arch::PRINT_ROUTINE)?;
        self.drop_words(usize::from(padded))?;

        self.restore(&saved)?;
        self.result()
    }

    /// Preserva los registros vivos antes de una llamada. Mientras dura la
    /// llamada quedan libres para evaluar argumentos.
    fn save(&mut self) -> Codegen<Vec<Reg>> {
        let live = self.session.registers().live();
        for &reg in &live {
            self.push(reg)?;
            self.session.registers_mut().free(reg);
        }

        Ok(live)
    }

    fn restore(&mut self, saved: &[Reg]) -> Codegen {
        for &reg in saved.iter().rev() {
            self.pop(reg)?;
            self.session.registers_mut().claim(reg);
        }

        Ok(())
    }

    fn result(&mut self) -> Codegen<Reg> {
        let reg = self.session.registers_mut().alloc()?;
        emit!(self, "mov", "{}, {}", reg, arch::RETURN)?;

        Ok(reg)
    }
}
