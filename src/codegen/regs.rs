use bitflags::bitflags;

use super::CodegenError;
use crate::arch::Reg;

bitflags! {
    /// Mapa de ocupación, un bit por registro de [`Reg::FILE`].
    struct Slots: u8 {
        const RBX = 1 << 0;
        const R10 = 1 << 1;
        const R11 = 1 << 2;
        const R12 = 1 << 3;
        const R13 = 1 << 4;
        const R14 = 1 << 5;
        const R15 = 1 << 6;
    }
}

impl Default for Slots {
    fn default() -> Self {
        Slots::empty()
    }
}

fn slot(reg: Reg) -> Slots {
    Slots::from_bits_truncate(1 << reg.index())
}

/// Banco de registros de scratch.
///
/// No hay spilling: si una expresión necesita más valores vivos que
/// registros hay en el banco, la generación de código falla.
#[derive(Default)]
pub struct Scratch {
    used: Slots,
    high_water: usize,
}

impl Scratch {
    /// Toma el primer registro libre.
    pub fn alloc(&mut self) -> Result<Reg, CodegenError> {
        let reg = Reg::FILE
            .iter()
            .copied()
            .find(|reg| !self.used.contains(slot(*reg)))
            .ok_or(CodegenError::OutOfRegisters)?;

        self.claim(reg);
        Ok(reg)
    }

    /// Marca como ocupado un registro específico.
    pub fn claim(&mut self, reg: Reg) {
        self.used.insert(slot(reg));
        self.high_water = self.high_water.max(self.used.bits().count_ones() as usize);
    }

    pub fn free(&mut self, reg: Reg) {
        self.used.remove(slot(reg));
    }

    /// Registros ocupados, en orden del banco.
    pub fn live(&self) -> Vec<Reg> {
        Reg::FILE
            .iter()
            .copied()
            .filter(|reg| self.used.contains(slot(*reg)))
            .collect()
    }

    pub fn is_clear(&self) -> bool {
        self.used.is_empty()
    }

    /// Máximo de registros ocupados a la vez desde la creación.
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}
