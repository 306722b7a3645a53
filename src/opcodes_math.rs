//! Arithmetic, bitwise and comparison opcodes
//!
//! All values are 16-bit. Arithmetic is signed two's complement and wraps
//! on overflow; division and remainder truncate toward zero, so the
//! remainder takes the dividend's sign.

use crate::error::{ZError, ZResult};
use crate::instruction::Instruction;
use crate::interpreter::{ExecutionResult, Interpreter};
use log::trace;

/// Signed division truncating toward zero
pub fn signed_div(a: u16, b: u16) -> ZResult<u16> {
    if b == 0 {
        return Err(ZError::DivisionByZero);
    }
    Ok((a as i16).wrapping_div(b as i16) as u16)
}

/// Signed remainder with the dividend's sign
pub fn signed_mod(a: u16, b: u16) -> ZResult<u16> {
    if b == 0 {
        return Err(ZError::DivisionByZero);
    }
    Ok((a as i16).wrapping_rem(b as i16) as u16)
}

/// Logical shift: left for positive places, right (zero fill) for negative
pub fn log_shift(value: u16, places: i16) -> u16 {
    match places {
        0..=15 => value << places,
        -15..=-1 => value >> -places,
        _ => 0,
    }
}

/// Arithmetic shift: right shifts copy the sign bit
pub fn art_shift(value: u16, places: i16) -> u16 {
    match places {
        0..=15 => value << places,
        p if p < 0 => ((value as i16) >> (-(p as i32)).min(15)) as u16,
        _ => 0,
    }
}

impl Interpreter {
    /// Handle mathematical, logical and comparison opcodes
    pub fn execute_math_op(
        &mut self,
        inst: &Instruction,
        operands: &[u16],
    ) -> ZResult<ExecutionResult> {
        let a = operands[0];
        let b = operands.get(1).copied().unwrap_or(0);
        let result = match inst.name() {
            "add" => (a as i16).wrapping_add(b as i16) as u16,
            "sub" => (a as i16).wrapping_sub(b as i16) as u16,
            "mul" => (a as i16).wrapping_mul(b as i16) as u16,
            "div" => signed_div(a, b)?,
            "mod" => signed_mod(a, b)?,
            "or" => a | b,
            "and" => a & b,
            "not" => !a,
            "log_shift" => log_shift(a, b as i16),
            "art_shift" => art_shift(a, b as i16),

            // Comparisons branch instead of storing
            "je" => {
                let equal = operands[1..].contains(&a);
                return self.branch(inst, equal);
            }
            "jl" => return self.branch(inst, (a as i16) < (b as i16)),
            "jg" => return self.branch(inst, (a as i16) > (b as i16)),
            "jz" => return self.branch(inst, a == 0),
            "test" => return self.branch(inst, a & b == b),
            _ => return Err(self.unknown_opcode(inst)),
        };
        trace!("{} {:04x} {:04x} = {:04x}", inst.name(), a, b, result);
        self.store(inst, result)?;
        Ok(ExecutionResult::Continue)
    }

    /// Check if an opcode is a math operation
    pub fn is_math_opcode(name: &str) -> bool {
        matches!(
            name,
            "add"
                | "sub"
                | "mul"
                | "div"
                | "mod"
                | "or"
                | "and"
                | "not"
                | "log_shift"
                | "art_shift"
                | "je"
                | "jl"
                | "jg"
                | "jz"
                | "test"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_division_truncates_toward_zero() {
        let n = |v: i16| v as u16;
        assert_eq!(signed_div(n(13), n(5)).unwrap(), n(2));
        assert_eq!(signed_div(n(13), n(-5)).unwrap(), n(-2));
        assert_eq!(signed_div(n(-13), n(5)).unwrap(), n(-2));
        assert_eq!(signed_div(n(-13), n(-5)).unwrap(), n(2));
        assert_eq!(signed_mod(n(13), n(5)).unwrap(), n(3));
        assert_eq!(signed_mod(n(13), n(-5)).unwrap(), n(3));
        assert_eq!(signed_mod(n(-13), n(5)).unwrap(), n(-3));
        assert_eq!(signed_mod(n(-13), n(-5)).unwrap(), n(-3));
        assert_eq!(signed_div(n(i16::MIN), n(-1)).unwrap(), n(i16::MIN));
        assert_eq!(signed_div(1, 0), Err(ZError::DivisionByZero));
        assert_eq!(signed_mod(1, 0), Err(ZError::DivisionByZero));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(log_shift(1, 3), 8);
        assert_eq!(log_shift(0x8000, -1), 0x4000);
        assert_eq!(log_shift(0xFFFF, -16), 0);
        assert_eq!(art_shift(0x8000, -1), 0xC000);
        assert_eq!(art_shift(0xFFF0, -20), 0xFFFF);
        assert_eq!(art_shift(0x0010, -2), 0x0004);
        assert_eq!(art_shift(1, 15), 0x8000);
    }
}
