//! Opcode descriptor table for the NMOS 6502.
//!
//! One descriptor per documented opcode; the other 105 slots stay empty and
//! decode as [`crate::cpu_6502::CpuError::InvalidOpcode`]. Control-flow
//! instructions are tagged `controls_pc` and write the final program
//! counter themselves; there is no post-increment compensation anywhere.

use std::sync::OnceLock;

use crate::cpu_6502::{Cpu6502, Operand, IRQ_VECTOR};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Accumulator,
    Immediate,
    Implied,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Indirect,
    /// `(zp,X)`
    IndexedIndirect,
    /// `(zp),Y`
    IndirectIndexed,
}

pub type Action = fn(&mut Cpu6502, AddressingMode);

/// Immutable description of one opcode.
pub struct Opcode {
    pub mnemonic: &'static str,
    pub mode: AddressingMode,
    /// Base cycle cost; page-crossing and taken-branch penalties are added
    /// by the stepper.
    pub cycles: u32,
    /// Instruction length in bytes.
    pub bytes: u8,
    /// The action writes the final PC itself; the stepper must not advance.
    pub controls_pc: bool,
    /// A page-boundary crossing during operand resolution costs +1 cycle.
    pub page_penalty: bool,
    pub action: Action,
}

impl std::fmt::Debug for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Opcode")
            .field("mnemonic", &self.mnemonic)
            .field("mode", &self.mode)
            .field("cycles", &self.cycles)
            .field("bytes", &self.bytes)
            .finish()
    }
}

fn op(mnemonic: &'static str, mode: AddressingMode, cycles: u32, bytes: u8, action: Action) -> Opcode {
    Opcode {
        mnemonic,
        mode,
        cycles,
        bytes,
        controls_pc: false,
        page_penalty: false,
        action,
    }
}

/// Read-class indexed opcode: pays +1 on a page crossing.
fn op_px(
    mnemonic: &'static str,
    mode: AddressingMode,
    cycles: u32,
    bytes: u8,
    action: Action,
) -> Opcode {
    Opcode {
        page_penalty: true,
        ..op(mnemonic, mode, cycles, bytes, action)
    }
}

/// Control-flow opcode: owns the final PC.
fn op_pc(
    mnemonic: &'static str,
    mode: AddressingMode,
    cycles: u32,
    bytes: u8,
    action: Action,
) -> Opcode {
    Opcode {
        controls_pc: true,
        ..op(mnemonic, mode, cycles, bytes, action)
    }
}

/// The 256-slot decode table, built once on first use.
pub fn opcode_table() -> &'static [Option<Opcode>; 256] {
    static TABLE: OnceLock<[Option<Opcode>; 256]> = OnceLock::new();
    TABLE.get_or_init(build_table)
}

fn build_table() -> [Option<Opcode>; 256] {
    use AddressingMode::*;

    const EMPTY: Option<Opcode> = None;
    let mut t = [EMPTY; 256];

    // Loads
    t[0xA9] = Some(op("LDA", Immediate, 2, 2, lda));
    t[0xA5] = Some(op("LDA", ZeroPage, 3, 2, lda));
    t[0xB5] = Some(op("LDA", ZeroPageX, 4, 2, lda));
    t[0xAD] = Some(op("LDA", Absolute, 4, 3, lda));
    t[0xBD] = Some(op_px("LDA", AbsoluteX, 4, 3, lda));
    t[0xB9] = Some(op_px("LDA", AbsoluteY, 4, 3, lda));
    t[0xA1] = Some(op("LDA", IndexedIndirect, 6, 2, lda));
    t[0xB1] = Some(op_px("LDA", IndirectIndexed, 5, 2, lda));

    t[0xA2] = Some(op("LDX", Immediate, 2, 2, ldx));
    t[0xA6] = Some(op("LDX", ZeroPage, 3, 2, ldx));
    t[0xB6] = Some(op("LDX", ZeroPageY, 4, 2, ldx));
    t[0xAE] = Some(op("LDX", Absolute, 4, 3, ldx));
    t[0xBE] = Some(op_px("LDX", AbsoluteY, 4, 3, ldx));

    t[0xA0] = Some(op("LDY", Immediate, 2, 2, ldy));
    t[0xA4] = Some(op("LDY", ZeroPage, 3, 2, ldy));
    t[0xB4] = Some(op("LDY", ZeroPageX, 4, 2, ldy));
    t[0xAC] = Some(op("LDY", Absolute, 4, 3, ldy));
    t[0xBC] = Some(op_px("LDY", AbsoluteX, 4, 3, ldy));

    // Stores
    t[0x85] = Some(op("STA", ZeroPage, 3, 2, sta));
    t[0x95] = Some(op("STA", ZeroPageX, 4, 2, sta));
    t[0x8D] = Some(op("STA", Absolute, 4, 3, sta));
    t[0x9D] = Some(op("STA", AbsoluteX, 5, 3, sta));
    t[0x99] = Some(op("STA", AbsoluteY, 5, 3, sta));
    t[0x81] = Some(op("STA", IndexedIndirect, 6, 2, sta));
    t[0x91] = Some(op("STA", IndirectIndexed, 6, 2, sta));

    t[0x86] = Some(op("STX", ZeroPage, 3, 2, stx));
    t[0x96] = Some(op("STX", ZeroPageY, 4, 2, stx));
    t[0x8E] = Some(op("STX", Absolute, 4, 3, stx));

    t[0x84] = Some(op("STY", ZeroPage, 3, 2, sty));
    t[0x94] = Some(op("STY", ZeroPageX, 4, 2, sty));
    t[0x8C] = Some(op("STY", Absolute, 4, 3, sty));

    // Register transfers
    t[0xAA] = Some(op("TAX", Implied, 2, 1, tax));
    t[0xA8] = Some(op("TAY", Implied, 2, 1, tay));
    t[0x8A] = Some(op("TXA", Implied, 2, 1, txa));
    t[0x98] = Some(op("TYA", Implied, 2, 1, tya));
    t[0xBA] = Some(op("TSX", Implied, 2, 1, tsx));
    t[0x9A] = Some(op("TXS", Implied, 2, 1, txs));

    // Stack
    t[0x48] = Some(op("PHA", Implied, 3, 1, pha));
    t[0x68] = Some(op("PLA", Implied, 4, 1, pla));
    t[0x08] = Some(op("PHP", Implied, 3, 1, php));
    t[0x28] = Some(op("PLP", Implied, 4, 1, plp));

    // Arithmetic
    t[0x69] = Some(op("ADC", Immediate, 2, 2, adc));
    t[0x65] = Some(op("ADC", ZeroPage, 3, 2, adc));
    t[0x75] = Some(op("ADC", ZeroPageX, 4, 2, adc));
    t[0x6D] = Some(op("ADC", Absolute, 4, 3, adc));
    t[0x7D] = Some(op_px("ADC", AbsoluteX, 4, 3, adc));
    t[0x79] = Some(op_px("ADC", AbsoluteY, 4, 3, adc));
    t[0x61] = Some(op("ADC", IndexedIndirect, 6, 2, adc));
    t[0x71] = Some(op_px("ADC", IndirectIndexed, 5, 2, adc));

    t[0xE9] = Some(op("SBC", Immediate, 2, 2, sbc));
    t[0xE5] = Some(op("SBC", ZeroPage, 3, 2, sbc));
    t[0xF5] = Some(op("SBC", ZeroPageX, 4, 2, sbc));
    t[0xED] = Some(op("SBC", Absolute, 4, 3, sbc));
    t[0xFD] = Some(op_px("SBC", AbsoluteX, 4, 3, sbc));
    t[0xF9] = Some(op_px("SBC", AbsoluteY, 4, 3, sbc));
    t[0xE1] = Some(op("SBC", IndexedIndirect, 6, 2, sbc));
    t[0xF1] = Some(op_px("SBC", IndirectIndexed, 5, 2, sbc));

    // Comparisons
    t[0xC9] = Some(op("CMP", Immediate, 2, 2, cmp));
    t[0xC5] = Some(op("CMP", ZeroPage, 3, 2, cmp));
    t[0xD5] = Some(op("CMP", ZeroPageX, 4, 2, cmp));
    t[0xCD] = Some(op("CMP", Absolute, 4, 3, cmp));
    t[0xDD] = Some(op_px("CMP", AbsoluteX, 4, 3, cmp));
    t[0xD9] = Some(op_px("CMP", AbsoluteY, 4, 3, cmp));
    t[0xC1] = Some(op("CMP", IndexedIndirect, 6, 2, cmp));
    t[0xD1] = Some(op_px("CMP", IndirectIndexed, 5, 2, cmp));

    t[0xE0] = Some(op("CPX", Immediate, 2, 2, cpx));
    t[0xE4] = Some(op("CPX", ZeroPage, 3, 2, cpx));
    t[0xEC] = Some(op("CPX", Absolute, 4, 3, cpx));

    t[0xC0] = Some(op("CPY", Immediate, 2, 2, cpy));
    t[0xC4] = Some(op("CPY", ZeroPage, 3, 2, cpy));
    t[0xCC] = Some(op("CPY", Absolute, 4, 3, cpy));

    // Boolean operators
    t[0x29] = Some(op("AND", Immediate, 2, 2, and));
    t[0x25] = Some(op("AND", ZeroPage, 3, 2, and));
    t[0x35] = Some(op("AND", ZeroPageX, 4, 2, and));
    t[0x2D] = Some(op("AND", Absolute, 4, 3, and));
    t[0x3D] = Some(op_px("AND", AbsoluteX, 4, 3, and));
    t[0x39] = Some(op_px("AND", AbsoluteY, 4, 3, and));
    t[0x21] = Some(op("AND", IndexedIndirect, 6, 2, and));
    t[0x31] = Some(op_px("AND", IndirectIndexed, 5, 2, and));

    t[0x09] = Some(op("ORA", Immediate, 2, 2, ora));
    t[0x05] = Some(op("ORA", ZeroPage, 3, 2, ora));
    t[0x15] = Some(op("ORA", ZeroPageX, 4, 2, ora));
    t[0x0D] = Some(op("ORA", Absolute, 4, 3, ora));
    t[0x1D] = Some(op_px("ORA", AbsoluteX, 4, 3, ora));
    t[0x19] = Some(op_px("ORA", AbsoluteY, 4, 3, ora));
    t[0x01] = Some(op("ORA", IndexedIndirect, 6, 2, ora));
    t[0x11] = Some(op_px("ORA", IndirectIndexed, 5, 2, ora));

    t[0x49] = Some(op("EOR", Immediate, 2, 2, eor));
    t[0x45] = Some(op("EOR", ZeroPage, 3, 2, eor));
    t[0x55] = Some(op("EOR", ZeroPageX, 4, 2, eor));
    t[0x4D] = Some(op("EOR", Absolute, 4, 3, eor));
    t[0x5D] = Some(op_px("EOR", AbsoluteX, 4, 3, eor));
    t[0x59] = Some(op_px("EOR", AbsoluteY, 4, 3, eor));
    t[0x41] = Some(op("EOR", IndexedIndirect, 6, 2, eor));
    t[0x51] = Some(op_px("EOR", IndirectIndexed, 5, 2, eor));

    t[0x24] = Some(op("BIT", ZeroPage, 3, 2, bit));
    t[0x2C] = Some(op("BIT", Absolute, 4, 3, bit));

    // Shifts and rotates
    t[0x0A] = Some(op("ASL", Accumulator, 2, 1, asl));
    t[0x06] = Some(op("ASL", ZeroPage, 5, 2, asl));
    t[0x16] = Some(op("ASL", ZeroPageX, 6, 2, asl));
    t[0x0E] = Some(op("ASL", Absolute, 6, 3, asl));
    t[0x1E] = Some(op("ASL", AbsoluteX, 7, 3, asl));

    t[0x4A] = Some(op("LSR", Accumulator, 2, 1, lsr));
    t[0x46] = Some(op("LSR", ZeroPage, 5, 2, lsr));
    t[0x56] = Some(op("LSR", ZeroPageX, 6, 2, lsr));
    t[0x4E] = Some(op("LSR", Absolute, 6, 3, lsr));
    t[0x5E] = Some(op("LSR", AbsoluteX, 7, 3, lsr));

    t[0x2A] = Some(op("ROL", Accumulator, 2, 1, rol));
    t[0x26] = Some(op("ROL", ZeroPage, 5, 2, rol));
    t[0x36] = Some(op("ROL", ZeroPageX, 6, 2, rol));
    t[0x2E] = Some(op("ROL", Absolute, 6, 3, rol));
    t[0x3E] = Some(op("ROL", AbsoluteX, 7, 3, rol));

    t[0x6A] = Some(op("ROR", Accumulator, 2, 1, ror));
    t[0x66] = Some(op("ROR", ZeroPage, 5, 2, ror));
    t[0x76] = Some(op("ROR", ZeroPageX, 6, 2, ror));
    t[0x6E] = Some(op("ROR", Absolute, 6, 3, ror));
    t[0x7E] = Some(op("ROR", AbsoluteX, 7, 3, ror));

    // Increments and decrements
    t[0xE6] = Some(op("INC", ZeroPage, 5, 2, inc));
    t[0xF6] = Some(op("INC", ZeroPageX, 6, 2, inc));
    t[0xEE] = Some(op("INC", Absolute, 6, 3, inc));
    t[0xFE] = Some(op("INC", AbsoluteX, 7, 3, inc));

    t[0xC6] = Some(op("DEC", ZeroPage, 5, 2, dec));
    t[0xD6] = Some(op("DEC", ZeroPageX, 6, 2, dec));
    t[0xCE] = Some(op("DEC", Absolute, 6, 3, dec));
    t[0xDE] = Some(op("DEC", AbsoluteX, 7, 3, dec));

    t[0xE8] = Some(op("INX", Implied, 2, 1, inx));
    t[0xC8] = Some(op("INY", Implied, 2, 1, iny));
    t[0xCA] = Some(op("DEX", Implied, 2, 1, dex));
    t[0x88] = Some(op("DEY", Implied, 2, 1, dey));

    // Flag operations
    t[0x18] = Some(op("CLC", Implied, 2, 1, clc));
    t[0x38] = Some(op("SEC", Implied, 2, 1, sec));
    t[0x58] = Some(op("CLI", Implied, 2, 1, cli));
    t[0x78] = Some(op("SEI", Implied, 2, 1, sei));
    t[0xB8] = Some(op("CLV", Implied, 2, 1, clv));
    t[0xD8] = Some(op("CLD", Implied, 2, 1, cld));
    t[0xF8] = Some(op("SED", Implied, 2, 1, sed));

    // Branches
    t[0x10] = Some(op_px("BPL", Relative, 2, 2, bpl));
    t[0x30] = Some(op_px("BMI", Relative, 2, 2, bmi));
    t[0x50] = Some(op_px("BVC", Relative, 2, 2, bvc));
    t[0x70] = Some(op_px("BVS", Relative, 2, 2, bvs));
    t[0x90] = Some(op_px("BCC", Relative, 2, 2, bcc));
    t[0xB0] = Some(op_px("BCS", Relative, 2, 2, bcs));
    t[0xD0] = Some(op_px("BNE", Relative, 2, 2, bne));
    t[0xF0] = Some(op_px("BEQ", Relative, 2, 2, beq));

    // Control flow
    t[0x4C] = Some(op_pc("JMP", Absolute, 3, 3, jmp));
    t[0x6C] = Some(op_pc("JMP", Indirect, 5, 3, jmp));
    t[0x20] = Some(op_pc("JSR", Absolute, 6, 3, jsr));
    t[0x60] = Some(op_pc("RTS", Implied, 6, 1, rts));
    t[0x40] = Some(op_pc("RTI", Implied, 6, 1, rti));
    t[0x00] = Some(op_pc("BRK", Implied, 7, 1, brk));

    t[0xEA] = Some(op("NOP", Implied, 2, 1, nop));

    t
}

/* Actions. Each receives the CPU with PC still at the opcode byte. */

fn lda(cpu: &mut Cpu6502, mode: AddressingMode) {
    cpu.a = cpu.operand_value(mode);
    cpu.update_zero(cpu.a);
    cpu.update_negative(cpu.a);
}

fn ldx(cpu: &mut Cpu6502, mode: AddressingMode) {
    cpu.x = cpu.operand_value(mode);
    cpu.update_zero(cpu.x);
    cpu.update_negative(cpu.x);
}

fn ldy(cpu: &mut Cpu6502, mode: AddressingMode) {
    cpu.y = cpu.operand_value(mode);
    cpu.update_zero(cpu.y);
    cpu.update_negative(cpu.y);
}

fn sta(cpu: &mut Cpu6502, mode: AddressingMode) {
    let addr = cpu.operand_address(mode);
    cpu.memory.write_byte(addr, cpu.a, false);
}

fn stx(cpu: &mut Cpu6502, mode: AddressingMode) {
    let addr = cpu.operand_address(mode);
    cpu.memory.write_byte(addr, cpu.x, false);
}

fn sty(cpu: &mut Cpu6502, mode: AddressingMode) {
    let addr = cpu.operand_address(mode);
    cpu.memory.write_byte(addr, cpu.y, false);
}

fn tax(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.x = cpu.a;
    cpu.update_zero(cpu.x);
    cpu.update_negative(cpu.x);
}

fn tay(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.y = cpu.a;
    cpu.update_zero(cpu.y);
    cpu.update_negative(cpu.y);
}

fn txa(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.a = cpu.x;
    cpu.update_zero(cpu.a);
    cpu.update_negative(cpu.a);
}

fn tya(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.a = cpu.y;
    cpu.update_zero(cpu.a);
    cpu.update_negative(cpu.a);
}

fn tsx(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.x = cpu.sp;
    cpu.update_zero(cpu.x);
    cpu.update_negative(cpu.x);
}

fn txs(cpu: &mut Cpu6502, _mode: AddressingMode) {
    // TXS is the one transfer that does not touch the flags.
    cpu.sp = cpu.x;
}

fn pha(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.push_byte(cpu.a);
}

fn pla(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.a = cpu.pop_byte();
    cpu.update_zero(cpu.a);
    cpu.update_negative(cpu.a);
}

fn php(cpu: &mut Cpu6502, _mode: AddressingMode) {
    // PHP pushes with B set.
    let mut flags = cpu.flags;
    flags.brk = true;
    cpu.push_byte(flags.as_byte());
}

fn plp(cpu: &mut Cpu6502, _mode: AddressingMode) {
    let value = cpu.pop_byte();
    cpu.flags.set_from_byte(value);
    // B is not a stored latch.
    cpu.flags.brk = false;
}

fn adc(cpu: &mut Cpu6502, mode: AddressingMode) {
    let operand = cpu.operand_value(mode);
    cpu.add_with_carry(operand);
}

fn sbc(cpu: &mut Cpu6502, mode: AddressingMode) {
    let operand = cpu.operand_value(mode);
    cpu.subtract_with_borrow(operand);
}

fn compare(cpu: &mut Cpu6502, register: u8, mode: AddressingMode) {
    let operand = cpu.operand_value(mode);
    let result = register.wrapping_sub(operand);
    cpu.update_zero(result);
    cpu.update_negative(result);
    cpu.flags.carry = register >= operand;
}

fn cmp(cpu: &mut Cpu6502, mode: AddressingMode) {
    let register = cpu.a;
    compare(cpu, register, mode);
}

fn cpx(cpu: &mut Cpu6502, mode: AddressingMode) {
    let register = cpu.x;
    compare(cpu, register, mode);
}

fn cpy(cpu: &mut Cpu6502, mode: AddressingMode) {
    let register = cpu.y;
    compare(cpu, register, mode);
}

fn and(cpu: &mut Cpu6502, mode: AddressingMode) {
    cpu.a &= cpu.operand_value(mode);
    cpu.update_zero(cpu.a);
    cpu.update_negative(cpu.a);
}

fn ora(cpu: &mut Cpu6502, mode: AddressingMode) {
    cpu.a |= cpu.operand_value(mode);
    cpu.update_zero(cpu.a);
    cpu.update_negative(cpu.a);
}

fn eor(cpu: &mut Cpu6502, mode: AddressingMode) {
    cpu.a ^= cpu.operand_value(mode);
    cpu.update_zero(cpu.a);
    cpu.update_negative(cpu.a);
}

fn bit(cpu: &mut Cpu6502, mode: AddressingMode) {
    let operand = cpu.operand_value(mode);
    cpu.update_zero(cpu.a & operand);
    cpu.update_negative(operand);
    cpu.flags.overflow = operand & 0x40 != 0;
}

/// Shift/rotate plumbing shared by the accumulator and memory forms.
fn read_modify_write(
    cpu: &mut Cpu6502,
    mode: AddressingMode,
    transform: fn(&mut Cpu6502, u8) -> u8,
) {
    match cpu.resolve(mode) {
        Operand::Accumulator => {
            let data = cpu.a;
            let result = transform(cpu, data);
            cpu.a = result;
            cpu.update_zero(result);
            cpu.update_negative(result);
        }
        Operand::Address(addr) => {
            let data = cpu.memory.read_byte(addr, false);
            let result = transform(cpu, data);
            cpu.memory.write_byte(addr, result, false);
            cpu.update_zero(result);
            cpu.update_negative(result);
        }
        other => unreachable!("read-modify-write on {other:?}"),
    }
}

fn asl(cpu: &mut Cpu6502, mode: AddressingMode) {
    read_modify_write(cpu, mode, |cpu, v| {
        cpu.flags.carry = v & 0x80 != 0;
        v << 1
    });
}

fn lsr(cpu: &mut Cpu6502, mode: AddressingMode) {
    read_modify_write(cpu, mode, |cpu, v| {
        cpu.flags.carry = v & 0x01 != 0;
        v >> 1
    });
}

fn rol(cpu: &mut Cpu6502, mode: AddressingMode) {
    read_modify_write(cpu, mode, |cpu, v| {
        let carry_in = cpu.flags.carry as u8;
        cpu.flags.carry = v & 0x80 != 0;
        (v << 1) | carry_in
    });
}

fn ror(cpu: &mut Cpu6502, mode: AddressingMode) {
    read_modify_write(cpu, mode, |cpu, v| {
        let carry_in = (cpu.flags.carry as u8) << 7;
        cpu.flags.carry = v & 0x01 != 0;
        (v >> 1) | carry_in
    });
}

fn inc(cpu: &mut Cpu6502, mode: AddressingMode) {
    read_modify_write(cpu, mode, |_, v| v.wrapping_add(1));
}

fn dec(cpu: &mut Cpu6502, mode: AddressingMode) {
    read_modify_write(cpu, mode, |_, v| v.wrapping_sub(1));
}

fn inx(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.x = cpu.x.wrapping_add(1);
    cpu.update_zero(cpu.x);
    cpu.update_negative(cpu.x);
}

fn iny(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.y = cpu.y.wrapping_add(1);
    cpu.update_zero(cpu.y);
    cpu.update_negative(cpu.y);
}

fn dex(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.x = cpu.x.wrapping_sub(1);
    cpu.update_zero(cpu.x);
    cpu.update_negative(cpu.x);
}

fn dey(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.y = cpu.y.wrapping_sub(1);
    cpu.update_zero(cpu.y);
    cpu.update_negative(cpu.y);
}

fn clc(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.flags.carry = false;
}

fn sec(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.flags.carry = true;
}

fn cli(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.flags.irq_disable = false;
}

fn sei(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.flags.irq_disable = true;
}

fn clv(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.flags.overflow = false;
}

fn cld(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.flags.decimal = false;
}

fn sed(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.flags.decimal = true;
}

fn bpl(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if !cpu.flags.negative {
        cpu.do_branch();
    }
}

fn bmi(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if cpu.flags.negative {
        cpu.do_branch();
    }
}

fn bvc(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if !cpu.flags.overflow {
        cpu.do_branch();
    }
}

fn bvs(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if cpu.flags.overflow {
        cpu.do_branch();
    }
}

fn bcc(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if !cpu.flags.carry {
        cpu.do_branch();
    }
}

fn bcs(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if cpu.flags.carry {
        cpu.do_branch();
    }
}

fn bne(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if !cpu.flags.zero {
        cpu.do_branch();
    }
}

fn beq(cpu: &mut Cpu6502, _mode: AddressingMode) {
    if cpu.flags.zero {
        cpu.do_branch();
    }
}

fn jmp(cpu: &mut Cpu6502, mode: AddressingMode) {
    cpu.pc = cpu.operand_address(mode);
}

fn jsr(cpu: &mut Cpu6502, mode: AddressingMode) {
    // Push the address of the instruction's last byte; RTS adds one.
    let target = cpu.operand_address(mode);
    cpu.push_word(cpu.pc.wrapping_add(2));
    cpu.pc = target;
}

fn rts(cpu: &mut Cpu6502, _mode: AddressingMode) {
    cpu.pc = cpu.pop_word().wrapping_add(1);
}

fn rti(cpu: &mut Cpu6502, _mode: AddressingMode) {
    let status = cpu.pop_byte();
    cpu.flags.set_from_byte(status);
    cpu.flags.brk = false;
    cpu.pc = cpu.pop_word();
}

fn brk(cpu: &mut Cpu6502, _mode: AddressingMode) {
    // BRK leaves a padding byte: the pushed return address skips it.
    cpu.push_word(cpu.pc.wrapping_add(2));
    let mut flags = cpu.flags;
    flags.brk = true;
    cpu.push_byte(flags.as_byte());
    cpu.flags.irq_disable = true;
    cpu.pc = cpu.memory.read_word(IRQ_VECTOR);
}

fn nop(_cpu: &mut Cpu6502, _mode: AddressingMode) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_exactly_the_documented_opcodes() {
        let table = opcode_table();
        let present = table.iter().filter(|slot| slot.is_some()).count();
        assert_eq!(present, 151);
    }

    #[test]
    fn control_flow_opcodes_own_their_pc() {
        let table = opcode_table();
        for (code, slot) in table.iter().enumerate() {
            let Some(op) = slot else { continue };
            let expected = matches!(op.mnemonic, "JMP" | "JSR" | "RTS" | "RTI" | "BRK");
            assert_eq!(
                op.controls_pc, expected,
                "opcode {code:#04X} ({}) controls_pc mismatch",
                op.mnemonic
            );
        }
    }

    #[test]
    fn byte_lengths_match_addressing_modes() {
        use AddressingMode::*;
        let table = opcode_table();
        for (code, slot) in table.iter().enumerate() {
            let Some(op) = slot else { continue };
            let expected = match op.mode {
                Implied | Accumulator => 1,
                Immediate | Relative | ZeroPage | ZeroPageX | ZeroPageY | IndexedIndirect
                | IndirectIndexed => 2,
                Absolute | AbsoluteX | AbsoluteY | Indirect => 3,
            };
            assert_eq!(
                op.bytes, expected,
                "opcode {code:#04X} ({}) length mismatch",
                op.mnemonic
            );
        }
    }

    #[test]
    fn page_penalty_only_on_read_class_indexed_modes() {
        use AddressingMode::*;
        let table = opcode_table();
        for (code, slot) in table.iter().enumerate() {
            let Some(op) = slot else { continue };
            if op.page_penalty {
                assert!(
                    matches!(op.mode, AbsoluteX | AbsoluteY | IndirectIndexed | Relative),
                    "opcode {code:#04X} ({}) has a penalty on {:?}",
                    op.mnemonic,
                    op.mode
                );
                assert_ne!(op.mnemonic, "STA");
            }
        }
    }
}
