use crate::bitwise::Bits;
use crate::bus::{Bus, CycleKind};
use crate::cpu::alu::{
    ArithmeticOpResult, add_inner_op, add_with_carry, shift_by_immediate, shift_by_register,
    sub_inner_op, sub_with_carry,
};
use crate::cpu::arm::alu_instruction::{
    AluInstructionKind, AluOperand, ArmModeAluInstruction, Kind, PsrKind,
};
use crate::cpu::arm::instructions::{ArmInstruction, SingleDataTransferOffset};
use crate::cpu::arm7tdmi::{Arm7tdmi, Exception};
use crate::cpu::condition::Condition;
use crate::cpu::decode_table::decode_arm;
use crate::cpu::fetch::FetchKind;
use crate::cpu::flags::{
    HalfwordTransferKind, Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind,
};
use crate::cpu::psr::{CpuState, PsrFieldMask};
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER};

pub const SIZE_OF_INSTRUCTION: u32 = 4;

/// Parameters of a LDM/STM, shared with the Thumb PUSH/POP/LDMIA/STMIA.
#[derive(Debug, Clone, Copy)]
pub struct BlockTransfer {
    pub base_register: usize,
    pub register_list: u16,
    pub indexing: Indexing,
    pub offsetting: Offsetting,
    pub load_store: LoadStoreKind,
    pub write_back: bool,
    pub load_psr: bool,
}

/// Internal cycles of a multiply for the multiplier in Rs: one per byte that
/// still has to be processed. Signed multiplies also stop early on leading
/// ones.
pub(crate) const fn multiplier_cycles(rs: u32, signed: bool) -> u32 {
    let mut cycles = 1;
    let mut mask = 0xFFFF_FF00_u32;
    while cycles < 4 {
        let top = rs & mask;
        if top == 0 || (signed && top == mask) {
            break;
        }
        cycles += 1;
        mask <<= 8;
    }
    cycles
}

impl<B: Bus> Arm7tdmi<B> {
    /// Checks the condition of `op_code` and runs it.
    pub(crate) fn execute_arm(&mut self, op_code: u32) -> FetchKind {
        let condition = Condition::from(op_code);
        if !self.cpsr.can_execute(condition) {
            return FetchKind::Sequential;
        }

        let instruction = decode_arm(op_code);
        tracing::trace!(
            "{:08X}: {op_code:08X} {instruction} {condition} ({})",
            self.instruction_address(),
            instruction.family()
        );

        match instruction {
            ArmInstruction::DataProcessing {
                alu_instruction,
                set_conditions,
                operand,
            } => self.data_processing(op_code, alu_instruction, set_conditions, operand),
            ArmInstruction::Multiply {
                accumulate,
                set_conditions,
            } => self.multiply(op_code, accumulate, set_conditions),
            ArmInstruction::MultiplyLong {
                signed,
                accumulate,
                set_conditions,
            } => self.multiply_long(op_code, signed, accumulate, set_conditions),
            ArmInstruction::PsrTransferMrs { psr_kind } => self.psr_transfer_mrs(op_code, psr_kind),
            ArmInstruction::PsrTransferMsr {
                psr_kind,
                operand_kind,
            } => self.psr_transfer_msr(op_code, psr_kind, operand_kind),
            ArmInstruction::SingleDataSwap { quantity } => self.single_data_swap(op_code, quantity),
            ArmInstruction::BranchAndExchange => self.branch_and_exchange(op_code),
            ArmInstruction::HalfwordDataTransfer {
                indexing,
                offsetting,
                offset_kind,
                write_back,
                load_store,
                transfer_kind,
            } => self.halfword_data_transfer(
                op_code,
                indexing,
                offsetting,
                offset_kind,
                write_back,
                load_store,
                transfer_kind,
            ),
            ArmInstruction::SingleDataTransfer {
                indexing,
                offsetting,
                quantity,
                write_back,
                load_store,
                offset,
            } => self.single_data_transfer(
                op_code, indexing, offsetting, quantity, write_back, load_store, offset,
            ),
            ArmInstruction::BlockDataTransfer {
                indexing,
                offsetting,
                load_psr,
                write_back,
                load_store,
            } => self.block_data_transfer(BlockTransfer {
                base_register: op_code.get_bits(16..=19) as usize,
                register_list: op_code.get_bits(0..=15) as u16,
                indexing,
                offsetting,
                load_store,
                write_back,
                load_psr,
            }),
            ArmInstruction::Branch { link } => self.branch(op_code, link),
            ArmInstruction::SoftwareInterrupt => {
                let return_address = self.program_counter().wrapping_sub(SIZE_OF_INSTRUCTION);
                self.enter_exception(Exception::SoftwareInterrupt, return_address);
                FetchKind::None
            }
            ArmInstruction::Breakpoint => {
                let return_address = self.instruction_address().wrapping_add(4);
                self.enter_exception(Exception::PrefetchAbort, return_address);
                FetchKind::None
            }
            ArmInstruction::Undefined => {
                tracing::debug!("undefined ARM instruction {op_code:08X}");
                let return_address = self.program_counter().wrapping_sub(SIZE_OF_INSTRUCTION);
                self.enter_exception(Exception::Undefined, return_address);
                FetchKind::None
            }
        }
    }

    /// Second operand of a data processing instruction and the barrel
    /// shifter carry out.
    fn alu_operand(&mut self, op_code: u32, operand: AluOperand) -> (u32, bool) {
        let carry = self.cpsr.carry_flag();
        match operand {
            AluOperand::Immediate => {
                let rotate = op_code.get_bits(8..=11) * 2;
                let value = op_code.get_bits(0..=7).rotate_right(rotate);
                let carry = if rotate == 0 { carry } else { value.get_bit(31) };
                (value, carry)
            }
            AluOperand::ShiftByImmediate(kind) => {
                let rm = self.register(op_code.get_bits(0..=3) as usize);
                let amount = op_code.get_bits(7..=11);
                let shifted = shift_by_immediate(kind, amount, rm, carry);
                (shifted.result, shifted.carry)
            }
            AluOperand::ShiftByRegister(kind) => {
                // The extra cycle to read Rs lets R15 run one more word ahead.
                self.idle(1);
                let rm_index = op_code.get_bits(0..=3) as usize;
                let mut rm = self.register(rm_index);
                if rm_index == REG_PROGRAM_COUNTER {
                    rm = rm.wrapping_add(4);
                }
                let amount = self.register(op_code.get_bits(8..=11) as usize) & 0xFF;
                let shifted = shift_by_register(kind, amount, rm, carry);
                (shifted.result, shifted.carry)
            }
        }
    }

    pub fn data_processing(
        &mut self,
        op_code: u32,
        alu_instruction: ArmModeAluInstruction,
        set_conditions: bool,
        operand: AluOperand,
    ) -> FetchKind {
        let rn = op_code.get_bits(16..=19) as usize;
        let rd = op_code.get_bits(12..=15) as usize;

        let mut op1 = self.register(rn);
        if rn == REG_PROGRAM_COUNTER && matches!(operand, AluOperand::ShiftByRegister(_)) {
            op1 = op1.wrapping_add(4);
        }
        let (op2, shifter_carry) = self.alu_operand(op_code, operand);
        let carry = self.cpsr.carry_flag();

        use ArmModeAluInstruction::{
            Adc, Add, And, Bic, Cmn, Cmp, Eor, Mov, Mvn, Orr, Rsb, Rsc, Sbc, Sub, Teq, Tst,
        };
        let op_result = match alu_instruction {
            And | Tst => Self::logical(op1 & op2),
            Eor | Teq => Self::logical(op1 ^ op2),
            Orr => Self::logical(op1 | op2),
            Mov => Self::logical(op2),
            Bic => Self::logical(op1 & !op2),
            Mvn => Self::logical(!op2),
            Sub | Cmp => sub_inner_op(op1, op2),
            Rsb => sub_inner_op(op2, op1),
            Add | Cmn => add_inner_op(op1, op2),
            Adc => add_with_carry(op1, op2, carry),
            Sbc => sub_with_carry(op1, op2, carry),
            Rsc => sub_with_carry(op2, op1, carry),
        };

        if set_conditions {
            if rd == REG_PROGRAM_COUNTER && !alu_instruction.is_test() {
                // Exception return: the flags come back with the whole SPSR.
                self.restore_cpsr_from_spsr();
            } else {
                match alu_instruction.kind() {
                    AluInstructionKind::Logical => {
                        self.cpsr.set_nz(op_result.result);
                        self.cpsr.set_carry_flag(shifter_carry);
                    }
                    AluInstructionKind::Arithmetic => self.cpsr.set_flags(&op_result),
                }
            }
        }

        if alu_instruction.is_test() {
            return FetchKind::Sequential;
        }

        self.set_register(rd, op_result.result);
        if rd == REG_PROGRAM_COUNTER {
            FetchKind::Branch
        } else {
            FetchKind::Sequential
        }
    }

    /// Carry and overflow of a logical op are never read: S takes C from the
    /// shifter and leaves V alone.
    const fn logical(result: u32) -> ArithmeticOpResult {
        ArithmeticOpResult {
            result,
            carry: false,
            overflow: false,
            sign: (result as i32) < 0,
            zero: result == 0,
        }
    }

    pub fn multiply(&mut self, op_code: u32, accumulate: bool, set_conditions: bool) -> FetchKind {
        let rd = op_code.get_bits(16..=19) as usize;
        let rn = op_code.get_bits(12..=15) as usize;
        let rs = self.register(op_code.get_bits(8..=11) as usize);
        let rm = self.register(op_code.get_bits(0..=3) as usize);

        let mut result = rm.wrapping_mul(rs);
        let mut cycles = multiplier_cycles(rs, true);
        if accumulate {
            result = result.wrapping_add(self.register(rn));
            cycles += 1;
        }
        self.idle(cycles);

        self.set_register(rd, result);
        if set_conditions {
            // C is left as it was, V is never touched.
            self.cpsr.set_nz(result);
        }

        FetchKind::Sequential
    }

    pub fn multiply_long(
        &mut self,
        op_code: u32,
        signed: bool,
        accumulate: bool,
        set_conditions: bool,
    ) -> FetchKind {
        let rd_hi = op_code.get_bits(16..=19) as usize;
        let rd_lo = op_code.get_bits(12..=15) as usize;
        let rs = self.register(op_code.get_bits(8..=11) as usize);
        let rm = self.register(op_code.get_bits(0..=3) as usize);

        let mut result = if signed {
            (i64::from(rm as i32) * i64::from(rs as i32)) as u64
        } else {
            u64::from(rm) * u64::from(rs)
        };

        let mut cycles = multiplier_cycles(rs, signed) + 1;
        if accumulate {
            let addend = (u64::from(self.register(rd_hi)) << 32) | u64::from(self.register(rd_lo));
            result = result.wrapping_add(addend);
            cycles += 1;
        }
        self.idle(cycles);

        self.set_register(rd_lo, result as u32);
        self.set_register(rd_hi, (result >> 32) as u32);

        if set_conditions {
            self.cpsr.set_sign_flag(result.get_bit(63));
            self.cpsr.set_zero_flag(result == 0);
        }

        FetchKind::Sequential
    }

    pub fn psr_transfer_mrs(&mut self, op_code: u32, psr_kind: PsrKind) -> FetchKind {
        let rd = op_code.get_bits(12..=15) as usize;

        let psr = match psr_kind {
            PsrKind::Cpsr => self.cpsr,
            PsrKind::Spsr => self.spsr().unwrap_or_else(|| {
                tracing::warn!("MRS of SPSR in {} mode, reading CPSR", self.cpsr.mode());
                self.cpsr
            }),
        };

        self.set_register(rd, psr.into());

        FetchKind::Sequential
    }

    pub fn psr_transfer_msr(
        &mut self,
        op_code: u32,
        psr_kind: PsrKind,
        operand_kind: OperandKind,
    ) -> FetchKind {
        let value = match operand_kind {
            OperandKind::Immediate => {
                let rotate = op_code.get_bits(8..=11) * 2;
                op_code.get_bits(0..=7).rotate_right(rotate)
            }
            OperandKind::Register => self.register(op_code.get_bits(0..=3) as usize),
        };
        let fields = PsrFieldMask::new(op_code.get_bits(16..=19) as u8);
        tracing::trace!("{psr_kind}_{fields} <- 0x{value:08X}");

        match psr_kind {
            PsrKind::Cpsr => self.write_cpsr(value, fields),
            PsrKind::Spsr => {
                let bank = self.cpsr.mode().bank();
                match self.registers.spsr_mut(bank) {
                    Some(spsr) => spsr.masked_write(value, fields.bit_mask()),
                    None => tracing::warn!(
                        "MSR to SPSR in {} mode ignored",
                        self.cpsr.mode()
                    ),
                }
            }
        }

        FetchKind::Sequential
    }

    pub fn single_data_swap(&mut self, op_code: u32, quantity: ReadWriteKind) -> FetchKind {
        let address = self.register(op_code.get_bits(16..=19) as usize);
        let rd = op_code.get_bits(12..=15) as usize;
        let source = self.register(op_code.get_bits(0..=3) as usize);

        let old = match quantity {
            ReadWriteKind::Word => {
                let old = self.read_word_rotated(address, CycleKind::NonSequential);
                self.write_word(address, source, CycleKind::NonSequential);
                old
            }
            ReadWriteKind::Byte => {
                let old = self.bus.read_8(address, CycleKind::NonSequential);
                self.bus
                    .write_8(address, source as u8, CycleKind::NonSequential);
                u32::from(old)
            }
        };
        self.idle(1);
        self.set_register(rd, old);

        FetchKind::NonSequential
    }

    pub fn branch_and_exchange(&mut self, op_code: u32) -> FetchKind {
        let target = self.register(op_code.get_bits(0..=3) as usize);
        let state = CpuState::from(target.get_bit(0));

        tracing::trace!("BX to 0x{target:08X} in {state:?} state");
        self.cpsr.set_cpu_state(state);
        self.registers.set_program_counter(target);

        FetchKind::Branch
    }

    #[allow(clippy::too_many_arguments)]
    pub fn halfword_data_transfer(
        &mut self,
        op_code: u32,
        indexing: Indexing,
        offsetting: Offsetting,
        offset_kind: OperandKind,
        write_back: bool,
        load_store: LoadStoreKind,
        transfer_kind: HalfwordTransferKind,
    ) -> FetchKind {
        let rn = op_code.get_bits(16..=19) as usize;
        let rd = op_code.get_bits(12..=15) as usize;

        let offset = match offset_kind {
            OperandKind::Immediate => (op_code.get_bits(8..=11) << 4) | op_code.get_bits(0..=3),
            OperandKind::Register => self.register(op_code.get_bits(0..=3) as usize),
        };

        let base = self.register(rn);
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };
        let write_back = write_back || indexing == Indexing::Post;

        match load_store {
            LoadStoreKind::Load => {
                let kind = CycleKind::NonSequential;
                let value = match transfer_kind {
                    HalfwordTransferKind::UnsignedHalfwords => {
                        self.read_halfword_rotated(address, kind)
                    }
                    HalfwordTransferKind::SignedByte => self.read_signed_byte(address, kind),
                    HalfwordTransferKind::SignedHalfwords => {
                        self.read_signed_halfword(address, kind)
                    }
                };
                self.write_back_base(rn, offset_address, write_back);
                self.idle(1);
                self.load_result(rd, value)
            }
            LoadStoreKind::Store => {
                let value = if rd == REG_PROGRAM_COUNTER {
                    self.stored_program_counter()
                } else {
                    self.register(rd)
                };
                self.write_halfword(address, value, CycleKind::NonSequential);
                self.write_back_base(rn, offset_address, write_back);
                FetchKind::NonSequential
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn single_data_transfer(
        &mut self,
        op_code: u32,
        indexing: Indexing,
        offsetting: Offsetting,
        quantity: ReadWriteKind,
        write_back: bool,
        load_store: LoadStoreKind,
        offset: SingleDataTransferOffset,
    ) -> FetchKind {
        let rn = op_code.get_bits(16..=19) as usize;
        let rd = op_code.get_bits(12..=15) as usize;

        let offset = match offset {
            SingleDataTransferOffset::Immediate => op_code.get_bits(0..=11),
            SingleDataTransferOffset::Register(kind) => {
                let rm = self.register(op_code.get_bits(0..=3) as usize);
                let amount = op_code.get_bits(7..=11);
                shift_by_immediate(kind, amount, rm, self.cpsr.carry_flag()).result
            }
        };

        let base = self.register(rn);
        let offset_address = offsetting.apply(base, offset);
        let address = match indexing {
            Indexing::Pre => offset_address,
            Indexing::Post => base,
        };
        let write_back = write_back || indexing == Indexing::Post;

        match load_store {
            LoadStoreKind::Load => {
                let value = match quantity {
                    ReadWriteKind::Word => {
                        self.read_word_rotated(address, CycleKind::NonSequential)
                    }
                    ReadWriteKind::Byte => {
                        u32::from(self.bus.read_8(address, CycleKind::NonSequential))
                    }
                };
                self.write_back_base(rn, offset_address, write_back);
                self.idle(1);
                self.load_result(rd, value)
            }
            LoadStoreKind::Store => {
                let value = if rd == REG_PROGRAM_COUNTER {
                    self.stored_program_counter()
                } else {
                    self.register(rd)
                };
                match quantity {
                    ReadWriteKind::Word => {
                        self.write_word(address, value, CycleKind::NonSequential);
                    }
                    ReadWriteKind::Byte => {
                        self.bus
                            .write_8(address, value as u8, CycleKind::NonSequential);
                    }
                }
                self.write_back_base(rn, offset_address, write_back);
                FetchKind::NonSequential
            }
        }
    }

    /// Base write back of single transfers. R15 as base is never written back.
    fn write_back_base(&mut self, rn: usize, address: u32, write_back: bool) {
        if write_back && rn != REG_PROGRAM_COUNTER {
            self.set_register(rn, address);
        }
    }

    /// Stores a loaded value, which wins over the base write back.
    fn load_result(&mut self, rd: usize, value: u32) -> FetchKind {
        self.set_register(rd, value);
        if rd == REG_PROGRAM_COUNTER {
            FetchKind::Branch
        } else {
            FetchKind::NonSequential
        }
    }

    /// LDM/STM.
    ///
    /// Registers always move in ascending order to ascending addresses, the
    /// addressing mode only picks the lowest address. An empty list moves R15
    /// and steps the base by 0x40.
    pub fn block_data_transfer(&mut self, transfer: BlockTransfer) -> FetchKind {
        let BlockTransfer {
            base_register,
            register_list,
            indexing,
            offsetting,
            load_store,
            write_back,
            load_psr,
        } = transfer;

        let (register_list, size) = if register_list == 0 {
            (1_u16 << REG_PROGRAM_COUNTER, 0x40)
        } else {
            (register_list, register_list.count_ones() * 4)
        };

        let base = self.register(base_register);
        let final_base = offsetting.apply(base, size);
        let mut address = match (offsetting, indexing) {
            (Offsetting::Up, Indexing::Post) => base,
            (Offsetting::Up, Indexing::Pre) => base.wrapping_add(4),
            (Offsetting::Down, Indexing::Post) => base.wrapping_sub(size).wrapping_add(4),
            (Offsetting::Down, Indexing::Pre) => base.wrapping_sub(size),
        };

        let loads_pc =
            load_store == LoadStoreKind::Load && register_list.get_bit(REG_PROGRAM_COUNTER as u8);
        let user_bank = load_psr && !loads_pc;
        if load_psr && !self.cpsr.mode().is_privileged() {
            tracing::warn!("S bit on a block transfer in User mode");
        }

        let mut kind = CycleKind::NonSequential;
        let mut first = true;
        for reg in (0..16).filter(|&reg| register_list.get_bit(reg as u8)) {
            match load_store {
                LoadStoreKind::Store => {
                    let value = if reg == REG_PROGRAM_COUNTER {
                        self.stored_program_counter()
                    } else if user_bank {
                        self.user_register(reg)
                    } else {
                        self.register(reg)
                    };
                    self.write_word(address, value, kind);

                    // The base is updated after the first store, so it only
                    // stores its original value when it comes first.
                    if first && write_back {
                        self.set_register(base_register, final_base);
                    }
                }
                LoadStoreKind::Load => {
                    let value = self.bus.read_32(address & !0b11, kind);
                    if user_bank {
                        self.set_user_register(reg, value);
                    } else {
                        self.set_register(reg, value);
                    }
                }
            }

            kind = CycleKind::Sequential;
            address = address.wrapping_add(4);
            first = false;
        }

        if load_store == LoadStoreKind::Store {
            return FetchKind::NonSequential;
        }

        self.idle(1);
        if write_back && !register_list.get_bit(base_register as u8) {
            self.set_register(base_register, final_base);
        }

        if loads_pc {
            if load_psr {
                self.restore_cpsr_from_spsr();
            }
            return FetchKind::Branch;
        }

        FetchKind::NonSequential
    }

    pub fn branch(&mut self, op_code: u32, link: bool) -> FetchKind {
        let offset = (op_code.get_bits(0..=23) << 2).sign_extended(26);
        let pc = self.program_counter();

        if link {
            self.set_register(REG_LR, pc.wrapping_sub(SIZE_OF_INSTRUCTION));
        }

        let target = pc.wrapping_add(offset);
        tracing::trace!(
            "B{} to 0x{target:08X}",
            if link { "L" } else { "" }
        );
        self.set_register(REG_PROGRAM_COUNTER, target);

        FetchKind::Branch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FlatMemory;
    use crate::cpu::boot::{BootConfig, StackPointers};
    use crate::cpu::cpu_modes::Mode;
    use crate::cpu::psr::Psr;
    use crate::cpu::registers::REG_SP;
    use pretty_assertions::assert_eq;

    fn cpu() -> Arm7tdmi<FlatMemory> {
        let config = BootConfig {
            initial_mode: Mode::System,
            entry_point: 0,
            stack_pointers: StackPointers::default(),
        };
        Arm7tdmi::with_config(FlatMemory::new(0x1000), &config)
    }

    #[test]
    fn check_mov_immediate_rotated_carry() {
        // MOVS R0, #0x80000000 (0x02 ror 2)
        let op_code = 0b1110_00_1_1101_1_0000_0000_0001_00000010;
        let mut cpu = cpu();

        assert_eq!(cpu.execute_arm(op_code), FetchKind::Sequential);
        assert_eq!(cpu.register(0), 0x8000_0000);
        assert!(cpu.cpsr.sign_flag());
        assert!(cpu.cpsr.carry_flag());
    }

    #[test]
    fn check_adds_overflow() {
        // ADDS R2, R0, R1
        let op_code = 0b1110_00_0_0100_1_0000_0010_00000000_0001;
        let mut cpu = cpu();
        cpu.set_register(0, 0x7FFF_FFFF);
        cpu.set_register(1, 1);

        cpu.execute_arm(op_code);

        assert_eq!(cpu.register(2), 0x8000_0000);
        assert!(cpu.cpsr.sign_flag());
        assert!(cpu.cpsr.overflow_flag());
        assert!(!cpu.cpsr.carry_flag());
        assert!(!cpu.cpsr.zero_flag());
    }

    #[test]
    fn check_teq_keeps_destination() {
        // TEQ R12, #1
        let op_code = 0b1110_00_1_1001_1_1100_0000_000000000001;
        let mut cpu = cpu();
        cpu.set_register(12, 0xFFFF_FFFF);
        cpu.set_register(0, 0x55);

        cpu.execute_arm(op_code);

        assert!(cpu.cpsr.sign_flag());
        assert!(!cpu.cpsr.zero_flag());
        assert_eq!(cpu.register(0), 0x55);
    }

    #[test]
    fn check_condition_failed_is_nop() {
        // MOVEQ R0, #1 with Z clear
        let op_code = 0b0000_00_1_1101_0_0000_0000_0000_00000001;
        let mut cpu = cpu();

        assert_eq!(cpu.execute_arm(op_code), FetchKind::Sequential);
        assert_eq!(cpu.register(0), 0);
    }

    #[test]
    fn check_pc_operand_offsets() {
        let mut cpu = cpu();
        let address = cpu.instruction_address();

        // MOV R0, PC
        cpu.execute_arm(0xE1A0_000F);
        assert_eq!(cpu.register(0), address + 8);

        // MOV R0, PC, LSL R1 with R1 = 0
        cpu.execute_arm(0xE1A0_011F);
        assert_eq!(cpu.register(0), address + 12);
    }

    #[test]
    fn check_lsl_by_register_carry() {
        // MOVS R0, R1, LSL R2
        let mut cpu = cpu();
        cpu.set_register(1, 0x8000_0001);
        cpu.set_register(2, 1);

        cpu.execute_arm(0xE1B0_0211);

        assert_eq!(cpu.register(0), 2);
        assert!(cpu.cpsr.carry_flag());
        assert_eq!(cpu.bus.internal_cycles, 1);
    }

    #[test]
    fn check_subs_pc_restores_cpsr() {
        let mut cpu = cpu();
        let saved = cpu.cpsr;
        cpu.switch_to_mode(Mode::Irq);
        cpu.set_register(REG_LR, 0x104);

        // SUBS PC, LR, #4
        let fetch = cpu.execute_arm(0xE25E_F004);

        assert_eq!(fetch, FetchKind::Branch);
        assert_eq!(cpu.cpsr, saved);
        assert_eq!(cpu.program_counter(), 0x100);
    }

    #[test]
    fn check_mul_keeps_carry() {
        // MULS R0, R1, R2
        let mut cpu = cpu();
        cpu.cpsr.set_carry_flag(true);
        cpu.set_register(1, 0xFFFF_FFFF);
        cpu.set_register(2, 2);

        cpu.execute_arm(0xE010_0291);

        assert_eq!(cpu.register(0), 0xFFFF_FFFE);
        assert!(cpu.cpsr.sign_flag());
        assert!(cpu.cpsr.carry_flag());
        assert_eq!(cpu.bus.internal_cycles, 1);
    }

    #[test]
    fn check_mla() {
        // MLA R0, R1, R2, R3
        let mut cpu = cpu();
        cpu.set_register(1, 3);
        cpu.set_register(2, 0x1_0000);
        cpu.set_register(3, 7);

        cpu.execute_arm(0xE020_3291);

        assert_eq!(cpu.register(0), 0x3_0007);
        assert_eq!(cpu.bus.internal_cycles, 4);
    }

    #[test]
    fn check_smull_and_umlal() {
        let mut cpu = cpu();
        cpu.set_register(2, (-3_i32) as u32);
        cpu.set_register(3, 5);

        // SMULLS R0, R1, R2, R3
        cpu.execute_arm(0xE0D1_0392);
        assert_eq!(cpu.register(0), (-15_i32) as u32);
        assert_eq!(cpu.register(1), 0xFFFF_FFFF);
        assert!(cpu.cpsr.sign_flag());

        // UMLAL R0, R1, R2, R3: accumulate onto -15.
        cpu.set_register(2, 0xFFFF_FFFF);
        cpu.set_register(3, 1);
        cpu.execute_arm(0xE0A1_0392);
        assert_eq!(cpu.register(0), 0xFFFF_FFF0);
        assert_eq!(cpu.register(1), 0xFFFF_FFFF);
    }

    #[test]
    fn multiplier_cycle_counts() {
        assert_eq!(multiplier_cycles(0xFF, false), 1);
        assert_eq!(multiplier_cycles(0x1FF, false), 2);
        assert_eq!(multiplier_cycles(0x00FF_FFFF, false), 3);
        assert_eq!(multiplier_cycles(0xFFFF_FFFF, false), 4);
        assert_eq!(multiplier_cycles(0xFFFF_FFFF, true), 1);
        assert_eq!(multiplier_cycles(0xFFFF_8000, true), 2);
    }

    #[test]
    fn check_mrs_msr() {
        let mut cpu = cpu();

        // MSR CPSR_f, #0xF0000000
        cpu.execute_arm(0xE328_F20F);
        assert!(cpu.cpsr.sign_flag() && cpu.cpsr.zero_flag());
        assert!(cpu.cpsr.carry_flag() && cpu.cpsr.overflow_flag());

        // MRS R0, CPSR
        cpu.execute_arm(0xE10F_0000);
        assert_eq!(cpu.register(0), 0xF000_001F);

        // MRS R1, SPSR in System mode reads CPSR.
        cpu.execute_arm(0xE14F_1000);
        assert_eq!(cpu.register(1), 0xF000_001F);
    }

    #[test]
    fn check_msr_spsr_fields() {
        let mut cpu = cpu();
        cpu.switch_to_mode(Mode::Supervisor);
        cpu.set_register(0, 0xA000_00D3);

        // MSR SPSR_fc, R0
        cpu.execute_arm(0xE169_F000);

        assert_eq!(cpu.spsr(), Some(Psr::from(0xA000_00D3)));
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
    }

    #[test]
    fn check_msr_mrs_all_fields() {
        let mut cpu = cpu();

        // Supervisor, I and F set, T set as well.
        cpu.set_register(0, 0xA000_00F3);
        // MSR CPSR_fsxc, R0
        cpu.execute_arm(0xE12F_F000);
        // MRS R1, CPSR
        cpu.execute_arm(0xE10F_1000);

        assert_eq!(cpu.register(1), 0xA000_00D3);
        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Arm);

        // FIQ mode with T set, as left by an interrupted Thumb routine.
        cpu.set_register(0, 0x5000_0031);
        // MSR SPSR_fsxc, R0
        cpu.execute_arm(0xE16F_F000);
        // MRS R2, SPSR
        cpu.execute_arm(0xE14F_2000);

        assert_eq!(cpu.register(2), 0x5000_0031);
        assert_eq!(u32::from(cpu.cpsr), 0xA000_00D3);
    }

    #[test]
    fn check_swp() {
        let mut cpu = cpu();
        cpu.bus.load_words(0x200, &[0x1122_3344]);
        cpu.set_register(0, 0x200);
        cpu.set_register(1, 0xAABB_CCDD);

        // SWP R2, R1, [R0]
        assert_eq!(cpu.execute_arm(0xE100_2091), FetchKind::NonSequential);
        assert_eq!(cpu.register(2), 0x1122_3344);
        assert_eq!(cpu.bus.read_32(0x200, CycleKind::Sequential), 0xAABB_CCDD);

        // SWPB R2, R1, [R0]
        cpu.execute_arm(0xE140_2091);
        assert_eq!(cpu.register(2), 0xDD);
    }

    #[test]
    fn check_bx_to_thumb() {
        let mut cpu = cpu();
        cpu.set_register(0, 0x301);

        assert_eq!(cpu.execute_arm(0xE12F_FF10), FetchKind::Branch);
        assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);

        cpu.flush_pipeline();
        assert_eq!(cpu.instruction_address(), 0x300);
    }

    #[test]
    fn check_ldr_misaligned_rotates() {
        let mut cpu = cpu();
        cpu.bus.load_words(0x100, &[0x1122_3344]);
        cpu.set_register(1, 0x101);

        // LDR R0, [R1]
        cpu.execute_arm(0xE591_0000);

        assert_eq!(cpu.register(0), 0x4411_2233);
    }

    #[test]
    fn check_ldr_writeback_loses_to_load() {
        let mut cpu = cpu();
        cpu.bus.load_words(0x100, &[0xCAFE]);
        cpu.set_register(0, 0x100);

        // LDR R0, [R0], #4
        cpu.execute_arm(0xE490_0004);

        assert_eq!(cpu.register(0), 0xCAFE);
    }

    #[test]
    fn check_str_pre_indexed_writeback() {
        let mut cpu = cpu();
        cpu.set_register(0, 0x1234_5678);
        cpu.set_register(1, 0x100);

        // STRB R0, [R1, #-1]!
        cpu.execute_arm(0xE561_0001);

        assert_eq!(cpu.register(1), 0xFF);
        assert_eq!(cpu.bus.read_8(0xFF, CycleKind::Sequential), 0x78);
    }

    #[test]
    fn check_str_pc_stores_twelve_ahead() {
        let mut cpu = cpu();
        let address = cpu.instruction_address();
        cpu.set_register(1, 0x200);

        // STR PC, [R1]
        cpu.execute_arm(0xE581_F000);

        assert_eq!(
            cpu.bus.read_32(0x200, CycleKind::Sequential),
            address + 12
        );
    }

    #[test]
    fn check_ldr_register_offset() {
        let mut cpu = cpu();
        cpu.bus.load_words(0x110, &[0x77]);
        cpu.set_register(1, 0x100);
        cpu.set_register(2, 4);

        // LDR R0, [R1, R2, LSL #2]
        cpu.execute_arm(0xE791_0102);

        assert_eq!(cpu.register(0), 0x77);
    }

    #[test]
    fn check_halfword_loads() {
        let mut cpu = cpu();
        cpu.bus.load_words(0x100, &[0x8180_F0FE]);
        cpu.set_register(1, 0x100);

        // LDRH R0, [R1]
        cpu.execute_arm(0xE1D1_00B0);
        assert_eq!(cpu.register(0), 0xF0FE);

        // LDRSB R0, [R1]
        cpu.execute_arm(0xE1D1_00D0);
        assert_eq!(cpu.register(0), 0xFFFF_FFFE);

        // LDRSH R0, [R1, #2]
        cpu.execute_arm(0xE1D1_00F2);
        assert_eq!(cpu.register(0), 0xFFFF_8180);

        // LDRSH R0, [R1, #3] behaves as LDRSB.
        cpu.execute_arm(0xE1D1_00F3);
        assert_eq!(cpu.register(0), 0xFFFF_FF81);

        // LDRH R0, [R1, #1] rotates.
        cpu.execute_arm(0xE1D1_00B1);
        assert_eq!(cpu.register(0), 0xFE00_00F0);
    }

    #[test]
    fn check_strh_post_indexed() {
        let mut cpu = cpu();
        cpu.set_register(0, 0xABCD_1234);
        cpu.set_register(1, 0x101);
        cpu.set_register(2, 0x10);

        // STRH R0, [R1], -R2
        cpu.execute_arm(0xE001_00B2);

        assert_eq!(cpu.bus.read_16(0x100, CycleKind::Sequential), 0x1234);
        assert_eq!(cpu.register(1), 0xF1);
    }

    #[test]
    fn check_stmdb_push_and_ldmia_pop() {
        let mut cpu = cpu();
        cpu.set_register(REG_SP, 0x200);
        cpu.set_register(0, 0xA);
        cpu.set_register(1, 0xB);
        cpu.set_register(REG_LR, 0xC);

        // STMDB SP!, {R0, R1, LR}
        cpu.execute_arm(0xE92D_4003);
        assert_eq!(cpu.register(REG_SP), 0x1F4);
        assert_eq!(cpu.bus.read_32(0x1F4, CycleKind::Sequential), 0xA);
        assert_eq!(cpu.bus.read_32(0x1F8, CycleKind::Sequential), 0xB);
        assert_eq!(cpu.bus.read_32(0x1FC, CycleKind::Sequential), 0xC);

        // LDMIA SP!, {R2, R3, R4}
        cpu.execute_arm(0xE8BD_001C);
        assert_eq!(cpu.register(REG_SP), 0x200);
        assert_eq!(
            [cpu.register(2), cpu.register(3), cpu.register(4)],
            [0xA, 0xB, 0xC]
        );
    }

    #[test]
    fn check_stm_base_in_list() {
        let mut cpu = cpu();
        cpu.set_register(0, 0x100);
        cpu.set_register(1, 0x11);

        // STMIA R0!, {R0, R1}: R0 first, stores its old value.
        cpu.execute_arm(0xE8A0_0003);
        assert_eq!(cpu.bus.read_32(0x100, CycleKind::Sequential), 0x100);
        assert_eq!(cpu.register(0), 0x108);

        // STMIA R1!, {R0, R1}: R1 second, stores the written back value.
        cpu.set_register(0, 0x22);
        cpu.set_register(1, 0x200);
        cpu.execute_arm(0xE8A1_0003);
        assert_eq!(cpu.bus.read_32(0x204, CycleKind::Sequential), 0x208);
    }

    #[test]
    fn check_ldm_base_in_list_skips_writeback() {
        let mut cpu = cpu();
        cpu.bus.load_words(0x100, &[0x5, 0x6]);
        cpu.set_register(0, 0x100);

        // LDMIA R0!, {R0, R1}
        cpu.execute_arm(0xE8B0_0003);

        assert_eq!(cpu.register(0), 0x5);
        assert_eq!(cpu.register(1), 0x6);
    }

    #[test]
    fn check_empty_list_moves_pc() {
        let mut cpu = cpu();
        let address = cpu.instruction_address();
        cpu.set_register(0, 0x100);

        // STMIA R0!, {}
        cpu.execute_arm(0xE8A0_0000);

        assert_eq!(cpu.register(0), 0x140);
        assert_eq!(cpu.bus.read_32(0x100, CycleKind::Sequential), address + 12);
    }

    #[test]
    fn check_stm_user_bank() {
        let mut cpu = cpu();
        cpu.set_register(REG_SP, 0x1111);
        cpu.switch_to_mode(Mode::Irq);
        cpu.set_register(REG_SP, 0x2222);
        cpu.set_register(0, 0x300);

        // STMIA R0, {SP}^
        cpu.execute_arm(0xE8C0_2000);

        assert_eq!(cpu.bus.read_32(0x300, CycleKind::Sequential), 0x1111);
    }

    #[test]
    fn check_ldm_pc_with_s_restores_cpsr() {
        let mut cpu = cpu();
        let saved = cpu.cpsr;
        cpu.bus.load_words(0x100, &[0x400]);
        cpu.switch_to_mode(Mode::Supervisor);
        cpu.set_register(0, 0x100);

        // LDMIA R0, {PC}^
        assert_eq!(cpu.execute_arm(0xE8D0_8000), FetchKind::Branch);
        assert_eq!(cpu.cpsr, saved);
        assert_eq!(cpu.program_counter(), 0x400);
    }

    #[test]
    fn check_branch_with_link() {
        let mut cpu = cpu();
        let address = cpu.instruction_address();

        // BL +0x10 (offset 2 words from PC)
        assert_eq!(cpu.execute_arm(0xEB00_0002), FetchKind::Branch);
        assert_eq!(cpu.register(REG_LR), address + 4);
        assert_eq!(cpu.program_counter(), address + 8 + 8);

        // B -8 (to itself)
        cpu.flush_pipeline();
        let address = cpu.instruction_address();
        cpu.execute_arm(0xEAFF_FFFE);
        assert_eq!(cpu.program_counter(), address);
    }

    #[test]
    fn check_swi_entry() {
        let mut cpu = cpu();
        let address = cpu.instruction_address();
        let saved = cpu.cpsr;

        assert_eq!(cpu.execute_arm(0xEF00_0000), FetchKind::None);

        assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
        assert_eq!(cpu.register(REG_LR), address + 4);
        assert_eq!(cpu.spsr(), Some(saved));
        assert!(cpu.cpsr.irq_disable());
        assert_eq!(cpu.instruction_address(), 0x08);
    }

    #[test]
    fn check_undefined_and_breakpoint() {
        let mut cpu = cpu();
        let address = cpu.instruction_address();

        // Coprocessor space traps.
        cpu.execute_arm(0xEE00_0000);
        assert_eq!(cpu.cpsr.mode(), Mode::Undefined);
        assert_eq!(cpu.register(REG_LR), address + 4);
        assert_eq!(cpu.instruction_address(), 0x04);

        // BKPT
        cpu.execute_arm(0xE120_0070);
        assert_eq!(cpu.cpsr.mode(), Mode::Abort);
        assert_eq!(cpu.register(REG_LR), 0x04 + 4);
        assert_eq!(cpu.instruction_address(), 0x0C);
    }
}
