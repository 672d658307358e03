use crate::bitwise::Bits;
use crate::bus::{Bus, CycleKind};
use crate::cpu::alu::{
    add_inner_op, add_with_carry, shift_by_immediate, shift_by_register, sub_inner_op,
    sub_with_carry,
};
use crate::cpu::arm::operations::{BlockTransfer, multiplier_cycles};
use crate::cpu::arm7tdmi::{Arm7tdmi, Exception};
use crate::cpu::condition::Condition;
use crate::cpu::decode_table::decode_thumb;
use crate::cpu::fetch::FetchKind;
use crate::cpu::flags::{
    Indexing, LoadStoreKind, Offsetting, OperandKind, ReadWriteKind, ShiftKind,
};
use crate::cpu::psr::CpuState;
use crate::cpu::registers::{REG_LR, REG_PROGRAM_COUNTER, REG_SP};
use crate::cpu::thumb::alu_instructions::{
    ThumbHighRegisterOperation, ThumbImmediateOperation, ThumbModeAluInstruction,
};
use crate::cpu::thumb::instruction::ThumbInstruction;

pub const SIZE_OF_INSTRUCTION: u32 = 2;

/// Low register (R0-R7) in bits `start..=start + 2`.
fn low_register(op_code: u16, start: u8) -> usize {
    op_code.get_bits(start..=start + 2) as usize
}

impl<B: Bus> Arm7tdmi<B> {
    pub(crate) fn execute_thumb(&mut self, op_code: u16) -> FetchKind {
        let instruction = decode_thumb(op_code);
        tracing::trace!(
            "{:08X}: {op_code:04X} {instruction} ({})",
            self.instruction_address(),
            instruction.family()
        );

        match instruction {
            ThumbInstruction::MoveShiftedRegister { shift_operation } => {
                self.move_shifted_reg(op_code, shift_operation)
            }
            ThumbInstruction::AddSubtract {
                operand_kind,
                subtract,
            } => self.add_subtract(op_code, operand_kind, subtract),
            ThumbInstruction::MoveCompareAddSubtractImm { operation } => {
                self.move_compare_add_sub_imm(op_code, operation)
            }
            ThumbInstruction::AluOp { alu_operation } => self.alu_op(op_code, alu_operation),
            ThumbInstruction::HiRegisterOpBx { register_operation } => {
                self.hi_reg_operation_branch_ex(op_code, register_operation)
            }
            ThumbInstruction::PcRelativeLoad => self.pc_relative_load(op_code),
            ThumbInstruction::LoadStoreRegisterOffset {
                load_store,
                byte_word,
            } => self.load_store_register_offset(op_code, load_store, byte_word),
            ThumbInstruction::LoadStoreSignExtByteHalfword { h, sign_extend } => {
                self.load_store_sign_extend_byte_halfword(op_code, h, sign_extend)
            }
            ThumbInstruction::LoadStoreImmOffset {
                load_store,
                byte_word,
            } => self.load_store_immediate_offset(op_code, load_store, byte_word),
            ThumbInstruction::LoadStoreHalfword { load_store } => {
                self.load_store_halfword(op_code, load_store)
            }
            ThumbInstruction::SpRelativeLoadStore { load_store } => {
                self.sp_relative_load_store(op_code, load_store)
            }
            ThumbInstruction::LoadAddress { sp } => self.load_address(op_code, sp),
            ThumbInstruction::AddOffsetSp { negative } => self.add_offset_sp(op_code, negative),
            ThumbInstruction::PushPopReg { load_store, pc_lr } => {
                self.push_pop_register(op_code, load_store, pc_lr)
            }
            ThumbInstruction::MultipleLoadStore { load_store } => {
                self.multiple_load_store(op_code, load_store)
            }
            ThumbInstruction::CondBranch { condition } => self.cond_branch(op_code, condition),
            ThumbInstruction::SoftwareInterrupt => {
                let return_address = self.program_counter().wrapping_sub(SIZE_OF_INSTRUCTION);
                self.enter_exception(Exception::SoftwareInterrupt, return_address);
                FetchKind::None
            }
            ThumbInstruction::UncondBranch => self.uncond_branch(op_code),
            ThumbInstruction::LongBranchLink { high } => self.long_branch_link(op_code, high),
            ThumbInstruction::Breakpoint => {
                let return_address = self.instruction_address().wrapping_add(4);
                self.enter_exception(Exception::PrefetchAbort, return_address);
                FetchKind::None
            }
            ThumbInstruction::Undefined => {
                tracing::debug!("undefined Thumb instruction {op_code:04X}");
                let return_address = self.program_counter().wrapping_sub(SIZE_OF_INSTRUCTION);
                self.enter_exception(Exception::Undefined, return_address);
                FetchKind::None
            }
        }
    }

    pub fn move_shifted_reg(&mut self, op_code: u16, shift_operation: ShiftKind) -> FetchKind {
        let offset5 = u32::from(op_code.get_bits(6..=10));
        let source = self.register(low_register(op_code, 3));
        let rd = low_register(op_code, 0);

        let r = shift_by_immediate(shift_operation, offset5, source, self.cpsr.carry_flag());
        self.set_register(rd, r.result);
        self.cpsr.set_nz(r.result);
        self.cpsr.set_carry_flag(r.carry);

        FetchKind::Sequential
    }

    pub fn add_subtract(
        &mut self,
        op_code: u16,
        operand_kind: OperandKind,
        subtract: bool,
    ) -> FetchKind {
        let rn_offset3 = op_code.get_bits(6..=8);
        let rs = self.register(low_register(op_code, 3));
        let rd = low_register(op_code, 0);

        let operand = match operand_kind {
            OperandKind::Immediate => u32::from(rn_offset3),
            OperandKind::Register => self.register(rn_offset3 as usize),
        };

        let r = if subtract {
            sub_inner_op(rs, operand)
        } else {
            add_inner_op(rs, operand)
        };
        self.set_register(rd, r.result);
        self.cpsr.set_flags(&r);

        FetchKind::Sequential
    }

    pub fn move_compare_add_sub_imm(
        &mut self,
        op_code: u16,
        operation: ThumbImmediateOperation,
    ) -> FetchKind {
        let rd = low_register(op_code, 8);
        let offset8 = u32::from(op_code.get_bits(0..=7));
        let rd_value = self.register(rd);

        match operation {
            ThumbImmediateOperation::Mov => {
                self.set_register(rd, offset8);
                self.cpsr.set_nz(offset8);
            }
            ThumbImmediateOperation::Cmp => {
                let r = sub_inner_op(rd_value, offset8);
                self.cpsr.set_flags(&r);
            }
            ThumbImmediateOperation::Add => {
                let r = add_inner_op(rd_value, offset8);
                self.set_register(rd, r.result);
                self.cpsr.set_flags(&r);
            }
            ThumbImmediateOperation::Sub => {
                let r = sub_inner_op(rd_value, offset8);
                self.set_register(rd, r.result);
                self.cpsr.set_flags(&r);
            }
        }

        FetchKind::Sequential
    }

    pub fn alu_op(&mut self, op_code: u16, alu_operation: ThumbModeAluInstruction) -> FetchKind {
        let rs = self.register(low_register(op_code, 3));
        let rd = low_register(op_code, 0);
        let rd_value = self.register(rd);
        let carry = self.cpsr.carry_flag();

        use ThumbModeAluInstruction::{
            Adc, And, Asr, Bic, Cmn, Cmp, Eor, Lsl, Lsr, Mul, Mvn, Neg, Orr, Ror, Sbc, Tst,
        };
        match alu_operation {
            And | Eor | Orr | Bic | Mvn | Tst => {
                let result = match alu_operation {
                    And | Tst => rd_value & rs,
                    Eor => rd_value ^ rs,
                    Orr => rd_value | rs,
                    Bic => rd_value & !rs,
                    _ => !rs,
                };
                if alu_operation != Tst {
                    self.set_register(rd, result);
                }
                self.cpsr.set_nz(result);
            }
            Lsl | Lsr | Asr | Ror => {
                let kind = match alu_operation {
                    Lsl => ShiftKind::Lsl,
                    Lsr => ShiftKind::Lsr,
                    Asr => ShiftKind::Asr,
                    _ => ShiftKind::Ror,
                };
                self.idle(1);
                let r = shift_by_register(kind, rs & 0xFF, rd_value, carry);
                self.set_register(rd, r.result);
                self.cpsr.set_nz(r.result);
                self.cpsr.set_carry_flag(r.carry);
            }
            Adc | Sbc | Neg | Cmp | Cmn => {
                let r = match alu_operation {
                    Adc => add_with_carry(rd_value, rs, carry),
                    Sbc => sub_with_carry(rd_value, rs, carry),
                    Neg => sub_inner_op(0, rs),
                    Cmp => sub_inner_op(rd_value, rs),
                    _ => add_inner_op(rd_value, rs),
                };
                if !matches!(alu_operation, Cmp | Cmn) {
                    self.set_register(rd, r.result);
                }
                self.cpsr.set_flags(&r);
            }
            Mul => {
                let result = rd_value.wrapping_mul(rs);
                self.idle(multiplier_cycles(rd_value, true));
                self.set_register(rd, result);
                self.cpsr.set_nz(result);
            }
        }

        FetchKind::Sequential
    }

    pub fn hi_reg_operation_branch_ex(
        &mut self,
        op_code: u16,
        register_operation: ThumbHighRegisterOperation,
    ) -> FetchKind {
        let rs = op_code.get_bits(3..=6) as usize;
        let rd = (op_code.get_bits(0..=2) | (op_code.get_bits(7..=7) << 3)) as usize;
        let source = self.register(rs);

        match register_operation {
            ThumbHighRegisterOperation::Add => {
                let result = self.register(rd).wrapping_add(source);
                self.set_register(rd, result);
            }
            ThumbHighRegisterOperation::Cmp => {
                let r = sub_inner_op(self.register(rd), source);
                self.cpsr.set_flags(&r);
            }
            ThumbHighRegisterOperation::Mov => self.set_register(rd, source),
            ThumbHighRegisterOperation::Bx => {
                let state = CpuState::from(source.get_bit(0));
                tracing::trace!("BX to 0x{source:08X} in {state:?} state");
                self.cpsr.set_cpu_state(state);
                self.registers.set_program_counter(source);
                return FetchKind::Branch;
            }
        }

        if rd == REG_PROGRAM_COUNTER && register_operation != ThumbHighRegisterOperation::Cmp {
            FetchKind::Branch
        } else {
            FetchKind::Sequential
        }
    }

    pub fn pc_relative_load(&mut self, op_code: u16) -> FetchKind {
        let rd = low_register(op_code, 8);
        let offset = u32::from(op_code.get_bits(0..=7)) << 2;
        let address = (self.program_counter() & !0b10).wrapping_add(offset);

        let value = self.bus.read_32(address, CycleKind::NonSequential);
        self.idle(1);
        self.set_register(rd, value);

        FetchKind::NonSequential
    }

    /// Shared tail of the Thumb single transfers.
    fn transfer(
        &mut self,
        rd: usize,
        address: u32,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
    ) -> FetchKind {
        let kind = CycleKind::NonSequential;
        match (load_store, byte_word) {
            (LoadStoreKind::Load, ReadWriteKind::Word) => {
                let value = self.read_word_rotated(address, kind);
                self.idle(1);
                self.set_register(rd, value);
            }
            (LoadStoreKind::Load, ReadWriteKind::Byte) => {
                let value = u32::from(self.bus.read_8(address, kind));
                self.idle(1);
                self.set_register(rd, value);
            }
            (LoadStoreKind::Store, ReadWriteKind::Word) => {
                let value = self.register(rd);
                self.write_word(address, value, kind);
            }
            (LoadStoreKind::Store, ReadWriteKind::Byte) => {
                let value = self.register(rd);
                self.bus.write_8(address, value as u8, kind);
            }
        }

        FetchKind::NonSequential
    }

    pub fn load_store_register_offset(
        &mut self,
        op_code: u16,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
    ) -> FetchKind {
        let offset = self.register(low_register(op_code, 6));
        let base = self.register(low_register(op_code, 3));
        let rd = low_register(op_code, 0);

        self.transfer(rd, base.wrapping_add(offset), load_store, byte_word)
    }

    pub fn load_store_sign_extend_byte_halfword(
        &mut self,
        op_code: u16,
        h: bool,
        sign_extend: bool,
    ) -> FetchKind {
        let offset = self.register(low_register(op_code, 6));
        let base = self.register(low_register(op_code, 3));
        let rd = low_register(op_code, 0);
        let address = base.wrapping_add(offset);
        let kind = CycleKind::NonSequential;

        let value = match (sign_extend, h) {
            (false, false) => {
                let value = self.register(rd);
                self.write_halfword(address, value, kind);
                return FetchKind::NonSequential;
            }
            (false, true) => self.read_halfword_rotated(address, kind),
            (true, false) => self.read_signed_byte(address, kind),
            (true, true) => self.read_signed_halfword(address, kind),
        };
        self.idle(1);
        self.set_register(rd, value);

        FetchKind::NonSequential
    }

    pub fn load_store_immediate_offset(
        &mut self,
        op_code: u16,
        load_store: LoadStoreKind,
        byte_word: ReadWriteKind,
    ) -> FetchKind {
        let offset5 = u32::from(op_code.get_bits(6..=10));
        let offset = match byte_word {
            ReadWriteKind::Word => offset5 << 2,
            ReadWriteKind::Byte => offset5,
        };
        let base = self.register(low_register(op_code, 3));
        let rd = low_register(op_code, 0);

        self.transfer(rd, base.wrapping_add(offset), load_store, byte_word)
    }

    pub fn load_store_halfword(&mut self, op_code: u16, load_store: LoadStoreKind) -> FetchKind {
        let offset = u32::from(op_code.get_bits(6..=10)) << 1;
        let base = self.register(low_register(op_code, 3));
        let rd = low_register(op_code, 0);
        let address = base.wrapping_add(offset);
        let kind = CycleKind::NonSequential;

        match load_store {
            LoadStoreKind::Load => {
                let value = self.read_halfword_rotated(address, kind);
                self.idle(1);
                self.set_register(rd, value);
            }
            LoadStoreKind::Store => {
                let value = self.register(rd);
                self.write_halfword(address, value, kind);
            }
        }

        FetchKind::NonSequential
    }

    pub fn sp_relative_load_store(
        &mut self,
        op_code: u16,
        load_store: LoadStoreKind,
    ) -> FetchKind {
        let rd = low_register(op_code, 8);
        let offset = u32::from(op_code.get_bits(0..=7)) << 2;
        let address = self.register(REG_SP).wrapping_add(offset);

        self.transfer(rd, address, load_store, ReadWriteKind::Word)
    }

    pub fn load_address(&mut self, op_code: u16, sp: bool) -> FetchKind {
        let rd = low_register(op_code, 8);
        let offset = u32::from(op_code.get_bits(0..=7)) << 2;
        let base = if sp {
            self.register(REG_SP)
        } else {
            self.program_counter() & !0b10
        };

        self.set_register(rd, base.wrapping_add(offset));

        FetchKind::Sequential
    }

    pub fn add_offset_sp(&mut self, op_code: u16, negative: bool) -> FetchKind {
        let offset = u32::from(op_code.get_bits(0..=6)) << 2;
        let sp = self.register(REG_SP);
        let sp = if negative {
            sp.wrapping_sub(offset)
        } else {
            sp.wrapping_add(offset)
        };
        self.set_register(REG_SP, sp);

        FetchKind::Sequential
    }

    /// PUSH is STMDB SP!, POP is LDMIA SP!. `pc_lr` adds LR to a push and PC
    /// to a pop.
    pub fn push_pop_register(
        &mut self,
        op_code: u16,
        load_store: LoadStoreKind,
        pc_lr: bool,
    ) -> FetchKind {
        let mut register_list = op_code.get_bits(0..=7);
        let (indexing, offsetting, extra) = match load_store {
            LoadStoreKind::Store => (Indexing::Pre, Offsetting::Down, REG_LR),
            LoadStoreKind::Load => (Indexing::Post, Offsetting::Up, REG_PROGRAM_COUNTER),
        };
        if pc_lr {
            register_list.set_bit(extra as u8, true);
        }

        self.block_data_transfer(BlockTransfer {
            base_register: REG_SP,
            register_list,
            indexing,
            offsetting,
            load_store,
            write_back: true,
            load_psr: false,
        })
    }

    pub fn multiple_load_store(&mut self, op_code: u16, load_store: LoadStoreKind) -> FetchKind {
        self.block_data_transfer(BlockTransfer {
            base_register: low_register(op_code, 8),
            register_list: op_code.get_bits(0..=7),
            indexing: Indexing::Post,
            offsetting: Offsetting::Up,
            load_store,
            write_back: true,
            load_psr: false,
        })
    }

    pub fn cond_branch(&mut self, op_code: u16, condition: Condition) -> FetchKind {
        if !self.cpsr.can_execute(condition) {
            return FetchKind::Sequential;
        }

        let offset = (u32::from(op_code.get_bits(0..=7)) << 1).sign_extended(9);
        let target = self.program_counter().wrapping_add(offset);
        self.set_register(REG_PROGRAM_COUNTER, target);

        FetchKind::Branch
    }

    pub fn uncond_branch(&mut self, op_code: u16) -> FetchKind {
        let offset = (u32::from(op_code.get_bits(0..=10)) << 1).sign_extended(12);
        let target = self.program_counter().wrapping_add(offset);
        self.set_register(REG_PROGRAM_COUNTER, target);

        FetchKind::Branch
    }

    /// One half of BL. The first half parks the upper offset in LR, the
    /// second one jumps and leaves the return address (with bit 0 set) in LR.
    pub fn long_branch_link(&mut self, op_code: u16, high: bool) -> FetchKind {
        let offset = u32::from(op_code.get_bits(0..=10));
        let pc = self.program_counter();

        if !high {
            let upper = offset.sign_extended(11) << 12;
            self.set_register(REG_LR, pc.wrapping_add(upper));
            return FetchKind::Sequential;
        }

        let target = self.register(REG_LR).wrapping_add(offset << 1);
        self.set_register(REG_LR, pc.wrapping_sub(SIZE_OF_INSTRUCTION) | 1);
        self.set_register(REG_PROGRAM_COUNTER, target);

        FetchKind::Branch
    }
}
