//! Whole programs stepped through the public API.

use pretty_assertions::assert_eq;
use tdmi_cpu::bus::{Bus, CycleKind, FlatMemory};
use tdmi_cpu::cpu::arm7tdmi::{Arm7tdmi, CpuSnapshot};
use tdmi_cpu::cpu::boot::{BootConfig, StackPointers};
use tdmi_cpu::cpu::cpu_modes::Mode;
use tdmi_cpu::cpu::fetch::FetchKind;
use tdmi_cpu::cpu::psr::CpuState;
use tdmi_cpu::cpu::registers::{REG_LR, REG_SP};
use tdmi_cpu::interrupt_control::InterruptKind;

fn boot<B: Bus>(memory: B) -> Arm7tdmi<B> {
    let config = BootConfig {
        initial_mode: Mode::System,
        entry_point: 0,
        stack_pointers: StackPointers {
            user: 0x800,
            irq: 0x900,
            supervisor: 0xA00,
        },
    };
    Arm7tdmi::with_config(memory, &config)
}

fn arm_program(words: &[u32]) -> Arm7tdmi<FlatMemory> {
    let mut memory = FlatMemory::new(0x1000);
    memory.load_words(0, words);
    boot(memory)
}

fn run<B: Bus>(cpu: &mut Arm7tdmi<B>, steps: usize) {
    for _ in 0..steps {
        cpu.step();
    }
}

#[test]
fn mov_then_adds() {
    let mut cpu = arm_program(&[
        0xE3A0_0005, // MOV R0, #5
        0xE090_0000, // ADDS R0, R0, R0
    ]);

    run(&mut cpu, 2);

    assert_eq!(cpu.register(0), 10);
    assert!(!cpu.cpsr.zero_flag());
    assert!(!cpu.cpsr.sign_flag());
    assert!(!cpu.cpsr.carry_flag());
    assert!(!cpu.cpsr.overflow_flag());
    assert_eq!(cpu.instruction_address(), 8);
}

#[test]
fn compare_with_zero() {
    let mut cpu = arm_program(&[
        0xE3A0_0000, // MOV R0, #0
        0xE350_0000, // CMP R0, #0
    ]);

    run(&mut cpu, 2);

    assert!(cpu.cpsr.zero_flag());
    assert!(cpu.cpsr.carry_flag());
    assert!(!cpu.cpsr.sign_flag());
    assert!(!cpu.cpsr.overflow_flag());
}

// An odd address loads the aligned halfword rotated right by 8, whatever its
// position inside the word.
#[test]
fn misaligned_halfword_loads_rotate() {
    let mut memory = FlatMemory::new(0x1000);
    memory.load_words(
        0,
        &[
            0xE3A0_1C01, // MOV R1, #0x100
            0xE1D1_00B1, // LDRH R0, [R1, #1]
            0xE1D1_20B3, // LDRH R2, [R1, #3]
        ],
    );
    memory.load_words(0x100, &[0xAABB_CCDD]);
    let mut cpu = boot(memory);

    run(&mut cpu, 3);

    assert_eq!(cpu.register(0), 0xDD00_00CC);
    assert_eq!(cpu.register(2), 0xBB00_00AA);
}

#[test]
fn countdown_loop_stops_on_branch_to_self() {
    let mut cpu = arm_program(&[
        0xE3A0_0005, // MOV R0, #5
        0xE250_0001, // loop: SUBS R0, R0, #1
        0x1AFF_FFFD, // BNE loop
        0xEAFF_FFFE, // B .
    ]);

    let mut steps = 0;
    loop {
        let address = cpu.instruction_address();
        cpu.step();
        steps += 1;
        if cpu.instruction_address() == address {
            break;
        }
    }

    assert_eq!(steps, 12);
    assert_eq!(cpu.register(0), 0);
    assert!(cpu.cpsr.zero_flag());
    assert_eq!(cpu.instruction_address(), 0x0C);
}

#[test]
fn irq_entry_and_return() {
    let mut memory = FlatMemory::new(0x1000);
    memory.load_words(
        0,
        &[
            0xE3A0_0001, // MOV R0, #1
            0xE3A0_0002, // MOV R0, #2
            0xEAFF_FFFE, // B .
        ],
    );
    memory.load_words(0x18, &[0xE25E_F004]); // SUBS PC, LR, #4
    let mut cpu = boot(memory);
    let cpsr_before = cpu.cpsr;

    cpu.step();
    assert_eq!(cpu.instruction_address(), 4);

    cpu.interrupt_control.interrupt_enable = InterruptKind::VBlank.mask();
    cpu.interrupt_control.interrupt_master_enable = 1;
    cpu.interrupt_control.queue_interrupt(InterruptKind::VBlank);

    assert_eq!(cpu.step(), FetchKind::None);
    assert_eq!(cpu.cpsr.mode(), Mode::Irq);
    assert!(cpu.cpsr.irq_disable());
    assert_eq!(cpu.register(REG_LR), 4 + 4);
    assert_eq!(cpu.register(REG_SP), 0x900);
    assert_eq!(cpu.spsr(), Some(cpsr_before));
    assert_eq!(cpu.instruction_address(), 0x18);
    assert_eq!(cpu.register(0), 1);

    cpu.interrupt_control
        .acknowledge(InterruptKind::VBlank.mask());
    cpu.step();

    assert_eq!(cpu.cpsr, cpsr_before);
    assert_eq!(cpu.instruction_address(), 4);
    cpu.step();
    assert_eq!(cpu.register(0), 2);
}

#[test]
fn irq_is_held_off_by_cpsr_i() {
    let mut cpu = arm_program(&[0xE3A0_0001, 0xE3A0_0002]);
    cpu.cpsr.set_irq_disable(true);
    cpu.interrupt_control.interrupt_enable = InterruptKind::Timer0.mask();
    cpu.interrupt_control.interrupt_master_enable = 1;
    cpu.interrupt_control.queue_interrupt(InterruptKind::Timer0);

    cpu.step();

    assert_eq!(cpu.cpsr.mode(), Mode::System);
    assert_eq!(cpu.register(0), 1);
}

#[test]
fn fiq_entry_masks_both_lines() {
    let mut cpu = arm_program(&[0xE3A0_0001, 0xE3A0_0002]);
    cpu.step();

    cpu.raise_fiq();
    cpu.step();

    assert_eq!(cpu.cpsr.mode(), Mode::Fiq);
    assert!(cpu.cpsr.irq_disable());
    assert!(cpu.cpsr.fiq_disable());
    assert_eq!(cpu.register(REG_LR), 8);
    assert_eq!(cpu.instruction_address(), 0x1C);
}

#[test]
fn fiq_and_user_r8_are_separate() {
    let mut cpu = arm_program(&[
        0xE3A0_8001, // MOV R8, #1
        0xE3A0_7007, // MOV R7, #7
        0xE321_F0D1, // MSR CPSR_c, #0xD1 (FIQ)
        0xE3A0_8002, // MOV R8, #2
        0xE321_F0DF, // MSR CPSR_c, #0xDF (System)
    ]);

    run(&mut cpu, 4);
    assert_eq!(cpu.cpsr.mode(), Mode::Fiq);
    assert_eq!(cpu.register(8), 2);
    assert_eq!(cpu.register(7), 7);

    cpu.step();
    assert_eq!(cpu.cpsr.mode(), Mode::System);
    assert_eq!(cpu.register(8), 1);
    assert_eq!(cpu.register(7), 7);
}

#[test]
fn thumb_interworking_with_bl() {
    let mut memory = FlatMemory::new(0x1000);
    memory.load_words(
        0,
        &[
            0xE28F_0001, // ADD R0, PC, #1
            0xE12F_FF10, // BX R0
        ],
    );
    memory.load_halfwords(
        0x08,
        &[
            0x2107, // MOV R1, #7
            0xF000, // BL 0x20 (high half)
            0xF809, // BL 0x20 (low half)
            0xE7FE, // B .
        ],
    );
    memory.load_halfwords(
        0x20,
        &[
            0x2203, // MOV R2, #3
            0x4770, // BX LR
        ],
    );
    let mut cpu = boot(memory);

    run(&mut cpu, 2);
    assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
    assert_eq!(cpu.instruction_address(), 0x08);

    run(&mut cpu, 3);
    assert_eq!(cpu.instruction_address(), 0x20);
    assert_eq!(cpu.register(REG_LR), 0x0F);

    run(&mut cpu, 2);
    assert_eq!(cpu.cpsr.cpu_state(), CpuState::Thumb);
    assert_eq!(cpu.instruction_address(), 0x0E);
    assert_eq!(cpu.register(1), 7);
    assert_eq!(cpu.register(2), 3);
}

#[test]
fn software_interrupt_round_trip() {
    let mut memory = FlatMemory::new(0x1000);
    memory.load_words(
        0,
        &[
            0xEF00_0000, // SWI #0
            0xE3A0_0001, // MOV R0, #1
        ],
    );
    memory.load_words(0x08, &[0xE1B0_F00E]); // MOVS PC, LR
    let mut cpu = boot(memory);

    assert_eq!(cpu.step(), FetchKind::None);
    assert_eq!(cpu.cpsr.mode(), Mode::Supervisor);
    assert_eq!(cpu.register(REG_SP), 0xA00);
    assert_eq!(cpu.instruction_address(), 0x08);

    assert_eq!(cpu.step(), FetchKind::Branch);
    assert_eq!(cpu.cpsr.mode(), Mode::System);
    assert_eq!(cpu.instruction_address(), 4);

    cpu.step();
    assert_eq!(cpu.register(0), 1);
}

#[test]
fn push_and_pop_through_the_stack() {
    let mut cpu = arm_program(&[
        0xE3A0_0011, // MOV R0, #0x11
        0xE3A0_1022, // MOV R1, #0x22
        0xE92D_0003, // STMDB SP!, {R0, R1}
        0xE3A0_0000, // MOV R0, #0
        0xE3A0_1000, // MOV R1, #0
        0xE8BD_000C, // LDMIA SP!, {R2, R3}
    ]);

    run(&mut cpu, 6);

    assert_eq!(cpu.register(2), 0x11);
    assert_eq!(cpu.register(3), 0x22);
    assert_eq!(cpu.register(REG_SP), 0x800);
}

#[test]
fn snapshot_resumes_identically() {
    let words = [
        0xE3A0_0005, // MOV R0, #5
        0xE250_0001, // SUBS R0, R0, #1
        0x1AFF_FFFD, // BNE -12
        0xEAFF_FFFE, // B .
    ];
    let mut cpu = arm_program(&words);
    run(&mut cpu, 3);

    let json = serde_json::to_string(&cpu.snapshot()).unwrap();
    let snapshot: CpuSnapshot = serde_json::from_str(&json).unwrap();

    let mut resumed = arm_program(&words);
    resumed.restore_snapshot(snapshot);

    run(&mut cpu, 5);
    run(&mut resumed, 5);

    assert_eq!(resumed.registers(), cpu.registers());
    assert_eq!(resumed.cpsr, cpu.cpsr);
}

/// Flat memory that remembers how internal cycles reached it.
struct KindLog {
    memory: FlatMemory,
    internal_accesses: u32,
    idles: u32,
}

impl KindLog {
    fn note(&mut self, kind: CycleKind) {
        if kind == CycleKind::Internal {
            self.internal_accesses += 1;
        }
    }
}

impl Bus for KindLog {
    fn read_8(&mut self, address: u32, kind: CycleKind) -> u8 {
        self.note(kind);
        self.memory.read_8(address, kind)
    }

    fn read_16(&mut self, address: u32, kind: CycleKind) -> u16 {
        self.note(kind);
        self.memory.read_16(address, kind)
    }

    fn read_32(&mut self, address: u32, kind: CycleKind) -> u32 {
        self.note(kind);
        self.memory.read_32(address, kind)
    }

    fn write_8(&mut self, address: u32, value: u8, kind: CycleKind) {
        self.note(kind);
        self.memory.write_8(address, value, kind);
    }

    fn write_16(&mut self, address: u32, value: u16, kind: CycleKind) {
        self.note(kind);
        self.memory.write_16(address, value, kind);
    }

    fn write_32(&mut self, address: u32, value: u32, kind: CycleKind) {
        self.note(kind);
        self.memory.write_32(address, value, kind);
    }

    fn idle(&mut self) {
        self.idles += 1;
    }
}

#[test]
fn internal_cycles_only_come_through_idle() {
    let mut memory = FlatMemory::new(0x1000);
    memory.load_words(
        0,
        &[
            0xE3A0_1C01, // MOV R1, #0x100
            0xE591_0000, // LDR R0, [R1]
            0xE002_0090, // MUL R2, R0, R0
            0xE581_2004, // STR R2, [R1, #4]
        ],
    );
    memory.load_words(0x100, &[3]);
    let mut cpu = boot(KindLog {
        memory,
        internal_accesses: 0,
        idles: 0,
    });

    run(&mut cpu, 4);

    assert_eq!(cpu.register(2), 9);
    assert_eq!(cpu.bus.memory.read_32(0x104, CycleKind::NonSequential), 9);
    assert_eq!(cpu.bus.internal_accesses, 0);
    // One for the load, one for a multiplier that fits in 8 bits.
    assert_eq!(cpu.bus.idles, 2);
}
