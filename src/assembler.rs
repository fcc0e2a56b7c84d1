// The 32-bit x86 instruction encoder.
//
// Every function here appends byte-accurate encodings straight onto a
// .text Section and, for operands carrying an Address, registers a
// fixup through the AddressTable instead of resolving anything itself.
// There is no intermediate instruction representation: the parser calls
// these functions directly as it recognizes source constructs.

use crate::address::{Address, AddressTable, PatchKind};
use crate::section::Section;

// The eight 32-bit general purpose registers, encoded exactly as their
// x86 register number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Eax = 0,
    Ecx = 1,
    Edx = 2,
    Ebx = 3,
    Esp = 4,
    Ebp = 5,
    Esi = 6,
    Edi = 7,
}

impl Reg {
    fn code(self) -> u8 {
        self as u8
    }
}

// An immediate operand: either a plain literal or a relocatable Address.
#[derive(Debug, Clone, Copy)]
pub enum Imm {
    Literal(u32),
    Address(Address),
}

// Borrowed handle to the two pieces every encoding function needs: the
// .text buffer it appends to, and the address table it registers
// fixups in. Constructed fresh at each call site in the parser.
pub struct Encoder<'a> {
    pub text: &'a mut Section,
    pub addresses: &'a mut AddressTable,
}

impl<'a> Encoder<'a> {
    fn put_imm32(&mut self, imm: Imm) {
        match imm {
            Imm::Literal(v) => self.text.put_u32(v),
            Imm::Address(addr) => self
                .text
                .put_address(addr, PatchKind::Abs32, self.addresses),
        }
    }

    // push imm32: 68 <imm32>.
    pub fn push_imm32(&mut self, imm: Imm) {
        self.text.put_u8(0x68);
        self.put_imm32(imm);
    }

    // push reg32: 50+rd.
    pub fn push_reg(&mut self, reg: Reg) {
        self.text.put_u8(0x50 + reg.code());
    }

    // push [reg32]: FF /6, mod=00, r/m=reg.
    pub fn push_mem_reg(&mut self, reg: Reg) {
        self.text.put_u8(0xFF);
        self.text.put_u8(0b00_110_000 | reg.code());
    }

    // pop reg32: 58+rd.
    pub fn pop_reg(&mut self, reg: Reg) {
        self.text.put_u8(0x58 + reg.code());
    }

    // mov reg32, imm32: B8+rd <imm32>.
    pub fn mov_reg_imm32(&mut self, dst: Reg, imm: Imm) {
        self.text.put_u8(0xB8 + dst.code());
        self.put_imm32(imm);
    }

    // mov reg32, reg32: 89 /r, mod=11.
    pub fn mov_reg_reg(&mut self, dst: Reg, src: Reg) {
        self.text.put_u8(0x89);
        self.text
            .put_u8(0b11_000_000 | (src.code() << 3) | dst.code());
    }

    // add reg32, imm32: 81 /0 <imm32>. Always emits the 32-bit immediate
    // form, never the shorter imm8 variant (no peephole optimization here).
    pub fn add_reg_imm32(&mut self, dst: Reg, imm: Imm) {
        self.text.put_u8(0x81);
        self.text.put_u8(0b11_000_000 | dst.code());
        self.put_imm32(imm);
    }

    // inc reg32: 40+rd.
    pub fn inc_reg(&mut self, reg: Reg) {
        self.text.put_u8(0x40 + reg.code());
    }

    // cmp reg32, imm32: 81 /7 <imm32>.
    pub fn cmp_reg_imm32(&mut self, dst: Reg, imm: Imm) {
        self.text.put_u8(0x81);
        self.text.put_u8(0b11_111_000 | dst.code());
        self.put_imm32(imm);
    }

    // call rel32: E8 <rel32>.
    pub fn call_rel32(&mut self, target: Address) {
        self.text.put_u8(0xE8);
        self.text
            .put_address(target, PatchKind::Rel32, self.addresses);
    }

    // call [mem32]: FF /2, mod=00, disp32 = an Indirect32 address (used
    // to call straight through an IAT slot).
    pub fn call_indirect(&mut self, iat_slot: Address) {
        self.text.put_u8(0xFF);
        self.text.put_u8(0b00_010_101);
        self.text
            .put_address(iat_slot, PatchKind::Indirect32, self.addresses);
    }

    // jmp rel32: E9 <rel32>.
    pub fn jmp_rel32(&mut self, target: Address) {
        self.text.put_u8(0xE9);
        self.text
            .put_address(target, PatchKind::Rel32, self.addresses);
    }

    // jmp [mem32]: FF /4, mod=00, disp32 = an Indirect32 address.
    pub fn jmp_indirect(&mut self, iat_slot: Address) {
        self.text.put_u8(0xFF);
        self.text.put_u8(0b00_100_101);
        self.text
            .put_address(iat_slot, PatchKind::Indirect32, self.addresses);
    }

    // jnz rel32: 0F 85 <rel32>.
    pub fn jnz_rel32(&mut self, target: Address) {
        self.text.put_u8(0x0F);
        self.text.put_u8(0x85);
        self.text
            .put_address(target, PatchKind::Rel32, self.addresses);
    }

    // ret: C3.
    pub fn ret(&mut self) {
        self.text.put_u8(0xC3);
    }

    // leave: C9.
    pub fn leave(&mut self) {
        self.text.put_u8(0xC9);
    }
}
