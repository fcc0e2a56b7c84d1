use incc::address::AddressTable;
use incc::assembler::{Encoder, Imm, Reg};
use incc::section::{Section, SectionId};

fn encoder<'a>(text: &'a mut Section, addresses: &'a mut AddressTable) -> Encoder<'a> {
    Encoder { text, addresses }
}

#[test]
fn push_imm32_literal() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    encoder(&mut text, &mut addresses).push_imm32(Imm::Literal(0x2A));
    assert_eq!(text.bytes, vec![0x68, 0x2A, 0x00, 0x00, 0x00]);
}

#[test]
fn push_pop_registers() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let mut enc = encoder(&mut text, &mut addresses);
    enc.push_reg(Reg::Ebp);
    enc.pop_reg(Reg::Ebp);
    assert_eq!(text.bytes, vec![0x55, 0x5D]);
}

#[test]
fn prologue_bytes() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let mut enc = encoder(&mut text, &mut addresses);
    enc.push_reg(Reg::Ebp);
    enc.mov_reg_reg(Reg::Ebp, Reg::Esp);
    // push ebp; mov ebp, esp
    assert_eq!(text.bytes, vec![0x55, 0x89, 0xE5]);
}

#[test]
fn epilogue_bytes() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let mut enc = encoder(&mut text, &mut addresses);
    enc.leave();
    enc.ret();
    assert_eq!(text.bytes, vec![0xC9, 0xC3]);
}

#[test]
fn call_rel32_leaves_zero_placeholder_and_fixup() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let target = addresses.create(Some("callee".to_string()));
    encoder(&mut text, &mut addresses).call_rel32(target);
    assert_eq!(text.bytes, vec![0xE8, 0, 0, 0, 0]);
}

#[test]
fn call_indirect_matches_iat_thunk_encoding() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let slot = addresses.create(Some("exit".to_string()));
    encoder(&mut text, &mut addresses).call_indirect(slot);
    assert_eq!(&text.bytes[0..2], &[0xFF, 0x15]);
}

#[test]
fn jnz_rel32_encoding() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let target = addresses.create(Some("loop_top".to_string()));
    encoder(&mut text, &mut addresses).jnz_rel32(target);
    assert_eq!(text.bytes, vec![0x0F, 0x85, 0, 0, 0, 0]);
}

#[test]
fn cmp_and_inc_encodings() {
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let mut enc = encoder(&mut text, &mut addresses);
    enc.inc_reg(Reg::Ecx);
    enc.cmp_reg_imm32(Reg::Ecx, Imm::Literal(10));
    assert_eq!(text.bytes, vec![0x41, 0x81, 0xF9, 0x0A, 0x00, 0x00, 0x00]);
}

#[test]
fn argument_load_sequence() {
    // mov eax, ebp; add eax, 8; push [eax]
    let mut text = Section::new(SectionId::Text);
    let mut addresses = AddressTable::new();
    let mut enc = encoder(&mut text, &mut addresses);
    enc.mov_reg_reg(Reg::Eax, Reg::Ebp);
    enc.add_reg_imm32(Reg::Eax, Imm::Literal(8));
    enc.push_mem_reg(Reg::Eax);
    assert_eq!(
        text.bytes,
        vec![0x89, 0xE8, 0x81, 0xC0, 0x08, 0x00, 0x00, 0x00, 0xFF, 0x30]
    );
}
