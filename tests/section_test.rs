use incc::address::{AddressTable, PatchKind};
use incc::section::{Section, SectionId};

#[test]
fn put_address_writes_placeholder_and_records_fixup() {
    let mut text = Section::new(SectionId::Text);
    let mut table = AddressTable::new();
    let target = table.create(Some("callee".to_string()));

    text.put_u8(0xE8); // call rel32
    text.put_address(target, PatchKind::Rel32, &mut table);

    assert_eq!(text.bytes, vec![0xE8, 0, 0, 0, 0]);

    table.define(target, 0x401050);
    table.finalize_section_relative(|_| 0);
    let fixups = table.fixups_with_targets();
    assert_eq!(fixups.len(), 1);
    assert_eq!(fixups[0].0.offset, 1);
    assert_eq!(fixups[0].1, 0x401050);
}

#[test]
fn addr_here_resolves_after_section_layout() {
    let mut text = Section::new(SectionId::Text);
    let mut table = AddressTable::new();
    text.put_u8(0x90);
    let label = text.addr_here(&mut table, Some("here".to_string()));
    table.finalize_section_relative(|id| match id {
        SectionId::Text => 0x00401000,
        SectionId::Data => 0x00402000,
    });
    assert_eq!(table.definition(label), Some(0x00401001));
}
