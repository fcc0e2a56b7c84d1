use incc::address::{AddressTable, Fixup, PatchKind};
use incc::section::SectionId;

#[test]
fn forward_reference_then_define() {
    let mut table = AddressTable::new();
    let addr = table.create(Some("main".to_string()));
    assert!(!table.is_defined(addr));
    table.add_fixup(
        addr,
        Fixup {
            section: SectionId::Text,
            offset: 4,
            kind: PatchKind::Rel32,
        },
    );
    table.define(addr, 0x401000);
    assert_eq!(table.definition(addr), Some(0x401000));
    assert!(table.undefined_names().is_empty());
}

#[test]
fn undefined_symbol_is_reported_by_name() {
    let mut table = AddressTable::new();
    table.create(Some("nope".to_string()));
    assert_eq!(table.undefined_names(), vec!["nope".to_string()]);
}
