// Append-only byte buffers for the two standing sections.

use crate::address::{Address, AddressTable, Fixup, PatchKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionId {
    Text,
    Data,
}

// `va` is 0 until the image builder assigns it during layout.
#[derive(Debug)]
pub struct Section {
    pub id: SectionId,
    pub bytes: Vec<u8>,
    pub va: u32,
}

impl Section {
    pub fn new(id: SectionId) -> Self {
        Section {
            id,
            bytes: Vec::new(),
            va: 0,
        }
    }

    pub fn current_offset(&self) -> usize {
        self.bytes.len()
    }

    pub fn put_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    // Appends four placeholder zero bytes and registers a fixup against
    // `addr` at the offset just written, per the kind's relocation rule.
    pub fn put_address(&mut self, addr: Address, kind: PatchKind, table: &mut AddressTable) {
        let offset = self.current_offset();
        table.add_fixup(
            addr,
            Fixup {
                section: self.id,
                offset,
                kind,
            },
        );
        self.put_u32(0);
    }

    // Returns a fresh address defined at the current write position.
    pub fn addr_here(&self, table: &mut AddressTable, name: Option<String>) -> Address {
        let addr = table.create(name);
        table.define_at_offset(addr, self.id, self.current_offset());
        addr
    }

    // Defines an already-created (forward-referenced) address at the
    // current write position.
    pub fn define_here(&self, table: &mut AddressTable, addr: Address) {
        table.define_at_offset(addr, self.id, self.current_offset());
    }
}
