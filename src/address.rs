// The address / patch (relocation) system.
//
// An Address is a handle into an arena owned by the Compiler. It may be
// referenced, which records a Fixup at the current write position of some
// section, before it is ever defined. Definition sets the handle's absolute
// image address exactly once; the link pass then walks every recorded
// fixup and rewrites the placeholder bytes.

use crate::section::SectionId;

// The three relocation kinds the encoder can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    // Absolute 4-byte little-endian value.
    Abs32,
    // 4-byte little-endian signed displacement relative to the
    // instruction's end.
    Rel32,
    // Absolute 4-byte pointer slot read indirectly (call/jmp [mem]).
    // Resolved identically to Abs32; the distinction only ever targets
    // an IAT slot.
    Indirect32,
}

// A fixup site: a location inside a section whose 4 bytes must be
// rewritten once the target Address is defined.
#[derive(Debug, Clone, Copy)]
pub struct Fixup {
    pub section: SectionId,
    pub offset: usize,
    pub kind: PatchKind,
}

// Opaque handle to a relocatable address. Cheap to copy; the real state
// lives in the owning AddressTable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(usize);

// How an address's final numeric value is known.
#[derive(Debug, Clone, Copy)]
enum Definition {
    // Already an absolute VA (e.g. an import's IAT slot, computed once
    // the .idata layout is known).
    Value(u32),
    // Defined at the current write position of a Section; the section's
    // own virtual address is not known until layout, so this is resolved
    // to a Value in AddressTable::finalize_section_relative.
    AtOffset { section: SectionId, offset: usize },
}

#[derive(Debug, Default)]
struct AddressSlot {
    definition: Option<Definition>,
    // Name used only for the "undefined: <name>" diagnostic.
    name: Option<String>,
    fixups: Vec<Fixup>,
}

// Arena of every Address created during a compile. Owned by the Compiler
// for the whole run.
#[derive(Debug, Default)]
pub struct AddressTable {
    slots: Vec<AddressSlot>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    // Creates a fresh, undefined address. `name` is attached for
    // diagnostics only (e.g. a forward-referenced user symbol).
    pub fn create(&mut self, name: Option<String>) -> Address {
        self.slots.push(AddressSlot {
            definition: None,
            name,
            fixups: Vec::new(),
        });
        Address(self.slots.len() - 1)
    }

    pub fn is_defined(&self, addr: Address) -> bool {
        self.slots[addr.0].definition.is_some()
    }

    // The resolved absolute value, if known. Returns None both for
    // undefined addresses and for addresses still pending section
    // layout (use after finalize_section_relative).
    pub fn definition(&self, addr: Address) -> Option<u32> {
        match self.slots[addr.0].definition {
            Some(Definition::Value(v)) => Some(v),
            _ => None,
        }
    }

    // Defines `addr` as an already-known absolute VA (used for import
    // addresses, whose value the PE builder computes directly). May
    // only be called once per address.
    pub fn define(&mut self, addr: Address, value: u32) {
        let slot = &mut self.slots[addr.0];
        debug_assert!(slot.definition.is_none(), "address defined more than once");
        slot.definition = Some(Definition::Value(value));
    }

    // Defines `addr` at the current write position of `section`. The
    // absolute value is filled in later by finalize_section_relative,
    // once every section has a virtual address.
    pub fn define_at_offset(&mut self, addr: Address, section: SectionId, offset: usize) {
        let slot = &mut self.slots[addr.0];
        debug_assert!(slot.definition.is_none(), "address defined more than once");
        slot.definition = Some(Definition::AtOffset { section, offset });
    }

    // Records a fixup site referencing `addr`, to be rewritten at link time.
    pub fn add_fixup(&mut self, addr: Address, fixup: Fixup) {
        self.slots[addr.0].fixups.push(fixup);
    }

    // Converts every AtOffset definition into an absolute Value using
    // `section_va`, the virtual address assigned to each section during
    // layout. Must run after every define/define_at_offset call and
    // before fixups_with_targets.
    pub fn finalize_section_relative(&mut self, section_va: impl Fn(SectionId) -> u32) {
        for slot in &mut self.slots {
            if let Some(Definition::AtOffset { section, offset }) = slot.definition {
                slot.definition = Some(Definition::Value(section_va(section) + offset as u32));
            }
        }
    }

    // Names of every address that never received a definition, in
    // creation order, used to build the "undefined: <name>" report.
    pub fn undefined_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter(|s| s.definition.is_none())
            .map(|s| s.name.clone().unwrap_or_else(|| "<anonymous>".to_string()))
            .collect()
    }

    // All (fixup, resolved target) pairs, in creation order. Panics if
    // any referenced address is still unresolved; callers must check
    // undefined_names and call finalize_section_relative first.
    pub fn fixups_with_targets(&self) -> Vec<(Fixup, u32)> {
        let mut out = Vec::new();
        for slot in &self.slots {
            let target = match slot.definition {
                Some(Definition::Value(v)) => v,
                _ => panic!("fixups_with_targets called with an unresolved address"),
            };
            for fixup in &slot.fixups {
                out.push((*fixup, target));
            }
        }
        out
    }
}
