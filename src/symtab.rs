// The symbol table: one name -> Symbol map, plus a deduplicating
// string-literal pool and an import lookup table.
//
// Name resolution happens only at link time (every call site already
// holds the resolved Address handle by the time parsing finishes); this
// module just owns the maps and the forward-declaration rule.

use std::collections::HashMap;

use crate::address::{Address, AddressTable};
use crate::diagnostics::Location;

#[derive(Debug, Clone)]
pub struct Symbol {
    pub address: Address,
    pub is_import: bool,
    pub defined_at: Option<Location>,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
    string_pool: HashMap<String, Address>,
    imports: HashMap<(String, String), Address>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    // Looks up `name`, creating a forward-referenced (undefined) address
    // on first use if it hasn't been seen before.
    pub fn lookup_or_forward_declare(&mut self, name: &str, addresses: &mut AddressTable) -> Address {
        if let Some(sym) = self.symbols.get(name) {
            return sym.address;
        }
        let address = addresses.create(Some(name.to_string()));
        self.symbols.insert(
            name.to_string(),
            Symbol {
                address,
                is_import: false,
                defined_at: None,
            },
        );
        address
    }

    // Records that `name` is (or will become) a thunk-backed import
    // symbol, so lookup_or_forward_declare finds the thunk's address
    // rather than minting a second one.
    pub fn declare_import_thunk(&mut self, name: &str, address: Address, at: Location) {
        self.symbols.insert(
            name.to_string(),
            Symbol {
                address,
                is_import: true,
                defined_at: Some(at),
            },
        );
    }

    pub fn mark_defined(&mut self, name: &str, at: Location) {
        if let Some(sym) = self.symbols.get_mut(name) {
            sym.defined_at = Some(at);
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.symbols
            .get(name)
            .map(|s| s.defined_at.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    // Returns the (dll, func) pair's Indirect32 IAT-slot address,
    // creating it (undefined, to be filled in by the PE builder once
    // .idata layout is known) on first request.
    pub fn import_slot(
        &mut self,
        dll: &str,
        func: &str,
        addresses: &mut AddressTable,
    ) -> Address {
        let key = (dll.to_string(), func.to_string());
        if let Some(addr) = self.imports.get(&key) {
            return *addr;
        }
        let addr = addresses.create(Some(format!("{dll}!{func}")));
        self.imports.insert(key, addr);
        addr
    }

    pub fn imports(&self) -> impl Iterator<Item = (&(String, String), &Address)> {
        self.imports.iter()
    }

    // Interns `content`, returning the same Address for repeated
    // identical content. `emit` is called only the first time, to append
    // the UTF-8 bytes plus NUL into .data and return the address
    // defined at their start.
    pub fn intern_string(&mut self, content: &str, emit: impl FnOnce() -> Address) -> Address {
        if let Some(addr) = self.string_pool.get(content) {
            return *addr;
        }
        let addr = emit();
        self.string_pool.insert(content.to_string(), addr);
        addr
    }
}
