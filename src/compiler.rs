// The explicit compile-time context. All global mutable state becomes an
// explicit Compiler passed through the parser and encoder; there is no
// ambient singleton.
//
// Owns the two standing sections, the address/patch arena and the
// symbol table for the whole compile. A single Compiler is shared
// across every input file so that all symbols share one global
// namespace.

use crate::address::{Address, AddressTable};
use crate::assembler::{Encoder, Imm, Reg};
use crate::diagnostics::Location;
use crate::section::{Section, SectionId};
use crate::symtab::SymbolTable;

pub const IMAGE_BASE: u32 = 0x0040_0000;

pub struct Compiler {
    pub text: Section,
    pub data: Section,
    pub addresses: AddressTable,
    pub symbols: SymbolTable,
    pub entry_point: Address,
}

impl Compiler {
    // Creates a fresh compiler and immediately emits the synthetic
    // _start thunk: call main; push eax; call [msvcrt.dll!exit]; 0: jmp 0b.
    pub fn new() -> Self {
        let mut text = Section::new(SectionId::Text);
        let data = Section::new(SectionId::Data);
        let mut addresses = AddressTable::new();
        let mut symbols = SymbolTable::new();

        let entry_point = text.addr_here(&mut addresses, Some("_start".to_string()));
        let main = symbols.lookup_or_forward_declare("main", &mut addresses);
        let exit_slot = symbols.import_slot("msvcrt.dll", "exit", &mut addresses);

        {
            let mut enc = Encoder {
                text: &mut text,
                addresses: &mut addresses,
            };
            enc.call_rel32(main);
            enc.push_reg(Reg::Eax);
            enc.call_indirect(exit_slot);
        }
        let spin = text.addr_here(&mut addresses, Some("_start.spin".to_string()));
        {
            let mut enc = Encoder {
                text: &mut text,
                addresses: &mut addresses,
            };
            enc.jmp_rel32(spin);
        }

        Compiler {
            text,
            data,
            addresses,
            symbols,
            entry_point,
        }
    }

    pub fn encoder(&mut self) -> Encoder<'_> {
        Encoder {
            text: &mut self.text,
            addresses: &mut self.addresses,
        }
    }

    // Looks up or forward-declares a user (or class-prefixed) symbol by
    // name, for use as a call rel32 target.
    pub fn resolve_call_target(&mut self, name: &str) -> Address {
        self.symbols
            .lookup_or_forward_declare(name, &mut self.addresses)
    }

    // Defines `name` at the function entry address just reached in
    // .text. Reuses the address created by an earlier forward
    // reference if there was one.
    pub fn define_function_here(&mut self, name: &str, at: Location) -> Address {
        let addr = self
            .symbols
            .lookup_or_forward_declare(name, &mut self.addresses);
        self.text.define_here(&mut self.addresses, addr);
        self.symbols.mark_defined(name, at);
        addr
    }

    // Allocates an IAT slot, emits a jmp [IAT_slot] thunk in .text, and
    // defines the user symbol `name` at the thunk's address. Direct user
    // calls therefore resolve call rel32 -> thunk -> jmp [IAT], never
    // call [IAT] directly.
    pub fn define_import_thunk(&mut self, dll: &str, name: &str, at: Location) -> Address {
        let iat_slot = self.symbols.import_slot(dll, name, &mut self.addresses);
        let thunk = self
            .text
            .addr_here(&mut self.addresses, Some(name.to_string()));
        self.encoder().jmp_indirect(iat_slot);
        self.symbols.declare_import_thunk(name, thunk, at);
        thunk
    }

    // Interns a string literal into .data, deduplicating by content.
    pub fn intern_string(&mut self, content: &str) -> Address {
        let data = &mut self.data;
        let addresses = &mut self.addresses;
        self.symbols.intern_string(content, || {
            let addr = data.addr_here(addresses, Some(format!("str:{content}")));
            data.put_bytes(content.as_bytes());
            data.put_u8(0);
            addr
        })
    }

    // Emits the argument-load sequence for parameter index `i`:
    // mov eax, ebp; add eax, (i+2)*4; push [eax].
    pub fn push_argument_by_index(&mut self, index: usize) {
        let disp = ((index as u32) + 2) * 4;
        let mut enc = self.encoder();
        enc.mov_reg_reg(Reg::Eax, Reg::Ebp);
        enc.add_reg_imm32(Reg::Eax, Imm::Literal(disp));
        enc.push_mem_reg(Reg::Eax);
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
