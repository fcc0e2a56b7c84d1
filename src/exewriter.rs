// The PE image builder: section layout, the import directory, the patch
// (link) pass, and header emission.
//
// Section sizes follow the actual emitted code/data, and the import
// table is built from however many DLLs/functions the source actually
// declared, resolved through a real patch (relocation) pass.

use crate::address::PatchKind;
use crate::compiler::{Compiler, IMAGE_BASE};
use crate::diagnostics::CompileError;
use crate::section::SectionId;

const SECTION_ALIGNMENT: u32 = 0x1000;
const FILE_ALIGNMENT: u32 = 0x200;

fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) / align * align
}

// Builds the final image bytes for `compiler`, or reports every symbol
// that was referenced but never defined. No file is written on error.
pub fn build_image(compiler: &mut Compiler) -> Result<Vec<u8>, CompileError> {
    let text_len = compiler.text.bytes.len() as u32;
    let data_len = compiler.data.bytes.len() as u32;

    let text_va = IMAGE_BASE + SECTION_ALIGNMENT;
    let data_va = text_va + align_up(text_len, SECTION_ALIGNMENT);
    let idata_va = data_va + align_up(data_len, SECTION_ALIGNMENT);

    compiler.text.va = text_va;
    compiler.data.va = data_va;

    // Group imports by DLL, sorted for determinism: the symbol table's
    // hash map does not iterate in a stable order, and identical source
    // must yield a byte-identical image every time.
    let mut by_dll: std::collections::BTreeMap<String, Vec<(String, crate::address::Address)>> =
        std::collections::BTreeMap::new();
    for ((dll, func), addr) in compiler.symbols.imports() {
        by_dll
            .entry(dll.clone())
            .or_default()
            .push((func.clone(), *addr));
    }
    for funcs in by_dll.values_mut() {
        funcs.sort_by(|a, b| a.0.cmp(&b.0));
    }
    let imports: Vec<(String, Vec<(String, crate::address::Address)>)> =
        by_dll.into_iter().collect();

    let mut idata_bytes = Vec::new();
    let resolved_iat = write_idata(&mut idata_bytes, &imports, idata_va);
    for (addr, value) in resolved_iat {
        compiler.addresses.define(addr, value);
    }

    let undefined = compiler.addresses.undefined_names();
    if !undefined.is_empty() {
        return Err(CompileError::UndefinedSymbols { names: undefined });
    }

    compiler
        .addresses
        .finalize_section_relative(|id| match id {
            SectionId::Text => text_va,
            SectionId::Data => data_va,
        });

    apply_patches(compiler);

    let entry_point_va = compiler
        .addresses
        .definition(compiler.entry_point)
        .expect("entry point always defined by Compiler::new");

    Ok(assemble_image(
        compiler,
        &idata_bytes,
        text_va,
        data_va,
        idata_va,
        entry_point_va,
    ))
}

// The link pass proper: rewrites every recorded fixup's 4 placeholder
// bytes with its resolved target, per relocation kind.
fn apply_patches(compiler: &mut Compiler) {
    for (fixup, target) in compiler.addresses.fixups_with_targets() {
        let section = match fixup.section {
            SectionId::Text => &mut compiler.text,
            SectionId::Data => &mut compiler.data,
        };
        let value = match fixup.kind {
            PatchKind::Abs32 | PatchKind::Indirect32 => target,
            PatchKind::Rel32 => {
                let site_end = section.va + fixup.offset as u32 + 4;
                target.wrapping_sub(site_end)
            }
        };
        section.bytes[fixup.offset..fixup.offset + 4].copy_from_slice(&value.to_le_bytes());
    }
}

// Import Lookup/Address Tables, Hint/Name pool and descriptor array.
// Returns, for every imported function, the absolute VA of its IAT
// slot; callers feed this straight into AddressTable::define for the
// corresponding Indirect32 address.
fn write_idata(
    idata: &mut Vec<u8>,
    imports: &[(String, Vec<(String, crate::address::Address)>)],
    idata_va: u32,
) -> Vec<(crate::address::Address, u32)> {
    let mut ilt_ref = Vec::new();
    let mut iat_ref = Vec::new();
    let mut name_ref = Vec::new();

    for _ in imports {
        ilt_ref.push(write_u32(idata, 0)); // OriginalFirstThunk (ILT RVA)
        write_u32(idata, 0); // TimeDateStamp
        write_u32(idata, 0); // ForwarderChain
        name_ref.push(write_u32(idata, 0)); // Name (dll name RVA)
        iat_ref.push(write_u32(idata, 0)); // FirstThunk (IAT RVA)
    }
    // Null descriptor terminates the table.
    for _ in 0..5 {
        write_u32(idata, 0);
    }

    let mut ilt_hint_slots: Vec<Vec<usize>> = Vec::new();
    for (import_index, (_, funcs)) in imports.iter().enumerate() {
        let ilt_rva = idata_va + idata.len() as u32;
        let mut slots = Vec::new();
        for _ in funcs {
            slots.push(write_u32(idata, 0));
        }
        write_u32(idata, 0); // ILT terminator
        write_at_u32(idata, ilt_ref[import_index], ilt_rva);
        ilt_hint_slots.push(slots);
    }

    let mut iat_hint_slots: Vec<Vec<usize>> = Vec::new();
    let mut iat_slot_va: Vec<Vec<u32>> = Vec::new();
    for (import_index, (_, funcs)) in imports.iter().enumerate() {
        let iat_rva = idata_va + idata.len() as u32;
        let mut slots = Vec::new();
        let mut vas = Vec::new();
        for (i, _) in funcs.iter().enumerate() {
            slots.push(write_u32(idata, 0));
            vas.push(iat_rva + (i as u32) * 4);
        }
        write_u32(idata, 0); // IAT terminator
        write_at_u32(idata, iat_ref[import_index], iat_rva);
        iat_hint_slots.push(slots);
        iat_slot_va.push(vas);
    }

    for (import_index, (_, funcs)) in imports.iter().enumerate() {
        for (func_index, (name, _)) in funcs.iter().enumerate() {
            let hint_name_rva = idata_va + idata.len() as u32;
            write_u16(idata, 0); // Hint
            write_bytes(idata, name.as_bytes());
            write_u8(idata, 0);
            if (name.len() + 1) % 2 == 1 {
                write_u8(idata, 0);
            }
            write_at_u32(idata, ilt_hint_slots[import_index][func_index], hint_name_rva);
            write_at_u32(idata, iat_hint_slots[import_index][func_index], hint_name_rva);
        }
    }

    for (import_index, (dll, _)) in imports.iter().enumerate() {
        let name_rva = idata_va + idata.len() as u32;
        write_bytes(idata, dll.as_bytes());
        write_u8(idata, 0);
        if (dll.len() + 1) % 2 == 1 {
            write_u8(idata, 0);
        }
        write_at_u32(idata, name_ref[import_index], name_rva);
    }

    let mut resolved = Vec::new();
    for (import_index, (_, funcs)) in imports.iter().enumerate() {
        for (func_index, (_, addr)) in funcs.iter().enumerate() {
            resolved.push((*addr, iat_slot_va[import_index][func_index]));
        }
    }
    resolved
}

fn assemble_image(
    compiler: &Compiler,
    idata_bytes: &[u8],
    text_va: u32,
    data_va: u32,
    idata_va: u32,
    entry_point_va: u32,
) -> Vec<u8> {
    let text_raw = align_up(compiler.text.bytes.len() as u32, FILE_ALIGNMENT);
    let data_raw = align_up(compiler.data.bytes.len() as u32, FILE_ALIGNMENT);
    let idata_raw = align_up(idata_bytes.len() as u32, FILE_ALIGNMENT);

    let mut header = Vec::new();

    // DOS header (64 bytes).
    write_u16(&mut header, 0x5A4D); // "MZ"
    for _ in 0..29 {
        write_u16(&mut header, 0);
    }
    write_u32(&mut header, 0x80); // e_lfanew: PE header right after the stub.

    // DOS stub (64 bytes): classic "cannot be run in DOS mode" message.
    const DOS_STUB: [u8; 64] = [
        0x0E, 0x1F, 0xBA, 0x0E, 0x00, 0xB4, 0x09, 0xCD, 0x21, 0xB8, 0x01, 0x4C, 0xCD, 0x21, 0x54,
        0x68, 0x69, 0x73, 0x20, 0x70, 0x72, 0x6F, 0x67, 0x72, 0x61, 0x6D, 0x20, 0x63, 0x61, 0x6E,
        0x6E, 0x6F, 0x74, 0x20, 0x62, 0x65, 0x20, 0x72, 0x75, 0x6E, 0x20, 0x69, 0x6E, 0x20, 0x44,
        0x4F, 0x53, 0x20, 0x6D, 0x6F, 0x64, 0x65, 0x2E, 0x0D, 0x0D, 0x0A, 0x24, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
    ];
    write_bytes(&mut header, &DOS_STUB);

    write_bytes(&mut header, b"PE\0\0");

    // COFF file header.
    write_u16(&mut header, 0x014C); // Machine: I386.
    write_u16(&mut header, 3); // Number of sections: .text, .data, .idata.
    write_u32(&mut header, 0); // TimeDateStamp.
    write_u32(&mut header, 0); // PointerToSymbolTable.
    write_u32(&mut header, 0); // NumberOfSymbols.
    let size_of_optional_header_at = write_u16(&mut header, 0);
    write_u16(&mut header, 0x0102); // EXECUTABLE_IMAGE | 32BIT_MACHINE.

    let optional_header_start = header.len();

    // Optional header standard fields (PE32).
    write_u16(&mut header, 0x010B); // Magic: PE32.
    write_u8(&mut header, 0);
    write_u8(&mut header, 1);
    write_u32(&mut header, text_raw);
    write_u32(&mut header, data_raw + idata_raw);
    write_u32(&mut header, 0);
    write_u32(&mut header, entry_point_va - IMAGE_BASE);
    write_u32(&mut header, text_va - IMAGE_BASE); // BaseOfCode.
    write_u32(&mut header, data_va - IMAGE_BASE); // BaseOfData (PE32 only).

    // Optional header Windows-specific fields.
    write_u32(&mut header, IMAGE_BASE);
    write_u32(&mut header, SECTION_ALIGNMENT);
    write_u32(&mut header, FILE_ALIGNMENT);
    write_u16(&mut header, 4); // OS version major.
    write_u16(&mut header, 0);
    write_u16(&mut header, 0); // Image version.
    write_u16(&mut header, 0);
    write_u16(&mut header, 4); // Subsystem version major.
    write_u16(&mut header, 0);
    write_u32(&mut header, 0); // Win32VersionValue.
    let size_of_image_at = write_u32(&mut header, 0);
    let size_of_headers_at = write_u32(&mut header, 0);
    write_u32(&mut header, 0); // CheckSum.
    write_u16(&mut header, 3); // Subsystem: console.
    write_u16(&mut header, 0); // DllCharacteristics.
    write_u32(&mut header, 0x100000); // SizeOfStackReserve.
    write_u32(&mut header, 0x1000); // SizeOfStackCommit.
    write_u32(&mut header, 0x100000); // SizeOfHeapReserve.
    write_u32(&mut header, 0x1000); // SizeOfHeapCommit.
    write_u32(&mut header, 0); // LoaderFlags.
    write_u32(&mut header, 16); // NumberOfRvaAndSizes.

    // Data directories. Only IMPORT (index 1) is populated.
    write_u32(&mut header, 0);
    write_u32(&mut header, 0); // Export table.
    write_u32(&mut header, idata_va);
    write_u32(&mut header, idata_bytes.len() as u32); // Import table.
    for _ in 0..14 {
        write_u32(&mut header, 0);
        write_u32(&mut header, 0);
    }

    let optional_header_end = header.len();
    write_at_u16(
        &mut header,
        size_of_optional_header_at,
        (optional_header_end - optional_header_start) as u16,
    );

    // Headers end right after the (fixed-size, 40 bytes each) section
    // table; computed now so each section's PointerToRawData can be
    // written directly instead of patched afterwards.
    let size_of_headers = align_up(header.len() as u32 + 3 * 40, FILE_ALIGNMENT);
    let text_file_offset = size_of_headers;
    let data_file_offset = text_file_offset + text_raw;
    let idata_file_offset = data_file_offset + data_raw;

    // Section table.
    write_section_header(
        &mut header,
        b".text",
        compiler.text.bytes.len() as u32,
        text_va,
        text_raw,
        text_file_offset,
        0,
    );
    write_section_header(
        &mut header,
        b".data",
        compiler.data.bytes.len() as u32,
        data_va,
        data_raw,
        data_file_offset,
        0xC000_0040,
    );
    write_section_header(
        &mut header,
        b".idata",
        idata_bytes.len() as u32,
        idata_va,
        idata_raw,
        idata_file_offset,
        0x4000_0040,
    );

    write_at_u32(&mut header, size_of_headers_at, size_of_headers);

    let size_of_image = (idata_va + align_up(idata_bytes.len() as u32, SECTION_ALIGNMENT)) - IMAGE_BASE;
    write_at_u32(&mut header, size_of_image_at, size_of_image);

    let mut image = header;
    image.resize(size_of_headers as usize, 0);

    let mut text_padded = compiler.text.bytes.clone();
    text_padded.resize(text_raw as usize, 0);
    image.extend_from_slice(&text_padded);

    let mut data_padded = compiler.data.bytes.clone();
    data_padded.resize(data_raw as usize, 0);
    image.extend_from_slice(&data_padded);

    let mut idata_padded = idata_bytes.to_vec();
    idata_padded.resize(idata_raw as usize, 0);
    image.extend_from_slice(&idata_padded);

    image
}

fn write_section_header(
    header: &mut Vec<u8>,
    name: &[u8],
    virtual_size: u32,
    virtual_address: u32,
    size_of_raw_data: u32,
    pointer_to_raw_data: u32,
    characteristics_override: u32,
) {
    let mut name_field = [0u8; 8];
    name_field[..name.len()].copy_from_slice(name);
    write_bytes(header, &name_field);
    write_u32(header, virtual_size);
    write_u32(header, virtual_address);
    write_u32(header, size_of_raw_data);
    write_u32(header, pointer_to_raw_data);
    write_u32(header, 0); // PointerToRelocations.
    write_u32(header, 0); // PointerToLinenumbers.
    write_u16(header, 0); // NumberOfRelocations.
    write_u16(header, 0); // NumberOfLinenumbers.
    let characteristics = if characteristics_override != 0 {
        characteristics_override
    } else {
        0x6000_0020 // CNT_CODE | EXECUTE | READ
    };
    write_u32(header, characteristics);
}

fn write_u8(buf: &mut Vec<u8>, value: u8) -> usize {
    let index = buf.len();
    buf.push(value);
    index
}

fn write_u16(buf: &mut Vec<u8>, value: u16) -> usize {
    let index = buf.len();
    buf.extend_from_slice(&value.to_le_bytes());
    index
}

fn write_u32(buf: &mut Vec<u8>, value: u32) -> usize {
    let index = buf.len();
    buf.extend_from_slice(&value.to_le_bytes());
    index
}

fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) -> usize {
    let index = buf.len();
    buf.extend_from_slice(data);
    index
}

fn write_at_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn write_at_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}
