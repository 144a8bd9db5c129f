//! Multiboot entry.
//!
//! The loader drops us here in 32-bit protected mode with paging off,
//! EAX holding its magic and EBX the info structure. `_start` installs the
//! kernel's own flat GDT (the TSS and LDT slots are patched by `gdt::init`
//! once Rust is running), sets up the 8 MiB boot stack, and calls
//! `kernel_main`.

use core::arch::global_asm;

global_asm!(
    r#"
.section .multiboot_header, "a"
.align 4
multiboot_header:
    .long 0x1BADB002                    # multiboot v1 magic
    .long 0x00000003                    # flags: page-align modules, memory info
    .long -(0x1BADB002 + 0x00000003)    # checksum

.section .data
.align 16
.global GDT_TABLE
GDT_TABLE:
    .quad 0x0000000000000000            # null
    .quad 0x0000000000000000            # unused
    .quad 0x00CF9A000000FFFF            # kernel code, selector 0x10
    .quad 0x00CF92000000FFFF            # kernel data, selector 0x18
    .quad 0x00CFFA000000FFFF            # user code, selector 0x23
    .quad 0x00CFF2000000FFFF            # user data, selector 0x2B
    .quad 0x0000000000000000            # TSS, patched at boot
    .quad 0x0000000000000000            # LDT, patched at boot
gdt_descriptor:
    .word 8 * 8 - 1
    .long GDT_TABLE

.section .text
.global _start
_start:
    cli
    lgdt [gdt_descriptor]

    # Data segments first; EAX/EBX still carry the multiboot handoff.
    mov cx, 0x18
    mov ds, cx
    mov es, cx
    mov fs, cx
    mov gs, cx
    mov ss, cx
    mov esp, 0x800000

    # Far return to reload CS with the kernel code selector.
    push 0x10
    push offset .Lflat
    retf
.Lflat:
    push ebx                            # multiboot info address
    push eax                            # loader magic
    call kernel_main
.Lhang:
    hlt
    jmp .Lhang
"#
);
