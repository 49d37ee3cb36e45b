//! gcdecomp-core
//!
//! Analysis core of a static decompiler for 32-bit PowerPC (Gekko/Broadway)
//! executables built against the CodeWarrior console ABI. Given a memory
//! image, an entrypoint, and an ABI configuration, it reconstructs, one
//! subroutine at a time, a structured high-level representation suitable for
//! pseudo-C emission.
//!
//! Binary container parsing (DOL/ELF) and textual emission are out of scope:
//! callers supply a [`decompiler::RandomAccessData`] view of the image and
//! consume the structured tree plus IR that
//! [`decompiler::decompile_subroutine`] produces.

pub mod decompiler;
