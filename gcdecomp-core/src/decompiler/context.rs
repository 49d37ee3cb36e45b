//! Binary Context and ABI Configuration
//!
//! A [`BinaryContext`] bundles everything the per-subroutine pipeline needs
//! from the outside world: the memory image and the CodeWarrior ABI
//! configuration. No global state exists; the context is passed explicitly
//! into every consumer.

use serde::{Deserialize, Serialize};

use crate::decompiler::datasource::Gpr;
use crate::decompiler::decoder::InstOperation;
use crate::decompiler::error::DecompilerError;
use crate::decompiler::memory::{pattern_scan_image, RandomAccessData, SectionedData};

/// Byte pattern of the canonical `_savegpr_14` helper: eighteen
/// `stw r14+k, -0x48+4k(r11)` stores followed by `blr`.
const SAVEGPR_PATTERN: &str = "91 cb ff b8 91 eb ff bc 92 0b ff c0 92 2b ff c4 92 4b ff c8 92 6b \
     ff cc 92 8b ff d0 92 ab ff d4 92 cb ff d8 92 eb ff dc 93 0b ff e0 93 2b ff e4 93 4b ff e8 \
     93 6b ff ec 93 8b ff f0 93 ab ff f4 93 cb ff f8 93 eb ff fc 4e 80 00 20";

/// Byte pattern of the canonical `_restgpr_14` helper.
const RESTGPR_PATTERN: &str = "81 cb ff b8 81 eb ff bc 82 0b ff c0 82 2b ff c4 82 4b ff c8 82 6b \
     ff cc 82 8b ff d0 82 ab ff d4 82 cb ff d8 82 eb ff dc 83 0b ff e0 83 2b ff e4 83 4b ff e8 \
     83 6b ff ec 83 8b ff f0 83 ab ff f4 83 cb ff f8 83 eb ff fc 4e 80 00 20";

/// Byte length of a save/rest helper entered at its lowest entry point:
/// 18 stores/loads plus the trailing `blr`.
const ABI_HELPER_LEN: u32 = 0x4c;

/// CodeWarrior ABI configuration for the binary being decompiled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CwAbiConfiguration {
    /// If rtoc and r13 are provided, later passes can substitute TOC
    /// references for literal values.
    pub rtoc_base: Option<u32>,
    pub r13_base: Option<u32>,

    /// savegpr and restgpr can be guessed from their structure, but it is
    /// more reliable to have a set definition configured by the user.
    pub savegpr_start: Option<u32>,
    pub restgpr_start: Option<u32>,
}

impl CwAbiConfiguration {
    /// Parse a configuration from its JSON sidecar representation.
    pub fn from_json(text: &str) -> Result<Self, DecompilerError> {
        serde_json::from_str(text).map_err(DecompilerError::from)
    }

    /// Locate the savegpr/restgpr helpers in a raw image by byte pattern.
    pub fn discover_abi_helpers(&mut self, image: &SectionedData) {
        if self.savegpr_start.is_none() {
            self.savegpr_start = pattern_scan_image(image, SAVEGPR_PATTERN);
            if let Some(va) = self.savegpr_start {
                log::debug!("discovered _savegpr helpers at {:#010x}", va);
            }
        }
        if self.restgpr_start.is_none() {
            self.restgpr_start = pattern_scan_image(image, RESTGPR_PATTERN);
            if let Some(va) = self.restgpr_start {
                log::debug!("discovered _restgpr helpers at {:#010x}", va);
            }
        }
    }
}

/// The memory image plus ABI knowledge for one binary.
pub struct BinaryContext {
    pub ram: Box<dyn RandomAccessData>,
    pub abi: CwAbiConfiguration,
    pub entrypoint: Option<u32>,
}

impl BinaryContext {
    /// Wrap a raw code blob at `base` with entrypoint `entrypoint`, running
    /// ABI helper discovery over it.
    pub fn from_raw(base: u32, entrypoint: u32, bytes: &[u8]) -> Self {
        let mut image = SectionedData::new();
        image.add_section(base, bytes.to_vec());

        let mut abi = CwAbiConfiguration::default();
        abi.discover_abi_helpers(&image);

        BinaryContext {
            ram: Box::new(image),
            abi,
            entrypoint: Some(entrypoint),
        }
    }

    /// Whether `addr` points into a savegpr/restgpr ABI helper.
    ///
    /// Prefers the configured ranges; falls back to structural detection of
    /// the canonical 18-instruction sequence at `addr` itself.
    pub fn is_abi_routine(&self, addr: u32) -> bool {
        let in_helper = |start: Option<u32>| {
            start.is_some_and(|s| addr.wrapping_sub(s) < ABI_HELPER_LEN && addr >= s)
        };
        if in_helper(self.abi.savegpr_start) || in_helper(self.abi.restgpr_start) {
            return true;
        }
        detect_savegpr(self.ram.as_ref(), addr) || detect_restgpr(self.ram.as_ref(), addr)
    }
}

/// Structural check for a savegpr entry point: a run of `stw r14+k, d(r11)`
/// with consecutive registers, ending in `blr`.
fn detect_savegpr(ram: &dyn RandomAccessData, addr: u32) -> bool {
    let first = ram.read_instruction(addr);
    let (Some(reg), Some(mem)) = (first.read_gpr(), first.write_mem_off()) else {
        return false;
    };
    if first.op != InstOperation::Stw || reg < Gpr::R14 || mem.base != Gpr::R11 {
        return false;
    }

    let mut expected = reg.0 + 1;
    let mut cursor = addr.wrapping_add(4);
    loop {
        let inst = ram.read_instruction(cursor);
        if inst.is_blr() {
            return true;
        }
        let stores_next = inst.op == InstOperation::Stw
            && inst.read_gpr() == Some(Gpr(expected))
            && inst.write_mem_off().map(|m| m.base) == Some(Gpr::R11);
        if !stores_next || expected >= 32 {
            return false;
        }
        expected += 1;
        cursor = cursor.wrapping_add(4);
    }
}

/// Structural check for a restgpr entry point, mirroring [`detect_savegpr`]
/// with `lwz` loads.
fn detect_restgpr(ram: &dyn RandomAccessData, addr: u32) -> bool {
    let first = ram.read_instruction(addr);
    let (Some(reg), Some(mem)) = (first.write_gpr(), first.read_mem_off()) else {
        return false;
    };
    if first.op != InstOperation::Lwz || reg < Gpr::R14 || mem.base != Gpr::R11 {
        return false;
    }

    let mut expected = reg.0 + 1;
    let mut cursor = addr.wrapping_add(4);
    loop {
        let inst = ram.read_instruction(cursor);
        if inst.is_blr() {
            return true;
        }
        let loads_next = inst.op == InstOperation::Lwz
            && inst.write_gpr() == Some(Gpr(expected))
            && inst.read_mem_off().map(|m| m.base) == Some(Gpr::R11);
        if !loads_next || expected >= 32 {
            return false;
        }
        expected += 1;
        cursor = cursor.wrapping_add(4);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_config_json() {
        let conf = CwAbiConfiguration::from_json(
            r#"{"rtoc_base": 2147483648, "r13_base": null, "savegpr_start": 1024, "restgpr_start": null}"#,
        )
        .unwrap();
        assert_eq!(conf.rtoc_base, Some(0x8000_0000));
        assert_eq!(conf.savegpr_start, Some(1024));
        assert_eq!(conf.restgpr_start, None);
    }

    #[test]
    fn test_configured_helper_range() {
        let ctx = BinaryContext {
            ram: Box::new(SectionedData::new()),
            abi: CwAbiConfiguration {
                savegpr_start: Some(0x1000),
                ..Default::default()
            },
            entrypoint: None,
        };
        assert!(ctx.is_abi_routine(0x1000));
        assert!(ctx.is_abi_routine(0x1048));
        assert!(!ctx.is_abi_routine(0x104c));
        assert!(!ctx.is_abi_routine(0xffc));
    }
}
