//! Decoders for the bytecode streams embedded in the ROM.
//!
//! Both grammars follow the same loop: read the opcode at the cursor, derive
//! the instruction length from it, emit, advance. Instructions never extend
//! past the owning section; a truncated final instruction is clamped and
//! reported instead of reading into the next section.

pub mod behavior;
pub mod level;

use itertools::Itertools;

pub use behavior::{decode_behavior_script, write_behavior_script, BehaviorInstruction};
pub use level::{write_level_script, LayoutState, LevelCommand, LevelScript, LevelScriptDecoder};

/// `0xAA, 0xBB, ...` as accepted by `.byte`.
pub fn hex_source(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("0x{:02X}", b)).join(", ")
}

/// Clamp `len` bytes at `pos` to what is left of a buffer of `available` bytes.
pub(crate) fn clamp_len(pos: usize, len: usize, available: usize) -> usize {
    len.min(available.saturating_sub(pos))
}
