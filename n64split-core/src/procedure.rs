use serde::{Deserialize, Serialize};

use crate::config::hex_u32;

/// A RAM address range believed to hold one disassemblable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(deserialize_with = "hex_u32")]
    pub start: u32,
    /// Exclusive.
    #[serde(deserialize_with = "hex_u32")]
    pub end: u32,
    #[serde(default)]
    pub name: Option<String>,
}

impl Procedure {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            name: None,
        }
    }

    pub fn named(start: u32, end: u32, name: impl Into<String>) -> Self {
        Self {
            start,
            end,
            name: Some(name.into()),
        }
    }

    pub fn symbol(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("proc_{:08X}", self.start),
        }
    }
}

/// Known code boundaries, sorted by start address.
///
/// Built once before decomposition from the configuration and the
/// disassembler pre-pass, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProcedureIndex {
    procedures: Vec<Procedure>,
}

impl ProcedureIndex {
    /// Sort and merge procedures from several sources.
    ///
    /// When two sources name the same start address the first one wins, so
    /// configured procedures should be passed before discovered ones.
    pub fn build(procedures: impl IntoIterator<Item = Procedure>) -> Self {
        let mut procedures: Vec<Procedure> = procedures.into_iter().collect();
        // stable, keeps source priority among equal starts
        procedures.sort_by_key(|p| p.start);
        procedures.dedup_by(|later, earlier| {
            if later.start != earlier.start {
                return false;
            }
            if earlier.name.is_none() {
                earlier.name = later.name.take();
            }
            true
        });
        Self { procedures }
    }

    pub fn len(&self) -> usize {
        self.procedures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Procedure> {
        self.procedures.iter()
    }

    /// The contiguous run of procedures whose start lies in `[ram_start, ram_end)`.
    pub fn within(&self, ram_start: u32, ram_end: u32) -> &[Procedure] {
        let first = self.procedures.partition_point(|p| p.start < ram_start);
        let last = self.procedures.partition_point(|p| p.start < ram_end);
        &self.procedures[first..last.max(first)]
    }
}
