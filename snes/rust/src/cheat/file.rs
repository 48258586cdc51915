//! Reading and writing cheat files, and importing cheats from a cheat database.
//!
//! Cheat files are normally structured text. Older cheat files are a list of fixed size binary records, those are
//! still read when the file is not structured text.

use std::path::Path;

use super::{CheatError, CheatStore};
use crate::bml::{self, BmlNode};
use crate::memory::SnesMemoryBus;

/// The size of a single record in a legacy cheat file
pub const LEGACY_RECORD_SIZE: usize = 28;

/// A cheat group as it is stored in a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatRecord {
    /// The name of the group
    pub name: String,
    /// The code text of the group
    pub code: String,
    /// Was the group switched on?
    pub enabled: bool,
}

impl CheatRecord {
    /// Build a record from a `cheat` node. Nodes without a code are ignored.
    fn from_node(node: &BmlNode) -> Option<Self> {
        let code = node.value("code")?;
        let name = node
            .value("name")
            .or_else(|| node.value("description"))
            .unwrap_or("");
        Some(Self {
            name: name.to_string(),
            code: code.to_string(),
            enabled: node.find("enable").is_some(),
        })
    }
}

/// Collect the records of the `cheat` nodes under a node
fn records_under(node: &BmlNode) -> Vec<CheatRecord> {
    node.children_named("cheat")
        .filter_map(CheatRecord::from_node)
        .collect()
}

/// A format that cheat files can be stored in
#[enum_dispatch::enum_dispatch]
pub trait CheatFileFormat {
    /// Try to interpret the contents of a file, returning None when the contents are not in this format.
    fn try_load(&self, data: &[u8]) -> Option<Vec<CheatRecord>>;
}

/// The structured text format
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredText;

impl CheatFileFormat for StructuredText {
    fn try_load(&self, data: &[u8]) -> Option<Vec<CheatRecord>> {
        let text = std::str::from_utf8(data).ok()?;
        let doc = match bml::parse(text) {
            Ok(d) => d,
            Err(e) => {
                log::debug!("Not a structured cheat file: {}", e);
                return None;
            }
        };
        let records = records_under(&doc);
        if records.is_empty() {
            None
        } else {
            Some(records)
        }
    }
}

impl StructuredText {
    /// Write the groups of a store out as text
    pub fn encode(store: &CheatStore) -> String {
        let mut out = String::new();
        for g in store.groups() {
            bml::write_cheat(&mut out, g.name(), &g.text(), g.is_enabled());
        }
        out
    }
}

/// The legacy binary format, 28 bytes per cheat
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyBinary;

impl CheatFileFormat for LegacyBinary {
    fn try_load(&self, data: &[u8]) -> Option<Vec<CheatRecord>> {
        if data.len() < LEGACY_RECORD_SIZE {
            return None;
        }
        Some(
            data.chunks_exact(LEGACY_RECORD_SIZE)
                .map(|r| {
                    let address = u32::from_le_bytes([r[2], r[3], r[4], 0]);
                    let name = &r[8..];
                    let end = name.iter().position(|b| *b == 0).unwrap_or(name.len());
                    CheatRecord {
                        name: String::from_utf8_lossy(&name[..end]).to_string(),
                        code: format!("{:x}={:x}", address, r[1]),
                        enabled: (r[0] & 4) == 0,
                    }
                })
                .collect(),
        )
    }
}

impl LegacyBinary {
    /// Write the groups of a store out as legacy records. Only unconditional cheats fit in the format, so
    /// conditional cheats are left out. Every cheat of a group gets its own record, with the name of the group.
    pub fn encode(store: &CheatStore) -> Vec<u8> {
        let mut out = Vec::new();
        for g in store.groups() {
            for c in g.cheats() {
                if c.condition().is_some() {
                    log::warn!("Cheat {} {} can't be stored as a legacy record", g.name(), c);
                    continue;
                }
                let mut r = [0u8; LEGACY_RECORD_SIZE];
                r[0] = if g.is_enabled() { 0 } else { 4 };
                r[1] = c.value();
                r[2..5].copy_from_slice(&c.address().to_le_bytes()[0..3]);
                let name = g.name().as_bytes();
                let len = name.len().min(LEGACY_RECORD_SIZE - 8);
                r[8..8 + len].copy_from_slice(&name[..len]);
                out.extend_from_slice(&r);
            }
        }
        out
    }
}

/// The cheat file formats, in the order they are tried
#[enum_dispatch::enum_dispatch(CheatFileFormat)]
#[derive(Debug, Clone, Copy)]
pub enum CheatFileHandler {
    /// Structured text
    StructuredText,
    /// Legacy binary records
    LegacyBinary,
}

/// The handlers used when loading a cheat file, in order of preference
pub fn handlers() -> [CheatFileHandler; 2] {
    [StructuredText.into(), LegacyBinary.into()]
}

impl CheatStore {
    /// Add the records to the store, skipping duplicates and records without usable codes. Returns the number of groups added.
    pub fn add_records<B: SnesMemoryBus + ?Sized>(
        &mut self,
        records: Vec<CheatRecord>,
        bus: &mut B,
    ) -> usize {
        let mut count = 0;
        for r in records {
            if self.is_duplicate(&r.name, &r.code) {
                log::debug!("Skipping duplicate cheat {}", r.name);
                continue;
            }
            match self.add_group(&r.name, &r.code) {
                Ok(id) => {
                    if r.enabled {
                        if let Err(e) = self.enable_group(id, bus) {
                            log::warn!("Could not enable cheat {}: {}", r.name, e);
                        }
                    }
                    count += 1;
                }
                Err(e) => {
                    log::warn!("Skipping cheat {}: {}", r.name, e);
                }
            }
        }
        count
    }

    /// Load the cheats from a file, adding them to the store. Returns the number of groups added.
    pub fn load_from_path<B: SnesMemoryBus + ?Sized>(
        &mut self,
        path: &Path,
        bus: &mut B,
    ) -> Result<usize, CheatError> {
        let data = std::fs::read(path)
            .map_err(|e| CheatError::IoFailure(format!("{}: {}", path.display(), e.kind())))?;
        for h in handlers() {
            if let Some(records) = h.try_load(&data) {
                let count = self.add_records(records, bus);
                log::info!("Loaded {} cheats from {}", count, path.display());
                return Ok(count);
            }
        }
        log::warn!("No cheats found in {}", path.display());
        Ok(0)
    }

    /// Save the cheats to a file. When there are no cheats, the file is removed instead.
    pub fn save_to_path(&self, path: &Path) -> Result<(), CheatError> {
        if self.is_empty() {
            return match std::fs::remove_file(path) {
                Ok(()) => {
                    log::debug!("Removed empty cheat file {}", path.display());
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(CheatError::IoFailure(format!(
                    "{}: {}",
                    path.display(),
                    e.kind()
                ))),
            };
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CheatError::IoFailure(format!("{}: {}", parent.display(), e.kind()))
                })?;
            }
        }
        std::fs::write(path, StructuredText::encode(self))
            .map_err(|e| CheatError::IoFailure(format!("{}: {}", path.display(), e.kind())))?;
        log::debug!("Saved {} cheats to {}", self.len(), path.display());
        Ok(())
    }

    /// Import the cheats for a rom from a cheat database, using the sha256 of the rom to find its entry.
    /// Returns the number of groups added.
    pub fn import_from_database<B: SnesMemoryBus + ?Sized>(
        &mut self,
        path: &Path,
        rom_hash: &str,
        bus: &mut B,
    ) -> Result<usize, CheatError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            log::warn!("Unable to read cheat database {}: {}", path.display(), e);
            CheatError::NoDatabaseFile
        })?;
        let doc = bml::parse(&text).map_err(|e| {
            log::warn!("Unable to parse cheat database {}: {}", path.display(), e);
            CheatError::NoDatabaseFile
        })?;
        let cart = doc
            .children_named("cartridge")
            .find(|c| {
                c.value("sha256")
                    .is_some_and(|h| h.eq_ignore_ascii_case(rom_hash))
            })
            .ok_or(CheatError::NoDatabaseMatch)?;
        let count = self.add_records(records_under(cart), bus);
        log::info!("Imported {} cheats from {}", count, path.display());
        Ok(count)
    }
}
