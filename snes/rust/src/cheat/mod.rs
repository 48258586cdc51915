//! The cheat engine. Cheats are grouped together under a name, and each group can be switched on and off.
//! Enabled cheats keep forcing their byte into memory every time the engine ticks, and give the original
//! byte back when they are switched off.

pub mod codec;
pub mod file;

use crate::memory::SnesMemoryBus;

pub use codec::{cheat_to_text, group_to_text, parse_cheat, parse_group};

/// The index of a cheat group in a cheat store
pub type GroupId = usize;

/// The errors that can occur operating on cheats
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CheatError {
    /// The text is not a recognized cheat code
    #[error("unrecognized cheat code: {0}")]
    ParseFailure(String),
    /// None of the codes in a group could be parsed
    #[error("the cheat group contains no usable codes")]
    EmptyGroup,
    /// The group index does not exist
    #[error("there is no cheat group {0}")]
    NotFound(GroupId),
    /// Reading or writing a cheat file failed
    #[error("cheat file error: {0}")]
    IoFailure(String),
    /// The cheat database could not be opened or understood
    #[error("the cheat database could not be read")]
    NoDatabaseFile,
    /// The cheat database has no entry for the game
    #[error("the cheat database has no entry for the game")]
    NoDatabaseMatch,
    /// The configuration could not be written
    #[error("configuration error: {0}")]
    Config(String),
}

/// A single patched byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cheat {
    /// The 24-bit address that gets patched
    address: u32,
    /// The value forced into the address
    value: u8,
    /// When present, the value is only forced while the game has this value at the address
    condition: Option<u8>,
    /// True while the cheat is applied to memory
    enabled: bool,
    /// True while the condition of a conditional cheat has been seen
    condition_met: bool,
    /// The byte the game had at the address before the cheat touched it
    saved: u8,
}

impl Cheat {
    /// Create a cheat that always forces value at the address
    pub fn new(address: u32, value: u8) -> Self {
        Self {
            address: address & crate::memory::ADDRESS_MASK,
            value,
            condition: None,
            enabled: false,
            condition_met: false,
            saved: 0,
        }
    }

    /// Create a cheat that only forces value while the game has condition at the address
    pub fn conditional(address: u32, value: u8, condition: u8) -> Self {
        Self {
            condition: Some(condition),
            ..Self::new(address, value)
        }
    }

    /// The address that gets patched
    pub fn address(&self) -> u32 {
        self.address
    }

    /// The value that gets written
    pub fn value(&self) -> u8 {
        self.value
    }

    /// The condition byte, if the cheat is conditional
    pub fn condition(&self) -> Option<u8> {
        self.condition
    }

    /// Is the cheat applied to memory?
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Has the condition of the cheat been met? Always true for an enabled unconditional cheat.
    pub fn condition_met(&self) -> bool {
        self.condition_met
    }

    /// The byte most recently observed from the game at the address
    pub fn saved_byte(&self) -> u8 {
        self.saved
    }

    /// Is the cheat currently supposed to hold its value in memory?
    fn forcing(&self) -> bool {
        self.condition.is_none() || self.condition_met
    }

    /// Apply the cheat to memory
    pub fn enable<B: SnesMemoryBus + ?Sized>(&mut self, bus: &mut B) {
        if self.enabled {
            return;
        }
        let byte = bus.peek(self.address);
        self.saved = byte;
        match self.condition {
            Some(c) if byte != c => {
                self.condition_met = false;
            }
            _ => {
                self.condition_met = true;
                bus.poke(self.address, self.value);
            }
        }
        self.enabled = true;
    }

    /// Remove the cheat from memory, putting back the byte the game had
    pub fn disable<B: SnesMemoryBus + ?Sized>(&mut self, bus: &mut B) {
        if !self.enabled {
            return;
        }
        if self.forcing() {
            bus.poke(self.address, self.saved);
        }
        self.enabled = false;
        self.condition_met = false;
    }

    /// Check memory against what the cheat expects to be there, reapplying it when the game has changed the byte.
    pub fn update<B: SnesMemoryBus + ?Sized>(&mut self, bus: &mut B) {
        if !self.enabled {
            return;
        }
        let current = bus.peek(self.address);
        let expected = if self.forcing() {
            self.value
        } else {
            self.saved
        };
        if current != expected {
            self.saved = current;
            match self.condition {
                Some(c) => {
                    if self.condition_met && current != c {
                        self.condition_met = false;
                    } else if !self.condition_met && current == c {
                        self.condition_met = true;
                        bus.poke(self.address, self.value);
                    }
                }
                None => bus.poke(self.address, self.value),
            }
        } else if let Some(c) = self.condition {
            if !self.condition_met && current == c {
                self.condition_met = true;
                bus.poke(self.address, self.value);
            }
        }
    }
}

impl std::fmt::Display for Cheat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&cheat_to_text(self))
    }
}

/// A named set of cheats that are switched on and off together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatGroup {
    /// The name shown to the user
    name: String,
    /// Has the user switched the group on?
    enabled: bool,
    /// The cheats of the group, never empty
    cheats: Vec<Cheat>,
}

impl CheatGroup {
    /// The name of the group
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Has the group been switched on?
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The cheats that make up the group
    pub fn cheats(&self) -> &[Cheat] {
        &self.cheats
    }

    /// The canonical code text of the group
    pub fn text(&self) -> String {
        group_to_text(&self.cheats)
    }

    /// Apply every cheat of the group
    fn apply<B: SnesMemoryBus + ?Sized>(&mut self, bus: &mut B) {
        for c in self.cheats.iter_mut() {
            c.enable(bus);
        }
    }

    /// Remove every cheat of the group
    fn remove<B: SnesMemoryBus + ?Sized>(&mut self, bus: &mut B) {
        for c in self.cheats.iter_mut() {
            c.disable(bus);
        }
    }
}

/// All of the cheats for the currently running game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatStore {
    /// The groups, in the order they were added
    groups: Vec<CheatGroup>,
    /// The global switch for all cheats
    enabled: bool,
}

impl Default for CheatStore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CheatStore {
    /// Create an empty store, with the global switch in the given position
    pub fn new(enabled: bool) -> Self {
        Self {
            groups: Vec::new(),
            enabled,
        }
    }

    /// The number of groups
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Are there no groups?
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Retrieve a group
    pub fn group(&self, id: GroupId) -> Option<&CheatGroup> {
        self.groups.get(id)
    }

    /// All of the groups
    pub fn groups(&self) -> &[CheatGroup] {
        &self.groups
    }

    /// Are cheats globally allowed to touch memory?
    pub fn is_global_enabled(&self) -> bool {
        self.enabled
    }

    /// Mutable access to a group, or the appropriate error
    fn group_mut(&mut self, id: GroupId) -> Result<&mut CheatGroup, CheatError> {
        self.groups.get_mut(id).ok_or(CheatError::NotFound(id))
    }

    /// Add a new group, initially disabled. Codes that can't be parsed are left out, and a group with nothing usable is rejected.
    pub fn add_group(&mut self, name: &str, code: &str) -> Result<GroupId, CheatError> {
        let cheats = parse_group(code);
        if cheats.is_empty() {
            log::warn!("Rejecting cheat {} with no usable codes: {}", name, code);
            return Err(CheatError::EmptyGroup);
        }
        log::debug!("Adding cheat {} with {} codes", name, cheats.len());
        self.groups.push(CheatGroup {
            name: name.to_string(),
            enabled: false,
            cheats,
        });
        Ok(self.groups.len() - 1)
    }

    /// Replace the name and code of a group. The group is switched off first, and stays off.
    pub fn modify_group<B: SnesMemoryBus + ?Sized>(
        &mut self,
        id: GroupId,
        name: &str,
        code: &str,
        bus: &mut B,
    ) -> Result<(), CheatError> {
        if id >= self.groups.len() {
            return Err(CheatError::NotFound(id));
        }
        let cheats = parse_group(code);
        if cheats.is_empty() {
            return Err(CheatError::EmptyGroup);
        }
        let g = self.group_mut(id)?;
        g.remove(bus);
        g.name = name.to_string();
        g.enabled = false;
        g.cheats = cheats;
        log::debug!("Modified cheat {} {}", id, name);
        Ok(())
    }

    /// Remove a group, restoring memory first. Later groups move down by one.
    pub fn delete_group<B: SnesMemoryBus + ?Sized>(
        &mut self,
        id: GroupId,
        bus: &mut B,
    ) -> Result<(), CheatError> {
        let g = self.group_mut(id)?;
        g.remove(bus);
        let g = self.groups.remove(id);
        log::debug!("Deleted cheat {} {}", id, g.name);
        Ok(())
    }

    /// Switch a group on. Memory is only touched when cheats are globally enabled.
    pub fn enable_group<B: SnesMemoryBus + ?Sized>(
        &mut self,
        id: GroupId,
        bus: &mut B,
    ) -> Result<(), CheatError> {
        let global = self.enabled;
        let g = self.group_mut(id)?;
        g.enabled = true;
        if global {
            g.apply(bus);
        }
        Ok(())
    }

    /// Switch a group off, restoring memory
    pub fn disable_group<B: SnesMemoryBus + ?Sized>(
        &mut self,
        id: GroupId,
        bus: &mut B,
    ) -> Result<(), CheatError> {
        let g = self.group_mut(id)?;
        g.remove(bus);
        g.enabled = false;
        Ok(())
    }

    /// Flip the global switch. Groups keep their own switch, only their effect on memory changes.
    pub fn set_global_enabled<B: SnesMemoryBus + ?Sized>(&mut self, enabled: bool, bus: &mut B) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        for g in self.groups.iter_mut().filter(|g| g.enabled) {
            if enabled {
                g.apply(bus);
            } else {
                g.remove(bus);
            }
        }
        log::info!(
            "Cheats globally {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    /// Called once per frame, reapplies enabled cheats the game has overwritten
    pub fn tick<B: SnesMemoryBus + ?Sized>(&mut self, bus: &mut B) {
        if !self.enabled {
            return;
        }
        for g in self.groups.iter_mut().filter(|g| g.enabled) {
            for c in g.cheats.iter_mut() {
                c.update(bus);
            }
        }
    }

    /// The canonical code text of a group
    pub fn group_text(&self, id: GroupId) -> Result<String, CheatError> {
        self.group(id).map(|g| g.text()).ok_or(CheatError::NotFound(id))
    }

    /// Normalize a code, returning None when nothing in it can be parsed
    pub fn validate(code: &str) -> Option<String> {
        let cheats = parse_group(code);
        if cheats.is_empty() {
            None
        } else {
            Some(group_to_text(&cheats))
        }
    }

    /// Is there already a group with the same name and the same codes, once both are normalized?
    pub fn is_duplicate(&self, name: &str, code: &str) -> bool {
        let text = Self::validate(code);
        self.groups
            .iter()
            .any(|g| g.name == name && Some(g.text()) == text)
    }

    /// Remove every group, restoring memory
    pub fn clear<B: SnesMemoryBus + ?Sized>(&mut self, bus: &mut B) {
        for g in self.groups.iter_mut() {
            g.remove(bus);
        }
        self.groups.clear();
    }
}
