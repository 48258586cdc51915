//! The emulation session, which owns the memory of the system and the cheats for the game that is running.
//!
//! Only the emulation thread touches the session. Other threads, such as a user interface, ask for changes to the
//! cheats with a [`CheatCommandSender`], and the changes are made at the start of the next frame.

use crate::cheat::{CheatError, CheatStore, GroupId};
use crate::config::CheatConfiguration;
use crate::memory::{AddressSpace, SnesMemory, SnesPeripherals};

/// A change to the cheats, requested from another thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheatCommand {
    /// Add a new group of cheats
    Add {
        /// The name of the group
        name: String,
        /// The codes of the group
        code: String,
    },
    /// Replace the name and codes of a group
    Modify {
        /// The group to change
        id: GroupId,
        /// The new name
        name: String,
        /// The new codes
        code: String,
    },
    /// Remove a group
    Delete(GroupId),
    /// Switch a group on
    Enable(GroupId),
    /// Switch a group off
    Disable(GroupId),
    /// Flip the global switch for all cheats
    SetGlobal(bool),
    /// Remove all cheats
    Clear,
}

/// Used to send cheat commands to a session from any thread
#[derive(Clone)]
pub struct CheatCommandSender {
    /// The sending half of the command queue
    sender: async_channel::Sender<CheatCommand>,
}

impl CheatCommandSender {
    /// Queue a command for the session. Fails only when the session no longer exists.
    pub fn send(&self, cmd: CheatCommand) -> Result<(), async_channel::SendError<CheatCommand>> {
        self.sender.send_blocking(cmd)
    }

    /// Queue a command for the session, from async code
    pub async fn send_async(
        &self,
        cmd: CheatCommand,
    ) -> Result<(), async_channel::SendError<CheatCommand>> {
        self.sender.send(cmd).await
    }
}

/// Everything needed to run cheats on a running system
pub struct CheatSession<P: SnesPeripherals> {
    /// The memory of the system
    memory: SnesMemory,
    /// The rest of the hardware visible on the bus
    peripherals: P,
    /// The cheats for the current game
    cheats: CheatStore,
    /// The cheat configuration
    config: CheatConfiguration,
    /// The name of the rom that is loaded, if there is one
    rom_name: Option<String>,
    /// Used to hand out senders
    sender: async_channel::Sender<CheatCommand>,
    /// Commands waiting to be run
    recvr: async_channel::Receiver<CheatCommand>,
}

impl<P: SnesPeripherals> CheatSession<P> {
    /// Start a session. The global cheat switch starts out as the configuration says.
    pub fn new(config: CheatConfiguration, memory: SnesMemory, peripherals: P) -> Self {
        let (sender, recvr) = async_channel::unbounded();
        Self {
            memory,
            peripherals,
            cheats: CheatStore::new(config.cheats_enabled),
            config,
            rom_name: None,
            sender,
            recvr,
        }
    }

    /// Get a sender for queueing commands from another thread
    pub fn sender(&self) -> CheatCommandSender {
        CheatCommandSender {
            sender: self.sender.clone(),
        }
    }

    /// The memory of the system
    pub fn memory(&self) -> &SnesMemory {
        &self.memory
    }

    /// Mutable access to the memory, for the cpu core
    pub fn memory_mut(&mut self) -> &mut SnesMemory {
        &mut self.memory
    }

    /// Mutable access to the peripherals
    pub fn peripherals_mut(&mut self) -> &mut P {
        &mut self.peripherals
    }

    /// The cheats of the session
    pub fn cheats(&self) -> &CheatStore {
        &self.cheats
    }

    /// The configuration of the session
    pub fn config(&self) -> &CheatConfiguration {
        &self.config
    }

    /// The rom that is loaded
    pub fn rom_name(&self) -> Option<&str> {
        self.rom_name.as_deref()
    }

    /// The system bus, for peeking and poking memory
    pub fn bus(&mut self) -> AddressSpace<'_, P> {
        AddressSpace::new(&mut self.memory, &mut self.peripherals)
    }

    /// The sha256 of the rom, used to find the rom in a cheat database
    pub fn rom_hash(&self) -> String {
        common_emulator::calc_sha256(self.memory.rom())
    }

    /// Called when a game has been loaded. Loads the cheats for the game, returning the number of groups loaded.
    pub fn content_loaded(&mut self, rom_name: &str) -> Result<usize, CheatError> {
        if self.rom_name.is_some() {
            self.content_unloaded()?;
        }
        self.rom_name = Some(rom_name.to_string());
        let path = self.config.cheat_file(rom_name);
        let mut count = if path.exists() {
            let mut bus = AddressSpace::new(&mut self.memory, &mut self.peripherals);
            self.cheats.load_from_path(&path, &mut bus)?
        } else {
            0
        };
        if count == 0 && self.config.auto_import && self.config.database.is_some() {
            match self.import_from_database() {
                Ok(n) => count = n,
                Err(e) => log::info!("No cheats imported for {}: {}", rom_name, e),
            }
        }
        Ok(count)
    }

    /// Called when a game is about to be unloaded. Saves the cheats for the game and removes them from memory.
    pub fn content_unloaded(&mut self) -> Result<(), CheatError> {
        let result = match self.rom_name.take() {
            Some(rom) => self.cheats.save_to_path(&self.config.cheat_file(&rom)),
            None => Ok(()),
        };
        let mut bus = AddressSpace::new(&mut self.memory, &mut self.peripherals);
        self.cheats.clear(&mut bus);
        result
    }

    /// Import cheats for the loaded rom from the configured database
    pub fn import_from_database(&mut self) -> Result<usize, CheatError> {
        let db = self
            .config
            .database
            .clone()
            .ok_or(CheatError::NoDatabaseFile)?;
        let hash = self.rom_hash();
        let mut bus = AddressSpace::new(&mut self.memory, &mut self.peripherals);
        self.cheats.import_from_database(&db, &hash, &mut bus)
    }

    /// Run a single command right away
    pub fn execute(&mut self, cmd: CheatCommand) -> Result<(), CheatError> {
        let mut bus = AddressSpace::new(&mut self.memory, &mut self.peripherals);
        match cmd {
            CheatCommand::Add { name, code } => self.cheats.add_group(&name, &code).map(|_| ()),
            CheatCommand::Modify { id, name, code } => {
                self.cheats.modify_group(id, &name, &code, &mut bus)
            }
            CheatCommand::Delete(id) => self.cheats.delete_group(id, &mut bus),
            CheatCommand::Enable(id) => self.cheats.enable_group(id, &mut bus),
            CheatCommand::Disable(id) => self.cheats.disable_group(id, &mut bus),
            CheatCommand::SetGlobal(e) => {
                self.cheats.set_global_enabled(e, &mut bus);
                Ok(())
            }
            CheatCommand::Clear => {
                self.cheats.clear(&mut bus);
                Ok(())
            }
        }
    }

    /// Run all of the commands that have been queued
    pub fn process_commands(&mut self) {
        while let Ok(cmd) = self.recvr.try_recv() {
            log::debug!("Cheat command {:?}", cmd);
            if let Err(e) = self.execute(cmd) {
                log::warn!("Cheat command failed: {}", e);
            }
        }
    }

    /// Called once per frame, between batches of cpu instructions
    pub fn frame(&mut self) {
        self.process_commands();
        let mut bus = AddressSpace::new(&mut self.memory, &mut self.peripherals);
        self.cheats.tick(&mut bus);
    }
}
