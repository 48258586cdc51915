#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

//! The cheat engine of the snes emulator. Cheats patch bytes anywhere in the address space of the system, and keep
//! the patched bytes in place while the game runs.

pub mod bml;
pub mod cheat;
pub mod config;
pub mod genie;
pub mod memory;
pub mod session;

#[cfg(test)]
mod tests;

pub use cheat::{Cheat, CheatError, CheatGroup, CheatStore, GroupId};
pub use config::CheatConfiguration;
pub use memory::{AddressSpace, SnesMemory, SnesMemoryBus, SnesPeripherals};
pub use session::{CheatCommand, CheatCommandSender, CheatSession};
