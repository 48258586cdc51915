//! The memory map of the snes, as seen by code that needs to look at or modify memory without being the cpu.
//!
//! The 24 bit address space is cut into 4 KiB blocks. Every block is owned by exactly one [`Region`], looked up
//! through a flat table, and each region kind has its own formula for locating the physical byte.

use std::ops::RangeInclusive;

use common_emulator::PersistentStorage;

/// The number of bits of address covered by a single block of the memory map
pub const MEMMAP_SHIFT: u32 = 12;
/// The size in bytes of a block in the memory map
pub const MEMMAP_BLOCK_SIZE: u32 = 1 << MEMMAP_SHIFT;
/// The number of blocks needed to cover the entire address space
pub const MEMMAP_NUM_BLOCKS: usize = 0x100_0000 >> MEMMAP_SHIFT;
/// The mask for the offset within a block
const MEMMAP_MASK: u32 = MEMMAP_BLOCK_SIZE - 1;
/// Addresses are 24 bits wide
pub const ADDRESS_MASK: u32 = 0xff_ffff;
/// The size of the work ram on the motherboard
pub const WRAM_SIZE: usize = 128 * 1024;

/// The plain arrays of memory that can be mapped directly into the address space
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display)]
pub enum LinearMemory {
    /// The 128k of work ram
    Wram,
    /// The cartridge rom
    Rom,
    /// The primary save ram of the cartridge
    Sram,
    /// The bw-ram of an sa-1 cartridge
    BwRam,
}

/// Coprocessors that can claim part of the address space
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumIter)]
pub enum Coprocessor {
    /// The dsp-n series of math coprocessors
    Dsp,
    /// The data rom of the spc7110
    Spc7110Rom,
    /// The decompression port of the spc7110
    Spc7110Dram,
    /// The capcom cx4
    C4,
    /// The obc1 sprite helper
    Obc1,
    /// The seta st010/st011
    SetaDsp,
    /// The seta st018
    SetaRisc,
    /// The satellaview cartridge
    Bsx,
}

impl Coprocessor {
    /// The address that gets handed to the coprocessor for an access to the given cpu address
    pub fn bus_address(self, addr: u32) -> u32 {
        match self {
            Coprocessor::Dsp | Coprocessor::C4 | Coprocessor::Obc1 => addr & 0xffff,
            Coprocessor::Spc7110Dram => 0x4800,
            Coprocessor::Spc7110Rom
            | Coprocessor::SetaDsp
            | Coprocessor::SetaRisc
            | Coprocessor::Bsx => addr,
        }
    }

    /// Does the coprocessor accept writes through the memory map?
    pub fn writable(self) -> bool {
        !matches!(self, Coprocessor::Spc7110Rom | Coprocessor::Spc7110Dram)
    }
}

/// The register pages of the system
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegisterSpace {
    /// The cpu registers, dma channels and joypad ports (0x4000-0x5fff)
    Cpu,
    /// The b-bus registers, ppu and apu ports (0x2000-0x3fff)
    Ppu,
}

/// Describes what owns a block of the address space
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Region {
    /// Plain memory, the byte lives at base + (address & 0xfff)
    Linear {
        /// Which array of memory
        memory: LinearMemory,
        /// The offset into the memory for the start of the block
        base: u32,
    },
    /// The cpu register page
    CpuRegisters,
    /// The ppu register page
    PpuRegisters,
    /// Lorom save ram
    LoRomSram,
    /// The second save ram chip of a multi cartridge setup
    LoRomSramB,
    /// Hirom save ram
    HiRomSram,
    /// Hirom style save ram that ignores writes
    ReadOnlySram,
    /// Sa-1 bw-ram window at 0x6000-0x7fff
    BwRam,
    /// Sa-1 i-ram/bw-ram, read like lorom save ram
    Sa1Ram,
    /// A coprocessor
    Coprocessor(Coprocessor),
    /// Nothing is connected
    #[default]
    OpenBus,
}

/// The offset into save ram for a lorom style save ram access, before masking
fn lorom_sram_offset(addr: u32) -> u32 {
    ((addr & 0xff0000) >> 1) | (addr & 0x7fff)
}

/// The offset into save ram for a hirom style save ram access, before masking
fn hirom_sram_offset(addr: u32) -> u32 {
    (addr & 0x7fff)
        .wrapping_sub(0x6000)
        .wrapping_add((addr & 0x1f0000) >> 3)
}

/// Calculates where a rom position lands for a rom of the given size, mirroring the way cartridges do for sizes that are not a power of two.
pub fn rom_mirror(size: u32, pos: u32) -> u32 {
    if size == 0 {
        return 0;
    }
    if pos < size {
        return pos;
    }
    let mask = 1u32 << (31 - pos.leading_zeros());
    if size <= mask {
        rom_mirror(size, pos - mask)
    } else {
        mask + rom_mirror(size - mask, pos - mask)
    }
}

/// The lookup table from block to region
#[derive(Clone)]
pub struct MemoryMap {
    /// One entry per block
    blocks: Vec<Region>,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMap {
    /// Create a map where nothing is connected
    pub fn new() -> Self {
        Self {
            blocks: vec![Region::OpenBus; MEMMAP_NUM_BLOCKS],
        }
    }

    /// Retrieve the region that owns the given address
    pub fn region(&self, addr: u32) -> Region {
        self.blocks[((addr & ADDRESS_MASK) >> MEMMAP_SHIFT) as usize]
    }

    /// Assign a region to every block in the given banks and offsets. The closure receives the bank and the offset of the start of each block.
    pub fn map_blocks<F>(&mut self, banks: RangeInclusive<u8>, addrs: RangeInclusive<u16>, mut f: F)
    where
        F: FnMut(u8, u16) -> Region,
    {
        let first = (*addrs.start() as u32) >> MEMMAP_SHIFT;
        let last = (*addrs.end() as u32) >> MEMMAP_SHIFT;
        for bank in banks {
            for block in first..=last {
                let offset = (block << MEMMAP_SHIFT) as u16;
                let index = ((bank as usize) << (16 - MEMMAP_SHIFT)) | block as usize;
                self.blocks[index] = f(bank, offset);
            }
        }
    }

    /// Map the parts of the address space that every system has: work ram and the register pages.
    pub fn map_system(&mut self) {
        for banks in [0x00..=0x3f, 0x80..=0xbf] {
            self.map_blocks(banks.clone(), 0x0000..=0x1fff, |_, offset| Region::Linear {
                memory: LinearMemory::Wram,
                base: offset as u32,
            });
            self.map_blocks(banks.clone(), 0x2000..=0x3fff, |_, _| Region::PpuRegisters);
            self.map_blocks(banks, 0x4000..=0x5fff, |_, _| Region::CpuRegisters);
        }
        self.map_blocks(0x7e..=0x7f, 0x0000..=0xffff, |bank, offset| Region::Linear {
            memory: LinearMemory::Wram,
            base: ((bank as u32 & 1) << 16) | offset as u32,
        });
    }

    /// Map a lorom cartridge rom of the given size
    pub fn map_lorom(&mut self, rom_size: u32) {
        for banks in [0x00..=0x7d, 0x80..=0xff] {
            self.map_blocks(banks, 0x8000..=0xffff, |bank, offset| Region::Linear {
                memory: LinearMemory::Rom,
                base: rom_mirror(
                    rom_size,
                    ((bank as u32 & 0x7f) << 15) | (offset as u32 & 0x7fff),
                ),
            });
        }
    }

    /// Map a hirom cartridge rom of the given size
    pub fn map_hirom(&mut self, rom_size: u32) {
        let rom = |bank: u8, offset: u16| Region::Linear {
            memory: LinearMemory::Rom,
            base: rom_mirror(rom_size, ((bank as u32 & 0x3f) << 16) | offset as u32),
        };
        for banks in [0x00..=0x3f, 0x80..=0xbf] {
            self.map_blocks(banks, 0x8000..=0xffff, rom);
        }
        for banks in [0x40..=0x7d, 0xc0..=0xff] {
            self.map_blocks(banks, 0x0000..=0xffff, rom);
        }
    }

    /// Map lorom style save ram
    pub fn map_lorom_sram(&mut self) {
        for banks in [0x70..=0x7d, 0xf0..=0xff] {
            self.map_blocks(banks, 0x0000..=0x7fff, |_, _| Region::LoRomSram);
        }
    }

    /// Map hirom style save ram
    pub fn map_hirom_sram(&mut self) {
        for banks in [0x20..=0x3f, 0xa0..=0xbf] {
            self.map_blocks(banks, 0x6000..=0x7fff, |_, _| Region::HiRomSram);
        }
    }
}

/// The devices that live behind the register and coprocessor regions. Everything defaults to open bus.
pub trait SnesPeripherals {
    /// Is a dma or hdma transfer currently in progress?
    fn dma_active(&self) -> bool {
        false
    }
    /// Read a register, None for open bus
    fn register_read(&mut self, _space: RegisterSpace, _addr: u16) -> Option<u8> {
        None
    }
    /// Write a register
    fn register_write(&mut self, _space: RegisterSpace, _addr: u16, _data: u8) {}
    /// Read from a coprocessor, None for open bus
    fn coprocessor_read(&mut self, _chip: Coprocessor, _addr: u32) -> Option<u8> {
        None
    }
    /// Write to a coprocessor
    fn coprocessor_write(&mut self, _chip: Coprocessor, _addr: u32, _data: u8) {}
}

/// Peripherals for a system that has nothing behind the register pages
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPeripherals;

impl SnesPeripherals for NoPeripherals {}

/// The trait for looking at and modifying memory outside of normal cpu cycles. Neither operation can fail.
pub trait SnesMemoryBus {
    /// Read a byte
    fn peek(&mut self, addr: u32) -> u8;
    /// Write a byte, writes to things that cannot be written are dropped
    fn poke(&mut self, addr: u32, data: u8);
}

/// All of the memory of the system that the memory map can point at.
pub struct SnesMemory {
    /// The memory map
    map: MemoryMap,
    /// The cpu ram
    wram: Vec<u8>,
    /// The cartridge rom
    rom: Vec<u8>,
    /// The primary save ram
    sram: PersistentStorage,
    /// The second save ram, for multi cartridge setups
    sram_b: PersistentStorage,
    /// Sa-1 bw-ram
    bwram: PersistentStorage,
    /// Used for open bus implementation of the cpu memory bus
    last_cpu_data: u8,
}

impl SnesMemory {
    /// Create a new set of memory with the given map and rom. Work ram is random on startup, like the real thing.
    pub fn new(map: MemoryMap, rom: Vec<u8>) -> Self {
        let mut wram = vec![0; WRAM_SIZE];
        for i in wram.iter_mut() {
            *i = rand::random();
        }
        Self {
            map,
            wram,
            rom,
            sram: PersistentStorage::new_volatile(0),
            sram_b: PersistentStorage::new_volatile(0),
            bwram: PersistentStorage::new_volatile(0),
            last_cpu_data: 0,
        }
    }

    /// Build the memory for a lorom cartridge with the given amount of save ram
    pub fn lorom(rom: Vec<u8>, sram: PersistentStorage) -> Self {
        let mut map = MemoryMap::new();
        map.map_system();
        map.map_lorom(rom.len() as u32);
        if !sram.is_empty() {
            map.map_lorom_sram();
        }
        Self::new(map, rom).with_sram(sram)
    }

    /// Build the memory for a hirom cartridge with the given amount of save ram
    pub fn hirom(rom: Vec<u8>, sram: PersistentStorage) -> Self {
        let mut map = MemoryMap::new();
        map.map_system();
        map.map_hirom(rom.len() as u32);
        if !sram.is_empty() {
            map.map_hirom_sram();
        }
        Self::new(map, rom).with_sram(sram)
    }

    /// Replace the primary save ram
    pub fn with_sram(mut self, sram: PersistentStorage) -> Self {
        self.sram = sram;
        self
    }

    /// Replace the second save ram
    pub fn with_sram_b(mut self, sram: PersistentStorage) -> Self {
        self.sram_b = sram;
        self
    }

    /// Replace the bw-ram
    pub fn with_bwram(mut self, bwram: PersistentStorage) -> Self {
        self.bwram = bwram;
        self
    }

    /// Retrieve the memory map
    pub fn map(&self) -> &MemoryMap {
        &self.map
    }

    /// Retrieve the memory map mutably, for cartridges that map extra hardware
    pub fn map_mut(&mut self) -> &mut MemoryMap {
        &mut self.map
    }

    /// Retrieve the work ram
    pub fn wram(&self) -> &[u8] {
        &self.wram
    }

    /// Retrieve the work ram mutably
    pub fn wram_mut(&mut self) -> &mut [u8] {
        &mut self.wram
    }

    /// Retrieve the rom
    pub fn rom(&self) -> &[u8] {
        &self.rom
    }

    /// Retrieve the primary save ram
    pub fn sram(&self) -> &PersistentStorage {
        &self.sram
    }

    /// Retrieve the primary save ram mutably
    pub fn sram_mut(&mut self) -> &mut PersistentStorage {
        &mut self.sram
    }

    /// Retrieve the second save ram
    pub fn sram_b(&self) -> &PersistentStorage {
        &self.sram_b
    }

    /// Retrieve the bw-ram
    pub fn bwram(&self) -> &PersistentStorage {
        &self.bwram
    }

    /// The last value seen on the data bus
    pub fn open_bus(&self) -> u8 {
        self.last_cpu_data
    }

    /// Update the value on the data bus, called by the cpu core
    pub fn set_open_bus(&mut self, data: u8) {
        self.last_cpu_data = data;
    }

    /// Bind this memory to a set of peripherals for peeking and poking
    pub fn bus<'a, P: SnesPeripherals + ?Sized>(
        &'a mut self,
        peripherals: &'a mut P,
    ) -> AddressSpace<'a, P> {
        AddressSpace {
            memory: self,
            peripherals,
        }
    }

    /// Read a byte of plain memory
    fn linear_read(&self, memory: LinearMemory, index: usize) -> Option<u8> {
        match memory {
            LinearMemory::Wram => self.wram.get(index).copied(),
            LinearMemory::Rom => self.rom.get(index).copied(),
            LinearMemory::Sram => self.sram.get(index),
            LinearMemory::BwRam => self.bwram.get(index),
        }
    }

    /// Write a byte of plain memory
    fn linear_write(&mut self, memory: LinearMemory, index: usize, data: u8) {
        match memory {
            LinearMemory::Wram => {
                if let Some(b) = self.wram.get_mut(index) {
                    *b = data;
                }
            }
            LinearMemory::Rom => {
                if let Some(b) = self.rom.get_mut(index) {
                    *b = data;
                }
            }
            LinearMemory::Sram => self.sram.set(index, data),
            LinearMemory::BwRam => self.bwram.set(index, data),
        }
    }
}

impl SnesMemoryBus for SnesMemory {
    fn peek(&mut self, addr: u32) -> u8 {
        self.bus(&mut NoPeripherals).peek(addr)
    }

    fn poke(&mut self, addr: u32, data: u8) {
        self.bus(&mut NoPeripherals).poke(addr, data)
    }
}

/// The memory of the system together with the devices behind the register pages.
pub struct AddressSpace<'a, P: SnesPeripherals + ?Sized> {
    /// The memory
    memory: &'a mut SnesMemory,
    /// The devices
    peripherals: &'a mut P,
}

impl<'a, P: SnesPeripherals + ?Sized> AddressSpace<'a, P> {
    /// Bind memory and peripherals together
    pub fn new(memory: &'a mut SnesMemory, peripherals: &'a mut P) -> Self {
        Self {
            memory,
            peripherals,
        }
    }
}

/// Ppu registers at 0x21xx must not be touched while a dma or hdma transfer is using them
fn ppu_locked(dma_active: bool, addr: u32) -> bool {
    dma_active && (addr & 0xff00) == 0x2100
}

impl<'a, P: SnesPeripherals + ?Sized> SnesMemoryBus for AddressSpace<'a, P> {
    fn peek(&mut self, addr: u32) -> u8 {
        let addr = addr & ADDRESS_MASK;
        let open_bus = self.memory.last_cpu_data;
        let m = &mut *self.memory;
        let byte = match m.map.region(addr) {
            Region::Linear { memory, base } => {
                m.linear_read(memory, (base + (addr & MEMMAP_MASK)) as usize)
            }
            Region::CpuRegisters => self
                .peripherals
                .register_read(RegisterSpace::Cpu, addr as u16),
            Region::PpuRegisters => {
                if ppu_locked(self.peripherals.dma_active(), addr) {
                    None
                } else {
                    self.peripherals
                        .register_read(RegisterSpace::Ppu, addr as u16)
                }
            }
            Region::LoRomSram | Region::Sa1Ram => {
                m.sram.get((lorom_sram_offset(addr) & m.sram.mask()) as usize)
            }
            Region::LoRomSramB => m
                .sram_b
                .get((lorom_sram_offset(addr) & m.sram_b.mask()) as usize),
            Region::HiRomSram | Region::ReadOnlySram => {
                m.sram.get((hirom_sram_offset(addr) & m.sram.mask()) as usize)
            }
            Region::BwRam => m
                .bwram
                .get((addr & 0x7fff).wrapping_sub(0x6000) as usize),
            Region::Coprocessor(chip) => self
                .peripherals
                .coprocessor_read(chip, chip.bus_address(addr)),
            Region::OpenBus => None,
        };
        byte.unwrap_or(open_bus)
    }

    fn poke(&mut self, addr: u32, data: u8) {
        let addr = addr & ADDRESS_MASK;
        let m = &mut *self.memory;
        match m.map.region(addr) {
            Region::Linear { memory, base } => {
                m.linear_write(memory, (base + (addr & MEMMAP_MASK)) as usize, data)
            }
            Region::CpuRegisters => {
                self.peripherals
                    .register_write(RegisterSpace::Cpu, addr as u16, data)
            }
            Region::PpuRegisters => {
                if !ppu_locked(self.peripherals.dma_active(), addr) {
                    self.peripherals
                        .register_write(RegisterSpace::Ppu, addr as u16, data)
                }
            }
            Region::LoRomSram => {
                let mask = m.sram.mask();
                if mask != 0 {
                    m.sram.set((lorom_sram_offset(addr) & mask) as usize, data);
                }
            }
            Region::LoRomSramB => {
                let mask = m.sram_b.mask();
                if mask != 0 {
                    m.sram_b.set((lorom_sram_offset(addr) & mask) as usize, data);
                }
            }
            Region::HiRomSram => {
                let mask = m.sram.mask();
                if mask != 0 {
                    m.sram.set((hirom_sram_offset(addr) & mask) as usize, data);
                }
            }
            Region::BwRam => {
                m.bwram
                    .set((addr & 0x7fff).wrapping_sub(0x6000) as usize, data);
            }
            Region::Sa1Ram => m.sram.set((addr & 0xffff) as usize, data),
            Region::Coprocessor(chip) => {
                if chip.writable() {
                    self.peripherals
                        .coprocessor_write(chip, chip.bus_address(addr), data);
                }
            }
            Region::ReadOnlySram | Region::OpenBus => {}
        }
    }
}
