//! Benchmarks for the cheat engine

use common_emulator::PersistentStorage;
use criterion::Criterion;
use snes_cheats::{CheatStore, SnesMemory, SnesMemoryBus};

/// A lorom system with cheats spread over work ram and save ram, all of them enabled
fn loaded_system(count: u32) -> (SnesMemory, CheatStore) {
    let rom = vec![0xea; 0x80000];
    let mut mem = SnesMemory::lorom(rom, PersistentStorage::new_volatile(0x8000));
    let mut store = CheatStore::default();
    for i in 0..count {
        let addr = if i % 2 == 0 {
            0x7e0000 + i
        } else {
            0x700000 + i
        };
        let code = if i % 3 == 0 {
            format!("{:06x}=00?{:02x}", addr, i as u8)
        } else {
            format!("{:06x}={:02x}", addr, i as u8)
        };
        if let Ok(id) = store.add_group(&format!("cheat {}", i), &code) {
            if let Err(e) = store.enable_group(id, &mut mem) {
                log::warn!("Could not enable benchmark cheat {}: {}", i, e);
            }
        }
    }
    (mem, store)
}

/// Tick the engine with nothing changing in memory
pub fn tick_bench(c: &mut Criterion) {
    let mut group = c.benchmark_group("cheat-tick");
    for count in [1, 16, 256] {
        let (mut mem, mut store) = loaded_system(count);
        group.bench_function(format!("idle {} cheats", count), |b| {
            b.iter(|| store.tick(&mut mem));
        });
    }
    group.finish();
}

/// Tick the engine after the game has overwritten every patched byte
pub fn overwrite_bench(c: &mut Criterion) {
    c.bench_function("overwrite 256 cheats", |b| {
        b.iter_batched(
            || {
                let (mut mem, store) = loaded_system(256);
                for i in 0..256u32 {
                    mem.poke(0x7e0000 + i, 0xff);
                    mem.poke(0x700000 + i, 0xff);
                }
                (mem, store)
            },
            |(mut mem, mut store)| {
                store.tick(&mut mem);
            },
            criterion::BatchSize::PerIteration,
        );
    });
}

/// Parse a long group of mixed codes
pub fn parse_bench(c: &mut Criterion) {
    let code = [
        "7e0010=63",
        "7E001063",
        "DDDD-DDDF",
        "7e0020=00?99",
        "7e0030/05/63",
        "7e0040/01",
    ]
    .repeat(8)
    .join(" + ");
    c.bench_function("parse mixed group", |b| {
        b.iter(|| CheatStore::validate(&code));
    });
}

fn benches() {
    let mut criterion = Criterion::default().configure_from_args();
    tick_bench(&mut criterion);
    overwrite_bench(&mut criterion);
    parse_bench(&mut criterion);
}

fn main() {
    benches();
    Criterion::default().configure_from_args().final_summary();
}
