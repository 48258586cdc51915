use std::path::PathBuf;

use common_emulator::PersistentStorage;

use crate::cheat::file::{CheatFileFormat, LegacyBinary, LEGACY_RECORD_SIZE};
use crate::cheat::{parse_group, group_to_text, CheatError, CheatStore};
use crate::config::CheatConfiguration;
use crate::memory::{NoPeripherals, SnesMemory, SnesMemoryBus};
use crate::session::{CheatCommand, CheatSession};

/// A lorom system with 32k of save ram
fn system() -> SnesMemory {
    let rom: Vec<u8> = (0..0x40000u32).map(|i| (i * 7) as u8).collect();
    SnesMemory::lorom(rom, PersistentStorage::new_volatile(0x8000))
}

/// A path in the temp directory that is unique to this test run
fn temp_path(name: &str) -> PathBuf {
    let mut pb = std::env::temp_dir();
    pb.push(format!("snes-cheats-{}-{}", std::process::id(), name));
    pb
}

#[test]
fn enable_then_disable_restores_memory() {
    let mut mem = system();
    mem.poke(0x7e0010, 0x05);
    let mut store = CheatStore::default();
    let id = store.add_group("test", "7E0010=63").unwrap();
    assert_eq!(id, 0);
    store.enable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0010), 0x63);
    store.disable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0010), 0x05);
}

#[test]
fn conditional_cheat_waits_for_the_game() {
    let mut mem = system();
    mem.poke(0x7e0020, 0x05);
    let mut store = CheatStore::default();
    let id = store.add_group("cond", "7E0020=00?99").unwrap();
    store.enable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0020), 0x05);
    store.tick(&mut mem);
    assert_eq!(mem.peek(0x7e0020), 0x05);

    mem.poke(0x7e0020, 0x00);
    store.tick(&mut mem);
    assert_eq!(mem.peek(0x7e0020), 0x99);
}

#[test]
fn game_can_rewrite_a_satisfied_trigger() {
    let mut mem = system();
    mem.poke(0x7e0060, 0x05);
    let mut store = CheatStore::default();
    let id = store.add_group("cond", "7e0060=05?63").unwrap();
    store.enable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0060), 0x63);

    mem.poke(0x7e0060, 0x05);
    store.tick(&mut mem);
    assert_eq!(mem.peek(0x7e0060), 0x05);
    store.tick(&mut mem);
    assert_eq!(mem.peek(0x7e0060), 0x05);
}

#[test]
fn enable_disable_restores_every_kind_of_memory() {
    let mut mem = system();
    for (addr, before) in [(0x7e1234, 0x12), (0x001000, 0x34), (0x700010, 0x56), (0x018000, 0x78)] {
        mem.poke(addr, before);
        let before = mem.peek(addr);
        let mut store = CheatStore::default();
        let id = store.add_group("x", &format!("{:06x}=ab", addr)).unwrap();
        store.enable_group(id, &mut mem).unwrap();
        assert_eq!(mem.peek(addr), 0xab, "address {:06x}", addr);
        store.disable_group(id, &mut mem).unwrap();
        assert_eq!(mem.peek(addr), before, "address {:06x}", addr);
    }
}

#[test]
fn patches_reach_the_mirrors() {
    let mut mem = system();
    let mut store = CheatStore::default();
    let id = store.add_group("mirror", "7e0100=42").unwrap();
    store.enable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x000100), 0x42);
    assert_eq!(mem.peek(0x800100), 0x42);
}

#[test]
fn unmet_condition_leaves_memory_alone() {
    let mut mem = system();
    mem.poke(0x7e0030, 0x10);
    let mut store = CheatStore::default();
    let id = store.add_group("cond", "7e0030/20/ff").unwrap();
    store.enable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0030), 0x10);
    store.disable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0030), 0x10);
}

#[test]
fn global_toggle_reproduces_the_patch() {
    let mut mem = system();
    mem.poke(0x7e0040, 0x01);
    let mut store = CheatStore::default();
    let id = store.add_group("g", "7e0040=77").unwrap();
    store.enable_group(id, &mut mem).unwrap();
    store.set_global_enabled(false, &mut mem);
    assert_eq!(mem.peek(0x7e0040), 0x01);
    store.set_global_enabled(true, &mut mem);
    assert_eq!(mem.peek(0x7e0040), 0x77);
}

#[test]
fn game_writes_are_overridden_each_tick() {
    let mut mem = system();
    let mut store = CheatStore::default();
    let id = store.add_group("lives", "7e0dbe=09").unwrap();
    store.enable_group(id, &mut mem).unwrap();
    for lives in [8, 7, 0] {
        mem.poke(0x7e0dbe, lives);
        store.tick(&mut mem);
        assert_eq!(mem.peek(0x7e0dbe), 0x09);
    }
    store.disable_group(id, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0dbe), 0);
}

#[test]
fn delete_shifts_later_groups() {
    let mut mem = system();
    mem.poke(0x7e0050, 0xaa);
    let mut store = CheatStore::default();
    for (name, code) in [("a", "7e0051=01"), ("b", "7e0050=02"), ("c", "7e0052=03"), ("d", "7e0053=04")] {
        store.add_group(name, code).unwrap();
    }
    store.enable_group(1, &mut mem).unwrap();
    assert_eq!(mem.peek(0x7e0050), 0x02);
    store.delete_group(1, &mut mem).unwrap();
    assert_eq!(store.len(), 3);
    let names: Vec<&str> = store.groups().iter().map(|g| g.name()).collect();
    assert_eq!(names, ["a", "c", "d"]);
    assert_eq!(mem.peek(0x7e0050), 0xaa);
}

#[test]
fn canonical_text_is_stable() {
    for text in [
        "7E0010=63",
        "7e0010 = 63 ? 05",
        "7e0010/05/63",
        "7e0010/63",
        "10=1 + 7fffff=ff",
        "7E001063 + DDDD-DDDF",
    ] {
        let once = group_to_text(&parse_group(text));
        let twice = group_to_text(&parse_group(&once));
        assert_eq!(once, twice, "{}", text);
    }
}

#[test]
fn saved_cheats_load_back() {
    let path = temp_path("roundtrip.cht");
    let mut mem = system();
    mem.poke(0x7e0010, 0x01);
    let mut store = CheatStore::default();
    let a = store.add_group("Infinite lives", "7E0010=63 + 7e0011=01").unwrap();
    store.add_group("Moon jump", "7e0020=00?99").unwrap();
    store.enable_group(a, &mut mem).unwrap();
    store.save_to_path(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(
        text,
        "cheat\n  name: Infinite lives\n  code: 7e0010=63 + 7e0011=01\n  enable\n\ncheat\n  name: Moon jump\n  code: 7e0020=00?99\n\n"
    );

    let mut mem2 = system();
    let mut loaded = CheatStore::default();
    assert_eq!(loaded.load_from_path(&path, &mut mem2), Ok(2));
    assert_eq!(loaded.group_text(0).unwrap(), "7e0010=63 + 7e0011=01");
    assert!(loaded.group(0).unwrap().is_enabled());
    assert!(!loaded.group(1).unwrap().is_enabled());
    assert_eq!(mem2.peek(0x7e0010), 0x63);

    // loading again adds nothing new
    assert_eq!(loaded.load_from_path(&path, &mut mem2), Ok(0));
    assert_eq!(loaded.len(), 2);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn saving_an_empty_store_removes_the_file() {
    let path = temp_path("empty.cht");
    std::fs::write(&path, "cheat\n  name: old\n  code: 7e0010=63\n").unwrap();
    let store = CheatStore::default();
    store.save_to_path(&path).unwrap();
    assert!(!path.exists());
    store.save_to_path(&path).unwrap();
    assert!(!path.exists());
}

#[test]
fn legacy_files_still_load() {
    let path = temp_path("legacy.cht");
    let mut data = Vec::new();
    let mut r = [0u8; LEGACY_RECORD_SIZE];
    r[1] = 0x63;
    r[2..5].copy_from_slice(&[0x10, 0x00, 0x7e]);
    r[8..8 + 5].copy_from_slice(b"Lives");
    data.extend_from_slice(&r);
    r[0] = 4;
    r[1] = 0x01;
    r[2] = 0x11;
    r[8..8 + 5].copy_from_slice(b"Power");
    data.extend_from_slice(&r);
    std::fs::write(&path, &data).unwrap();

    let mut mem = system();
    mem.poke(0x7e0011, 0x00);
    let mut store = CheatStore::default();
    assert_eq!(store.load_from_path(&path, &mut mem), Ok(2));
    assert_eq!(store.group(0).unwrap().name(), "Lives");
    assert!(store.group(0).unwrap().is_enabled());
    assert_eq!(store.group_text(1).unwrap(), "7e0011=01");
    assert!(!store.group(1).unwrap().is_enabled());
    assert_eq!(mem.peek(0x7e0010), 0x63);
    assert_eq!(mem.peek(0x7e0011), 0x00);

    let encoded = LegacyBinary::encode(&store);
    assert_eq!(LegacyBinary.try_load(&encoded).unwrap().len(), 2);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn unreadable_files_leave_the_store_alone() {
    let mut mem = system();
    let mut store = CheatStore::default();
    store.add_group("keep", "7e0010=63").unwrap();
    let r = store.load_from_path(&temp_path("does-not-exist.cht"), &mut mem);
    assert!(matches!(r, Err(CheatError::IoFailure(_))));
    assert_eq!(store.len(), 1);

    let junk = temp_path("junk.cht");
    std::fs::write(&junk, b"short").unwrap();
    assert_eq!(store.load_from_path(&junk, &mut mem), Ok(0));
    assert_eq!(store.len(), 1);
    std::fs::remove_file(&junk).unwrap();
}

/// A database with two games in it
fn database(hash: &str) -> String {
    format!(
        "database\n  revision: 2024-01-01\n\ncartridge sha256:{}\n  name: Another Game\n  cheat\n    description: Nothing\n    code: 7e0001=01\n\ncartridge sha256:{}\n  name: The Game\n  cheat\n    name: Infinite lives\n    code: 7e0dbe=09\n  cheat\n    description: Moon jump\n    code: 7e0020=00?99\n  cheat\n    name: Broken\n    code: nonsense\n",
        "0".repeat(64),
        hash
    )
}

#[test]
fn database_import_finds_the_game() {
    let mut mem = system();
    let hash = common_emulator::calc_sha256(mem.rom());
    let path = temp_path("database.bml");
    std::fs::write(&path, database(&hash.to_uppercase())).unwrap();

    let mut store = CheatStore::default();
    assert_eq!(store.import_from_database(&path, &hash, &mut mem), Ok(2));
    assert_eq!(store.group(0).unwrap().name(), "Infinite lives");
    assert_eq!(store.group(1).unwrap().name(), "Moon jump");
    assert!(!store.group(0).unwrap().is_enabled());

    // importing twice does not duplicate anything
    assert_eq!(store.import_from_database(&path, &hash, &mut mem), Ok(0));
    assert_eq!(store.len(), 2);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn database_without_the_game() {
    let mut mem = system();
    let path = temp_path("database-nomatch.bml");
    std::fs::write(&path, database(&"1".repeat(64))).unwrap();
    let mut store = CheatStore::default();
    store.add_group("existing", "7e0010=63").unwrap();
    let hash = common_emulator::calc_sha256(mem.rom());
    assert_eq!(
        store.import_from_database(&path, &hash, &mut mem),
        Err(CheatError::NoDatabaseMatch)
    );
    assert_eq!(store.len(), 1);
    std::fs::remove_file(&path).unwrap();

    assert_eq!(
        store.import_from_database(&path, &hash, &mut mem),
        Err(CheatError::NoDatabaseFile)
    );
    assert_eq!(store.len(), 1);
}

/// A configuration that keeps everything in a private temp directory
fn session_config(name: &str) -> CheatConfiguration {
    let dir = temp_path(name);
    let mut config = CheatConfiguration::default();
    config.cheat_path = dir.join("cheats");
    config.set_path(dir.join("cheats.toml"));
    config
}

#[test]
fn session_runs_commands_from_other_threads() {
    let mut session = CheatSession::new(session_config("commands"), system(), NoPeripherals);
    session.bus().poke(0x7e0010, 0x05);
    let sender = session.sender();
    std::thread::spawn(move || {
        sender
            .send(CheatCommand::Add {
                name: "lives".to_string(),
                code: "7e0010=63".to_string(),
            })
            .unwrap();
        sender.send(CheatCommand::Enable(0)).unwrap();
        sender.send(CheatCommand::Enable(5)).unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(session.bus().peek(0x7e0010), 0x05);
    session.frame();
    assert_eq!(session.cheats().len(), 1);
    assert_eq!(session.bus().peek(0x7e0010), 0x63);

    session.bus().poke(0x7e0010, 0x01);
    session.frame();
    assert_eq!(session.bus().peek(0x7e0010), 0x63);

    session.sender().send(CheatCommand::SetGlobal(false)).unwrap();
    session.frame();
    assert_eq!(session.bus().peek(0x7e0010), 0x01);
    assert!(!session.cheats().is_global_enabled());
}

#[test]
fn session_saves_and_restores_cheats_per_rom() {
    let config = session_config("per-rom");
    let dir = config.cheat_path.clone();
    let mut session = CheatSession::new(config, system(), NoPeripherals);
    assert_eq!(session.content_loaded("/roms/Game (USA).sfc"), Ok(0));
    session.bus().poke(0x7e0010, 0x05);
    session
        .execute(CheatCommand::Add {
            name: "lives".to_string(),
            code: "7e0010=63".to_string(),
        })
        .unwrap();
    session.execute(CheatCommand::Enable(0)).unwrap();
    assert_eq!(session.bus().peek(0x7e0010), 0x63);

    session.content_unloaded().unwrap();
    assert!(session.cheats().is_empty());
    assert_eq!(session.bus().peek(0x7e0010), 0x05);
    assert!(dir.join("Game (USA).cht").exists());

    assert_eq!(session.content_loaded("Game (USA).sfc"), Ok(1));
    assert_eq!(session.rom_name(), Some("Game (USA).sfc"));
    assert_eq!(session.bus().peek(0x7e0010), 0x63);

    session.execute(CheatCommand::Clear).unwrap();
    session.content_unloaded().unwrap();
    assert!(!dir.join("Game (USA).cht").exists());
    let _ = std::fs::remove_dir_all(dir.parent().unwrap());
}

#[test]
fn session_imports_when_there_is_no_cheat_file() {
    let mut config = session_config("import");
    let db = temp_path("import-database.bml");
    let mem = system();
    std::fs::write(&db, database(&common_emulator::calc_sha256(mem.rom()))).unwrap();
    config.database = Some(db.clone());
    config.auto_import = true;
    config.cheats_enabled = false;
    let mut session = CheatSession::new(config, mem, NoPeripherals);
    assert!(!session.cheats().is_global_enabled());
    assert_eq!(session.content_loaded("imported"), Ok(2));
    assert_eq!(session.import_from_database(), Ok(0));
    std::fs::remove_file(&db).unwrap();
    let _ = std::fs::remove_dir_all(temp_path("import"));
}
