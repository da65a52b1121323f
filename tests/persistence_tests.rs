//! Progress survives across engine sessions through a save file

use std::time::Duration;
use tempfile::TempDir;
use terminal_vn::storage::UnavailableStore;
use terminal_vn::{
    Engine, EngineOptions, JsonFileStore, KeyValueStore, Persistence, Phase, Script, Value, parse,
};

const SCRIPT: &str = r#"
:: start
@set hp = 3
? Your name? {name}
* Read the chart -> chart
* Follow the corridor -> corridor [after read the chart]

:: chart
@add secretsFound 1
\The chart lists your name twice.
-> start

:: corridor
The corridor ends in a door.
"#;

fn script() -> Script {
    parse(SCRIPT).expect("Failed to parse script")
}

fn options() -> EngineOptions {
    EngineOptions {
        typing_speed_ms: 0,
        ..Default::default()
    }
}

fn open(dir: &TempDir) -> JsonFileStore {
    JsonFileStore::open(dir.path().join("save.json")).expect("save file should open")
}

/// Play up to the chart: name entry, one choice, one line
fn first_session(dir: &TempDir) {
    let mut engine = Engine::new(script(), options(), open(dir));
    engine.start();
    assert_eq!(engine.phase(), Phase::AwaitingInput);
    engine.submit_input("Ash");
    assert_eq!(engine.choices().len(), 1);
    assert!(engine.choose(0));
    engine.tick(Duration::ZERO);
    assert_eq!(engine.phase(), Phase::AwaitingAdvance);
}

#[test]
fn second_session_restores_progress() {
    let dir = TempDir::new().unwrap();
    first_session(&dir);

    let engine = Engine::new(script(), options(), open(&dir));
    assert_eq!(engine.phase(), Phase::Idle);
    assert_eq!(engine.variables().get("name"), Some(&Value::from("Ash")));
    assert_eq!(engine.variables().get("secretsFound"), Some(&Value::Num(1.0)));
    assert!(engine.selected_choices().contains("read the chart"));
    assert!(engine.visited_nodes().contains("chart"));

    let unlocked: Vec<String> = engine
        .jump_menu()
        .into_iter()
        .filter(|entry| entry.unlocked)
        .map(|entry| entry.node)
        .collect();
    assert_eq!(unlocked, vec!["start", "chart"]);
}

#[test]
fn restored_choices_open_gated_options() {
    let dir = TempDir::new().unwrap();
    first_session(&dir);

    let mut engine = Engine::new(script(), options(), open(&dir));
    engine.start();
    engine.submit_input("Ash");
    let texts: Vec<&str> = engine.choices().iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["Read the chart", "Follow the corridor"]);
}

#[test]
fn corrupt_entries_fall_back_to_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("save.json");
    std::fs::write(
        &path,
        r#"{
  "tvn:variables": "{not json",
  "tvn:selected_choices": "[\"read the chart\"",
  "tvn:visited:chart": "yes"
}"#,
    )
    .unwrap();

    let options = EngineOptions {
        initial_variables: [("hp".to_string(), Value::Num(5.0))].into(),
        ..options()
    };
    let mut engine = Engine::new(script(), options.clone(), JsonFileStore::open(&path).unwrap());
    assert_eq!(engine.variables(), &options.initial_variables);
    assert!(engine.selected_choices().is_empty());
    assert!(engine.visited_nodes().is_empty());

    // Playback still works and overwrites the corrupt entries
    engine.start();
    engine.submit_input("Ash");
    let reopened = JsonFileStore::open(&path).unwrap();
    let stored = reopened.get("tvn:variables").unwrap().unwrap();
    assert!(stored.contains("\"name\":\"Ash\""));
}

#[test]
fn unreadable_save_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("save.json");
    std::fs::write(&path, "this is not a save file").unwrap();
    assert!(JsonFileStore::open(&path).is_err());
}

#[test]
fn unavailable_storage_does_not_stop_playback() {
    let mut engine = Engine::new(script(), options(), UnavailableStore);
    engine.start();
    engine.submit_input("Ash");
    assert!(engine.choose(0));
    engine.tick(Duration::ZERO);
    assert_eq!(engine.variables().get("secretsFound"), Some(&Value::Num(1.0)));
    assert!(engine.visited_nodes().contains("chart"));
}

#[test]
fn prefixes_keep_stories_apart() {
    let dir = TempDir::new().unwrap();
    first_session(&dir);

    let other = EngineOptions {
        storage_prefix: "other:".to_string(),
        ..options()
    };
    let mut engine = Engine::new(script(), other, open(&dir));
    assert!(engine.variables().is_empty());
    assert!(engine.visited_nodes().is_empty());
    engine.start();

    // Clearing one story leaves the other untouched
    let mut persistence = Persistence::new(open(&dir), "other:");
    persistence.clear();
    let store = persistence.into_store();
    let keys = store.keys().unwrap();
    assert!(keys.iter().all(|key| key.starts_with("tvn:")));
    assert!(keys.contains(&"tvn:visited:chart".to_string()));
}
