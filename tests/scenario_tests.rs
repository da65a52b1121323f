//! End-to-end playback of the bundled demo script
//!
//! These tests verify the parse → engine → transcript workflow.

use std::path::PathBuf;
use std::time::Duration;
use terminal_vn::repository::{FileSystemScriptRepository, ScriptRepository};
use terminal_vn::{Engine, EngineOptions, Line, Phase, SideEffect, TranscriptKind, Value, parse};

const LONG: Duration = Duration::from_secs(60);

fn demo_source() -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/vessel.vn");
    std::fs::read_to_string(path).expect("demo script should exist")
}

fn options() -> EngineOptions {
    EngineOptions {
        typing_speed_ms: 1,
        rng_seed: Some(3),
        ..Default::default()
    }
}

/// Finish the running reveal, return its framed text and continue
fn read_line(engine: &mut Engine) -> String {
    engine.tick(LONG);
    assert_eq!(engine.phase(), Phase::AwaitingAdvance, "at {:?}", engine.cursor());
    let text = engine
        .transcript()
        .last()
        .map(|entry| entry.text.clone())
        .unwrap_or_default();
    engine.advance();
    text
}

fn choice_texts(engine: &Engine) -> Vec<String> {
    engine.choices().iter().map(|c| c.text.clone()).collect()
}

fn choose(engine: &mut Engine, text: &str) {
    let index = engine
        .choices()
        .iter()
        .position(|c| c.text == text)
        .unwrap_or_else(|| panic!("'{text}' is not presented: {:?}", choice_texts(engine)));
    assert!(engine.choose(index));
}

#[test]
fn demo_parses_with_expected_shape() {
    let source = demo_source();
    let script = parse(&source).expect("Failed to parse demo");

    let shape: Vec<(&str, usize)> = script
        .nodes()
        .iter()
        .map(|node| (node.id.as_str(), node.lines.len()))
        .collect();
    assert_eq!(
        shape,
        vec![
            ("start", 6),
            ("ward", 2),
            ("chart", 2),
            ("cabinet", 3),
            ("corridor", 3),
            ("sleep", 3),
            ("ending", 3),
        ]
    );
    assert!(matches!(script.node("start").unwrap().lines[3], Line::Input { .. }));

    // Re-parsing identical input yields an identical script
    assert_eq!(parse(&source).unwrap(), script);
    assert!(terminal_vn::check(&script).is_clean());
}

#[test]
fn demo_full_playthrough() {
    let mut engine = Engine::in_memory(parse(&demo_source()).unwrap(), options());
    let effects = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
    let sink = effects.clone();
    engine.on_effect(move |effect| sink.borrow_mut().push(effect.clone()));

    engine.start();
    assert_eq!(engine.transcript()[0].text, "SIGNAL ACQUIRED");
    assert_eq!(
        read_line(&mut engine),
        "> The monitor hums. Someone typed your file number an hour ago."
    );

    assert_eq!(engine.phase(), Phase::AwaitingInput);
    assert_eq!(engine.prompt(), Some("Name on the wristband: {name}"));
    engine.submit_input("Ash");
    assert_eq!(
        read_line(&mut engine),
        "Doctor: Good evening, Ash. You should not be awake."
    );

    // The secrets line is skipped and playback moves on to the ward
    assert_eq!(engine.cursor().node, "ward");
    assert_eq!(
        read_line(&mut engine),
        "> The ward is dark. Three doors, one corridor."
    );
    assert_eq!(
        choice_texts(&engine),
        vec!["Read the chart", "Check the cabinet", "Lie back down"]
    );

    choose(&mut engine, "Read the chart");
    read_line(&mut engine);
    read_line(&mut engine);
    assert!(!choice_texts(&engine).contains(&"Follow the corridor".to_string()));

    choose(&mut engine, "Check the cabinet");
    read_line(&mut engine);
    read_line(&mut engine);
    assert_eq!(engine.variables().get("secretsFound"), Some(&Value::Num(2.0)));

    choose(&mut engine, "Follow the corridor");
    assert_eq!(engine.phase(), Phase::Delaying);
    engine.tick(Duration::from_secs(1));
    assert_eq!(read_line(&mut engine), "A voice: You found them, Ash.");

    choose(&mut engine, "Open the last door");
    engine.tick(LONG);
    let transcript: Vec<(TranscriptKind, &str)> = engine
        .transcript()
        .iter()
        .map(|entry| (entry.kind, entry.text.as_str()))
        .collect();
    assert_eq!(
        transcript,
        vec![
            (TranscriptKind::System, "SIGNAL LOST"),
            (TranscriptKind::Dialogue, "Doctor: Welcome home, Ash."),
        ]
    );

    engine.advance();
    assert!(engine.is_completed());
    assert!(effects.borrow().contains(&SideEffect::Vfx {
        name: "glitch".to_string(),
        args: vec!["2".to_string()],
    }));
    assert_eq!(engine.visited_nodes().len(), 6);
    assert!(!engine.visited_nodes().contains("sleep"));
}

#[test]
fn sleeping_until_exhausted_ends_the_story() {
    let mut engine = Engine::in_memory(parse(&demo_source()).unwrap(), options());
    engine.start();
    read_line(&mut engine);
    engine.submit_input("Ash");
    read_line(&mut engine);
    read_line(&mut engine);

    for hp_left in [2.0, 1.0] {
        choose(&mut engine, "Lie back down");
        read_line(&mut engine);
        assert_eq!(engine.variables().get("hp"), Some(&Value::Num(hp_left)));
        choose(&mut engine, "Wake up");
        read_line(&mut engine);
    }

    choose(&mut engine, "Lie back down");
    read_line(&mut engine);
    // No visible option remains, so the node runs out and playback completes
    assert!(engine.is_completed());
}

#[test]
fn secrets_counter_never_exceeds_limit() {
    for start in [-5.0, 0.0, 2.0, 3.0, 10.0] {
        let options = EngineOptions {
            initial_variables: [("secretsFound".to_string(), Value::Num(start))].into(),
            ..options()
        };
        let source = format!(":: start\n{}Done.\n", "@add secretsFound 1\n".repeat(7));
        let mut engine = Engine::in_memory(parse(&source).unwrap(), options);

        let observed = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = observed.clone();
        engine.on_variables_changed(move |vars| {
            sink.borrow_mut().push(vars.get("secretsFound").and_then(Value::as_number));
        });
        engine.start();

        for value in observed.borrow().iter().flatten() {
            assert!(*value <= 3.0, "start {start} produced {value}");
        }
        assert_eq!(
            engine.variables().get("secretsFound"),
            Some(&Value::Num((start + 7.0).min(3.0)))
        );
    }
}

#[tokio::test]
async fn demo_directory_is_a_script_repository() {
    let repo =
        FileSystemScriptRepository::new(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos"));
    let names = repo.list_scripts().await.unwrap();
    assert!(names.contains(&"vessel".to_string()));

    let script = repo.load_script("vessel").await.unwrap();
    assert!(script.contains("ending"));
}
