//! Terminal player session
//!
//! [`PlayerSession`] sits between a line-based terminal and the [`Engine`].
//! It turns typed lines into engine calls and diffs the engine state into
//! [`Output`] chunks, so the terminal loop only writes what changed. A script
//! that fails to parse yields an error screen instead of a running engine.

use crate::config::EngineOptions;
use crate::error::ScriptError;
use crate::parser;
use crate::runtime::Engine;
use crate::runtime::debug::DebugConfig;
use crate::storage::{KeyValueStore, MemoryStore};
use crate::types::output::TranscriptKind;
use crate::types::state::{AdvanceMode, Cursor, Phase};
use std::time::Duration;

/// Chunk of terminal output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// Raw text, newlines included
    Write(String),
    /// Wipe the screen
    Clear,
}

/// Whether the terminal loop should keep going
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

/// A typed line, interpreted in the context of the current phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Advance,
    /// Zero-based index into the presented choices
    Choose(usize),
    Submit(String),
    Jump(String),
    Menu,
    History,
    Vars,
    Reset,
    ToggleAuto,
    Help,
    Quit,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str, awaiting_input: bool) -> Self {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(':') {
            let (name, arg) = match rest.split_once(char::is_whitespace) {
                Some((name, arg)) => (name, arg.trim()),
                None => (rest, ""),
            };
            return match (name, arg) {
                ("jump", node) if !node.is_empty() => Self::Jump(node.to_string()),
                ("menu", "") => Self::Menu,
                ("history", "") => Self::History,
                ("vars", "") => Self::Vars,
                ("reset", "") => Self::Reset,
                ("auto", "") => Self::ToggleAuto,
                ("help", "") => Self::Help,
                ("q" | "quit", "") => Self::Quit,
                _ => Self::Unknown(line.to_string()),
            };
        }

        if awaiting_input {
            return Self::Submit(line.to_string());
        }
        if line.is_empty() {
            return Self::Advance;
        }
        match line.parse::<usize>() {
            Ok(n) if n >= 1 => Self::Choose(n - 1),
            _ => Self::Unknown(line.to_string()),
        }
    }
}

pub const HELP: &str = "\
Controls:
  Enter          advance / skip the reveal
  1-9            select a choice
  :jump <node>   jump to start or a visited node
  :menu          list nodes
  :history       show the dialogue history
  :vars          show variables
  :auto          toggle automatic advance
  :reset         restart from the beginning
  :q             quit
";

enum Session<S: KeyValueStore> {
    Playing(Box<Engine<S>>),
    Failed(ScriptError),
}

/// What has already been written to the terminal
#[derive(Debug, Default)]
struct View {
    generation: u64,
    shown: usize,
    history_len: usize,
    /// Characters of the running reveal already written
    partial: usize,
    presented: Option<(Phase, Cursor)>,
    error_shown: bool,
}

/// One playthrough of a script in the terminal
pub struct PlayerSession<S: KeyValueStore = MemoryStore> {
    session: Session<S>,
    debug: bool,
    view: View,
    out: Vec<Output>,
}

impl PlayerSession<MemoryStore> {
    pub fn in_memory(source: &str, options: EngineOptions, debug: bool) -> Self {
        Self::new(source, options, MemoryStore::new(), debug)
    }
}

impl<S: KeyValueStore> PlayerSession<S> {
    pub fn new(source: &str, options: EngineOptions, store: S, debug: bool) -> Self {
        let session = match parser::parse(source) {
            Ok(script) => {
                let mut engine = Engine::new(script, options, store);
                if debug {
                    engine = engine.with_debug(DebugConfig::verbose());
                }
                Session::Playing(Box::new(engine))
            }
            Err(err) => {
                log::error!("script failed to load: {}", err);
                Session::Failed(err)
            }
        };

        Self {
            session,
            debug,
            view: View::default(),
            out: Vec::new(),
        }
    }

    pub fn engine(&self) -> Option<&Engine<S>> {
        match &self.session {
            Session::Playing(engine) => Some(engine.as_ref()),
            Session::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ScriptError> {
        match &self.session {
            Session::Playing(_) => None,
            Session::Failed(err) => Some(err),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.engine().is_some_and(Engine::is_completed)
    }

    pub fn is_awaiting_input(&self) -> bool {
        self.engine()
            .is_some_and(|engine| engine.phase() == Phase::AwaitingInput)
    }

    pub fn start(&mut self) {
        if let Session::Playing(engine) = &mut self.session {
            engine.start();
        }
        self.refresh();
    }

    pub fn tick(&mut self, elapsed: Duration) {
        if let Session::Playing(engine) = &mut self.session {
            engine.tick(elapsed);
        }
        self.refresh();
    }

    /// Handle one typed line
    pub fn input(&mut self, line: &str) -> Control {
        let command = Command::parse(line, self.is_awaiting_input());
        if command == Command::Quit {
            return Control::Quit;
        }

        let Session::Playing(engine) = &mut self.session else {
            self.write("[the script failed to load; :q quits]\n");
            return Control::Continue;
        };

        let mut notes = Vec::new();
        match command {
            Command::Advance => {
                engine.advance();
            }
            Command::Choose(index) => {
                if !engine.choose(index) {
                    notes.push(format!("[no choice {}]", index + 1));
                }
            }
            Command::Submit(text) => {
                engine.submit_input(&text);
            }
            Command::Jump(node) => {
                if let Err(err) = engine.jump_to(&node) {
                    notes.push(format!("[jump refused: {}]", err));
                }
            }
            Command::Menu => {
                notes.push("Nodes:".to_string());
                for entry in engine.jump_menu() {
                    let lock = if entry.unlocked { "" } else { " (locked)" };
                    notes.push(format!("  {}{}", entry.node, lock));
                }
            }
            Command::History => {
                notes.push("History:".to_string());
                for entry in engine.history() {
                    notes.push(format!(
                        "  {}",
                        crate::typewriter::frame(entry.speaker.as_deref(), &entry.text)
                    ));
                }
            }
            Command::Vars => {
                notes.push("Variables:".to_string());
                for (name, value) in engine.variables() {
                    notes.push(format!("  {} = {}", name, value));
                }
            }
            Command::Reset => engine.reset(),
            Command::ToggleAuto => {
                let mode = match engine.mode() {
                    AdvanceMode::Manual => AdvanceMode::Auto,
                    AdvanceMode::Auto => AdvanceMode::Manual,
                };
                engine.set_mode(mode);
                notes.push(format!("[mode: {:?}]", mode));
            }
            Command::Help => notes.push(HELP.trim_end().to_string()),
            Command::Unknown(text) => {
                notes.push(format!("[unknown command '{}'; :help lists controls]", text));
            }
            Command::Quit => return Control::Quit,
        }

        if self.debug
            && let Ok(json) = serde_json::to_string(&engine.snapshot())
        {
            notes.push(format!("[debug] {json}"));
        }

        for note in notes {
            self.write(&format!("{note}\n"));
        }
        self.refresh();
        Control::Continue
    }

    /// Take everything written since the last drain
    pub fn drain(&mut self) -> Vec<Output> {
        std::mem::take(&mut self.out)
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Output::Write(last)) = self.out.last_mut() {
            last.push_str(text);
        } else {
            self.out.push(Output::Write(text.to_string()));
        }
    }

    fn refresh(&mut self) {
        let engine = match &self.session {
            Session::Playing(engine) => engine,
            Session::Failed(err) => {
                if !self.view.error_shown {
                    self.view.error_shown = true;
                    let screen = format!("=== Script error ===\n{err}\n");
                    self.out.push(Output::Write(screen));
                }
                return;
            }
        };

        let mut chunks = Vec::new();
        let view = &mut self.view;

        if engine.transcript_generation() != view.generation {
            if view.partial > 0 {
                chunks.push(Output::Write("\n".to_string()));
            }
            chunks.push(Output::Clear);
            view.generation = engine.transcript_generation();
            view.shown = 0;
            view.partial = 0;
            view.presented = None;
        }

        let transcript = engine.transcript();
        let new_entries = transcript.get(view.shown..).unwrap_or_default();
        let finished_reveal = new_entries
            .iter()
            .any(|entry| entry.kind == TranscriptKind::Dialogue);
        let reveal_dropped =
            engine.reveal().is_none() || engine.history().len() != view.history_len;
        if view.partial > 0 && !finished_reveal && reveal_dropped {
            chunks.push(Output::Write("\n".to_string()));
            view.partial = 0;
        }

        for entry in new_entries {
            let text = match entry.kind {
                TranscriptKind::Dialogue => {
                    let rest: String = entry.text.chars().skip(view.partial).collect();
                    view.partial = 0;
                    format!("{rest}\n")
                }
                TranscriptKind::System => format!("[system] {}\n", entry.text),
                TranscriptKind::Choice => format!("* {}\n", entry.text),
                // Already visible while the prompt was open
                TranscriptKind::Prompt | TranscriptKind::Input => continue,
            };
            chunks.push(Output::Write(text));
        }
        view.shown = transcript.len();

        if let Some(visible) = engine.reveal() {
            let count = visible.chars().count();
            if count > view.partial {
                let fresh: String = visible.chars().skip(view.partial).collect();
                chunks.push(Output::Write(fresh));
                view.partial = count;
            }
        }
        view.history_len = engine.history().len();

        let key = (engine.phase(), engine.cursor().clone());
        match engine.phase() {
            Phase::AwaitingChoice | Phase::AwaitingInput | Phase::Completed => {
                if view.presented.as_ref() != Some(&key) {
                    let text = match engine.phase() {
                        Phase::AwaitingChoice => engine
                            .choices()
                            .iter()
                            .enumerate()
                            .map(|(i, choice)| format!("  {}) {}\n", i + 1, choice.text))
                            .collect::<String>(),
                        Phase::AwaitingInput => {
                            format!("? {}\n", engine.prompt().unwrap_or_default())
                        }
                        _ => "[end]\n".to_string(),
                    };
                    chunks.push(Output::Write(text));
                    view.presented = Some(key);
                }
            }
            _ => view.presented = None,
        }

        for chunk in chunks {
            match chunk {
                Output::Write(text) => self.write(&text),
                Output::Clear => self.out.push(Output::Clear),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value::Value;

    const SCRIPT: &str = r#"
:: start
? What is your name? {name}
Doctor: Hello {name}.
* Open the door -> hall
* Stay
-> hall

:: hall
@log DOOR OPENED
The hall is dark.
"#;

    fn options() -> EngineOptions {
        EngineOptions {
            typing_speed_ms: 10,
            rng_seed: Some(1),
            ..Default::default()
        }
    }

    fn text(outputs: &[Output]) -> String {
        outputs
            .iter()
            .map(|output| match output {
                Output::Write(text) => text.as_str(),
                Output::Clear => "<clear>",
            })
            .collect()
    }

    #[test]
    fn commands_depend_on_phase() {
        assert_eq!(Command::parse("", false), Command::Advance);
        assert_eq!(Command::parse(" 2 ", false), Command::Choose(1));
        assert_eq!(Command::parse("0", false), Command::Unknown("0".to_string()));
        assert_eq!(Command::parse("42", true), Command::Submit("42".to_string()));
        assert_eq!(Command::parse(":jump cellar", true), Command::Jump("cellar".to_string()));
        assert_eq!(Command::parse(":jump", false), Command::Unknown(":jump".to_string()));
        assert_eq!(Command::parse(":q", true), Command::Quit);
        assert_eq!(Command::parse("hello", false), Command::Unknown("hello".to_string()));
    }

    #[test]
    fn full_playthrough_renders_incrementally() {
        let mut session = PlayerSession::in_memory(SCRIPT, options(), false);
        session.start();
        assert_eq!(text(&session.drain()), "? What is your name? {name}\n");

        assert_eq!(session.input("Ash"), Control::Continue);
        assert_eq!(
            session.engine().unwrap().variables().get("name"),
            Some(&Value::from("Ash"))
        );
        session.tick(Duration::from_millis(30));
        assert_eq!(text(&session.drain()), "Doc");

        session.input("");
        assert_eq!(text(&session.drain()), "tor: Hello Ash.\n");

        session.input("");
        assert_eq!(text(&session.drain()), "  1) Open the door\n  2) Stay\n");

        session.input("1");
        let rendered = text(&session.drain());
        assert_eq!(rendered, "* Open the door\n[system] DOOR OPENED\n");

        session.tick(Duration::from_secs(5));
        assert_eq!(text(&session.drain()), "> The hall is dark.\n");

        session.input("");
        assert!(session.is_completed());
        assert_eq!(text(&session.drain()), "[end]\n");
    }

    #[test]
    fn info_commands_do_not_touch_playback() {
        let mut session = PlayerSession::in_memory(SCRIPT, options(), false);
        session.start();
        session.drain();

        session.input(":menu");
        assert_eq!(
            text(&session.drain()),
            "Nodes:\n  start\n  hall (locked)\n"
        );
        session.input(":jump hall");
        assert!(text(&session.drain()).contains("jump refused"));
        session.input(":vars");
        assert_eq!(text(&session.drain()), "Variables:\n");
        assert_eq!(session.engine().unwrap().phase(), Phase::AwaitingInput);
    }

    #[test]
    fn jump_mid_reveal_ends_the_partial_line() {
        let mut session =
            PlayerSession::in_memory(":: start\nA long opening line.\n", options(), false);
        session.start();
        session.tick(Duration::from_millis(50));
        assert_eq!(text(&session.drain()), "> A l");

        session.input(":jump start");
        session.tick(Duration::from_millis(20));
        assert_eq!(text(&session.drain()), "\n> ");
    }

    #[test]
    fn clear_effect_wipes_screen() {
        let mut session = PlayerSession::in_memory(
            ":: start\n@log one\nFirst.\n@clear\n@log two\n",
            options(),
            false,
        );
        session.start();
        session.tick(Duration::from_secs(1));
        assert_eq!(text(&session.drain()), "[system] one\n> First.\n");

        session.input("");
        assert_eq!(text(&session.drain()), "<clear>[system] two\n[end]\n");
    }

    #[test]
    fn invalid_script_shows_error_screen() {
        let mut session = PlayerSession::in_memory(":: intro\nNo start.\n", options(), false);
        assert!(session.error().is_some());
        session.start();
        let screen = text(&session.drain());
        assert!(screen.starts_with("=== Script error ===\n"));

        assert_eq!(session.input(""), Control::Continue);
        assert!(text(&session.drain()).contains("failed to load"));
        assert_eq!(session.input(":q"), Control::Quit);
    }
}
