//! Playback state machine
//!
//! [`Engine`] walks a parsed [`Script`] one suspension point at a time. It
//! owns no timers: the host feeds elapsed time through [`Engine::tick`] and
//! player actions through [`Engine::advance`], [`Engine::choose`] and
//! [`Engine::submit_input`] (or [`Engine::handle`] with an [`Event`]).
//! Cancelling a reveal or a pending delay is therefore just dropping it.

use crate::config::EngineOptions;
use crate::error::JumpError;
use crate::expr;
use crate::interpreter::{self, CounterLimits};
use crate::storage::{KeyValueStore, MemoryStore, Persistence};
use crate::typewriter::{Reveal, Typewriter};
use crate::types::event::Event;
use crate::types::output::{
    JumpEntry, PresentedChoice, SideEffect, TranscriptEntry, TranscriptKind,
};
use crate::types::script::{AUTO_CLEAR_KEY, ChoiceOption, Line, START_NODE, Script};
use crate::types::state::{AdvanceMode, Cursor, HistoryEntry, Phase};
use crate::types::value::{Value, Variables};
use debug::{DebugCategory, DebugConfig, DebugSnapshot, LogLevel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::time::Duration;

pub mod debug;


/// Lines processed in one run before playback is declared stuck
const MAX_STEPS_PER_RUN: usize = 10_000;

/// A timed pause between two lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Delay {
    remaining: Duration,
    /// Whether the cursor moves past the current line when the delay ends
    next_line: bool,
}

type CompleteCallback = Box<dyn FnMut()>;
type VariablesCallback = Box<dyn FnMut(&Variables)>;
type EffectCallback = Box<dyn FnMut(&SideEffect)>;

/// Script playback engine
pub struct Engine<S: KeyValueStore = MemoryStore> {
    script: Script,
    options: EngineOptions,
    limits: CounterLimits,
    persistence: Persistence<S>,
    debug: DebugConfig,
    rng: StdRng,

    phase: Phase,
    cursor: Cursor,
    variables: Variables,
    selected_choices: BTreeSet<String>,
    visited_nodes: BTreeSet<String>,
    history: Vec<HistoryEntry>,
    transcript: Vec<TranscriptEntry>,
    /// Bumped whenever the transcript is wiped
    generation: u64,

    typewriter: Option<Typewriter>,
    delay: Option<Delay>,
    presented: Vec<PresentedChoice>,
    prompt: Option<String>,
    transitioning: bool,

    on_complete: Option<CompleteCallback>,
    on_variables_changed: Option<VariablesCallback>,
    on_effect: Option<EffectCallback>,
}

impl Engine<MemoryStore> {
    /// Engine with volatile storage
    pub fn in_memory(script: Script, options: EngineOptions) -> Self {
        Self::new(script, options, MemoryStore::new())
    }
}

impl<S: KeyValueStore> Engine<S> {
    /// Create an idle engine, restoring persisted state from `store`
    pub fn new(script: Script, options: EngineOptions, store: S) -> Self {
        let persistence = Persistence::new(store, options.storage_prefix.clone());
        let loaded = persistence.load(&options.initial_variables);
        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            limits: limits_for(&script, &options),
            script,
            options,
            persistence,
            debug: DebugConfig::default(),
            rng,
            phase: Phase::Idle,
            cursor: Cursor::new(START_NODE),
            variables: loaded.variables,
            selected_choices: loaded.selected_choices,
            visited_nodes: loaded.visited_nodes,
            history: Vec::new(),
            transcript: Vec::new(),
            generation: 0,
            typewriter: None,
            delay: None,
            presented: Vec::new(),
            prompt: None,
            transitioning: false,
            on_complete: None,
            on_variables_changed: None,
            on_effect: None,
        }
    }

    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = debug;
        self
    }

    /// Called once when the graph is exhausted
    pub fn on_complete(&mut self, callback: impl FnMut() + 'static) {
        self.on_complete = Some(Box::new(callback));
    }

    /// Called with the full variable map after every change
    pub fn on_variables_changed(&mut self, callback: impl FnMut(&Variables) + 'static) {
        self.on_variables_changed = Some(Box::new(callback));
    }

    /// Called for every side effect a command produces
    pub fn on_effect(&mut self, callback: impl FnMut(&SideEffect) + 'static) {
        self.on_effect = Some(Box::new(callback));
    }

    fn log(&self, category: DebugCategory, level: LogLevel, message: &str) {
        debug::log(&self.debug, category, level, message);
    }

    // ---- accessors ----

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn mode(&self) -> AdvanceMode {
        self.options.mode
    }

    /// Switch between manual and automatic advancement
    pub fn set_mode(&mut self, mode: AdvanceMode) {
        self.options.mode = mode;
        if mode == AdvanceMode::Auto && self.phase == Phase::AwaitingAdvance {
            self.schedule_auto_advance();
        }
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
    }

    /// Changes every time the transcript is wiped, so a renderer can redraw
    pub fn transcript_generation(&self) -> u64 {
        self.generation
    }

    pub fn visited_nodes(&self) -> &BTreeSet<String> {
        &self.visited_nodes
    }

    pub fn selected_choices(&self) -> &BTreeSet<String> {
        &self.selected_choices
    }

    /// Options presented while awaiting a choice
    pub fn choices(&self) -> &[PresentedChoice] {
        &self.presented
    }

    /// Interpolated prompt while awaiting input
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    /// Visible part of the line being revealed
    pub fn reveal(&self) -> Option<&str> {
        self.typewriter
            .as_ref()
            .filter(|tw| tw.is_running())
            .map(Typewriter::visible)
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    pub fn snapshot(&self) -> DebugSnapshot {
        DebugSnapshot {
            phase: self.phase,
            cursor: self.cursor.clone(),
            variables: self.variables.clone(),
            visited_nodes: self.visited_nodes.iter().cloned().collect(),
            selected_choices: self.selected_choices.iter().cloned().collect(),
            pending_choices: self.presented.iter().map(|c| c.text.clone()).collect(),
            prompt: self.prompt.clone(),
        }
    }

    /// Nodes in source order, unlocked once visited (`start` always is)
    pub fn jump_menu(&self) -> Vec<JumpEntry> {
        self.script
            .node_ids()
            .map(|node| JumpEntry {
                node: node.to_string(),
                unlocked: self.is_unlocked(node),
            })
            .collect()
    }

    fn is_unlocked(&self, node: &str) -> bool {
        node == START_NODE || self.visited_nodes.contains(node)
    }

    // ---- commands ----

    /// Leave `Idle` and play until the first suspension point
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.log(DebugCategory::Engine, LogLevel::Info, "starting playback");
        self.cursor = Cursor::new(START_NODE);
        self.run();
        true
    }

    /// Dispatch an external event
    pub fn handle(&mut self, event: Event) -> bool {
        match event {
            Event::Tick(elapsed) => {
                self.tick(elapsed);
                true
            }
            Event::Advance => self.advance(),
            Event::Choose(index) => self.choose(index),
            Event::Submit(text) => self.submit_input(&text),
            Event::JumpTo(node) => match self.jump_to(&node) {
                Ok(()) => true,
                Err(err) => {
                    self.log(DebugCategory::Flow, LogLevel::Warn, &err.to_string());
                    false
                }
            },
            Event::Reset => {
                self.reset();
                true
            }
        }
    }

    /// Feed elapsed time to the running reveal or pending delay
    pub fn tick(&mut self, elapsed: Duration) {
        if self.transitioning {
            return;
        }
        match self.phase {
            Phase::Revealing => {
                let finished = match self.typewriter.as_mut().and_then(|tw| tw.tick(elapsed)) {
                    Some(Reveal::Finished(_)) => true,
                    Some(Reveal::Partial(_)) | None => false,
                };
                if finished {
                    self.finish_reveal();
                }
            }
            Phase::Delaying => {
                let Some(delay) = self.delay.as_mut() else {
                    return;
                };
                delay.remaining = delay.remaining.saturating_sub(elapsed);
                if delay.remaining.is_zero() {
                    let next_line = delay.next_line;
                    self.delay = None;
                    self.log(DebugCategory::Timing, LogLevel::Trace, "delay elapsed");
                    if next_line {
                        self.cursor.line += 1;
                    }
                    self.run();
                }
            }
            _ => {}
        }
    }

    /// Player continue: skip the running reveal, or move past a revealed line
    pub fn advance(&mut self) -> bool {
        if self.transitioning {
            return false;
        }
        match self.phase {
            Phase::Revealing => {
                let finished = matches!(
                    self.typewriter.as_mut().and_then(Typewriter::skip_to_end),
                    Some(Reveal::Finished(_))
                );
                if finished {
                    self.finish_reveal();
                }
                true
            }
            Phase::AwaitingAdvance => {
                self.typewriter = None;
                self.cursor.line += 1;
                self.run();
                true
            }
            _ => false,
        }
    }

    /// Pick the nth presented choice
    pub fn choose(&mut self, index: usize) -> bool {
        if self.transitioning || self.phase != Phase::AwaitingChoice {
            return false;
        }
        let Some(presented) = self.presented.get(index).cloned() else {
            self.log(
                DebugCategory::Flow,
                LogLevel::Debug,
                &format!("choice {} out of range", index),
            );
            return false;
        };
        let Some(option) = self.current_option(presented.option) else {
            return false;
        };

        self.log(
            DebugCategory::Flow,
            LogLevel::Debug,
            &format!("[Choice] '{}' selected in node '{}'", presented.id, self.cursor.node),
        );

        self.history.push(HistoryEntry::new(None, presented.text.clone()));
        self.transcript
            .push(TranscriptEntry::new(TranscriptKind::Choice, presented.text.clone()));

        self.selected_choices.insert(presented.id);
        self.persistence.save_selected_choices(&self.selected_choices);
        let current = self.cursor.node.clone();
        self.mark_visited(&current);
        self.presented.clear();

        match option.target {
            Some(target) => {
                self.mark_visited(&target);
                self.enter_node(&target);
            }
            None => self.cursor.line += 1,
        }
        self.run();
        true
    }

    fn current_option(&self, option: usize) -> Option<ChoiceOption> {
        match self.script.node(&self.cursor.node)?.lines.get(self.cursor.line)? {
            Line::Choice { options } => options.get(option).cloned(),
            _ => None,
        }
    }

    /// Answer the open prompt; blank input is ignored
    pub fn submit_input(&mut self, text: &str) -> bool {
        if self.transitioning || self.phase != Phase::AwaitingInput {
            return false;
        }
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        let prompt = self.prompt.take().unwrap_or_default();
        self.transcript
            .push(TranscriptEntry::new(TranscriptKind::Prompt, prompt));
        self.transcript
            .push(TranscriptEntry::new(TranscriptKind::Input, text));

        let capture = self
            .script
            .node(&self.cursor.node)
            .and_then(|node| node.lines.get(self.cursor.line))
            .and_then(|line| match line {
                Line::Input { content } => expr::placeholder(content).map(str::to_string),
                _ => None,
            });
        if let Some(name) = capture {
            self.log(
                DebugCategory::Variables,
                LogLevel::Debug,
                &format!("[Input] {} = \"{}\"", name, text),
            );
            let mut variables = self.variables.clone();
            variables.insert(name, Value::from(text));
            self.apply_variables(variables);
        }

        self.cursor.line += 1;
        self.run();
        true
    }

    /// Debug jump to `start` or a visited node
    pub fn jump_to(&mut self, node: &str) -> Result<(), JumpError> {
        if !self.script.contains(node) {
            return Err(JumpError::UnknownNode(node.to_string()));
        }
        if !self.is_unlocked(node) {
            return Err(JumpError::Locked(node.to_string()));
        }

        self.log(
            DebugCategory::Flow,
            LogLevel::Info,
            &format!("[Jump] {} -> {}", self.cursor.node, node),
        );
        self.cancel_pending();
        self.enter_node(node);
        self.run();
        Ok(())
    }

    /// Continue from a cursor saved by the host
    pub fn resume_at(&mut self, cursor: Cursor) -> Result<(), JumpError> {
        if !self.script.contains(&cursor.node) {
            return Err(JumpError::UnknownNode(cursor.node));
        }
        self.cancel_pending();
        self.cursor = cursor;
        self.run();
        Ok(())
    }

    /// Restart from `start`, keeping variables and persisted progress
    pub fn reset(&mut self) {
        self.log(DebugCategory::Engine, LogLevel::Info, "reset");
        self.cancel_pending();
        self.history.clear();
        self.clear_transcript();
        self.cursor = Cursor::new(START_NODE);
        self.run();
    }

    /// Swap in another script and restart it
    pub fn load_script(&mut self, script: Script) {
        self.cancel_pending();
        self.limits = limits_for(&script, &self.options);
        self.script = script;
        self.history.clear();
        self.clear_transcript();
        self.cursor = Cursor::new(START_NODE);
        self.log(
            DebugCategory::Engine,
            LogLevel::Info,
            &format!("loaded script with {} nodes", self.script.len()),
        );
        self.run();
    }

    /// Drop the reveal, the delay and any open await
    fn cancel_pending(&mut self) {
        if let Some(tw) = self.typewriter.as_mut() {
            tw.cancel();
        }
        self.typewriter = None;
        self.delay = None;
        self.presented.clear();
        self.prompt = None;
        self.phase = Phase::Idle;
    }

    // ---- progress loop ----

    fn run(&mut self) {
        if self.transitioning {
            return;
        }
        self.transitioning = true;
        self.progress();
        self.transitioning = false;
    }

    fn progress(&mut self) {
        for _ in 0..MAX_STEPS_PER_RUN {
            let Some(node) = self.script.node(&self.cursor.node) else {
                self.log(
                    DebugCategory::Engine,
                    LogLevel::Error,
                    &format!("node '{}' does not exist", self.cursor.node),
                );
                self.complete();
                return;
            };

            let Some(line) = node.lines.get(self.cursor.line).cloned() else {
                let jump = node.jump.clone();
                let current = self.cursor.node.clone();
                self.mark_visited(&current);
                match jump {
                    Some(target) => {
                        self.log(
                            DebugCategory::Flow,
                            LogLevel::Debug,
                            &format!("[Jump] {} -> {}", current, target),
                        );
                        self.enter_node(&target);
                        continue;
                    }
                    None => {
                        self.complete();
                        return;
                    }
                }
            };

            if let Some(condition) = line.condition()
                && !expr::evaluate(condition, &self.variables)
            {
                self.log(
                    DebugCategory::Flow,
                    LogLevel::Trace,
                    &format!("[Skip] {}:{} ({})", self.cursor.node, self.cursor.line, condition),
                );
                self.cursor.line += 1;
                continue;
            }

            match line {
                Line::Dialogue {
                    speaker, content, ..
                } => {
                    self.begin_reveal(speaker, &content);
                    return;
                }
                Line::Command { content, .. } => {
                    if let Some(duration) = wait_duration(&content, self.options.default_wait_ms) {
                        self.log(
                            DebugCategory::Timing,
                            LogLevel::Debug,
                            &format!("[Wait] {:?}", duration),
                        );
                        self.delay = Some(Delay {
                            remaining: duration,
                            next_line: true,
                        });
                        self.phase = Phase::Delaying;
                        return;
                    }
                    self.run_command(&content);
                    self.cursor.line += 1;
                }
                Line::Choice { options } => {
                    let presented = self.present(&options);
                    if presented.is_empty() {
                        self.log(
                            DebugCategory::Flow,
                            LogLevel::Debug,
                            "[Choice] no visible options, skipped",
                        );
                        self.cursor.line += 1;
                        continue;
                    }
                    self.presented = presented;
                    self.phase = Phase::AwaitingChoice;
                    return;
                }
                Line::Input { content } => {
                    self.prompt = Some(expr::interpolate(&content, &self.variables));
                    self.phase = Phase::AwaitingInput;
                    return;
                }
            }
        }

        self.log(
            DebugCategory::Engine,
            LogLevel::Error,
            &format!(
                "no suspension point after {} steps at {}:{}, stopping",
                MAX_STEPS_PER_RUN, self.cursor.node, self.cursor.line
            ),
        );
        self.complete();
    }

    fn begin_reveal(&mut self, speaker: Option<String>, content: &str) {
        let text = expr::interpolate(content, &self.variables);
        self.history.push(HistoryEntry::new(speaker.clone(), text.clone()));
        self.typewriter = Some(Typewriter::new(
            &text,
            speaker.as_deref(),
            self.options.char_delay(),
        ));
        self.phase = Phase::Revealing;
    }

    fn finish_reveal(&mut self) {
        if let Some(tw) = self.typewriter.as_ref() {
            self.transcript
                .push(TranscriptEntry::new(TranscriptKind::Dialogue, tw.text()));
        }
        match self.options.mode {
            AdvanceMode::Manual => self.phase = Phase::AwaitingAdvance,
            AdvanceMode::Auto => self.schedule_auto_advance(),
        }
    }

    fn schedule_auto_advance(&mut self) {
        let (min, max) = self.options.auto_delay_bounds();
        let millis = self
            .rng
            .gen_range(min.as_millis() as u64..=max.as_millis() as u64);
        self.log(
            DebugCategory::Timing,
            LogLevel::Trace,
            &format!("[Auto] advancing in {}ms", millis),
        );
        self.delay = Some(Delay {
            remaining: Duration::from_millis(millis),
            next_line: true,
        });
        self.phase = Phase::Delaying;
    }

    fn present(&self, options: &[ChoiceOption]) -> Vec<PresentedChoice> {
        options
            .iter()
            .enumerate()
            .filter(|(_, option)| {
                option
                    .condition
                    .as_deref()
                    .is_none_or(|condition| expr::evaluate(condition, &self.variables))
            })
            .filter(|(_, option)| {
                option
                    .visible_after
                    .iter()
                    .all(|id| self.selected_choices.contains(id))
            })
            .map(|(index, option)| PresentedChoice {
                option: index,
                id: option.id(),
                text: expr::interpolate(&option.text, &self.variables),
            })
            .collect()
    }

    fn run_command(&mut self, content: &str) {
        let execution = interpreter::execute(content, &self.variables, &self.limits);
        if execution.changed {
            self.log(
                DebugCategory::Variables,
                LogLevel::Debug,
                &format!("[Command] {}", content),
            );
            self.apply_variables(execution.variables);
        }

        for effect in &execution.effects {
            match effect {
                SideEffect::Log { text } => self
                    .transcript
                    .push(TranscriptEntry::new(TranscriptKind::System, text.clone())),
                SideEffect::Clear => self.clear_transcript(),
                SideEffect::Vfx { .. } => {}
            }
            if let Some(callback) = self.on_effect.as_mut() {
                callback(effect);
            }
        }
    }

    fn apply_variables(&mut self, variables: Variables) {
        self.variables = variables;
        self.persistence.save(&self.variables);
        if let Some(callback) = self.on_variables_changed.as_mut() {
            callback(&self.variables);
        }
    }

    fn mark_visited(&mut self, node: &str) {
        if self.visited_nodes.insert(node.to_string()) {
            self.log(
                DebugCategory::Persistence,
                LogLevel::Trace,
                &format!("visited '{}'", node),
            );
        }
        self.persistence.mark_node_visited(node);
    }

    fn enter_node(&mut self, node: &str) {
        if self.script.flag(AUTO_CLEAR_KEY) {
            self.clear_transcript();
        }
        self.cursor = Cursor::new(node);
    }

    fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.generation += 1;
    }

    fn complete(&mut self) {
        if self.phase == Phase::Completed {
            return;
        }
        self.typewriter = None;
        self.delay = None;
        self.phase = Phase::Completed;
        self.log(DebugCategory::Engine, LogLevel::Info, "playback completed");
        if let Some(callback) = self.on_complete.as_mut() {
            callback();
        }
    }
}

fn limits_for(script: &Script, options: &EngineOptions) -> CounterLimits {
    let mut limits = options.counter_limits.clone();
    limits.extend(script.counter_limits());
    limits
}

/// `wait` or `wait <seconds>`; any other command yields `None`
fn wait_duration(command: &str, default_ms: u64) -> Option<Duration> {
    let mut parts = command.split_whitespace();
    if parts.next() != Some("wait") {
        return None;
    }
    let duration = parts
        .next()
        .and_then(|secs| secs.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::from_millis(default_ms));
    Some(duration)
}
