//! Text command console.
//!
//! A [`Console`] keeps a registry of named [`ConsoleCommand`]s and an output
//! history. Submitted lines are echoed as `> line`, lowercased, split with
//! [`split_command_line`] and dispatched on their first word.
//!
//! While the console has focus ([`Console::open`]) the input router's
//! listening gate is closed, so typing does not trigger gameplay bindings.
//! Core bindings keep working, which is how the console key closes it again.
//!
//! Headless runs feed lines from a [`CommandScript`] through
//! [`feed_console_lines`](crate::systems::console::feed_console_lines).
//!
//! # Example
//!
//! ```ignore
//! let console = Console::new(&ctx.input);
//! console.submit("help");
//! for line in console.history() {
//!     println!("{line}");
//! }
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bevy_ecs::prelude::*;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resources::bindings::InputRouter;

/// A named action the console can run.
pub trait ConsoleCommand {
    /// Word that invokes the command. Matched case-insensitively.
    fn name(&self) -> &str;

    fn description(&self) -> String;

    fn usage(&self) -> String {
        self.name().to_string()
    }

    /// Run with the words that followed the command name. Output goes to
    /// `console` through [`Console::print`].
    fn execute(&self, args: &[String], console: &Console);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    #[error("console command '{0}' is already registered")]
    DuplicateCommand(String),
}

/// Split a command line into words.
///
/// Words are separated by spaces. A double-quoted run is one word, spaces
/// included; the closing quote always ends a word, even an empty one. An
/// unterminated quote runs to the end of the line.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '"' if !quoted => quoted = true,
            '"' => {
                quoted = false;
                words.push(std::mem::take(&mut current));
            }
            ' ' if !quoted => {
                if !current.trim().is_empty() {
                    words.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        words.push(current);
    }
    words
}

/// Command registry, output history and focus state.
pub struct Console {
    commands: RefCell<Vec<Rc<dyn ConsoleCommand>>>,
    history: RefCell<Vec<String>>,
    focused: Cell<bool>,
    router: Weak<InputRouter>,
}

impl Console {
    /// A console with the built-in `help` and `clear` commands, gating
    /// `router` while focused.
    pub fn new(router: &Rc<InputRouter>) -> Console {
        let console = Console {
            commands: RefCell::new(Vec::new()),
            history: RefCell::new(Vec::new()),
            focused: Cell::new(false),
            router: Rc::downgrade(router),
        };
        for builtin in [
            Rc::new(ClearCommand) as Rc<dyn ConsoleCommand>,
            Rc::new(HelpCommand),
        ] {
            if let Err(e) = console.register(builtin) {
                warn!("{e}");
            }
        }
        console
    }

    /// Add `command`. A command with the same name is never replaced.
    pub fn register(&self, command: Rc<dyn ConsoleCommand>) -> Result<(), ConsoleError> {
        let mut commands = self.commands.borrow_mut();
        if commands
            .iter()
            .any(|c| c.name().eq_ignore_ascii_case(command.name()))
        {
            return Err(ConsoleError::DuplicateCommand(command.name().to_string()));
        }
        debug!("Console command '{}' registered", command.name());
        commands.push(command);
        Ok(())
    }

    /// Remove the command called `name`. Returns `false` if there was none.
    pub fn unregister(&self, name: &str) -> bool {
        let mut commands = self.commands.borrow_mut();
        let before = commands.len();
        commands.retain(|c| !c.name().eq_ignore_ascii_case(name));
        commands.len() != before
    }

    /// Registered commands, in registration order.
    pub fn command_list(&self) -> Vec<Rc<dyn ConsoleCommand>> {
        self.commands.borrow().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.borrow().len()
    }

    fn find(&self, name: &str) -> Option<Rc<dyn ConsoleCommand>> {
        self.commands
            .borrow()
            .iter()
            .find(|c| c.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Run one line of input. Blank lines are ignored.
    ///
    /// Returns `true` if a registered command ran. Lines are accepted whether
    /// or not the console has focus.
    pub fn submit(&self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        self.print(format!("> {line}"));

        let mut words = split_command_line(&line.to_lowercase());
        if words.is_empty() {
            return false;
        }
        let name = words.remove(0);
        match self.find(&name) {
            Some(command) => {
                command.execute(&words, self);
                true
            }
            None => {
                self.print(format!("Error: Unknown command '{name}'."));
                false
            }
        }
    }

    /// Append a line to the history.
    pub fn print(&self, line: impl Into<String>) {
        let line = line.into();
        info!("[console] {line}");
        self.history.borrow_mut().push(line);
    }

    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    pub fn last_line(&self) -> Option<String> {
        self.history.borrow().last().cloned()
    }

    pub fn clear_history(&self) {
        self.history.borrow_mut().clear();
    }

    /// Take focus and close the listening gate.
    pub fn open(&self) {
        self.set_focus(true);
    }

    /// Release focus and reopen the listening gate.
    pub fn close(&self) {
        self.set_focus(false);
    }

    pub fn is_open(&self) -> bool {
        self.focused.get()
    }

    fn set_focus(&self, focused: bool) {
        self.focused.set(focused);
        if let Some(router) = self.router.upgrade() {
            router.toggle_listening(!focused);
        }
    }
}

struct ClearCommand;

impl ConsoleCommand for ClearCommand {
    fn name(&self) -> &str {
        "clear"
    }

    fn description(&self) -> String {
        "Clears the command history.".to_string()
    }

    fn execute(&self, _args: &[String], console: &Console) {
        console.clear_history();
    }
}

struct HelpCommand;

impl ConsoleCommand for HelpCommand {
    fn name(&self) -> &str {
        "help"
    }

    fn description(&self) -> String {
        "Displays a list of available commands.".to_string()
    }

    fn execute(&self, _args: &[String], console: &Console) {
        console.print("Available commands:");
        for command in console.command_list() {
            console.print(format!("- {}: {}", command.name(), command.description()));
        }
    }
}

/// One scheduled line of a [`CommandScript`]. Frames are 1-based.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedCommand {
    pub frame: u64,
    pub line: String,
}

/// Pre-recorded console input for headless runs.
///
/// JSON form: `[{"frame": 2, "line": "spawn grunt 3"}]`.
#[derive(Resource, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandScript {
    entries: Vec<ScriptedCommand>,
}

impl CommandScript {
    pub fn new(mut entries: Vec<ScriptedCommand>) -> Self {
        entries.sort_by_key(|e| e.frame);
        CommandScript { entries }
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let entries: Vec<ScriptedCommand> =
            serde_json::from_str(json).map_err(|e| format!("Invalid command script: {}", e))?;
        Ok(CommandScript::new(entries))
    }

    /// Submit `line` on `frame`.
    pub fn line(mut self, frame: u64, line: impl Into<String>) -> Self {
        self.entries.push(ScriptedCommand {
            frame,
            line: line.into(),
        });
        self.entries.sort_by_key(|e| e.frame);
        self
    }

    /// Lines scheduled for `frame`, in script order.
    pub fn lines_at(&self, frame: u64) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |e| e.frame == frame)
            .map(|e| e.line.as_str())
    }

    pub fn last_frame(&self) -> Option<u64> {
        self.entries.last().map(|e| e.frame)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
