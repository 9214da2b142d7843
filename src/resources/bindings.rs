//! Key-to-action binding router.
//!
//! Subscribers register `(key, action, class)` bindings with the
//! [`InputRouter`]. Each tick, [`InputRouter::tick`] looks at the frame's
//! pressed keys and calls [`ActionReceiver::on_action`] for every matching
//! binding.
//!
//! # Gating
//!
//! A single "listening" flag suppresses [`ActionClass::Gameplay`] and
//! [`ActionClass::Ui`] bindings, e.g. while a text field owns the keyboard.
//! [`ActionClass::Core`] bindings (quit, console toggle) always fire.
//!
//! # Order
//!
//! Dispatch follows subscriber registration order, then binding order within
//! a subscriber. The table is copied before dispatching, so receivers may add
//! or remove bindings (or flip the gate) from inside `on_action`; binding
//! changes apply next tick, the gate is read before every dispatch.
//!
//! The router only holds `Weak` references. Subscribers that were dropped are
//! skipped once and forgotten at the end of the tick.
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::resources::input::{Key, KeyEdge, pressed_keys};

/// Priority tier of a binding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionClass {
    /// Always dispatched, ignores the listening gate.
    Core,
    #[default]
    Gameplay,
    Ui,
}

impl ActionClass {
    /// Whether the listening gate applies to this class.
    pub fn is_gated(self) -> bool {
        !matches!(self, ActionClass::Core)
    }

    /// Lenient parse for data-driven bindings: empty input means
    /// `Gameplay`, unrecognized input falls back to `Gameplay` with a warning.
    pub fn parse_or_default(s: &str) -> ActionClass {
        if s.trim().is_empty() {
            return ActionClass::Gameplay;
        }
        match s.parse() {
            Ok(class) => class,
            Err(e) => {
                warn!("{e}. Defaulting to Gameplay.");
                ActionClass::Gameplay
            }
        }
    }
}

impl FromStr for ActionClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "core" => Ok(ActionClass::Core),
            "gameplay" => Ok(ActionClass::Gameplay),
            "ui" => Ok(ActionClass::Ui),
            _ => Err(format!("Invalid action class '{s}'")),
        }
    }
}

impl fmt::Display for ActionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionClass::Core => "Core",
            ActionClass::Gameplay => "Gameplay",
            ActionClass::Ui => "UI",
        })
    }
}

/// Callback contract for subscribers that react to actions.
pub trait ActionReceiver {
    fn on_action(&self, action: &str);
}

/// Anything that can own bindings.
///
/// Subscribers that want dispatches return `Some(self)` from
/// [`Subscriber::action_receiver`]; others are skipped with a warning.
pub trait Subscriber {
    fn name(&self) -> &str;

    fn action_receiver(&self) -> Option<&dyn ActionReceiver> {
        None
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binding {
    pub key: Key,
    pub action: String,
    pub class: ActionClass,
}

/// Outcome of one [`InputRouter::tick`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Bindings whose receiver was called.
    pub dispatched: usize,
    /// Gated bindings held back because listening was off.
    pub suppressed: usize,
    /// Bindings whose subscriber was gone or had no receiver.
    pub skipped: usize,
}

impl TickReport {
    pub fn absorb(&mut self, other: TickReport) {
        self.dispatched += other.dispatched;
        self.suppressed += other.suppressed;
        self.skipped += other.skipped;
    }
}

struct SubscriberEntry {
    subscriber: Weak<dyn Subscriber>,
    label: String,
    bindings: SmallVec<[Binding; 4]>,
}

impl SubscriberEntry {
    fn is<S: Subscriber + 'static>(&self, subscriber: &Rc<S>) -> bool {
        std::ptr::addr_eq(self.subscriber.as_ptr(), Rc::as_ptr(subscriber))
    }
}

struct PendingDispatch {
    subscriber: Weak<dyn Subscriber>,
    label: String,
    action: String,
    class: ActionClass,
}

/// Routes pressed keys to subscribers' actions.
pub struct InputRouter {
    entries: RefCell<Vec<SubscriberEntry>>,
    listening: Cell<bool>,
}

impl Default for InputRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl InputRouter {
    /// Empty router with listening enabled.
    pub fn new() -> Self {
        InputRouter {
            entries: RefCell::new(Vec::new()),
            listening: Cell::new(true),
        }
    }

    /// Bind `key` to `action` for `subscriber`.
    ///
    /// Returns `false` if the exact binding already exists.
    pub fn add_binding<S: Subscriber + 'static>(
        &self,
        subscriber: &Rc<S>,
        key: Key,
        action: impl Into<String>,
        class: ActionClass,
    ) -> bool {
        let binding = Binding {
            key,
            action: action.into(),
            class,
        };
        let mut entries = self.entries.borrow_mut();
        if let Some(index) = entries.iter().position(|e| e.is(subscriber)) {
            let bindings = &mut entries[index].bindings;
            if bindings.contains(&binding) {
                return false;
            }
            bindings.push(binding);
            return true;
        }

        let weak: Weak<dyn Subscriber> = Rc::downgrade(subscriber) as Weak<dyn Subscriber>;
        let mut bindings = SmallVec::new();
        bindings.push(binding);
        entries.push(SubscriberEntry {
            subscriber: weak,
            label: subscriber.name().to_string(),
            bindings,
        });
        true
    }

    /// Remove the exact binding. A subscriber left without bindings is
    /// forgotten entirely.
    pub fn remove_binding<S: Subscriber + 'static>(
        &self,
        subscriber: &Rc<S>,
        key: Key,
        action: &str,
        class: ActionClass,
    ) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(index) = entries.iter().position(|e| e.is(subscriber)) else {
            return false;
        };
        let entry = &mut entries[index];
        let before = entry.bindings.len();
        entry
            .bindings
            .retain(|b| !(b.key == key && b.action == action && b.class == class));
        let removed = entry.bindings.len() != before;
        if entry.bindings.is_empty() {
            entries.remove(index);
        }
        removed
    }

    /// Forget all of `subscriber`'s bindings. Returns how many were removed.
    pub fn remove_subscriber<S: Subscriber + 'static>(&self, subscriber: &Rc<S>) -> usize {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(|e| e.is(subscriber)) {
            Some(index) => entries.remove(index).bindings.len(),
            None => 0,
        }
    }

    /// Set the listening gate.
    pub fn toggle_listening(&self, enabled: bool) {
        if self.listening.replace(enabled) != enabled {
            debug!("Input listening {}", if enabled { "enabled" } else { "disabled" });
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.get()
    }

    /// Dispatch this tick's pressed keys to their bindings.
    pub fn tick(&self, edges: &[KeyEdge]) -> TickReport {
        let mut report = TickReport::default();
        let pressed = pressed_keys(edges);
        if pressed.is_empty() {
            return report;
        }

        let pending: Vec<PendingDispatch> = {
            let entries = self.entries.borrow();
            let mut pending = Vec::new();
            for entry in entries.iter() {
                for binding in entry.bindings.iter().filter(|b| pressed.contains(&b.key)) {
                    pending.push(PendingDispatch {
                        subscriber: entry.subscriber.clone(),
                        label: entry.label.clone(),
                        action: binding.action.clone(),
                        class: binding.class,
                    });
                }
            }
            pending
        };

        for dispatch in pending {
            if dispatch.class.is_gated() && !self.listening.get() {
                report.suppressed += 1;
                continue;
            }
            let Some(subscriber) = dispatch.subscriber.upgrade() else {
                warn!(
                    "Subscriber '{}' is gone; skipping action '{}'",
                    dispatch.label, dispatch.action
                );
                report.skipped += 1;
                continue;
            };
            match subscriber.action_receiver() {
                Some(receiver) => {
                    receiver.on_action(&dispatch.action);
                    report.dispatched += 1;
                }
                None => {
                    warn!(
                        "Subscriber '{}' has no action receiver; skipping action '{}'",
                        dispatch.label, dispatch.action
                    );
                    report.skipped += 1;
                }
            }
        }
        self.prune_dropped();
        report
    }

    /// Forget subscribers whose `Rc` is gone. Returns how many were removed.
    pub fn prune_dropped(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|e| {
            let alive = e.subscriber.strong_count() > 0;
            if !alive {
                debug!("Forgetting dropped subscriber '{}'", e.label);
            }
            alive
        });
        before - entries.len()
    }

    /// Total bindings across all subscribers.
    pub fn binding_count(&self) -> usize {
        self.entries.borrow().iter().map(|e| e.bindings.len()).sum()
    }

    pub fn subscriber_count(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Copy of `subscriber`'s bindings in registration order.
    pub fn bindings_of<S: Subscriber + 'static>(&self, subscriber: &Rc<S>) -> Vec<Binding> {
        self.entries
            .borrow()
            .iter()
            .find(|e| e.is(subscriber))
            .map(|e| e.bindings.to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: String,
        seen: RefCell<Vec<String>>,
    }

    impl Recorder {
        fn new(name: &str) -> Rc<Self> {
            Rc::new(Recorder {
                name: name.to_string(),
                seen: RefCell::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.borrow().clone()
        }
    }

    impl Subscriber for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn action_receiver(&self) -> Option<&dyn ActionReceiver> {
            Some(self)
        }
    }

    impl ActionReceiver for Recorder {
        fn on_action(&self, action: &str) {
            self.seen
                .borrow_mut()
                .push(format!("{}:{}", self.name, action));
        }
    }

    struct Mute;

    impl Subscriber for Mute {
        fn name(&self) -> &str {
            "mute"
        }
    }

    fn press(key: Key) -> Vec<KeyEdge> {
        vec![KeyEdge::Pressed(key)]
    }

    #[test]
    fn dispatches_on_press_only() {
        let router = InputRouter::new();
        let r = Recorder::new("r");
        router.add_binding(&r, Key::Space, "jump", ActionClass::Gameplay);

        router.tick(&[KeyEdge::Released(Key::Space)]);
        assert!(r.seen().is_empty());

        let report = router.tick(&press(Key::Space));
        assert_eq!(report.dispatched, 1);
        assert_eq!(r.seen(), vec!["r:jump"]);
    }

    #[test]
    fn duplicate_binding_is_noop() {
        let router = InputRouter::new();
        let r = Recorder::new("r");
        assert!(router.add_binding(&r, Key::Space, "jump", ActionClass::Gameplay));
        assert!(!router.add_binding(&r, Key::Space, "jump", ActionClass::Gameplay));
        // Different class is a different binding.
        assert!(router.add_binding(&r, Key::Space, "jump", ActionClass::Ui));
        assert_eq!(router.binding_count(), 2);

        router.tick(&[KeyEdge::Pressed(Key::Space), KeyEdge::Pressed(Key::Space)]);
        assert_eq!(r.seen(), vec!["r:jump", "r:jump"]);
    }

    #[test]
    fn gate_suppresses_gameplay_and_ui_not_core() {
        let router = InputRouter::new();
        let r = Recorder::new("r");
        router.add_binding(&r, Key::Q, "move", ActionClass::Gameplay);
        router.add_binding(&r, Key::Q, "menu", ActionClass::Ui);
        router.add_binding(&r, Key::Q, "quit", ActionClass::Core);

        router.toggle_listening(false);
        let report = router.tick(&press(Key::Q));
        assert_eq!(r.seen(), vec!["r:quit"]);
        assert_eq!(report.suppressed, 2);

        router.toggle_listening(true);
        router.tick(&press(Key::Q));
        assert_eq!(r.seen(), vec!["r:quit", "r:move", "r:menu", "r:quit"]);
    }

    #[test]
    fn order_is_subscriber_then_binding() {
        let router = InputRouter::new();
        let first = Recorder::new("first");
        let second = Recorder::new("second");

        router.add_binding(&first, Key::A, "a1", ActionClass::Gameplay);
        router.add_binding(&second, Key::A, "a2", ActionClass::Gameplay);
        router.add_binding(&first, Key::B, "b1", ActionClass::Gameplay);

        router.tick(&[KeyEdge::Pressed(Key::B), KeyEdge::Pressed(Key::A)]);
        assert_eq!(first.seen(), vec!["first:a1", "first:b1"]);
        assert_eq!(second.seen(), vec!["second:a2"]);
    }

    #[test]
    fn remove_binding_drops_empty_subscriber() {
        let router = InputRouter::new();
        let r = Recorder::new("r");
        router.add_binding(&r, Key::A, "left", ActionClass::Gameplay);
        router.add_binding(&r, Key::D, "right", ActionClass::Gameplay);

        assert!(!router.remove_binding(&r, Key::A, "left", ActionClass::Core));
        assert!(router.remove_binding(&r, Key::A, "left", ActionClass::Gameplay));
        assert_eq!(router.subscriber_count(), 1);
        assert!(router.remove_binding(&r, Key::D, "right", ActionClass::Gameplay));
        assert_eq!(router.subscriber_count(), 0);

        router.tick(&press(Key::A));
        assert!(r.seen().is_empty());
    }

    #[test]
    fn subscriber_without_receiver_is_skipped() {
        let router = InputRouter::new();
        let mute = Rc::new(Mute);
        let r = Recorder::new("r");
        router.add_binding(&mute, Key::E, "use", ActionClass::Gameplay);
        router.add_binding(&r, Key::E, "use", ActionClass::Gameplay);

        let report = router.tick(&press(Key::E));
        assert_eq!(report.skipped, 1);
        assert_eq!(report.dispatched, 1);
        assert_eq!(r.seen(), vec!["r:use"]);
    }

    #[test]
    fn dropped_subscriber_is_skipped() {
        let router = InputRouter::new();
        let r = Recorder::new("r");
        router.add_binding(&r, Key::E, "use", ActionClass::Gameplay);
        drop(r);
        let report = router.tick(&press(Key::E));
        assert_eq!(report, TickReport { dispatched: 0, suppressed: 0, skipped: 1 });
        assert_eq!(router.subscriber_count(), 0);
    }

    #[test]
    fn dropped_subscribers_are_forgotten_after_one_tick() {
        let router = InputRouter::new();
        let keeper = Recorder::new("keeper");
        router.add_binding(&keeper, Key::E, "use", ActionClass::Gameplay);
        for i in 0..100 {
            let shortlived = Recorder::new(&format!("temp{i}"));
            router.add_binding(&shortlived, Key::E, "use", ActionClass::Gameplay);
        }
        assert_eq!(router.subscriber_count(), 101);

        let first = router.tick(&press(Key::E));
        assert_eq!(first.skipped, 100);
        assert_eq!(router.subscriber_count(), 1);

        let mut rest = TickReport::default();
        for _ in 0..9 {
            rest.absorb(router.tick(&press(Key::E)));
        }
        assert_eq!(rest.skipped, 0);
        assert_eq!(rest.dispatched, 9);
        assert_eq!(keeper.seen().len(), 10);
    }

    #[test]
    fn prune_without_tick() {
        let router = InputRouter::new();
        let r = Recorder::new("r");
        router.add_binding(&r, Key::E, "use", ActionClass::Gameplay);
        let held = Recorder::new("held");
        router.add_binding(&held, Key::E, "use", ActionClass::Gameplay);
        let gone = Recorder::new("gone");
        router.add_binding(&gone, Key::F, "use", ActionClass::Gameplay);
        drop(r);
        drop(gone);
        assert_eq!(router.prune_dropped(), 2);
        assert_eq!(router.subscriber_count(), 1);
    }

    #[test]
    fn receiver_can_close_gate_mid_tick() {
        struct Console {
            router: Weak<InputRouter>,
        }
        impl Subscriber for Console {
            fn name(&self) -> &str {
                "console"
            }
            fn action_receiver(&self) -> Option<&dyn ActionReceiver> {
                Some(self)
            }
        }
        impl ActionReceiver for Console {
            fn on_action(&self, _action: &str) {
                if let Some(router) = self.router.upgrade() {
                    router.toggle_listening(false);
                }
            }
        }

        let router = Rc::new(InputRouter::new());
        let console = Rc::new(Console {
            router: Rc::downgrade(&router),
        });
        let r = Recorder::new("r");
        router.add_binding(&console, Key::Backquote, "console", ActionClass::Core);
        router.add_binding(&r, Key::Space, "jump", ActionClass::Gameplay);

        let report = router.tick(&[KeyEdge::Pressed(Key::Backquote), KeyEdge::Pressed(Key::Space)]);
        assert!(!router.is_listening());
        assert_eq!(report.suppressed, 1);
        assert!(r.seen().is_empty());
    }

    #[test]
    fn remove_subscriber_and_bindings_of() {
        let router = InputRouter::new();
        let r = Recorder::new("r");
        router.add_binding(&r, Key::A, "left", ActionClass::Gameplay);
        router.add_binding(&r, Key::Escape, "back", ActionClass::Ui);
        assert_eq!(
            router.bindings_of(&r),
            vec![
                Binding { key: Key::A, action: "left".into(), class: ActionClass::Gameplay },
                Binding { key: Key::Escape, action: "back".into(), class: ActionClass::Ui },
            ]
        );
        assert_eq!(router.remove_subscriber(&r), 2);
        assert!(router.bindings_of(&r).is_empty());
    }

    #[test]
    fn class_parsing() {
        assert_eq!("core".parse::<ActionClass>(), Ok(ActionClass::Core));
        assert_eq!("UI".parse::<ActionClass>(), Ok(ActionClass::Ui));
        assert_eq!(ActionClass::parse_or_default(""), ActionClass::Gameplay);
        assert_eq!(ActionClass::parse_or_default("Core"), ActionClass::Core);
        assert_eq!(ActionClass::parse_or_default("weird"), ActionClass::Gameplay);
        assert!(!ActionClass::Core.is_gated());
        assert!(ActionClass::Ui.is_gated());
    }
}
