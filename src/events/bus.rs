//! Type-indexed publish/subscribe bus.
//!
//! [`EventBus`] keeps, for every declared [`Event`] type, an ordered chain of
//! handlers. [`EventBus::publish`] calls them synchronously on the calling
//! thread in subscription order.
//!
//! # Re-entrancy
//!
//! All methods take `&self`. `publish` copies the chain before calling any
//! handler, so a handler may subscribe, unsubscribe or publish (even the same
//! event type) while it runs. Such changes apply to the next publish only.
//!
//! # Failures
//!
//! Handlers registered with [`EventBus::try_subscribe`] return a
//! [`HandlerResult`]. A failing handler does not stop delivery to the rest of
//! the chain; all failures are handed back to the caller of `publish` in a
//! [`PublishError`]. Panics are not caught.
//!
//! # Example
//!
//! ```ignore
//! let bus = EventBus::new();
//! let id = bus.subscribe(|e: &EnemyDeath| log::info!("enemy {} died", e.serial));
//! bus.publish(&EnemyDeath { serial: 7, kind: "grunt".into(), position: Position::ORIGIN })?;
//! bus.unsubscribe::<EnemyDeath>(id);
//! ```

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use log::trace;
use rustc_hash::FxHashMap;
use thiserror::Error;

/// Marker for payload types that travel over the bus.
pub trait Event: Any {
    /// Human-readable name used in logs and errors.
    fn event_name() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

/// Handle returned by `subscribe`, used to unsubscribe that exact handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Failure reported by a single handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        HandlerError(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError(message.to_string())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PublishError {
    #[error("{} of {delivered} handlers for {event} failed", .failures.len())]
    HandlerFailed {
        event: &'static str,
        /// Handlers invoked, including the failing ones.
        delivered: usize,
        failures: Vec<(ListenerId, HandlerError)>,
    },
}

type ErasedHandler = dyn Fn(&dyn Any) -> HandlerResult;

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    handler: Rc<ErasedHandler>,
}

/// Synchronous multicast registry keyed by event type.
pub struct EventBus {
    chains: RefCell<FxHashMap<TypeId, Vec<Listener>>>,
    next_id: Cell<u64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("event_types", &self.event_type_count())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            chains: RefCell::new(FxHashMap::default()),
            next_id: Cell::new(0),
        }
    }

    /// Append an infallible handler to `E`'s chain.
    pub fn subscribe<E: Event>(&self, handler: impl Fn(&E) + 'static) -> ListenerId {
        self.try_subscribe(move |event: &E| {
            handler(event);
            Ok(())
        })
    }

    /// Append a fallible handler to `E`'s chain.
    pub fn try_subscribe<E: Event>(
        &self,
        handler: impl Fn(&E) -> HandlerResult + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let erased = move |event: &dyn Any| match event.downcast_ref::<E>() {
            Some(event) => handler(event),
            None => Ok(()),
        };
        self.chains
            .borrow_mut()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Listener {
                id,
                handler: Rc::new(erased),
            });
        trace!("{id} subscribed to {}", E::event_name());
        id
    }

    /// Remove exactly the handler identified by `id` from `E`'s chain.
    ///
    /// Returns `false` without side effects if it is not subscribed there.
    /// A chain left empty is removed.
    pub fn unsubscribe<E: Event>(&self, id: ListenerId) -> bool {
        let mut chains = self.chains.borrow_mut();
        let type_id = TypeId::of::<E>();
        let Some(chain) = chains.get_mut(&type_id) else {
            return false;
        };
        let Some(position) = chain.iter().position(|l| l.id == id) else {
            return false;
        };
        chain.remove(position);
        if chain.is_empty() {
            chains.remove(&type_id);
        }
        trace!("{id} unsubscribed from {}", E::event_name());
        true
    }

    /// Deliver `event` to every handler currently subscribed to its type.
    ///
    /// Returns the number of handlers invoked.
    pub fn publish<E: Event>(&self, event: &E) -> Result<usize, PublishError> {
        let snapshot: Vec<Listener> = match self.chains.borrow().get(&TypeId::of::<E>()) {
            Some(chain) => chain.clone(),
            None => return Ok(0),
        };

        let mut failures = Vec::new();
        for listener in snapshot.iter() {
            if let Err(e) = (listener.handler)(event as &dyn Any) {
                failures.push((listener.id, e));
            }
        }

        if failures.is_empty() {
            Ok(snapshot.len())
        } else {
            Err(PublishError::HandlerFailed {
                event: E::event_name(),
                delivered: snapshot.len(),
                failures,
            })
        }
    }

    pub fn listener_count<E: Event>(&self) -> usize {
        self.chains
            .borrow()
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }

    pub fn has_listeners<E: Event>(&self) -> bool {
        self.listener_count::<E>() > 0
    }

    /// Number of event types with at least one handler.
    pub fn event_type_count(&self) -> usize {
        self.chains.borrow().len()
    }
}
