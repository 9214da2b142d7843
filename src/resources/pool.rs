//! Reusable instance pools keyed by resource kind.
//!
//! A [`PoolRegistry`] owns, for every registered kind, a FIFO queue of
//! deactivated instances. [`PoolRegistry::acquire`] hands one out (growing the
//! pool if the kind allows it) and [`PoolRegistry::release`] takes it back.
//!
//! Kinds are registered once through [`PoolRegistryBuilder`] and are immutable
//! afterwards. They can be addressed by [`KindId`], by registration index, or
//! by name (see [`KindRef`]).
//!
//! # Ownership
//!
//! Acquired instances are wrapped in [`Pooled`], which is move-only. An
//! instance is therefore either held by the caller or sitting in exactly one
//! queue; it can never be enqueued twice.
//!
//! # Example
//!
//! ```ignore
//! let mut pools = PoolRegistry::builder()
//!     .kind(PoolSettings::new("spark", Spark::default).with_capacity(8))
//!     .build();
//! let spark = pools.acquire("spark", Position::ORIGIN, Orientation::IDENTITY)?;
//! pools.recycle(spark)?;
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};

use log::{debug, error, warn};
use rustc_hash::FxHashMap;
use serde::Serialize;
use thiserror::Error;

use crate::components::placement::{Orientation, Position};
use crate::resources::gameconfig::CoreConfig;

/// Capability supplied by the embedding layer to wake up and put to sleep a
/// pooled instance. The pool never touches rendering or physics state itself.
pub trait Activatable {
    /// Place the instance and make it live.
    fn activate(&mut self, position: Position, orientation: Orientation);
    /// Make the instance inert (invisible, no collisions).
    fn deactivate(&mut self);
}

/// Identity of a registered kind. Equal to its registration index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct KindId(u32);

impl KindId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for KindId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Any of the ways gameplay code names a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindRef<'a> {
    Id(KindId),
    Index(usize),
    Name(&'a str),
}

impl From<KindId> for KindRef<'_> {
    fn from(id: KindId) -> Self {
        KindRef::Id(id)
    }
}

impl From<usize> for KindRef<'_> {
    fn from(index: usize) -> Self {
        KindRef::Index(index)
    }
}

impl<'a> From<&'a str> for KindRef<'a> {
    fn from(name: &'a str) -> Self {
        KindRef::Name(name)
    }
}

impl fmt::Display for KindRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KindRef::Id(id) => write!(f, "kind {id}"),
            KindRef::Index(i) => write!(f, "kind index {i}"),
            KindRef::Name(n) => write!(f, "kind '{n}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Fixed-capacity pool ran dry. Expected at runtime; the caller should
    /// skip whatever it wanted to spawn.
    #[error("pool '{kind}' is empty and cannot expand")]
    Exhausted { kind: String },
    #[error("no pool registered for {0}")]
    UnknownKind(String),
    /// Released into a kind other than the one it was acquired from. The
    /// instance went back to its own kind instead.
    #[error("instance of pool '{tagged}' released into pool '{requested}'")]
    KindMismatch { tagged: String, requested: String },
}

/// Per-kind registration data.
pub struct PoolSettings<T> {
    pub name: String,
    pub initial_capacity: usize,
    pub expandable: bool,
    factory: Box<dyn FnMut() -> T>,
}

impl<T> PoolSettings<T> {
    /// New settings with no pre-built instances and expansion allowed.
    pub fn new(name: impl Into<String>, factory: impl FnMut() -> T + 'static) -> Self {
        PoolSettings {
            name: name.into(),
            initial_capacity: 0,
            expandable: true,
            factory: Box::new(factory),
        }
    }

    pub fn with_capacity(mut self, initial_capacity: usize) -> Self {
        self.initial_capacity = initial_capacity;
        self
    }

    pub fn expandable(mut self, expandable: bool) -> Self {
        self.expandable = expandable;
        self
    }
}

impl<T> fmt::Debug for PoolSettings<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolSettings")
            .field("name", &self.name)
            .field("initial_capacity", &self.initial_capacity)
            .field("expandable", &self.expandable)
            .finish_non_exhaustive()
    }
}

/// A checked-out instance tagged with the kind it was acquired from.
#[derive(Debug)]
pub struct Pooled<T> {
    tag: KindId,
    instance: T,
}

impl<T> Pooled<T> {
    pub fn kind(&self) -> KindId {
        self.tag
    }
}

impl<T> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.instance
    }
}

/// Counters for one kind, as reported by [`PoolRegistry::stats`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub kind: String,
    pub available: usize,
    pub checked_out: usize,
    pub created: usize,
    pub expandable: bool,
}

struct PoolEntry<T> {
    settings: PoolSettings<T>,
    queue: VecDeque<T>,
    created: usize,
    checked_out: usize,
}

/// Collects kinds before the registry is frozen.
pub struct PoolRegistryBuilder<T> {
    kinds: Vec<PoolSettings<T>>,
}

impl<T: Activatable> PoolRegistryBuilder<T> {
    /// Register a kind. A name that is already registered is ignored.
    pub fn kind(mut self, settings: PoolSettings<T>) -> Self {
        if self.kinds.iter().any(|k| k.name == settings.name) {
            warn!(
                "Pool kind '{}' registered twice; keeping the first",
                settings.name
            );
            return self;
        }
        self.kinds.push(settings);
        self
    }

    /// Override capacity and expansion of named kinds from `[pool.<name>]`
    /// config sections. Kinds without a section keep their settings.
    pub fn tuned_by(mut self, config: &CoreConfig) -> Self {
        for settings in self.kinds.iter_mut() {
            let Some(tuning) = config.pool_tuning(&settings.name) else {
                continue;
            };
            if let Some(capacity) = tuning.initial_capacity {
                settings.initial_capacity = capacity;
            }
            if let Some(expandable) = tuning.expandable {
                settings.expandable = expandable;
            }
        }
        self
    }

    /// Pre-build every kind's initial instances and freeze the configuration.
    pub fn build(self) -> PoolRegistry<T> {
        let mut entries = Vec::with_capacity(self.kinds.len());
        let mut by_name = FxHashMap::default();
        for (index, mut settings) in self.kinds.into_iter().enumerate() {
            let mut queue = VecDeque::with_capacity(settings.initial_capacity);
            for _ in 0..settings.initial_capacity {
                let mut instance = (settings.factory)();
                instance.deactivate();
                queue.push_back(instance);
            }
            debug!(
                "Pool '{}' ready with {} instances (expandable: {})",
                settings.name, settings.initial_capacity, settings.expandable
            );
            by_name.insert(settings.name.clone(), KindId(index as u32));
            entries.push(PoolEntry {
                created: queue.len(),
                checked_out: 0,
                settings,
                queue,
            });
        }
        PoolRegistry { entries, by_name }
    }
}

/// Owns every kind's queue of reusable instances.
pub struct PoolRegistry<T> {
    entries: Vec<PoolEntry<T>>,
    by_name: FxHashMap<String, KindId>,
}

impl<T: Activatable> PoolRegistry<T> {
    pub fn builder() -> PoolRegistryBuilder<T> {
        PoolRegistryBuilder { kinds: Vec::new() }
    }

    /// Hand out an instance of `kind`, activated at the given placement.
    ///
    /// Reuses the oldest released instance first. When the queue is empty a
    /// new instance is built if the kind is expandable, otherwise
    /// [`PoolError::Exhausted`] is returned.
    pub fn acquire<'a>(
        &mut self,
        kind: impl Into<KindRef<'a>>,
        position: Position,
        orientation: Orientation,
    ) -> Result<Pooled<T>, PoolError> {
        let kind = kind.into();
        let Some(id) = self.resolve(kind) else {
            error!("Cannot acquire: no pool registered for {kind}");
            return Err(PoolError::UnknownKind(kind.to_string()));
        };
        let entry = &mut self.entries[id.index()];

        let mut instance = match entry.queue.pop_front() {
            Some(instance) => instance,
            None if entry.settings.expandable => {
                entry.created += 1;
                debug!(
                    "Pool '{}' expanded to {} instances",
                    entry.settings.name, entry.created
                );
                (entry.settings.factory)()
            }
            None => {
                warn!(
                    "Pool '{}' is empty and cannot expand",
                    entry.settings.name
                );
                return Err(PoolError::Exhausted {
                    kind: entry.settings.name.clone(),
                });
            }
        };

        instance.activate(position, orientation);
        entry.checked_out += 1;
        Ok(Pooled { tag: id, instance })
    }

    /// Return an instance to `kind`'s queue.
    ///
    /// If `kind` is not registered the instance is destroyed and
    /// [`PoolError::UnknownKind`] is returned. If it is registered but differs
    /// from the instance's tag, the instance is returned to the kind it was
    /// acquired from and [`PoolError::KindMismatch`] is reported, so a queue
    /// only ever holds instances built by its own factory.
    pub fn release<'a>(
        &mut self,
        kind: impl Into<KindRef<'a>>,
        pooled: Pooled<T>,
    ) -> Result<(), PoolError> {
        let kind = kind.into();
        let Pooled { tag, mut instance } = pooled;

        let Some(origin) = self.entries.get_mut(tag.index()) else {
            error!("Instance tagged {tag} does not belong to this registry; destroying it");
            drop(instance);
            return Err(PoolError::UnknownKind(tag.to_string()));
        };
        origin.checked_out = origin.checked_out.saturating_sub(1);

        let Some(id) = self.resolve(kind) else {
            error!("No pool registered for {kind}; destroying released instance");
            drop(instance);
            return Err(PoolError::UnknownKind(kind.to_string()));
        };

        instance.deactivate();
        self.entries[tag.index()].queue.push_back(instance);

        if id != tag {
            let tagged = self.entries[tag.index()].settings.name.clone();
            let requested = self.entries[id.index()].settings.name.clone();
            warn!("Instance of pool '{tagged}' released into pool '{requested}'; returned to '{tagged}'");
            return Err(PoolError::KindMismatch { tagged, requested });
        }
        Ok(())
    }

    /// Release an instance into the kind it is tagged with.
    pub fn recycle(&mut self, pooled: Pooled<T>) -> Result<(), PoolError> {
        let kind = pooled.kind();
        self.release(kind, pooled)
    }

    /// Destroy every pooled instance. Checked-out instances are unaffected.
    /// Returns how many instances were destroyed.
    pub fn shutdown(&mut self) -> usize {
        let mut destroyed = 0;
        for entry in self.entries.iter_mut() {
            destroyed += entry.queue.len();
            entry.queue.clear();
        }
        debug!("Pool registry shut down, {destroyed} instances destroyed");
        destroyed
    }
}

impl<T> PoolRegistry<T> {
    fn resolve(&self, kind: KindRef<'_>) -> Option<KindId> {
        match kind {
            KindRef::Id(id) => (id.index() < self.entries.len()).then_some(id),
            KindRef::Index(index) => self.kind_at(index),
            KindRef::Name(name) => self.kind_named(name),
        }
    }

    /// Number of registered kinds.
    pub fn kind_count(&self) -> usize {
        self.entries.len()
    }

    pub fn kind_at(&self, index: usize) -> Option<KindId> {
        (index < self.entries.len()).then_some(KindId(index as u32))
    }

    pub fn kind_named(&self, name: &str) -> Option<KindId> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, kind: KindId) -> Option<&str> {
        self.entries
            .get(kind.index())
            .map(|e| e.settings.name.as_str())
    }

    /// Instances waiting in `kind`'s queue.
    pub fn available<'a>(&self, kind: impl Into<KindRef<'a>>) -> Option<usize> {
        self.entry(kind.into()).map(|e| e.queue.len())
    }

    pub fn checked_out<'a>(&self, kind: impl Into<KindRef<'a>>) -> Option<usize> {
        self.entry(kind.into()).map(|e| e.checked_out)
    }

    /// Instances ever constructed for `kind`.
    pub fn created<'a>(&self, kind: impl Into<KindRef<'a>>) -> Option<usize> {
        self.entry(kind.into()).map(|e| e.created)
    }

    pub fn stats<'a>(&self, kind: impl Into<KindRef<'a>>) -> Option<PoolStats> {
        self.entry(kind.into()).map(|e| PoolStats {
            kind: e.settings.name.clone(),
            available: e.queue.len(),
            checked_out: e.checked_out,
            created: e.created,
            expandable: e.settings.expandable,
        })
    }

    pub fn all_stats(&self) -> Vec<PoolStats> {
        (0..self.entries.len())
            .filter_map(|index| self.stats(index))
            .collect()
    }

    fn entry(&self, kind: KindRef<'_>) -> Option<&PoolEntry<T>> {
        self.resolve(kind).map(|id| &self.entries[id.index()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    struct Dummy {
        serial: u32,
        active: bool,
        position: Position,
        activations: u32,
    }

    impl Activatable for Dummy {
        fn activate(&mut self, position: Position, _orientation: Orientation) {
            self.active = true;
            self.position = position;
            self.activations += 1;
        }

        fn deactivate(&mut self) {
            self.active = false;
        }
    }

    fn counting_factory(counter: Rc<Cell<u32>>) -> impl FnMut() -> Dummy {
        move || {
            counter.set(counter.get() + 1);
            Dummy {
                serial: counter.get(),
                ..Dummy::default()
            }
        }
    }

    fn registry(capacity: usize, expandable: bool) -> PoolRegistry<Dummy> {
        PoolRegistry::builder()
            .kind(
                PoolSettings::new("dummy", Dummy::default)
                    .with_capacity(capacity)
                    .expandable(expandable),
            )
            .build()
    }

    #[test]
    fn build_prefills_deactivated_instances() {
        let built = Rc::new(Cell::new(0));
        let pools = PoolRegistry::builder()
            .kind(PoolSettings::new("a", counting_factory(built.clone())).with_capacity(3))
            .build();
        assert_eq!(built.get(), 3);
        assert_eq!(pools.available("a"), Some(3));
        assert_eq!(pools.created("a"), Some(3));
        assert_eq!(pools.checked_out("a"), Some(0));
    }

    #[test]
    fn acquire_activates_and_tags() {
        let mut pools = registry(1, false);
        let p = Position::new(1.0, 2.0, 3.0);
        let d = pools.acquire("dummy", p, Orientation::IDENTITY).unwrap();
        assert!(d.active);
        assert_eq!(d.position, p);
        assert_eq!(d.kind(), pools.kind_named("dummy").unwrap());
        assert_eq!(pools.checked_out("dummy"), Some(1));
    }

    #[test]
    fn exhausted_when_fixed_and_empty() {
        let mut pools = registry(0, false);
        let err = pools
            .acquire("dummy", Position::ORIGIN, Orientation::IDENTITY)
            .unwrap_err();
        assert_eq!(
            err,
            PoolError::Exhausted {
                kind: "dummy".into()
            }
        );
    }

    #[test]
    fn expands_when_allowed() {
        let built = Rc::new(Cell::new(0));
        let mut pools = PoolRegistry::builder()
            .kind(PoolSettings::new("a", counting_factory(built.clone())))
            .build();
        let a = pools.acquire(0usize, Position::ORIGIN, Orientation::IDENTITY).unwrap();
        let b = pools.acquire(0usize, Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert_eq!(built.get(), 2);
        assert_ne!(a.serial, b.serial);
        assert_eq!(pools.created(0usize), Some(2));
    }

    #[test]
    fn release_is_fifo() {
        let built = Rc::new(Cell::new(0));
        let mut pools = PoolRegistry::builder()
            .kind(PoolSettings::new("a", counting_factory(built)).with_capacity(2))
            .build();
        let first = pools.acquire("a", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        let second = pools.acquire("a", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        let (s1, s2) = (first.serial, second.serial);
        pools.recycle(second).unwrap();
        pools.recycle(first).unwrap();

        let next = pools.acquire("a", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert_eq!(next.serial, s2);
        let after = pools.acquire("a", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert_eq!(after.serial, s1);
    }

    #[test]
    fn release_deactivates() {
        let mut pools = registry(1, false);
        let d = pools.acquire("dummy", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        pools.recycle(d).unwrap();
        let d = pools.acquire("dummy", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert_eq!(d.activations, 2);
    }

    #[test]
    fn unknown_kind_on_acquire() {
        let mut pools = registry(1, true);
        let err = pools
            .acquire("missing", Position::ORIGIN, Orientation::IDENTITY)
            .unwrap_err();
        assert!(matches!(err, PoolError::UnknownKind(_)));
        assert!(pools.acquire(7usize, Position::ORIGIN, Orientation::IDENTITY).is_err());
    }

    #[test]
    fn unknown_kind_on_release_destroys() {
        let mut pools = registry(1, false);
        let d = pools.acquire("dummy", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        let err = pools.release("ghost", d).unwrap_err();
        assert_eq!(err, PoolError::UnknownKind("kind 'ghost'".into()));
        assert_eq!(pools.available("dummy"), Some(0));
        assert_eq!(pools.checked_out("dummy"), Some(0));
        // The destroyed instance is gone for good.
        assert!(pools.acquire("dummy", Position::ORIGIN, Orientation::IDENTITY).is_err());
    }

    #[test]
    fn release_into_other_kind_returns_to_origin() {
        let mut pools: PoolRegistry<Dummy> = PoolRegistry::builder()
            .kind(PoolSettings::new("a", Dummy::default).with_capacity(1).expandable(false))
            .kind(PoolSettings::new("b", Dummy::default).with_capacity(1).expandable(false))
            .build();
        let d = pools.acquire("a", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        let err = pools.release("b", d).unwrap_err();
        assert_eq!(
            err,
            PoolError::KindMismatch {
                tagged: "a".into(),
                requested: "b".into(),
            }
        );
        assert_eq!(pools.available("a"), Some(1));
        assert_eq!(pools.available("b"), Some(1));
        assert_eq!(pools.checked_out("a"), Some(0));
    }

    #[test]
    fn mismatched_release_never_exceeds_fixed_capacity() {
        let mut pools: PoolRegistry<Dummy> = PoolRegistry::builder()
            .kind(PoolSettings::new("grunt", Dummy::default).with_capacity(1).expandable(false))
            .kind(PoolSettings::new("brute", Dummy::default).with_capacity(1).expandable(false))
            .build();
        let grunt = pools.acquire("grunt", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert!(pools.release("brute", grunt).is_err());

        let brute = pools.acquire("brute", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert_eq!(brute.kind(), pools.kind_named("brute").unwrap());
        assert!(matches!(
            pools.acquire("brute", Position::ORIGIN, Orientation::IDENTITY),
            Err(PoolError::Exhausted { .. })
        ));
        assert_eq!(pools.checked_out("brute"), Some(1));

        let grunt = pools.acquire("grunt", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert_eq!(grunt.kind(), pools.kind_named("grunt").unwrap());
    }

    #[test]
    fn foreign_instance_is_destroyed() {
        let mut big: PoolRegistry<Dummy> = PoolRegistry::builder()
            .kind(PoolSettings::new("a", Dummy::default))
            .kind(PoolSettings::new("b", Dummy::default))
            .build();
        let mut small = registry(0, true);
        let stray = big.acquire("b", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert!(matches!(
            small.release("dummy", stray),
            Err(PoolError::UnknownKind(_))
        ));
        assert_eq!(small.available("dummy"), Some(0));
    }

    #[test]
    fn duplicate_kind_names_keep_first() {
        let pools: PoolRegistry<Dummy> = PoolRegistry::builder()
            .kind(PoolSettings::new("a", Dummy::default).with_capacity(2))
            .kind(PoolSettings::new("a", Dummy::default).with_capacity(5))
            .build();
        assert_eq!(pools.kind_count(), 1);
        assert_eq!(pools.available("a"), Some(2));
    }

    #[test]
    fn lookup_by_index_and_name_agree() {
        let pools: PoolRegistry<Dummy> = PoolRegistry::builder()
            .kind(PoolSettings::new("grunt", Dummy::default))
            .kind(PoolSettings::new("brute", Dummy::default))
            .build();
        assert_eq!(pools.kind_at(1), pools.kind_named("brute"));
        assert_eq!(pools.kind_at(2), None);
        assert_eq!(pools.name_of(pools.kind_at(0).unwrap()), Some("grunt"));
    }

    #[test]
    fn shutdown_destroys_pooled_only() {
        let mut pools = registry(3, false);
        let held = pools.acquire("dummy", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        assert_eq!(pools.shutdown(), 2);
        assert_eq!(pools.available("dummy"), Some(0));
        assert!(held.active);
    }

    #[test]
    fn stats_report_counters() {
        let mut pools = registry(2, true);
        let _a = pools.acquire("dummy", Position::ORIGIN, Orientation::IDENTITY).unwrap();
        let stats = pools.stats("dummy").unwrap();
        assert_eq!(
            stats,
            PoolStats {
                kind: "dummy".into(),
                available: 1,
                checked_out: 1,
                created: 2,
                expandable: true,
            }
        );
        assert_eq!(pools.all_stats(), vec![stats]);
    }
}
