//! Headless demo arena.
//!
//! Wires the core services together the way a gameplay layer would:
//!
//! - a [`Player`] owns key bindings and turns actions into events,
//! - a [`Spawner`] owns the enemy pools and reacts to [`SpawnEnemy`],
//! - a [`SlamSkill`] damages every enemy around the caster on
//!   [`SkillActivated`], gated by a [`Cooldown`],
//! - [`Explosions`] pops a short-lived pooled effect on every [`EnemyDeath`],
//! - a [`SpawnCommand`] lets the console publish [`SpawnEnemy`],
//! - a [`Hud`] only listens and keeps counters.
//!
//! None of them hold a strong reference to another; everything goes through
//! the [`EventBus`] or through `Weak` handles. Every object keeps the
//! [`ListenerId`]s it subscribed with and [`Arena::shutdown`] removes them.
//!
//! [`build_world`], [`build_schedule`] and [`run`] form the host loop used by
//! the binary and the integration tests.
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bevy_ecs::prelude::*;
use log::{debug, error, info, trace, warn};
use serde::Serialize;

use crate::components::cooldown::Cooldown;
use crate::components::placement::{Orientation, Position};
use crate::components::ttl::Ttl;
use crate::events::bus::{Event, EventBus, ListenerId};
use crate::events::gameplay::{
    DebugMessage, EnemyDeath, EnemySpawned, KeyPress, PlayerRegistered, SkillActivated,
    SpawnEnemy,
};
use crate::resources::bindings::{ActionClass, ActionReceiver, Subscriber};
use crate::resources::console::{Console, ConsoleCommand};
use crate::resources::context::{CoreContext, InputStats};
use crate::resources::cooldowns::Cooldowns;
use crate::resources::gameconfig::CoreConfig;
use crate::resources::input::{FrameKeys, Key, KeyScript};
use crate::resources::pool::{Activatable, PoolRegistry, PoolSettings, PoolStats, Pooled};
use crate::resources::worldtime::WorldTime;
use crate::systems::console::feed_console_lines;
use crate::systems::cooldown::advance_cooldowns;
use crate::systems::input::route_input;
use crate::systems::script::feed_scripted_keys;
use crate::systems::time::update_world_time;

/// Enemies spawn on a disc of this radius around the origin.
const ARENA_RADIUS: f32 = 10.0;
pub const SLAM_SKILL: &str = "slam";
pub const SLAM_COOLDOWN_SECS: f32 = 0.5;
pub const SLAM_DAMAGE: u32 = 40;
/// Covers the whole spawn disc when cast from the origin.
pub const SLAM_RADIUS: f32 = 12.0;
pub const EXPLOSION_KIND: &str = "explosion";
pub const EXPLOSION_LIFETIME_SECS: f32 = 0.5;
const EXPLOSION_CAPACITY: usize = 2;
/// Explosions pop this far above the spot where the enemy fell.
const EXPLOSION_HEIGHT: f32 = 1.0;
pub const SPAWN_COMMAND: &str = "spawn";

struct EnemyKind {
    name: &'static str,
    health: u32,
    capacity: usize,
    expandable: bool,
}

const ENEMY_KINDS: &[EnemyKind] = &[
    EnemyKind {
        name: "grunt",
        health: 30,
        capacity: 2,
        expandable: true,
    },
    EnemyKind {
        name: "brute",
        health: 120,
        capacity: 1,
        expandable: false,
    },
];

const PLAYER_BINDINGS: &[(Key, &str, ActionClass)] = &[
    (Key::Q, "quit", ActionClass::Core),
    (Key::Backquote, "console", ActionClass::Core),
    (Key::Digit1, "spawn_grunt", ActionClass::Gameplay),
    (Key::Digit2, "spawn_brute", ActionClass::Gameplay),
    (Key::Space, "slam", ActionClass::Gameplay),
];

/// Publish and log handler failures; gameplay code has nobody to return them to.
fn announce<E: Event>(bus: &Weak<EventBus>, event: &E) {
    let Some(bus) = bus.upgrade() else {
        return;
    };
    if let Err(e) = bus.publish(event) {
        warn!("{e}");
    }
}

// ---------------------------------------------------------------------------
// Enemies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    /// Unique per constructed instance, kept across reuse.
    pub serial: u32,
    pub kind: String,
    pub max_health: u32,
    pub health: u32,
    pub active: bool,
    pub position: Position,
    pub orientation: Orientation,
}

impl Enemy {
    /// Lower health by `amount`, never below zero. Returns `true` if this
    /// hit brought it to zero.
    pub fn take_damage(&mut self, amount: u32) -> bool {
        let was_alive = self.health > 0;
        self.health = self.health.saturating_sub(amount);
        was_alive && self.health == 0
    }

    pub fn is_dead(&self) -> bool {
        self.health == 0
    }
}

impl Activatable for Enemy {
    fn activate(&mut self, position: Position, orientation: Orientation) {
        self.active = true;
        self.health = self.max_health;
        self.position = position;
        self.orientation = orientation;
    }

    fn deactivate(&mut self) {
        self.active = false;
    }
}

fn enemy_factory(kind: &'static EnemyKind, serials: Rc<Cell<u32>>) -> impl FnMut() -> Enemy {
    move || {
        serials.set(serials.get() + 1);
        Enemy {
            serial: serials.get(),
            kind: kind.name.to_string(),
            max_health: kind.health,
            health: kind.health,
            active: false,
            position: Position::ORIGIN,
            orientation: Orientation::IDENTITY,
        }
    }
}

/// Outcome of [`Spawner::damage_within`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Strike {
    pub hit: usize,
    pub killed: usize,
}

/// Owns the enemy pools and every enemy currently in the arena.
pub struct Spawner {
    pools: RefCell<PoolRegistry<Enemy>>,
    live: RefCell<Vec<Pooled<Enemy>>>,
    rng: RefCell<fastrand::Rng>,
    bus: Weak<EventBus>,
    listener: ListenerId,
}

impl Spawner {
    /// Build the pools (tuned by `[pool.<kind>]` sections) and start
    /// listening to [`SpawnEnemy`].
    pub fn new(bus: &Rc<EventBus>, config: &CoreConfig, seed: u64) -> Rc<Spawner> {
        let serials = Rc::new(Cell::new(0));
        let mut builder = PoolRegistry::builder();
        for kind in ENEMY_KINDS {
            builder = builder.kind(
                PoolSettings::new(kind.name, enemy_factory(kind, serials.clone()))
                    .with_capacity(kind.capacity)
                    .expandable(kind.expandable),
            );
        }

        Rc::new_cyclic(|weak: &Weak<Spawner>| {
            let weak = weak.clone();
            let listener = bus.subscribe(move |e: &SpawnEnemy| {
                if let Some(spawner) = weak.upgrade() {
                    spawner.spawn(&e.kind, e.count);
                }
            });
            Spawner {
                pools: RefCell::new(builder.tuned_by(config).build()),
                live: RefCell::new(Vec::new()),
                rng: RefCell::new(fastrand::Rng::with_seed(seed)),
                bus: Rc::downgrade(bus),
                listener,
            }
        })
    }

    fn random_placement(&self) -> (Position, Orientation) {
        let mut rng = self.rng.borrow_mut();
        let angle = rng.f32() * std::f32::consts::TAU;
        let radius = ARENA_RADIUS * rng.f32().sqrt();
        let position = Position::on_ground(radius * angle.cos(), radius * angle.sin());
        let orientation = Orientation::from_yaw_degrees(rng.f32() * 360.0);
        (position, orientation)
    }

    /// Bring up to `count` enemies of `kind` into the arena. Stops at the
    /// first failure and reports it as a [`DebugMessage`]. Returns how many
    /// were spawned.
    pub fn spawn(&self, kind: &str, count: u32) -> u32 {
        let mut spawned = 0;
        for _ in 0..count {
            let (position, orientation) = self.random_placement();
            let acquired = self
                .pools
                .borrow_mut()
                .acquire(kind, position, orientation);
            match acquired {
                Ok(enemy) => {
                    let event = EnemySpawned {
                        serial: enemy.serial,
                        kind: enemy.kind.clone(),
                    };
                    debug!(
                        "Spawned {} #{} at ({:.1}, {:.1})",
                        enemy.kind, enemy.serial, enemy.position.x, enemy.position.z
                    );
                    self.live.borrow_mut().push(enemy);
                    spawned += 1;
                    announce(&self.bus, &event);
                }
                Err(e) => {
                    announce(
                        &self.bus,
                        &DebugMessage {
                            message: format!("cannot spawn {kind}: {e}"),
                        },
                    );
                    break;
                }
            }
        }
        spawned
    }

    /// Deal `amount` damage to every live enemy within `radius` of `origin`.
    ///
    /// Enemies brought to zero health go back to their pool and an
    /// [`EnemyDeath`] is published for each, after the sweep.
    pub fn damage_within(&self, origin: Position, radius: f32, amount: u32) -> Strike {
        let mut strike = Strike::default();
        let mut deaths = Vec::new();
        {
            let mut live = self.live.borrow_mut();
            let mut pools = self.pools.borrow_mut();
            for mut enemy in std::mem::take(&mut *live) {
                if enemy.position.distance(&origin) > radius {
                    live.push(enemy);
                    continue;
                }
                strike.hit += 1;
                if !enemy.take_damage(amount) {
                    trace!("{} #{} down to {} hp", enemy.kind, enemy.serial, enemy.health);
                    live.push(enemy);
                    continue;
                }
                let death = EnemyDeath {
                    serial: enemy.serial,
                    kind: enemy.kind.clone(),
                    position: enemy.position,
                };
                match pools.recycle(enemy) {
                    Ok(()) => deaths.push(death),
                    Err(e) => error!("Failed to recycle {} #{}: {e}", death.kind, death.serial),
                }
            }
        }
        strike.killed = deaths.len();
        for death in deaths.iter() {
            announce(&self.bus, death);
        }
        strike
    }

    /// Return every live enemy to its pool without killing it. Returns how
    /// many were removed.
    pub fn clear(&self) -> usize {
        let removed: Vec<Pooled<Enemy>> = std::mem::take(&mut *self.live.borrow_mut());
        let count = removed.len();
        let mut pools = self.pools.borrow_mut();
        for enemy in removed {
            let (kind, serial) = (enemy.kind.clone(), enemy.serial);
            if let Err(e) = pools.recycle(enemy) {
                error!("Failed to recycle {kind} #{serial}: {e}");
            }
        }
        count
    }

    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn live_serials(&self) -> Vec<u32> {
        self.live.borrow().iter().map(|e| e.serial).collect()
    }

    pub fn pool_stats(&self) -> Vec<PoolStats> {
        self.pools.borrow().all_stats()
    }

    /// Stop listening to [`SpawnEnemy`].
    pub fn detach(&self, bus: &EventBus) -> bool {
        bus.unsubscribe::<SpawnEnemy>(self.listener)
    }

    /// Recycle the live enemies and destroy all pooled instances.
    pub fn shutdown(&self) -> usize {
        self.clear();
        self.pools.borrow_mut().shutdown()
    }
}

// ---------------------------------------------------------------------------
// Explosions
// ---------------------------------------------------------------------------

/// Short-lived effect left where an enemy died.
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub serial: u32,
    pub active: bool,
    pub position: Position,
    pub ttl: Ttl,
}

impl Activatable for Explosion {
    fn activate(&mut self, position: Position, _orientation: Orientation) {
        self.active = true;
        self.position = position;
        self.ttl = Ttl::new(EXPLOSION_LIFETIME_SECS);
    }

    fn deactivate(&mut self) {
        self.active = false;
    }
}

/// Pooled explosions, popped on [`EnemyDeath`] and recycled when their
/// [`Ttl`] runs out.
pub struct Explosions {
    pools: RefCell<PoolRegistry<Explosion>>,
    live: RefCell<Vec<Pooled<Explosion>>>,
    listener: ListenerId,
}

impl Explosions {
    pub fn new(bus: &Rc<EventBus>, config: &CoreConfig) -> Rc<Explosions> {
        let mut serials = 0;
        let factory = move || {
            serials += 1;
            Explosion {
                serial: serials,
                active: false,
                position: Position::ORIGIN,
                ttl: Ttl::new(0.0),
            }
        };
        let pools = PoolRegistry::builder()
            .kind(
                PoolSettings::new(EXPLOSION_KIND, factory)
                    .with_capacity(EXPLOSION_CAPACITY)
                    .expandable(true),
            )
            .tuned_by(config)
            .build();

        Rc::new_cyclic(|weak: &Weak<Explosions>| {
            let weak = weak.clone();
            let listener = bus.subscribe(move |e: &EnemyDeath| {
                if let Some(explosions) = weak.upgrade() {
                    explosions.explode(e.position.raised(EXPLOSION_HEIGHT));
                }
            });
            Explosions {
                pools: RefCell::new(pools),
                live: RefCell::new(Vec::new()),
                listener,
            }
        })
    }

    /// Pop an explosion at `at`. Returns `false` if the pool had none to give.
    pub fn explode(&self, at: Position) -> bool {
        let acquired = self
            .pools
            .borrow_mut()
            .acquire(EXPLOSION_KIND, at, Orientation::IDENTITY);
        match acquired {
            Ok(explosion) => {
                trace!(
                    "Explosion #{} at ({:.1}, {:.1}, {:.1})",
                    explosion.serial, at.x, at.y, at.z
                );
                self.live.borrow_mut().push(explosion);
                true
            }
            Err(e) => {
                warn!("No explosion: {e}");
                false
            }
        }
    }

    /// Count every live explosion down by `dt` and recycle the expired ones.
    /// Returns how many expired.
    pub fn advance(&self, dt: f32) -> usize {
        let mut live = self.live.borrow_mut();
        if live.is_empty() {
            return 0;
        }
        let mut pools = self.pools.borrow_mut();
        let mut expired = 0;
        for mut explosion in std::mem::take(&mut *live) {
            if !explosion.ttl.tick(dt) {
                live.push(explosion);
                continue;
            }
            match pools.recycle(explosion) {
                Ok(()) => expired += 1,
                Err(e) => error!("Failed to recycle explosion: {e}"),
            }
        }
        expired
    }

    pub fn live_count(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn live_positions(&self) -> Vec<Position> {
        self.live.borrow().iter().map(|e| e.position).collect()
    }

    pub fn pool_stats(&self) -> Vec<PoolStats> {
        self.pools.borrow().all_stats()
    }

    /// Stop listening to [`EnemyDeath`].
    pub fn detach(&self, bus: &EventBus) -> bool {
        bus.unsubscribe::<EnemyDeath>(self.listener)
    }

    /// Recycle the live explosions and destroy all pooled instances.
    pub fn shutdown(&self) -> usize {
        self.advance(f32::INFINITY);
        self.pools.borrow_mut().shutdown()
    }
}

/// Recycle explosions whose lifetime ran out this frame.
pub fn expire_explosions(time: Res<WorldTime>, arena: NonSend<Arena>) {
    let expired = arena.explosions.advance(time.delta);
    if expired > 0 {
        trace!("frame {}: {expired} explosions expired", time.frame_count);
    }
}

// ---------------------------------------------------------------------------
// Skills
// ---------------------------------------------------------------------------

/// Damages every enemy around the caster, at most once per cooldown.
pub struct SlamSkill {
    cooldown: Rc<Cell<Cooldown>>,
    spawner: Weak<Spawner>,
    bus: Weak<EventBus>,
    uses: Cell<u32>,
    listener: ListenerId,
}

impl SlamSkill {
    pub fn new(bus: &Rc<EventBus>, spawner: &Rc<Spawner>, cooldowns: &mut Cooldowns) -> Rc<Self> {
        let cooldown = Rc::new(Cell::new(Cooldown::new(SLAM_COOLDOWN_SECS)));
        cooldowns.track(&cooldown);

        Rc::new_cyclic(|weak: &Weak<SlamSkill>| {
            let weak = weak.clone();
            let listener = bus.subscribe(move |e: &SkillActivated| {
                if e.skill != SLAM_SKILL {
                    return;
                }
                if let Some(skill) = weak.upgrade() {
                    skill.activate(e.origin);
                }
            });
            SlamSkill {
                cooldown,
                spawner: Rc::downgrade(spawner),
                bus: Rc::downgrade(bus),
                uses: Cell::new(0),
                listener,
            }
        })
    }

    fn activate(&self, origin: Position) {
        let mut cooldown = self.cooldown.get();
        if !cooldown.try_trigger() {
            announce(
                &self.bus,
                &DebugMessage {
                    message: format!("{SLAM_SKILL} on cooldown ({:.2}s left)", cooldown.remaining),
                },
            );
            return;
        }
        self.cooldown.set(cooldown);
        self.uses.set(self.uses.get() + 1);
        if let Some(spawner) = self.spawner.upgrade() {
            let strike = spawner.damage_within(origin, SLAM_RADIUS, SLAM_DAMAGE);
            info!("Slam! {} hit, {} down", strike.hit, strike.killed);
        }
    }

    pub fn cooldown(&self) -> Cooldown {
        self.cooldown.get()
    }

    pub fn uses(&self) -> u32 {
        self.uses.get()
    }

    /// Stop listening to [`SkillActivated`].
    pub fn detach(&self, bus: &EventBus) -> bool {
        bus.unsubscribe::<SkillActivated>(self.listener)
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// Binding owner. Translates actions into gameplay events.
pub struct Player {
    name: String,
    bus: Weak<EventBus>,
    console: Weak<Console>,
    position: Cell<Position>,
    quit: Cell<bool>,
}

impl Player {
    /// Create the player at the origin, bind its keys and announce it.
    pub fn register(name: &str, ctx: &CoreContext) -> Rc<Self> {
        let player = Rc::new(Player {
            name: name.to_string(),
            bus: Rc::downgrade(&ctx.bus),
            console: Rc::downgrade(&ctx.console),
            position: Cell::new(Position::ORIGIN),
            quit: Cell::new(false),
        });
        for (key, action, class) in PLAYER_BINDINGS {
            ctx.input.add_binding(&player, *key, *action, *class);
        }
        announce(
            &player.bus,
            &PlayerRegistered {
                name: player.name.clone(),
            },
        );
        player
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.get()
    }

    pub fn position(&self) -> Position {
        self.position.get()
    }

    pub fn set_position(&self, position: Position) {
        self.position.set(position);
    }

    fn toggle_console(&self) {
        let Some(console) = self.console.upgrade() else {
            return;
        };
        let message = if console.is_open() {
            console.close();
            "console closed"
        } else {
            console.open();
            "console opened, gameplay input paused"
        };
        announce(
            &self.bus,
            &DebugMessage {
                message: message.to_string(),
            },
        );
    }
}

impl Subscriber for Player {
    fn name(&self) -> &str {
        &self.name
    }

    fn action_receiver(&self) -> Option<&dyn ActionReceiver> {
        Some(self)
    }
}

impl ActionReceiver for Player {
    fn on_action(&self, action: &str) {
        match action {
            "quit" => {
                info!("{} asked to quit", self.name);
                self.quit.set(true);
            }
            "console" => self.toggle_console(),
            "spawn_grunt" => announce(
                &self.bus,
                &SpawnEnemy {
                    kind: "grunt".to_string(),
                    count: 1,
                },
            ),
            "spawn_brute" => announce(
                &self.bus,
                &SpawnEnemy {
                    kind: "brute".to_string(),
                    count: 1,
                },
            ),
            "slam" => announce(
                &self.bus,
                &SkillActivated {
                    skill: SLAM_SKILL.to_string(),
                    origin: self.position(),
                },
            ),
            other => warn!("{} has no handler for action '{other}'", self.name),
        }
    }
}

// ---------------------------------------------------------------------------
// Console commands
// ---------------------------------------------------------------------------

/// `spawn <name> [<count>]`: publishes [`SpawnEnemy`] and reports how many
/// enemies actually arrived.
pub struct SpawnCommand {
    bus: Weak<EventBus>,
}

impl SpawnCommand {
    pub fn new(bus: &Rc<EventBus>) -> Self {
        SpawnCommand {
            bus: Rc::downgrade(bus),
        }
    }
}

impl ConsoleCommand for SpawnCommand {
    fn name(&self) -> &str {
        SPAWN_COMMAND
    }

    fn description(&self) -> String {
        format!("Spawns enemies. Usage: {}", self.usage())
    }

    fn usage(&self) -> String {
        format!("{SPAWN_COMMAND} <name> [<count>]")
    }

    fn execute(&self, args: &[String], console: &Console) {
        let Some(kind) = args.first() else {
            console.print(format!(
                "Error: Missing required parameter. Usage: {}.",
                self.usage()
            ));
            return;
        };
        let count = match args.get(1) {
            None => 1,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    console.print(format!(
                        "Error: Invalid number of enemies '{raw}'. Please specify a positive integer."
                    ));
                    return;
                }
            },
        };
        let Some(bus) = self.bus.upgrade() else {
            console.print("Error: Event bus is gone.");
            return;
        };

        let arrived = Rc::new(Cell::new(0u32));
        let counter = {
            let arrived = arrived.clone();
            let kind = kind.clone();
            bus.subscribe(move |e: &EnemySpawned| {
                if e.kind == kind {
                    arrived.set(arrived.get() + 1);
                }
            })
        };
        let published = bus.publish(&SpawnEnemy {
            kind: kind.clone(),
            count,
        });
        bus.unsubscribe::<EnemySpawned>(counter);
        if let Err(e) = published {
            warn!("{e}");
        }

        let report = match arrived.get() {
            0 => format!("Error: Failed to spawn enemies of type '{kind}'."),
            n if n == count => format!("Spawned {count} enemies of type '{kind}'."),
            n => format!("Spawned {n} of {count} enemies of type '{kind}'."),
        };
        console.print(report);
    }
}

// ---------------------------------------------------------------------------
// HUD
// ---------------------------------------------------------------------------

struct HudListeners {
    player: ListenerId,
    spawned: ListenerId,
    death: ListenerId,
    key: ListenerId,
    debug: ListenerId,
}

/// Passive observer of gameplay events.
pub struct Hud {
    pub player: RefCell<Option<String>>,
    pub spawns: Cell<u32>,
    pub kills: Cell<u32>,
    pub key_presses: Cell<u32>,
    pub debug_messages: Cell<u32>,
    pub last_message: RefCell<Option<String>>,
    listeners: HudListeners,
}

impl Hud {
    pub fn attach(bus: &EventBus) -> Rc<Self> {
        Rc::new_cyclic(|weak: &Weak<Hud>| {
            let hud = weak.clone();
            let player = bus.subscribe(move |e: &PlayerRegistered| {
                if let Some(hud) = hud.upgrade() {
                    *hud.player.borrow_mut() = Some(e.name.clone());
                }
            });
            let hud = weak.clone();
            let spawned = bus.subscribe(move |_: &EnemySpawned| {
                if let Some(hud) = hud.upgrade() {
                    hud.spawns.set(hud.spawns.get() + 1);
                }
            });
            let hud = weak.clone();
            let death = bus.subscribe(move |_: &EnemyDeath| {
                if let Some(hud) = hud.upgrade() {
                    hud.kills.set(hud.kills.get() + 1);
                }
            });
            let hud = weak.clone();
            let key = bus.subscribe(move |_: &KeyPress| {
                if let Some(hud) = hud.upgrade() {
                    hud.key_presses.set(hud.key_presses.get() + 1);
                }
            });
            let hud = weak.clone();
            let debug = bus.subscribe(move |e: &DebugMessage| {
                info!("[debug] {}", e.message);
                if let Some(hud) = hud.upgrade() {
                    hud.debug_messages.set(hud.debug_messages.get() + 1);
                    *hud.last_message.borrow_mut() = Some(e.message.clone());
                }
            });

            Hud {
                player: RefCell::new(None),
                spawns: Cell::new(0),
                kills: Cell::new(0),
                key_presses: Cell::new(0),
                debug_messages: Cell::new(0),
                last_message: RefCell::new(None),
                listeners: HudListeners {
                    player,
                    spawned,
                    death,
                    key,
                    debug,
                },
            }
        })
    }

    /// Unsubscribe every HUD handler. Returns how many were still subscribed.
    pub fn detach(&self, bus: &EventBus) -> usize {
        let l = &self.listeners;
        [
            bus.unsubscribe::<PlayerRegistered>(l.player),
            bus.unsubscribe::<EnemySpawned>(l.spawned),
            bus.unsubscribe::<EnemyDeath>(l.death),
            bus.unsubscribe::<KeyPress>(l.key),
            bus.unsubscribe::<DebugMessage>(l.debug),
        ]
        .into_iter()
        .filter(|removed| *removed)
        .count()
    }
}

// ---------------------------------------------------------------------------
// Arena
// ---------------------------------------------------------------------------

/// All gameplay objects of one run. Stored in the world as a non-send
/// resource.
pub struct Arena {
    pub hud: Rc<Hud>,
    pub spawner: Rc<Spawner>,
    pub explosions: Rc<Explosions>,
    pub slam: Rc<SlamSkill>,
    pub player: Rc<Player>,
}

impl Arena {
    pub fn setup(
        ctx: &CoreContext,
        config: &CoreConfig,
        seed: u64,
        cooldowns: &mut Cooldowns,
    ) -> Arena {
        // The HUD subscribes first so it sees the registration.
        let hud = Hud::attach(&ctx.bus);
        let spawner = Spawner::new(&ctx.bus, config, seed);
        let explosions = Explosions::new(&ctx.bus, config);
        let slam = SlamSkill::new(&ctx.bus, &spawner, cooldowns);
        if let Err(e) = ctx.console.register(Rc::new(SpawnCommand::new(&ctx.bus))) {
            warn!("{e}");
        }
        let player = Player::register("player", ctx);
        info!(
            "Arena ready: {} pool kinds, {} bindings, {} event types, {} console commands",
            spawner.pool_stats().len() + explosions.pool_stats().len(),
            ctx.input.binding_count(),
            ctx.bus.event_type_count(),
            ctx.console.command_count()
        );
        Arena {
            hud,
            spawner,
            explosions,
            slam,
            player,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.player.quit_requested()
    }

    /// Unsubscribe every handler, drop the player's bindings and the spawn
    /// command, then destroy all pooled instances. Returns how many were
    /// destroyed.
    pub fn shutdown(&self, ctx: &CoreContext) -> usize {
        let bus = &ctx.bus;
        let mut detached = self.hud.detach(bus);
        for removed in [
            self.spawner.detach(bus),
            self.explosions.detach(bus),
            self.slam.detach(bus),
        ] {
            detached += usize::from(removed);
        }
        let unbound = ctx.input.remove_subscriber(&self.player);
        ctx.console.unregister(SPAWN_COMMAND);

        let destroyed = self.spawner.shutdown() + self.explosions.shutdown();
        info!(
            "Arena shut down: {detached} listeners, {unbound} bindings removed, {destroyed} pooled instances destroyed"
        );
        destroyed
    }
}

/// End-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArenaSummary {
    pub frames: u64,
    pub elapsed: f32,
    pub quit_requested: bool,
    pub listening: bool,
    pub player: Option<String>,
    pub spawns: u32,
    pub kills: u32,
    pub key_presses: u32,
    pub debug_messages: u32,
    pub slam_uses: u32,
    pub live_enemies: usize,
    pub live_explosions: usize,
    pub console_lines: usize,
    pub input: InputStats,
    pub pools: Vec<PoolStats>,
}

/// A short scripted session exercising every binding: spawns, a slam that
/// kills the grunts and wounds the brute, a slam on cooldown, gameplay keys
/// while the console is open, an exhausted brute pool, two more slams to
/// finish the brute, a respawn into the freed brute slot and a final quit.
pub fn default_script() -> KeyScript {
    KeyScript::default()
        .press(1, Key::Digit1)
        .press(2, Key::Digit1)
        .press(3, Key::Digit2)
        .press(5, Key::Space)
        .press(6, Key::Space)
        .press(8, Key::Backquote)
        .press(9, Key::Digit1)
        .press(10, Key::Backquote)
        .press(11, Key::Digit2)
        .press(40, Key::Space)
        .press(75, Key::Space)
        .press(76, Key::Digit2)
        .press(80, Key::Q)
}

/// Build the world with every resource the schedule needs.
///
/// A [`CommandScript`](crate::resources::console::CommandScript) is optional;
/// insert one to drive the console.
pub fn build_world(config: CoreConfig, script: KeyScript, seed: u64) -> World {
    let ctx = CoreContext::from_config(&config);
    let mut cooldowns = Cooldowns::new();
    let arena = Arena::setup(&ctx, &config, seed, &mut cooldowns);

    let mut world = World::new();
    world.insert_resource(WorldTime::default());
    world.insert_resource(FrameKeys::default());
    world.insert_resource(InputStats::default());
    world.insert_resource(script);
    world.insert_resource(config);
    world.insert_non_send_resource(ctx);
    world.insert_non_send_resource(cooldowns);
    world.insert_non_send_resource(arena);
    world
}

pub fn build_schedule() -> Schedule {
    let mut update = Schedule::default();
    update.add_systems(
        (
            feed_scripted_keys,
            advance_cooldowns,
            route_input,
            feed_console_lines,
            expire_explosions,
        )
            .chain(),
    );
    update
}

/// Run frames until the player quits or `max_frames` is reached. Returns the
/// number of frames simulated.
pub fn run(world: &mut World, schedule: &mut Schedule) -> u64 {
    let (dt, max_frames) = {
        let config = world.resource::<CoreConfig>();
        (config.frame_delta(), config.max_frames)
    };

    while world.resource::<WorldTime>().frame_count < max_frames
        && !world.non_send_resource::<Arena>().quit_requested()
    {
        update_world_time(world, dt);
        schedule.run(world);
        world.clear_trackers();
    }

    world.resource::<WorldTime>().frame_count
}

pub fn summary(world: &World) -> ArenaSummary {
    let time = world.resource::<WorldTime>();
    let arena = world.non_send_resource::<Arena>();
    let ctx = world.non_send_resource::<CoreContext>();
    let mut pools = arena.spawner.pool_stats();
    pools.extend(arena.explosions.pool_stats());
    ArenaSummary {
        frames: time.frame_count,
        elapsed: time.elapsed,
        quit_requested: arena.quit_requested(),
        listening: ctx.input.is_listening(),
        player: arena.hud.player.borrow().clone(),
        spawns: arena.hud.spawns.get(),
        kills: arena.hud.kills.get(),
        key_presses: arena.hud.key_presses.get(),
        debug_messages: arena.hud.debug_messages.get(),
        slam_uses: arena.slam.uses(),
        live_enemies: arena.spawner.live_count(),
        live_explosions: arena.explosions.live_count(),
        console_lines: ctx.console.history().len(),
        input: *world.resource::<InputStats>(),
        pools,
    }
}
