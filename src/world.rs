//! The world owning all bodies and driving the simulation pipeline.

use hashbrown::{hash_map::Entry, HashMap};
use serde::Deserialize;
use slotmap::{new_key_type, SlotMap};
use thiserror::Error;
use vek::{Aabr, Vec2};
use web_time::Instant;

use crate::collision::raycast::{raycast_shape, Ray, RaycastHit};
use crate::collision::shape::ShapeKind;
use crate::collision::spatial_grid::{SpatialGrid, SpatialGridError};
use crate::collision::{compute_collision, Manifold};
use crate::constraint::penetration::PenetrationConstraint;
use crate::constraint::SOLVER_ITERATIONS;
use crate::rigidbody::RigidBody;

/// Hard cap on the amount of bodies a world will hold.
pub const MAX_BODIES: usize = 4096;

/// Default gravity in units per second squared, pointing down in screen
/// space.
pub const DEFAULT_GRAVITY: Vec2<f32> = Vec2::new(0.0, 9.8);

/// Default broad-phase cell size in units.
pub const DEFAULT_CELL_SIZE: f32 = 4.0;

new_key_type! {
    /// Generational handle of a body inside a world.
    pub struct BodyKey;
}

/// Everything that can go wrong when constructing or filling a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The body capacity is exhausted.
    #[error("world is at its capacity of 4096 bodies")]
    TooManyBodies,
    /// The broad phase rejected its configuration.
    #[error(transparent)]
    SpatialGrid(#[from] SpatialGridError),
}

/// Tunables of a world, loadable from a settings file.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Gravity applied to every dynamic body, in units per second squared.
    pub gravity: Vec2<f32>,
    /// Cell size of the broad-phase grid, in units.
    pub cell_size: f32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

/// Unordered pair of bodies identifying a contact cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContactPair {
    /// Smaller key of the pair.
    pub first: BodyKey,
    /// Larger key of the pair.
    pub second: BodyKey,
}

impl ContactPair {
    /// Construct the canonical pair for two keys.
    pub fn new(a: BodyKey, b: BodyKey) -> Self {
        if a <= b {
            Self {
                first: a,
                second: b,
            }
        } else {
            Self {
                first: b,
                second: a,
            }
        }
    }

    /// Whether one of the two keys matches.
    pub fn contains(&self, key: BodyKey) -> bool {
        self.first == key || self.second == key
    }
}

/// Hooks into the step pipeline, called once per touching pair.
///
/// Callbacks run synchronously on the caller's thread and must not re-enter
/// the world.
pub trait ContactListener<U> {
    /// Called after collision detection, before any solving.
    ///
    /// Clearing the manifold's contacts suppresses the collision response
    /// for this step, turning the pair into a sensor.
    fn pre_step(
        &mut self,
        _pair: ContactPair,
        _manifold: &mut Manifold,
        _bodies: &mut SlotMap<BodyKey, RigidBody<U>>,
    ) {
    }

    /// Called after the solver and position integration.
    fn post_step(
        &mut self,
        _pair: ContactPair,
        _manifold: &Manifold,
        _bodies: &mut SlotMap<BodyKey, RigidBody<U>>,
    ) {
    }
}

/// Monotonic time source driving [`World::update`].
type Clock = Box<dyn FnMut() -> f64>;

/// The simulation world.
///
/// Owns the bodies, the broad-phase index and a contact cache that persists
/// across steps for warm starting.
pub struct World<U = ()> {
    /// All bodies added to the world.
    bodies: SlotMap<BodyKey, RigidBody<U>>,
    /// Broad-phase index, rebuilt every step.
    grid: SpatialGrid,
    /// Persistent contact cache keyed by body pair.
    cache: HashMap<ContactPair, PenetrationConstraint>,
    /// Gravity applied to every dynamic body.
    gravity: Vec2<f32>,
    /// Optional hooks into the step pipeline.
    listener: Option<Box<dyn ContactListener<U>>>,
    /// Leftover simulated time smaller than a step.
    accumulator: f32,
    /// Clock reading of the previous update call.
    last_time: Option<f64>,
    /// Injectable monotonic clock.
    clock: Clock,
    /// Amount of steps taken so far, doubles as the cache freshness stamp.
    steps: u64,
    /// Scratch list of body keys in broad-phase insertion order.
    keys: Vec<BodyKey>,
    /// Scratch list of pairs, candidate pairs during detection and the
    /// sorted solve order afterwards.
    pairs: Vec<ContactPair>,
    /// Scratch list of raycast hits for distance sorting.
    hits: Vec<(BodyKey, RaycastHit)>,
}

impl<U> World<U> {
    /// Construct a new world.
    pub fn new(settings: WorldSettings) -> Result<Self, WorldError> {
        let grid = SpatialGrid::new(settings.cell_size)?;

        let epoch = Instant::now();
        let clock = Box::new(move || epoch.elapsed().as_secs_f64());

        Ok(Self {
            bodies: SlotMap::with_key(),
            grid,
            cache: HashMap::new(),
            gravity: settings.gravity,
            listener: None,
            accumulator: 0.0,
            last_time: None,
            clock,
            steps: 0,
            keys: Vec::new(),
            pairs: Vec::new(),
            hits: Vec::new(),
        })
    }

    /// Add a body, transferring ownership to the world.
    ///
    /// Fails without inserting when the world is at capacity.
    pub fn add_body(&mut self, body: RigidBody<U>) -> Result<BodyKey, WorldError> {
        if self.bodies.len() >= MAX_BODIES {
            log::warn!("rejecting body, world is at its capacity of {MAX_BODIES}");
            return Err(WorldError::TooManyBodies);
        }

        Ok(self.bodies.insert(body))
    }

    /// Remove a body, handing it back to the caller.
    ///
    /// Returns `None` when the key is stale.
    pub fn remove_body(&mut self, key: BodyKey) -> Option<RigidBody<U>> {
        let body = self.bodies.remove(key)?;
        self.cache.retain(|pair, _| !pair.contains(key));

        Some(body)
    }

    /// A body by its key.
    pub fn body(&self, key: BodyKey) -> Option<&RigidBody<U>> {
        self.bodies.get(key)
    }

    /// A body by its key, mutable.
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut RigidBody<U>> {
        self.bodies.get_mut(key)
    }

    /// Iterator over all bodies.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &RigidBody<U>)> {
        self.bodies.iter()
    }

    /// Amount of bodies in the world.
    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    /// Whether the world holds no bodies.
    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Gravity applied to every dynamic body.
    pub fn gravity(&self) -> Vec2<f32> {
        self.gravity
    }

    /// Change the gravity.
    pub fn set_gravity(&mut self, gravity: Vec2<f32>) {
        self.gravity = gravity;
    }

    /// Install or remove the step hooks.
    pub fn set_contact_listener(&mut self, listener: Option<Box<dyn ContactListener<U>>>) {
        self.listener = listener;
    }

    /// Replace the monotonic clock driving [`World::update`].
    pub fn set_clock(&mut self, clock: impl FnMut() -> f64 + 'static) {
        self.clock = Box::new(clock);
        self.last_time = None;
    }

    /// Amount of steps simulated so far.
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Advance the simulation by a fixed timestep.
    ///
    /// Does nothing for a non-positive `dt`.
    pub fn step(&mut self, dt: f32) {
        puffin::profile_function!();

        if dt <= 0.0 {
            return;
        }
        self.steps += 1;

        self.broad_phase();
        self.narrow_phase();

        // A sorted pair order keeps the solve deterministic across runs
        self.pairs.clear();
        self.pairs.extend(self.cache.keys().copied());
        self.pairs.sort_unstable();

        self.fire_pre_step();

        {
            puffin::profile_scope!("Integrate velocities");

            for (_, body) in self.bodies.iter_mut() {
                body.integrate_velocity(dt, self.gravity);
            }
        }

        {
            puffin::profile_scope!("Solve contacts");

            self.warm_start();
            for _ in 0..SOLVER_ITERATIONS {
                self.solve_iteration(dt);
            }
        }

        {
            puffin::profile_scope!("Integrate positions");

            for (_, body) in self.bodies.iter_mut() {
                body.integrate_position(dt);
            }
        }

        self.fire_post_step();

        for (_, body) in self.bodies.iter_mut() {
            body.clear_forces();
        }
        self.grid.clear();
    }

    /// Advance the simulation with wall-clock time, stepping zero or more
    /// times with a fixed timestep.
    ///
    /// Leftover time is carried over so the step size stays independent of
    /// the call cadence.
    pub fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        let now = (self.clock)();
        let elapsed = match self.last_time {
            Some(last) => (now - last) as f32,
            None => 0.0,
        };
        self.last_time = Some(now);

        self.accumulator += elapsed;
        while self.accumulator >= dt {
            self.step(dt);
            self.accumulator -= dt;
        }
    }

    /// Cast a ray through the world, invoking the callback for every hit
    /// body in ascending distance order.
    pub fn raycast(&mut self, ray: Ray, mut f: impl FnMut(BodyKey, RaycastHit)) {
        puffin::profile_function!();

        let length = ray.direction.magnitude();
        if length <= f32::EPSILON {
            return;
        }

        // Reuse the broad phase to prune the candidates
        self.broad_phase();

        let end = ray.origin + ray.direction / length * ray.max_distance;
        let segment = Aabr {
            min: Vec2::new(ray.origin.x.min(end.x), ray.origin.y.min(end.y)),
            max: Vec2::new(ray.origin.x.max(end.x), ray.origin.y.max(end.y)),
        };

        self.hits.clear();
        {
            let bodies = &self.bodies;
            let keys = &self.keys;
            let hits = &mut self.hits;
            self.grid.query(segment, |index| {
                let key = keys[index as usize];
                let body = &bodies[key];

                let Some(shape) = body.shape() else { return };
                if let Some(hit) = raycast_shape(shape, body.iso(), &ray) {
                    hits.push((key, hit));
                }
            });
        }

        self.hits
            .sort_unstable_by(|a, b| a.1.distance.total_cmp(&b.1.distance));
        for (key, hit) in self.hits.drain(..) {
            f(key, hit);
        }

        self.grid.clear();
    }

    /// World-space outlines of every body, for debug drawing.
    pub fn debug_vertices(&self) -> Vec<Vec<Vec2<f32>>> {
        self.bodies
            .values()
            .filter_map(|body| {
                let shape = body.shape()?;

                Some(match shape.kind() {
                    ShapeKind::Polygon { vertices, .. } => vertices
                        .iter()
                        .map(|vertex| body.iso().translate(*vertex))
                        .collect(),
                    ShapeKind::Circle { radius } => (0..16)
                        .map(|i| {
                            let angle = i as f32 * std::f32::consts::TAU / 16.0;

                            body.position() + Vec2::new(angle.cos(), angle.sin()) * *radius
                        })
                        .collect(),
                })
            })
            .collect()
    }

    /// Rebuild the broad-phase index from all body bounding boxes.
    fn broad_phase(&mut self) {
        puffin::profile_scope!("Broad phase");

        self.grid.clear();
        self.keys.clear();
        self.keys.extend(self.bodies.keys());

        for (index, key) in self.keys.iter().enumerate() {
            self.grid.insert(self.bodies[*key].aabr(), index as u32);
        }
    }

    /// Enumerate candidate pairs, run collision detection on them and
    /// refresh the contact cache.
    fn narrow_phase(&mut self) {
        puffin::profile_scope!("Narrow phase");

        // Candidate pairs from the broad phase
        self.pairs.clear();
        {
            let grid = &mut self.grid;
            let bodies = &self.bodies;
            let keys = &self.keys;
            let pairs = &mut self.pairs;
            for (index, key) in keys.iter().enumerate() {
                let body = &bodies[*key];
                let aabr = body.aabr();
                let inverse_mass = body.inverse_mass();

                grid.query(aabr, |other| {
                    let other = other as usize;
                    // Count each pair once
                    if other <= index {
                        return;
                    }

                    // A pair that can't respond to impulses is not worth
                    // detecting
                    let other_key = keys[other];
                    if inverse_mass == 0.0 && bodies[other_key].inverse_mass() == 0.0 {
                        return;
                    }

                    pairs.push(ContactPair::new(*key, other_key));
                });
            }
        }

        // Detect and refresh or evict cache entries
        for i in 0..self.pairs.len() {
            let pair = self.pairs[i];
            let body1 = &self.bodies[pair.first];
            let body2 = &self.bodies[pair.second];

            let manifold = match (body1.shape(), body2.shape()) {
                (Some(shape1), Some(shape2)) => {
                    compute_collision(shape1, body1.iso(), shape2, body2.iso())
                }
                _ => None,
            };

            match manifold {
                Some(manifold) => match self.cache.entry(pair) {
                    Entry::Occupied(mut entry) => entry.get_mut().refresh(manifold, self.steps),
                    Entry::Vacant(entry) => {
                        entry.insert(PenetrationConstraint::new(manifold, self.steps));
                    }
                },
                None => {
                    self.cache.remove(&pair);
                }
            }
        }

        // Pairs that weren't refreshed this step stopped touching
        let stamp = self.steps;
        self.cache.retain(|_, constraint| constraint.stamp == stamp);
    }

    /// Invoke the pre-step hook for every cached manifold.
    fn fire_pre_step(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };

        for pair in &self.pairs {
            if let Some(constraint) = self.cache.get_mut(pair) {
                listener.pre_step(*pair, &mut constraint.manifold, &mut self.bodies);
            }
        }

        self.listener = Some(listener);
    }

    /// Invoke the post-step hook for every cached manifold.
    fn fire_post_step(&mut self) {
        let Some(mut listener) = self.listener.take() else {
            return;
        };

        for pair in &self.pairs {
            if let Some(constraint) = self.cache.get(pair) {
                listener.post_step(*pair, &constraint.manifold, &mut self.bodies);
            }
        }

        self.listener = Some(listener);
    }

    /// Re-apply the cached impulses of the previous step.
    fn warm_start(&mut self) {
        for pair in &self.pairs {
            let Some(constraint) = self.cache.get(pair) else {
                continue;
            };
            let Some([body1, body2]) = self.bodies.get_disjoint_mut([pair.first, pair.second])
            else {
                continue;
            };

            constraint.warm_start(body1, body2);
        }
    }

    /// Run one solver iteration over all cached contacts.
    fn solve_iteration(&mut self, dt: f32) {
        for pair in &self.pairs {
            let Some(constraint) = self.cache.get_mut(pair) else {
                continue;
            };
            let Some([body1, body2]) = self.bodies.get_disjoint_mut([pair.first, pair.second])
            else {
                continue;
            };

            constraint.solve(body1, body2, dt);
        }
    }
}
