//! Impulse-based 2D rigid-body physics engine.
//!
//! Bodies carrying convex shapes (circles or polygons of up to 8 vertices)
//! are advanced in fixed timesteps: a spatial-hash broad phase proposes
//! pairs, separating-axis tests with contact clipping produce manifolds, and
//! a warm-started sequential-impulse solver resolves them with Coulomb
//! friction and Baumgarte stabilization.
//!
//! ```
//! use tumble::{BodyType, Material, RigidBody, Shape, World, WorldSettings};
//! use vek::{Extent2, Vec2};
//!
//! let mut world: World = World::new(WorldSettings::default()).unwrap();
//!
//! let mut ground = RigidBody::new(BodyType::Static, Vec2::new(0.0, 10.0));
//! ground.set_shape(Some(
//!     Shape::rectangle(Material::default(), Extent2::new(20.0, 1.0)).unwrap(),
//! ));
//! world.add_body(ground).unwrap();
//!
//! let mut ball = RigidBody::new(BodyType::Dynamic, Vec2::new(0.0, 0.0));
//! ball.set_shape(Some(Shape::circle(Material::default(), 0.5).unwrap()));
//! world.add_body(ball).unwrap();
//!
//! // Simulate a second
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0);
//! }
//! ```

pub mod collision;
pub mod constraint;
pub mod math;
pub mod rigidbody;
pub mod world;

pub use collision::raycast::{Ray, RaycastHit};
pub use collision::shape::{Material, Shape, ShapeError, ShapeKind, MAX_POLYGON_VERTICES};
pub use collision::{compute_collision, Contact, ContactId, Manifold};
pub use math::{Iso, Rotation, PIXELS_PER_UNIT};
pub use rigidbody::{BodyFlags, BodyType, RigidBody};
pub use world::{
    BodyKey, ContactListener, ContactPair, World, WorldError, WorldSettings, MAX_BODIES,
};
