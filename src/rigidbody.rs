//! Rigid bodies and their motion state.

use vek::{Aabr, Vec2};

use crate::collision::shape::Shape;
use crate::math::{perp, perp_dot, Iso, Rotation};

/// How a body participates in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyType {
    /// Never moves, velocity is pinned to zero and mass is infinite.
    Static,
    /// Moves with a user-controlled velocity, unaffected by forces and
    /// gravity, mass is infinite.
    Kinematic,
    /// Fully simulated.
    #[default]
    Dynamic,
}

/// Restrictions on a dynamic body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BodyFlags {
    /// Treat the mass as infinite so impulses never translate the body.
    pub lock_translation: bool,
    /// Treat the inertia as infinite so impulses never rotate the body.
    pub lock_rotation: bool,
}

/// A rigid body owning its collision shape and an opaque user payload.
#[derive(Debug, Clone)]
pub struct RigidBody<U = ()> {
    /// How the body participates in the simulation.
    body_type: BodyType,
    /// Restrictions on the motion.
    flags: BodyFlags,
    /// Collision shape, bodies without one never collide.
    shape: Option<Shape>,
    /// Position with rotation.
    iso: Iso,
    /// Mass, zero means infinite.
    mass: f32,
    /// Inverse of the mass, zero means infinite.
    inv_mass: f32,
    /// Inertia tensor, torque needed for an angular acceleration.
    inertia: f32,
    /// Inverse of the inertia tensor, zero means infinite.
    inv_inertia: f32,
    /// Multiplier for the world gravity.
    gravity_scale: f32,
    /// Linear velocity.
    vel: Vec2<f32>,
    /// Angular velocity in radians per second.
    ang_vel: f32,
    /// Accumulated external force, cleared every step.
    force: Vec2<f32>,
    /// Accumulated external torque, cleared every step.
    torque: f32,
    /// Cached bounding box under the current transform.
    aabr: Aabr<f32>,
    /// Opaque user payload, never touched by the engine.
    user: U,
}

impl<U: Default> RigidBody<U> {
    /// Construct a new body without a shape at a position.
    pub fn new<P>(body_type: BodyType, position: P) -> Self
    where
        P: Into<Vec2<f32>>,
    {
        Self::with_user(body_type, position, U::default())
    }
}

impl<U> RigidBody<U> {
    /// Construct a new body without a shape, carrying a user payload.
    pub fn with_user<P>(body_type: BodyType, position: P, user: U) -> Self
    where
        P: Into<Vec2<f32>>,
    {
        let iso = Iso::from_pos(position);
        let aabr = Aabr {
            min: iso.pos,
            max: iso.pos,
        };

        let mut body = Self {
            body_type,
            flags: BodyFlags::default(),
            shape: None,
            iso,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            gravity_scale: 1.0,
            vel: Vec2::zero(),
            ang_vel: 0.0,
            force: Vec2::zero(),
            torque: 0.0,
            aabr,
            user,
        };
        body.recompute_mass();

        body
    }

    /// Attach a shape, returning the previous one.
    ///
    /// Passing `None` detaches the current shape.
    pub fn set_shape(&mut self, shape: Option<Shape>) -> Option<Shape> {
        let previous = std::mem::replace(&mut self.shape, shape);
        self.recompute_mass();
        self.refresh_aabr();

        previous
    }

    /// The attached shape.
    pub fn shape(&self) -> Option<&Shape> {
        self.shape.as_ref()
    }

    /// How the body participates in the simulation.
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Change how the body participates in the simulation.
    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        if body_type == BodyType::Static {
            self.vel = Vec2::zero();
            self.ang_vel = 0.0;
        }
        self.recompute_mass();
    }

    /// Motion restrictions.
    pub fn flags(&self) -> BodyFlags {
        self.flags
    }

    /// Change the motion restrictions.
    pub fn set_flags(&mut self, flags: BodyFlags) {
        self.flags = flags;
        self.recompute_mass();
    }

    /// Global position.
    pub fn position(&self) -> Vec2<f32> {
        self.iso.pos
    }

    /// Teleport to a global position.
    pub fn set_position<P>(&mut self, position: P)
    where
        P: Into<Vec2<f32>>,
    {
        self.iso.pos = position.into();
        self.refresh_aabr();
    }

    /// Rotation.
    pub fn rotation(&self) -> Rotation {
        self.iso.rot
    }

    /// Set the rotation.
    pub fn set_rotation<R>(&mut self, rotation: R)
    where
        R: Into<Rotation>,
    {
        self.iso.rot = rotation.into();
        self.refresh_aabr();
    }

    /// Position with rotation.
    pub fn iso(&self) -> Iso {
        self.iso
    }

    /// Linear velocity.
    pub fn linear_velocity(&self) -> Vec2<f32> {
        self.vel
    }

    /// Set the linear velocity.
    ///
    /// Ignored for static bodies.
    pub fn set_linear_velocity<V>(&mut self, velocity: V)
    where
        V: Into<Vec2<f32>>,
    {
        if self.body_type != BodyType::Static {
            self.vel = velocity.into();
        }
    }

    /// Angular velocity in radians per second.
    pub fn angular_velocity(&self) -> f32 {
        self.ang_vel
    }

    /// Set the angular velocity.
    ///
    /// Ignored for static bodies.
    pub fn set_angular_velocity(&mut self, velocity: f32) {
        if self.body_type != BodyType::Static {
            self.ang_vel = velocity;
        }
    }

    /// Multiplier for the world gravity.
    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    /// Set the gravity multiplier.
    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    /// Mass, zero means infinite.
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Inverse of the mass, zero means infinite.
    pub fn inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Inertia tensor, zero means infinite.
    pub fn inertia(&self) -> f32 {
        self.inertia
    }

    /// Inverse of the inertia tensor, zero means infinite.
    pub fn inverse_inertia(&self) -> f32 {
        self.inv_inertia
    }

    /// The user payload.
    pub fn user(&self) -> &U {
        &self.user
    }

    /// The user payload, mutable.
    pub fn user_mut(&mut self) -> &mut U {
        &mut self.user
    }

    /// Replace the user payload, returning the previous one.
    pub fn set_user(&mut self, user: U) -> U {
        std::mem::replace(&mut self.user, user)
    }

    /// Cached bounding box under the current transform.
    pub fn aabr(&self) -> Aabr<f32> {
        self.aabr
    }

    /// Accumulate a force applied at a world-space point.
    pub fn apply_force(&mut self, point: Vec2<f32>, force: Vec2<f32>) {
        self.force += force;
        self.torque += perp_dot(point - self.iso.pos, force);
    }

    /// Immediately change the velocities with an impulse at a world-space
    /// point.
    pub fn apply_impulse(&mut self, point: Vec2<f32>, impulse: Vec2<f32>) {
        self.vel += impulse * self.inv_mass;
        self.ang_vel += self.inv_inertia * perp_dot(point - self.iso.pos, impulse);
    }

    /// Velocity of the material point currently at a world-space position.
    pub fn velocity_at_point(&self, point: Vec2<f32>) -> Vec2<f32> {
        self.vel + perp(point - self.iso.pos) * self.ang_vel
    }

    /// Whether a world-space point lies inside the body's shape.
    pub fn contains_point(&self, point: Vec2<f32>) -> bool {
        self.shape
            .as_ref()
            .map_or(false, |shape| shape.contains(self.iso, point))
    }

    /// Apply gravity and integrate the velocities.
    ///
    /// Only dynamic bodies are affected.
    pub(crate) fn integrate_velocity(&mut self, dt: f32, gravity: Vec2<f32>) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.force += gravity * self.gravity_scale * self.mass;
        self.vel += self.force * self.inv_mass * dt;
        self.ang_vel += self.torque * self.inv_inertia * dt;
    }

    /// Integrate the position and refresh the bounding box.
    ///
    /// Static bodies never move.
    pub(crate) fn integrate_position(&mut self, dt: f32) {
        if self.body_type == BodyType::Static {
            return;
        }

        self.iso.pos += self.vel * dt;
        self.iso.rot += self.ang_vel * dt;
        self.refresh_aabr();
    }

    /// Zero the force accumulators at the end of a step.
    pub(crate) fn clear_forces(&mut self) {
        self.force = Vec2::zero();
        self.torque = 0.0;
    }

    /// Recompute mass and inertia from the body type, flags and shape.
    fn recompute_mass(&mut self) {
        let properties = match (&self.body_type, &self.shape) {
            (BodyType::Dynamic, Some(shape)) => {
                let mass = shape.mass();
                let inertia = shape.inertia(mass);

                Some((mass, inertia))
            }
            _ => None,
        };

        match properties {
            Some((mass, inertia)) => {
                self.mass = mass;
                self.inertia = inertia;
                self.inv_mass = if self.flags.lock_translation || mass <= 0.0 {
                    0.0
                } else {
                    1.0 / mass
                };
                self.inv_inertia = if self.flags.lock_rotation || inertia <= 0.0 {
                    0.0
                } else {
                    1.0 / inertia
                };
            }
            None => {
                self.mass = 0.0;
                self.inv_mass = 0.0;
                self.inertia = 0.0;
                self.inv_inertia = 0.0;
            }
        }
    }

    /// Refresh the cached bounding box from the shape and transform.
    fn refresh_aabr(&mut self) {
        self.aabr = match &self.shape {
            Some(shape) => shape.aabr(self.iso),
            None => Aabr {
                min: self.iso.pos,
                max: self.iso.pos,
            },
        };
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vek::{Extent2, Vec2};

    use crate::collision::shape::{Material, Shape};

    use super::{BodyFlags, BodyType, RigidBody};

    fn unit_box() -> Shape {
        Shape::rectangle(Material::default(), Extent2::new(2.0, 2.0)).unwrap()
    }

    /// Test that mass properties follow the body type and flags.
    #[test]
    fn test_mass_properties() {
        let mut body: RigidBody = RigidBody::new(BodyType::Dynamic, Vec2::zero());
        assert_eq!(body.mass(), 0.0);
        assert_eq!(body.inverse_mass(), 0.0);

        body.set_shape(Some(unit_box()));
        assert_abs_diff_eq!(body.mass(), 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(body.inverse_mass(), 0.25, epsilon = 1e-6);
        assert!(body.inertia() > 0.0);
        assert!(body.inverse_inertia() > 0.0);

        body.set_flags(BodyFlags {
            lock_translation: true,
            lock_rotation: true,
        });
        assert_eq!(body.inverse_mass(), 0.0);
        assert_eq!(body.inverse_inertia(), 0.0);

        body.set_body_type(BodyType::Static);
        assert_eq!(body.mass(), 0.0);
        assert_eq!(body.inverse_mass(), 0.0);
    }

    /// Test that statics ignore velocity changes and kinematics keep theirs.
    #[test]
    fn test_velocity_rules() {
        let mut body: RigidBody = RigidBody::new(BodyType::Static, Vec2::zero());
        body.set_shape(Some(unit_box()));
        body.set_linear_velocity(Vec2::new(1.0, 0.0));
        assert_eq!(body.linear_velocity(), Vec2::zero());

        let mut body: RigidBody = RigidBody::new(BodyType::Kinematic, Vec2::zero());
        body.set_shape(Some(unit_box()));
        body.set_linear_velocity(Vec2::new(1.0, 0.0));
        body.integrate_velocity(1.0, Vec2::new(0.0, 9.8));
        assert_eq!(body.linear_velocity(), Vec2::new(1.0, 0.0));

        body.integrate_position(0.5);
        assert_eq!(body.position(), Vec2::new(0.5, 0.0));
    }

    /// Test semi-implicit Euler integration under gravity.
    #[test]
    fn test_integration() {
        let mut body: RigidBody = RigidBody::new(BodyType::Dynamic, Vec2::zero());
        body.set_shape(Some(unit_box()));

        let dt = 1.0 / 60.0;
        body.integrate_velocity(dt, Vec2::new(0.0, 9.8));
        assert_abs_diff_eq!(body.linear_velocity().y, 9.8 * dt, epsilon = 1e-6);

        body.integrate_position(dt);
        assert_abs_diff_eq!(body.position().y, 9.8 * dt * dt, epsilon = 1e-6);

        body.clear_forces();
        body.integrate_velocity(dt, Vec2::new(0.0, 9.8));
        assert_abs_diff_eq!(body.linear_velocity().y, 2.0 * 9.8 * dt, epsilon = 1e-5);
    }

    /// Test impulses applied off-center spin the body.
    #[test]
    fn test_impulse() {
        let mut body: RigidBody = RigidBody::new(BodyType::Dynamic, Vec2::zero());
        body.set_shape(Some(unit_box()));

        body.apply_impulse(Vec2::new(0.0, -1.0), Vec2::new(1.0, 0.0));
        assert_abs_diff_eq!(body.linear_velocity().x, 0.25, epsilon = 1e-6);
        assert!(body.angular_velocity() > 0.0);

        let at_point = body.velocity_at_point(Vec2::new(0.0, -1.0));
        assert!(at_point.x > body.linear_velocity().x);
    }

    /// Test that the bounding box follows transform mutations.
    #[test]
    fn test_aabr_refresh() {
        let mut body: RigidBody = RigidBody::new(BodyType::Dynamic, Vec2::zero());
        body.set_shape(Some(unit_box()));
        assert_eq!(body.aabr().min, Vec2::new(-1.0, -1.0));

        body.set_position(Vec2::new(5.0, 5.0));
        assert_eq!(body.aabr().min, Vec2::new(4.0, 4.0));
        assert_eq!(body.aabr().max, Vec2::new(6.0, 6.0));
    }

    /// Test the point containment helper.
    #[test]
    fn test_contains_point() {
        let mut body: RigidBody = RigidBody::new(BodyType::Dynamic, Vec2::new(2.0, 0.0));
        assert!(!body.contains_point(Vec2::new(2.0, 0.0)));

        body.set_shape(Some(unit_box()));
        assert!(body.contains_point(Vec2::new(2.5, 0.5)));
        assert!(!body.contains_point(Vec2::new(4.0, 0.0)));
    }
}
