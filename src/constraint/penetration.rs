//! Contact constraint between two overlapping bodies.

use crate::collision::Manifold;
use crate::math::{perp, perp_dot};
use crate::rigidbody::RigidBody;

use super::{BAUMGARTE_FACTOR, PENETRATION_SLOP};

/// A cached contact manifold being resolved with sequential impulses.
///
/// Lives in the world's contact cache across steps so the accumulated
/// impulses can warm-start the next solve.
#[derive(Debug, Clone)]
pub struct PenetrationConstraint {
    /// Collision information, including the per-contact impulse cache.
    pub manifold: Manifold,
    /// Step stamp of the last refresh, entries with an old stamp are evicted.
    pub(crate) stamp: u64,
}

impl PenetrationConstraint {
    /// Construct a fresh constraint from a detected manifold.
    pub fn new(manifold: Manifold, stamp: u64) -> Self {
        Self { manifold, stamp }
    }

    /// Replace the manifold with a newly detected one, carrying the
    /// accumulated impulses over for contacts whose ids match.
    ///
    /// Friction and restitution keep the values computed when the pair first
    /// touched.
    pub fn refresh(&mut self, mut manifold: Manifold, stamp: u64) {
        for contact in manifold.contacts.iter_mut() {
            if let Some(previous) = self
                .manifold
                .contacts
                .iter()
                .find(|previous| previous.id == contact.id)
            {
                contact.normal_impulse = previous.normal_impulse;
                contact.tangent_impulse = previous.tangent_impulse;
            }
        }

        manifold.friction = self.manifold.friction;
        manifold.restitution = self.manifold.restitution;
        self.manifold = manifold;
        self.stamp = stamp;
    }

    /// Re-apply the cached impulses once before the iterative loop.
    pub fn warm_start<U>(&self, body1: &mut RigidBody<U>, body2: &mut RigidBody<U>) {
        let direction = self.manifold.direction;
        let tangent = perp(direction);

        for contact in &self.manifold.contacts {
            let impulse = direction * contact.normal_impulse + tangent * contact.tangent_impulse;

            body1.apply_impulse(contact.point, -impulse);
            body2.apply_impulse(contact.point, impulse);
        }
    }

    /// Run a single sequential-impulse iteration over all contacts.
    pub fn solve<U>(&mut self, body1: &mut RigidBody<U>, body2: &mut RigidBody<U>, dt: f32) {
        // Both infinite masses means nothing can be resolved
        if body1.inverse_mass() + body2.inverse_mass() <= 0.0 {
            return;
        }

        let direction = self.manifold.direction;
        let tangent = perp(direction);
        let restitution = self.manifold.restitution;
        let friction = self.manifold.friction;

        for contact in self.manifold.contacts.iter_mut() {
            let r1 = contact.point - body1.position();
            let r2 = contact.point - body2.position();

            let relative_velocity =
                body2.velocity_at_point(contact.point) - body1.velocity_at_point(contact.point);
            let normal_velocity = relative_velocity.dot(direction);
            if normal_velocity > 0.0 {
                // Already separating
                continue;
            }

            let normal_mass = body1.inverse_mass()
                + body2.inverse_mass()
                + body1.inverse_inertia() * perp_dot(r1, direction).powi(2)
                + body2.inverse_inertia() * perp_dot(r2, direction).powi(2);
            if normal_mass <= f32::EPSILON {
                continue;
            }

            // Feed a fraction of the penetration error back as velocity
            let bias = -(BAUMGARTE_FACTOR / dt) * (-contact.depth + PENETRATION_SLOP).min(0.0);

            let lambda = (-(1.0 + restitution) * normal_velocity + bias) / normal_mass;
            let accumulated = (contact.normal_impulse + lambda).max(0.0);
            let applied = accumulated - contact.normal_impulse;
            contact.normal_impulse = accumulated;

            let normal_impulse = direction * applied;
            body1.apply_impulse(contact.point, -normal_impulse);
            body2.apply_impulse(contact.point, normal_impulse);

            // Friction along the tangent, clamped to the Coulomb cone
            let relative_velocity =
                body2.velocity_at_point(contact.point) - body1.velocity_at_point(contact.point);
            let tangent_velocity = relative_velocity.dot(tangent);

            let tangent_mass = body1.inverse_mass()
                + body2.inverse_mass()
                + body1.inverse_inertia() * perp_dot(r1, tangent).powi(2)
                + body2.inverse_inertia() * perp_dot(r2, tangent).powi(2);
            if tangent_mass <= f32::EPSILON {
                continue;
            }

            let lambda = -tangent_velocity / tangent_mass;
            let max_friction = friction * contact.normal_impulse;
            let accumulated =
                (contact.tangent_impulse + lambda).clamp(-max_friction, max_friction);
            let applied = accumulated - contact.tangent_impulse;
            contact.tangent_impulse = accumulated;

            let tangent_impulse = tangent * applied;
            body1.apply_impulse(contact.point, -tangent_impulse);
            body2.apply_impulse(contact.point, tangent_impulse);
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vek::Vec2;

    use crate::collision::compute_collision;
    use crate::collision::shape::{Material, Shape};
    use crate::rigidbody::{BodyType, RigidBody};

    use super::PenetrationConstraint;

    fn touching_circles() -> (RigidBody, RigidBody) {
        // Overlap below the slop so no Baumgarte bias contaminates velocities
        let shape = Shape::circle(Material::new(1.0, 0.0, 1.0), 1.0).unwrap();

        let mut body1: RigidBody = RigidBody::new(BodyType::Dynamic, Vec2::new(-0.9975, 0.0));
        body1.set_shape(Some(shape.clone()));
        let mut body2: RigidBody = RigidBody::new(BodyType::Dynamic, Vec2::new(0.9975, 0.0));
        body2.set_shape(Some(shape));

        (body1, body2)
    }

    fn constraint_for(body1: &RigidBody, body2: &RigidBody) -> PenetrationConstraint {
        let manifold = compute_collision(
            body1.shape().unwrap(),
            body1.iso(),
            body2.shape().unwrap(),
            body2.iso(),
        )
        .unwrap();

        PenetrationConstraint::new(manifold, 0)
    }

    /// Test that a fully elastic frontal impact swaps the velocities.
    #[test]
    fn test_elastic_impact() {
        let (mut body1, mut body2) = touching_circles();
        body1.set_linear_velocity(Vec2::new(1.0, 0.0));
        body2.set_linear_velocity(Vec2::new(-1.0, 0.0));

        let mut constraint = constraint_for(&body1, &body2);
        for _ in 0..crate::constraint::SOLVER_ITERATIONS {
            constraint.solve(&mut body1, &mut body2, 1.0 / 60.0);
        }

        assert_abs_diff_eq!(body1.linear_velocity().x, -1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(body2.linear_velocity().x, 1.0, epsilon = 1e-3);
    }

    /// Test that resting contacts without restitution stay untouched.
    #[test]
    fn test_resting_noop() {
        let (mut body1, mut body2) = touching_circles();
        let shape = Shape::circle(Material::new(1.0, 0.0, 0.0), 1.0).unwrap();
        body1.set_shape(Some(shape.clone()));
        body2.set_shape(Some(shape));

        let mut constraint = constraint_for(&body1, &body2);
        constraint.warm_start(&mut body1, &mut body2);
        for _ in 0..crate::constraint::SOLVER_ITERATIONS {
            constraint.solve(&mut body1, &mut body2, 1.0 / 60.0);
        }

        assert_eq!(body1.linear_velocity(), Vec2::zero());
        assert_eq!(body2.linear_velocity(), Vec2::zero());
        assert_eq!(body1.angular_velocity(), 0.0);
        assert_eq!(body2.angular_velocity(), 0.0);
    }

    /// Test that refreshing carries impulses over on matching contact ids.
    #[test]
    fn test_refresh_carries_impulses() {
        let (mut body1, mut body2) = touching_circles();
        body1.set_linear_velocity(Vec2::new(1.0, 0.0));
        body2.set_linear_velocity(Vec2::new(-1.0, 0.0));

        let mut constraint = constraint_for(&body1, &body2);
        constraint.solve(&mut body1, &mut body2, 1.0 / 60.0);
        let impulse = constraint.manifold.contacts[0].normal_impulse;
        assert!(impulse > 0.0);

        let manifold = compute_collision(
            body1.shape().unwrap(),
            body1.iso(),
            body2.shape().unwrap(),
            body2.iso(),
        )
        .unwrap();
        constraint.refresh(manifold, 1);

        assert_abs_diff_eq!(
            constraint.manifold.contacts[0].normal_impulse,
            impulse,
            epsilon = 1e-6
        );
    }
}
