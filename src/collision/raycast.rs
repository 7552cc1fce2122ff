//! Segment casts against the collision shapes.

use vek::Vec2;

use crate::math::{perp_dot, Iso};

use super::shape::{Shape, ShapeKind, Vertices};

/// A directed segment to cast through the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Starting point.
    pub origin: Vec2<f32>,
    /// Direction, normalized by the caster so it doesn't have to be unit
    /// length at call sites.
    pub direction: Vec2<f32>,
    /// Length of the cast segment.
    pub max_distance: f32,
}

impl Ray {
    /// Construct a new ray.
    pub fn new(origin: Vec2<f32>, direction: Vec2<f32>, max_distance: f32) -> Self {
        let max_distance = max_distance.max(0.0);

        Self {
            origin,
            direction,
            max_distance,
        }
    }
}

/// Result of a successful cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    /// Point of intersection.
    pub point: Vec2<f32>,
    /// Surface direction at the intersection.
    pub normal: Vec2<f32>,
    /// Distance traveled along the ray.
    pub distance: f32,
    /// Whether the ray started inside the shape.
    ///
    /// Advisory only, a hit is reported whenever the segment intersects the
    /// shape within range.
    pub inside: bool,
}

/// Cast a ray against a single transformed shape.
pub fn raycast_shape(shape: &Shape, iso: Iso, ray: &Ray) -> Option<RaycastHit> {
    puffin::profile_function!();

    let length = ray.direction.magnitude();
    if length <= f32::EPSILON {
        return None;
    }
    let direction = ray.direction / length;

    match shape.kind() {
        ShapeKind::Circle { radius } => raycast_circle(*radius, iso, ray.origin, direction, ray.max_distance),
        ShapeKind::Polygon { vertices, normals } => {
            raycast_polygon(vertices, normals, iso, ray.origin, direction, ray.max_distance)
        }
    }
}

/// Cast against a circle by solving the quadratic for the ray parameter.
fn raycast_circle(
    radius: f32,
    iso: Iso,
    origin: Vec2<f32>,
    direction: Vec2<f32>,
    max_distance: f32,
) -> Option<RaycastHit> {
    let offset = origin - iso.pos;
    let b = offset.dot(direction);
    let c = offset.magnitude_squared() - radius * radius;

    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();

    // From the inside only the far intersection lies ahead
    let inside = c < 0.0;
    let distance = if inside { -b + root } else { -b - root };
    if distance < 0.0 || distance > max_distance {
        return None;
    }

    let point = origin + direction * distance;
    let normal = if distance <= f32::EPSILON {
        -direction
    } else {
        (origin - point).normalized()
    };

    Some(RaycastHit {
        point,
        normal,
        distance,
        inside,
    })
}

/// Cast against a polygon by intersecting every edge segment.
fn raycast_polygon(
    vertices: &Vertices,
    normals: &Vertices,
    iso: Iso,
    origin: Vec2<f32>,
    direction: Vec2<f32>,
    max_distance: f32,
) -> Option<RaycastHit> {
    let len = vertices.len();

    let mut crossings = 0;
    let mut best: Option<(f32, usize)> = None;
    for i in 0..len {
        let a = iso.translate(vertices[(i + len - 1) % len]);
        let b = iso.translate(vertices[i]);
        let edge = b - a;

        let denominator = perp_dot(direction, edge);
        if denominator.abs() <= f32::EPSILON {
            // Ray parallel to the edge
            continue;
        }

        let offset = a - origin;
        let distance = perp_dot(offset, edge) / denominator;
        let along = perp_dot(offset, direction) / denominator;
        if distance < 0.0 || !(0.0..=1.0).contains(&along) {
            continue;
        }

        crossings += 1;
        if distance <= max_distance && best.map_or(true, |(closest, _)| distance < closest) {
            best = Some((distance, i));
        }
    }

    let (distance, edge) = best?;
    let point = origin + direction * distance;
    let normal = iso.rot.rotate(normals[edge]);
    // An odd number of edge crossings means the origin was inside
    let inside = crossings % 2 == 1;

    Some(RaycastHit {
        point,
        normal,
        distance,
        inside,
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use vek::{Extent2, Vec2};

    use crate::collision::shape::{Material, Shape};
    use crate::math::Iso;

    use super::{raycast_shape, Ray};

    /// Test a straight cast hitting a circle head on.
    #[test]
    fn test_circle_hit() {
        let circle = Shape::circle(Material::default(), 1.0).unwrap();
        let ray = Ray::new(Vec2::zero(), Vec2::new(1.0, 0.0), 10.0);

        let hit = raycast_shape(&circle, Iso::from_pos(Vec2::new(5.0, 0.0)), &ray).unwrap();
        assert_abs_diff_eq!(hit.distance, 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hit.point.x, 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hit.point.y, 0.0, epsilon = 1e-6);
        assert!(!hit.inside);
    }

    /// Test that an unnormalized direction is handled and range is respected.
    #[test]
    fn test_circle_range() {
        let circle = Shape::circle(Material::default(), 1.0).unwrap();

        // Same cast with a scaled direction vector
        let ray = Ray::new(Vec2::zero(), Vec2::new(100.0, 0.0), 10.0);
        let hit = raycast_shape(&circle, Iso::from_pos(Vec2::new(5.0, 0.0)), &ray).unwrap();
        assert_abs_diff_eq!(hit.distance, 4.0, epsilon = 1e-6);

        // Too short to reach
        let ray = Ray::new(Vec2::zero(), Vec2::new(1.0, 0.0), 3.0);
        assert!(raycast_shape(&circle, Iso::from_pos(Vec2::new(5.0, 0.0)), &ray).is_none());

        // Pointing away
        let ray = Ray::new(Vec2::zero(), Vec2::new(-1.0, 0.0), 10.0);
        assert!(raycast_shape(&circle, Iso::from_pos(Vec2::new(5.0, 0.0)), &ray).is_none());
    }

    /// Test a cast starting inside a circle.
    #[test]
    fn test_circle_inside() {
        let circle = Shape::circle(Material::default(), 2.0).unwrap();
        let ray = Ray::new(Vec2::zero(), Vec2::new(1.0, 0.0), 10.0);

        let hit = raycast_shape(&circle, Iso::from_pos(Vec2::zero()), &ray).unwrap();
        assert!(hit.inside);
        assert_abs_diff_eq!(hit.distance, 2.0, epsilon = 1e-6);
    }

    /// Test casts against a box.
    #[test]
    fn test_polygon() {
        let rect = Shape::rectangle(Material::default(), Extent2::new(2.0, 2.0)).unwrap();
        let iso = Iso::from_pos(Vec2::new(5.0, 0.0));

        let ray = Ray::new(Vec2::zero(), Vec2::new(1.0, 0.0), 10.0);
        let hit = raycast_shape(&rect, iso, &ray).unwrap();
        assert_abs_diff_eq!(hit.distance, 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hit.normal.x, -1.0, epsilon = 1e-6);
        assert!(!hit.inside);

        // From inside the box the exit face is hit
        let ray = Ray::new(Vec2::new(5.0, 0.0), Vec2::new(1.0, 0.0), 10.0);
        let hit = raycast_shape(&rect, iso, &ray).unwrap();
        assert!(hit.inside);
        assert_abs_diff_eq!(hit.distance, 1.0, epsilon = 1e-6);

        // A miss above the box
        let ray = Ray::new(Vec2::new(0.0, 5.0), Vec2::new(1.0, 0.0), 10.0);
        assert!(raycast_shape(&rect, iso, &ray).is_none());
    }
}
