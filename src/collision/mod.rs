//! Narrow-phase collision detection between convex shapes.

pub mod raycast;
pub mod sat;
pub mod shape;
pub mod spatial_grid;

use arrayvec::ArrayVec;
use vek::Vec2;

use crate::math::Iso;

use self::shape::{Shape, ShapeKind, Vertices};

/// Maximum amount of contact points in a manifold.
pub const MAX_MANIFOLD_CONTACTS: usize = 2;

/// Identity of a contact point, stable while the same features stay in touch.
///
/// Polygon contacts encode the incident edge, the incident vertex the point
/// derives from and a bit for which body supplied the reference face; circle
/// contacts share a single fixed id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactId(u32);

impl ContactId {
    /// Tag bit distinguishing polygon clip contacts from circle contacts.
    const POLYGON: u32 = 1 << 8;

    /// The id shared by all circle contacts.
    pub fn circle() -> Self {
        Self(0)
    }

    /// The id of a clipped polygon contact.
    pub fn polygon(edge: usize, vertex: usize, flipped: bool) -> Self {
        Self(Self::POLYGON | ((edge as u32) << 4) | ((vertex as u32) << 1) | flipped as u32)
    }
}

/// A single point of contact between two bodies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Feature identity used to match this contact across steps.
    pub id: ContactId,
    /// World-space contact position.
    pub point: Vec2<f32>,
    /// How far the bodies overlap along the manifold direction.
    pub depth: f32,
    /// Accumulated impulse along the manifold direction, cached across steps.
    pub normal_impulse: f32,
    /// Accumulated impulse along the tangent, cached across steps.
    pub tangent_impulse: f32,
}

/// Collision information for a body pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifold {
    /// Unit direction of the collision, pointing from body 1 toward body 2.
    pub direction: Vec2<f32>,
    /// One or two contact points.
    ///
    /// Clearing the list suppresses constraint solving for the pair.
    pub contacts: ArrayVec<Contact, MAX_MANIFOLD_CONTACTS>,
    /// Combined friction coefficient of the two shapes.
    pub friction: f32,
    /// Combined restitution of the two shapes.
    pub restitution: f32,
}

/// Collide two shapes.
///
/// Returns `None` when the shapes don't overlap. The manifold direction
/// always points from the first shape toward the second.
pub fn compute_collision(
    shape1: &Shape,
    iso1: Iso,
    shape2: &Shape,
    iso2: Iso,
) -> Option<Manifold> {
    puffin::profile_function!();

    let mut manifold = match (shape1.kind(), shape2.kind()) {
        (ShapeKind::Circle { radius: radius1 }, ShapeKind::Circle { radius: radius2 }) => {
            circle_circle(*radius1, iso1, *radius2, iso2)?
        }
        (ShapeKind::Circle { radius }, ShapeKind::Polygon { vertices, normals }) => {
            circle_polygon(*radius, iso1, vertices, normals, iso2)?
        }
        (ShapeKind::Polygon { vertices, normals }, ShapeKind::Circle { radius }) => {
            circle_polygon(*radius, iso2, vertices, normals, iso1)?
        }
        (
            ShapeKind::Polygon {
                vertices: vertices1,
                normals: normals1,
            },
            ShapeKind::Polygon {
                vertices: vertices2,
                normals: normals2,
            },
        ) => sat::polygon_polygon(vertices1, normals1, iso1, vertices2, normals2, iso2)?,
    };

    // Enforce the direction convention regardless of which branch produced it
    if manifold.direction.dot(iso2.pos - iso1.pos) < 0.0 {
        manifold.direction = -manifold.direction;
    }

    let material1 = shape1.material();
    let material2 = shape2.material();
    manifold.friction = ((material1.friction + material2.friction) / 2.0).max(0.0);
    manifold.restitution = material1.restitution.min(material2.restitution).max(0.0);

    Some(manifold)
}

/// Collide two circles.
fn circle_circle(radius1: f32, iso1: Iso, radius2: f32, iso2: Iso) -> Option<Manifold> {
    let delta = iso2.pos - iso1.pos;
    let radius_sum = radius1 + radius2;
    if delta.magnitude_squared() > radius_sum * radius_sum {
        return None;
    }

    let distance = delta.magnitude();
    let (direction, depth) = if distance <= f32::EPSILON {
        // Coinciding centers have no meaningful direction
        (Vec2::unit_x(), radius1)
    } else {
        (delta / distance, radius_sum - distance)
    };

    let mut contacts = ArrayVec::new();
    contacts.push(Contact {
        id: ContactId::circle(),
        point: iso1.pos + direction * radius1,
        depth,
        normal_impulse: 0.0,
        tangent_impulse: 0.0,
    });

    Some(Manifold {
        direction,
        contacts,
        friction: 0.0,
        restitution: 0.0,
    })
}

/// Collide a circle with a convex polygon.
///
/// The returned direction points from the circle toward the polygon; the
/// dispatcher flips it afterwards when the polygon came first.
fn circle_polygon(
    radius: f32,
    circle_iso: Iso,
    vertices: &Vertices,
    normals: &Vertices,
    polygon_iso: Iso,
) -> Option<Manifold> {
    let local_center = polygon_iso.inv_translate(circle_iso.pos);
    let len = vertices.len();

    // The face the center is furthest along
    let mut best = f32::NEG_INFINITY;
    let mut best_face = 0;
    for face in 0..len {
        let distance = normals[face].dot(local_center - vertices[face]);
        if distance > best {
            best = distance;
            best_face = face;
        }
    }
    if best > radius {
        return None;
    }

    let local_direction;
    let depth;
    if best < 0.0 {
        // Center inside the polygon
        local_direction = -normals[best_face];
        depth = radius - best;
    } else {
        // Voronoi region of the closest face
        let a = vertices[(best_face + len - 1) % len];
        let b = vertices[best_face];
        let edge = b - a;
        let along = (local_center - a).dot(edge);

        let closest_vertex = if along < 0.0 {
            Some(a)
        } else if along > edge.magnitude_squared() {
            Some(b)
        } else {
            None
        };

        match closest_vertex {
            Some(vertex) => {
                let delta = local_center - vertex;
                let distance_squared = delta.magnitude_squared();
                if distance_squared > radius * radius {
                    return None;
                }

                let distance = distance_squared.sqrt();
                if distance <= f32::EPSILON {
                    local_direction = -normals[best_face];
                    depth = radius;
                } else {
                    local_direction = -delta / distance;
                    depth = radius - distance;
                }
            }
            None => {
                local_direction = -normals[best_face];
                depth = radius - best;
            }
        }
    }

    let direction = polygon_iso.rot.rotate(local_direction);

    let mut contacts = ArrayVec::new();
    contacts.push(Contact {
        id: ContactId::circle(),
        point: circle_iso.pos + direction * radius,
        depth,
        normal_impulse: 0.0,
        tangent_impulse: 0.0,
    });

    Some(Manifold {
        direction,
        contacts,
        friction: 0.0,
        restitution: 0.0,
    })
}
