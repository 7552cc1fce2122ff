//! Separating axis theorem for convex polygon pairs.
//!
//! The polygon with the shallowest penetrating face supplies the reference
//! edge; the incident edge of the other polygon is clipped against the
//! reference side planes to build the contact manifold.

use arrayvec::ArrayVec;
use vek::Vec2;

use crate::math::Iso;

use super::{
    shape::Vertices,
    Contact, ContactId, Manifold,
};

/// A point of the incident edge that remembers which vertex it came from.
#[derive(Debug, Clone, Copy)]
struct ClipVertex {
    /// World-space position.
    point: Vec2<f32>,
    /// Index of the incident polygon vertex this point derives from.
    vertex: usize,
}

/// Collide two convex polygons.
///
/// Returns `None` when a separating axis exists. The manifold direction is
/// the reference face normal; the caller fixes up the body 1 to body 2
/// orientation convention.
pub fn polygon_polygon(
    vertices1: &Vertices,
    normals1: &Vertices,
    iso1: Iso,
    vertices2: &Vertices,
    normals2: &Vertices,
    iso2: Iso,
) -> Option<Manifold> {
    puffin::profile_function!();

    let (world1, world_normals1) = to_world(vertices1, normals1, iso1);
    let (world2, world_normals2) = to_world(vertices2, normals2, iso2);

    let (separation1, face1) = max_separation(&world1, &world_normals1, &world2);
    if separation1 > 0.0 {
        return None;
    }
    let (separation2, face2) = max_separation(&world2, &world_normals2, &world1);
    if separation2 > 0.0 {
        return None;
    }

    // The shallower face makes the better reference plane
    let flipped = separation2 > separation1;
    let (reference, reference_normals, face, incident, incident_normals) = if flipped {
        (&world2, &world_normals2, face2, &world1, &world_normals1)
    } else {
        (&world1, &world_normals1, face1, &world2, &world_normals2)
    };

    let direction = reference_normals[face];

    // The incident edge is the one most facing the reference plane, picked
    // from the two edges around the incident support vertex
    let len = incident.len();
    let support = (0..len)
        .min_by(|a, b| {
            direction
                .dot(incident[*a])
                .total_cmp(&direction.dot(incident[*b]))
        })
        .expect("a polygon has at least 3 vertices");
    let edge = if incident_normals[support].dot(direction)
        < incident_normals[(support + 1) % len].dot(direction)
    {
        support
    } else {
        (support + 1) % len
    };

    let first = (edge + len - 1) % len;
    let mut points = [
        ClipVertex {
            point: incident[first],
            vertex: first,
        },
        ClipVertex {
            point: incident[edge],
            vertex: edge,
        },
    ];

    // Clip the incident edge between the two reference side planes
    let reference_len = reference.len();
    let r0 = reference[(face + reference_len - 1) % reference_len];
    let r1 = reference[face];
    let tangent = (r1 - r0).normalized();

    points = clip_segment(points, -tangent, -tangent.dot(r0))?;
    points = clip_segment(points, tangent, tangent.dot(r1))?;

    // Points still behind the reference face become contacts
    let mut contacts = ArrayVec::new();
    for clip in points {
        let separation = direction.dot(clip.point - r1);
        if separation <= 0.0 {
            contacts.push(Contact {
                id: ContactId::polygon(edge, clip.vertex, flipped),
                point: clip.point,
                depth: -separation,
                normal_impulse: 0.0,
                tangent_impulse: 0.0,
            });
        }
    }
    if contacts.is_empty() {
        return None;
    }

    Some(Manifold {
        direction,
        contacts,
        friction: 0.0,
        restitution: 0.0,
    })
}

/// Transform a polygon's vertices and normals into world space.
fn to_world(vertices: &Vertices, normals: &Vertices, iso: Iso) -> (Vertices, Vertices) {
    let world = vertices.iter().map(|vertex| iso.translate(*vertex)).collect();
    let world_normals = normals.iter().map(|normal| iso.rot.rotate(*normal)).collect();

    (world, world_normals)
}

/// Largest signed face separation of `other` against the faces of a polygon.
///
/// A positive result means a separating axis was found.
fn max_separation(vertices: &Vertices, normals: &Vertices, other: &Vertices) -> (f32, usize) {
    let mut best = f32::NEG_INFINITY;
    let mut best_face = 0;

    for face in 0..vertices.len() {
        let normal = normals[face];
        let origin = vertices[face];

        // Support distance of the other polygon against this face
        let mut lowest = f32::INFINITY;
        for vertex in other {
            lowest = lowest.min(normal.dot(*vertex - origin));
        }

        if lowest > best {
            best = lowest;
            best_face = face;
        }
    }

    (best, best_face)
}

/// Clip a segment against the half-plane `normal · p − offset ≤ 0`.
///
/// An interpolated point takes over the identity of the vertex it replaced.
fn clip_segment(
    points: [ClipVertex; 2],
    normal: Vec2<f32>,
    offset: f32,
) -> Option<[ClipVertex; 2]> {
    let distance0 = normal.dot(points[0].point) - offset;
    let distance1 = normal.dot(points[1].point) - offset;

    match (distance0 <= 0.0, distance1 <= 0.0) {
        (true, true) => Some(points),
        (false, false) => None,
        (keep_first, _) => {
            let t = distance0 / (distance0 - distance1);
            let intersection = ClipVertex {
                point: points[0].point + (points[1].point - points[0].point) * t,
                vertex: if keep_first {
                    points[1].vertex
                } else {
                    points[0].vertex
                },
            };

            if keep_first {
                Some([points[0], intersection])
            } else {
                Some([intersection, points[1]])
            }
        }
    }
}
