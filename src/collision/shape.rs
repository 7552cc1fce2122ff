//! Collision shapes and their mass properties.

use std::f32::consts::PI;

use arrayvec::ArrayVec;
use itertools::Itertools;
use serde::Deserialize;
use thiserror::Error;
use vek::{Aabr, Extent2, Vec2};

use crate::math::{perp, perp_dot, Iso};

/// Maximum amount of vertices a polygon shape can have.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Inline vertex list of a polygon shape.
pub type Vertices = ArrayVec<Vec2<f32>, MAX_POLYGON_VERTICES>;

/// Everything that can go wrong when constructing or mutating a shape.
#[derive(Debug, Error)]
pub enum ShapeError {
    /// Circle radius is zero or negative.
    #[error("circle radius must be strictly positive, got {0}")]
    InvalidRadius(f32),
    /// Rectangle extents are zero or negative.
    #[error("rectangle extents must be strictly positive, got {0}x{1}")]
    InvalidExtent(f32, f32),
    /// Not enough points to form a polygon.
    #[error("a polygon needs at least 3 points, got {0}")]
    NotEnoughPoints(usize),
    /// More points than the inline vertex storage can hold.
    #[error("a polygon supports at most 8 points, got {0}")]
    TooManyPoints(usize),
    /// The points collapse to a hull with fewer than 3 vertices.
    #[error("points are degenerate, the convex hull has fewer than 3 vertices")]
    DegenerateHull,
}

/// Surface properties of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Material {
    /// Mass per square unit.
    pub density: f32,
    /// Coulomb friction coefficient.
    pub friction: f32,
    /// Bounciness in `[0, 1]`.
    pub restitution: f32,
}

impl Material {
    /// Construct a new material, clamping all values into their valid ranges.
    pub fn new(density: f32, friction: f32, restitution: f32) -> Self {
        let density = density.max(0.0);
        let friction = friction.max(0.0);
        let restitution = restitution.clamp(0.0, 1.0);

        Self {
            density,
            friction,
            restitution,
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.5,
            restitution: 0.0,
        }
    }
}

/// Geometry of a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    /// A circle around the body origin.
    Circle {
        /// Radius of the circle.
        radius: f32,
    },
    /// A convex polygon around the body origin.
    Polygon {
        /// Hull vertices, wound counter-clockwise in screen space.
        vertices: Vertices,
        /// Outward unit normal per edge, `normals[i]` belongs to the edge
        /// from `vertices[i - 1]` to `vertices[i]`.
        normals: Vertices,
    },
}

/// Convex collision shape with a material and a cached area.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Surface properties.
    material: Material,
    /// The geometry itself.
    kind: ShapeKind,
    /// Cached surface area.
    area: f32,
}

impl Shape {
    /// Create a circle.
    pub fn circle(material: Material, radius: f32) -> Result<Self, ShapeError> {
        if radius <= 0.0 {
            return Err(ShapeError::InvalidRadius(radius));
        }

        let kind = ShapeKind::Circle { radius };
        let area = PI * radius * radius;

        Ok(Self {
            material,
            kind,
            area,
        })
    }

    /// Create an axis-aligned rectangle from its full extents.
    pub fn rectangle(material: Material, size: Extent2<f32>) -> Result<Self, ShapeError> {
        if size.w <= 0.0 || size.h <= 0.0 {
            return Err(ShapeError::InvalidExtent(size.w, size.h));
        }

        let kind = rectangle_kind(size);
        let area = polygon_area(kind_vertices(&kind));

        Ok(Self {
            material,
            kind,
            area,
        })
    }

    /// Create a convex polygon from an unordered point set.
    ///
    /// The points are reduced to their convex hull; collinear and duplicate
    /// points are dropped in the process.
    pub fn polygon(material: Material, points: &[Vec2<f32>]) -> Result<Self, ShapeError> {
        let kind = polygon_kind(points)?;
        let area = polygon_area(kind_vertices(&kind));

        Ok(Self {
            material,
            kind,
            area,
        })
    }

    /// Surface properties.
    pub fn material(&self) -> Material {
        self.material
    }

    /// Replace the surface properties.
    pub fn set_material(&mut self, material: Material) {
        self.material = material;
    }

    /// The geometry of this shape.
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Cached surface area.
    pub fn area(&self) -> f32 {
        self.area
    }

    /// Mass according to the material density.
    pub fn mass(&self) -> f32 {
        self.material.density * self.area
    }

    /// Moment of inertia around the body origin for a given mass.
    pub fn inertia(&self, mass: f32) -> f32 {
        match &self.kind {
            ShapeKind::Circle { radius } => 0.5 * mass * radius * radius,
            ShapeKind::Polygon { vertices, .. } => {
                let mut numerator = 0.0;
                let mut denominator = 0.0;
                for i in 0..vertices.len() {
                    let a = vertices[i];
                    let b = vertices[(i + 1) % vertices.len()];

                    let cross = perp_dot(a, b);
                    numerator += cross * (a.dot(a) + a.dot(b) + b.dot(b));
                    denominator += cross;
                }

                if denominator.abs() <= f32::EPSILON {
                    // Degenerate hull, treated as having infinite inverse inertia
                    0.0
                } else {
                    mass * numerator / (6.0 * denominator)
                }
            }
        }
    }

    /// Replace the radius of a circle shape.
    ///
    /// Does nothing for polygons.
    pub fn set_radius(&mut self, radius: f32) -> Result<(), ShapeError> {
        if radius <= 0.0 {
            return Err(ShapeError::InvalidRadius(radius));
        }

        if let ShapeKind::Circle { radius: r } = &mut self.kind {
            *r = radius;
            self.area = PI * radius * radius;
        }

        Ok(())
    }

    /// Replace the geometry with an axis-aligned rectangle.
    pub fn set_extent(&mut self, size: Extent2<f32>) -> Result<(), ShapeError> {
        if size.w <= 0.0 || size.h <= 0.0 {
            return Err(ShapeError::InvalidExtent(size.w, size.h));
        }

        self.kind = rectangle_kind(size);
        self.area = polygon_area(kind_vertices(&self.kind));

        Ok(())
    }

    /// Replace the geometry with the convex hull of a point set.
    pub fn set_points(&mut self, points: &[Vec2<f32>]) -> Result<(), ShapeError> {
        self.kind = polygon_kind(points)?;
        self.area = polygon_area(kind_vertices(&self.kind));

        Ok(())
    }

    /// Axis-aligned bounding box under a transform.
    pub fn aabr(&self, iso: Iso) -> Aabr<f32> {
        match &self.kind {
            ShapeKind::Circle { radius } => Aabr {
                min: iso.pos - Vec2::broadcast(*radius),
                max: iso.pos + Vec2::broadcast(*radius),
            },
            ShapeKind::Polygon { vertices, .. } => {
                let mut aabr = Aabr {
                    min: iso.translate(vertices[0]),
                    max: iso.translate(vertices[0]),
                };
                for vertex in vertices.iter().skip(1) {
                    let world = iso.translate(*vertex);
                    aabr.min.x = aabr.min.x.min(world.x);
                    aabr.min.y = aabr.min.y.min(world.y);
                    aabr.max.x = aabr.max.x.max(world.x);
                    aabr.max.y = aabr.max.y.max(world.y);
                }

                aabr
            }
        }
    }

    /// Whether a world-space point lies inside the shape under a transform.
    pub fn contains(&self, iso: Iso, point: Vec2<f32>) -> bool {
        match &self.kind {
            ShapeKind::Circle { radius } => {
                (point - iso.pos).magnitude_squared() <= radius * radius
            }
            ShapeKind::Polygon { vertices, normals } => {
                let local = iso.inv_translate(point);

                (0..vertices.len()).all(|i| normals[i].dot(local - vertices[i]) <= 0.0)
            }
        }
    }
}

/// Build the polygon geometry of an axis-aligned rectangle.
fn rectangle_kind(size: Extent2<f32>) -> ShapeKind {
    let half = Extent2::new(size.w / 2.0, size.h / 2.0);

    let mut vertices = Vertices::new();
    vertices.push(Vec2::new(-half.w, -half.h));
    vertices.push(Vec2::new(-half.w, half.h));
    vertices.push(Vec2::new(half.w, half.h));
    vertices.push(Vec2::new(half.w, -half.h));

    let normals = edge_normals(&vertices);

    ShapeKind::Polygon { vertices, normals }
}

/// Build the polygon geometry from the convex hull of a point set.
fn polygon_kind(points: &[Vec2<f32>]) -> Result<ShapeKind, ShapeError> {
    if points.len() < 3 {
        return Err(ShapeError::NotEnoughPoints(points.len()));
    }
    if points.len() > MAX_POLYGON_VERTICES {
        return Err(ShapeError::TooManyPoints(points.len()));
    }

    let vertices = convex_hull(points)?;
    let normals = edge_normals(&vertices);

    Ok(ShapeKind::Polygon { vertices, normals })
}

/// Reduce a point set to its convex hull with gift wrapping.
///
/// The hull is wound counter-clockwise in screen space (y down), so the left
/// perpendicular of every edge points outward.
fn convex_hull(points: &[Vec2<f32>]) -> Result<Vertices, ShapeError> {
    // Drop duplicates, they would stall the march
    let mut unique = Vertices::new();
    for point in points {
        if !unique
            .iter()
            .any(|other| other.distance_squared(*point) <= f32::EPSILON)
        {
            unique.push(*point);
        }
    }
    if unique.len() < 3 {
        return Err(ShapeError::DegenerateHull);
    }

    // The leftmost lowest point is always on the hull
    let start = unique
        .iter()
        .position_min_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)))
        .expect("point set can't be empty");

    let mut hull = Vertices::new();
    let mut current = start;
    loop {
        hull.push(unique[current]);

        // Wrap to the point all others lie to the right of
        let mut next = (current + 1) % unique.len();
        for candidate in 0..unique.len() {
            if candidate == current || candidate == next {
                continue;
            }

            let turn = perp_dot(
                unique[next] - unique[current],
                unique[candidate] - unique[current],
            );
            let farther = unique[current].distance_squared(unique[candidate])
                > unique[current].distance_squared(unique[next]);
            if turn > 0.0 || (turn == 0.0 && farther) {
                next = candidate;
            }
        }

        current = next;
        if current == start || hull.is_full() {
            break;
        }
    }

    if hull.len() < 3 {
        return Err(ShapeError::DegenerateHull);
    }

    Ok(hull)
}

/// Outward unit normal for every hull edge.
fn edge_normals(vertices: &Vertices) -> Vertices {
    let mut normals = Vertices::new();
    for i in 0..vertices.len() {
        let previous = vertices[(i + vertices.len() - 1) % vertices.len()];
        let edge = vertices[i] - previous;

        normals.push(perp(edge).normalized());
    }

    normals
}

/// Area of a convex polygon, independent of winding.
fn polygon_area(vertices: &Vertices) -> f32 {
    let mut doubled = 0.0;
    for i in 1..vertices.len() - 1 {
        doubled += perp_dot(
            vertices[i] - vertices[0],
            vertices[i + 1] - vertices[0],
        );
    }

    doubled.abs() / 2.0
}

/// Vertices of a polygon kind.
///
/// Panics when called on a circle, callers match first.
fn kind_vertices(kind: &ShapeKind) -> &Vertices {
    match kind {
        ShapeKind::Polygon { vertices, .. } => vertices,
        ShapeKind::Circle { .. } => unreachable!("circles have no vertices"),
    }
}
