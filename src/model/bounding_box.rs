//! Bounding-Box Geometry
//!
//! Authored hit-test shapes in slot-local space and the segment/point
//! queries run against them.
//!
//! # Segment query result codes
//!
//! | count | meaning                                              |
//! |-------|------------------------------------------------------|
//! | `-1`  | both endpoints inside, no real crossing              |
//! | `0`   | no intersection                                      |
//! | `1`   | one crossing, the segment ends inside                |
//! | `2`   | one crossing, the segment starts inside              |
//! | `>=3` | ordinary crossing; `count - 1` intersection points   |
//!
//! Callers choose which outputs to compute with [`HitOutputs`]. Angles in
//! `normals` are tangent-normal directions in radians: `x` belongs to the
//! first hit and `y` to the second.

use std::f32::consts::{FRAC_PI_2, PI};

use bitflags::bitflags;
use glam::Vec2;

use crate::errors::{Result, SinewError};

bitflags! {
    /// Which optional outputs a segment query should fill.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct HitOutputs: u8 {
        const POINT_A = 1 << 0;
        const POINT_B = 1 << 1;
        const NORMALS = 1 << 2;
        const ALL = Self::POINT_A.bits() | Self::POINT_B.bits() | Self::NORMALS.bits();
    }
}

/// Result of a segment query. Unrequested outputs stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentHit {
    pub count: i32,
    pub point_a: Option<Vec2>,
    pub point_b: Option<Vec2>,
    pub normals: Option<Vec2>,
}

impl SegmentHit {
    pub const NONE: Self = Self {
        count: 0,
        point_a: None,
        point_b: None,
        normals: None,
    };

    const CONTAINED: Self = Self {
        count: -1,
        point_a: None,
        point_b: None,
        normals: None,
    };

    #[inline]
    #[must_use]
    pub fn is_hit(&self) -> bool {
        self.count != 0
    }

    /// Number of distinct intersection points described by `count`.
    #[must_use]
    pub fn crossings(&self) -> usize {
        match self.count {
            c if c >= 3 => (c - 1) as usize,
            1 | 2 => 1,
            _ => 0,
        }
    }

    fn with_points(count: i32, a: Vec2, b: Vec2, normals: Vec2, outputs: HitOutputs) -> Self {
        Self {
            count,
            point_a: outputs.contains(HitOutputs::POINT_A).then_some(a),
            point_b: outputs.contains(HitOutputs::POINT_B).then_some(b),
            normals: outputs.contains(HitOutputs::NORMALS).then_some(normals),
        }
    }
}

// ============================================================================
// Free-standing queries
// ============================================================================

const OUT_LEFT: u8 = 1;
const OUT_RIGHT: u8 = 2;
const OUT_TOP: u8 = 4;
const OUT_BOTTOM: u8 = 8;

fn out_code(p: Vec2, min: Vec2, max: Vec2) -> u8 {
    let mut code = 0;
    if p.x < min.x {
        code |= OUT_LEFT;
    } else if p.x > max.x {
        code |= OUT_RIGHT;
    }
    if p.y < min.y {
        code |= OUT_TOP;
    } else if p.y > max.y {
        code |= OUT_BOTTOM;
    }
    code
}

fn strictly_inside(p: Vec2, min: Vec2, max: Vec2) -> bool {
    p.x > min.x && p.x < max.x && p.y > min.y && p.y < max.y
}

/// Cohen–Sutherland clip of segment `a`→`b` against the box `[min, max]`.
#[must_use]
pub fn rectangle_intersects_segment(
    a: Vec2,
    b: Vec2,
    min: Vec2,
    max: Vec2,
    outputs: HitOutputs,
) -> SegmentHit {
    let inside_a = strictly_inside(a, min, max);
    let inside_b = strictly_inside(b, min, max);
    if inside_a && inside_b {
        return SegmentHit::CONTAINED;
    }

    let (mut pa, mut pb) = (a, b);
    let mut code_a = out_code(pa, min, max);
    let mut code_b = out_code(pb, min, max);
    let mut normals = Vec2::ZERO;
    let mut accepted = false;

    loop {
        if code_a | code_b == 0 {
            accepted = true;
            break;
        }
        if code_a & code_b != 0 {
            break;
        }

        let code = if code_a != 0 { code_a } else { code_b };
        let (point, normal) = if code & OUT_TOP != 0 {
            let x = pa.x + (pb.x - pa.x) * (min.y - pa.y) / (pb.y - pa.y);
            (Vec2::new(x, min.y), -FRAC_PI_2)
        } else if code & OUT_BOTTOM != 0 {
            let x = pa.x + (pb.x - pa.x) * (max.y - pa.y) / (pb.y - pa.y);
            (Vec2::new(x, max.y), FRAC_PI_2)
        } else if code & OUT_RIGHT != 0 {
            let y = pa.y + (pb.y - pa.y) * (max.x - pa.x) / (pb.x - pa.x);
            (Vec2::new(max.x, y), 0.0)
        } else {
            let y = pa.y + (pb.y - pa.y) * (min.x - pa.x) / (pb.x - pa.x);
            (Vec2::new(min.x, y), PI)
        };

        if code == code_a {
            pa = point;
            code_a = out_code(pa, min, max);
            normals.x = normal;
        } else {
            pb = point;
            code_b = out_code(pb, min, max);
            normals.y = normal;
        }
    }

    if !accepted {
        return SegmentHit::NONE;
    }

    if inside_a {
        // Only the exit point is real.
        normals.x = normals.y + PI;
        SegmentHit::with_points(2, pb, pb, normals, outputs)
    } else if inside_b {
        normals.y = normals.x + PI;
        SegmentHit::with_points(1, pa, pa, normals, outputs)
    } else {
        SegmentHit::with_points(3, pa, pb, normals, outputs)
    }
}

/// Intersects segment `a`→`b` with the origin-centred ellipse of the
/// given half extents.
#[must_use]
pub fn ellipse_intersects_segment(
    a: Vec2,
    b: Vec2,
    width_half: f32,
    height_half: f32,
    outputs: HitOutputs,
) -> SegmentHit {
    let d = width_half / height_half;
    let dd = d * d;
    let rr = width_half * width_half;

    // Stretch Y so the ellipse becomes a circle of radius `width_half`.
    let sa = Vec2::new(a.x, a.y * d);
    let sb = Vec2::new(b.x, b.y * d);

    let delta = sb - sa;
    let l_ab = delta.length();
    if l_ab <= 0.0 {
        return SegmentHit::NONE;
    }
    let dir = delta / l_ab;

    let along = -sa.dot(dir);
    let discriminant = rr - sa.length_squared() + along * along;
    if discriminant < 0.0 {
        return SegmentHit::NONE;
    }

    let root = discriminant.sqrt();
    let s_a = along - root;
    let s_b = along + root;
    let side = |s: f32| -> i32 {
        if s < 0.0 {
            -1
        } else if s <= l_ab {
            0
        } else {
            1
        }
    };
    let side_a = side(s_a);
    let side_b = side(s_b);

    let at = |s: f32| -> Vec2 {
        let p = sa + dir * s;
        Vec2::new(p.x, p.y / d)
    };
    let normal_at = |p: Vec2| -> f32 { (p.y / rr * dd).atan2(p.x / rr) };

    match side_a * side_b {
        n if n < 0 => SegmentHit::CONTAINED,
        0 => {
            if side_a == -1 {
                let p = at(s_b);
                let n = normal_at(p);
                SegmentHit::with_points(2, p, p, Vec2::new(n, n + PI), outputs)
            } else if side_b == 1 {
                let p = at(s_a);
                let n = normal_at(p);
                SegmentHit::with_points(1, p, p, Vec2::new(n, n + PI), outputs)
            } else {
                let pa = at(s_a);
                let pb = at(s_b);
                SegmentHit::with_points(
                    3,
                    pa,
                    pb,
                    Vec2::new(normal_at(pa), normal_at(pb)),
                    outputs,
                )
            }
        }
        _ => SegmentHit::NONE,
    }
}

/// Intersects segment `a`→`b` with every edge of a closed vertex ring,
/// keeping the hits nearest to and farthest from `a`.
#[must_use]
pub fn polygon_intersects_segment(
    a: Vec2,
    b: Vec2,
    vertices: &[Vec2],
    outputs: HitOutputs,
) -> SegmentHit {
    let Some(&last) = vertices.last() else {
        return SegmentHit::NONE;
    };

    let (mut xa, mut ya) = (a.x, a.y);
    if xa == b.x {
        xa = b.x + 0.000_001;
    }
    if ya == b.y {
        ya = b.y + 0.000_001;
    }
    let (xb, yb) = (b.x, b.y);
    let start = Vec2::new(xa, ya);

    let dx_ab = xa - xb;
    let dy_ab = ya - yb;
    let l_ab = xa * yb - ya * xb;

    let mut hits = 0;
    let mut near = Vec2::ZERO;
    let mut far = Vec2::ZERO;
    let mut d_near = 0.0_f32;
    let mut d_far = 0.0_f32;
    let mut normals = Vec2::ZERO;

    let (mut xc, mut yc) = (last.x, last.y);
    for vertex in vertices {
        let (xd, yd) = (vertex.x, vertex.y);
        if xc == xd {
            xc = xd + 0.0001;
        }
        if yc == yd {
            yc = yd + 0.0001;
        }

        let dx_cd = xc - xd;
        let dy_cd = yc - yd;
        let l_cd = xc * yd - yc * xd;
        let ll = dx_ab * dy_cd - dy_ab * dx_cd;
        let x = (l_ab * dx_cd - dx_ab * l_cd) / ll;

        let on_edge_x = (x >= xc && x <= xd) || (x >= xd && x <= xc);
        let on_segment_x = dx_ab == 0.0 || (x >= xa && x <= xb) || (x >= xb && x <= xa);
        if on_edge_x && on_segment_x {
            let y = (l_ab * dy_cd - dy_ab * l_cd) / ll;
            let on_edge_y = (y >= yc && y <= yd) || (y >= yd && y <= yc);
            let on_segment_y = dy_ab == 0.0 || (y >= ya && y <= yb) || (y >= yb && y <= ya);
            if on_edge_y && on_segment_y {
                let point = Vec2::new(x, y);
                let distance = point.distance(start);
                let normal = (yd - yc).atan2(xd - xc) - FRAC_PI_2;

                if hits == 0 {
                    d_near = distance;
                    d_far = distance;
                    near = point;
                    far = point;
                    normals = Vec2::splat(normal);
                } else {
                    if distance < d_near {
                        d_near = distance;
                        near = point;
                        normals.x = normal;
                    }
                    if distance > d_far {
                        d_far = distance;
                        far = point;
                        normals.y = normal;
                    }
                }
                hits += 1;
            }
        }

        xc = xd;
        yc = yd;
    }

    match hits {
        0 => SegmentHit::NONE,
        1 => {
            normals.y = normals.x + PI;
            SegmentHit::with_points(1, near, near, normals, outputs)
        }
        n => SegmentHit::with_points(n + 1, near, far, normals, outputs),
    }
}

// ============================================================================
// Shapes
// ============================================================================

/// Common query surface of every bounding-box shape.
pub trait BoundingShape {
    /// Tests a point in slot-local space.
    fn contains_point(&self, point: Vec2) -> bool;

    /// Tests a segment in slot-local space.
    fn intersects_segment(&self, a: Vec2, b: Vec2, outputs: HitOutputs) -> SegmentHit;
}

/// Origin-centred axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectangleBoundingBox {
    pub width: f32,
    pub height: f32,
}

impl BoundingShape for RectangleBoundingBox {
    fn contains_point(&self, point: Vec2) -> bool {
        let half = Vec2::new(self.width, self.height) * 0.5;
        point.x >= -half.x && point.x <= half.x && point.y >= -half.y && point.y <= half.y
    }

    fn intersects_segment(&self, a: Vec2, b: Vec2, outputs: HitOutputs) -> SegmentHit {
        let half = Vec2::new(self.width, self.height) * 0.5;
        rectangle_intersects_segment(a, b, -half, half, outputs)
    }
}

/// Origin-centred axis-aligned ellipse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EllipseBoundingBox {
    pub width: f32,
    pub height: f32,
}

impl BoundingShape for EllipseBoundingBox {
    fn contains_point(&self, point: Vec2) -> bool {
        let width_half = self.width * 0.5;
        let height_half = self.height * 0.5;
        if point.x < -width_half || point.x > width_half {
            return false;
        }
        if point.y < -height_half || point.y > height_half {
            return false;
        }
        let scaled = Vec2::new(point.x, point.y * width_half / height_half);
        scaled.length() <= width_half
    }

    fn intersects_segment(&self, a: Vec2, b: Vec2, outputs: HitOutputs) -> SegmentHit {
        ellipse_intersects_segment(a, b, self.width * 0.5, self.height * 0.5, outputs)
    }
}

/// Closed vertex ring with its precomputed bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonBoundingBox {
    x: f32,
    y: f32,
    width: f32,
    height: f32,
    vertices: Vec<Vec2>,
}

impl PolygonBoundingBox {
    pub fn new(vertices: Vec<Vec2>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(SinewError::DegeneratePolygon(vertices.len()));
        }

        let (min, max) = vertices.iter().fold(
            (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
            |(min, max), v| (min.min(*v), max.max(*v)),
        );

        Ok(Self {
            x: min.x,
            y: min.y,
            width: max.x - min.x,
            height: max.y - min.y,
            vertices,
        })
    }

    #[must_use]
    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices
    }

    #[must_use]
    pub fn min(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[must_use]
    pub fn max(&self) -> Vec2 {
        Vec2::new(self.x + self.width, self.y + self.height)
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.height
    }
}

impl BoundingShape for PolygonBoundingBox {
    fn contains_point(&self, point: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        if point.x < min.x || point.x > max.x || point.y < min.y || point.y > max.y {
            return false;
        }

        let mut inside = false;
        let mut prev = self.vertices[self.vertices.len() - 1];
        for &curr in &self.vertices {
            if (curr.y < point.y && prev.y >= point.y) || (prev.y < point.y && curr.y >= point.y) {
                let cross_x = (point.y - curr.y) * (prev.x - curr.x) / (prev.y - curr.y) + curr.x;
                if cross_x < point.x {
                    inside = !inside;
                }
            }
            prev = curr;
        }
        inside
    }

    fn intersects_segment(&self, a: Vec2, b: Vec2, outputs: HitOutputs) -> SegmentHit {
        let bounds = rectangle_intersects_segment(a, b, self.min(), self.max(), HitOutputs::empty());
        if bounds.count == 0 {
            return SegmentHit::NONE;
        }

        let hit = polygon_intersects_segment(a, b, &self.vertices, outputs);
        if hit.count == 0 && self.contains_point(a) && self.contains_point(b) {
            return SegmentHit::CONTAINED;
        }
        hit
    }
}

/// Authored bounding box attached to a slot display.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundingBoxData {
    Rectangle(RectangleBoundingBox),
    Ellipse(EllipseBoundingBox),
    Polygon(PolygonBoundingBox),
}

impl BoundingBoxData {
    #[must_use]
    pub fn rectangle(width: f32, height: f32) -> Self {
        Self::Rectangle(RectangleBoundingBox { width, height })
    }

    #[must_use]
    pub fn ellipse(width: f32, height: f32) -> Self {
        Self::Ellipse(EllipseBoundingBox { width, height })
    }

    pub fn polygon(vertices: Vec<Vec2>) -> Result<Self> {
        PolygonBoundingBox::new(vertices).map(Self::Polygon)
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        match self {
            Self::Rectangle(r) => r.width,
            Self::Ellipse(e) => e.width,
            Self::Polygon(p) => p.width,
        }
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        match self {
            Self::Rectangle(r) => r.height,
            Self::Ellipse(e) => e.height,
            Self::Polygon(p) => p.height,
        }
    }

    fn shape(&self) -> &dyn BoundingShape {
        match self {
            Self::Rectangle(r) => r,
            Self::Ellipse(e) => e,
            Self::Polygon(p) => p,
        }
    }
}

impl BoundingShape for BoundingBoxData {
    fn contains_point(&self, point: Vec2) -> bool {
        self.shape().contains_point(point)
    }

    fn intersects_segment(&self, a: Vec2, b: Vec2, outputs: HitOutputs) -> SegmentHit {
        self.shape().intersects_segment(a, b, outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_codes_follow_region_layout() {
        let (min, max) = (Vec2::splat(-1.0), Vec2::splat(1.0));
        assert_eq!(out_code(Vec2::ZERO, min, max), 0);
        assert_eq!(out_code(Vec2::new(-2.0, 0.0), min, max), OUT_LEFT);
        assert_eq!(out_code(Vec2::new(2.0, 2.0), min, max), OUT_RIGHT | OUT_BOTTOM);
        assert_eq!(out_code(Vec2::new(0.0, -2.0), min, max), OUT_TOP);
    }

    #[test]
    fn clipped_exit_point_keeps_its_own_y() {
        let hit = rectangle_intersects_segment(
            Vec2::new(0.0, 0.5),
            Vec2::new(3.0, 0.5),
            Vec2::splat(-1.0),
            Vec2::splat(1.0),
            HitOutputs::ALL,
        );
        assert_eq!(hit.count, 2);
        assert_eq!(hit.point_b, Some(Vec2::new(1.0, 0.5)));
    }

    #[test]
    fn zero_length_ellipse_segment_misses() {
        let hit = ellipse_intersects_segment(Vec2::ONE, Vec2::ONE, 1.0, 1.0, HitOutputs::ALL);
        assert_eq!(hit, SegmentHit::NONE);
    }

    #[test]
    fn polygon_needs_three_vertices() {
        assert!(PolygonBoundingBox::new(vec![Vec2::ZERO, Vec2::X]).is_err());
    }

    #[test]
    fn crossings_from_count() {
        let mut hit = SegmentHit::NONE;
        assert_eq!(hit.crossings(), 0);
        hit.count = -1;
        assert_eq!(hit.crossings(), 0);
        hit.count = 2;
        assert_eq!(hit.crossings(), 1);
        hit.count = 3;
        assert_eq!(hit.crossings(), 2);
    }
}
