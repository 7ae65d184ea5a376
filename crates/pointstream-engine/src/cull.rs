//! Frustum culling and per-frame block priorities.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

use pointstream_core::{Aabb, Block};

/// A plane `dot(n, x) + d = 0` with unit-length `n`; `>= 0` is inside.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub n: Vec3,
    pub d: f32,
}

impl Plane {
    /// Normalize `(a, b, c, d)` row coefficients into a plane.
    pub fn from_coefficients(v: Vec4) -> Self {
        let len = v.xyz().length();
        Self {
            n: v.xyz() / len,
            d: v.w / len,
        }
    }

    #[inline]
    pub fn signed_distance(&self, p: Vec3) -> f32 {
        self.n.dot(p) + self.d
    }
}

/// The six view-space frustum planes of a projection matrix.
///
/// Gribb–Hartmann extraction: sums and differences of the rows of `P`
/// (glam is column-major, so `row(i)` reads across the transpose). The
/// projection must use a [-1, 1] clip range (`Mat4::perspective_rh_gl`).
/// Blocks tested against these planes must first be transformed into view
/// space.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    /// left, right, bottom, top, near, far
    pub planes: [Plane; 6],
}

impl Frustum {
    pub fn from_projection(proj: &Mat4) -> Self {
        let r0 = proj.row(0);
        let r1 = proj.row(1);
        let r2 = proj.row(2);
        let r3 = proj.row(3);
        Self {
            planes: [
                Plane::from_coefficients(r3 + r0),
                Plane::from_coefficients(r3 - r0),
                Plane::from_coefficients(r3 + r1),
                Plane::from_coefficients(r3 - r1),
                Plane::from_coefficients(r3 + r2),
                Plane::from_coefficients(r3 - r2),
            ],
        }
    }

    /// Smallest signed distance of the box's positive vertices to the
    /// planes. Negative means the box is entirely outside some plane.
    pub fn min_signed_distance(&self, aabb: &Aabb) -> f32 {
        let mut min_dist = f32::MAX;
        for plane in &self.planes {
            let dist = plane.signed_distance(aabb.positive_vertex(plane.n));
            min_dist = min_dist.min(dist);
        }
        min_dist
    }
}

/// Rebuild an AABB around the view-space images of the corners of `aabb`.
fn view_space_aabb(aabb: &Aabb, view: &Mat4) -> Aabb {
    let mut out = Aabb::empty();
    for corner in aabb.corners() {
        out.expand(view.transform_point3(corner));
    }
    out
}

/// Cull every block against the frustum and refresh its priority scalars.
///
/// Only the per-frame scalars are written; block geometry is never touched.
/// Returns the visible count.
pub fn cull_blocks(
    blocks: &mut [Block],
    view: &Mat4,
    frustum: &Frustum,
    z_near: f32,
    z_far: f32,
) -> usize {
    let frustum_center = Vec3::new(0.0, 0.0, -(z_near + z_far) * 0.5);
    let mut visible = 0;
    for block in blocks.iter_mut() {
        let view_aabb = view_space_aabb(&block.aabb, view);
        let min_dist = frustum.min_signed_distance(&view_aabb);
        block.min_plane_dist = min_dist;
        block.is_visible = min_dist >= 0.0;
        if block.is_visible {
            let center = view_aabb.center();
            block.dist_to_camera = center.length();
            block.dist_to_frustum_center = (center - frustum_center).length();
            visible += 1;
        }
    }
    visible
}

/// Indices of `blocks` in slot-priority order.
///
/// Visible blocks first, nearest to the camera leading; culled blocks
/// after, least-rejected first, so they are the first to stream in when the
/// camera turns. The sort is stable: equal keys keep their block order.
pub fn order_blocks(blocks: &[Block]) -> Vec<usize> {
    use std::cmp::Ordering;

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by(|&ia, &ib| {
        let a = &blocks[ia];
        let b = &blocks[ib];
        match (a.is_visible, b.is_visible) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (true, true) => a
                .dist_to_camera
                .partial_cmp(&b.dist_to_camera)
                .unwrap_or(Ordering::Equal),
            (false, false) => b
                .min_plane_dist
                .partial_cmp(&a.min_plane_dist)
                .unwrap_or(Ordering::Equal),
        }
    });
    order
}
