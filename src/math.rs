use glam::{Mat3, Mat4, Vec3};

use crate::options::{Camera, Model, Projection};

/// `translate · rotate · scale` for the scene-level model transform.
pub fn model_matrix(model: &Model) -> Mat4 {
    Mat4::from_translation(model.translation)
        * Mat4::from_quat(model.rotation)
        * Mat4::from_scale(model.scale)
}

/// Camera transform. The translation is applied outside the rotation, which
/// together with the "greater is closer" depth convention keeps nearer
/// fragments winning the depth test.
pub fn view_matrix(camera: &Camera) -> Mat4 {
    Mat4::from_translation(-camera.translation)
        * Mat4::from_quat(camera.rotation)
        * Mat4::from_scale(camera.scale)
}

pub fn projection_matrix(camera: &Camera, width: u32, height: u32) -> Mat4 {
    let aspect = width as f32 / height as f32;
    match camera.mode {
        Projection::Perspective => {
            Mat4::perspective_rh_gl(camera.fov.to_radians(), aspect, camera.znear, camera.zfar)
        }
        Projection::Orthographic => {
            Mat4::orthographic_rh_gl(-aspect, aspect, -1.0, 1.0, camera.znear, camera.zfar)
        }
    }
}

/// Maps an object-space position to viewport coordinates: `x`/`y` in pixels,
/// `z` as window depth in `[0, 1]`.
pub fn project(position: Vec3, modelview: Mat4, projection: Mat4, width: f32, height: f32) -> Vec3 {
    let clip = projection * modelview * position.extend(1.0);
    let ndc = clip / clip.w;
    Vec3::new(
        width * (ndc.x + 1.0) * 0.5,
        height * (ndc.y + 1.0) * 0.5,
        (ndc.z + 1.0) * 0.5,
    )
}

/// Row-vector product `v · m`, the transform the vertex stages apply to
/// normals and tangents.
pub fn vec_mul_mat3(v: Vec3, m: Mat3) -> Vec3 {
    m.transpose() * v
}

/// Barycentric coordinates of `p` against the triangle `(a, b, c)`, using
/// only the x/y components. Degenerate triangles yield non-finite
/// coordinates, which fail the coverage test downstream.
pub fn barycentric(a: Vec3, b: Vec3, c: Vec3, p: Vec3) -> Vec3 {
    let v0 = b - a;
    let v1 = c - a;
    let denom = v0.x * v1.y - v1.x * v0.y;

    let v2 = p - a;
    let v = (v2.x * v1.y - v1.x * v2.y) / denom;
    let w = (v0.x * v2.y - v2.x * v0.y) / denom;
    Vec3::new(1.0 - v - w, v, w)
}

pub fn in_bounds(x: i32, y: i32, width: u32, height: u32) -> bool {
    x >= 0 && (x as u32) < width && y >= 0 && (y as u32) < height
}

/// True when at least one vertex of the projected triangle lands inside the
/// framebuffer rectangle.
pub fn triangle_visible(tri: &[Vec3; 3], width: u32, height: u32) -> bool {
    tri.iter()
        .any(|v| in_bounds(v.x as i32, v.y as i32, width, height))
}

/// Integer bounding box of the projected triangle, clamped to the
/// framebuffer: `(left, bottom, right, top)`, all inclusive.
pub fn triangle_bounds(tri: &[Vec3; 3], width: u32, height: u32) -> (i32, i32, i32, i32) {
    let left = tri[0].x.min(tri[1].x).min(tri[2].x) as i32;
    let right = tri[0].x.max(tri[1].x).max(tri[2].x) as i32;
    let bottom = tri[0].y.min(tri[1].y).min(tri[2].y) as i32;
    let top = tri[0].y.max(tri[1].y).max(tri[2].y) as i32;

    (
        left.max(0),
        bottom.max(0),
        right.min(width as i32 - 1),
        top.min(height as i32 - 1),
    )
}

/// Sign of the doubled signed area of the projected triangle. Positive means
/// the triangle is back-facing under the default camera orientation.
pub fn backfacing(tri: &[Vec3; 3]) -> bool {
    let [a, b, c] = *tri;
    a.x * b.y - a.y * b.x + b.x * c.y - b.y * c.x + c.x * a.y - c.y * a.x > 0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn barycentric_of_vertices_and_centroid() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(4.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 4.0, 0.0);

        let at_a = barycentric(a, b, c, a);
        assert!((at_a - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);

        let centroid = (a + b + c) / 3.0;
        let at_centroid = barycentric(a, b, c, centroid);
        assert!((at_centroid - Vec3::splat(1.0 / 3.0)).length() < 1e-6);
    }

    #[test]
    fn barycentric_outside_is_negative() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(4.0, 0.0, 0.0);
        let c = Vec3::new(0.0, 4.0, 0.0);
        let bar = barycentric(a, b, c, Vec3::new(-1.0, -1.0, 1.0));
        assert!(bar.min_element() < 0.0);
    }

    #[test]
    fn backfacing_flips_with_winding() {
        let ccw = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        ];
        let cw = [ccw[0], ccw[2], ccw[1]];
        assert!(backfacing(&ccw));
        assert!(!backfacing(&cw));
    }

    #[test]
    fn bounds_clamp_to_framebuffer() {
        let tri = [
            Vec3::new(-3.5, -1.0, 0.0),
            Vec3::new(10.0, 2.0, 0.0),
            Vec3::new(2.0, 9.0, 0.0),
        ];
        assert_eq!(triangle_bounds(&tri, 8, 8), (0, 0, 7, 7));
    }

    #[test]
    fn triangle_visibility_checks_each_vertex() {
        let inside = [
            Vec3::new(-5.0, -5.0, 0.0),
            Vec3::new(2.0, 2.0, 0.0),
            Vec3::new(20.0, 20.0, 0.0),
        ];
        let outside = [
            Vec3::new(-5.0, -5.0, 0.0),
            Vec3::new(-2.0, 2.0, 0.0),
            Vec3::new(20.0, 20.0, 0.0),
        ];
        assert!(triangle_visible(&inside, 8, 8));
        assert!(!triangle_visible(&outside, 8, 8));
    }

    #[test]
    fn project_maps_view_center_to_screen_center() {
        let camera = Camera {
            translation: Vec3::new(0.0, 0.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::PI),
            ..Camera::default()
        };
        let view = view_matrix(&camera);
        let projection = projection_matrix(&camera, 8, 8);
        let screen = project(Vec3::ZERO, view, projection, 8.0, 8.0);
        assert!((screen.x - 4.0).abs() < 1e-4);
        assert!((screen.y - 4.0).abs() < 1e-4);
        assert!(screen.z > 0.0 && screen.z < 1.0);
    }

    #[test]
    fn nearer_points_get_greater_depth() {
        let camera = Camera {
            translation: Vec3::new(0.0, 0.0, 3.0),
            rotation: Quat::from_rotation_y(std::f32::consts::PI),
            ..Camera::default()
        };
        let view = view_matrix(&camera);
        let projection = projection_matrix(&camera, 8, 8);
        let near = project(Vec3::new(0.0, 0.0, 1.0), view, projection, 8.0, 8.0);
        let far = project(Vec3::new(0.0, 0.0, -1.0), view, projection, 8.0, 8.0);
        assert!(near.z > far.z);
    }

    #[test]
    fn vec_mul_mat3_matches_row_vector_product() {
        let m = Mat3::from_cols(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        );
        let v = Vec3::new(1.0, 0.0, 0.0);
        // v · m picks the first column's components.
        assert_eq!(vec_mul_mat3(v, m), Vec3::new(1.0, 4.0, 7.0));
    }
}
