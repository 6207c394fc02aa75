//! Camera and transform helpers.
//!
//! Conventions:
//! - left-handed world space, +Y up, camera looks down +Z of view space
//! - column-major `glam::Mat4`, multiplied as `proj * view * model * v`
//! - clip-space depth range chosen per backend (`DepthRange`)

use glam::{Mat4, Vec3, Vec4};

/// Clip-space depth range of the rendering backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DepthRange {
    /// Direct3D / Metal / Vulkan / wgpu: z in `[0, 1]`.
    ZeroToOne,
    /// OpenGL: z in `[-1, 1]`.
    NegOneToOne,
}

impl DepthRange {
    pub fn from_homogeneous(homogeneous_depth: bool) -> Self {
        if homogeneous_depth {
            DepthRange::NegOneToOne
        } else {
            DepthRange::ZeroToOne
        }
    }
}

/// View matrix looking from `eye` towards `at` with +Y up.
pub fn look_at(eye: Vec3, at: Vec3) -> Mat4 {
    Mat4::look_at_lh(eye, at, Vec3::Y)
}

/// Perspective projection from a vertical field of view in degrees.
pub fn perspective(fovy_deg: f32, aspect: f32, near: f32, far: f32, depth: DepthRange) -> Mat4 {
    match depth {
        DepthRange::ZeroToOne => Mat4::perspective_lh(fovy_deg.to_radians(), aspect, near, far),
        DepthRange::NegOneToOne => {
            // glam has no left-handed GL variant; same x/y scale, z remapped to [-1, 1].
            let y_scale = 1.0 / (fovy_deg.to_radians() * 0.5).tan();
            let x_scale = y_scale / aspect;
            let range = far - near;
            Mat4::from_cols(
                Vec4::new(x_scale, 0.0, 0.0, 0.0),
                Vec4::new(0.0, y_scale, 0.0, 0.0),
                Vec4::new(0.0, 0.0, (far + near) / range, 1.0),
                Vec4::new(0.0, 0.0, -2.0 * far * near / range, 0.0),
            )
        }
    }
}

/// Width over height. A zero height (minimized window) is treated as 1.
pub fn aspect_ratio(width: u32, height: u32) -> f32 {
    width as f32 / height.max(1) as f32
}

/// Model matrix: rotation about Y (radians) followed by a translation.
pub fn model_matrix(rotation_y: f32, translation: Vec3) -> Mat4 {
    Mat4::from_translation(translation) * Mat4::from_rotation_y(rotation_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ndc_depth(proj: Mat4, view_z: f32) -> f32 {
        let clip = proj * Vec4::new(0.0, 0.0, view_z, 1.0);
        clip.z / clip.w
    }

    #[test]
    fn aspect_is_width_over_height() {
        for (w, h) in [(640u32, 480u32), (1, 1), (1920, 1080), (3, 7), (4096, 1)] {
            assert_eq!(aspect_ratio(w, h), w as f32 / h as f32);
        }
    }

    #[test]
    fn aspect_with_zero_height_does_not_divide_by_zero() {
        assert_eq!(aspect_ratio(640, 0), 640.0);
    }

    #[test]
    fn zero_to_one_maps_near_and_far() {
        let p = perspective(60.0, 4.0 / 3.0, 0.1, 100.0, DepthRange::ZeroToOne);
        assert!(ndc_depth(p, 0.1).abs() < 1e-5);
        assert!((ndc_depth(p, 100.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn neg_one_to_one_maps_near_and_far() {
        let p = perspective(60.0, 4.0 / 3.0, 0.1, 100.0, DepthRange::NegOneToOne);
        assert!((ndc_depth(p, 0.1) + 1.0).abs() < 1e-4);
        assert!((ndc_depth(p, 100.0) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn depth_ranges_share_xy_scale() {
        let a = perspective(60.0, 1.5, 0.1, 100.0, DepthRange::ZeroToOne);
        let b = perspective(60.0, 1.5, 0.1, 100.0, DepthRange::NegOneToOne);
        assert!((a.x_axis.x - b.x_axis.x).abs() < 1e-6);
        assert!((a.y_axis.y - b.y_axis.y).abs() < 1e-6);
    }

    #[test]
    fn look_at_places_target_in_front_of_camera() {
        let view = look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        let target = view.transform_point3(Vec3::ZERO);
        assert!((target - Vec3::new(0.0, 0.0, 10.0)).length() < 1e-5);
    }

    #[test]
    fn zero_rotation_at_origin_is_identity() {
        assert_eq!(model_matrix(0.0, Vec3::ZERO), Mat4::IDENTITY);
    }

    #[test]
    fn homogeneous_flag_selects_range() {
        assert_eq!(DepthRange::from_homogeneous(true), DepthRange::NegOneToOne);
        assert_eq!(DepthRange::from_homogeneous(false), DepthRange::ZeroToOne);
    }
}
