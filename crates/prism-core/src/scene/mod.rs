// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The per-frame input consumed by the renderer.
//!
//! Scene-graph traversal happens outside the renderer: the application hands
//! over a flat list of [`DrawableItem`]s with world transforms already
//! resolved, plus the resolved [`LightState`].

use crate::asset::{DrawGroup, Geometry, Material, RenderTarget, Texture};
use crate::math::{LinearRgba, Mat4, Rect, Vec3};
use crate::memory::Handle;
use crate::renderer::api::FogKind;
use crate::renderer::light::LightState;

/// A view into the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World-to-view matrix.
    pub view: Mat4,
    /// View-to-clip matrix.
    pub projection: Mat4,
    /// World-space position of the eye.
    pub position: Vec3,
    /// Sub-rectangle of the output to draw into, if any.
    pub viewport: Option<Rect>,
}

impl Camera {
    /// A right-handed perspective camera looking from `eye` at `target`.
    pub fn perspective(
        fov_y_radians: f32,
        aspect: f32,
        near: f32,
        far: f32,
        eye: Vec3,
        target: Vec3,
    ) -> Self {
        Self {
            view: Mat4::look_at_rh(eye, target, Vec3::Y),
            projection: Mat4::perspective_rh_gl(fov_y_radians, aspect, near, far),
            position: eye,
            viewport: None,
        }
    }

    /// The combined world-to-clip matrix.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective(
            60.0_f32.to_radians(),
            1.0,
            0.1,
            100.0,
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
        )
    }
}

/// Flags computed per drawable that change the shader program.
///
/// These belong to the drawable rather than the material: one material may be
/// used by a skinned and an unskinned object in the same frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ObjectFeatures {
    /// Vertex skinning is applied.
    pub skinning: bool,
    /// Number of bones in the skeleton.
    pub bone_count: u32,
    /// Number of active morph targets.
    pub morph_targets: u32,
    /// Per-instance transforms are read from `instanceMatrix`.
    pub instancing: bool,
    /// Per-instance colors are read from `instanceColor`.
    pub instancing_color: bool,
}

/// One renderable unit considered for a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawableItem {
    /// Stable application id of the object.
    pub id: u64,
    /// Vertex data.
    pub geometry: Handle<Geometry>,
    /// Shading.
    pub material: Handle<Material>,
    /// Object-to-world transform.
    pub world: Mat4,
    /// Explicit ordering within a bucket; lower draws first.
    pub render_order: i32,
    /// Ordering inherited from an enclosing group; compared before `render_order`.
    pub group_order: i32,
    /// Optional sub-range of the geometry.
    pub group: Option<DrawGroup>,
    /// Hidden items are skipped.
    pub visible: bool,
    /// Rendered into shadow maps.
    pub cast_shadow: bool,
    /// Samples shadow maps.
    pub receive_shadow: bool,
    /// Program-relevant per-object flags.
    pub features: ObjectFeatures,
    /// Bone matrices when skinned.
    pub bone_matrices: Vec<Mat4>,
    /// Morph target weights.
    pub morph_influences: Vec<f32>,
    /// Instances drawn (1 for plain objects).
    pub instance_count: u32,
}

impl DrawableItem {
    /// Creates a visible, non-shadowed item.
    pub fn new(id: u64, geometry: Handle<Geometry>, material: Handle<Material>, world: Mat4) -> Self {
        Self {
            id,
            geometry,
            material,
            world,
            render_order: 0,
            group_order: 0,
            group: None,
            visible: true,
            cast_shadow: false,
            receive_shadow: false,
            features: ObjectFeatures::default(),
            bone_matrices: Vec::new(),
            morph_influences: Vec::new(),
            instance_count: 1,
        }
    }
}

/// Scene fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fog {
    /// The fog model.
    pub kind: FogKind,
    /// Fog color.
    pub color: LinearRgba,
    /// Start distance of linear fog.
    pub near: f32,
    /// End distance of linear fog.
    pub far: f32,
    /// Density of exponential fog.
    pub density: f32,
}

impl Fog {
    /// Linear fog between `near` and `far`.
    pub fn linear(color: LinearRgba, near: f32, far: f32) -> Self {
        Self {
            kind: FogKind::Linear,
            color,
            near,
            far,
            density: 0.0,
        }
    }

    /// Exponential squared fog.
    pub fn exp2(color: LinearRgba, density: f32) -> Self {
        Self {
            kind: FogKind::Exp2,
            color,
            near: 0.0,
            far: 0.0,
            density,
        }
    }
}

/// Everything the renderer needs to draw one frame.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    /// Items visible this frame, in traversal order.
    pub items: Vec<DrawableItem>,
    /// Resolved lights.
    pub lights: LightState,
    /// Clear color override.
    pub background: Option<LinearRgba>,
    /// Scene fog.
    pub fog: Option<Fog>,
    /// Environment map applied to materials without their own.
    pub environment: Option<Handle<Texture>>,
    /// Draws every item with this material instead of its own.
    pub override_material: Option<Handle<Material>>,
}

/// Where a frame is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputTarget {
    /// The default framebuffer.
    #[default]
    Screen,
    /// An application render target.
    RenderTarget(Handle<RenderTarget>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_camera_view_projection_maps_target_to_center() {
        let camera = Camera::default();
        let clip = camera.view_projection() * Vec3::ZERO.extend(1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-6);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-6);
    }
}
