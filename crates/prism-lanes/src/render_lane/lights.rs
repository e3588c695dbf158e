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

//! Flattens the resolved light state into the per-type uniform arrays read by
//! the lit shaders.

use super::uniforms::ProgramUniforms;
use prism_core::math::{LinearRgba, Mat4, Vec3};
use prism_core::renderer::light::{LightDescriptor, LightType};
use prism_core::renderer::{FloatLayout, GpuDriver, LightCounts, LightState};

/// The kind of shadow map a caster renders into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowKind {
    /// A single orthographic map.
    Directional,
    /// A single perspective map.
    Spot,
    /// Six faces packed into a 4x2 atlas.
    Point,
}

/// A shadow-casting light and the uniform slot its map is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowCaster {
    /// Map layout.
    pub kind: ShadowKind,
    /// Index in the per-kind shadow uniform arrays.
    pub slot: usize,
    /// Index of the light in [`LightState::lights`].
    pub light: usize,
}

#[derive(Debug, Default)]
struct LightArrays {
    ambient: [f32; 3],
    directional_direction: Vec<f32>,
    directional_color: Vec<f32>,
    point_position: Vec<f32>,
    point_color: Vec<f32>,
    point_distance: Vec<f32>,
    point_decay: Vec<f32>,
    spot_position: Vec<f32>,
    spot_direction: Vec<f32>,
    spot_color: Vec<f32>,
    spot_distance: Vec<f32>,
    spot_decay: Vec<f32>,
    spot_cone_cos: Vec<f32>,
    spot_penumbra_cos: Vec<f32>,
    hemi_direction: Vec<f32>,
    hemi_sky: Vec<f32>,
    hemi_ground: Vec<f32>,
    directional_shadow_bias: Vec<f32>,
    directional_shadow_radius: Vec<f32>,
    directional_shadow_size: Vec<f32>,
    directional_shadow_matrix: Vec<f32>,
    spot_shadow_bias: Vec<f32>,
    spot_shadow_radius: Vec<f32>,
    spot_shadow_size: Vec<f32>,
    spot_shadow_matrix: Vec<f32>,
    point_shadow_bias: Vec<f32>,
    point_shadow_size: Vec<f32>,
    point_shadow_near: Vec<f32>,
    point_shadow_far: Vec<f32>,
}

impl LightArrays {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

fn rgb(color: LinearRgba, intensity: f32) -> [f32; 3] {
    [color.r * intensity, color.g * intensity, color.b * intensity]
}

/// Maps a clip-space shadow position into shadow map texture space.
fn shadow_matrix(m: Option<&Mat4>) -> [f32; 16] {
    let bias = Mat4::from_translation(Vec3::splat(0.5)) * Mat4::from_scale(Vec3::splat(0.5));
    (bias * m.copied().unwrap_or(Mat4::IDENTITY)).to_cols_array()
}

/// The renderer-side light setup.
///
/// Its version changes when the application's light state version changes or
/// when the per-type counts change, and is part of every program context.
#[derive(Debug, Default)]
pub struct LightSetup {
    version: u64,
    seen: Option<(u64, LightCounts)>,
    counts: LightCounts,
    casters: Vec<ShadowCaster>,
    arrays: LightArrays,
}

impl LightSetup {
    /// Creates an empty setup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the arrays from `state`. Returns `true` if the version changed.
    pub fn update(&mut self, state: &LightState) -> bool {
        let counts = state.counts();
        let changed = self.seen != Some((state.version, counts));
        if changed {
            self.version += 1;
            self.seen = Some((state.version, counts));
            log::debug!("Light setup version {} ({counts:?})", self.version);
        }
        self.counts = counts;
        self.rebuild(state);
        changed
    }

    /// Forgets the last observed state so the next update bumps the version.
    pub fn invalidate(&mut self) {
        self.seen = None;
    }

    /// The renderer-side version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Light counts of the last update.
    pub fn counts(&self) -> LightCounts {
        self.counts
    }

    /// Shadow-casting lights in slot order.
    pub fn shadow_casters(&self) -> &[ShadowCaster] {
        &self.casters
    }

    fn rebuild(&mut self, state: &LightState) {
        self.arrays.reset();
        self.casters.clear();
        let a = &mut self.arrays;
        a.ambient = rgb(state.ambient, 1.0);

        // Shadow casters come first within each type so that slot `i` of the
        // shadow arrays matches light `i`.
        let ordered = state
            .lights
            .iter()
            .enumerate()
            .filter(|(_, l)| l.casts_shadow())
            .chain(state.lights.iter().enumerate().filter(|(_, l)| !l.casts_shadow()));

        let (mut dir_slot, mut spot_slot, mut point_slot) = (0, 0, 0);
        for (index, descriptor) in ordered {
            let LightDescriptor {
                light,
                position,
                shadow,
            } = descriptor;
            let shadow = shadow.as_ref().filter(|_| descriptor.casts_shadow());
            match light {
                LightType::Directional(l) => {
                    a.directional_direction
                        .extend_from_slice(&l.direction.normalize_or_zero().to_array());
                    a.directional_color.extend_from_slice(&rgb(l.color, l.intensity));
                    if let Some(s) = shadow {
                        a.directional_shadow_bias.push(s.bias);
                        a.directional_shadow_radius.push(s.radius);
                        a.directional_shadow_size
                            .extend_from_slice(&[s.map_size as f32, s.map_size as f32]);
                        a.directional_shadow_matrix
                            .extend_from_slice(&shadow_matrix(s.matrices.first()));
                        self.casters.push(ShadowCaster {
                            kind: ShadowKind::Directional,
                            slot: dir_slot,
                            light: index,
                        });
                        dir_slot += 1;
                    }
                }
                LightType::Point(l) => {
                    a.point_position.extend_from_slice(&position.to_array());
                    a.point_color.extend_from_slice(&rgb(l.color, l.intensity));
                    a.point_distance.push(l.range);
                    a.point_decay.push(l.decay);
                    if let Some(s) = shadow {
                        a.point_shadow_bias.push(s.bias);
                        a.point_shadow_size
                            .extend_from_slice(&[s.map_size as f32 * 4.0, s.map_size as f32 * 2.0]);
                        a.point_shadow_near.push(s.camera_near);
                        a.point_shadow_far.push(s.camera_far);
                        self.casters.push(ShadowCaster {
                            kind: ShadowKind::Point,
                            slot: point_slot,
                            light: index,
                        });
                        point_slot += 1;
                    }
                }
                LightType::Spot(l) => {
                    a.spot_position.extend_from_slice(&position.to_array());
                    a.spot_direction
                        .extend_from_slice(&l.direction.normalize_or_zero().to_array());
                    a.spot_color.extend_from_slice(&rgb(l.color, l.intensity));
                    a.spot_distance.push(l.range);
                    a.spot_decay.push(l.decay);
                    a.spot_cone_cos.push(l.outer_cone_angle.cos());
                    a.spot_penumbra_cos.push(l.inner_cone_angle.cos());
                    if let Some(s) = shadow {
                        a.spot_shadow_bias.push(s.bias);
                        a.spot_shadow_radius.push(s.radius);
                        a.spot_shadow_size
                            .extend_from_slice(&[s.map_size as f32, s.map_size as f32]);
                        a.spot_shadow_matrix.extend_from_slice(&shadow_matrix(s.matrices.first()));
                        self.casters.push(ShadowCaster {
                            kind: ShadowKind::Spot,
                            slot: spot_slot,
                            light: index,
                        });
                        spot_slot += 1;
                    }
                }
                LightType::Hemisphere(l) => {
                    a.hemi_direction
                        .extend_from_slice(&l.up.normalize_or_zero().to_array());
                    a.hemi_sky.extend_from_slice(&rgb(l.sky_color, l.intensity));
                    a.hemi_ground.extend_from_slice(&rgb(l.ground_color, l.intensity));
                }
            }
        }
    }

    /// Uploads every light uniform the program declares. Inactive names cost
    /// one location query per program.
    pub fn upload<D: GpuDriver + ?Sized>(&self, driver: &mut D, uniforms: &mut ProgramUniforms) {
        use FloatLayout::{Mat4, Scalar, Vec2, Vec3};
        let a = &self.arrays;
        uniforms.set_f32(driver, "ambientLightColor", Vec3, &a.ambient);

        let arrays: [(&str, FloatLayout, &[f32]); 28] = [
            ("directionalLightDirection", Vec3, &a.directional_direction[..]),
            ("directionalLightColor", Vec3, &a.directional_color[..]),
            ("pointLightPosition", Vec3, &a.point_position[..]),
            ("pointLightColor", Vec3, &a.point_color[..]),
            ("pointLightDistance", Scalar, &a.point_distance[..]),
            ("pointLightDecay", Scalar, &a.point_decay[..]),
            ("spotLightPosition", Vec3, &a.spot_position[..]),
            ("spotLightDirection", Vec3, &a.spot_direction[..]),
            ("spotLightColor", Vec3, &a.spot_color[..]),
            ("spotLightDistance", Scalar, &a.spot_distance[..]),
            ("spotLightDecay", Scalar, &a.spot_decay[..]),
            ("spotLightConeCos", Scalar, &a.spot_cone_cos[..]),
            ("spotLightPenumbraCos", Scalar, &a.spot_penumbra_cos[..]),
            ("hemisphereLightDirection", Vec3, &a.hemi_direction[..]),
            ("hemisphereLightSkyColor", Vec3, &a.hemi_sky[..]),
            ("hemisphereLightGroundColor", Vec3, &a.hemi_ground[..]),
            ("directionalShadowBias", Scalar, &a.directional_shadow_bias[..]),
            ("directionalShadowRadius", Scalar, &a.directional_shadow_radius[..]),
            ("directionalShadowMapSize", Vec2, &a.directional_shadow_size[..]),
            ("directionalShadowMatrix", Mat4, &a.directional_shadow_matrix[..]),
            ("spotShadowBias", Scalar, &a.spot_shadow_bias[..]),
            ("spotShadowRadius", Scalar, &a.spot_shadow_radius[..]),
            ("spotShadowMapSize", Vec2, &a.spot_shadow_size[..]),
            ("spotShadowMatrix", Mat4, &a.spot_shadow_matrix[..]),
            ("pointShadowBias", Scalar, &a.point_shadow_bias[..]),
            ("pointShadowMapSize", Vec2, &a.point_shadow_size[..]),
            ("pointShadowCameraNear", Scalar, &a.point_shadow_near[..]),
            ("pointShadowCameraFar", Scalar, &a.point_shadow_far[..]),
        ];
        for (name, layout, data) in arrays {
            if !data.is_empty() {
                uniforms.set_f32(driver, name, layout, data);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::Vec3;
    use prism_core::renderer::light::{PointLight, ShadowDescriptor, SpotLight};

    fn point(shadow: bool) -> LightDescriptor {
        LightDescriptor {
            light: LightType::Point(PointLight::default()),
            position: Vec3::new(1.0, 2.0, 3.0),
            shadow: shadow.then(ShadowDescriptor::default),
        }
    }

    #[test]
    fn test_version_follows_source_and_counts() {
        let mut setup = LightSetup::new();
        let mut state = LightState {
            version: 7,
            lights: vec![point(false)],
            ..Default::default()
        };
        assert!(setup.update(&state));
        assert!(!setup.update(&state));
        let v = setup.version();

        state.lights.push(point(false));
        assert!(setup.update(&state));
        assert_eq!(setup.version(), v + 1);

        state.version = 8;
        assert!(setup.update(&state));
        assert_eq!(setup.counts().point, 2);
    }

    #[test]
    fn test_shadow_casters_take_first_slots() {
        let mut setup = LightSetup::new();
        let state = LightState {
            version: 1,
            lights: vec![
                point(false),
                LightDescriptor {
                    light: LightType::Spot(SpotLight::default()),
                    shadow: Some(ShadowDescriptor::default()),
                    ..Default::default()
                },
                point(true),
            ],
            ..Default::default()
        };
        setup.update(&state);
        assert_eq!(
            setup.shadow_casters(),
            &[
                ShadowCaster {
                    kind: ShadowKind::Spot,
                    slot: 0,
                    light: 1
                },
                ShadowCaster {
                    kind: ShadowKind::Point,
                    slot: 0,
                    light: 2
                },
            ]
        );
        assert_eq!(setup.arrays.point_distance.len(), 2);
        assert_eq!(setup.arrays.point_shadow_near.len(), 1);
    }

    #[test]
    fn test_colors_are_scaled_by_intensity() {
        let mut setup = LightSetup::new();
        let mut light = PointLight::default();
        light.intensity = 2.0;
        light.color = LinearRgba::rgb(0.5, 0.25, 1.0);
        setup.update(&LightState {
            version: 1,
            lights: vec![LightDescriptor {
                light: LightType::Point(light),
                ..Default::default()
            }],
            ..Default::default()
        });
        assert_eq!(setup.arrays.point_color, vec![1.0, 0.5, 2.0]);
    }
}
