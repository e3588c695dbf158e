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

//! Defines light types and the resolved light state consumed by the renderer.
//!
//! The scene layer resolves its lights into a [`LightState`] every frame. The
//! renderer never computes light placement or shadow cameras itself: shadow
//! matrices arrive ready to use in each [`ShadowDescriptor`].

use crate::math::{LinearRgba, Mat4, Vec3};

/// A directional light source that illuminates from a uniform direction.
///
/// Directional lights simulate infinitely distant light sources like the sun.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    /// The direction the light is pointing (normalized), from the light towards the scene.
    pub direction: Vec3,
    /// The color of the light in linear RGB space.
    pub color: LinearRgba,
    /// The intensity multiplier for the light.
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, -0.5).normalize(),
            color: LinearRgba::WHITE,
            intensity: 1.0,
        }
    }
}

/// A point light source that emits light in all directions from a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// The color of the light in linear RGB space.
    pub color: LinearRgba,
    /// The intensity of the light.
    pub intensity: f32,
    /// The maximum range of the light in world units. `0.0` means unlimited.
    pub range: f32,
    /// The falloff exponent.
    pub decay: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: LinearRgba::WHITE,
            intensity: 1.0,
            range: 0.0,
            decay: 2.0,
        }
    }
}

/// A spot light source that emits light in a cone from a single point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    /// The direction the spotlight is pointing (normalized).
    pub direction: Vec3,
    /// The color of the light in linear RGB space.
    pub color: LinearRgba,
    /// The intensity of the light.
    pub intensity: f32,
    /// The maximum range of the light in world units. `0.0` means unlimited.
    pub range: f32,
    /// The falloff exponent.
    pub decay: f32,
    /// The angle in radians at which the light begins to fall off.
    pub inner_cone_angle: f32,
    /// The angle in radians at which the light is fully attenuated.
    pub outer_cone_angle: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: LinearRgba::WHITE,
            intensity: 1.0,
            range: 0.0,
            decay: 2.0,
            inner_cone_angle: 20.0_f32.to_radians(),
            outer_cone_angle: 35.0_f32.to_radians(),
        }
    }
}

/// A sky/ground gradient light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereLight {
    /// The up direction of the sky color.
    pub up: Vec3,
    /// Color received from above.
    pub sky_color: LinearRgba,
    /// Color received from below.
    pub ground_color: LinearRgba,
    /// The intensity multiplier.
    pub intensity: f32,
}

/// An enumeration of all supported light types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightType {
    /// A directional light.
    Directional(DirectionalLight),
    /// A point light.
    Point(PointLight),
    /// A spotlight.
    Spot(SpotLight),
    /// A hemisphere light.
    Hemisphere(HemisphereLight),
}

impl Default for LightType {
    fn default() -> Self {
        LightType::Directional(DirectionalLight::default())
    }
}

/// Shadow parameters of a shadow-casting light.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDescriptor {
    /// Edge length of one shadow map face in texels.
    pub map_size: u32,
    /// Constant depth bias.
    pub bias: f32,
    /// Bias along the surface normal.
    pub normal_bias: f32,
    /// Filter radius for soft shadows.
    pub radius: f32,
    /// Near plane of the shadow camera.
    pub camera_near: f32,
    /// Far plane of the shadow camera.
    pub camera_far: f32,
    /// World-to-clip matrices of the shadow camera: one for directional and
    /// spot lights, six cube faces for point lights.
    pub matrices: Vec<Mat4>,
}

impl Default for ShadowDescriptor {
    fn default() -> Self {
        Self {
            map_size: 512,
            bias: 0.0,
            normal_bias: 0.0,
            radius: 1.0,
            camera_near: 0.5,
            camera_far: 500.0,
            matrices: vec![Mat4::IDENTITY],
        }
    }
}

/// A light placed in the world.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightDescriptor {
    /// The light parameters.
    pub light: LightType,
    /// World position (ignored by directional and hemisphere lights).
    pub position: Vec3,
    /// Shadow settings when the light casts shadows.
    pub shadow: Option<ShadowDescriptor>,
}

impl LightDescriptor {
    /// Returns `true` if the light type supports shadows and has them enabled.
    pub fn casts_shadow(&self) -> bool {
        self.shadow.is_some() && !matches!(self.light, LightType::Hemisphere(_))
    }
}

/// The per-type light counts that shape shader programs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct LightCounts {
    /// Directional lights.
    pub directional: u32,
    /// Point lights.
    pub point: u32,
    /// Spot lights.
    pub spot: u32,
    /// Hemisphere lights.
    pub hemisphere: u32,
    /// Directional lights with shadows.
    pub directional_shadow: u32,
    /// Point lights with shadows.
    pub point_shadow: u32,
    /// Spot lights with shadows.
    pub spot_shadow: u32,
}

/// The resolved lights of one frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LightState {
    /// Monotonically increasing version, bumped by the scene layer whenever
    /// the set of lights changes.
    pub version: u64,
    /// Ambient light color (premultiplied by intensity).
    pub ambient: LinearRgba,
    /// The lights, in a stable order.
    pub lights: Vec<LightDescriptor>,
}

impl LightState {
    /// Counts lights per type.
    pub fn counts(&self) -> LightCounts {
        let mut counts = LightCounts::default();
        for light in &self.lights {
            let shadow = light.casts_shadow() as u32;
            match light.light {
                LightType::Directional(_) => {
                    counts.directional += 1;
                    counts.directional_shadow += shadow;
                }
                LightType::Point(_) => {
                    counts.point += 1;
                    counts.point_shadow += shadow;
                }
                LightType::Spot(_) => {
                    counts.spot += 1;
                    counts.spot_shadow += shadow;
                }
                LightType::Hemisphere(_) => counts.hemisphere += 1,
            }
        }
        counts
    }

    /// Iterates over the shadow-casting lights.
    pub fn shadow_casters(&self) -> impl Iterator<Item = &LightDescriptor> {
        self.lights.iter().filter(|l| l.casts_shadow())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directional_light_default() {
        let light = DirectionalLight::default();
        assert!((light.direction.length() - 1.0).abs() < 0.001);
        assert_eq!(light.intensity, 1.0);
    }

    #[test]
    fn test_counts_by_type() {
        let state = LightState {
            version: 1,
            ambient: LinearRgba::BLACK,
            lights: vec![
                LightDescriptor {
                    light: LightType::Point(PointLight::default()),
                    shadow: Some(ShadowDescriptor::default()),
                    ..Default::default()
                },
                LightDescriptor {
                    light: LightType::Point(PointLight::default()),
                    ..Default::default()
                },
                LightDescriptor::default(),
            ],
        };
        let counts = state.counts();
        assert_eq!(counts.point, 2);
        assert_eq!(counts.point_shadow, 1);
        assert_eq!(counts.directional, 1);
        assert_eq!(counts.directional_shadow, 0);
        assert_eq!(state.shadow_casters().count(), 1);
    }

    #[test]
    fn test_hemisphere_never_casts_shadow() {
        let light = LightDescriptor {
            light: LightType::Hemisphere(HemisphereLight {
                up: Vec3::Y,
                sky_color: LinearRgba::WHITE,
                ground_color: LinearRgba::BLACK,
                intensity: 1.0,
            }),
            shadow: Some(ShadowDescriptor::default()),
            ..Default::default()
        };
        assert!(!light.casts_shadow());
    }
}
