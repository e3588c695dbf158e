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

//! Tagged uniform values and their flattened representation.
//!
//! Every value is flattened to a plain numeric buffer before it reaches the
//! upload cache, so scalars, vectors, colors and matrices all go through the
//! same element-wise comparison.

use crate::asset::{RenderTarget, Texture};
use crate::math::{LinearRgba, Mat3, Mat4, Vec2, Vec3, Vec4};
use crate::memory::Handle;
use crate::renderer::api::{TextureId, TextureTarget};

/// How a flat float buffer is split into uniform elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatLayout {
    /// `float`.
    Scalar,
    /// `vec2`.
    Vec2,
    /// `vec3`.
    Vec3,
    /// `vec4`.
    Vec4,
    /// `mat3`, column-major.
    Mat3,
    /// `mat4`, column-major.
    Mat4,
}

impl FloatLayout {
    /// Number of floats in one element.
    pub fn components(self) -> usize {
        match self {
            FloatLayout::Scalar => 1,
            FloatLayout::Vec2 => 2,
            FloatLayout::Vec3 => 3,
            FloatLayout::Vec4 => 4,
            FloatLayout::Mat3 => 9,
            FloatLayout::Mat4 => 16,
        }
    }
}

/// The texture a sampler uniform reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerBinding {
    /// A registered logical texture.
    Texture(Handle<Texture>),
    /// The first color attachment of a registered render target.
    RenderTarget(Handle<RenderTarget>),
    /// A renderer-internal GPU texture (shadow maps, transmission target).
    Gpu {
        /// Texture kind.
        target: TextureTarget,
        /// GPU texture.
        texture: TextureId,
    },
}

/// A uniform value with an explicit type tag.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    /// `float`.
    Float(f32),
    /// `int`.
    Int(i32),
    /// `bool`, uploaded as an integer.
    Bool(bool),
    /// `vec2`.
    Vec2(Vec2),
    /// `vec3`.
    Vec3(Vec3),
    /// `vec4`.
    Vec4(Vec4),
    /// An RGB color, uploaded as `vec3`.
    Color(LinearRgba),
    /// `mat3`.
    Mat3(Mat3),
    /// `mat4`.
    Mat4(Mat4),
    /// A sampler.
    Texture(SamplerBinding),
    /// An array whose elements all share one type.
    Array(Vec<UniformValue>),
}

/// The GL-level category of a flattened uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    /// Float data with its element layout.
    Float(FloatLayout),
    /// Integer data.
    Int,
    /// Sampler units, resolved from [`SamplerBinding`]s at bind time.
    Sampler,
}

/// A reusable scratch buffer holding one flattened uniform value.
#[derive(Debug, Default, Clone)]
pub struct FlatUniform {
    /// The category, `None` until a value was flattened.
    pub kind: Option<UniformKind>,
    /// Float payload.
    pub floats: Vec<f32>,
    /// Integer payload.
    pub ints: Vec<i32>,
    /// Sampler payload.
    pub samplers: Vec<SamplerBinding>,
}

impl FlatUniform {
    /// Empties the buffer, keeping its allocations.
    pub fn clear(&mut self) {
        self.kind = None;
        self.floats.clear();
        self.ints.clear();
        self.samplers.clear();
    }

    fn set_kind(&mut self, kind: UniformKind) {
        match self.kind {
            None => self.kind = Some(kind),
            Some(existing) => assert_eq!(
                existing, kind,
                "uniform array elements must all share one type"
            ),
        }
    }
}

impl UniformValue {
    /// Flattens the value into `out`, replacing its previous content.
    ///
    /// # Panics
    ///
    /// Panics if an array mixes element types. That is a programming error in
    /// the code building the value, not a recoverable condition.
    pub fn flatten(&self, out: &mut FlatUniform) {
        out.clear();
        self.flatten_append(out);
    }

    fn flatten_append(&self, out: &mut FlatUniform) {
        match self {
            UniformValue::Float(v) => {
                out.set_kind(UniformKind::Float(FloatLayout::Scalar));
                out.floats.push(*v);
            }
            UniformValue::Int(v) => {
                out.set_kind(UniformKind::Int);
                out.ints.push(*v);
            }
            UniformValue::Bool(v) => {
                out.set_kind(UniformKind::Int);
                out.ints.push(*v as i32);
            }
            UniformValue::Vec2(v) => {
                out.set_kind(UniformKind::Float(FloatLayout::Vec2));
                out.floats.extend_from_slice(&v.to_array());
            }
            UniformValue::Vec3(v) => {
                out.set_kind(UniformKind::Float(FloatLayout::Vec3));
                out.floats.extend_from_slice(&v.to_array());
            }
            UniformValue::Vec4(v) => {
                out.set_kind(UniformKind::Float(FloatLayout::Vec4));
                out.floats.extend_from_slice(&v.to_array());
            }
            UniformValue::Color(c) => {
                out.set_kind(UniformKind::Float(FloatLayout::Vec3));
                out.floats.extend_from_slice(&[c.r, c.g, c.b]);
            }
            UniformValue::Mat3(m) => {
                out.set_kind(UniformKind::Float(FloatLayout::Mat3));
                out.floats.extend_from_slice(&m.to_cols_array());
            }
            UniformValue::Mat4(m) => {
                out.set_kind(UniformKind::Float(FloatLayout::Mat4));
                out.floats.extend_from_slice(&m.to_cols_array());
            }
            UniformValue::Texture(binding) => {
                out.set_kind(UniformKind::Sampler);
                out.samplers.push(*binding);
            }
            UniformValue::Array(items) => {
                for item in items {
                    assert!(
                        !matches!(item, UniformValue::Array(_)),
                        "nested uniform arrays are not supported"
                    );
                    item.flatten_append(out);
                }
            }
        }
    }

    /// Returns element `index` of an array value.
    ///
    /// # Panics
    ///
    /// Panics if the value is not an array or `index` is past its length.
    pub fn element(&self, index: usize) -> &UniformValue {
        match self {
            UniformValue::Array(items) => items.get(index).unwrap_or_else(|| {
                panic!(
                    "uniform array index {index} out of range (length {})",
                    items.len()
                )
            }),
            other => panic!("uniform value {other:?} is not an array"),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

impl From<LinearRgba> for UniformValue {
    fn from(v: LinearRgba) -> Self {
        UniformValue::Color(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_matrix_is_column_major() {
        let mut flat = FlatUniform::default();
        UniformValue::Mat4(Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))).flatten(&mut flat);
        assert_eq!(flat.kind, Some(UniformKind::Float(FloatLayout::Mat4)));
        assert_eq!(&flat.floats[12..15], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_flatten_array_is_contiguous() {
        let mut flat = FlatUniform::default();
        let value = UniformValue::Array(vec![
            UniformValue::Vec3(Vec3::X),
            UniformValue::Vec3(Vec3::Y),
        ]);
        value.flatten(&mut flat);
        assert_eq!(flat.kind, Some(UniformKind::Float(FloatLayout::Vec3)));
        assert_eq!(flat.floats, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_flatten_reuses_buffer() {
        let mut flat = FlatUniform::default();
        UniformValue::Float(1.0).flatten(&mut flat);
        UniformValue::Bool(true).flatten(&mut flat);
        assert_eq!(flat.kind, Some(UniformKind::Int));
        assert!(flat.floats.is_empty());
        assert_eq!(flat.ints, vec![1]);
    }

    #[test]
    #[should_panic(expected = "share one type")]
    fn test_mixed_array_panics() {
        let mut flat = FlatUniform::default();
        UniformValue::Array(vec![UniformValue::Float(1.0), UniformValue::Int(2)]).flatten(&mut flat);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_element_past_length_panics() {
        let value = UniformValue::Array(vec![UniformValue::Float(1.0)]);
        let _ = value.element(3);
    }
}
