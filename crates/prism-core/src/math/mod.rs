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

//! Mathematics re-exports and the few small geometric types the renderer needs.
//!
//! Linear algebra comes from `glam`. This module only adds colour and bounding
//! volume types that carry renderer-specific meaning.

pub mod color;
pub mod geometry;

pub use glam::{Mat3, Mat4, Quat, Vec2, Vec3, Vec4};

pub use self::color::LinearRgba;
pub use self::geometry::{Rect, Sphere};

/// A small constant for floating-point comparisons.
pub const EPSILON: f32 = 1e-5;
