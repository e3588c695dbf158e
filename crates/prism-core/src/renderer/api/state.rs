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

//! Composite pipeline state values.

use super::enums::*;
use bitflags::bitflags;

/// The complete separable blend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    /// Equation for the RGB channels.
    pub equation_rgb: BlendEquation,
    /// Equation for the alpha channel.
    pub equation_alpha: BlendEquation,
    /// Source factor for the RGB channels.
    pub src_rgb: BlendFactor,
    /// Destination factor for the RGB channels.
    pub dst_rgb: BlendFactor,
    /// Source factor for the alpha channel.
    pub src_alpha: BlendFactor,
    /// Destination factor for the alpha channel.
    pub dst_alpha: BlendFactor,
}

impl BlendState {
    /// Builds a state using the same equation and factors for color and alpha.
    pub const fn uniform(equation: BlendEquation, src: BlendFactor, dst: BlendFactor) -> Self {
        Self {
            equation_rgb: equation,
            equation_alpha: equation,
            src_rgb: src,
            dst_rgb: dst,
            src_alpha: src,
            dst_alpha: dst,
        }
    }
}

/// Stencil test function, reference and read mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StencilFunc {
    /// The comparison function.
    pub func: CompareFunction,
    /// The reference value.
    pub reference: i32,
    /// The mask applied to both reference and stored value.
    pub mask: u32,
}

impl Default for StencilFunc {
    fn default() -> Self {
        Self {
            func: CompareFunction::Always,
            reference: 0,
            mask: 0xff,
        }
    }
}

/// Stencil operations for the three test outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StencilOps {
    /// Applied when the stencil test fails.
    pub fail: StencilOperation,
    /// Applied when the stencil test passes and the depth test fails.
    pub depth_fail: StencilOperation,
    /// Applied when both tests pass.
    pub pass: StencilOperation,
}

/// Depth bias applied to filled polygons.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PolygonOffset {
    /// Slope-scaled factor.
    pub factor: f32,
    /// Constant units.
    pub units: f32,
}

bitflags! {
    /// Which buffers a clear operation touches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        /// The color attachments.
        const COLOR = 1 << 0;
        /// The depth attachment.
        const DEPTH = 1 << 1;
        /// The stencil attachment.
        const STENCIL = 1 << 2;
    }
}

/// Per-channel color write mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorMask {
    /// Write red.
    pub r: bool,
    /// Write green.
    pub g: bool,
    /// Write blue.
    pub b: bool,
    /// Write alpha.
    pub a: bool,
}

impl ColorMask {
    /// Every channel writable.
    pub const ALL: Self = Self::splat(true);
    /// No channel writable.
    pub const NONE: Self = Self::splat(false);

    /// The same value for every channel.
    pub const fn splat(v: bool) -> Self {
        Self {
            r: v,
            g: v,
            b: v,
            a: v,
        }
    }
}

impl Default for ColorMask {
    fn default() -> Self {
        Self::ALL
    }
}
