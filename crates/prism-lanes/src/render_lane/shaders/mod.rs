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

//! Built-in GLSL ES 3.00 shader bodies.
//!
//! The bodies carry no `#version` line and no defines; the program cache
//! prepends a prelude generated from the program key before compiling.
//!
//! # Available Bodies
//!
//! - [`MESH_VERT`] - the vertex stage shared by every built-in template
//! - [`COMMON_FRAG`] - clipping, fog, tone mapping and output encoding helpers
//! - [`UNLIT_FRAG`] - flat color and texture
//! - [`LIT_FRAG`] - Lambert, Phong and metallic-roughness lighting with shadows
//! - [`DEPTH_FRAG`] - depth and light distance for shadow maps

/// Vertex stage shared by the built-in templates.
///
/// Handles skinning, up to four morph targets, instancing and the shadow
/// coordinates of directional and spot lights.
pub const MESH_VERT: &str = include_str!("mesh.vert.glsl");

/// Helpers prepended to every built-in fragment body.
pub const COMMON_FRAG: &str = include_str!("common.frag.glsl");

/// Unlit fragment body.
pub const UNLIT_FRAG: &str = include_str!("unlit.frag.glsl");

/// Lit fragment body.
pub const LIT_FRAG: &str = include_str!("lit.frag.glsl");

/// Depth fragment body.
pub const DEPTH_FRAG: &str = include_str!("depth.frag.glsl");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_body_has_main() {
        assert!(MESH_VERT.contains("void main()"));
        assert!(!MESH_VERT.contains("#version"));
    }

    #[test]
    fn test_fragment_bodies_write_output() {
        for body in [UNLIT_FRAG, LIT_FRAG, DEPTH_FRAG] {
            assert!(body.contains("out vec4 fragColor;"));
            assert!(body.contains("clipFragment();"));
        }
    }

    #[test]
    fn test_common_defines_helpers() {
        assert!(COMMON_FRAG.contains("vec4 encodeOutput(vec4 color)"));
        assert!(COMMON_FRAG.contains("void clipFragment()"));
    }
}
