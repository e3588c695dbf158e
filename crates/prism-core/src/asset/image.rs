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

use crate::renderer::api::{TextureFormat, TextureTarget};

/// Decoded pixel data that one or more textures sample from.
///
/// Several [`super::Texture`]s with different sampling parameters may share
/// one image; the GPU upload of the pixels is shared between them too.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
    /// Depth or layer count (1 for plain 2D images, 6 for cube maps).
    pub depth: u32,
    /// Texel format of `data`.
    pub format: TextureFormat,
    /// Tightly packed texels, layer after layer.
    pub data: Vec<u8>,
    /// Incremented whenever `data` changes.
    pub version: u64,
}

impl ImageData {
    /// Creates a 2D image.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            depth: 1,
            format,
            data,
            version: 0,
        }
    }

    /// A 1x1 opaque white RGBA8 image.
    pub fn white() -> Self {
        Self::new_2d(1, 1, TextureFormat::Rgba8, vec![255; 4])
    }

    /// Expected size of `data` in bytes.
    pub fn expected_len(&self, target: TextureTarget) -> usize {
        let layers = match target {
            TextureTarget::CubeMap => 6,
            _ => self.depth.max(1) as usize,
        };
        self.width as usize
            * self.height as usize
            * layers
            * self.format.bytes_per_texel() as usize
    }

    /// Returns `true` if both dimensions are powers of two.
    pub fn is_power_of_two(&self) -> bool {
        self.width.is_power_of_two() && self.height.is_power_of_two()
    }
}
