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

use super::{ImageData, UpdateRange};
use crate::math::Rect;
use crate::memory::Handle;
use crate::renderer::api::{
    AddressMode, ColorSpace, CompareFunction, MagFilter, MinFilter, SamplerDescriptor,
    TextureTarget, UnpackOptions,
};

/// A sampled view of an [`ImageData`] with its own sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    /// A label for diagnostics.
    pub name: String,
    /// The pixel source.
    pub image: Handle<ImageData>,
    /// The texture kind.
    pub target: TextureTarget,
    /// Magnification filter.
    pub mag_filter: MagFilter,
    /// Minification filter.
    pub min_filter: MinFilter,
    /// Wrapping along S.
    pub wrap_s: AddressMode,
    /// Wrapping along T.
    pub wrap_t: AddressMode,
    /// Wrapping along R.
    pub wrap_r: AddressMode,
    /// Requested anisotropy; clamped to the driver maximum.
    pub anisotropy: u8,
    /// Depth comparison, for shadow textures.
    pub compare: Option<CompareFunction>,
    /// Whether a mip chain is generated after upload.
    pub generate_mipmaps: bool,
    /// Flip rows vertically on upload.
    pub flip_y: bool,
    /// Premultiply color by alpha on upload.
    pub premultiply_alpha: bool,
    /// Row alignment of the source data.
    pub unpack_alignment: u32,
    /// The color space of the texel data.
    pub color_space: ColorSpace,
    /// Texel ranges (row-major, in texels of layer 0) changed since the last
    /// upload. Empty means the whole image is re-uploaded.
    pub update_ranges: Vec<UpdateRange>,
    /// Incremented whenever the texture needs to be re-uploaded.
    pub version: u64,
}

impl Texture {
    /// Creates a 2D texture with default sampling.
    pub fn new(image: Handle<ImageData>) -> Self {
        Self {
            name: String::new(),
            image,
            target: TextureTarget::Texture2D,
            mag_filter: MagFilter::Linear,
            min_filter: MinFilter::LinearMipmapLinear,
            wrap_s: AddressMode::ClampToEdge,
            wrap_t: AddressMode::ClampToEdge,
            wrap_r: AddressMode::ClampToEdge,
            anisotropy: 1,
            compare: None,
            generate_mipmaps: true,
            flip_y: false,
            premultiply_alpha: false,
            unpack_alignment: 4,
            color_space: ColorSpace::NoColorSpace,
            update_ranges: Vec::new(),
            version: 0,
        }
    }

    /// The sampling parameters as requested, before any fallback.
    pub fn sampler(&self) -> SamplerDescriptor {
        SamplerDescriptor {
            mag_filter: self.mag_filter,
            min_filter: self.min_filter,
            wrap_s: self.wrap_s,
            wrap_t: self.wrap_t,
            wrap_r: self.wrap_r,
            anisotropy: self.anisotropy,
            compare: self.compare,
        }
    }

    /// The pixel unpacking options for uploads.
    pub fn unpack(&self) -> UnpackOptions {
        UnpackOptions {
            flip_y: self.flip_y,
            premultiply_alpha: self.premultiply_alpha,
            alignment: self.unpack_alignment,
        }
    }

    /// Marks a texel range for the next partial upload and bumps the version.
    pub fn add_update_range(&mut self, start: usize, count: usize) {
        self.update_ranges.push(UpdateRange::new(start, count));
        self.version += 1;
    }

    /// Marks a rectangle of layer 0 as changed, one range per row.
    pub fn add_update_rect(&mut self, image_width: u32, rect: Rect) {
        let width = image_width as usize;
        for row in rect.y.max(0)..(rect.y + rect.height).max(0) {
            self.update_ranges.push(UpdateRange::new(
                row as usize * width + rect.x.max(0) as usize,
                rect.width.max(0) as usize,
            ));
        }
        self.version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Arena;

    #[test]
    fn test_update_rect_produces_one_range_per_row() {
        let mut images = Arena::new();
        let image = images.insert(ImageData::white());
        let mut texture = Texture::new(image);
        texture.add_update_rect(8, Rect::new(2, 1, 3, 2));
        assert_eq!(
            texture.update_ranges,
            vec![UpdateRange::new(10, 3), UpdateRange::new(18, 3)]
        );
        assert_eq!(texture.version, 1);
    }
}
