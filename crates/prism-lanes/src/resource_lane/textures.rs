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

use super::{coalesce_ranges, WarnOnce};
use crate::render_lane::StateCache;
use prism_core::asset::{ImageData, Texture, UpdateRange};
use prism_core::memory::{Arena, Handle};
use prism_core::renderer::api::*;
use prism_core::renderer::{DriverCapabilities, GpuDriver, ResourceError};
use std::collections::HashMap;

/// A texture ready to be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundTexture {
    /// Bind target.
    pub target: TextureTarget,
    /// Driver object.
    pub id: TextureId,
}

/// Everything that shapes the uploaded GPU texture. Logical textures with an
/// equal key share one driver object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    image: Handle<ImageData>,
    target: TextureTarget,
    sampler: SamplerDescriptor,
    unpack: UnpackOptions,
    mipmaps: bool,
}

#[derive(Debug)]
struct GpuTexture {
    id: TextureId,
    usage: u32,
    image_version: Option<u64>,
    descriptor: Option<TextureDescriptor>,
}

#[derive(Debug, Clone, Copy)]
struct TextureBinding {
    key: TextureKey,
    version: u64,
}

/// Splits a texel range of a `width`-wide image into at most three regions:
/// a partial first row, a block of full rows and a partial last row.
fn row_regions(range: UpdateRange, width: u32, height: u32) -> Vec<(TextureRegion, usize, usize)> {
    let w = width as usize;
    let end = range.end().min(w * height as usize);
    let mut start = range.start;
    let mut out = Vec::new();
    while start < end {
        let x = start % w;
        let y = start / w;
        let (region_w, region_h, texels) = if x == 0 && end - start >= w {
            let rows = (end - start) / w;
            (w, rows, rows * w)
        } else {
            let n = (w - x).min(end - start);
            (n, 1, n)
        };
        out.push((
            TextureRegion {
                level: 0,
                x: x as u32,
                y: y as u32,
                layer: 0,
                width: region_w as u32,
                height: region_h as u32,
            },
            start,
            texels,
        ));
        start += texels;
    }
    out
}

fn mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// GPU textures of one context.
#[derive(Debug, Default)]
pub struct TextureTable {
    gpu: HashMap<TextureKey, GpuTexture>,
    bindings: HashMap<Handle<Texture>, TextureBinding>,
    images: HashMap<Handle<ImageData>, u32>,
    fallbacks: HashMap<TextureTarget, TextureId>,
    uploads: u64,
    partial_uploads: u64,
}

impl TextureTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    fn effective_key(
        caps: &DriverCapabilities,
        texture: &Texture,
        image: &ImageData,
        warnings: &mut WarnOnce,
    ) -> TextureKey {
        let format = image.format;
        let mut sampler = texture.sampler();

        let filterable = !(format.is_float32() && !caps.float_texture_linear
            || format.is_float16() && !caps.half_float_texture_linear);
        if !filterable && (sampler.mag_filter == MagFilter::Linear || sampler.min_filter.is_linear()) {
            warnings.warn(format!(
                "Linear filtering of {format:?} textures is not supported; using nearest"
            ));
            sampler.mag_filter = MagFilter::Nearest;
            sampler.min_filter = if sampler.min_filter.uses_mipmaps() {
                MinFilter::NearestMipmapNearest
            } else {
                MinFilter::Nearest
            };
        }

        let mut mipmaps =
            texture.generate_mipmaps && sampler.min_filter.uses_mipmaps() && !format.is_depth();
        if mipmaps && !image.is_power_of_two() && !caps.npot_mipmaps {
            warnings.warn(format!(
                "Mipmaps are not supported for non-power-of-two textures ({}x{}); disabled",
                image.width, image.height
            ));
            mipmaps = false;
        }
        if !mipmaps && sampler.min_filter.uses_mipmaps() {
            sampler.min_filter = if sampler.min_filter.is_linear() {
                MinFilter::Linear
            } else {
                MinFilter::Nearest
            };
        }

        if sampler.anisotropy > caps.max_anisotropy.max(1) {
            warnings.warn(format!(
                "Anisotropy {} exceeds the supported maximum {}; clamped",
                sampler.anisotropy, caps.max_anisotropy
            ));
            sampler.anisotropy = caps.max_anisotropy.max(1);
        }

        TextureKey {
            image: texture.image,
            target: texture.target,
            sampler,
            unpack: texture.unpack(),
            mipmaps,
        }
    }

    /// Makes the GPU texture of `handle` current with its logical texture and
    /// source image, creating it on first use.
    ///
    /// A version change with pending update ranges re-uploads only those
    /// ranges; any other change re-uploads the whole image.
    pub fn update<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        images: &Arena<ImageData>,
        textures: &mut Arena<Texture>,
        handle: Handle<Texture>,
        warnings: &mut WarnOnce,
    ) -> Result<BoundTexture, ResourceError> {
        let texture = textures
            .get_mut(handle)
            .ok_or(ResourceError::InvalidHandle { kind: "texture" })?;
        let image = images
            .get(texture.image)
            .ok_or(ResourceError::InvalidHandle { kind: "image" })?;

        let previous = self.bindings.get(&handle).copied();
        if let Some(binding) = previous {
            if binding.version == texture.version {
                if let Some(gpu) = self.gpu.get(&binding.key) {
                    if gpu.image_version == Some(image.version) {
                        return Ok(BoundTexture {
                            target: binding.key.target,
                            id: gpu.id,
                        });
                    }
                }
            }
        }

        let expected = image.expected_len(texture.target);
        if image.data.len() != expected {
            return Err(ResourceError::SizeMismatch {
                expected,
                actual: image.data.len(),
            });
        }

        let key = Self::effective_key(driver.capabilities(), texture, image, warnings);
        if previous.map(|b| b.key) != Some(key) {
            if !self.gpu.contains_key(&key) {
                let id = driver.create_texture()?;
                log::debug!("Created texture {id:?} for '{}'", texture.name);
                self.gpu.insert(
                    key,
                    GpuTexture {
                        id,
                        usage: 0,
                        image_version: None,
                        descriptor: None,
                    },
                );
            }
            if let Some(gpu) = self.gpu.get_mut(&key) {
                gpu.usage += 1;
            }
            *self.images.entry(key.image).or_insert(0) += 1;
            if let Some(previous) = previous {
                self.release_image(previous.key.image);
                self.release_key(driver, state, previous.key);
            }
        }
        self.bindings.insert(
            handle,
            TextureBinding {
                key,
                version: texture.version,
            },
        );

        let ranges = std::mem::take(&mut texture.update_ranges);
        let Some(gpu) = self.gpu.get_mut(&key) else {
            return Err(ResourceError::InvalidHandle { kind: "texture" });
        };
        let descriptor = TextureDescriptor {
            target: key.target,
            format: image.format,
            width: image.width,
            height: image.height,
            depth: match key.target {
                TextureTarget::Texture2DArray | TextureTarget::Texture3D => image.depth.max(1),
                _ => 1,
            },
            mip_levels: if key.mipmaps {
                mip_levels(image.width, image.height)
            } else {
                1
            },
        };
        let bound = BoundTexture {
            target: key.target,
            id: gpu.id,
        };

        let allocated = gpu.image_version.is_some() && gpu.descriptor == Some(descriptor);
        let stale = gpu.image_version != Some(image.version);
        let bumped = previous.is_some_and(|b| b.key == key && b.version != texture.version);
        if allocated && !stale && !bumped && ranges.is_empty() {
            return Ok(bound);
        }

        state.bind_texture_for_upload(driver, key.target, gpu.id);
        driver.unpack_options(key.unpack);
        if allocated && !ranges.is_empty() && key.target == TextureTarget::Texture2D {
            let bpt = image.format.bytes_per_texel() as usize;
            for range in coalesce_ranges(&ranges) {
                for (region, start, texels) in row_regions(range, image.width, image.height) {
                    let bytes = &image.data[start * bpt..(start + texels) * bpt];
                    driver.tex_sub_image(key.target, image.format, &region, bytes)?;
                }
            }
            self.partial_uploads += 1;
        } else {
            driver.tex_image(key.target, &descriptor, 0, Some(&image.data))?;
            driver.tex_parameters(key.target, &key.sampler);
            gpu.descriptor = Some(descriptor);
            self.uploads += 1;
        }
        if key.mipmaps {
            driver.generate_mipmap(key.target);
        }
        gpu.image_version = Some(image.version);
        Ok(bound)
    }

    fn release_image(&mut self, image: Handle<ImageData>) {
        if let Some(count) = self.images.get_mut(&image) {
            *count -= 1;
            if *count == 0 {
                self.images.remove(&image);
            }
        }
    }

    fn release_key<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        key: TextureKey,
    ) {
        let Some(gpu) = self.gpu.get_mut(&key) else {
            return;
        };
        gpu.usage = gpu.usage.saturating_sub(1);
        if gpu.usage == 0 {
            if let Some(gpu) = self.gpu.remove(&key) {
                log::debug!("Deleting texture {:?}", gpu.id);
                driver.delete_texture(gpu.id);
                state.forget_texture(gpu.id);
            }
        }
    }

    /// Releases the GPU texture of a disposed logical texture. The driver
    /// object survives while other textures share it.
    pub fn remove<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        handle: Handle<Texture>,
    ) {
        if let Some(binding) = self.bindings.remove(&handle) {
            self.release_image(binding.key.image);
            self.release_key(driver, state, binding.key);
        }
    }

    /// A 1x1 white texture for samplers without a usable texture.
    pub fn fallback<D: GpuDriver + ?Sized>(
        &mut self,
        driver: &mut D,
        state: &mut StateCache,
        target: TextureTarget,
    ) -> Result<BoundTexture, ResourceError> {
        if let Some(id) = self.fallbacks.get(&target) {
            return Ok(BoundTexture { target, id: *id });
        }
        let id = driver.create_texture()?;
        let descriptor = TextureDescriptor {
            target,
            format: TextureFormat::Rgba8,
            width: 1,
            height: 1,
            depth: 1,
            mip_levels: 1,
        };
        let data = vec![255u8; descriptor.base_level_size()];
        state.bind_texture_for_upload(driver, target, id);
        driver.unpack_options(UnpackOptions::default());
        driver.tex_image(target, &descriptor, 0, Some(&data))?;
        driver.tex_parameters(
            target,
            &SamplerDescriptor {
                min_filter: MinFilter::Nearest,
                mag_filter: MagFilter::Nearest,
                ..Default::default()
            },
        );
        self.fallbacks.insert(target, id);
        Ok(BoundTexture { target, id })
    }

    /// The GPU texture last resolved for `handle`.
    pub fn get(&self, handle: Handle<Texture>) -> Option<BoundTexture> {
        let binding = self.bindings.get(&handle)?;
        self.gpu.get(&binding.key).map(|gpu| BoundTexture {
            target: binding.key.target,
            id: gpu.id,
        })
    }

    /// Number of logical textures using `image`.
    pub fn image_usage(&self, image: Handle<ImageData>) -> u32 {
        self.images.get(&image).copied().unwrap_or(0)
    }

    /// Number of driver textures owned by the table, fallbacks excluded.
    pub fn len(&self) -> usize {
        self.gpu.len()
    }

    /// Returns `true` if no texture is resident.
    pub fn is_empty(&self) -> bool {
        self.gpu.is_empty()
    }

    /// Full uploads performed so far.
    pub fn uploads(&self) -> u64 {
        self.uploads
    }

    /// Partial uploads performed so far.
    pub fn partial_uploads(&self) -> u64 {
        self.partial_uploads
    }

    /// Forgets every texture without deleting, after a context loss.
    pub fn invalidate(&mut self) {
        self.gpu.clear();
        self.bindings.clear();
        self.images.clear();
        self.fallbacks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::asset::ResourceStore;
    use prism_core::math::Rect;
    use prism_infra::{HeadlessConfig, HeadlessDriver};

    struct Fixture {
        driver: HeadlessDriver,
        state: StateCache,
        store: ResourceStore,
        table: TextureTable,
        warnings: WarnOnce,
    }

    impl Fixture {
        fn with_caps(caps: DriverCapabilities) -> Self {
            Self {
                driver: HeadlessDriver::new(HeadlessConfig {
                    capabilities: caps,
                    ..Default::default()
                }),
                state: StateCache::new(),
                store: ResourceStore::new(),
                table: TextureTable::new(),
                warnings: WarnOnce::new(),
            }
        }

        fn new() -> Self {
            Self::with_caps(DriverCapabilities::default())
        }

        fn image(&mut self, w: u32, h: u32, format: TextureFormat) -> Handle<ImageData> {
            let len = (w * h * format.bytes_per_texel()) as usize;
            self.store.insert(ImageData::new_2d(w, h, format, vec![0; len]))
        }

        fn update(&mut self, texture: Handle<Texture>) -> Result<BoundTexture, ResourceError> {
            self.table.update(
                &mut self.driver,
                &mut self.state,
                &self.store.images,
                &mut self.store.textures,
                texture,
                &mut self.warnings,
            )
        }
    }

    #[test]
    fn test_row_regions_split_partial_rows() {
        let regions = row_regions(UpdateRange::new(2, 12), 4, 4);
        let shapes: Vec<_> = regions
            .iter()
            .map(|(r, start, n)| (r.x, r.y, r.width, r.height, *start, *n))
            .collect();
        assert_eq!(
            shapes,
            vec![(2, 0, 2, 1, 2, 2), (0, 1, 4, 2, 4, 8), (0, 3, 2, 1, 12, 2)]
        );
    }

    #[test]
    fn test_shared_image_and_sampler_share_gpu_texture() {
        let mut f = Fixture::new();
        let image = f.image(4, 4, TextureFormat::Rgba8);
        let a = f.store.insert(Texture::new(image));
        let b = f.store.insert(Texture::new(image));
        let ta = f.update(a).unwrap();
        let tb = f.update(b).unwrap();
        assert_eq!(ta, tb);
        assert_eq!(f.table.image_usage(image), 2);
        assert_eq!(f.driver.count("tex_image"), 1);

        f.table.remove(&mut f.driver, &mut f.state, a);
        assert_eq!(f.driver.live_textures(), 1);
        f.table.remove(&mut f.driver, &mut f.state, b);
        assert_eq!(f.driver.live_textures(), 0);
        assert_eq!(f.table.image_usage(image), 0);
    }

    #[test]
    fn test_different_sampler_gets_own_texture() {
        let mut f = Fixture::new();
        let image = f.image(4, 4, TextureFormat::Rgba8);
        let a = f.store.insert(Texture::new(image));
        let mut nearest = Texture::new(image);
        nearest.mag_filter = MagFilter::Nearest;
        let b = f.store.insert(nearest);
        assert_ne!(f.update(a).unwrap().id, f.update(b).unwrap().id);
        assert_eq!(f.table.len(), 2);
        assert_eq!(f.table.image_usage(image), 2);
    }

    #[test]
    fn test_unchanged_version_skips_upload() {
        let mut f = Fixture::new();
        let image = f.image(4, 4, TextureFormat::Rgba8);
        let t = f.store.insert(Texture::new(image));
        f.update(t).unwrap();
        f.update(t).unwrap();
        assert_eq!(f.driver.count("tex_image"), 1);

        f.store.get_mut(image).unwrap().version += 1;
        f.update(t).unwrap();
        assert_eq!(f.driver.count("tex_image"), 2);
    }

    #[test]
    fn test_update_ranges_upload_coalesced_rows() {
        let mut f = Fixture::new();
        let image = f.image(4, 4, TextureFormat::Rgba8);
        let t = f.store.insert(Texture::new(image));
        f.update(t).unwrap();

        f.store
            .get_mut(t)
            .unwrap()
            .add_update_rect(4, Rect::new(0, 0, 4, 3));
        f.update(t).unwrap();
        assert_eq!(f.driver.count("tex_sub_image"), 1);
        assert_eq!(f.driver.count("tex_image"), 1);
        assert_eq!(f.table.partial_uploads(), 1);
        assert!(f.store.get(t).unwrap().update_ranges.is_empty());

        let texture = f.store.get_mut(t).unwrap();
        texture.add_update_range(1, 1);
        texture.add_update_range(9, 1);
        f.update(t).unwrap();
        assert_eq!(f.driver.count("tex_sub_image"), 3);
    }

    #[test]
    fn test_float_linear_falls_back_to_nearest_once() {
        let mut f = Fixture::new();
        let image = f.image(4, 4, TextureFormat::Rgba32Float);
        let a = f.store.insert(Texture::new(image));
        let mut b = Texture::new(image);
        b.wrap_s = AddressMode::Repeat;
        let b = f.store.insert(b);
        let bound = f.update(a).unwrap();
        f.update(b).unwrap();
        assert_eq!(f.warnings.len(), 1);
        let sampler = f.driver.texture_sampler(bound.id).unwrap();
        assert_eq!(sampler.mag_filter, MagFilter::Nearest);
        assert_eq!(sampler.min_filter, MinFilter::NearestMipmapNearest);
    }

    #[test]
    fn test_npot_mipmaps_disabled_without_support() {
        let mut f = Fixture::with_caps(DriverCapabilities {
            npot_mipmaps: false,
            ..Default::default()
        });
        let image = f.image(3, 5, TextureFormat::Rgba8);
        let t = f.store.insert(Texture::new(image));
        let bound = f.update(t).unwrap();
        assert!(!f.driver.texture_has_mipmaps(bound.id));
        assert_eq!(
            f.driver.texture_sampler(bound.id).unwrap().min_filter,
            MinFilter::Linear
        );
        assert_eq!(f.warnings.len(), 1);

        let pot = f.image(4, 4, TextureFormat::Rgba8);
        let t = f.store.insert(Texture::new(pot));
        let bound = f.update(t).unwrap();
        assert!(f.driver.texture_has_mipmaps(bound.id));
    }

    #[test]
    fn test_anisotropy_is_clamped() {
        let mut f = Fixture::with_caps(DriverCapabilities {
            max_anisotropy: 4,
            ..Default::default()
        });
        let image = f.image(4, 4, TextureFormat::Rgba8);
        let mut texture = Texture::new(image);
        texture.anisotropy = 16;
        let t = f.store.insert(texture);
        let bound = f.update(t).unwrap();
        assert_eq!(f.driver.texture_sampler(bound.id).unwrap().anisotropy, 4);
        assert_eq!(f.warnings.len(), 1);
    }

    #[test]
    fn test_size_mismatch_creates_nothing() {
        let mut f = Fixture::new();
        let image = f
            .store
            .insert(ImageData::new_2d(4, 4, TextureFormat::Rgba8, vec![0; 3]));
        let t = f.store.insert(Texture::new(image));
        assert!(matches!(
            f.update(t),
            Err(ResourceError::SizeMismatch { expected: 64, actual: 3 })
        ));
        assert!(f.table.is_empty());
        assert_eq!(f.driver.count("create_texture"), 0);
    }

    #[test]
    fn test_disposed_texture_is_invalid_handle() {
        let mut f = Fixture::new();
        let image = f.image(1, 1, TextureFormat::Rgba8);
        let t = f.store.insert(Texture::new(image));
        f.store.remove(t);
        assert!(matches!(
            f.update(t),
            Err(ResourceError::InvalidHandle { kind: "texture" })
        ));
    }

    #[test]
    fn test_fallback_is_created_once() {
        let mut f = Fixture::new();
        let a = f
            .table
            .fallback(&mut f.driver, &mut f.state, TextureTarget::Texture2D)
            .unwrap();
        let b = f
            .table
            .fallback(&mut f.driver, &mut f.state, TextureTarget::Texture2D)
            .unwrap();
        assert_eq!(a, b);
        f.table
            .fallback(&mut f.driver, &mut f.state, TextureTarget::CubeMap)
            .unwrap();
        assert_eq!(f.driver.count("create_texture"), 2);
    }
}
