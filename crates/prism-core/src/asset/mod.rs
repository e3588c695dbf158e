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

//! Logical, CPU-side render resources.
//!
//! The application owns these values through the renderer's [`ResourceStore`]
//! and refers to them with generational [`Handle`]s. Every resource carries a
//! version counter; the GPU-side tables in `prism-lanes` compare it against
//! the version they last uploaded.

mod geometry;
mod image;
mod material;
mod render_target;
mod texture;

pub use self::geometry::{Attribute, DrawGroup, DrawRange, Geometry, Indices};
pub use self::image::ImageData;
pub use self::material::{CustomShader, Material, MaterialKind, MaterialMaps};
pub use self::render_target::RenderTarget;
pub use self::texture::Texture;

use crate::memory::{Arena, Handle};

/// A contiguous range of elements (or texels) marked for re-upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UpdateRange {
    /// First element.
    pub start: usize,
    /// Number of elements.
    pub count: usize,
}

impl UpdateRange {
    /// Creates a new range.
    pub const fn new(start: usize, count: usize) -> Self {
        Self { start, count }
    }

    /// One past the last element.
    pub fn end(&self) -> usize {
        self.start + self.count
    }
}

/// A logical resource kind that can be registered with the renderer.
pub trait RenderResource: Sized {
    /// A short name used in logs and errors.
    const KIND: &'static str;

    /// The current version of the resource.
    fn version(&self) -> u64;

    /// Marks the resource as modified.
    fn bump_version(&mut self);

    /// The arena storing resources of this kind.
    fn arena(store: &ResourceStore) -> &Arena<Self>;

    /// The arena storing resources of this kind, mutably.
    fn arena_mut(store: &mut ResourceStore) -> &mut Arena<Self>;
}

/// Owns every logical resource registered with one renderer instance.
#[derive(Default)]
pub struct ResourceStore {
    /// Decoded images shared by textures.
    pub images: Arena<ImageData>,
    /// Textures (image plus sampling parameters).
    pub textures: Arena<Texture>,
    /// Geometries.
    pub geometries: Arena<Geometry>,
    /// Materials.
    pub materials: Arena<Material>,
    /// Application render targets.
    pub render_targets: Arena<RenderTarget>,
}

impl ResourceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a resource and returns its handle.
    pub fn insert<R: RenderResource>(&mut self, resource: R) -> Handle<R> {
        R::arena_mut(self).insert(resource)
    }

    /// Resolves a handle.
    pub fn get<R: RenderResource>(&self, handle: Handle<R>) -> Option<&R> {
        R::arena(self).get(handle)
    }

    /// Resolves a handle mutably.
    pub fn get_mut<R: RenderResource>(&mut self, handle: Handle<R>) -> Option<&mut R> {
        R::arena_mut(self).get_mut(handle)
    }

    /// Removes a resource, invalidating its handle.
    pub fn remove<R: RenderResource>(&mut self, handle: Handle<R>) -> Option<R> {
        R::arena_mut(self).remove(handle)
    }
}

macro_rules! render_resource {
    ($ty:ty, $kind:literal, $field:ident) => {
        impl RenderResource for $ty {
            const KIND: &'static str = $kind;

            fn version(&self) -> u64 {
                self.version
            }

            fn bump_version(&mut self) {
                self.version += 1;
            }

            fn arena(store: &ResourceStore) -> &Arena<Self> {
                &store.$field
            }

            fn arena_mut(store: &mut ResourceStore) -> &mut Arena<Self> {
                &mut store.$field
            }
        }
    };
}

render_resource!(ImageData, "image", images);
render_resource!(Texture, "texture", textures);
render_resource!(Geometry, "geometry", geometries);
render_resource!(Material, "material", materials);
render_resource!(RenderTarget, "render target", render_targets);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_routes_by_type() {
        let mut store = ResourceStore::new();
        let m = store.insert(Material::default());
        let g = store.insert(Geometry::default());
        assert_eq!(store.materials.len(), 1);
        assert_eq!(store.geometries.len(), 1);
        if let Some(material) = store.get_mut(m) {
            material.bump_version();
        }
        assert_eq!(store.get(m).map(|m| m.version), Some(1));
        assert!(store.remove(g).is_some());
        assert!(store.get(g).is_none());
    }
}
