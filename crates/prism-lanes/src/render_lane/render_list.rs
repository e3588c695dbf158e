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

//! Per-frame render lists.
//!
//! Visible items are partitioned into opaque, transmissive and transparent
//! buckets and sorted so that opaque items group by material front to back
//! while blended items draw back to front.

use prism_core::asset::{Geometry, Material, ResourceStore};
use prism_core::math::{Mat4, Vec3};
use prism_core::memory::Handle;
use prism_core::scene::{Camera, DrawableItem, Scene};
use std::cmp::Ordering;

/// The bucket an item is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// Depth-tested and written, no blending.
    Opaque,
    /// Samples the transmission target.
    Transmissive,
    /// Blended.
    Transparent,
}

impl Bucket {
    /// The bucket `material` belongs to.
    pub fn of(material: &Material) -> Self {
        if material.is_transmissive() {
            Bucket::Transmissive
        } else if material.transparent {
            Bucket::Transparent
        } else {
            Bucket::Opaque
        }
    }
}

/// One entry of a render list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    /// Index of the drawable in [`Scene::items`].
    pub index: usize,
    /// Material used for this frame, after any scene override.
    pub material: Handle<Material>,
    /// Vertex data.
    pub geometry: Handle<Geometry>,
    /// Ordering inherited from an enclosing group.
    pub group_order: i32,
    /// Explicit ordering.
    pub render_order: i32,
    /// Normalized device depth of the object's center.
    pub z: f32,
    /// Insertion order within the frame.
    pub id: u32,
}

/// Front to back, grouped by material.
pub fn opaque_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then(a.render_order.cmp(&b.render_order))
        .then(a.material.to_bits().cmp(&b.material.to_bits()))
        .then(a.z.total_cmp(&b.z))
        .then(a.id.cmp(&b.id))
}

/// Back to front.
pub fn transparent_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then(a.render_order.cmp(&b.render_order))
        .then(b.z.total_cmp(&a.z))
        .then(a.id.cmp(&b.id))
}

/// Depth of the object center in normalized device coordinates.
pub fn view_depth(view_projection: &Mat4, world: &Mat4, geometry: Option<&Geometry>) -> f32 {
    let center = geometry
        .and_then(|g| g.bounding_sphere)
        .map_or(Vec3::ZERO, |s| s.center);
    view_projection
        .project_point3(world.transform_point3(center))
        .z
}

/// The three buckets of one frame.
#[derive(Debug, Default)]
pub struct RenderList {
    opaque: Vec<RenderItem>,
    transmissive: Vec<RenderItem>,
    transparent: Vec<RenderItem>,
    next_id: u32,
    rejected: u32,
}

impl RenderList {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empties the buckets, keeping their storage.
    pub fn init(&mut self) {
        self.opaque.clear();
        self.transmissive.clear();
        self.transparent.clear();
        self.next_id = 0;
        self.rejected = 0;
    }

    /// Appends an item to `bucket`, stamping its insertion id.
    pub fn push(&mut self, bucket: Bucket, mut item: RenderItem) {
        item.id = self.next_id;
        self.next_id += 1;
        match bucket {
            Bucket::Opaque => self.opaque.push(item),
            Bucket::Transmissive => self.transmissive.push(item),
            Bucket::Transparent => self.transparent.push(item),
        }
    }

    /// Rebuilds the buckets from the visible items of `scene`.
    ///
    /// Items referring to disposed resources are counted as rejected.
    pub fn build(&mut self, scene: &Scene, camera: &Camera, store: &ResourceStore, sort: bool) {
        self.init();
        let view_projection = camera.view_projection();
        for (index, item) in scene.items.iter().enumerate() {
            if !item.visible {
                continue;
            }
            let material_handle = scene.override_material.unwrap_or(item.material);
            let (Some(material), Some(geometry)) =
                (store.get(material_handle), store.get(item.geometry))
            else {
                self.rejected += 1;
                continue;
            };
            if !material.visible {
                continue;
            }
            self.push(
                Bucket::of(material),
                RenderItem {
                    index,
                    material: material_handle,
                    geometry: item.geometry,
                    group_order: item.group_order,
                    render_order: item.render_order,
                    z: view_depth(&view_projection, &item.world, Some(geometry)),
                    id: 0,
                },
            );
        }
        if sort {
            self.sort();
        }
    }

    /// Sorts the buckets. The sort is stable.
    pub fn sort(&mut self) {
        self.opaque.sort_by(opaque_order);
        self.transmissive.sort_by(transparent_order);
        self.transparent.sort_by(transparent_order);
    }

    /// Opaque items in draw order.
    pub fn opaque(&self) -> &[RenderItem] {
        &self.opaque
    }

    /// Transmissive items in draw order.
    pub fn transmissive(&self) -> &[RenderItem] {
        &self.transmissive
    }

    /// Transparent items in draw order.
    pub fn transparent(&self) -> &[RenderItem] {
        &self.transparent
    }

    /// Items dropped because a handle no longer resolved.
    pub fn rejected(&self) -> u32 {
        self.rejected
    }

    /// Total number of listed items.
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transmissive.len() + self.transparent.len()
    }

    /// Returns `true` if nothing is listed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every listed item, bucket after bucket.
    pub fn iter(&self) -> impl Iterator<Item = &RenderItem> {
        self.opaque
            .iter()
            .chain(&self.transmissive)
            .chain(&self.transparent)
    }

    /// Resolves the drawable of `item` in `scene`.
    pub fn drawable<'s>(scene: &'s Scene, item: &RenderItem) -> &'s DrawableItem {
        &scene.items[item.index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_core::math::LinearRgba;

    struct Fixture {
        store: ResourceStore,
        scene: Scene,
        geometry: Handle<Geometry>,
        camera: Camera,
    }

    impl Fixture {
        fn new() -> Self {
            let mut store = ResourceStore::new();
            let geometry = store.insert(Geometry::from_positions(vec![0.0; 9]));
            Self {
                store,
                scene: Scene::default(),
                geometry,
                camera: Camera::default(),
            }
        }

        fn material(&mut self, transparent: bool) -> Handle<Material> {
            let mut m = Material::basic(LinearRgba::WHITE);
            m.transparent = transparent;
            self.store.insert(m)
        }

        fn add(&mut self, id: u64, material: Handle<Material>, z: f32) {
            self.scene.items.push(DrawableItem::new(
                id,
                self.geometry,
                material,
                Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            ));
        }

        fn build(&self) -> RenderList {
            let mut list = RenderList::new();
            list.build(&self.scene, &self.camera, &self.store, true);
            list
        }
    }

    fn ids(scene: &Scene, items: &[RenderItem]) -> Vec<u64> {
        items
            .iter()
            .map(|i| RenderList::drawable(scene, i).id)
            .collect()
    }

    #[test]
    fn test_buckets_by_material() {
        let mut f = Fixture::new();
        let opaque = f.material(false);
        let transparent = f.material(true);
        let mut glass = Material::new(prism_core::asset::MaterialKind::Physical);
        glass.transmission = 1.0;
        let glass = f.store.insert(glass);
        f.add(1, transparent, 0.0);
        f.add(2, opaque, 0.0);
        f.add(3, glass, 0.0);
        let list = f.build();
        assert_eq!(ids(&f.scene, list.opaque()), vec![2]);
        assert_eq!(ids(&f.scene, list.transmissive()), vec![3]);
        assert_eq!(ids(&f.scene, list.transparent()), vec![1]);
    }

    #[test]
    fn test_opaque_front_to_back_and_transparent_back_to_front() {
        let mut f = Fixture::new();
        let opaque = f.material(false);
        let transparent = f.material(true);
        // The camera sits at z = 5 looking toward -z.
        f.add(1, opaque, -3.0);
        f.add(2, opaque, 1.0);
        f.add(3, transparent, 1.0);
        f.add(4, transparent, -3.0);
        let list = f.build();
        assert_eq!(ids(&f.scene, list.opaque()), vec![2, 1]);
        assert_eq!(ids(&f.scene, list.transparent()), vec![4, 3]);
    }

    #[test]
    fn test_render_order_wins_over_depth() {
        let mut f = Fixture::new();
        let opaque = f.material(false);
        f.add(1, opaque, 1.0);
        f.add(2, opaque, -3.0);
        f.scene.items[0].render_order = 1;
        let list = f.build();
        assert_eq!(ids(&f.scene, list.opaque()), vec![2, 1]);

        f.scene.items[1].group_order = 2;
        let list = f.build();
        assert_eq!(ids(&f.scene, list.opaque()), vec![1, 2]);
    }

    #[test]
    fn test_equal_keys_keep_insertion_order() {
        let mut f = Fixture::new();
        let transparent = f.material(true);
        for id in 0..16 {
            f.add(id, transparent, 0.0);
        }
        let first = ids(&f.scene, f.build().transparent());
        assert_eq!(first, (0..16).collect::<Vec<_>>());
        assert_eq!(ids(&f.scene, f.build().transparent()), first);
    }

    #[test]
    fn test_skips_hidden_and_disposed() {
        let mut f = Fixture::new();
        let opaque = f.material(false);
        let gone = f.material(false);
        f.store.remove(gone);
        f.add(1, opaque, 0.0);
        f.add(2, gone, 0.0);
        f.add(3, opaque, 0.0);
        f.scene.items[2].visible = false;
        let list = f.build();
        assert_eq!(ids(&f.scene, list.opaque()), vec![1]);
        assert_eq!(list.rejected(), 1);
    }

    #[test]
    fn test_override_material_applies_to_all() {
        let mut f = Fixture::new();
        let opaque = f.material(false);
        let transparent = f.material(true);
        f.add(1, opaque, 0.0);
        f.scene.override_material = Some(transparent);
        let list = f.build();
        assert!(list.opaque().is_empty());
        assert_eq!(list.transparent()[0].material, transparent);
    }
}
