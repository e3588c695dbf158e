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

use super::UpdateRange;
use crate::math::Sphere;
use crate::renderer::api::{IndexFormat, PrimitiveTopology};
use std::collections::BTreeMap;

/// A per-vertex (or per-instance) float attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Flat component data.
    pub data: Vec<f32>,
    /// Components per vertex (1 to 4, or 16 for instance matrices).
    pub item_size: u8,
    /// Whether the data is normalized when read as integers.
    pub normalized: bool,
    /// Instancing divisor (0 = per vertex).
    pub divisor: u32,
    /// Whether the attribute changes often.
    pub dynamic: bool,
    /// Element ranges changed since the last upload. Empty means a full upload.
    pub update_ranges: Vec<UpdateRange>,
    /// Incremented whenever `data` changes.
    pub version: u64,
}

impl Attribute {
    /// Creates a static per-vertex attribute.
    pub fn new(data: Vec<f32>, item_size: u8) -> Self {
        Self {
            data,
            item_size,
            normalized: false,
            divisor: 0,
            dynamic: false,
            update_ranges: Vec::new(),
            version: 0,
        }
    }

    /// Creates a per-instance attribute.
    pub fn per_instance(data: Vec<f32>, item_size: u8) -> Self {
        Self {
            divisor: 1,
            ..Self::new(data, item_size)
        }
    }

    /// Number of items (vertices or instances).
    pub fn count(&self) -> usize {
        if self.item_size == 0 {
            0
        } else {
            self.data.len() / self.item_size as usize
        }
    }

    /// Marks a range of float components for the next partial upload.
    pub fn add_update_range(&mut self, start: usize, count: usize) {
        self.update_ranges.push(UpdateRange::new(start, count));
        self.version += 1;
    }

    /// Replaces the whole content.
    pub fn set_data(&mut self, data: Vec<f32>) {
        self.data = data;
        self.update_ranges.clear();
        self.version += 1;
    }
}

/// Index data of a geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Indices {
    /// 16-bit indices.
    U16(Vec<u16>),
    /// 32-bit indices.
    U32(Vec<u32>),
}

impl Indices {
    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            Indices::U16(v) => v.len(),
            Indices::U32(v) => v.len(),
        }
    }

    /// Returns `true` if there is no index.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element format.
    pub fn format(&self) -> IndexFormat {
        match self {
            Indices::U16(_) => IndexFormat::Uint16,
            Indices::U32(_) => IndexFormat::Uint32,
        }
    }
}

/// A sub-range of a geometry drawn with one material slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrawGroup {
    /// First vertex (or index).
    pub start: u32,
    /// Number of vertices (or indices).
    pub count: u32,
}

/// Limits drawing to part of a geometry. `count == None` means "to the end".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct DrawRange {
    /// First vertex (or index).
    pub start: u32,
    /// Number of vertices (or indices).
    pub count: Option<u32>,
}

/// Vertex data of a drawable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Geometry {
    /// A label for diagnostics.
    pub name: String,
    /// Named attributes. `position` is required for drawing.
    pub attributes: BTreeMap<String, Attribute>,
    /// Morph target positions, one attribute per target.
    pub morph_positions: Vec<Attribute>,
    /// Index data, if the geometry is indexed.
    pub index: Option<Indices>,
    /// Incremented whenever the index data changes.
    pub index_version: u64,
    /// The primitive topology.
    pub topology: PrimitiveTopology,
    /// Draw range limit.
    pub draw_range: DrawRange,
    /// Bounding sphere in object space, computed on demand.
    pub bounding_sphere: Option<Sphere>,
    /// Incremented when attributes are added or removed.
    pub version: u64,
}

impl Geometry {
    /// Creates a triangle geometry from flat positions.
    pub fn from_positions(positions: Vec<f32>) -> Self {
        let mut geometry = Self::default();
        geometry.set_attribute("position", Attribute::new(positions, 3));
        geometry
    }

    /// Adds or replaces an attribute.
    pub fn set_attribute(&mut self, name: &str, attribute: Attribute) {
        self.attributes.insert(name.to_string(), attribute);
        self.bounding_sphere = None;
        self.version += 1;
    }

    /// Removes an attribute.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let removed = self.attributes.remove(name);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    /// Sets the index data.
    pub fn set_index(&mut self, index: Indices) {
        self.index = Some(index);
        self.index_version += 1;
    }

    /// Number of vertices according to `position`.
    pub fn vertex_count(&self) -> usize {
        self.attributes.get("position").map_or(0, Attribute::count)
    }

    /// Computes and caches the bounding sphere from `position`.
    pub fn compute_bounding_sphere(&mut self) -> Sphere {
        let sphere = self
            .attributes
            .get("position")
            .map(|p| Sphere::from_positions(&p.data))
            .unwrap_or_default();
        self.bounding_sphere = Some(sphere);
        sphere
    }

    /// The element range actually drawn for `group`, clamped to the draw range
    /// and to the available data.
    pub fn resolve_range(&self, group: Option<DrawGroup>) -> (u32, u32) {
        let available = match &self.index {
            Some(index) => index.len() as u32,
            None => self.vertex_count() as u32,
        };
        let range_start = self.draw_range.start;
        let range_end = self
            .draw_range
            .count
            .map_or(available, |c| range_start.saturating_add(c))
            .min(available);
        let (start, end) = match group {
            Some(g) => (
                g.start.max(range_start),
                g.start.saturating_add(g.count).min(range_end),
            ),
            None => (range_start, range_end),
        };
        (start, end.saturating_sub(start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Geometry {
        let mut g = Geometry::from_positions(vec![0.0; 12]);
        g.set_index(Indices::U16(vec![0, 1, 2, 0, 2, 3]));
        g
    }

    #[test]
    fn test_resolve_range_full() {
        assert_eq!(quad().resolve_range(None), (0, 6));
    }

    #[test]
    fn test_resolve_range_clamped_by_draw_range_and_group() {
        let mut g = quad();
        g.draw_range = DrawRange {
            start: 1,
            count: Some(4),
        };
        assert_eq!(g.resolve_range(None), (1, 4));
        assert_eq!(
            g.resolve_range(Some(DrawGroup { start: 3, count: 10 })),
            (3, 2)
        );
        assert_eq!(
            g.resolve_range(Some(DrawGroup { start: 6, count: 3 })),
            (6, 0)
        );
    }

    #[test]
    fn test_attribute_count() {
        let a = Attribute::new(vec![0.0; 9], 3);
        assert_eq!(a.count(), 3);
        assert_eq!(Attribute::new(vec![], 0).count(), 0);
    }
}
