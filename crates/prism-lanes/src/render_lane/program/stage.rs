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

//! Interned shader stage sources.

use std::collections::HashMap;

/// The id of an interned stage source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageId(pub u32);

#[derive(Debug)]
struct StageEntry {
    source: String,
    usage: u32,
}

/// Maps stage source text to a stable id, counting the programs using it.
#[derive(Debug, Default)]
pub struct StageCache {
    ids: HashMap<String, StageId>,
    entries: HashMap<StageId, StageEntry>,
    next: u32,
}

impl StageCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// The id of `source`, interning it without taking a usage.
    pub fn id_of(&mut self, source: &str) -> StageId {
        if let Some(id) = self.ids.get(source) {
            return *id;
        }
        let id = StageId(self.next);
        self.next += 1;
        self.ids.insert(source.to_string(), id);
        self.entries.insert(
            id,
            StageEntry {
                source: source.to_string(),
                usage: 0,
            },
        );
        id
    }

    /// Takes one usage of `id`.
    pub fn acquire(&mut self, id: StageId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.usage += 1;
        }
    }

    /// Releases one usage of `id`, dropping the source when unused.
    pub fn release(&mut self, id: StageId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.usage = entry.usage.saturating_sub(1);
        if entry.usage == 0 {
            if let Some(entry) = self.entries.remove(&id) {
                self.ids.remove(&entry.source);
            }
        }
    }

    /// The source text of `id`.
    pub fn source(&self, id: StageId) -> Option<&str> {
        self.entries.get(&id).map(|e| e.source.as_str())
    }

    /// Usage count of `id`.
    pub fn usage(&self, id: StageId) -> u32 {
        self.entries.get(&id).map_or(0, |e| e.usage)
    }

    /// Number of interned sources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is interned.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops sources interned by [`id_of`](Self::id_of) that no program
    /// acquired.
    pub fn purge_unused(&mut self) {
        let ids = &mut self.ids;
        self.entries.retain(|_, entry| {
            let keep = entry.usage > 0;
            if !keep {
                ids.remove(&entry.source);
            }
            keep
        });
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_source_same_id() {
        let mut stages = StageCache::new();
        let a = stages.id_of("void main() {}");
        let b = stages.id_of("void main() {}");
        let c = stages.id_of("void main() { discard; }");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_release_drops_unused_source() {
        let mut stages = StageCache::new();
        let id = stages.id_of("a");
        stages.acquire(id);
        stages.acquire(id);
        stages.release(id);
        assert_eq!(stages.usage(id), 1);
        stages.release(id);
        assert!(stages.source(id).is_none());
        assert_ne!(stages.id_of("a"), id);
    }

    #[test]
    fn test_purge_keeps_acquired() {
        let mut stages = StageCache::new();
        let kept = stages.id_of("kept");
        stages.acquire(kept);
        stages.id_of("dropped");
        stages.purge_unused();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages.source(kept), Some("kept"));
    }
}
