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

//! Resource lane - keeps GPU objects in sync with their logical resources.
//!
//! Each table maps a logical handle to its driver object and the version it
//! last uploaded. Objects are created lazily on first use and refreshed when
//! the logical version moves on.

mod buffers;
mod render_targets;
mod textures;

pub use buffers::*;
pub use render_targets::*;
pub use textures::*;

use prism_core::asset::UpdateRange;
use std::collections::HashSet;

/// Sorts `ranges` and merges those that overlap or are at most one element
/// apart.
pub fn coalesce_ranges(ranges: &[UpdateRange]) -> Vec<UpdateRange> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(|r| r.start);
    let mut merged: Vec<UpdateRange> = Vec::with_capacity(sorted.len());
    for range in sorted {
        match merged.last_mut() {
            Some(prev) if range.start <= prev.start + prev.count + 1 => {
                prev.count = prev.count.max(range.start + range.count - prev.start);
            }
            _ => merged.push(range),
        }
    }
    merged
}

/// Logs each distinct warning once.
#[derive(Debug, Default)]
pub struct WarnOnce {
    seen: HashSet<String>,
}

impl WarnOnce {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs `message` at warn level unless it was already logged. Returns
    /// `true` if it was logged now.
    pub fn warn(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        if self.seen.contains(&message) {
            return false;
        }
        log::warn!("{message}");
        self.seen.insert(message);
        true
    }

    /// Number of distinct warnings logged.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns `true` if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns `true` if `message` was logged.
    pub fn contains(&self, message: &str) -> bool {
        self.seen.contains(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce_merges_touching_ranges() {
        let merged = coalesce_ranges(&[
            UpdateRange::new(8, 4),
            UpdateRange::new(0, 4),
            UpdateRange::new(4, 2),
            UpdateRange::new(20, 1),
        ]);
        assert_eq!(merged, vec![UpdateRange::new(0, 12), UpdateRange::new(20, 1)]);
    }

    #[test]
    fn test_warn_once_dedupes() {
        let mut warnings = WarnOnce::new();
        assert!(warnings.warn("float textures are filtered with nearest"));
        assert!(!warnings.warn("float textures are filtered with nearest"));
        assert!(warnings.warn("anisotropy clamped"));
        assert_eq!(warnings.len(), 2);
    }
}
