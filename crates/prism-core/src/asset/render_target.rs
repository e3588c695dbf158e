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

use crate::renderer::api::{MinFilter, RenderTargetDescriptor, SamplerDescriptor};

/// An application-owned offscreen target that can be rendered to and sampled.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    /// Attachment layout.
    pub descriptor: RenderTargetDescriptor,
    /// Sampling parameters of the color attachments.
    pub sampler: SamplerDescriptor,
    /// Incremented whenever the descriptor changes.
    pub version: u64,
}

impl RenderTarget {
    /// Creates a target from a descriptor.
    pub fn new(descriptor: RenderTargetDescriptor) -> Self {
        Self {
            descriptor,
            sampler: SamplerDescriptor {
                min_filter: MinFilter::Linear,
                ..Default::default()
            },
            version: 0,
        }
    }

    /// Resizes the attachments. The GPU objects are recreated on next use.
    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.descriptor.width != width || self.descriptor.height != height {
            self.descriptor.width = width;
            self.descriptor.height = height;
            self.version += 1;
        }
    }
}
