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

//! The backend-agnostic rendering contracts.
//!
//! This module defines the vocabulary shared by every layer: pipeline state
//! enums and descriptors (`api`), the [`GpuDriver`] trait that concrete
//! backends implement (`traits`), error types, lights, uniform values and the
//! per-frame statistics.

pub mod api;
pub mod error;
pub mod info;
pub mod light;
pub mod traits;
pub mod uniform;

pub use self::api::*;
pub use self::error::{RenderError, ResourceError, ShaderError};
pub use self::info::RenderInfo;
pub use self::light::{LightCounts, LightDescriptor, LightState, LightType, ShadowDescriptor};
pub use self::traits::{DriverCapabilities, GpuDriver};
pub use self::uniform::{FloatLayout, SamplerBinding, UniformValue};
