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

//! Renderer configuration, loadable from RON.

use crate::math::LinearRgba;
use crate::renderer::api::{ColorSpace, Precision, ShadowMapType, ToneMapping};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Which buffers are cleared at the start of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoClear {
    /// Clear the color buffer.
    pub color: bool,
    /// Clear the depth buffer.
    pub depth: bool,
    /// Clear the stencil buffer.
    pub stencil: bool,
}

impl Default for AutoClear {
    fn default() -> Self {
        Self {
            color: true,
            depth: true,
            stencil: true,
        }
    }
}

/// Shadow map settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowSettings {
    /// Render shadow maps at all.
    pub enabled: bool,
    /// Filtering technique.
    pub kind: ShadowMapType,
    /// Re-render shadow maps every frame.
    pub auto_update: bool,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: ShadowMapType::Pcf,
            auto_update: true,
        }
    }
}

/// Renderer-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Sort render lists. When disabled, traversal order is kept.
    pub sort_objects: bool,
    /// Buffers cleared at frame start.
    pub auto_clear: AutoClear,
    /// Default clear color.
    pub clear_color: LinearRgba,
    /// Shadow settings.
    pub shadow_map: ShadowSettings,
    /// Size of the transmission background relative to the output, in (0, 1].
    pub transmission_resolution_scale: f32,
    /// Tone mapping operator.
    pub tone_mapping: ToneMapping,
    /// Exposure fed to the tone mapping operator.
    pub tone_mapping_exposure: f32,
    /// Color space of the screen output.
    pub output_color_space: ColorSpace,
    /// Default float precision in shaders.
    pub precision: Precision,
    /// Compile programs without blocking when the driver supports it.
    pub async_compile: bool,
    /// Query compile status and report errors.
    pub check_shader_errors: bool,
    /// Honor material clipping planes.
    pub local_clipping_enabled: bool,
    /// Interval between read-back polls driven by the host timer.
    pub readback_poll_interval_ms: u64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            sort_objects: true,
            auto_clear: AutoClear::default(),
            clear_color: LinearRgba::BLACK,
            shadow_map: ShadowSettings::default(),
            transmission_resolution_scale: 1.0,
            tone_mapping: ToneMapping::None,
            tone_mapping_exposure: 1.0,
            output_color_space: ColorSpace::Srgb,
            precision: Precision::High,
            async_compile: false,
            check_shader_errors: true,
            local_clipping_enabled: false,
            readback_poll_interval_ms: 4,
        }
    }
}

/// An error raised while loading a configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The text is not valid RON for [`RendererConfig`].
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "Failed to read renderer config: {err}"),
            ConfigError::Parse(msg) => write!(f, "Invalid renderer config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(err) => Some(err),
            ConfigError::Parse(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl RendererConfig {
    /// Parses a configuration from RON text. Missing fields take their defaults.
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: RendererConfig =
            ron::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.sanitized())
    }

    /// Loads a configuration from a RON file.
    pub fn from_ron_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_ron_str(&text)
    }

    /// Serializes the configuration as pretty RON.
    pub fn to_ron_string(&self) -> Result<String, ConfigError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Clamps out-of-range values into their valid domain.
    pub fn sanitized(mut self) -> Self {
        let scale = self.transmission_resolution_scale;
        if scale.is_nan() || scale <= 0.0 {
            log::warn!(
                "transmission_resolution_scale {scale} is not positive, using 1.0"
            );
            self.transmission_resolution_scale = 1.0;
        }
        self.transmission_resolution_scale = self.transmission_resolution_scale.min(1.0);
        self.tone_mapping_exposure = self.tone_mapping_exposure.max(0.0);
        self
    }
}
