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

//! Defines the hierarchy of error types for the rendering subsystem.

use crate::renderer::api::ShaderStage;
use std::fmt;

/// An error produced while compiling or linking a shader program.
///
/// A failed program only affects the draws that reference it; the
/// diagnostic keeps the full sources so callers can inspect the failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderError {
    /// The driver rejected a stage or the link step.
    CompilationFailed {
        /// A descriptive label for the program.
        label: String,
        /// The failing stage, or `None` for a link failure.
        stage: Option<ShaderStage>,
        /// The driver's info log.
        log: String,
        /// The vertex source that was submitted.
        vertex_source: String,
        /// The fragment source that was submitted.
        fragment_source: String,
    },
    /// A custom material did not provide both stage sources.
    MissingSource {
        /// The material name.
        material: String,
    },
}

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderError::CompilationFailed {
                label, stage, log, ..
            } => match stage {
                Some(stage) => write!(
                    f,
                    "Shader compilation failed for '{label}' ({stage} stage): {log}"
                ),
                None => write!(f, "Program link failed for '{label}': {log}"),
            },
            ShaderError::MissingSource { material } => {
                write!(f, "Custom material '{material}' is missing a shader stage")
            }
        }
    }
}

impl std::error::Error for ShaderError {}

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// A shader-specific error occurred.
    Shader(ShaderError),
    /// The handle used to reference a resource is stale or was never issued.
    InvalidHandle {
        /// The kind of resource the handle refers to.
        kind: &'static str,
    },
    /// Uploaded data does not match the expected byte size.
    SizeMismatch {
        /// The expected size in bytes.
        expected: usize,
        /// The provided size in bytes.
        actual: usize,
    },
    /// An access was made outside a resource's bounds.
    OutOfBounds,
    /// The graphics context is lost; no object can be created.
    ContextLost,
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Shader(err) => write!(f, "Shader resource error: {err}"),
            ResourceError::InvalidHandle { kind } => {
                write!(f, "Invalid or disposed {kind} handle.")
            }
            ResourceError::SizeMismatch { expected, actual } => write!(
                f,
                "Resource data size mismatch: expected {expected} bytes, got {actual}."
            ),
            ResourceError::OutOfBounds => write!(f, "Resource access out of bounds."),
            ResourceError::ContextLost => write!(f, "The graphics context is lost."),
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Shader(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ShaderError> for ResourceError {
    fn from(err: ShaderError) -> Self {
        ResourceError::Shader(err)
    }
}

/// A frame-level error surfaced by the renderer's public entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// A frame was requested while another frame was still in progress.
    NestedFrame {
        /// The phase the renderer was in when the request arrived.
        phase: &'static str,
    },
    /// The graphics context is lost; the frame was not rendered.
    ContextLost,
    /// A handle passed by the application is stale or was never issued.
    InvalidHandle {
        /// The kind of resource the handle refers to.
        kind: &'static str,
    },
    /// An error occurred while managing a GPU resource.
    ResourceError(ResourceError),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NestedFrame { phase } => write!(
                f,
                "A frame was requested while the renderer is in the {phase} phase."
            ),
            RenderError::ContextLost => {
                write!(f, "The graphics context was lost and is not restored yet.")
            }
            RenderError::InvalidHandle { kind } => {
                write!(f, "Invalid or disposed {kind} handle.")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        match err {
            ResourceError::ContextLost => RenderError::ContextLost,
            ResourceError::InvalidHandle { kind } => RenderError::InvalidHandle { kind },
            other => RenderError::ResourceError(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn shader_error_display() {
        let err = ShaderError::CompilationFailed {
            label: "lit".to_string(),
            stage: Some(ShaderStage::Fragment),
            log: "ERROR: 0:12: syntax error".to_string(),
            vertex_source: String::new(),
            fragment_source: String::new(),
        };
        assert_eq!(
            format!("{err}"),
            "Shader compilation failed for 'lit' (fragment stage): ERROR: 0:12: syntax error"
        );

        let link = ShaderError::CompilationFailed {
            label: "lit".to_string(),
            stage: None,
            log: "varying mismatch".to_string(),
            vertex_source: String::new(),
            fragment_source: String::new(),
        };
        assert_eq!(
            format!("{link}"),
            "Program link failed for 'lit': varying mismatch"
        );
    }

    #[test]
    fn resource_error_display_wrapping_shader_error() {
        let res_err: ResourceError = ShaderError::MissingSource {
            material: "water".to_string(),
        }
        .into();
        assert_eq!(
            format!("{res_err}"),
            "Shader resource error: Custom material 'water' is missing a shader stage"
        );
        assert!(res_err.source().is_some());
    }

    #[test]
    fn render_error_from_resource_error() {
        let render_err: RenderError = ResourceError::ContextLost.into();
        assert_eq!(render_err, RenderError::ContextLost);

        let render_err: RenderError = ResourceError::InvalidHandle { kind: "texture" }.into();
        assert_eq!(render_err, RenderError::InvalidHandle { kind: "texture" });

        let render_err: RenderError = ResourceError::OutOfBounds.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Resource access out of bounds."
        );
        assert!(render_err.source().is_some());
    }
}
