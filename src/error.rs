//! Error types for the rendering core.

use thiserror::Error;

use crate::render::FramebufferStatus;

/// Errors produced by camera, render-target and texture operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    /// An argument was outside its documented range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A handle did not resolve to a live texture or render target.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The backend reported the framebuffer as unusable after generation.
    #[error("framebuffer '{name}' is incomplete: {status:?}")]
    IncompleteFramebuffer {
        name: String,
        status: FramebufferStatus,
    },

    /// The backend could not allocate a texture, framebuffer or renderbuffer.
    #[error("backend allocation failed: {0}")]
    BackendAllocation(String),

    /// A named resource was looked up but never registered.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_framebuffer_names_target_and_status() {
        let err = RenderError::IncompleteFramebuffer {
            name: "scene".into(),
            status: FramebufferStatus::IncompleteAttachment,
        };
        let msg = err.to_string();
        assert!(msg.contains("scene"));
        assert!(msg.contains("IncompleteAttachment"));
    }

    #[test]
    fn not_found_mentions_kind() {
        let err = RenderError::NotFound {
            kind: "texture",
            name: "logo".into(),
        };
        assert_eq!(err.to_string(), "texture not found: logo");
    }
}
