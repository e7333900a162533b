use crate::ecs::ComponentTypeId;
use thiserror::Error;

/// Errors raised while setting up or tearing down a world.
///
/// Per-frame operations never return these; they log and no-op instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("system '{name}' is already registered as component type {ty}")]
    DuplicateSystem {
        name: &'static str,
        ty: ComponentTypeId,
    },

    #[error("no system is registered for component type {ty}")]
    UnknownSystem { ty: ComponentTypeId },

    #[error("systems cannot be registered after the world is initialized")]
    AlreadyInitialized,

    #[error("world has been terminated")]
    Terminated,

    #[error("world has not been initialized")]
    NotInitialized,
}
