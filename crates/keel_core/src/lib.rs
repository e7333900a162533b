//! Keel Core
//!
//! The entity/component data layer of the engine:
//! - Generational handles and the entity registry
//! - Structure-of-arrays component stores
//! - Component systems with runtime type dispatch
//! - Transform hierarchy with lazily cached world matrices
//! - Data-access declarations for parallel job stages

pub mod config;
pub mod ecs;
pub mod math;

pub use glam;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
