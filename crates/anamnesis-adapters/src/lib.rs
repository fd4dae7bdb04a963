// ABOUTME: Validate-and-coerce boundary between loose JSON input and typed storage entities.

pub mod adapter;

pub use adapter::{adapt_from_dict, adapt_to_dict, AdaptedEntity, EntityKind};
