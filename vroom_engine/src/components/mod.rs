//! Built-in components.
//!
//! Ready-made `Component` implementations provided by the engine. Games are
//! free to ignore them and attach their own.

mod transform;

pub use transform::Transform;
