//! Descriptor set building.
//!
//! - [`ResourceBinding`] / [`ResourceBindings`] - what to bind where
//! - [`DescriptorSetBuilder`] - validates bindings and builds sets,
//!   deduplicated through a [`DescriptorSetCache`]
//! - [`DescriptorSetAllocator`] - growable descriptor pools
//!
//! Each [`CommandBuffer`](crate::CommandBuffer) owns one builder; nothing
//! here is shared between command buffers.

mod allocator;
mod binding;
mod builder;
mod cache;

pub use allocator::DescriptorSetAllocator;
pub use binding::{ResourceBinding, ResourceBindings};
pub use builder::DescriptorSetBuilder;
pub use cache::DescriptorSetCache;
