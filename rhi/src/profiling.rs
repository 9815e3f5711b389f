//! CPU profiling spans via Tracy.
//!
//! Enabled with the `profiling` Cargo feature. Without it every macro
//! expands to nothing.
//!
//! ```ignore
//! use redlilium_rhi::profiling::profile_scope;
//!
//! fn upload() {
//!     profile_scope!("upload");
//!     // ...
//! }
//! ```
//!
//! GPU-side markers are recorded with
//! [`CommandBuffer::debug_group`](crate::CommandBuffer::debug_group).

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, span};

/// Create a profiling span for the current scope.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span for the entire function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::span!();
    };
}

/// Create a profiling span for the function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Create a profiling span with a runtime-determined name.
///
/// Used for debug group labels, which are not string literals.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {
        $crate::profiling::Client::running()
            .map(|c| c.span_alloc(Some($name), "", file!(), line!(), 0))
    };
}

/// Dynamic span (evaluates to `None` when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope_dynamic {
    ($name:expr) => {{
        let _ = $name;
        None::<()>
    }};
}

pub use profile_function;
pub use profile_scope;
pub use profile_scope_dynamic;

/// Span handle stored by RAII guards that outlive a single scope.
#[cfg(feature = "profiling")]
pub type DynamicSpan = Option<tracy_client::Span>;

/// Span handle stored by RAII guards that outlive a single scope.
#[cfg(not(feature = "profiling"))]
pub type DynamicSpan = Option<()>;
