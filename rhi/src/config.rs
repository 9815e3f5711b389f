//! Runtime configuration for the RHI.
//!
//! Defaults come from [`RhiConfig::default`]; [`RhiConfig::from_env`] lets the
//! `REDLILIUM_VALIDATION` and `REDLILIUM_DEBUG_LABELS` environment variables
//! override them without recompiling.

use ash::vk;

/// Environment variable toggling the Vulkan validation layer.
pub const VALIDATION_ENV: &str = "REDLILIUM_VALIDATION";

/// Environment variable toggling command buffer debug labels.
pub const DEBUG_LABELS_ENV: &str = "REDLILIUM_DEBUG_LABELS";

/// Sizing of the descriptor pools owned by each command buffer.
#[derive(Debug, Clone)]
pub struct DescriptorPoolConfig {
    /// Maximum number of sets allocated from one pool.
    pub max_sets: u32,
    /// Per-type descriptor capacity of one pool.
    pub pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        let size = |ty, descriptor_count| vk::DescriptorPoolSize {
            ty,
            descriptor_count,
        };
        Self {
            max_sets: 1000,
            pool_sizes: vec![
                size(vk::DescriptorType::UNIFORM_BUFFER, 1000),
                size(vk::DescriptorType::SAMPLED_IMAGE, 1000),
                size(vk::DescriptorType::SAMPLER, 1000),
                size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 1000),
                size(vk::DescriptorType::STORAGE_BUFFER, 100),
                size(vk::DescriptorType::STORAGE_IMAGE, 100),
            ],
        }
    }
}

/// Configuration of a [`RenderDevice`](crate::RenderDevice).
#[derive(Debug, Clone)]
pub struct RhiConfig {
    /// Application name reported to the driver.
    pub application_name: String,
    /// Enable the Khronos validation layer when available.
    pub validation: bool,
    /// Emit debug labels for [`CommandBuffer::debug_group`](crate::CommandBuffer::debug_group).
    pub debug_labels: bool,
    /// Descriptor pool sizing per command buffer.
    pub descriptor_pool: DescriptorPoolConfig,
}

impl Default for RhiConfig {
    fn default() -> Self {
        Self {
            application_name: "RedLilium".to_string(),
            validation: cfg!(debug_assertions),
            debug_labels: cfg!(debug_assertions),
            descriptor_pool: DescriptorPoolConfig::default(),
        }
    }
}

impl RhiConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(VALIDATION_ENV) {
            match parse_flag(&value) {
                Some(flag) => self.validation = flag,
                None => log::warn!("Ignoring {VALIDATION_ENV}={value:?}: expected 0/1/true/false"),
            }
        }
        if let Some(value) = lookup(DEBUG_LABELS_ENV) {
            match parse_flag(&value) {
                Some(flag) => self.debug_labels = flag,
                None => {
                    log::warn!("Ignoring {DEBUG_LABELS_ENV}={value:?}: expected 0/1/true/false")
                }
            }
        }
        self
    }

    /// Set the application name.
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    /// Enable or disable debug labels.
    pub fn with_debug_labels(mut self, enabled: bool) -> Self {
        self.debug_labels = enabled;
        self
    }

    /// Replace the descriptor pool sizing.
    pub fn with_descriptor_pool(mut self, config: DescriptorPoolConfig) -> Self {
        self.descriptor_pool = config;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}
