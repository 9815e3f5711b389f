//! Vulkan instance creation.

use std::ffi::{CStr, CString};

use ash::vk;

use crate::config::RhiConfig;
use crate::error::{RhiError, RhiResult};

use super::debug;

/// Required Vulkan API version.
/// MoltenVK only exposes Vulkan 1.2; dynamic rendering then comes from the
/// KHR extension.
#[cfg(target_os = "macos")]
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 2, 0);

#[cfg(not(target_os = "macos"))]
const REQUIRED_API_VERSION: u32 = vk::make_api_version(0, 1, 3, 0);

const VALIDATION_LAYER_NAME: &CStr = c"VK_LAYER_KHRONOS_validation";

/// A created instance plus the optional debug utils objects.
pub struct InstanceBundle {
    pub instance: ash::Instance,
    pub debug_utils: Option<ash::ext::debug_utils::Instance>,
    pub debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
}

/// Create a Vulkan instance.
///
/// The debug utils extension is enabled when validation is available or
/// debug labels are requested. The messenger only exists with validation.
pub fn create_instance(entry: &ash::Entry, config: &RhiConfig) -> RhiResult<InstanceBundle> {
    let validation_available = config.validation && check_validation_layer_support(entry);

    if config.validation && !validation_available {
        log::warn!("Validation layers requested but not available");
    }

    let debug_utils_enabled = validation_available || config.debug_labels;

    let app_name = CString::new(config.application_name.as_str()).map_err(|e| {
        RhiError::InitializationFailed(format!("Invalid application name: {}", e))
    })?;
    let engine_name = c"RedLilium Engine";

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 0, 1, 0))
        .engine_name(engine_name)
        .engine_version(vk::make_api_version(0, 0, 1, 0))
        .api_version(REQUIRED_API_VERSION);

    let mut extensions = Vec::new();
    if debug_utils_enabled {
        extensions.push(ash::ext::debug_utils::NAME.as_ptr());
    }

    #[cfg(target_os = "macos")]
    {
        extensions.push(ash::khr::portability_enumeration::NAME.as_ptr());
        extensions.push(ash::khr::get_physical_device_properties2::NAME.as_ptr());
    }

    let layer_names: Vec<*const std::ffi::c_char> = if validation_available {
        vec![VALIDATION_LAYER_NAME.as_ptr()]
    } else {
        vec![]
    };

    #[allow(unused_mut)]
    let mut create_flags = vk::InstanceCreateFlags::empty();

    #[cfg(target_os = "macos")]
    {
        create_flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    }

    let create_info = vk::InstanceCreateInfo::default()
        .flags(create_flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layer_names);

    let instance = unsafe { entry.create_instance(&create_info, None) }.map_err(|e| {
        RhiError::InitializationFailed(format!("Failed to create Vulkan instance: {:?}", e))
    })?;

    let debug_utils =
        debug_utils_enabled.then(|| ash::ext::debug_utils::Instance::new(entry, &instance));

    let debug_messenger = match (&debug_utils, validation_available) {
        (Some(debug_utils), true) => Some(debug::create_debug_messenger(debug_utils)?),
        _ => None,
    };

    Ok(InstanceBundle {
        instance,
        debug_utils,
        debug_messenger,
    })
}

fn check_validation_layer_support(entry: &ash::Entry) -> bool {
    let Ok(available_layers) = (unsafe { entry.enumerate_instance_layer_properties() }) else {
        return false;
    };

    available_layers.iter().any(|layer| {
        // SAFETY: layer_name is a null-terminated string filled in by the loader
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER_NAME
    })
}
