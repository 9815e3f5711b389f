//! Physical device selection and logical device creation.

use std::ffi::CStr;

use ash::vk;

use crate::error::{RhiError, RhiResult};

/// Score a device; `None` when it lacks required features.
fn score_device(
    properties: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
) -> Option<u32> {
    if features.sampler_anisotropy == vk::FALSE {
        return None;
    }

    let mut score = 0;
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    } else if properties.device_type == vk::PhysicalDeviceType::INTEGRATED_GPU {
        score += 100;
    }
    score += properties.limits.max_image_dimension2_d / 1024;
    Some(score)
}

/// Select the best physical device, preferring discrete GPUs.
pub fn select_physical_device(instance: &ash::Instance) -> RhiResult<vk::PhysicalDevice> {
    let devices = unsafe { instance.enumerate_physical_devices() }.map_err(|e| {
        RhiError::InitializationFailed(format!("Failed to enumerate physical devices: {:?}", e))
    })?;

    if devices.is_empty() {
        return Err(RhiError::InitializationFailed(
            "No Vulkan-capable GPU found".to_string(),
        ));
    }

    let mut best_device = None;
    let mut best_score = 0;

    for device in devices {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        let Some(score) = score_device(&properties, &features) else {
            continue;
        };

        if best_device.is_none() || score > best_score {
            best_score = score;
            best_device = Some(device);
        }

        // SAFETY: device_name is a null-terminated string filled in by the driver
        let device_name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) };
        log::info!(
            "Found GPU: {:?} (type: {:?}, score: {})",
            device_name,
            properties.device_type,
            score
        );
    }

    best_device.ok_or_else(|| RhiError::InitializationFailed("No suitable GPU found".to_string()))
}

/// Find a queue family supporting graphics, which also covers compute and transfer.
pub fn find_graphics_queue_family(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
) -> RhiResult<u32> {
    let queue_families =
        unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

    queue_families
        .iter()
        .position(|family| {
            family
                .queue_flags
                .contains(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)
        })
        .map(|index| index as u32)
        .ok_or_else(|| {
            RhiError::InitializationFailed("No graphics queue family found".to_string())
        })
}

/// Create a logical device with dynamic rendering enabled.
pub fn create_logical_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_family: u32,
) -> RhiResult<ash::Device> {
    let queue_priorities = [1.0f32];
    let queue_create_infos = [vk::DeviceQueueCreateInfo::default()
        .queue_family_index(queue_family)
        .queue_priorities(&queue_priorities)];

    let device_extensions = [ash::khr::dynamic_rendering::NAME.as_ptr()];

    let features = vk::PhysicalDeviceFeatures::default().sampler_anisotropy(true);
    let mut dynamic_rendering_features =
        vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true);

    let create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&device_extensions)
        .enabled_features(&features)
        .push_next(&mut dynamic_rendering_features);

    unsafe { instance.create_device(physical_device, &create_info, None) }.map_err(|e| {
        RhiError::InitializationFailed(format!("Failed to create logical device: {:?}", e))
    })
}
