//! `VK_EXT_debug_utils` plumbing: the validation messenger, object names and
//! command buffer labels.

use std::ffi::{CStr, CString, c_char};

use ash::vk;

use crate::error::{RhiError, RhiResult};

/// Create the messenger forwarding validation output to `log` under the
/// `vulkan` target.
pub fn create_debug_messenger(
    debug_utils: &ash::ext::debug_utils::Instance,
) -> RhiResult<vk::DebugUtilsMessengerEXT> {
    let severities = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
        | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
        | vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
    let types = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE;
    let info = vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(severities)
        .message_type(types)
        .pfn_user_callback(Some(forward_to_log));

    unsafe { debug_utils.create_debug_utils_messenger(&info, None) }.map_err(|e| {
        RhiError::InitializationFailed(format!("Debug messenger creation failed: {:?}", e))
    })
}

/// Attach `name` to a Vulkan object so captures and validation messages
/// show it. Failures are logged and otherwise ignored.
pub fn set_object_name<H: vk::Handle>(
    device: &ash::ext::debug_utils::Device,
    handle: H,
    name: &str,
) {
    let name = to_c_string(name);
    let info = vk::DebugUtilsObjectNameInfoEXT::default()
        .object_handle(handle)
        .object_name(&name);
    if let Err(e) = unsafe { device.set_debug_utils_object_name(&info) } {
        log::warn!("Could not name Vulkan object {:?}: {:?}", name, e);
    }
}

/// Open a labelled region in `cmd`.
pub fn begin_label(
    device: &ash::ext::debug_utils::Device,
    cmd: vk::CommandBuffer,
    label: &str,
    color: [f32; 4],
) {
    let name = to_c_string(label);
    let label = vk::DebugUtilsLabelEXT::default()
        .label_name(&name)
        .color(color);
    unsafe { device.cmd_begin_debug_utils_label(cmd, &label) };
}

pub fn end_label(device: &ash::ext::debug_utils::Device, cmd: vk::CommandBuffer) {
    unsafe { device.cmd_end_debug_utils_label(cmd) };
}

/// Interior nul bytes are dropped.
fn to_c_string(text: &str) -> CString {
    CString::new(text.replace('\0', "")).unwrap_or_default()
}

fn log_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Debug
    }
}

/// Lowercase `|`-joined names of the message type bits.
fn message_kind(types: vk::DebugUtilsMessageTypeFlagsEXT) -> String {
    let names = [
        (vk::DebugUtilsMessageTypeFlagsEXT::GENERAL, "general"),
        (vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION, "validation"),
        (vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE, "performance"),
    ];
    let kinds: Vec<_> = names
        .iter()
        .filter(|(flag, _)| types.contains(*flag))
        .map(|(_, name)| *name)
        .collect();
    if kinds.is_empty() {
        "other".to_string()
    } else {
        kinds.join("|")
    }
}

/// # Safety
///
/// `ptr` is null or points to a nul-terminated string.
unsafe fn lossy(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

unsafe extern "system" fn forward_to_log(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    // SAFETY: the loader passes either null or data valid for this call,
    // whose string members are null or nul-terminated.
    let (id, message) = match unsafe { callback_data.as_ref() } {
        Some(data) => unsafe { (lossy(data.p_message_id_name), lossy(data.p_message)) },
        None => (None, None),
    };
    let message = message.unwrap_or_default();
    let level = log_level(severity);
    let kind = message_kind(types);

    match id {
        Some(id) => log::log!(target: "vulkan", level, "[{}] {}: {}", kind, id, message),
        None => log::log!(target: "vulkan", level, "[{}] {}", kind, message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::error(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, log::Level::Error)]
    #[case::warning(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, log::Level::Warn)]
    #[case::info(vk::DebugUtilsMessageSeverityFlagsEXT::INFO, log::Level::Info)]
    #[case::verbose(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE, log::Level::Debug)]
    fn test_log_level(
        #[case] severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        #[case] expected: log::Level,
    ) {
        assert_eq!(log_level(severity), expected);
    }

    #[test]
    fn test_message_kind() {
        assert_eq!(
            message_kind(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            "validation"
        );
        assert_eq!(
            message_kind(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            ),
            "general|performance"
        );
        assert_eq!(message_kind(vk::DebugUtilsMessageTypeFlagsEXT::empty()), "other");
    }

    #[test]
    fn test_nul_bytes_are_dropped() {
        assert_eq!(to_c_string("shadow\0pass").as_bytes(), b"shadowpass");
    }

    #[test]
    fn test_lossy_null() {
        assert_eq!(unsafe { lossy(std::ptr::null()) }, None);
        let text = c"VUID-test";
        assert_eq!(unsafe { lossy(text.as_ptr()) }.as_deref(), Some("VUID-test"));
    }
}
