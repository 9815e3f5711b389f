//! Native Vulkan backend implementation using ash.
//!
//! One graphics queue serves graphics, compute and transfer work. Every
//! command buffer gets its own command pool and fence, so resetting one never
//! touches another. Validation layers and debug labels follow [`RhiConfig`].

mod allocator;
mod debug;
mod device;
mod instance;
mod pipeline;

use std::mem::ManuallyDrop;

use ash::vk;
use gpu_allocator::vulkan::{AllocationCreateDesc, AllocationScheme, Allocator};
use parking_lot::Mutex;

use crate::config::RhiConfig;
use crate::error::{RhiError, RhiResult};
use crate::resources::{ComputePipelineDesc, GraphicsPipelineDesc};

use super::{AllocatedBuffer, AllocatedImage, CommandBufferHandles, GpuBackend, MemoryLocation};

/// Vulkan-based GPU backend using ash.
///
/// - Validation layers when requested and installed
/// - gpu-allocator for memory management
/// - Dynamic rendering (VK_KHR_dynamic_rendering)
pub struct VulkanBackend {
    #[allow(dead_code)] // Keeps the loader alive for the instance's lifetime
    entry: ash::Entry,
    instance: ash::Instance,
    debug_utils: Option<ash::ext::debug_utils::Instance>,
    debug_messenger: Option<vk::DebugUtilsMessengerEXT>,
    /// Present whenever the debug utils extension is loaded; names objects.
    debug_device: Option<ash::ext::debug_utils::Device>,
    /// Emit command buffer labels through `debug_device`.
    debug_labels: bool,
    physical_device: vk::PhysicalDevice,
    device: ash::Device,
    dynamic_rendering: ash::khr::dynamic_rendering::Device,
    queue: Mutex<vk::Queue>,
    queue_family: u32,
    /// Dropped by hand before the device is destroyed.
    allocator: ManuallyDrop<Mutex<Allocator>>,
    validation_enabled: bool,
}

impl std::fmt::Debug for VulkanBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanBackend")
            .field("validation_enabled", &self.validation_enabled)
            .field("object_names", &self.debug_device.is_some())
            .field("debug_labels", &self.debug_labels)
            .field("queue_family", &self.queue_family)
            .finish()
    }
}

impl VulkanBackend {
    /// Load Vulkan, create an instance and pick a device.
    pub fn new(config: &RhiConfig) -> RhiResult<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| {
            RhiError::InitializationFailed(format!("Failed to load Vulkan: {}", e))
        })?;

        let bundle = instance::create_instance(&entry, config)?;
        let instance = bundle.instance;

        let physical_device = device::select_physical_device(&instance)?;
        let queue_family = device::find_graphics_queue_family(&instance, physical_device)?;
        let device = device::create_logical_device(&instance, physical_device, queue_family)?;
        let queue = unsafe { device.get_device_queue(queue_family, 0) };

        let allocator = allocator::create_allocator(&instance, physical_device, device.clone())?;

        let dynamic_rendering = ash::khr::dynamic_rendering::Device::new(&instance, &device);
        let debug_device = bundle
            .debug_utils
            .as_ref()
            .map(|_| ash::ext::debug_utils::Device::new(&instance, &device));
        let debug_labels = debug_device.is_some() && config.debug_labels;

        let validation_enabled = bundle.debug_messenger.is_some();
        log::info!(
            "Vulkan backend initialized (validation: {}, debug labels: {})",
            validation_enabled,
            debug_labels
        );

        Ok(Self {
            entry,
            instance,
            debug_utils: bundle.debug_utils,
            debug_messenger: bundle.debug_messenger,
            debug_device,
            debug_labels,
            physical_device,
            device,
            dynamic_rendering,
            queue: Mutex::new(queue),
            queue_family,
            allocator: ManuallyDrop::new(Mutex::new(allocator)),
            validation_enabled,
        })
    }

    /// Get the Vulkan device.
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance.
    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    fn allocate(
        &self,
        name: &str,
        requirements: vk::MemoryRequirements,
        location: MemoryLocation,
        linear: bool,
    ) -> RhiResult<gpu_allocator::vulkan::Allocation> {
        self.allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name,
                requirements,
                location: allocator::to_gpu_allocator(location),
                linear,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(RhiError::from)
    }

    fn free(&self, allocation: Option<gpu_allocator::vulkan::Allocation>) {
        if let Some(allocation) = allocation
            && let Err(e) = self.allocator.lock().free(allocation)
        {
            log::error!("Failed to free GPU memory: {}", e);
        }
    }

    fn name_object<H: vk::Handle>(&self, handle: H, name: &str) {
        if let Some(device) = &self.debug_device {
            debug::set_object_name(device, handle, name);
        }
    }

    fn label_device(&self) -> Option<&ash::ext::debug_utils::Device> {
        self.debug_device.as_ref().filter(|_| self.debug_labels)
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();

            // The allocator frees its memory blocks through the device.
            ManuallyDrop::drop(&mut self.allocator);

            self.device.destroy_device(None);

            if let (Some(debug_utils), Some(messenger)) = (&self.debug_utils, self.debug_messenger)
            {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

impl GpuBackend for VulkanBackend {
    fn name(&self) -> &'static str {
        "Vulkan Backend (ash)"
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    fn create_image(
        &self,
        info: &vk::ImageCreateInfo<'_>,
        name: &str,
    ) -> RhiResult<AllocatedImage> {
        let image = unsafe { self.device.create_image(info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!("Failed to create image {:?}: {:?}", name, e))
        })?;

        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let allocation = match self.allocate(name, requirements, MemoryLocation::GpuOnly, false) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_image(image, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_image_memory(image, allocation.memory(), allocation.offset())
        } {
            self.free(Some(allocation));
            unsafe { self.device.destroy_image(image, None) };
            return Err(RhiError::ResourceCreationFailed(format!(
                "Failed to bind image memory: {:?}",
                e
            )));
        }

        self.name_object(image, name);
        Ok(AllocatedImage {
            handle: image,
            allocation: Some(allocation),
        })
    }

    fn destroy_image(&self, image: AllocatedImage) {
        unsafe { self.device.destroy_image(image.handle, None) };
        self.free(image.allocation);
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo<'_>) -> RhiResult<vk::ImageView> {
        unsafe { self.device.create_image_view(info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!("Failed to create image view: {:?}", e))
        })
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device.destroy_image_view(view, None) };
    }

    fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> RhiResult<vk::Sampler> {
        unsafe { self.device.create_sampler(info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!("Failed to create sampler: {:?}", e))
        })
    }

    fn destroy_sampler(&self, sampler: vk::Sampler) {
        unsafe { self.device.destroy_sampler(sampler, None) };
    }

    fn create_buffer(
        &self,
        info: &vk::BufferCreateInfo<'_>,
        location: MemoryLocation,
        name: &str,
    ) -> RhiResult<AllocatedBuffer> {
        let buffer = unsafe { self.device.create_buffer(info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!("Failed to create buffer {:?}: {:?}", name, e))
        })?;

        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };
        let allocation = match self.allocate(name, requirements, location, true) {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        } {
            self.free(Some(allocation));
            unsafe { self.device.destroy_buffer(buffer, None) };
            return Err(RhiError::ResourceCreationFailed(format!(
                "Failed to bind buffer memory: {:?}",
                e
            )));
        }

        self.name_object(buffer, name);
        Ok(AllocatedBuffer {
            handle: buffer,
            size: info.size,
            location,
            allocation: Some(allocation),
        })
    }

    fn destroy_buffer(&self, buffer: AllocatedBuffer) {
        unsafe { self.device.destroy_buffer(buffer.handle, None) };
        self.free(buffer.allocation);
    }

    fn write_buffer(
        &self,
        buffer: &mut AllocatedBuffer,
        offset: u64,
        data: &[u8],
    ) -> RhiResult<()> {
        let Some(mapped) = buffer
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
        else {
            return Err(RhiError::Internal(
                "Buffer is not mapped for CPU access".to_string(),
            ));
        };
        let start = offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_buffer(&self, buffer: &AllocatedBuffer, offset: u64, size: u64) -> RhiResult<Vec<u8>> {
        let Some(mapped) = buffer
            .allocation
            .as_ref()
            .and_then(|allocation| allocation.mapped_slice())
        else {
            return Err(RhiError::Internal(
                "Buffer is not mapped for CPU access".to_string(),
            ));
        };
        Ok(mapped[offset as usize..(offset + size) as usize].to_vec())
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding<'_>],
    ) -> RhiResult<vk::DescriptorSetLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        unsafe { self.device.create_descriptor_set_layout(&create_info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!(
                "Failed to create descriptor set layout: {:?}",
                e
            ))
        })
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device.destroy_descriptor_set_layout(layout, None) };
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);
        unsafe { self.device.create_descriptor_pool(&create_info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!("Failed to create descriptor pool: {:?}", e))
        })
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device.destroy_descriptor_pool(pool, None) };
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RhiResult<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(|e| RhiError::Internal(format!("Failed to reset descriptor pool: {:?}", e)))
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RhiResult<vk::DescriptorSet> {
        let layouts = [layout];
        let allocate_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(pool)
            .set_layouts(&layouts);
        let sets = unsafe { self.device.allocate_descriptor_sets(&allocate_info) }
            .map_err(RhiError::from)?;
        Ok(sets[0])
    }

    fn update_descriptor_sets(&self, writes: &[vk::WriteDescriptorSet<'_>]) {
        unsafe { self.device.update_descriptor_sets(writes, &[]) };
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
        push_constant_ranges: &[vk::PushConstantRange],
    ) -> RhiResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .set_layouts(set_layouts)
            .push_constant_ranges(push_constant_ranges);
        unsafe { self.device.create_pipeline_layout(&create_info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!("Failed to create pipeline layout: {:?}", e))
        })
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(layout, None) };
    }

    fn create_compute_pipeline(
        &self,
        desc: &ComputePipelineDesc<'_>,
        layout: vk::PipelineLayout,
    ) -> RhiResult<vk::Pipeline> {
        pipeline::create_compute_pipeline(&self.device, desc, layout)
    }

    fn create_graphics_pipeline(
        &self,
        desc: &GraphicsPipelineDesc<'_>,
        layout: vk::PipelineLayout,
    ) -> RhiResult<vk::Pipeline> {
        pipeline::create_graphics_pipeline(&self.device, desc, layout)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(pipeline, None) };
    }

    fn create_command_buffer(&self) -> RhiResult<CommandBufferHandles> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(self.queue_family)
            .flags(vk::CommandPoolCreateFlags::TRANSIENT);
        let pool = unsafe { self.device.create_command_pool(&pool_info, None) }.map_err(|e| {
            RhiError::ResourceCreationFailed(format!("Failed to create command pool: {:?}", e))
        })?;

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        let buffer = match unsafe { self.device.allocate_command_buffers(&allocate_info) } {
            Ok(buffers) => buffers[0],
            Err(e) => {
                unsafe { self.device.destroy_command_pool(pool, None) };
                return Err(RhiError::ResourceCreationFailed(format!(
                    "Failed to allocate command buffer: {:?}",
                    e
                )));
            }
        };

        let fence = match unsafe {
            self.device
                .create_fence(&vk::FenceCreateInfo::default(), None)
        } {
            Ok(fence) => fence,
            Err(e) => {
                unsafe { self.device.destroy_command_pool(pool, None) };
                return Err(RhiError::ResourceCreationFailed(format!(
                    "Failed to create fence: {:?}",
                    e
                )));
            }
        };

        Ok(CommandBufferHandles {
            pool,
            buffer,
            fence,
        })
    }

    fn destroy_command_buffer(&self, handles: CommandBufferHandles) {
        unsafe {
            self.device.destroy_fence(handles.fence, None);
            // Frees the buffer with the pool.
            self.device.destroy_command_pool(handles.pool, None);
        }
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> RhiResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe { self.device.begin_command_buffer(cmd, &begin_info) }.map_err(RhiError::from)
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> RhiResult<()> {
        unsafe { self.device.end_command_buffer(cmd) }.map_err(RhiError::from)
    }

    fn reset_command_buffer(&self, handles: &CommandBufferHandles) -> RhiResult<()> {
        unsafe {
            self.device
                .reset_command_pool(handles.pool, vk::CommandPoolResetFlags::empty())?;
            self.device.reset_fences(&[handles.fence])?;
        }
        Ok(())
    }

    fn submit(&self, cmd: vk::CommandBuffer, fence: vk::Fence) -> RhiResult<()> {
        let command_buffers = [cmd];
        let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
        let queue = self.queue.lock();
        unsafe { self.device.queue_submit(*queue, &[submit_info], fence) }.map_err(RhiError::from)
    }

    fn fence_signaled(&self, fence: vk::Fence) -> RhiResult<bool> {
        unsafe { self.device.get_fence_status(fence) }.map_err(RhiError::from)
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> RhiResult<bool> {
        match unsafe { self.device.wait_for_fences(&[fence], true, timeout_ns) } {
            Ok(()) => Ok(true),
            Err(vk::Result::TIMEOUT) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.device.device_wait_idle() }.map_err(RhiError::from)
    }

    fn cmd_bind_pipeline(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        unsafe { self.device.cmd_bind_pipeline(cmd, bind_point, pipeline) };
    }

    fn cmd_bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        sets: &[vk::DescriptorSet],
    ) {
        unsafe {
            self.device
                .cmd_bind_descriptor_sets(cmd, bind_point, layout, first_set, sets, &[])
        };
    }

    fn cmd_push_constants(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .cmd_push_constants(cmd, layout, stages, offset, data)
        };
    }

    fn cmd_dispatch(&self, cmd: vk::CommandBuffer, x: u32, y: u32, z: u32) {
        unsafe { self.device.cmd_dispatch(cmd, x, y, z) };
    }

    fn cmd_begin_rendering(&self, cmd: vk::CommandBuffer, info: &vk::RenderingInfo<'_>) {
        unsafe { self.dynamic_rendering.cmd_begin_rendering(cmd, info) };
    }

    fn cmd_end_rendering(&self, cmd: vk::CommandBuffer) {
        unsafe { self.dynamic_rendering.cmd_end_rendering(cmd) };
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: vk::Viewport) {
        unsafe { self.device.cmd_set_viewport(cmd, 0, &[viewport]) };
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, scissor: vk::Rect2D) {
        unsafe { self.device.cmd_set_scissor(cmd, 0, &[scissor]) };
    }

    fn cmd_bind_vertex_buffer(&self, cmd: vk::CommandBuffer, buffer: vk::Buffer, offset: u64) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(cmd, 0, &[buffer], &[offset])
        };
    }

    fn cmd_bind_index_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        index_type: vk::IndexType,
    ) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(cmd, buffer, offset, index_type)
        };
    }

    fn cmd_draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device
                .cmd_draw(cmd, vertex_count, instance_count, first_vertex, first_instance)
        };
    }

    fn cmd_draw_indexed(
        &self,
        cmd: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                cmd,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            )
        };
    }

    fn cmd_fill_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        size: u64,
        data: u32,
    ) {
        unsafe { self.device.cmd_fill_buffer(cmd, buffer, offset, size, data) };
    }

    fn cmd_update_buffer(
        &self,
        cmd: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: u64,
        data: &[u8],
    ) {
        unsafe { self.device.cmd_update_buffer(cmd, buffer, offset, data) };
    }

    fn cmd_copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.device.cmd_copy_buffer(cmd, src, dst, regions) };
    }

    fn cmd_copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device
                .cmd_copy_buffer_to_image(cmd, src, dst, dst_layout, regions)
        };
    }

    fn cmd_clear_color_image(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: &vk::ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        unsafe {
            self.device
                .cmd_clear_color_image(cmd, image, layout, color, ranges)
        };
    }

    fn cmd_clear_depth_stencil_image(
        &self,
        cmd: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: &vk::ClearDepthStencilValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        unsafe {
            self.device
                .cmd_clear_depth_stencil_image(cmd, image, layout, value, ranges)
        };
    }

    fn cmd_blit_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Image,
        src_layout: vk::ImageLayout,
        dst: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        unsafe {
            self.device
                .cmd_blit_image(cmd, src, src_layout, dst, dst_layout, regions, filter)
        };
    }

    fn cmd_pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                memory_barriers,
                buffer_barriers,
                image_barriers,
            )
        };
    }

    fn cmd_begin_debug_label(&self, cmd: vk::CommandBuffer, label: &str, color: [f32; 4]) {
        if let Some(device) = self.label_device() {
            debug::begin_label(device, cmd, label, color);
        }
    }

    fn cmd_end_debug_label(&self, cmd: vk::CommandBuffer) {
        if let Some(device) = self.label_device() {
            debug::end_label(device, cmd);
        }
    }
}
