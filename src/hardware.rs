//! Hardware-accelerated decoding support.
//!
//! Creating a hardware device context is expensive (driver handshakes, and
//! on Android a round trip through the Java `MediaCodec` layer), so the
//! crate keeps at most one per [`HardwareContextManager`] and shares it by
//! reference with every decoder that opts into hardware decoding. Both
//! outcomes of the first attempt are remembered: a device that failed to
//! come up is not retried on every call, only after
//! [`clear`](HardwareContextManager::clear).
//!
//! # Platform Support
//!
//! Availability depends on both the FFmpeg build and the host's drivers.
//! When no device can be created, decoding silently falls back to software.

use std::{
    ffi::c_void,
    fmt::{Debug, Formatter, Result as FmtResult},
    ptr::{self, NonNull},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ffmpeg_next::{codec::context::Context as CodecContext, frame::Video as VideoFrame};
use ffmpeg_sys_next::{AVBufferRef, AVCodecContext, AVHWDeviceType};

use crate::error::ThumbnailError;

/// Hardware device types the crate knows how to request.
///
/// Not every type exists on every platform; see
/// [`available_hardware_devices`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardwareDeviceType {
    /// NVIDIA CUDA (Linux, Windows).
    Cuda,
    /// Video Acceleration API (Linux).
    Vaapi,
    /// DirectX Video Acceleration 2 (Windows).
    Dxva2,
    /// Direct3D 11 Video Acceleration (Windows).
    D3d11va,
    /// Apple VideoToolbox (macOS, iOS).
    VideoToolbox,
    /// Intel Quick Sync Video (cross-platform).
    Qsv,
    /// Android MediaCodec.
    MediaCodec,
}

impl HardwareDeviceType {
    const ALL: [HardwareDeviceType; 7] = [
        HardwareDeviceType::Cuda,
        HardwareDeviceType::Vaapi,
        HardwareDeviceType::Dxva2,
        HardwareDeviceType::D3d11va,
        HardwareDeviceType::VideoToolbox,
        HardwareDeviceType::Qsv,
        HardwareDeviceType::MediaCodec,
    ];

    /// FFmpeg's name for the device type (e.g. `"mediacodec"`).
    pub fn name(self) -> &'static str {
        match self {
            HardwareDeviceType::Cuda => "cuda",
            HardwareDeviceType::Vaapi => "vaapi",
            HardwareDeviceType::Dxva2 => "dxva2",
            HardwareDeviceType::D3d11va => "d3d11va",
            HardwareDeviceType::VideoToolbox => "videotoolbox",
            HardwareDeviceType::Qsv => "qsv",
            HardwareDeviceType::MediaCodec => "mediacodec",
        }
    }

    /// Parse FFmpeg's device name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        Self::ALL.into_iter().find(|device| device.name() == name)
    }

    /// The device type normally present on the target platform.
    pub fn platform_default() -> Self {
        if cfg!(target_os = "android") {
            HardwareDeviceType::MediaCodec
        } else if cfg!(any(target_os = "macos", target_os = "ios")) {
            HardwareDeviceType::VideoToolbox
        } else if cfg!(target_os = "windows") {
            HardwareDeviceType::D3d11va
        } else {
            HardwareDeviceType::Vaapi
        }
    }

    fn to_av_hw_device_type(self) -> AVHWDeviceType {
        match self {
            HardwareDeviceType::Cuda => AVHWDeviceType::AV_HWDEVICE_TYPE_CUDA,
            HardwareDeviceType::Vaapi => AVHWDeviceType::AV_HWDEVICE_TYPE_VAAPI,
            HardwareDeviceType::Dxva2 => AVHWDeviceType::AV_HWDEVICE_TYPE_DXVA2,
            HardwareDeviceType::D3d11va => AVHWDeviceType::AV_HWDEVICE_TYPE_D3D11VA,
            HardwareDeviceType::VideoToolbox => AVHWDeviceType::AV_HWDEVICE_TYPE_VIDEOTOOLBOX,
            HardwareDeviceType::Qsv => AVHWDeviceType::AV_HWDEVICE_TYPE_QSV,
            HardwareDeviceType::MediaCodec => AVHWDeviceType::AV_HWDEVICE_TYPE_MEDIACODEC,
        }
    }

    fn from_av_hw_device_type(device_type: AVHWDeviceType) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|device| device.to_av_hw_device_type() == device_type)
    }
}

/// List the hardware device types compiled into the FFmpeg build.
pub fn available_hardware_devices() -> Vec<HardwareDeviceType> {
    let mut devices = Vec::new();
    let mut device_type = AVHWDeviceType::AV_HWDEVICE_TYPE_NONE;

    loop {
        device_type = unsafe { ffmpeg_sys_next::av_hwdevice_iterate_types(device_type) };
        if device_type == AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
            break;
        }
        if let Some(device) = HardwareDeviceType::from_av_hw_device_type(device_type) {
            devices.push(device);
        }
    }

    devices
}

/// An owned reference to an FFmpeg hardware device context.
///
/// Dropping it releases this reference; decoders bound to the device hold
/// their own.
pub struct HardwareDevice {
    buffer: NonNull<AVBufferRef>,
    device_type: HardwareDeviceType,
}

// The device context is reference counted and internally synchronised by
// FFmpeg; we only ever take new references to it.
unsafe impl Send for HardwareDevice {}
unsafe impl Sync for HardwareDevice {}

impl HardwareDevice {
    /// Create a device context for `device_type`.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Ffmpeg`] if the FFmpeg build or the host
    /// cannot provide the device.
    pub fn create(device_type: HardwareDeviceType) -> Result<Self, ThumbnailError> {
        let mut buffer: *mut AVBufferRef = ptr::null_mut();

        let result = unsafe {
            ffmpeg_sys_next::av_hwdevice_ctx_create(
                &mut buffer,
                device_type.to_av_hw_device_type(),
                ptr::null(),
                ptr::null_mut(),
                0,
            )
        };

        match NonNull::new(buffer) {
            Some(buffer) if result >= 0 => Ok(Self {
                buffer,
                device_type,
            }),
            _ => Err(ThumbnailError::Ffmpeg(format!(
                "Failed to create {} device context (result={result})",
                device_type.name()
            ))),
        }
    }

    /// The kind of device this context drives.
    pub fn device_type(&self) -> HardwareDeviceType {
        self.device_type
    }

    /// Bind a codec context to this device. Must happen before the decoder
    /// is opened.
    pub(crate) fn attach(&self, codec_context: &mut CodecContext) -> Result<(), ThumbnailError> {
        let reference = unsafe { ffmpeg_sys_next::av_buffer_ref(self.buffer.as_ptr()) };
        if reference.is_null() {
            return Err(ThumbnailError::CodecOpenFailure(
                "Failed to reference hardware device context".to_string(),
            ));
        }

        unsafe {
            let context_pointer = codec_context.as_mut_ptr() as *mut AVCodecContext;
            if !(*context_pointer).hw_device_ctx.is_null() {
                ffmpeg_sys_next::av_buffer_unref(&mut (*context_pointer).hw_device_ctx);
            }
            (*context_pointer).hw_device_ctx = reference;
        }
        Ok(())
    }
}

impl Debug for HardwareDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HardwareDevice")
            .field("device_type", &self.device_type)
            .finish_non_exhaustive()
    }
}

impl Drop for HardwareDevice {
    fn drop(&mut self) {
        let mut buffer = self.buffer.as_ptr();
        unsafe { ffmpeg_sys_next::av_buffer_unref(&mut buffer) };
    }
}

/// Returns `true` if the frame lives in a hardware surface.
pub(crate) fn is_hardware_frame(frame: &VideoFrame) -> bool {
    unsafe { !(*frame.as_ptr()).hw_frames_ctx.is_null() }
}

/// Copy a hardware frame into system memory, keeping its timestamps.
pub(crate) fn transfer_hardware_frame(
    hardware_frame: &VideoFrame,
) -> Result<VideoFrame, ThumbnailError> {
    let mut software_frame = VideoFrame::empty();

    let result = unsafe {
        ffmpeg_sys_next::av_hwframe_transfer_data(
            software_frame.as_mut_ptr(),
            hardware_frame.as_ptr(),
            0,
        )
    };

    if result < 0 {
        return Err(ThumbnailError::ConversionFailure(format!(
            "Hardware frame transfer failed (result={result})"
        )));
    }

    unsafe {
        let source = hardware_frame.as_ptr();
        let target = software_frame.as_mut_ptr();
        (*target).pts = (*source).pts;
        (*target).best_effort_timestamp = (*source).best_effort_timestamp;
    }
    Ok(software_frame)
}

type DeviceFactory<H> = Box<dyn Fn() -> Result<H, ThumbnailError> + Send + Sync>;

struct HardwareState<H> {
    initialized: bool,
    available: bool,
    device: Option<Arc<H>>,
}

/// Lazily created, shared hardware device context.
///
/// The device type is generic so the lazy-init bookkeeping can be tested
/// without a GPU; production code uses the default [`HardwareDevice`].
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// use thumbgrab::{HardwareContextManager, ThumbnailError};
///
/// let attempts = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&attempts);
/// let manager = HardwareContextManager::<()>::with_factory("fake", move || {
///     counter.fetch_add(1, Ordering::SeqCst);
///     Err(ThumbnailError::Ffmpeg("no device".into()))
/// });
///
/// assert!(!manager.ensure_available());
/// assert!(!manager.ensure_available());
/// assert_eq!(attempts.load(Ordering::SeqCst), 1);
/// ```
pub struct HardwareContextManager<H = HardwareDevice> {
    label: String,
    factory: DeviceFactory<H>,
    state: Mutex<HardwareState<H>>,
}

impl HardwareContextManager<HardwareDevice> {
    /// A manager that creates a device of `device_type` on first use.
    pub fn new(device_type: HardwareDeviceType) -> Self {
        Self::with_factory(device_type.name(), move || {
            HardwareDevice::create(device_type)
        })
    }

    /// A manager for [`HardwareDeviceType::platform_default`].
    pub fn platform_default() -> Self {
        Self::new(HardwareDeviceType::platform_default())
    }
}

impl<H> HardwareContextManager<H> {
    /// A manager that calls `factory` to create the device on first use.
    pub fn with_factory<F>(label: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<H, ThumbnailError> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            factory: Box::new(factory),
            state: Mutex::new(HardwareState {
                initialized: false,
                available: false,
                device: None,
            }),
        }
    }

    /// Make sure a device exists, creating it on the first call.
    ///
    /// Returns whether hardware decoding is available. After the first
    /// attempt the answer is cached until [`clear`](Self::clear).
    pub fn ensure_available(&self) -> bool {
        let mut state = self.lock();
        self.initialize_locked(&mut state);
        state.available
    }

    /// A shared reference to the device, creating it if this is the first
    /// request. `None` if hardware decoding is unavailable.
    pub fn acquire(&self) -> Option<Arc<H>> {
        let mut state = self.lock();
        self.initialize_locked(&mut state);
        state.device.clone()
    }

    /// Whether creation has been attempted since construction or the last
    /// [`clear`](Self::clear).
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Whether a device is currently held.
    pub fn is_available(&self) -> bool {
        self.lock().available
    }

    /// Release the held device and forget the previous outcome, forcing
    /// detection on the next request.
    pub fn clear(&self) {
        let mut state = self.lock();
        if state.initialized {
            log::debug!("Releasing {} hardware context", self.label);
        }
        state.device = None;
        state.available = false;
        state.initialized = false;
    }

    fn initialize_locked(&self, state: &mut HardwareState<H>) {
        if state.initialized {
            return;
        }
        state.initialized = true;

        match (self.factory)() {
            Ok(device) => {
                log::debug!("{} hardware context created", self.label);
                state.device = Some(Arc::new(device));
                state.available = true;
            }
            Err(error) => {
                log::warn!(
                    "{} hardware decoding unavailable, using software: {error}",
                    self.label
                );
                state.device = None;
                state.available = false;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HardwareState<H>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<H> Debug for HardwareContextManager<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.lock();
        f.debug_struct("HardwareContextManager")
            .field("label", &self.label)
            .field("initialized", &state.initialized)
            .field("available", &state.available)
            .finish()
    }
}

/// Host handles some hardware decoders need before a device can be created.
///
/// On Android, libavcodec's MediaCodec wrapper needs the process `JavaVM`
/// and, for some devices, the application context. Elsewhere this carries
/// nothing.
pub struct PlatformContext {
    java_vm: *mut c_void,
    application_context: *mut c_void,
}

// Both handles are process-global JNI references.
unsafe impl Send for PlatformContext {}
unsafe impl Sync for PlatformContext {}

impl Default for PlatformContext {
    fn default() -> Self {
        Self::none()
    }
}

impl Debug for PlatformContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("PlatformContext")
            .field("has_java_vm", &!self.java_vm.is_null())
            .field("has_application_context", &!self.application_context.is_null())
            .finish()
    }
}

impl PlatformContext {
    /// No host handles; sufficient on desktop platforms.
    pub fn none() -> Self {
        Self {
            java_vm: ptr::null_mut(),
            application_context: ptr::null_mut(),
        }
    }

    /// Android handles.
    ///
    /// # Safety
    ///
    /// `java_vm` must be the process `JavaVM*` and `application_context`
    /// either null or a JNI global reference that outlives every extraction.
    pub unsafe fn android(java_vm: *mut c_void, application_context: *mut c_void) -> Self {
        Self {
            java_vm,
            application_context,
        }
    }

    /// Hand the handles to libavcodec.
    pub(crate) fn install(&self) -> Result<(), ThumbnailError> {
        #[cfg(target_os = "android")]
        {
            if !self.java_vm.is_null() {
                let result = unsafe { android::av_jni_set_java_vm(self.java_vm, ptr::null_mut()) };
                if result < 0 {
                    return Err(ThumbnailError::Ffmpeg(format!(
                        "av_jni_set_java_vm failed (result={result})"
                    )));
                }
            }
            if !self.application_context.is_null() {
                let result = unsafe {
                    android::av_jni_set_android_app_ctx(self.application_context, ptr::null_mut())
                };
                if result < 0 {
                    return Err(ThumbnailError::Ffmpeg(format!(
                        "av_jni_set_android_app_ctx failed (result={result})"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(target_os = "android")]
mod android {
    use std::ffi::{c_int, c_void};

    unsafe extern "C" {
        pub fn av_jni_set_java_vm(vm: *mut c_void, log_ctx: *mut c_void) -> c_int;
        pub fn av_jni_set_android_app_ctx(app_ctx: *mut c_void, log_ctx: *mut c_void) -> c_int;
    }
}
