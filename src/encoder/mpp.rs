//! Vendor video-engine JPEG adapter (Rockchip MPP class).
//!
//! The adapter owns one vendor context plus two DMA buffers (frame in,
//! packet out) and reconfigures itself whenever the target geometry or
//! pixel format of the incoming frames changes. Resources are acquired in a
//! strict order and released in reverse; any allocation failure unwinds the
//! earlier steps and leaves the adapter unconfigured, so the next frame
//! retries from scratch.
//!
//! The vendor context is not thread-safe: each instance is pinned to one
//! worker thread and never shared.

use std::ptr;
use std::slice;
use std::time::Instant;

use mj_scale::{PixelFormat, ScalePolicy};

use crate::encoder::plan::{
    clamp_quality, frame_buffer_size, packet_buffer_size, plan_config, EncoderConfig,
    EncoderState,
};
use crate::encoder::stage::{apply_overlays, stage_frame};
use crate::error::{EncodeError, Result};
use crate::frame::Frame;
use crate::SharedState;

mod ffi {
    #![allow(non_camel_case_types, dead_code)]

    use std::os::raw::{c_char, c_int, c_void};

    pub type MPP_RET = c_int;
    pub const MPP_OK: MPP_RET = 0;

    pub type MppCtx = *mut c_void;
    pub type MppParam = *mut c_void;
    pub type MppFrame = *mut c_void;
    pub type MppPacket = *mut c_void;
    pub type MppBuffer = *mut c_void;
    pub type MppBufferGroup = *mut c_void;
    pub type MppEncCfg = *mut c_void;

    pub const MPP_CTX_ENC: c_int = 1;
    pub const MPP_VIDEO_CODING_MJPEG: c_int = 8;

    pub const MPP_BUFFER_TYPE_DRM: c_int = 0x3;

    pub const MPP_ENC_SET_CFG: c_int = 0x32_0001;

    pub const MPP_FMT_YUV420SP: c_int = 0x0;
    pub const MPP_FMT_YUV422SP: c_int = 0x2;
    pub const MPP_FMT_YUV444SP: c_int = 0x5;
    pub const MPP_FMT_YUV422_YUYV: c_int = 0x10;
    pub const MPP_FMT_YUV422_UYVY: c_int = 0x11;
    pub const MPP_FMT_RGB888: c_int = 0x1_0001;
    pub const MPP_FMT_BGR888: c_int = 0x1_0002;

    /// Vendor entry-point table returned by `mpp_create`. Only the encoder
    /// and control slots are used; the rest keep the C layout.
    #[repr(C)]
    pub struct MppApi {
        pub size: u32,
        pub version: u32,
        pub decode: Option<unsafe extern "C" fn(MppCtx, MppPacket, *mut MppFrame) -> MPP_RET>,
        pub decode_put_packet: Option<unsafe extern "C" fn(MppCtx, MppPacket) -> MPP_RET>,
        pub decode_get_frame: Option<unsafe extern "C" fn(MppCtx, *mut MppFrame) -> MPP_RET>,
        pub encode: Option<unsafe extern "C" fn(MppCtx, MppFrame, *mut MppPacket) -> MPP_RET>,
        pub encode_put_frame: Option<unsafe extern "C" fn(MppCtx, MppFrame) -> MPP_RET>,
        pub encode_get_packet: Option<unsafe extern "C" fn(MppCtx, *mut MppPacket) -> MPP_RET>,
        pub isp: Option<unsafe extern "C" fn(MppCtx, MppFrame, *mut MppFrame) -> MPP_RET>,
        pub isp_put_frame: Option<unsafe extern "C" fn(MppCtx, MppFrame) -> MPP_RET>,
        pub isp_get_frame: Option<unsafe extern "C" fn(MppCtx, *mut MppFrame) -> MPP_RET>,
        pub poll: Option<unsafe extern "C" fn(MppCtx, c_int, c_int) -> MPP_RET>,
        pub dequeue: Option<unsafe extern "C" fn(MppCtx, c_int, *mut *mut c_void) -> MPP_RET>,
        pub enqueue: Option<unsafe extern "C" fn(MppCtx, c_int, *mut c_void) -> MPP_RET>,
        pub reset: Option<unsafe extern "C" fn(MppCtx) -> MPP_RET>,
        pub control: Option<unsafe extern "C" fn(MppCtx, c_int, MppParam) -> MPP_RET>,
        pub reserv: [u32; 16],
    }

    #[link(name = "rockchip_mpp")]
    extern "C" {
        pub fn mpp_create(ctx: *mut MppCtx, mpi: *mut *mut MppApi) -> MPP_RET;
        pub fn mpp_init(ctx: MppCtx, ctx_type: c_int, coding: c_int) -> MPP_RET;
        pub fn mpp_destroy(ctx: MppCtx) -> MPP_RET;

        pub fn mpp_enc_cfg_init(cfg: *mut MppEncCfg) -> MPP_RET;
        pub fn mpp_enc_cfg_deinit(cfg: MppEncCfg) -> MPP_RET;
        pub fn mpp_enc_cfg_set_s32(cfg: MppEncCfg, name: *const c_char, val: c_int) -> MPP_RET;

        pub fn mpp_buffer_group_get_internal(
            group: *mut MppBufferGroup,
            group_type: c_int,
        ) -> MPP_RET;
        pub fn mpp_buffer_group_put(group: MppBufferGroup) -> MPP_RET;
        pub fn mpp_buffer_get(group: MppBufferGroup, buffer: *mut MppBuffer, size: usize)
            -> MPP_RET;
        pub fn mpp_buffer_put(buffer: MppBuffer) -> MPP_RET;
        pub fn mpp_buffer_get_ptr(buffer: MppBuffer) -> *mut c_void;
        pub fn mpp_buffer_sync_end(buffer: MppBuffer) -> MPP_RET;

        pub fn mpp_frame_init(frame: *mut MppFrame) -> MPP_RET;
        pub fn mpp_frame_deinit(frame: *mut MppFrame);
        pub fn mpp_frame_set_width(frame: MppFrame, width: u32);
        pub fn mpp_frame_set_height(frame: MppFrame, height: u32);
        pub fn mpp_frame_set_hor_stride(frame: MppFrame, stride: u32);
        pub fn mpp_frame_set_ver_stride(frame: MppFrame, stride: u32);
        pub fn mpp_frame_set_fmt(frame: MppFrame, fmt: c_int);
        pub fn mpp_frame_set_buffer(frame: MppFrame, buffer: MppBuffer);
        pub fn mpp_frame_set_eos(frame: MppFrame, eos: c_int);

        pub fn mpp_packet_init_with_buffer(packet: *mut MppPacket, buffer: MppBuffer) -> MPP_RET;
        pub fn mpp_packet_deinit(packet: *mut MppPacket);
        pub fn mpp_packet_set_length(packet: MppPacket, length: usize);
        pub fn mpp_packet_get_pos(packet: MppPacket) -> *mut c_void;
        pub fn mpp_packet_get_length(packet: MppPacket) -> usize;
    }
}

fn vendor_format(format: PixelFormat) -> Result<std::os::raw::c_int> {
    match format {
        PixelFormat::Nv12 => Ok(ffi::MPP_FMT_YUV420SP),
        PixelFormat::Nv16 => Ok(ffi::MPP_FMT_YUV422SP),
        PixelFormat::Nv24 => Ok(ffi::MPP_FMT_YUV444SP),
        PixelFormat::Yuyv => Ok(ffi::MPP_FMT_YUV422_YUYV),
        PixelFormat::Uyvy => Ok(ffi::MPP_FMT_YUV422_UYVY),
        PixelFormat::Rgb24 => Ok(ffi::MPP_FMT_RGB888),
        PixelFormat::Bgr24 => Ok(ffi::MPP_FMT_BGR888),
        PixelFormat::Jpeg => Err(EncodeError::unsupported_format(format)),
    }
}

/// Owned vendor context handle; destroyed on drop.
struct VendorContext {
    ctx: ffi::MppCtx,
    api: *mut ffi::MppApi,
}

// The context is confined to one worker thread but the worker itself moves
// at spawn time.
unsafe impl Send for VendorContext {}

impl VendorContext {
    fn control(&self, cmd: std::os::raw::c_int, param: ffi::MppParam) -> ffi::MPP_RET {
        unsafe {
            match (*self.api).control {
                Some(control) => control(self.ctx, cmd, param),
                None => -1,
            }
        }
    }
}

impl Drop for VendorContext {
    fn drop(&mut self) {
        unsafe {
            ffi::mpp_destroy(self.ctx);
        }
    }
}

/// DMA-capable buffer group; releasing it frees all buffers taken from it.
struct BufferGroup(ffi::MppBufferGroup);

unsafe impl Send for BufferGroup {}

impl Drop for BufferGroup {
    fn drop(&mut self) {
        unsafe {
            ffi::mpp_buffer_group_put(self.0);
        }
    }
}

/// One DMA buffer handle taken from the adapter's group.
struct DmaBuffer {
    handle: ffi::MppBuffer,
    size: usize,
}

unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    fn get(group: &BufferGroup, size: usize, what: &str) -> Result<Self> {
        let mut handle: ffi::MppBuffer = ptr::null_mut();
        let ret = unsafe { ffi::mpp_buffer_get(group.0, &mut handle, size) };
        if ret != ffi::MPP_OK || handle.is_null() {
            return Err(EncodeError::alloc(what, format!("mpp error {}", ret)));
        }
        let buf = Self { handle, size };
        // Zero-fill once so stride padding never leaks into encoded output.
        unsafe {
            let ptr = ffi::mpp_buffer_get_ptr(handle) as *mut u8;
            ptr::write_bytes(ptr, 0, size);
        }
        Ok(buf)
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe {
            let ptr = ffi::mpp_buffer_get_ptr(self.handle) as *mut u8;
            slice::from_raw_parts_mut(ptr, self.size)
        }
    }

    /// Flush dirty CPU cache lines so the engine sees the staged pixels.
    fn sync_end(&self) -> Result<()> {
        let ret = unsafe { ffi::mpp_buffer_sync_end(self.handle) };
        if ret != ffi::MPP_OK {
            return Err(EncodeError::dma_sync(format!("mpp error {}", ret)));
        }
        Ok(())
    }
}

impl Drop for DmaBuffer {
    fn drop(&mut self) {
        unsafe {
            ffi::mpp_buffer_put(self.handle);
        }
    }
}

/// Everything a configured adapter holds. Field order is the reverse of the
/// acquisition order so drop releases packet buffer, frame buffer, group,
/// then context.
struct Resources {
    packet_buf: DmaBuffer,
    frame_buf: DmaBuffer,
    _group: BufferGroup,
    ctx: VendorContext,
}

impl Resources {
    /// Strict allocation sequence; `?` unwinds whatever was already
    /// acquired through the handles' drops.
    fn allocate(cfg: &EncoderConfig, quality: u8) -> Result<Self> {
        let fmt = vendor_format(cfg.format)?;

        // 1-2. Context, initialised for MJPEG encoding.
        let mut raw_ctx: ffi::MppCtx = ptr::null_mut();
        let mut api: *mut ffi::MppApi = ptr::null_mut();
        let ret = unsafe { ffi::mpp_create(&mut raw_ctx, &mut api) };
        if ret != ffi::MPP_OK || raw_ctx.is_null() || api.is_null() {
            return Err(EncodeError::alloc("vendor context", format!("mpp error {}", ret)));
        }
        let ctx = VendorContext { ctx: raw_ctx, api };
        let ret = unsafe { ffi::mpp_init(ctx.ctx, ffi::MPP_CTX_ENC, ffi::MPP_VIDEO_CODING_MJPEG) };
        if ret != ffi::MPP_OK {
            return Err(EncodeError::alloc("MJPEG context", format!("mpp error {}", ret)));
        }

        // 3. Prep + rate-control configuration via a transient config object.
        apply_config(&ctx, cfg, fmt, quality)?;

        // 4. DMA-capable buffer group.
        let mut raw_group: ffi::MppBufferGroup = ptr::null_mut();
        let ret =
            unsafe { ffi::mpp_buffer_group_get_internal(&mut raw_group, ffi::MPP_BUFFER_TYPE_DRM) };
        if ret != ffi::MPP_OK || raw_group.is_null() {
            return Err(EncodeError::alloc("buffer group", format!("mpp error {}", ret)));
        }
        let group = BufferGroup(raw_group);

        // 5-6. Frame buffer sized by format, packet buffer by geometry.
        let frame_buf = DmaBuffer::get(&group, frame_buffer_size(cfg), "frame DMA buffer")?;
        let packet_buf = DmaBuffer::get(&group, packet_buffer_size(cfg), "packet DMA buffer")?;

        Ok(Self {
            packet_buf,
            frame_buf,
            _group: group,
            ctx,
        })
    }
}

fn apply_config(
    ctx: &VendorContext,
    cfg: &EncoderConfig,
    fmt: std::os::raw::c_int,
    quality: u8,
) -> Result<()> {
    let mut enc_cfg: ffi::MppEncCfg = ptr::null_mut();
    let ret = unsafe { ffi::mpp_enc_cfg_init(&mut enc_cfg) };
    if ret != ffi::MPP_OK || enc_cfg.is_null() {
        return Err(EncodeError::alloc("encoder config", format!("mpp error {}", ret)));
    }

    let set = |name: &[u8], val: i32| unsafe {
        ffi::mpp_enc_cfg_set_s32(enc_cfg, name.as_ptr() as *const _, val)
    };
    let mut ret = set(b"prep:width\0", cfg.width as i32);
    ret |= set(b"prep:height\0", cfg.height as i32);
    ret |= set(b"prep:hor_stride\0", cfg.hor_stride as i32);
    ret |= set(b"prep:ver_stride\0", cfg.ver_stride as i32);
    ret |= set(b"prep:format\0", fmt);
    // JPEG rate control is a fixed quantiser; quality is the only knob.
    ret |= set(b"rc:mode\0", 2); // MPP_ENC_RC_MODE_FIXQP
    ret |= set(b"jpeg:quant\0", quality as i32);

    if ret == ffi::MPP_OK {
        ret = ctx.control(ffi::MPP_ENC_SET_CFG, enc_cfg);
    }
    unsafe {
        ffi::mpp_enc_cfg_deinit(enc_cfg);
    }
    if ret != ffi::MPP_OK {
        return Err(EncodeError::alloc("encoder config", format!("mpp error {}", ret)));
    }
    Ok(())
}

/// Vendor frame descriptor with scoped deinit.
struct FrameDesc(ffi::MppFrame);

impl FrameDesc {
    fn new() -> Result<Self> {
        let mut frame: ffi::MppFrame = ptr::null_mut();
        let ret = unsafe { ffi::mpp_frame_init(&mut frame) };
        if ret != ffi::MPP_OK || frame.is_null() {
            return Err(EncodeError::submit(format!("frame descriptor: mpp error {}", ret)));
        }
        Ok(Self(frame))
    }
}

impl Drop for FrameDesc {
    fn drop(&mut self) {
        unsafe {
            ffi::mpp_frame_deinit(&mut self.0);
        }
    }
}

/// Vendor packet descriptor bound to the packet DMA buffer.
struct PacketDesc(ffi::MppPacket);

impl PacketDesc {
    fn with_buffer(buf: &DmaBuffer) -> Result<Self> {
        let mut packet: ffi::MppPacket = ptr::null_mut();
        let ret = unsafe { ffi::mpp_packet_init_with_buffer(&mut packet, buf.handle) };
        if ret != ffi::MPP_OK || packet.is_null() {
            return Err(EncodeError::retrieve(format!(
                "packet descriptor: mpp error {}",
                ret
            )));
        }
        unsafe {
            ffi::mpp_packet_set_length(packet, 0);
        }
        Ok(Self(packet))
    }
}

impl Drop for PacketDesc {
    fn drop(&mut self) {
        unsafe {
            ffi::mpp_packet_deinit(&mut self.0);
        }
    }
}

/// The hardware JPEG adapter. One instance per worker thread.
pub struct MppJpegEncoder {
    name: String,
    quality: u8,
    policy: ScalePolicy,
    state: EncoderState,
    res: Option<Resources>,
    shared: SharedState,
}

impl MppJpegEncoder {
    pub fn new(
        name: impl Into<String>,
        quality: u8,
        policy: ScalePolicy,
        shared: SharedState,
    ) -> Self {
        Self {
            name: name.into(),
            quality: clamp_quality(quality),
            policy,
            state: EncoderState::Uninit,
            res: None,
            shared,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn configured(&self) -> Option<&EncoderConfig> {
        self.state.config()
    }

    pub fn compress(&mut self, src: &Frame, out: &mut Frame) -> Result<()> {
        let begin = Instant::now();
        src.check_raw()?;
        let cfg = plan_config(self.policy, src)?;

        if self.res.is_none() || !self.state.accepts(&cfg) {
            self.teardown();
            let res = Resources::allocate(&cfg, self.quality).map_err(|e| {
                EncodeError::reconfigure_from(
                    format!("{}x{} {}", cfg.width, cfg.height, cfg.format),
                    e,
                )
            })?;
            self.res = Some(res);
            self.state = EncoderState::Ready(cfg);
            log::debug!(
                "{}: configured {}x{} {} (strides {}x{})",
                self.name,
                cfg.width,
                cfg.height,
                cfg.format,
                cfg.hor_stride,
                cfg.ver_stride
            );
        }
        let Some(res) = self.res.as_mut() else {
            return Err(EncodeError::reconfigure("adapter has no resources"));
        };

        stage_frame(res.frame_buf.as_mut_slice(), src, &cfg)?;
        apply_overlays(res.frame_buf.as_mut_slice(), src, &cfg, &self.shared)?;
        // Mandatory before submission: the engine reads through DMA, not the
        // CPU cache.
        res.frame_buf.sync_end()?;

        let frame = FrameDesc::new()?;
        unsafe {
            ffi::mpp_frame_set_width(frame.0, cfg.width);
            ffi::mpp_frame_set_height(frame.0, cfg.height);
            ffi::mpp_frame_set_hor_stride(frame.0, cfg.hor_stride);
            ffi::mpp_frame_set_ver_stride(frame.0, cfg.ver_stride);
            ffi::mpp_frame_set_fmt(frame.0, vendor_format(cfg.format)?);
            ffi::mpp_frame_set_buffer(frame.0, res.frame_buf.handle);
            ffi::mpp_frame_set_eos(frame.0, 0);
        }
        let packet = PacketDesc::with_buffer(&res.packet_buf)?;

        let api = res.ctx.api;
        let put_frame = unsafe { (*api).encode_put_frame }
            .ok_or_else(|| EncodeError::submit("vendor api lacks encode_put_frame"))?;
        let get_packet = unsafe { (*api).encode_get_packet }
            .ok_or_else(|| EncodeError::retrieve("vendor api lacks encode_get_packet"))?;

        let ret = unsafe { put_frame(res.ctx.ctx, frame.0) };
        if ret != ffi::MPP_OK {
            return Err(EncodeError::submit(format!("mpp error {}", ret)));
        }
        let mut out_packet = packet.0;
        let ret = unsafe { get_packet(res.ctx.ctx, &mut out_packet) };
        if ret != ffi::MPP_OK || out_packet.is_null() {
            return Err(EncodeError::retrieve(format!("mpp error {}", ret)));
        }

        let len = unsafe { ffi::mpp_packet_get_length(out_packet) };
        if len == 0 {
            return Err(EncodeError::EmptyPacket);
        }
        let pos = unsafe { ffi::mpp_packet_get_pos(out_packet) } as *const u8;
        out.bytes.clear();
        out.bytes
            .extend_from_slice(unsafe { slice::from_raw_parts(pos, len) });
        out.used = len;
        out.width = cfg.width;
        out.height = cfg.height;
        out.stride = 0;
        out.format = PixelFormat::Jpeg;
        out.is_key = true;
        out.gop = 0;
        out.capture_ts = src.capture_ts;
        out.encode_begin_ts = Some(begin);
        out.encode_end_ts = Some(Instant::now());
        Ok(())
        // `packet` then `frame` deinit here, reverse of acquisition.
    }

    /// Release everything and return to the unconfigured state.
    fn teardown(&mut self) {
        self.state = EncoderState::Uninit;
        self.res = None;
    }
}

impl Drop for MppJpegEncoder {
    fn drop(&mut self) {
        self.teardown();
    }
}
