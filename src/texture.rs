// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! A single GPU texture.

A [`GpuTexture`] wraps an [`Image`] until the image reaches the device, then
owns the device handle.  Uploads come in two flavors:

- [`GpuTexture::upload`] / [`GpuTexture::upload_surface`] pick the path:
  unmanaged textures (and `instant_upload` options) upload on the spot,
  cache-managed textures are queued for the render thread.
- [`GpuTexture::upload_now`] / [`GpuTexture::upload_surface_now`] talk to the
  device directly and must run on the thread that owns it.

After a non-editable upload the CPU buffer is dropped; the device is the only
copy from then on.

```
use std::sync::Arc;
use texture_manager::imp::SoftwareDevice;
use texture_manager::options::TextureOptions;
use texture_manager::session::{Session, SessionConfig};
use texture_manager::texture::GpuTexture;

let session = Session::new(Arc::new(SoftwareDevice::new()), SessionConfig::default());
let texture = GpuTexture::create_solid(&session, 8, 8, 4).unwrap();
texture.upload(TextureOptions::default());
assert!(texture.handle().is_some());
assert!(!texture.has_cpu_buffer());
```
*/

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Error;
use crate::imp::{Axis, FilterKind, ImageUpload, TextureId, UnpackLayout};
use crate::options::{DataType, Filter, Format, TextureOptions};
use crate::pixel_formats::{self, ClientFormat};
use crate::session::Session;
use crate::software::{Image, ImageDecoder, Surface};
use crate::upload_queue::{UploadPayload, UploadRequest};

#[derive(Debug)]
struct TextureState {
    image: Option<Image>,
    width: u32,
    height: u32,
    bytes_per_pixel: u32,
    handle: Option<TextureId>,
    options: Option<TextureOptions>,
}

/// A texture that lives on the CPU, the device, or both.
#[derive(Debug)]
pub struct GpuTexture {
    session: Arc<Session>,
    serial: u64,
    managed: AtomicBool,
    state: Mutex<TextureState>,
}

impl GpuTexture {
    fn new_inner(session: &Arc<Session>, image: Option<Image>, width: u32, height: u32, bytes_per_pixel: u32) -> Arc<Self> {
        Arc::new(GpuTexture {
            session: session.clone(),
            serial: session.next_serial(),
            managed: AtomicBool::new(false),
            state: Mutex::new(TextureState {
                image,
                width,
                height,
                bytes_per_pixel,
                handle: None,
                options: None,
            }),
        })
    }

    /// Wraps an existing CPU image.
    pub fn from_image(session: &Arc<Session>, image: Image) -> Arc<Self> {
        let (width, height, bpp) = (image.width(), image.height(), image.bytes_per_pixel());
        Self::new_inner(session, Some(image), width, height, bpp)
    }

    /// A zero-filled texture.
    pub fn with_size(session: &Arc<Session>, width: u32, height: u32, bytes_per_pixel: u32) -> Result<Arc<Self>, Error> {
        Ok(Self::from_image(session, Image::new(width, height, bytes_per_pixel)?))
    }

    /// A diagnostic checkerboard, used in place of images that failed to load.
    pub fn create_solid(session: &Arc<Session>, width: u32, height: u32, bytes_per_pixel: u32) -> Result<Arc<Self>, Error> {
        Ok(Self::from_image(
            session,
            Image::checkerboard(width, height, bytes_per_pixel)?,
        ))
    }

    /// Decodes `path` with `decoder`.
    pub fn from_path(session: &Arc<Session>, path: &Path, decoder: &dyn ImageDecoder) -> Result<Arc<Self>, Error> {
        let image = decoder.decode(path).map_err(|source| Error::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(session, image))
    }

    /// A texture with no CPU buffer, to be filled by a surface upload.
    pub(crate) fn for_surface(session: &Arc<Session>) -> Arc<Self> {
        Self::new_inner(session, None, 0, 0, 4)
    }

    fn lock(&self) -> MutexGuard<'_, TextureState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Identity of this instance within its session.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn is_managed(&self) -> bool {
        self.managed.load(Ordering::Acquire)
    }

    /// Managed textures defer their uploads to the session's queue.
    pub fn set_managed(&self, managed: bool) {
        self.managed.store(managed, Ordering::Release);
    }

    pub fn width(&self) -> u32 {
        self.lock().width
    }

    pub fn height(&self) -> u32 {
        self.lock().height
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.lock().bytes_per_pixel
    }

    /// The device handle, once uploaded.
    pub fn handle(&self) -> Option<TextureId> {
        self.lock().handle
    }

    pub fn has_cpu_buffer(&self) -> bool {
        self.lock().image.is_some()
    }

    /// Options of the last image upload.
    pub fn options(&self) -> Option<TextureOptions> {
        self.lock().options
    }

    pub fn with_image<R>(&self, f: impl FnOnce(Option<&Image>) -> R) -> R {
        f(self.lock().image.as_ref())
    }

    /// Edits the CPU buffer.  Changes reach the device on the next upload.
    pub fn with_image_mut<R>(&self, f: impl FnOnce(Option<&mut Image>) -> R) -> R {
        f(self.lock().image.as_mut())
    }

    /// Uploads now, or queues the upload when this texture is cache-managed.
    ///
    /// A queued upload has not happened when this returns.
    pub fn upload(self: &Arc<Self>, options: TextureOptions) {
        if options.instant_upload || !self.is_managed() {
            self.upload_now(&options);
        } else {
            self.session
                .upload_queue()
                .enqueue(UploadRequest::new(self, UploadPayload::Options(options)));
        }
    }

    /// Uploads a raw surface now, or queues it when this texture is cache-managed.
    ///
    /// The surface dimensions are recorded right away.  Whichever path runs
    /// the upload releases the surface.
    pub fn upload_surface(self: &Arc<Self>, surface: Surface) {
        {
            let mut state = self.lock();
            state.width = surface.width();
            state.height = surface.height();
        }
        if self.is_managed() {
            self.session
                .upload_queue()
                .enqueue(UploadRequest::new(self, UploadPayload::Surface(surface)));
        } else {
            self.upload_surface_now(surface);
        }
    }

    pub(crate) fn perform(&self, payload: UploadPayload) {
        match payload {
            UploadPayload::Options(options) => self.upload_now(&options),
            UploadPayload::Surface(surface) => self.upload_surface_now(surface),
        }
    }

    /// Uploads the CPU buffer with `options`, replacing any prior device texture.
    pub fn upload_now(&self, options: &TextureOptions) {
        let device = self.session.device();
        let mut guard = self.lock();
        let state = &mut *guard;
        let Some(image) = state.image.as_ref() else {
            logwise::warn_sync!(
                "texture {serial} has no CPU buffer to upload",
                serial = self.serial
            );
            return;
        };
        let (width, height) = (image.width(), image.height());
        if let Some(old) = state.handle.take() {
            device.delete_texture(old);
        }

        let id = device.create_texture();
        let upload = ImageUpload {
            client_format: pixel_formats::client_format(options.format, options.data_type),
            storage_format: pixel_formats::storage_format(options),
            width,
            height,
            data_type: options.data_type,
            layout: UnpackLayout::PACKED,
            data: image.as_bytes(),
        };
        device.upload_image(id, &upload);
        device.set_wrap(id, Axis::S, pixel_formats::wrap(options.wrap_s));
        device.set_wrap(id, Axis::T, pixel_formats::wrap(options.wrap_t));
        device.set_filter(id, FilterKind::Min, pixel_formats::filter(options.min_filter));
        device.set_filter(id, FilterKind::Mag, pixel_formats::filter(options.mag_filter));

        if options.should_compress() {
            if device.is_compressed(id) {
                logwise::info_sync!(
                    "compressed texture of {width}x{height}",
                    width = width,
                    height = height
                );
            } else {
                logwise::warn_sync!(
                    "couldn't compress texture of {width}x{height}",
                    width = width,
                    height = height
                );
            }
        }
        if !options.editable {
            state.image = None;
        }
        if options.wants_mipmaps() {
            device.generate_mipmaps(id);
        }
        state.width = width;
        state.height = height;
        state.handle = Some(id);
        state.options = Some(*options);
    }

    /// Uploads a raw surface, replacing any prior device texture and CPU buffer.
    ///
    /// Channel order comes from the surface format; row padding from its pitch.
    /// Mipmaps are always generated.
    pub fn upload_surface_now(&self, surface: Surface) {
        if surface.width() == 0 || surface.height() == 0 {
            return;
        }
        let format = surface.format();
        let Some(client_format) = format.client_format() else {
            logwise::warn_sync!(
                "unsupported surface format {format}",
                format = logwise::privacy::LogIt(&format)
            );
            return;
        };
        let device = self.session.device();
        let mut state = self.lock();
        state.image = None;
        state.width = surface.width();
        state.height = surface.height();
        state.bytes_per_pixel = 4;
        if let Some(old) = state.handle.take() {
            device.delete_texture(old);
        }

        let id = device.create_texture();
        let upload = ImageUpload {
            client_format,
            storage_format: pixel_formats::translate(Format::Rgba),
            width: surface.width(),
            height: surface.height(),
            data_type: DataType::UnsignedByte,
            layout: surface.unpack_layout(),
            data: surface.pixels(),
        };
        device.upload_image(id, &upload);
        device.set_filter(id, FilterKind::Min, pixel_formats::filter(Filter::LinearMipmap));
        device.set_filter(id, FilterKind::Mag, pixel_formats::filter(Filter::Linear));
        device.generate_mipmaps(id);
        state.handle = Some(id);
        drop(state);
        drop(surface);
    }

    /// Makes this texture current.  Does nothing before the first upload.
    pub fn bind(&self) {
        match self.handle() {
            Some(id) => self.session.device().bind_texture(id),
            None => {
                logwise::trace_sync!(
                    "bind of texture {serial} without device storage",
                    serial = self.serial
                );
            }
        }
    }

    /// Regenerates the mip chain from level 0.
    pub fn gen_mipmaps(&self) {
        if let Some(id) = self.handle() {
            self.session.device().generate_mipmaps(id);
        }
    }

    /// Releases the device texture.  A retained CPU buffer can be uploaded again.
    pub fn delete_gpu(&self) {
        let handle = self.lock().handle.take();
        if let Some(id) = handle {
            self.session.device().delete_texture(id);
        }
    }

    /// Reads the device texture back as RGBA8 and writes it to `path` as PNG.
    pub fn export_to_file(&self, path: &Path) -> Result<(), Error> {
        let (handle, width, height) = {
            let state = self.lock();
            (state.handle, state.width, state.height)
        };
        let Some(id) = handle else {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "texture has no device storage",
            )));
        };
        let pixels = self.session.device().read_pixels(id, ClientFormat::Rgba8);
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("read back {} bytes for a {width}x{height} texture", pixels.len()),
            )));
        }
        Image::from_bytes(width, height, 4, pixels).to_file(path)
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(id) = state.handle.take() {
            self.session.device().delete_texture(id);
        }
        if self.managed.load(Ordering::Acquire) {
            let purged = self.session.upload_queue().remove_all_for(self.serial);
            if purged > 0 {
                logwise::trace_sync!(
                    "purged {purged} pending uploads of texture {serial}",
                    purged = purged,
                    serial = self.serial
                );
            }
        }
    }
}
