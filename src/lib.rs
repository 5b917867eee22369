/*! texture_manager owns the lifecycle of GPU textures for a renderer: it decodes
and deduplicates them, defers their uploads to the render thread, and tears them
down in a well-defined order.

# Architecture

| Layer                | Type                                   | Role                                                        |
|----------------------|----------------------------------------|-------------------------------------------------------------|
| Pixel data           | [`software::Image`], [`software::Surface`] | CPU buffers, before any device is involved                |
| Format translation   | [`pixel_formats`]                      | Portable formats, filters, and wraps to native enums       |
| Device               | [`imp::Device`]                        | Opaque graphics interface; software and wgpu backends      |
| Resources            | [`texture::GpuTexture`], [`texture_array::TextureArray`] | Own a CPU buffer, then a device handle     |
| Hand-off             | [`upload_queue::UploadQueue`]          | Producer threads enqueue, the render thread drains         |
| Deduplication        | [`cache::TextureCache`]                | Shared textures by path+options and by text                |
| Context              | [`session::Session`]                   | One device, one queue, one configuration                   |

# Threads

Any thread may build textures and ask the cache for them.  Only the thread that
owns the device performs uploads: it calls [`cache::TextureCache::tick`] once a
frame, which drains one pending request.  The upload queue is the only point
where the two sides meet.

# Example

```
use std::path::Path;
use std::sync::Arc;
use texture_manager::cache::TextureCache;
use texture_manager::imp::SoftwareDevice;
use texture_manager::options::TextureOptions;
use texture_manager::session::{Session, SessionConfig};

let session = Session::new(Arc::new(SoftwareDevice::new()), SessionConfig::default());
let cache = TextureCache::new(session);

// a missing file turns into a placeholder, never an error
let texture = cache.get_or_load(Path::new("missing.png"), TextureOptions::default()).unwrap();
assert_eq!((texture.width(), texture.height()), (8, 8));
assert!(texture.handle().is_none());

// render thread
while cache.tick() {}
assert!(texture.handle().is_some());

cache.shutdown();
```

# Backends

[`imp::SoftwareDevice`] keeps textures in memory and records every call; it is
always available.  With the default `backend_wgpu` feature, `imp::WgpuDevice`
drives a real `wgpu::Device`.
*/

pub mod cache;
pub mod error;
pub mod imp;
pub mod options;
pub mod pixel_formats;
pub mod session;
pub mod software;
pub mod text;
pub mod texture;
pub mod texture_array;
pub mod upload_queue;

pub use error::Error;
