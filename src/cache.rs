// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Deduplicating texture cache.

[`TextureCache`] hands out shared [`GpuTexture`]s keyed by content: image
textures by path and options, text textures by the rendered string (and, under
the default [`TextKeyPolicy`], font and color).  Cached textures are
cache-managed, so their uploads go through the session's upload queue and
reach the device when the render thread calls [`TextureCache::tick`].

Entries are never evicted.  The working set of a game's textures is small and
reused, so the cache simply lives as long as its session.

Call [`TextureCache::shutdown`] before tearing down whatever produced the
surfaces still waiting in the queue.
*/

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Error;
use crate::options::TextureOptions;
use crate::session::{Session, TextKeyPolicy};
use crate::software::{Image, ImageDecoder, PngDecoder};
use crate::text::{Color, Font, FontId};
use crate::texture::GpuTexture;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PathKey {
    path: PathBuf,
    options: TextureOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TextKey {
    text: String,
    font: Option<FontId>,
    color: Option<[u8; 4]>,
}

#[derive(Debug, Default)]
struct Maps {
    paths: HashMap<PathKey, Arc<GpuTexture>>,
    texts: HashMap<TextKey, Arc<GpuTexture>>,
    white: Option<Arc<GpuTexture>>,
}

/// Shared textures keyed by path+options or by text.
#[derive(Debug)]
pub struct TextureCache {
    session: Arc<Session>,
    decoder: Box<dyn ImageDecoder>,
    maps: Mutex<Maps>,
}

impl TextureCache {
    /// A cache decoding PNG files.
    pub fn new(session: Arc<Session>) -> Self {
        Self::with_decoder(session, PngDecoder)
    }

    pub fn with_decoder<D: ImageDecoder + 'static>(session: Arc<Session>, decoder: D) -> Self {
        TextureCache {
            session,
            decoder: Box::new(decoder),
            maps: Mutex::new(Maps::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Maps> {
        self.maps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The texture for `path` with `options`, loading it on first request.
    ///
    /// A file that is missing or fails to decode yields a checkerboard
    /// placeholder instead of an error.  Only running out of memory for the
    /// placeholder itself is reported.
    pub fn get_or_load(&self, path: &Path, options: TextureOptions) -> Result<Arc<GpuTexture>, Error> {
        let key = PathKey {
            path: path.to_path_buf(),
            options,
        };
        if let Some(texture) = self.lock().paths.get(&key) {
            return Ok(texture.clone());
        }

        let texture = match GpuTexture::from_path(&self.session, path, self.decoder.as_ref()) {
            Ok(texture) => texture,
            Err(err) => {
                logwise::warn_sync!(
                    "substituting placeholder: {err}",
                    err = logwise::privacy::LogIt(&err)
                );
                let size = self.session.config().placeholder_size();
                GpuTexture::create_solid(&self.session, size, size, 4)?
            }
        };

        let mut maps = self.lock();
        match maps.paths.entry(key) {
            //another thread loaded it while we were decoding
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                logwise::info_sync!(
                    "loaded and cached texture {path}",
                    path = logwise::privacy::LogIt(&path)
                );
                texture.set_managed(true);
                texture.upload(options);
                Ok(slot.insert(texture).clone())
            }
        }
    }

    /// Like [`TextureCache::get_or_load`], treating a missing asset as a missing file.
    pub fn get_or_load_asset(&self, asset: Option<&Path>, options: TextureOptions) -> Result<Arc<GpuTexture>, Error> {
        self.get_or_load(asset.unwrap_or(Path::new("")), options)
    }

    fn text_key(&self, font: &dyn Font, color: Color, text: &str) -> TextKey {
        match self.session.config().text_key() {
            TextKeyPolicy::FontAndColor => TextKey {
                text: text.to_owned(),
                font: Some(font.id()),
                color: Some(color.to_rgba8()),
            },
            TextKeyPolicy::TextOnly => TextKey {
                text: text.to_owned(),
                font: None,
                color: None,
            },
        }
    }

    /// A texture with `text` rendered in `font` and `color`.
    ///
    /// Empty text yields the white placeholder.  The returned texture knows its
    /// size immediately, even though the upload itself is deferred.
    pub fn get_or_render_text(&self, font: &dyn Font, color: Color, text: &str) -> Result<Arc<GpuTexture>, Error> {
        if text.is_empty() {
            return self.get_white();
        }
        let key = self.text_key(font, color, text);
        if let Some(texture) = self.lock().texts.get(&key) {
            return Ok(texture.clone());
        }

        let surface = font.rasterize(color, text)?;
        let mut maps = self.lock();
        match maps.texts.entry(key) {
            Entry::Occupied(existing) => Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                logwise::info_sync!(
                    "loaded and cached text texture for {text}",
                    text = logwise::privacy::LogIt(&text)
                );
                let texture = GpuTexture::for_surface(&self.session);
                texture.set_managed(true);
                texture.upload_surface(surface);
                Ok(slot.insert(texture).clone())
            }
        }
    }

    /// The 1x1 opaque white texture, created on first use.
    ///
    /// Like every cached texture it reaches the device on a later [`Self::tick`].
    pub fn get_white(&self) -> Result<Arc<GpuTexture>, Error> {
        let mut maps = self.lock();
        if let Some(white) = &maps.white {
            return Ok(white.clone());
        }
        let white = GpuTexture::from_image(&self.session, Image::solid(1, 1, [255; 4])?);
        white.set_managed(true);
        white.upload(TextureOptions::default());
        maps.white = Some(white.clone());
        Ok(white)
    }

    /// Performs one pending upload.  Call once per frame on the render thread.
    pub fn tick(&self) -> bool {
        self.session.upload_queue().drain_one()
    }

    /// Empties the cache and the upload queue.
    ///
    /// Every surface still waiting in the queue is released before this
    /// returns.  Call it before shutting down the subsystem those surfaces
    /// belong to.  The cache stays usable afterwards.  Returns the number of
    /// requests purged.
    pub fn shutdown(&self) -> usize {
        let maps = std::mem::take(&mut *self.lock());
        let purged = self.session.upload_queue().clear();
        logwise::info_sync!(
            "texture cache shutdown: {paths} images, {texts} texts, {purged} pending uploads purged",
            paths = maps.paths.len(),
            texts = maps.texts.len(),
            purged = purged
        );
        drop(maps);
        purged
    }

    pub fn len_paths(&self) -> usize {
        self.lock().paths.len()
    }

    pub fn len_texts(&self) -> usize {
        self.lock().texts.len()
    }

    pub fn pending_uploads(&self) -> usize {
        self.session.upload_queue().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imp::SoftwareDevice;
    use crate::session::SessionConfig;

    fn cache() -> (Arc<SoftwareDevice>, TextureCache) {
        let device = Arc::new(SoftwareDevice::new());
        let session = Session::new(device.clone(), SessionConfig::default());
        (device, TextureCache::new(session))
    }

    #[test]
    fn white_is_shared_and_uploaded_on_tick() {
        let (device, cache) = cache();
        let a = cache.get_white().unwrap();
        let b = cache.get_white().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_managed());
        assert!(a.handle().is_none());
        assert_eq!(cache.pending_uploads(), 1);
        assert!(cache.tick());
        let id = a.handle().unwrap();
        assert_eq!(device.layer_bytes(id, 0), Some(vec![255; 4]));
    }

    #[test]
    fn options_are_part_of_the_key() {
        let (_device, cache) = cache();
        let path = Path::new("/nonexistent/texture_manager/a.png");
        let plain = cache.get_or_load(path, TextureOptions::default()).unwrap();
        let clamped = TextureOptions::builder()
            .wrap(crate::options::Wrap::ClampToEdge, crate::options::Wrap::ClampToEdge)
            .build();
        let other = cache.get_or_load(path, clamped).unwrap();
        assert!(!Arc::ptr_eq(&plain, &other));
        //instant_upload does not change identity
        let instant = TextureOptions::builder().instant_upload(true).build();
        let same = cache.get_or_load(path, instant).unwrap();
        assert!(Arc::ptr_eq(&plain, &same));
        assert_eq!(cache.len_paths(), 2);
    }

    #[test]
    fn missing_asset_is_a_placeholder() {
        let (_device, cache) = cache();
        let texture = cache.get_or_load_asset(None, TextureOptions::default()).unwrap();
        assert_eq!((texture.width(), texture.height()), (8, 8));
        assert!(texture.is_managed());
        assert_eq!(cache.pending_uploads(), 1);
    }
}
