// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Cache identity, placeholder substitution, text textures and shutdown.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use texture_manager::Error;
use texture_manager::cache::TextureCache;
use texture_manager::imp::SoftwareDevice;
use texture_manager::options::TextureOptions;
use texture_manager::session::{Session, SessionConfig, TextKeyPolicy};
use texture_manager::software::{DecodeError, Image, ImageDecoder, PngDecoder, Surface, SurfaceFormat};
use texture_manager::text::{Color, Font, FontId, RenderError};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("texture_manager_{}_{name}.png", std::process::id()))
}

fn setup(config: SessionConfig) -> (Arc<SoftwareDevice>, TextureCache) {
    let device = Arc::new(SoftwareDevice::new());
    let session = Session::new(device.clone(), config);
    (device, TextureCache::new(session))
}

/// Counts decode calls.
#[derive(Debug, Default)]
struct CountingDecoder {
    decodes: Arc<AtomicUsize>,
}

impl ImageDecoder for CountingDecoder {
    fn decode(&self, path: &Path) -> Result<Image, DecodeError> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        PngDecoder.decode(path)
    }
}

/// Renders every string as a `len x 2` block of the requested color.
#[derive(Debug)]
struct BlockFont {
    id: FontId,
    rasterized: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl BlockFont {
    fn new(id: u64) -> Self {
        BlockFont {
            id: FontId(id),
            rasterized: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Font for BlockFont {
    fn id(&self) -> FontId {
        self.id
    }

    fn rasterize(&self, color: Color, text: &str) -> Result<Surface, RenderError> {
        self.rasterized.fetch_add(1, Ordering::SeqCst);
        let width = text.chars().count() as u32;
        let pixels = color.to_rgba8().repeat(width as usize * 2);
        let released = self.released.clone();
        Ok(Surface::packed(width, 2, SurfaceFormat::RGBA32, pixels).with_release_hook(move || {
            released.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[derive(Debug)]
struct BrokenFont;

impl Font for BrokenFont {
    fn id(&self) -> FontId {
        FontId(99)
    }

    fn rasterize(&self, _color: Color, _text: &str) -> Result<Surface, RenderError> {
        Err(RenderError::Rasterize("no glyphs".to_owned()))
    }
}

#[test]
fn equal_keys_share_one_instance() {
    let path = temp_path("equal_keys");
    Image::solid(3, 3, [10, 20, 30, 255]).unwrap().to_file(&path).unwrap();

    let device = Arc::new(SoftwareDevice::new());
    let session = Session::new(device.clone(), SessionConfig::default());
    let decoder = CountingDecoder::default();
    let decodes = decoder.decodes.clone();
    let cache = TextureCache::with_decoder(session, decoder);

    let a = cache.get_or_load(&path, TextureOptions::default()).unwrap();
    let b = cache.get_or_load(&path, TextureOptions::default()).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(decodes.load(Ordering::SeqCst), 1);
    assert_eq!((a.width(), a.height()), (3, 3));

    //one deferred upload, not two
    assert_eq!(cache.pending_uploads(), 1);
    assert!(cache.tick());
    assert!(!cache.tick());
    assert_eq!(device.uploads().len(), 1);

    std::fs::remove_file(&path).ok();
}

#[test]
fn missing_file_yields_checkerboard() {
    let (_device, cache) = setup(SessionConfig::default());
    let texture = cache
        .get_or_load(Path::new("/definitely/not/here.png"), TextureOptions::default())
        .unwrap();
    assert_eq!((texture.width(), texture.height()), (8, 8));
    texture.with_image(|image| {
        let image = image.expect("placeholder keeps its buffer until drained");
        assert_eq!(image.as_bytes().len(), 8 * 8 * 4);
        assert_ne!(image.pixel(0, 0), image.pixel(1, 0));
        assert_eq!(image.pixel(0, 0), image.pixel(1, 1));
    });

    //same placeholder again for the same key
    let again = cache
        .get_or_load(Path::new("/definitely/not/here.png"), TextureOptions::default())
        .unwrap();
    assert!(Arc::ptr_eq(&texture, &again));
}

#[test]
fn corrupt_file_yields_checkerboard() {
    let path = temp_path("corrupt");
    std::fs::write(&path, b"not a png").unwrap();
    let (_device, cache) = setup(SessionConfig::default());
    let texture = cache.get_or_load(&path, TextureOptions::default()).unwrap();
    assert_eq!((texture.width(), texture.height()), (8, 8));
    std::fs::remove_file(&path).ok();
}

#[test]
fn text_identity_and_white() {
    let (_device, cache) = setup(SessionConfig::default());
    let font = BlockFont::new(1);
    let a = cache.get_or_render_text(&font, Color::BLACK, "hello").unwrap();
    let b = cache.get_or_render_text(&font, Color::BLACK, "hello").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(font.rasterized.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len_texts(), 1);

    let white = cache.get_white().unwrap();
    let empty = cache.get_or_render_text(&font, Color::BLACK, "").unwrap();
    let empty_again = cache.get_or_render_text(&BrokenFont, Color::WHITE, "").unwrap();
    assert!(Arc::ptr_eq(&white, &empty));
    assert!(Arc::ptr_eq(&white, &empty_again));
    assert_eq!(cache.len_texts(), 1);
}

#[test]
fn font_and_color_are_part_of_the_default_key() {
    let (_device, cache) = setup(SessionConfig::default());
    let regular = BlockFont::new(1);
    let bold = BlockFont::new(2);
    let black = cache.get_or_render_text(&regular, Color::BLACK, "ok").unwrap();
    let red = cache.get_or_render_text(&regular, Color::rgb(1.0, 0.0, 0.0), "ok").unwrap();
    let other_font = cache.get_or_render_text(&bold, Color::BLACK, "ok").unwrap();
    assert!(!Arc::ptr_eq(&black, &red));
    assert!(!Arc::ptr_eq(&black, &other_font));
    assert_eq!(cache.len_texts(), 3);
}

#[test]
fn text_only_policy_collides() {
    let (_device, cache) = setup(SessionConfig::default().with_text_key(TextKeyPolicy::TextOnly));
    let regular = BlockFont::new(1);
    let bold = BlockFont::new(2);
    let black = cache.get_or_render_text(&regular, Color::BLACK, "ok").unwrap();
    let red = cache.get_or_render_text(&bold, Color::rgb(1.0, 0.0, 0.0), "ok").unwrap();
    assert!(Arc::ptr_eq(&black, &red));
    assert_eq!(bold.rasterized.load(Ordering::SeqCst), 0);
}

#[test]
fn render_failure_propagates() {
    let (_device, cache) = setup(SessionConfig::default());
    let err = cache.get_or_render_text(&BrokenFont, Color::BLACK, "boom").unwrap_err();
    assert!(matches!(err, Error::Render(RenderError::Rasterize(_))));
    assert_eq!(cache.len_texts(), 0);
}

#[test]
fn text_size_known_before_upload() {
    let (device, cache) = setup(SessionConfig::default());
    let font = BlockFont::new(1);
    let texture = cache.get_or_render_text(&font, Color::WHITE, "four").unwrap();
    assert_eq!((texture.width(), texture.height()), (4, 2));
    assert!(texture.handle().is_none());
    assert_eq!(font.released.load(Ordering::SeqCst), 0);

    assert!(cache.tick());
    let id = texture.handle().unwrap();
    assert_eq!(device.size(id), Some((4, 2)));
    assert_eq!(font.released.load(Ordering::SeqCst), 1);
}

#[test]
fn shutdown_releases_pending_surfaces_once() {
    let (device, cache) = setup(SessionConfig::default());
    let font = BlockFont::new(1);
    let first = cache.get_or_render_text(&font, Color::WHITE, "one").unwrap();
    cache.get_or_render_text(&font, Color::WHITE, "two").unwrap();
    cache.get_or_load(Path::new("/missing.png"), TextureOptions::default()).unwrap();
    assert_eq!(cache.pending_uploads(), 3);

    assert_eq!(cache.shutdown(), 3);
    assert_eq!(font.released.load(Ordering::SeqCst), 2);
    assert_eq!(cache.pending_uploads(), 0);
    assert_eq!(cache.len_paths(), 0);
    assert_eq!(cache.len_texts(), 0);

    //handles held by callers outlive the cache entry but never upload
    assert!(first.handle().is_none());
    drop(first);
    assert_eq!(font.released.load(Ordering::SeqCst), 2);
    assert!(device.uploads().is_empty());

    //still usable
    let again = cache.get_or_render_text(&font, Color::WHITE, "one").unwrap();
    assert!(cache.tick());
    assert!(again.handle().is_some());
}

#[test]
fn cache_keeps_dropped_handles_alive() {
    let (device, cache) = setup(SessionConfig::default());
    let font = BlockFont::new(1);
    let texture = cache.get_or_render_text(&font, Color::WHITE, "bye").unwrap();
    drop(texture);
    //cache still holds it, so the request survives
    assert_eq!(cache.pending_uploads(), 1);
    assert!(cache.tick());
    assert_eq!(device.uploads().len(), 1);
    assert_eq!(font.released.load(Ordering::SeqCst), 1);
}

#[test]
fn loads_from_producer_threads() {
    let (device, cache) = setup(SessionConfig::default());
    let cache = Arc::new(cache);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let cache = cache.clone();
            std::thread::spawn(move || {
                let path = PathBuf::from(format!("/missing/{}.png", i % 2));
                cache.get_or_load(&path, TextureOptions::default()).unwrap()
            })
        })
        .collect();
    let textures: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(cache.len_paths(), 2);
    assert!(Arc::ptr_eq(&textures[0], &textures[2]));
    assert!(Arc::ptr_eq(&textures[1], &textures[3]));

    while cache.tick() {}
    assert!(textures.iter().all(|t| t.handle().is_some()));
    assert_eq!(device.uploads().len(), 2);
}

#[test]
fn white_requested_off_the_render_thread_waits_for_tick() {
    let (device, cache) = setup(SessionConfig::default());
    let cache = Arc::new(cache);
    let producer = {
        let cache = cache.clone();
        std::thread::spawn(move || {
            let font = BlockFont::new(1);
            cache.get_or_render_text(&font, Color::WHITE, "").unwrap()
        })
    };
    let white = producer.join().unwrap();
    assert!(device.calls().is_empty());
    assert!(white.handle().is_none());
    assert_eq!(cache.pending_uploads(), 1);

    assert!(cache.tick());
    let id = white.handle().unwrap();
    assert_eq!(device.layer_bytes(id, 0), Some(vec![255; 4]));
    assert!(Arc::ptr_eq(&white, &cache.get_white().unwrap()));
    assert!(!cache.tick());
}

#[test]
fn glyph_font_text_reaches_the_device() {
    let (device, cache) = setup(SessionConfig::default());
    let data = std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/DejaVuSansMono.ttf")).unwrap();
    let font = texture_manager::text::GlyphFont::from_bytes(FontId(3), data, 16.0).unwrap();
    let texture = cache.get_or_render_text(&font, Color::BLACK, "Score: 42").unwrap();
    let size = (texture.width(), texture.height());
    assert!(size.0 > 0 && size.1 > 0);

    assert!(cache.tick());
    let id = texture.handle().unwrap();
    assert_eq!(device.size(id), Some(size));
    let pixels = device.layer_bytes(id, 0).unwrap();
    assert!(pixels.chunks_exact(4).any(|p| p[3] > 0));
}
