//! Decoder lookup cache.
//!
//! Looking a decoder up by codec identifier walks FFmpeg's codec registry.
//! [`CodecCache`] remembers each answer so repeated extractions of the same
//! kind of file skip that walk. Entries are never evicted individually; the
//! whole mapping is dropped by [`CodecCache::clear`] and refilled lazily.

use std::{
    collections::HashMap,
    fmt::{Debug, Formatter, Result as FmtResult},
    hash::{Hash, Hasher},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use ffmpeg_next::codec::{Codec, Id};
use ffmpeg_sys_next::AVCodecID;

/// Cache key identifying a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecKey(Id);

impl CodecKey {
    /// The FFmpeg codec identifier.
    pub fn id(self) -> Id {
        self.0
    }

    /// Short codec name (e.g. `"h264"`).
    pub fn name(self) -> &'static str {
        self.0.name()
    }
}

impl From<Id> for CodecKey {
    fn from(id: Id) -> Self {
        CodecKey(id)
    }
}

impl Hash for CodecKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let raw: AVCodecID = self.0.into();
        (raw as u32).hash(state);
    }
}

/// A resolved decoder.
///
/// Wraps a pointer into FFmpeg's static codec table, which lives for the
/// whole process.
#[derive(Clone, Copy)]
pub struct DecoderDescriptor {
    codec: Codec,
}

// AVCodec entries are immutable statics owned by libavcodec.
unsafe impl Send for DecoderDescriptor {}
unsafe impl Sync for DecoderDescriptor {}

impl DecoderDescriptor {
    /// Look up the decoder registered for `key`.
    pub fn find(key: CodecKey) -> Option<Self> {
        ffmpeg_next::decoder::find(key.id()).map(|codec| DecoderDescriptor { codec })
    }

    /// The underlying FFmpeg codec.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Decoder name (e.g. `"h264"`, `"hevc_mediacodec"`).
    pub fn name(&self) -> &str {
        self.codec.name()
    }
}

impl Debug for DecoderDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("DecoderDescriptor")
            .field("name", &self.name())
            .finish()
    }
}

struct CodecCacheEntry<D> {
    descriptor: D,
    last_used: Instant,
}

/// Process-wide decoder cache guarded by its own lock.
///
/// The descriptor type is generic so the cache can be exercised without a
/// codec registry; production code uses the default [`DecoderDescriptor`].
///
/// # Example
///
/// ```
/// use thumbgrab::{CodecCache, CodecKey};
/// use ffmpeg_next::codec::Id;
///
/// let cache: CodecCache<&'static str> = CodecCache::new();
/// let key = CodecKey::from(Id::H264);
///
/// assert_eq!(cache.resolve_with(key, |_| Some("h264")), Some("h264"));
/// // Second call is served from the cache; the lookup is not consulted.
/// assert_eq!(cache.resolve_with(key, |_| None), Some("h264"));
/// assert_eq!(cache.len(), 1);
/// ```
pub struct CodecCache<D = DecoderDescriptor> {
    entries: Mutex<HashMap<CodecKey, CodecCacheEntry<D>>>,
}

impl<D> Default for CodecCache<D> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<D> Debug for CodecCache<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let entries = self.lock();
        let mut keys: Vec<&'static str> = entries.keys().map(|key| key.name()).collect();
        keys.sort_unstable();
        f.debug_struct("CodecCache").field("codecs", &keys).finish()
    }
}

impl<D: Clone> CodecCache<D> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached descriptor for `key`, or consult `lookup` and cache
    /// its answer.
    ///
    /// A hit refreshes the entry's last-used time and never calls `lookup`.
    /// A miss for which `lookup` returns `None` caches nothing.
    pub fn resolve_with<F>(&self, key: CodecKey, lookup: F) -> Option<D>
    where
        F: FnOnce(CodecKey) -> Option<D>,
    {
        let mut entries = self.lock();

        if let Some(entry) = entries.get_mut(&key) {
            entry.last_used = Instant::now();
            log::debug!("Codec cache hit for {}", key.name());
            return Some(entry.descriptor.clone());
        }

        let descriptor = lookup(key)?;
        log::debug!("Codec cache miss for {}, caching decoder", key.name());
        entries.insert(
            key,
            CodecCacheEntry {
                descriptor: descriptor.clone(),
                last_used: Instant::now(),
            },
        );
        Some(descriptor)
    }
}

impl<D> CodecCache<D> {
    /// Number of cached codecs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns `true` if `key` is cached.
    pub fn contains(&self, key: CodecKey) -> bool {
        self.lock().contains_key(&key)
    }

    /// When `key` was last resolved, if it is cached.
    pub fn last_used(&self, key: CodecKey) -> Option<Instant> {
        self.lock().get(&key).map(|entry| entry.last_used)
    }

    /// Drop every cached descriptor.
    pub fn clear(&self) {
        let mut entries = self.lock();
        log::debug!("Clearing codec cache ({} entries)", entries.len());
        entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CodecKey, CodecCacheEntry<D>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CodecCache<DecoderDescriptor> {
    /// Resolve a decoder through FFmpeg's registry, caching the result.
    pub fn resolve(&self, key: CodecKey) -> Option<DecoderDescriptor> {
        self.resolve_with(key, DecoderDescriptor::find)
    }
}
