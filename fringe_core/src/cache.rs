//! Window caching for repeated demodulation with identical geometry.
//!
//! [`WindowCache`] is owned by the caller and passed to
//! [`filter_sideband`](crate::sideband::filter_sideband) by `&mut`. There is
//! no shared default instance: two call sites only share cached windows when
//! they are handed the same cache. The cache does no internal locking; to
//! use one cache from several threads, wrap it in a `Mutex` (or give each
//! thread its own).
//!
//! Keys hold the exact bit patterns of every floating-point parameter, so a
//! hit returns precisely the window that would have been computed.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use ndarray::Array2;

use crate::carrier::CarrierFreq;
use crate::sideband::SidebandMethod;
use crate::window::{WindowKind, WindowSize};

/// Identity of a cached window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowKey {
    /// Image apodisation window
    Apodization {
        shape: (usize, usize),
        wsize: (u8, u64),
        wfunc: WindowKind,
    },
    /// Sideband selection window in the frequency domain
    Sideband {
        shape: (usize, usize),
        cfreq: (u64, u64),
        sbsize: u64,
        wsize: (u8, u64),
        wfunc: WindowKind,
        method: SidebandMethod,
    },
}

impl WindowKey {
    pub fn apodization(shape: (usize, usize), wsize: WindowSize, wfunc: WindowKind) -> Self {
        WindowKey::Apodization {
            shape,
            wsize: wsize.key_bits(),
            wfunc,
        }
    }

    pub fn sideband(
        shape: (usize, usize),
        cfreq: CarrierFreq,
        sbsize: f64,
        wsize: WindowSize,
        wfunc: WindowKind,
        method: SidebandMethod,
    ) -> Self {
        WindowKey::Sideband {
            shape,
            cfreq: (cfreq.u.to_bits(), cfreq.v.to_bits()),
            sbsize: sbsize.to_bits(),
            wsize: wsize.key_bits(),
            wfunc,
            method,
        }
    }
}

/// LRU cache of apodisation and sideband windows.
///
/// # Memory
///
/// Each entry holds one `f64` window of the image shape: a 640×480 image
/// costs about 2.4 MB per entry. The default capacity of 16 entries covers
/// eight carriers with their apodisation windows shared.
pub struct WindowCache {
    cache: LruCache<WindowKey, Arc<Array2<f64>>>,
    hits: u64,
    misses: u64,
}

impl WindowCache {
    pub const DEFAULT_CAPACITY: usize = 16;

    /// Create a cache holding at most `capacity` windows (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Get a cached window or compute and insert it.
    pub fn get_or_insert_with<F>(&mut self, key: WindowKey, compute: F) -> Arc<Array2<f64>>
    where
        F: FnOnce() -> Array2<f64>,
    {
        if let Some(cached) = self.cache.get(&key) {
            self.hits += 1;
            return Arc::clone(cached);
        }

        self.misses += 1;
        let window = Arc::new(compute());
        self.cache.put(key, Arc::clone(&window));
        window
    }

    pub fn contains(&self, key: &WindowKey) -> bool {
        self.cache.contains(key)
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Hit rate in [0.0, 1.0]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Clear the cache and reset statistics
    pub fn clear(&mut self) {
        self.cache.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

impl Default for WindowCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Look up a window in an optional cache, computing it when absent.
pub(crate) fn cached_window<F>(
    cache: Option<&mut WindowCache>,
    key: WindowKey,
    compute: F,
) -> Arc<Array2<f64>>
where
    F: FnOnce() -> Array2<f64>,
{
    match cache {
        Some(cache) => cache.get_or_insert_with(key, compute),
        None => Arc::new(compute()),
    }
}
