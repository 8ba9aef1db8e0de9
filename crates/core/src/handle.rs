//! RAII guard for native handles
//!
//! Whether a handle is released on drop is decided by the code that creates
//! it, not by its type: `Handle::owned` takes the release function to run,
//! `Handle::borrowed` wraps a handle someone else will close.

use std::fmt;

type Release = Box<dyn FnOnce(u64) + Send + Sync>;

/// An opaque native handle with an injected cleanup function.
pub struct Handle {
    raw: u64,
    release: Option<Release>,
}

impl Handle {
    /// Wrap a handle that must be released with `release` when dropped.
    pub fn owned<F>(raw: u64, release: F) -> Self
    where
        F: FnOnce(u64) + Send + Sync + 'static,
    {
        Self {
            raw,
            release: Some(Box::new(release)),
        }
    }

    /// Wrap a handle whose lifetime is managed elsewhere.
    pub fn borrowed(raw: u64) -> Self {
        Self { raw, release: None }
    }

    /// The raw handle value
    #[inline]
    pub fn raw(&self) -> u64 {
        self.raw
    }

    /// True if dropping this guard releases the handle
    pub fn is_owned(&self) -> bool {
        self.release.is_some()
    }

    /// Give up ownership without running the release function.
    pub fn into_raw(mut self) -> u64 {
        self.release = None;
        self.raw
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.raw);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("raw", &format_args!("{:#x}", self.raw))
            .field("owned", &self.is_owned())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_owned_handle_released_on_drop() {
        let released = Arc::new(AtomicU64::new(0));
        let r = Arc::clone(&released);
        {
            let h = Handle::owned(42, move |raw| r.store(raw, Ordering::SeqCst));
            assert!(h.is_owned());
            assert_eq!(h.raw(), 42);
        }
        assert_eq!(released.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn test_borrowed_handle_not_released() {
        let h = Handle::borrowed(7);
        assert!(!h.is_owned());
        drop(h);
    }

    #[test]
    fn test_into_raw_skips_release() {
        let released = Arc::new(AtomicU64::new(0));
        let r = Arc::clone(&released);
        let h = Handle::owned(9, move |raw| r.store(raw, Ordering::SeqCst));
        assert_eq!(h.into_raw(), 9);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }
}
