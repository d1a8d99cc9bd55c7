//! Runtime SIMD capability probe and strategy selection.
//!
//! The codec, the extractor, and the scorer each keep a portable scalar
//! baseline plus accelerated variants gated on the vector ISA.  All
//! variants are result-equivalent; the scalar path is the reference the
//! others are tested against.  The probe runs once per process; tests can
//! pin a level through [`set_forced`] (the `force_simd_capability` knob).

use std::sync::atomic::{AtomicI32, Ordering};

/// Vector capability levels, ordered.  A level implies all lower ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum Capability {
    /// Portable scalar code only.
    Scalar = 0,
    /// x86-64 SSSE3 (byte shuffles; implies SSE2).
    Ssse3 = 1,
    /// x86-64 AVX2 (256-bit integer lanes).
    Avx2 = 2,
    /// AArch64 NEON.
    Neon = 3,
}

impl Capability {
    fn from_i32(v: i32) -> Option<Capability> {
        match v {
            0 => Some(Capability::Scalar),
            1 => Some(Capability::Ssse3),
            2 => Some(Capability::Avx2),
            3 => Some(Capability::Neon),
            _ => None,
        }
    }
}

// -1 = auto-detect; any other value forces that level (test knob).
static FORCED: AtomicI32 = AtomicI32::new(-1);

/// Serializes tests that flip the force knob; the knob is process-wide.
#[cfg(test)]
pub(crate) static FORCE_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
pub(crate) fn force_lock() -> std::sync::MutexGuard<'static, ()> {
    FORCE_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

/// Pin the capability level for this process, or pass `-1` to restore
/// auto-detection.  Unknown values fall back to [`Capability::Scalar`].
pub fn set_forced(level: i32) {
    FORCED.store(level, Ordering::Relaxed);
    tracing::debug!(level, "simd capability override");
}

/// The capability level in effect for this process.
pub fn capability() -> Capability {
    let forced = FORCED.load(Ordering::Relaxed);
    if forced >= 0 {
        return Capability::from_i32(forced).unwrap_or(Capability::Scalar);
    }
    detect()
}

#[cfg(target_arch = "x86_64")]
fn detect() -> Capability {
    if is_x86_feature_detected!("avx2") {
        Capability::Avx2
    } else if is_x86_feature_detected!("ssse3") {
        Capability::Ssse3
    } else {
        Capability::Scalar
    }
}

#[cfg(target_arch = "aarch64")]
fn detect() -> Capability {
    if std::arch::is_aarch64_feature_detected!("neon") {
        Capability::Neon
    } else {
        Capability::Scalar
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn detect() -> Capability {
    Capability::Scalar
}
