// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Fixed-width numeric element types.

Dispatch results come back as raw bytes.  The caller declares how those bytes are laid out
by choosing an [Element] type; the default is `f32`.

| Type        | Layout                 | Size |
|-------------|------------------------|------|
| `f32`       | [ElementLayout::F32]   | 4    |
| `f16`       | [ElementLayout::F16]   | 2    |
| `u32`       | [ElementLayout::U32]   | 4    |
| `i32`       | [ElementLayout::I32]   | 4    |
| `u16`       | [ElementLayout::U16]   | 2    |
*/

use crate::compute::element::sealed::ReprC;
use std::fmt::Debug;

pub use half::f16;

mod sealed {
    /// Marker trait indicating C-compatible memory layout.
    ///
    /// # Safety
    ///
    /// Implementors must have no padding and no invalid bit patterns, since slices of
    /// them are reinterpreted as bytes and back.
    pub unsafe trait ReprC {}
}

/// Describes the element type of a decoded sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ElementLayout {
    #[default]
    F32,
    F16,
    U32,
    I32,
    U16,
}

impl ElementLayout {
    pub const fn size(self) -> usize {
        match self {
            ElementLayout::F32 | ElementLayout::U32 | ElementLayout::I32 => 4,
            ElementLayout::F16 | ElementLayout::U16 => 2,
        }
    }

    /// Number of whole elements that fit in `byte_len` bytes.
    pub const fn count_in(self, byte_len: usize) -> usize {
        byte_len / self.size()
    }
}

/// A numeric type that can be uploaded to and decoded from device memory.
pub trait Element: Copy + Debug + Send + Sync + ReprC + 'static {
    const LAYOUT: ElementLayout;

    /// Reads one element from exactly `LAYOUT.size()` bytes in host byte order.
    fn from_device_bytes(bytes: &[u8]) -> Self;
}

macro_rules! element {
    ($t:ty, $layout:expr, $n:literal) => {
        unsafe impl ReprC for $t {}
        impl Element for $t {
            const LAYOUT: ElementLayout = $layout;
            #[inline]
            fn from_device_bytes(bytes: &[u8]) -> Self {
                let mut raw = [0u8; $n];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }
        }
    };
}

element!(f32, ElementLayout::F32, 4);
element!(u32, ElementLayout::U32, 4);
element!(i32, ElementLayout::I32, 4);
element!(u16, ElementLayout::U16, 2);

unsafe impl ReprC for f16 {}
impl Element for f16 {
    const LAYOUT: ElementLayout = ElementLayout::F16;
    #[inline]
    fn from_device_bytes(bytes: &[u8]) -> Self {
        f16::from_ne_bytes([bytes[0], bytes[1]])
    }
}

/// Views a slice of elements as bytes.
pub(crate) fn elements_as_bytes<E: Element>(elements: &[E]) -> &[u8] {
    //safe because E: ReprC
    unsafe {
        std::slice::from_raw_parts(
            elements.as_ptr() as *const u8,
            std::mem::size_of_val(elements),
        )
    }
}

/// Decodes as many whole elements as `bytes` holds; a trailing partial element is ignored.
pub fn decode<E: Element>(bytes: &[u8]) -> Vec<E> {
    bytes
        .chunks_exact(E::LAYOUT.size())
        .map(E::from_device_bytes)
        .collect()
}
