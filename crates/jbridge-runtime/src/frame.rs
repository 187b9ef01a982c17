//! GC-visible shadow frames
//!
//! A bridge allocates one `ShadowFrame` on its native stack, links it onto
//! the thread's frame chain, and stores every object reference that must
//! survive the foreign call into its trailing slots. The collector walks
//! the chain from `Thread::top_shadow_frame` and treats each slot as a root.
//!
//! ```text
//! +0   link        *mut ShadowFrame   previous frame on this thread
//! +8   slot_count  u32
//! +12  (padding)
//! +16  method      *const Method      owning method
//! +24  slots[0..slot_count]           *mut Object, null when unfilled
//! ```

use std::mem;

use crate::object::{Method, Object};

/// Header of a variable-length shadow frame.
#[repr(C)]
#[derive(Debug)]
pub struct ShadowFrame {
    /// Previous frame on the owning thread's chain
    pub link: *mut ShadowFrame,
    /// Number of reference slots following the header
    pub slot_count: u32,
    _pad: u32,
    /// Method that owns this frame
    pub method: *const Method,
    _slots: [*mut Object; 0],
}

impl ShadowFrame {
    /// Size of the fixed header preceding the slots.
    pub const HEADER_SIZE: usize = mem::offset_of!(ShadowFrame, _slots);

    /// Size of a single reference slot.
    pub const SLOT_SIZE: usize = mem::size_of::<*mut Object>();

    /// Address of slot `index` within `frame`.
    ///
    /// # Safety
    /// `frame` must point to a live frame and `index < slot_count`.
    pub unsafe fn slot_addr(frame: *const ShadowFrame, index: u32) -> *mut *mut Object {
        unsafe { (frame as *mut u8).add(Self::HEADER_SIZE + index as usize * Self::SLOT_SIZE) as *mut *mut Object }
    }

    /// Read slot `index` of `frame`.
    ///
    /// # Safety
    /// Same requirements as [`ShadowFrame::slot_addr`].
    pub unsafe fn slot(frame: *const ShadowFrame, index: u32) -> *mut Object {
        unsafe { *Self::slot_addr(frame, index) }
    }

    /// Whether `addr` is the address of one of `frame`'s slots.
    ///
    /// # Safety
    /// `frame` must point to a live frame.
    pub unsafe fn contains_slot(frame: *const ShadowFrame, addr: usize) -> bool {
        let count = unsafe { (*frame).slot_count };
        let first = frame as usize + Self::HEADER_SIZE;
        let end = first + count as usize * Self::SLOT_SIZE;
        addr >= first && addr < end && (addr - first) % Self::SLOT_SIZE == 0
    }

    /// Walk a frame chain starting at `top`, calling `f` on every frame.
    ///
    /// # Safety
    /// Every frame reachable through `link` must be live.
    pub unsafe fn walk(mut top: *const ShadowFrame, mut f: impl FnMut(*const ShadowFrame)) {
        while !top.is_null() {
            f(top);
            top = unsafe { (*top).link };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn test_header_layout() {
        assert_eq!(mem::offset_of!(ShadowFrame, link), 0);
        assert_eq!(mem::offset_of!(ShadowFrame, slot_count), 8);
        assert_eq!(mem::offset_of!(ShadowFrame, method), 16);
        assert_eq!(ShadowFrame::HEADER_SIZE, 24);
        assert_eq!(ShadowFrame::SLOT_SIZE, 8);
    }

    #[test]
    fn test_slot_addressing() {
        // Header (3 words) + 2 slots
        let mut storage = [0u64; 5];
        let frame = storage.as_mut_ptr() as *mut ShadowFrame;
        let mut obj = Object::new(ptr::null_mut(), 9);
        unsafe {
            (*frame).slot_count = 2;
            *ShadowFrame::slot_addr(frame, 1) = &mut obj;
            assert!(ShadowFrame::slot(frame, 0).is_null());
            assert_eq!(ShadowFrame::slot(frame, 1), &mut obj as *mut Object);

            let base = frame as usize;
            assert!(ShadowFrame::contains_slot(frame, base + 24));
            assert!(ShadowFrame::contains_slot(frame, base + 32));
            assert!(!ShadowFrame::contains_slot(frame, base + 40));
            assert!(!ShadowFrame::contains_slot(frame, base + 16));
            assert!(!ShadowFrame::contains_slot(frame, base + 28));
        }
    }

    #[test]
    fn test_walk_chain() {
        let mut outer = [0u64; 3];
        let mut inner = [0u64; 3];
        let outer_ptr = outer.as_mut_ptr() as *mut ShadowFrame;
        let inner_ptr = inner.as_mut_ptr() as *mut ShadowFrame;
        unsafe { (*inner_ptr).link = outer_ptr };

        let mut seen = Vec::new();
        unsafe { ShadowFrame::walk(inner_ptr, |f| seen.push(f)) };
        assert_eq!(seen, vec![inner_ptr as *const ShadowFrame, outer_ptr as *const ShadowFrame]);
    }
}
