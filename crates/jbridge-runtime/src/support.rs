//! Runtime-support entry points called from generated bridges
//!
//! Bridges import these by symbol name; a host runtime can supply its own
//! implementations as long as it keeps the calling convention:
//!
//! ```text
//! jbridge_get_current_thread()                    -> *mut Thread
//! jbridge_push_shadow_frame(frame)
//! jbridge_pop_shadow_frame()
//! jbridge_decode_jobject_in_thread(thread, obj)   -> *mut Object
//! ```

use std::ptr;

use crate::env::{IndirectRef, IndirectRefKind, JObject};
use crate::frame::ShadowFrame;
use crate::object::Object;
use crate::thread::{current_thread, Thread};

/// Symbol name of [`jbridge_get_current_thread`]
pub const GET_CURRENT_THREAD: &str = "jbridge_get_current_thread";
/// Symbol name of [`jbridge_push_shadow_frame`]
pub const PUSH_SHADOW_FRAME: &str = "jbridge_push_shadow_frame";
/// Symbol name of [`jbridge_pop_shadow_frame`]
pub const POP_SHADOW_FRAME: &str = "jbridge_pop_shadow_frame";
/// Symbol name of [`jbridge_decode_jobject_in_thread`]
pub const DECODE_JOBJECT_IN_THREAD: &str = "jbridge_decode_jobject_in_thread";

/// Thread attached to the calling OS thread.
pub extern "C" fn jbridge_get_current_thread() -> *mut Thread {
    current_thread()
}

/// Link `frame` as the innermost shadow frame of the current thread.
///
/// # Safety
/// `frame` must stay live until the matching pop, and a thread must be
/// attached.
pub unsafe extern "C" fn jbridge_push_shadow_frame(frame: *mut ShadowFrame) {
    let thread = current_thread();
    debug_assert!(!thread.is_null(), "push_shadow_frame on a detached thread");
    unsafe {
        (*frame).link = (*thread).top_shadow_frame;
        (*thread).top_shadow_frame = frame;
    }
}

/// Unlink the innermost shadow frame of the current thread and point the
/// top of the managed stack back at the caller's frame (null when none).
///
/// # Safety
/// A thread must be attached and have at least one frame linked.
pub unsafe extern "C" fn jbridge_pop_shadow_frame() {
    let thread = current_thread();
    debug_assert!(!thread.is_null(), "pop_shadow_frame on a detached thread");
    unsafe {
        let top = (*thread).top_shadow_frame;
        debug_assert!(!top.is_null(), "pop_shadow_frame with an empty frame chain");
        let link = (*top).link;
        (*thread).top_shadow_frame = link;
        (*thread).top_of_managed_stack = if link.is_null() {
            ptr::null_mut()
        } else {
            ptr::addr_of_mut!((*link).method)
        };
    }
}

/// Resolve a handle returned by native code to the object it names.
///
/// Null stays null. Local handles are looked up in the live part of the
/// environment's table. Addresses of slots in this thread's shadow frames
/// are dereferenced; any other aligned value is a direct reference and is
/// returned as is.
///
/// # Safety
/// `thread` must be a live attached thread.
pub unsafe extern "C" fn jbridge_decode_jobject_in_thread(thread: *mut Thread, obj: JObject) -> *mut Object {
    let handle = IndirectRef::from_raw(obj);
    match handle.kind() {
        IndirectRefKind::Null => ptr::null_mut(),
        IndirectRefKind::Local => {
            let env = unsafe { (*thread).jni_env };
            let index = handle.local_index().unwrap_or(u32::MAX);
            match unsafe { (*env).decode_local(index) } {
                Ok(decoded) => decoded,
                Err(e) => {
                    log::warn!("decode_jobject: {}", e);
                    ptr::null_mut()
                }
            }
        }
        IndirectRefKind::Frame => {
            let addr = obj as usize;
            let mut in_frame = false;
            unsafe {
                ShadowFrame::walk((*thread).top_shadow_frame, |frame| {
                    in_frame |= ShadowFrame::contains_slot(frame, addr);
                });
            }
            if in_frame {
                unsafe { *(addr as *const *mut Object) }
            } else {
                obj as *mut Object
            }
        }
        IndirectRefKind::Invalid => {
            log::warn!("decode_jobject: invalid handle {:p}", obj);
            ptr::null_mut()
        }
    }
}

/// `(name, address)` of every support entry point, for JIT symbol tables.
pub fn symbols() -> [(&'static str, *const u8); 4] {
    [
        (GET_CURRENT_THREAD, jbridge_get_current_thread as *const u8),
        (PUSH_SHADOW_FRAME, jbridge_push_shadow_frame as *const u8),
        (POP_SHADOW_FRAME, jbridge_pop_shadow_frame as *const u8),
        (DECODE_JOBJECT_IN_THREAD, jbridge_decode_jobject_in_thread as *const u8),
    ]
}
