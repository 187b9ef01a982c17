//! Field offset table shared with the bridge compiler.
//!
//! These must match the `#[repr(C)]` layout of the runtime structs bit for
//! bit; generated code addresses every field as `base + offset`. The table
//! is derived with `offset_of!` and checked once at compile time below.

use std::mem::{self, offset_of};

use crate::env::JniEnv;
use crate::frame::ShadowFrame;
use crate::object::{Method, Object};
use crate::thread::Thread;

/// Byte offsets of every runtime field a bridge reads or writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeLayout {
    /// `Thread::state` (u32)
    pub thread_state: i32,
    /// `Thread::jni_env` (pointer)
    pub thread_jni_env: i32,
    /// `Thread::top_of_managed_stack` (pointer)
    pub thread_top_of_managed_stack: i32,
    /// `Method::declaring_class` (pointer)
    pub method_declaring_class: i32,
    /// `Method::native_method` (pointer)
    pub method_native_entry: i32,
    /// `JniEnv::local_ref_cookie` (u32)
    pub env_local_ref_cookie: i32,
    /// `JniEnv::segment_state` (u32)
    pub env_segment_state: i32,
    /// `ShadowFrame::link` (pointer)
    pub frame_link: i32,
    /// `ShadowFrame::slot_count` (u32)
    pub frame_slot_count: i32,
    /// `ShadowFrame::method` (pointer)
    pub frame_method: i32,
    /// Size of the shadow frame header
    pub frame_header_size: i32,
    /// Size of one reference slot
    pub slot_size: i32,
}

impl RuntimeLayout {
    /// Layout of this runtime build.
    pub const HOST: RuntimeLayout = RuntimeLayout {
        thread_state: offset_of!(Thread, state) as i32,
        thread_jni_env: offset_of!(Thread, jni_env) as i32,
        thread_top_of_managed_stack: offset_of!(Thread, top_of_managed_stack) as i32,
        method_declaring_class: offset_of!(Method, declaring_class) as i32,
        method_native_entry: offset_of!(Method, native_method) as i32,
        env_local_ref_cookie: offset_of!(JniEnv, local_ref_cookie) as i32,
        env_segment_state: offset_of!(JniEnv, segment_state) as i32,
        frame_link: offset_of!(ShadowFrame, link) as i32,
        frame_slot_count: offset_of!(ShadowFrame, slot_count) as i32,
        frame_method: offset_of!(ShadowFrame, method) as i32,
        frame_header_size: ShadowFrame::HEADER_SIZE as i32,
        slot_size: ShadowFrame::SLOT_SIZE as i32,
    };

    /// Offset of reference slot `index` from the frame base.
    pub const fn slot_offset(&self, index: u32) -> i32 {
        self.frame_header_size + index as i32 * self.slot_size
    }

    /// Total frame size for `slot_count` references.
    pub const fn frame_size(&self, slot_count: u32) -> u32 {
        self.frame_header_size as u32 + slot_count * self.slot_size as u32
    }

    /// Named `(field, offset)` pairs, in declaration order.
    pub fn entries(&self) -> [(&'static str, i32); 12] {
        [
            ("thread.state", self.thread_state),
            ("thread.jni_env", self.thread_jni_env),
            ("thread.top_of_managed_stack", self.thread_top_of_managed_stack),
            ("method.declaring_class", self.method_declaring_class),
            ("method.native_method", self.method_native_entry),
            ("env.local_ref_cookie", self.env_local_ref_cookie),
            ("env.segment_state", self.env_segment_state),
            ("frame.link", self.frame_link),
            ("frame.slot_count", self.frame_slot_count),
            ("frame.method", self.frame_method),
            ("frame.header_size", self.frame_header_size),
            ("frame.slot_size", self.slot_size),
        ]
    }
}

// The frame is zero-filled one slot-sized word at a time, and slots hold
// object pointers.
const _: () = assert!(ShadowFrame::HEADER_SIZE % ShadowFrame::SLOT_SIZE == 0);
const _: () = assert!(ShadowFrame::SLOT_SIZE == mem::size_of::<*mut Object>());
// Generated code stores the state and segment words as 32-bit integers.
const _: () = assert!(mem::size_of::<crate::thread::ThreadState>() == 4);
const _: () = assert!(offset_of!(Thread, state) % 4 == 0);
const _: () = assert!(offset_of!(JniEnv, local_ref_cookie) % 4 == 0);
const _: () = assert!(offset_of!(JniEnv, segment_state) % 4 == 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_layout_64bit() {
        let l = RuntimeLayout::HOST;
        assert_eq!(l.thread_state, 0);
        assert_eq!(l.thread_jni_env, 8);
        assert_eq!(l.thread_top_of_managed_stack, 16);
        assert_eq!(l.method_declaring_class, 0);
        assert_eq!(l.method_native_entry, 16);
        assert_eq!(l.env_local_ref_cookie, 16);
        assert_eq!(l.env_segment_state, 20);
        assert_eq!(l.frame_link, 0);
        assert_eq!(l.frame_slot_count, 8);
        assert_eq!(l.frame_method, 16);
        assert_eq!(l.frame_header_size, 24);
        assert_eq!(l.slot_size, 8);
    }

    #[test]
    fn test_slot_offsets() {
        let l = RuntimeLayout::HOST;
        assert_eq!(l.slot_offset(0), 24);
        assert_eq!(l.slot_offset(2), 40);
        assert_eq!(l.frame_size(0), 24);
        assert_eq!(l.frame_size(3), 48);
    }

    #[test]
    fn test_entries_are_distinct_per_struct() {
        let l = RuntimeLayout::HOST;
        assert_ne!(l.thread_state, l.thread_jni_env);
        assert_ne!(l.env_local_ref_cookie, l.env_segment_state);
        assert_ne!(l.method_declaring_class, l.method_native_entry);
        assert_eq!(l.entries().len(), 12);
    }
}
