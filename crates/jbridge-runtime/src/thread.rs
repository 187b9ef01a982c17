//! Managed threads and the thread-state protocol
//!
//! A thread in `Runnable` state only stops for the collector at cooperative
//! safepoints. Before calling into foreign code a bridge flips the state to
//! `Native`, telling the collector it may scan this thread's shadow frames
//! without waiting for it; the bridge flips it back right after the call.

use std::cell::Cell;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::env::JniEnv;
use crate::error::RuntimeError;
use crate::frame::ShadowFrame;
use crate::object::Method;

/// Thread execution state as seen by the collector.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Executing managed code; stops only at safepoints
    Runnable = 0,
    /// Executing foreign code; the collector may scan without stopping it
    Native = 1,
    /// Parked by the runtime
    Suspended = 2,
}

impl ThreadState {
    /// Decode a raw state word.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(ThreadState::Runnable),
            1 => Some(ThreadState::Native),
            2 => Some(ThreadState::Suspended),
            _ => None,
        }
    }
}

/// Managed thread record.
#[repr(C)]
#[derive(Debug)]
pub struct Thread {
    /// Current `ThreadState`, written by generated code with plain stores
    pub state: AtomicU32,
    /// Runtime thread id
    pub thread_id: u32,
    /// This thread's native environment
    pub jni_env: *mut JniEnv,
    /// Address of the `method` field of the innermost frame
    pub top_of_managed_stack: *mut *const Method,
    /// Innermost shadow frame
    pub top_shadow_frame: *mut ShadowFrame,
}

impl Thread {
    /// Current state.
    pub fn state(&self) -> ThreadState {
        // Unknown words only appear if something scribbled over the field
        ThreadState::from_raw(self.state.load(Ordering::Acquire)).unwrap_or(ThreadState::Suspended)
    }

    /// Number of shadow frames currently linked.
    pub fn frame_depth(&self) -> usize {
        let mut depth = 0;
        unsafe { ShadowFrame::walk(self.top_shadow_frame, |_| depth += 1) };
        depth
    }
}

thread_local! {
    static CURRENT: Cell<*mut Thread> = const { Cell::new(ptr::null_mut()) };
}

/// Raw pointer to the thread attached to the calling OS thread (null if none).
pub fn current_thread() -> *mut Thread {
    CURRENT.with(|c| c.get())
}

/// RAII attachment of the calling OS thread to the runtime.
///
/// Owns the `Thread` and `JniEnv` records. Generated code mutates both
/// through raw pointers, so accessors read through the pointer rather than
/// handing out long-lived references.
#[derive(Debug)]
pub struct AttachedThread {
    thread: NonNull<Thread>,
    env: NonNull<JniEnv>,
}

impl AttachedThread {
    /// Attach the calling OS thread.
    pub fn attach(thread_id: u32) -> Result<Self, RuntimeError> {
        if !current_thread().is_null() {
            return Err(RuntimeError::AlreadyAttached);
        }

        let thread = Box::into_raw(Box::new(Thread {
            state: AtomicU32::new(ThreadState::Runnable as u32),
            thread_id,
            jni_env: ptr::null_mut(),
            top_of_managed_stack: ptr::null_mut(),
            top_shadow_frame: ptr::null_mut(),
        }));
        let env = Box::into_raw(Box::new(JniEnv::new(thread)));
        unsafe { (*thread).jni_env = env };

        CURRENT.with(|c| c.set(thread));
        log::debug!("attached thread {}", thread_id);

        // Box::into_raw never returns null
        Ok(AttachedThread {
            thread: unsafe { NonNull::new_unchecked(thread) },
            env: unsafe { NonNull::new_unchecked(env) },
        })
    }

    /// Raw thread pointer, as returned by `jbridge_get_current_thread`.
    pub fn as_ptr(&self) -> *mut Thread {
        self.thread.as_ptr()
    }

    /// Raw environment pointer.
    pub fn env_ptr(&self) -> *mut JniEnv {
        self.env.as_ptr()
    }

    /// Current thread state.
    pub fn state(&self) -> ThreadState {
        unsafe { (*self.thread.as_ptr()).state() }
    }

    /// Number of linked shadow frames.
    pub fn frame_depth(&self) -> usize {
        unsafe { (*self.thread.as_ptr()).frame_depth() }
    }

    /// Innermost shadow frame.
    pub fn top_shadow_frame(&self) -> *mut ShadowFrame {
        unsafe { (*self.thread.as_ptr()).top_shadow_frame }
    }

    /// Top of the managed stack: `&method` of the innermost linked frame.
    pub fn top_of_managed_stack(&self) -> *mut *const Method {
        unsafe { (*self.thread.as_ptr()).top_of_managed_stack }
    }

    /// `(local_ref_cookie, segment_state)` of the environment.
    pub fn segment(&self) -> (u32, u32) {
        let env = self.env.as_ptr();
        unsafe { ((*env).local_ref_cookie, (*env).segment_state) }
    }

    /// Create a local reference in the environment's current segment.
    pub fn new_local_ref(&self, obj: *mut crate::object::Object) -> crate::env::JObject {
        unsafe { (*self.env.as_ptr()).new_local_ref(obj) }
    }
}

impl Drop for AttachedThread {
    fn drop(&mut self) {
        CURRENT.with(|c| {
            if c.get() == self.thread.as_ptr() {
                c.set(ptr::null_mut());
            }
        });
        unsafe {
            let thread_id = (*self.thread.as_ptr()).thread_id;
            drop(Box::from_raw(self.env.as_ptr()));
            drop(Box::from_raw(self.thread.as_ptr()));
            log::debug!("detached thread {}", thread_id);
        }
    }
}
