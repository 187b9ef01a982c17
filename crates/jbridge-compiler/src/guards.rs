//! Paired state changes around the foreign call
//!
//! Both guards hand out a token on entry that must be consumed on exit, so
//! a bridge that saves without restoring (or enters native without leaving)
//! does not type check quietly.

use cranelift_codegen::ir::{types, InstBuilder, Value};
use cranelift_frontend::FunctionBuilder;

use jbridge_runtime::ThreadState;

use crate::addressing::{Addressing, EnvRef, ThreadRef};

// =============================================================================
// Local reference segment
// =============================================================================

/// Cookie saved by [`ReferenceSegmentGuard::save`]
#[derive(Debug)]
#[must_use = "a saved segment must be restored"]
pub struct SavedSegment {
    env: EnvRef,
    cookie: Value,
}

/// Scopes local references created by the native call
#[derive(Debug, Clone, Copy)]
pub struct ReferenceSegmentGuard<'a> {
    addressing: &'a Addressing,
}

impl<'a> ReferenceSegmentGuard<'a> {
    /// Create a guard over `addressing`.
    pub fn new(addressing: &'a Addressing) -> Self {
        ReferenceSegmentGuard { addressing }
    }

    /// `saved = env.cookie; env.cookie = env.segment_state`
    pub fn save(&self, builder: &mut FunctionBuilder<'_>, env: EnvRef) -> SavedSegment {
        let a = self.addressing;
        let segment = a.load(builder, env.0, a.env_segment_state());
        let cookie = a.load(builder, env.0, a.env_local_ref_cookie());
        a.store(builder, env.0, a.env_local_ref_cookie(), segment);
        SavedSegment { env, cookie }
    }

    /// `env.segment_state = env.cookie; env.cookie = saved`
    pub fn restore(&self, builder: &mut FunctionBuilder<'_>, saved: SavedSegment) {
        let a = self.addressing;
        let env = saved.env.0;
        let top = a.load(builder, env, a.env_local_ref_cookie());
        a.store(builder, env, a.env_segment_state(), top);
        a.store(builder, env, a.env_local_ref_cookie(), saved.cookie);
    }
}

// =============================================================================
// Thread state
// =============================================================================

/// Flips the thread between `Runnable` and `Native` around the call.
///
/// Both state words are materialised by [`prepare`](Self::prepare), ahead
/// of the window, so the state stores sit directly against the call.
#[derive(Debug, Clone, Copy)]
pub struct ThreadStateGuard {
    thread: ThreadRef,
    native: Value,
    runnable: Value,
}

/// The `Native` window; closed by [`NativeWindow::exit_native`]
#[derive(Debug)]
#[must_use = "the thread must leave native state"]
pub struct NativeWindow {
    guard: ThreadStateGuard,
}

impl ThreadStateGuard {
    /// Materialise the state constants.
    pub fn prepare(builder: &mut FunctionBuilder<'_>, thread: ThreadRef) -> Self {
        let native = builder.ins().iconst(types::I32, ThreadState::Native as i64);
        let runnable = builder.ins().iconst(types::I32, ThreadState::Runnable as i64);
        ThreadStateGuard { thread, native, runnable }
    }

    /// Store `Native`. The next emitted instruction must be the call.
    pub fn enter_native(self, builder: &mut FunctionBuilder<'_>, addressing: &Addressing) -> NativeWindow {
        addressing.store_thread_state(builder, self.thread, self.native);
        NativeWindow { guard: self }
    }
}

impl NativeWindow {
    /// Store `Runnable`. Must be emitted directly after the call.
    pub fn exit_native(self, builder: &mut FunctionBuilder<'_>, addressing: &Addressing) {
        addressing.store_thread_state(builder, self.guard.thread, self.guard.runnable);
    }
}
