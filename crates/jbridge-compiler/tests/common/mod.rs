//! Shared harness: JIT one bridge and observe the runtime from native code.

#![allow(dead_code)]

use std::cell::Cell;
use std::ptr;

use jbridge_compiler::{CompilationUnit, CompiledMethod, CompilerConfig, JITModule, JniCompiler, MethodTable, ResolvedMethod};
use jbridge_runtime::support::jbridge_decode_jobject_in_thread;
use jbridge_runtime::thread::current_thread;
use jbridge_runtime::{JObject, JniEnv, Method, Object, ShadowFrame, ThreadState};

/// A JIT-compiled bridge plus the unit that owns its code.
pub struct JitBridge {
    pub unit: CompilationUnit<JITModule>,
    pub compiled: CompiledMethod,
    pub code: *const u8,
}

/// Compile a bridge for `class.name descriptor` with `access_flags`.
pub fn jit_bridge(class: &str, name: &str, descriptor: &str, access_flags: u32) -> JitBridge {
    let mut methods = MethodTable::new();
    methods.insert(ResolvedMethod::from_descriptor(1, access_flags, class, name, descriptor).expect("descriptor"));

    let mut unit = CompilationUnit::jit(CompilerConfig::default()).expect("JIT unit");
    let compiled = JniCompiler::new(&mut unit, &methods, 1)
        .expect("resolve")
        .compile()
        .expect("compile");
    unit.finalize().expect("finalize");
    let code = unit.entry_point(&compiled);
    assert!(!code.is_null());

    JitBridge { unit, compiled, code }
}

/// What a native method saw of its thread while it ran.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot {
    pub state: ThreadState,
    pub env: *mut JniEnv,
    pub cookie: u32,
    pub segment_state: u32,
    pub frame_depth: usize,
    pub top_frame: *mut ShadowFrame,
    pub top_method: *const Method,
}

thread_local! {
    static LAST_SNAPSHOT: Cell<Option<Snapshot>> = const { Cell::new(None) };
}

/// Record the current thread's state. Call from inside a native method.
pub fn snapshot() {
    let thread = current_thread();
    assert!(!thread.is_null(), "native method ran on a detached thread");
    let seen = unsafe {
        let env = (*thread).jni_env;
        let top = (*thread).top_of_managed_stack;
        Snapshot {
            state: (*thread).state(),
            env,
            cookie: (*env).local_ref_cookie,
            segment_state: (*env).segment_state,
            frame_depth: (*thread).frame_depth(),
            top_frame: (*thread).top_shadow_frame,
            top_method: if top.is_null() { ptr::null() } else { *top },
        }
    };
    LAST_SNAPSHOT.with(|p| p.set(Some(seen)));
}

/// Take the last recorded snapshot.
pub fn take_snapshot() -> Snapshot {
    LAST_SNAPSHOT.with(|p| p.take()).expect("native method did not run")
}

/// Decode a handle against the current thread, as native code would.
pub fn decode(handle: JObject) -> *mut Object {
    unsafe { jbridge_decode_jobject_in_thread(current_thread(), handle) }
}

/// Whether `handle` points into a slot of the innermost shadow frame.
pub fn is_frame_slot(handle: JObject) -> bool {
    let thread = current_thread();
    unsafe { ShadowFrame::contains_slot((*thread).top_shadow_frame, handle as usize) }
}
