//! jbridge runtime
//!
//! The managed-runtime side of the JNI bridge contract:
//! - **Object model**: `#[repr(C)]` views of `Object`, `Method`, `Thread`,
//!   `JniEnv` and `ShadowFrame` that generated code addresses by offset
//! - **Layout**: the `RuntimeLayout` offset table derived from those structs
//! - **Local references**: indirect handle encoding and segment-scoped
//!   local reference table
//! - **Support entry points**: the `extern "C"` functions generated bridges
//!   import by name (current thread, frame push/pop, handle decode)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod object;
pub mod frame;
pub mod env;
pub mod thread;
pub mod layout;
pub mod support;

pub use error::RuntimeError;
pub use object::{Method, Object, ACC_NATIVE, ACC_PUBLIC, ACC_STATIC};
pub use frame::ShadowFrame;
pub use env::{IndirectRef, IndirectRefKind, JObject, JniEnv};
pub use thread::{AttachedThread, Thread, ThreadState};
pub use layout::RuntimeLayout;
