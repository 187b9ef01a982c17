//! jbridge compiler
//!
//! Generates the bridge (trampoline) that managed code calls to reach a
//! JNI native method. The bridge, emitted as Cranelift IR and compiled
//! in-process or into an object file:
//!
//! 1. links a GC-visible shadow frame holding every reference argument
//! 2. passes references to native code as handles into that frame
//! 3. opens a fresh local reference segment
//! 4. switches the thread to `Native` exactly for the duration of the call
//! 5. decodes a returned handle, closes the segment and unlinks the frame
//!
//! # Example
//!
//! ```ignore
//! let mut unit = CompilationUnit::jit(CompilerConfig::default())?;
//! let compiled = JniCompiler::new(&mut unit, &methods, method_idx)?.compile()?;
//! unit.finalize()?;
//! let code = unit.entry_point(&compiled);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod config;
pub mod mangle;
pub mod method;
pub mod signature;
pub mod addressing;
pub mod frame;
pub mod marshal;
pub mod guards;
pub mod unit;
pub mod emitter;

pub use error::{BridgeError, Result};
pub use config::{CompilerConfig, OptLevel};
pub use method::{shorty_from_descriptor, MethodResolver, MethodTable, ResolvedMethod};
pub use signature::{BridgeSignature, JType, SignatureBuilder, SignatureForm};
pub use unit::{CompilationUnit, CompiledMethod, InstructionSet, RuntimeSupport};
pub use emitter::{BridgeStage, JniCompiler};

// Backends, so callers can name unit types without their own cranelift deps
#[cfg(feature = "jit")]
pub use cranelift_jit::JITModule;
#[cfg(feature = "aot")]
pub use cranelift_object::ObjectModule;
