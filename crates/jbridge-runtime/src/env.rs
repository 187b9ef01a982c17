//! Native environment and indirect reference handles
//!
//! Native code never sees object pointers directly. It receives opaque
//! `jobject` handles, which come in two shapes:
//!
//! - **Frame handles**: the address of a shadow-frame slot. Slots are
//!   pointer aligned, so the low two bits are always zero.
//! - **Local handles**: `(index << 2) | 1`, an index into the environment's
//!   local reference table.
//!
//! The local table is scoped by segments. `segment_state` is the current
//! top of the table; `local_ref_cookie` marks where the innermost native
//! call's segment begins. Restoring `segment_state` to the cookie reclaims
//! every reference created since.

use std::ffi::c_void;
use std::ptr;

use crate::error::RuntimeError;
use crate::object::Object;
use crate::thread::Thread;

/// Opaque object handle passed to native code (`jobject`).
pub type JObject = *mut c_void;

const KIND_MASK: usize = 0b11;
const KIND_LOCAL: usize = 0b01;

/// Kind of an indirect reference, encoded in its low bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectRefKind {
    /// The null handle
    Null,
    /// Address of a shadow-frame slot (or a direct pointer)
    Frame,
    /// Index into the local reference table
    Local,
    /// Unrecognised tag bits
    Invalid,
}

/// Decoded view of a `jobject` handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndirectRef(usize);

impl IndirectRef {
    /// Wrap a raw handle.
    pub fn from_raw(handle: JObject) -> Self {
        IndirectRef(handle as usize)
    }

    /// Encode a local table index.
    pub fn local(index: u32) -> Self {
        IndirectRef(((index as usize) << 2) | KIND_LOCAL)
    }

    /// Raw handle value.
    pub fn into_raw(self) -> JObject {
        self.0 as JObject
    }

    /// Kind encoded in the handle.
    pub fn kind(self) -> IndirectRefKind {
        if self.0 == 0 {
            return IndirectRefKind::Null;
        }
        match self.0 & KIND_MASK {
            0 => IndirectRefKind::Frame,
            KIND_LOCAL => IndirectRefKind::Local,
            _ => IndirectRefKind::Invalid,
        }
    }

    /// Local table index, if this is a local handle.
    pub fn local_index(self) -> Option<u32> {
        match self.kind() {
            IndirectRefKind::Local => Some((self.0 >> 2) as u32),
            _ => None,
        }
    }
}

/// Per-thread native environment (`JNIEnv`).
///
/// Generated bridges touch only `local_ref_cookie` and `segment_state`.
#[repr(C)]
#[derive(Debug)]
pub struct JniEnv {
    /// JNI function table (unused by bridges)
    pub functions: *const c_void,
    /// Thread that owns this environment
    pub self_thread: *mut Thread,
    /// Start of the current local reference segment
    pub local_ref_cookie: u32,
    /// Current top of the local reference table
    pub segment_state: u32,
    /// Local reference table storage
    pub locals: Vec<*mut Object>,
}

impl JniEnv {
    /// Create an empty environment owned by `thread`.
    pub fn new(self_thread: *mut Thread) -> Self {
        JniEnv {
            functions: ptr::null(),
            self_thread,
            local_ref_cookie: 0,
            segment_state: 0,
            locals: Vec::new(),
        }
    }

    /// Create a local reference in the current segment.
    ///
    /// Returns the null handle for a null object.
    pub fn new_local_ref(&mut self, obj: *mut Object) -> JObject {
        if obj.is_null() {
            return ptr::null_mut();
        }
        let index = self.segment_state;
        // Anything above the segment top was reclaimed by an earlier pop
        self.locals.truncate(index as usize);
        self.locals.push(obj);
        self.segment_state += 1;
        IndirectRef::local(index).into_raw()
    }

    /// Number of live references in the current segment.
    pub fn segment_len(&self) -> u32 {
        self.segment_state.saturating_sub(self.local_ref_cookie)
    }

    /// Resolve a local handle index against the live part of the table.
    pub fn decode_local(&self, index: u32) -> Result<*mut Object, RuntimeError> {
        let stale = RuntimeError::StaleLocalRef {
            index,
            segment_state: self.segment_state,
        };
        if index >= self.segment_state {
            return Err(stale);
        }
        // A host may have moved segment_state past the table
        self.locals.get(index as usize).copied().ok_or(stale)
    }
}
