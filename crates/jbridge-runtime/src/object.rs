//! Managed objects and methods as seen by generated code

use std::ffi::c_void;
use std::ptr;

/// `public` access flag
pub const ACC_PUBLIC: u32 = 0x0001;
/// `static` access flag
pub const ACC_STATIC: u32 = 0x0008;
/// `native` access flag
pub const ACC_NATIVE: u32 = 0x0100;

/// A heap object header.
///
/// Bridges never look inside objects; they only move references around,
/// so the header carries just enough to tell objects apart in tests and
/// diagnostics.
#[repr(C)]
#[derive(Debug)]
pub struct Object {
    /// Class object of this instance (null for class objects themselves)
    pub class: *mut Object,
    /// Opaque payload word
    pub payload: u64,
}

impl Object {
    /// Create an object of the given class.
    pub fn new(class: *mut Object, payload: u64) -> Self {
        Object { class, payload }
    }

    /// Allocate a class object on the heap and leak it as a raw pointer.
    ///
    /// Class objects live for the lifetime of the runtime.
    pub fn leak_class(payload: u64) -> *mut Object {
        Box::into_raw(Box::new(Object::new(ptr::null_mut(), payload)))
    }
}

/// Runtime representation of a resolved method.
///
/// Generated bridges receive a pointer to this as their first argument and
/// read `declaring_class` and `native_method` through fixed offsets.
#[repr(C)]
#[derive(Debug)]
pub struct Method {
    /// Class that declares this method
    pub declaring_class: *mut Object,
    /// Access flags (`ACC_*`)
    pub access_flags: u32,
    /// Index of the method in its dex/method table
    pub method_idx: u32,
    /// Registered native implementation (null until bound)
    pub native_method: *const c_void,
}

impl Method {
    /// Create an unbound method.
    pub fn new(declaring_class: *mut Object, access_flags: u32, method_idx: u32) -> Self {
        Method {
            declaring_class,
            access_flags,
            method_idx,
            native_method: ptr::null(),
        }
    }

    /// Bind the native implementation the bridge will call.
    pub fn register_native(&mut self, code: *const c_void) {
        self.native_method = code;
    }

    /// Whether the method is static.
    #[inline]
    pub fn is_static(&self) -> bool {
        self.access_flags & ACC_STATIC != 0
    }

    /// Whether the method is declared `native`.
    #[inline]
    pub fn is_native(&self) -> bool {
        self.access_flags & ACC_NATIVE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_flags() {
        let class = Object::leak_class(1);
        let m = Method::new(class, ACC_PUBLIC | ACC_STATIC | ACC_NATIVE, 7);
        assert!(m.is_static());
        assert!(m.is_native());
        assert!(m.native_method.is_null());

        let m = Method::new(class, ACC_PUBLIC, 8);
        assert!(!m.is_static());
        assert!(!m.is_native());
    }

    #[test]
    fn test_register_native() {
        extern "C" fn stub() {}
        let mut m = Method::new(ptr::null_mut(), ACC_NATIVE, 0);
        m.register_native(stub as *const c_void);
        assert_eq!(m.native_method, stub as *const c_void);
    }
}
