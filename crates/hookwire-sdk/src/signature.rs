//! Signature tags and callback references.
//!
//! The registry stores callbacks untyped. Every callback registered through
//! the typed API carries a [`Signature`] computed at compile time from its
//! function shape, so a caller that retrieves it under the wrong shape gets an
//! error instead of calling through a mistyped pointer.

use std::fmt;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a hash of a type name, usable in const context.
pub const fn tag_of(name: &str) -> u64 {
    let bytes = name.as_bytes();
    let mut hash = FNV_OFFSET;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
        i += 1;
    }
    hash
}

/// Order-sensitive mix of two tags.
pub const fn combine(seed: u64, tag: u64) -> u64 {
    let mixed = seed
        ^ tag
            .wrapping_add(0x9e37_79b9_7f4a_7c15)
            .wrapping_add(seed << 6)
            .wrapping_add(seed >> 2);
    mixed.wrapping_mul(FNV_PRIME)
}

/// Value types that may appear in a callback signature.
pub trait TypeTag {
    const TAG: u64;
}

macro_rules! impl_type_tag {
    ($($ty:ty),* $(,)?) => {
        $(
            impl TypeTag for $ty {
                const TAG: u64 = tag_of(stringify!($ty));
            }
        )*
    };
}

impl_type_tag!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str,
);

impl<T: TypeTag> TypeTag for Vec<T> {
    const TAG: u64 = combine(tag_of("Vec"), T::TAG);
}

impl<T: TypeTag> TypeTag for Option<T> {
    const TAG: u64 = combine(tag_of("Option"), T::TAG);
}

/// Compile-time descriptor of a callback's function shape.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(u64);

impl Signature {
    /// Marks a callback registered without type information.
    pub const ERASED: Signature = Signature(0);

    /// Build a tag from a raw hash. Zero is reserved for [`Signature::ERASED`].
    pub const fn from_hash(hash: u64) -> Self {
        if hash == 0 {
            Signature(1)
        } else {
            Signature(hash)
        }
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn is_erased(self) -> bool {
        self.0 == 0
    }

    /// Signature of a callback type, e.g. `Signature::of::<fn(i32) -> i32>()`.
    pub const fn of<F: Callable>() -> Self {
        F::SIGNATURE
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_erased() {
            f.write_str("sig:erased")
        } else {
            write!(f, "sig:{:016x}", self.0)
        }
    }
}

/// Function pointer types that can be stored as callbacks.
///
/// Implemented for `fn() -> R`, `fn(A) -> R` and `fn(A, B) -> R` over
/// [`TypeTag`] types. Fn items must be cast to the pointer type first:
/// `edit_seed as fn(i32) -> i32`.
pub trait Callable: Copy + 'static {
    const SIGNATURE: Signature;

    fn erase(self) -> *const ();

    /// # Safety
    /// `address` must come from [`Callable::erase`] on a value of this exact type.
    unsafe fn restore(address: *const ()) -> Self;
}

impl<R: TypeTag + 'static> Callable for fn() -> R {
    const SIGNATURE: Signature = Signature::from_hash(combine(tag_of("fn/0"), R::TAG));

    fn erase(self) -> *const () {
        self as *const ()
    }

    unsafe fn restore(address: *const ()) -> Self {
        // SAFETY: fn pointers and data pointers share size on supported targets.
        unsafe { std::mem::transmute_copy::<*const (), Self>(&address) }
    }
}

impl<A: TypeTag + 'static, R: TypeTag + 'static> Callable for fn(A) -> R {
    const SIGNATURE: Signature =
        Signature::from_hash(combine(combine(tag_of("fn/1"), A::TAG), R::TAG));

    fn erase(self) -> *const () {
        self as *const ()
    }

    unsafe fn restore(address: *const ()) -> Self {
        // SAFETY: see the nullary impl.
        unsafe { std::mem::transmute_copy::<*const (), Self>(&address) }
    }
}

impl<A: TypeTag + 'static, B: TypeTag + 'static, R: TypeTag + 'static> Callable
    for fn(A, B) -> R
{
    const SIGNATURE: Signature = Signature::from_hash(combine(
        combine(combine(tag_of("fn/2"), A::TAG), B::TAG),
        R::TAG,
    ));

    fn erase(self) -> *const () {
        self as *const ()
    }

    unsafe fn restore(address: *const ()) -> Self {
        // SAFETY: see the nullary impl.
        unsafe { std::mem::transmute_copy::<*const (), Self>(&address) }
    }
}

/// Opaque reference to a plugin-supplied function.
///
/// Identity is the code address: the same function attached twice under one
/// handle is a duplicate regardless of its tag.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackRef {
    address: *const (),
    signature: Signature,
}

// A callback reference is a code address; it carries no data.
unsafe impl Send for CallbackRef {}
unsafe impl Sync for CallbackRef {}

impl CallbackRef {
    /// Reference a typed function, tagging it with its signature.
    pub fn of<F: Callable>(function: F) -> Self {
        Self {
            address: function.erase(),
            signature: F::SIGNATURE,
        }
    }

    /// Reference a function without type information.
    ///
    /// # Safety
    /// `address` must be a function pointer. Erased callbacks never pass
    /// typed lookups; every consumer must agree on their shape out of band.
    pub unsafe fn erased(address: *const ()) -> Self {
        Self {
            address,
            signature: Signature::ERASED,
        }
    }

    /// # Safety
    /// `signature` must describe the function at `address`.
    pub unsafe fn from_raw_parts(address: *const (), signature: Signature) -> Self {
        Self { address, signature }
    }

    pub fn address(&self) -> *const () {
        self.address
    }

    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Whether both references point at the same function.
    pub fn same_target(&self, other: &CallbackRef) -> bool {
        std::ptr::eq(self.address, other.address)
    }

    /// Recover the typed function if the tag matches `F`.
    pub fn typed<F: Callable>(&self) -> Option<F> {
        if self.address.is_null() || self.signature.is_erased() || self.signature != F::SIGNATURE {
            return None;
        }
        // SAFETY: the tag was produced from `F` by `CallbackRef::of`, or
        // vouched for by the unsafe constructors.
        Some(unsafe { F::restore(self.address) })
    }

    /// Recover a function without checking the tag.
    ///
    /// # Safety
    /// The referenced function must have type `F`.
    pub unsafe fn cast_unchecked<F: Callable>(&self) -> F {
        unsafe { F::restore(self.address) }
    }
}
