//! Tables of native numeric types and the impls stamped out over them.

/// Every integer width the codec accepts.
/// Arguments passed to callback:
/// 1. Rust Type
/// 2. Signedness (`signed` / `unsigned`)
macro_rules! for_each_int {
    ($m:ident) => {
        $m!(i8, signed);
        $m!(i16, signed);
        $m!(i32, signed);
        $m!(i64, signed);
        $m!(isize, signed);
        $m!(u8, unsigned);
        $m!(u16, unsigned);
        $m!(u32, unsigned);
        $m!(u64, unsigned);
        $m!(usize, unsigned);
    };
}

/// Integer widths allowed as collection elements. `u8` is absent: `Vec<u8>`
/// is a byte sequence, not a number list.
macro_rules! for_each_int_element {
    ($m:ident) => {
        $m!(i8);
        $m!(i16);
        $m!(i32);
        $m!(i64);
        $m!(isize);
        $m!(u16);
        $m!(u32);
        $m!(u64);
        $m!(usize);
    };
}

macro_rules! for_each_float {
    ($m:ident) => {
        $m!(f32);
        $m!(f64);
    };
}

/// `From<Payload> for Content` for every message payload named after its variant.
macro_rules! content_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Content {
                fn from(msg: $variant) -> Self {
                    Content::$variant(msg)
                }
            }
        )*
    };
}

pub(crate) use content_from;
pub(crate) use for_each_float;
pub(crate) use for_each_int;
pub(crate) use for_each_int_element;
