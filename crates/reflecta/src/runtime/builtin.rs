//! Builtin types with fixed ids.
//!
//! The scalar types, `String`, `Vec<u8>` (bytes), `Vec<String>` (string
//! list), [`MetaValue`] and void always carry the ids below. User types are
//! numbered from [`FIRST_USER_TYPE`].

use crate::runtime::meta_type::{MetaType, MetaTypeOf, TypeDescriptor, TypeFlags};
use crate::runtime::registry;
use crate::runtime::value::MetaValue;
use std::any::TypeId;
use std::sync::{Once, OnceLock};

/// Void; never registered.
pub const VOID: i32 = 0;
/// `bool`
pub const BOOL: i32 = 1;
/// `i32`
pub const I32: i32 = 2;
/// `u32`
pub const U32: i32 = 3;
/// `i64`
pub const I64: i32 = 4;
/// `u64`
pub const U64: i32 = 5;
/// `f64`
pub const F64: i32 = 6;
/// `char`
pub const CHAR: i32 = 7;
/// `String`
pub const STRING: i32 = 10;
/// `Vec<String>`
pub const STRING_LIST: i32 = 11;
/// `Vec<u8>`
pub const BYTES: i32 = 12;
/// `i16`
pub const I16: i32 = 33;
/// `u16`
pub const U16: i32 = 36;
/// `u8`
pub const U8: i32 = 37;
/// `f32`
pub const F32: i32 = 38;
/// `i8`
pub const I8: i32 = 40;
/// [`MetaValue`]
pub const META_VALUE: i32 = 41;
/// `i128`
pub const I128: i32 = 50;
/// `u128`
pub const U128: i32 = 51;
/// `isize`
pub const ISIZE: i32 = 52;
/// `usize`
pub const USIZE: i32 = 53;

/// First id handed to user types.
pub const FIRST_USER_TYPE: i32 = 65536;

macro_rules! builtin_scalars {
    ($($ty:ty => $name:literal, $flags:expr;)*) => {
        $(
            impl MetaTypeOf for $ty {
                fn descriptor() -> &'static TypeDescriptor {
                    static DESCRIPTOR: OnceLock<&'static TypeDescriptor> = OnceLock::new();
                    DESCRIPTOR.get_or_init(|| {
                        registry::intern_type::<$ty>(|| {
                            // SAFETY: all-zero is a valid value of every builtin scalar.
                            unsafe { crate::__detect_descriptor!($ty, $name).trivially_constructible() }
                                .flags($flags)
                                .build()
                        })
                    })
                }
            }
        )*
    };
}

builtin_scalars! {
    () => "void", TypeFlags::empty();
    bool => "bool", TypeFlags::empty();
    char => "char", TypeFlags::empty();
    i8 => "i8", TypeFlags::empty();
    i16 => "i16", TypeFlags::empty();
    i32 => "i32", TypeFlags::empty();
    i64 => "i64", TypeFlags::empty();
    i128 => "i128", TypeFlags::empty();
    isize => "isize", TypeFlags::empty();
    u8 => "u8", TypeFlags::IS_UNSIGNED;
    u16 => "u16", TypeFlags::IS_UNSIGNED;
    u32 => "u32", TypeFlags::IS_UNSIGNED;
    u64 => "u64", TypeFlags::IS_UNSIGNED;
    u128 => "u128", TypeFlags::IS_UNSIGNED;
    usize => "usize", TypeFlags::IS_UNSIGNED;
    f32 => "f32", TypeFlags::empty();
    f64 => "f64", TypeFlags::empty();
}

crate::declare_metatype!(String);
crate::declare_metatype!(MetaValue);

/// Fixed id of a builtin type, if `type_id` is one.
#[must_use]
pub fn id_for_type_id(type_id: TypeId) -> Option<i32> {
    fixed_ids()
        .iter()
        .find(|(t, _)| *t == type_id)
        .map(|&(_, id)| id)
}

fn fixed_ids() -> &'static [(TypeId, i32)] {
    static IDS: OnceLock<Vec<(TypeId, i32)>> = OnceLock::new();
    IDS.get_or_init(|| {
        vec![
            (TypeId::of::<bool>(), BOOL),
            (TypeId::of::<i32>(), I32),
            (TypeId::of::<u32>(), U32),
            (TypeId::of::<i64>(), I64),
            (TypeId::of::<u64>(), U64),
            (TypeId::of::<f64>(), F64),
            (TypeId::of::<char>(), CHAR),
            (TypeId::of::<String>(), STRING),
            (TypeId::of::<Vec<String>>(), STRING_LIST),
            (TypeId::of::<Vec<u8>>(), BYTES),
            (TypeId::of::<i16>(), I16),
            (TypeId::of::<u16>(), U16),
            (TypeId::of::<u8>(), U8),
            (TypeId::of::<f32>(), F32),
            (TypeId::of::<i8>(), I8),
            (TypeId::of::<MetaValue>(), META_VALUE),
            (TypeId::of::<i128>(), I128),
            (TypeId::of::<u128>(), U128),
            (TypeId::of::<isize>(), ISIZE),
            (TypeId::of::<usize>(), USIZE),
        ]
    })
}

/// Every builtin type except void.
#[must_use]
pub fn builtin_types() -> Vec<MetaType> {
    vec![
        MetaType::of::<bool>(),
        MetaType::of::<i32>(),
        MetaType::of::<u32>(),
        MetaType::of::<i64>(),
        MetaType::of::<u64>(),
        MetaType::of::<f64>(),
        MetaType::of::<char>(),
        MetaType::of::<String>(),
        MetaType::of::<Vec<String>>(),
        MetaType::of::<Vec<u8>>(),
        MetaType::of::<i16>(),
        MetaType::of::<u16>(),
        MetaType::of::<u8>(),
        MetaType::of::<f32>(),
        MetaType::of::<i8>(),
        MetaType::of::<MetaValue>(),
        MetaType::of::<i128>(),
        MetaType::of::<u128>(),
        MetaType::of::<isize>(),
        MetaType::of::<usize>(),
    ]
}

/// Registers all builtins and their common aliases once per process.
pub(crate) fn ensure_registered() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        for meta in builtin_types() {
            meta.id();
        }

        let void = <() as MetaTypeOf>::descriptor();
        registry::insert_name("void", void);
        registry::insert_name("()", void);

        let aliases = [
            ("int", MetaType::of::<i32>()),
            ("uint", MetaType::of::<u32>()),
            ("double", MetaType::of::<f64>()),
            ("float", MetaType::of::<f32>()),
            ("bytes", MetaType::of::<Vec<u8>>()),
            ("str", MetaType::of::<String>()),
        ];
        for (alias, meta) in aliases {
            if let Some(descriptor) = meta.descriptor() {
                registry::insert_name(alias, descriptor);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_ids() {
        assert_eq!(MetaType::of::<bool>().id(), BOOL);
        assert_eq!(MetaType::of::<i32>().id(), I32);
        assert_eq!(MetaType::of::<String>().id(), STRING);
        assert_eq!(MetaType::of::<Vec<u8>>().id(), BYTES);
        assert_eq!(MetaType::of::<Vec<String>>().id(), STRING_LIST);
        assert_eq!(MetaType::of::<MetaValue>().id(), META_VALUE);
    }

    #[test]
    fn test_builtin_ids_below_user_range() {
        for meta in builtin_types() {
            assert!(meta.id() > VOID && meta.id() < FIRST_USER_TYPE, "{meta:?}");
        }
    }

    #[test]
    fn test_names_and_aliases() {
        assert_eq!(MetaType::from_name("Vec<u8>").id(), BYTES);
        assert_eq!(MetaType::from_name("bytes").id(), BYTES);
        assert_eq!(MetaType::from_name("double").id(), F64);
        assert!(MetaType::from_name("void").is_void());
        assert!(MetaType::from_name("()").is_void());
    }

    #[test]
    fn test_scalars_are_trivially_constructible() {
        let meta = MetaType::of::<u64>();
        assert!(!meta.flags().contains(TypeFlags::NEEDS_CONSTRUCTION));
        assert!(MetaType::of::<String>().flags().contains(TypeFlags::NEEDS_CONSTRUCTION));
    }
}
