//! Declarative stand-ins for the schema code generator.
//!
//! Flag-free constructors are declared through these macros; constructors
//! carrying a `flags:#` word or a generic `!X` parameter are written out by
//! hand next to them.

/// A bare constructor: fields are written in order, without the ID.
macro_rules! tl_type {
    (
        $(#[$meta:meta])*
        $name:ident = $id:literal { $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl crate::Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $id;
        }

        impl crate::Serializable for $name {
            #[allow(unused_variables)]
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                $( crate::Serializable::serialize(&self.$field, buf); )*
            }
        }

        impl crate::Deserializable for $name {
            #[allow(unused_variables)]
            fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
                $( let $field = <$ty as crate::Deserializable>::deserialize(buf)?; )*
                Ok(Self { $( $field, )* })
            }
        }
    };
}

/// A function: the ID is written first, then the fields.
///
/// Deserialization reads the fields only; the caller has already matched the
/// ID (server-side decoding, used by test harnesses).
macro_rules! tl_function {
    (
        $(#[$meta:meta])*
        $name:ident = $id:literal { $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)? } -> $ret:ty
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl crate::Identifiable for $name {
            const CONSTRUCTOR_ID: u32 = $id;
        }

        impl crate::Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                crate::Serializable::serialize(&<Self as crate::Identifiable>::CONSTRUCTOR_ID, buf);
                $( crate::Serializable::serialize(&self.$field, buf); )*
            }
        }

        impl crate::Deserializable for $name {
            #[allow(unused_variables)]
            fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
                $( let $field = <$ty as crate::Deserializable>::deserialize(buf)?; )*
                Ok(Self { $( $field, )* })
            }
        }

        impl crate::RemoteCall for $name {
            type Return = $ret;
        }
    };
}

/// A boxed type: one variant per constructor, decoded by matching the tag.
macro_rules! tl_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $( $variant:ident ( $ty:ty ) ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        pub enum $name {
            $( $variant($ty), )+
        }

        impl crate::Serializable for $name {
            fn serialize(&self, buf: &mut impl Extend<u8>) {
                match self {
                    $(
                        Self::$variant(x) => {
                            crate::Serializable::serialize(&<$ty as crate::Identifiable>::CONSTRUCTOR_ID, buf);
                            crate::Serializable::serialize(x, buf);
                        }
                    )+
                }
            }
        }

        impl crate::Deserializable for $name {
            fn deserialize(buf: crate::deserialize::Buffer) -> crate::deserialize::Result<Self> {
                let id = <u32 as crate::Deserializable>::deserialize(buf)?;
                $(
                    if id == <$ty as crate::Identifiable>::CONSTRUCTOR_ID {
                        return Ok(Self::$variant(<$ty as crate::Deserializable>::deserialize(buf)?));
                    }
                )+
                Err(crate::deserialize::Error::UnknownConstructor { id })
            }
        }

        $(
            impl From<$ty> for $name {
                fn from(x: $ty) -> Self { Self::$variant(x) }
            }
        )+
    };
}
