//! Typed identifiers for database rows.
//!
//! Every table uses a `SERIAL` primary key. Wrapping the raw `i32` in a
//! distinct type per table keeps a `ProductId` from being passed where a
//! `CategoryId` is expected.

/// Define a `SERIAL`-backed identifier newtype.
///
/// The generated type is `Copy`, serializes as a bare integer, parses from
/// path segments via `FromStr`, and (with the `postgres` feature) binds and
/// decodes as `INT4`.
///
/// # Example
///
/// ```rust
/// # use animart_core::define_id;
/// define_id!(ShelfId);
///
/// let id: ShelfId = "42".parse().unwrap();
/// assert_eq!(id.as_i32(), 42);
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw row ID.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw row ID.
            #[must_use]
            pub const fn as_i32(&self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(UserId);
define_id!(AddressId);
define_id!(CategoryId);
define_id!(ProductId);
define_id!(VariantId);
define_id!(ColorId);
define_id!(OrderId);
define_id!(OrderItemId);
define_id!(CouponId);
define_id!(ContactMessageId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_path_segment() {
        let id: ProductId = " 17 ".parse().unwrap();
        assert_eq!(id, ProductId::new(17));
        assert!("abc".parse::<ProductId>().is_err());
    }

    #[test]
    fn test_serializes_as_integer() {
        let json = serde_json::to_string(&OrderId::new(9)).unwrap();
        assert_eq!(json, "9");
        let back: OrderId = serde_json::from_str("9").unwrap();
        assert_eq!(back.as_i32(), 9);
    }
}
