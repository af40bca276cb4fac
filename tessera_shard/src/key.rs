//! Routing keys and shard identifiers.
//!
//! Both sets are closed: a key is a signed or unsigned 64-bit integer, a
//! string or a byte sequence, and the traits below are sealed so no other type
//! can enter the routing path.

use std::borrow::Cow;
use std::fmt;
use std::hash::Hash;

mod sealed {
    pub trait Sealed {}
}

/// Borrowed view of a routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key<'a> {
    /// Signed integer key.
    Int(i64),
    /// Unsigned integer key.
    Uint(u64),
    /// Text key.
    Str(&'a str),
    /// Raw byte key.
    Bytes(&'a [u8]),
}

impl<'a> Key<'a> {
    /// Bytes fed to the hash: integers as base-10 ASCII, text and bytes verbatim.
    pub fn encode(&self) -> Cow<'a, [u8]> {
        match *self {
            Key::Int(v) => Cow::Owned(v.to_string().into_bytes()),
            Key::Uint(v) => Cow::Owned(v.to_string().into_bytes()),
            Key::Str(s) => Cow::Borrowed(s.as_bytes()),
            Key::Bytes(b) => Cow::Borrowed(b),
        }
    }

    /// Copy the key out of its borrow.
    pub fn to_owned_key(&self) -> OwnedKey {
        match *self {
            Key::Int(v) => OwnedKey::Int(v),
            Key::Uint(v) => OwnedKey::Uint(v),
            Key::Str(s) => OwnedKey::Str(s.to_owned()),
            Key::Bytes(b) => OwnedKey::Bytes(b.to_vec()),
        }
    }
}

impl fmt::Display for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Uint(v) => write!(f, "{v}"),
            Key::Str(s) => f.write_str(s),
            Key::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Owned routing key, for keys whose kind is only known at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OwnedKey {
    /// Signed integer key.
    Int(i64),
    /// Unsigned integer key.
    Uint(u64),
    /// Text key.
    Str(String),
    /// Raw byte key.
    Bytes(Vec<u8>),
}

impl fmt::Display for OwnedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_key().fmt(f)
    }
}

/// Types that can be routed to a shard.
pub trait ShardKey: sealed::Sealed {
    /// Borrow as a [`Key`].
    fn as_key(&self) -> Key<'_>;
}

macro_rules! shard_key {
    ($($ty:ty => |$v:ident| $body:expr;)*) => {$(
        impl sealed::Sealed for $ty {}
        impl ShardKey for $ty {
            fn as_key(&self) -> Key<'_> {
                let $v = self;
                $body
            }
        }
    )*};
}

shard_key! {
    i64 => |v| Key::Int(*v);
    u64 => |v| Key::Uint(*v);
    str => |v| Key::Str(v);
    String => |v| Key::Str(v.as_str());
    [u8] => |v| Key::Bytes(v);
    Vec<u8> => |v| Key::Bytes(v.as_slice());
}

impl sealed::Sealed for OwnedKey {}

impl ShardKey for OwnedKey {
    fn as_key(&self) -> Key<'_> {
        match self {
            OwnedKey::Int(v) => Key::Int(*v),
            OwnedKey::Uint(v) => Key::Uint(*v),
            OwnedKey::Str(s) => Key::Str(s),
            OwnedKey::Bytes(b) => Key::Bytes(b),
        }
    }
}

impl<T: sealed::Sealed + ?Sized> sealed::Sealed for &T {}

impl<T: ShardKey + ?Sized> ShardKey for &T {
    fn as_key(&self) -> Key<'_> {
        (**self).as_key()
    }
}

/// Label of a shard. Independent of the key type used for routing.
pub trait ShardId:
    sealed::Sealed + Clone + Ord + Hash + fmt::Debug + Send + Sync + 'static
{
    /// Non-zero for numbers, non-empty for strings and bytes.
    fn is_valid(&self) -> bool;
}

impl ShardId for i64 {
    fn is_valid(&self) -> bool {
        *self != 0
    }
}

impl ShardId for u64 {
    fn is_valid(&self) -> bool {
        *self != 0
    }
}

impl ShardId for String {
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }
}

impl ShardId for Vec<u8> {
    fn is_valid(&self) -> bool {
        !self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_encode_as_decimal() {
        assert_eq!(&*Key::Int(122).encode(), b"122");
        assert_eq!(&*Key::Int(-42).encode(), b"-42");
        assert_eq!(&*Key::Uint(u64::MAX).encode(), b"18446744073709551615");
    }

    #[test]
    fn text_and_bytes_encode_verbatim() {
        assert_eq!(&*"abc".as_key().encode(), b"abc");
        assert_eq!(&*vec![0u8, 1, 2].as_key().encode(), &[0u8, 1, 2]);
        assert_eq!(String::from("122").as_key().encode(), 122i64.as_key().encode());
    }

    #[test]
    fn owned_key_matches_borrowed() {
        let keys = [Key::Int(-1), Key::Uint(7), Key::Str("x"), Key::Bytes(b"yz")];
        for key in keys {
            assert_eq!(key.to_owned_key().as_key(), key);
        }
        assert_eq!(OwnedKey::Str("k1".into()).to_string(), "k1");
        assert_eq!(OwnedKey::Int(-3).to_string(), "-3");
    }

    #[test]
    fn shard_id_validity() {
        assert!(!0i64.is_valid());
        assert!(1i64.is_valid());
        assert!(!0u64.is_valid());
        assert!(!String::new().is_valid());
        assert!("db1".to_string().is_valid());
        assert!(!Vec::<u8>::new().is_valid());
    }
}
