use cdr::{CdrBe, Infinite};
use core::fmt;
use log::error;
use md5::compute;
use serde::{Deserialize, Serialize};

/// 16 byte hash identifying an instance of a keyed type.
///
/// It doubles as the DDS InstanceHandle_t.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyHash {
    hash: [u8; 16],
}

impl KeyHash {
    /// HANDLE_NIL
    pub const NIL: Self = Self { hash: [0; 16] };

    pub fn new(bytes: &[u8]) -> Self {
        let mut hash_in = [0u8; 16];
        hash_in.copy_from_slice(bytes);
        Self { hash: hash_in }
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.hash
    }
}

impl fmt::Debug for KeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyHash(")?;
        for b in self.hash {
            write!(f, "{:02x}", b)?;
        }
        write!(f, ")")
    }
}

/// Trait for Data that exchanged via DDS
///
/// Types are described with a Rust struct instead of IDL and the trait is implemented with the derive macro.
/// ```
/// use serde::{Deserialize, Serialize};
/// use union_dds::DdsData;
///
/// // same as the following IDL
/// // struct ShapeType {
/// //     @key string color;
/// //     long x;
/// //     long y;
/// //     long shapesize;
/// // };
/// #[derive(Serialize, Deserialize, DdsData)]
/// #[dds_data(type_name = "ShapeType")]
/// struct Shape {
///     #[key]
///     color: String,
///     x: i32,
///     y: i32,
///     shapesize: i32,
/// }
///
/// assert_eq!(Shape::type_name(), "ShapeType");
/// assert!(Shape::is_with_key());
/// ```
/// Key fields must implement [`Key`].
pub trait DdsData {
    fn gen_key(&self) -> KeyHash;
    /// Return type name of Topic.
    ///
    /// The default value is the name of the struct.
    /// If you want to change it, specify `#[dds_data(type_name = "{name}")]`.
    fn type_name() -> String;
    /// Returns whether this type has a key.
    fn is_with_key() -> bool;
}

pub trait Key: fmt::Debug + Serialize {}

impl Key for bool {} // IDL: boolean
impl Key for char {} // IDL: char
impl Key for u8 {} // IDL: octet
impl Key for i16 {} // IDL: short
impl Key for u16 {} // IDL: unsigned short
impl Key for i32 {} // IDL: long
impl Key for u32 {} // IDL: unsigned long
impl Key for i64 {} // IDL: long long
impl Key for u64 {} // IDL: unsigned long long
impl Key for f32 {} // IDL: float
impl Key for f64 {} // IDL: double

impl Key for String {} // IDL: String
impl<K: Key> Key for Vec<K> {} // IDL: sequence<K: Key>

/// Accumulates key members for `DdsData::gen_key`.
///
/// rtps 2.3 spec, 9.6.3.8 KeyHash: members are serialized as big-endian CDR,
/// zero padded when they fit in 16 bytes, hashed with MD5 otherwise.
#[derive(Default)]
pub struct KeyHolder {
    serialized_key: Vec<u8>,
}

impl KeyHolder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<K: Key>(&mut self, key: &K) {
        match cdr::serialize::<_, _, CdrBe>(key, Infinite) {
            Ok(mut serialized) => {
                // drop the encapsulation header
                serialized.drain(0..4);
                self.serialized_key.extend(serialized);
            }
            Err(e) => error!("couldn't serialize key member {:?}: {}", key, e),
        }
    }

    pub fn finish(self) -> KeyHash {
        let mut result = self.serialized_key;
        if result.len() <= 16 {
            result.resize(16, 0);
            KeyHash::new(&result)
        } else {
            KeyHash::new(&compute(result).0)
        }
    }
}
