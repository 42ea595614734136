//! `mt-asf` -- ASF (WMA/WMV) header object engine.
//!
//! Module overview:
//! - **guid**: GUID type, text form and well-known object ids
//! - **object**: object header codec (GUID + little-endian QWORD size)
//! - **attribute**: typed attribute values with coercive accessors
//! - **objects**: file/stream properties, content descriptions, metadata, padding
//! - **tree**: header and header extension containers, object factory with
//!   host-registered creators
//! - **tag**: `AsfTag` and attribute routing
//! - **file**: read/save against a `ByteStore`

pub mod attribute;
pub mod file;
pub mod guid;
pub mod object;
pub mod objects;
pub mod tag;
pub mod tree;

pub use attribute::{Attribute, AttributeValue, ValueContext, ValueType};
pub use file::{read_tag, save_tag, AsfFile};
pub use guid::Guid;
pub use mt_common::{TagError, TagResult};
pub use object::ObjectHeader;
pub use tag::{AsfTag, AttributeSlot};
pub use tree::{
    AsfObject, CustomObject, HeaderExtensionObject, HeaderObject, ObjectCreator, ObjectFactory,
};
