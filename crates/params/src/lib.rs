//! OpenAPI style parameter and body extraction for http requests
//!
//! A record type describes its fields through [`Reflect`]; every field carries optional
//! annotations such as `parameter` (where and how the value is serialized on the wire) or
//! `body` (how the request body maps onto the field). The [`Codec`] turns a request into
//! such a record in three stages:
//!
//! 1. resolve the record's [`StructDescriptor`](schema::StructDescriptor), built once per type and
//!    cached by [`Metadata`]
//! 2. decode every described field from the query string, path variables, headers, cookies or
//!    the body, applying the OpenAPI `style`/`explode` rules
//! 3. materialize the decoded values into the record, by default through `serde`
//!
//! # Example
//!
//! ```
//! use micro_params::Codec;
//! use micro_params::request::{OptionReqBody, PathParams};
//! use micro_params::schema::{FieldInfo, Reflect, ScalarKind, ValueType};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Default, Deserialize)]
//! #[serde(default)]
//! struct ListPets {
//!     owner: i64,
//!     tags: Vec<String>,
//!     limit: Option<u32>,
//! }
//!
//! impl Reflect for ListPets {
//!     fn fields() -> Vec<FieldInfo> {
//!         vec![
//!             FieldInfo::new("owner", 0, ValueType::Scalar(ScalarKind::Integer)).tag("parameter", "owner,location=path"),
//!             FieldInfo::new("tags", 1, ValueType::Array(ScalarKind::String)),
//!             FieldInfo::new("limit", 2, ValueType::Scalar(ScalarKind::Integer)),
//!         ]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let codec = Codec::default();
//!
//!     let mut router = matchit::Router::new();
//!     router.insert("/owners/{owner}/pets", ())?;
//!     let matched = router.at("/owners/7/pets")?;
//!     let params = PathParams::from(matched.params);
//!
//!     let mut req = http::Request::builder().uri("/owners/7/pets?tags=cat&tags=dog").body(OptionReqBody::none())?;
//!     let pets: ListPets = codec.extract(&mut req, &params).await?;
//!
//!     assert_eq!(pets.owner, 7);
//!     assert_eq!(pets.tags, ["cat", "dog"]);
//!     assert_eq!(pets.limit, None);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`schema`]: field self description, annotation namespaces and the descriptor cache
//! - [`style`]: the `style`/`explode` codec for every parameter location
//! - [`decode`]: the request decoder, body dispatch and pluggable document parsers
//! - [`request`]: the raw request capability, path parameters and the request body handle
//! - [`error`]: error types of every stage
//!
//! # Errors
//!
//! Declaration problems ([`MetadataError`](error::MetadataError)) surface on the first use of a
//! record type and recur on every later use. Request problems are collected per field into
//! [`DecodeErrors`](error::DecodeErrors), so a caller can report every missing or malformed
//! parameter at once.

pub mod decode;
pub mod error;
pub mod request;
pub mod schema;
pub mod style;

mod codec;
mod materialize;

pub use codec::Codec;
pub use codec::CodecBuilder;
pub use materialize::Materializer;
pub use materialize::SerdeMaterializer;
pub use schema::Metadata;
pub use schema::Reflect;
