//! The request surface the decoder reads from.
//!
//! - [`RawRequest`]: uri, headers and a body that can be taken exactly once
//! - [`OptionReqBody`]: the body slot used by the `http::Request` implementation
//! - [`PathParams`]: named path segments matched by the router

use crate::error::{BodyError, BoxError};
use bytes::Bytes;
use cookie::Cookie;
use http::header::{CONTENT_TYPE, COOKIE};
use http::{HeaderMap, Request, Uri};
use http_body::Body as HttpBody;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use matchit::Params;
use mime::Mime;
use multer::{Constraints, Multipart};
use std::collections::HashMap;
use std::fmt;

/// A boxed, single pass request body.
pub type RequestBody = BoxBody<Bytes, BoxError>;

/// Read access to an incoming request.
pub trait RawRequest {
    fn uri(&self) -> &Uri;

    fn headers(&self) -> &HeaderMap;

    /// Returns true while the body has not been taken.
    fn has_body(&self) -> bool;

    /// Takes the body out of the request; every later call returns `None`.
    fn take_body(&mut self) -> Option<RequestBody>;

    fn query(&self) -> Option<&str> {
        self.uri().query()
    }

    fn content_type(&self) -> Option<Mime> {
        self.headers().get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }

    /// Every `name=value` pair of every `Cookie` header, in order. Malformed pairs are skipped.
    fn cookies(&self) -> Vec<(String, String)> {
        self.headers()
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .map(|cookie| (cookie.name().to_owned(), cookie.value().to_owned()))
            .collect()
    }

    /// Takes the body as a `multipart/form-data` stream.
    fn multipart(&mut self, constraints: Constraints) -> Result<Multipart<'static>, BodyError> {
        let content_type = self.headers().get(CONTENT_TYPE).and_then(|value| value.to_str().ok()).unwrap_or_default();
        let boundary = multer::parse_boundary(content_type)?;
        let body = self.take_body().ok_or(BodyError::Consumed)?;
        Ok(Multipart::with_constraints(body.into_data_stream(), boundary, constraints))
    }
}

impl RawRequest for Request<OptionReqBody> {
    fn uri(&self) -> &Uri {
        Request::uri(self)
    }

    fn headers(&self) -> &HeaderMap {
        Request::headers(self)
    }

    fn has_body(&self) -> bool {
        self.body().can_consume()
    }

    fn take_body(&mut self) -> Option<RequestBody> {
        self.body_mut().take()
    }
}

/// A request body slot that is emptied by the first consumer.
#[derive(Default)]
pub struct OptionReqBody {
    inner: Option<RequestBody>,
}

impl OptionReqBody {
    /// A request without any body.
    pub fn none() -> Self {
        Self { inner: None }
    }

    pub fn new<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<BoxError>,
    {
        Self { inner: Some(body.map_err(Into::into).boxed()) }
    }

    pub fn can_consume(&self) -> bool {
        self.inner.is_some()
    }

    pub fn take(&mut self) -> Option<RequestBody> {
        self.inner.take()
    }
}

impl From<Bytes> for OptionReqBody {
    fn from(bytes: Bytes) -> Self {
        Self::new(Full::new(bytes))
    }
}

impl From<String> for OptionReqBody {
    fn from(value: String) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<Vec<u8>> for OptionReqBody {
    fn from(value: Vec<u8>) -> Self {
        Self::from(Bytes::from(value))
    }
}

impl From<&'static str> for OptionReqBody {
    fn from(value: &'static str) -> Self {
        Self::from(Bytes::from_static(value.as_bytes()))
    }
}

impl fmt::Debug for OptionReqBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionReqBody").field("can_consume", &self.can_consume()).finish()
    }
}

/// Path parameters extracted from the URL path of an HTTP request.
///
/// Values are kept exactly as they appear in the path; percent-decoding happens per element
/// once the parameter style has been applied. Any router can supply them: `matchit` params
/// convert directly, other sources collect name/value pairs.
///
/// ```
/// use micro_params::request::PathParams;
///
/// let params: PathParams = [("owner", "42"), ("pet", "rex")].into_iter().collect();
/// assert_eq!(params.get("owner"), Some("42"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    inner: Vec<(String, String)>,
}

impl PathParams {
    /// Creates an empty set, for routes without path variables.
    #[inline]
    pub fn empty() -> Self {
        Self { inner: Vec::new() }
    }

    /// Appends a parameter. The first value of a repeated name is the one [`get`](Self::get) returns.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns true if there are no path parameters
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of path parameters
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Gets the raw value of a path parameter by its name
    #[inline]
    pub fn get(&self, name: impl AsRef<str>) -> Option<&str> {
        let name = name.as_ref();
        self.inner.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
    }

    /// Iterates over the parameters in the order they were matched
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { inner: iter.into_iter().map(|(name, value)| (name.into(), value.into())).collect() }
    }
}

impl From<Params<'_, '_>> for PathParams {
    fn from(params: Params<'_, '_>) -> Self {
        params.iter().collect()
    }
}

impl<K, V, S> From<HashMap<K, V, S>> for PathParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from(map: HashMap<K, V, S>) -> Self {
        map.into_iter().collect()
    }
}
