//! The façade: resolve metadata, decode the request, materialize the record.

use crate::decode::{DEFAULT_MAX_BODY_SIZE, Decoder, DecoderConfig, DocumentParsers};
use crate::error::CodecError;
use crate::materialize::{Materializer, SerdeMaterializer};
use crate::request::{PathParams, RawRequest};
use crate::schema::{Metadata, Reflect, TagRegistry};
use std::sync::Arc;
use tracing::trace;

#[derive(Debug)]
pub struct CodecBuilder<M = SerdeMaterializer> {
    metadata: Option<Arc<Metadata>>,
    registry: Option<TagRegistry>,
    parsers: Option<DocumentParsers>,
    max_body_size: usize,
    materializer: M,
}

impl CodecBuilder {
    fn new() -> Self {
        Self {
            metadata: None,
            registry: None,
            parsers: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            materializer: SerdeMaterializer,
        }
    }
}

impl<M> CodecBuilder<M> {
    /// Shares an existing metadata cache, the registry set through [`registry`](Self::registry) is
    /// then ignored.
    pub fn metadata(mut self, metadata: Arc<Metadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Builds a fresh metadata cache over `registry`.
    pub fn registry(mut self, registry: TagRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn parsers(mut self, parsers: DocumentParsers) -> Self {
        self.parsers = Some(parsers);
        self
    }

    pub fn max_body_size(mut self, max_body_size: usize) -> Self {
        self.max_body_size = max_body_size;
        self
    }

    pub fn materializer<M2>(self, materializer: M2) -> CodecBuilder<M2> {
        CodecBuilder {
            metadata: self.metadata,
            registry: self.registry,
            parsers: self.parsers,
            max_body_size: self.max_body_size,
            materializer,
        }
    }

    pub fn build(self) -> Codec<M> {
        let metadata = match (self.metadata, self.registry) {
            (Some(metadata), _) => metadata,
            (None, Some(registry)) => Arc::new(Metadata::new(registry)),
            (None, None) => Arc::new(Metadata::default()),
        };

        let decoder = Decoder::new(metadata)
            .with_parsers(self.parsers.unwrap_or_default())
            .with_config(DecoderConfig { max_body_size: self.max_body_size });

        Codec { decoder, materializer: self.materializer }
    }
}

/// Decodes http requests into records described by [`Reflect`].
///
/// A codec is built once and shared; its metadata cache fills up as record types are first seen.
#[derive(Debug)]
pub struct Codec<M = SerdeMaterializer> {
    decoder: Decoder,
    materializer: M,
}

impl Codec {
    pub fn builder() -> CodecBuilder {
        CodecBuilder::new()
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<M> Codec<M> {
    pub fn metadata(&self) -> &Metadata {
        self.decoder.metadata()
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    pub fn materializer(&self) -> &M {
        &self.materializer
    }

    /// Decodes `req` into `target`.
    ///
    /// `params` are the path variables matched by the router. Errors carry the stage that failed.
    pub async fn decode<T, R>(&self, req: &mut R, params: &PathParams, target: &mut T) -> Result<(), CodecError>
    where
        T: Reflect,
        R: RawRequest + ?Sized,
        M: Materializer<T>,
    {
        let descriptor = self.metadata().get_or_build::<T>()?;
        let values = self.decoder.decode(req, params, &descriptor).await?;
        trace!(record = descriptor.type_name(), values = values.len(), "materialize record");
        self.materializer.populate(values, target)?;
        Ok(())
    }

    /// Like [`decode`](Self::decode), starting from `T::default()`.
    pub async fn extract<T, R>(&self, req: &mut R, params: &PathParams) -> Result<T, CodecError>
    where
        T: Reflect + Default,
        R: RawRequest + ?Sized,
        M: Materializer<T>,
    {
        let mut target = T::default();
        self.decode(req, params, &mut target).await?;
        Ok(target)
    }
}
