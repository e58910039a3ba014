use super::coerce;
use super::{DecodedValue, DecodedValues, Decoder, DocumentFormat, Payload, UploadFile};
use crate::error::BodyError;
use crate::request::{RawRequest, RequestBody};
use crate::schema::{BodyAnnotation, BodyKind, FieldDescriptor, PayloadMode, ValueType};
use crate::style::ParamValue;
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use multer::{Constraints, SizeLimit};
use std::collections::HashMap;
use tracing::{debug, trace};

/// Decodes the body for `field`, `Ok(None)` when the request has no (or an empty) body.
pub(super) async fn decode_body<R: RawRequest + ?Sized>(
    decoder: &Decoder,
    req: &mut R,
    field: &FieldDescriptor,
    annotation: &BodyAnnotation,
) -> Result<Option<DecodedValue>, BodyError> {
    match annotation.kind {
        BodyKind::Structured => structured(decoder, req).await,
        BodyKind::File(mode) => file(decoder, req, mode).await,
        BodyKind::Multipart => multipart(decoder, req, field).await,
    }
}

async fn read_all(body: RequestBody, limit: usize) -> Result<Bytes, BodyError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(source) => Err(BodyError::read(source, limit)),
    }
}

async fn structured<R: RawRequest + ?Sized>(decoder: &Decoder, req: &mut R) -> Result<Option<DecodedValue>, BodyError> {
    let content_type = req.content_type();
    let Some(body) = req.take_body() else {
        return Ok(None);
    };

    let bytes = read_all(body, decoder.config().max_body_size).await?;
    if bytes.is_empty() {
        return Ok(None);
    }

    let format = DocumentFormat::detect(content_type.as_ref());
    let value = decoder.parsers().parse(format, &bytes).map_err(|source| BodyError::document(format, source))?;
    Ok(Some(DecodedValue::Value(value)))
}

async fn file<R: RawRequest + ?Sized>(
    decoder: &Decoder,
    req: &mut R,
    mode: PayloadMode,
) -> Result<Option<DecodedValue>, BodyError> {
    let Some(body) = req.take_body() else {
        return Ok(None);
    };

    match mode {
        PayloadMode::Streaming => Ok(Some(DecodedValue::Payload(Payload::Stream(body)))),
        PayloadMode::Buffered => {
            let bytes = read_all(body, decoder.config().max_body_size).await?;
            Ok((!bytes.is_empty()).then_some(DecodedValue::Payload(Payload::Bytes(bytes))))
        }
    }
}

async fn multipart<R: RawRequest + ?Sized>(
    decoder: &Decoder,
    req: &mut R,
    field: &FieldDescriptor,
) -> Result<Option<DecodedValue>, BodyError> {
    let ValueType::Record(record) = field.value_type() else {
        return Err(BodyError::InvalidDestination { kind: BodyKind::Multipart, value_type: field.value_type().kind_name() });
    };
    if !req.has_body() {
        return Ok(None);
    }

    let is_form_data = req.content_type().is_some_and(|mime| mime.type_() == mime::MULTIPART && mime.subtype() == mime::FORM_DATA);
    if !is_form_data {
        let content_type = req.content_type().map(|mime| mime.to_string()).unwrap_or_default();
        return Err(BodyError::unsupported_content_type(content_type, "multipart/form-data"));
    }

    let descriptor = decoder.metadata().get_or_build_record(record)?;
    let wanted: HashMap<&str, &FieldDescriptor> =
        descriptor.fields().iter().map(|nested| (nested.wire_name(), nested)).collect();

    let limit = decoder.config().max_body_size;
    let constraints = Constraints::new().size_limit(SizeLimit::new().whole_stream(u64::try_from(limit).unwrap_or(u64::MAX)));
    let mut parts = req.multipart(constraints)?;

    let mut texts: HashMap<String, Vec<String>> = HashMap::new();
    let mut files: HashMap<String, Vec<UploadFile>> = HashMap::new();
    while let Some(part) = parts.next_field().await? {
        let Some(name) = part.name().map(str::to_owned) else {
            continue;
        };
        let Some(target) = wanted.get(name.as_str()) else {
            trace!(part = %name, "skip undeclared multipart part");
            continue;
        };

        if matches!(target.value_type(), ValueType::File | ValueType::Files) {
            let file_name = part.file_name().map(str::to_owned);
            let content_type = part.content_type().cloned();
            let data = part.bytes().await?;
            files.entry(name.clone()).or_default().push(UploadFile::new(name, file_name, content_type, data));
        } else {
            texts.entry(name).or_default().push(part.text().await?);
        }
    }

    let mut values = DecodedValues::new();
    for nested in descriptor.fields() {
        let part = nested.wire_name();
        let value = match nested.value_type() {
            ValueType::File => {
                files.remove(part).and_then(|uploads| uploads.into_iter().next()).map(|upload| DecodedValue::Payload(Payload::File(upload)))
            }
            ValueType::Files => files.remove(part).map(|uploads| DecodedValue::Payload(Payload::Files(uploads))),
            value_type => match texts.remove(part) {
                Some(items) => {
                    let raw = if matches!(value_type, ValueType::Array(_)) {
                        ParamValue::Array(items)
                    } else {
                        ParamValue::Scalar(items.into_iter().next().unwrap_or_default())
                    };
                    let value = coerce::coerce(decoder.metadata(), raw, value_type)
                        .map_err(|source| BodyError::invalid_part(part, source))?;
                    Some(DecodedValue::Value(value))
                }
                None => None,
            },
        };

        match value {
            Some(value) => {
                values.insert(nested.dest(), value);
            }
            None if nested.parameter().is_some_and(|parameter| parameter.required) => {
                return Err(BodyError::missing_part(part));
            }
            None => {}
        }
    }

    debug!(record = descriptor.type_name(), parts = values.len(), "decoded multipart body");
    Ok(Some(DecodedValue::Record(values)))
}
