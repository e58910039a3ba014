//! Turning [`DecodedValues`] into the caller's typed record.

use crate::decode::{DecodedValue, DecodedValues, Payload};
use crate::error::MaterializeError;
use crate::schema::Reflect;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Populates a `T` from decoded values.
///
/// Any `Fn(DecodedValues, &mut T) -> Result<(), MaterializeError>` is a materializer too.
pub trait Materializer<T>: Send + Sync {
    fn populate(&self, values: DecodedValues, target: &mut T) -> Result<(), MaterializeError>;
}

impl<T, F> Materializer<T> for F
where
    F: Fn(DecodedValues, &mut T) -> Result<(), MaterializeError> + Send + Sync,
{
    fn populate(&self, values: DecodedValues, target: &mut T) -> Result<(), MaterializeError> {
        (self)(values, target)
    }
}

/// The default materializer, backed by `serde`.
///
/// Json values are assembled into one object and deserialized into `T`, replacing `target`.
/// Keys left out by the decoder fall back to serde defaults, so records usually carry
/// `#[serde(default)]`. Payloads are attached afterwards through [`Reflect::attach_payload`];
/// the fields receiving them should be `#[serde(skip)]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerdeMaterializer;

impl<T> Materializer<T> for SerdeMaterializer
where
    T: DeserializeOwned + Reflect,
{
    fn populate(&self, values: DecodedValues, target: &mut T) -> Result<(), MaterializeError> {
        let mut payloads = Vec::new();
        let object = split(values, &[], &mut payloads);

        *target = serde_json::from_value(Value::Object(object))?;

        for (path, payload) in payloads {
            let path: Vec<&str> = path.iter().map(String::as_str).collect();
            target.attach_payload(&path, payload)?;
        }
        Ok(())
    }
}

/// Separates json values from payloads, remembering the key path of every payload.
fn split(values: DecodedValues, prefix: &[String], payloads: &mut Vec<(Vec<String>, Payload)>) -> Map<String, Value> {
    let mut object = Map::with_capacity(values.len());
    for (key, value) in values {
        match value {
            DecodedValue::Value(value) => {
                object.insert(key, value);
            }
            DecodedValue::Payload(payload) => payloads.push((child_path(prefix, &key), payload)),
            DecodedValue::Record(nested) => {
                let nested = split(nested, &child_path(prefix, &key), payloads);
                object.insert(key, Value::Object(nested));
            }
        }
    }
    object
}

fn child_path(prefix: &[String], key: &str) -> Vec<String> {
    let mut path = Vec::with_capacity(prefix.len() + 1);
    path.extend_from_slice(prefix);
    path.push(key.to_owned());
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::UploadFile;
    use crate::error::PayloadError;
    use crate::schema::{FieldInfo, ScalarKind, ValueType};
    use bytes::Bytes;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct ListPets {
        limit: u32,
        tags: Vec<String>,
    }

    impl Reflect for ListPets {
        fn fields() -> Vec<FieldInfo> {
            vec![
                FieldInfo::new("limit", 0, ValueType::Scalar(ScalarKind::Integer)),
                FieldInfo::new("tags", 1, ValueType::Array(ScalarKind::String)),
            ]
        }
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Gallery {
        title: String,
        #[serde(skip)]
        photos: Vec<UploadFile>,
    }

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct CreateGallery {
        owner: String,
        gallery: Gallery,
        #[serde(skip)]
        raw: Option<Bytes>,
    }

    impl Reflect for CreateGallery {
        fn fields() -> Vec<FieldInfo> {
            Vec::new()
        }

        fn attach_payload(&mut self, path: &[&str], payload: Payload) -> Result<(), PayloadError> {
            match path {
                ["gallery", "photos"] => {
                    self.gallery.photos = payload.into_files().ok_or_else(|| PayloadError::mismatch(path, "files"))?;
                }
                ["raw"] => self.raw = Some(payload.into_bytes().ok_or_else(|| PayloadError::mismatch(path, "bytes"))?),
                _ => return Err(PayloadError::unexpected(path)),
            }
            Ok(())
        }
    }

    fn values(entries: Vec<(&str, DecodedValue)>) -> DecodedValues {
        let mut values = DecodedValues::new();
        for (key, value) in entries {
            values.insert(key, value);
        }
        values
    }

    #[test]
    fn absent_keys_keep_defaults() {
        let mut target = ListPets { limit: 99, tags: vec!["stale".into()] };
        let decoded = values(vec![("tags", DecodedValue::Value(json!(["a", "b"])))]);

        SerdeMaterializer.populate(decoded, &mut target).unwrap();
        assert_eq!(target, ListPets { limit: 0, tags: vec!["a".into(), "b".into()] });
    }

    #[test]
    fn type_mismatch_is_a_deserialize_error() {
        let mut target = ListPets::default();
        let decoded = values(vec![("limit", DecodedValue::Value(json!("ten")))]);

        let err = SerdeMaterializer.populate(decoded, &mut target).unwrap_err();
        assert!(matches!(err, MaterializeError::Deserialize { .. }));
    }

    #[test]
    fn payloads_are_attached_by_path() {
        let photo = UploadFile::new("photos", Some("a.png".into()), Some(mime::IMAGE_PNG), Bytes::from_static(b"png"));
        let gallery = values(vec![
            ("title", DecodedValue::Value(json!("holiday"))),
            ("photos", DecodedValue::Payload(Payload::Files(vec![photo]))),
        ]);
        let decoded = values(vec![
            ("owner", DecodedValue::Value(json!("ann"))),
            ("gallery", DecodedValue::Record(gallery)),
            ("raw", DecodedValue::Payload(Payload::Bytes(Bytes::from_static(b"raw")))),
        ]);

        let mut target = CreateGallery::default();
        SerdeMaterializer.populate(decoded, &mut target).unwrap();

        assert_eq!(target.owner, "ann");
        assert_eq!(target.gallery.title, "holiday");
        assert_eq!(target.gallery.photos.len(), 1);
        assert_eq!(target.gallery.photos[0].file_name(), Some("a.png"));
        assert_eq!(target.raw.as_deref(), Some(&b"raw"[..]));
    }

    #[test]
    fn payload_errors_pass_through() {
        let decoded = values(vec![("raw", DecodedValue::Payload(Payload::Files(Vec::new())))]);
        let err = SerdeMaterializer.populate(decoded, &mut CreateGallery::default()).unwrap_err();
        assert!(matches!(err, MaterializeError::Payload(PayloadError::Mismatch { ref path, expected: "bytes" }) if path == "raw"));

        // the default attach_payload accepts nothing
        let decoded = values(vec![("body", DecodedValue::Payload(Payload::Bytes(Bytes::new())))]);
        let err = SerdeMaterializer.populate(decoded, &mut ListPets::default()).unwrap_err();
        assert_eq!(err.to_string(), "no field accepts a payload at 'body'");
    }

    #[test]
    fn closures_are_materializers() {
        let count_keys = |values: DecodedValues, target: &mut usize| -> Result<(), MaterializeError> {
            *target = values.len();
            Ok(())
        };

        let mut target = 0;
        count_keys.populate(values(vec![("a", DecodedValue::Value(json!(1)))]), &mut target).unwrap();
        assert_eq!(target, 1);
    }
}
