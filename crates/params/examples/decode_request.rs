use http::Request;
use matchit::Router;
use micro_params::Codec;
use micro_params::decode::{Payload, UploadFile};
use micro_params::error::PayloadError;
use micro_params::request::{OptionReqBody, PathParams};
use micro_params::schema::{FieldInfo, RecordType, Reflect, ScalarKind, ValueType};
use serde::Deserialize;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Filter {
    kind: Option<String>,
    min_age: Option<u32>,
}

impl Reflect for Filter {
    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::new("kind", 0, ValueType::Scalar(ScalarKind::String)).tag("parameter", "type"),
            FieldInfo::new("min_age", 1, ValueType::Scalar(ScalarKind::Integer)).tag("parameter", "minAge"),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListPets {
    owner: i64,
    tags: Vec<String>,
    filter: Filter,
    trace_id: Option<String>,
}

impl Reflect for ListPets {
    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::new("owner", 0, ValueType::Scalar(ScalarKind::Integer)).tag("parameter", "owner,location=path"),
            FieldInfo::new("tags", 1, ValueType::Array(ScalarKind::String)).tag("parameter", "tags,explode=false"),
            FieldInfo::new("filter", 2, ValueType::Record(RecordType::of::<Filter>()))
                .tag("parameter", "filter,style=deepObject"),
            FieldInfo::new("trace_id", 3, ValueType::Scalar(ScalarKind::String))
                .tag("parameter", "X-Trace-Id,location=header"),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoForm {
    caption: String,
    #[serde(skip)]
    photo: Option<UploadFile>,
}

impl Reflect for PhotoForm {
    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::new("caption", 0, ValueType::Scalar(ScalarKind::String)),
            FieldInfo::new("photo", 1, ValueType::File).tag("parameter", "photo,required"),
        ]
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UploadPhoto {
    owner: i64,
    form: PhotoForm,
}

impl Reflect for UploadPhoto {
    fn fields() -> Vec<FieldInfo> {
        vec![
            FieldInfo::new("owner", 0, ValueType::Scalar(ScalarKind::Integer)).tag("parameter", "owner,location=path"),
            FieldInfo::new("form", 1, ValueType::Record(RecordType::of::<PhotoForm>())).tag("body", "multipart,required"),
        ]
    }

    fn attach_payload(&mut self, path: &[&str], payload: Payload) -> Result<(), PayloadError> {
        match path {
            ["form", "photo"] => {
                self.form.photo = Some(payload.into_file().ok_or_else(|| PayloadError::mismatch(path, "file"))?);
                Ok(())
            }
            _ => Err(PayloadError::unexpected(path)),
        }
    }
}

const PHOTO_FORM: &str = "--demo\r\n\
    Content-Disposition: form-data; name=\"caption\"\r\n\r\n\
    sleeping\r\n\
    --demo\r\n\
    Content-Disposition: form-data; name=\"photo\"; filename=\"cat.png\"\r\n\
    Content-Type: image/png\r\n\r\n\
    not really a png\r\n\
    --demo--\r\n";

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::TRACE).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut router = Router::new();
    router.insert("/owners/{owner}/pets", "list").expect("valid route");
    router.insert("/owners/{owner}/photos", "upload").expect("valid route");

    let codec = Codec::default();

    let uri = "/owners/42/pets?tags=cat,dog&filter%5Btype%5D=cat&filter%5BminAge%5D=2";
    let mut req = Request::builder()
        .uri(uri)
        .header("X-Trace-Id", "demo-1")
        .body(OptionReqBody::none())
        .expect("valid request");
    let path = req.uri().path().to_owned();
    let matched = router.at(&path).expect("route matches");
    let params = PathParams::from(matched.params);
    match codec.extract::<ListPets, _>(&mut req, &params).await {
        Ok(pets) => info!(route = matched.value, ?pets, "decoded request"),
        Err(e) => error!(cause = %e, "decode failed"),
    }

    let mut req = Request::builder()
        .uri("/owners/42/photos")
        .header(http::header::CONTENT_TYPE, "multipart/form-data; boundary=demo")
        .body(OptionReqBody::from(PHOTO_FORM))
        .expect("valid request");
    let path = req.uri().path().to_owned();
    let matched = router.at(&path).expect("route matches");
    let params = PathParams::from(matched.params);
    match codec.extract::<UploadPhoto, _>(&mut req, &params).await {
        Ok(upload) => info!(
            route = matched.value,
            owner = upload.owner,
            caption = %upload.form.caption,
            photo = ?upload.form.photo.as_ref().and_then(UploadFile::file_name),
            "decoded request"
        ),
        Err(e) => error!(cause = %e, "decode failed"),
    }

    // a malformed owner and a malformed filter, both are reported at once
    let mut req =
        Request::builder().uri("/owners/x/pets?filter%5BminAge%5D=old").body(OptionReqBody::none()).expect("valid request");
    let path = req.uri().path().to_owned();
    let matched = router.at(&path).expect("route matches");
    let params = PathParams::from(matched.params);
    if let Err(e) = codec.extract::<ListPets, _>(&mut req, &params).await {
        error!(cause = %e, "decode failed");
    }

    info!(cached = codec.metadata().len(), builds = codec.metadata().build_count(), "metadata cache");
}
