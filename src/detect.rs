//! Text detection using AWS Textract.
//!
//! The SDK gives us typed output, but downstream we want the response in its
//! wire shape: it's what we save for download, and what
//! [`crate::model::DetectionResponse`] validates. So we keep the body the
//! service sent, and add the `ResponseMetadata` section that other AWS
//! clients report. If the body isn't available, we rebuild it from the SDK
//! output.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

use aws_sdk_textract::{
    operation::{RequestId as _, detect_document_text::DetectDocumentTextOutput},
    types::{Block, Document, S3Object},
};
use aws_smithy_runtime_api::{
    box_error::BoxError,
    client::{
        interceptors::{
            Intercept,
            context::{
                AfterDeserializationInterceptorContextRef,
                BeforeDeserializationInterceptorContextRef,
                BeforeTransmitInterceptorContextRef,
            },
        },
        runtime_components::RuntimeComponents,
    },
};
use aws_smithy_types::config_bag::ConfigBag;
use serde_json::Map;

use crate::prelude::*;

/// Something which can detect text in a stored image.
#[async_trait]
pub trait TextDetector: Send + Sync + 'static {
    /// Detect text in the image stored at `key`, returning the raw response.
    async fn detect(&self, bucket: &str, key: &str) -> Result<Value>;
}

/// A [`TextDetector`] wrapping Textract's `DetectDocumentText` API.
pub struct TextractDetector {
    client: aws_sdk_textract::Client,
}

impl TextractDetector {
    /// Create a new Textract detector.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_textract::Client::new(config),
        }
    }
}

#[async_trait]
impl TextDetector for TextractDetector {
    #[instrument(level = "debug", skip(self))]
    async fn detect(&self, bucket: &str, key: &str) -> Result<Value> {
        let document = Document::builder()
            .s3_object(S3Object::builder().bucket(bucket).name(key).build())
            .build();
        let recorder = ExchangeRecorder::default();
        let output = self
            .client
            .detect_document_text()
            .document(document)
            .customize()
            .interceptor(recorder.clone())
            .send()
            .await
            .with_context(|| {
                format!("AWS Textract could not detect text in s3://{}/{}", bucket, key)
            })?;
        trace!("Document response: {output:#?}");
        let exchange = recorder.exchange();
        match &exchange.body {
            Some(body) => wire_response(body, output.request_id(), &exchange),
            None => {
                debug!("No response body recorded, rebuilding it from SDK output");
                Ok(raw_response(&output, &exchange))
            }
        }
    }
}

/// What we saw of the HTTP exchange behind a request.
#[derive(Clone, Debug, Default)]
pub struct HttpExchange {
    /// How many attempts the SDK made, including the first.
    pub attempts: u32,

    /// Status of the last response.
    pub status: Option<u16>,

    /// Headers of the last response, with lowercase names.
    pub headers: BTreeMap<String, String>,

    /// Body of the last response, once the SDK has read it.
    pub body: Option<Vec<u8>>,
}

/// An SDK interceptor which records an [`HttpExchange`].
#[derive(Clone, Debug, Default)]
struct ExchangeRecorder {
    exchange: Arc<Mutex<HttpExchange>>,
}

impl ExchangeRecorder {
    /// Get what we've recorded so far.
    fn exchange(&self) -> HttpExchange {
        match self.exchange.lock() {
            Ok(exchange) => exchange.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut HttpExchange)) -> Result<(), BoxError> {
        let mut exchange = self
            .exchange
            .lock()
            .map_err(|_| "HTTP exchange recorder lock poisoned")?;
        f(&mut exchange);
        Ok(())
    }
}

impl Intercept for ExchangeRecorder {
    fn name(&self) -> &'static str {
        "ExchangeRecorder"
    }

    fn read_before_attempt(
        &self,
        _context: &BeforeTransmitInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        self.update(|exchange| exchange.attempts += 1)
    }

    fn read_before_deserialization(
        &self,
        context: &BeforeDeserializationInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let response = context.response();
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.to_owned()))
            .collect();
        self.update(|exchange| {
            exchange.status = Some(status);
            exchange.headers = headers;
        })
    }

    fn read_after_deserialization(
        &self,
        context: &AfterDeserializationInterceptorContextRef<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> Result<(), BoxError> {
        let body = context.response().body().bytes().map(<[u8]>::to_vec);
        self.update(|exchange| exchange.body = body)
    }
}

/// Add `ResponseMetadata` to a response body as the service sent it.
pub fn wire_response(
    body: &[u8],
    request_id: Option<&str>,
    exchange: &HttpExchange,
) -> Result<Value> {
    let mut raw: Map<String, Value> = serde_json::from_slice(body)
        .context("Textract response body was not a JSON object")?;
    raw.insert(
        "ResponseMetadata".to_owned(),
        response_metadata(request_id, exchange),
    );
    Ok(Value::Object(raw))
}

/// Build the `ResponseMetadata` section from what we saw of the exchange.
fn response_metadata(request_id: Option<&str>, exchange: &HttpExchange) -> Value {
    let request_id =
        request_id.or_else(|| exchange.headers.get("x-amzn-requestid").map(String::as_str));
    let mut metadata = Map::new();
    insert_some(&mut metadata, "RequestId", request_id);
    insert_some(&mut metadata, "HTTPStatusCode", exchange.status);
    metadata.insert("HTTPHeaders".to_owned(), json!(exchange.headers));
    metadata.insert(
        "RetryAttempts".to_owned(),
        json!(exchange.attempts.saturating_sub(1)),
    );
    Value::Object(metadata)
}

/// Convert SDK output to Textract's wire format.
///
/// The SDK stores coordinates and confidences as `f32`, so we write each one
/// in its shortest decimal form (`0.1`, not `0.10000000149011612`).
///
/// Optional fields the SDK doesn't have are left out, so anything required
/// that's missing will be caught when the response is validated.
pub fn raw_response(output: &DetectDocumentTextOutput, exchange: &HttpExchange) -> Value {
    let mut raw = Map::new();
    if let Some(metadata) = output.document_metadata() {
        let mut document_metadata = Map::new();
        insert_some(&mut document_metadata, "Pages", metadata.pages());
        raw.insert("DocumentMetadata".to_owned(), Value::Object(document_metadata));
    }
    raw.insert(
        "Blocks".to_owned(),
        Value::Array(output.blocks().iter().map(raw_block).collect()),
    );
    insert_some(
        &mut raw,
        "DetectDocumentTextModelVersion",
        output.detect_document_text_model_version(),
    );

    raw.insert(
        "ResponseMetadata".to_owned(),
        response_metadata(output.request_id(), exchange),
    );

    Value::Object(raw)
}

/// Convert a single SDK block to wire format.
fn raw_block(block: &Block) -> Value {
    let mut raw = Map::new();
    insert_some(&mut raw, "BlockType", block.block_type().map(|t| t.as_str()));
    insert_some(&mut raw, "Confidence", block.confidence().map(shortest_f32));
    insert_some(&mut raw, "Text", block.text());
    insert_some(&mut raw, "TextType", block.text_type().map(|t| t.as_str()));
    if let Some(geometry) = block.geometry() {
        let mut raw_geometry = Map::new();
        if let Some(bbox) = geometry.bounding_box() {
            raw_geometry.insert(
                "BoundingBox".to_owned(),
                json!({
                    "Width": shortest_f32(bbox.width()),
                    "Height": shortest_f32(bbox.height()),
                    "Left": shortest_f32(bbox.left()),
                    "Top": shortest_f32(bbox.top()),
                }),
            );
        }
        let polygon = geometry
            .polygon()
            .iter()
            .map(|point| json!({ "X": shortest_f32(point.x()), "Y": shortest_f32(point.y()) }))
            .collect();
        raw_geometry.insert("Polygon".to_owned(), Value::Array(polygon));
        raw.insert("Geometry".to_owned(), Value::Object(raw_geometry));
    }
    insert_some(&mut raw, "Id", block.id());
    let relationships = block
        .relationships()
        .iter()
        .map(|relationship| {
            json!({
                "Type": relationship.r#type().map(|t| t.as_str()),
                "Ids": relationship.ids(),
            })
        })
        .collect::<Vec<_>>();
    if !relationships.is_empty() {
        raw.insert("Relationships".to_owned(), Value::Array(relationships));
    }
    Value::Object(raw)
}

/// Widen an `f32` by way of its shortest decimal representation.
fn shortest_f32(value: f32) -> Value {
    value
        .to_string()
        .parse::<f64>()
        .map_or(Value::Null, Value::from)
}

/// Insert `value` if it's present.
fn insert_some<T: Serialize>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_owned(), json!(value));
    }
}
