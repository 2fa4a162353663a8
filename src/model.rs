//! Typed model of a Textract `DetectDocumentText` response.
//!
//! Field names follow Textract's wire format (PascalCase, plus a few
//! hyphenated HTTP header names), so a parsed response serializes back into
//! the same JSON it was parsed from. We only check structure here. Numeric
//! ranges (bounding boxes, confidences) are passed through as the service
//! reported them.

use std::collections::BTreeMap;

use schemars::JsonSchema;

use crate::prelude::*;

/// A raw response did not have the shape we expect.
#[derive(Debug, thiserror::Error)]
#[error("invalid Textract response: {source}")]
pub struct ValidationError {
    #[from]
    source: serde_json::Error,
}

/// A parsed `DetectDocumentText` response.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DetectionResponse {
    /// Information about the input document.
    pub document_metadata: DocumentMetadata,

    /// Detected blocks, in the order the service returned them.
    pub blocks: Vec<Block>,

    /// The version of the detection model.
    pub detect_document_text_model_version: String,

    /// Metadata about the HTTP exchange.
    pub response_metadata: ResponseMetadata,
}

impl DetectionResponse {
    /// Parse and validate a raw response.
    pub fn from_value(raw: Value) -> Result<Self, ValidationError> {
        Ok(serde_json::from_value(raw)?)
    }

    /// Parse and validate a raw response from a JSON string.
    pub fn from_json_str(raw: &str) -> Result<Self, ValidationError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// All `LINE` blocks, in service order.
    pub fn line_blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(|block| block.is_line())
    }

    /// The text of every `LINE` block, in service order. Lines without text
    /// are skipped.
    pub fn extract_lines(&self) -> Vec<String> {
        self.line_blocks()
            .filter_map(|block| block.text.clone())
            .collect()
    }
}

/// Information about the input document.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DocumentMetadata {
    /// Number of pages detected in the document.
    pub pages: u32,
}

/// A single detected element: a page, a line, a word, etc.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub block_type: BlockType,

    pub geometry: Geometry,

    /// Unique within a response.
    pub id: String,

    /// Links to other blocks, such as the `WORD` children of a `LINE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<Relationship>>,

    /// Confidence in the detection, normally between 0 and 100.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    /// Recognized text. Only present on text-bearing blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// `PRINTED` or `HANDWRITING`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_type: Option<String>,
}

impl Block {
    /// Is this a `LINE` block?
    pub fn is_line(&self) -> bool {
        self.block_type == BlockType::Line
    }
}

/// Textract block types.
///
/// New block types get added to Textract from time to time. We keep any we
/// don't recognize in [`BlockType::Other`] instead of failing.
#[derive(Clone, Debug, Deserialize, Eq, Hash, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Page,
    Line,
    Word,
    KeyValueSet,
    Table,
    Cell,
    MergedCell,
    SelectionElement,
    Title,
    Query,
    QueryResult,
    Signature,
    TableTitle,
    TableFooter,
    LayoutText,
    LayoutTitle,
    LayoutHeader,
    LayoutFooter,
    LayoutSectionHeader,
    LayoutPageNumber,
    LayoutList,
    LayoutFigure,
    LayoutTable,
    LayoutKeyValue,
    #[serde(untagged)]
    Other(String),
}

/// A link from one block to others.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    /// `CHILD`, `VALUE`, etc.
    pub r#type: String,
    pub ids: Vec<String>,
}

/// Where a block is on the page.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Geometry {
    pub bounding_box: BoundingBox,
    pub polygon: Vec<Point>,
}

/// An axis-aligned box, as fractions of the image size, with the origin at
/// the top left.
///
/// Values are not clamped. Skewed or rotated detections may extend outside
/// `[0, 1]`.
#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct BoundingBox {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

/// A point on a [`Geometry::polygon`], as fractions of the image size.
#[derive(Clone, Copy, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct Point {
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

/// Metadata about the HTTP exchange that produced a response.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseMetadata {
    pub request_id: String,

    #[serde(rename = "HTTPStatusCode")]
    pub http_status_code: u16,

    #[serde(rename = "HTTPHeaders")]
    pub http_headers: HttpHeaders,

    pub retry_attempts: u32,
}

/// HTTP response headers.
///
/// Header names aren't valid Rust identifiers, so the ones Textract always
/// sends get renamed fields. Anything else lands in `other`.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct HttpHeaders {
    #[serde(rename = "x-amzn-requestid")]
    pub x_amzn_requestid: String,

    #[serde(rename = "content-type")]
    pub content_type: String,

    #[serde(rename = "content-length")]
    pub content_length: String,

    pub date: String,

    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}
