//! CLI test cases.
//!
//! Everything here runs offline. `scan` needs real AWS credentials and a
//! bucket, so we only check its argument handling.

use std::{fs, path::Path, process::Command};

use assert_cmd::prelude::*;
use image::{GenericImageView as _, ImageFormat, Rgb, RgbImage};
use predicates::prelude::*;
use serde_json::{Value, json};

/// Create a new `Command` with our binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("doc-scanner").unwrap();
    for var in [
        "DOC_SCANNER_BUCKET",
        "DOC_SCANNER_FOLDER",
        "DOC_SCANNER_TYPE",
        "DOC_SCANNER_CACHE_DIR",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// A raw Textract response with one line and one word.
fn response() -> Value {
    let geometry = |left: f64, top: f64, width: f64, height: f64| {
        json!({
            "BoundingBox": { "Width": width, "Height": height, "Left": left, "Top": top },
            "Polygon": [
                { "X": left, "Y": top },
                { "X": left + width, "Y": top + height }
            ]
        })
    };
    json!({
        "DocumentMetadata": { "Pages": 1 },
        "Blocks": [
            {
                "BlockType": "LINE",
                "Confidence": 99.5,
                "Text": "Hello, world",
                "Geometry": geometry(0.1, 0.2, 0.3, 0.4),
                "Id": "line-1",
                "Relationships": [{ "Type": "CHILD", "Ids": ["word-1"] }]
            },
            {
                "BlockType": "WORD",
                "Confidence": 99.5,
                "Text": "Hello,",
                "TextType": "PRINTED",
                "Geometry": geometry(0.1, 0.2, 0.15, 0.4),
                "Id": "word-1"
            }
        ],
        "DetectDocumentTextModelVersion": "1.0",
        "ResponseMetadata": {
            "RequestId": "req-1",
            "HTTPStatusCode": 200,
            "HTTPHeaders": {
                "x-amzn-requestid": "req-1",
                "content-type": "application/x-amz-json-1.1",
                "content-length": "900",
                "date": "Mon, 19 Oct 2026 12:00:00 GMT"
            },
            "RetryAttempts": 0
        }
    })
}

/// Write a white PNG and a response to `dir`.
fn write_inputs(dir: &Path, response: &Value) {
    RgbImage::from_pixel(200, 100, Rgb([255, 255, 255]))
        .save_with_format(dir.join("scan.png"), ImageFormat::Png)
        .unwrap();
    fs::write(
        dir.join("response.json"),
        serde_json::to_string(response).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_help() {
    cmd().arg("--help").assert().success();
}

#[test]
fn test_version() {
    cmd().arg("--version").assert().success();
}

#[test]
fn test_schema() {
    let output = cmd().arg("schema").output().unwrap();
    assert!(output.status.success());
    let schema: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(schema["title"], json!("DetectionResponse"));
    assert!(schema["required"]
        .as_array()
        .unwrap()
        .contains(&json!("Blocks")));
}

#[test]
fn test_render_writes_artifacts() {
    let tmpdir = tempfile::TempDir::with_prefix("render").unwrap();
    let dir = tmpdir.path();
    write_inputs(dir, &response());
    let out_dir = dir.join("out");

    cmd()
        .arg("render")
        .arg(dir.join("scan.png"))
        .arg(dir.join("response.json"))
        .arg("--out-dir")
        .arg(&out_dir)
        .assert()
        .success();

    let text = fs::read_to_string(out_dir.join("scan_text.txt")).unwrap();
    assert_eq!(text, "Hello, world");
    let lines: Vec<String> =
        serde_json::from_str(&fs::read_to_string(out_dir.join("scan_lines.json")).unwrap())
            .unwrap();
    assert_eq!(lines, vec!["Hello, world"]);
    let saved: Value = serde_json::from_str(
        &fs::read_to_string(out_dir.join("scan_response.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved, response());

    let annotated = image::open(out_dir.join("scan_annotated.png")).unwrap();
    assert_eq!(annotated.dimensions(), (200, 100));
    assert_eq!(annotated.get_pixel(20, 20).0, [255, 0, 0, 255]);
    assert_eq!(annotated.get_pixel(50, 40).0, [255, 255, 255, 255]);
}

#[test]
fn test_render_rejects_invalid_response() {
    let tmpdir = tempfile::TempDir::with_prefix("render").unwrap();
    let dir = tmpdir.path();
    let mut invalid = response();
    invalid["DocumentMetadata"] = json!({});
    write_inputs(dir, &invalid);

    cmd()
        .arg("render")
        .arg(dir.join("scan.png"))
        .arg(dir.join("response.json"))
        .arg("--out-dir")
        .arg(dir.join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Pages"));
    assert!(!dir.join("out").exists());
}

#[test]
fn test_render_rejects_unsupported_images() {
    let tmpdir = tempfile::TempDir::with_prefix("render").unwrap();
    let dir = tmpdir.path();
    write_inputs(dir, &response());
    fs::write(dir.join("scan.pdf"), b"%PDF-1.7\n").unwrap();

    cmd()
        .arg("render")
        .arg(dir.join("scan.pdf"))
        .arg(dir.join("response.json"))
        .arg("--out-dir")
        .arg(dir.join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported MIME type"));
}

#[test]
fn test_scan_requires_bucket() {
    let tmpdir = tempfile::TempDir::with_prefix("scan").unwrap();
    write_inputs(tmpdir.path(), &response());
    cmd()
        .current_dir(tmpdir.path())
        .arg("scan")
        .arg("scan.png")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--bucket"));
}

#[test]
fn test_scan_rejects_bad_folder() {
    let tmpdir = tempfile::TempDir::with_prefix("scan").unwrap();
    write_inputs(tmpdir.path(), &response());
    cmd()
        .current_dir(tmpdir.path())
        .args(["scan", "scan.png", "--bucket", "b", "--folder", "a/b"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not contain '/'"));
}
