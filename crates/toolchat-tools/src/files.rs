//! Read a text file.

use std::collections::HashMap;
use std::io::ErrorKind;

use async_trait::async_trait;
use serde_json::{json, Value};

use toolchat_agent::tools::{require_string, Tool};

use crate::error::ToolError;

pub struct ReadTextFileTool;

#[async_trait]
impl Tool for ReadTextFileTool {
    fn name(&self) -> &str {
        "read_txt_file"
    }

    fn description(&self) -> &str {
        "Read and return the full content of a UTF-8 text file."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Absolute or relative path to the file"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, params: HashMap<String, Value>) -> anyhow::Result<String> {
        let path = require_string(&params, "file_path")
            .map_err(|e| ToolError::InvalidParams(e.to_string()))?;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ToolError::NotFound(path).into()),
            Err(source) => Err(ToolError::Io { path, source }.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(path: &str) -> HashMap<String, Value> {
        let mut p = HashMap::new();
        p.insert("file_path".into(), json!(path));
        p
    }

    #[tokio::test]
    async fn test_reads_exact_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        let content = "line one\n  line two\r\nünïcödé\n";
        std::fs::write(&file, content).unwrap();

        let read = ReadTextFileTool
            .execute(params(file.to_str().unwrap()))
            .await
            .unwrap();
        assert_eq!(read.as_bytes(), content.as_bytes());
    }

    #[tokio::test]
    async fn test_not_found() {
        let err = ReadTextFileTool
            .execute(params("/nonexistent"))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::NotFound(p)) if p == "/nonexistent"));
        assert_eq!(err.to_string(), "File not found: /nonexistent");
    }

    #[tokio::test]
    async fn test_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadTextFileTool
            .execute(params(dir.path().to_str().unwrap()))
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<ToolError>(), Some(ToolError::Io { .. })));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("blob.bin");
        std::fs::write(&file, [0xff, 0xfe, 0x00]).unwrap();
        let err = ReadTextFileTool
            .execute(params(file.to_str().unwrap()))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Error reading file"));
    }
}
