//! Wire and domain types shared by the server, the pipeline and the viewer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A document accepted by the [`DocumentStore`](crate::document_store::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedDocument {
    /// Generated, store-unique file name (e.g. `1718000000000.pdf`).
    pub stored_name: String,
    /// Name the file had on the client.
    pub original_name: String,
    /// Where the bytes live on disk.
    #[serde(skip)]
    pub storage_path: PathBuf,
    /// Relative URL under which the bytes are served.
    pub url: String,
}

/// `POST /api/upload` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub file_path: String,
}

impl UploadResponse {
    /// The stored name is the last path segment of `filePath`.
    pub fn stored_name(&self) -> &str {
        self.file_path
            .rsplit('/')
            .next()
            .unwrap_or(self.file_path.as_str())
    }
}

/// A validated question about a selected passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub text: String,
    pub prompt: String,
    pub filename: String,
    pub page_number: u32,
}

/// Page numbers arrive either as JSON numbers or as numeric strings.
/// Integral floats such as `3.0` are accepted; fractional ones are not.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageNumber {
    Number(i64),
    Float(f64),
    Text(String),
}

impl PageNumber {
    fn to_page(&self) -> Option<u32> {
        let raw = match self {
            PageNumber::Number(n) => *n,
            PageNumber::Float(f) => integral(*f)?,
            PageNumber::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(n) => n,
                    Err(_) => integral(s.parse::<f64>().ok()?)?,
                }
            }
        };
        u32::try_from(raw).ok().filter(|page| *page >= 1)
    }
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0 && value.abs() <= u32::MAX as f64)
        .then_some(value as i64)
}

/// Raw `POST /api/query` body. Every field is optional here so that a
/// missing one is reported as a validation error rather than a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryBody {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub page_number: Option<PageNumber>,
}

impl QueryBody {
    /// Returns `None` when any field is missing, blank, or not a page ≥ 1.
    pub fn validate(self) -> Option<QueryRequest> {
        let text = non_blank(self.text)?;
        let prompt = non_blank(self.prompt)?;
        let filename = non_blank(self.filename)?;
        let page_number = self.page_number.as_ref()?.to_page()?;

        Some(QueryRequest {
            text,
            prompt,
            filename,
            page_number,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `POST /api/query` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
}

/// Body of every non-success JSON response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry of a viewer session's transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> QueryBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_complete_body_validates() {
        let request = body(json!({
            "text": "revenue grew 12%",
            "prompt": "what does this mean?",
            "filename": "1718000000000.pdf",
            "pageNumber": 3
        }))
        .validate()
        .unwrap();

        assert_eq!(request.page_number, 3);
        assert_eq!(request.filename, "1718000000000.pdf");
    }

    #[test]
    fn test_page_number_accepts_numeric_string() {
        let request = body(json!({
            "text": "a", "prompt": "b", "filename": "c.pdf", "pageNumber": " 7 "
        }))
        .validate()
        .unwrap();
        assert_eq!(request.page_number, 7);
    }

    #[test]
    fn test_page_number_accepts_integral_float() {
        let page = |value: serde_json::Value| {
            body(json!({ "text": "a", "prompt": "b", "filename": "c.pdf", "pageNumber": value }))
                .validate()
                .map(|r| r.page_number)
        };
        assert_eq!(page(json!(3.0)), Some(3));
        assert_eq!(page(json!("4.0")), Some(4));
        assert_eq!(page(json!(2.5)), None);
        assert_eq!(page(json!(0.0)), None);
        assert_eq!(page(json!(-1.0)), None);
    }

    #[test]
    fn test_missing_or_blank_fields_rejected() {
        let full = json!({ "text": "a", "prompt": "b", "filename": "c.pdf", "pageNumber": 1 });
        for field in ["text", "prompt", "filename", "pageNumber"] {
            let mut missing = full.clone();
            missing.as_object_mut().unwrap().remove(field);
            assert!(body(missing).validate().is_none(), "missing {field}");
        }

        assert!(body(json!({ "text": "  ", "prompt": "b", "filename": "c.pdf", "pageNumber": 1 }))
            .validate()
            .is_none());
        assert!(body(json!({ "text": "a", "prompt": "b", "filename": "c.pdf", "pageNumber": 0 }))
            .validate()
            .is_none());
        assert!(body(json!({ "text": "a", "prompt": "b", "filename": "c.pdf", "pageNumber": "x" }))
            .validate()
            .is_none());
    }

    #[test]
    fn test_query_request_serializes_camel_case() {
        let request = QueryRequest {
            text: "t".into(),
            prompt: "p".into(),
            filename: "f.pdf".into(),
            page_number: 2,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "text": "t", "prompt": "p", "filename": "f.pdf", "pageNumber": 2 })
        );
    }

    #[test]
    fn test_upload_response_stored_name() {
        let response = UploadResponse {
            file_path: "/uploads/1718000000000.pdf".into(),
        };
        assert_eq!(response.stored_name(), "1718000000000.pdf");
    }
}
