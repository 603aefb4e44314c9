//! Request input extraction
//!
//! Prediction endpoints accept either a multipart form (an uploaded `file`
//! part or a text field) or a URL-encoded form carrying the text field.
//! Exactly one source must be supplied.

use authorscope_core::{Error, TextSample};
use axum::{
    extract::{FromRequest, Multipart, Request},
    http::{header, StatusCode},
    Form,
};
use std::collections::HashMap;
use tracing::debug;

use crate::error::AppError;

/// Name of the multipart part carrying an uploaded file
pub const FILE_FIELD: &str = "file";

/// Read the request body into a validated sample.
///
/// `field` names the text field (`code` or `text`) and appears in error
/// messages.
pub async fn extract_sample(request: Request, field: &'static str) -> Result<TextSample, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    let (file, text) = if content_type.starts_with("multipart/form-data") {
        read_multipart(request, field).await?
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(mut form) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|rejection| AppError::Rejected(rejection.status(), rejection.body_text()))?;
        (None, form.remove(field))
    } else {
        return Err(AppError::Rejected(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected multipart/form-data or application/x-www-form-urlencoded".to_string(),
        ));
    };

    resolve(file, text, field)
}

async fn read_multipart(
    request: Request,
    field: &'static str,
) -> Result<(Option<Vec<u8>>, Option<String>), AppError> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| AppError::Rejected(rejection.status(), rejection.body_text()))?;

    let mut file = None;
    let mut text = None;

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Rejected(e.status(), e.body_text()))?
    {
        let name = part.name().map(str::to_owned);
        let file_name = part.file_name().map(str::to_owned);

        match name.as_deref() {
            Some(FILE_FIELD) => {
                let bytes = part
                    .bytes()
                    .await
                    .map_err(|e| AppError::Rejected(e.status(), e.body_text()))?;
                // Browsers send an empty, unnamed part when no file was chosen
                if bytes.is_empty() && file_name.as_deref().unwrap_or("").is_empty() {
                    continue;
                }
                debug!(file_name = ?file_name, bytes = bytes.len(), "Received upload");
                file = Some(bytes.to_vec());
            }
            Some(name) if name == field => {
                let bytes = part
                    .bytes()
                    .await
                    .map_err(|e| AppError::Rejected(e.status(), e.body_text()))?;
                let value = String::from_utf8(bytes.to_vec())
                    .map_err(|_| AppError::invalid_input(format!("'{}' must be UTF-8", field)))?;
                text = Some(value);
            }
            other => debug!(field = ?other, "Ignoring unexpected form field"),
        }
    }

    Ok((file, text))
}

/// Apply the exactly-one-source and non-empty rules
pub fn resolve(
    file: Option<Vec<u8>>,
    text: Option<String>,
    field: &'static str,
) -> Result<TextSample, AppError> {
    let sample = match (file, text) {
        (Some(_), Some(_)) => {
            return Err(AppError::invalid_input(format!(
                "Provide either '{}' or '{}', not both",
                FILE_FIELD, field
            )))
        }
        (None, None) => {
            return Err(AppError::invalid_input(format!(
                "Either '{}' or '{}' parameter must be provided",
                FILE_FIELD, field
            )))
        }
        (Some(bytes), None) => TextSample::from_bytes(&bytes),
        (None, Some(text)) => TextSample::new(text),
    };

    sample.map_err(|err| match err {
        Error::EmptyInput => AppError::invalid_input(format!("Empty {} provided", field)),
        Error::InvalidInput(msg) => AppError::InvalidInput(msg),
        other => AppError::invalid_input(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exactly_one_source() {
        let both = resolve(Some(b"x".to_vec()), Some("y".into()), "code").unwrap_err();
        assert!(both.to_string().contains("not both"));

        let neither = resolve(None, None, "text").unwrap_err();
        assert_eq!(
            neither.to_string(),
            "Either 'file' or 'text' parameter must be provided"
        );
    }

    #[test]
    fn test_blank_input_names_field() {
        let err = resolve(None, Some("  \n ".into()), "code").unwrap_err();
        assert_eq!(err.to_string(), "Empty code provided");

        let err = resolve(Some(b"\t".to_vec()), None, "text").unwrap_err();
        assert_eq!(err.to_string(), "Empty text provided");
    }

    #[test]
    fn test_file_must_be_utf8() {
        let err = resolve(Some(vec![0xc3, 0x28]), None, "code").unwrap_err();
        assert_eq!(err.to_string(), "Uploaded file must be UTF-8 text");
    }

    #[test]
    fn test_file_contents_become_sample() {
        let sample = resolve(Some("print('hi')\n".as_bytes().to_vec()), None, "code").unwrap();
        assert_eq!(sample.as_str(), "print('hi')\n");
        assert_eq!(sample.char_len(), 12);
    }
}
