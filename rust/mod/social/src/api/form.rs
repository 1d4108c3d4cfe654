//! Tweet bodies arrive as JSON or as `multipart/form-data` with an image.

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header;

use twtr_core::ServiceError;

use crate::model::{ImageUpload, TweetInput};

/// A decoded tweet create/update body.
#[derive(Debug, Default)]
pub struct TweetPayload {
    pub input: TweetInput,
    pub image: Option<ImageUpload>,
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn bad_body(e: impl std::fmt::Display) -> ServiceError {
    ServiceError::invalid("body", e.to_string())
}

impl<S> FromRequest<S> for TweetPayload
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Json(input) = Json::<TweetInput>::from_request(req, state)
                .await
                .map_err(|e| bad_body(e.body_text()))?;
            return Ok(Self { input, image: None });
        }

        let mut form = Multipart::from_request(req, state).await.map_err(bad_body)?;
        let mut payload = TweetPayload::default();
        while let Some(field) = form.next_field().await.map_err(bad_body)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_body)?;
                if !bytes.is_empty() {
                    payload.image = Some(ImageUpload {
                        content_type,
                        bytes: bytes.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await.map_err(bad_body)?;
            let slot = match name.as_str() {
                "type" => &mut payload.input.kind,
                "text" => &mut payload.input.text,
                "linkUrl" => &mut payload.input.link_url,
                "retweetId" => &mut payload.input.retweet_id,
                "replyId" => &mut payload.input.reply_id,
                _ => continue,
            };
            *slot = Some(value);
        }
        Ok(payload)
    }
}
