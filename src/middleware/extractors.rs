use axum::{
    extract::{FromRequest, FromRequestParts, Multipart, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::error::AppError;
use crate::models::{FormData, UploadedFile};

/// JSON body extractor that runs `validator` rules before the handler
///
/// Malformed bodies and failed rules both surface as [`AppError`] so every
/// rejection shares the `{"error": ...}` shape.
pub struct ValidatedJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;

        data.validate()?;

        Ok(ValidatedJson(data))
    }
}

/// JSON body extractor without validation rules
pub struct JsonBody<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;

        Ok(JsonBody(data))
    }
}

/// Query string extractor reporting failures as [`AppError`]
pub struct QueryParams<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(params) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;

        Ok(QueryParams(params))
    }
}

/// Path parameter extractor reporting failures as [`AppError`]
pub struct PathParam<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;

        Ok(PathParam(value))
    }
}

/// Buffers a multipart body into [`FormData`]
///
/// Parts carrying a file name are kept as files, everything else as text.
/// Empty file inputs (no name, no bytes) are dropped.
pub struct MultipartForm(pub FormData);

#[axum::async_trait]
impl<S> FromRequest<S> for MultipartForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?;

        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::InvalidInput(e.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let bytes = field
                        .bytes()
                        .await
                        .map_err(|e| AppError::InvalidInput(e.body_text()))?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.push_file(
                        name,
                        UploadedFile {
                            file_name,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let value = field
                        .text()
                        .await
                        .map_err(|e| AppError::InvalidInput(e.body_text()))?;
                    form.push_text(name, value);
                }
            }
        }

        Ok(MultipartForm(form))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    const BOUNDARY: &str = "rentals-boundary";

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 3))]
        name: String,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        let ValidatedJson(payload) =
            ValidatedJson::<Payload>::from_request(json_request(r#"{"name": "Loft"}"#), &())
                .await
                .unwrap();
        assert_eq!(payload.name, "Loft");
    }

    #[tokio::test]
    async fn test_rule_violation_is_validation_error() {
        let result =
            ValidatedJson::<Payload>::from_request(json_request(r#"{"name": "x"}"#), &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_malformed_body_is_invalid_input() {
        let result = ValidatedJson::<Payload>::from_request(json_request("{"), &()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_bad_query_is_invalid_input() {
        #[derive(Debug, Deserialize)]
        struct Params {
            #[allow(dead_code)]
            skip: i64,
        }

        let (mut parts, _) = Request::builder()
            .uri("/properties?skip=abc")
            .body(())
            .unwrap()
            .into_parts();
        let result = QueryParams::<Params>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    fn multipart_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body.replace("{b}", BOUNDARY)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_multipart_form_splits_text_and_files() {
        let body = "--{b}\r\n\
            Content-Disposition: form-data; name=\"title\"\r\n\r\n\
            Loft\r\n\
            --{b}\r\n\
            Content-Disposition: form-data; name=\"photos\"; filename=\"a.png\"\r\n\
            Content-Type: image/png\r\n\r\n\
            PNG\r\n\
            --{b}\r\n\
            Content-Disposition: form-data; name=\"photos\"; filename=\"\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n\
            \r\n\
            --{b}--\r\n";

        let MultipartForm(mut form) = MultipartForm::from_request(multipart_request(body), &())
            .await
            .unwrap();

        assert_eq!(form.text("title"), Some("Loft"));
        assert_eq!(
            form.take_files("photos"),
            vec![UploadedFile {
                file_name: "a.png".to_string(),
                bytes: b"PNG".to_vec(),
            }]
        );
    }

    #[tokio::test]
    async fn test_multipart_form_requires_multipart_content_type() {
        let result = MultipartForm::from_request(json_request(r#"{"title": "Loft"}"#), &()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    async fn error_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn rejection_router() -> Router {
        Router::new()
            .route("/items/:id", get(|PathParam(id): PathParam<i32>| async move { id.to_string() }))
            .route(
                "/upload",
                post(|MultipartForm(form): MultipartForm| async move {
                    form.text("title").unwrap_or_default().to_string()
                }),
            )
    }

    #[tokio::test]
    async fn test_bad_path_param_renders_json_error() {
        let response = rejection_router()
            .oneshot(Request::builder().uri("/items/abc").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_multipart_upload_renders_json_error() {
        let mut request = json_request(r#"{"title": "Loft"}"#);
        *request.uri_mut() = "/upload".parse().unwrap();

        let response = rejection_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = error_body(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }
}
