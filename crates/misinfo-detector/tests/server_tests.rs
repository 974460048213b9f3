use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use misinfo_classifier::Classifier;
use misinfo_core::{Error, PredictionResult, Result, Verdict};
use misinfo_detector::server::{build_app, PredictResponse};
use std::sync::Arc;
use tower::ServiceExt; // for `oneshot`

/// Flags any text mentioning "cure"
struct KeywordClassifier;

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, text: &str) -> Result<PredictionResult> {
        let flagged = text.contains("cure");
        Ok(PredictionResult {
            predicted_class: u32::from(flagged),
            confidence: 0.9,
            verdict: if flagged {
                Verdict::LikelyMisinformation
            } else {
                Verdict::SeemsGenuine
            },
        })
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

struct BrokenClassifier;

#[async_trait]
impl Classifier for BrokenClassifier {
    async fn classify(&self, _text: &str) -> Result<PredictionResult> {
        Err(Error::model("classifier produced non-finite probabilities"))
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn predict_request(body: &str) -> Request<Body> {
    Request::post("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = build_app(Arc::new(KeywordClassifier));

    let response = app
        .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["classifier"], "keyword");
}

#[tokio::test]
async fn test_predict_returns_two_line_output() {
    let app = build_app(Arc::new(KeywordClassifier));

    let response = app
        .oneshot(predict_request(r#"{"text": "miracle cure found"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let prediction: PredictResponse = serde_json::from_slice(&body).unwrap();

    assert_eq!(prediction.output, "⚠️ Likely Misinformation\nConfidence: 0.90");
    assert_eq!(prediction.predicted_class, 1);
    assert_eq!(prediction.verdict, Verdict::LikelyMisinformation);
}

#[tokio::test]
async fn test_predict_empty_text() {
    let app = build_app(Arc::new(KeywordClassifier));

    let response = app.oneshot(predict_request(r#"{"text": ""}"#)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["output"], "✅ Seems Genuine\nConfidence: 0.90");
}

#[tokio::test]
async fn test_failing_classifier_returns_error_status() {
    let app = build_app(Arc::new(BrokenClassifier));

    let response = app
        .oneshot(predict_request(r#"{"text": "anything"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("non-finite"));
    assert!(body.get("output").is_none());
}

#[tokio::test]
async fn test_malformed_request_rejected() {
    let app = build_app(Arc::new(KeywordClassifier));

    let response = app.oneshot(predict_request(r#"{"txt": 1}"#)).await.unwrap();

    assert!(response.status().is_client_error());
    let body = json_body(response).await;
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_index_page_served() {
    let app = build_app(Arc::new(KeywordClassifier));

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("/api/predict"));
    assert!(html.contains("<textarea"));
}

#[tokio::test]
async fn test_unknown_api_route_is_json_not_found() {
    let app = build_app(Arc::new(KeywordClassifier));

    let response = app
        .oneshot(Request::get("/api/predictions").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["error"].as_str().unwrap().contains("/api/predictions"));
}

#[tokio::test]
async fn test_other_paths_fall_back_to_page() {
    let app = build_app(Arc::new(KeywordClassifier));

    let response = app
        .oneshot(Request::get("/about").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/html"));
}
