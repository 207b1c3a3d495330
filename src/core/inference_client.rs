// Inference client: frame -> keypoint service -> pose classifier -> ClassificationResult
//
// No retries and no state between calls; the loop simply tries again next cycle.

use crate::core::config::Config;
use crate::models::capture::RawFrame;
use crate::models::pose::{
    BodyPart, ClassificationResult, ClassifyError, ClassifyResult, Detection, KeypointResponse,
};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageBuffer, RgbaImage};
use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::time::{Duration, Instant};
use tracing::debug;

/// Anything that can turn a frame into a pose classification
#[async_trait]
pub trait PoseInference: Send + Sync {
    async fn classify(&self, frame: &RawFrame) -> ClassifyResult<ClassificationResult>;
}

/// Client for the remote keypoint-extraction and pose-family classification services
pub struct HttpInferenceClient {
    client: Client,
    keypoint_url: String,
    classifier_url: String,
    jpeg_quality: u8,
}

impl HttpInferenceClient {
    pub fn new(
        keypoint_url: impl Into<String>,
        classifier_url: impl Into<String>,
        timeout: Duration,
        jpeg_quality: u8,
    ) -> ClassifyResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ClassifyError::ServiceUnavailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            keypoint_url: keypoint_url.into(),
            classifier_url: classifier_url.into(),
            jpeg_quality,
        })
    }

    pub fn from_config(config: &Config) -> ClassifyResult<Self> {
        Self::new(
            config.keypoint_service_url.clone(),
            config.classifier_service_url.clone(),
            Duration::from_millis(config.request_timeout_ms),
            config.jpeg_quality,
        )
    }

    /// Step 1: upload the frame, get every detected subject back
    async fn extract_keypoints(&self, jpeg: Vec<u8>) -> ClassifyResult<Vec<Detection>> {
        let file = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| ClassifyError::EncodeError(e.to_string()))?;
        let form = Form::new().part("file", file).text("type", "image/jpeg");

        let response = self
            .client
            .post(&self.keypoint_url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("keypoint service", e))?;

        let body = check_status(response, "keypoint service")?
            .bytes()
            .await
            .map_err(|e| transport_error("keypoint service", e))?;

        parse_keypoint_response(&body)
    }

    /// Step 2: classify the first subject's body parts
    async fn classify_keypoints(&self, body_parts: &[BodyPart]) -> ClassifyResult<(String, f32)> {
        let payload = serde_json::to_string(body_parts)
            .map_err(|e| ClassifyError::EncodeError(format!("Failed to serialize keypoints: {}", e)))?;
        let form = Form::new()
            .text("file", payload)
            .text("type", "application/json");

        let response = self
            .client
            .post(&self.classifier_url)
            .header(ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("classifier service", e))?;

        let text = check_status(response, "classifier service")?
            .text()
            .await
            .map_err(|e| transport_error("classifier service", e))?;

        parse_classification(&text)
    }
}

#[async_trait]
impl PoseInference for HttpInferenceClient {
    async fn classify(&self, frame: &RawFrame) -> ClassifyResult<ClassificationResult> {
        let start_time = Instant::now();

        let jpeg = encode_frame(frame, self.jpeg_quality)?;
        let predictions = self.extract_keypoints(jpeg).await?;

        // parse_keypoint_response guarantees at least one detection
        let first = predictions.first().ok_or(ClassifyError::NoDetection)?;
        let (predicted_pose, confidence) = self.classify_keypoints(&first.body_parts).await?;

        debug!(
            "Classified frame as {} ({:.1}%) with {} subject(s) in {} ms",
            predicted_pose,
            confidence,
            predictions.len(),
            start_time.elapsed().as_millis()
        );

        Ok(ClassificationResult {
            predictions,
            predicted_pose,
            confidence,
        })
    }
}

/// Encode a frame as JPEG, dropping alpha
pub fn encode_frame(frame: &RawFrame, quality: u8) -> ClassifyResult<Vec<u8>> {
    if frame.width == 0 || frame.height == 0 {
        return Err(ClassifyError::EncodeError(format!(
            "Frame has no pixels ({}x{})",
            frame.width, frame.height
        )));
    }
    if frame.data.len() != frame.expected_len() {
        return Err(ClassifyError::EncodeError(format!(
            "Frame data is {} bytes, expected {} for {}x{}",
            frame.data.len(),
            frame.expected_len(),
            frame.width,
            frame.height
        )));
    }

    let rgba: RgbaImage = ImageBuffer::from_raw(frame.width, frame.height, frame.to_rgba())
        .ok_or_else(|| ClassifyError::EncodeError("Failed to create image buffer".to_string()))?;
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(|e| ClassifyError::EncodeError(e.to_string()))?;

    Ok(bytes)
}

/// Parse the keypoint service JSON; zero detections is `NoDetection`
pub fn parse_keypoint_response(body: &[u8]) -> ClassifyResult<Vec<Detection>> {
    let response: KeypointResponse = serde_json::from_slice(body).map_err(|e| {
        ClassifyError::MalformedResponse(format!("Invalid keypoint response: {}", e))
    })?;

    if response.predictions.is_empty() {
        return Err(ClassifyError::NoDetection);
    }

    Ok(response.predictions)
}

/// Parse a `"<label>,<confidence>"` classifier reply
pub fn parse_classification(text: &str) -> ClassifyResult<(String, f32)> {
    let malformed = || ClassifyError::MalformedResponse(format!("Invalid classifier reply: {:?}", text));

    let (label, confidence) = text.trim().split_once(',').ok_or_else(malformed)?;
    let label = label.trim();
    if label.is_empty() {
        return Err(malformed());
    }

    let confidence: f32 = confidence.trim().parse().map_err(|_| malformed())?;
    if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
        return Err(malformed());
    }

    Ok((label.to_string(), confidence))
}

fn check_status(response: Response, service: &str) -> ClassifyResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ClassifyError::ServiceUnavailable(format!(
            "{} returned {}",
            service, status
        )))
    }
}

fn transport_error(service: &str, e: reqwest::Error) -> ClassifyError {
    if e.is_timeout() {
        ClassifyError::ServiceUnavailable(format!("{} timed out", service))
    } else {
        ClassifyError::ServiceUnavailable(format!("{} request failed: {}", service, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::capture::PixelFormat;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    type Requests = Arc<Mutex<Vec<String>>>;

    /// Serve one canned response per connection, in order, recording each raw request
    async fn spawn_stub(responses: Vec<(u16, &'static str)>) -> (String, Requests) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        let requests: Requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let request = read_request(&mut stream).await;
                recorded.lock().unwrap().push(request);

                let reply = format!(
                    "HTTP/1.1 {} STUB\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (url, requests)
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let headers = text[..header_end].to_ascii_lowercase();
                let content_length = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok());
                match content_length {
                    Some(len) if buf.len() >= header_end + 4 + len => break,
                    None if headers.contains("transfer-encoding: chunked") => {
                        if text.ends_with("0\r\n\r\n") {
                            break;
                        }
                    }
                    None => break,
                    _ => {}
                }
            }
        }

        String::from_utf8_lossy(&buf).to_string()
    }

    fn test_frame() -> RawFrame {
        RawFrame {
            timestamp: 0,
            width: 8,
            height: 6,
            data: vec![128; 8 * 6 * 4],
            format: PixelFormat::RGBA8,
        }
    }

    fn client(keypoint_url: &str, classifier_url: &str) -> HttpInferenceClient {
        HttpInferenceClient::new(keypoint_url, classifier_url, Duration::from_secs(5), 90).unwrap()
    }

    const TWO_SUBJECTS: &str = r#"{"status":"ok","predictions":[
        {"human_id":0,"body_parts":[{"part_id":0,"part_name":"Nose","score":"0.9","x":10,"y":20}],
         "pose_lines":[{"line":[10,20,30,40]}]},
        {"human_id":1,"body_parts":[{"part_id":1,"part_name":"Neck","score":"0.8","x":50,"y":60}],
         "pose_lines":[]}
    ]}"#;

    #[tokio::test]
    async fn test_classify_success() {
        let (keypoint_url, keypoint_requests) = spawn_stub(vec![(200, TWO_SUBJECTS)]).await;
        let (classifier_url, classifier_requests) = spawn_stub(vec![(200, "y,95.5\n")]).await;

        let result = client(&keypoint_url, &classifier_url)
            .classify(&test_frame())
            .await
            .unwrap();

        assert_eq!(result.predicted_pose, "y");
        assert_eq!(result.confidence, 95.5);
        assert_eq!(result.predictions.len(), 2);
        assert_eq!(result.keypoint_set().len(), 1);
        assert!(result.keypoint_set().contains_key("Nose"));

        let keypoint_request = keypoint_requests.lock().unwrap()[0].clone();
        assert!(keypoint_request.starts_with("POST"));
        assert!(keypoint_request.contains("image/jpeg"));

        let classifier_request = classifier_requests.lock().unwrap()[0].clone();
        assert!(classifier_request.contains(r#"[{"part_name":"Nose","part_id":0,"x":10.0,"y":20.0}]"#));
        assert!(!classifier_request.contains("Neck"));
    }

    #[tokio::test]
    async fn test_classify_no_detection_skips_classifier() {
        let (keypoint_url, _) = spawn_stub(vec![(200, r#"{"predictions":[]}"#)]).await;
        let (classifier_url, classifier_requests) = spawn_stub(vec![(200, "y,99")]).await;

        let err = client(&keypoint_url, &classifier_url)
            .classify(&test_frame())
            .await
            .unwrap_err();

        assert!(matches!(err, ClassifyError::NoDetection));
        assert!(classifier_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_classify_server_error_is_unavailable() {
        let (keypoint_url, _) = spawn_stub(vec![(500, "boom")]).await;
        let (classifier_url, _) = spawn_stub(vec![]).await;

        let err = client(&keypoint_url, &classifier_url)
            .classify(&test_frame())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_classify_malformed_keypoints() {
        let (keypoint_url, _) = spawn_stub(vec![(200, r#"{"status":"ok"}"#)]).await;
        let (classifier_url, _) = spawn_stub(vec![]).await;

        let err = client(&keypoint_url, &classifier_url)
            .classify(&test_frame())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_classify_malformed_classifier_reply() {
        let (keypoint_url, _) = spawn_stub(vec![(200, TWO_SUBJECTS)]).await;
        let (classifier_url, _) = spawn_stub(vec![(200, "Traceback (most recent call last)")]).await;

        let err = client(&keypoint_url, &classifier_url)
            .classify(&test_frame())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_classify_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&url, &url).classify(&test_frame()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_classify_times_out() {
        // Accepts the connection but never answers
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let _conn = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = HttpInferenceClient::new(&url, &url, Duration::from_millis(200), 90).unwrap();
        let start = Instant::now();
        let err = client.classify(&test_frame()).await.unwrap_err();

        assert!(matches!(err, ClassifyError::ServiceUnavailable(_)));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_classify_bad_frame_is_encode_error() {
        let mut frame = test_frame();
        frame.data.truncate(10);

        // Never reaches the network
        let err = client("http://127.0.0.1:1/", "http://127.0.0.1:1/")
            .classify(&frame)
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::EncodeError(_)));
    }

    #[test]
    fn test_encode_frame_produces_jpeg() {
        let mut frame = test_frame();
        frame.format = PixelFormat::BGRA8;
        let bytes = encode_frame(&frame, 80).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn test_encode_frame_rejects_empty() {
        let frame = RawFrame {
            timestamp: 0,
            width: 0,
            height: 0,
            data: vec![],
            format: PixelFormat::RGBA8,
        };
        assert!(matches!(encode_frame(&frame, 90), Err(ClassifyError::EncodeError(_))));
    }

    #[test]
    fn test_parse_keypoint_response() {
        assert_eq!(parse_keypoint_response(TWO_SUBJECTS.as_bytes()).unwrap().len(), 2);
        assert!(matches!(
            parse_keypoint_response(br#"{"predictions":[]}"#),
            Err(ClassifyError::NoDetection)
        ));
        assert!(matches!(
            parse_keypoint_response(b"<html>"),
            Err(ClassifyError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_classification() {
        assert_eq!(parse_classification("y,95").unwrap(), ("y".to_string(), 95.0));
        assert_eq!(
            parse_classification(" warrior , 91.25 \n").unwrap(),
            ("warrior".to_string(), 91.25)
        );
        assert_eq!(parse_classification("lunge,100").unwrap().1, 100.0);

        for bad in ["", "y", ",90", "y,abc", "y,150", "y,-1", "y,NaN", "y,90,1"] {
            assert!(
                matches!(parse_classification(bad), Err(ClassifyError::MalformedResponse(_))),
                "{:?} should be rejected",
                bad
            );
        }
    }
}
