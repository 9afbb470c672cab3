use mockito::{Matcher, Server};
use scribe_studio::processing::ProcessingStatus;
use scribe_studio::{BatchProcessor, ConfigBuilder, TranscriptionPayload, TranscriptionPipeline};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_batch_against_mock_vendor() {
    let mut server = Server::new_async().await;

    let create = server
        .mock("POST", "/v2/transcript")
        .match_header("authorization", "test-key")
        .match_body(Matcher::PartialJson(json!({
            "audio_url": "https://cdn.example.com/lecture.mp3",
            "speaker_labels": true
        })))
        .with_status(200)
        .with_body(
            json!({
                "id": "tx-1",
                "status": "completed",
                "text": "Hello from the mock vendor",
                "words": [
                    { "text": "Hello", "start": 0, "end": 400, "speaker": "A" },
                    { "text": "from", "start": 400, "end": 600, "speaker": "A" },
                    { "text": "the", "start": 600, "end": 700, "speaker": "A" },
                    { "text": "mock", "start": 700, "end": 1000, "speaker": "A" },
                    { "text": "vendor", "start": 1000, "end": 1500, "speaker": "A" }
                ]
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    server
        .mock("GET", "/v2/transcript/tx-1/paragraphs")
        .with_status(200)
        .with_body(
            json!({
                "paragraphs": [
                    { "text": "Hello from the mock vendor", "start": 0, "end": 1500, "speaker": "A", "words": [] }
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let vtt = server
        .mock("GET", "/v2/transcript/tx-1/vtt")
        .match_query(Matcher::UrlEncoded("chars_per_caption".into(), "32".into()))
        .with_status(200)
        .with_body("WEBVTT\n\n00:00.000 --> 00:01.500\nHello from the mock vendor\n")
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new()
        .with_api_key("test-key")
        .with_base_url(server.url())
        .with_output_dir(temp_dir.path().to_path_buf())
        .with_default_options(json!({ "clientOptions": { "pollingInterval": 10 } }))
        .build();

    let pipeline = TranscriptionPipeline::from_config(&config).unwrap();
    let processor = BatchProcessor::new(Arc::new(pipeline), 2);

    let result = processor
        .process_inputs(
            &["https://cdn.example.com/lecture.mp3".to_string()],
            &json!({
                "options": { "speaker_labels": true },
                "clientOptions": { "subtitleFormats": ["vtt"] }
            }),
            &config.processing.output_dir,
        )
        .await
        .unwrap();

    create.assert_async().await;
    vtt.assert_async().await;

    assert_eq!(result.total, 1);
    assert_eq!(result.results[0].status, ProcessingStatus::Completed);
    assert_eq!(result.results[0].segment_count, 1);

    let written = std::fs::read_to_string(temp_dir.path().join("lecture.json")).unwrap();
    let payload: TranscriptionPayload = serde_json::from_str(&written).unwrap();
    assert_eq!(payload.id, "tx-1");
    assert_eq!(payload.segments[0].end, Some(1.5));
    assert_eq!(payload.client_options.polling_interval, 10);
    assert_eq!(payload.feature_selections.get("speaker_labels"), Some(&true));

    let subtitles = std::fs::read_to_string(temp_dir.path().join("lecture.vtt")).unwrap();
    assert!(subtitles.starts_with("WEBVTT"));
}

#[tokio::test]
async fn test_vendor_rejection_recorded_per_input() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/v2/transcript")
        .with_status(400)
        .with_body(json!({ "error": "Download error, unable to download https://cdn.example.com/missing.mp3" }).to_string())
        .create_async()
        .await;

    let temp_dir = TempDir::new().unwrap();
    let config = ConfigBuilder::new()
        .with_api_key("test-key")
        .with_base_url(server.url())
        .build();

    let pipeline = TranscriptionPipeline::from_config(&config).unwrap();
    let processor = BatchProcessor::new(Arc::new(pipeline), 1);

    let result = processor
        .process_inputs(
            &["https://cdn.example.com/missing.mp3".to_string()],
            &json!({}),
            temp_dir.path(),
        )
        .await
        .unwrap();

    assert_eq!(result.failed, 1);
    assert_eq!(
        result.results[0].error_message.as_deref(),
        Some("Download error, unable to download https://cdn.example.com/missing.mp3")
    );
    assert!(temp_dir.path().join("batch_results.json").exists());
}

#[test]
fn test_pipeline_requires_api_key() {
    let config = ConfigBuilder::new().build();
    assert!(TranscriptionPipeline::from_config(&config).is_err());
}
