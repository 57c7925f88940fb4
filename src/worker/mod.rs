mod gateway;
mod protocol;
mod runner;

pub use gateway::InferenceGateway;
pub use protocol::{ImageKey, RequestId, WorkerEvent, WorkerRequest};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to start inference worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("inference worker is not running")]
    Disconnected,
    #[error("mask requested without prompt points")]
    EmptyPrompt,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::ModelSpec;
    use crate::session::Point;
    use crate::testing::{FakeFactory, ModelCall};
    use image::RgbImage;
    use std::sync::Arc;

    fn spec(id: &str) -> ModelSpec {
        ModelSpec {
            id: id.to_string(),
            encoder: format!("{id}.encoder.onnx").into(),
            decoder: format!("{id}.decoder.onnx").into(),
        }
    }

    fn key(url: &str, load: u64) -> ImageKey {
        ImageKey {
            url: url.to_string(),
            load,
        }
    }

    fn wait_terminal(gateway: &InferenceGateway, id: RequestId) -> (Vec<String>, WorkerEvent) {
        let mut statuses = Vec::new();
        loop {
            let event = gateway.next_event().unwrap();
            assert_eq!(event.id(), id);
            match event {
                WorkerEvent::Status { message, .. } => statuses.push(message),
                terminal => return (statuses, terminal),
            }
        }
    }

    #[test]
    fn embedding_then_mask_reuses_embedding() {
        let factory = FakeFactory::new();
        let calls = factory.calls();
        let mut gateway = InferenceGateway::spawn(Box::new(factory)).unwrap();
        let image = Arc::new(RgbImage::new(10, 10));

        let id = gateway
            .request_embedding(spec("sam_mobile_tiny"), &key("a.png", 1), image.clone())
            .unwrap();
        let (statuses, event) = wait_terminal(&gateway, id);
        assert!(matches!(event, WorkerEvent::CompleteEmbedding { .. }));
        assert_eq!(statuses.first().map(String::as_str), Some("Loading model"));

        let id = gateway
            .request_mask(
                spec("sam_mobile_tiny"),
                &key("a.png", 1),
                image,
                vec![Point::foreground(0.5, 0.5)],
            )
            .unwrap();
        let (_, event) = wait_terminal(&gateway, id);
        match event {
            WorkerEvent::Complete { mask, .. } => assert_eq!(mask.dimensions(), (10, 10)),
            other => panic!("expected mask, got {other:?}"),
        }

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ModelCall::Create("sam_mobile_tiny".into()),
                ModelCall::Embed(10, 10),
                ModelCall::Segment(vec![Point::foreground(0.5, 0.5)]),
            ]
        );
    }

    #[test]
    fn mask_for_new_image_embeds_first() {
        let factory = FakeFactory::new();
        let calls = factory.calls();
        let mut gateway = InferenceGateway::spawn(Box::new(factory)).unwrap();

        let id = gateway
            .request_mask(
                spec("sam_base"),
                &key("b.png", 1),
                Arc::new(RgbImage::new(4, 6)),
                vec![Point::background(0.1, 0.1)],
            )
            .unwrap();
        let (statuses, event) = wait_terminal(&gateway, id);

        assert!(matches!(event, WorkerEvent::Complete { .. }));
        assert!(statuses.iter().any(|s| s == "Embedding image"));
        assert!(calls.lock().unwrap().contains(&ModelCall::Embed(4, 6)));
    }

    #[test]
    fn reloading_the_same_url_embeds_again() {
        let factory = FakeFactory::new();
        let calls = factory.calls();
        let mut gateway = InferenceGateway::spawn(Box::new(factory)).unwrap();

        let id = gateway
            .request_embedding(
                spec("sam_base"),
                &key("photo.png", 1),
                Arc::new(RgbImage::new(100, 100)),
            )
            .unwrap();
        wait_terminal(&gateway, id);
        let id = gateway
            .request_mask(
                spec("sam_base"),
                &key("photo.png", 2),
                Arc::new(RgbImage::new(40, 80)),
                vec![Point::foreground(0.5, 0.5)],
            )
            .unwrap();
        let (_, event) = wait_terminal(&gateway, id);

        match event {
            WorkerEvent::Complete { mask, .. } => assert_eq!(mask.dimensions(), (40, 80)),
            other => panic!("expected mask, got {other:?}"),
        }
        let calls = calls.lock().unwrap();
        assert!(calls.contains(&ModelCall::Embed(100, 100)));
        assert!(calls.contains(&ModelCall::Embed(40, 80)));
    }

    #[test]
    fn model_errors_come_back_as_error_events() {
        let factory = FakeFactory::new().failing_segment("decoder exploded");
        let mut gateway = InferenceGateway::spawn(Box::new(factory)).unwrap();

        let id = gateway
            .request_mask(
                spec("sam_base"),
                &key("c.png", 1),
                Arc::new(RgbImage::new(2, 2)),
                vec![Point::foreground(0.5, 0.5)],
            )
            .unwrap();
        let (_, event) = wait_terminal(&gateway, id);

        match event {
            WorkerEvent::Error { message, .. } => assert!(message.contains("decoder exploded")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn request_ids_increase() {
        let mut gateway = InferenceGateway::spawn(Box::new(FakeFactory::new())).unwrap();
        let image = Arc::new(RgbImage::new(2, 2));

        let first = gateway
            .request_embedding(spec("sam_base"), &key("a", 1), image.clone())
            .unwrap();
        let second = gateway
            .request_embedding(spec("sam_base"), &key("a", 1), image)
            .unwrap();

        assert!(second > first);
    }

    #[test]
    fn empty_prompt_is_rejected_before_sending() {
        let mut gateway = InferenceGateway::spawn(Box::new(FakeFactory::new())).unwrap();

        let err = gateway
            .request_mask(
                spec("sam_base"),
                &key("a", 1),
                Arc::new(RgbImage::new(2, 2)),
                vec![],
            )
            .unwrap_err();

        assert!(matches!(err, GatewayError::EmptyPrompt));
    }
}
