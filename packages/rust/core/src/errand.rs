//! Errand dispatch: decode the inbound body and route it by instruction kind.

use tracing::{Span, field, info, instrument};

use muninn_shared::{Echo, Errand, Result};

use crate::pipeline::DiscoveryPipeline;

/// Turns one inbound message body into the echo to publish.
pub struct ErrandHandler {
    pipeline: DiscoveryPipeline,
}

impl ErrandHandler {
    pub fn new(pipeline: DiscoveryPipeline) -> Self {
        Self { pipeline }
    }

    /// Decode `body` and run the matching workflow.
    ///
    /// Fails without doing any pipeline work if the body is malformed or the
    /// instructions are not a discovery request.
    #[instrument(skip_all, fields(errand_identifier = field::Empty))]
    pub async fn handle(&self, body: &[u8]) -> Result<Echo> {
        info!(body = %String::from_utf8_lossy(body), "receiving errand");
        let errand = Errand::from_slice(body)?;
        Span::current().record("errand_identifier", errand.errand_identifier.as_str());

        let reply = self.pipeline.discover(&errand.discovery()?.message).await?;

        info!("completed errand");
        Ok(Echo { errand, reply })
    }
}

#[cfg(test)]
mod tests {
    use muninn_shared::MuninnError;

    use super::*;
    use crate::testing::{discovery_body, happy_fakes};

    #[tokio::test]
    async fn discovery_errand_produces_echo() {
        let fakes = happy_fakes(&["s1"], &["o1", "o2"]);
        let handler = ErrandHandler::new(fakes.pipeline());

        let echo = handler
            .handle(&discovery_body("errand-7", "the moon is cheese"))
            .await
            .unwrap();

        assert_eq!(echo.errand.errand_identifier, "errand-7");
        assert_eq!(echo.errand.discovery().unwrap().message, "the moon is cheese");
        assert_eq!(echo.reply.discovery_result.len(), 3);
    }

    #[tokio::test]
    async fn unsupported_instructions_fail_fast() {
        let fakes = happy_fakes(&["s1"], &["o1"]);
        let handler = ErrandHandler::new(fakes.pipeline());
        let body = br#"{
            "errand_identifier": "errand-8",
            "instructions": {"instructions_type": "summary", "text": "..."}
        }"#;

        let err = handler.handle(body).await.unwrap_err();
        assert!(matches!(
            err,
            MuninnError::UnsupportedInstructions { ref errand_identifier } if errand_identifier == "errand-8"
        ));
        assert!(fakes.queries.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_body_fails_fast() {
        let fakes = happy_fakes(&["s1"], &["o1"]);
        let handler = ErrandHandler::new(fakes.pipeline());

        let err = handler.handle(b"{\"errand_identifier\": 5").await.unwrap_err();
        assert!(matches!(err, MuninnError::Decode(_)));
        assert!(fakes.queries.calls.lock().unwrap().is_empty());
    }
}
