//! Source selection: first non-empty adapter in priority order wins.

use tracing::{info, warn};

use crate::contract::{Candidate, Source};

/// Try each adapter in the configured priority order and return the first
/// candidate found, together with the index of the adapter that produced it.
///
/// Lower-priority adapters are never invoked once a candidate is found; this
/// avoids needless API calls and double-acknowledgement races across
/// sources. A failing adapter is logged and treated as "no candidate" so one
/// flaky source never blocks the fallback sources.
pub async fn select_candidate(sources: &[Box<dyn Source>]) -> Option<(Candidate, usize)> {
    for (index, source) in sources.iter().enumerate() {
        info!(source = source.name(), "checking source for new candidates");
        match source.discover().await {
            Ok(Some(candidate)) => {
                info!(
                    source = source.name(),
                    id = %candidate.id,
                    uri = %candidate.source_uri,
                    "candidate selected"
                );
                return Some((candidate, index));
            }
            Ok(None) => {
                info!(source = source.name(), "no candidates from source");
            }
            Err(e) => {
                warn!(source = source.name(), error = %e, "source failed, falling through");
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::MockSource;
    use crate::error::AdapterError;

    fn candidate(id: &str) -> Candidate {
        Candidate {
            id: id.to_string(),
            source_uri: format!("http://media/{id}"),
            caption_text: String::new(),
            author_label: "@someone".into(),
            ack: None,
            queue_behind: 0,
        }
    }

    #[tokio::test]
    async fn short_circuits_on_first_hit() {
        let mut first = MockSource::new();
        first.expect_name().return_const("discord".to_string());
        first
            .expect_discover()
            .times(1)
            .returning(|| Ok(Some(candidate("discord_1"))));

        let mut second = MockSource::new();
        second.expect_name().return_const("bookmarks".to_string());
        // Lower-priority source must never be invoked.
        second.expect_discover().times(0);

        let sources: Vec<Box<dyn Source>> = vec![Box::new(first), Box::new(second)];
        let (found, index) = select_candidate(&sources).await.unwrap();
        assert_eq!(found.id, "discord_1");
        assert_eq!(index, 0);
    }

    #[tokio::test]
    async fn failing_adapter_falls_through() {
        let mut first = MockSource::new();
        first.expect_name().return_const("discord".to_string());
        first
            .expect_discover()
            .returning(|| Err(AdapterError::Api("HTTP 500".into())));

        let mut second = MockSource::new();
        second.expect_name().return_const("bookmarks".to_string());
        second
            .expect_discover()
            .returning(|| Ok(Some(candidate("x_2"))));

        let sources: Vec<Box<dyn Source>> = vec![Box::new(first), Box::new(second)];
        let (found, index) = select_candidate(&sources).await.unwrap();
        assert_eq!(found.id, "x_2");
        assert_eq!(index, 1);
    }

    #[tokio::test]
    async fn all_empty_yields_none() {
        let mut first = MockSource::new();
        first.expect_name().return_const("discord".to_string());
        first.expect_discover().returning(|| Ok(None));

        let sources: Vec<Box<dyn Source>> = vec![Box::new(first)];
        assert!(select_candidate(&sources).await.is_none());
    }
}
