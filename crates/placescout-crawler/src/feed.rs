//! Decoded responses delivered to a session as they arrive.
//!
//! The transport calls [`ResponseFeed::deliver`] from its response-capture
//! hook. Decoding happens on the delivering side; the session drains the
//! receiving end before each stop-condition check.

use crate::decoder::{DecodeResult, WireDecoder};
use crate::error::{CrawlError, Result};
use placescout_transport::{ResponseKind, WireResponse};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One decode outcome, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct DecodedResponse {
    pub kind: ResponseKind,
    pub page_index: u32,
    pub result: DecodeResult,
}

/// Receiving end owned by a session.
pub type ResponseReceiver = mpsc::Receiver<DecodedResponse>;

/// Sending end handed to the transport.
#[derive(Debug, Clone)]
pub struct ResponseFeed {
    decoder: Arc<WireDecoder>,
    tx: mpsc::Sender<DecodedResponse>,
}

/// Create a feed and the receiver for one session.
pub fn response_channel(decoder: Arc<WireDecoder>, capacity: usize) -> (ResponseFeed, ResponseReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ResponseFeed { decoder, tx }, rx)
}

impl ResponseFeed {
    fn decode(&self, response: &WireResponse) -> DecodedResponse {
        let result = self.decoder.decode_response(response);
        if let Err(e) = &result {
            tracing::warn!(page_index = response.page_index, error = %e, "response failed to decode");
        }
        DecodedResponse {
            kind: response.kind,
            page_index: response.page_index,
            result,
        }
    }

    /// Decode and send, waiting for room in the channel.
    pub async fn deliver(&self, response: &WireResponse) -> Result<()> {
        let decoded = self.decode(response);
        self.tx
            .send(decoded)
            .await
            .map_err(|_| CrawlError::ChannelClosed)
    }

    /// Decode and send without waiting. Fails if the channel is full or closed.
    pub fn try_deliver(&self, response: &WireResponse) -> Result<()> {
        let decoded = self.decode(response);
        self.tx.try_send(decoded).map_err(|e| match e {
            mpsc::error::TrySendError::Full(dropped) => {
                tracing::warn!(page_index = dropped.page_index, "response channel full, dropping response");
                CrawlError::ChannelFull {
                    page_index: dropped.page_index,
                }
            }
            mpsc::error::TrySendError::Closed(_) => CrawlError::ChannelClosed,
        })
    }

    /// Build a [`WireResponse`] from a captured request and deliver it.
    ///
    /// Responses from endpoints the crawler ignores are skipped.
    pub async fn deliver_captured(&self, request_url: &str, body: Vec<u8>) -> Result<bool> {
        match WireResponse::from_request(request_url, body) {
            Some(response) => self.deliver(&response).await.map(|()| true),
            None => Ok(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;

    #[tokio::test]
    async fn test_deliver_decodes() {
        let (feed, mut rx) = response_channel(Arc::new(WireDecoder::default()), 4);
        feed.deliver(&WireResponse::new(Vec::new(), ResponseKind::SearchPage, 2))
            .await
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received.page_index, 2);
        assert!(matches!(received.result, Err(DecodeError::EmptyBody)));
    }

    #[tokio::test]
    async fn test_deliver_captured_skips_unknown_endpoints() {
        let (feed, mut rx) = response_channel(Arc::new(WireDecoder::default()), 4);
        let skipped = feed
            .deliver_captured("https://www.google.com/maps/vt/tile", b"[]".to_vec())
            .await
            .unwrap();
        assert!(!skipped);

        let delivered = feed
            .deliver_captured(
                "https://www.google.com/search?tbm=map&pb=!4m12!7i20!8i40",
                b")]}'\n[]".to_vec(),
            )
            .await
            .unwrap();
        assert!(delivered);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.kind, ResponseKind::SearchPage);
        assert_eq!(received.page_index, 3);
        assert!(received.result.unwrap().is_empty());
    }

    #[test]
    fn test_try_deliver_full_and_closed() {
        let (feed, rx) = response_channel(Arc::new(WireDecoder::default()), 1);
        let response = WireResponse::new(b"[]".to_vec(), ResponseKind::SearchPage, 1);
        feed.try_deliver(&response).unwrap();
        assert!(matches!(
            feed.try_deliver(&response),
            Err(CrawlError::ChannelFull { page_index: 1 })
        ));
        drop(rx);
        assert!(feed.is_closed());
        assert!(matches!(feed.try_deliver(&response), Err(CrawlError::ChannelClosed)));
    }
}
