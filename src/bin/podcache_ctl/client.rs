use podcache_protocol::{
    CACHED_PATH, CachedReport, ControlMessage, EVENTS_PATH, MESSAGES_PATH, Notification,
    STATUS_PATH, SkipWaitingReport, StatusReport,
};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CtlError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server error: {0}")]
    Server(String),
    #[error("invalid notification: {0}")]
    Notification(#[from] serde_json::Error),
}

#[derive(Clone, Debug)]
pub struct Ctx {
    pub client: Client,
    pub base: Url,
}

impl Ctx {
    pub fn new(gateway: &str) -> Result<Self, CtlError> {
        let base = Url::parse(gateway)?.join("/")?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self { client, base })
    }

    pub fn user_agent() -> &'static str {
        concat!("podcache-ctl/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url(&self, path: &str) -> Result<Url, CtlError> {
        self.base.join(path).map_err(CtlError::Url)
    }

    async fn post_message(&self, message: &ControlMessage) -> Result<Response, CtlError> {
        let resp = self
            .client
            .post(self.url(MESSAGES_PATH)?)
            .json(message)
            .send()
            .await?;
        Self::ensure_success(resp).await
    }

    async fn ensure_success(resp: Response) -> Result<Response, CtlError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        Err(CtlError::Server(format!("status {status} body {text}")))
    }

    async fn handle<T: for<'de> Deserialize<'de>>(resp: Response) -> Result<T, CtlError> {
        let resp = Self::ensure_success(resp).await?;
        let bytes = resp.bytes().await?;
        let val = serde_json::from_slice(&bytes)
            .map_err(|e| CtlError::Server(format!("failed to parse body: {e}")))?;
        Ok(val)
    }

    pub async fn skip_waiting(&self) -> Result<SkipWaitingReport, CtlError> {
        let resp = self.post_message(&ControlMessage::SkipWaiting).await?;
        Self::handle(resp).await
    }

    /// Returns once the gateway accepted the request; the fetch itself is
    /// reported later as a notification.
    pub async fn cache(&self, url: &str) -> Result<(), CtlError> {
        let resp = self
            .post_message(&ControlMessage::CacheContent {
                url: url.to_string(),
            })
            .await?;
        if resp.status() != StatusCode::ACCEPTED {
            return Err(CtlError::Server(format!(
                "unexpected status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    pub async fn status(&self) -> Result<StatusReport, CtlError> {
        let resp = self.client.get(self.url(STATUS_PATH)?).send().await?;
        Self::handle(resp).await
    }

    pub async fn cached(&self, url: &str) -> Result<CachedReport, CtlError> {
        let mut target = self.url(CACHED_PATH)?;
        target.query_pairs_mut().append_pair("url", url);
        let resp = self.client.get(target).send().await?;
        Self::handle(resp).await
    }

    /// Stream notifications into `sink` until the gateway closes the stream or
    /// `limit` notifications were delivered. Returns how many were delivered.
    pub async fn watch<F>(&self, limit: Option<usize>, mut sink: F) -> Result<usize, CtlError>
    where
        F: FnMut(&Notification) -> Result<(), CtlError>,
    {
        let resp = self
            .client
            .get(self.url(EVENTS_PATH)?)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let mut resp = Self::ensure_success(resp).await?;

        let mut decoder = SseDecoder::default();
        let mut delivered = 0;
        if limit == Some(0) {
            return Ok(0);
        }

        while let Some(chunk) = resp.chunk().await? {
            for data in decoder.push(&chunk) {
                let notification = Notification::from_json(&data)?;
                sink(&notification)?;
                delivered += 1;
                if limit.is_some_and(|limit| delivered >= limit) {
                    return Ok(delivered);
                }
            }
        }
        Ok(delivered)
    }
}

/// Incremental parser for `text/event-stream` bodies. Yields the `data`
/// payload of each complete event; comments and keep-alives are skipped.
///
/// Bytes are buffered until an event is complete, so a character split
/// across chunks decodes intact.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some((block_end, consumed)) = event_end(&self.buffer) {
            let block = String::from_utf8_lossy(&self.buffer[..block_end])
                .replace("\r\n", "\n")
                .replace('\r', "\n");
            self.buffer.drain(..consumed);

            let data: Vec<&str> = block
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|value| value.strip_prefix(' ').unwrap_or(value))
                .collect();
            if !data.is_empty() {
                payloads.push(data.join("\n"));
            }
        }
        payloads
    }
}

/// Finds the blank line that ends the first buffered event.
///
/// Returns the length of the event's lines and the number of bytes to consume.
/// A trailing `\r` may be half of a `\r\n`, so it waits for more input.
fn event_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    let mut index = 0;
    while index < buffer.len() {
        let terminator = match buffer[index] {
            b'\n' => 1,
            b'\r' => match buffer.get(index + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                None => return None,
            },
            _ => {
                index += 1;
                continue;
            }
        };
        if index == line_start {
            return Some((line_start, index + terminator));
        }
        index += terminator;
        line_start = index;
    }
    None
}
