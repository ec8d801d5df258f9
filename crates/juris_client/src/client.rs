//! Streaming query client: POST the question to `/ask/`, read the body line by
//! line and turn it into answer fragments plus a completion handle carrying the
//! retrieval contexts of the end event.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{stream, Stream, StreamExt};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::framing::LineDecoder;
use crate::messages::{parse_line, AskRequest, RetrievalContext, StreamEvent};
use crate::session::SessionState;

/// Raw lines of one response body, without terminators.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, StreamError>> + Send>>;

/// Opens one streamed request. Each call is a new request.
pub trait Transport {
    fn open(
        &self,
        request: &AskRequest<'_>,
    ) -> impl Future<Output = Result<LineStream, StreamError>> + Send;
}

/// [`Transport`] over HTTP: `POST {api_url}/ask/` with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    ask_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// `timeout` bounds the whole request including the body; generation can be slow.
    pub fn new(client: reqwest::Client, api_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            ask_url: format!("{}/ask/", api_url.trim_end_matches('/')),
            timeout,
        }
    }

    pub fn ask_url(&self) -> &str {
        &self.ask_url
    }
}

impl Transport for HttpTransport {
    async fn open(&self, request: &AskRequest<'_>) -> Result<LineStream, StreamError> {
        info!(url = %self.ask_url, k = request.k, temperature = request.temperature, "sending query");
        let response = self
            .client
            .post(&self.ask_url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StreamError::unexpected(format!("request failed: {e}")))?;
        let status = response.status();
        info!(%status, "received response");
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(StreamError::unexpected(format!(
                "service answered with status {status}: {body}"
            )));
        }
        Ok(body_lines(Box::pin(response.bytes_stream())))
    }
}

/// Frame a byte stream into lines. Read errors end the stream as interruptions.
pub fn body_lines<S, B, E>(bytes: S) -> LineStream
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    struct State<S> {
        bytes: S,
        decoder: LineDecoder,
        pending: std::collections::VecDeque<Vec<u8>>,
        done: bool,
    }

    let lines = stream::try_unfold(
        State {
            bytes,
            decoder: LineDecoder::default(),
            pending: Default::default(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(line) = state.pending.pop_front() {
                    return Ok(Some((line, state)));
                }
                if state.done {
                    return Ok(None);
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => state.pending.extend(state.decoder.push_chunk(chunk.as_ref())),
                    Some(Err(e)) => {
                        return Err(StreamError::interrupted(format!("read failed: {e}")));
                    }
                    None => {
                        state.done = true;
                        state.pending.extend(state.decoder.finish());
                    }
                }
            }
        },
    );
    Box::pin(lines)
}

/// Issues queries with fixed retrieval parameters.
#[derive(Debug, Clone)]
pub struct StreamingClient<T> {
    transport: T,
    k: u32,
    temperature: f64,
}

impl<T: Transport> StreamingClient<T> {
    pub fn new(transport: T, k: u32, temperature: f64) -> Self {
        Self {
            transport,
            k,
            temperature,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Open a new request for `query`.
    ///
    /// The returned stream yields fragments until the end event, and the
    /// completion resolves to that event's contexts. If the stream fails or the
    /// body ends without an end event, the completion resolves to `None`.
    pub async fn stream(&self, query: &str) -> Result<(AnswerStream, Completion), StreamError> {
        let request = AskRequest::new(query, self.k, self.temperature);
        let lines = self.transport.open(&request).await?;
        let (tx, rx) = oneshot::channel();
        Ok((AnswerStream::new(lines, tx), Completion { rx }))
    }
}

/// Answer fragments of one request. Finite and consumed once.
pub struct AnswerStream {
    lines: LineStream,
    end: Option<oneshot::Sender<Vec<RetrievalContext>>>,
    done: bool,
}

impl AnswerStream {
    fn new(lines: LineStream, end: oneshot::Sender<Vec<RetrievalContext>>) -> Self {
        Self {
            lines,
            end: Some(end),
            done: false,
        }
    }

    fn finish(&mut self) {
        self.done = true;
        self.end = None;
    }
}

impl Stream for AnswerStream {
    type Item = Result<String, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        let line = match this.lines.poll_next_unpin(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(None) => {
                debug!("response body ended without end event");
                this.finish();
                return Poll::Ready(None);
            }
            Poll::Ready(Some(Err(e))) => {
                warn!(error = %e, "stream interrupted");
                this.finish();
                return Poll::Ready(Some(Err(e)));
            }
            Poll::Ready(Some(Ok(line))) => line,
        };
        match parse_line(&line) {
            Ok(StreamEvent::Token(text)) => {
                debug!(len = text.len(), "token");
                Poll::Ready(Some(Ok(text)))
            }
            Ok(StreamEvent::End(contexts)) => {
                debug!(contexts = contexts.len(), "end of stream");
                if let Some(end) = this.end.take() {
                    let _ = end.send(contexts);
                }
                this.finish();
                Poll::Ready(None)
            }
            Err(e) => {
                warn!(error = %e, "malformed event");
                this.finish();
                Poll::Ready(Some(Err(StreamError::interrupted(e.to_string()))))
            }
        }
    }
}

/// Resolves once the answer stream has finished.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<Vec<RetrievalContext>>,
}

impl Completion {
    /// Contexts of the end event, or `None` if the stream never reached one.
    pub async fn contexts(self) -> Option<Vec<RetrievalContext>> {
        self.rx.await.ok()
    }

    /// Overwrite `state.contexts` when the stream completed with an end event;
    /// otherwise leave it untouched. Returns whether it was written.
    pub async fn apply(self, state: &mut SessionState) -> bool {
        match self.contexts().await {
            Some(contexts) => {
                state.contexts = contexts;
                true
            }
            None => false,
        }
    }
}
