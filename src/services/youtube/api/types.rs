//! Shared types and pagination plumbing for the YouTube API bindings.

use crate::error::AuthError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tokio_stream::Stream;

type OneFuturePage<'a, F, T> =
    Pin<Box<dyn Future<Output = Result<(F, (VecDeque<T>, Option<String>)), AuthError>> + 'a + Send>>;

/// A stream over a paginated list endpoint.
///
/// Items are yielded one by one; the next page is fetched transparently
/// when the current one is exhausted. Forward-only.
pub struct PagedStream<'a, T, F> {
    /// Items from the most recent page that have not been yielded yet.
    current_items: VecDeque<T>,
    /// The in-flight page request, if any.
    pending_request: Option<OneFuturePage<'a, F, T>>,
    /// Set once the provider stops returning a next-page token.
    is_done: bool,
}

impl<'a, T, F> PagedStream<'a, T, F> {
    /// Wraps a page fetcher: given the previous page token (`None` for the
    /// first page), it returns the page's items and the next token.
    pub fn new<Fut>(fetcher: F) -> Self
    where
        F: Fn(Option<String>) -> Fut,
        F: Send + 'a,
        Fut: Future<Output = Result<(VecDeque<T>, Option<String>), AuthError>> + Send + 'a,
    {
        let first_page = async move {
            let results = fetcher(None).await?;
            Ok((fetcher, results))
        };
        Self {
            pending_request: Some(Box::pin(first_page)),
            current_items: VecDeque::new(),
            is_done: false,
        }
    }
}

impl<'a, T: Unpin, F> Unpin for PagedStream<'a, T, F> {}

impl<'a, T: Unpin, F, Fut> Stream for PagedStream<'a, T, F>
where
    F: Fn(Option<String>) -> Fut,
    F: Send + 'a,
    Fut: Future<Output = Result<(VecDeque<T>, Option<String>), AuthError>> + Send + 'a,
{
    type Item = Result<T, AuthError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.current_items.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if self.is_done {
                return Poll::Ready(None);
            }

            let Some(pending) = self.pending_request.as_mut() else {
                self.is_done = true;
                return Poll::Ready(None);
            };
            match pending.as_mut().poll(cx) {
                Poll::Ready(Ok((fetcher, (items, next_token)))) => {
                    self.current_items.extend(items);
                    if let Some(next_token) = next_token {
                        // Queue the next page but do not poll it until the
                        // current batch runs out.
                        self.pending_request = Some(Box::pin(async move {
                            let results = fetcher(Some(next_token)).await?;
                            Ok((fetcher, results))
                        }));
                    } else {
                        self.is_done = true;
                        self.pending_request = None;
                    }
                }
                Poll::Ready(Err(e)) => {
                    self.pending_request = None;
                    self.is_done = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

/// Paging details attached to every list response.
///
/// See: <https://developers.google.com/youtube/v3/docs/pageInfo>
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(rename = "totalResults", default)]
    pub total_results: u32,
    #[serde(rename = "resultsPerPage", default)]
    pub results_per_page: u32,
}
