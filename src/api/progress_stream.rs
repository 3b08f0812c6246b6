use std::pin::Pin;
use std::task::{Context, Poll};
use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use crate::core::ProgressCallback;

pin_project! {
    /// 统计已发送字节数，并在百分比变化时回调
    pub struct ProgressStream<S> {
        #[pin]
        inner: S,
        callback: ProgressCallback,
        bytes_sent: u64,
        total_bytes: u64,
        last_percent: Option<u8>,
    }
}

impl<S> ProgressStream<S> {
    pub fn new(inner: S, total_bytes: u64, callback: ProgressCallback) -> Self {
        Self {
            inner,
            callback,
            bytes_sent: 0,
            total_bytes,
            last_percent: None,
        }
    }
}

/// round(sent * 100 / total)，空文件视为已完成
pub fn percent(bytes_sent: u64, total_bytes: u64) -> u8 {
    if total_bytes == 0 {
        return 100;
    }

    let percent = (bytes_sent as f64 * 100.0 / total_bytes as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

impl<S> Stream for ProgressStream<S>
where
    S: Stream<Item = std::io::Result<Bytes>>
{
    type Item = std::io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if !chunk.is_empty() {
                    *this.bytes_sent += chunk.len() as u64;

                    let current = percent(*this.bytes_sent, *this.total_bytes);
                    if *this.last_percent != Some(current) {
                        *this.last_percent = Some(current);
                        (**this.callback)(current);
                    }
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use futures::{stream, StreamExt};
    use super::*;

    #[test]
    fn test_percent_rounding() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(1, 200), 1);
        assert_eq!(percent(199, 200), 100);
        assert_eq!(percent(50, 0), 100);
    }

    #[tokio::test]
    async fn test_stream_reports_each_percent_once() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));

        let chunks = vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::new()),
            Ok(Bytes::from_static(b"c")),
            Ok(Bytes::from_static(b"d")),
        ];
        let progress = ProgressStream::new(stream::iter(chunks), 4, callback);
        let collected: Vec<_> = progress.collect().await;

        assert_eq!(collected.len(), 4);
        assert_eq!(*seen.lock().unwrap(), vec![50, 75, 100]);
    }
}
