//! Local and remote media handles.
//!
//! Audio capture is provided by the host. The session asks an [`AudioSource`]
//! once per greeting and bounds the wait with the configured timeout; if the
//! stream does not arrive in time the session negotiates without audio.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Media acquisition errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    /// The host could not provide the stream.
    #[error("audio unavailable: {0}")]
    Unavailable(String),

    /// The stream did not arrive in time.
    #[error("audio acquisition timed out after {0:?}")]
    Timeout(Duration),

    /// No audio source was registered.
    #[error("no audio source registered")]
    NoSource,
}

/// Opaque handle to a local capture stream owned by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStream {
    /// Host-side stream identifier.
    pub id: String,
}

impl AudioStream {
    /// Create a handle for the given host stream id.
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// A media track added by the remote side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    /// Track identifier.
    pub id: String,
    /// Media kind, `audio` or `video`.
    pub kind: String,
}

/// Host callback invoked for every remote track.
pub type TrackCallback = Arc<dyn Fn(&RemoteTrack) + Send + Sync>;

/// Provider of the local audio stream.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Resolve once the stream is available.
    async fn acquire(&self) -> Result<AudioStream, MediaError>;
}

/// Acquire audio from `source`, giving up after `limit`.
pub async fn acquire_audio(
    source: &dyn AudioSource,
    limit: Duration,
) -> Result<AudioStream, MediaError> {
    match tokio::time::timeout(limit, source.acquire()).await {
        Ok(result) => result,
        Err(_) => Err(MediaError::Timeout(limit)),
    }
}

#[derive(Debug, Clone)]
enum MockAudioBehavior {
    Ready(AudioStream),
    Fail(String),
    Delay(Duration, AudioStream),
    Never,
}

/// Mock audio source for testing.
///
/// Clones share state, so a test can keep a handle and inspect call counts.
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    inner: Arc<Mutex<MockAudioInner>>,
}

#[derive(Debug)]
struct MockAudioInner {
    behavior: MockAudioBehavior,
    calls: usize,
}

impl MockAudioSource {
    fn with(behavior: MockAudioBehavior) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockAudioInner { behavior, calls: 0 })),
        }
    }

    /// Source that resolves immediately with `stream`.
    pub fn ready(stream: AudioStream) -> Self {
        Self::with(MockAudioBehavior::Ready(stream))
    }

    /// Source that fails with `error`.
    pub fn failing(error: &str) -> Self {
        Self::with(MockAudioBehavior::Fail(error.to_string()))
    }

    /// Source that resolves with `stream` after `delay`.
    pub fn delayed(delay: Duration, stream: AudioStream) -> Self {
        Self::with(MockAudioBehavior::Delay(delay, stream))
    }

    /// Source that never resolves.
    pub fn never() -> Self {
        Self::with(MockAudioBehavior::Never)
    }

    /// Number of `acquire()` calls so far.
    pub fn calls(&self) -> usize {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, MockAudioInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AudioSource for MockAudioSource {
    async fn acquire(&self) -> Result<AudioStream, MediaError> {
        let behavior = {
            let mut inner = self.lock();
            inner.calls += 1;
            inner.behavior.clone()
        };

        match behavior {
            MockAudioBehavior::Ready(stream) => Ok(stream),
            MockAudioBehavior::Fail(error) => Err(MediaError::Unavailable(error)),
            MockAudioBehavior::Delay(delay, stream) => {
                tokio::time::sleep(delay).await;
                Ok(stream)
            }
            MockAudioBehavior::Never => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn ready_source_resolves() {
        let source = MockAudioSource::ready(AudioStream::new("mic"));
        let stream = acquire_audio(&source, LIMIT).await.unwrap();
        assert_eq!(stream.id, "mic");
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn failing_source_reports_unavailable() {
        let source = MockAudioSource::failing("permission denied");
        let err = acquire_audio(&source, LIMIT).await.unwrap_err();
        assert_eq!(err, MediaError::Unavailable("permission denied".into()));
    }

    #[tokio::test]
    async fn stalled_source_times_out() {
        let source = MockAudioSource::never();
        let err = acquire_audio(&source, LIMIT).await.unwrap_err();
        assert_eq!(err, MediaError::Timeout(LIMIT));
    }

    #[tokio::test]
    async fn slow_source_within_limit_resolves() {
        let source = MockAudioSource::delayed(Duration::from_millis(5), AudioStream::new("mic"));
        assert!(acquire_audio(&source, Duration::from_secs(2)).await.is_ok());
    }
}
