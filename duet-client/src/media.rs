use std::fmt;
use std::sync::Arc;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Local audio track handed over by the capture subsystem.
pub type LocalTrack = Arc<dyn TrackLocal + Send + Sync>;

/// Source of the local tracks attached to every new peer connection.
pub trait MediaCapture: Send + Sync {
    fn local_tracks(&self) -> Vec<LocalTrack>;
}

/// Receive-only participation.
pub struct NoCapture;

impl MediaCapture for NoCapture {
    fn local_tracks(&self) -> Vec<LocalTrack> {
        Vec::new()
    }
}

impl MediaCapture for Vec<LocalTrack> {
    fn local_tracks(&self) -> Vec<LocalTrack> {
        self.clone()
    }
}

/// First remote media stream of a peer connection.
#[derive(Clone)]
pub struct RemoteStream {
    pub stream_id: String,
    pub track_id: String,
    /// `None` when the connection is not backed by a native peer connection.
    pub track: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStream")
            .field("stream_id", &self.stream_id)
            .field("track_id", &self.track_id)
            .field("native", &self.track.is_some())
            .finish()
    }
}
