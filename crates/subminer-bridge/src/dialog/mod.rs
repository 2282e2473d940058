//! Mining dialog orchestration over the frame bridge.

mod orchestrator;

use async_trait::async_trait;
use tokio::sync::broadcast;

use subminer_core::protocol::frame::{SavedDialogState, SubtitleRef};

pub use orchestrator::{DialogRequest, MiningDialog};

/// What playback does after a card was mined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostMinePlayback {
    /// Resume only if the video was playing before mining started.
    #[default]
    Remember,
    Play,
    Pause,
}

/// The page hosting the video the dialog mines from.
#[async_trait]
pub trait PlaybackHost: Send + Sync {
    fn video_src(&self) -> String;
    /// Seconds.
    fn current_time(&self) -> f64;
    fn pause(&self);
    fn play(&self);
    fn seek(&self, seconds: f64);
    fn was_playing_before_mining(&self) -> bool;
    fn post_mine_playback(&self) -> PostMinePlayback;

    /// Remember the focused and fullscreen elements, leaving fullscreen.
    fn capture_focus(&self);
    /// Re-enter fullscreen and refocus what `capture_focus` remembered.
    fn restore_focus(&self);

    fn set_key_bindings_enabled(&self, enabled: bool);
    /// Force-hide subtitles and the mobile overlay while the dialog is up.
    fn set_overlays_suppressed(&self, suppressed: bool);

    fn save_dialog_state(&self, state: SavedDialogState);

    /// Human readable source label of a subtitle (file name and position).
    fn source(&self, subtitle: &SubtitleRef) -> String;
    /// Link back to the video at the subtitle's time range, if the host has one.
    fn url(&self, start_ms: f64, end_ms: f64) -> Option<String>;

    /// Re-record audio for the range, then reopen the dialog with `state`.
    async fn rerecord(&self, record_start: f64, record_end: f64, state: SavedDialogState);

    /// Fires whenever the host window regains focus.
    fn focus_events(&self) -> broadcast::Receiver<()>;
}
