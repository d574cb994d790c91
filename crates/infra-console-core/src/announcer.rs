//! Screen-reader announcements through two live regions.
//!
//! The [`Announcer`] is a process-wide service object: build one at
//! startup, share it by `Arc`, and call [`Announcer::reset`] between tests.
//!
//! # Timing
//!
//! `announce` never delivers synchronously. Each channel holds at most one
//! pending entry, due `delay` after the call and never sooner than
//! `min_gap` after the channel's previous delivery. A newer announcement
//! replaces the pending one. The owner's event loop calls
//! [`Announcer::flush`] (waking at [`Announcer::next_deadline`]) to push
//! due entries to the [`LiveRegion`], assertive before polite.
//!
//! # Deduplication
//!
//! Text equal to the pending entry, or to the last delivered entry on the
//! same channel within `dedup_window`, is coalesced. Key-repeat on a
//! boundary therefore produces one announcement, not dozens.
//!
//! Region failures are swallowed: a missing live region must never break
//! keyboard interaction.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Live-region politeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Read when the user is idle.
    #[default]
    Polite,
    /// Interrupts current speech.
    Assertive,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Polite => f.write_str("polite"),
            Priority::Assertive => f.write_str("assertive"),
        }
    }
}

/// One queued or delivered announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    pub text: String,
    pub priority: Priority,
    /// When `announce` was called.
    pub timestamp: Instant,
}

#[derive(Debug, Error)]
pub enum LiveRegionError {
    #[error("live region is not mounted")]
    Missing,
    #[error("live region write failed: {0}")]
    Write(String),
}

/// Output side of the announcer: whatever the platform reads aloud.
pub trait LiveRegion: Send {
    fn deliver(&mut self, announcement: &Announcement) -> Result<(), LiveRegionError>;
}

/// Time source, injectable so tests control the timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Hand-advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// In-memory live region; clones share the same delivery log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRegion {
    delivered: Arc<Mutex<Vec<Announcement>>>,
}

impl RecordingRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deliveries(&self) -> Vec<Announcement> {
        self.delivered.lock().clone()
    }

    /// Delivered texts on one channel, oldest first.
    pub fn texts(&self, priority: Priority) -> Vec<String> {
        self.delivered
            .lock()
            .iter()
            .filter(|a| a.priority == priority)
            .map(|a| a.text.clone())
            .collect()
    }

    pub fn last(&self) -> Option<Announcement> {
        self.delivered.lock().last().cloned()
    }
}

impl LiveRegion for RecordingRegion {
    fn deliver(&mut self, announcement: &Announcement) -> Result<(), LiveRegionError> {
        self.delivered.lock().push(announcement.clone());
        Ok(())
    }
}

/// Announcer timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncerConfig {
    /// Delay between `announce` and delivery.
    pub delay: Duration,
    /// Minimum spacing between two deliveries on one channel.
    pub min_gap: Duration,
    /// Window in which repeating the last delivered text is coalesced.
    pub dedup_window: Duration,
}

impl Default for AnnouncerConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(100),
            min_gap: Duration::from_millis(150),
            dedup_window: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug)]
struct Pending {
    announcement: Announcement,
    due: Instant,
}

#[derive(Debug, Default)]
struct Channel {
    pending: Option<Pending>,
    last: Option<(String, Instant)>,
}

#[derive(Default)]
struct Inner {
    polite: Channel,
    assertive: Channel,
    region: Option<Box<dyn LiveRegion>>,
}

impl Inner {
    fn channel_mut(&mut self, priority: Priority) -> &mut Channel {
        match priority {
            Priority::Polite => &mut self.polite,
            Priority::Assertive => &mut self.assertive,
        }
    }

    fn channel(&self, priority: Priority) -> &Channel {
        match priority {
            Priority::Polite => &self.polite,
            Priority::Assertive => &self.assertive,
        }
    }
}

/// Queues text for the polite and assertive live regions.
pub struct Announcer {
    config: AnnouncerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl fmt::Debug for Announcer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Announcer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Announcer {
    pub fn new(config: AnnouncerConfig, clock: Arc<dyn Clock>, region: Box<dyn LiveRegion>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(Inner {
                region: Some(region),
                ..Inner::default()
            }),
        }
    }

    /// An announcer with no live region mounted yet. Announcements are
    /// still scheduled; deliveries are dropped until [`mount`](Self::mount).
    pub fn detached(config: AnnouncerConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> AnnouncerConfig {
        self.config
    }

    /// Attach (or replace) the live region.
    pub fn mount(&self, region: Box<dyn LiveRegion>) {
        self.inner.lock().region = Some(region);
    }

    /// Detach the live region, returning it.
    pub fn unmount(&self) -> Option<Box<dyn LiveRegion>> {
        self.inner.lock().region.take()
    }

    /// Queue `text` on the `priority` channel. Never fails.
    pub fn announce(&self, text: impl AsRef<str>, priority: Priority) {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return;
        }
        let now = self.clock.now();
        let config = self.config;
        let mut inner = self.inner.lock();
        let channel = inner.channel_mut(priority);

        if channel
            .pending
            .as_ref()
            .is_some_and(|p| p.announcement.text == text)
        {
            tracing::trace!(%priority, text, "coalesced with pending announcement");
            return;
        }
        if let Some((last_text, at)) = &channel.last {
            if last_text == text && now.saturating_duration_since(*at) < config.dedup_window {
                tracing::trace!(%priority, text, "dropped repeat announcement");
                return;
            }
        }

        let mut due = now + config.delay;
        if let Some((_, at)) = &channel.last {
            due = due.max(*at + config.min_gap);
        }
        if let Some(replaced) = channel.pending.take() {
            tracing::trace!(%priority, replaced = %replaced.announcement.text, "superseded pending announcement");
        }
        channel.pending = Some(Pending {
            announcement: Announcement {
                text: text.to_string(),
                priority,
                timestamp: now,
            },
            due,
        });
    }

    pub fn polite(&self, text: impl AsRef<str>) {
        self.announce(text, Priority::Polite);
    }

    pub fn assertive(&self, text: impl AsRef<str>) {
        self.announce(text, Priority::Assertive);
    }

    /// Deliver every due announcement, assertive first. Returns how many
    /// entries were consumed.
    pub fn flush(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let mut consumed = 0;

        for priority in [Priority::Assertive, Priority::Polite] {
            let channel = inner.channel_mut(priority);
            let is_due = channel.pending.as_ref().is_some_and(|p| p.due <= now);
            if !is_due {
                continue;
            }
            let Some(pending) = channel.pending.take() else {
                continue;
            };
            channel.last = Some((pending.announcement.text.clone(), now));
            consumed += 1;

            match inner.region.as_mut() {
                Some(region) => {
                    if let Err(e) = region.deliver(&pending.announcement) {
                        tracing::debug!(error = %e, %priority, "live region delivery failed");
                    }
                }
                None => {
                    tracing::debug!(%priority, text = %pending.announcement.text, "no live region mounted");
                }
            }
        }
        consumed
    }

    /// Earliest instant at which [`flush`](Self::flush) has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let inner = self.inner.lock();
        [&inner.polite, &inner.assertive]
            .into_iter()
            .filter_map(|c| c.pending.as_ref().map(|p| p.due))
            .min()
    }

    /// Text waiting on a channel, if any.
    pub fn pending(&self, priority: Priority) -> Option<String> {
        self.inner
            .lock()
            .channel(priority)
            .pending
            .as_ref()
            .map(|p| p.announcement.text.clone())
    }

    /// Drop all pending entries and dedup history. The region stays mounted.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.polite = Channel::default();
        inner.assertive = Channel::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Arc<ManualClock>, RecordingRegion, Announcer) {
        let clock = Arc::new(ManualClock::new());
        let region = RecordingRegion::new();
        let announcer = Announcer::new(
            AnnouncerConfig::default(),
            clock.clone(),
            Box::new(region.clone()),
        );
        (clock, region, announcer)
    }

    #[test]
    fn test_not_delivered_before_delay() {
        let (clock, region, a) = setup();
        a.polite("Sorted by Name ascending");
        assert_eq!(a.flush(), 0);
        clock.advance(Duration::from_millis(99));
        assert_eq!(a.flush(), 0);
        clock.advance(Duration::from_millis(1));
        assert_eq!(a.flush(), 1);
        assert_eq!(region.texts(Priority::Polite), vec!["Sorted by Name ascending"]);
    }

    #[test]
    fn test_duplicate_within_window_delivers_once() {
        let (clock, region, a) = setup();
        a.polite("Sorted ascending");
        a.polite("Sorted ascending");
        clock.advance(Duration::from_millis(200));
        a.flush();
        a.polite("Sorted ascending");
        clock.advance(Duration::from_millis(200));
        a.flush();
        assert_eq!(region.deliveries().len(), 1);
    }

    #[test]
    fn test_repeat_after_window_is_delivered() {
        let (clock, region, a) = setup();
        a.polite("3 services");
        clock.advance(Duration::from_millis(100));
        a.flush();
        clock.advance(Duration::from_millis(1500));
        a.polite("3 services");
        clock.advance(Duration::from_millis(100));
        a.flush();
        assert_eq!(region.texts(Priority::Polite).len(), 2);
    }

    #[test]
    fn test_newer_text_supersedes_pending() {
        let (clock, region, a) = setup();
        a.polite("Row 1 selected");
        a.polite("Row 2 selected");
        assert_eq!(a.pending(Priority::Polite).as_deref(), Some("Row 2 selected"));
        clock.advance(Duration::from_millis(150));
        a.flush();
        assert_eq!(region.texts(Priority::Polite), vec!["Row 2 selected"]);
    }

    #[test]
    fn test_min_gap_between_deliveries() {
        let (clock, region, a) = setup();
        a.polite("first");
        clock.advance(Duration::from_millis(100));
        a.flush();
        a.polite("second");
        // delay elapsed but min gap (150ms from first delivery) has not
        clock.advance(Duration::from_millis(120));
        assert_eq!(a.flush(), 0);
        clock.advance(Duration::from_millis(30));
        assert_eq!(a.flush(), 1);
        assert_eq!(region.texts(Priority::Polite), vec!["first", "second"]);
    }

    #[test]
    fn test_channels_are_independent_and_assertive_first() {
        let (clock, region, a) = setup();
        a.polite("Sorting cleared");
        a.assertive("Delete failed");
        a.polite("Sorting cleared");
        clock.advance(Duration::from_millis(100));
        assert_eq!(a.flush(), 2);
        let order: Vec<Priority> = region.deliveries().iter().map(|d| d.priority).collect();
        assert_eq!(order, vec![Priority::Assertive, Priority::Polite]);
    }

    #[test]
    fn test_blank_text_ignored() {
        let (_clock, _region, a) = setup();
        a.polite("   ");
        assert!(a.next_deadline().is_none());
    }

    #[test]
    fn test_next_deadline_and_reset() {
        let (clock, _region, a) = setup();
        let start = clock.now();
        a.assertive("Error");
        assert_eq!(a.next_deadline(), Some(start + Duration::from_millis(100)));
        a.reset();
        assert!(a.next_deadline().is_none());
        assert!(a.pending(Priority::Assertive).is_none());
    }

    struct BrokenRegion;

    impl LiveRegion for BrokenRegion {
        fn deliver(&mut self, _: &Announcement) -> Result<(), LiveRegionError> {
            Err(LiveRegionError::Write("detached node".to_string()))
        }
    }

    #[test]
    fn test_region_failures_are_swallowed() {
        let clock = Arc::new(ManualClock::new());
        let a = Announcer::new(AnnouncerConfig::default(), clock.clone(), Box::new(BrokenRegion));
        a.polite("hello");
        clock.advance(Duration::from_millis(100));
        assert_eq!(a.flush(), 1);
        assert!(a.next_deadline().is_none());
    }

    #[test]
    fn test_detached_announcer_drops_deliveries() {
        let clock = Arc::new(ManualClock::new());
        let config = AnnouncerConfig {
            delay: Duration::ZERO,
            ..AnnouncerConfig::default()
        };
        let a = Announcer::new(config, clock.clone(), Box::new(RecordingRegion::new()));
        let detached_region = a.unmount();
        assert!(detached_region.is_some());

        a.polite("nobody listening");
        assert_eq!(a.flush(), 1);

        let region = RecordingRegion::new();
        a.mount(Box::new(region.clone()));
        a.polite("now mounted");
        // Still inside the min gap of the dropped delivery.
        assert_eq!(a.flush(), 0);
        assert!(region.texts(Priority::Polite).is_empty());

        clock.advance(config.min_gap + Duration::from_millis(1));
        assert_eq!(a.flush(), 1);
        assert_eq!(region.texts(Priority::Polite), vec!["now mounted"]);
        assert!(a.unmount().is_some());
    }
}
