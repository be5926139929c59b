//! Gradual reveal of rendered markup.
//!
//! [`Typewriter`] is the resumable state (cursor into the markup); [`animate`]
//! drives it on a timer and checks a [`StopHandle`] once per step. A tag is
//! always revealed whole, so every intermediate buffer is well formed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

/// Anything that can display a partially revealed message.
pub trait RenderTarget {
    fn render(&mut self, markup: &str);
}

/// Cooperative cancellation flag shared between the animator and the UI.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationOutcome {
    Completed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationOptions {
    pub chars_per_step: usize,
    pub speed: Duration,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            chars_per_step: 1,
            speed: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Typewriter<'a> {
    markup: &'a str,
    cursor: usize,
}

impl<'a> Typewriter<'a> {
    pub fn new(markup: &'a str) -> Self {
        Self { markup, cursor: 0 }
    }

    /// Reveal up to `units` more characters. A `<` pulls in everything up to
    /// its closing `>` as a single unit; a `<` with no closing `>` is revealed
    /// alone.
    pub fn advance(&mut self, units: usize) {
        for _ in 0..units.max(1) {
            let rest = &self.markup[self.cursor..];
            let Some(ch) = rest.chars().next() else {
                return;
            };
            self.cursor += if ch == '<' {
                rest.find('>').map_or(1, |close| close + 1)
            } else {
                ch.len_utf8()
            };
        }
    }

    /// Everything shown so far. Always a prefix of the full markup.
    pub fn revealed(&self) -> &'a str {
        &self.markup[..self.cursor]
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.markup.len()
    }
}

/// Reveal `markup` on `target` step by step.
///
/// Clears `stop` first, so a stop requested before this animation began is
/// ignored. Settles exactly once, either when everything is shown or when
/// `stop` is observed at the top of a step; what was already rendered stays.
pub async fn animate<T>(
    target: &mut T,
    markup: &str,
    options: AnimationOptions,
    stop: &StopHandle,
) -> AnimationOutcome
where
    T: RenderTarget + ?Sized,
{
    stop.reset();
    play(target, markup, options, stop).await
}

/// Like [`animate`], but honors a stop already requested. For callers that
/// clear `stop` themselves before announcing the animation.
pub(crate) async fn play<T>(
    target: &mut T,
    markup: &str,
    options: AnimationOptions,
    stop: &StopHandle,
) -> AnimationOutcome
where
    T: RenderTarget + ?Sized,
{
    let mut writer = Typewriter::new(markup);
    let mut steps = 0usize;

    loop {
        if writer.is_finished() {
            debug!(steps, "typewriter finished");
            return AnimationOutcome::Completed;
        }
        if stop.is_stopped() {
            debug!(steps, revealed = writer.revealed().len(), "typewriter stopped");
            return AnimationOutcome::Stopped;
        }

        writer.advance(options.chars_per_step);
        target.render(writer.revealed());
        steps += 1;
        tokio::time::sleep(options.speed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[derive(Default)]
    struct Recorder {
        frames: Vec<String>,
        stop_after: Option<(usize, StopHandle)>,
    }

    impl RenderTarget for Recorder {
        fn render(&mut self, markup: &str) {
            self.frames.push(markup.to_string());
            if let Some((n, handle)) = &self.stop_after {
                if self.frames.len() == *n {
                    handle.stop();
                }
            }
        }
    }

    fn fast() -> AnimationOptions {
        AnimationOptions {
            chars_per_step: 1,
            speed: Duration::ZERO,
        }
    }

    fn strip_tags(markup: &str) -> String {
        Regex::new(r"<[^>]*>").unwrap().replace_all(markup, "").into_owned()
    }

    #[test]
    fn test_tag_revealed_as_one_unit() {
        let mut writer = Typewriter::new("a<strong>b</strong>");
        writer.advance(1);
        assert_eq!(writer.revealed(), "a");
        writer.advance(1);
        assert_eq!(writer.revealed(), "a<strong>");
        writer.advance(1);
        assert_eq!(writer.revealed(), "a<strong>b");
        writer.advance(1);
        assert_eq!(writer.revealed(), "a<strong>b</strong>");
        assert!(writer.is_finished());
    }

    #[test]
    fn test_unclosed_angle_bracket_revealed_alone() {
        let mut writer = Typewriter::new("<abc");
        writer.advance(1);
        assert_eq!(writer.revealed(), "<");
    }

    #[test]
    fn test_multibyte_characters() {
        let mut writer = Typewriter::new("olá•");
        writer.advance(3);
        assert_eq!(writer.revealed(), "olá");
        writer.advance(5);
        assert_eq!(writer.revealed(), "olá•");
    }

    #[test]
    fn test_chars_per_step() {
        let mut writer = Typewriter::new("abcdef");
        writer.advance(4);
        assert_eq!(writer.revealed(), "abcd");
    }

    #[tokio::test]
    async fn test_every_frame_is_well_formed_prefix() {
        let markup = crate::markdown::render("**olá** `x`\n```rust\nlet a = \"b\";\n```");
        let mut target = Recorder::default();
        let outcome = animate(&mut target, &markup, fast(), &StopHandle::new()).await;

        assert_eq!(outcome, AnimationOutcome::Completed);
        assert_eq!(target.frames.last().map(String::as_str), Some(markup.as_str()));

        let final_text = strip_tags(&markup);
        for frame in &target.frames {
            assert!(final_text.starts_with(&strip_tags(frame)), "frame {:?}", frame);
            let opens = frame.matches('<').count();
            let closes = frame.matches('>').count();
            assert_eq!(opens, closes, "half-open tag in {:?}", frame);
        }
    }

    #[tokio::test]
    async fn test_stop_keeps_revealed_content() {
        let stop = StopHandle::new();
        let mut target = Recorder {
            frames: Vec::new(),
            stop_after: Some((3, stop.clone())),
        };
        let outcome = animate(&mut target, "abcdefgh", fast(), &stop).await;

        assert_eq!(outcome, AnimationOutcome::Stopped);
        assert_eq!(target.frames, vec!["a", "ab", "abc"]);
    }

    #[tokio::test]
    async fn test_stop_after_settled_has_no_effect() {
        let stop = StopHandle::new();
        let mut target = Recorder::default();
        let outcome = animate(&mut target, "ok", fast(), &stop).await;
        assert_eq!(outcome, AnimationOutcome::Completed);

        let frames_before = target.frames.clone();
        stop.stop();
        stop.stop();
        assert_eq!(target.frames, frames_before);
    }

    #[tokio::test]
    async fn test_stale_stop_is_reset_by_next_animation() {
        let stop = StopHandle::new();
        stop.stop();
        let mut target = Recorder::default();
        let outcome = animate(&mut target, "abc", fast(), &stop).await;
        assert_eq!(outcome, AnimationOutcome::Completed);
        assert_eq!(target.frames.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_markup_completes_without_frames() {
        let mut target = Recorder::default();
        let outcome = animate(&mut target, "", fast(), &StopHandle::new()).await;
        assert_eq!(outcome, AnimationOutcome::Completed);
        assert!(target.frames.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_speed_paces_steps() {
        let mut target = Recorder::default();
        let options = AnimationOptions {
            chars_per_step: 1,
            speed: Duration::from_millis(10),
        };
        let started = tokio::time::Instant::now();
        animate(&mut target, "abcd", options, &StopHandle::new()).await;
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
