//! Topic expertise derived from watch progress.
//!
//! Each episode contributes its highest reported percent; a topic's total is
//! the sum over its episodes. Levels only go up. Landing on `Recognized`
//! queues a one-shot completion notice; notices show one at a time and each
//! clears on dismissal or after a display timeout.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::{PipelineError, Result};
use crate::recommendations::EpisodeCatalog;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ExpertiseLevel {
    #[default]
    None,
    Exploring,
    Practitioner,
    Recognized,
}

/// Cumulative percent points needed for each level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExpertiseThresholds {
    pub exploring: u32,
    pub practitioner: u32,
    pub recognized: u32,
}

impl Default for ExpertiseThresholds {
    fn default() -> Self {
        Self {
            exploring: 1,
            practitioner: 100,
            recognized: 200,
        }
    }
}

impl ExpertiseThresholds {
    pub fn level_for(&self, total: u32) -> ExpertiseLevel {
        if total >= self.recognized {
            ExpertiseLevel::Recognized
        } else if total >= self.practitioner {
            ExpertiseLevel::Practitioner
        } else if total >= self.exploring {
            ExpertiseLevel::Exploring
        } else {
            ExpertiseLevel::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionNotice {
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelChange {
    pub topic: String,
    pub from: ExpertiseLevel,
    pub to: ExpertiseLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicExpertise {
    pub level: ExpertiseLevel,
    pub progress: u32,
}

#[derive(Default)]
struct TrackerState {
    /// Max percent seen per episode.
    progress: HashMap<String, u8>,
    levels: HashMap<String, ExpertiseLevel>,
    /// Topics whose completion has already been queued.
    announced: HashSet<String>,
    /// Completion notices in arrival order; the front one is showing.
    notices: VecDeque<(u64, CompletionNotice)>,
    next_seq: u64,
}

#[derive(Default)]
struct DismissTimer {
    token: Option<CancellationToken>,
    stopped: bool,
}

pub struct ExpertiseTracker {
    episodes: Arc<EpisodeCatalog>,
    thresholds: ExpertiseThresholds,
    display_for: Duration,
    state: Arc<Mutex<TrackerState>>,
    timer: Mutex<DismissTimer>,
}

impl ExpertiseTracker {
    pub fn new(
        episodes: Arc<EpisodeCatalog>,
        thresholds: ExpertiseThresholds,
        display_for: Duration,
    ) -> Self {
        Self {
            episodes,
            thresholds,
            display_for,
            state: Arc::new(Mutex::new(TrackerState::default())),
            timer: Mutex::new(DismissTimer::default()),
        }
    }

    /// Record watch progress for an episode and re-derive its topics' levels.
    ///
    /// Out-of-range percents are clamped to 0..=100. Returns the level
    /// changes this event caused, if any.
    pub fn update_progress(&self, episode_id: &str, percent: i32) -> Result<Vec<LevelChange>> {
        let episode = self
            .episodes
            .get(episode_id)
            .ok_or_else(|| PipelineError::UnknownEpisode(episode_id.to_string()))?;
        let percent = percent.clamp(0, 100) as u8;

        let mut changes = Vec::new();
        let mut queued = false;
        {
            let mut state = self.state.lock();
            let entry = state.progress.entry(episode.id.clone()).or_insert(0);
            if percent <= *entry {
                return Ok(changes);
            }
            *entry = percent;

            for topic in &episode.topics {
                let total = topic_total(&state.progress, &self.episodes, topic);
                let current = state.levels.get(topic).copied().unwrap_or_default();
                let derived = self.thresholds.level_for(total);
                if derived <= current {
                    continue;
                }
                state.levels.insert(topic.clone(), derived);
                log::info!(
                    "Expertise: {} moved {:?} -> {:?} ({} pts)",
                    topic,
                    current,
                    derived,
                    total
                );
                changes.push(LevelChange {
                    topic: topic.clone(),
                    from: current,
                    to: derived,
                });

                if derived == ExpertiseLevel::Recognized && state.announced.insert(topic.clone()) {
                    state.next_seq += 1;
                    let seq = state.next_seq;
                    state.notices.push_back((
                        seq,
                        CompletionNotice {
                            topic: topic.clone(),
                        },
                    ));
                    queued = true;
                }
            }
        }

        if queued {
            self.ensure_timer();
        }
        Ok(changes)
    }

    /// The completion notice currently showing, if any. Later completions
    /// wait behind it.
    pub fn recently_completed(&self) -> Option<CompletionNotice> {
        self.state
            .lock()
            .notices
            .front()
            .map(|(_, notice)| notice.clone())
    }

    /// Number of completion notices not yet cleared, including the showing one.
    pub fn pending_completions(&self) -> usize {
        self.state.lock().notices.len()
    }

    /// Clear the showing notice; the next queued one, if any, takes its place.
    pub fn dismiss(&self) {
        self.cancel_timer();
        self.state.lock().notices.pop_front();
        self.ensure_timer();
    }

    pub fn level(&self, topic: &str) -> ExpertiseLevel {
        self.state
            .lock()
            .levels
            .get(topic)
            .copied()
            .unwrap_or_default()
    }

    pub fn levels(&self) -> HashMap<String, ExpertiseLevel> {
        self.state.lock().levels.clone()
    }

    /// Max watched percent per episode.
    pub fn progress(&self) -> HashMap<String, u8> {
        self.state.lock().progress.clone()
    }

    /// Every topic with any progress, with its level and cumulative points.
    pub fn snapshot(&self) -> BTreeMap<String, TopicExpertise> {
        let state = self.state.lock();
        let mut out = BTreeMap::new();
        for episode_id in state.progress.keys() {
            let Some(episode) = self.episodes.get(episode_id) else {
                continue;
            };
            for topic in &episode.topics {
                if out.contains_key(topic) {
                    continue;
                }
                out.insert(
                    topic.clone(),
                    TopicExpertise {
                        level: state.levels.get(topic).copied().unwrap_or_default(),
                        progress: topic_total(&state.progress, &self.episodes, topic),
                    },
                );
            }
        }
        out
    }

    /// Stop auto-dismissal for good. Queued notices stay until dismissed.
    pub fn shutdown(&self) {
        let mut timer = self.timer.lock();
        timer.stopped = true;
        if let Some(token) = timer.token.take() {
            token.cancel();
        }
    }

    fn cancel_timer(&self) {
        if let Some(token) = self.timer.lock().token.take() {
            token.cancel();
        }
    }

    /// Start the auto-dismiss task unless one is already draining the queue.
    fn ensure_timer(&self) {
        let mut timer = self.timer.lock();
        if timer.stopped {
            return;
        }
        if timer.token.as_ref().is_some_and(|t| !t.is_cancelled()) {
            return;
        }
        let Some(first) = self.state.lock().notices.front().map(|(seq, _)| *seq) else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            log::debug!("Expertise: no runtime, completion notices wait for dismiss()");
            return;
        };

        let token = CancellationToken::new();
        timer.token = Some(token.clone());

        let state = Arc::clone(&self.state);
        let display_for = self.display_for;
        handle.spawn(async move {
            let mut showing = first;
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(display_for) => {}
                }
                let next = {
                    let mut state = state.lock();
                    if state.notices.front().map(|(seq, _)| *seq) == Some(showing) {
                        state.notices.pop_front();
                    }
                    let next = state.notices.front().map(|(seq, _)| *seq);
                    // Retire while holding the lock so a concurrent push
                    // sees a cancelled token and starts a fresh timer.
                    if next.is_none() {
                        token.cancel();
                    }
                    next
                };
                match next {
                    Some(seq) => showing = seq,
                    None => return,
                }
            }
        });
    }
}

impl Drop for ExpertiseTracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn topic_total(progress: &HashMap<String, u8>, episodes: &EpisodeCatalog, topic: &str) -> u32 {
    episodes
        .with_topic(topic)
        .map(|e| u32::from(progress.get(&e.id).copied().unwrap_or(0)))
        .sum()
}
