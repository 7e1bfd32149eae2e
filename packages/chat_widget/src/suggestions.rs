//! Suggested questions shown under the conversation.

use std::collections::HashSet;
use std::time::Duration;

use chat_protocol::{Role, Transcript};
use tokio::time::Instant;

use crate::config::QuestionsFileConfig;

/// Delay between a reply finishing and new suggestions appearing.
pub const REVEAL_DELAY: Duration = Duration::from_secs(2);

/// The question pool for a page: the first project whose URL appears in
/// `page_url`, otherwise the default list.
pub fn questions_for_page(questions: &QuestionsFileConfig, page_url: &str) -> Vec<String> {
    questions
        .projects
        .iter()
        .find(|p| !p.url.is_empty() && page_url.contains(&p.url))
        .map(|p| p.questions.clone())
        .unwrap_or_else(|| questions.default.clone())
}

#[derive(Debug)]
pub struct Suggestions {
    pool: Vec<String>,
    limit: usize,
    used: HashSet<String>,
    visible: Vec<String>,
    reveal_at: Option<Instant>,
    was_streaming: bool,
}

impl Suggestions {
    pub fn new(pool: Vec<String>, limit: usize) -> Self {
        let visible = pool.iter().take(limit).cloned().collect();
        Self {
            pool,
            limit,
            used: HashSet::new(),
            visible,
            reveal_at: None,
            was_streaming: false,
        }
    }

    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.reveal_at
    }

    /// Track streaming edges: hide on start, schedule a refresh on stop.
    pub fn sync(&mut self, now: Instant, streaming: bool, transcript: &Transcript) {
        if streaming {
            self.visible.clear();
            self.reveal_at = None;
        } else if self.was_streaming && transcript.has_role(Role::Assistant) {
            self.reveal_at = Some(now + REVEAL_DELAY);
        }
        self.was_streaming = streaming;
    }

    /// Reveal pending suggestions. Returns true when the visible set changed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.reveal_at {
            Some(at) if at <= now => {
                self.reveal_at = None;
                self.visible = self
                    .pool
                    .iter()
                    .filter(|q| !self.used.contains(*q))
                    .take(self.limit)
                    .cloned()
                    .collect();
                !self.visible.is_empty()
            }
            _ => false,
        }
    }

    /// Take the visible suggestion at `index` and mark it used.
    pub fn pick(&mut self, index: usize) -> Option<String> {
        let question = self.visible.get(index)?.clone();
        self.used.insert(question.clone());
        Some(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectQuestions;
    use chat_protocol::{InboundFrame, StreamAssembler};

    fn pool() -> Vec<String> {
        ["a", "b", "c", "d", "e"].iter().map(|s| s.to_string()).collect()
    }

    fn answered() -> StreamAssembler {
        let mut a = StreamAssembler::new("intro");
        a.begin_turn("a");
        a.apply(&InboundFrame::chunk("answer"));
        a.apply(&InboundFrame::end());
        a
    }

    #[test]
    fn test_questions_for_page_prefers_project() {
        let questions = QuestionsFileConfig {
            default: vec!["generic".into()],
            projects: vec![
                ProjectQuestions {
                    name: "Daxin Vistas".into(),
                    url: "https://daxinvistas.example.com".into(),
                    questions: vec!["daxin".into()],
                },
                ProjectQuestions {
                    name: "Titanium".into(),
                    url: "https://example.com".into(),
                    questions: vec!["titanium".into()],
                },
            ],
        };
        assert_eq!(
            questions_for_page(&questions, "https://daxinvistas.example.com/floor-plans"),
            vec!["daxin".to_string()]
        );
        assert_eq!(
            questions_for_page(&questions, "https://example.com/spr"),
            vec!["titanium".to_string()]
        );
        assert_eq!(
            questions_for_page(&questions, "https://other.test/"),
            vec!["generic".to_string()]
        );
    }

    #[test]
    fn test_initial_visible_respects_limit() {
        let s = Suggestions::new(pool(), 3);
        assert_eq!(s.visible(), &["a", "b", "c"]);
        let none = Suggestions::new(pool(), 0);
        assert!(none.visible().is_empty());
    }

    #[test]
    fn test_cleared_while_streaming() {
        let mut s = Suggestions::new(pool(), 3);
        let a = StreamAssembler::new("intro");
        s.sync(Instant::now(), true, a.transcript());
        assert!(s.visible().is_empty());
        assert!(s.deadline().is_none());
    }

    #[test]
    fn test_reveals_unused_after_delay() {
        let start = Instant::now();
        let mut s = Suggestions::new(pool(), 3);
        assert_eq!(s.pick(0).as_deref(), Some("a"));

        let a = answered();
        s.sync(start, true, a.transcript());
        s.sync(start, false, a.transcript());
        assert_eq!(s.deadline(), Some(start + REVEAL_DELAY));

        assert!(!s.poll(start + Duration::from_millis(1999)));
        assert!(s.visible().is_empty());

        assert!(s.poll(start + REVEAL_DELAY));
        assert_eq!(s.visible(), &["b", "c", "d"]);
        assert!(s.deadline().is_none());
    }

    #[test]
    fn test_no_reveal_without_assistant_reply() {
        let start = Instant::now();
        let mut s = Suggestions::new(pool(), 3);
        let mut a = StreamAssembler::new("intro");
        a.begin_turn("q");
        s.sync(start, true, a.transcript());
        a.apply(&InboundFrame::error("boom"));
        s.sync(start, false, a.transcript());
        assert!(s.deadline().is_none());
    }

    #[test]
    fn test_streaming_again_cancels_reveal() {
        let start = Instant::now();
        let mut s = Suggestions::new(pool(), 3);
        let a = answered();
        s.sync(start, true, a.transcript());
        s.sync(start, false, a.transcript());
        s.sync(start + Duration::from_secs(1), true, a.transcript());
        assert!(!s.poll(start + Duration::from_secs(10)));
        assert!(s.visible().is_empty());
    }

    #[test]
    fn test_pick_out_of_range() {
        let mut s = Suggestions::new(pool(), 2);
        assert!(s.pick(2).is_none());
    }
}
