//! Phone-number lead capture: when to ask, how to validate, where to post.

use std::time::Duration;

use chat_protocol::{LeadSubmission, Role, Transcript};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info};

/// Delay between a reply finishing and the phone form appearing.
pub const REVEAL_DELAY: Duration = Duration::from_secs(3);

pub const PHONE_DIGITS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum LeadError {
    #[error("Please enter a valid 10-digit mobile number")]
    InvalidPhone,

    #[error("lead request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("lead endpoint returned {0}")]
    Rejected(reqwest::StatusCode),
}

/// Keep digits only, capped at the form's maximum length.
pub fn sanitize_phone(input: &str) -> String {
    input
        .chars()
        .filter(char::is_ascii_digit)
        .take(PHONE_DIGITS)
        .collect()
}

pub fn validate_phone(input: &str) -> Result<String, LeadError> {
    let digits = sanitize_phone(input);
    if digits.len() != PHONE_DIGITS {
        return Err(LeadError::InvalidPhone);
    }
    Ok(digits)
}

/// Decides when the phone form is shown.
#[derive(Debug)]
pub struct LeadGate {
    threshold: usize,
    requirements_met: bool,
    submitted: bool,
    visible: bool,
    reveal_at: Option<Instant>,
}

impl LeadGate {
    /// `threshold` assistant replies (and one fewer user messages) unlock the form.
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            requirements_met: false,
            submitted: false,
            visible: false,
            reveal_at: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.reveal_at
    }

    pub fn sync(&mut self, now: Instant, streaming: bool, transcript: &Transcript) {
        if self.submitted {
            return;
        }

        if !self.requirements_met {
            let assistant = transcript.count_role(Role::Assistant);
            let user = transcript.count_role(Role::User);
            if assistant >= self.threshold && user >= self.threshold.saturating_sub(1) {
                self.requirements_met = true;
            }
        }

        if streaming {
            self.visible = false;
            self.reveal_at = None;
        } else if self.requirements_met && !self.visible && self.reveal_at.is_none() {
            self.reveal_at = Some(now + REVEAL_DELAY);
        }
    }

    /// Show the form once its delay has passed. Returns true when it appears.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.reveal_at {
            Some(at) if at <= now && !self.submitted => {
                self.reveal_at = None;
                self.visible = true;
                true
            }
            _ => false,
        }
    }

    /// Hide the form for good.
    pub fn mark_submitted(&mut self) {
        self.submitted = true;
        self.visible = false;
        self.reveal_at = None;
    }
}

/// Posts captured leads to the configured endpoint.
#[derive(Debug, Clone)]
pub struct LeadClient {
    http: reqwest::Client,
    url: String,
}

impl LeadClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub async fn submit(&self, lead: &LeadSubmission) -> Result<(), LeadError> {
        let resp = self.http.post(&self.url).json(lead).send().await?;
        if !resp.status().is_success() {
            return Err(LeadError::Rejected(resp.status()));
        }
        Ok(())
    }

    /// Fire-and-forget: failures are logged, never retried or surfaced.
    pub fn submit_in_background(&self, lead: LeadSubmission) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            match client.submit(&lead).await {
                Ok(()) => info!(agent_key = %lead.agent_key, "lead submitted"),
                Err(e) => error!(url = %client.url, error = %e, "failed to submit phone + history"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_protocol::{InboundFrame, StreamAssembler};

    /// Run `turns` complete question/answer cycles.
    fn conversation(turns: usize) -> StreamAssembler {
        let mut a = StreamAssembler::new("intro");
        for i in 0..turns {
            a.begin_turn(format!("q{i}"));
            a.apply(&InboundFrame::chunk(format!("a{i}")));
            a.apply(&InboundFrame::end());
        }
        a
    }

    #[test]
    fn test_sanitize_phone() {
        assert_eq!(sanitize_phone("98765-43210"), "9876543210");
        assert_eq!(sanitize_phone("+91 98765 43210 99"), "9198765432");
        assert_eq!(sanitize_phone("abc"), "");
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("9876543210").unwrap(), "9876543210");
        assert!(matches!(
            validate_phone("12345"),
            Err(LeadError::InvalidPhone)
        ));
        assert_eq!(
            LeadError::InvalidPhone.to_string(),
            "Please enter a valid 10-digit mobile number"
        );
    }

    #[test]
    fn test_gate_waits_for_threshold() {
        let now = Instant::now();
        let mut gate = LeadGate::new(3);
        gate.sync(now, false, conversation(2).transcript());
        assert!(gate.deadline().is_none());

        gate.sync(now, false, conversation(3).transcript());
        assert_eq!(gate.deadline(), Some(now + REVEAL_DELAY));
        assert!(!gate.poll(now + Duration::from_secs(2)));
        assert!(gate.poll(now + REVEAL_DELAY));
        assert!(gate.is_visible());
    }

    #[test]
    fn test_gate_user_count_is_one_less() {
        // Three replies to two questions (e.g. a reply split by an error).
        let mut a = StreamAssembler::new("intro");
        a.begin_turn("q0");
        a.apply(&InboundFrame::chunk("a0"));
        a.apply(&InboundFrame::end());
        a.apply(&InboundFrame::chunk("a1"));
        a.apply(&InboundFrame::end());
        a.begin_turn("q1");
        a.apply(&InboundFrame::chunk("a2"));
        a.apply(&InboundFrame::end());

        let now = Instant::now();
        let mut gate = LeadGate::new(3);
        gate.sync(now, false, a.transcript());
        assert!(gate.deadline().is_some());
    }

    #[test]
    fn test_gate_hidden_while_streaming() {
        let now = Instant::now();
        let mut gate = LeadGate::new(1);
        let a = conversation(1);
        gate.sync(now, false, a.transcript());
        assert!(gate.poll(now + REVEAL_DELAY));

        gate.sync(now, true, a.transcript());
        assert!(!gate.is_visible());
        assert!(gate.deadline().is_none());

        // Requirement stays met; reappears after the next reply.
        let later = now + Duration::from_secs(10);
        gate.sync(later, false, a.transcript());
        assert_eq!(gate.deadline(), Some(later + REVEAL_DELAY));
    }

    #[test]
    fn test_gate_never_returns_after_submit() {
        let now = Instant::now();
        let mut gate = LeadGate::new(1);
        let a = conversation(1);
        gate.sync(now, false, a.transcript());
        gate.poll(now + REVEAL_DELAY);
        gate.mark_submitted();

        gate.sync(now, true, a.transcript());
        gate.sync(now, false, conversation(5).transcript());
        assert!(!gate.poll(now + Duration::from_secs(60)));
        assert!(!gate.is_visible());
        assert!(gate.is_submitted());
    }

    #[test]
    fn test_zero_threshold_unlocks_immediately() {
        let now = Instant::now();
        let mut gate = LeadGate::new(0);
        gate.sync(now, false, &Transcript::seeded("intro"));
        assert!(gate.deadline().is_some());
    }

    // ── LeadClient ──────────────────────────────────────────────────────

    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use serde_json::Value;
    use tokio::sync::mpsc;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/api/mobile")
    }

    fn sample_lead() -> LeadSubmission {
        LeadSubmission {
            agent_key: "apollo".into(),
            agent_name: "Apollo Tyres AI Assistant".into(),
            mobile: "9876543210".into(),
            project_name: "Apollo Tyres Details".into(),
            page_url: "https://example.com/".into(),
            chat_history: conversation(1).transcript().clone(),
        }
    }

    #[tokio::test]
    async fn test_submit_posts_json_body() {
        let (tx, mut rx) = mpsc::channel::<Value>(1);
        let app = Router::new()
            .route(
                "/api/mobile",
                post(
                    |State(tx): State<mpsc::Sender<Value>>, Json(body): Json<Value>| async move {
                        tx.send(body).await.unwrap();
                        "ok"
                    },
                ),
            )
            .with_state(tx);
        let url = serve(app).await;

        LeadClient::new(url).submit(&sample_lead()).await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["agent_key"], "apollo");
        assert_eq!(body["mobile"], "9876543210");
        assert_eq!(body["chatHistory"].as_array().unwrap().len(), 3);
        assert_eq!(body["chatHistory"][2]["completed"], true);
    }

    #[tokio::test]
    async fn test_submit_reports_rejection() {
        let app = Router::new().route(
            "/api/mobile",
            post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
        );
        let url = serve(app).await;

        let err = LeadClient::new(url).submit(&sample_lead()).await.unwrap_err();
        assert!(matches!(err, LeadError::Rejected(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_background_submit_swallows_failure() {
        // Nothing listens on this port.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/mobile", listener.local_addr().unwrap());
        drop(listener);

        let task = LeadClient::new(url).submit_in_background(sample_lead());
        task.await.unwrap();
    }
}
