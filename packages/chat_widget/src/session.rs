//! One mounted widget: transcript, socket, suggestions and the phone form.
//!
//! Everything runs on a single task. Inbound frames, user input and UI
//! timers are multiplexed with `tokio::select!`, so frames are applied in
//! exactly the order the socket delivered them.

use std::io::Write;

use anyhow::{Context, Result};
use chat_protocol::{LeadSubmission, Message, OutboundFrame, StreamAssembler, TranscriptUpdate};
use chat_socket::{ConnectionEvent, ConnectionHandle, ConnectionManager};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, WidgetConfig};
use crate::lead::{LeadClient, LeadGate, validate_phone};
use crate::render::Renderer;
use crate::suggestions::Suggestions;

const HELP: &str = "Type a question and press Enter. /<n> asks suggestion n, \
/phone <number> shares your contact number, /quit leaves.";

/// A line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Message(String),
    /// Zero-based index into the visible suggestions.
    Suggestion(usize),
    Phone(String),
    Help,
    Quit,
}

impl Command {
    /// `None` for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Some(Self::Message(trimmed.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let command = match name {
            "quit" | "exit" => Self::Quit,
            "phone" => Self::Phone(arg.to_string()),
            n => match n.parse::<usize>() {
                Ok(i) if i > 0 => Self::Suggestion(i - 1),
                _ => Self::Help,
            },
        };
        Some(command)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// Blank input.
    Ignored,
    /// A reply is still streaming.
    Busy,
    /// The socket did not open in time.
    NotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct WidgetSession<W: Write> {
    config: WidgetConfig,
    connection: ConnectionConfig,
    guest_id: String,
    handle: ConnectionHandle,
    assembler: StreamAssembler,
    suggestions: Suggestions,
    lead: LeadGate,
    lead_client: LeadClient,
    renderer: Renderer<W>,
}

impl<W: Write> WidgetSession<W> {
    /// Mount the widget: seed the transcript and open the socket.
    pub fn connect(
        config: WidgetConfig,
        connection: ConnectionConfig,
        questions: Vec<String>,
        guest_id: String,
        out: W,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (handle, events) =
            ConnectionManager::spawn(config.chat_url.clone(), connection.backoff);
        let session = Self {
            assembler: StreamAssembler::new(config.introduction_text.clone()),
            suggestions: Suggestions::new(questions, config.show_number_of_questions),
            lead: LeadGate::new(config.collect_mobile_after_number_of_question),
            lead_client: LeadClient::new(config.phone_submit_url.clone()),
            renderer: Renderer::new(out, &config.company_name),
            config,
            connection,
            guest_id,
            handle,
        };
        (session, events)
    }

    pub fn assembler(&self) -> &StreamAssembler {
        &self.assembler
    }

    pub fn suggestions(&self) -> &Suggestions {
        &self.suggestions
    }

    pub fn lead(&self) -> &LeadGate {
        &self.lead
    }

    #[cfg(test)]
    pub fn renderer(&self) -> &Renderer<W> {
        &self.renderer
    }

    /// Print the introduction and the initial suggestions.
    pub fn start(&mut self) -> Result<()> {
        self.renderer.introduction(&self.config.introduction_text)?;
        self.renderer.notice(&self.config.input_placeholder)?;
        self.renderer.suggestions(self.suggestions.visible())?;
        Ok(())
    }

    pub async fn send_user_message(&mut self, text: &str) -> Result<SendOutcome> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(SendOutcome::Ignored);
        }
        if self.refuse_if_busy()? {
            return Ok(SendOutcome::Busy);
        }

        let frame = self.outbound(text);
        let sent = match self
            .handle
            .wait_for_connection(self.connection.wait_timeout, self.connection.poll_interval)
            .await
        {
            Ok(()) => self.handle.send(&frame),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!(error = %e, "message not sent");
            self.renderer
                .notice("Still connecting to the assistant, please try again in a moment.")?;
            return Ok(SendOutcome::NotReady);
        }

        debug!(user_id = %self.guest_id, "user message sent");
        self.assembler.begin_turn(text);
        self.renderer.thinking()?;
        self.sync(Instant::now());
        Ok(SendOutcome::Sent)
    }

    pub async fn pick_suggestion(&mut self, index: usize) -> Result<SendOutcome> {
        if self.refuse_if_busy()? {
            return Ok(SendOutcome::Busy);
        }
        match self.suggestions.pick(index) {
            Some(question) => self.send_user_message(&question).await,
            None => {
                self.renderer.notice("No such suggestion.")?;
                Ok(SendOutcome::Ignored)
            }
        }
    }

    /// Validate the number, send it as a chat message and post the lead.
    /// Returns the background submission task when one was started.
    pub async fn submit_phone(&mut self, input: &str) -> Result<Option<JoinHandle<()>>> {
        if !self.lead.is_visible() {
            self.renderer.notice("The contact form is not available right now.")?;
            return Ok(None);
        }
        let phone = match validate_phone(input) {
            Ok(phone) => phone,
            Err(e) => {
                self.renderer.notice(&e.to_string())?;
                return Ok(None);
            }
        };

        let phone_message = format!("My phone number is {phone}");
        let outcome = self.send_user_message(&phone_message).await?;

        let mut chat_history = self.assembler.transcript().clone();
        if outcome != SendOutcome::Sent {
            chat_history.push(Message::user(phone_message));
        }
        let lead = LeadSubmission {
            agent_key: self.config.agent_key.clone(),
            agent_name: self.config.agent_name.clone(),
            mobile: phone,
            project_name: self.config.project_name.clone(),
            page_url: self.config.page_url.clone(),
            chat_history,
        };
        info!(agent_key = %lead.agent_key, "submitting lead");
        let task = self.lead_client.submit_in_background(lead);

        self.lead.mark_submitted();
        Ok(Some(task))
    }

    pub fn handle_event(&mut self, event: ConnectionEvent) -> Result<()> {
        match event {
            ConnectionEvent::Opened => debug!("assistant connected"),
            ConnectionEvent::Message(text) => {
                for update in self.assembler.apply_raw(&text) {
                    self.renderer.update(&update)?;
                }
            }
            ConnectionEvent::Error(e) => {
                warn!(error = %e, "connection error");
                self.interrupt_turn()?;
            }
            ConnectionEvent::Closed { code, reason } => {
                // A closed socket will never finish the reply, so clear the indicators too.
                debug!(code = ?code, reason = %reason, "connection closed");
                self.interrupt_turn()?;
            }
            ConnectionEvent::ReconnectScheduled { attempt, delay } => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            }
            ConnectionEvent::GaveUp => {
                self.renderer
                    .notice("Unable to reach the assistant. Please try again later.")?;
            }
        }
        self.sync(Instant::now());
        Ok(())
    }

    /// Reveal suggestions or the phone form whose delay has elapsed.
    pub fn poll_timers(&mut self, now: Instant) -> Result<()> {
        if self.suggestions.poll(now) {
            self.renderer.suggestions(self.suggestions.visible())?;
        }
        if self.lead.poll(now) {
            self.renderer.phone_form()?;
        }
        Ok(())
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.suggestions.deadline(), self.lead.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub async fn handle_command(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Message(text) => {
                self.send_user_message(&text).await?;
            }
            Command::Suggestion(index) => {
                self.pick_suggestion(index).await?;
            }
            Command::Phone(number) => {
                self.submit_phone(&number).await?;
            }
            Command::Help => self.renderer.notice(HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Unmount: cancel any pending reconnect and close the socket.
    pub async fn shutdown(self) {
        self.handle.shutdown().await;
    }

    fn refuse_if_busy(&mut self) -> Result<bool> {
        let status = self.assembler.status();
        let busy = status.streaming || status.thinking;
        if busy {
            self.renderer
                .notice("Please wait for the current reply to finish.")?;
        }
        Ok(busy)
    }

    fn interrupt_turn(&mut self) -> Result<()> {
        if self.assembler.status().streaming {
            self.assembler.interrupt();
            self.renderer.update(&TranscriptUpdate::StreamStopped)?;
        }
        Ok(())
    }

    fn sync(&mut self, now: Instant) {
        let streaming = self.assembler.status().streaming;
        self.suggestions
            .sync(now, streaming, self.assembler.transcript());
        self.lead.sync(now, streaming, self.assembler.transcript());
    }

    fn outbound(&self, text: &str) -> OutboundFrame {
        OutboundFrame {
            user_input: text.to_string(),
            user_id: self.guest_id.clone(),
            agent_key: self.config.agent_key.clone(),
            agent_name: self.config.agent_name.clone(),
            project_name: self.config.project_name.clone(),
            page_url: self.config.page_url.clone(),
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Interactive loop: read commands from `input` until EOF or `/quit`.
pub async fn run<W, R>(
    mut session: WidgetSession<W>,
    mut events: mpsc::Receiver<ConnectionEvent>,
    input: R,
) -> Result<()>
where
    W: Write,
    R: AsyncBufRead + Unpin,
{
    session.start()?;
    let mut lines = input.lines();

    loop {
        let deadline = session.next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read input")? else {
                    break;
                };
                let Some(command) = Command::parse(&line) else {
                    continue;
                };
                if session.handle_command(command).await? == Flow::Quit {
                    break;
                }
            }
            Some(event) = events.recv() => session.handle_event(event)?,
            () = sleep_until(deadline) => session.poll_timers(Instant::now())?,
        }
    }

    session.shutdown().await;
    Ok(())
}
