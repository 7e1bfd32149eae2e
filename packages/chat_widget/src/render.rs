//! Plain-text presentation of the conversation. Markdown is printed as-is.

use std::io::Write;

use anyhow::Result;
use chat_protocol::TranscriptUpdate;

pub struct Renderer<W: Write> {
    out: W,
    agent_label: String,
    /// A reply line is open and chunks are being appended to it.
    line_open: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, company_name: &str) -> Self {
        Self {
            out,
            agent_label: format!("{company_name} AI Agent"),
            line_open: false,
        }
    }

    #[cfg(test)]
    pub fn writer(&self) -> &W {
        &self.out
    }

    pub fn introduction(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{}", text.trim())?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn thinking(&mut self) -> Result<()> {
        self.close_line()?;
        writeln!(self.out, "{} is typing...", self.agent_label)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn update(&mut self, update: &TranscriptUpdate) -> Result<()> {
        match update {
            TranscriptUpdate::ReplyStarted(chunk) => {
                self.close_line()?;
                write!(self.out, "{}: {}", self.agent_label, chunk)?;
                self.line_open = true;
            }
            TranscriptUpdate::ReplyExtended(chunk) => {
                write!(self.out, "{chunk}")?;
                self.line_open = true;
            }
            TranscriptUpdate::ReplyCompleted | TranscriptUpdate::StreamStopped => {
                self.close_line()?;
            }
            TranscriptUpdate::ErrorAppended(text) => {
                self.close_line()?;
                writeln!(self.out, "[error] {text}")?;
            }
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn suggestions(&mut self, questions: &[String]) -> Result<()> {
        if questions.is_empty() {
            return Ok(());
        }
        self.close_line()?;
        writeln!(self.out, "Suggested questions:")?;
        for (i, q) in questions.iter().enumerate() {
            writeln!(self.out, "  /{} {}", i + 1, q)?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn phone_form(&mut self) -> Result<()> {
        self.close_line()?;
        writeln!(
            self.out,
            "To enable our expert to help, please enter your contact number: /phone <10 digits>"
        )?;
        self.out.flush()?;
        Ok(())
    }

    pub fn notice(&mut self, text: &str) -> Result<()> {
        self.close_line()?;
        writeln!(self.out, "* {text}")?;
        self.out.flush()?;
        Ok(())
    }

    fn close_line(&mut self) -> Result<()> {
        if self.line_open {
            writeln!(self.out)?;
            self.line_open = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(r: &Renderer<Vec<u8>>) -> String {
        String::from_utf8(r.writer().clone()).unwrap()
    }

    #[test]
    fn test_streamed_reply_on_one_line() {
        let mut r = Renderer::new(Vec::new(), "Sobha");
        r.update(&TranscriptUpdate::ReplyStarted("Hel".into())).unwrap();
        r.update(&TranscriptUpdate::ReplyExtended("lo".into())).unwrap();
        r.update(&TranscriptUpdate::ReplyCompleted).unwrap();
        assert_eq!(rendered(&r), "Sobha AI Agent: Hello\n");
    }

    #[test]
    fn test_error_closes_open_line() {
        let mut r = Renderer::new(Vec::new(), "Apollo");
        r.update(&TranscriptUpdate::ReplyStarted("partial".into())).unwrap();
        r.update(&TranscriptUpdate::ErrorAppended("boom".into())).unwrap();
        assert_eq!(rendered(&r), "Apollo AI Agent: partial\n[error] boom\n");
    }

    #[test]
    fn test_suggestions_numbered_from_one() {
        let mut r = Renderer::new(Vec::new(), "X");
        r.suggestions(&["first".to_string(), "second".to_string()]).unwrap();
        assert_eq!(rendered(&r), "Suggested questions:\n  /1 first\n  /2 second\n");
    }

    #[test]
    fn test_empty_suggestions_print_nothing() {
        let mut r = Renderer::new(Vec::new(), "X");
        r.suggestions(&[]).unwrap();
        assert!(rendered(&r).is_empty());
    }
}
