//! `chat-widget ask`: a single question, answered on stdout.

use std::io::Write;

use anyhow::{Result, bail};
use chat_protocol::TurnPhase;
use chat_socket::ConnectionEvent;
use tokio::sync::mpsc;

use crate::session::{SendOutcome, WidgetSession};

pub async fn ask<W: Write>(
    mut session: WidgetSession<W>,
    mut events: mpsc::Receiver<ConnectionEvent>,
    question: &str,
) -> Result<()> {
    match session.send_user_message(question).await? {
        SendOutcome::Sent => {}
        SendOutcome::Ignored => bail!("Question is empty"),
        outcome => bail!("Could not reach the assistant ({outcome:?})"),
    }

    while session.assembler().status().streaming {
        match events.recv().await {
            Some(ConnectionEvent::GaveUp) | None => bail!("Connection to the assistant was lost"),
            Some(event) => session.handle_event(event)?,
        }
    }

    let phase = session.assembler().phase();
    session.shutdown().await;
    match phase {
        TurnPhase::Completed => Ok(()),
        TurnPhase::Errored => bail!("The assistant returned an error"),
        _ => bail!("The reply was interrupted"),
    }
}
