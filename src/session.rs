//! Interactive reply session.
//!
//! A line-oriented state machine over the operator's terminal:
//!
//! ```text
//!   Listing ──select──▶ Selected ──generate──▶ Selected (draft kept)
//!      │  ▲                │  │
//!      │  └─invalid input  │  └──send──▶ Sent
//!      └──q──▶ Quit ◀──q───┘
//! ```
//!
//! Bad input never ends the session: an out-of-range or non-numeric
//! selection re-prompts, an unknown command prints guidance, and a failed
//! generate or send is reported and can be retried. End of input quits.

use std::io::{BufRead, Write};
use tracing::warn;

use crate::error::{Error, Result};
use crate::models::{Email, OutgoingReply};
use crate::traits::{Mailbox, ReplyGenerator};

/// Characters of the body shown when an email is opened.
pub const PREVIEW_CHARS: usize = 1000;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Sent,
    Quit,
    /// The inbox was empty.
    NoMail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Quit,
    /// Zero-based index into the listed emails.
    Index(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Generate,
    Send,
    Quit,
}

impl Command {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "generate" => Some(Command::Generate),
            "send" => Some(Command::Send),
            "quit" | "q" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Parse the operator's answer to the selection prompt (1-based).
pub fn parse_selection(input: &str, count: usize) -> Result<Selection> {
    let trimmed = input.trim().to_lowercase();
    if trimmed == "q" || trimmed == "quit" {
        return Ok(Selection::Quit);
    }
    match trimmed.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Ok(Selection::Index(n - 1)),
        _ => Err(Error::InvalidSelection {
            input: input.trim().to_string(),
            count,
        }),
    }
}

/// The first `max_chars` characters of `body`, with `...` if cut.
pub fn preview(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

enum State {
    Listing,
    Selected { index: usize, draft: Option<String> },
    Done(Outcome),
}

pub struct Session<'a> {
    mailbox: &'a dyn Mailbox,
    generator: &'a dyn ReplyGenerator,
    limit: usize,
}

impl<'a> Session<'a> {
    pub fn new(mailbox: &'a dyn Mailbox, generator: &'a dyn ReplyGenerator, limit: usize) -> Self {
        Self {
            mailbox,
            generator,
            limit,
        }
    }

    /// Fetch the latest emails and drive the prompt loop until it ends.
    pub async fn run<R: BufRead, W: Write>(&self, mut input: R, mut out: W) -> Result<Outcome> {
        let emails = self.mailbox.list_recent(self.limit).await?;
        if emails.is_empty() {
            writeln!(out, "No recent emails.")?;
            return Ok(Outcome::NoMail);
        }

        let mut state = State::Listing;
        loop {
            state = match state {
                State::Listing => self.listing(&emails, &mut input, &mut out)?,
                State::Selected { index, draft } => {
                    self.selected(&emails[index], index, draft, &mut input, &mut out)
                        .await?
                }
                State::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn listing<R: BufRead, W: Write>(
        &self,
        emails: &[Email],
        input: &mut R,
        out: &mut W,
    ) -> Result<State> {
        writeln!(out, "\nLatest emails:")?;
        for (i, email) in emails.iter().enumerate() {
            writeln!(out, "{}. {}   [{}]", i + 1, email.subject, email.sender)?;
        }
        write!(out, "\nSelect email number to open (or 'q' to quit): ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(State::Done(Outcome::Quit));
        };

        match parse_selection(&line, emails.len()) {
            Ok(Selection::Quit) => Ok(State::Done(Outcome::Quit)),
            Ok(Selection::Index(index)) => {
                show_email(&emails[index], out)?;
                Ok(State::Selected { index, draft: None })
            }
            Err(e) => {
                writeln!(out, "{}", e)?;
                Ok(State::Listing)
            }
        }
    }

    async fn selected<R: BufRead, W: Write>(
        &self,
        email: &Email,
        index: usize,
        mut draft: Option<String>,
        input: &mut R,
        out: &mut W,
    ) -> Result<State> {
        write!(out, "\nCommand [generate/send/quit]: ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(State::Done(Outcome::Quit));
        };

        match Command::parse(&line) {
            Some(Command::Generate) => {
                if let Some(text) = self.draft(email, out).await? {
                    writeln!(out, "\nDraft reply:\n{}\n{}\n{}", "-".repeat(50), text, "-".repeat(50))?;
                    draft = Some(text);
                }
            }
            Some(Command::Send) => {
                if draft.is_none() {
                    writeln!(out, "No draft found, generating one now...")?;
                    draft = self.draft(email, out).await?;
                }
                if let Some(body) = draft.as_deref() {
                    let reply = OutgoingReply::for_email(email, body);
                    match self.mailbox.send_reply(&reply).await {
                        Ok(()) => {
                            writeln!(out, "Reply sent!")?;
                            return Ok(State::Done(Outcome::Sent));
                        }
                        Err(e) => {
                            warn!(error = %e, "send failed");
                            writeln!(out, "{}. The draft is kept; try 'send' again.", e)?;
                        }
                    }
                }
            }
            Some(Command::Quit) => return Ok(State::Done(Outcome::Quit)),
            None => writeln!(out, "Unknown command. Use generate, send, or quit.")?,
        }

        Ok(State::Selected { index, draft })
    }

    /// Generate a draft, reporting failure to the operator instead of failing.
    async fn draft<W: Write>(&self, email: &Email, out: &mut W) -> Result<Option<String>> {
        match self.generator.generate_reply(&email.body).await {
            Ok(text) => Ok(Some(text)),
            Err(e) => {
                warn!(error = %e, "draft generation failed");
                writeln!(out, "{}. Try again with 'generate'.", e)?;
                Ok(None)
            }
        }
    }
}

fn show_email<W: Write>(email: &Email, out: &mut W) -> Result<()> {
    writeln!(out, "\n{}", "=".repeat(60))?;
    writeln!(out, "Subject: {}", email.subject)?;
    writeln!(out, "From   : {}\n", email.sender)?;
    writeln!(out, "{}", preview(&email.body, PREVIEW_CHARS))?;
    writeln!(out, "{}", "=".repeat(60))?;
    Ok(())
}

/// Next input line, or `None` at end of input.
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}
