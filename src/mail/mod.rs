//! # Email Delivery
//!
//! SMTP delivery of notification emails. Mail is relayed through
//! `mail.<domain>` on the standard port with no authentication, which is
//! how the sequencing farm's internal relay is reached; the sender is
//! `<user>@<domain>` where `<user>` comes from the `USER` environment
//! variable of the producing cron job.

use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, warn};

use crate::config::MailSection;
use crate::error::{NotifyError, NotifyResult};

/// Asynchronous mailer bound to one sending domain
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    domain: String,
}

impl std::fmt::Debug for Mailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailer")
            .field("domain", &self.domain)
            .finish()
    }
}

impl Mailer {
    /// Create a mailer relaying through `mail.<domain>`
    pub fn new(config: &MailSection) -> Self {
        // Plain SMTP: the relay is internal and does not offer TLS.
        let transport =
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(format!(
                "mail.{}",
                config.domain
            ))
            .build();

        Self {
            transport,
            domain: config.domain.clone(),
        }
    }

    /// The domain this mailer sends from
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Send a notification email to a list of contacts
    ///
    /// The subject, content and contact list must be non-empty. Contacts
    /// that fail address validation are dropped with a warning; if none
    /// survive, the send is an error. Delivery succeeds if the relay
    /// accepts the message for at least one recipient.
    pub async fn send(&self, contacts: &[String], subject: &str, content: &str) -> NotifyResult<()> {
        let message = self.compose(contacts, subject, content)?;

        debug!("Sending an email to {}", contacts.join(", "));
        let response = self.transport.send(message).await?;
        if !response.is_positive() {
            warn!(
                code = %response.code(),
                "Relay accepted the connection but did not confirm delivery"
            );
        }

        Ok(())
    }

    /// Build the notification message without sending it
    fn compose(&self, contacts: &[String], subject: &str, content: &str) -> NotifyResult<Message> {
        let user = std::env::var("USER")
            .map_err(|_| NotifyError::invalid_input("USER not set in the environment."))?;
        let sender: Mailbox = format!("{}@{}", user, self.domain).parse()?;

        compose_from(sender, contacts, subject, content)
    }
}

/// Build a notification message with an explicit sender
fn compose_from(
    sender: Mailbox,
    contacts: &[String],
    subject: &str,
    content: &str,
) -> NotifyResult<Message> {
    if subject.is_empty() {
        return Err(NotifyError::invalid_input("Email subject cannot be empty."));
    }
    if content.is_empty() {
        return Err(NotifyError::invalid_input("Email content cannot be empty."));
    }
    if contacts.is_empty() {
        return Err(NotifyError::invalid_input(
            "List of contacts cannot be empty.",
        ));
    }

    let validated: Vec<Mailbox> = contacts
        .iter()
        .filter_map(|address| address.parse::<Mailbox>().ok())
        .collect();
    if validated.len() != contacts.len() {
        warn!("Some contact emails are invalid in {}", contacts.join(", "));
    }
    if validated.is_empty() {
        return Err(NotifyError::invalid_input(format!(
            "All contact emails are invalid in {}",
            contacts.join(", ")
        )));
    }

    let mut builder = Message::builder().from(sender).subject(subject);
    for mailbox in validated {
        builder = builder.to(mailbox);
    }

    Ok(builder.body(content.to_string())?)
}
