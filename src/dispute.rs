//! Dispute episodes
//!
//! A [`DisputeCase`] lives for one episode: from the message that signalled a
//! dispute until the email is sent or the user goes back to chatting. It is
//! discarded, never archived.
//!
//! ```text
//! Collecting --draft--> Drafting --ok--> Previewing --confirm--> Sending --ok--> Sent
//!     ^                    |                 |                      |
//!     +------ failed ------+                 +<------- failed ------+
//! ```

use crate::error::ActionError;
use crate::services::OutgoingEmail;
use crate::state_machine::TransitionError;
use serde::{Deserialize, Serialize};

/// Assistant turn appended when a dispute episode starts
pub const DISPUTE_NOTICE: &str = "It sounds like you believe some information in this document \
is wrong. I can help you draft a formal dispute email to your bank. Please describe what is \
incorrect, then enter your email address and the bank's email address.";

/// Assistant turn appended once the dispute email has been sent
pub const SENT_CONFIRMATION: &str = "Your dispute email has been sent. Keep a copy for your \
records; the bank should acknowledge it and open an investigation.";

const DRAFT_TEMPLATE: &str = r"Write a formal email disputing inaccurate information in my credit report or bank statement.

Use exactly this structure:
1. The first line is the subject line, starting with 'Subject:'.
2. A formal greeting addressed to the bank's disputes department.
3. A clear statement of the information being disputed and why it is inaccurate.
4. A reference to my rights under the Fair Credit Reporting Act (15 U.S.C. 1681i), which requires the information to be investigated.
5. A request that the bank investigate and correct or remove the inaccurate information within 30 days, and confirm the outcome in writing.
6. A professional closing that includes my email address.

Output only the email.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStage {
    /// Gathering details and both email addresses
    Collecting,
    /// Draft request in flight
    Drafting,
    /// Draft shown to the user, waiting for confirmation
    Previewing,
    /// Send request in flight
    Sending,
    Sent,
}

/// How an episode ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    Sent,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// Partial update of the dispute form; `None` leaves a field as it is
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DisputeFieldsUpdate {
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub user_email: Option<String>,
    #[serde(default)]
    pub bank_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisputeCase {
    details: String,
    user_email: String,
    bank_email: String,
    draft: Option<EmailDraft>,
    sent: bool,
    stage: DisputeStage,
}

impl Default for DisputeCase {
    fn default() -> Self {
        Self::new()
    }
}

impl DisputeCase {
    pub fn new() -> Self {
        Self {
            details: String::new(),
            user_email: String::new(),
            bank_email: String::new(),
            draft: None,
            sent: false,
            stage: DisputeStage::Collecting,
        }
    }

    pub fn details(&self) -> &str {
        &self.details
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn bank_email(&self) -> &str {
        &self.bank_email
    }

    pub fn draft(&self) -> Option<&EmailDraft> {
        self.draft.as_ref()
    }

    pub fn stage(&self) -> DisputeStage {
        self.stage
    }

    #[cfg(test)]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    /// All three inputs are non-blank
    pub fn is_complete(&self) -> bool {
        [&self.details, &self.user_email, &self.bank_email]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    /// A request to the drafting or sending service is outstanding
    #[cfg(test)]
    pub fn is_in_flight(&self) -> bool {
        matches!(self.stage, DisputeStage::Drafting | DisputeStage::Sending)
    }

    /// Merge user input into the form. A change while previewing discards the
    /// draft, since it no longer matches the inputs.
    pub fn apply(&mut self, update: DisputeFieldsUpdate) -> Result<(), TransitionError> {
        match self.stage {
            DisputeStage::Collecting | DisputeStage::Previewing => {}
            DisputeStage::Drafting | DisputeStage::Sending => return Err(TransitionError::Busy),
            DisputeStage::Sent => return Err(TransitionError::DisputeClosed),
        }

        let mut changed = false;
        for (field, value) in [
            (&mut self.details, update.details),
            (&mut self.user_email, update.user_email),
            (&mut self.bank_email, update.bank_email),
        ] {
            let Some(value) = value else { continue };
            let value = value.trim();
            if field.as_str() != value {
                *field = value.to_string();
                changed = true;
            }
        }

        if changed && self.stage == DisputeStage::Previewing {
            self.draft = None;
            self.stage = DisputeStage::Collecting;
        }
        Ok(())
    }

    /// Enter `Drafting`, returning the prompt for the chat service.
    pub fn begin_draft(&mut self) -> Result<String, TransitionError> {
        match self.stage {
            DisputeStage::Collecting | DisputeStage::Previewing => {}
            DisputeStage::Drafting | DisputeStage::Sending => return Err(TransitionError::Busy),
            DisputeStage::Sent => return Err(TransitionError::DisputeClosed),
        }
        if !self.is_complete() {
            return Err(TransitionError::IncompleteDispute);
        }
        self.stage = DisputeStage::Drafting;
        Ok(draft_prompt(self))
    }

    pub fn draft_ready(&mut self, draft: EmailDraft) {
        self.draft = Some(draft);
        self.stage = DisputeStage::Previewing;
    }

    /// A failed re-draft keeps the draft the user already saw
    pub fn draft_failed(&mut self) {
        self.stage = if self.draft.is_some() {
            DisputeStage::Previewing
        } else {
            DisputeStage::Collecting
        };
    }

    /// Enter `Sending`, returning the email to hand to the sending service.
    pub fn begin_send(&mut self) -> Result<OutgoingEmail, TransitionError> {
        match self.stage {
            DisputeStage::Previewing => {}
            DisputeStage::Collecting => return Err(TransitionError::NoDraft),
            DisputeStage::Drafting | DisputeStage::Sending => return Err(TransitionError::Busy),
            DisputeStage::Sent => return Err(TransitionError::DisputeClosed),
        }
        let draft = self.draft.as_ref().ok_or(TransitionError::NoDraft)?;
        let email = OutgoingEmail {
            sender_email: self.user_email.clone(),
            receiver_email: self.bank_email.clone(),
            subject: draft.subject.clone(),
            body: draft.body.clone(),
            attachment: None,
        };
        self.stage = DisputeStage::Sending;
        Ok(email)
    }

    /// Back to `Previewing` with the draft untouched so the user can retry
    pub fn send_failed(&mut self) {
        self.stage = DisputeStage::Previewing;
    }

    pub fn mark_sent(&mut self) {
        self.sent = true;
        self.stage = DisputeStage::Sent;
    }
}

/// Build the single drafting request sent to the chat service.
pub fn draft_prompt(case: &DisputeCase) -> String {
    format!(
        "{DRAFT_TEMPLATE}\n\nDispute details:\n{}\n\nMy email address: {}\nBank email address: {}",
        case.details, case.user_email, case.bank_email
    )
}

/// Split a drafted email into subject and body.
///
/// The first non-blank line is the subject, minus a leading `Subject:` label
/// in any case; everything after it is the body. Both must be non-empty.
pub fn parse_draft(response: &str) -> Result<EmailDraft, ActionError> {
    let text = response.trim_start();
    if text.is_empty() {
        return Err(ActionError::Draft("the drafting service returned nothing".to_string()));
    }
    let (first_line, rest) = text.split_once('\n').unwrap_or((text, ""));
    let subject = strip_subject_label(first_line.trim()).trim();
    let body = rest.trim();

    if subject.is_empty() {
        return Err(ActionError::Draft("draft has no subject line".to_string()));
    }
    if body.is_empty() {
        return Err(ActionError::Draft("draft has no body".to_string()));
    }
    Ok(EmailDraft {
        subject: subject.to_string(),
        body: body.to_string(),
    })
}

fn strip_subject_label(line: &str) -> &str {
    const LABEL: &str = "subject:";
    line.get(..LABEL.len())
        .filter(|prefix| prefix.eq_ignore_ascii_case(LABEL))
        .and_then(|_| line.get(LABEL.len()..))
        .unwrap_or(line)
}
