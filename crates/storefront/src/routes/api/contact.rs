//! Contact form.
//!
//! Submissions are emailed to the store's admin mailbox with `Reply-To` set
//! to the sender so staff can answer from their mail client.

use std::sync::LazyLock;

use askama::Template;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use partsbin_core::Email;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::{ClientIp, RateLimitCategory};
use crate::services::email::{EmailError, OutgoingEmail, RenderedEmail};
use crate::state::AppState;

const MAX_NAME_LEN: usize = 100;
const MAX_SUBJECT_LEN: usize = 200;
const MAX_MESSAGE_LEN: usize = 5000;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap()
});

/// Contact form submission. Missing fields are reported as 400s.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactForm {
    pub name: Option<String>,
    pub email: Option<String>,
    pub subject: Option<String>,
    pub message: Option<String>,
}

/// A submission that passed validation, trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactSubmission {
    pub name: String,
    pub email: Email,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Template)]
#[template(path = "email/contact_message.html")]
struct ContactMessageHtml<'a> {
    store_name: &'a str,
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

#[derive(Template)]
#[template(path = "email/contact_message.txt")]
struct ContactMessageText<'a> {
    name: &'a str,
    email: &'a str,
    subject: &'a str,
    message: &'a str,
}

impl ContactForm {
    /// Check required fields, email shape and length caps.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BadRequest`] naming the first problem found.
    pub fn validate(self) -> Result<ContactSubmission> {
        let name = required(self.name)?;
        let email = required(self.email)?;
        let subject = required(self.subject)?;
        let message = required(self.message)?;

        if !EMAIL_PATTERN.is_match(&email) {
            return Err(AppError::BadRequest("Invalid email address".to_string()));
        }
        let email =
            Email::parse(&email).map_err(|_| AppError::BadRequest("Invalid email address".to_string()))?;

        for (field, value, max) in [
            ("Name", &name, MAX_NAME_LEN),
            ("Subject", &subject, MAX_SUBJECT_LEN),
            ("Message", &message, MAX_MESSAGE_LEN),
        ] {
            if value.chars().count() > max {
                return Err(AppError::BadRequest(format!(
                    "{field} must be at most {max} characters"
                )));
            }
        }

        Ok(ContactSubmission {
            name,
            email,
            subject,
            message,
        })
    }
}

fn required(value: Option<String>) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest("All fields are required".to_string()))
}

/// Render the staff-facing email for a submission.
fn render_contact_email(
    store_name: &str,
    submission: &ContactSubmission,
) -> std::result::Result<RenderedEmail, askama::Error> {
    let email = submission.email.as_str();
    Ok(RenderedEmail {
        subject: format!("Contact Form: {}", submission.subject),
        text: ContactMessageText {
            name: &submission.name,
            email,
            subject: &submission.subject,
            message: &submission.message,
        }
        .render()?,
        html: ContactMessageHtml {
            store_name,
            name: &submission.name,
            email,
            subject: &submission.subject,
            message: &submission.message,
        }
        .render()?,
    })
}

/// Submit the contact form.
///
/// POST /api/contact
#[instrument(skip_all, fields(client = %client))]
pub async fn submit(
    State(state): State<AppState>,
    client: ClientIp,
    payload: std::result::Result<Json<ContactForm>, JsonRejection>,
) -> Result<Json<ContactResponse>> {
    state
        .rate_limiter()
        .enforce(RateLimitCategory::Contact, &client)?;

    let Json(form) =
        payload.map_err(|_| AppError::BadRequest("Invalid request body".to_string()))?;
    let submission = form.validate()?;

    let store = &state.config().store;
    let rendered = render_contact_email(&store.name, &submission).map_err(EmailError::from)?;
    let message = OutgoingEmail::new(store.admin_mailbox.clone(), rendered)
        .reply_to(submission.email.clone());

    state.mailer().send(message).await?;
    tracing::info!("Contact message forwarded");

    Ok(Json(ContactResponse {
        success: true,
        message: "Thank you for your message. We'll get back to you soon.",
    }))
}
