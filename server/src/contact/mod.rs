//! Contact form relay.

pub mod mailer;
pub mod routes;

pub use mailer::{LogMailer, MailError, Mailer, OutboundMail, SesMailer};
