use anyhow::Context;
use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    app::loggable_path,
    config::{MailConfig, SmtpConfig},
};

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a password reset link. An `Err` means the link never left.
    async fn send_password_reset(&self, to: &str, name: &str, reset_url: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpConfig, from: &str) -> anyhow::Result<Self> {
        let builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .context("smtp relay")?
            .port(smtp.port);
        let builder = match (&smtp.username, &smtp.password) {
            (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
            _ => builder,
        };
        Ok(Self {
            transport: builder.build(),
            from: from.parse().context("parse MAIL_FROM")?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_password_reset(&self, to: &str, name: &str, reset_url: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.clone())
            .to(to.parse().context("parse recipient")?)
            .subject("Your password reset token (valid for 10 min)")
            .header(ContentType::TEXT_PLAIN)
            .body(reset_text(name, reset_url))
            .context("build reset email")?;
        self.transport.send(email).await.context("smtp send")?;
        tracing::info!(to = %to, "password reset email sent");
        Ok(())
    }
}

/// Used when no SMTP relay is configured. Only the recipient and the blanked
/// link reach the log, so the reset token is never written anywhere.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_password_reset(&self, to: &str, _name: &str, reset_url: &str) -> anyhow::Result<()> {
        let link = loggable_path(reset_url);
        tracing::warn!(to = %to, link = %link, "SMTP not configured, reset email not delivered");
        Ok(())
    }
}

pub fn from_config(config: &MailConfig) -> anyhow::Result<Box<dyn Mailer>> {
    Ok(match &config.smtp {
        Some(smtp) => Box::new(SmtpMailer::new(smtp, &config.from)?),
        None => Box::new(LogMailer),
    })
}

fn reset_text(name: &str, reset_url: &str) -> String {
    let first_name = name.split_whitespace().next().unwrap_or(name);
    format!(
        "Hi {first_name},\n\n\
         Forgot your password? Submit a PATCH request with your new password and \
         passwordConfirm to: {reset_url}\n\n\
         If you didn't forget your password, please ignore this email."
    )
}

#[cfg(test)]
pub use fakes::RecordingMailer;


#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;

    #[test]
    fn reset_text_greets_by_first_name() {
        let text = reset_text("Jonas Schmedtmann", "http://x/reset/abc");
        assert!(text.starts_with("Hi Jonas,"));
        assert!(text.contains("http://x/reset/abc"));
    }

    #[tokio::test]
    async fn log_mailer_never_fails() {
        LogMailer
            .send_password_reset("a@b.io", "A", "http://x")
            .await
            .expect("log mailer is infallible");
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_mailer_keeps_reset_token_out_of_logs() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        LogMailer
            .send_password_reset("a@b.io", "A", "http://x/api/v1/users/resetPassword/deadbeef42")
            .await
            .unwrap();

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("a@b.io"));
        assert!(logged.contains("resetPassword/***"));
        assert!(!logged.contains("deadbeef42"));
    }

    #[test]
    fn config_without_smtp_uses_log_mailer() {
        let cfg = MailConfig { from: "Natours <a@b.io>".into(), smtp: None };
        assert!(from_config(&cfg).is_ok());
    }
}
