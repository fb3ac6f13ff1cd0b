use crate::config::{EmailerConfig, Stage};
use anyhow::Result;
use async_trait::async_trait;
use interfaces::Notifier;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::Tls;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use tracing::{debug, info};

/// Delivers documents over SMTP.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailerConfig,
}

impl SmtpNotifier {
    pub fn new(config: EmailerConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server).tls(Tls::None)
        };

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(config.username.clone(), config.password.clone()))
            .build();

        Ok(Self { transport, config })
    }

    pub fn build_message(&self, name: &str, address: &str, document: &str) -> Result<Message> {
        build_message(&self.config, name, address, document)
    }
}

/// Multipart message with the configured plain-text part and the HTML document.
pub fn build_message(config: &EmailerConfig, name: &str, address: &str, document: &str) -> Result<Message> {
    let from = Mailbox::new(Some(config.from_name.clone()), config.from_address.parse()?);
    let to = Mailbox::new(Some(name.to_string()), address.parse()?);

    let message = Message::builder()
        .from(from)
        .to(to)
        .subject(&config.subject)
        .multipart(MultiPart::alternative_plain_html(
            config.text_part.clone(),
            document.to_string(),
        ))?;
    Ok(message)
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, name: &str, address: &str, document: &str) -> Result<()> {
        let message = self.build_message(name, address, document)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to send email via SMTP: {}", e))?;
        info!("Sent digest to {}<{}>", name, address);
        Ok(())
    }
}

/// Logs documents instead of sending them; used outside production.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier {
    pub stage: Stage,
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn notify(&self, name: &str, address: &str, document: &str) -> Result<()> {
        info!(
            "Stage {:?}: not sending email to {}<{}>, content below",
            self.stage, name, address
        );
        debug!("{}", document);
        println!("{}", document);
        Ok(())
    }
}

/// Pick the notifier for a stage. Production requires SMTP settings in the environment.
pub fn construct_emailer(stage: Stage) -> Result<Arc<dyn Notifier>> {
    match stage {
        Stage::Production => Ok(Arc::new(SmtpNotifier::new(EmailerConfig::from_env()?)?)),
        Stage::Beta | Stage::Local => Ok(Arc::new(ConsoleNotifier { stage })),
    }
}
