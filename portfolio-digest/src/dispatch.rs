use crate::types::ContentBundle;
use interfaces::{Notifier, Renderer};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Render and deliver bundles until the assembler closes the queue.
///
/// A failure for one recipient is logged and the loop moves on.
pub async fn dispatch_bundles(
    mut bundles: mpsc::UnboundedReceiver<ContentBundle>,
    renderer: Arc<dyn Renderer>,
    notifier: Arc<dyn Notifier>,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    while let Some(bundle) = bundles.recv().await {
        let document = match renderer.render(&bundle) {
            Ok(document) => document,
            Err(e) => {
                error!("Failed to render email for {}<{}>: {:#}", bundle.name, bundle.email, e);
                report.failed += 1;
                continue;
            }
        };

        match notifier.notify(&bundle.name, &bundle.email, &document).await {
            Ok(()) => report.sent += 1,
            Err(e) => {
                error!("Failed to send email to {}<{}>: {:#}", bundle.name, bundle.email, e);
                report.failed += 1;
            }
        }
    }

    info!("Delivered {} digests, {} failed", report.sent, report.failed);
    report
}
