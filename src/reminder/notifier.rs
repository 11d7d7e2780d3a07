use ansi_term::Style;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Default,
}

/// Delivers reminders to the user. Permission is asked for on every delivery and never cached.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn request_permission(&self) -> Permission;

    async fn show(&self, title: &str, body: &str) -> Result<()>;
}

/// Writes reminders into the log and onto stdout.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, title: &str, body: &str) -> Result<()> {
        info!("{title}: {body}");
        println!("{}\n{body}", Style::new().bold().paint(title));
        Ok(())
    }
}
