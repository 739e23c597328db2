use tracing::info;

/// Error-reporting collaborator. Receives `(title, message)` pairs for
/// both success and failure outcomes; presentation is up to the
/// implementation.
pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, title: &str, message: &str);
}

/// Default notifier: structured log lines, no UI.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!(%title, %message, "store notification");
    }
}
