use tracing::warn;

/// Receiver of user-facing warnings raised while scanning.
///
/// The scanner never talks to a user directly; front ends supply an
/// implementation that surfaces messages however they see fit.
pub trait Notifier: Send + Sync {
    fn warn(&self, message: &str);
}

/// Forwards notifications to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn warn(&self, message: &str) {
        warn!("{message}");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::Notifier;

    /// Collects messages for assertions
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        pub messages: Mutex<Vec<String>>,
    }

    impl Notifier for RecordingNotifier {
        fn warn(&self, message: &str) {
            if let Ok(mut messages) = self.messages.lock() {
                messages.push(message.to_string());
            }
        }
    }
}
