use std::sync::{Arc, Mutex};

/// Per-form lifecycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum FormStatus {
    #[default]
    Idle,
    Submitting,
    /// Upload form only; `progress` is a percentage in `[0, 100]`.
    Uploading { progress: f64 },
    Succeeded(String),
    Failed(String),
}

impl FormStatus {
    /// Whether the submit control is disabled.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Submitting | Self::Uploading { .. })
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn success(&self) -> Option<&str> {
        match self {
            Self::Succeeded(msg) => Some(msg),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tone {
    Default,
    Destructive,
}

/// A transient notification ("toast").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
    pub tone: Tone,
}

/// Collects notices raised by forms and pages until the shell drains them.
#[derive(Clone, Default)]
pub struct Notifier {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl Notifier {
    pub fn push(&self, title: impl Into<String>, description: impl Into<String>, tone: Tone) {
        let notice = Notice {
            title: title.into(),
            description: description.into(),
            tone,
        };
        tracing::debug!("notice: {} - {}", notice.title, notice.description);
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }

    pub fn success(&self, title: impl Into<String>, description: impl Into<String>) {
        self.push(title, description, Tone::Default);
    }

    pub fn failure(&self, title: impl Into<String>, description: impl Into<String>) {
        self.push(title, description, Tone::Destructive);
    }

    /// Take every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|mut notices| std::mem::take(&mut *notices))
            .unwrap_or_default()
    }
}
