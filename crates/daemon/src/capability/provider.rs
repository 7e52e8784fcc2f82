// Providers that answer directory prompts without a graphical picker.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{CapabilityProvider, FsDirectoryCapability, PromptOutcome, PromptRequest};

/// Answers prompts from grants the caller supplied up front.
///
/// A workspace with no grant is treated as an abandoned prompt, so a batch
/// can be resumed later with the missing grants filled in.
#[derive(Debug, Default, Clone)]
pub struct GrantProvider {
    grants: HashMap<String, PathBuf>,
    denied: HashSet<String>,
    import: Option<PathBuf>,
}

impl GrantProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grant(mut self, workspace_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.grants.insert(workspace_id.into(), path.into());
        self
    }

    pub fn with_denial(mut self, workspace_id: impl Into<String>) -> Self {
        self.denied.insert(workspace_id.into());
        self
    }

    pub fn with_import(mut self, path: impl Into<PathBuf>) -> Self {
        self.import = Some(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.denied.is_empty() && self.import.is_none()
    }
}

#[async_trait]
impl CapabilityProvider for GrantProvider {
    async fn prompt(&self, request: &PromptRequest) -> PromptOutcome {
        let path = match &request.workspace_id {
            Some(id) if self.denied.contains(id) => return PromptOutcome::Denied,
            Some(id) => self.grants.get(id),
            None => self.import.as_ref(),
        };
        let Some(path) = path else {
            return PromptOutcome::Aborted;
        };

        match FsDirectoryCapability::open(path).await {
            Ok(capability) => PromptOutcome::Granted(Arc::new(capability)),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "granted directory could not be opened"
                );
                PromptOutcome::Denied
            }
        }
    }
}

/// Never shows a prompt; every request is treated as abandoned.
#[derive(Debug, Default, Clone, Copy)]
pub struct NonInteractive;

#[async_trait]
impl CapabilityProvider for NonInteractive {
    async fn prompt(&self, _request: &PromptRequest) -> PromptOutcome {
        PromptOutcome::Aborted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_grant_is_aborted() {
        let provider = GrantProvider::new();
        let outcome = provider.prompt(&PromptRequest::regrant("w1", "proj")).await;
        assert!(matches!(outcome, PromptOutcome::Aborted));
        let outcome = NonInteractive.prompt(&PromptRequest::import()).await;
        assert!(matches!(outcome, PromptOutcome::Aborted));
    }

    #[tokio::test]
    async fn grant_opens_directory() {
        let tmp = TempDir::new().unwrap();
        let provider = GrantProvider::new().with_grant("w1", tmp.path());
        match provider.prompt(&PromptRequest::regrant("w1", "proj")).await {
            PromptOutcome::Granted(cap) => {
                assert_eq!(cap.local_path(), Some(tmp.path()))
            }
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unopenable_grant_is_denied() {
        let tmp = TempDir::new().unwrap();
        let provider = GrantProvider::new().with_import(tmp.path().join("missing"));
        let outcome = provider.prompt(&PromptRequest::import()).await;
        assert!(matches!(outcome, PromptOutcome::Denied));
    }

    #[tokio::test]
    async fn explicit_denial_wins() {
        let tmp = TempDir::new().unwrap();
        let provider = GrantProvider::new()
            .with_grant("w1", tmp.path())
            .with_denial("w1");
        let outcome = provider.prompt(&PromptRequest::regrant("w1", "proj")).await;
        assert!(matches!(outcome, PromptOutcome::Denied));
    }
}
