use std::sync::Arc;

use async_trait::async_trait;

use lt_core::{Error, InstalledApp, Source, UpdateRecord};

use super::UpdateChecker;
use crate::traits::PackageManager;

pub struct HomebrewChecker {
    brew: Arc<dyn PackageManager>,
}

impl HomebrewChecker {
    pub fn new(brew: Arc<dyn PackageManager>) -> Self {
        Self { brew }
    }
}

#[async_trait]
impl UpdateChecker for HomebrewChecker {
    fn source(&self) -> Source {
        Source::Homebrew
    }

    fn can_handle(&self, app: &InstalledApp) -> bool {
        app.cask_token.is_some()
    }

    async fn check(&self, app: &InstalledApp) -> Result<UpdateRecord, Error> {
        let token = app
            .cask_token
            .as_deref()
            .ok_or_else(|| Error::UpdateInfoUnavailable { id: app.id.clone() })?;

        let version = self.brew.latest_version(token).await.map_err(|e| match e {
            Error::UpdateInfoUnavailable { .. } => Error::UpdateInfoUnavailable { id: app.id.clone() },
            other => Error::CheckFailed {
                id: app.id.clone(),
                message: other.to_string(),
            },
        })?;

        if version.is_unknown() {
            return Err(Error::UpdateInfoUnavailable { id: app.id.clone() });
        }

        Ok(UpdateRecord::new(app.clone(), version, Source::Homebrew))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakePackageManager;
    use lt_core::Version;
    use std::path::PathBuf;

    fn cask(token: Option<&str>) -> InstalledApp {
        let app = InstalledApp::new(
            "org.mozilla.firefox",
            "Firefox",
            Version::release("120.0"),
            Source::Homebrew,
            PathBuf::from("/Applications/Firefox.app"),
        );
        match token {
            Some(token) => app.with_cask_token(token),
            None => app,
        }
    }

    #[tokio::test]
    async fn reports_remote_version() {
        let brew = FakePackageManager::new().with_version("firefox", Version::release("121.0"));
        let checker = HomebrewChecker::new(Arc::new(brew));

        let record = checker.check(&cask(Some("firefox"))).await.unwrap();
        assert_eq!(record.remote_version, Version::release("121.0"));
        assert_eq!(record.source, Source::Homebrew);
        assert!(record.update_available());
    }

    #[tokio::test]
    async fn process_failure_is_check_failure() {
        let brew = FakePackageManager::new().failing_with(Error::ProcessExitNonZero {
            program: "brew".into(),
            code: Some(1),
        });
        let checker = HomebrewChecker::new(Arc::new(brew));

        let err = checker.check(&cask(Some("firefox"))).await.unwrap_err();
        assert!(matches!(err, Error::CheckFailed { ref id, .. } if id == "org.mozilla.firefox"));
    }

    #[tokio::test]
    async fn unversioned_cask_has_no_information() {
        let brew = FakePackageManager::new().with_version("chrome", Version::default());
        let checker = HomebrewChecker::new(Arc::new(brew));

        let err = checker.check(&cask(Some("chrome"))).await.unwrap_err();
        assert!(matches!(err, Error::UpdateInfoUnavailable { .. }));
    }

    #[test]
    fn requires_cask_token() {
        let checker = HomebrewChecker::new(Arc::new(FakePackageManager::new()));
        assert!(checker.can_handle(&cask(Some("firefox"))));
        assert!(!checker.can_handle(&cask(None)));
    }
}
