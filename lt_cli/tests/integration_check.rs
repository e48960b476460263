//! Integration tests for the list/check data layer using TestContext.
//!
//! These drive the same `Engine` calls the CLI commands make, against
//! fixture bundles on disk and a mocked update backend.

use std::sync::Arc;

use lt_core::{AppSummary, Error, Source, Version};
use lt_io::test_utils::{BundleSpec, FakePackageManager, FakeStoreService, TestContext};

// ============================================================================
// list Tests
// ============================================================================

mod list_apps {
    use super::*;

    #[tokio::test]
    async fn test_list_empty() {
        let ctx = TestContext::new().await;
        assert!(ctx.engine().list_apps().is_empty());
    }

    #[tokio::test]
    async fn test_list_reports_each_channel() {
        let ctx = TestContext::with_services(
            Some(Arc::new(FakePackageManager::new())),
            Arc::new(FakeStoreService::new()),
        )
        .await;
        ctx.install_sparkle_app(&BundleSpec::new("Editor", "com.example.editor", "1.0"));
        ctx.install_cask_app(&BundleSpec::new("Browser", "com.example.browser", "5.0"), "browser");
        lt_io::test_utils::write_app_bundle(
            &ctx.apps_dir(),
            &BundleSpec::new("Notes", "com.example.notes", "3.1").with_store_receipt(),
        );

        let apps = ctx.engine().list_apps();
        let sources: Vec<(&str, Source)> = apps.iter().map(|a| (a.name.as_str(), a.source)).collect();

        assert_eq!(
            sources,
            vec![
                ("Browser", Source::Homebrew),
                ("Editor", Source::Sparkle),
                ("Notes", Source::AppStore),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_makes_no_requests() {
        let ctx = TestContext::new().await;
        ctx.install_sparkle_app(&BundleSpec::new("Editor", "com.example.editor", "1.0"));

        ctx.engine().list_apps();

        let requests = ctx.mock_server().received_requests().await.unwrap();
        assert!(requests.is_empty());
    }
}

// ============================================================================
// check Tests
// ============================================================================

mod check_all {
    use super::*;

    #[tokio::test]
    async fn test_check_finds_sparkle_update() {
        let ctx = TestContext::new().await;
        ctx.install_sparkle_app(&BundleSpec::new("Editor", "com.example.editor", "1.0").with_build("100"));
        ctx.mount_appcast(
            "com.example.editor",
            &[("1.1", "110", "Editor-1.1.tar.gz"), ("1.2", "120", "Editor-1.2.tar.gz")],
        )
        .await;

        let outcomes = ctx.engine().check_all().await;
        assert_eq!(outcomes.len(), 1);

        let summary = AppSummary::from_outcome(&outcomes[0]);
        assert_eq!(summary.installed_version, "1.0 (100)");
        assert_eq!(summary.available_version.as_deref(), Some("1.2 (120)"));
        assert!(summary.can_install);

        let record = ctx.engine().repository().get("com.example.editor").unwrap();
        assert!(record.outcome.update().is_some());
    }

    #[tokio::test]
    async fn test_check_up_to_date_app_has_no_update() {
        let ctx = TestContext::new().await;
        ctx.install_sparkle_app(&BundleSpec::new("Editor", "com.example.editor", "1.2").with_build("120"));
        ctx.mount_appcast("com.example.editor", &[("1.2", "120", "Editor-1.2.tar.gz")])
            .await;

        let outcomes = ctx.engine().check_all().await;
        let summary = AppSummary::from_outcome(&outcomes[0]);

        assert!(summary.available_version.is_none());
        assert!(!summary.can_install);
    }

    #[tokio::test]
    async fn test_check_missing_feed_is_no_information() {
        let ctx = TestContext::new().await;
        ctx.install_sparkle_app(&BundleSpec::new("Editor", "com.example.editor", "1.0"));

        let outcomes = ctx.engine().check_all().await;

        assert_eq!(
            outcomes[0].result,
            Err(Error::UpdateInfoUnavailable {
                id: "com.example.editor".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_check_homebrew_and_store_apps() {
        let brew = FakePackageManager::new().with_version("browser", Version::release("6.0"));
        let ctx = TestContext::with_services(Some(Arc::new(brew)), Arc::new(FakeStoreService::new())).await;
        ctx.install_cask_app(&BundleSpec::new("Browser", "com.example.browser", "5.0"), "browser");
        lt_io::test_utils::write_app_bundle(
            &ctx.apps_dir(),
            &BundleSpec::new("Notes", "com.example.notes", "3.1").with_store_receipt(),
        );
        ctx.mount_store_lookup("com.example.notes", 4242, "3.2", "Sync fixes")
            .await;

        let summaries: Vec<AppSummary> = ctx
            .engine()
            .check_all()
            .await
            .iter()
            .map(AppSummary::from_outcome)
            .collect();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "Browser");
        assert_eq!(summaries[0].available_version.as_deref(), Some("6.0"));
        assert!(summaries[0].can_install);
        assert_eq!(summaries[1].name, "Notes");
        assert_eq!(summaries[1].available_version.as_deref(), Some("3.2"));
        assert_eq!(summaries[1].changelog.as_deref(), Some("Sync fixes"));
    }

    #[tokio::test]
    async fn test_check_results_serialize_for_json_output() {
        let ctx = TestContext::new().await;
        ctx.install_sparkle_app(&BundleSpec::new("Editor", "com.example.editor", "1.0"));
        ctx.mount_appcast("com.example.editor", &[("2.0", "200", "Editor-2.0.zip")])
            .await;

        let outcomes = ctx.engine().check_all().await;
        let summaries: Vec<AppSummary> = outcomes.iter().map(AppSummary::from_outcome).collect();
        let value = serde_json::to_value(&summaries).unwrap();

        assert_eq!(value[0]["id"], "com.example.editor");
        assert_eq!(value[0]["availableVersion"], "2.0 (200)");
        assert_eq!(value[0]["source"], "sparkle");
        assert_eq!(value[0]["canInstall"], true);
    }
}
