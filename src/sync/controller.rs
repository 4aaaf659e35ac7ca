//! Incremental sync controller.
//!
//! Two mutually exclusive modes per run:
//!
//! - **live**: authenticate, discover references by scrolling, fetch each
//!   conversation and export it
//! - **index-only**: rebuild catalog rows from `<output>/*/merged.jsonl`
//!   without a browser
//!
//! Acquisition faults abort the run. Per-item faults (extraction,
//! validation, archive file read or write, catalog write) are recorded in the
//! [`SyncReport`] and the run continues with the next conversation.

use tracing::{info, warn};

use crate::acquire::{AcquisitionEngine, AcquisitionError, BrowserDriver, MessageSource};
use crate::config::{AcquisitionConfig, SyncConfig};
use crate::error::{Error, Result};
use crate::model::{ConversationInput, MessageInput};
use crate::storage::CatalogStore;
use crate::sync::export::Materializer;
use crate::sync::import::scan_archive;
use crate::sync::types::SyncReport;
use crate::validate::validate_conversation;

/// Owns the catalog connection for the lifetime of one run.
pub struct SyncController {
    config: SyncConfig,
    catalog: Option<CatalogStore>,
}

impl SyncController {
    /// Open the catalog (when `build_db` is set) and prepare a run.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be opened or migrated.
    pub fn open(config: SyncConfig) -> Result<Self> {
        let catalog = if config.build_db {
            Some(CatalogStore::open(&config.db_path)?)
        } else {
            None
        };
        Ok(Self { config, catalog })
    }

    /// Prepare a run over an already-open catalog.
    #[must_use]
    pub fn with_catalog(config: SyncConfig, catalog: Option<CatalogStore>) -> Self {
        Self { config, catalog }
    }

    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> Option<&CatalogStore> {
        self.catalog.as_ref()
    }

    /// Give back the catalog after the run.
    #[must_use]
    pub fn into_catalog(self) -> Option<CatalogStore> {
        self.catalog
    }

    /// Rebuild catalog rows from the archive.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if the catalog is disabled
    /// - [`Error::ArchiveNotFound`] if the output directory does not exist
    /// - any fatal error raised while exporting
    pub fn run_index_only(&mut self) -> Result<SyncReport> {
        if self.catalog.is_none() {
            return Err(Error::InvalidArgument(
                "index-only rebuild needs the catalog; drop --no-db".to_string(),
            ));
        }

        let mut report = SyncReport::default();
        let archived = scan_archive(&self.config.output_dir)?;
        info!(files = archived.len(), dir = %self.config.output_dir.display(), "rebuilding catalog from archive");

        for (path, package) in archived {
            let label = match &package {
                Ok((conv, _)) => conv.graph_id.clone(),
                Err(_) => path.display().to_string(),
            };
            self.export_item(&mut report, &label, package)?;
        }

        log_summary(&report);
        Ok(report)
    }

    /// Discover and export conversations through a live browser session.
    ///
    /// # Errors
    ///
    /// Authentication, timeout and driver failures abort the run; per-item
    /// failures are recorded in the report instead.
    pub fn run_live<D, S>(
        &mut self,
        engine: &mut AcquisitionEngine<D>,
        source: &mut S,
        acquisition: &AcquisitionConfig,
    ) -> Result<SyncReport>
    where
        D: BrowserDriver,
        S: MessageSource<D>,
    {
        if let Some(dir) = &self.config.debug_dir {
            engine.set_debug_dir(dir.clone());
        }
        engine.authenticate(&acquisition.tokens)?;
        engine.wait_for_initial_content(acquisition.initial_timeout)?;
        let scan = engine.scroll_until_exhausted(&acquisition.scroll)?;

        let mut report = SyncReport {
            discovered: scan.refs.len(),
            stop_reason: Some(scan.stop_reason.as_str().to_string()),
            ..SyncReport::default()
        };

        for (position, reference) in scan.refs.iter().enumerate() {
            let fetched = match source.fetch(engine.driver_mut(), reference, position) {
                Ok(raw) => raw,
                Err(AcquisitionError::NoMessages { graph_id }) => {
                    warn!(graph_id = %graph_id, "no messages extracted");
                    report.record_error(&graph_id, "no messages found on page");
                    continue;
                }
                Err(e) => return Err(engine.fail(e).into()),
            };
            let package = validate_conversation(fetched);
            self.export_item(&mut report, &reference.id, package)?;
        }

        log_summary(&report);
        Ok(report)
    }

    /// Export one package, isolating item-scoped failures into the report.
    fn export_item(
        &mut self,
        report: &mut SyncReport,
        label: &str,
        package: Result<(ConversationInput, Vec<MessageInput>)>,
    ) -> Result<()> {
        let result = package.and_then(|(conversation, messages)| {
            let mut materializer = Materializer::new(self.catalog.as_mut(), &self.config.output_dir);
            materializer.export_conversation_package(
                &conversation,
                &messages,
                self.config.export_options(),
            )
        });

        match result {
            Ok(outcome) => {
                report.record(&outcome);
                Ok(())
            }
            Err(e) if !e.is_fatal() => {
                warn!(graph_id = label, error = %e, "item failed");
                report.record_error(label, e.to_string());
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn log_summary(report: &SyncReport) {
    info!(
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        errored = report.errored.len(),
        "sync finished"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use crate::acquire::RetryPolicy;
    use crate::acquire::mock::MockDriver;
    use crate::acquire::AcquisitionResult;
    use crate::config::{ScrollOptions, SiteProfile};
    use crate::model::{ConversationRef, RawConversation, RawMessage};
    use tempfile::TempDir;

    const BASE: &str = "https://example.test";

    /// Serves two messages per conversation; `empty` ids have none.
    struct ScriptedSource {
        empty: Vec<String>,
        fail_driver: bool,
    }

    impl<D> MessageSource<D> for ScriptedSource {
        fn fetch(
            &mut self,
            _driver: &mut D,
            reference: &ConversationRef,
            position: usize,
        ) -> AcquisitionResult<RawConversation> {
            if self.fail_driver {
                return Err(crate::acquire::DriverError::Script("tab crashed".into()).into());
            }
            if self.empty.contains(&reference.id) {
                return Err(AcquisitionError::NoMessages {
                    graph_id: reference.id.clone(),
                });
            }
            let msg = |n: i64, role: &str, text: &str| RawMessage {
                graph_id: Some(format!("{}-m{n}", reference.id)),
                role: Some(role.into()),
                content: Some(text.into()),
                updated_at: Some("2024-05-01T10:00:00Z".into()),
                ordinal: Some(n),
                ..RawMessage::default()
            };
            Ok(RawConversation {
                graph_id: Some(reference.id.clone()),
                title: Some(reference.title.clone()),
                url: Some(reference.url.clone()),
                page_order: i64::try_from(position).ok(),
                messages: vec![
                    msg(1, "user", &format!("Question about {}", reference.title)),
                    msg(2, "assistant", "An answer."),
                ],
                ..RawConversation::default()
            })
        }
    }

    fn acquisition() -> AcquisitionConfig {
        AcquisitionConfig {
            site: SiteProfile {
                base_url: BASE.into(),
                ..SiteProfile::poe()
            },
            initial_timeout: Duration::from_millis(50),
            scroll: ScrollOptions {
                pause: Duration::ZERO,
                ..ScrollOptions::default()
            },
            retry: RetryPolicy::immediate(),
            tokens: BTreeMap::from([("p-b".to_string(), "good".to_string())]),
            ..AcquisitionConfig::default()
        }
    }

    fn engine(total: usize) -> AcquisitionEngine<MockDriver> {
        let acq = acquisition();
        let driver = MockDriver::new(BASE).with_listing(total, 2, 2, total / 2);
        AcquisitionEngine::new(driver, acq.site, acq.retry)
    }

    fn live_run(dir: &TempDir, empty: &[&str]) -> (SyncReport, CatalogStore) {
        let config = SyncConfig::new(dir.path());
        let mut controller =
            SyncController::with_catalog(config, Some(CatalogStore::open_memory().unwrap()));
        let mut source = ScriptedSource {
            empty: empty.iter().map(|s| (*s).to_string()).collect(),
            fail_driver: false,
        };
        let report = controller
            .run_live(&mut engine(6), &mut source, &acquisition())
            .unwrap();
        (report, controller.into_catalog().unwrap())
    }

    #[test]
    fn test_live_run_exports_and_isolates_item_errors() {
        let dir = TempDir::new().unwrap();
        let (report, catalog) = live_run(&dir, &["c3"]);

        assert_eq!(report.discovered, 6);
        assert_eq!(report.stop_reason.as_deref(), Some("no-growth"));
        assert_eq!(report.processed.len(), 5);
        assert_eq!(report.errored.len(), 1);
        assert_eq!(report.errored[0].graph_id, "c3");
        assert!(report.has_errors());

        assert_eq!(catalog.count_conversations().unwrap(), 5);
        assert_eq!(catalog.count_messages().unwrap(), 10);
        let c1 = catalog.get_conversation("c1").unwrap().unwrap();
        assert_eq!(c1.page_order, Some(0));
        assert!(dir.path().join("chat-1/conversation.md").is_file());
    }

    #[test]
    fn test_live_run_second_pass_skips_unchanged() {
        let dir = TempDir::new().unwrap();
        let config = SyncConfig::new(dir.path());
        let mut controller =
            SyncController::with_catalog(config, Some(CatalogStore::open_memory().unwrap()));
        let mut source = ScriptedSource {
            empty: Vec::new(),
            fail_driver: false,
        };

        let first = controller
            .run_live(&mut engine(4), &mut source, &acquisition())
            .unwrap();
        assert_eq!(first.processed.len(), 4);

        let second = controller
            .run_live(&mut engine(4), &mut source, &acquisition())
            .unwrap();
        assert!(second.processed.is_empty());
        assert_eq!(second.skipped.len(), 4);
        assert!(second.skipped.iter().all(|n| n.reason == "unchanged"));
    }

    #[test]
    fn test_live_run_driver_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut config = SyncConfig::new(dir.path());
        config.debug_dir = Some(dir.path().join("debug"));
        let mut controller = SyncController::with_catalog(config, None);
        let mut source = ScriptedSource {
            empty: Vec::new(),
            fail_driver: true,
        };
        let mut engine = engine(2);
        let err = controller
            .run_live(&mut engine, &mut source, &acquisition())
            .unwrap_err();
        assert!(matches!(err, Error::WebDriver(_)));
        assert_eq!(err.exit_code(), 6);
        assert_eq!(engine.state(), crate::acquire::EngineState::Failed);
        assert!(dir.path().join("debug/screenshot.png").exists());
    }

    #[test]
    fn test_live_run_write_failure_is_item_scoped() {
        let dir = TempDir::new().unwrap();
        // A plain file where c2's directory would go
        std::fs::write(dir.path().join("chat-2"), "in the way").unwrap();

        let mut controller = SyncController::with_catalog(
            SyncConfig::new(dir.path()),
            Some(CatalogStore::open_memory().unwrap()),
        );
        let mut source = ScriptedSource {
            empty: Vec::new(),
            fail_driver: false,
        };
        let report = controller
            .run_live(&mut engine(6), &mut source, &acquisition())
            .unwrap();

        assert_eq!(report.processed.len(), 5);
        assert_eq!(report.errored.len(), 1);
        assert_eq!(report.errored[0].graph_id, "c2");
        assert!(report.errored[0].reason.contains("Archive write failed"));

        let catalog = controller.into_catalog().unwrap();
        assert!(catalog.get_conversation("c2").unwrap().is_none());
        assert!(dir.path().join("chat-6/merged.jsonl").is_file());
    }

    #[test]
    fn test_live_run_auth_failure_aborts() {
        let dir = TempDir::new().unwrap();
        let mut controller = SyncController::with_catalog(SyncConfig::new(dir.path()), None);
        let mut acq = acquisition();
        acq.tokens.insert("p-b".into(), "expired".into());
        let mut source = ScriptedSource {
            empty: Vec::new(),
            fail_driver: false,
        };
        let err = controller
            .run_live(&mut engine(2), &mut source, &acq)
            .unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailure { .. }));
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_index_only_rebuild_matches_live_counts() {
        let dir = TempDir::new().unwrap();
        let (_, original) = live_run(&dir, &[]);
        let conversations = original.count_conversations().unwrap();
        let messages = original.count_messages().unwrap();
        drop(original);

        // Fresh, empty catalog against the untouched archive
        let mut controller = SyncController::with_catalog(
            SyncConfig::new(dir.path()),
            Some(CatalogStore::open_memory().unwrap()),
        );
        let report = controller.run_index_only().unwrap();
        assert_eq!(report.processed.len(), conversations);
        assert!(!report.has_errors());

        let rebuilt = controller.into_catalog().unwrap();
        assert_eq!(rebuilt.count_conversations().unwrap(), conversations);
        assert_eq!(rebuilt.count_messages().unwrap(), messages);
        let c2 = rebuilt.get_conversation("c2").unwrap().unwrap();
        assert_eq!(c2.slug.as_deref(), Some("chat-2"));
    }

    #[test]
    fn test_index_only_honors_since() {
        let dir = TempDir::new().unwrap();
        live_run(&dir, &[]);

        let mut config = SyncConfig::new(dir.path());
        config.since = crate::model::parse_iso("2025-01-01");
        let mut controller =
            SyncController::with_catalog(config, Some(CatalogStore::open_memory().unwrap()));
        let report = controller.run_index_only().unwrap();
        assert!(report.processed.is_empty());
        assert!(report.skipped.iter().all(|n| n.reason == "since-filter"));
    }

    #[test]
    fn test_index_only_records_bad_archive_and_continues() {
        let dir = TempDir::new().unwrap();
        live_run(&dir, &[]);
        std::fs::create_dir_all(dir.path().join("broken")).unwrap();
        std::fs::write(dir.path().join("broken/merged.jsonl"), "{oops\n").unwrap();
        std::fs::create_dir_all(dir.path().join("zz-garbled")).unwrap();
        std::fs::write(dir.path().join("zz-garbled/merged.jsonl"), b"\xff\xfe\n").unwrap();

        let mut controller = SyncController::with_catalog(
            SyncConfig::new(dir.path()),
            Some(CatalogStore::open_memory().unwrap()),
        );
        let report = controller.run_index_only().unwrap();
        assert_eq!(report.processed.len(), 6);
        assert_eq!(report.errored.len(), 2);
        assert!(report.errored[0].graph_id.contains("broken"));
        assert!(report.errored[1].graph_id.contains("zz-garbled"));
    }

    #[test]
    fn test_index_only_requires_catalog() {
        let dir = TempDir::new().unwrap();
        let mut config = SyncConfig::new(dir.path());
        config.build_db = false;
        let mut controller = SyncController::with_catalog(config, None);
        let err = controller.run_index_only().unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_index_only_missing_archive_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut controller = SyncController::with_catalog(
            SyncConfig::new(dir.path().join("nothing-here")),
            Some(CatalogStore::open_memory().unwrap()),
        );
        let err = controller.run_index_only().unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
