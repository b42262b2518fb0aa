//! # Batch Runner
//!
//! Orchestratore del batch: per ogni target esegue probe → plan → execute →
//! accounting, uno alla volta, e accumula i `BatchTotals`.
//!
//! ## Responsabilità:
//! - Enumerare i target (file nell'ordine dato, righe nell'ordine della query)
//! - Misurare la dimensione prima e dopo l'operazione
//! - Convertire ogni errore per target in un `Outcome`, senza mai
//!   interrompere il batch
//! - Gestire dry-run (copia di lavoro) e `--keep-mtime`
//!
//! ## Directory di lavoro:
//! Ogni run crea una directory temporanea propria (`mago-XXXX`), usata per
//! materializzare i blob del database e per le copie del dry-run. Viene
//! rimossa automaticamente a fine run.

use crate::config::{RunConfiguration, Subprogram};
use crate::database::BlobStore;
use crate::error::MagoError;
use crate::policy::{plan, Action};
use crate::probe::probe;
use crate::progress::{BatchTotals, Outcome, Reporter};
use crate::target::Target;
use crate::tint::tint_file;
use crate::tools::ExternalTool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Where the result of an executed action lives
#[derive(Debug, Clone, PartialEq, Eq)]
struct Executed {
    path: PathBuf,
    in_place: bool,
}

/// Either the target was left alone, or something was written
#[derive(Debug)]
enum Step {
    Skipped(Outcome),
    Done(Executed),
}

/// Outcome of a target whose processing returned an error. A missing
/// capability leaves the target alone, anything else is a failure.
fn disposition(error: MagoError) -> Outcome {
    match error {
        MagoError::MissingDependency(_) => {
            warn!("{}", error);
            Outcome::skipped(error)
        }
        other => Outcome::failed(other),
    }
}

/// Sequential driver for one invocation
pub struct BatchRunner<T: ExternalTool> {
    config: RunConfiguration,
    tool: T,
    scratch: TempDir,
    reporter: Reporter,
}

impl<T: ExternalTool> BatchRunner<T> {
    /// Validates the configuration before anything else happens, so a
    /// configuration error never reaches a target.
    pub fn new(config: RunConfiguration, tool: T) -> Result<Self, MagoError> {
        config.validate()?;
        let scratch = tempfile::Builder::new().prefix("mago-").tempdir()?;
        debug!("Scratch directory: {}", scratch.path().display());
        let reporter = Reporter::new(&config);

        Ok(Self {
            config,
            tool,
            scratch,
            reporter,
        })
    }

    pub fn tool(&self) -> &T {
        &self.tool
    }

    /// Process file targets in the given order
    pub async fn run_files(&mut self, paths: &[PathBuf]) -> BatchTotals {
        let mut totals = BatchTotals::new();
        info!("🚀 {} on {} file(s)", self.config.subprogram, paths.len());
        self.reporter
            .start(self.config.subprogram, paths.len(), self.config.dry_run);

        for path in paths {
            let outcome = self
                .process_file(path)
                .await
                .unwrap_or_else(disposition);
            let target = Target::file(path.clone());
            self.reporter.item(&target, &outcome);
            totals.record(&outcome);
        }

        self.reporter.finish(&totals);
        totals
    }

    /// Process database rows. Only failing to list the rows is fatal.
    pub async fn run_database<S: BlobStore>(&mut self, store: &mut S) -> Result<BatchTotals, MagoError> {
        let ids = store.row_ids(self.config.rowid).await?;
        let mut totals = BatchTotals::new();
        info!("🚀 {} on {} row(s)", self.config.subprogram, ids.len());
        self.reporter
            .start(self.config.subprogram, ids.len(), self.config.dry_run);

        for id in ids {
            let (target, outcome) = match store.fetch(id).await {
                Ok(Some(blob)) if !blob.is_empty() => {
                    let outcome = self
                        .process_blob(store, id, &blob)
                        .await
                        .unwrap_or_else(disposition);
                    (Target::row(id), outcome)
                }
                Ok(_) => (Target::row(id), Outcome::skipped("is null, ignoring")),
                Err(e) => (Target::row(id), disposition(e)),
            };
            self.reporter.item(&target, &outcome);
            totals.record(&outcome);
        }

        self.reporter.finish(&totals);
        Ok(totals)
    }

    async fn process_file(&self, path: &Path) -> Result<Outcome, MagoError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Ok(Outcome::skipped("not a regular file")),
            Err(e) => return Ok(Outcome::skipped(format!("cannot read: {}", e))),
        };
        let before = metadata.len();
        let modified = metadata.modified().ok();

        // Tint handles dry-run itself, everything else works on a copy
        let working = if self.config.dry_run && self.config.subprogram != Subprogram::Tint {
            self.stage(path).await?
        } else {
            path.to_path_buf()
        };

        let executed = match self.act(&working).await? {
            Step::Skipped(outcome) => return Ok(outcome),
            Step::Done(executed) => executed,
        };

        if executed.in_place && self.config.keep_mtime && !self.config.dry_run {
            if let Some(modified) = modified {
                self.tool.touch(&executed.path, modified).await?;
                debug!("Restored mtime of {}", executed.path.display());
            }
        }

        let after = tokio::fs::metadata(&executed.path).await?.len();
        Ok(Outcome::Processed { before, after })
    }

    async fn process_blob<S: BlobStore>(&self, store: &mut S, id: i64, blob: &[u8]) -> Result<Outcome, MagoError> {
        let source = self.scratch.path().join("blob");
        tokio::fs::write(&source, blob).await?;

        let executed = match self.act(&source).await? {
            Step::Skipped(outcome) => return Ok(outcome),
            Step::Done(executed) => executed,
        };

        let updated = tokio::fs::read(&executed.path).await?;
        store.update(id, &updated, !self.config.dry_run).await?;
        if executed.path != source {
            tokio::fs::remove_file(&executed.path).await?;
        }

        Ok(Outcome::Processed {
            before: blob.len() as u64,
            after: updated.len() as u64,
        })
    }

    /// Probe, plan and execute against `source`
    async fn act(&self, source: &Path) -> Result<Step, MagoError> {
        let identity = if self.config.subprogram.requires_probe() {
            match probe(&self.tool, source).await {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!("{}", e);
                    return Ok(Step::Skipped(Outcome::skipped(e)));
                }
            }
        } else {
            None
        };

        match plan(&self.config, identity.as_ref(), source)? {
            Action::Skip(reason) => {
                debug!("Skipping {}: {}", source.display(), reason);
                Ok(Step::Skipped(Outcome::skipped(reason)))
            }
            action => self.execute(action).await.map(Step::Done),
        }
    }

    async fn execute(&self, action: Action) -> Result<Executed, MagoError> {
        match action {
            Action::Resize(plan) | Action::Convert(plan) => {
                self.tool
                    .convert(&plan.source, &plan.destination, &plan.convert_options())
                    .await?;
                if plan.quantize {
                    self.tool.quantize(&plan.destination, self.config.quality).await?;
                }
                if plan.replace_source {
                    tokio::fs::rename(&plan.destination, &plan.source).await?;
                }
                Ok(Executed {
                    path: plan.final_path().to_path_buf(),
                    in_place: plan.is_in_place(),
                })
            }
            Action::Quantize { path } => {
                self.tool.quantize(&path, self.config.quality).await?;
                Ok(Executed { path, in_place: true })
            }
            Action::Tint { path, color } => {
                tint_file(&path, &color, self.config.dry_run)?;
                Ok(Executed { path, in_place: true })
            }
            Action::Skip(reason) => Err(MagoError::config(format!("nothing to execute: {}", reason))),
        }
    }

    /// Copy `path` into a fresh staging directory for a dry run
    async fn stage(&self, path: &Path) -> Result<PathBuf, MagoError> {
        let staging = self.scratch.path().join("staged");
        if staging.exists() {
            tokio::fs::remove_dir_all(&staging).await?;
        }
        tokio::fs::create_dir_all(&staging).await?;

        let name = path.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("target"));
        let copy = staging.join(name);
        tokio::fs::copy(path, &copy).await?;
        debug!("Dry run: working on {}", copy.display());
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryBlobStore;
    use crate::tools::ConvertOptions;
    use std::cell::RefCell;
    use std::time::SystemTime;

    /// Images are text: `width,height,FORMAT,alpha` followed by `width` bytes
    fn fake_image(width: u32, height: u32, format: &str, alpha: &str) -> Vec<u8> {
        let mut bytes = format!("{},{},{},{}\n", width, height, format, alpha).into_bytes();
        bytes.extend(std::iter::repeat(b'.').take(width as usize));
        bytes
    }

    #[derive(Default)]
    struct FakeTool {
        calls: RefCell<Vec<String>>,
    }

    impl ExternalTool for FakeTool {
        async fn convert(&self, src: &Path, dest: &Path, options: &ConvertOptions) -> Result<(), MagoError> {
            self.calls.borrow_mut().push(format!("convert {}", dest.display()));
            let raw = std::fs::read_to_string(src)?;
            let fields: Vec<&str> = raw.lines().next().unwrap_or_default().split(',').collect();
            let width: u32 = fields[0].parse().unwrap_or(0);
            let width = options.resize.as_deref().and_then(|r| r.parse().ok()).unwrap_or(width);
            let format = dest.extension().map(|e| e.to_string_lossy().to_uppercase()).unwrap_or_default();
            std::fs::write(dest, fake_image(width, fields[1].parse().unwrap_or(0), &format, fields[3]))?;
            Ok(())
        }

        async fn quantize(&self, path: &Path, _quality: Option<u8>) -> Result<(), MagoError> {
            self.calls.borrow_mut().push(format!("quantize {}", path.display()));
            Ok(())
        }

        async fn touch(&self, path: &Path, modified: SystemTime) -> Result<(), MagoError> {
            self.calls.borrow_mut().push(format!("touch {}", path.display()));
            std::fs::File::options().write(true).open(path)?.set_modified(modified)?;
            Ok(())
        }

        async fn probe(&self, path: &Path) -> Result<String, MagoError> {
            let raw = std::fs::read_to_string(path)?;
            Ok(raw.lines().next().unwrap_or_default().to_string())
        }
    }

    fn config(subprogram: Subprogram) -> RunConfiguration {
        RunConfiguration {
            subprogram,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_skipped() {
        let mut runner = BatchRunner::new(config(Subprogram::Pngquant), FakeTool::default()).unwrap();
        let totals = runner.run_files(&[PathBuf::from("/nonexistent/a.png")]).await;
        assert_eq!(totals.skipped, 1);
        assert_eq!(totals.processed, 0);
    }

    #[tokio::test]
    async fn test_unidentified_file_is_skipped_not_failed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"\n").unwrap();

        let mut runner = BatchRunner::new(config(Subprogram::Png2jpeg), FakeTool::default()).unwrap();
        let totals = runner.run_files(&[path.clone()]).await;
        assert_eq!(totals.skipped, 1);
        assert_eq!(totals.failed, 0);
        assert!(runner.tool().calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_works_on_a_copy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("photo.jpg");
        let original = fake_image(1200, 800, "JPEG", "Undefined");
        std::fs::write(&path, &original).unwrap();

        let mut config = config(Subprogram::Resizer);
        config.max_width = Some(600);
        config.dry_run = true;
        let mut runner = BatchRunner::new(config, FakeTool::default()).unwrap();
        let totals = runner.run_files(&[path.clone()]).await;

        assert_eq!(totals.processed, 1);
        assert!(totals.bytes_after < totals.bytes_before);
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn test_keep_extension_replaces_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, fake_image(10, 10, "PNG", "Undefined")).unwrap();

        let mut config = config(Subprogram::Png2jpeg);
        config.keep_extension = true;
        let mut runner = BatchRunner::new(config, FakeTool::default()).unwrap();
        let totals = runner.run_files(&[path.clone()]).await;

        assert_eq!(totals.processed, 1);
        assert!(!dir.path().join("logo.png.jpg").exists());
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("10,10,JPG"));
    }

    #[tokio::test]
    async fn test_rows_roll_back_under_dry_run() {
        let blob = fake_image(2000, 1000, "JPEG", "Undefined");
        let mut store = MemoryBlobStore::new([(1, Some(blob.clone())), (2, None), (3, Some(Vec::new()))]);

        let mut config = config(Subprogram::ResizerDb);
        config.dsn = Some("psql:dbname=shop:products:image".to_string());
        config.max_width = Some(500);
        config.dry_run = true;
        let mut runner = BatchRunner::new(config, FakeTool::default()).unwrap();
        let totals = runner.run_database(&mut store).await.unwrap();

        assert_eq!(totals.processed, 1);
        assert_eq!(totals.skipped, 2);
        assert_eq!(totals.bytes_before, blob.len() as u64);
        assert!(totals.bytes_after < totals.bytes_before);
        assert_eq!(store.rollbacks, 1);
        assert_eq!(store.commits, 0);
        assert_eq!(store.rows[&1], Some(blob));
    }

    #[test]
    fn test_missing_dependency_skips_the_target() {
        let outcome = disposition(MagoError::MissingDependency("pngquant".to_string()));
        assert!(matches!(outcome, Outcome::Skipped { .. }));

        let outcome = disposition(MagoError::ToolFailed {
            tool: "convert".to_string(),
            status: "exit status: 1".to_string(),
            stderr: String::new(),
        });
        assert!(matches!(outcome, Outcome::Failed { .. }));
    }

    #[cfg(not(feature = "tint"))]
    #[tokio::test]
    async fn test_tint_without_decoder_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("icon.png");
        std::fs::write(&path, b"png").unwrap();

        let mut runner = BatchRunner::new(config(Subprogram::Tint), FakeTool::default()).unwrap();
        let totals = runner.run_files(&[path]).await;
        assert_eq!(totals.skipped, 1);
        assert_eq!(totals.failed, 0);
    }

    #[test]
    fn test_invalid_configuration_is_rejected_up_front() {
        let result = BatchRunner::new(config(Subprogram::Convert), FakeTool::default());
        assert!(matches!(result, Err(MagoError::Configuration(_))));
    }
}
