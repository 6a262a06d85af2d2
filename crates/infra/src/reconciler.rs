//! Keeps a system's registered topology in step with what is physically
//! attached to its controller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use warehouse_core::{DomainError, DomainResult, LocationId, SystemName};
use warehouse_inventory::{Processor, Removals, StorageLocation, StorageSystem, Terminal};

use crate::controller::Controller;
use crate::indexer::{IndexError, StorageIndexer};

/// One entry whose probe or refresh failed during a reindex pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexFailure {
    pub location: LocationId,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedProcessor {
    pub process: String,
    pub input_id: LocationId,
    pub output_id: LocationId,
}

/// Outcome of a [`TopologyReconciler::reindex`] pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReindexReport {
    pub system: SystemName,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub refreshed: Vec<LocationId>,
    pub removed_storage: Vec<LocationId>,
    pub removed_processors: Vec<RemovedProcessor>,
    pub removed_terminals: Vec<String>,
    pub failures: Vec<IndexFailure>,
}

impl ReindexReport {
    fn new(system: SystemName) -> Self {
        let now = Utc::now();
        Self {
            system,
            started_at: now,
            finished_at: now,
            refreshed: Vec::new(),
            removed_storage: Vec::new(),
            removed_processors: Vec::new(),
            removed_terminals: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn fail(&mut self, err: &IndexError) {
        self.failures.push(IndexFailure {
            location: err.location().clone(),
            message: err.to_string(),
        });
    }
}

/// Registration and reindexing for one system, driven through one controller.
///
/// Callers must hold exclusive access to the system for the whole call; the
/// per-system worker guarantees that.
pub struct TopologyReconciler<'a, C: ?Sized> {
    system: &'a mut StorageSystem,
    indexer: StorageIndexer<'a, C>,
}

impl<'a, C> TopologyReconciler<'a, C>
where
    C: Controller + ?Sized,
{
    pub fn new(system: &'a mut StorageSystem, controller: &'a C) -> Self {
        Self {
            system,
            indexer: StorageIndexer::new(controller),
        }
    }

    /// Conflict if `id` is taken or not attached.
    async fn ensure_attachable(&self, id: &LocationId) -> DomainResult<()> {
        if self.system.is_registered(id) {
            return Err(DomainError::conflict(format!(
                "location {id} is already registered in system {}",
                self.system.name()
            )));
        }
        if !self.indexer.probe(id).await? {
            return Err(DomainError::conflict(format!(
                "location {id} is not attached to the controller of system {}",
                self.system.name()
            )));
        }
        Ok(())
    }

    async fn indexed(&self, id: LocationId) -> DomainResult<StorageLocation> {
        let mut location = StorageLocation::new(id);
        self.indexer.index(&mut location).await?;
        Ok(location)
    }

    pub async fn register_storage(&mut self, id: LocationId) -> DomainResult<()> {
        self.ensure_attachable(&id).await?;
        let location = self.indexed(id).await?;
        info!(
            system = %self.system.name(),
            location = %location.id(),
            slots = location.slot_count(),
            "registered storage"
        );
        self.system.add_storage(location)
    }

    pub async fn register_processor(
        &mut self,
        process: String,
        input_id: LocationId,
        output_id: LocationId,
    ) -> DomainResult<()> {
        if input_id == output_id {
            return Err(DomainError::malformed(format!(
                "processor buffers must be distinct locations, both are {input_id}"
            )));
        }
        self.ensure_attachable(&input_id).await?;
        self.ensure_attachable(&output_id).await?;
        let input = self.indexed(input_id).await?;
        let output = self.indexed(output_id).await?;
        let processor = Processor::new(process, input, output)?;
        info!(
            system = %self.system.name(),
            process = processor.process(),
            input = %processor.input_buffer().id(),
            output = %processor.output_buffer().id(),
            "registered processor"
        );
        self.system.add_processor(processor)
    }

    pub async fn register_terminal(&mut self, name: String, id: LocationId) -> DomainResult<()> {
        if self.system.terminal(&name).is_some() {
            return Err(DomainError::conflict(format!(
                "terminal {name} already exists in system {}",
                self.system.name()
            )));
        }
        self.ensure_attachable(&id).await?;
        let storage = self.indexed(id).await?;
        let terminal = Terminal::new(name, storage)?;
        info!(
            system = %self.system.name(),
            terminal = terminal.name(),
            location = %terminal.storage().id(),
            "registered terminal"
        );
        self.system.add_terminal(terminal)
    }

    /// Probe and refresh one location. `Ok(false)` means it is gone.
    async fn refresh(&mut self, id: &LocationId) -> Result<bool, IndexError> {
        if !self.indexer.probe(id).await? {
            return Ok(false);
        }
        let items = self.indexer.snapshot(id).await?;
        if let Some(location) = self.system.location_mut(id) {
            location.replace_items(items);
        }
        Ok(true)
    }

    /// Probe every registered entry, refresh the ones still attached and
    /// drop the ones that are gone.
    ///
    /// Removals are collected during the pass and applied together at the end.
    /// Protocol errors on one entry are recorded and the pass continues; a lost
    /// connection stops the pass, applies the removals decided so far and is
    /// returned as the error.
    pub async fn reindex(&mut self) -> DomainResult<ReindexReport> {
        let mut report = ReindexReport::new(self.system.name().clone());
        let mut removals = Removals::default();

        let outcome = self.probe_pass(&mut report, &mut removals).await;

        self.record_removals(&removals, &mut report);
        self.system.prune(&removals);
        report.finished_at = Utc::now();

        match outcome {
            Ok(()) => {
                info!(
                    system = %report.system,
                    refreshed = report.refreshed.len(),
                    removed_storage = report.removed_storage.len(),
                    removed_processors = report.removed_processors.len(),
                    removed_terminals = report.removed_terminals.len(),
                    failures = report.failures.len(),
                    "reindex complete"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(
                    system = %report.system,
                    refreshed = report.refreshed.len(),
                    error = %err,
                    "reindex aborted"
                );
                Err(err.into())
            }
        }
    }

    /// Walks every entry; returns early only when the connection is gone.
    async fn probe_pass(
        &mut self,
        report: &mut ReindexReport,
        removals: &mut Removals,
    ) -> Result<(), IndexError> {
        let storage: Vec<LocationId> = self.system.storage().iter().map(|l| l.id().clone()).collect();
        for id in storage {
            match self.refresh(&id).await {
                Ok(true) => report.refreshed.push(id),
                Ok(false) => {
                    removals.storage.insert(id);
                }
                Err(err) if err.is_connection_lost() => return Err(err),
                Err(err) => report.fail(&err),
            }
        }

        let processors: Vec<(LocationId, LocationId)> = self
            .system
            .processors()
            .iter()
            .map(|p| (p.input_buffer().id().clone(), p.output_buffer().id().clone()))
            .collect();
        for (input, output) in processors {
            match self.refresh_processor(&input, &output).await {
                Ok(true) => report.refreshed.extend([input, output]),
                Ok(false) => {
                    removals.processors.insert(input);
                }
                Err(err) if err.is_connection_lost() => return Err(err),
                Err(err) => report.fail(&err),
            }
        }

        let terminals: Vec<LocationId> = self
            .system
            .terminals()
            .iter()
            .map(|t| t.storage().id().clone())
            .collect();
        for id in terminals {
            match self.refresh(&id).await {
                Ok(true) => report.refreshed.push(id),
                Ok(false) => {
                    removals.terminals.insert(id);
                }
                Err(err) if err.is_connection_lost() => return Err(err),
                Err(err) => report.fail(&err),
            }
        }
        Ok(())
    }

    /// A processor survives only if both buffers are still attached.
    async fn refresh_processor(&mut self, input: &LocationId, output: &LocationId) -> Result<bool, IndexError> {
        if !self.indexer.probe(input).await? || !self.indexer.probe(output).await? {
            return Ok(false);
        }
        let input_items = self.indexer.snapshot(input).await?;
        let output_items = self.indexer.snapshot(output).await?;
        if let Some(location) = self.system.location_mut(input) {
            location.replace_items(input_items);
        }
        if let Some(location) = self.system.location_mut(output) {
            location.replace_items(output_items);
        }
        Ok(true)
    }

    fn record_removals(&self, removals: &Removals, report: &mut ReindexReport) {
        report.removed_storage = self
            .system
            .storage()
            .iter()
            .filter(|l| removals.storage.contains(l.id()))
            .map(|l| l.id().clone())
            .collect();
        report.removed_processors = self
            .system
            .processors()
            .iter()
            .filter(|p| removals.processors.contains(p.input_buffer().id()))
            .map(|p| RemovedProcessor {
                process: p.process().to_string(),
                input_id: p.input_buffer().id().clone(),
                output_id: p.output_buffer().id().clone(),
            })
            .collect();
        report.removed_terminals = self
            .system
            .terminals()
            .iter()
            .filter(|t| removals.terminals.contains(t.storage().id()))
            .map(|t| t.name().to_string())
            .collect();
        for id in &report.removed_storage {
            info!(system = %self.system.name(), location = %id, "storage detached; removing");
        }
        for p in &report.removed_processors {
            info!(system = %self.system.name(), input = %p.input_id, output = %p.output_id, "processor detached; removing");
        }
        for name in &report.removed_terminals {
            info!(system = %self.system.name(), terminal = %name, "terminal detached; removing");
        }
    }
}
