//! Mailblast is a batched campaign dispatch engine. It turns a campaign's
//! audience and advanced-sending rules into a rate-limited, retried stream
//! of outbound message jobs, tracks per-run progress, and rolls delivery
//! outcomes up into campaign analytics counters.
//!
//! The engine does not deliver messages itself and does not store campaign
//! analytics: a [`Transport`](transport::Transport) attempts delivery of one
//! message, and an [`AnalyticsSink`](analytics::AnalyticsSink) accepts the
//! counter increments. Both are injected at construction.
//!
//! ```no_run
//! use std::sync::Arc;
//! use mailblast::Mailblast;
//! use mailblast::campaign::Campaign;
//! use mailblast::config::Config;
//! use mailblast::recipient::{Recipient, RecipientStatus};
//! use mailblast::settings::DispatchSettings;
//! use mailblast::storage::MemoryStorage;
//! # use mailblast::analytics::MemoryAnalytics;
//! # use mailblast::message_job::MessageJob;
//! # use mailblast::transport::{DeliveryResult, Transport};
//! # struct Relay;
//! # impl Transport for Relay {
//! #     fn send(&self, _job: &MessageJob) -> DeliveryResult {
//! #         DeliveryResult::Delivered("250 OK".to_owned())
//! #     }
//! # }
//!
//! let engine = Mailblast::new(
//!     Config::default(),
//!     MemoryStorage::new(),
//!     Arc::new(Relay),
//!     Arc::new(MemoryAnalytics::new()),
//! ).unwrap();
//!
//! let campaign = Campaign {
//!     campaign_id: "august-news".to_owned(),
//!     from: "news@example.com".to_owned(),
//!     reply_to: None,
//!     subject: "August news".to_owned(),
//!     html_body: "<p>...</p>".to_owned(),
//!     text_body: "...".to_owned(),
//!     priority: 5,
//! };
//! let recipients = vec![Recipient::new("a@example.com", RecipientStatus::Active)];
//!
//! let plan = engine
//!     .prepare(&campaign, &recipients, &DispatchSettings::default(), false)
//!     .unwrap();
//! if plan.feasibility.feasible {
//!     let job_id = engine.dispatch(plan).unwrap();
//!     let _ = engine.status(&job_id);
//! }
//! ```

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;


pub mod analytics;
pub mod batch_job;
pub mod campaign;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod message_job;
pub mod orchestrator;
pub mod planner;
pub mod queue;
pub mod recipient;
pub mod settings;
pub mod storage;
pub mod transport;

use std::sync::mpsc;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use uuid::Uuid;

use crate::analytics::{AnalyticsSink, OutcomeAggregator};
use crate::batch_job::BatchJob;
use crate::campaign::Campaign;
use crate::config::Config;
use crate::eligibility::FilterReport;
use crate::error::Error;
use crate::orchestrator::{Message, Orchestrator, RunSpec};
use crate::planner::Feasibility;
use crate::queue::{DispatchQueue, QueueStats};
use crate::recipient::Recipient;
use crate::settings::DispatchSettings;
use crate::storage::DispatchStorage;
use crate::transport::Transport;

pub use crate::orchestrator::OrchestratorStatus;

/// A planned dispatch run: eligibility has been computed, batches cut and
/// scheduled, feasibility checked, but nothing has been enqueued. Produced
/// by [`Mailblast::prepare`], consumed by [`Mailblast::dispatch`].
#[derive(Debug)]
pub struct RunPlan {
    pub job_id: String,

    pub campaign: Campaign,

    pub settings: DispatchSettings,

    pub batches: Vec<Vec<Recipient>>,

    /// Offset from dispatch time at which each batch is enqueued
    pub offsets: Vec<Duration>,

    /// Advisory: whether the plan fits the daily limit and dispatch window.
    /// An infeasible plan may still be dispatched; that is the caller's
    /// decision.
    pub feasibility: Feasibility,

    /// How many recipients survived each filtering pass
    pub filter: FilterReport,
}

impl RunPlan {
    pub fn total_recipients(&self) -> usize {
        self.batches.iter().map(|b| b.len()).sum()
    }
}

pub struct Mailblast<S: DispatchStorage + 'static> {
    sender: mpsc::Sender<Message>,
    orchestrator_status: Arc<RwLock<u8>>,
    storage: Arc<RwLock<S>>,
    queue: DispatchQueue,
}

impl<S: DispatchStorage + 'static> Mailblast<S> {
    /// Create a new Mailblast engine: spawns the dispatch queue's worker
    /// pool and the orchestrator thread. The transport and analytics sink
    /// are the engine's only ties to the outside world.
    pub fn new(
        config: Config,
        storage: S,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn AnalyticsSink>,
    ) -> Result<Mailblast<S>, Error> {
        if !config.is_valid() {
            return Err(Error::InvalidConfig(
                "workers and max_attempts must be greater than zero".to_owned(),
            ));
        }

        let storage = Arc::new(RwLock::new(storage));
        let aggregator = Arc::new(OutcomeAggregator::new(sink));
        let queue = DispatchQueue::new(&config, transport, aggregator);

        let (sender, receiver) = mpsc::channel();
        let orchestrator_status = Arc::new(RwLock::new(OrchestratorStatus::Ok as u8));

        let mut orchestrator = Orchestrator::new(
            receiver,
            storage.clone(),
            queue.clone(),
            orchestrator_status.clone(),
        );
        let _ = thread::spawn(move || {
            orchestrator.run();
        });

        Ok(Mailblast {
            sender,
            orchestrator_status,
            storage,
            queue,
        })
    }

    /// Compute eligibility, cut batches, build the pacing schedule and check
    /// feasibility for a campaign send. Pure planning: nothing is enqueued
    /// until the plan is passed to `dispatch`.
    ///
    /// `is_resend` marks this as not the first send of the campaign, which
    /// arms the resend rules in `settings`.
    pub fn prepare(
        &self,
        campaign: &Campaign,
        recipients: &[Recipient],
        settings: &DispatchSettings,
        is_resend: bool,
    ) -> Result<RunPlan, Error> {
        if !settings.is_valid() {
            return Err(Error::InvalidSettings(
                "emails_per_batch must be greater than zero".to_owned(),
            ));
        }

        let outcome = eligibility::filter(recipients, settings, is_resend);
        let batches = planner::plan(&outcome.recipients, settings.emails_per_batch)?;
        let offsets = planner::schedule(batches.len(), settings.interval_minutes);
        let feasibility = planner::feasibility(
            outcome.recipients.len(),
            settings.emails_per_batch,
            settings.interval_minutes,
            settings.daily_send_limit,
        );

        Ok(RunPlan {
            job_id: Uuid::new_v4().to_string(),
            campaign: campaign.clone(),
            settings: settings.clone(),
            batches,
            offsets,
            feasibility,
            filter: outcome.report,
        })
    }

    /// Start dispatching a prepared run. Creates the run's progress record
    /// and hands the plan to the orchestrator; returns the run's job id.
    pub fn dispatch(&self, plan: RunPlan) -> Result<String, Error> {
        let record = BatchJob::new(
            &plan.job_id,
            &plan.campaign.campaign_id,
            plan.total_recipients() as u32,
        );
        {
            let mut guard = self.storage.write().map_err(|_| Error::Lock)?;
            guard.store(record)?;
        }

        let job_id = plan.job_id.clone();
        self.sender.send(Message::StartRun(Box::new(RunSpec {
            job_id: plan.job_id,
            campaign: plan.campaign,
            settings: plan.settings,
            batches: plan.batches,
            offsets: plan.offsets,
        })))?;

        Ok(job_id)
    }

    /// Snapshot of a run's progress record. Completed and cancelled runs
    /// have no record, so this errors for them.
    pub fn status(&self, job_id: &str) -> Result<BatchJob, Error> {
        let guard = self.storage.read().map_err(|_| Error::Lock)?;
        Ok(guard.retrieve(job_id)?)
    }

    /// Progress records of every run that has not finished
    pub fn active_runs(&self) -> Result<Vec<BatchJob>, Error> {
        let guard = self.storage.read().map_err(|_| Error::Lock)?;
        Ok(guard.retrieve_all_active()?)
    }

    /// Suspend queue consumption without discarding queued work
    pub fn pause(&self) -> Result<(), Error> {
        self.queue.pause()
    }

    /// Resume queue consumption
    pub fn resume(&self) -> Result<(), Error> {
        self.queue.resume()
    }

    /// Stop scheduling further batches of a run and drop its record.
    /// Already-enqueued jobs continue to drain.
    pub fn cancel(&self, job_id: &str) -> Result<(), Error> {
        self.sender.send(Message::Cancel(job_id.to_owned()))?;
        Ok(())
    }

    pub fn queue_stats(&self) -> Result<QueueStats, Error> {
        self.queue.stats()
    }

    /// Determine the health of the orchestrator thread
    pub fn orchestrator_status(&self) -> OrchestratorStatus {
        OrchestratorStatus::from_u8(*self.orchestrator_status.read().unwrap())
    }

    /// Ask the engine to die. This is not required, you can simply let it
    /// fall out of scope and it will clean itself up.
    pub fn die(&mut self) -> Result<(), Error> {
        self.sender.send(Message::Terminate)?;
        Ok(())
    }
}

impl<S: DispatchStorage + 'static> Drop for Mailblast<S> {
    fn drop(&mut self) {
        let _ = self.sender.send(Message::Terminate);
        self.queue.shutdown();
    }
}
