mod task;

use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};

use crate::batch_job::RunState;
use crate::campaign::Campaign;
use crate::message_job::MessageJob;
use crate::planner;
use crate::queue::DispatchQueue;
use crate::recipient::Recipient;
use crate::settings::DispatchSettings;
use crate::storage::DispatchStorage;

use self::task::Task;

const LOOP_DELAY: u64 = 10;

/// Control messages accepted by the orchestrator thread
#[derive(Debug)]
pub enum Message {
    /// Begin dispatching a prepared run
    StartRun(Box<RunSpec>),
    /// Stop scheduling further batches of a run and drop its record
    Cancel(String),
    /// Ask the orchestrator to terminate
    Terminate,
}

/// Everything the orchestrator needs to drive one dispatch run
#[derive(Debug)]
pub struct RunSpec {
    pub job_id: String,
    pub campaign: Campaign,
    pub settings: DispatchSettings,
    pub batches: Vec<Vec<Recipient>>,
    /// Offset from dispatch time at which each batch is enqueued
    pub offsets: Vec<Duration>,
}

/// Health of the orchestrator thread
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(u8)]
pub enum OrchestratorStatus {
    Ok = 0,
    Terminated = 1,
    ChannelDisconnected = 2,
    LockPoisoned = 3,
    StorageWriteFailed = 4,
    QueueFailed = 5,
    Unknown = 255,
}

impl OrchestratorStatus {
    pub fn from_u8(value: u8) -> OrchestratorStatus {
        match value {
            0 => OrchestratorStatus::Ok,
            1 => OrchestratorStatus::Terminated,
            2 => OrchestratorStatus::ChannelDisconnected,
            3 => OrchestratorStatus::LockPoisoned,
            4 => OrchestratorStatus::StorageWriteFailed,
            5 => OrchestratorStatus::QueueFailed,
            _ => OrchestratorStatus::Unknown,
        }
    }
}

struct ActiveRun {
    campaign: Campaign,
    settings: DispatchSettings,
    batches: Vec<Vec<Recipient>>,
    /// Absolute enqueue time of each batch, fixed when the run starts
    schedule: Vec<Instant>,
}

struct DailyCount {
    day: NaiveDate,
    sent: u32,
}

pub struct Orchestrator<S: DispatchStorage + 'static> {
    pub receiver: mpsc::Receiver<Message>,

    status: Arc<RwLock<u8>>,

    // Run-progress records, shared with the facade for status reads
    storage: Arc<RwLock<S>>,

    queue: DispatchQueue,

    runs: HashMap<String, ActiveRun>,

    // Scheduled batch dispatches, sorted in time order
    tasks: BTreeSet<Task>,

    // Recipients enqueued per campaign for the current UTC day
    sent_today: HashMap<String, DailyCount>,
}

impl<S: DispatchStorage + 'static> Orchestrator<S> {
    pub fn new(
        receiver: mpsc::Receiver<Message>,
        storage: Arc<RwLock<S>>,
        queue: DispatchQueue,
        status: Arc<RwLock<u8>>,
    ) -> Orchestrator<S> {
        Orchestrator {
            receiver,
            status,
            storage,
            queue,
            runs: HashMap::new(),
            tasks: BTreeSet::new(),
            sent_today: HashMap::new(),
        }
    }

    pub fn run(&mut self) {
        loop {
            // Wait for a message at most until the first task is due, or
            // LOOP_DELAY seconds if there are no tasks
            let timeout: Duration = if let Some(task) = self.tasks.iter().next() {
                let now = Instant::now();
                if task.time > now {
                    task.time - now
                } else {
                    Duration::new(0, 0)
                }
            } else {
                Duration::from_secs(LOOP_DELAY)
            };

            match self.receiver.recv_timeout(timeout) {
                Ok(message) => match message {
                    Message::StartRun(spec) => self.start_run(*spec),
                    Message::Cancel(job_id) => self.cancel_run(&job_id),
                    Message::Terminate => {
                        debug!("(orchestrator) received Terminate command");
                        *self.status.write().unwrap() = OrchestratorStatus::Terminated as u8;
                        info!("(orchestrator) terminated");
                        return;
                    }
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    *self.status.write().unwrap() =
                        OrchestratorStatus::ChannelDisconnected as u8;
                    info!("(orchestrator) failed and terminated");
                    return;
                }
            };

            // Dispatch all the batches that are due
            let now = Instant::now();
            let due_tasks: Vec<Task> = self
                .tasks
                .iter()
                .filter(|t| t.time <= now)
                .cloned()
                .collect();

            for task in &due_tasks {
                self.tasks.remove(task);
                let status = self.dispatch_batch(task);
                if status != OrchestratorStatus::Ok {
                    *self.status.write().unwrap() = status as u8;
                    debug!("(orchestrator) failed and terminated");
                    return;
                }
            }
        }
    }

    fn start_run(&mut self, spec: RunSpec) {
        let total: usize = spec.batches.iter().map(|b| b.len()).sum();

        if spec.batches.is_empty() {
            // Nothing eligible; the run is complete before it starts
            info!(
                "(orchestrator) run {} has no eligible recipients, completing",
                spec.job_id
            );
            self.remove_record(&spec.job_id);
            return;
        }

        info!(
            "(orchestrator) run {} started: {} recipients in {} batches for campaign {}",
            spec.job_id,
            total,
            spec.batches.len(),
            spec.campaign.campaign_id
        );

        let started = Instant::now();
        let schedule: Vec<Instant> = spec.offsets.iter().map(|o| started + *o).collect();
        let first = Task {
            time: schedule[0],
            run_id: spec.job_id.clone(),
            batch_index: 0,
        };

        self.runs.insert(
            spec.job_id,
            ActiveRun {
                campaign: spec.campaign,
                settings: spec.settings,
                batches: spec.batches,
                schedule,
            },
        );
        self.tasks.insert(first);
    }

    fn cancel_run(&mut self, job_id: &str) {
        if self.runs.remove(job_id).is_some() {
            self.tasks.retain(|t| t.run_id != job_id);
            info!("(orchestrator) run {} cancelled", job_id);
        } else {
            debug!("(orchestrator) cancel for unknown run {}", job_id);
        }
        self.remove_record(job_id);
    }

    fn dispatch_batch(&mut self, task: &Task) -> OrchestratorStatus {
        // The run may have been cancelled since this task was scheduled
        let (campaign, settings, batch, batch_count, next_time) =
            match self.runs.get(&task.run_id) {
                None => return OrchestratorStatus::Ok,
                Some(run) => (
                    run.campaign.clone(),
                    run.settings.clone(),
                    run.batches[task.batch_index].clone(),
                    run.batches.len(),
                    run.schedule.get(task.batch_index + 1).cloned(),
                ),
            };

        // Re-check the daily ceiling now that this batch's turn has come
        if settings.daily_send_limit > 0 {
            let sent_today = self.sent_for_today(&campaign.campaign_id);
            let check = planner::validate_daily_limit(
                sent_today,
                batch.len() as u32,
                settings.daily_send_limit,
            );
            if !check.valid {
                warn!(
                    "(orchestrator) run {} halted at batch {}: daily limit of {} reached, \
                     {} remaining today",
                    task.run_id, task.batch_index, settings.daily_send_limit,
                    check.remaining_capacity
                );
                self.runs.remove(&task.run_id);
                return self.update_record(&task.run_id, |record| {
                    record.state = RunState::Halted;
                });
            }
        }

        debug!(
            "(orchestrator) run {} dispatching batch {} ({} recipients)",
            task.run_id,
            task.batch_index,
            batch.len()
        );

        for recipient in &batch {
            let job = MessageJob::for_campaign(&campaign, &recipient.email_addr);
            if let Err(e) = self.queue.enqueue(job) {
                error!("(orchestrator) enqueue failed: {}", e);
                return OrchestratorStatus::QueueFailed;
            }
        }
        self.add_sent_today(&campaign.campaign_id, batch.len() as u32);

        let last = task.batch_index + 1 == batch_count;
        let status = self.update_record(&task.run_id, |record| {
            record.sent_count += batch.len() as u32;
            record.current_batch_index = (task.batch_index + 1) as u32;
            record.last_executed_at = Some(Utc::now());
            if last {
                record.state = RunState::Completed;
            }
        });
        if status != OrchestratorStatus::Ok {
            return status;
        }

        if last {
            info!("(orchestrator) run {} completed", task.run_id);
            self.runs.remove(&task.run_id);
            self.remove_record(&task.run_id);
        } else if let Some(time) = next_time {
            self.tasks.insert(Task {
                time,
                run_id: task.run_id.clone(),
                batch_index: task.batch_index + 1,
            });
        }

        OrchestratorStatus::Ok
    }

    // Today's enqueued-recipient count for a campaign, rolling the counter
    // over when the UTC day changes
    fn sent_for_today(&mut self, campaign_id: &str) -> u32 {
        let today = Utc::now().date_naive();
        let entry = self
            .sent_today
            .entry(campaign_id.to_owned())
            .or_insert(DailyCount {
                day: today,
                sent: 0,
            });
        if entry.day != today {
            entry.day = today;
            entry.sent = 0;
        }
        entry.sent
    }

    fn add_sent_today(&mut self, campaign_id: &str, count: u32) {
        let today = Utc::now().date_naive();
        let entry = self
            .sent_today
            .entry(campaign_id.to_owned())
            .or_insert(DailyCount {
                day: today,
                sent: 0,
            });
        if entry.day != today {
            entry.day = today;
            entry.sent = 0;
        }
        entry.sent += count;
    }

    fn update_record<F>(&self, job_id: &str, apply: F) -> OrchestratorStatus
    where
        F: FnOnce(&mut crate::batch_job::BatchJob),
    {
        let mut guard = match self.storage.write() {
            Ok(guard) => guard,
            Err(_) => return OrchestratorStatus::LockPoisoned,
        };
        let mut record = match guard.retrieve(job_id) {
            Ok(record) => record,
            Err(e) => {
                warn!("(orchestrator) unable to retrieve record {}: {}", job_id, e);
                return OrchestratorStatus::Ok;
            }
        };
        apply(&mut record);
        if let Err(e) = guard.update(record) {
            error!("(orchestrator) unable to update record {}: {}", job_id, e);
            return OrchestratorStatus::StorageWriteFailed;
        }
        OrchestratorStatus::Ok
    }

    fn remove_record(&self, job_id: &str) {
        match self.storage.write() {
            Ok(mut guard) => {
                if let Err(e) = guard.remove(job_id) {
                    debug!("(orchestrator) record {} already gone: {}", job_id, e);
                }
            }
            Err(_) => {
                error!("(orchestrator) storage lock poisoned removing {}", job_id);
            }
        }
    }
}
