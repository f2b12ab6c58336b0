//! Time-triggered task scheduling for baskets
//!
//! Tasks do not capture the basket. Each basket registers the sending half of
//! its command channel once, and a task carries only the target symbol and a
//! [`BasketCommand`] that is delivered when the task fires.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::errors::{BasketError, BasketResult};

/// Work a scheduled task asks the basket to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasketCommand {
    /// Start a new round
    NewRound,
    /// Place the next grid order
    CreateLimitByStep,
    /// Recompute and publish the status snapshot
    BasketInfo,
}

/// When a task fires first
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskTime {
    /// Absolute wall-clock time
    At(DateTime<Utc>),
    /// Relative to the moment the task is added
    After(Duration),
}

impl TaskTime {
    /// Delay from now until the trigger; past times fire immediately
    pub fn delay(&self) -> Duration {
        match self {
            TaskTime::At(at) => (*at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
            TaskTime::After(delay) => *delay,
        }
    }
}

/// A named, optionally recurring task
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTask {
    pub name: String,
    /// Basket the command is delivered to
    pub symbol: String,
    pub trigger: TaskTime,
    /// Re-fire period after the first trigger
    pub interval: Option<Duration>,
    pub command: BasketCommand,
    pub comment: Option<String>,
}

impl TimeTask {
    /// One-shot task
    pub fn once(name: impl Into<String>, symbol: impl Into<String>, trigger: TaskTime, command: BasketCommand) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            trigger,
            interval: None,
            command,
            comment: None,
        }
    }

    /// Builder: re-fire every `interval`
    pub fn every(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Builder: free-form comment shown in logs
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// Scheduler consumed by baskets
pub trait Scheduler: Send + Sync {
    /// Register the command handler of a symbol. Registering again replaces it.
    fn register_handler(&self, symbol: &str, handler: UnboundedSender<BasketCommand>) -> BasketResult<()>;

    /// Arm a task. Adding a task with a name already armed for the same
    /// symbol replaces the earlier one.
    fn add_task(&self, task: TimeTask) -> BasketResult<()>;
}

/// Tokio-backed scheduler, cheap to clone and shared by all baskets
#[derive(Clone, Default)]
pub struct TaskScheduler {
    handlers: Arc<Mutex<HashMap<String, UnboundedSender<BasketCommand>>>>,
    tasks: Arc<Mutex<HashMap<(String, String), JoinHandle<()>>>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort every armed task
    pub fn shutdown(&self) -> BasketResult<()> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| BasketError::Scheduler(e.to_string()))?;
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
        Ok(())
    }

    /// Number of tasks still running
    pub fn active_tasks(&self) -> usize {
        self.tasks
            .lock()
            .map(|tasks| tasks.values().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

impl Scheduler for TaskScheduler {
    fn register_handler(&self, symbol: &str, handler: UnboundedSender<BasketCommand>) -> BasketResult<()> {
        self.handlers
            .lock()
            .map_err(|e| BasketError::Scheduler(e.to_string()))?
            .insert(symbol.to_string(), handler);
        Ok(())
    }

    fn add_task(&self, task: TimeTask) -> BasketResult<()> {
        let handler = self
            .handlers
            .lock()
            .map_err(|e| BasketError::Scheduler(e.to_string()))?
            .get(&task.symbol)
            .cloned()
            .ok_or_else(|| BasketError::Scheduler(format!("No handler registered for {}", task.symbol)))?;

        debug!(
            "Scheduling task '{}' for {} in {:?} (interval {:?}) {}",
            task.name,
            task.symbol,
            task.trigger.delay(),
            task.interval,
            task.comment.as_deref().unwrap_or("")
        );

        let key = (task.symbol.clone(), task.name.clone());
        let handle = tokio::spawn(run_task(task, handler));

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| BasketError::Scheduler(e.to_string()))?;
        if let Some(previous) = tasks.insert(key, handle) {
            previous.abort();
        }
        Ok(())
    }
}

async fn run_task(task: TimeTask, handler: UnboundedSender<BasketCommand>) {
    tokio::time::sleep(task.trigger.delay()).await;
    if handler.send(task.command).is_err() {
        warn!("Task '{}' fired for {} but its basket is gone", task.name, task.symbol);
        return;
    }

    let Some(period) = task.interval else {
        return;
    };

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if handler.send(task.command).is_err() {
            debug!("Stopping recurring task '{}' for {}", task.name, task.symbol);
            return;
        }
    }
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

/// Recording scheduler for tests: stores tasks instead of running them.
pub mod mock {
    use super::*;

    #[derive(Clone, Default)]
    pub struct RecordingScheduler {
        pub tasks: Arc<Mutex<Vec<TimeTask>>>,
        pub handlers: Arc<Mutex<HashMap<String, UnboundedSender<BasketCommand>>>>,
    }

    impl RecordingScheduler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn tasks(&self) -> Vec<TimeTask> {
            self.tasks.lock().map(|t| t.clone()).unwrap_or_default()
        }

        pub fn task(&self, name: &str) -> Option<TimeTask> {
            self.tasks().into_iter().find(|t| t.name == name)
        }
    }

    impl Scheduler for RecordingScheduler {
        fn register_handler(&self, symbol: &str, handler: UnboundedSender<BasketCommand>) -> BasketResult<()> {
            self.handlers
                .lock()
                .map_err(|e| BasketError::Scheduler(e.to_string()))?
                .insert(symbol.to_string(), handler);
            Ok(())
        }

        fn add_task(&self, task: TimeTask) -> BasketResult<()> {
            self.tasks
                .lock()
                .map_err(|e| BasketError::Scheduler(e.to_string()))?
                .push(task);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_task_time_delay() {
        assert_eq!(TaskTime::After(Duration::from_secs(3)).delay(), Duration::from_secs(3));

        let past = Utc::now() - chrono::Duration::seconds(10);
        assert_eq!(TaskTime::At(past).delay(), Duration::ZERO);

        let future = Utc::now() + chrono::Duration::seconds(60);
        assert!(TaskTime::At(future).delay() > Duration::from_secs(50));
    }

    #[tokio::test]
    async fn test_one_shot_task_delivers_command() {
        let scheduler = TaskScheduler::new();
        let (tx, mut rx) = unbounded_channel();
        scheduler.register_handler("BTC/USDT:USDT", tx).unwrap();

        scheduler
            .add_task(TimeTask::once(
                "newRound",
                "BTC/USDT:USDT",
                TaskTime::After(Duration::from_millis(10)),
                BasketCommand::NewRound,
            ))
            .unwrap();

        let cmd = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(cmd, Some(BasketCommand::NewRound));
    }

    #[tokio::test]
    async fn test_recurring_task_fires_repeatedly() {
        let scheduler = TaskScheduler::new();
        let (tx, mut rx) = unbounded_channel();
        scheduler.register_handler("ETH/USDT:USDT", tx).unwrap();

        scheduler
            .add_task(
                TimeTask::once(
                    "basketInfo",
                    "ETH/USDT:USDT",
                    TaskTime::After(Duration::from_millis(5)),
                    BasketCommand::BasketInfo,
                )
                .every(Duration::from_millis(10)),
            )
            .unwrap();

        for _ in 0..3 {
            let cmd = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
            assert_eq!(cmd, Some(BasketCommand::BasketInfo));
        }
        scheduler.shutdown().unwrap();
        assert_eq!(scheduler.active_tasks(), 0);
    }

    #[tokio::test]
    async fn test_task_without_handler_is_rejected() {
        let scheduler = TaskScheduler::new();
        let result = scheduler.add_task(TimeTask::once(
            "newRound",
            "XRP/USDT:USDT",
            TaskTime::After(Duration::ZERO),
            BasketCommand::NewRound,
        ));
        assert!(matches!(result, Err(BasketError::Scheduler(_))));
    }

    #[tokio::test]
    async fn test_same_name_replaces_task() {
        let scheduler = TaskScheduler::new();
        let (tx, mut rx) = unbounded_channel();
        scheduler.register_handler("SOL/USDT:USDT", tx).unwrap();

        scheduler
            .add_task(TimeTask::once(
                "rebuild",
                "SOL/USDT:USDT",
                TaskTime::After(Duration::from_secs(30)),
                BasketCommand::NewRound,
            ))
            .unwrap();
        scheduler
            .add_task(TimeTask::once(
                "rebuild",
                "SOL/USDT:USDT",
                TaskTime::After(Duration::from_millis(5)),
                BasketCommand::CreateLimitByStep,
            ))
            .unwrap();

        let cmd = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(cmd, Some(BasketCommand::CreateLimitByStep));
    }
}
