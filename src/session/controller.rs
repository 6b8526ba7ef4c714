use std::{path::Path, time::Duration};

use anyhow::anyhow;
use chrono::{FixedOffset, NaiveDate};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::{
    error::{SessionError, UploadError},
    report::{collect_report, emitter::ReportEmitter, ReportScope},
    storage::UsageStore,
    usage::{accumulator::UsageAccumulator, table::UsageTable},
    utils::clock::Clock,
    window_api::ForegroundApp,
};

use super::{
    schedule::DailySchedule,
    state::{Mode, Session, TickOutcome},
};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Requests accepted by a running controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    SelectMode(Mode),
    Report(ReportScope),
    Reset,
    Status,
}

/// Callbacks fired by the controller. Every method defaults to doing nothing.
pub trait SessionObserver {
    fn on_state_changed(&mut self, _session: &Session) {}

    fn on_tick(&mut self, _session: &Session, _app_name: &str, _table: &UsageTable) {}

    fn on_status(&mut self, _session: &Session, _table: &UsageTable) {}

    fn on_report_emitted(&mut self, _scope: ReportScope, _path: &Path) {}

    fn on_error(&mut self, _error: &anyhow::Error) {}
}

pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

pub struct ControllerSettings {
    pub tick_interval: Duration,
    /// Timezone used for daily buckets and the scheduled send.
    pub offset: FixedOffset,
    pub schedule: Option<DailySchedule>,
}

/// Owns the session and the live usage table. The controller is their only mutator, every
/// change goes through [SessionController::handle] or [SessionController::tick].
pub struct SessionController<S: UsageStore> {
    session: Session,
    accumulator: UsageAccumulator<S>,
    foreground: Box<dyn ForegroundApp>,
    clock: Box<dyn Clock>,
    emitter: ReportEmitter,
    observer: Box<dyn SessionObserver>,
    settings: ControllerSettings,
    uploads: Vec<JoinHandle<Result<(), UploadError>>>,
}

impl<S: UsageStore> SessionController<S> {
    pub fn new(
        session: Session,
        accumulator: UsageAccumulator<S>,
        foreground: Box<dyn ForegroundApp>,
        clock: Box<dyn Clock>,
        emitter: ReportEmitter,
        observer: Box<dyn SessionObserver>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            session,
            accumulator,
            foreground,
            clock,
            emitter,
            observer,
            settings,
            uploads: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn accumulator(&self) -> &UsageAccumulator<S> {
        &self.accumulator
    }

    fn today(&self) -> NaiveDate {
        self.clock.local_date(self.settings.offset)
    }

    /// Executes the session event loop until shutdown is requested or the command channel closes.
    /// An active session is stopped on the way out, which emits its final report.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<Command>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<()> {
        let mut next_tick = self.clock.instant() + self.settings.tick_interval;
        loop {
            let running = self.session.is_running();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = commands.recv() => {
                    let Some(command) = command else {
                        debug!("Command channel closed");
                        break;
                    };
                    self.handle(command).await;
                    // Ticks restart one interval after the session (re)starts.
                    if !running && self.session.is_running() {
                        next_tick = self.clock.instant() + self.settings.tick_interval;
                    }
                }
                _ = self.clock.sleep_until(next_tick), if running => {
                    next_tick += self.settings.tick_interval;
                    self.tick().instrument(info_span!("tick")).await;
                }
            }
        }

        if self.session.is_active() {
            if let Err(e) = self.stop().await {
                error!("Failed to stop the session on shutdown {e:?}");
            }
        }
        self.wait_for_uploads().await;
        Ok(())
    }

    pub async fn handle(&mut self, command: Command) {
        debug!("Handling {command:?}");
        let result = match command {
            Command::Start => {
                if self.session.start() {
                    info!("Session started with {}", self.session.mode());
                    self.observer.on_state_changed(&self.session);
                }
                Ok(())
            }
            Command::Pause => self.session.pause().map(|_| {
                info!("Session paused at {}s", self.session.elapsed());
                self.observer.on_state_changed(&self.session);
            }),
            Command::Resume => self.session.resume().map(|_| {
                info!("Session resumed with {}", self.session.mode());
                self.observer.on_state_changed(&self.session);
            }),
            Command::Stop => self.stop().await,
            Command::SelectMode(mode) => {
                self.session.select_mode(mode);
                Ok(())
            }
            Command::Report(scope) => {
                self.emit_report(scope).await;
                Ok(())
            }
            Command::Reset => {
                if let Err(e) = self.accumulator.reset().await {
                    error!("Failed to reset statistics {e:?}");
                    self.observer.on_error(&e);
                }
                self.observer.on_status(&self.session, self.accumulator.current());
                Ok(())
            }
            Command::Status => {
                self.observer
                    .on_status(&self.session, self.accumulator.current());
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!("Rejected command: {e}");
            self.observer.on_error(&e.into());
        }
    }

    /// Samples the focused application and counts one second. Does nothing unless running.
    pub async fn tick(&mut self) {
        if !self.session.is_running() {
            return;
        }

        let app_name = match self.foreground.current_foreground_app() {
            Ok(app_name) => app_name,
            Err(e) => {
                error!("Encountered an error during collection {e:?}");
                self.observer.on_error(&e);
                return;
            }
        };

        let now = self.clock.time();
        let today = now.with_timezone(&self.settings.offset).date_naive();
        self.accumulator.increment(&app_name, today).await;

        let outcome = match self.session.record_tick(now) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Tick on a session that isn't running {e}");
                return;
            }
        };
        self.observer
            .on_tick(&self.session, &app_name, self.accumulator.current());

        if outcome == TickOutcome::LimitReached {
            info!("Time limit of {} reached", self.session.mode());
            if let Err(e) = self.stop().await {
                error!("Failed to stop after reaching the limit {e:?}");
            }
            return;
        }

        let local = now.with_timezone(&self.settings.offset);
        let due = self
            .settings
            .schedule
            .as_mut()
            .is_some_and(|schedule| schedule.is_due(local));
        if due {
            info!("Sending the scheduled report");
            self.emit_report(ReportScope::Current).await;
        }
    }

    /// Emits the final report, then ends the run.
    async fn stop(&mut self) -> Result<(), SessionError> {
        if !self.session.is_active() {
            return Err(SessionError::InvalidTransition {
                from: self.session.state(),
                operation: "stop",
            });
        }
        self.emit_report(ReportScope::Current).await;
        let elapsed = self.session.stop()?;
        self.accumulator.finish_run();
        info!("Session stopped after {elapsed}s");
        self.observer.on_state_changed(&self.session);
        Ok(())
    }

    async fn emit_report(&mut self, scope: ReportScope) {
        let today = self.today();
        let elapsed = match scope {
            ReportScope::Current => Some(self.session.elapsed()),
            ReportScope::Today | ReportScope::Week | ReportScope::All => None,
        };

        let emitted = match collect_report(&mut self.accumulator, scope, today, elapsed).await {
            Ok(report) => self.emitter.emit(&report).await,
            Err(e) => Err(e),
        };

        match emitted {
            Ok(emitted) => {
                self.observer.on_report_emitted(scope, &emitted.path);
                self.uploads.retain(|upload| !upload.is_finished());
                self.uploads.extend(emitted.upload);
            }
            Err(e) => {
                error!("Failed to emit {scope:?} report {e}");
                self.observer.on_error(&anyhow!(e));
            }
        }
    }

    /// Lets in-flight uploads finish so the final report still gets delivered.
    async fn wait_for_uploads(&mut self) {
        for upload in self.uploads.drain(..) {
            match upload.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Upload finished with error {e}"),
                Err(e) => error!("Upload task failed {e:?}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        path::Path,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        report::{emitter::ReportEmitter, ReportScope},
        session::{
            schedule::DailySchedule,
            state::{Mode, Session, SessionState},
        },
        storage::{memory::MemoryUsageStore, DailySource},
        usage::{
            accumulator::{Retention, UsageAccumulator},
            report::ReportLocale,
            table::UsageTable,
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
        window_api::MockForegroundApp,
    };

    use super::{Command, ControllerSettings, SessionController, SessionObserver};

    const TEST_DATE: NaiveDate = NaiveDate::from_ymd_opt(2018, 7, 4).unwrap();

    #[derive(Clone)]
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    impl TestClock {
        fn at(hour: u32, minute: u32, second: u32) -> Self {
            Self {
                start_time: Utc.from_utc_datetime(
                    &TEST_DATE.and_time(NaiveTime::from_hms_opt(hour, minute, second).unwrap()),
                ),
                reference: Instant::now(),
            }
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    #[derive(Clone, Default)]
    struct Events(Arc<Mutex<Vec<String>>>);

    impl Events {
        fn all(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }

        fn reports(&self) -> usize {
            self.all()
                .iter()
                .filter(|v| v.starts_with("report"))
                .count()
        }
    }

    impl SessionObserver for Events {
        fn on_state_changed(&mut self, session: &Session) {
            self.0
                .lock()
                .unwrap()
                .push(format!("state {} {}", session.state(), session.elapsed()));
        }

        fn on_report_emitted(&mut self, scope: ReportScope, _path: &Path) {
            self.0.lock().unwrap().push(format!("report {scope:?}"));
        }

        fn on_error(&mut self, error: &anyhow::Error) {
            self.0.lock().unwrap().push(format!("error {error}"));
        }
    }

    fn cycling_apps(names: &'static [&'static str]) -> MockForegroundApp {
        let mut foreground = MockForegroundApp::new();
        let mut names = names.iter().cycle();
        foreground
            .expect_current_foreground_app()
            .returning(move || Ok(names.next().unwrap().to_string()));
        foreground
    }

    async fn controller(
        mode: Mode,
        retention: Retention,
        foreground: MockForegroundApp,
        clock: TestClock,
        schedule: Option<DailySchedule>,
    ) -> Result<(SessionController<MemoryUsageStore>, Events, TempDir)> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let events = Events::default();
        let accumulator = UsageAccumulator::new(MemoryUsageStore::new(), retention).await?;
        let controller = SessionController::new(
            Session::new(mode),
            accumulator,
            Box::new(foreground),
            Box::new(clock),
            ReportEmitter::new(dir.path().to_owned(), ReportLocale::Ru, None),
            Box::new(events.clone()),
            ControllerSettings {
                tick_interval: Duration::from_secs(1),
                offset: FixedOffset::east_opt(0).unwrap(),
                schedule,
            },
        );
        Ok((controller, events, dir))
    }

    #[tokio::test(start_paused = true)]
    async fn test_limit_stops_exactly_once_with_full_elapsed() -> Result<()> {
        let (mut controller, events, dir) = controller(
            Mode::from_limit(5),
            Retention::ClearOnStop,
            cycling_apps(&["Code"]),
            TestClock::at(10, 0, 0),
            None,
        )
        .await?;

        controller.handle(Command::Start).await;
        for _ in 0..7 {
            controller.tick().await;
        }

        assert_eq!(controller.session().state(), SessionState::Stopped);
        assert_eq!(controller.session().elapsed(), 0);
        assert_eq!(events.reports(), 1);
        assert!(events.all().contains(&"state stopped 0".to_string()));

        let report = std::fs::read_to_string(dir.path().join("stats.txt"))?;
        assert_eq!(
            report,
            "Общее время: 00:00:05\n\nВремя в приложениях:\n{Code: 0:00:05}\n"
        );
        // The run is over, its live table is gone but the day keeps the seconds.
        assert!(controller.accumulator().current().is_empty());
        assert_eq!(
            controller.accumulator().store().load_day(TEST_DATE).await?,
            Some(UsageTable::from_iter([("Code", 5u64)]))
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume_keep_counts() -> Result<()> {
        let (mut controller, _events, _dir) = controller(
            Mode::Unbounded,
            Retention::KeepUntilReset,
            cycling_apps(&["A", "B"]),
            TestClock::at(10, 0, 0),
            None,
        )
        .await?;

        controller.handle(Command::Start).await;
        for _ in 0..3 {
            controller.tick().await;
        }
        controller.handle(Command::Pause).await;
        controller.tick().await;
        controller.handle(Command::Resume).await;
        for _ in 0..2 {
            controller.tick().await;
        }

        assert_eq!(controller.session().elapsed(), 5);
        let table = controller.accumulator().current();
        assert_eq!(table.total(), 5);
        assert_eq!(table.get("A"), Some(3));
        assert_eq!(table.get("B"), Some(2));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_paused_reports_elapsed() -> Result<()> {
        let (mut controller, events, dir) = controller(
            Mode::Unbounded,
            Retention::ClearOnStop,
            cycling_apps(&["A"]),
            TestClock::at(10, 0, 0),
            None,
        )
        .await?;

        controller.handle(Command::Start).await;
        for _ in 0..3 {
            controller.tick().await;
        }
        controller.handle(Command::Pause).await;
        controller.handle(Command::Stop).await;

        assert_eq!(controller.session().state(), SessionState::Stopped);
        assert_eq!(controller.session().elapsed(), 0);
        assert_eq!(events.reports(), 1);
        let report = std::fs::read_to_string(dir.path().join("stats.txt"))?;
        assert_eq!(
            report,
            "Общее время: 00:00:03\n\nВремя в приложениях:\n{A: 0:00:03}\n"
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_until_reset_survives_stop() -> Result<()> {
        let (mut controller, _events, _dir) = controller(
            Mode::Unbounded,
            Retention::KeepUntilReset,
            cycling_apps(&["A"]),
            TestClock::at(10, 0, 0),
            None,
        )
        .await?;

        for _ in 0..2 {
            controller.handle(Command::Start).await;
            controller.tick().await;
            controller.tick().await;
            controller.handle(Command::Stop).await;
        }

        assert_eq!(controller.session().elapsed(), 0);
        assert_eq!(controller.accumulator().current().get("A"), Some(4));

        controller.handle(Command::Reset).await;
        assert!(controller.accumulator().current().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_commands_are_reported() -> Result<()> {
        let (mut controller, events, _dir) = controller(
            Mode::Unbounded,
            Retention::ClearOnStop,
            cycling_apps(&["A"]),
            TestClock::at(10, 0, 0),
            None,
        )
        .await?;

        controller.handle(Command::Pause).await;
        controller.handle(Command::Stop).await;
        controller.tick().await;

        assert_eq!(controller.session().state(), SessionState::Idle);
        assert_eq!(events.reports(), 0);
        assert_eq!(
            events.all(),
            vec![
                "error can't pause a session that is idle".to_string(),
                "error can't stop a session that is idle".to_string(),
            ]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_sample_counts_nothing() -> Result<()> {
        let mut foreground = MockForegroundApp::new();
        let mut calls = 0;
        foreground
            .expect_current_foreground_app()
            .returning(move || {
                calls += 1;
                if calls == 2 {
                    Err(anyhow!("no focused window"))
                } else {
                    Ok("A".into())
                }
            });
        let (mut controller, _events, _dir) = controller(
            Mode::Unbounded,
            Retention::ClearOnStop,
            foreground,
            TestClock::at(10, 0, 0),
            None,
        )
        .await?;

        controller.handle(Command::Start).await;
        for _ in 0..3 {
            controller.tick().await;
        }
        assert_eq!(controller.session().elapsed(), 2);
        assert_eq!(controller.accumulator().total(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_report_keeps_running() -> Result<()> {
        let (mut controller, events, dir) = controller(
            Mode::Unbounded,
            Retention::ClearOnStop,
            cycling_apps(&["A"]),
            TestClock::at(18, 59, 58),
            Some(DailySchedule::new(NaiveTime::from_hms_opt(19, 0, 0).unwrap())),
        )
        .await?;

        controller.handle(Command::Start).await;
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(1)).await;
            controller.tick().await;
        }

        assert_eq!(events.reports(), 1);
        assert_eq!(controller.session().state(), SessionState::Running);
        assert_eq!(controller.session().elapsed(), 4);
        let report = std::fs::read_to_string(dir.path().join("stats.txt"))?;
        assert!(report.starts_with("Общее время: 00:00:02\n"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_ticks_every_second() -> Result<()> {
        let (mut controller, events, dir) = controller(
            Mode::Unbounded,
            Retention::ClearOnStop,
            cycling_apps(&["A", "A", "B"]),
            TestClock::at(10, 0, 0),
            None,
        )
        .await?;

        let (sender, receiver) = mpsc::channel(10);
        let shutdown = CancellationToken::new();

        let (result, _) = tokio::join!(controller.run(receiver, shutdown.clone()), async {
            sender.send(Command::Start).await.unwrap();
            tokio::time::sleep(Duration::from_millis(3500)).await;
            sender.send(Command::Pause).await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            sender.send(Command::Resume).await.unwrap();
            tokio::time::sleep(Duration::from_millis(2500)).await;
            shutdown.cancel();
        });
        result?;

        assert_eq!(controller.session().state(), SessionState::Stopped);
        assert_eq!(events.reports(), 1);
        let report = std::fs::read_to_string(dir.path().join("stats.txt"))?;
        assert_eq!(
            report,
            "Общее время: 00:00:05\n\nВремя в приложениях:\n{A: 0:00:04}\n{B: 0:00:01}\n"
        );
        Ok(())
    }
}
