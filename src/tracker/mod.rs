//! The sampling and aggregation loop, and everything it owns.

use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    cli::render::Console,
    config::TrackerConfig,
    probe::{platform_probe, FocusProbe},
    storage::{sqlite::SqliteActivityStore, ActivityStore},
    utils::clock::{Clock, DefaultClock},
};

use tracking_loop::{ExitReason, LoopSettings, TrackingLoop};

pub mod activity;
pub mod aggregator;
pub mod command;
pub mod session;
pub mod shutdown;
pub mod state;
pub mod tracking_loop;

/// Runs the tracker in the current terminal until the user quits or interrupts it.
pub async fn start_tracking(config: TrackerConfig) -> Result<ExitReason> {
    let probe = platform_probe(config.browsers.clone(), config.probe_timeout())?;
    let store = SqliteActivityStore::open(&config.database_path)
        .with_context(|| format!("Failed to open activity log {:?}", config.database_path))?;

    let shutdown_token = CancellationToken::new();

    let tracking_loop = create_tracking_loop(
        probe,
        store,
        BufReader::new(tokio::io::stdin()),
        Console::stdout(),
        DefaultClock,
        &shutdown_token,
        &config,
    );

    let (_, result) = tokio::join!(shutdown::detect_shutdown(shutdown_token.clone()), async {
        let result = tracking_loop.run().await;
        // Releases the interrupt watcher once the loop is done.
        shutdown_token.cancel();
        result
    });

    let (reason, state) = result?;
    info!(
        "Tracked {} activities during {:?}",
        state.aggregate.len(),
        state.elapsed(DefaultClock.instant())
    );
    Ok(reason)
}

fn create_tracking_loop<S, R, W>(
    probe: Box<dyn FocusProbe>,
    store: S,
    input: R,
    console: Console<W>,
    clock: impl Clock,
    shutdown_token: &CancellationToken,
    config: &TrackerConfig,
) -> TrackingLoop<S, R, W>
where
    S: ActivityStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    TrackingLoop::new(
        probe,
        store,
        input,
        console,
        Box::new(clock),
        shutdown_token.clone(),
        LoopSettings {
            period: config.poll_interval(),
            top_activities: config.top_activities,
        },
    )
}

#[cfg(test)]
mod tracker_tests {
    use std::{
        io::Write,
        path::Path,
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::Result;
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::io::{AsyncWriteExt, BufReader};
    use tokio_util::sync::CancellationToken;

    use super::create_tracking_loop;
    use crate::{
        cli::render::Console,
        config::TrackerConfig,
        probe::{FocusSnapshot, MockFocusProbe, ProbeError},
        storage::{sqlite::SqliteActivityStore, MockActivityStore, StoreError},
        tracker::{activity::ActivityKey, tracking_loop::ExitReason},
        utils::{clock::TestClock, logging::TEST_LOGGING},
    };

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    fn clock() -> TestClock {
        TestClock::starting_at(Utc.from_utc_datetime(&TEST_START_DATE))
    }

    fn config(dir: &Path) -> TrackerConfig {
        TrackerConfig {
            poll_interval_ms: 1000,
            ..TrackerConfig::defaults_in(dir)
        }
    }

    fn app(name: &str) -> Result<FocusSnapshot, ProbeError> {
        Ok(FocusSnapshot {
            app_name: name.into(),
            window_title: format!("{name} window").into(),
            url: None,
        })
    }

    fn probe_answering(
        answers: Vec<Result<FocusSnapshot, ProbeError>>,
    ) -> Box<MockFocusProbe> {
        let mut probe = MockFocusProbe::new();
        let times = answers.len();
        let mut answers = answers.into_iter();
        probe
            .expect_sample()
            .times(times)
            .returning(move || answers.next().unwrap());
        Box::new(probe)
    }

    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl SharedOutput {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Ticks happen at 0s, 1s, 2s and 3s. The session is started right after the first tick,
    /// so the remaining three ticks belong to it.
    #[tokio::test(start_paused = true)]
    async fn test_session_aggregates_ticks() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let store = SqliteActivityStore::open(&config.database_path)?;
        let probe = probe_answering(vec![
            app("Terminal"),
            app("App A"),
            app("App A"),
            app("App B"),
        ]);
        let (mut keyboard, input) = tokio::io::duplex(64);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            probe,
            store,
            BufReader::new(input),
            Console::new(std::io::sink(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            keyboard.write_all(b"n\nwork\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(3500)).await;
            keyboard.write_all(b"q\n").await.unwrap();
        });
        let (reason, state) = result?;

        assert_eq!(reason, ExitReason::Quit);
        assert_eq!(state.sessions.label().as_deref(), Some("work"));
        assert_eq!(
            state.aggregate.duration_of(&ActivityKey::from("App A")),
            Duration::from_secs(2)
        );
        assert_eq!(
            state.aggregate.duration_of(&ActivityKey::from("App B")),
            Duration::from_secs(1)
        );
        assert_eq!(state.aggregate.duration_of(&"Terminal".into()), Duration::ZERO);

        let top = state.aggregate.top(5);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].key.as_str(), "App A");
        assert!((*top[0].percentage - 66.67).abs() < 0.01);
        assert!((*top[1].percentage - 33.33).abs() < 0.01);

        let samples = SqliteActivityStore::open(&config.database_path)?.samples()?;
        let sessions = samples
            .iter()
            .map(|s| s.session.as_deref())
            .collect::<Vec<_>>();
        assert_eq!(sessions, vec![None, Some("work"), Some("work"), Some("work")]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_skips_only_its_tick() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let store = SqliteActivityStore::open(&config.database_path)?;
        let probe = probe_answering(vec![
            app("App A"),
            Err(ProbeError::Query("window vanished".into())),
            app("App B"),
        ]);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            probe,
            store,
            BufReader::new(tokio::io::empty()),
            Console::new(std::io::sink(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            shutdown_token.cancel();
        });
        let (reason, state) = result?;
        assert_eq!(reason, ExitReason::Interrupted);

        let samples = SqliteActivityStore::open(&config.database_path)?.samples()?;
        let apps = samples
            .iter()
            .map(|s| s.app_name.as_ref())
            .collect::<Vec<_>>();
        assert_eq!(apps, vec!["App A", "App B"]);

        // The failed tick leaves the anchor in place, so the next sample absorbs its time.
        assert_eq!(state.aggregate.duration_of(&"App A".into()), Duration::ZERO);
        assert_eq!(state.aggregate.duration_of(&"App B".into()), Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_are_not_fatal() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let mut store = MockActivityStore::new();
        store
            .expect_append()
            .times(2)
            .returning(|_| Err(StoreError::Closed));
        store.expect_close().times(1).returning(|| Ok(()));
        let probe = probe_answering(vec![app("App A"), app("App A")]);
        let (mut keyboard, input) = tokio::io::duplex(64);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            probe,
            store,
            BufReader::new(input),
            Console::new(std::io::sink(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            keyboard.write_all(b"q\n").await.unwrap();
        });
        let (_, state) = result?;
        assert_eq!(state.aggregate.duration_of(&"App A".into()), Duration::from_secs(1));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_closes_store() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let mut store = MockActivityStore::new();
        store.expect_append().returning(|_| Ok(()));
        store.expect_close().times(1).returning(|| Ok(()));
        let probe = probe_answering(vec![app("App A"), app("App A")]);
        let (_keyboard, input) = tokio::io::duplex(64);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            probe,
            store,
            BufReader::new(input),
            Console::new(std::io::sink(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            shutdown_token.cancel();
        });
        let (reason, _) = result?;
        assert_eq!(reason, ExitReason::Interrupted);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_while_naming_session() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let mut store = MockActivityStore::new();
        store.expect_append().returning(|_| Ok(()));
        store.expect_close().times(1).returning(|| Ok(()));
        let probe = probe_answering(vec![app("App A")]);
        let (mut keyboard, input) = tokio::io::duplex(64);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            probe,
            store,
            BufReader::new(input),
            Console::new(std::io::sink(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        // The prompt holds the cadence, so no second tick happens while waiting for the name.
        let (result, _) = tokio::join!(tracking_loop.run(), async {
            keyboard.write_all(b"n\n").await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            shutdown_token.cancel();
        });
        let (reason, state) = result?;
        assert_eq!(reason, ExitReason::Interrupted);
        assert!(!state.sessions.is_active());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_command_feedback_is_shown() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let store = SqliteActivityStore::open_in_memory()?;
        let probe = probe_answering(vec![app("App A"), app("App A")]);
        let output = SharedOutput::default();
        let (mut keyboard, input) = tokio::io::duplex(64);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            probe,
            store,
            BufReader::new(input),
            Console::new(output.clone(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            keyboard.write_all(b"hello\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            keyboard.write_all(b"s\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            keyboard.write_all(b"n\n   \n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(1000)).await;
            keyboard.write_all(b"n\nreading\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
            keyboard.write_all(b"S\nq\n").await.unwrap();
        });
        let (reason, state) = result?;
        assert_eq!(reason, ExitReason::Quit);
        assert!(!state.sessions.is_active());

        let text = output.text();
        assert!(text.starts_with("Activity tracking started.\n"));
        assert!(text.contains(
            "Invalid command. Use 'n' for new session, 's' to stop session, or 'q' to quit."
        ));
        assert!(text.contains("No active session to stop."));
        assert!(text.contains("Enter new session name: "));
        assert!(text.contains("Session name can't be empty."));
        assert!(text.contains("New session started: reading"));
        assert!(text.contains("Current session: reading"));
        assert!(text.contains("Session 'reading' stopped."));
        assert!(text.ends_with("Tracking stopped.\n"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_input_keeps_sampling() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let mut store = MockActivityStore::new();
        store.expect_append().times(3).returning(|_| Ok(()));
        store.expect_close().times(1).returning(|| Ok(()));
        let probe = probe_answering(vec![app("App A"), app("App B"), app("App A")]);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            probe,
            store,
            BufReader::new(tokio::io::empty()),
            Console::new(std::io::sink(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            shutdown_token.cancel();
        });
        let (_, state) = result?;
        assert_eq!(state.aggregate.total(), Duration::from_secs(2));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_command_keeps_input_open() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let mut store = MockActivityStore::new();
        store.expect_append().returning(|_| Ok(()));
        store.expect_close().times(1).returning(|| Ok(()));
        let mut probe = MockFocusProbe::new();
        probe.expect_sample().returning(|| app("App A"));
        let output = SharedOutput::default();
        let (mut keyboard, input) = tokio::io::duplex(64);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            Box::new(probe),
            store,
            BufReader::new(input),
            Console::new(output.clone(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            keyboard.write_all(b"\xff\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            keyboard.write_all(b"q\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(3000)).await;
            shutdown_token.cancel();
        });
        let (reason, _) = result?;
        assert_eq!(reason, ExitReason::Quit);
        assert!(output.text().contains(
            "Invalid command. Use 'n' for new session, 's' to stop session, or 'q' to quit."
        ));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_session_name_is_rejected() -> Result<()> {
        *TEST_LOGGING;
        let dir = tempdir()?;
        let config = config(dir.path());
        let mut store = MockActivityStore::new();
        store.expect_append().returning(|_| Ok(()));
        store.expect_close().times(1).returning(|| Ok(()));
        let mut probe = MockFocusProbe::new();
        probe.expect_sample().returning(|| app("App A"));
        let output = SharedOutput::default();
        let (mut keyboard, input) = tokio::io::duplex(64);
        let shutdown_token = CancellationToken::new();

        let tracking_loop = create_tracking_loop(
            Box::new(probe),
            store,
            BufReader::new(input),
            Console::new(output.clone(), false),
            clock(),
            &shutdown_token,
            &config,
        );

        let (result, _) = tokio::join!(tracking_loop.run(), async {
            keyboard.write_all(b"n\n\xffwork\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(1500)).await;
            keyboard.write_all(b"q\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(3000)).await;
            shutdown_token.cancel();
        });
        let (reason, state) = result?;
        assert_eq!(reason, ExitReason::Quit);
        assert!(!state.sessions.is_active());
        assert!(output.text().contains("Session name must be valid text."));
        Ok(())
    }
}
