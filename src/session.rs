use crate::endpoint::logs_url;
use crate::params::{PageLocation, SessionParams};
use crate::terminal::TerminalSurface;
use crate::transport::{Connector, Outbound};
use crate::types::{CloseInfo, SessionEvent};
use std::io;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub const UNSUPPORTED_NOTICE: &str = "Your environment does not support WebSockets.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
    Unsupported,
}

/// How a session run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Detached,
    /// The peer closed the stream and nobody was left watching.
    Closed,
    Errored(String),
    Unsupported,
}

/// One duplex log stream bound to one terminal surface.
///
/// Each handler is one transition of the session's state machine. Events
/// that arrive after a terminal state are dropped.
pub struct StreamSession<T: TerminalSurface, H: Outbound> {
    url: String,
    state: SessionState,
    terminal: Option<T>,
    conn: Option<H>,
    last_error: Option<String>,
}

impl<T: TerminalSurface, H: Outbound> StreamSession<T, H> {
    pub fn new(url: impl Into<String>, terminal: T) -> Self {
        Self {
            url: url.into(),
            state: SessionState::Idle,
            terminal: Some(terminal),
            conn: None,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// True once nothing more can happen: the transport failed or was never
    /// available. A closed session still shows its terminal.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, SessionState::Errored | SessionState::Unsupported)
    }

    /// Idle -> Connecting, or Idle -> Unsupported when `connector` cannot
    /// open duplex connections.
    pub fn start<C>(&mut self, connector: &mut C) -> io::Result<()>
    where
        C: Connector<Handle = H>,
    {
        if self.state != SessionState::Idle {
            warn!("session already started ({:?}), ignoring", self.state);
            return Ok(());
        }

        let Some(terminal) = self.terminal.as_mut() else {
            return Ok(());
        };

        if !connector.is_supported() {
            warn!("duplex connections unavailable, not connecting");
            terminal.render_notice(UNSUPPORTED_NOTICE)?;
            self.state = SessionState::Unsupported;
            return Ok(());
        }

        terminal.open()?;
        terminal.toggle_full_screen(true)?;
        terminal.fit()?;

        info!("connecting to {}", self.url);
        self.conn = Some(connector.connect(&self.url));
        self.state = SessionState::Connecting;
        Ok(())
    }

    pub fn handle(&mut self, event: SessionEvent) -> io::Result<()> {
        match event {
            SessionEvent::Open => {
                self.on_open();
                Ok(())
            }
            SessionEvent::Message(text) => self.on_message(&text),
            SessionEvent::Close(info) => self.on_close(&info),
            SessionEvent::Error(message) => self.on_error(&message),
            SessionEvent::Input(data) => {
                self.on_input(data);
                Ok(())
            }
            SessionEvent::Resize(cols, rows) => self.on_resize(cols, rows),
            SessionEvent::Detach => Ok(()),
        }
    }

    pub fn on_open(&mut self) {
        if self.state != SessionState::Connecting {
            debug!("open in state {:?}, ignoring", self.state);
            return;
        }
        info!("[open] connection established");
        self.state = SessionState::Open;
    }

    pub fn on_message(&mut self, text: &str) -> io::Result<()> {
        if !matches!(self.state, SessionState::Connecting | SessionState::Open) {
            debug!("message in state {:?}, dropping", self.state);
            return Ok(());
        }
        match self.terminal.as_mut() {
            Some(terminal) => terminal.writeln(text),
            None => Ok(()),
        }
    }

    pub fn on_close(&mut self, info: &CloseInfo) -> io::Result<()> {
        if !matches!(self.state, SessionState::Connecting | SessionState::Open) {
            debug!("close in state {:?}, ignoring", self.state);
            return Ok(());
        }
        self.state = SessionState::Closed;
        self.conn = None;

        if info.was_clean {
            info!(
                "[close] Connection closed cleanly, code={} reason={}",
                info.code, info.reason
            );
            Ok(())
        } else {
            warn!("[close] Connection died");
            match self.terminal.as_mut() {
                Some(terminal) => terminal.writeln(""),
                None => Ok(()),
            }
        }
    }

    pub fn on_error(&mut self, message: &str) -> io::Result<()> {
        if !matches!(self.state, SessionState::Connecting | SessionState::Open) {
            debug!("error in state {:?}, ignoring: {}", self.state, message);
            return Ok(());
        }
        error!("[error] Connection error: {}", message);
        self.state = SessionState::Errored;
        self.conn = None;
        self.last_error = Some(message.to_string());

        if let Some(mut terminal) = self.terminal.take() {
            terminal.write(&format!("error: {}", message))?;
            terminal.destroy()?;
        }
        Ok(())
    }

    /// Forward terminal input to the connection, unbuffered and unmodified.
    pub fn on_input(&mut self, data: Vec<u8>) {
        let Some(conn) = self.conn.as_mut() else {
            debug!("input in state {:?}, dropping {} bytes", self.state, data.len());
            return;
        };
        if let Err(e) = conn.send(data) {
            debug!("input not sent: {}", e);
        }
    }

    pub fn on_resize(&mut self, cols: u16, rows: u16) -> io::Result<()> {
        if matches!(self.state, SessionState::Idle | SessionState::Unsupported) {
            return Ok(());
        }
        debug!(cols, rows, "terminal resized");
        match self.terminal.as_mut() {
            Some(terminal) => terminal.fit(),
            None => Ok(()),
        }
    }

    /// Tear the session down with the view: drop the connection and release
    /// whatever surface is left.
    pub fn shutdown(mut self) -> io::Result<Outcome> {
        self.conn = None;
        if let Some(mut terminal) = self.terminal.take() {
            terminal.destroy()?;
        }
        Ok(match self.state {
            SessionState::Errored => Outcome::Errored(self.last_error.unwrap_or_default()),
            SessionState::Unsupported => Outcome::Unsupported,
            _ => Outcome::Detached,
        })
    }
}

/// Resolve `page_url` and start a session against its log endpoint.
///
/// A page that does not resolve fails with a [`crate::params::ParamError`]
/// before `connector` is touched.
pub fn begin<T, C>(
    page_url: &str,
    terminal: T,
    connector: &mut C,
) -> anyhow::Result<StreamSession<T, C::Handle>>
where
    T: TerminalSurface,
    C: Connector,
{
    let page = PageLocation::parse(page_url)?;
    let params = SessionParams::resolve(page.query())?;
    info!(
        "Streaming logs for {}/{}/{}/{}",
        params.cluster, params.namespace, params.pod, params.container
    );

    let mut session = StreamSession::new(logs_url(page.host(), &params), terminal);
    session.start(connector)?;
    Ok(session)
}

/// Drive a started `session` from `events` until it finishes or the viewer
/// detaches.
///
/// With `hold_on_close` a closed session keeps its terminal up until the
/// viewer detaches; without it the run ends as soon as the stream closes.
pub async fn run<T, H>(
    mut session: StreamSession<T, H>,
    events: &mut mpsc::Receiver<SessionEvent>,
    hold_on_close: bool,
) -> anyhow::Result<Outcome>
where
    T: TerminalSurface,
    H: Outbound,
{
    while !session.is_finished() {
        let Some(event) = events.recv().await else {
            debug!("event sources gone, ending session");
            break;
        };
        if event == SessionEvent::Detach {
            info!("viewer detached from {}", session.url());
            break;
        }
        session.handle(event)?;
        if session.state() == SessionState::Closed && !hold_on_close {
            // The surface stays as it is; only the view goes away.
            return Ok(Outcome::Closed);
        }
    }

    Ok(session.shutdown()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamError;
    use crate::transport::TransportError;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Open,
        FullScreen(bool),
        Fit,
        Write(String),
        Writeln(String),
        Destroy,
        Notice(String),
    }

    #[derive(Clone, Default)]
    struct RecordingSurface {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl RecordingSurface {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> io::Result<()> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl TerminalSurface for RecordingSurface {
        fn open(&mut self) -> io::Result<()> {
            self.record(Call::Open)
        }
        fn toggle_full_screen(&mut self, full_screen: bool) -> io::Result<()> {
            self.record(Call::FullScreen(full_screen))
        }
        fn fit(&mut self) -> io::Result<()> {
            self.record(Call::Fit)
        }
        fn write(&mut self, text: &str) -> io::Result<()> {
            self.record(Call::Write(text.to_string()))
        }
        fn writeln(&mut self, text: &str) -> io::Result<()> {
            self.record(Call::Writeln(text.to_string()))
        }
        fn destroy(&mut self) -> io::Result<()> {
            self.record(Call::Destroy)
        }
        fn render_notice(&mut self, text: &str) -> io::Result<()> {
            self.record(Call::Notice(text.to_string()))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingOutbound {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl Outbound for RecordingOutbound {
        fn send(&mut self, data: Vec<u8>) -> Result<(), TransportError> {
            self.sent.lock().unwrap().push(data);
            Ok(())
        }
    }

    struct FakeConnector {
        supported: bool,
        urls: Vec<String>,
        outbound: RecordingOutbound,
    }

    impl FakeConnector {
        fn new(supported: bool) -> Self {
            Self {
                supported,
                urls: Vec::new(),
                outbound: RecordingOutbound::default(),
            }
        }

        fn sent(&self) -> Vec<Vec<u8>> {
            self.outbound.sent.lock().unwrap().clone()
        }
    }

    impl Connector for FakeConnector {
        type Handle = RecordingOutbound;

        fn is_supported(&self) -> bool {
            self.supported
        }

        fn connect(&mut self, url: &str) -> RecordingOutbound {
            self.urls.push(url.to_string());
            self.outbound.clone()
        }
    }

    const URL: &str = "ws://example.test/ws/c1/default/p1/ctr1/logs?";

    fn started() -> (
        StreamSession<RecordingSurface, RecordingOutbound>,
        RecordingSurface,
        FakeConnector,
    ) {
        let surface = RecordingSurface::default();
        let mut connector = FakeConnector::new(true);
        let mut session = StreamSession::new(URL, surface.clone());
        session.start(&mut connector).unwrap();
        (session, surface, connector)
    }

    #[test]
    fn start_prepares_terminal_before_connecting() {
        let (session, surface, connector) = started();
        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(
            surface.calls(),
            vec![Call::Open, Call::FullScreen(true), Call::Fit]
        );
        assert_eq!(connector.urls, vec![URL.to_string()]);
    }

    #[test]
    fn unsupported_environment_never_connects() {
        let surface = RecordingSurface::default();
        let mut connector = FakeConnector::new(false);
        let mut session: StreamSession<_, RecordingOutbound> =
            StreamSession::new(URL, surface.clone());
        session.start(&mut connector).unwrap();

        assert_eq!(session.state(), SessionState::Unsupported);
        assert!(session.is_finished());
        assert!(connector.urls.is_empty());
        assert_eq!(
            surface.calls(),
            vec![Call::Notice(UNSUPPORTED_NOTICE.to_string())]
        );
    }

    #[test]
    fn open_changes_nothing_on_the_terminal() {
        let (mut session, surface, _connector) = started();
        let before = surface.calls();
        session.handle(SessionEvent::Open).unwrap();
        assert_eq!(session.state(), SessionState::Open);
        assert_eq!(surface.calls(), before);
    }

    #[test]
    fn each_message_becomes_one_line_in_order() {
        let (mut session, surface, _connector) = started();
        session.handle(SessionEvent::Open).unwrap();
        for i in 0..5 {
            session
                .handle(SessionEvent::Message(format!("log line {}", i)))
                .unwrap();
        }
        let lines: Vec<Call> = surface.calls().into_iter().skip(3).collect();
        let expected: Vec<Call> = (0..5)
            .map(|i| Call::Writeln(format!("log line {}", i)))
            .collect();
        assert_eq!(lines, expected);
    }

    #[test]
    fn input_is_forwarded_unchanged_in_order() {
        let (mut session, _surface, connector) = started();
        // Before the open acknowledgment the handle queues.
        session.handle(SessionEvent::Input(b"a".to_vec())).unwrap();
        session.handle(SessionEvent::Open).unwrap();
        session.handle(SessionEvent::Input(b"\x1b[A".to_vec())).unwrap();
        session.handle(SessionEvent::Input(b"\r".to_vec())).unwrap();
        assert_eq!(
            connector.sent(),
            vec![b"a".to_vec(), b"\x1b[A".to_vec(), b"\r".to_vec()]
        );
    }

    #[test]
    fn clean_close_writes_nothing() {
        let (mut session, surface, connector) = started();
        session.handle(SessionEvent::Open).unwrap();
        let before = surface.calls();
        session
            .handle(SessionEvent::Close(CloseInfo::clean(1000, "done")))
            .unwrap();
        assert_eq!(session.state(), SessionState::Closed);
        assert!(!session.is_finished());
        assert_eq!(surface.calls(), before);

        // The terminal stays up, but input has nowhere to go.
        session.handle(SessionEvent::Input(b"x".to_vec())).unwrap();
        assert!(connector.sent().is_empty());
    }

    #[test]
    fn unclean_close_writes_one_blank_line_and_keeps_terminal() {
        let (mut session, surface, _connector) = started();
        session.handle(SessionEvent::Open).unwrap();
        session
            .handle(SessionEvent::Close(CloseInfo::unclean()))
            .unwrap();
        session.handle(SessionEvent::Message("late".into())).unwrap();

        let calls = surface.calls();
        assert_eq!(calls.last(), Some(&Call::Writeln(String::new())));
        assert_eq!(
            calls.iter().filter(|c| **c == Call::Writeln(String::new())).count(),
            1
        );
        assert!(!calls.contains(&Call::Destroy));
    }

    #[test]
    fn error_writes_inline_and_releases_terminal() {
        let (mut session, surface, connector) = started();
        session.handle(SessionEvent::Open).unwrap();
        session
            .handle(SessionEvent::Error("connection reset".into()))
            .unwrap();
        assert_eq!(session.state(), SessionState::Errored);
        assert!(session.is_finished());

        session.handle(SessionEvent::Message("late".into())).unwrap();
        session.handle(SessionEvent::Input(b"x".to_vec())).unwrap();
        session
            .handle(SessionEvent::Close(CloseInfo::unclean()))
            .unwrap();

        let calls = surface.calls();
        assert_eq!(
            &calls[3..],
            &[
                Call::Write("error: connection reset".to_string()),
                Call::Destroy
            ]
        );
        assert!(connector.sent().is_empty());
    }

    #[test]
    fn error_can_preempt_open() {
        let (mut session, surface, _connector) = started();
        session
            .handle(SessionEvent::Error("refused".into()))
            .unwrap();
        session.handle(SessionEvent::Open).unwrap();
        assert_eq!(session.state(), SessionState::Errored);
        assert_eq!(surface.calls().last(), Some(&Call::Destroy));
    }

    #[test]
    fn resize_refits_live_terminal() {
        let (mut session, surface, _connector) = started();
        session.handle(SessionEvent::Resize(120, 40)).unwrap();
        assert_eq!(surface.calls().last(), Some(&Call::Fit));
    }

    #[test]
    fn shutdown_reports_outcome() {
        let (mut session, _surface, _connector) = started();
        session.handle(SessionEvent::Error("boom".into())).unwrap();
        assert_eq!(
            session.shutdown().unwrap(),
            Outcome::Errored("boom".to_string())
        );

        let (session, surface, _connector) = started();
        assert_eq!(session.shutdown().unwrap(), Outcome::Detached);
        assert_eq!(surface.calls().last(), Some(&Call::Destroy));
    }

    #[tokio::test]
    async fn run_stops_on_detach() {
        let surface = RecordingSurface::default();
        let mut connector = FakeConnector::new(true);
        let (tx, mut rx) = mpsc::channel(8);
        for event in [
            SessionEvent::Open,
            SessionEvent::Message("one".into()),
            SessionEvent::Input(b"q".to_vec()),
            SessionEvent::Close(CloseInfo::clean(1000, "")),
            SessionEvent::Detach,
            SessionEvent::Message("never".into()),
        ] {
            tx.send(event).await.unwrap();
        }

        let mut session = StreamSession::new(URL, surface.clone());
        session.start(&mut connector).unwrap();
        let outcome = run(session, &mut rx, true).await.unwrap();

        assert_eq!(outcome, Outcome::Detached);
        assert_eq!(connector.sent(), vec![b"q".to_vec()]);
        assert!(surface.calls().contains(&Call::Writeln("one".into())));
        assert!(!surface.calls().contains(&Call::Writeln("never".into())));
        // Still queued: the loop stopped reading at the detach.
        assert_eq!(rx.recv().await, Some(SessionEvent::Message("never".into())));
    }

    #[tokio::test]
    async fn run_ends_on_transport_error() {
        let mut connector = FakeConnector::new(true);
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(SessionEvent::Error("unreachable".into()))
            .await
            .unwrap();

        let mut session = StreamSession::new(URL, RecordingSurface::default());
        session.start(&mut connector).unwrap();
        let outcome = run(session, &mut rx, true).await.unwrap();
        assert_eq!(outcome, Outcome::Errored("unreachable".to_string()));
    }

    #[tokio::test]
    async fn run_returns_unsupported_without_reading_events() {
        let mut connector = FakeConnector::new(false);
        let (_tx, mut rx) = mpsc::channel(1);
        let mut session: StreamSession<_, RecordingOutbound> =
            StreamSession::new(URL, RecordingSurface::default());
        session.start(&mut connector).unwrap();
        let outcome = run(session, &mut rx, false).await.unwrap();
        assert_eq!(outcome, Outcome::Unsupported);
    }

    #[tokio::test]
    async fn run_without_hold_ends_when_stream_closes() {
        let surface = RecordingSurface::default();
        let mut connector = FakeConnector::new(true);
        let (tx, mut rx) = mpsc::channel(8);
        for event in [
            SessionEvent::Open,
            SessionEvent::Message("last line".into()),
            SessionEvent::Close(CloseInfo::clean(1000, "")),
        ] {
            tx.send(event).await.unwrap();
        }

        let mut session = StreamSession::new(URL, surface.clone());
        session.start(&mut connector).unwrap();
        // `tx` stays alive, as the transport and input sources do in main.
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            run(session, &mut rx, false),
        )
        .await
        .expect("run kept waiting after the stream closed")
        .unwrap();

        assert_eq!(outcome, Outcome::Closed);
        let calls = surface.calls();
        assert_eq!(calls.last(), Some(&Call::Writeln("last line".into())));
        assert!(!calls.contains(&Call::Destroy));
        drop(tx);
    }

    #[tokio::test]
    async fn run_with_hold_waits_for_detach_after_close() {
        let mut connector = FakeConnector::new(true);
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(SessionEvent::Open).await.unwrap();
        tx.send(SessionEvent::Close(CloseInfo::unclean())).await.unwrap();

        let mut session = StreamSession::new(URL, RecordingSurface::default());
        session.start(&mut connector).unwrap();
        let pending = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            run(session, &mut rx, true),
        )
        .await;
        assert!(pending.is_err());
        drop(tx);
    }

    #[test]
    fn begin_connects_to_resolved_endpoint() {
        let surface = RecordingSurface::default();
        let mut connector = FakeConnector::new(true);
        let session = begin(
            "http://example.test/logs?cluster=c1&pod=p1&container=ctr1",
            surface.clone(),
            &mut connector,
        )
        .unwrap();

        assert_eq!(session.state(), SessionState::Connecting);
        assert_eq!(connector.urls, vec![URL.to_string()]);
    }

    #[test]
    fn begin_rejects_page_without_connecting() {
        let surface = RecordingSurface::default();
        let mut connector = FakeConnector::new(true);
        let err = begin(
            "http://example.test/logs?cluster=c1&container=ctr1",
            surface.clone(),
            &mut connector,
        )
        .err()
        .expect("page without a pod must not start");

        assert_eq!(
            err.downcast_ref::<ParamError>(),
            Some(&ParamError::MissingField("pod"))
        );
        assert!(connector.urls.is_empty());
        assert!(surface.calls().is_empty());
    }
}
