use crate::types::SessionEvent;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use std::io::Read;
use tokio::sync::mpsc;
use tracing::debug;

/// Read terminal events and turn them into session events.
///
/// Ctrl+`detach_key` leaves the viewer; every other key press is encoded to
/// the bytes a terminal would send for it.
pub async fn event_loop(tx: mpsc::Sender<SessionEvent>, detach_key: char) {
    use crossterm::event::EventStream;

    let mut event_stream = EventStream::new();

    while let Some(maybe_event) = event_stream.next().await {
        let event = match maybe_event {
            Ok(Event::Key(key)) if key.kind != KeyEventKind::Release => {
                if is_detach(key, detach_key) {
                    SessionEvent::Detach
                } else if let Some(bytes) = encode_key_event(key) {
                    SessionEvent::Input(bytes)
                } else {
                    continue;
                }
            }
            Ok(Event::Paste(text)) => SessionEvent::Input(text.into_bytes()),
            Ok(Event::Resize(cols, rows)) => SessionEvent::Resize(cols, rows),
            Ok(_) => continue,
            Err(e) => {
                debug!("terminal event stream failed: {}", e);
                break;
            }
        };
        if tx.send(event).await.is_err() {
            break;
        }
    }
}

/// Plain mode: forward stdin as it is read and detach on Ctrl-C.
///
/// Stdin is read on a plain thread so a pending read never holds up
/// runtime shutdown.
pub fn spawn_stdin_reader(tx: mpsc::Sender<SessionEvent>) {
    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = signal_tx.send(SessionEvent::Detach).await;
        }
    });

    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 4096];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => {
                    debug!("stdin closed");
                    break;
                }
                Ok(n) => {
                    if tx.blocking_send(SessionEvent::Input(buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
}

pub fn is_detach(key: KeyEvent, detach_key: char) -> bool {
    if !key.modifiers.contains(KeyModifiers::CONTROL) {
        return false;
    }
    match key.code {
        KeyCode::Char(c) => {
            c.eq_ignore_ascii_case(&detach_key)
                || control_byte(c).is_some_and(|b| Some(b) == control_byte(detach_key))
        }
        _ => false,
    }
}

/// The control byte Ctrl+`c` produces, if any.
///
/// Legacy terminals report Ctrl+\ through Ctrl+_ as Ctrl+4 through Ctrl+7,
/// so both spellings map to the same byte.
fn control_byte(c: char) -> Option<u8> {
    match c.to_ascii_lowercase() {
        lower @ 'a'..='z' => Some(lower as u8 - b'a' + 1),
        ' ' | '@' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        ']' | '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '7' => Some(0x1f),
        '?' | '8' => Some(0x7f),
        _ => None,
    }
}

/// Encode a key press as the bytes an xterm-compatible terminal sends.
pub fn encode_key_event(key: KeyEvent) -> Option<Vec<u8>> {
    let mut bytes = Vec::new();
    if key.modifiers.contains(KeyModifiers::ALT) {
        bytes.push(0x1b);
    }
    match key.code {
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::CONTROL) {
                bytes.push(control_byte(c)?);
            } else {
                let mut utf8 = [0u8; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
            }
        }
        KeyCode::Enter => bytes.push(b'\r'),
        KeyCode::Tab => bytes.push(b'\t'),
        KeyCode::BackTab => bytes.extend_from_slice(b"\x1b[Z"),
        KeyCode::Backspace => bytes.push(0x7f),
        KeyCode::Esc => bytes.push(0x1b),
        KeyCode::Up => bytes.extend_from_slice(b"\x1b[A"),
        KeyCode::Down => bytes.extend_from_slice(b"\x1b[B"),
        KeyCode::Right => bytes.extend_from_slice(b"\x1b[C"),
        KeyCode::Left => bytes.extend_from_slice(b"\x1b[D"),
        KeyCode::Home => bytes.extend_from_slice(b"\x1b[H"),
        KeyCode::End => bytes.extend_from_slice(b"\x1b[F"),
        KeyCode::PageUp => bytes.extend_from_slice(b"\x1b[5~"),
        KeyCode::PageDown => bytes.extend_from_slice(b"\x1b[6~"),
        KeyCode::Delete => bytes.extend_from_slice(b"\x1b[3~"),
        KeyCode::Insert => bytes.extend_from_slice(b"\x1b[2~"),
        KeyCode::F(n) => bytes.extend_from_slice(function_key(n)?),
        _ => return None,
    }
    Some(bytes)
}

fn function_key(n: u8) -> Option<&'static [u8]> {
    let seq: &'static [u8] = match n {
        1 => b"\x1bOP",
        2 => b"\x1bOQ",
        3 => b"\x1bOR",
        4 => b"\x1bOS",
        5 => b"\x1b[15~",
        6 => b"\x1b[17~",
        7 => b"\x1b[18~",
        8 => b"\x1b[19~",
        9 => b"\x1b[20~",
        10 => b"\x1b[21~",
        11 => b"\x1b[23~",
        12 => b"\x1b[24~",
        _ => return None,
    };
    Some(seq)
}
