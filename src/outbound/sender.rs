use log::debug;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::error::Error;

/// One logical outbound message.
///
/// On the wire every payload becomes a JSON array of strings, so a
/// single line is carried as a one-element batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload(Vec<String>);

impl Payload {
    /// Several lines delivered in one transmission.
    pub fn batch(lines: Vec<String>) -> Self {
        Self(lines)
    }

    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Encodes the wire envelope: a JSON array of strings.
    pub fn envelope(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl From<String> for Payload {
    fn from(line: String) -> Self {
        Self(vec![line])
    }
}

impl From<&str> for Payload {
    fn from(line: &str) -> Self {
        Self(vec![line.to_string()])
    }
}

impl From<Vec<String>> for Payload {
    fn from(lines: Vec<String>) -> Self {
        Self(lines)
    }
}

/// Write side of the live socket.
///
/// Every outbound byte passes through `transmit`. The link is the
/// sending half of the current socket's writer channel; it is swapped
/// on every reconnect and cleared when the connection goes away.
#[derive(Debug, Default)]
pub struct Wire {
    link: Option<mpsc::UnboundedSender<Message>>,
}

impl Wire {
    pub fn open(&mut self, link: mpsc::UnboundedSender<Message>) {
        self.link = Some(link);
    }

    pub fn close(&mut self) {
        self.link = None;
    }

    /// True while a socket is attached and its writer is still running.
    pub fn is_live(&self) -> bool {
        self.link.as_ref().is_some_and(|link| !link.is_closed())
    }

    /// Encodes `payload` and writes it to the live socket.
    ///
    /// The envelope is logged on the `send` target before the write is
    /// attempted, so it shows every transmission whether or not it
    /// succeeds.
    pub fn transmit(&self, payload: &Payload) -> Result<(), Error> {
        let json = payload.envelope()?;
        debug!(target: "send", "{}", json);

        let link = self.link.as_ref().ok_or(Error::NotConnected)?;
        link.send(Message::Text(json.into()))
            .map_err(|_| Error::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use log::{Level, LevelFilter, Log, Metadata, Record};
    use std::sync::Mutex;

    /// Keeps `(target, level, message)` of every record.
    struct Capture {
        records: Mutex<Vec<(String, Level, String)>>,
    }

    impl Log for Capture {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            self.records.lock().unwrap().push((
                record.target().to_string(),
                record.level(),
                record.args().to_string(),
            ));
        }

        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture {
        records: Mutex::new(Vec::new()),
    };

    fn capture_logs() {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(LevelFilter::Trace);
    }

    fn send_records(body: &str) -> Vec<Level> {
        CAPTURE
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|(target, _, message)| target == "send" && message == body)
            .map(|(_, level, _)| *level)
            .collect()
    }

    #[test]
    fn envelope_is_logged_even_when_not_connected() {
        capture_logs();
        let wire = Wire::default();

        let result = wire.transmit(&"|/logged offline".into());
        assert!(matches!(result, Err(Error::NotConnected)));
        assert_eq!(send_records(r#"["|/logged offline"]"#), vec![Level::Debug]);
    }

    #[test]
    fn envelope_is_logged_on_success() {
        capture_logs();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut wire = Wire::default();
        wire.open(tx);

        wire.transmit(&"|/logged online".into()).unwrap();
        assert_eq!(send_records(r#"["|/logged online"]"#), vec![Level::Debug]);
    }

    #[test]
    fn debuglevel_one_shows_sends_but_not_raw_frames() {
        let mut cfg = Config::from_json(
            r#"{"server": "localhost", "port": 8000, "commandcharacter": "."}"#,
        )
        .unwrap();
        cfg.debuglevel = 1;

        // `send` and `cmdr` log at debug, `recv` at trace.
        assert!(Level::Debug <= cfg.log_level());
        assert!(Level::Trace > cfg.log_level());

        cfg.debuglevel = 0;
        assert!(Level::Trace <= cfg.log_level());
    }

    #[test]
    fn single_line_is_wrapped_in_an_array() {
        let payload = Payload::from("hello");
        assert_eq!(payload.envelope().unwrap(), r#"["hello"]"#);
    }

    #[test]
    fn batch_keeps_line_order_and_escapes() {
        let payload = Payload::batch(vec!["lobby|/join x".into(), "say \"hi\"".into()]);
        assert_eq!(payload.lines().len(), 2);
        assert_eq!(
            payload.envelope().unwrap(),
            r#"["lobby|/join x","say \"hi\""]"#
        );
    }

    #[test]
    fn transmit_without_socket_is_not_connected() {
        let wire = Wire::default();
        assert!(!wire.is_live());
        assert!(matches!(wire.transmit(&"x".into()), Err(Error::NotConnected)));
    }

    #[test]
    fn transmit_writes_text_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut wire = Wire::default();
        wire.open(tx);
        assert!(wire.is_live());

        wire.transmit(&"|/cmd".into()).unwrap();
        match rx.try_recv().unwrap() {
            Message::Text(text) => assert_eq!(text.as_str(), r#"["|/cmd"]"#),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn transmit_after_writer_exit_is_not_connected() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut wire = Wire::default();
        wire.open(tx);
        drop(rx);

        assert!(!wire.is_live());
        assert!(matches!(wire.transmit(&"x".into()), Err(Error::NotConnected)));
    }
}
