use std::fmt;

use rand::random_range;

/// Alphabet of the per-attempt session token.
const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Length of the per-attempt session token.
const TOKEN_LEN: usize = 8;

/// Address of one connection attempt.
///
/// Format:
///     ws://<host>:<port>/showdown/<id>/<token>/websocket
///
/// `id` is a three digit number and `token` eight random characters.
/// A new pair is drawn for every attempt so the server never sees a
/// stale session id after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub url: String,
    pub protocols: Vec<String>,
    pub id: u16,
    pub token: String,
}

impl ConnectTarget {
    pub fn generate(host: &str, port: u16, protocols: &[String]) -> Self {
        let id = random_range(100..1000);
        let token: String = (0..TOKEN_LEN)
            .map(|_| TOKEN_ALPHABET[random_range(0..TOKEN_ALPHABET.len())] as char)
            .collect();

        Self {
            url: format!("ws://{}:{}/showdown/{}/{}/websocket", host, port, id, token),
            protocols: protocols.to_vec(),
            id,
            token,
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}
