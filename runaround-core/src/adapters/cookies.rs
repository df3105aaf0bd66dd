//! Request-scoped cookie jar
//!
//! Parses the `Cookie` header of an incoming request and collects the
//! cookies set while handling it, to be written back as `Set-Cookie`
//! header values. Values are form-urlencoded on the way out and decoded on
//! the way in, so a username can hold `;`, `,` or spaces.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use url::form_urlencoded;

use crate::ports::CookieStore;

#[derive(Debug, Default)]
struct Jar {
    incoming: HashMap<String, String>,
    outgoing: BTreeMap<String, String>,
}

/// Cookies of a single request/response pair
#[derive(Debug, Default)]
pub struct RequestCookies {
    jar: Mutex<Jar>,
}

impl RequestCookies {
    /// An empty jar (request without cookies)
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a `Cookie` request header (`a=1; b=2`)
    ///
    /// Malformed pairs are skipped; the first occurrence of a name wins.
    pub fn from_header(header: &str) -> Self {
        let mut incoming = HashMap::new();
        for pair in header.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let value = decode_value(value.trim().trim_matches('"'));
            incoming.entry(name.to_string()).or_insert(value);
        }

        Self {
            jar: Mutex::new(Jar {
                incoming,
                outgoing: BTreeMap::new(),
            }),
        }
    }

    /// Value set during this request, if any
    pub fn pending(&self, name: &str) -> Option<String> {
        self.jar().outgoing.get(name).cloned()
    }

    /// `Set-Cookie` header values for every cookie set during this request
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.jar()
            .outgoing
            .iter()
            .map(|(name, value)| format!("{}={}; Path=/", name, encode_value(value)))
            .collect()
    }

    fn jar(&self) -> MutexGuard<'_, Jar> {
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn encode_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Reverse of `encode_value`
///
/// A raw `&` or `=` never comes out of `encode_value`; such values were set
/// by someone else and are kept as sent.
fn decode_value(raw: &str) -> String {
    if raw.contains(['&', '=']) {
        return raw.to_string();
    }
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

impl CookieStore for RequestCookies {
    fn get(&self, name: &str) -> Option<String> {
        let jar = self.jar();
        jar.outgoing
            .get(name)
            .or_else(|| jar.incoming.get(name))
            .cloned()
    }

    fn set(&self, name: &str, value: &str) {
        self.jar().outgoing.insert(name.to_string(), value.to_string());
    }
}
