//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{ACCEPT_LANGUAGE, COOKIE};
use http::request::Parts;
use http::{HeaderMap, Method, Uri};

/// Cookie that pins a visitor's locale ahead of `Accept-Language`.
pub const LOCALE_COOKIE: &str = "locale";

/// An incoming HTTP request with its body fully collected.
pub struct Request {
    pub(crate) head: Parts,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(head: Parts, body: Bytes, params: HashMap<String, String>) -> Self {
        Self { head, body, params }
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Path and query exactly as the client sent them, `/` when absent.
    pub fn raw_url(&self) -> &str {
        self.head.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Every cookie sent with the request. Later duplicates win.
    pub fn cookies(&self) -> HashMap<String, String> {
        self.head
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| line.split(';'))
            .filter_map(|pair| {
                let mut parts = pair.trim().splitn(2, '=');
                let name = parts.next()?.trim();
                if name.is_empty() {
                    return None;
                }
                let value = parts.next().unwrap_or("").trim().trim_matches('"');
                Some((name.to_owned(), value.to_owned()))
            })
            .collect()
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.cookies().remove(name)
    }

    /// Locales the client prefers, most preferred first.
    ///
    /// The [`LOCALE_COOKIE`] comes first when set, followed by the
    /// `Accept-Language` tags ordered by descending quality. Tags with
    /// `q=0` and duplicates are dropped.
    pub fn preferred_locales(&self) -> Vec<String> {
        let mut locales = Vec::new();
        if let Some(locale) = self.cookie(LOCALE_COOKIE).filter(|l| !l.is_empty()) {
            locales.push(locale);
        }

        let mut weighted: Vec<(String, f32)> = self
            .head
            .headers
            .get_all(ACCEPT_LANGUAGE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|line| line.split(','))
            .filter_map(parse_language_range)
            .collect();
        // Stable sort keeps header order among equal weights.
        weighted.sort_by(|a, b| b.1.total_cmp(&a.1));

        for (tag, _) in weighted {
            if !locales.iter().any(|l| l.eq_ignore_ascii_case(&tag)) {
                locales.push(tag);
            }
        }
        locales
    }
}

fn parse_language_range(item: &str) -> Option<(String, f32)> {
    let mut parts = item.split(';');
    let tag = parts.next()?.trim();
    if tag.is_empty() || tag == "*" {
        return None;
    }
    let quality = parts
        .filter_map(|p| p.trim().strip_prefix("q="))
        .find_map(|q| q.trim().parse::<f32>().ok())
        .unwrap_or(1.0);
    (quality > 0.0).then(|| (tag.to_owned(), quality))
}

/// Build a [`Request`] from an `http` request whose body is already in memory.
impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self::new(head, body, HashMap::new())
    }
}
