//! Shared helpers for driver integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use wx_core::{
    NoTranslation, RenderSink, Request, Services, Transport, TransportError, WeatherRecord,
};

#[derive(Debug, Clone)]
enum Reply {
    Body(String),
    Status(u16),
}

/// Canned transport: the first route whose pattern occurs in the URL answers.
/// Unrouted URLs get a 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    routes: Vec<(String, Reply)>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, pattern: &str, body: serde_json::Value) -> Self {
        self.routes.push((pattern.to_string(), Reply::Body(body.to_string())));
        self
    }

    pub fn reply_raw(mut self, pattern: &str, body: &str) -> Self {
        self.routes.push((pattern.to_string(), Reply::Body(body.to_string())));
        self
    }

    pub fn fail(mut self, pattern: &str, status: u16) -> Self {
        self.routes.push((pattern.to_string(), Reply::Status(status)));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_to(&self, pattern: &str) -> Option<Request> {
        self.requests().into_iter().find(|r| r.url.contains(pattern))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, request: &Request) -> Result<String, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self
            .routes
            .iter()
            .find(|(pattern, _)| request.url.contains(pattern.as_str()))
            .map(|(_, reply)| reply.clone());
        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status)) => {
                Err(TransportError::Status { status, body: "unavailable".to_string() })
            }
            None => Err(TransportError::Status { status: 404, body: "not found".to_string() }),
        }
    }
}

pub fn with_transport(transport: MockTransport) -> (Arc<MockTransport>, Services) {
    let transport = Arc::new(transport);
    let services = Services { transport: transport.clone(), translator: Arc::new(NoTranslation) };
    (transport, services)
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 18).unwrap()
}

/// Records which display signals fired.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub signals: Vec<&'static str>,
    pub errors: Vec<String>,
    pub last_city: Option<String>,
}

impl RenderSink for RecordingSink {
    fn display_meta(&mut self, record: &WeatherRecord) {
        self.signals.push("meta");
        self.last_city = Some(record.location.city.clone());
    }

    fn display_current(&mut self, _record: &WeatherRecord) {
        self.signals.push("current");
    }

    fn display_forecast(&mut self, _record: &WeatherRecord) {
        self.signals.push("forecast");
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }
}
