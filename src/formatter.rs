//! # formatter — Alert Rendering Boundary
//!
//! The engine hands each subscriber a slice of shared [`AlertEvent`]s; how
//! they turn into messages is up to an [`AlertFormatter`]. Delivery of the
//! rendered messages is the caller's business.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::models::{AlertEvent, AlertKind};

pub trait AlertFormatter {
    type Message;

    /// Zero or more messages for one subscriber's events of one cycle.
    fn render(&self, subscriber: &str, events: &[Arc<AlertEvent>]) -> Vec<Self::Message>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextMessage {
    pub title: String,
    pub body:  String,
}

impl fmt::Display for TextMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.title, self.body)
    }
}

/// One message per non-empty group: "Price Updates", then "RSI Updates".
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextFormatter;

impl PlainTextFormatter {
    fn block(title: &str, events: &[&AlertEvent]) -> Option<TextMessage> {
        if events.is_empty() {
            return None;
        }
        let body = events
            .iter()
            .map(|e| format!("• {e}"))
            .collect::<Vec<_>>()
            .join("\n");

        Some(TextMessage { title: title.to_string(), body })
    }
}

impl AlertFormatter for PlainTextFormatter {
    type Message = TextMessage;

    fn render(&self, _subscriber: &str, events: &[Arc<AlertEvent>]) -> Vec<TextMessage> {
        let (prices, rsi): (Vec<&AlertEvent>, Vec<&AlertEvent>) = events
            .iter()
            .map(Arc::as_ref)
            .partition(|e| e.kind == AlertKind::PriceMove);

        [
            Self::block("Price Updates", &prices),
            Self::block("RSI Updates", &rsi),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
