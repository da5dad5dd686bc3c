use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use super::NotificationMessage;

// ============================================================================
// Dead Letter Queue
// ============================================================================
//
// Holds notifications that could not be delivered after all retries.
// Provides:
// - The full message and last error for manual intervention
// - Counts per notification type
// - Take-and-restore so a redelivery attempt keeps the failure history
// - A capacity bound; the oldest letters are evicted first
//
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: Uuid,
    pub message: NotificationMessage,
    pub error_message: String,
    pub failure_count: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqStats {
    pub total_messages: usize,
    pub by_notification_type: HashMap<String, usize>,
}

/// Letters kept before the oldest are evicted
pub const DEFAULT_DLQ_CAPACITY: usize = 10_000;

pub struct DeadLetterQueue {
    letters: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DLQ_CAPACITY)
    }
}

impl DeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            letters: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }


    /// Record a failed delivery; returns the dead letter id
    pub fn push(&self, message: NotificationMessage, error: &str) -> Uuid {
        let now = Utc::now();
        let letter = DeadLetter {
            id: Uuid::now_v7(),
            message,
            error_message: error.to_string(),
            failure_count: 1,
            first_failed_at: now,
            last_failed_at: now,
        };
        let id = letter.id;

        tracing::error!(
            dead_letter_id = %id,
            notification_type = letter.message.notification_type.as_str(),
            reference_id = %letter.message.reference_id,
            error = %error,
            escalation = "operator",
            "Adding notification to Dead Letter Queue"
        );

        self.append(letter);
        id
    }

    /// Remove a letter for redelivery
    pub fn take(&self, id: Uuid) -> Option<DeadLetter> {
        let mut letters = self.lock();
        let index = letters.iter().position(|letter| letter.id == id)?;
        letters.remove(index)
    }

    /// Put back a letter whose redelivery failed again
    pub fn restore(&self, mut letter: DeadLetter, error: &str) {
        letter.failure_count += 1;
        letter.last_failed_at = Utc::now();
        letter.error_message = error.to_string();

        tracing::warn!(
            dead_letter_id = %letter.id,
            failure_count = letter.failure_count,
            error = %error,
            "Redelivery failed, notification returned to Dead Letter Queue"
        );

        self.append(letter);
    }

    fn append(&self, letter: DeadLetter) {
        let mut letters = self.lock();
        while letters.len() >= self.capacity {
            let Some(evicted) = letters.pop_front() else {
                break;
            };
            tracing::error!(
                dead_letter_id = %evicted.id,
                notification_type = evicted.message.notification_type.as_str(),
                reference_id = %evicted.message.reference_id,
                capacity = self.capacity,
                escalation = "operator",
                "Dead Letter Queue full, oldest notification dropped"
            );
        }
        letters.push_back(letter);
    }

    pub fn list(&self, limit: usize) -> Vec<DeadLetter> {
        self.lock().iter().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> DlqStats {
        let letters = self.lock();
        let mut by_notification_type = HashMap::new();
        for letter in letters.iter() {
            *by_notification_type
                .entry(letter.message.notification_type.as_str().to_string())
                .or_insert(0) += 1;
        }

        DlqStats {
            total_messages: letters.len(),
            by_notification_type,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<DeadLetter>> {
        self.letters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
