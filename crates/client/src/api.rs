// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed wrappers over the platform's CRUD endpoints: doctor directory,
//! appointments, notifications, report upload. These are thin by design;
//! session handling, interception, and caching all live in the layers
//! underneath.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{Cache, CacheOptions};
use crate::error::ApiError;
use crate::http::ApiClient;
use crate::storage::Scope;

/// Cache key for the full doctor listing.
const DOCTORS_KEY: &str = "doctors_list";
/// Doctor listings change rarely; five minutes keeps browsing snappy.
const DOCTORS_TTL: Duration = Duration::from_secs(300);
const NOTIFICATIONS_KEY: &str = "notifications_list";
const NOTIFICATIONS_TTL: Duration = Duration::from_secs(30);
const APPOINTMENTS_PREFIX: &str = "appointments_";
const APPOINTMENTS_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub specialty: String,
    pub city: String,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default, alias = "consultationFee")]
    pub consultation_fee: Option<u32>,
}

/// Doctor listings, cached under a durable key.
pub struct DoctorDirectory {
    api: Arc<ApiClient>,
    cache: Arc<Cache>,
}

impl DoctorDirectory {
    pub fn new(api: Arc<ApiClient>, cache: Arc<Cache>) -> Self {
        Self { api, cache }
    }

    /// Full listing, served from cache while fresh.
    pub async fn list(&self) -> Result<Vec<Doctor>, ApiError> {
        self.cache
            .get_or_fetch(DOCTORS_KEY, CacheOptions::ttl(DOCTORS_TTL), || async {
                self.api.get("/api/doctors").await
            })
            .await
    }

    /// Listing with the cache bypassed and refreshed.
    pub async fn list_fresh(&self) -> Result<Vec<Doctor>, ApiError> {
        let doctors: Vec<Doctor> = self.api.get("/api/doctors").await?;
        self.cache.set(DOCTORS_KEY, &doctors, CacheOptions::ttl(DOCTORS_TTL));
        Ok(doctors)
    }

    /// Filtered search; uncached, the combinations are too sparse to help.
    pub async fn search(
        &self,
        specialty: Option<&str>,
        city: Option<&str>,
    ) -> Result<Vec<Doctor>, ApiError> {
        let mut query = Vec::new();
        if let Some(s) = specialty {
            query.push(("specialty", s.to_owned()));
        }
        if let Some(c) = city {
            query.push(("city", c.to_owned()));
        }
        self.api.get_with_query("/api/doctors", &query).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "doctorId")]
    pub doctor_id: String,
    #[serde(alias = "patientId")]
    pub patient_id: String,
    #[serde(alias = "startsAt")]
    pub starts_at_ms: u64,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAppointment {
    #[serde(rename = "doctorId")]
    pub doctor_id: String,
    #[serde(rename = "startsAt")]
    pub starts_at_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Appointment CRUD. Mutations invalidate the cached listings.
pub struct Appointments {
    api: Arc<ApiClient>,
    cache: Arc<Cache>,
}

impl Appointments {
    pub fn new(api: Arc<ApiClient>, cache: Arc<Cache>) -> Self {
        Self { api, cache }
    }

    pub async fn list_mine(&self) -> Result<Vec<Appointment>, ApiError> {
        self.cache
            .get_or_fetch(
                "appointments_mine",
                CacheOptions::session_ttl(APPOINTMENTS_TTL),
                || async { self.api.get("/api/appointments").await },
            )
            .await
    }

    pub async fn book(&self, appointment: &NewAppointment) -> Result<Appointment, ApiError> {
        let booked = self.api.post("/api/appointments", appointment).await?;
        self.cache.invalidate_prefix(APPOINTMENTS_PREFIX);
        Ok(booked)
    }

    pub async fn cancel(&self, id: &str) -> Result<Appointment, ApiError> {
        let cancelled = self.api.delete(&format!("/api/appointments/{id}")).await?;
        self.cache.invalidate_prefix(APPOINTMENTS_PREFIX);
        Ok(cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationItem {
    #[serde(alias = "_id")]
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(alias = "createdAt")]
    pub created_at_ms: u64,
}

/// Notification list and read-state updates.
pub struct Notifications {
    api: Arc<ApiClient>,
    cache: Arc<Cache>,
}

impl Notifications {
    pub fn new(api: Arc<ApiClient>, cache: Arc<Cache>) -> Self {
        Self { api, cache }
    }

    pub async fn list(&self) -> Result<Vec<NotificationItem>, ApiError> {
        self.cache
            .get_or_fetch(
                NOTIFICATIONS_KEY,
                CacheOptions::session_ttl(NOTIFICATIONS_TTL),
                || async { self.api.get("/api/notifications").await },
            )
            .await
    }

    pub async fn mark_read(&self, id: &str) -> Result<(), ApiError> {
        let _: Option<serde_json::Value> =
            self.api.put(&format!("/api/notifications/{id}/read"), &serde_json::json!({})).await?;
        self.cache.remove(NOTIFICATIONS_KEY, Scope::Session);
        Ok(())
    }

    pub async fn mark_all_read(&self) -> Result<(), ApiError> {
        let _: Option<serde_json::Value> =
            self.api.put("/api/notifications/read-all", &serde_json::json!({})).await?;
        self.cache.remove(NOTIFICATIONS_KEY, Scope::Session);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedReport {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(alias = "fileName")]
    pub file_name: String,
    pub url: String,
}

/// Medical report upload (multipart form).
pub struct Reports {
    api: Arc<ApiClient>,
}

impl Reports {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
        mime: &str,
    ) -> Result<UploadedReport, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_owned())
            .mime_str(mime)
            .map_err(|e| ApiError::Network(format!("invalid mime type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("report", part);
        self.api.post_multipart("/api/reports", form).await
    }
}
