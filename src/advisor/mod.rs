//! Remote advisor client (C7): an optional, cache-backed, fail-safe
//! text-advisor integration.
//!
//! Grounded in `original_source/services/llm_client.py`: the Ollama-style
//! chat endpoint, the `_llm_cache`/`_pending` maps, the 1.8s TTL, the
//! 30-call probe cadence, and the deterministic fallback. Transport detail
//! is SPEC_FULL.md §4.7.1; resolution ordering is §4.7.

mod json_repair;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::agent::{deterministic_decision, Action, MemoryEntry};
use crate::config::Config;
use crate::constants::{
    ADVISOR_CACHE_TTL_SECS, ADVISOR_DECISION_TIMEOUT_SECS, ADVISOR_PROBE_INTERVAL_CALLS,
    ADVISOR_PROBE_TIMEOUT_SECS,
};
use crate::vehicle::Vehicle;

#[derive(Debug, Clone, Serialize)]
struct PeerView {
    id: String,
    ttc: f64,
    priority: crate::vehicle::Priority,
    direction: crate::geometry::Direction,
    intent: crate::vehicle::Intent,
    speed_kmh: f64,
    no_stop: bool,
}

#[derive(Debug, Clone, Serialize)]
struct SelfView {
    ttc: f64,
    priority: crate::vehicle::Priority,
    direction: crate::geometry::Direction,
    intent: crate::vehicle::Intent,
    speed_kmh: f64,
    distance: f64,
    no_stop: bool,
}

#[derive(Debug, Clone, Serialize)]
struct AdvisorRequest {
    my_state: SelfView,
    others: Vec<PeerView>,
    recent_memory: Vec<MemoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct AdvisorResponseBody {
    action: String,
    reason: String,
}

fn parse_action(s: &str) -> Option<Action> {
    match s.to_ascii_uppercase().as_str() {
        "GO" => Some(Action::Go),
        "YIELD" => Some(Action::Yield),
        "BRAKE" => Some(Action::Brake),
        _ => None,
    }
}

struct CacheEntry {
    action: Action,
    reason: String,
    installed_at: Instant,
}

/// Shared slot a background job writes its result into; `None` while the
/// job is still in flight.
type PendingSlot = Arc<Mutex<Option<(Action, String)>>>;

pub struct AdvisorClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    available: AtomicBool,
    invocation_count: AtomicU64,
    cache: Mutex<HashMap<String, CacheEntry>>,
    pending: Mutex<HashMap<String, PendingSlot>>,
    worker_permits: Arc<tokio::sync::Semaphore>,
    runtime: tokio::runtime::Handle,
}

impl AdvisorClient {
    pub fn new(config: &Config, runtime: tokio::runtime::Handle) -> Arc<Self> {
        let client = Arc::new(AdvisorClient {
            http: reqwest::Client::new(),
            base_url: config.advisor_base_url.clone(),
            model: config.advisor_model.clone(),
            available: AtomicBool::new(false),
            invocation_count: AtomicU64::new(0),
            cache: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            worker_permits: Arc::new(tokio::sync::Semaphore::new(config.advisor_worker_pool_size)),
            runtime,
        });
        client.spawn_probe();
        client
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn spawn_probe(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.runtime.spawn(async move {
            let ok = this.probe_once().await;
            this.available.store(ok, Ordering::Relaxed);
        });
    }

    async fn probe_once(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let result = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(ADVISOR_PROBE_TIMEOUT_SECS))
            .send()
            .await;
        match result {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                log::debug!("advisor probe failed: {e}");
                false
            }
        }
    }

    /// Synchronous resolution entry point, called from the tick loop. Never
    /// blocks: at worst it reads a mutex guarding in-memory maps.
    pub fn resolve(
        self: &Arc<Self>,
        vehicle_id: &str,
        me: &Vehicle,
        neighbors: &[&Vehicle],
        recent_memory: &[MemoryEntry],
        fallback_action: Action,
        fallback_reason: String,
    ) -> (Action, String) {
        let count = self.invocation_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % ADVISOR_PROBE_INTERVAL_CALLS == 0 {
            self.spawn_probe();
        }

        if let Some(entry) = self.cache.lock().unwrap().get(vehicle_id) {
            if entry.installed_at.elapsed().as_secs_f64() < ADVISOR_CACHE_TTL_SECS {
                return (entry.action, entry.reason.clone());
            }
        }

        if !self.is_available() {
            return (fallback_action, fallback_reason);
        }

        let pending_result = self
            .pending
            .lock()
            .unwrap()
            .get(vehicle_id)
            .and_then(|slot| slot.lock().unwrap().clone());

        if let Some((action, reason)) = pending_result {
            self.pending.lock().unwrap().remove(vehicle_id);
            self.cache.lock().unwrap().insert(
                vehicle_id.to_string(),
                CacheEntry {
                    action,
                    reason: reason.clone(),
                    installed_at: Instant::now(),
                },
            );
            return (action, reason);
        }

        let has_pending = self.pending.lock().unwrap().contains_key(vehicle_id);
        if has_pending {
            return self.stale_or_fallback(vehicle_id, fallback_action, fallback_reason);
        }

        self.submit_job(
            vehicle_id,
            me,
            neighbors,
            recent_memory,
            fallback_action,
            fallback_reason.clone(),
        );
        self.stale_or_fallback(vehicle_id, fallback_action, fallback_reason)
    }

    fn stale_or_fallback(
        &self,
        vehicle_id: &str,
        fallback_action: Action,
        fallback_reason: String,
    ) -> (Action, String) {
        if let Some(entry) = self.cache.lock().unwrap().get(vehicle_id) {
            return (entry.action, entry.reason.clone());
        }
        (fallback_action, fallback_reason)
    }

    fn submit_job(
        self: &Arc<Self>,
        vehicle_id: &str,
        me: &Vehicle,
        neighbors: &[&Vehicle],
        recent_memory: &[MemoryEntry],
        fallback_action: Action,
        fallback_reason: String,
    ) {
        let slot: PendingSlot = Arc::new(Mutex::new(None));
        self.pending
            .lock()
            .unwrap()
            .insert(vehicle_id.to_string(), Arc::clone(&slot));

        let request = build_request(me, neighbors, recent_memory);
        let http = self.http.clone();
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let model = self.model.clone();
        let permits = Arc::clone(&self.worker_permits);
        let this = Arc::clone(self);
        let vehicle_id = vehicle_id.to_string();

        self.runtime.spawn(async move {
            let _permit = match permits.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return,
            };
            let decision = request_decision(&http, &url, &model, &request).await;
            let (action, reason) = decision.unwrap_or_else(|| {
                log::debug!("advisor response for {vehicle_id} unusable, marking unavailable");
                this.available.store(false, Ordering::Relaxed);
                (fallback_action, fallback_reason)
            });
            *slot.lock().unwrap() = Some((action, reason));
        });
    }
}

fn build_request(me: &Vehicle, neighbors: &[&Vehicle], recent_memory: &[MemoryEntry]) -> AdvisorRequest {
    let ttc_me = crate::arbiter::tta(me);
    AdvisorRequest {
        my_state: SelfView {
            ttc: ttc_me,
            priority: me.priority,
            direction: me.direction,
            intent: me.intent,
            speed_kmh: me.speed_kmh(),
            distance: me.distance_to_center(),
            no_stop: me.no_stop,
        },
        others: neighbors
            .iter()
            .map(|o| PeerView {
                id: o.id.clone(),
                ttc: crate::arbiter::tta(o),
                priority: o.priority,
                direction: o.direction,
                intent: o.intent,
                speed_kmh: o.speed_kmh(),
                no_stop: o.no_stop,
            })
            .collect(),
        recent_memory: recent_memory.to_vec(),
    }
}

async fn request_decision(
    http: &reqwest::Client,
    url: &str,
    model: &str,
    request: &AdvisorRequest,
) -> Option<(Action, String)> {
    let body = serde_json::json!({
        "model": model,
        "stream": false,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": serde_json::to_string(request).ok()?},
        ],
    });

    let resp = http
        .post(url)
        .json(&body)
        .timeout(Duration::from_secs(ADVISOR_DECISION_TIMEOUT_SECS))
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let value: serde_json::Value = resp.json().await.ok()?;
    let content = value.get("message")?.get("content")?.as_str()?;
    let repaired = json_repair::repair_json(content)?;
    let parsed: AdvisorResponseBody = serde_json::from_str(&repaired).ok()?;
    let action = parse_action(&parsed.action)?;
    Some((action, parsed.reason))
}

/// Instructs the advisor to answer only with the `{action, reason}` contract
/// and to phrase `reason` in Romanian, matching the deployed advisor's
/// target language.
const SYSTEM_PROMPT: &str = concat!(
    "You are a V2X intersection advisor. Given my_state, others and recent_memory, ",
    "respond ONLY with a compact JSON object {\"action\": \"GO\"|\"YIELD\"|\"BRAKE\", \"reason\": \"...\"}. ",
    "Write reason as a short phrase in Romanian."
);

/// Exposed so tests can exercise the same fallback path used in production
/// without standing up an HTTP server.
pub fn deterministic_fallback(me: &Vehicle, neighbors: &[&Vehicle]) -> (Action, String) {
    deterministic_decision(me, neighbors)
}
