//! Quota and access checks, consulted only when a document is created.

use chrono::{NaiveTime, Utc};

use crate::config::{AccessConfig, PlanConfig};
use crate::db::{document_repo, Database, DatabaseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allowed,
    Denied { reason: String },
}

pub trait AccessGate: Send + Sync {
    fn can_create_job(&self, actor: &str) -> Result<GateDecision, DatabaseError>;

    /// Largest `targetChars` the actor may request.
    fn char_limit(&self, actor: &str) -> u32;
}

/// Plan table from config. The daily limit counts documents created since UTC midnight.
pub struct PlanAccessGate {
    db: Database,
    access: AccessConfig,
}

impl PlanAccessGate {
    pub fn new(db: Database, access: AccessConfig) -> Self {
        Self { db, access }
    }

    /// The actor's plan, falling back to the default plan. `None` only if the
    /// config names a plan it does not define (rejected at load time).
    pub fn plan_for(&self, actor: &str) -> Option<(&str, &PlanConfig)> {
        let name = self
            .access
            .actors
            .get(actor)
            .unwrap_or(&self.access.default_plan);
        self.access
            .plans
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
    }
}

impl AccessGate for PlanAccessGate {
    fn can_create_job(&self, actor: &str) -> Result<GateDecision, DatabaseError> {
        let Some((plan_name, plan)) = self.plan_for(actor) else {
            return Ok(GateDecision::Denied {
                reason: format!("No plan configured for actor '{}'", actor),
            });
        };

        let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();
        let used = document_repo::count_created_since(&self.db, actor, midnight)?;
        if used >= u64::from(plan.daily_jobs) {
            return Ok(GateDecision::Denied {
                reason: format!(
                    "Daily limit of {} document(s) reached on plan '{}'",
                    plan.daily_jobs, plan_name
                ),
            });
        }
        Ok(GateDecision::Allowed)
    }

    fn char_limit(&self, actor: &str) -> u32 {
        self.plan_for(actor).map(|(_, p)| p.char_limit).unwrap_or(0)
    }
}

/// Lets everything through. For tests and single-user offline runs.
pub struct OpenGate {
    pub char_limit: u32,
}

impl Default for OpenGate {
    fn default() -> Self {
        Self {
            char_limit: u32::MAX,
        }
    }
}

impl AccessGate for OpenGate {
    fn can_create_job(&self, _actor: &str) -> Result<GateDecision, DatabaseError> {
        Ok(GateDecision::Allowed)
    }

    fn char_limit(&self, _actor: &str) -> u32 {
        self.char_limit
    }
}
