//! SQLite export of a finished simulation.
//!
//! RULE: Only store.rs talks to the database.
//! The engine never touches it; sim-runner hands over a finished
//! `SimulationOutput` and everything is written in one transaction.

use anyhow::{Context, Result};
use escortsim_core::{
    config::SimConfig,
    event::event_type_name,
    monte_carlo::{ScenarioBand, SimulationOutput},
};
use rusqlite::{params, Connection};
use serde::Serialize;

pub struct ExportStore {
    conn: Connection,
}

impl ExportStore {
    /// Open (or create) the export database at `path`.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path).with_context(|| format!("Cannot open {path}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_export.sql"))?;
        Ok(())
    }

    /// Write one run and return its generated run id.
    pub fn export(&mut self, config: &SimConfig, output: &SimulationOutput) -> Result<String> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let tx = self.conn.transaction()?;

        // ── Run ────────────────────────────────────────────────────
        tx.execute(
            "INSERT INTO run (run_id, seed, total_days, num_trials, reference_trial, completed, failed,
                              final_gmv, annualized_gmv, version, started_at, config_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run_id,
                config.random_seed as i64,
                config.total_days,
                config.num_trials,
                output.reference_trial,
                output.completed_trials as i64,
                output.failed_trials as i64,
                output.final_gmv,
                output.annualized_gmv,
                env!("CARGO_PKG_VERSION"),
                chrono::Utc::now().to_rfc3339(),
                serde_json::to_string(config)?,
            ],
        )?;

        // ── Snapshots ──────────────────────────────────────────────
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cohort_snapshot (run_id, day, total_users, active, at_risk, silent, churned,
                     repeat_order_rate, nps, orders, matched, match_success_rate, complaint_rate,
                     gmv, compensation, cumulative_gmv, servable_escorts, recruited, departed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
            )?;
            for s in &output.snapshots {
                stmt.execute(params![
                    run_id,
                    s.day as i64,
                    s.total_users,
                    s.active,
                    s.at_risk,
                    s.silent,
                    s.churned,
                    s.repeat_order_rate,
                    s.nps,
                    s.orders,
                    s.matched,
                    s.match_success_rate,
                    s.complaint_rate,
                    s.gmv,
                    s.compensation,
                    s.cumulative_gmv,
                    s.servable_escorts,
                    s.recruited,
                    s.departed,
                ])?;
            }
        }

        // ── Orders ─────────────────────────────────────────────────
        {
            let mut stmt = tx.prepare(
                "INSERT INTO order_log (run_id, order_id, day, user_id, district, state, tier,
                     escort_id, commute_minutes, gmv, complaint, complaint_type, compensation)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            )?;
            for o in &output.order_log {
                let tier = o.tier.map(|t| label(&t)).transpose()?;
                stmt.execute(params![
                    run_id,
                    o.id.to_string(),
                    o.day as i64,
                    o.user.to_string(),
                    label(&o.district)?,
                    label(&o.state)?,
                    tier,
                    o.escort.map(|e| e.to_string()),
                    o.commute_minutes,
                    o.net_gmv(),
                    o.complaint,
                    o.complaint_type.map(|k| k.as_str()),
                    o.compensation,
                ])?;
            }
        }

        // ── Events ─────────────────────────────────────────────────
        {
            let mut stmt = tx.prepare(
                "INSERT INTO event_log (run_id, day, subsystem, event_type, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for entry in &output.event_log {
                stmt.execute(params![
                    run_id,
                    entry.day as i64,
                    entry.subsystem,
                    event_type_name(&entry.event),
                    serde_json::to_string(&entry.event)?,
                ])?;
            }
        }

        // ── Scenario bands ─────────────────────────────────────────
        {
            let b = &output.scenario_bands;
            let bands: [(&str, &ScenarioBand); 6] = [
                ("final_gmv", &b.final_gmv),
                ("annualized_gmv", &b.annualized_gmv),
                ("final_active_users", &b.final_active_users),
                ("final_churned_users", &b.final_churned_users),
                ("mean_match_success", &b.mean_match_success),
                ("final_nps", &b.final_nps),
            ];
            let mut stmt = tx.prepare(
                "INSERT INTO scenario_band (run_id, metric, conservative, neutral, optimistic)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (metric, band) in bands {
                stmt.execute(params![run_id, metric, band.conservative, band.neutral, band.optimistic])?;
            }
        }

        tx.commit()?;
        log::info!(
            "export: run={run_id} snapshots={} orders={} events={}",
            output.snapshots.len(), output.order_log.len(), output.event_log.len()
        );
        Ok(run_id)
    }

    pub fn count(&self, table: &str, run_id: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table} WHERE run_id = ?1");
        Ok(self.conn.query_row(&sql, params![run_id], |row| row.get(0))?)
    }
}

/// The serde name of a unit enum variant, e.g. `Matched` -> "matched".
fn label<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}
