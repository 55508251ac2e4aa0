use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use uuid::Uuid;

use super::decay::{decay_factor, similarity_weight};
use super::key::pattern_key;
use super::types::{
    Decision, ImportSummary, LearningBundle, LearningDecision, LearningDomain, LearningPattern,
    BUNDLE_FORMAT_VERSION,
};
use super::LearningError;
use crate::config::{LearningConfig, MIN_OBSERVATIONS_FLOOR};
use crate::db::{open_database, open_memory_database, DatabaseError};
use crate::pipeline::checkers::{ConfidenceFn, ConfidenceProvider};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Persistent, domain-isolated record of user corrections.
///
/// A single connection behind a mutex serializes writers; each record is one
/// transaction holding the pattern upsert and the decision insert.
pub struct LearningStore {
    conn: Mutex<Connection>,
    config: LearningConfig,
}

impl LearningStore {
    pub fn open(path: &Path, config: LearningConfig) -> Result<Self, LearningError> {
        Ok(Self::from_connection(open_database(path)?, config))
    }

    pub fn in_memory(config: LearningConfig) -> Result<Self, LearningError> {
        Ok(Self::from_connection(open_memory_database()?, config))
    }

    /// Wrap a connection whose schema is already migrated.
    pub fn from_connection(conn: Connection, config: LearningConfig) -> Self {
        Self {
            conn: Mutex::new(conn),
            config,
        }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LearningError> {
        self.conn.lock().map_err(|_| LearningError::LockPoisoned)
    }

    pub fn record(
        &self,
        domain: LearningDomain,
        category: &str,
        candidate: &str,
        decision: Decision,
        context: &[String],
    ) -> Result<LearningDecision, LearningError> {
        self.record_at(domain, category, candidate, decision, context, Utc::now())
    }

    /// `record` with an explicit timestamp.
    pub fn record_at(
        &self,
        domain: LearningDomain,
        category: &str,
        candidate: &str,
        decision: Decision,
        context: &[String],
        at: DateTime<Utc>,
    ) -> Result<LearningDecision, LearningError> {
        let key = pattern_key(category, candidate).ok_or(LearningError::EmptyCandidate)?;
        let recorded = LearningDecision {
            id: Uuid::new_v4(),
            domain,
            pattern_key: key,
            decision,
            context: context.to_vec(),
            recorded_at: at,
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        apply_decision(&tx, &recorded)?;
        tx.commit()?;

        tracing::debug!(
            domain = domain.as_str(),
            key = %recorded.pattern_key,
            decision = decision.as_str(),
            "Learning decision recorded"
        );
        Ok(recorded)
    }

    pub fn query_confidence(
        &self,
        domain: LearningDomain,
        category: &str,
        candidate: &str,
        context: &[String],
    ) -> Result<f32, LearningError> {
        self.query_confidence_at(domain, category, candidate, context, Utc::now())
    }

    /// Confidence delta in `[-max_adjustment, max_adjustment]` as of `now`.
    /// Zero for unknown patterns and for patterns under the observation
    /// threshold.
    pub fn query_confidence_at(
        &self,
        domain: LearningDomain,
        category: &str,
        candidate: &str,
        context: &[String],
        now: DateTime<Utc>,
    ) -> Result<f32, LearningError> {
        let Some(key) = pattern_key(category, candidate) else {
            return Ok(0.0);
        };
        let Some(pattern) = self.pattern(domain, &key)? else {
            return Ok(0.0);
        };
        let observations = pattern.observations();
        if observations < self.config.min_observations.max(MIN_OBSERVATIONS_FLOOR) {
            return Ok(0.0);
        }

        let similarity = if context.is_empty() {
            1.0
        } else {
            let stored: Vec<Vec<String>> = self
                .decisions(domain, &key)?
                .into_iter()
                .map(|d| d.context)
                .collect();
            similarity_weight(context, &stored)
        };
        let elapsed_days = (now - pattern.last_updated).num_milliseconds() as f64 / MILLIS_PER_DAY;
        let decay = decay_factor(elapsed_days, self.config.half_life_days);
        let balance =
            (f64::from(pattern.accept_count) - f64::from(pattern.reject_count)) / f64::from(observations);
        let max = f64::from(self.config.max_adjustment);

        let delta = (balance * max * decay * similarity).clamp(-max, max);
        Ok(delta as f32)
    }

    pub fn pattern(&self, domain: LearningDomain, key: &str) -> Result<Option<LearningPattern>, LearningError> {
        let conn = self.lock()?;
        let pattern = conn
            .query_row(
                "SELECT domain, pattern_key, accept_count, reject_count, first_seen, last_updated
                 FROM learning_patterns WHERE domain = ?1 AND pattern_key = ?2",
                params![domain.as_str(), key],
                |row| Ok(pattern_row(row)),
            )
            .optional()?;
        pattern.transpose()
    }

    pub fn patterns(&self, domain: LearningDomain) -> Result<Vec<LearningPattern>, LearningError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT domain, pattern_key, accept_count, reject_count, first_seen, last_updated
             FROM learning_patterns WHERE domain = ?1 ORDER BY pattern_key",
        )?;
        let rows = stmt.query_map([domain.as_str()], |row| Ok(pattern_row(row)))?;
        let mut patterns = Vec::new();
        for row in rows {
            patterns.push(row??);
        }
        Ok(patterns)
    }

    pub fn decisions(&self, domain: LearningDomain, key: &str) -> Result<Vec<LearningDecision>, LearningError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, domain, pattern_key, decision, context, recorded_at
             FROM learning_decisions WHERE domain = ?1 AND pattern_key = ?2
             ORDER BY recorded_at, id",
        )?;
        let rows = stmt.query_map(params![domain.as_str(), key], |row| Ok(decision_row(row)))?;
        let mut decisions = Vec::new();
        for row in rows {
            decisions.push(row??);
        }
        Ok(decisions)
    }

    fn domain_decisions(&self, domain: LearningDomain) -> Result<Vec<LearningDecision>, LearningError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, domain, pattern_key, decision, context, recorded_at
             FROM learning_decisions WHERE domain = ?1 ORDER BY recorded_at, id",
        )?;
        let rows = stmt.query_map([domain.as_str()], |row| Ok(decision_row(row)))?;
        let mut decisions = Vec::new();
        for row in rows {
            decisions.push(row??);
        }
        Ok(decisions)
    }

    /// Snapshot of `domains` (every domain when empty).
    pub fn export_bundle(&self, domains: &[LearningDomain]) -> Result<LearningBundle, LearningError> {
        let domains: BTreeSet<LearningDomain> = if domains.is_empty() {
            LearningDomain::ALL.into_iter().collect()
        } else {
            domains.iter().copied().collect()
        };
        let mut patterns = Vec::new();
        let mut decisions = Vec::new();
        for domain in domains {
            patterns.extend(self.patterns(domain)?);
            decisions.extend(self.domain_decisions(domain)?);
        }
        tracing::info!(
            patterns = patterns.len(),
            decisions = decisions.len(),
            "Learning bundle exported"
        );
        Ok(LearningBundle {
            format_version: BUNDLE_FORMAT_VERSION,
            exported_at: Utc::now(),
            patterns,
            decisions,
        })
    }

    /// Merge a bundle. Decisions are the source of truth: unknown ids are
    /// inserted and folded into their pattern. A bundle pattern without
    /// decisions is only taken when the key is new locally. Importing the
    /// same bundle again changes nothing.
    pub fn import_bundle(&self, bundle: &LearningBundle) -> Result<ImportSummary, LearningError> {
        if bundle.format_version != BUNDLE_FORMAT_VERSION {
            return Err(LearningError::UnsupportedBundleVersion(bundle.format_version));
        }

        let mut summary = ImportSummary::default();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        for decision in &bundle.decisions {
            if decision.pattern_key.is_empty() {
                return Err(LearningError::EmptyCandidate);
            }
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM learning_decisions WHERE id = ?1)",
                [decision.id.to_string()],
                |row| row.get(0),
            )?;
            if exists {
                summary.decisions_skipped += 1;
                continue;
            }
            apply_decision(&tx, decision)?;
            summary.decisions_imported += 1;
        }

        let with_decisions: BTreeSet<(LearningDomain, &str)> = bundle
            .decisions
            .iter()
            .map(|d| (d.domain, d.pattern_key.as_str()))
            .collect();
        for pattern in &bundle.patterns {
            if with_decisions.contains(&(pattern.domain, pattern.key.as_str())) {
                continue;
            }
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO learning_patterns
                 (domain, pattern_key, accept_count, reject_count, first_seen, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    pattern.domain.as_str(),
                    pattern.key,
                    pattern.accept_count,
                    pattern.reject_count,
                    timestamp(&pattern.first_seen),
                    timestamp(&pattern.last_updated),
                ],
            )?;
            if inserted > 0 {
                summary.patterns_created += 1;
            } else {
                summary.patterns_skipped += 1;
            }
        }

        tx.commit()?;
        tracing::info!(
            imported = summary.decisions_imported,
            skipped = summary.decisions_skipped,
            patterns_created = summary.patterns_created,
            "Learning bundle imported"
        );
        Ok(summary)
    }

    pub fn export_to_path(&self, path: &Path, domains: &[LearningDomain]) -> Result<LearningBundle, LearningError> {
        let bundle = self.export_bundle(domains)?;
        let json = serde_json::to_string_pretty(&bundle)?;
        std::fs::write(path, json)?;
        Ok(bundle)
    }

    pub fn import_from_path(&self, path: &Path) -> Result<ImportSummary, LearningError> {
        let raw = std::fs::read_to_string(path)?;
        let bundle: LearningBundle = serde_json::from_str(&raw)?;
        self.import_bundle(&bundle)
    }

    /// Confidence adapter for one domain.
    pub fn confidence_fn(&self, domain: LearningDomain) -> StoreConfidence<'_> {
        StoreConfidence { store: self, domain }
    }
}

/// Upsert the decision's pattern, then insert the decision itself.
fn apply_decision(tx: &Transaction<'_>, decision: &LearningDecision) -> Result<(), LearningError> {
    let (accepts, rejects) = match decision.decision {
        Decision::Accept => (1, 0),
        Decision::Reject => (0, 1),
    };
    let at = timestamp(&decision.recorded_at);
    tx.execute(
        "INSERT INTO learning_patterns
         (domain, pattern_key, accept_count, reject_count, first_seen, last_updated)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(domain, pattern_key) DO UPDATE SET
             accept_count = accept_count + excluded.accept_count,
             reject_count = reject_count + excluded.reject_count,
             first_seen = MIN(first_seen, excluded.first_seen),
             last_updated = MAX(last_updated, excluded.last_updated)",
        params![decision.domain.as_str(), decision.pattern_key, accepts, rejects, at],
    )?;
    tx.execute(
        "INSERT INTO learning_decisions (id, domain, pattern_key, decision, context, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            decision.id.to_string(),
            decision.domain.as_str(),
            decision.pattern_key,
            decision.decision.as_str(),
            serde_json::to_string(&decision.context)?,
            at,
        ],
    )?;
    Ok(())
}

/// Fixed-width RFC 3339 so text comparison in SQL orders correctly.
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn corrupt(table: &str, reason: impl Into<String>) -> LearningError {
    LearningError::Database(DatabaseError::CorruptRow {
        table: table.to_string(),
        reason: reason.into(),
    })
}

fn parse_timestamp(table: &str, raw: &str) -> Result<DateTime<Utc>, LearningError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(table, format!("bad timestamp {raw}: {e}")))
}

fn parse_domain(table: &str, raw: &str) -> Result<LearningDomain, LearningError> {
    raw.parse().map_err(|e: String| corrupt(table, e))
}

fn pattern_row(row: &Row<'_>) -> Result<LearningPattern, LearningError> {
    const TABLE: &str = "learning_patterns";
    let domain: String = row.get(0)?;
    let first_seen: String = row.get(4)?;
    let last_updated: String = row.get(5)?;
    Ok(LearningPattern {
        domain: parse_domain(TABLE, &domain)?,
        key: row.get(1)?,
        accept_count: row.get(2)?,
        reject_count: row.get(3)?,
        first_seen: parse_timestamp(TABLE, &first_seen)?,
        last_updated: parse_timestamp(TABLE, &last_updated)?,
    })
}

fn decision_row(row: &Row<'_>) -> Result<LearningDecision, LearningError> {
    const TABLE: &str = "learning_decisions";
    let id: String = row.get(0)?;
    let domain: String = row.get(1)?;
    let decision: String = row.get(3)?;
    let context: String = row.get(4)?;
    let recorded_at: String = row.get(5)?;
    Ok(LearningDecision {
        id: Uuid::parse_str(&id).map_err(|e| corrupt(TABLE, format!("bad id {id}: {e}")))?,
        domain: parse_domain(TABLE, &domain)?,
        pattern_key: row.get(2)?,
        decision: decision.parse().map_err(|e: String| corrupt(TABLE, e))?,
        context: serde_json::from_str(&context)
            .map_err(|e| corrupt(TABLE, format!("bad context: {e}")))?,
        recorded_at: parse_timestamp(TABLE, &recorded_at)?,
    })
}

/// `ConfidenceFn` over the store. Query errors count as "nothing learned".
pub struct StoreConfidence<'a> {
    store: &'a LearningStore,
    domain: LearningDomain,
}

impl ConfidenceFn for StoreConfidence<'_> {
    fn delta(&self, category: &str, candidate: &str, context: &[String]) -> f32 {
        match self
            .store
            .query_confidence(self.domain, category, candidate, context)
        {
            Ok(delta) => delta,
            Err(e) => {
                tracing::warn!(domain = self.domain.as_str(), error = %e, "Learning query failed");
                0.0
            }
        }
    }
}

impl ConfidenceProvider for LearningStore {
    fn confidence_fn(&self, domain: LearningDomain) -> Box<dyn ConfidenceFn + '_> {
        Box::new(LearningStore::confidence_fn(self, domain))
    }
}

/// Patterns per domain, for summaries.
pub fn pattern_counts(store: &LearningStore) -> Result<BTreeMap<LearningDomain, usize>, LearningError> {
    LearningDomain::ALL
        .into_iter()
        .map(|d| Ok((d, store.patterns(d)?.len())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn store() -> LearningStore {
        LearningStore::in_memory(LearningConfig::default()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    const D: LearningDomain = LearningDomain::DocumentFindings;

    #[test]
    fn one_observation_has_no_effect_two_do() {
        let s = store();
        s.record_at(D, "PASSIVE-001", "was written", Decision::Reject, &[], now())
            .unwrap();
        assert_eq!(s.query_confidence_at(D, "PASSIVE-001", "was written", &[], now()).unwrap(), 0.0);

        s.record_at(D, "PASSIVE-001", "Was Written", Decision::Reject, &[], now())
            .unwrap();
        let delta = s
            .query_confidence_at(D, "PASSIVE-001", "was written", &[], now())
            .unwrap();
        assert!((delta + 0.4).abs() < 1e-6, "delta = {delta}");
    }

    #[test]
    fn lowered_threshold_still_ignores_a_single_observation() {
        let s = LearningStore::in_memory(LearningConfig {
            min_observations: 1,
            ..LearningConfig::default()
        })
        .unwrap();
        s.record_at(D, "WEAK-001", "adequate", Decision::Reject, &[], now()).unwrap();
        assert_eq!(s.query_confidence_at(D, "WEAK-001", "adequate", &[], now()).unwrap(), 0.0);
    }

    #[test]
    fn mixed_decisions_partially_cancel() {
        let s = store();
        for decision in [Decision::Accept, Decision::Accept, Decision::Accept, Decision::Reject] {
            s.record_at(D, "WEAK-001", "adequate", decision, &[], now()).unwrap();
        }
        let delta = s.query_confidence_at(D, "WEAK-001", "adequate", &[], now()).unwrap();
        assert!((delta - 0.2).abs() < 1e-6);
    }

    #[test]
    fn contribution_decays_with_time() {
        let s = store();
        for _ in 0..2 {
            s.record_at(D, "REQ-001", "will", Decision::Accept, &[], now()).unwrap();
        }
        let mut last = f32::MAX;
        for days in [0, 1, 10, 30, 90, 365] {
            let at = now() + Duration::days(days);
            let delta = s.query_confidence_at(D, "REQ-001", "will", &[], at).unwrap();
            assert!(delta < last, "day {days}: {delta} !< {last}");
            last = delta;
        }
        let at_half_life = s
            .query_confidence_at(D, "REQ-001", "will", &[], now() + Duration::days(30))
            .unwrap();
        assert!((at_half_life - 0.2).abs() < 1e-6);
    }

    #[test]
    fn domains_are_isolated() {
        let s = store();
        for _ in 0..3 {
            s.record_at(LearningDomain::AcronymCandidates, "acronym", "QA", Decision::Reject, &[], now())
                .unwrap();
        }
        assert!(s
            .query_confidence_at(LearningDomain::AcronymCandidates, "acronym", "qa", &[], now())
            .unwrap()
            < 0.0);
        for other in LearningDomain::ALL
            .into_iter()
            .filter(|d| *d != LearningDomain::AcronymCandidates)
        {
            assert_eq!(s.query_confidence_at(other, "acronym", "qa", &[], now()).unwrap(), 0.0);
            assert!(s.patterns(other).unwrap().is_empty());
        }
    }

    #[test]
    fn context_similarity_scales_delta() {
        let s = store();
        let ctx: Vec<String> = ["format:pdf", "checker:passive_voice", "the", "report"]
            .map(String::from)
            .to_vec();
        for _ in 0..2 {
            s.record_at(D, "PASSIVE-001", "was approved", Decision::Accept, &ctx, now())
                .unwrap();
        }
        let same = s.query_confidence_at(D, "PASSIVE-001", "was approved", &ctx, now()).unwrap();
        let unrelated = vec!["format:docx".to_string()];
        let other = s
            .query_confidence_at(D, "PASSIVE-001", "was approved", &unrelated, now())
            .unwrap();
        assert!((same - 0.4).abs() < 1e-6);
        assert!((other - 0.2).abs() < 1e-6);
    }

    #[test]
    fn decisions_are_kept_in_order() {
        let s = store();
        let first = s.record_at(D, "R", "x", Decision::Accept, &[], now()).unwrap();
        let second = s
            .record_at(D, "R", "x", Decision::Reject, &[], now() + Duration::hours(1))
            .unwrap();
        let decisions = s.decisions(D, "r:x").unwrap();
        assert_eq!(decisions, vec![first, second]);
        let pattern = s.pattern(D, "r:x").unwrap().unwrap();
        assert_eq!(pattern.observations(), 2);
        assert_eq!(pattern.first_seen, now());
        assert_eq!(pattern.last_updated, now() + Duration::hours(1));
    }

    #[test]
    fn empty_candidate_rejected() {
        let err = store()
            .record(D, "R", "  ", Decision::Accept, &[])
            .unwrap_err();
        assert!(matches!(err, LearningError::EmptyCandidate));
    }

    #[test]
    fn export_import_reproduces_and_reimport_is_noop() {
        let source = store();
        source.record_at(D, "PASSIVE-001", "was written", Decision::Reject, &["a".into()], now()).unwrap();
        source.record_at(D, "PASSIVE-001", "was written", Decision::Accept, &[], now()).unwrap();
        source
            .record_at(LearningDomain::RoleCandidates, "role", "Contractor", Decision::Accept, &[], now())
            .unwrap();
        let bundle = source.export_bundle(&[]).unwrap();
        assert_eq!(bundle.decisions.len(), 3);

        let target = store();
        let first = target.import_bundle(&bundle).unwrap();
        assert_eq!(first.decisions_imported, 3);
        for domain in LearningDomain::ALL {
            assert_eq!(target.patterns(domain).unwrap(), source.patterns(domain).unwrap());
        }

        let second = target.import_bundle(&bundle).unwrap();
        assert!(!second.changed_anything());
        assert_eq!(second.decisions_skipped, 3);
        assert_eq!(
            target.patterns(D).unwrap()[0].observations(),
            source.patterns(D).unwrap()[0].observations()
        );
    }

    #[test]
    fn pattern_without_decisions_only_fills_gaps() {
        let target = store();
        target.record_at(D, "R", "known", Decision::Accept, &[], now()).unwrap();
        let bundle = LearningBundle {
            format_version: BUNDLE_FORMAT_VERSION,
            exported_at: now(),
            patterns: vec![
                LearningPattern {
                    domain: D,
                    key: "r:known".into(),
                    accept_count: 50,
                    reject_count: 0,
                    first_seen: now(),
                    last_updated: now(),
                },
                LearningPattern {
                    domain: D,
                    key: "r:new".into(),
                    accept_count: 2,
                    reject_count: 1,
                    first_seen: now(),
                    last_updated: now(),
                },
            ],
            decisions: vec![],
        };
        let summary = target.import_bundle(&bundle).unwrap();
        assert_eq!(summary.patterns_created, 1);
        assert_eq!(summary.patterns_skipped, 1);
        assert_eq!(target.pattern(D, "r:known").unwrap().unwrap().accept_count, 1);
        assert_eq!(target.pattern(D, "r:new").unwrap().unwrap().observations(), 3);
    }

    #[test]
    fn unsupported_bundle_version_rejected() {
        let mut bundle = store().export_bundle(&[]).unwrap();
        bundle.format_version = 99;
        assert!(matches!(
            store().import_bundle(&bundle),
            Err(LearningError::UnsupportedBundleVersion(99))
        ));
    }

    #[test]
    fn bundle_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle.json");
        let s = store();
        s.record_at(D, "R", "x", Decision::Accept, &[], now()).unwrap();
        s.export_to_path(&path, &[D]).unwrap();

        let other = store();
        let summary = other.import_from_path(&path).unwrap();
        assert_eq!(summary.decisions_imported, 1);
    }

    #[test]
    fn concurrent_records_are_all_counted() {
        let s = Arc::new(store());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let s = Arc::clone(&s);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        let decision = if i % 2 == 0 { Decision::Accept } else { Decision::Reject };
                        s.record(D, "R", "shared", decision, &[]).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let pattern = s.pattern(D, "r:shared").unwrap().unwrap();
        assert_eq!(pattern.accept_count, 100);
        assert_eq!(pattern.reject_count, 100);
        assert_eq!(s.decisions(D, "r:shared").unwrap().len(), 200);
    }

    #[test]
    fn on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learning.db");
        {
            let s = LearningStore::open(&path, LearningConfig::default()).unwrap();
            s.record(D, "R", "x", Decision::Accept, &[]).unwrap();
        }
        let reopened = LearningStore::open(&path, LearningConfig::default()).unwrap();
        assert_eq!(reopened.patterns(D).unwrap().len(), 1);
        assert_eq!(pattern_counts(&reopened).unwrap()[&D], 1);
    }

    #[test]
    fn adapter_feeds_pipeline() {
        let s = store();
        for _ in 0..2 {
            s.record(D, "R", "x", Decision::Reject, &[]).unwrap();
        }
        let f = ConfidenceProvider::confidence_fn(&s, D);
        assert!(f.delta("R", "x", &[]) < -0.39);
        assert_eq!(f.delta("R", "unknown", &[]), 0.0);
    }
}
