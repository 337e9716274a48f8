// SPDX-FileCopyrightText: 2026 VICW Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite graph store: chunk, entity, and state nodes with typed edges.
//!
//! Node writes are merge semantics via upserts. The relational search is a
//! case-insensitive substring match over node keys and chunk summaries,
//! formatted as `(A)-[:TYPE]->(B)` triples for prompt injection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Row;

use vicw_core::{GraphStore, StateNode, StateStatus, StateType, VicwError};

use crate::database::{storage_err, Database};

/// Display names in triples are cut at this length.
const DISPLAY_NAME_MAX: usize = 50;

/// Query words shorter than this are ignored as search terms.
const MIN_TERM_LEN: usize = 4;

/// At most this many terms are searched per relational query.
const MAX_TERMS: usize = 3;

const TERM_STOPWORDS: &[&str] = &[
    "about", "tell", "what", "when", "where", "how", "why", "who", "the", "this", "that",
];

/// Labeled property graph over the shared SQLite connection.
pub struct SqliteGraphStore {
    db: Database,
}

impl SqliteGraphStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn parse_timestamp(value: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn row_to_state(row: &Row<'_>) -> rusqlite::Result<StateNode> {
    let state_type: String = row.get(1)?;
    let status: String = row.get(3)?;
    let last_visited: Option<String> = row.get(5)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(StateNode {
        state_id: row.get(0)?,
        state_type: state_type.parse().unwrap_or(StateType::Fact),
        description: row.get(2)?,
        status: status.parse().unwrap_or(StateStatus::Active),
        visit_count: row.get::<_, i64>(4)? as u32,
        last_visited: last_visited.map(parse_timestamp),
        created_at: parse_timestamp(created_at),
        updated_at: parse_timestamp(updated_at),
    })
}

const STATE_FIELDS: &str =
    "state_id, state_type, description, status, visit_count, last_visited, created_at, updated_at";

/// Words worth searching for: capitalized names plus significant lowercase
/// words; falls back to the whole query.
fn search_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for word in query.split_whitespace() {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if cleaned.is_empty() {
            continue;
        }
        let is_name = cleaned.chars().next().is_some_and(|c| c.is_uppercase());
        let significant = cleaned.chars().count() >= MIN_TERM_LEN
            && !TERM_STOPWORDS.contains(&cleaned.to_lowercase().as_str());
        if is_name || significant {
            let term = cleaned.to_lowercase();
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    if terms.is_empty() {
        terms.push(query.trim().to_lowercase());
    }
    terms.truncate(MAX_TERMS);
    terms
}

fn truncate_display(name: &str) -> String {
    if name.chars().count() > DISPLAY_NAME_MAX {
        let cut: String = name.chars().take(DISPLAY_NAME_MAX - 3).collect();
        format!("{cut}...")
    } else {
        name.to_string()
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn merge_chunk_node(
        &self,
        chunk_id: &str,
        summary: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), VicwError> {
        let chunk_id = chunk_id.to_string();
        let summary = summary.to_string();
        let created_at = created_at.to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO graph_chunks (chunk_id, summary, created_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(chunk_id) DO UPDATE SET
                         summary = excluded.summary,
                         created_at = excluded.created_at",
                    rusqlite::params![chunk_id, summary, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn merge_entity(&self, name: &str, entity_type: &str) -> Result<(), VicwError> {
        let name = name.to_string();
        let entity_type = entity_type.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO graph_entities (name, entity_type, updated_at)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(name) DO UPDATE SET
                         entity_type = excluded.entity_type,
                         updated_at = excluded.updated_at",
                    rusqlite::params![name, entity_type, now],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn merge_edge(
        &self,
        from_key: &str,
        edge_type: &str,
        to_key: &str,
    ) -> Result<(), VicwError> {
        let from_key = from_key.to_string();
        let edge_type = edge_type.to_string();
        let to_key = to_key.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO graph_edges (from_key, edge_type, to_key, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![from_key, edge_type, to_key, now],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn relational_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<String>, VicwError> {
        let terms = search_terms(query);
        let limit_i = limit as i64;

        let rows = self
            .db
            .connection()
            .call(move |conn| {
                let mut all = Vec::new();
                let mut stmt = conn.prepare(
                    "SELECT e.from_key, e.edge_type, e.to_key,
                            cf.summary AS from_summary, ct.summary AS to_summary
                     FROM graph_edges e
                     LEFT JOIN graph_chunks cf ON cf.chunk_id = e.from_key
                     LEFT JOIN graph_chunks ct ON ct.chunk_id = e.to_key
                     WHERE lower(e.from_key) LIKE ?1
                        OR lower(e.to_key) LIKE ?1
                        OR lower(coalesce(cf.summary, '')) LIKE ?1
                        OR lower(coalesce(ct.summary, '')) LIKE ?1
                     LIMIT ?2",
                )?;
                for term in &terms {
                    let pattern = format!("%{term}%");
                    let rows = stmt.query_map(rusqlite::params![pattern, limit_i], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, Option<String>>(3)?,
                            row.get::<_, Option<String>>(4)?,
                        ))
                    })?;
                    for row in rows {
                        all.push(row?);
                    }
                }
                Ok(all)
            })
            .await
            .map_err(storage_err)?;

        let mut facts = Vec::new();
        for (from_key, edge_type, to_key, from_summary, to_summary) in rows {
            let from = truncate_display(from_summary.as_deref().unwrap_or(&from_key));
            let to = truncate_display(to_summary.as_deref().unwrap_or(&to_key));
            let fact = format!("({from})-[:{edge_type}]->({to})");
            if !facts.contains(&fact) {
                facts.push(fact);
            }
        }
        facts.truncate(limit);
        Ok(facts)
    }

    async fn create_state(
        &self,
        state_type: StateType,
        description: &str,
        status: StateStatus,
    ) -> Result<StateNode, VicwError> {
        let now = Utc::now();
        let state = StateNode {
            state_id: format!("state_{}", uuid::Uuid::new_v4().simple()),
            state_type,
            description: description.to_string(),
            status,
            visit_count: 0,
            last_visited: None,
            created_at: now,
            updated_at: now,
        };

        let insert = state.clone();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO states (state_id, state_type, description, status, visit_count, last_visited, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, 0, NULL, ?5, ?6)",
                    rusqlite::params![
                        insert.state_id,
                        insert.state_type.to_string(),
                        insert.description,
                        insert.status.to_string(),
                        insert.created_at.to_rfc3339(),
                        insert.updated_at.to_rfc3339()
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)?;
        Ok(state)
    }

    async fn states_by_status(
        &self,
        state_type: StateType,
        status: StateStatus,
        limit: usize,
    ) -> Result<Vec<StateNode>, VicwError> {
        let state_type = state_type.to_string();
        let status = status.to_string();
        let limit = limit as i64;
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {STATE_FIELDS} FROM states
                     WHERE state_type = ?1 AND status = ?2
                     ORDER BY updated_at DESC
                     LIMIT ?3"
                ))?;
                let states = stmt
                    .query_map(rusqlite::params![state_type, status, limit], row_to_state)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(states)
            })
            .await
            .map_err(storage_err)
    }

    async fn update_state_status(
        &self,
        state_id: &str,
        status: StateStatus,
    ) -> Result<(), VicwError> {
        let state_id = state_id.to_string();
        let status = status.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                // Leaving the active set zeroes the visit counter.
                conn.execute(
                    "UPDATE states
                     SET status = ?2,
                         visit_count = CASE WHEN ?2 = 'active' THEN visit_count ELSE 0 END,
                         last_visited = CASE WHEN ?2 = 'active' THEN last_visited ELSE NULL END,
                         updated_at = ?3
                     WHERE state_id = ?1",
                    rusqlite::params![state_id, status, now],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn touch_state(&self, state_id: &str) -> Result<(), VicwError> {
        let state_id = state_id.to_string();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "UPDATE states SET updated_at = ?2 WHERE state_id = ?1",
                    rusqlite::params![state_id, now],
                )?;
                Ok(())
            })
            .await
            .map_err(storage_err)
    }

    async fn increment_state_visits(&self, state_ids: &[String]) -> Result<usize, VicwError> {
        if state_ids.is_empty() {
            return Ok(0);
        }
        let ids = state_ids.to_vec();
        let now = Utc::now().to_rfc3339();
        self.db
            .connection()
            .call(move |conn| {
                let placeholders = vec!["?"; ids.len()].join(", ");
                let mut params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];
                for id in &ids {
                    params.push(Box::new(id.clone()));
                }
                let updated = conn.execute(
                    &format!(
                        "UPDATE states
                         SET visit_count = visit_count + 1, last_visited = ?1
                         WHERE state_id IN ({placeholders})"
                    ),
                    rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
                )?;
                Ok(updated)
            })
            .await
            .map_err(storage_err)
    }
}
