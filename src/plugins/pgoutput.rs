//! The `pgoutput` v1 output plugin
//!
//! Decodes the typed Logical Replication Protocol. The plugin owns the
//! relation cache: every `Relation` message updates it, and every change
//! message must reference a relation announced earlier on the same stream.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::core::errors::{WalError, WalResult};
use crate::plugins::DecoderPlugin;
use crate::protocol::messages::XLogData;
use crate::protocol::parser::{PgOutputEvent, PgOutputParser, Relation, TypeDescription};
use crate::replication::session::StartOption;
use crate::utils::lsn::Lsn;
use crate::utils::timestamp::PgTimestamp;

/// One decoded event with its envelope positions
#[derive(Debug, Clone, Serialize)]
pub struct PgOutputMessage {
    pub wal_start: Lsn,
    pub wal_end: Lsn,
    pub server_clock: PgTimestamp,
    pub event: PgOutputEvent,
}

struct CachedRelation {
    relation: Relation,
    columns_by_name: HashMap<String, usize>,
}

/// Relation metadata keyed by relation id. Last writer wins; replacing an
/// entry rebuilds the derived name index, so schema changes announced by a
/// fresh `Relation` message never leave stale lookups behind.
#[derive(Default)]
pub struct RelationCache {
    relations: HashMap<u32, CachedRelation>,
}

impl RelationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, relation: Relation) {
        let columns_by_name = relation
            .columns
            .iter()
            .enumerate()
            .map(|(index, column)| (column.name.clone(), index))
            .collect();
        self.relations.insert(
            relation.id,
            CachedRelation {
                relation,
                columns_by_name,
            },
        );
    }

    pub fn get(&self, id: u32) -> Option<&Relation> {
        self.relations.get(&id).map(|cached| &cached.relation)
    }

    /// Position of a column by name within the relation's tuple
    pub fn column_index(&self, id: u32, name: &str) -> Option<usize> {
        self.relations
            .get(&id)?
            .columns_by_name
            .get(name)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

/// Decoder for `pgoutput` protocol version 1
pub struct PgOutputPlugin {
    publications: Vec<String>,
    relations: RelationCache,
    /// Advisory only; never needed to decode text-format columns
    types: HashMap<u32, TypeDescription>,
}

impl PgOutputPlugin {
    /// A decoder subscribed to the given publications; at least one is
    /// required by the server.
    pub fn new<I, S>(publications: I) -> WalResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let publications: Vec<String> = publications.into_iter().map(Into::into).collect();
        if publications.is_empty() {
            return Err(WalError::invalid("at least one publication is required"));
        }
        if publications.iter().any(String::is_empty) {
            return Err(WalError::invalid("publication names must not be empty"));
        }
        Ok(Self {
            publications,
            relations: RelationCache::new(),
            types: HashMap::new(),
        })
    }

    pub fn relation(&self, id: u32) -> Option<&Relation> {
        self.relations.get(id)
    }

    pub fn relation_cache(&self) -> &RelationCache {
        &self.relations
    }

    pub fn type_description(&self, id: u32) -> Option<&TypeDescription> {
        self.types.get(&id)
    }

    /// `"pub1","pub2",...` as the `publication_names` option value
    fn publication_list(&self) -> String {
        self.publications
            .iter()
            .map(|name| format!("\"{}\"", name.replace('"', "\"\"")))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl DecoderPlugin for PgOutputPlugin {
    type Event = PgOutputMessage;

    fn output_plugin(&self) -> &'static str {
        "pgoutput"
    }

    fn start_options(&self) -> Vec<StartOption> {
        vec![
            StartOption::new("proto_version", "1"),
            StartOption::new("publication_names", self.publication_list()),
        ]
    }

    fn decode(&mut self, data: &XLogData) -> WalResult<Vec<PgOutputMessage>> {
        let event = PgOutputParser::parse(&data.payload)?;

        match &event {
            PgOutputEvent::Relation(relation) => {
                debug!(
                    id = relation.id,
                    namespace = %relation.namespace,
                    name = %relation.name,
                    columns = relation.columns.len(),
                    "caching relation"
                );
                self.relations.update(relation.clone());
            }
            PgOutputEvent::Type(description) => {
                self.types.insert(description.id, description.clone());
            }
            other => {
                if let Some(relation_id) = other.relation_id() {
                    if self.relations.get(relation_id).is_none() {
                        return Err(WalError::protocol(format!(
                            "relation {relation_id} referenced before its Relation message"
                        )));
                    }
                }
            }
        }

        Ok(vec![PgOutputMessage {
            wal_start: data.wal_start,
            wal_end: data.wal_end,
            server_clock: data.server_clock,
            event,
        }])
    }
}
