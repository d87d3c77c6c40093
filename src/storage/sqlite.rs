//! `SqliteBackend`: the reference [`super::StorageBackend`] implementation,
//! grounded in the original source's SQLite-backed store. A single
//! process-wide connection behind a mutex keeps the contract simple; the
//! backend is not meant to be the throughput bottleneck (the cache in
//! front of it absorbs read traffic).

use super::{EntityMetadata, FindPredicate, StorageBackend};
use crate::{
    entity::{Entity, EntityType},
    error::{DbError, DbResult},
    id::{EntityId, Id, SiteId},
    time::TimeStamp,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    site_id     INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS next_site_id (
    id      INTEGER PRIMARY KEY CHECK (id = 0),
    next    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS next_id (
    site_id INTEGER PRIMARY KEY,
    next    INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS id_reuse (
    site_id     INTEGER NOT NULL,
    entity_id   INTEGER NOT NULL,
    PRIMARY KEY (site_id, entity_id)
);

CREATE TABLE IF NOT EXISTS entities (
    site_id         INTEGER NOT NULL,
    entity_id       INTEGER NOT NULL,
    entity_type     TEXT NOT NULL,
    owner_site      INTEGER NOT NULL,
    owner_entity    INTEGER NOT NULL,
    name            TEXT NOT NULL,
    version         INTEGER NOT NULL,
    instance        INTEGER NOT NULL,
    last_updated_at INTEGER NOT NULL,
    contained_by_site   INTEGER,
    contained_by_entity INTEGER,
    blob            BLOB NOT NULL,
    PRIMARY KEY (site_id, entity_id)
);
CREATE INDEX IF NOT EXISTS entities_by_name ON entities(site_id, name);
CREATE INDEX IF NOT EXISTS entities_by_type ON entities(site_id, entity_type);
CREATE INDEX IF NOT EXISTS entities_by_owner ON entities(site_id, owner_site, owner_entity);
CREATE INDEX IF NOT EXISTS entities_by_container ON entities(site_id, contained_by_site, contained_by_entity);

CREATE TABLE IF NOT EXISTS program_registrations (
    site_id         INTEGER NOT NULL,
    name            TEXT NOT NULL,
    program_site    INTEGER NOT NULL,
    program_entity  INTEGER NOT NULL,
    PRIMARY KEY (site_id, name)
);
"#;

pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

fn entity_type_tag(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Group => "group",
        EntityType::Capability => "capability",
        EntityType::Region => "region",
        EntityType::Room => "room",
        EntityType::Player => "player",
        EntityType::Guest => "guest",
        EntityType::Thing => "thing",
        EntityType::Puppet => "puppet",
        EntityType::Vehicle => "vehicle",
        EntityType::Command => "command",
        EntityType::Exit => "exit",
        EntityType::Program => "program",
    }
}

fn parse_entity_type(tag: &str) -> DbResult<EntityType> {
    Ok(match tag {
        "group" => EntityType::Group,
        "capability" => EntityType::Capability,
        "region" => EntityType::Region,
        "room" => EntityType::Room,
        "player" => EntityType::Player,
        "guest" => EntityType::Guest,
        "thing" => EntityType::Thing,
        "puppet" => EntityType::Puppet,
        "vehicle" => EntityType::Vehicle,
        "command" => EntityType::Command,
        "exit" => EntityType::Exit,
        "program" => EntityType::Program,
        other => return Err(DbError::Storage(format!("unknown entity_type tag {other}"))),
    })
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<std::path::Path>) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::Storage(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DbError::Storage(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn map_err(e: rusqlite::Error) -> DbError {
        DbError::Storage(e.to_string())
    }
}

impl StorageBackend for SqliteBackend {
    fn init(&self) -> DbResult<()> {
        let conn = self.conn.lock();
        conn.execute_batch(SCHEMA).map_err(Self::map_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO next_site_id (id, next) VALUES (0, 1)",
            [],
        )
        .map_err(Self::map_err)?;
        Ok(())
    }

    fn shutdown(&self) -> DbResult<()> {
        Ok(())
    }

    fn new_entity_id(&self, site_id: SiteId) -> DbResult<Id> {
        let conn = self.conn.lock();
        let reused: Option<EntityId> = conn
            .query_row(
                "SELECT entity_id FROM id_reuse WHERE site_id = ?1 ORDER BY entity_id LIMIT 1",
                params![site_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Self::map_err)?;

        if let Some(entity_id) = reused {
            conn.execute(
                "DELETE FROM id_reuse WHERE site_id = ?1 AND entity_id = ?2",
                params![site_id, entity_id],
            )
            .map_err(Self::map_err)?;
            return Ok(Id::new(site_id, entity_id));
        }

        conn.execute(
            "INSERT OR IGNORE INTO next_id (site_id, next) VALUES (?1, 1)",
            params![site_id],
        )
        .map_err(Self::map_err)?;
        let next: EntityId = conn
            .query_row(
                "SELECT next FROM next_id WHERE site_id = ?1",
                params![site_id],
                |row| row.get(0),
            )
            .map_err(Self::map_err)?;
        conn.execute(
            "UPDATE next_id SET next = next + 1 WHERE site_id = ?1",
            params![site_id],
        )
        .map_err(Self::map_err)?;
        Ok(Id::new(site_id, next))
    }

    fn save_entity(&self, id: Id, entity: &Entity) -> DbResult<()> {
        let blob = serde_json::to_vec(entity).map_err(|e| DbError::Storage(e.to_string()))?;
        let header = entity.header();
        let contained_by = entity.contained_by();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO entities
                (site_id, entity_id, entity_type, owner_site, owner_entity, name, version, instance,
                 last_updated_at, contained_by_site, contained_by_entity, blob)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(site_id, entity_id) DO UPDATE SET
                entity_type = excluded.entity_type,
                owner_site = excluded.owner_site,
                owner_entity = excluded.owner_entity,
                name = excluded.name,
                version = excluded.version,
                instance = excluded.instance,
                last_updated_at = excluded.last_updated_at,
                contained_by_site = excluded.contained_by_site,
                contained_by_entity = excluded.contained_by_entity,
                blob = excluded.blob",
            params![
                id.site_id,
                id.entity_id,
                entity_type_tag(header.entity_type),
                header.owner.site_id,
                header.owner.entity_id,
                header.name,
                header.version,
                header.instance,
                header.last_updated_at.0,
                contained_by.map(|c| c.site_id),
                contained_by.map(|c| c.entity_id),
                blob,
            ],
        )
        .map_err(Self::map_err)?;
        Ok(())
    }

    fn get_entity(&self, id: Id) -> DbResult<Entity> {
        let conn = self.conn.lock();
        let blob: Vec<u8> = conn
            .query_row(
                "SELECT blob FROM entities WHERE site_id = ?1 AND entity_id = ?2",
                params![id.site_id, id.entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Self::map_err)?
            .ok_or(DbError::BadEntityId(id))?;
        serde_json::from_slice(&blob).map_err(|e| DbError::Storage(e.to_string()))
    }

    fn entity_exists(&self, id: Id) -> DbResult<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM entities WHERE site_id = ?1 AND entity_id = ?2",
                params![id.site_id, id.entity_id],
                |row| row.get(0),
            )
            .map_err(Self::map_err)?;
        Ok(count > 0)
    }

    fn get_entity_type(&self, id: Id) -> DbResult<EntityType> {
        let conn = self.conn.lock();
        let tag: String = conn
            .query_row(
                "SELECT entity_type FROM entities WHERE site_id = ?1 AND entity_id = ?2",
                params![id.site_id, id.entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Self::map_err)?
            .ok_or(DbError::BadEntityId(id))?;
        parse_entity_type(&tag)
    }

    fn get_entity_metadata(&self, id: Id) -> DbResult<EntityMetadata> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT entity_type, owner_site, owner_entity, version, instance
                 FROM entities WHERE site_id = ?1 AND entity_id = ?2",
                params![id.site_id, id.entity_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, SiteId>(1)?,
                        row.get::<_, EntityId>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, u32>(4)?,
                    ))
                },
            )
            .optional()
            .map_err(Self::map_err)?
            .ok_or(DbError::BadEntityId(id))?;
        Ok(EntityMetadata {
            entity_type: parse_entity_type(&row.0)?,
            owner: Id::new(row.1, row.2),
            version: row.3,
            instance: row.4,
        })
    }

    fn delete_entity(&self, id: Id) -> DbResult<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "DELETE FROM entities WHERE site_id = ?1 AND entity_id = ?2",
                params![id.site_id, id.entity_id],
            )
            .map_err(Self::map_err)?;
        if changed == 0 {
            return Err(DbError::BadEntityId(id));
        }
        conn.execute(
            "INSERT OR IGNORE INTO id_reuse (site_id, entity_id) VALUES (?1, ?2)",
            params![id.site_id, id.entity_id],
        )
        .map_err(Self::map_err)?;
        Ok(())
    }

    fn find(&self, site_id: SiteId, predicate: &FindPredicate) -> DbResult<Vec<Id>> {
        let conn = self.conn.lock();
        let mut collect = |sql: &str, param: &dyn rusqlite::ToSql| -> DbResult<Vec<Id>> {
            let mut stmt = conn.prepare(sql).map_err(Self::map_err)?;
            let rows = stmt
                .query_map(params![site_id, param], |row| row.get::<_, EntityId>(0))
                .map_err(Self::map_err)?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(Id::new(site_id, row.map_err(Self::map_err)?));
            }
            Ok(ids)
        };

        match predicate {
            FindPredicate::ByExactName(name) => collect(
                "SELECT entity_id FROM entities WHERE site_id = ?1 AND name = ?2 COLLATE NOCASE",
                name,
            ),
            FindPredicate::ByNamePrefix(prefix) => {
                let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
                collect(
                    "SELECT entity_id FROM entities WHERE site_id = ?1 AND name LIKE ?2 ESCAPE '\\' COLLATE NOCASE",
                    &pattern,
                )
            }
            FindPredicate::ByType(entity_type) => {
                collect(
                    "SELECT entity_id FROM entities WHERE site_id = ?1 AND entity_type = ?2",
                    &entity_type_tag(*entity_type),
                )
            }
            FindPredicate::ByOwner(owner) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT entity_id FROM entities
                         WHERE site_id = ?1 AND owner_site = ?2 AND owner_entity = ?3",
                    )
                    .map_err(Self::map_err)?;
                let rows = stmt
                    .query_map(params![site_id, owner.site_id, owner.entity_id], |row| {
                        row.get::<_, EntityId>(0)
                    })
                    .map_err(Self::map_err)?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(Id::new(site_id, row.map_err(Self::map_err)?));
                }
                Ok(ids)
            }
            FindPredicate::ByContainedBy(parent) => {
                let mut stmt = conn
                    .prepare(
                        "SELECT entity_id FROM entities
                         WHERE site_id = ?1 AND contained_by_site = ?2 AND contained_by_entity = ?3",
                    )
                    .map_err(Self::map_err)?;
                let rows = stmt
                    .query_map(params![site_id, parent.site_id, parent.entity_id], |row| {
                        row.get::<_, EntityId>(0)
                    })
                    .map_err(Self::map_err)?;
                let mut ids = Vec::new();
                for row in rows {
                    ids.push(Id::new(site_id, row.map_err(Self::map_err)?));
                }
                Ok(ids)
            }
        }
    }

    fn find_program_reg(&self, site_id: SiteId, name: &str) -> DbResult<Option<Id>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT program_site, program_entity FROM program_registrations
             WHERE site_id = ?1 AND name = ?2",
            params![site_id, name],
            |row| Ok(Id::new(row.get(0)?, row.get(1)?)),
        )
        .optional()
        .map_err(Self::map_err)
    }

    fn find_program_reg_inverse(&self, program_id: Id) -> DbResult<Option<String>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT name FROM program_registrations
             WHERE site_id = ?1 AND program_site = ?1 AND program_entity = ?2",
            params![program_id.site_id, program_id.entity_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Self::map_err)
    }

    fn set_program_reg(&self, site_id: SiteId, name: &str, program_id: Id) -> DbResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO program_registrations (site_id, name, program_site, program_entity)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(site_id, name) DO UPDATE SET
                program_site = excluded.program_site,
                program_entity = excluded.program_entity",
            params![site_id, name, program_id.site_id, program_id.entity_id],
        )
        .map_err(Self::map_err)?;
        Ok(())
    }

    fn clear_program_reg(&self, site_id: SiteId, name: &str) -> DbResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM program_registrations WHERE site_id = ?1 AND name = ?2",
            params![site_id, name],
        )
        .map_err(Self::map_err)?;
        Ok(())
    }

    fn new_site(&self, name: &str, description: &str) -> DbResult<SiteId> {
        let conn = self.conn.lock();
        let site_id: SiteId = conn
            .query_row("SELECT next FROM next_site_id WHERE id = 0", [], |row| {
                row.get(0)
            })
            .map_err(Self::map_err)?;
        conn.execute("UPDATE next_site_id SET next = next + 1 WHERE id = 0", [])
            .map_err(Self::map_err)?;
        conn.execute(
            "INSERT INTO sites (site_id, name, description) VALUES (?1, ?2, ?3)",
            params![site_id, name, description],
        )
        .map_err(Self::map_err)?;
        Ok(site_id)
    }

    fn delete_site(&self, site_id: SiteId) -> DbResult<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute("DELETE FROM sites WHERE site_id = ?1", params![site_id])
            .map_err(Self::map_err)?;
        if changed == 0 {
            return Err(DbError::BadSiteId(site_id));
        }
        conn.execute(
            "DELETE FROM entities WHERE site_id = ?1",
            params![site_id],
        )
        .map_err(Self::map_err)?;
        conn.execute(
            "DELETE FROM program_registrations WHERE site_id = ?1",
            params![site_id],
        )
        .map_err(Self::map_err)?;
        conn.execute("DELETE FROM id_reuse WHERE site_id = ?1", params![site_id])
            .map_err(Self::map_err)?;
        conn.execute("DELETE FROM next_id WHERE site_id = ?1", params![site_id])
            .map_err(Self::map_err)?;
        Ok(())
    }

    fn get_site_ids(&self) -> DbResult<Vec<SiteId>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT site_id FROM sites ORDER BY site_id")
            .map_err(Self::map_err)?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(Self::map_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Self::map_err)
    }

    fn get_site_name(&self, site_id: SiteId) -> DbResult<String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT name FROM sites WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Self::map_err)?
        .ok_or(DbError::BadSiteId(site_id))
    }

    fn get_site_description(&self, site_id: SiteId) -> DbResult<String> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT description FROM sites WHERE site_id = ?1",
            params![site_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(Self::map_err)?
        .ok_or(DbError::BadSiteId(site_id))
    }

    fn set_site_name(&self, site_id: SiteId, name: &str) -> DbResult<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE sites SET name = ?2 WHERE site_id = ?1",
                params![site_id, name],
            )
            .map_err(Self::map_err)?;
        if changed == 0 {
            return Err(DbError::BadSiteId(site_id));
        }
        Ok(())
    }

    fn set_site_description(&self, site_id: SiteId, description: &str) -> DbResult<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE sites SET description = ?2 WHERE site_id = ?1",
                params![site_id, description],
            )
            .map_err(Self::map_err)?;
        if changed == 0 {
            return Err(DbError::BadSiteId(site_id));
        }
        Ok(())
    }

    fn entities_updated_before(&self, site_id: SiteId, before: TimeStamp) -> DbResult<Vec<EntityId>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT entity_id FROM entities WHERE site_id = ?1 AND last_updated_at < ?2",
            )
            .map_err(Self::map_err)?;
        let rows = stmt
            .query_map(params![site_id, before.0], |row| row.get(0))
            .map_err(Self::map_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Self::map_err)
    }
}
