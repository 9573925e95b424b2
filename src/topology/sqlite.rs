//! SQLite-backed feature store
//!
//! Reads features from a table shaped `(fid INTEGER PRIMARY KEY, geom TEXT, attrs TEXT)`,
//! where `geom` holds WKT (NULL for features without geometry) and `attrs` a JSON object.

use super::error::StoreError;
use super::layer::{matches_filter, parse_wkt, Layer};
use super::types::{Feature, FeatureId, GeometryKind};
use geo_types::Rect;
use indexmap::IndexMap;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use wkt::ToWkt;

pub struct SqliteLayer {
    id: String,
    table: String,
    kind: GeometryKind,
    conn: Connection,
}

impl SqliteLayer {
    /// Open a table in an existing database. The geometry kind is inferred from
    /// the first stored geometry when not given.
    pub fn open<P: AsRef<Path>>(
        path: P,
        table: &str,
        kind: Option<GeometryKind>,
    ) -> Result<Self, StoreError> {
        let conn = Connection::open(&path)?;
        let id = format!("{}:{}", path.as_ref().display(), table);
        Self::from_connection(conn, id, table, kind)
    }

    pub fn from_connection(
        conn: Connection,
        id: impl Into<String>,
        table: &str,
        kind: Option<GeometryKind>,
    ) -> Result<Self, StoreError> {
        check_table_name(table)?;
        let id = id.into();
        let kind = match kind {
            Some(kind) => kind,
            None => infer_kind(&conn, table)?
                .ok_or_else(|| StoreError::UnknownGeometryKind(id.clone()))?,
        };
        Ok(Self {
            id,
            table: table.to_string(),
            kind,
            conn,
        })
    }

    /// Create the feature table if it does not exist
    pub fn create_table(conn: &Connection, table: &str) -> Result<(), StoreError> {
        check_table_name(table)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (fid INTEGER PRIMARY KEY, geom TEXT, attrs TEXT)"
        ))?;
        Ok(())
    }

    /// Insert or replace a feature
    pub fn insert(conn: &Connection, table: &str, feature: &Feature) -> Result<(), StoreError> {
        check_table_name(table)?;
        let geom = feature.geometry.as_ref().map(|g| g.wkt_string());
        let attrs = if feature.attributes.is_empty() {
            None
        } else {
            let text = serde_json::to_string(&feature.attributes).map_err(|source| {
                StoreError::Attributes {
                    id: feature.id,
                    source,
                }
            })?;
            Some(text)
        };
        conn.execute(
            &format!("INSERT OR REPLACE INTO {table} (fid, geom, attrs) VALUES (?1, ?2, ?3)"),
            params![feature.id, geom, attrs],
        )?;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn decode(
        id: FeatureId,
        geom: Option<String>,
        attrs: Option<String>,
    ) -> Result<Feature, StoreError> {
        let geometry = match geom {
            Some(text) if !text.trim().is_empty() => Some(parse_wkt(id, &text)?),
            _ => None,
        };
        let attributes = match attrs {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str::<IndexMap<String, serde_json::Value>>(&text)
                    .map_err(|source| StoreError::Attributes { id, source })?
            }
            _ => IndexMap::new(),
        };
        Ok(Feature {
            id,
            geometry,
            attributes,
        })
    }
}

fn check_table_name(table: &str) -> Result<(), StoreError> {
    let valid = !table.is_empty()
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTable(table.to_string()))
    }
}

fn infer_kind(conn: &Connection, table: &str) -> Result<Option<GeometryKind>, StoreError> {
    let first: Option<(FeatureId, String)> = conn
        .query_row(
            &format!("SELECT fid, geom FROM {table} WHERE geom IS NOT NULL ORDER BY fid LIMIT 1"),
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    match first {
        Some((fid, text)) => Ok(GeometryKind::of(&parse_wkt(fid, &text)?)),
        None => Ok(None),
    }
}

impl Layer for SqliteLayer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.table
    }

    fn geometry_kind(&self) -> GeometryKind {
        self.kind
    }

    fn features(
        &self,
        filter: Option<&Rect<f64>>,
        with_attributes: bool,
    ) -> Result<Vec<Feature>, StoreError> {
        let sql = if with_attributes {
            format!("SELECT fid, geom, attrs FROM {} ORDER BY fid", self.table)
        } else {
            format!("SELECT fid, geom, NULL FROM {} ORDER BY fid", self.table)
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, FeatureId>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut features = Vec::new();
        for row in rows {
            let (id, geom, attrs) = row?;
            let feature = Self::decode(id, geom, attrs)?;
            if matches_filter(&feature, filter) {
                features.push(feature);
            }
        }
        Ok(features)
    }

    fn feature(&self, id: FeatureId) -> Result<Option<Feature>, StoreError> {
        let row: Option<(Option<String>, Option<String>)> = self
            .conn
            .query_row(
                &format!("SELECT geom, attrs FROM {} WHERE fid = ?1", self.table),
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        row.map(|(geom, attrs)| Self::decode(id, geom, attrs)).transpose()
    }
}
