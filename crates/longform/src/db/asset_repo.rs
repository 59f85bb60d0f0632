//! Asset repository: the `document_images` table.
//!
//! The per-kind caps live in the insert statement itself so no sequence of calls can
//! push a pool past its limit, even if two writers race.

use rusqlite::{params, Row};

use super::{format_timestamp, get_label, get_timestamp, Database, DatabaseError};
use crate::model::{Asset, AssetKind};

fn from_row(row: &Row<'_>) -> Result<Asset, rusqlite::Error> {
    Ok(Asset {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        kind: get_label(row, "kind")?,
        prompt: row.get("prompt")?,
        description: row.get("description")?,
        file_path: row.get("file_path")?,
        mime_type: row.get("mime_type")?,
        width: row.get("width")?,
        height: row.get("height")?,
        size_bytes: row.get("size_bytes")?,
        created_at: get_timestamp(row, "created_at")?,
    })
}

/// Inserts the asset only if its pool is still below the kind's cap.
/// Returns `false` when the pool was already full and nothing was written.
pub fn insert_capped(db: &Database, asset: &Asset) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let inserted = conn.execute(
            "INSERT INTO document_images (id, document_id, kind, prompt, description, file_path,
             mime_type, width, height, size_bytes, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
             WHERE (SELECT COUNT(*) FROM document_images WHERE document_id = ?2 AND kind = ?3) < ?12",
            params![
                asset.id,
                asset.document_id,
                asset.kind.as_str(),
                asset.prompt,
                asset.description,
                asset.file_path,
                asset.mime_type,
                asset.width,
                asset.height,
                asset.size_bytes as i64,
                format_timestamp(asset.created_at),
                asset.kind.cap(),
            ],
        )?;
        Ok(inserted == 1)
    })
}

pub fn count_by_kind(db: &Database, document_id: &str, kind: AssetKind) -> Result<u32, DatabaseError> {
    db.with_conn(|conn| {
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM document_images WHERE document_id = ?1 AND kind = ?2",
            params![document_id, kind.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// All assets of a document, banners first, oldest first within a kind.
pub fn list_for_document(db: &Database, document_id: &str) -> Result<Vec<Asset>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM document_images WHERE document_id = ?1
             ORDER BY kind, created_at, id",
        )?;
        let rows = stmt
            .query_map(params![document_id], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::document_repo;
    use crate::model::{Document, DocumentOptions, StructuralRequirements, Topology};

    fn seeded() -> (Database, Document) {
        let db = Database::open_in_memory().expect("Failed to create test database");
        let doc = Document::new(
            "alice",
            "Bridges",
            StructuralRequirements::default(),
            Topology::Standard,
            DocumentOptions::default(),
        );
        document_repo::insert(&db, &doc).unwrap();
        (db, doc)
    }

    fn asset(doc: &Document, kind: AssetKind, n: u32) -> Asset {
        Asset {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            kind,
            prompt: format!("prompt {n}"),
            description: format!("item {n}"),
            file_path: format!("/tmp/{n}.png"),
            mime_type: "image/png".to_string(),
            width: 1024,
            height: 576,
            size_bytes: 2048,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_insert_stops_at_cap() {
        let (db, doc) = seeded();
        let mut accepted = 0;
        for n in 0..7 {
            if insert_capped(&db, &asset(&doc, AssetKind::Banner, n)).unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, AssetKind::BANNER_CAP);
        assert_eq!(count_by_kind(&db, &doc.id, AssetKind::Banner).unwrap(), 4);
    }

    #[test]
    fn test_pools_are_independent() {
        let (db, doc) = seeded();
        for n in 0..4 {
            assert!(insert_capped(&db, &asset(&doc, AssetKind::Banner, n)).unwrap());
        }
        assert!(insert_capped(&db, &asset(&doc, AssetKind::Diagram, 0)).unwrap());
        assert_eq!(count_by_kind(&db, &doc.id, AssetKind::Diagram).unwrap(), 1);

        let listed = list_for_document(&db, &doc.id).unwrap();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0].kind, AssetKind::Banner);
        assert_eq!(listed[4].kind, AssetKind::Diagram);
        assert_eq!(listed[4].size_bytes, 2048);
    }
}
