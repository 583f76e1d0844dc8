//! Category repository — CRUD operations for the `categories` table.
//!
//! Category ids are user-scoped and sequential: a new category gets
//! `max(existing) + 1` for that user. There is no delete path, and gaps
//! (from historical data) are never reused.

use rusqlite::params;

use super::{Database, DatabaseError};

/// A user-defined classification bucket.
#[derive(Debug, Clone)]
pub struct CategoryRow {
    pub user_id: String,
    pub category_id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Creates a category and returns its assigned user-scoped id.
pub fn create(
    db: &Database,
    user_id: &str,
    name: &str,
    description: Option<&str>,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        let next_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(category_id), 0) + 1 FROM categories WHERE user_id = ?1",
            params![user_id],
            |r| r.get(0),
        )?;
        conn.execute(
            "INSERT INTO categories (user_id, category_id, name, description) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, next_id, name, description],
        )?;
        Ok(next_id)
    })
}

/// Lists all categories for a user, ordered by id.
pub fn list_for_user(db: &Database, user_id: &str) -> Result<Vec<CategoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, category_id, name, description
             FROM categories WHERE user_id = ?1 ORDER BY category_id",
        )?;
        let rows = stmt.query_map(params![user_id], map_category_row)?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Sqlite)
    })
}

/// Finds one category by its user-scoped id.
pub fn find(
    db: &Database,
    user_id: &str,
    category_id: i64,
) -> Result<Option<CategoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT user_id, category_id, name, description
             FROM categories WHERE user_id = ?1 AND category_id = ?2",
        )?;
        let mut rows = stmt.query_map(params![user_id, category_id], map_category_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

fn map_category_row(row: &rusqlite::Row<'_>) -> Result<CategoryRow, rusqlite::Error> {
    Ok(CategoryRow {
        user_id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    #[test]
    fn test_first_category_gets_id_one() {
        let db = test_db();
        let id = create(&db, "u1", "Work", None).unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn test_ids_are_sequential_per_user() {
        let db = test_db();
        assert_eq!(create(&db, "u1", "Work", None).unwrap(), 1);
        assert_eq!(create(&db, "u1", "Personal", None).unwrap(), 2);
        // A different user starts from 1 again.
        assert_eq!(create(&db, "u2", "Work", None).unwrap(), 1);
    }

    #[test]
    fn test_gaps_are_not_reused() {
        let db = test_db();
        // Seed a gapped id set {1, 2, 4} directly.
        db.with_conn(|conn| {
            for id in [1_i64, 2, 4] {
                conn.execute(
                    "INSERT INTO categories (user_id, category_id, name) VALUES ('u1', ?1, 'c')",
                    params![id],
                )?;
            }
            Ok(())
        })
        .unwrap();

        assert_eq!(create(&db, "u1", "Next", None).unwrap(), 5);
    }

    #[test]
    fn test_list_for_user() {
        let db = test_db();
        create(&db, "u1", "Work", Some("Office mail")).unwrap();
        create(&db, "u1", "Personal", None).unwrap();
        create(&db, "u2", "Other", None).unwrap();

        let categories = list_for_user(&db, "u1").unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "Work");
        assert_eq!(categories[0].description.as_deref(), Some("Office mail"));
        assert_eq!(categories[1].name, "Personal");
        assert!(categories[1].description.is_none());
    }

    #[test]
    fn test_find() {
        let db = test_db();
        let id = create(&db, "u1", "Work", None).unwrap();

        let found = find(&db, "u1", id).unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().name, "Work");

        assert!(find(&db, "u1", 99).unwrap().is_none());
        // Same id under another user is invisible.
        assert!(find(&db, "u2", id).unwrap().is_none());
    }
}
