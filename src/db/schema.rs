use anyhow::{bail, Context, Result};
use sqlx::{MySql, MySqlPool, Row};

use crate::models::{LookupKey, PersonRecord};

pub const PERSON_TABLE: &str = "person";
pub const PERSON_COLUMNS: [&str; 5] = ["person_id", "cid", "fname", "lname", "patient_hn"];

pub fn validate_ident(name: &str) -> Result<()> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("Invalid identifier: {}", name);
    }
    Ok(())
}

/// Which of the expected person columns are missing.
pub fn missing_person_columns<'a, I: IntoIterator<Item = &'a str>>(present: I) -> Vec<&'static str> {
    let present: Vec<String> = present.into_iter().map(|s| s.to_ascii_lowercase()).collect();
    PERSON_COLUMNS.iter().copied().filter(|c| !present.iter().any(|p| p == c)).collect()
}

pub async fn check_person_table(pool: &MySqlPool, database: &str) -> Result<()> {
    validate_ident(database)?;
    let rows = sqlx::query(
        r#"SELECT CAST(COLUMN_NAME AS CHAR) AS COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS
            WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?"#,
    )
    .bind(database)
    .bind(PERSON_TABLE)
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to query columns for {}.{}", database, PERSON_TABLE))?;

    if rows.is_empty() {
        bail!("Table {}.{} does not exist", database, PERSON_TABLE);
    }
    let mut names = Vec::with_capacity(rows.len());
    for r in rows {
        let name: String = r.try_get("COLUMN_NAME")?;
        names.push(name);
    }
    let missing = missing_person_columns(names.iter().map(String::as_str));
    if !missing.is_empty() {
        bail!("Table {}.{} missing required columns: {}", database, PERSON_TABLE, missing.join(", "));
    }
    Ok(())
}

pub fn find_person_sql(key: LookupKey) -> String {
    format!(
        "SELECT CAST(person_id AS CHAR) AS person_id, CAST(cid AS CHAR) AS cid, \
         CAST(fname AS CHAR) AS fname, CAST(lname AS CHAR) AS lname, \
         CAST(patient_hn AS CHAR) AS patient_hn FROM `{}` WHERE `{}` = ? LIMIT 1",
        PERSON_TABLE,
        key.db_column()
    )
}

pub async fn find_person(pool: &MySqlPool, key: LookupKey, value: &str) -> Result<Option<PersonRecord>> {
    let sql = find_person_sql(key);
    sqlx::query_as::<MySql, PersonRecord>(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Lookup of {}={} failed", key.db_column(), value))
}

pub async fn get_person_count(pool: &MySqlPool) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) as cnt FROM `{}`", PERSON_TABLE);
    let row = sqlx::query(&sql).fetch_one(pool).await?;
    let cnt: i64 = row.try_get("cnt")?;
    Ok(cnt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idents() {
        assert!(validate_ident("hos_2024").is_ok());
        assert!(validate_ident("hos; drop").is_err());
        assert!(validate_ident("").is_err());
    }

    #[test]
    fn lookup_sql_targets_key_column() {
        let sql = find_person_sql(LookupKey::Hn);
        assert!(sql.contains("WHERE `patient_hn` = ?"));
        assert!(sql.ends_with("LIMIT 1"));
    }

    #[test]
    fn missing_columns_reported() {
        assert!(missing_person_columns(["PERSON_ID", "cid", "fname", "lname", "patient_hn"]).is_empty());
        assert_eq!(missing_person_columns(["person_id", "cid"]), vec!["fname", "lname", "patient_hn"]);
    }
}
