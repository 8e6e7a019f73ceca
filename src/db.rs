use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, types::Value, Connection};

use crate::parser::{Field, Prosecution};

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS prosecutions (
            id                     TEXT NOT NULL,
            link                   TEXT NOT NULL UNIQUE,
            address                TEXT NOT NULL,
            trading_name           TEXT,
            name_of_convicted      TEXT,
            date_of_offence        TEXT,
            offence_nature         TEXT,
            court_decision_date    TEXT,
            court                  TEXT,
            prosecution_brought_by TEXT,
            fine                   TEXT,
            prosecution_costs      TEXT,
            victims_of_crime_levy  TEXT,
            total_penalty          TEXT,
            comments               TEXT,
            lat                    REAL,
            lng                    REAL,
            scraped_at             TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

/// Links already stored; used to skip entries before extraction.
pub fn existing_links(conn: &Connection) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare("SELECT link FROM prosecutions")?;
    let links = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<HashSet<String>, _>>()?;
    Ok(links)
}

/// Insert records in one transaction. Rows whose link is already present are
/// left untouched. Returns the number of rows inserted.
pub fn insert_prosecutions(conn: &Connection, rows: &[Prosecution]) -> Result<usize> {
    let columns: Vec<&str> = ["id", "link"]
        .into_iter()
        .chain(Field::ALL.iter().map(|f| f.as_str()))
        .chain(["lat", "lng"])
        .collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT OR IGNORE INTO prosecutions ({}) VALUES ({})",
        columns.join(", "),
        placeholders.join(", ")
    );

    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(&sql)?;
        for p in rows {
            let mut values: Vec<Value> = vec![p.id.clone().into(), p.link.clone().into()];
            values.extend(Field::ALL.iter().map(|f| match p.get(*f) {
                Some(v) => Value::Text(v.to_string()),
                None => Value::Null,
            }));
            values.push(p.location.map_or(Value::Null, |l| Value::Real(l.lat)));
            values.push(p.location.map_or(Value::Null, |l| Value::Real(l.lng)));
            count += stmt.execute(params_from_iter(values))?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub struct Stats {
    pub total: i64,
    pub geocoded: i64,
    pub last_scraped: Option<String>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let stats = conn.query_row(
        "SELECT COUNT(*),
                COUNT(lat),
                MAX(scraped_at)
         FROM prosecutions",
        [],
        |row| {
            Ok(Stats {
                total: row.get(0)?,
                geocoded: row.get(1)?,
                last_scraped: row.get(2)?,
            })
        },
    )?;
    Ok(stats)
}
