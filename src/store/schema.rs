// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use rusqlite::{params, Connection};

use super::StoreError;
use crate::pbs::date::pbs_date_epoch;

pub(super) fn apply_schema(connection: &Connection) -> Result<(), StoreError> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS nodes (
            poll_timestamp TEXT NOT NULL,
            node_name TEXT NOT NULL,
            raw_attributes TEXT NOT NULL
         );
         CREATE TABLE IF NOT EXISTS jobs (
            job_id TEXT NOT NULL,
            user TEXT,
            machine TEXT,
            start_time TEXT,
            start_epoch INTEGER,
            raw_attributes TEXT NOT NULL,
            poll_timestamp TEXT
         );",
    )?;

    // Databases written by the earlier collector script used other column names
    for table in ["nodes", "jobs"] {
        rename_column_if_present(connection, table, "timestamp", "poll_timestamp")?;
        rename_column_if_present(connection, table, "data_json", "raw_attributes")?;
    }

    if !has_column(connection, "jobs", "poll_timestamp")? {
        connection.execute_batch("ALTER TABLE jobs ADD COLUMN poll_timestamp TEXT;")?;
    }
    if !has_column(connection, "jobs", "start_epoch")? {
        connection.execute_batch("ALTER TABLE jobs ADD COLUMN start_epoch INTEGER;")?;
        let filled = backfill_start_epoch(connection)?;
        tracing::info!(rows = filled, "added start_epoch column to jobs table");
    }

    connection.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_nodes_poll_timestamp ON nodes (poll_timestamp);
         CREATE INDEX IF NOT EXISTS idx_jobs_identity
            ON jobs (job_id, user, machine, poll_timestamp);
         CREATE INDEX IF NOT EXISTS idx_jobs_start_epoch ON jobs (start_epoch);
         CREATE INDEX IF NOT EXISTS idx_jobs_user_machine ON jobs (user, machine);",
    )?;
    Ok(())
}

fn has_column(connection: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    let mut stmt = connection.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let names = stmt
        .query_map(params![table], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names.iter().any(|name| name == column))
}

fn rename_column_if_present(
    connection: &Connection,
    table: &'static str,
    from: &'static str,
    to: &'static str,
) -> Result<(), StoreError> {
    if has_column(connection, table, from)? && !has_column(connection, table, to)? {
        connection.execute_batch(&format!("ALTER TABLE {table} RENAME COLUMN {from} TO {to};"))?;
        tracing::info!(table, from, to, "migrated legacy column");
    }
    Ok(())
}

/// Parse stored start times into `start_epoch` for rows that predate the column
fn backfill_start_epoch(connection: &Connection) -> Result<usize, StoreError> {
    let mut select = connection
        .prepare("SELECT rowid, start_time FROM jobs WHERE start_epoch IS NULL AND start_time IS NOT NULL")?;
    let rows = select
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(select);

    let tx = connection.unchecked_transaction()?;
    let mut filled = 0;
    {
        let mut update = tx.prepare("UPDATE jobs SET start_epoch = ?1 WHERE rowid = ?2")?;
        for (rowid, start_time) in rows {
            if let Some(epoch) = pbs_date_epoch(&start_time) {
                update.execute(params![epoch, rowid])?;
                filled += 1;
            }
        }
    }
    tx.commit()?;
    Ok(filled)
}
