//! Table bootstrap for the session record store.

use super::FieldMap;

/// DDL creating the record table and its indexes, safe to run repeatedly.
///
/// Timestamps are INTEGER unix milliseconds. The payload key carries a
/// unique index; user reference, created, expires and client address get
/// plain indexes for per-user listing and expiry sweeps. Unmapped optional
/// columns are neither created nor indexed.
pub(crate) fn create_table_sql(fields: &FieldMap) -> String {
    let t = &fields.table;
    let optional = [
        (&fields.display_name, "TEXT NOT NULL DEFAULT ''"),
        (&fields.user_agent, "TEXT"),
        (&fields.client_address, "TEXT NOT NULL DEFAULT ''"),
    ];
    let optional_columns: String = optional
        .iter()
        .filter_map(|(column, ty)| column.as_ref().map(|c| format!("\n            {c} {ty},")))
        .collect();

    let mut sql = format!(
        "CREATE TABLE IF NOT EXISTS {t} (
            {id} TEXT NOT NULL PRIMARY KEY,
            {payload_key} TEXT,
            {user_id} TEXT,{optional_columns}
            {created} INTEGER,
            {modified} INTEGER,
            {accessed} INTEGER,
            {expires} INTEGER
        );
        CREATE UNIQUE INDEX IF NOT EXISTS {t}_{payload_key}_uidx ON {t} ({payload_key});\n",
        id = fields.identifier,
        payload_key = fields.payload_key,
        user_id = fields.user_id,
        created = fields.created_at,
        modified = fields.modified_at,
        accessed = fields.accessed_at,
        expires = fields.expires_at,
    );

    let indexed = [
        Some(&fields.user_id),
        Some(&fields.created_at),
        Some(&fields.expires_at),
        fields.client_address.as_ref(),
    ];
    for column in indexed.into_iter().flatten() {
        sql.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS {t}_{column}_idx ON {t} ({column});\n"
        ));
    }

    sql
}
