//! SQLite-backed stores for registrations and the fee catalog.
//!
//! A single connection sits behind a mutex; every multi-statement operation
//! runs in its own transaction. Number allocation uses an `IMMEDIATE`
//! transaction so two writers (even in different processes) can never read
//! the same sequence high-water mark.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use tracing::debug;

use super::domain::{
    BloodType, ChildStatus, Gender, Money, PreviousSchoolType, ReferenceSource, RegistrantDetails,
    RegistrationId, RegistrationStatus, Religion, ResidenceStatus, StudentRegistration,
    Transportation, UniformSize,
};
use super::fees::{AcademicYear, FeeCatalogError, FeeEntry, FeeEntryId};
use super::lifecycle::StatusTransition;
use super::numbering::RegistrationNumber;
use super::query::{ListCriteria, Page, RegistrationFilter, SortDirection, SortKey};
use super::repository::{
    FeeCatalogRepository, FeeUpdateError, IncomeSummary, MajorCount, NewRegistration,
    RegistrationRepository, RepositoryError, StatusCounts,
};

/// Editable columns, in the order produced by [`detail_values`] and read by [`read_details`].
const DETAIL_COLUMNS: [&str; 49] = [
    "nik",
    "family_card_number",
    "nisn",
    "full_name",
    "gender",
    "birth_place",
    "birth_date",
    "religion",
    "child_order",
    "siblings_count",
    "child_status",
    "height",
    "weight",
    "blood_type",
    "address",
    "village",
    "district",
    "city",
    "province",
    "postal_code",
    "email",
    "uniform_size",
    "residence_status",
    "transportation",
    "previous_school_type",
    "previous_school_address",
    "diploma_number",
    "diploma_date",
    "graduation_year",
    "student_phone",
    "father_name",
    "father_nik",
    "father_occupation",
    "father_income",
    "mother_name",
    "mother_nik",
    "mother_occupation",
    "mother_income",
    "parents_address",
    "parents_phone",
    "guardian_name",
    "guardian_occupation",
    "guardian_income",
    "guardian_address",
    "guardian_phone",
    "kks_number",
    "kip_number",
    "reference_source",
    "selected_major",
];

/// Columns preceding the detail block in every registration `SELECT`.
const HEAD_COLUMNS: [&str; 2] = ["id", "registration_number"];
/// Columns following the detail block.
const TAIL_COLUMNS: [&str; 4] = ["registration_status", "created_at", "updated_at", "deleted_at"];

const UNIQUE_KEYS: [&str; 3] = ["nik", "nisn", "email"];

pub struct SqliteStore {
    connection: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let connection = Connection::open(path)?;
        Self::with_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self, RepositoryError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(connection: Connection) -> Result<Self, RepositoryError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrate(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().expect("sqlite connection mutex poisoned")
    }
}

fn enum_check(column: &str, options: &[(&str, &str)]) -> String {
    let values: Vec<String> = options
        .iter()
        .map(|(value, _)| format!("'{value}'"))
        .collect();
    format!("CHECK ({column} IN ({}))", values.join(", "))
}

fn migrate(connection: &Connection) -> Result<(), RepositoryError> {
    let schema = format!(
        "CREATE TABLE IF NOT EXISTS student_registrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            registration_number TEXT NOT NULL UNIQUE,
            registration_year INTEGER NOT NULL,
            nik TEXT NOT NULL,
            family_card_number TEXT NOT NULL,
            nisn TEXT NOT NULL,
            full_name TEXT NOT NULL,
            gender TEXT NOT NULL {gender},
            birth_place TEXT NOT NULL,
            birth_date TEXT NOT NULL,
            religion TEXT NOT NULL {religion},
            child_order INTEGER NOT NULL,
            siblings_count INTEGER NOT NULL,
            child_status TEXT NOT NULL {child_status},
            height INTEGER NOT NULL,
            weight INTEGER NOT NULL,
            blood_type TEXT {blood_type},
            address TEXT NOT NULL,
            village TEXT NOT NULL,
            district TEXT NOT NULL,
            city TEXT NOT NULL,
            province TEXT NOT NULL,
            postal_code TEXT NOT NULL,
            email TEXT NOT NULL,
            uniform_size TEXT NOT NULL {uniform_size},
            residence_status TEXT NOT NULL {residence_status},
            transportation TEXT NOT NULL {transportation},
            previous_school_type TEXT NOT NULL {previous_school_type},
            previous_school_address TEXT NOT NULL,
            diploma_number TEXT,
            diploma_date TEXT,
            graduation_year INTEGER NOT NULL,
            student_phone TEXT NOT NULL,
            father_name TEXT NOT NULL,
            father_nik TEXT NOT NULL,
            father_occupation TEXT NOT NULL,
            father_income INTEGER NOT NULL,
            mother_name TEXT NOT NULL,
            mother_nik TEXT NOT NULL,
            mother_occupation TEXT NOT NULL,
            mother_income INTEGER NOT NULL,
            parents_address TEXT NOT NULL,
            parents_phone TEXT NOT NULL,
            guardian_name TEXT,
            guardian_occupation TEXT,
            guardian_income INTEGER,
            guardian_address TEXT,
            guardian_phone TEXT,
            kks_number TEXT,
            kip_number TEXT,
            reference_source TEXT NOT NULL {reference_source},
            selected_major TEXT NOT NULL,
            registration_status TEXT NOT NULL DEFAULT 'pending' {registration_status},
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS student_registrations_nik_unique
            ON student_registrations (nik) WHERE deleted_at IS NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS student_registrations_nisn_unique
            ON student_registrations (nisn) WHERE deleted_at IS NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS student_registrations_email_unique
            ON student_registrations (email) WHERE deleted_at IS NULL;
        CREATE INDEX IF NOT EXISTS student_registrations_full_name_index
            ON student_registrations (full_name);
        CREATE INDEX IF NOT EXISTS student_registrations_selected_major_index
            ON student_registrations (selected_major);
        CREATE INDEX IF NOT EXISTS student_registrations_status_index
            ON student_registrations (registration_status);
        CREATE TABLE IF NOT EXISTS registration_sequences (
            year INTEGER PRIMARY KEY,
            last_sequence INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS student_registration_academic_years (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            academic_year INTEGER NOT NULL UNIQUE CHECK (academic_year BETWEEN 2020 AND 2100),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS student_registration_fees (
            academic_year_id INTEGER NOT NULL
                REFERENCES student_registration_academic_years (id),
            entry_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            amount INTEGER NOT NULL CHECK (amount >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            deleted_at TEXT,
            PRIMARY KEY (academic_year_id, entry_id)
        );",
        gender = enum_check("gender", Gender::OPTIONS),
        religion = enum_check("religion", Religion::OPTIONS),
        child_status = enum_check("child_status", ChildStatus::OPTIONS),
        blood_type = enum_check("blood_type", BloodType::OPTIONS),
        uniform_size = enum_check("uniform_size", UniformSize::OPTIONS),
        residence_status = enum_check("residence_status", ResidenceStatus::OPTIONS),
        transportation = enum_check("transportation", Transportation::OPTIONS),
        previous_school_type = enum_check("previous_school_type", PreviousSchoolType::OPTIONS),
        reference_source = enum_check("reference_source", ReferenceSource::OPTIONS),
        registration_status = enum_check("registration_status", RegistrationStatus::OPTIONS),
    );
    connection.execute_batch(&schema)?;
    Ok(())
}

impl From<rusqlite::Error> for RepositoryError {
    fn from(value: rusqlite::Error) -> Self {
        RepositoryError::Unavailable(value.to_string())
    }
}

/// Maps unique-constraint failures onto the column that caused them.
fn constraint_error(err: rusqlite::Error, number: Option<&RegistrationNumber>) -> RepositoryError {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            if let Some(number) = number {
                if message.contains("student_registrations.registration_number") {
                    return RepositoryError::NumberCollision(number.clone());
                }
            }
            for field in UNIQUE_KEYS {
                if message.contains(&format!("student_registrations.{field}")) {
                    return RepositoryError::Duplicate { field };
                }
            }
            if message.contains("student_registration_academic_years.academic_year") {
                return RepositoryError::Duplicate {
                    field: "academic_year",
                };
            }
        }
    }
    err.into()
}

fn timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

fn optional_text(value: &Option<String>) -> Value {
    value.as_deref().map_or(Value::Null, text)
}

fn integer(value: impl Into<i64>) -> Value {
    Value::Integer(value.into())
}

fn detail_values(details: &RegistrantDetails) -> Vec<Value> {
    let d = details;
    vec![
        text(&d.nik),
        text(&d.family_card_number),
        text(&d.nisn),
        text(&d.full_name),
        text(d.gender.as_str()),
        text(&d.birth_place),
        Value::Text(date(d.birth_date)),
        text(d.religion.as_str()),
        integer(d.child_order),
        integer(d.siblings_count),
        text(d.child_status.as_str()),
        integer(d.height),
        integer(d.weight),
        d.blood_type.map_or(Value::Null, |value| text(value.as_str())),
        text(&d.address),
        text(&d.village),
        text(&d.district),
        text(&d.city),
        text(&d.province),
        text(&d.postal_code),
        text(&d.email),
        text(d.uniform_size.as_str()),
        text(d.residence_status.as_str()),
        text(d.transportation.as_str()),
        text(d.previous_school_type.as_str()),
        text(&d.previous_school_address),
        optional_text(&d.diploma_number),
        d.diploma_date.map_or(Value::Null, |value| Value::Text(date(value))),
        integer(d.graduation_year),
        text(&d.student_phone),
        text(&d.father_name),
        text(&d.father_nik),
        text(&d.father_occupation),
        integer(d.father_income.minor()),
        text(&d.mother_name),
        text(&d.mother_nik),
        text(&d.mother_occupation),
        integer(d.mother_income.minor()),
        text(&d.parents_address),
        text(&d.parents_phone),
        optional_text(&d.guardian_name),
        optional_text(&d.guardian_occupation),
        d.guardian_income.map_or(Value::Null, |value| integer(value.minor())),
        optional_text(&d.guardian_address),
        optional_text(&d.guardian_phone),
        optional_text(&d.kks_number),
        optional_text(&d.kip_number),
        text(d.reference_source.as_str()),
        text(&d.selected_major),
    ]
}

fn parse_column<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(index)?;
    raw.parse()
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err)))
}

fn parse_optional_column<T>(row: &Row<'_>, index: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(index)?;
    raw.map(|raw| {
        raw.parse().map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(err))
        })
    })
    .transpose()
}

/// Reads the detail block starting at column `start`.
fn read_details(row: &Row<'_>, start: usize) -> rusqlite::Result<RegistrantDetails> {
    let mut index = start;
    let mut next = || {
        let current = index;
        index += 1;
        current
    };

    Ok(RegistrantDetails {
        nik: row.get(next())?,
        family_card_number: row.get(next())?,
        nisn: row.get(next())?,
        full_name: row.get(next())?,
        gender: parse_column(row, next())?,
        birth_place: row.get(next())?,
        birth_date: parse_column(row, next())?,
        religion: parse_column(row, next())?,
        child_order: row.get(next())?,
        siblings_count: row.get(next())?,
        child_status: parse_column(row, next())?,
        height: row.get(next())?,
        weight: row.get(next())?,
        blood_type: parse_optional_column(row, next())?,
        address: row.get(next())?,
        village: row.get(next())?,
        district: row.get(next())?,
        city: row.get(next())?,
        province: row.get(next())?,
        postal_code: row.get(next())?,
        email: row.get(next())?,
        uniform_size: parse_column(row, next())?,
        residence_status: parse_column(row, next())?,
        transportation: parse_column(row, next())?,
        previous_school_type: parse_column(row, next())?,
        previous_school_address: row.get(next())?,
        diploma_number: row.get(next())?,
        diploma_date: parse_optional_column(row, next())?,
        graduation_year: row.get(next())?,
        student_phone: row.get(next())?,
        father_name: row.get(next())?,
        father_nik: row.get(next())?,
        father_occupation: row.get(next())?,
        father_income: Money::from_minor(row.get(next())?),
        mother_name: row.get(next())?,
        mother_nik: row.get(next())?,
        mother_occupation: row.get(next())?,
        mother_income: Money::from_minor(row.get(next())?),
        parents_address: row.get(next())?,
        parents_phone: row.get(next())?,
        guardian_name: row.get(next())?,
        guardian_occupation: row.get(next())?,
        guardian_income: row.get::<_, Option<i64>>(next())?.map(Money::from_minor),
        guardian_address: row.get(next())?,
        guardian_phone: row.get(next())?,
        kks_number: row.get(next())?,
        kip_number: row.get(next())?,
        reference_source: parse_column(row, next())?,
        selected_major: row.get(next())?,
    })
}

fn select_columns() -> String {
    HEAD_COLUMNS
        .iter()
        .chain(DETAIL_COLUMNS.iter())
        .chain(TAIL_COLUMNS.iter())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

fn read_registration(row: &Row<'_>) -> rusqlite::Result<StudentRegistration> {
    let id: i64 = row.get(0)?;
    let tail = HEAD_COLUMNS.len() + DETAIL_COLUMNS.len();
    Ok(StudentRegistration {
        id: RegistrationId(id as u64),
        registration_number: parse_column(row, 1)?,
        details: read_details(row, HEAD_COLUMNS.len())?,
        registration_status: parse_column(row, tail)?,
        created_at: parse_column(row, tail + 1)?,
        updated_at: parse_column(row, tail + 2)?,
        deleted_at: parse_optional_column(row, tail + 3)?,
    })
}

fn fetch_live(
    connection: &Connection,
    id: RegistrationId,
) -> Result<Option<StudentRegistration>, RepositoryError> {
    let sql = format!(
        "SELECT {} FROM student_registrations WHERE id = ?1 AND deleted_at IS NULL",
        select_columns()
    );
    let record = connection
        .query_row(&sql, params![id.0 as i64], read_registration)
        .optional()?;
    Ok(record)
}

fn ensure_unique(
    connection: &Connection,
    details: &RegistrantDetails,
    except: Option<RegistrationId>,
) -> Result<(), RepositoryError> {
    let except = except.map_or(-1, |id| id.0 as i64);
    let candidates = [
        ("nik", details.nik.as_str()),
        ("nisn", details.nisn.as_str()),
        ("email", details.email.as_str()),
    ];
    for (field, value) in candidates {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM student_registrations
                WHERE {field} = ?1 COLLATE NOCASE AND deleted_at IS NULL AND id != ?2)"
        );
        let taken: bool = connection.query_row(&sql, params![value, except], |row| row.get(0))?;
        if taken {
            return Err(RepositoryError::Duplicate { field });
        }
    }
    Ok(())
}

/// Reads and advances the per-year counter inside the caller's transaction.
fn allocate_number(tx: &Transaction<'_>, year: i32) -> Result<RegistrationNumber, RepositoryError> {
    let recorded: Option<u32> = tx
        .query_row(
            "SELECT last_sequence FROM registration_sequences WHERE year = ?1",
            params![year],
            |row| row.get(0),
        )
        .optional()?;

    let last = match recorded {
        Some(last) => last,
        None => tx.query_row(
            "SELECT COALESCE(MAX(CAST(substr(registration_number, 8, 4) AS INTEGER)), 0)
             FROM student_registrations WHERE registration_year = ?1",
            params![year],
            |row| row.get(0),
        )?,
    };

    let number = RegistrationNumber::new(year, last + 1)?;
    tx.execute(
        "INSERT INTO registration_sequences (year, last_sequence) VALUES (?1, ?2)
         ON CONFLICT (year) DO UPDATE SET last_sequence = excluded.last_sequence",
        params![year, number.sequence()],
    )?;
    Ok(number)
}

fn where_clause(filter: &RegistrationFilter) -> (String, Vec<Value>) {
    let mut clauses = vec!["deleted_at IS NULL".to_string()];
    let mut values = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("registration_status = ?".to_string());
        values.push(text(status.as_str()));
    }
    if let Some(major) = &filter.major {
        clauses.push("selected_major = ?".to_string());
        values.push(text(major));
    }
    if let Some(religion) = filter.religion {
        clauses.push("religion = ?".to_string());
        values.push(text(religion.as_str()));
    }
    if let Some(from) = filter.created_from {
        clauses.push("substr(created_at, 1, 10) >= ?".to_string());
        values.push(Value::Text(date(from)));
    }
    if let Some(until) = filter.created_until {
        clauses.push("substr(created_at, 1, 10) <= ?".to_string());
        values.push(Value::Text(date(until)));
    }
    if let Some(from) = filter.born_from {
        clauses.push("birth_date >= ?".to_string());
        values.push(Value::Text(date(from)));
    }
    if let Some(until) = filter.born_until {
        clauses.push("birth_date <= ?".to_string());
        values.push(Value::Text(date(until)));
    }
    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", escape_like(term.trim()));
        let columns = ["registration_number", "full_name", "nik", "nisn", "email"];
        let matches: Vec<String> = columns
            .iter()
            .map(|column| format!("{column} LIKE ? ESCAPE '\\'"))
            .collect();
        clauses.push(format!("({})", matches.join(" OR ")));
        values.extend(columns.iter().map(|_| Value::Text(pattern.clone())));
    }

    (clauses.join(" AND "), values)
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn order_clause(sort: SortKey, direction: SortDirection) -> String {
    let column = match sort {
        SortKey::CreatedAt => "created_at",
        SortKey::UpdatedAt => "updated_at",
        SortKey::RegistrationNumber => "registration_number",
        SortKey::FullName => "full_name COLLATE NOCASE",
        SortKey::SelectedMajor => "selected_major",
    };
    let direction = match direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    format!("{column} {direction}, id {direction}")
}

impl RegistrationRepository for SqliteStore {
    fn create(&self, registration: NewRegistration) -> Result<StudentRegistration, RepositoryError> {
        let mut connection = self.connection();
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        ensure_unique(&tx, &registration.details, None)?;

        let year = registration.created_at.year();
        let number = allocate_number(&tx, year)?;
        let created_at = timestamp(&registration.created_at);

        let columns: Vec<&str> = ["registration_number", "registration_year"]
            .into_iter()
            .chain(DETAIL_COLUMNS)
            .chain(["registration_status", "created_at", "updated_at"])
            .collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO student_registrations ({}) VALUES ({placeholders})",
            columns.join(", ")
        );

        let mut values = vec![Value::Text(number.to_string()), integer(year)];
        values.extend(detail_values(&registration.details));
        values.extend([
            text(RegistrationStatus::Pending.as_str()),
            Value::Text(created_at.clone()),
            Value::Text(created_at),
        ]);

        tx.execute(&sql, params_from_iter(values))
            .map_err(|err| constraint_error(err, Some(&number)))?;
        let id = RegistrationId(tx.last_insert_rowid() as u64);
        let record = fetch_live(&tx, id)?.ok_or(RepositoryError::NotFound)?;
        tx.commit()?;

        debug!(registration_number = %record.registration_number, "registration row inserted");
        Ok(record)
    }

    fn fetch(&self, id: RegistrationId) -> Result<Option<StudentRegistration>, RepositoryError> {
        fetch_live(&self.connection(), id)
    }

    fn update_details(
        &self,
        id: RegistrationId,
        details: RegistrantDetails,
        updated_at: DateTime<Utc>,
    ) -> Result<StudentRegistration, RepositoryError> {
        let mut connection = self.connection();
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let current = fetch_live(&tx, id)?.ok_or(RepositoryError::NotFound)?;
        if current.registration_status != RegistrationStatus::Pending {
            return Err(RepositoryError::Locked(current.registration_status));
        }
        ensure_unique(&tx, &details, Some(id))?;

        let assignments: Vec<String> = DETAIL_COLUMNS
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect();
        let sql = format!(
            "UPDATE student_registrations SET {}, updated_at = ?
             WHERE id = ? AND deleted_at IS NULL AND registration_status = 'pending'",
            assignments.join(", ")
        );
        let mut values = detail_values(&details);
        values.push(Value::Text(timestamp(&updated_at)));
        values.push(integer(id.0 as i64));

        let changed = tx
            .execute(&sql, params_from_iter(values))
            .map_err(|err| constraint_error(err, None))?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        let record = fetch_live(&tx, id)?.ok_or(RepositoryError::NotFound)?;
        tx.commit()?;
        Ok(record)
    }

    fn set_status(
        &self,
        id: RegistrationId,
        status: RegistrationStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<StatusTransition, RepositoryError> {
        let mut connection = self.connection();
        let tx = connection.transaction()?;
        let current = fetch_live(&tx, id)?.ok_or(RepositoryError::NotFound)?;
        tx.execute(
            "UPDATE student_registrations SET registration_status = ?1, updated_at = ?2
             WHERE id = ?3 AND deleted_at IS NULL",
            params![status.as_str(), timestamp(&updated_at), id.0 as i64],
        )?;
        tx.commit()?;

        Ok(StatusTransition {
            id,
            registration_number: current.registration_number,
            from: current.registration_status,
            to: status,
        })
    }

    fn soft_delete(&self, id: RegistrationId, deleted_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let stamp = timestamp(&deleted_at);
        let changed = self.connection().execute(
            "UPDATE student_registrations SET deleted_at = ?1, updated_at = ?1
             WHERE id = ?2 AND deleted_at IS NULL",
            params![stamp, id.0 as i64],
        )?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    fn list(&self, criteria: &ListCriteria) -> Result<Page<StudentRegistration>, RepositoryError> {
        let connection = self.connection();
        let (clause, values) = where_clause(&criteria.filter);

        let total: i64 = connection.query_row(
            &format!("SELECT COUNT(*) FROM student_registrations WHERE {clause}"),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let sql = format!(
            "SELECT {} FROM student_registrations WHERE {clause} ORDER BY {} LIMIT ? OFFSET ?",
            select_columns(),
            order_clause(criteria.sort, criteria.direction),
        );
        let mut paged = values;
        paged.push(integer(i64::from(criteria.pagination.per_page)));
        paged.push(integer(criteria.pagination.offset() as i64));

        let mut statement = connection.prepare(&sql)?;
        let items = statement
            .query_map(params_from_iter(paged), read_registration)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page::new(items, total as u64, criteria.pagination))
    }

    fn status_counts(&self) -> Result<StatusCounts, RepositoryError> {
        let connection = self.connection();
        let mut statement = connection.prepare(
            "SELECT registration_status, COUNT(*) FROM student_registrations
             WHERE deleted_at IS NULL GROUP BY registration_status",
        )?;
        let rows = statement
            .query_map([], |row| {
                Ok((
                    parse_column::<RegistrationStatus>(row, 0)?,
                    row.get::<_, i64>(1)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            counts.add(status, count as u64);
        }
        Ok(counts)
    }

    fn distinct_majors(&self) -> Result<Vec<String>, RepositoryError> {
        let connection = self.connection();
        let mut statement = connection.prepare(
            "SELECT DISTINCT selected_major FROM student_registrations
             WHERE deleted_at IS NULL ORDER BY selected_major",
        )?;
        let majors = statement
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(majors)
    }

    fn major_counts(&self) -> Result<Vec<MajorCount>, RepositoryError> {
        let connection = self.connection();
        let mut statement = connection.prepare(
            "SELECT selected_major, COUNT(*) FROM student_registrations
             WHERE deleted_at IS NULL GROUP BY selected_major ORDER BY selected_major",
        )?;
        let counts = statement
            .query_map([], |row| {
                Ok(MajorCount {
                    major: row.get(0)?,
                    registrations: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    fn income_summary(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<IncomeSummary, RepositoryError> {
        let filter = RegistrationFilter {
            status,
            ..RegistrationFilter::default()
        };
        let (clause, values) = where_clause(&filter);
        let (registrations, total): (i64, i64) = self.connection().query_row(
            &format!(
                "SELECT COUNT(*), COALESCE(SUM(father_income + mother_income), 0)
                 FROM student_registrations WHERE {clause}"
            ),
            params_from_iter(values),
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(IncomeSummary {
            registrations: registrations as u64,
            total_parent_income: Money::from_minor(total),
        })
    }
}

fn read_fee(row: &Row<'_>) -> rusqlite::Result<FeeEntry> {
    Ok(FeeEntry {
        id: FeeEntryId(row.get(0)?),
        name: row.get(1)?,
        amount: row.get(2)?,
        created_at: parse_column(row, 3)?,
        updated_at: parse_column(row, 4)?,
        deleted_at: parse_optional_column(row, 5)?,
    })
}

fn load_year(connection: &Connection, year: i32) -> Result<Option<AcademicYear>, RepositoryError> {
    let header = connection
        .query_row(
            "SELECT id, created_at, updated_at FROM student_registration_academic_years
             WHERE academic_year = ?1",
            params![year],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    parse_column::<DateTime<Utc>>(row, 1)?,
                    parse_column::<DateTime<Utc>>(row, 2)?,
                ))
            },
        )
        .optional()?;
    let Some((row_id, created_at, updated_at)) = header else {
        return Ok(None);
    };

    let mut statement = connection.prepare(
        "SELECT entry_id, name, amount, created_at, updated_at, deleted_at
         FROM student_registration_fees WHERE academic_year_id = ?1 ORDER BY position",
    )?;
    let fees = statement
        .query_map(params![row_id], read_fee)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(AcademicYear {
        year,
        fees,
        created_at,
        updated_at,
    }))
}

fn write_fees(tx: &Transaction<'_>, row_id: i64, fees: &[FeeEntry]) -> Result<(), RepositoryError> {
    tx.execute(
        "DELETE FROM student_registration_fees WHERE academic_year_id = ?1",
        params![row_id],
    )?;
    let mut statement = tx.prepare(
        "INSERT INTO student_registration_fees
            (academic_year_id, entry_id, position, name, amount, created_at, updated_at, deleted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    for (position, fee) in fees.iter().enumerate() {
        statement.execute(params![
            row_id,
            fee.id.0,
            position as i64,
            fee.name,
            fee.amount,
            timestamp(&fee.created_at),
            timestamp(&fee.updated_at),
            fee.deleted_at.as_ref().map(timestamp),
        ])?;
    }
    Ok(())
}

impl FeeCatalogRepository for SqliteStore {
    fn create_year(&self, year: AcademicYear) -> Result<AcademicYear, RepositoryError> {
        let mut connection = self.connection();
        let tx = connection.transaction()?;
        tx.execute(
            "INSERT INTO student_registration_academic_years (academic_year, created_at, updated_at)
             VALUES (?1, ?2, ?3)",
            params![year.year, timestamp(&year.created_at), timestamp(&year.updated_at)],
        )
        .map_err(|err| constraint_error(err, None))?;
        let row_id = tx.last_insert_rowid();
        write_fees(&tx, row_id, &year.fees)?;
        tx.commit()?;
        Ok(year)
    }

    fn fetch_year(&self, year: i32) -> Result<Option<AcademicYear>, RepositoryError> {
        load_year(&self.connection(), year)
    }

    fn update_year<T>(
        &self,
        year: i32,
        change: impl FnOnce(&mut AcademicYear) -> Result<T, FeeCatalogError>,
    ) -> Result<T, FeeUpdateError> {
        let mut connection = self.connection();
        let tx = connection
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;
        let row_id: i64 = tx
            .query_row(
                "SELECT id FROM student_registration_academic_years WHERE academic_year = ?1",
                params![year],
                |row| row.get(0),
            )
            .optional()
            .map_err(RepositoryError::from)?
            .ok_or(RepositoryError::NotFound)?;
        let mut academic_year = load_year(&tx, year)?.ok_or(RepositoryError::NotFound)?;

        let outcome = change(&mut academic_year)?;

        tx.execute(
            "UPDATE student_registration_academic_years SET updated_at = ?1 WHERE id = ?2",
            params![timestamp(&academic_year.updated_at), row_id],
        )
        .map_err(RepositoryError::from)?;
        write_fees(&tx, row_id, &academic_year.fees)?;
        tx.commit().map_err(RepositoryError::from)?;
        Ok(outcome)
    }

    fn list_years(&self) -> Result<Vec<AcademicYear>, RepositoryError> {
        let connection = self.connection();
        let mut statement = connection.prepare(
            "SELECT academic_year FROM student_registration_academic_years
             ORDER BY academic_year DESC",
        )?;
        let years = statement
            .query_map([], |row| row.get::<_, i32>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut loaded = Vec::with_capacity(years.len());
        for year in years {
            if let Some(academic_year) = load_year(&connection, year)? {
                loaded.push(academic_year);
            }
        }
        Ok(loaded)
    }
}
