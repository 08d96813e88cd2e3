//! Delimited-text encoding of the two ledger tables.
//!
//! Comma-separated with a header row and double-quote escaping. List cells
//! (completed stops, achievements) are comma-joined inside one quoted cell.
//! Columns are located by header name, so reordered files still load.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

use super::{Participant, ParticipantTable, PunishmentLog, PunishmentRecord};
use crate::achievements::Achievement;
use crate::error::StoreError;

pub const PARTICIPANT_COLUMNS: [&str; 6] = [
    "Name",
    "CurrentPub",
    "CompletedPubs",
    "Points",
    "Achievements",
    "StartTime",
];

pub const PUNISHMENT_COLUMNS: [&str; 4] = ["Time", "Name", "Pub", "Punishment"];

const PARTICIPANTS: &str = "participants";
const PUNISHMENTS: &str = "punishments";

/// A decoded table plus anything odd that was tolerated on the way.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub table: T,
    pub warnings: Vec<String>,
}

// ============================================================================
// Participants
// ============================================================================

pub fn encode_participants(table: &ParticipantTable) -> String {
    let mut out = encode_record(&PARTICIPANT_COLUMNS);
    for p in table.iter() {
        let achievements: Vec<&str> = p.achievements.iter().map(|a| a.id()).collect();
        out.push_str(&encode_record(&[
            &p.name,
            &p.current_stop.to_string(),
            &p.completed_stops.join(","),
            &p.points.to_string(),
            &achievements.join(","),
            &p.start_time.to_rfc3339(),
        ]));
    }
    out
}

pub fn decode_participants(text: &str) -> Result<Decoded<ParticipantTable>, StoreError> {
    let mut warnings = Vec::new();
    let Some((columns, rows)) = split_table(text, PARTICIPANTS, &PARTICIPANT_COLUMNS)? else {
        return Ok(Decoded {
            table: ParticipantTable::new(),
            warnings,
        });
    };

    let mut table = ParticipantTable::new();
    for (line, fields) in rows {
        let cell = |col: usize| fields.get(columns[col]).map(String::as_str).unwrap_or("");
        let err = |message: String| StoreError::Codec {
            table: PARTICIPANTS,
            line,
            message,
        };

        let name = cell(0).trim();
        if name.is_empty() {
            return Err(err("empty Name".to_string()));
        }
        let completed_stops = split_list(cell(2));
        let current_stop: usize = cell(1)
            .trim()
            .parse()
            .map_err(|_| err(format!("bad CurrentPub '{}'", cell(1))))?;
        let points = parse_points(cell(3)).ok_or_else(|| err(format!("bad Points '{}'", cell(3))))?;
        let start_time = parse_timestamp(cell(5))
            .ok_or_else(|| err(format!("bad StartTime '{}'", cell(5))))?;

        let mut participant = Participant::new(name, start_time).map_err(|e| err(e.to_string()))?;
        if current_stop != completed_stops.len() {
            warnings.push(format!(
                "{name}: CurrentPub {current_stop} disagrees with {} completed pubs; using the list",
                completed_stops.len()
            ));
        }
        participant.current_stop = completed_stops.len();
        participant.completed_stops = completed_stops;
        participant.points = points;
        for id in split_list(cell(4)) {
            match id.parse::<Achievement>() {
                Ok(a) => {
                    participant.achievements.insert(a);
                }
                Err(_) => warnings.push(format!("{name}: skipping unknown achievement '{id}'")),
            }
        }

        if table.get(&participant.name).is_some() {
            warnings.push(format!("{name}: duplicate row, keeping the last one"));
        }
        table.upsert(participant);
    }

    Ok(Decoded { table, warnings })
}

// ============================================================================
// Punishments
// ============================================================================

pub fn encode_punishments(log: &PunishmentLog) -> String {
    let mut out = encode_record(&PUNISHMENT_COLUMNS);
    for r in log.rows() {
        out.push_str(&encode_record(&[
            &r.time.to_rfc3339(),
            &r.name,
            &r.stop,
            &r.punishment,
        ]));
    }
    out
}

pub fn decode_punishments(text: &str) -> Result<Decoded<PunishmentLog>, StoreError> {
    let Some((columns, rows)) = split_table(text, PUNISHMENTS, &PUNISHMENT_COLUMNS)? else {
        return Ok(Decoded {
            table: PunishmentLog::new(),
            warnings: Vec::new(),
        });
    };

    let mut log = PunishmentLog::new();
    for (line, fields) in rows {
        let cell = |col: usize| fields.get(columns[col]).map(String::as_str).unwrap_or("");
        let time = parse_timestamp(cell(0)).ok_or_else(|| StoreError::Codec {
            table: PUNISHMENTS,
            line,
            message: format!("bad Time '{}'", cell(0)),
        })?;
        log.append(PunishmentRecord {
            time,
            name: cell(1).trim().to_string(),
            stop: cell(2).trim().to_string(),
            punishment: cell(3).trim().to_string(),
        });
    }

    Ok(Decoded {
        table: log,
        warnings: Vec::new(),
    })
}

// ============================================================================
// Field helpers
// ============================================================================

fn split_list(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_points(cell: &str) -> Option<u64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Some(0);
    }
    if let Ok(n) = cell.parse::<u64>() {
        return Some(n);
    }
    // Spreadsheet exports write whole numbers as "200.0".
    let f = cell.parse::<f64>().ok()?;
    (f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
}

/// RFC 3339, a naive `YYYY-MM-DD HH:MM:SS` (taken as UTC), or a bare
/// `HH:MM:SS` from older logs (placed on 1970-01-01).
pub fn parse_timestamp(cell: &str) -> Option<DateTime<Utc>> {
    let cell = cell.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(cell, fmt) {
            return Some(naive.and_utc());
        }
    }
    let time = NaiveTime::parse_from_str(cell, "%H:%M:%S").ok()?;
    Some(NaiveDate::default().and_time(time).and_utc())
}

// ============================================================================
// Record layer
// ============================================================================

type Rows = Vec<(usize, Vec<String>)>;

/// Parse `text` and map the required columns to their positions.
///
/// Returns `None` for a blank document.
fn split_table(
    text: &str,
    table: &'static str,
    required: &[&str],
) -> Result<Option<(Vec<usize>, Rows)>, StoreError> {
    let mut records = parse_records(text).map_err(|(line, message)| StoreError::Codec {
        table,
        line,
        message,
    })?;
    if records.is_empty() {
        return Ok(None);
    }

    let (header_line, header) = records.remove(0);
    let mut columns = Vec::with_capacity(required.len());
    for want in required {
        let idx = header
            .iter()
            .position(|h| h.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(want))
            .ok_or_else(|| StoreError::Codec {
                table,
                line: header_line,
                message: format!("missing column '{want}'"),
            })?;
        columns.push(idx);
    }

    records.retain(|(_, fields)| !(fields.len() == 1 && fields[0].trim().is_empty()));
    Ok(Some((columns, records)))
}

fn encode_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn encode_record(fields: &[&str]) -> String {
    let mut line = fields
        .iter()
        .map(|f| encode_field(f))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

/// Split text into records of fields, honouring quotes (which may span lines).
///
/// Each record carries the 1-based line it started on. Errors carry the line
/// of the offending quote.
fn parse_records(text: &str) -> Result<Rows, (usize, String)> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut line = 1;
    let mut record_line = 1;
    let mut quote_line = 1;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            ',' => fields.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(std::mem::take(&mut field));
                records.push((record_line, std::mem::take(&mut fields)));
                line += 1;
                record_line = line;
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err((quote_line, "unterminated quoted field".to_string()));
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        records.push((record_line, fields));
    }
    Ok(records)
}
