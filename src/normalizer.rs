use std::ops::Range;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{DataQualityWarning, PromotionError, Result};
use crate::models::{
    Course, CourseRecord, CourseStatus, Department, Person, RankHeld, RoleAssignment, Sex, Span,
    Timed,
};
use crate::ranks::{self, Convention};

const DATE_FORMAT: &str = "%d.%m.%Y";

const COL_FIRST_NAME: &str = "Vorname";
const COL_LAST_NAME: &str = "Nachname";
const COL_BIRTH_DATE: &str = "Geburtsdatum";
const COL_SEX: &str = "Geschlecht";
const COL_PERSONNEL_ID: &str = "Personal-Nr.";
const COL_HIRE_DATE: &str = "Einstellungsdatum";

/// Header plus rows, read positionally: group column names like "Von 1"
/// repeat once per category.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Department,
    Rank,
    Role,
    Course,
}

impl GroupKind {
    const ALL: [GroupKind; 4] = [
        GroupKind::Department,
        GroupKind::Rank,
        GroupKind::Role,
        GroupKind::Course,
    ];

    fn column_prefix(&self) -> &'static str {
        match self {
            GroupKind::Department => "Art/Abteilung",
            GroupKind::Rank => "Abk. Dienstgrad",
            GroupKind::Role => "Dienststellung",
            GroupKind::Course => "Lehrgangsbezeichnung",
        }
    }

    fn pattern(&self) -> Result<Regex> {
        let pattern = format!(
            r"(?i)^\s*{}\s+([0-9]+)\s*$",
            regex::escape(self.column_prefix())
        );
        Ok(Regex::new(&pattern)?)
    }
}

/// Column offsets of one numbered group, e.g. "Lehrgangsbezeichnung 3" with
/// its "Von 3", "Bis 3" and "Status 3".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupColumns {
    pub number: u32,
    pub label: usize,
    pub from: usize,
    pub to: Option<usize>,
    pub status: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    headers: Vec<String>,
    first_name: usize,
    last_name: usize,
    birth_date: usize,
    sex: usize,
    personnel_id: usize,
    hire_date: Option<usize>,
    pub departments: Vec<GroupColumns>,
    pub ranks: Vec<GroupColumns>,
    pub roles: Vec<GroupColumns>,
    pub courses: Vec<GroupColumns>,
}

fn clean_header(header: &str) -> &str {
    header.trim_start_matches('\u{feff}').trim()
}

fn find_column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| clean_header(h) == name)
}

fn require_column(headers: &[String], name: &str) -> Result<usize> {
    find_column(headers, name).ok_or_else(|| PromotionError::MissingColumn(name.to_string()))
}

/// First column named `name` within `scope`.
fn find_column_in(headers: &[String], scope: Range<usize>, name: &str) -> Option<usize> {
    headers[scope.clone()]
        .iter()
        .position(|h| clean_header(h).eq_ignore_ascii_case(name))
        .map(|offset| scope.start + offset)
}

/// A numbered group-label column, e.g. "Dienststellung 2" at index 15.
#[derive(Debug, Clone, Copy)]
struct LabelColumn {
    idx: usize,
    kind: GroupKind,
    number: u32,
}

/// Every group-label column of every category, in header order.
fn label_columns(headers: &[String]) -> Result<Vec<LabelColumn>> {
    let patterns = GroupKind::ALL
        .iter()
        .map(|kind| Ok((*kind, kind.pattern()?)))
        .collect::<Result<Vec<_>>>()?;

    let mut labels = Vec::new();
    for (idx, header) in headers.iter().enumerate() {
        for (kind, pattern) in &patterns {
            let number = pattern
                .captures(clean_header(header))
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok());
            if let Some(number) = number {
                labels.push(LabelColumn {
                    idx,
                    kind: *kind,
                    number,
                });
            }
        }
    }
    Ok(labels)
}

impl TableSchema {
    /// Discovers fixed columns and all numbered groups. Runs once per input.
    pub fn from_headers(headers: &[String]) -> Result<Self> {
        let labels = label_columns(headers)?;
        Ok(Self {
            headers: headers.to_vec(),
            first_name: require_column(headers, COL_FIRST_NAME)?,
            last_name: require_column(headers, COL_LAST_NAME)?,
            birth_date: require_column(headers, COL_BIRTH_DATE)?,
            sex: require_column(headers, COL_SEX)?,
            personnel_id: require_column(headers, COL_PERSONNEL_ID)?,
            hire_date: find_column(headers, COL_HIRE_DATE),
            departments: Self::discover_groups(headers, &labels, GroupKind::Department)?,
            ranks: Self::discover_groups(headers, &labels, GroupKind::Rank)?,
            roles: Self::discover_groups(headers, &labels, GroupKind::Role)?,
            courses: Self::discover_groups(headers, &labels, GroupKind::Course)?,
        })
    }

    /// A group's Von/Bis/Status columns lie between its label column and the
    /// next label column of any category.
    fn discover_groups(
        headers: &[String],
        labels: &[LabelColumn],
        kind: GroupKind,
    ) -> Result<Vec<GroupColumns>> {
        let mut groups = Vec::new();

        for (pos, label) in labels.iter().enumerate() {
            if label.kind != kind {
                continue;
            }
            let scope_end = labels.get(pos + 1).map_or(headers.len(), |next| next.idx);
            let scope = label.idx..scope_end;
            let number = label.number;

            let from_name = format!("Von {}", number);
            let from = find_column_in(headers, scope.clone(), &from_name).ok_or_else(|| {
                PromotionError::MissingColumn(format!(
                    "{} (for '{}')",
                    from_name,
                    clean_header(&headers[label.idx])
                ))
            })?;
            let to = find_column_in(headers, scope.clone(), &format!("Bis {}", number));
            let status = match kind {
                GroupKind::Course => find_column_in(headers, scope, &format!("Status {}", number)),
                _ => None,
            };

            groups.push(GroupColumns {
                number,
                label: label.idx,
                from,
                to,
                status,
            });
        }

        debug!("{} column groups for '{}'", groups.len(), kind.column_prefix());
        Ok(groups)
    }

    fn header(&self, idx: usize) -> &str {
        self.headers.get(idx).map(|h| clean_header(h)).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub person: Person,
    pub warnings: Vec<DataQualityWarning>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    pub persons: Vec<Person>,
    pub warnings: Vec<DataQualityWarning>,
}

pub struct Normalizer<'a> {
    schema: &'a TableSchema,
    reference: NaiveDate,
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|value| value.trim()).unwrap_or_default()
}

fn record_warning(warnings: &mut Vec<DataQualityWarning>, warning: DataQualityWarning) {
    warn!("{}", warning);
    warnings.push(warning);
}

impl<'a> Normalizer<'a> {
    pub fn new(schema: &'a TableSchema, reference: NaiveDate) -> Self {
        Self { schema, reference }
    }

    /// Normalizes every row. The first malformed required date aborts the
    /// whole batch.
    pub fn normalize_table(&self, table: &RawTable) -> Result<NormalizedTable> {
        let mut normalized = NormalizedTable::default();
        for (row_idx, row) in table.rows.iter().enumerate() {
            if row.iter().all(|value| value.trim().is_empty()) {
                continue;
            }
            let record = self.normalize_row(row_idx, row)?;
            normalized.warnings.extend(record.warnings);
            normalized.persons.push(record.person);
        }
        Ok(normalized)
    }

    pub fn normalize_row(&self, row_idx: usize, row: &[String]) -> Result<NormalizedRecord> {
        let schema = self.schema;
        let personnel_id = cell(row, schema.personnel_id).to_string();
        // Personnel ids identify records in messages; names stay out of logs.
        let record = if personnel_id.is_empty() {
            format!("row {}", row_idx + 1)
        } else {
            personnel_id.clone()
        };
        debug!("Reading record: {}", record);

        let mut warnings = Vec::new();

        let birth_date = self.parse_date(&record, schema.birth_date, cell(row, schema.birth_date))?;
        let hire_date = match schema.hire_date.map(|idx| (idx, cell(row, idx))) {
            Some((idx, value)) if !value.is_empty() => Some(self.parse_date(&record, idx, value)?),
            _ => None,
        };

        let sex_value = cell(row, schema.sex);
        let sex = Sex::from_label(sex_value);
        if sex == Sex::Unknown {
            record_warning(
                &mut warnings,
                DataQualityWarning::UnknownSex {
                    record: record.clone(),
                    value: sex_value.to_string(),
                },
            );
        }

        let mut departments: Vec<_> = self
            .read_spans(&record, row, &schema.departments, &mut warnings)?
            .into_iter()
            .map(|(span, _)| Span::new(Department::from_label(&span.label), span.start, span.end))
            .collect();
        departments.sort_by_key(|d| d.resolved_end(self.reference));
        if departments.is_empty() {
            record_warning(
                &mut warnings,
                DataQualityWarning::NoDepartmentHistory { record: record.clone() },
            );
        }

        let mut ranks: Vec<RankHeld> = self
            .read_spans(&record, row, &schema.ranks, &mut warnings)?
            .into_iter()
            .map(|(span, _)| span)
            .collect();
        if ranks.is_empty() {
            let substituted = ranks::base_rank().name(Convention::New, sex).to_string();
            record_warning(
                &mut warnings,
                DataQualityWarning::MissingRank {
                    record: record.clone(),
                    substituted: format!(
                        "{} from {} to {}",
                        substituted,
                        self.reference.format(DATE_FORMAT),
                        self.reference.format(DATE_FORMAT)
                    ),
                },
            );
            ranks.push(Span::new(substituted, self.reference, Some(self.reference)));
        }
        ranks.sort_by_key(|r| r.resolved_end(self.reference));

        let mut roles: Vec<RoleAssignment> = self
            .read_spans(&record, row, &schema.roles, &mut warnings)?
            .into_iter()
            .map(|(span, _)| span)
            .collect();
        roles.sort_by_key(|r| r.resolved_end(self.reference));

        let mut courses: Vec<CourseRecord> = self
            .read_spans(&record, row, &schema.courses, &mut warnings)?
            .into_iter()
            .map(|(span, group)| {
                let raw_status = group.status.map(|idx| cell(row, idx)).unwrap_or_default();
                let status = match CourseStatus::from_label(raw_status) {
                    Some(CourseStatus::Unknown) => {
                        record_warning(
                            &mut warnings,
                            DataQualityWarning::MissingCourseStatus {
                                record: record.clone(),
                                group: group.number,
                            },
                        );
                        CourseStatus::Unknown
                    }
                    Some(status) => status,
                    None => {
                        record_warning(
                            &mut warnings,
                            DataQualityWarning::UnknownCourseStatus {
                                record: record.clone(),
                                group: group.number,
                                value: raw_status.to_string(),
                            },
                        );
                        CourseStatus::NotPassed
                    }
                };
                CourseRecord {
                    span: Span::new(Course::from_label(&span.label), span.start, span.end),
                    status,
                }
            })
            .collect();
        courses.sort_by_key(|c| c.resolved_end(self.reference));

        let person = Person {
            first_name: cell(row, schema.first_name).to_string(),
            last_name: cell(row, schema.last_name).to_string(),
            birth_date,
            sex,
            personnel_id,
            hire_date,
            departments,
            ranks,
            roles,
            courses,
        };

        Ok(NormalizedRecord { person, warnings })
    }

    /// Reads every group with a non-empty label. Open ends stay `None`.
    fn read_spans<'g>(
        &self,
        record: &str,
        row: &[String],
        groups: &'g [GroupColumns],
        warnings: &mut Vec<DataQualityWarning>,
    ) -> Result<Vec<(Span<String>, &'g GroupColumns)>> {
        let mut spans = Vec::new();

        for group in groups {
            let label = cell(row, group.label);
            if label.is_empty() {
                continue;
            }

            let from = cell(row, group.from);
            let to = group.to.map(|idx| cell(row, idx)).unwrap_or_default();
            debug!(
                "  {}[{}]: {};  von[{}]: {};  bis[{:?}]: {}",
                self.schema.header(group.label),
                group.label,
                label,
                group.from,
                from,
                group.to,
                to
            );

            if from.is_empty() {
                record_warning(
                    warnings,
                    DataQualityWarning::MissingStartDate {
                        record: record.to_string(),
                        column: self.schema.header(group.label).to_string(),
                    },
                );
                continue;
            }

            let start = self.parse_date(record, group.from, from)?;
            let end = match group.to {
                Some(idx) if !to.is_empty() => Some(self.parse_date(record, idx, to)?),
                _ => None,
            };
            spans.push((Span::new(label.to_string(), start, end), group));
        }

        Ok(spans)
    }

    fn parse_date(&self, record: &str, column: usize, value: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| PromotionError::Parse {
            record: record.to_string(),
            column: self.schema.header(column).to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn headers() -> Vec<String> {
        [
            "Vorname",
            "Nachname",
            "Geburtsdatum",
            "Geschlecht",
            "Personal-Nr.",
            "Einstellungsdatum",
            "Art/Abteilung 1",
            "Von 1",
            "Bis 1",
            "Art/Abteilung 2",
            "Von 2",
            "Bis 2",
            "Abk. Dienstgrad 1",
            "Von 1",
            "Bis 1",
            "Dienststellung 1",
            "Von 1",
            "Bis 1",
            "Lehrgangsbezeichnung 1",
            "Von 1",
            "Bis 1",
            "Status 1",
            "Lehrgangsbezeichnung 2",
            "Von 2",
            "Bis 2",
            "Status 2",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect()
    }

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn full_row() -> Vec<String> {
        row(&[
            "Erika", "Muster", "01.02.1990", "weiblich", "4711", "",
            "Jugendfeuerwehr", "01.01.2002", "31.12.2007",
            "Einsatzabteilung FF", "01.01.2008", "",
            "HFF", "01.01.2018", "",
            "Gerätewart", "01.03.2015", "",
            "Truppführer", "01.02.2012", "15.02.2012", "Bestanden",
            "Sprechfunkerlehrgang", "01.01.2013", "05.01.2013", "",
        ])
    }

    #[test]
    fn test_schema_pairs_repeated_columns_per_group() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        assert_eq!(schema.departments.len(), 2);
        assert_eq!(
            schema.departments[1],
            GroupColumns {
                number: 2,
                label: 9,
                from: 10,
                to: Some(11),
                status: None
            }
        );
        assert_eq!(schema.ranks[0].from, 13);
        assert_eq!(schema.roles[0].to, Some(17));
        assert_eq!(schema.courses[1].status, Some(25));
        assert_eq!(schema.hire_date, Some(5));
    }

    #[test]
    fn test_schema_search_stops_at_next_group() {
        let mut headers = headers();
        // rank group 1 without its own "Bis 1"
        headers.remove(14);
        let schema = TableSchema::from_headers(&headers).unwrap();
        assert_eq!(schema.ranks[0].from, 13);
        assert_eq!(schema.ranks[0].to, None);
        assert_eq!(schema.roles[0].label, 14);
        assert_eq!(schema.roles[0].to, Some(16));
    }

    #[test]
    fn test_schema_requires_fixed_columns() {
        let mut headers = headers();
        headers.remove(2);
        match TableSchema::from_headers(&headers) {
            Err(PromotionError::MissingColumn(name)) => assert_eq!(name, "Geburtsdatum"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_schema_tolerates_bom_and_missing_hire_date() {
        let mut headers = headers();
        headers[0] = "\u{feff}Vorname".to_string();
        headers[5] = "Bemerkung".to_string();
        let schema = TableSchema::from_headers(&headers).unwrap();
        assert_eq!(schema.first_name, 0);
        assert_eq!(schema.hire_date, None);
    }

    #[test]
    fn test_normalize_row() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        let reference = date("01.01.2024");
        let record = Normalizer::new(&schema, reference).normalize_row(0, &full_row()).unwrap();
        let person = record.person;

        assert_eq!(person.personnel_id, "4711");
        assert_eq!(person.sex, Sex::Female);
        assert_eq!(person.hire_date, None);
        assert_eq!(person.departments.len(), 2);
        assert_eq!(person.departments[0].label, Department::Youth);
        assert_eq!(person.departments[1].label, Department::Active);
        assert_eq!(person.departments[1].end, None);
        assert_eq!(person.current_rank().unwrap().label, "HFF");
        assert_eq!(person.roles[0].label, "Gerätewart");
        assert_eq!(person.courses[0].span.label, Course::Tf);
        assert!(person.courses[0].is_passed());
        assert_eq!(person.courses[1].span.label, Course::Radio);
        assert_eq!(person.courses[1].status, CourseStatus::Unknown);
        assert!(!person.courses[1].is_passed());

        assert_eq!(
            record.warnings,
            vec![DataQualityWarning::MissingCourseStatus { record: "4711".to_string(), group: 2 }]
        );
    }

    #[test]
    fn test_histories_sorted_by_end_date() {
        let mut headers = headers();
        headers.extend(["Dienststellung 2", "Von 2", "Bis 2"].iter().map(|h| h.to_string()));
        let schema = TableSchema::from_headers(&headers).unwrap();

        let mut values = full_row();
        // open course and role listed before closed ones
        values[20] = String::new();
        values.extend(row(&["Atemschutzgerätewart", "01.01.2010", "01.01.2012"]));
        let person = Normalizer::new(&schema, date("01.01.2024"))
            .normalize_row(0, &values)
            .unwrap()
            .person;

        let course_ends: Vec<_> = person.courses.iter().map(|c| c.span.end).collect();
        assert_eq!(course_ends, vec![Some(date("05.01.2013")), None]);
        assert_eq!(person.courses[1].span.label, Course::Tf);
        assert!(person.courses[1].is_passed());

        let role_ends: Vec<_> = person.roles.iter().map(|r| r.end).collect();
        assert_eq!(role_ends, vec![Some(date("01.01.2012")), None]);
        assert_eq!(person.roles[1].label, "Gerätewart");
    }

    #[test]
    fn test_missing_rank_gets_base_rank_at_reference_date() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        let reference = date("01.01.2024");
        let mut values = full_row();
        values[12] = String::new();
        let record = Normalizer::new(&schema, reference).normalize_row(0, &values).unwrap();

        assert_eq!(record.person.ranks.len(), 1);
        let rank = record.person.current_rank().unwrap();
        assert_eq!(rank.label, "FFA");
        assert_eq!(rank.start, reference);
        assert_eq!(rank.end, Some(reference));
        assert!(record
            .warnings
            .iter()
            .any(|w| matches!(
                w,
                DataQualityWarning::MissingRank { record, .. } if record == "4711"
            )));
    }

    #[test]
    fn test_malformed_start_date_fails() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        let mut values = full_row();
        values[10] = "2008-01-01".to_string();
        let result = Normalizer::new(&schema, date("01.01.2024")).normalize_row(0, &values);
        match result {
            Err(PromotionError::Parse { record, column, value }) => {
                assert_eq!(record, "4711");
                assert_eq!(column, "Von 2");
                assert_eq!(value, "2008-01-01");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_malformed_hire_date_fails() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        let mut values = full_row();
        values[5] = "irgendwann".to_string();
        let result = Normalizer::new(&schema, date("01.01.2024")).normalize_row(0, &values);
        assert!(matches!(result, Err(PromotionError::Parse { .. })));
    }

    #[test]
    fn test_blank_start_date_skips_entry() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        let mut values = full_row();
        values[16] = String::new();
        let record = Normalizer::new(&schema, date("01.01.2024"))
            .normalize_row(0, &values)
            .unwrap();
        assert!(record.person.roles.is_empty());
        assert!(record
            .warnings
            .iter()
            .any(|w| matches!(w, DataQualityWarning::MissingStartDate { .. })));
    }

    #[test]
    fn test_ragged_row_and_unknown_status() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        let mut values = full_row();
        values[21] = "teilgenommen".to_string();
        values.truncate(22);
        let record = Normalizer::new(&schema, date("01.01.2024"))
            .normalize_row(3, &values)
            .unwrap();
        assert_eq!(record.person.courses.len(), 1);
        assert_eq!(record.person.courses[0].status, CourseStatus::NotPassed);
        assert!(record
            .warnings
            .iter()
            .any(|w| matches!(
                w,
                DataQualityWarning::UnknownCourseStatus { value, .. } if value == "teilgenommen"
            )));
    }

    #[test]
    fn test_normalize_table_skips_blank_rows() {
        let schema = TableSchema::from_headers(&headers()).unwrap();
        let table = RawTable {
            headers: headers(),
            rows: vec![full_row(), vec![String::new(); 26]],
        };
        let normalized = Normalizer::new(&schema, date("01.01.2024"))
            .normalize_table(&table)
            .unwrap();
        assert_eq!(normalized.persons.len(), 1);
        assert_eq!(normalized.warnings.len(), 1);
    }
}
