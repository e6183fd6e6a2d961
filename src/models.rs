use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: String,
    pub output: String,
    /// Reference date (dd.mm.yyyy or dd.mm.yy). Today when unset.
    pub reference_date: Option<String>,
    pub trace: TraceLevel,
    // Export data still uses the old ordinance names; drop once they are gone.
    pub translate_old_rank_names: bool,
    pub error_log: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraceLevel {
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "debug")]
    Debug,
}

impl TraceLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "warning" | "warn" => Some(Self::Warning),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: "./Datenbereitstellung_Dienstgrade.csv".to_string(),
            output: "./Output.csv".to_string(),
            reference_date: None,
            trace: TraceLevel::Warning,
            translate_old_rank_names: true,
            error_log: "./ErrorLog.txt".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }
}

/// Anything with a start and a possibly open end.
pub trait Timed {
    fn start(&self) -> NaiveDate;
    /// `None` while still ongoing.
    fn end(&self) -> Option<NaiveDate>;

    fn resolved_end(&self, reference: NaiveDate) -> NaiveDate {
        self.end().unwrap_or(reference)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span<L> {
    pub label: L,
    pub start: NaiveDate,
    pub end: Option<NaiveDate>,
}

impl<L> Span<L> {
    pub fn new(label: L, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        Self { label, start, end }
    }
}

impl<L> Timed for Span<L> {
    fn start(&self) -> NaiveDate {
        self.start
    }

    fn end(&self) -> Option<NaiveDate> {
        self.end
    }
}

pub type DepartmentMembership = Span<Department>;
/// Rank abbreviation exactly as exported.
pub type RankHeld = Span<String>;
pub type RoleAssignment = Span<String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseRecord {
    pub span: Span<Course>,
    pub status: CourseStatus,
}

impl CourseRecord {
    pub fn is_passed(&self) -> bool {
        self.status == CourseStatus::Passed
    }
}

impl Timed for CourseRecord {
    fn start(&self) -> NaiveDate {
        self.span.start
    }

    fn end(&self) -> Option<NaiveDate> {
        self.span.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseStatus {
    Passed,
    NotPassed,
    /// Status column was blank.
    Unknown,
}

impl CourseStatus {
    /// Returns `None` for text that is neither status, so the caller can warn.
    pub fn from_label(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            Some(Self::Unknown)
        } else if value.eq_ignore_ascii_case("Bestanden") {
            Some(Self::Passed)
        } else if value.eq_ignore_ascii_case("Nicht Bestanden") {
            Some(Self::NotPassed)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Course {
    Tm1,
    Tm2,
    Ga,
    Qs1,
    Qs2,
    Qs3,
    Tf,
    Gf1,
    Gf2,
    Zf1,
    Zf2,
    Lfw,
    Agt,
    Radio,
    Machinist,
    Th,
    Other(String),
}

static COURSE_LABELS: [(Course, &str); 16] = [
    (Course::Tm1, "Truppmannausbildung Teil 1"),
    (Course::Tm2, "Truppmannausbildung Teil 2"),
    (Course::Ga, "Grundausbildung (alte Form)"),
    (Course::Qs1, "Qualifikationsstufe Einsatzfähigkeit"),
    (Course::Qs2, "Qualifikationsstufe Truppmitglied"),
    (Course::Qs3, "Qualifikationsstufe Truppführende/Truppführender"),
    (Course::Tf, "Truppführer"),
    (Course::Gf1, "Gruppenführer Teil 1"),
    (Course::Gf2, "Gruppenführer Teil 2"),
    (Course::Zf1, "Zugführer Teil 1"),
    (Course::Zf2, "Zugführer Teil 2"),
    (Course::Lfw, "Leiter einer Feuerwehr"),
    (Course::Agt, "Atemschutzgeräteträgerlehrgang"),
    (Course::Radio, "Sprechfunkerlehrgang"),
    (Course::Machinist, "Maschinistenlehrgang"),
    (Course::Th, "Technische Hilfeleistung"),
];

/// Courses counted by the "two technical courses" conditions.
pub const TECHNICAL_COURSES: [Course; 4] =
    [Course::Agt, Course::Radio, Course::Machinist, Course::Th];

impl Course {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        COURSE_LABELS
            .iter()
            .find(|(_, known)| *known == label)
            .map(|(course, _)| course.clone())
            .unwrap_or_else(|| Course::Other(label.to_string()))
    }

    pub fn label(&self) -> &str {
        match self {
            Course::Other(label) => label,
            known => COURSE_LABELS
                .iter()
                .find(|(course, _)| course == known)
                .map(|(_, label)| *label)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Department {
    Children,
    Youth,
    Active,
    Senior,
    Supporting,
    Other(String),
}

impl Department {
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "Kinderfeuerwehr" => Department::Children,
            "Jugendfeuerwehr" => Department::Youth,
            "Einsatzabteilung FF" => Department::Active,
            "Altersabteilung, Ehrenabteilung" => Department::Senior,
            "Fördernde Mitglieder" => Department::Supporting,
            other => Department::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Department::Children => "Kinderfeuerwehr",
            Department::Youth => "Jugendfeuerwehr",
            Department::Active => "Einsatzabteilung FF",
            Department::Senior => "Altersabteilung, Ehrenabteilung",
            Department::Supporting => "Fördernde Mitglieder",
            Department::Other(label) => label,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    pub fn from_label(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "m" | "männlich" | "maennlich" => Sex::Male,
            "w" | "weiblich" | "f" => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    pub fn is_female(&self) -> bool {
        matches!(self, Sex::Female)
    }
}

#[derive(Debug, Clone)]
pub struct Person {
    pub first_name: String,
    pub last_name: String,
    // Exported but not read by any promotion rule
    #[allow(dead_code)]
    pub birth_date: NaiveDate,
    pub sex: Sex,
    pub personnel_id: String,
    #[allow(dead_code)]
    pub hire_date: Option<NaiveDate>,
    // All four histories are ordered by end date, ongoing entries last.
    pub departments: Vec<DepartmentMembership>,
    /// Never empty after normalization.
    pub ranks: Vec<RankHeld>,
    #[allow(dead_code)]
    pub roles: Vec<RoleAssignment>,
    pub courses: Vec<CourseRecord>,
}

impl Person {
    pub fn current_rank(&self) -> Option<&RankHeld> {
        self.ranks.last()
    }
}
