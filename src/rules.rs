//! Promotion criteria per rank (Lower Saxony fire brigade ordinance).
//!
//! Every check is a pure function of the person's normalized history and the
//! reference date. Empty histories simply fail the check.

use chrono::NaiveDate;
use tracing::debug;

use crate::duration::{to_years, total_days, total_days_since};
use crate::models::{Course, Department, Person, Timed, TECHNICAL_COURSES};
use crate::ranks::RankCode;

/// Department whose service time counts for promotion.
const MAIN_DEPARTMENT: Department = Department::Active;
const JUNIOR_DEPARTMENT: Department = Department::Youth;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    NotEligible,
    /// No criteria are implemented for this rank.
    NotEvaluable,
}

impl From<bool> for Verdict {
    fn from(eligible: bool) -> Self {
        if eligible {
            Verdict::Eligible
        } else {
            Verdict::NotEligible
        }
    }
}

pub fn has_passed_course(person: &Person, course: &Course) -> bool {
    let passed = person
        .courses
        .iter()
        .any(|c| c.span.label == *course && c.is_passed());
    if passed {
        debug!("    course '{}' passed", course.label());
    }
    passed
}

pub fn years_in_department(person: &Person, department: &Department, reference: NaiveDate) -> f64 {
    let spans: Vec<_> = person
        .departments
        .iter()
        .filter(|d| d.label == *department)
        .collect();
    if spans.is_empty() {
        return 0.0;
    }
    to_years(total_days(spans, reference))
}

/// Service years in `department` after the latest passed completion of
/// `course`. Zero if the course was never passed.
pub fn years_in_department_since_course(
    person: &Person,
    department: &Department,
    course: &Course,
    reference: NaiveDate,
) -> f64 {
    let completed = person
        .courses
        .iter()
        .filter(|c| c.span.label == *course && c.is_passed())
        .map(|c| c.resolved_end(reference))
        .max();
    let cutoff = match completed {
        Some(cutoff) => cutoff,
        None => return 0.0,
    };

    let spans: Vec<_> = person
        .departments
        .iter()
        .filter(|d| d.label == *department)
        .collect();
    let years = to_years(total_days_since(spans, cutoff, reference));
    debug!(
        "    years in '{}' after {}: {:.2}",
        department.label(),
        cutoff.format("%d.%m.%Y"),
        years
    );
    years
}

pub fn count_passed_technical_courses(person: &Person) -> usize {
    person
        .courses
        .iter()
        .filter(|c| c.is_passed() && TECHNICAL_COURSES.contains(&c.span.label))
        .count()
}

fn main_years(person: &Person, reference: NaiveDate) -> f64 {
    years_in_department(person, &MAIN_DEPARTMENT, reference)
}

fn main_years_since(person: &Person, course: Course, reference: NaiveDate) -> f64 {
    years_in_department_since_course(person, &MAIN_DEPARTMENT, &course, reference)
}

fn has_all(person: &Person, courses: &[Course]) -> bool {
    courses.iter().all(|course| has_passed_course(person, course))
}

fn has_any(person: &Person, courses: &[Course]) -> bool {
    courses.iter().any(|course| has_passed_course(person, course))
}

/// Feuerwehrmann/-frau: one year of service (or two in the youth
/// brigade) and a basic training.
fn check_fm(person: &Person, reference: NaiveDate) -> bool {
    let training = has_any(person, &[Course::Qs1, Course::Tm1, Course::Ga]);
    let service = main_years(person, reference) >= 1.0
        || years_in_department(person, &JUNIOR_DEPARTMENT, reference) >= 2.0;
    debug!("  check_fm(): training: {}, service: {}", training, service);
    training && service
}

fn check_ofm(person: &Person, reference: NaiveDate) -> bool {
    let training = has_any(person, &[Course::Qs2, Course::Tm2, Course::Ga]);
    let service = main_years(person, reference) >= 2.0;
    debug!("  check_ofm(): training: {}, service: {}", training, service);
    training && service
}

/// Hauptfeuerwehrmann/-frau: five years of service, plus three years after
/// QS3 or Truppführer, or three years after TM2 with two technical courses.
fn check_hfm(person: &Person, reference: NaiveDate) -> bool {
    let service = main_years(person, reference) >= 5.0;
    let after_qs3 = main_years_since(person, Course::Qs3, reference) >= 3.0;
    let after_tf = main_years_since(person, Course::Tf, reference) >= 3.0;
    let after_tm2 = main_years_since(person, Course::Tm2, reference) >= 3.0
        && count_passed_technical_courses(person) >= 2;
    debug!(
        "  check_hfm(): service: {}, qs3: {}, tf: {}, tm2+technical: {}",
        service, after_qs3, after_tf, after_tm2
    );
    service && (after_qs3 || after_tf || after_tm2)
}

fn check_ehfm(person: &Person, reference: NaiveDate) -> bool {
    let service = main_years(person, reference) >= 10.0;
    let after_qs3 = main_years_since(person, Course::Qs3, reference) >= 10.0;
    let after_tf = main_years_since(person, Course::Tf, reference) >= 10.0;
    let after_tm2 = main_years_since(person, Course::Tm2, reference) >= 20.0
        && count_passed_technical_courses(person) >= 2;
    debug!(
        "  check_ehfm(): service: {}, qs3: {}, tf: {}, tm2+technical: {}",
        service, after_qs3, after_tf, after_tm2
    );
    service && (after_qs3 || after_tf || after_tm2)
}

fn group_leader(person: &Person) -> bool {
    has_all(person, &[Course::Gf1, Course::Gf2])
}

fn platoon_leader(person: &Person) -> bool {
    has_all(person, &[Course::Zf1, Course::Zf2])
}

fn check_bm(person: &Person, reference: NaiveDate) -> bool {
    let eligible = group_leader(person) && main_years(person, reference) >= 5.0;
    debug!("  check_bm(): {}", eligible);
    eligible
}

/// OBM, HBM and EHBM differ only in the years of service required after
/// finishing the group leader training.
fn check_after_group_leader(person: &Person, reference: NaiveDate, years: f64) -> bool {
    let eligible =
        group_leader(person) && main_years_since(person, Course::Gf2, reference) >= years;
    debug!("  check_after_group_leader({}): {}", years, eligible);
    eligible
}

// TODO: support units (Stützpunkt-/Schwerpunktfeuerwehr) have additional requirements
fn check_bri(person: &Person, reference: NaiveDate) -> bool {
    let eligible = group_leader(person) && main_years(person, reference) >= 9.0;
    debug!("  check_bri(): {}", eligible);
    eligible
}

fn check_obri(person: &Person, reference: NaiveDate) -> bool {
    let eligible = platoon_leader(person) && main_years(person, reference) >= 10.0;
    debug!("  check_obri(): {}", eligible);
    eligible
}

fn check_chief(person: &Person, reference: NaiveDate, years: f64) -> bool {
    let eligible = platoon_leader(person)
        && has_passed_course(person, &Course::Lfw)
        && main_years(person, reference) >= years;
    debug!("  check_chief({}): {}", years, eligible);
    eligible
}

/// Checks the promotion criteria for `rank`.
pub fn evaluate(rank: RankCode, person: &Person, reference: NaiveDate) -> Verdict {
    match rank {
        RankCode::Fma | RankCode::GemBri => Verdict::NotEvaluable,
        RankCode::Fm => check_fm(person, reference).into(),
        RankCode::Ofm => check_ofm(person, reference).into(),
        RankCode::Hfm => check_hfm(person, reference).into(),
        RankCode::Ehfm => check_ehfm(person, reference).into(),
        RankCode::Bm => check_bm(person, reference).into(),
        RankCode::Obm => check_after_group_leader(person, reference, 6.0).into(),
        RankCode::Hbm => check_after_group_leader(person, reference, 12.0).into(),
        RankCode::Ehbm => check_after_group_leader(person, reference, 18.0).into(),
        RankCode::Bri => check_bri(person, reference).into(),
        RankCode::Obri => check_obri(person, reference).into(),
        RankCode::Hbri => check_chief(person, reference, 11.0).into(),
        RankCode::Ehbri => check_chief(person, reference, 12.0).into(),
    }
}
