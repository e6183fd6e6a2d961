use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::duration::{to_years, total_days};
use crate::error::PromotionError;
use crate::models::Person;
use crate::ranks::{self, Convention, LADDER};
use crate::rules::{self, Verdict};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub last_name: String,
    pub first_name: String,
    /// Current rank as exported.
    pub current_rank: String,
    pub eligible_ranks: Vec<String>,
    pub tenure_years: f64,
}

impl ReportRow {
    pub fn eligible_ranks_joined(&self) -> String {
        self.eligible_ranks.join(", ")
    }

    pub fn tenure_label(&self) -> String {
        format!("{:.2} Jahre", self.tenure_years)
    }
}

#[derive(Debug)]
pub struct PromotionAnalysis {
    pub reference_date: NaiveDate,
    /// One row per evaluated person, in input order.
    pub rows: Vec<ReportRow>,
    /// Persons skipped because their rank is not on the ladder.
    pub lookup_failures: Vec<PromotionError>,
}

pub struct PromotionAnalyzer {
    pub reference_date: NaiveDate,
    /// Naming convention for the eligible ranks column.
    pub display_convention: Convention,
}

impl PromotionAnalyzer {
    pub fn new(reference_date: NaiveDate, translate_old_rank_names: bool) -> Self {
        let display_convention = if translate_old_rank_names {
            Convention::Old
        } else {
            Convention::New
        };
        Self {
            reference_date,
            display_convention,
        }
    }

    /// Evaluates everyone. A rank missing from the ladder skips only that
    /// person.
    pub fn analyze_all(&self, persons: &[Person]) -> PromotionAnalysis {
        let mut rows = Vec::with_capacity(persons.len());
        let mut lookup_failures = Vec::new();

        for person in persons {
            match self.analyze_person(person) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!("{}", e);
                    lookup_failures.push(e);
                }
            }
        }

        PromotionAnalysis {
            reference_date: self.reference_date,
            rows,
            lookup_failures,
        }
    }

    pub fn analyze_person(&self, person: &Person) -> Result<ReportRow, PromotionError> {
        let current_rank = person
            .current_rank()
            .map(|rank| rank.label.clone())
            .unwrap_or_default();
        info!("Checking requirements for {} {}", current_rank, person.personnel_id);

        let position = ranks::position_of(&current_rank).ok_or_else(|| PromotionError::Lookup {
            record: person.personnel_id.clone(),
            rank: current_rank.clone(),
        })?;

        let eligible_ranks: Vec<String> = LADDER[position + 1..]
            .iter()
            .filter(|rank| {
                rules::evaluate(rank.code, person, self.reference_date) == Verdict::Eligible
            })
            .map(|rank| rank.name(self.display_convention, person.sex).to_string())
            .collect();
        info!("  meets requirements for {:?}", eligible_ranks);

        let tenure_days = total_days(&person.departments, self.reference_date);
        debug!("  total service: {} days", tenure_days);

        Ok(ReportRow {
            last_name: person.last_name.clone(),
            first_name: person.first_name.clone(),
            current_rank,
            eligible_ranks,
            tenure_years: to_years(tenure_days),
        })
    }
}
