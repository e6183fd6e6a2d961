//! Rank ladder of the fire brigade ordinance.
//!
//! Ranks are ordered by seniority; the position in [`LADDER`] is the only
//! seniority measure. Each descriptor carries the abbreviations of the
//! current ordinance ("new") and of the previous one ("old"), for men and
//! women.

use crate::models::Sex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RankCode {
    Fma,
    Fm,
    Ofm,
    Hfm,
    Ehfm,
    Bm,
    Obm,
    Hbm,
    Ehbm,
    Bri,
    Obri,
    Hbri,
    Ehbri,
    GemBri,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    New,
    Old,
}

#[derive(Debug, Clone, Copy)]
pub struct RankDescriptor {
    pub code: RankCode,
    pub new_male: &'static str,
    pub new_female: &'static str,
    pub old_male: &'static str,
    pub old_female: &'static str,
}

impl RankDescriptor {
    const fn new(
        code: RankCode,
        new_male: &'static str,
        new_female: &'static str,
        old_male: &'static str,
        old_female: &'static str,
    ) -> Self {
        Self {
            code,
            new_male,
            new_female,
            old_male,
            old_female,
        }
    }

    pub fn name(&self, convention: Convention, sex: Sex) -> &'static str {
        match (convention, sex.is_female()) {
            (Convention::New, false) => self.new_male,
            (Convention::New, true) => self.new_female,
            (Convention::Old, false) => self.old_male,
            (Convention::Old, true) => self.old_female,
        }
    }

    fn matches(&self, convention: Convention, abbreviation: &str) -> bool {
        match convention {
            Convention::New => self.new_male == abbreviation || self.new_female == abbreviation,
            Convention::Old => self.old_male == abbreviation || self.old_female == abbreviation,
        }
    }
}

// GemBrI has no counterpart in the old ordinance and keeps its new name.
pub static LADDER: [RankDescriptor; 14] = [
    RankDescriptor::new(RankCode::Fma, "FMA", "FFA", "FMA", "FFA"),
    RankDescriptor::new(RankCode::Fm, "FM", "FF", "FM", "FF"),
    RankDescriptor::new(RankCode::Ofm, "OFM", "OFF", "OFM", "OFF"),
    RankDescriptor::new(RankCode::Hfm, "HFM", "HFF", "HFM", "HFF"),
    RankDescriptor::new(RankCode::Ehfm, "EHFM", "EHFF", "1.HFM", "1.HFF"),
    RankDescriptor::new(RankCode::Bm, "BM", "BM", "LM", "LM"),
    RankDescriptor::new(RankCode::Obm, "OBM", "OBM", "OLM", "OLM"),
    RankDescriptor::new(RankCode::Hbm, "HBM", "HBM", "HLM", "HLM"),
    RankDescriptor::new(RankCode::Ehbm, "EHBM", "EHBM", "1.HLM", "1.HLM"),
    RankDescriptor::new(RankCode::Bri, "BrI", "BrI", "BM", "BM"),
    RankDescriptor::new(RankCode::Obri, "OBrI", "OBrI", "OBM", "OBM"),
    RankDescriptor::new(RankCode::Hbri, "HBrI", "HBrI", "HBM", "HBM"),
    RankDescriptor::new(RankCode::Ehbri, "EHBrI", "EHBrI", "1.HBM", "1.HBM"),
    RankDescriptor::new(RankCode::GemBri, "GemBrI", "GemBrI", "GemBrI", "GemBrI"),
];

/// Lowest rank, assumed for records without any rank history.
pub fn base_rank() -> &'static RankDescriptor {
    &LADDER[0]
}

/// Finds the ladder position of an exported abbreviation.
///
/// The export uses the old ordinance names, so those win: "BM", "OBM" and
/// "HBM" name different positions in the two conventions.
pub fn position_of(abbreviation: &str) -> Option<usize> {
    let abbreviation = abbreviation.trim();
    [Convention::Old, Convention::New].iter().find_map(|convention| {
        LADDER
            .iter()
            .position(|rank| rank.matches(*convention, abbreviation))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ladder_order_matches_codes() {
        for (idx, rank) in LADDER.iter().enumerate() {
            assert_eq!(rank.code as usize, idx);
        }
    }

    #[test]
    fn test_position_prefers_old_convention() {
        assert_eq!(position_of("FMA"), Some(0));
        assert_eq!(position_of("FFA"), Some(0));
        assert_eq!(position_of("1.HFF"), Some(4));
        assert_eq!(position_of("LM"), Some(5));
        // "BM" is a Brandmeister in the old ordinance
        assert_eq!(position_of("BM"), Some(9));
        assert_eq!(position_of(" HBM "), Some(11));
    }

    #[test]
    fn test_position_falls_back_to_new_convention() {
        assert_eq!(position_of("EHFM"), Some(4));
        assert_eq!(position_of("BrI"), Some(9));
        assert_eq!(position_of("GemBrI"), Some(13));
        assert_eq!(position_of("Kommandant"), None);
    }

    #[test]
    fn test_gendered_names() {
        let rank = &LADDER[RankCode::Ehfm as usize];
        assert_eq!(rank.name(Convention::New, Sex::Female), "EHFF");
        assert_eq!(rank.name(Convention::Old, Sex::Male), "1.HFM");
        assert_eq!(rank.name(Convention::Old, Sex::Unknown), "1.HFM");
        assert_eq!(base_rank().name(Convention::New, Sex::Female), "FFA");
    }
}
