//! Pipeline aggregation
//!
//! Groups records by canonical stage and computes per-stage counts and sums.
//! Everything here is pure: no I/O and no error paths.

use crate::pipeline::funnel::Funnel;
use crate::pipeline::types::{PipelineRecord, TypeFilter};
use serde::Serialize;

/// Count and value total of one stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSummary {
    pub stage: &'static str,
    pub label: &'static str,
    pub count: usize,
    pub total: f64,
}

/// A stage bucket with its records, in input order
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageGroup {
    #[serde(flatten)]
    pub summary: StageSummary,
    pub records: Vec<PipelineRecord>,
}

/// Board-wide totals over the filtered records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTotals {
    pub count: usize,
    pub total: f64,
    /// Sum of value × probability/100
    pub weighted: f64,
}

pub struct PipelineAggregator;

impl PipelineAggregator {
    /// Per-stage count and total, in funnel order. Every stage is present,
    /// including those with no records.
    pub fn summarize(
        records: &[PipelineRecord],
        funnel: &Funnel,
        filter: TypeFilter,
    ) -> Vec<StageSummary> {
        funnel
            .stages
            .iter()
            .map(|stage| {
                let (count, total) = records
                    .iter()
                    .filter(|r| r.canonical_stage == stage.key && filter.matches(&r.record_type))
                    .fold((0usize, 0.0f64), |(count, total), r| (count + 1, total + r.amount()));

                StageSummary {
                    stage: stage.key,
                    label: stage.label,
                    count,
                    total,
                }
            })
            .collect()
    }

    /// Stage buckets carrying their records
    pub fn group(records: &[PipelineRecord], funnel: &Funnel, filter: TypeFilter) -> Vec<StageGroup> {
        funnel
            .stages
            .iter()
            .map(|stage| {
                let members: Vec<PipelineRecord> = records
                    .iter()
                    .filter(|r| r.canonical_stage == stage.key && filter.matches(&r.record_type))
                    .cloned()
                    .collect();

                StageGroup {
                    summary: StageSummary {
                        stage: stage.key,
                        label: stage.label,
                        count: members.len(),
                        total: members.iter().map(PipelineRecord::amount).sum(),
                    },
                    records: members,
                }
            })
            .collect()
    }

    /// Totals across every stage of the funnel
    pub fn totals(records: &[PipelineRecord], funnel: &Funnel, filter: TypeFilter) -> PipelineTotals {
        records
            .iter()
            .filter(|r| funnel.contains(&r.canonical_stage) && filter.matches(&r.record_type))
            .fold(PipelineTotals::default(), |acc, r| PipelineTotals {
                count: acc.count + 1,
                total: acc.total + r.amount(),
                weighted: acc.weighted + r.weighted_amount(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::funnel::DEAL_FUNNEL;
    use crate::pipeline::normalizer::StageNormalizer;
    use crate::pipeline::types::{RecordType, Selection};
    use pretty_assertions::assert_eq;

    fn records(raw: Vec<PipelineRecord>) -> Vec<PipelineRecord> {
        let mut raw = raw;
        StageNormalizer::normalize_records(&DEAL_FUNNEL, &mut raw);
        raw
    }

    #[test]
    fn test_missing_value_counts_as_zero() {
        let records = records(vec![
            PipelineRecord::new("a", "interested").with_value(45000.0),
            PipelineRecord::new("b", "interested"),
        ]);
        let summary = PipelineAggregator::summarize(&records, &DEAL_FUNNEL, Selection::All);

        assert_eq!(summary[0].stage, "interested");
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].total, 45000.0);
    }

    #[test]
    fn test_every_stage_present_in_funnel_order() {
        let records = records(vec![PipelineRecord::new("a", "signed").with_value(10.0)]);
        let summary = PipelineAggregator::summarize(&records, &DEAL_FUNNEL, Selection::All);

        let stages: Vec<_> = summary.iter().map(|s| (s.stage, s.count)).collect();
        assert_eq!(
            stages,
            vec![
                ("interested", 0),
                ("had-meeting", 0),
                ("contract-negotiations", 0),
                ("contract-signed", 1),
            ]
        );
        assert_eq!(summary[1].total, 0.0);
    }

    #[test]
    fn test_type_filter() {
        let records = records(vec![
            PipelineRecord::new("a", "meeting").with_value(100.0),
            PipelineRecord::new("b", "meeting")
                .of_type(RecordType::Collaborator)
                .with_value(250.0),
            PipelineRecord::new("c", "meeting")
                .of_type(RecordType::Customer)
                .with_value(1000.0),
        ]);

        let all = PipelineAggregator::summarize(&records, &DEAL_FUNNEL, Selection::All);
        assert_eq!((all[1].count, all[1].total), (3, 1350.0));

        let collab = PipelineAggregator::summarize(
            &records,
            &DEAL_FUNNEL,
            Selection::Only(RecordType::Collaborator),
        );
        assert_eq!((collab[1].count, collab[1].total), (1, 250.0));

        let partners = PipelineAggregator::summarize(
            &records,
            &DEAL_FUNNEL,
            Selection::Only(RecordType::TechPartner),
        );
        assert!(partners.iter().all(|s| s.count == 0 && s.total == 0.0));
    }

    #[test]
    fn test_sum_matches_filtered_records() {
        let records = records(vec![
            PipelineRecord::new("a", "proposal").with_value(10.5),
            PipelineRecord::new("b", "negotiation").with_value(20.25),
            PipelineRecord::new("c", "warm").with_value(7.0),
            PipelineRecord::new("d", "proposal"),
        ]);
        let summary = PipelineAggregator::summarize(&records, &DEAL_FUNNEL, Selection::All);

        for stage in &summary {
            let expected: f64 = records
                .iter()
                .filter(|r| r.canonical_stage == stage.stage)
                .map(|r| r.value.unwrap_or(0.0))
                .sum();
            assert_eq!(stage.total, expected);
        }
        assert_eq!(summary[2].count, 3);
    }

    #[test]
    fn test_empty_funnel_gives_empty_result() {
        let empty = Funnel { name: "empty", stages: vec![], rules: vec![] };
        let records = records(vec![PipelineRecord::new("a", "warm")]);
        assert!(PipelineAggregator::summarize(&records, &empty, Selection::All).is_empty());
        assert!(PipelineAggregator::group(&records, &empty, Selection::All).is_empty());
    }

    #[test]
    fn test_group_keeps_input_order() {
        let records = records(vec![
            PipelineRecord::new("z", "warm").with_value(1.0),
            PipelineRecord::new("y", "signed"),
            PipelineRecord::new("x", "prospect").with_value(2.0),
        ]);
        let groups = PipelineAggregator::group(&records, &DEAL_FUNNEL, Selection::All);

        let ids: Vec<_> = groups[0].records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["z", "x"]);
        assert_eq!(groups[0].summary.total, 3.0);
        assert_eq!(groups[3].summary.count, 1);
    }

    #[test]
    fn test_totals_include_weighted_forecast() {
        let records = records(vec![
            PipelineRecord::new("a", "proposal").with_value(1000.0).with_probability(50.0),
            PipelineRecord::new("b", "signed").with_value(400.0).with_probability(100.0),
            PipelineRecord::new("c", "warm").with_value(300.0),
        ]);
        let totals = PipelineAggregator::totals(&records, &DEAL_FUNNEL, Selection::All);

        assert_eq!(
            totals,
            PipelineTotals { count: 3, total: 1700.0, weighted: 900.0 }
        );
    }
}
