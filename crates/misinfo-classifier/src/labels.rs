//! Mapping raw labels to binary targets

use misinfo_core::{LabelConvention, LabeledExample, RawRecord};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts from one encoding pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LabelSummary {
    pub total: usize,
    pub flagged: usize,
    pub genuine: usize,
    pub dropped: usize,

    /// Dropped records per raw label value
    pub dropped_by_label: BTreeMap<String, usize>,
}

impl LabelSummary {
    pub fn kept(&self) -> usize {
        self.flagged + self.genuine
    }
}

/// Encodes `"True"`/`"False"` records into trainable examples.
///
/// Every other label value, `"Uncertain"` included, carries no trainable
/// signal and is dropped without error.
#[derive(Debug, Clone, Default)]
pub struct LabelEncoder {
    convention: LabelConvention,
}

impl LabelEncoder {
    pub fn new(convention: LabelConvention) -> Self {
        Self { convention }
    }

    pub fn convention(&self) -> &LabelConvention {
        &self.convention
    }

    /// Encode records, preserving relative order of the kept ones
    pub fn encode(&self, records: &[RawRecord]) -> Vec<LabeledExample> {
        self.encode_with_summary(records).0
    }

    /// Encode records and report what was kept and dropped
    pub fn encode_with_summary(&self, records: &[RawRecord]) -> (Vec<LabeledExample>, LabelSummary) {
        let mut summary = LabelSummary {
            total: records.len(),
            ..Default::default()
        };
        let mut examples = Vec::with_capacity(records.len());

        for record in records {
            match self.convention.class_for(&record.raw_label) {
                Some(label) => {
                    if label == self.convention.flagged_class {
                        summary.flagged += 1;
                    } else {
                        summary.genuine += 1;
                    }
                    examples.push(LabeledExample {
                        text: record.text.clone(),
                        label,
                    });
                }
                None => {
                    summary.dropped += 1;
                    *summary
                        .dropped_by_label
                        .entry(record.raw_label.as_str().to_string())
                        .or_default() += 1;
                }
            }
        }

        if summary.dropped > 0 {
            tracing::warn!(
                "Dropped {} of {} records without a True/False label: {:?}",
                summary.dropped,
                summary.total,
                summary.dropped_by_label
            );
        }
        tracing::info!(
            "Encoded {} examples ({} flagged, {} genuine)",
            summary.kept(),
            summary.flagged,
            summary.genuine
        );

        (examples, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use misinfo_core::RawLabel;

    fn record(text: &str, label: &str) -> RawRecord {
        RawRecord::new(text, RawLabel::parse(label))
    }

    #[test]
    fn test_uncertain_is_dropped() {
        let records = vec![
            record("A", "True"),
            record("B", "False"),
            record("C", "Uncertain"),
        ];

        let examples = LabelEncoder::default().encode(&records);

        assert_eq!(
            examples,
            vec![
                LabeledExample {
                    text: "A".into(),
                    label: 1
                },
                LabeledExample {
                    text: "B".into(),
                    label: 0
                },
            ]
        );
    }

    #[test]
    fn test_other_labels_dropped_and_counted() {
        let records = vec![
            record("a", "true"),
            record("b", "Uncertain"),
            record("c", "Uncertain"),
            record("d", ""),
            record("e", "True"),
        ];

        let (examples, summary) = LabelEncoder::default().encode_with_summary(&records);

        assert_eq!(examples.len(), 1);
        assert_eq!(examples[0].text, "e");
        assert_eq!(summary.total, 5);
        assert_eq!(summary.dropped, 4);
        assert_eq!(summary.dropped_by_label.get("Uncertain"), Some(&2));
        assert_eq!(summary.dropped_by_label.get("true"), Some(&1));
    }

    #[test]
    fn test_order_preserved() {
        let records: Vec<RawRecord> = (0..10)
            .map(|i| record(&format!("post {i}"), if i % 3 == 0 { "Uncertain" } else { "False" }))
            .collect();

        let texts: Vec<String> = LabelEncoder::default()
            .encode(&records)
            .into_iter()
            .map(|e| e.text)
            .collect();

        assert_eq!(
            texts,
            vec!["post 1", "post 2", "post 4", "post 5", "post 7", "post 8"]
        );
    }

    #[test]
    fn test_encoder_follows_convention() {
        let convention = LabelConvention {
            flagged_class: 0,
            id2label: vec!["misinformation".into(), "genuine".into()],
            ..Default::default()
        };
        let examples = LabelEncoder::new(convention).encode(&[record("x", "True")]);
        assert_eq!(examples[0].label, 0);
    }
}
