//! Corpus statistics
//!
//! A summary of the full labeled corpus, including columns the classifier
//! never trains on: platform, moderation action, political leaning and
//! content category.

use crate::record_store::{raw_label, RecordStore};
use misinfo_core::{RawLabel, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

pub const PLATFORM_FIELD: &str = "Platform";
pub const MODERATION_FIELD: &str = "Moderation_Action";
pub const LEANING_FIELD: &str = "Political_Leaning";
pub const CATEGORY_FIELD: &str = "Content_Category";
pub const ENGAGEMENT_FIELD: &str = "Engagement_Score";
pub const INTERACTION_FIELDS: [&str; 3] = ["Like_Count", "Share_Count", "Comment_Count"];

/// Bucket for records without the grouped column
pub const MISSING_VALUE: &str = "(missing)";

/// Summary of one corpus file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorpusStats {
    pub total_posts: usize,
    pub misinformation_posts: usize,

    /// Percentage of posts flagged `"True"`, 0 for an empty corpus
    pub misinformation_rate: f64,

    /// Mean engagement score over posts that carry one
    pub mean_engagement: Option<f64>,

    /// Likes, shares and comments summed over every post
    pub total_interactions: u64,

    pub by_platform: BTreeMap<String, usize>,
    pub by_moderation_action: BTreeMap<String, usize>,
    pub by_political_leaning: BTreeMap<String, usize>,

    /// Flagged posts per content category
    pub misinformation_by_category: BTreeMap<String, usize>,
}

impl CorpusStats {
    /// Load `path` through `store` and summarize every record
    pub fn from_path(store: &RecordStore, path: impl AsRef<Path>) -> Result<Self> {
        let objects = store.load_objects(path)?;
        Ok(Self::from_objects(&objects, store.label_field()))
    }

    /// Summarize raw record objects; non-object items count only toward the total
    pub fn from_objects(objects: &[Value], label_field: &str) -> Self {
        let mut stats = Self {
            total_posts: objects.len(),
            ..Default::default()
        };
        let mut engagement_sum = 0.0;
        let mut engagement_count = 0usize;

        for object in objects {
            let flagged = object
                .get(label_field)
                .is_some_and(|label| raw_label(label) == RawLabel::True);

            if flagged {
                stats.misinformation_posts += 1;
                *stats
                    .misinformation_by_category
                    .entry(bucket(object, CATEGORY_FIELD))
                    .or_default() += 1;
            }

            *stats.by_platform.entry(bucket(object, PLATFORM_FIELD)).or_default() += 1;
            *stats
                .by_moderation_action
                .entry(bucket(object, MODERATION_FIELD))
                .or_default() += 1;
            *stats
                .by_political_leaning
                .entry(bucket(object, LEANING_FIELD))
                .or_default() += 1;

            if let Some(score) = object.get(ENGAGEMENT_FIELD).and_then(Value::as_f64) {
                engagement_sum += score;
                engagement_count += 1;
            }

            stats.total_interactions += INTERACTION_FIELDS
                .iter()
                .filter_map(|field| object.get(*field).and_then(Value::as_u64))
                .sum::<u64>();
        }

        if stats.total_posts > 0 {
            stats.misinformation_rate =
                stats.misinformation_posts as f64 / stats.total_posts as f64 * 100.0;
        }
        if engagement_count > 0 {
            stats.mean_engagement = Some(engagement_sum / engagement_count as f64);
        }
        stats
    }
}

fn bucket(object: &Value, field: &str) -> String {
    match object.get(field) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => MISSING_VALUE.to_string(),
        Some(other) => other.to_string(),
    }
}

impl fmt::Display for CorpusStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Posts:            {}", self.total_posts)?;
        writeln!(
            f,
            "  Misinformation:   {} ({:.1}%)",
            self.misinformation_posts, self.misinformation_rate
        )?;
        match self.mean_engagement {
            Some(mean) => writeln!(f, "  Mean engagement:  {:.2}", mean)?,
            None => writeln!(f, "  Mean engagement:  n/a")?,
        }
        writeln!(f, "  Interactions:     {}", self.total_interactions)?;

        for (title, counts) in [
            ("Platform", &self.by_platform),
            ("Moderation action", &self.by_moderation_action),
            ("Political leaning", &self.by_political_leaning),
            ("Misinformation by category", &self.misinformation_by_category),
        ] {
            writeln!(f)?;
            writeln!(f, "  {}", title)?;
            for (value, count) in counts {
                writeln!(f, "    {:<24} {}", value, count)?;
            }
        }
        Ok(())
    }
}
