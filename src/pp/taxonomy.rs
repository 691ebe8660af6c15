//! Taxonomy model.
//!
//! Taxonomies provide hierarchical classification of securities. Assignment
//! weights are stored in hundredths of a percent (10000 = 100%).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Weight of a full assignment (100%)
pub const ONE_HUNDRED_PERCENT: i32 = 10_000;

/// Id of the synthetic classification collecting everything not assigned
pub const UNASSIGNED_ID: &str = "$unassigned$";

/// Vehicle class of assignments that reference a security
pub const VEHICLE_SECURITY: &str = "security";

/// Vehicle class of assignments that reference a cash account
pub const VEHICLE_ACCOUNT: &str = "account";

/// A taxonomy for classifying securities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Taxonomy {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source: Option<String>,
    pub root: Option<Classification>,
}

impl Taxonomy {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            source: None,
            root: None,
        }
    }

    /// Walk the tree below the root. The root itself is not reported.
    pub fn accept<'a, V: TaxonomyVisitor<'a>>(&'a self, visitor: &mut V) {
        if let Some(ref root) = self.root {
            for child in &root.children {
                child.accept(visitor);
            }
        }
    }
}

/// Callback interface for [`Taxonomy::accept`]. Classifications are visited
/// pre-order; the assignments of a classification are reported right after it.
pub trait TaxonomyVisitor<'a> {
    fn visit_classification(&mut self, _classification: &'a Classification) {}

    fn visit_assignment(
        &mut self,
        _classification: &'a Classification,
        _assignment: &'a ClassificationAssignment,
    ) {
    }
}

/// A classification within a taxonomy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    /// Weight (10000 = 100%)
    #[serde(default)]
    pub weight: Option<i32>,
    /// Presentation order among siblings
    #[serde(default)]
    pub rank: Option<i32>,
    #[serde(default)]
    pub children: Vec<Classification>,
    #[serde(default)]
    pub assignments: Vec<ClassificationAssignment>,
    /// Custom data attributes
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl Classification {
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            color: None,
            weight: None,
            rank: None,
            children: Vec::new(),
            assignments: Vec::new(),
            data: HashMap::new(),
        }
    }

    pub fn with_rank(mut self, rank: i32) -> Self {
        self.rank = Some(rank);
        self
    }

    fn accept<'a, V: TaxonomyVisitor<'a>>(&'a self, visitor: &mut V) {
        visitor.visit_classification(self);
        for assignment in &self.assignments {
            visitor.visit_assignment(self, assignment);
        }
        for child in &self.children {
            child.accept(visitor);
        }
    }
}

/// Assignment of a security to a classification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationAssignment {
    /// Type of investment vehicle ("security" or "account")
    pub vehicle_class: String,
    /// UUID of the referenced entity
    pub vehicle_uuid: String,
    /// Weight (10000 = 100%)
    pub weight: i32,
    #[serde(default)]
    pub rank: Option<i32>,
}

impl ClassificationAssignment {
    pub fn security(security_uuid: String, weight: i32) -> Self {
        Self {
            vehicle_class: VEHICLE_SECURITY.to_string(),
            vehicle_uuid: security_uuid,
            weight,
            rank: None,
        }
    }

    pub fn account(account_uuid: String, weight: i32) -> Self {
        Self {
            vehicle_class: VEHICLE_ACCOUNT.to_string(),
            vehicle_uuid: account_uuid,
            weight,
            rank: None,
        }
    }

    pub fn is_security(&self) -> bool {
        self.vehicle_class == VEHICLE_SECURITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Taxonomy {
        let mut taxonomy = Taxonomy::new("tax-1".to_string(), "Asset Allocation".to_string());

        let mut root = Classification::new("root".to_string(), "Root".to_string());
        root.children.push(Classification::new("c1".to_string(), "Stocks".to_string()));
        root.children.push(Classification::new("c2".to_string(), "Bonds".to_string()));
        root.children[0].children.push(Classification::new(
            "c1-1".to_string(),
            "US Stocks".to_string(),
        ));
        root.children[0]
            .assignments
            .push(ClassificationAssignment::security("sec-1".to_string(), 6000));
        root.children[1]
            .assignments
            .push(ClassificationAssignment::account("acc-1".to_string(), ONE_HUNDRED_PERCENT));

        taxonomy.root = Some(root);
        taxonomy
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl<'a> TaxonomyVisitor<'a> for Recorder {
        fn visit_classification(&mut self, classification: &'a Classification) {
            self.events.push(classification.id.clone());
        }

        fn visit_assignment(
            &mut self,
            classification: &'a Classification,
            assignment: &'a ClassificationAssignment,
        ) {
            self.events
                .push(format!("{}:{}", classification.id, assignment.vehicle_uuid));
        }
    }

    #[test]
    fn test_visitor_without_root() {
        let taxonomy = Taxonomy::new("tax-2".to_string(), "Empty".to_string());
        let mut recorder = Recorder::default();
        taxonomy.accept(&mut recorder);
        assert!(recorder.events.is_empty());
    }

    #[test]
    fn test_visitor_skips_root() {
        let taxonomy = sample();
        let mut recorder = Recorder::default();
        taxonomy.accept(&mut recorder);

        assert_eq!(
            recorder.events,
            vec!["c1", "c1:sec-1", "c1-1", "c2", "c2:acc-1"]
        );
    }

    #[test]
    fn test_assignment_vehicles() {
        let assignment = ClassificationAssignment::security("s".to_string(), 2500);
        assert!(assignment.is_security());
        assert_eq!(assignment.weight, 2500);

        let account = ClassificationAssignment::account("a".to_string(), 10000);
        assert!(!account.is_security());
        assert!(account.rank.is_none());
    }
}
